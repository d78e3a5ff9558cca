mod catalog;
mod health;
mod middleware;
mod models;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::application::{catalog::CatalogService, format::ImageUrls};

pub use catalog::DEGRADED_HEADER;
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use models::{CacheHealth, CastView, DisplayFields, MovieView, TvShowView};

#[derive(Clone)]
pub struct HttpState {
    pub catalog: Arc<CatalogService>,
    pub images: Arc<ImageUrls>,
}

impl HttpState {
    pub fn new(catalog: Arc<CatalogService>, images: ImageUrls) -> Self {
        Self {
            catalog,
            images: Arc::new(images),
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    let api_routes = Router::new()
        .route("/trending/{media}/{window}", get(catalog::trending))
        .route("/movies/{segment}", get(catalog::movies))
        .route("/movies/{segment}/{related}", get(catalog::movie_related))
        .route("/tv/{segment}", get(catalog::tv))
        .route("/tv/{segment}/{related}", get(catalog::tv_related))
        .route("/search", get(catalog::search))
        .route("/search/{media}", get(catalog::search_media))
        .route("/discover/{media}", get(catalog::discover))
        .route("/genres/{media}", get(catalog::genres));

    Router::new()
        .nest("/api", api_routes)
        .route("/_health/cache", get(health::cache_health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
