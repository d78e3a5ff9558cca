use axum::{Json, extract::State, http::header::CACHE_CONTROL, response::IntoResponse};

use super::{HttpState, models::CacheHealth};

pub(super) async fn cache_health(State(state): State<HttpState>) -> impl IntoResponse {
    let cache = state.catalog.cache();
    let store = cache.store();
    let body = CacheHealth {
        enabled: cache.is_enabled(),
        entries: store.size(),
        capacity: store.capacity(),
        in_flight: cache.in_flight(),
    };
    ([(CACHE_CONTROL, "no-store")], Json(body))
}
