use std::{sync::Arc, time::Duration};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use reelview_api_types::Paginated;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    application::{
        catalog::{
            CatalogError, DETAILS_POLICY, SEARCH_POLICY, TRENDING_POLICY, movie_list_policy,
            tv_list_policy,
        },
        error::HttpError,
        format::cache_control_header,
    },
    domain::catalog::{GenreFilter, MediaType, MovieList, Page, SearchQuery, TimeWindow, TvList},
};

use super::{
    HttpState,
    models::{MovieView, TvShowView},
};

pub const DEGRADED_HEADER: HeaderName = HeaderName::from_static("x-reelview-degraded");

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SearchParams {
    q: Option<String>,
    page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct DiscoverParams {
    with_genres: Option<String>,
    sort_by: Option<String>,
    page: Option<u32>,
}

pub(super) async fn trending(
    State(state): State<HttpState>,
    Path((media, window)): Path<(String, String)>,
) -> Response {
    let media = match media.parse::<MediaType>() {
        Ok(media) => media,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let window = match window.parse::<TimeWindow>() {
        Ok(window) => window,
        Err(err) => return HttpError::from(err).into_response(),
    };

    listing_response(
        "trending",
        state.catalog.trending(media, window).await,
        TRENDING_POLICY.fresh_ttl,
    )
}

/// `/api/movies/{segment}`: a numeric segment is a movie id, anything else a
/// list name.
pub(super) async fn movies(
    State(state): State<HttpState>,
    Path(segment): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Ok(id) = segment.parse::<u64>() {
        return match state.catalog.movie_details(id).await {
            Ok(details) => cached_json(
                &MovieView::new(&details, &state.images),
                DETAILS_POLICY.fresh_ttl,
            ),
            Err(err) => HttpError::from(err).into_response(),
        };
    }

    let (list, page) = match (segment.parse::<MovieList>(), Page::from_query(query.page)) {
        (Ok(list), Ok(page)) => (list, page),
        (Err(err), _) | (_, Err(err)) => return HttpError::from(err).into_response(),
    };

    listing_response(
        "movies",
        state.catalog.movies(list, page).await,
        movie_list_policy(list).fresh_ttl,
    )
}

/// `/api/tv/{segment}`: a numeric segment is a show id, anything else a list
/// name.
pub(super) async fn tv(
    State(state): State<HttpState>,
    Path(segment): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Ok(id) = segment.parse::<u64>() {
        return match state.catalog.tv_details(id).await {
            Ok(details) => cached_json(
                &TvShowView::new(&details, &state.images),
                DETAILS_POLICY.fresh_ttl,
            ),
            Err(err) => HttpError::from(err).into_response(),
        };
    }

    let (list, page) = match (segment.parse::<TvList>(), Page::from_query(query.page)) {
        (Ok(list), Ok(page)) => (list, page),
        (Err(err), _) | (_, Err(err)) => return HttpError::from(err).into_response(),
    };

    listing_response(
        "tv",
        state.catalog.tv_shows(list, page).await,
        tv_list_policy(list).fresh_ttl,
    )
}

pub(super) async fn search(
    State(state): State<HttpState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = match SearchQuery::parse(params.q.as_deref().unwrap_or_default()) {
        Ok(query) => query,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let page = match Page::from_query(params.page) {
        Ok(page) => page,
        Err(err) => return HttpError::from(err).into_response(),
    };

    listing_response(
        "search",
        state.catalog.search_multi(&query, page).await,
        SEARCH_POLICY.fresh_ttl,
    )
}

/// `/api/search/{media}`: search restricted to movies or shows.
pub(super) async fn search_media(
    State(state): State<HttpState>,
    Path(media): Path<String>,
    Query(params): Query<SearchParams>,
) -> Response {
    let media = match single_media(&media, "infra::http::catalog::search_media") {
        Ok(media) => media,
        Err(response) => return response,
    };
    let query = match SearchQuery::parse(params.q.as_deref().unwrap_or_default()) {
        Ok(query) => query,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let page = match Page::from_query(params.page) {
        Ok(page) => page,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let ttl = SEARCH_POLICY.fresh_ttl;
    match media {
        MediaType::Movie => listing_response(
            "search_movies",
            state.catalog.search_movies(&query, page).await.map(Arc::new),
            ttl,
        ),
        _ => listing_response(
            "search_tv",
            state.catalog.search_tv_shows(&query, page).await.map(Arc::new),
            ttl,
        ),
    }
}

/// `/api/movies/{id}/{credits|videos|similar}`.
pub(super) async fn movie_related(
    State(state): State<HttpState>,
    Path((segment, related)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Response {
    let id = match media_id(&segment) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let catalog = &state.catalog;
    match related.as_str() {
        "credits" => detail_json(catalog.movie_credits(id).await),
        "videos" => detail_json(catalog.movie_videos(id).await),
        "similar" => match Page::from_query(query.page) {
            Ok(page) => listing_response(
                "similar_movies",
                catalog.similar_movies(id, page).await.map(Arc::new),
                DETAILS_POLICY.fresh_ttl,
            ),
            Err(err) => HttpError::from(err).into_response(),
        },
        other => unknown_related(other),
    }
}

/// `/api/tv/{id}/{credits|videos|similar}`.
pub(super) async fn tv_related(
    State(state): State<HttpState>,
    Path((segment, related)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Response {
    let id = match media_id(&segment) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let catalog = &state.catalog;
    match related.as_str() {
        "credits" => detail_json(catalog.tv_credits(id).await),
        "videos" => detail_json(catalog.tv_videos(id).await),
        "similar" => match Page::from_query(query.page) {
            Ok(page) => listing_response(
                "similar_tv",
                catalog.similar_tv_shows(id, page).await.map(Arc::new),
                DETAILS_POLICY.fresh_ttl,
            ),
            Err(err) => HttpError::from(err).into_response(),
        },
        other => unknown_related(other),
    }
}

/// `/api/discover/{media}?with_genres=28,12&sort_by=&page=`.
pub(super) async fn discover(
    State(state): State<HttpState>,
    Path(media): Path<String>,
    Query(params): Query<DiscoverParams>,
) -> Response {
    let media = match single_media(&media, "infra::http::catalog::discover") {
        Ok(media) => media,
        Err(response) => return response,
    };
    let genres = match GenreFilter::parse(params.with_genres.as_deref().unwrap_or_default()) {
        Ok(genres) => genres,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let page = match Page::from_query(params.page) {
        Ok(page) => page,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let sort_by = params.sort_by.as_deref().filter(|sort| !sort.is_empty());
    let ttl = SEARCH_POLICY.fresh_ttl;
    match media {
        MediaType::Movie => listing_response(
            "discover_movies",
            state.catalog.discover_movies(&genres, page, sort_by).await.map(Arc::new),
            ttl,
        ),
        _ => listing_response(
            "discover_tv",
            state.catalog.discover_tv_shows(&genres, page, sort_by).await.map(Arc::new),
            ttl,
        ),
    }
}

pub(super) async fn genres(
    State(state): State<HttpState>,
    Path(media): Path<String>,
) -> Response {
    let result = match single_media(&media, "infra::http::catalog::genres") {
        Ok(MediaType::Movie) => state.catalog.movie_genres().await,
        Ok(_) => state.catalog.tv_genres().await,
        Err(response) => return response,
    };

    match result {
        Ok(genres) => Json(genres).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// `movie` or `tv`; `all` has no per-type endpoint upstream.
fn single_media(raw: &str, source: &'static str) -> Result<MediaType, Response> {
    match raw.parse::<MediaType>() {
        Ok(MediaType::All) => Err(HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Request could not be processed",
            "expected `movie` or `tv`",
        )
        .into_response()),
        Ok(media) => Ok(media),
        Err(err) => Err(HttpError::from(err).into_response()),
    }
}

fn media_id(segment: &str) -> Result<u64, Response> {
    segment.parse::<u64>().map_err(|_| {
        HttpError::new(
            "infra::http::catalog::media_id",
            StatusCode::BAD_REQUEST,
            "Request could not be processed",
            format!("`{segment}` is not a numeric id"),
        )
        .into_response()
    })
}

fn unknown_related(related: &str) -> Response {
    HttpError::new(
        "infra::http::catalog::related",
        StatusCode::NOT_FOUND,
        "Not found",
        format!("no `{related}` lookup"),
    )
    .into_response()
}

/// Uncached sub-resources fail with a 502 like details do.
fn detail_json<T: Serialize>(result: Result<T, CatalogError>) -> Response {
    match result {
        Ok(body) => cached_json(&body, DETAILS_POLICY.fresh_ttl),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Listings never fail the page: upstream trouble yields an empty envelope
/// flagged with the degraded header. Invalid input is still a 400.
fn listing_response<T: Serialize>(
    listing: &'static str,
    result: Result<Arc<Paginated<T>>, CatalogError>,
    max_age: Duration,
) -> Response {
    match result {
        Ok(page) => cached_json(page.as_ref(), max_age),
        Err(CatalogError::Domain(err)) => HttpError::from(err).into_response(),
        Err(err) => {
            warn!(
                target = "reelview::http::catalog",
                listing,
                error = %err,
                "serving empty listing after catalog failure"
            );
            let mut response = Json(Paginated::<T>::empty()).into_response();
            let headers = response.headers_mut();
            headers.insert(DEGRADED_HEADER, HeaderValue::from_static("1"));
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
    }
}

fn cached_json<T: Serialize + ?Sized>(body: &T, max_age: Duration) -> Response {
    let mut response = Json(body).into_response();
    let header = cache_control_header(max_age);
    if let Ok(value) = HeaderValue::from_str(&header) {
        response.headers_mut().insert(CACHE_CONTROL, value);
    }
    response
}
