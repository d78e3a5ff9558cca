//! Catalog service: typed access to the metadata API.
//!
//! Listings and detail records go through the read-through cache, each with
//! its own fresh/stale windows. Secondary lookups (credits, videos, similar
//! titles, genre lists, discover) go straight to the upstream.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use reelview_api_types::{
    Credits, GenreList, MediaItem, Movie, MovieDetails, Paginated, SearchResult, TvShow,
    TvShowDetails, Videos,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use crate::application::metadata::{MetadataApi, UpstreamError, UpstreamRequest};
use crate::cache::{CacheKey, ReadThrough, ResolveError, ResolveOptions};
use crate::cache_key;
use crate::domain::catalog::{
    DEFAULT_DISCOVER_SORT, GenreFilter, MediaType, MovieList, Page, SearchQuery, TimeWindow,
    TvList,
};
use crate::domain::error::DomainError;

const APPEND_TO_DETAILS: &str = "videos,credits";

const fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

const fn hours(n: u64) -> Duration {
    minutes(n * 60)
}

const fn days(n: u64) -> Duration {
    hours(n * 24)
}

pub const TRENDING_POLICY: ResolveOptions = ResolveOptions::new(minutes(10), hours(1));
pub const DETAILS_POLICY: ResolveOptions = ResolveOptions::new(hours(24), days(7));
pub const SEARCH_POLICY: ResolveOptions = ResolveOptions::new(minutes(5), minutes(15));

/// Fresh/stale windows for a curated movie listing.
pub const fn movie_list_policy(list: MovieList) -> ResolveOptions {
    match list {
        MovieList::Popular => ResolveOptions::new(minutes(30), hours(2)),
        MovieList::NowPlaying => ResolveOptions::new(minutes(15), hours(1)),
        MovieList::Upcoming => ResolveOptions::new(hours(1), hours(4)),
        MovieList::TopRated => ResolveOptions::new(hours(2), hours(6)),
    }
}

/// Fresh/stale windows for a curated TV listing.
pub const fn tv_list_policy(list: TvList) -> ResolveOptions {
    match list {
        TvList::Popular => ResolveOptions::new(minutes(30), hours(2)),
        TvList::AiringToday => ResolveOptions::new(minutes(10), minutes(30)),
        TvList::OnTheAir => ResolveOptions::new(minutes(15), hours(1)),
        TvList::TopRated => ResolveOptions::new(hours(2), hours(6)),
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Cache(#[from] ResolveError),
}

impl CatalogError {
    /// The upstream failure behind this error, whether it was raised
    /// directly or by a cached fetch.
    pub fn upstream(&self) -> Option<&UpstreamError> {
        match self {
            CatalogError::Upstream(err) => Some(err),
            CatalogError::Cache(err) => err.producer_error::<UpstreamError>(),
            CatalogError::Domain(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct CatalogService {
    api: Arc<dyn MetadataApi>,
    cache: Arc<ReadThrough>,
}

impl CatalogService {
    pub fn new(api: Arc<dyn MetadataApi>, cache: Arc<ReadThrough>) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &Arc<ReadThrough> {
        &self.cache
    }

    #[instrument(skip(self))]
    pub async fn trending(
        &self,
        media: MediaType,
        window: TimeWindow,
    ) -> Result<Arc<Paginated<MediaItem>>, CatalogError> {
        let request = UpstreamRequest::new(format!("/trending/{media}/{window}"));
        self.cached(
            cache_key!["trending", media.as_str(), window.as_str()],
            TRENDING_POLICY,
            request,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn movies(
        &self,
        list: MovieList,
        page: Page,
    ) -> Result<Arc<Paginated<Movie>>, CatalogError> {
        let request = UpstreamRequest::new(format!("/movie/{list}")).with_param("page", page);
        self.cached(
            cache_key!["movies", list.as_str(), page.get()],
            movie_list_policy(list),
            request,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn movie_details(&self, id: u64) -> Result<Arc<MovieDetails>, CatalogError> {
        let request = UpstreamRequest::new(format!("/movie/{id}"))
            .with_param("append_to_response", APPEND_TO_DETAILS);
        self.cached(cache_key!["movie", "details", id], DETAILS_POLICY, request)
            .await
    }

    #[instrument(skip(self))]
    pub async fn tv_shows(
        &self,
        list: TvList,
        page: Page,
    ) -> Result<Arc<Paginated<TvShow>>, CatalogError> {
        let request = UpstreamRequest::new(format!("/tv/{list}")).with_param("page", page);
        self.cached(
            cache_key!["tv", list.as_str(), page.get()],
            tv_list_policy(list),
            request,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn tv_details(&self, id: u64) -> Result<Arc<TvShowDetails>, CatalogError> {
        let request = UpstreamRequest::new(format!("/tv/{id}"))
            .with_param("append_to_response", APPEND_TO_DETAILS);
        self.cached(cache_key!["tv", "details", id], DETAILS_POLICY, request)
            .await
    }

    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn search_multi(
        &self,
        query: &SearchQuery,
        page: Page,
    ) -> Result<Arc<Paginated<SearchResult>>, CatalogError> {
        let request = UpstreamRequest::new("/search/multi")
            .with_param("query", query)
            .with_param("page", page);
        self.cached(
            cache_key!["search", "multi", query.as_str(), page.get()],
            SEARCH_POLICY,
            request,
        )
        .await
    }

    pub async fn movie_credits(&self, id: u64) -> Result<Credits, CatalogError> {
        self.direct(UpstreamRequest::new(format!("/movie/{id}/credits")))
            .await
    }

    pub async fn movie_videos(&self, id: u64) -> Result<Videos, CatalogError> {
        self.direct(UpstreamRequest::new(format!("/movie/{id}/videos")))
            .await
    }

    pub async fn similar_movies(&self, id: u64, page: Page) -> Result<Paginated<Movie>, CatalogError> {
        self.direct(UpstreamRequest::new(format!("/movie/{id}/similar")).with_param("page", page))
            .await
    }

    pub async fn tv_credits(&self, id: u64) -> Result<Credits, CatalogError> {
        self.direct(UpstreamRequest::new(format!("/tv/{id}/credits")))
            .await
    }

    pub async fn tv_videos(&self, id: u64) -> Result<Videos, CatalogError> {
        self.direct(UpstreamRequest::new(format!("/tv/{id}/videos")))
            .await
    }

    pub async fn similar_tv_shows(
        &self,
        id: u64,
        page: Page,
    ) -> Result<Paginated<TvShow>, CatalogError> {
        self.direct(UpstreamRequest::new(format!("/tv/{id}/similar")).with_param("page", page))
            .await
    }

    pub async fn search_movies(
        &self,
        query: &SearchQuery,
        page: Page,
    ) -> Result<Paginated<Movie>, CatalogError> {
        self.direct(
            UpstreamRequest::new("/search/movie")
                .with_param("query", query)
                .with_param("page", page),
        )
        .await
    }

    pub async fn search_tv_shows(
        &self,
        query: &SearchQuery,
        page: Page,
    ) -> Result<Paginated<TvShow>, CatalogError> {
        self.direct(
            UpstreamRequest::new("/search/tv")
                .with_param("query", query)
                .with_param("page", page),
        )
        .await
    }

    pub async fn movie_genres(&self) -> Result<GenreList, CatalogError> {
        self.direct(UpstreamRequest::new("/genre/movie/list")).await
    }

    pub async fn tv_genres(&self) -> Result<GenreList, CatalogError> {
        self.direct(UpstreamRequest::new("/genre/tv/list")).await
    }

    /// Movies matching every genre in `genres`; `sort_by` defaults to
    /// popularity, descending.
    pub async fn discover_movies(
        &self,
        genres: &GenreFilter,
        page: Page,
        sort_by: Option<&str>,
    ) -> Result<Paginated<Movie>, CatalogError> {
        self.direct(discover_request("/discover/movie", genres, page, sort_by))
            .await
    }

    pub async fn discover_tv_shows(
        &self,
        genres: &GenreFilter,
        page: Page,
        sort_by: Option<&str>,
    ) -> Result<Paginated<TvShow>, CatalogError> {
        self.direct(discover_request("/discover/tv", genres, page, sort_by))
            .await
    }

    async fn cached<T>(
        &self,
        key: CacheKey,
        policy: ResolveOptions,
        request: UpstreamRequest,
    ) -> Result<Arc<T>, CatalogError>
    where
        T: DeserializeOwned + Any + Send + Sync,
    {
        let api = Arc::clone(&self.api);
        let value = self
            .cache
            .resolve(&key, policy, move || async move {
                fetch_typed::<T>(api.as_ref(), &request).await
            })
            .await?;
        Ok(value)
    }

    async fn direct<T: DeserializeOwned>(&self, request: UpstreamRequest) -> Result<T, CatalogError> {
        Ok(fetch_typed(self.api.as_ref(), &request).await?)
    }
}

fn discover_request(
    path: &str,
    genres: &GenreFilter,
    page: Page,
    sort_by: Option<&str>,
) -> UpstreamRequest {
    UpstreamRequest::new(path)
        .with_param("page", page)
        .with_param("sort_by", sort_by.unwrap_or(DEFAULT_DISCOVER_SORT))
        .with_param("with_genres", genres.to_param())
}

async fn fetch_typed<T: DeserializeOwned>(
    api: &dyn MetadataApi,
    request: &UpstreamRequest,
) -> Result<T, UpstreamError> {
    let document = api.fetch(request).await?;
    serde_json::from_value(document)
        .map_err(|err| UpstreamError::decode(format!("{}: {err}", request.path())))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::{CacheConfig, CacheStore};

    #[derive(Default)]
    struct RecordingApi {
        requests: Mutex<Vec<UpstreamRequest>>,
        fail: bool,
    }

    impl RecordingApi {
        fn requests(&self) -> Vec<UpstreamRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl MetadataApi for RecordingApi {
        async fn fetch(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());
            if self.fail {
                return Err(UpstreamError::status(503, "Service Unavailable"));
            }
            Ok(json!({
                "id": 42,
                "title": "Heat",
                "runtime": 170,
                "page": 1,
                "results": [{ "id": 1, "title": "Heat", "name": "Heat" }],
                "total_pages": 1,
                "total_results": 1
            }))
        }
    }

    fn service(api: Arc<RecordingApi>) -> CatalogService {
        let config = CacheConfig::default();
        let cache = Arc::new(ReadThrough::new(Arc::new(CacheStore::new(&config)), &config));
        CatalogService::new(api, cache)
    }

    #[tokio::test]
    async fn listings_are_cached_per_page() {
        let api = Arc::new(RecordingApi::default());
        let catalog = service(Arc::clone(&api));

        let first = catalog
            .movies(MovieList::NowPlaying, Page::FIRST)
            .await
            .expect("listing");
        assert_eq!(first.results[0].title, "Heat");
        catalog
            .movies(MovieList::NowPlaying, Page::FIRST)
            .await
            .expect("cached listing");
        catalog
            .movies(MovieList::NowPlaying, Page::new(2).expect("page"))
            .await
            .expect("second page");

        let requests = api.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].path(), "/movie/now_playing");
        assert_eq!(requests[1].param("page"), Some("2"));

        let store = catalog.cache().store();
        assert!(store.peek(&cache_key!["movies", "now_playing", 1]).is_some());
        assert!(store.peek(&cache_key!["movies", "now_playing", 2]).is_some());
    }

    #[tokio::test]
    async fn details_expand_videos_and_credits() {
        let api = Arc::new(RecordingApi::default());
        let catalog = service(Arc::clone(&api));

        let details = catalog.movie_details(42).await.expect("details");
        assert_eq!(details.movie.id, 42);
        assert_eq!(details.runtime, Some(170));

        let requests = api.requests();
        assert_eq!(requests[0].path(), "/movie/42");
        assert_eq!(requests[0].param("append_to_response"), Some("videos,credits"));
        assert!(
            catalog
                .cache()
                .store()
                .peek(&cache_key!["movie", "details", 42])
                .is_some()
        );
    }

    #[tokio::test]
    async fn search_key_includes_query_and_page() {
        let api = Arc::new(RecordingApi::default());
        let catalog = service(Arc::clone(&api));
        let query = SearchQuery::parse(" heat ").expect("query");

        catalog
            .search_multi(&query, Page::FIRST)
            .await
            .expect("search");

        assert_eq!(api.requests()[0].param("query"), Some("heat"));
        assert!(
            catalog
                .cache()
                .store()
                .peek(&cache_key!["search", "multi", "heat", 1])
                .is_some()
        );
    }

    #[tokio::test]
    async fn pass_through_lookups_skip_the_cache() {
        let api = Arc::new(RecordingApi::default());
        let catalog = service(Arc::clone(&api));

        catalog.movie_credits(42).await.expect("credits");
        catalog.movie_credits(42).await.expect("credits again");

        assert_eq!(api.requests().len(), 2);
        assert!(catalog.cache().store().is_empty());
    }

    #[tokio::test]
    async fn discover_defaults_to_popularity_sort() {
        let api = Arc::new(RecordingApi::default());
        let catalog = service(Arc::clone(&api));

        catalog
            .discover_tv_shows(&GenreFilter::new([18, 80]), Page::FIRST, None)
            .await
            .expect("discover");

        let request = &api.requests()[0];
        assert_eq!(request.path(), "/discover/tv");
        assert_eq!(request.param("sort_by"), Some("popularity.desc"));
        assert_eq!(request.param("with_genres"), Some("18,80"));
    }

    #[tokio::test]
    async fn upstream_failure_is_reachable_through_cache_error() {
        let api = Arc::new(RecordingApi {
            fail: true,
            ..Default::default()
        });
        let catalog = service(api);

        let err = catalog
            .trending(MediaType::All, TimeWindow::Week)
            .await
            .expect_err("upstream down");

        assert!(matches!(err, CatalogError::Cache(_)));
        assert_eq!(err.upstream().and_then(UpstreamError::status_code), Some(503));
    }

    #[test]
    fn list_policies_follow_update_cadence() {
        assert_eq!(tv_list_policy(TvList::AiringToday).fresh_ttl, minutes(10));
        assert_eq!(tv_list_policy(TvList::AiringToday).stale_ttl, minutes(30));
        assert_eq!(movie_list_policy(MovieList::TopRated).stale_ttl, hours(6));
        assert_eq!(DETAILS_POLICY.stale_ttl, Duration::from_secs(7 * 24 * 3600));
    }
}
