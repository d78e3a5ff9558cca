//! JSON views returned by the catalog endpoints.

use reelview_api_types::{Credit, MovieDetails, TvShowDetails};
use serde::Serialize;

use crate::application::format::{ImageUrls, format_date, format_rating, format_runtime};

const TOP_CAST: usize = 10;

/// Display fields shared by movie and show detail views.
#[derive(Debug, Serialize)]
pub struct DisplayFields {
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub rating: String,
    pub runtime: String,
    pub release_date: String,
    pub cast: Vec<CastView>,
}

#[derive(Debug, Serialize)]
pub struct CastView {
    pub id: u64,
    pub name: String,
    pub character: Option<String>,
    pub profile_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MovieView<'a> {
    #[serde(flatten)]
    pub details: &'a MovieDetails,
    pub display: DisplayFields,
}

#[derive(Debug, Serialize)]
pub struct TvShowView<'a> {
    #[serde(flatten)]
    pub details: &'a TvShowDetails,
    pub display: DisplayFields,
}

impl<'a> MovieView<'a> {
    pub fn new(details: &'a MovieDetails, images: &ImageUrls) -> Self {
        let movie = &details.movie;
        let cast = details
            .credits
            .as_ref()
            .map(|credits| cast_views(&credits.cast, images))
            .unwrap_or_default();

        Self {
            details,
            display: DisplayFields {
                poster_url: images.poster_url(movie.poster_path.as_deref()),
                backdrop_url: images.backdrop_url(movie.backdrop_path.as_deref()),
                rating: format_rating(movie.vote_average),
                runtime: format_runtime(details.runtime),
                release_date: format_date(&movie.release_date),
                cast,
            },
        }
    }
}

impl<'a> TvShowView<'a> {
    pub fn new(details: &'a TvShowDetails, images: &ImageUrls) -> Self {
        let show = &details.show;
        let cast = details
            .credits
            .as_ref()
            .map(|credits| cast_views(&credits.cast, images))
            .unwrap_or_default();

        Self {
            details,
            display: DisplayFields {
                poster_url: images.poster_url(show.poster_path.as_deref()),
                backdrop_url: images.backdrop_url(show.backdrop_path.as_deref()),
                rating: format_rating(show.vote_average),
                // Episode length stands in for runtime.
                runtime: format_runtime(details.episode_run_time.first().copied()),
                release_date: format_date(&show.first_air_date),
                cast,
            },
        }
    }
}

fn cast_views(cast: &[Credit], images: &ImageUrls) -> Vec<CastView> {
    cast.iter()
        .take(TOP_CAST)
        .map(|member| CastView {
            id: member.id,
            name: member.name.clone(),
            character: member.character.clone(),
            profile_url: images.profile_url(member.profile_path.as_deref()),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub enabled: bool,
    pub entries: usize,
    pub capacity: usize,
    pub in_flight: usize,
}
