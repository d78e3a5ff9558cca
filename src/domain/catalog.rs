//! Catalog vocabulary: media types, listing categories, paging and search.

use std::fmt;
use std::str::FromStr;

use super::error::DomainError;

/// Highest page the metadata API serves.
pub const MAX_PAGE: u32 = 500;

/// Sort order used by discover listings unless one is given.
pub const DEFAULT_DISCOVER_SORT: &str = "popularity.desc";

macro_rules! slug_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $slug:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $slug),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($slug => Ok($name::$variant),)+
                    other => Err(DomainError::unknown($kind, other)),
                }
            }
        }
    };
}

slug_enum! {
    /// Media type segment of trending listings.
    MediaType, "media type" {
        All => "all",
        Movie => "movie",
        Tv => "tv",
    }
}

slug_enum! {
    TimeWindow, "time window" {
        Day => "day",
        Week => "week",
    }
}

slug_enum! {
    /// Curated movie listings.
    MovieList, "movie list" {
        Popular => "popular",
        NowPlaying => "now_playing",
        Upcoming => "upcoming",
        TopRated => "top_rated",
    }
}

slug_enum! {
    /// Curated TV listings.
    TvList, "tv list" {
        Popular => "popular",
        AiringToday => "airing_today",
        OnTheAir => "on_the_air",
        TopRated => "top_rated",
    }
}

impl Default for MediaType {
    fn default() -> Self {
        MediaType::All
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::Day
    }
}

/// 1-based listing page, bounded by [`MAX_PAGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Page(u32);

impl Page {
    pub const FIRST: Page = Page(1);

    pub fn new(page: u32) -> Result<Self, DomainError> {
        if (1..=MAX_PAGE).contains(&page) {
            Ok(Self(page))
        } else {
            Err(DomainError::validation(format!(
                "page must be between 1 and {MAX_PAGE}, got {page}"
            )))
        }
    }

    /// `None` means the first page.
    pub fn from_query(page: Option<u32>) -> Result<Self, DomainError> {
        page.map_or(Ok(Self::FIRST), Self::new)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trimmed, non-empty search text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("search query must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Genre ids for discover listings, rendered comma-separated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreFilter(Vec<u64>);

impl GenreFilter {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Comma-separated ids as sent in a query string; blank items are skipped.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse::<u64>()
                    .map_err(|_| DomainError::validation(format!("invalid genre id `{item}`")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn ids(&self) -> &[u64] {
        &self.0
    }

    pub fn to_param(&self) -> String {
        self.0
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
