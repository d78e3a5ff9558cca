//! Display helpers for catalog payloads.

use std::time::Duration;

use time::{Date, format_description::FormatItem, macros::format_description};

const RELEASE_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");

/// Image widths published by the image CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    W200,
    W300,
    W400,
    W500,
    W780,
    W1280,
    Original,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::W200 => "w200",
            ImageSize::W300 => "w300",
            ImageSize::W400 => "w400",
            ImageSize::W500 => "w500",
            ImageSize::W780 => "w780",
            ImageSize::W1280 => "w1280",
            ImageSize::Original => "original",
        }
    }
}

/// Builds absolute image URLs from upstream image paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrls {
    base: String,
}

impl ImageUrls {
    pub fn new(base: impl AsRef<str>) -> Self {
        Self {
            base: base.as_ref().trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/{size}{path}`, or `None` for a missing or empty path.
    pub fn image_url(&self, path: Option<&str>, size: ImageSize) -> Option<String> {
        let path = path.filter(|path| !path.is_empty())?;
        Some(format!("{}/{}{}", self.base, size.as_str(), path))
    }

    pub fn poster_url(&self, path: Option<&str>) -> Option<String> {
        self.image_url(path, ImageSize::W500)
    }

    pub fn backdrop_url(&self, path: Option<&str>) -> Option<String> {
        self.image_url(path, ImageSize::W1280)
    }

    pub fn profile_url(&self, path: Option<&str>) -> Option<String> {
        self.image_url(path, ImageSize::W200)
    }
}

pub fn format_rating(rating: f64) -> String {
    format!("{rating:.1}")
}

/// `"2h 5m"` for two hours and five minutes, `"45m"` under an hour, empty
/// when unknown.
pub fn format_runtime(minutes: Option<u32>) -> String {
    match minutes {
        None | Some(0) => String::new(),
        Some(minutes) if minutes < 60 => format!("{minutes}m"),
        Some(minutes) => format!("{}h {}m", minutes / 60, minutes % 60),
    }
}

/// `"2024-03-05"` becomes `"March 5, 2024"`; empty or malformed dates
/// render as an empty string.
pub fn format_date(raw: &str) -> String {
    Date::parse(raw.trim(), RELEASE_DATE_FORMAT)
        .ok()
        .and_then(|date| date.format(HUMAN_DATE_FORMAT).ok())
        .unwrap_or_default()
}

/// Shared-cache friendly `Cache-Control` value; stale responses may be
/// served for twice `max_age` while revalidating.
pub fn cache_control_header(max_age: Duration) -> String {
    let seconds = max_age.as_secs();
    format!(
        "public, max-age={seconds}, s-maxage={seconds}, stale-while-revalidate={}",
        seconds.saturating_mul(2)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_urls_use_fixed_widths() {
        let urls = ImageUrls::new("https://image.example.test/t/p/");
        assert_eq!(
            urls.poster_url(Some("/abc.jpg")).as_deref(),
            Some("https://image.example.test/t/p/w500/abc.jpg")
        );
        assert_eq!(
            urls.backdrop_url(Some("/abc.jpg")).as_deref(),
            Some("https://image.example.test/t/p/w1280/abc.jpg")
        );
        assert_eq!(
            urls.profile_url(Some("/p.jpg")).as_deref(),
            Some("https://image.example.test/t/p/w200/p.jpg")
        );
        assert_eq!(
            urls.image_url(Some("/o.png"), ImageSize::Original).as_deref(),
            Some("https://image.example.test/t/p/original/o.png")
        );
    }

    #[test]
    fn missing_image_path_yields_none() {
        let urls = ImageUrls::new("https://image.example.test/t/p");
        assert!(urls.poster_url(None).is_none());
        assert!(urls.poster_url(Some("")).is_none());
    }

    #[test]
    fn rating_has_one_decimal() {
        assert_eq!(format_rating(7.26), "7.3");
        assert_eq!(format_rating(6.04), "6.0");
        assert_eq!(format_rating(8.0), "8.0");
    }

    #[test]
    fn runtime_formatting() {
        assert_eq!(format_runtime(Some(125)), "2h 5m");
        assert_eq!(format_runtime(Some(120)), "2h 0m");
        assert_eq!(format_runtime(Some(45)), "45m");
        assert_eq!(format_runtime(Some(0)), "");
        assert_eq!(format_runtime(None), "");
    }

    #[test]
    fn release_dates_are_spelled_out() {
        assert_eq!(format_date("2024-03-05"), "March 5, 2024");
        assert_eq!(format_date("1999-10-15"), "October 15, 1999");
        assert_eq!(format_date(""), "");
        assert_eq!(format_date("2024-13-01"), "");
        assert_eq!(format_date("soon"), "");
    }

    #[test]
    fn cache_control_doubles_stale_window() {
        assert_eq!(
            cache_control_header(Duration::from_secs(600)),
            "public, max-age=600, s-maxage=600, stale-while-revalidate=1200"
        );
    }
}
