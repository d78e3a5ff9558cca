//! Cache key construction.
//!
//! Keys are built from an ordered list of parts joined with [`KEY_SEPARATOR`].
//! Falsy parts (absent, empty text, numeric zero) are dropped; the remaining
//! parts keep their relative order, so `["movie", "details", 42]` and
//! `["movie", "details", 42, None]` produce the same key.

use std::fmt;

/// Separator placed between key parts.
pub const KEY_SEPARATOR: char = ':';

/// A single component of a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    Text(String),
    Number(i64),
    Absent,
}

impl KeyPart {
    fn render(&self) -> Option<String> {
        match self {
            KeyPart::Text(text) if text.is_empty() => None,
            KeyPart::Text(text) => Some(text.clone()),
            KeyPart::Number(0) => None,
            KeyPart::Number(number) => Some(number.to_string()),
            KeyPart::Absent => None,
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Text(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Text(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::Text(value.clone())
    }
}

macro_rules! impl_number_part {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for KeyPart {
                fn from(value: $ty) -> Self {
                    KeyPart::Number(i64::from(value))
                }
            }
        )*
    };
}

impl_number_part!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(number) => KeyPart::Number(number),
            Err(_) => KeyPart::Text(value.to_string()),
        }
    }
}

impl From<usize> for KeyPart {
    fn from(value: usize) -> Self {
        KeyPart::from(value as u64)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyPart::Absent, Into::into)
    }
}

/// Deterministic identifier of a cached resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build a cache key from its parts.
///
/// All parts absent yields an empty key, which is valid but best avoided.
pub fn build_key<I, P>(parts: I) -> CacheKey
where
    I: IntoIterator<Item = P>,
    P: Into<KeyPart>,
{
    let mut key = String::new();
    for rendered in parts.into_iter().filter_map(|part| part.into().render()) {
        if !key.is_empty() {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(&rendered);
    }
    CacheKey(key)
}

/// Build a [`CacheKey`] from heterogeneous parts.
///
/// ```
/// use reelview::cache_key;
///
/// let key = cache_key!["movie", "details", 42];
/// assert_eq!(key.as_str(), "movie:details:42");
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($part:expr),* $(,)?) => {
        $crate::cache::build_key::<_, $crate::cache::KeyPart>([
            $($crate::cache::KeyPart::from($part)),*
        ])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_absent_part_does_not_change_key() {
        let with_absent = cache_key!["movie", "details", 42, None::<&str>];
        let without = cache_key!["movie", "details", 42];
        assert_eq!(with_absent, without);
        assert_eq!(without.as_str(), "movie:details:42");
    }

    #[test]
    fn different_numbers_produce_different_keys() {
        assert_ne!(cache_key!["a", 1], cache_key!["a", 2]);
    }

    #[test]
    fn empty_parts_are_dropped_in_the_middle() {
        let key = cache_key!["search", "", "multi", None::<u32>, "dune", 1];
        assert_eq!(key.as_str(), "search:multi:dune:1");
    }

    #[test]
    fn zero_is_dropped_like_other_falsy_parts() {
        assert_eq!(cache_key!["page", 0], cache_key!["page"]);
        assert_eq!(cache_key!["movies", "popular", 0_u32].as_str(), "movies:popular");
        assert_eq!(cache_key!["a", 0, "b", -1].as_str(), "a:b:-1");
    }

    #[test]
    fn all_absent_yields_empty_key() {
        let key = build_key([KeyPart::Absent, KeyPart::Text(String::new())]);
        assert!(key.is_empty());
    }

    #[test]
    fn order_is_preserved() {
        assert_ne!(cache_key!["tv", "popular"], cache_key!["popular", "tv"]);
    }

    #[test]
    fn large_unsigned_values_render_exactly() {
        assert_eq!(
            cache_key!["id", u64::MAX].as_str(),
            format!("id:{}", u64::MAX)
        );
    }
}
