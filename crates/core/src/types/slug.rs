//! Store slug type and URL path resolution.
//!
//! Every tenant is addressed by a slug that appears as the first segment of
//! storefront URLs (`/acme-coffee/products/42`). All cart and catalog calls are
//! keyed off the slug.

use core::fmt;

use serde::{Deserialize, Serialize};

/// First path segments that belong to the application itself rather than a store.
pub const RESERVED_SEGMENTS: &[&str] = &["api", "auth", "store-management", "assets"];

/// Errors that can occur when parsing a [`StoreSlug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreSlugError {
    /// The input string is empty.
    #[error("store slug cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("store slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9-]`.
    #[error("store slug contains invalid character {0:?}")]
    InvalidCharacter(char),
    /// The input starts or ends with a hyphen.
    #[error("store slug cannot start or end with '-'")]
    EdgeHyphen,
    /// The slug collides with an application route.
    #[error("store slug {0:?} is reserved")]
    Reserved(String),
}

/// A validated tenant identifier.
///
/// ## Constraints
///
/// - Length: 1-64 characters
/// - Lowercase ASCII letters, digits and `-` only
/// - No leading or trailing `-`
/// - Not one of [`RESERVED_SEGMENTS`]
///
/// ## Examples
///
/// ```
/// use bazaar_core::StoreSlug;
///
/// assert!(StoreSlug::parse("acme-coffee").is_ok());
/// assert!(StoreSlug::parse("Acme").is_err());
/// assert!(StoreSlug::parse("-acme").is_err());
/// assert!(StoreSlug::parse("api").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreSlug(String);

impl StoreSlug {
    /// Maximum length of a slug.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `StoreSlug` from a string.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreSlugError`] describing the first constraint violated.
    pub fn parse(s: &str) -> Result<Self, StoreSlugError> {
        if s.is_empty() {
            return Err(StoreSlugError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(StoreSlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(StoreSlugError::InvalidCharacter(c));
        }

        if s.starts_with('-') || s.ends_with('-') {
            return Err(StoreSlugError::EdgeHyphen);
        }

        if RESERVED_SEGMENTS.contains(&s) {
            return Err(StoreSlugError::Reserved(s.to_owned()));
        }

        Ok(Self(s.to_owned()))
    }

    /// Resolve the store slug addressed by a URL path.
    ///
    /// Only the first non-empty segment is considered; query strings and
    /// fragments are ignored. Paths whose first segment is reserved or not a
    /// valid slug resolve to `None`.
    ///
    /// ```
    /// use bazaar_core::StoreSlug;
    ///
    /// let slug = StoreSlug::from_path("/acme-coffee/products/42?ref=home");
    /// assert_eq!(slug.as_ref().map(StoreSlug::as_str), Some("acme-coffee"));
    /// assert_eq!(StoreSlug::from_path("/auth/login"), None);
    /// assert_eq!(StoreSlug::from_path("/"), None);
    /// ```
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        first_segment(path).and_then(|segment| Self::parse(segment).ok())
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// First non-empty segment of a URL path, ignoring query and fragment.
#[must_use]
pub fn first_segment(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').find(|segment| !segment.is_empty())
}

impl fmt::Display for StoreSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for StoreSlug {
    type Err = StoreSlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StoreSlug {
    type Error = StoreSlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StoreSlug> for String {
    fn from(slug: StoreSlug) -> Self {
        slug.0
    }
}

impl AsRef<str> for StoreSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
