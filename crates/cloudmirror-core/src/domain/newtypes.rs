//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the values that let an
//! object be matched across the local tree, the flat blob store and the
//! hierarchical index. Each newtype ensures data validity at construction time.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::errors::DomainError;

// ============================================================================
// Content hash
// ============================================================================

/// SHA-1 content digest rendered as 40 uppercase hex digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Number of hex digits in a rendered digest (160 bits)
    pub const LEN: usize = 40;

    /// Compute the digest of a byte slice
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self(hex::encode(Sha1::digest(data)).to_uppercase())
    }

    /// Create a ContentHash from its textual form
    ///
    /// Lowercase digits are accepted and normalized to uppercase.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidHash` if the string is not 40 hex digits
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.len() != Self::LEN {
            return Err(DomainError::InvalidHash(format!(
                "expected {} hex digits, got {}: {hash}",
                Self::LEN,
                hash.len()
            )));
        }

        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "Hash is not hexadecimal: {hash}"
            )));
        }

        Ok(Self(hash.to_ascii_uppercase()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// Identity key
// ============================================================================

/// Cross-source object identity: a name plus a content hash
///
/// The blob store is flat and case-insensitive, which makes its naming rule
/// the strictest of the three sources. Keys therefore compare names without
/// regard to case and hashes exactly. The textual form is `{hash}_{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey {
    name: String,
    hash: ContentHash,
}

impl ObjectKey {
    /// Separator between the hash and the name in the textual form
    pub const SEPARATOR: char = '_';

    /// Create a key from its two components
    #[must_use]
    pub fn new(name: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            name: name.into(),
            hash,
        }
    }

    /// Parse a combined `{hash}_{name}` string
    ///
    /// # Errors
    /// Returns `DomainError::MalformedKey` if there is no separator or the
    /// part before it is not a valid content hash
    pub fn parse(combined: &str) -> Result<Self, DomainError> {
        let (hash, name) = combined
            .split_once(Self::SEPARATOR)
            .ok_or_else(|| DomainError::MalformedKey(combined.to_string()))?;

        let hash = ContentHash::new(hash.to_string())
            .map_err(|e| DomainError::MalformedKey(format!("{combined}: {e}")))?;

        Ok(Self::new(name, hash))
    }

    /// The object name, with its original case
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The content hash
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Name folded for case-insensitive comparison, without allocating
    fn folded_name(&self) -> impl Iterator<Item = char> + '_ {
        self.name.chars().flat_map(char::to_lowercase)
    }
}

impl PartialEq for ObjectKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.folded_name().eq(other.folded_name())
    }
}

impl Eq for ObjectKey {}

// Hash must agree with the case-insensitive equality above.
impl Hash for ObjectKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
        for c in self.folded_name() {
            c.hash(state);
        }
        state.write_u8(0xff);
    }
}

impl PartialOrd for ObjectKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash
            .cmp(&other.hash)
            .then_with(|| self.folded_name().cmp(other.folded_name()))
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.hash, Self::SEPARATOR, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.to_string()
    }
}

// ============================================================================
// Locator
// ============================================================================

/// Opaque retrieval handle returned when an object is published
///
/// Published locators have the shape `{base}/ugc/{handle}/{HASH}/`, which
/// lets the content hash be recovered later. The dry-run sentinel
/// [`Locator::undefined`] stands in for objects that were never published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    const UNDEFINED: &'static str = "undefined";
    const UGC_SEGMENT: &'static str = "/ugc/";

    /// Wrap an existing locator string
    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// The placeholder recorded for dry-run uploads
    #[must_use]
    pub fn undefined() -> Self {
        Self(Self::UNDEFINED.to_string())
    }

    /// Render a published locator
    #[must_use]
    pub fn published(base_url: &str, handle: u64, hash: &ContentHash) -> Self {
        Self(format!(
            "{}{}{handle}/{hash}/",
            base_url.trim_end_matches('/'),
            Self::UGC_SEGMENT
        ))
    }

    /// Whether this is the dry-run sentinel
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        self.0 == Self::UNDEFINED
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the numeric handle of a published locator
    #[must_use]
    pub fn handle(&self) -> Option<u64> {
        let (handle, _) = self.ugc_parts()?;
        handle.parse().ok()
    }

    /// Recover the content hash embedded in a published locator
    #[must_use]
    pub fn content_hash(&self) -> Option<ContentHash> {
        let (_, hash) = self.ugc_parts()?;
        ContentHash::new(hash.to_string()).ok()
    }

    /// Split `.../ugc/{handle}/{hash}/` into its two components
    fn ugc_parts(&self) -> Option<(&str, &str)> {
        let start = self.0.find(Self::UGC_SEGMENT)? + Self::UGC_SEGMENT.len();
        let mut parts = self.0[start..].splitn(3, '/');
        let handle = parts.next()?;
        let hash = parts.next()?;
        // A trailing separator must follow the hash.
        parts.next()?;

        if handle.is_empty() || !handle.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some((handle, hash))
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
