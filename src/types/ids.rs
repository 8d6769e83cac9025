//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different identifiers (e.g. using
//! an artifact name where a commit id is expected) and make the code more
//! self-documenting.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string is not a valid commit id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid commit id: {0:?}")]
pub struct InvalidCommitId(pub String);

/// A git commit identifier (hex object name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Creates a new `CommitId` from a string without validation.
    ///
    /// Use [`CommitId::parse`] for untrusted input.
    pub fn new(s: impl Into<String>) -> Self {
        CommitId(s.into())
    }

    /// Parses and validates a commit id: 4 to 40 lowercase hex characters.
    ///
    /// Abbreviated ids are accepted because webhook payloads and operator
    /// backfills may carry them; git resolves them against the mirror.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidCommitId> {
        let s = s.into();
        let valid = (4..=40).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit());
        if valid { Ok(CommitId(s)) } else { Err(InvalidCommitId(s)) }
    }

    /// Returns the commit id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short (7-character) version for display.
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        CommitId(s.to_string())
    }
}

/// Stable identifier for one derived screenshot.
///
/// Derived from an exercise's source path: the file name minus directory and
/// extension. `exercises/addition.html` becomes `addition`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Creates an `ArtifactId` directly from a name. Intended for tests and
    /// for callers that already hold a derived name.
    pub fn new(s: impl Into<String>) -> Self {
        ArtifactId(s.into())
    }

    /// Derives the artifact id from a source file path.
    ///
    /// Returns `None` when the path has no file stem (e.g. a bare directory
    /// path). Exercise sources live flat in one directory, so the stem is
    /// unique per source file.
    pub fn from_source_path(path: &str) -> Option<Self> {
        let stem = Path::new(path).file_stem()?.to_str()?;
        if stem.is_empty() {
            return None;
        }
        Some(ArtifactId(stem.to_string()))
    }

    /// Returns the artifact name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
