//! Internal domain models for catalog lookups.
//!
//! These types are OUR types - they don't change when external APIs change.
//! All external API responses get converted into these types via adapters.

use std::fmt;

/// A release (album) returned by a catalog search, in relevance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRelease {
    /// Opaque catalog release identifier (MusicBrainz release MBID)
    pub id: String,
    pub artist: Option<String>,
    pub title: String,
    /// Album name (release group title when available)
    pub album: Option<String>,
}

/// Granularity a genre vote applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteScope {
    Recording,
    Artist,
}

impl fmt::Display for VoteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recording => f.write_str("recording"),
            Self::Artist => f.write_str("artist"),
        }
    }
}

/// A genre label with its popularity count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreVote {
    pub label: String,
    pub count: i64,
    pub scope: VoteScope,
}

/// A recording returned by a catalog search, with its recording-scope votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingMatch {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub votes: Vec<GenreVote>,
    /// First release the recording appears on
    pub release: Option<CandidateRelease>,
}

/// An artist returned by a catalog name search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistMatch {
    pub id: String,
    pub name: String,
}

/// Errors that can occur during catalog lookups and cover downloads.
///
/// None of these fail a file: callers log them and treat the lookup as
/// "no result".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API request failed: {0}")]
    Api(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Unexpected catalog response: {0}")]
    Protocol(String),

    #[error("No matches found")]
    NoMatches,

    #[error("Rate limited - try again later")]
    RateLimited,
}

impl EnrichmentError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Protocol(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
