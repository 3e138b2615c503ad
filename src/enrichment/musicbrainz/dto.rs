//! MusicBrainz API Data Transfer Objects
//!
//! These types match EXACTLY what the MusicBrainz search and lookup
//! endpoints return with `fmt=json`.
//! DO NOT use these types outside the musicbrainz module - convert to domain types.
//!
//! API Reference: https://musicbrainz.org/doc/MusicBrainz_API/Search

use serde::{Deserialize, Serialize};

/// `GET /release?query=...`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseSearchResponse {
    pub count: Option<u32>,
    pub offset: Option<u32>,
    pub releases: Vec<Release>,
}

/// `GET /recording?query=...`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordingSearchResponse {
    pub count: Option<u32>,
    pub offset: Option<u32>,
    pub recordings: Vec<Recording>,
}

/// `GET /artist?query=...`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistSearchResponse {
    pub count: Option<u32>,
    pub offset: Option<u32>,
    pub artists: Vec<Artist>,
}

/// Release (album/single/EP) as returned by release search
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Release {
    /// MusicBrainz release ID
    pub id: String,
    /// Search relevance (0-100)
    pub score: Option<u32>,
    pub title: String,
    /// Release status (Official, Bootleg, etc.)
    pub status: Option<String>,
    /// Release date (YYYY, YYYY-MM, or YYYY-MM-DD)
    pub date: Option<String>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    pub release_group: Option<ReleaseGroup>,
}

/// Release group (e.g., "Abbey Road" across all editions)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseGroup {
    pub id: String,
    pub title: Option<String>,
    /// Primary type (Album, Single, EP, etc.)
    pub primary_type: Option<String>,
}

/// Recording as returned by recording search
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Recording {
    pub id: String,
    pub score: Option<u32>,
    pub title: String,
    /// Duration in milliseconds
    pub length: Option<u64>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    /// Folksonomy tags; genres live here
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Releases this recording appears on
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// Artist credit (can be multiple for collaborations)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistCredit {
    pub artist: ArtistRef,
    /// How this artist is credited (may differ from official name)
    pub name: Option<String>,
    /// Join phrase (e.g., " & ", " feat. ")
    pub joinphrase: Option<String>,
}

/// Artist reference inside an artist credit
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
    pub sort_name: Option<String>,
}

/// Artist from search or `GET /artist/{id}?inc=tags`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub sort_name: Option<String>,
    pub score: Option<u32>,
    /// Artist type (Person, Group, etc.)
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A folksonomy tag with its vote count
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tag {
    pub count: i64,
    pub name: String,
}

/// Error response from MusicBrainz API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: String,
    pub help: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// If these fail, the API has changed and we need to update our DTOs.
// ============================================================================
