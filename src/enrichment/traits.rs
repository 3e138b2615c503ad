//! Trait definitions for external API clients.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses the real client implementations, while tests
//! can substitute mock implementations.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::coverart::CoverSize;
use super::domain::{CandidateRelease, EnrichmentError, GenreVote, RecordingMatch};
use super::strategy::SearchQuery;
use crate::model::CoverAsset;

/// Remote metadata catalog.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Search releases, preserving catalog relevance order.
    async fn search_releases(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<CandidateRelease>, EnrichmentError>;

    /// Search recordings by artist and title; each carries recording-scope votes.
    async fn search_recordings(
        &self,
        artist: &str,
        title: &str,
        limit: u32,
    ) -> Result<Vec<RecordingMatch>, EnrichmentError>;

    /// Resolve an artist by name and return its artist-scope votes.
    async fn search_artist_votes(
        &self,
        artist: &str,
        limit: u32,
    ) -> Result<Vec<GenreVote>, EnrichmentError>;
}

/// Cover image source.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait CoverArtApi: Send + Sync {
    /// Get the validated front cover for a release.
    async fn get_front_cover(
        &self,
        release_id: &str,
        size: CoverSize,
    ) -> Result<CoverAsset, EnrichmentError>;
}

/// Bound a lookup by `limit`. Running out of time is [`EnrichmentError::Timeout`].
pub async fn bounded<T>(
    limit: Duration,
    lookup: impl Future<Output = Result<T, EnrichmentError>>,
) -> Result<T, EnrichmentError> {
    tokio::time::timeout(limit, lookup)
        .await
        .unwrap_or(Err(EnrichmentError::Timeout))
}

// Implement traits for real clients

#[async_trait]
impl CatalogApi for super::musicbrainz::MusicBrainzClient {
    async fn search_releases(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<CandidateRelease>, EnrichmentError> {
        self.search_releases(query).await
    }

    async fn search_recordings(
        &self,
        artist: &str,
        title: &str,
        limit: u32,
    ) -> Result<Vec<RecordingMatch>, EnrichmentError> {
        self.search_recordings(artist, title, limit).await
    }

    async fn search_artist_votes(
        &self,
        artist: &str,
        limit: u32,
    ) -> Result<Vec<GenreVote>, EnrichmentError> {
        self.search_artist_votes(artist, limit).await
    }
}

#[async_trait]
impl CoverArtApi for super::coverart::CoverArtClient {
    async fn get_front_cover(
        &self,
        release_id: &str,
        size: CoverSize,
    ) -> Result<CoverAsset, EnrichmentError> {
        self.get_front_cover(release_id, size).await
    }
}
