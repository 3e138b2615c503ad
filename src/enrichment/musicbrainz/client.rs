//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz web service search endpoints.
//! See: https://musicbrainz.org/doc/MusicBrainz_API/Search
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header identifying the client.
//! It comes from [`CatalogConfig`], never from global state.

use std::time::Duration;

use serde::de::DeserializeOwned;

use super::{adapter, dto};
use crate::config::CatalogConfig;
use crate::enrichment::domain::{
    ArtistMatch, CandidateRelease, EnrichmentError, GenreVote, RecordingMatch,
};
use crate::enrichment::strategy::SearchQuery;

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MusicBrainzClient {
    /// Create a client from the catalog configuration
    pub fn new(config: &CatalogConfig) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client for testing with custom base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Search releases; candidates come back in relevance order
    pub async fn search_releases(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<CandidateRelease>, EnrichmentError> {
        let url = self.search_url("release", &release_query(query), query.limit());
        let response: dto::ReleaseSearchResponse = self.get_json(&url).await?;
        Ok(adapter::to_candidates(response))
    }

    /// Search recordings by artist and title, with their tags and releases
    pub async fn search_recordings(
        &self,
        artist: &str,
        title: &str,
        limit: u32,
    ) -> Result<Vec<RecordingMatch>, EnrichmentError> {
        let query = format!("artist:{} AND recording:{}", phrase(artist), phrase(title));
        let url = self.search_url("recording", &query, limit);
        let response: dto::RecordingSearchResponse = self.get_json(&url).await?;
        Ok(adapter::to_recordings(response))
    }

    /// Search artists by name
    pub async fn search_artists(
        &self,
        artist: &str,
        limit: u32,
    ) -> Result<Vec<ArtistMatch>, EnrichmentError> {
        let query = format!("artist:{}", phrase(artist));
        let url = self.search_url("artist", &query, limit);
        let response: dto::ArtistSearchResponse = self.get_json(&url).await?;
        Ok(adapter::to_artist_matches(response))
    }

    /// Look up an artist by MBID and return its tag votes
    pub async fn artist_tags(&self, artist_id: &str) -> Result<Vec<GenreVote>, EnrichmentError> {
        let url = format!(
            "{}/artist/{}?inc=tags&fmt=json",
            self.base_url,
            urlencoding::encode(artist_id)
        );
        let artist: dto::Artist = self.get_json(&url).await?;
        Ok(adapter::to_artist_votes(&artist))
    }

    /// Resolve an artist name to its best match, then fetch that artist's votes
    pub async fn search_artist_votes(
        &self,
        artist: &str,
        limit: u32,
    ) -> Result<Vec<GenreVote>, EnrichmentError> {
        let matches = self.search_artists(artist, limit).await?;
        let Some(best) = matches.first() else {
            return Ok(Vec::new());
        };
        tracing::debug!(artist = %artist, id = %best.id, "Resolved artist");
        self.artist_tags(&best.id).await
    }

    fn search_url(&self, entity: &str, query: &str, limit: u32) -> String {
        format!(
            "{}/{}?query={}&limit={}&fmt=json",
            self.base_url,
            entity,
            urlencoding::encode(query),
            limit
        )
    }

    /// Send a GET request and parse the JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, EnrichmentError> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(EnrichmentError::from_reqwest)?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EnrichmentError::NoMatches);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        {
            return Err(EnrichmentError::RateLimited);
        }

        if !status.is_success() {
            if let Ok(error) = response.json::<dto::ApiError>().await {
                return Err(EnrichmentError::Api(error.error));
            }
            return Err(EnrichmentError::Api(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(EnrichmentError::from_reqwest)?;

        serde_json::from_slice(&body).map_err(|e| EnrichmentError::Protocol(e.to_string()))
    }
}

/// Lucene query for a release search
pub fn release_query(query: &SearchQuery) -> String {
    match query {
        SearchQuery::ByArtistAlbum { artist, album, .. } => {
            format!("artist:{} AND release:{}", phrase(artist), phrase(album))
        }
        SearchQuery::ByFreeText { text, .. } => escape_lucene(text),
        SearchQuery::ByArtistOnly { artist, .. } => format!("artist:{}", phrase(artist)),
    }
}

/// Quote a value as a Lucene phrase
fn phrase(value: &str) -> String {
    let escaped = value.trim().replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Escape Lucene special characters in free text
fn escape_lucene(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':',
        '\\', '/',
    ];
    let mut out = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
