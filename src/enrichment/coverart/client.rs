//! Cover Art Archive HTTP client
//!
//! Fetches the front cover of a MusicBrainz release.
//! No API key required, but please respect their rate limits.
//!
//! API: https://coverartarchive.org

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::normalize::normalize;
use crate::config::CoverConfig;
use crate::enrichment::domain::EnrichmentError;
use crate::model::CoverAsset;

/// Desired cover art size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverSize {
    /// 250px thumbnail
    Small,
    /// 500px thumbnail (default)
    #[default]
    Medium,
    /// 1200px thumbnail
    Large,
    /// Original full-size image
    Original,
}

impl CoverSize {
    fn suffix(&self) -> &'static str {
        match self {
            CoverSize::Small => "-250",
            CoverSize::Medium => "-500",
            CoverSize::Large => "-1200",
            CoverSize::Original => "",
        }
    }
}

/// Cover Art Archive client
pub struct CoverArtClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CoverArtClient {
    /// Create a client from the cover configuration.
    ///
    /// The request timeout bounds the whole download, redirects included.
    pub fn new(config: &CoverConfig, user_agent: &str) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
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

    /// URL of a release's front cover
    pub fn front_cover_url(&self, release_id: &str, size: CoverSize) -> String {
        format!(
            "{}/release/{}/front{}",
            self.base_url,
            urlencoding::encode(release_id),
            size.suffix()
        )
    }

    /// Download and validate the front cover for a MusicBrainz release
    pub async fn get_front_cover(
        &self,
        release_id: &str,
        size: CoverSize,
    ) -> Result<CoverAsset, EnrichmentError> {
        let url = self.front_cover_url(release_id, size);
        let (data, mime_type) = self.download_image(&url).await?;

        // Decoding is CPU-bound; keep it off the async workers
        tokio::task::spawn_blocking(move || normalize(data, &mime_type))
            .await
            .map_err(|e| EnrichmentError::Decode(e.to_string()))?
    }

    /// Download an image; only a success status counts as a hit
    async fn download_image(&self, url: &str) -> Result<(Vec<u8>, String), EnrichmentError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(EnrichmentError::from_reqwest)?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EnrichmentError::NoMatches);
        }

        if !status.is_success() {
            return Err(EnrichmentError::Api(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = response
            .bytes()
            .await
            .map_err(EnrichmentError::from_reqwest)?
            .to_vec();

        Ok((data, mime_type))
    }
}
