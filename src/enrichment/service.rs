//! Enrichment service - orchestrates genre and cover completion for one file
//!
//! This is the high-level API for enriching files:
//! 1. Load the file's tags; strip a legacy ID3 block and reload if present
//! 2. Fill a missing artist, title or album from a matching recording
//! 3. Resolve a genre if none is set (recording votes, then artist votes)
//! 4. Find a cover if none is embedded (all strategies concurrently)
//! 5. Save once, only when something was added

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::completion;
use super::coverart::{CoverArtClient, CoverSize};
use super::domain::{CandidateRelease, EnrichmentError};
use super::genre::resolve_genre;
use super::musicbrainz::MusicBrainzClient;
use super::strategy::{
    CoverStrategy, SearchQuery, cover_queries, free_text_query, genre_queries, lookup_pair,
};
use super::traits::{self, CatalogApi, CoverArtApi};
use crate::config::{Config, CoverPolicy};
use crate::error::{Error, Result};
use crate::metadata::{LegacyTagRemover, LoftyTagStore, TagStore, legacy};
use crate::model::{
    CoverAsset, EnrichmentResult, EnrichmentStatus, ImageRole, MediaItem, fields,
};

/// Buffered candidates per display channel
const CANDIDATE_CHANNEL_CAPACITY: usize = 16;

/// Configuration for the enrichment service
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Result limit for release searches
    pub search_limit: u32,
    /// Result limit for recording searches
    pub recording_limit: u32,
    /// Result limit for artist searches
    pub artist_limit: u32,
    /// Preferred cover art size
    pub cover_size: CoverSize,
    pub cover_policy: CoverPolicy,
    /// Upper bound for each catalog search and cover download
    pub request_timeout: Duration,
    /// Run every lookup but never write
    pub dry_run: bool,
}

impl EnrichmentConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_limit: config.catalog.search_limit,
            recording_limit: config.catalog.recording_limit,
            artist_limit: config.catalog.artist_limit,
            cover_size: config.cover.size,
            cover_policy: config.cover.policy,
            request_timeout: Duration::from_secs(config.cover.timeout_secs),
            dry_run: false,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A cover found by one strategy.
#[derive(Debug, Clone)]
pub struct CoverCandidate {
    pub strategy: CoverStrategy,
    pub release: CandidateRelease,
    pub asset: CoverAsset,
}

/// Outcome of the cover search for one file.
#[derive(Debug, Clone, Default)]
pub struct CoverOutcome {
    /// Winning candidate: the first success in strategy priority order
    pub found: Option<CoverCandidate>,
    /// Strategies that were issued, in priority order
    pub attempted: Vec<CoverStrategy>,
    /// Search and download errors that were degraded to misses
    pub errors: Vec<EnrichmentError>,
}

/// Service for completing file metadata from external sources
pub struct EnrichmentService {
    catalog: Arc<dyn CatalogApi>,
    covers: Arc<dyn CoverArtApi>,
    store: Arc<dyn TagStore>,
    remover: Arc<dyn LegacyTagRemover>,
    config: EnrichmentConfig,
}

impl EnrichmentService {
    /// Create a service from explicit parts
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        covers: Arc<dyn CoverArtApi>,
        store: Arc<dyn TagStore>,
        remover: Arc<dyn LegacyTagRemover>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            catalog,
            covers,
            store,
            remover,
            config,
        }
    }

    /// Create the production service: MusicBrainz, Cover Art Archive, lofty
    pub fn from_config(
        config: &Config,
        enrichment: EnrichmentConfig,
    ) -> std::result::Result<Self, EnrichmentError> {
        let catalog = MusicBrainzClient::new(&config.catalog)?;
        let covers = CoverArtClient::new(&config.cover, &config.catalog.user_agent())?;
        let remover: Arc<dyn LegacyTagRemover> = Arc::from(legacy::from_config(&config.legacy));

        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(covers),
            Arc::new(LoftyTagStore::new()),
            remover,
            enrichment,
        ))
    }

    /// Load a file on the blocking pool
    pub async fn load(&self, path: &Path) -> Result<MediaItem> {
        let store = Arc::clone(&self.store);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || store.load(&path)).await?
    }

    async fn save(&self, item: MediaItem) -> Result<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&item)).await?
    }

    async fn remove_legacy(&self, path: &Path) -> Result<()> {
        let remover = Arc::clone(&self.remover);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || remover.remove(&path)).await?
    }

    /// Bound a lookup by the request timeout
    async fn bounded<T>(
        &self,
        lookup: impl Future<Output = std::result::Result<T, EnrichmentError>>,
    ) -> std::result::Result<T, EnrichmentError> {
        traits::bounded(self.config.request_timeout, lookup).await
    }

    /// Enrich one file.
    ///
    /// Never returns an error: lookup problems end up in the result, and
    /// only load/save problems mark it [`EnrichmentStatus::Failed`].
    pub async fn enrich_file(&self, path: &Path) -> EnrichmentResult {
        let mut result = EnrichmentResult::new(path);

        let mut item = match self.load(path).await {
            Ok(item) => item,
            Err(e) => return failure(path, "load", &e),
        };

        if item.has_legacy_tags {
            if self.config.dry_run {
                tracing::info!(path = %path.display(), "Dry run: would remove legacy ID3 block");
            } else {
                match self.remove_legacy(path).await {
                    Ok(()) => {
                        result.legacy_removed = true;
                        // Removal may carry fields over; inspect the file as it is now
                        item = match self.load(path).await {
                            Ok(item) => item,
                            Err(e) => {
                                let mut failed = failure(path, "reload", &e);
                                failed.legacy_removed = true;
                                return failed;
                            }
                        };
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Legacy tag removal failed");
                    }
                }
            }
        }

        // The policy only decides what happens to old images once a cover is found
        let needs_genre = !item.has_genre();
        let needs_cover = !item.has_valid_cover();

        if !needs_genre && !needs_cover {
            tracing::debug!(path = %path.display(), "Nothing missing");
            result.reason = Some("nothing missing".to_string());
            return result;
        }

        let mut missing = Vec::new();

        // Genre lookups use the file's own names, not completed ones
        let genre_lookups = genre_queries(
            &item,
            self.config.recording_limit,
            self.config.artist_limit,
        );

        let known_release = if completion::needs_completion(&item) {
            self.complete_from_recording(&mut item, &mut result).await
        } else {
            None
        };

        if needs_genre {
            let outcome = resolve_genre(
                self.catalog.as_ref(),
                &genre_lookups,
                self.config.request_timeout,
            )
            .await;
            result.lookup_errors.extend(outcome.errors);

            if let Some(found) = outcome.resolved
                && item.tags.fill(fields::GENRE, found.genre.as_str())
            {
                result.added_fields.push(fields::GENRE.to_string());
                result.genre = Some(found.genre);
            } else {
                missing.push("no genre found");
            }
        }

        if needs_cover {
            let outcome = self.find_cover_from(&item, known_release.as_ref()).await;
            result.lookup_errors.extend(outcome.errors);

            match outcome.found {
                Some(candidate) => {
                    if self.config.cover_policy == CoverPolicy::ReplaceExisting {
                        self.store.clear_images(&mut item);
                    }
                    self.store
                        .add_image(&mut item, &candidate.asset, ImageRole::FrontCover);
                    result.cover_embedded = true;
                    result.cover_strategy = Some(candidate.strategy);
                }
                None => missing.push("no cover found"),
            }
        }

        let reason = (!missing.is_empty()).then(|| missing.join(", "));

        if !result.changed() {
            result.status = EnrichmentStatus::Skipped;
            result.reason = reason;
            return result;
        }

        if self.config.dry_run {
            tracing::info!(path = %path.display(), fields = ?result.added_fields, cover = result.cover_embedded, "Dry run: not saving");
        } else {
            if let Err(e) = self.save(item).await {
                let mut failed = failure(path, "save", &e);
                failed.legacy_removed = result.legacy_removed;
                failed.lookup_errors = result.lookup_errors;
                return failed;
            }
            result.saved = true;
        }

        result.status = if missing.is_empty() {
            EnrichmentStatus::Completed
        } else {
            EnrichmentStatus::Partial
        };
        result.reason = reason;
        result
    }

    /// Fill missing ARTIST, TITLE and ALBUM from the first recording that
    /// appears on a release.
    ///
    /// Returns that release as a direct cover candidate.
    async fn complete_from_recording(
        &self,
        item: &mut MediaItem,
        result: &mut EnrichmentResult,
    ) -> Option<CandidateRelease> {
        let (artist, title) = lookup_pair(item)?;

        let lookup = self
            .catalog
            .search_recordings(&artist, &title, self.config.recording_limit);
        let recordings = match self.bounded(lookup).await {
            Ok(recordings) => recordings,
            Err(e) => {
                tracing::warn!(artist = %artist, title = %title, error = %e, "Recording lookup failed");
                result.lookup_errors.push(e);
                return None;
            }
        };

        let (recording, release) = completion::first_released(&recordings)?;
        let added = completion::complete(item, recording, release);
        if !added.is_empty() {
            tracing::debug!(
                path = %item.path.display(),
                fields = ?added,
                release = %release.id,
                "Completed from recording"
            );
        }
        result.added_fields.extend(added);
        Some(release.clone())
    }

    /// Run every cover strategy concurrently and keep the best bucket.
    ///
    /// Each strategy stops at its first downloadable candidate. The winner
    /// is the first strategy in priority order that found one.
    pub async fn find_cover(&self, item: &MediaItem) -> CoverOutcome {
        self.find_cover_from(item, None).await
    }

    /// [`find_cover`](Self::find_cover) with a release already known to hold
    /// the track. It is tried ahead of the searches, in the artist+album
    /// bucket.
    async fn find_cover_from(
        &self,
        item: &MediaItem,
        known: Option<&CandidateRelease>,
    ) -> CoverOutcome {
        let queries = cover_queries(item, self.config.search_limit);
        let mut attempted: Vec<CoverStrategy> =
            queries.iter().map(SearchQuery::strategy).collect();
        if known.is_some() && attempted.first() != Some(&CoverStrategy::ArtistAlbum) {
            attempted.insert(0, CoverStrategy::ArtistAlbum);
        }

        let direct = async {
            match known {
                Some(release) => self.known_cover(release).await,
                None => (None, Vec::new()),
            }
        };
        let searches = futures::future::join_all(queries.iter().map(|q| self.first_cover(q)));
        let (direct, runs) = futures::join!(direct, searches);

        let mut outcome = CoverOutcome {
            attempted,
            ..Default::default()
        };
        for (found, errors) in std::iter::once(direct).chain(runs) {
            outcome.errors.extend(errors);
            if outcome.found.is_none() {
                outcome.found = found;
            }
        }

        if let Some(ref c) = outcome.found {
            tracing::debug!(
                path = %item.path.display(),
                strategy = %c.strategy,
                release = %c.release.id,
                "Found cover"
            );
        }
        outcome
    }

    /// First candidate of one query whose cover downloads and decodes.
    async fn first_cover(
        &self,
        query: &SearchQuery,
    ) -> (Option<CoverCandidate>, Vec<EnrichmentError>) {
        let mut errors = Vec::new();

        let releases = match self.bounded(self.catalog.search_releases(query)).await {
            Ok(releases) => releases,
            Err(e) => {
                tracing::warn!(query = %query, strategy = %query.strategy(), error = %e, "Release search failed");
                errors.push(e);
                return (None, errors);
            }
        };

        for release in releases {
            match self.fetch_cover(&release.id).await {
                Ok(asset) => {
                    let candidate = CoverCandidate {
                        strategy: query.strategy(),
                        release,
                        asset,
                    };
                    return (Some(candidate), errors);
                }
                Err(EnrichmentError::NoMatches) => {}
                Err(e) => {
                    tracing::debug!(release = %release.id, error = %e, "Cover download failed");
                    errors.push(e);
                }
            }
        }

        (None, errors)
    }

    async fn known_cover(
        &self,
        release: &CandidateRelease,
    ) -> (Option<CoverCandidate>, Vec<EnrichmentError>) {
        match self.fetch_cover(&release.id).await {
            Ok(asset) => {
                let candidate = CoverCandidate {
                    strategy: CoverStrategy::ArtistAlbum,
                    release: release.clone(),
                    asset,
                };
                (Some(candidate), Vec::new())
            }
            Err(EnrichmentError::NoMatches) => (None, Vec::new()),
            Err(e) => {
                tracing::debug!(release = %release.id, error = %e, "Cover download failed");
                (None, vec![e])
            }
        }
    }

    async fn fetch_cover(&self, release_id: &str) -> std::result::Result<CoverAsset, EnrichmentError> {
        self.bounded(self.covers.get_front_cover(release_id, self.config.cover_size))
            .await
    }

    /// Stream every downloadable cover for an item, one producer per strategy.
    ///
    /// Candidates arrive in catalog order within a strategy; strategies
    /// interleave. Dropping the receiver stops the producers.
    pub fn collect_covers(self: &Arc<Self>, item: &MediaItem) -> mpsc::Receiver<CoverCandidate> {
        self.spawn_producers(cover_queries(item, self.config.search_limit))
    }

    /// Same as [`collect_covers`](Self::collect_covers) for a typed query.
    pub fn search_covers(self: &Arc<Self>, text: &str) -> mpsc::Receiver<CoverCandidate> {
        self.spawn_producers(
            free_text_query(text, self.config.search_limit)
                .into_iter()
                .collect(),
        )
    }

    fn spawn_producers(self: &Arc<Self>, queries: Vec<SearchQuery>) -> mpsc::Receiver<CoverCandidate> {
        let (tx, rx) = mpsc::channel(CANDIDATE_CHANNEL_CAPACITY);

        for query in queries {
            let service = Arc::clone(self);
            let tx = tx.clone();
            tokio::spawn(async move {
                let releases = match service.bounded(service.catalog.search_releases(&query)).await {
                    Ok(releases) => releases,
                    Err(e) => {
                        tracing::warn!(query = %query, error = %e, "Release search failed");
                        return;
                    }
                };

                for release in releases {
                    let asset = match service.fetch_cover(&release.id).await {
                        Ok(asset) => asset,
                        Err(e) => {
                            tracing::debug!(release = %release.id, error = %e, "No cover");
                            continue;
                        }
                    };
                    let candidate = CoverCandidate {
                        strategy: query.strategy(),
                        release,
                        asset,
                    };
                    if tx.send(candidate).await.is_err() {
                        // Receiver gone
                        return;
                    }
                }
            });
        }

        rx
    }
}

/// Failed result for a load or save error.
///
/// Tag store errors belong to the file and are warnings; anything else
/// (I/O, a lost blocking task) is logged as an error.
fn failure(path: &Path, action: &str, e: &Error) -> EnrichmentResult {
    if e.is_tag_store() {
        tracing::warn!(path = %path.display(), error = %e, "Failed to {} tags", action);
    } else {
        tracing::error!(path = %path.display(), error = %e, "Failed to {} tags", action);
    }
    EnrichmentResult::failed(path, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::traits::mocks::{MockCatalog, MockCoverArt};
    use crate::model::EmbeddedImage;
    use crate::test_utils::{MemoryTagStore, MockRemover, tagged_item};
    use proptest::prelude::*;

    struct Harness {
        catalog: Arc<MockCatalog>,
        covers: Arc<MockCoverArt>,
        store: Arc<MemoryTagStore>,
        remover: Arc<MockRemover>,
    }

    impl Harness {
        fn new(catalog: MockCatalog, covers: MockCoverArt) -> Self {
            let store = Arc::new(MemoryTagStore::new());
            Self {
                catalog: Arc::new(catalog),
                covers: Arc::new(covers),
                remover: Arc::new(MockRemover::new(Arc::clone(&store))),
                store,
            }
        }

        fn service(&self, config: EnrichmentConfig) -> EnrichmentService {
            EnrichmentService::new(
                self.catalog.clone(),
                self.covers.clone(),
                self.store.clone(),
                self.remover.clone(),
                config,
            )
        }
    }

    fn fast_config() -> EnrichmentConfig {
        EnrichmentConfig {
            request_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    fn queen() -> MediaItem {
        tagged_item(
            "/music/Queen - Bohemian Rhapsody.flac",
            &[
                ("ARTIST", "Queen"),
                ("TITLE", "Bohemian Rhapsody"),
                ("ALBUM", "A Night at the Opera"),
            ],
        )
    }

    fn full_catalog() -> (MockCatalog, MockCoverArt) {
        (
            MockCatalog::new()
                .with_recording_votes(&[("rock", 5), ("jazz", 5)])
                .with_releases(CoverStrategy::ArtistAlbum, &["album-1"]),
            MockCoverArt::new().with_cover("album-1", 1),
        )
    }

    #[tokio::test]
    async fn test_completes_and_saves_once() {
        let (catalog, covers) = full_catalog();
        let h = Harness::new(catalog, covers);
        h.store.insert(queen());

        let result = h.service(fast_config()).enrich_file(&queen().path).await;

        assert_eq!(result.status, EnrichmentStatus::Completed);
        assert_eq!(result.genre.as_deref(), Some("Rock"));
        assert_eq!(result.added_fields, vec!["GENRE".to_string()]);
        assert!(result.cover_embedded);
        assert_eq!(result.cover_strategy, Some(CoverStrategy::ArtistAlbum));
        assert!(result.saved);
        assert!(result.reason.is_none());
        assert_eq!(h.store.save_count(), 1);

        let saved = h.store.get(&queen().path).unwrap();
        assert_eq!(saved.tags.get("GENRE"), Some("Rock"));
        assert!(saved.has_valid_cover());
        assert_eq!(saved.images[0].role, ImageRole::FrontCover);
    }

    #[tokio::test]
    async fn test_second_run_is_a_noop() {
        let (catalog, covers) = full_catalog();
        let h = Harness::new(catalog, covers);
        h.store.insert(queen());
        let service = h.service(fast_config());

        service.enrich_file(&queen().path).await;
        let second = service.enrich_file(&queen().path).await;

        assert_eq!(second.status, EnrichmentStatus::Skipped);
        assert_eq!(second.reason.as_deref(), Some("nothing missing"));
        assert!(!second.changed());
        assert_eq!(h.store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_genre_is_kept() {
        let (catalog, covers) = full_catalog();
        let h = Harness::new(catalog, covers);
        let mut item = queen();
        item.tags.insert("genre", "Opera");
        h.store.insert(item.clone());

        let result = h.service(fast_config()).enrich_file(&item.path).await;

        assert_eq!(result.status, EnrichmentStatus::Completed);
        assert!(result.added_fields.is_empty());
        assert!(result.cover_embedded);
        assert_eq!(h.store.get(&item.path).unwrap().tags.get("GENRE"), Some("Opera"));
        assert!(
            h.catalog
                .calls()
                .iter()
                .all(|c| !c.starts_with("recording:"))
        );
    }

    #[tokio::test]
    async fn test_partial_when_no_cover() {
        let catalog = MockCatalog::new().with_artist_votes(&[("progressive rock", 2)]);
        let h = Harness::new(catalog, MockCoverArt::new());
        h.store.insert(queen());

        let result = h.service(fast_config()).enrich_file(&queen().path).await;

        assert_eq!(result.status, EnrichmentStatus::Partial);
        assert_eq!(result.genre.as_deref(), Some("Progressive rock"));
        assert_eq!(result.reason.as_deref(), Some("no cover found"));
        assert!(result.saved);
        assert_eq!(
            h.catalog
                .calls()
                .iter()
                .filter(|c| !c.starts_with("release:"))
                .cloned()
                .collect::<Vec<_>>(),
            vec!["recording:Queen/Bohemian Rhapsody", "artist:Queen"]
        );
    }

    #[tokio::test]
    async fn test_nothing_found_is_skipped_without_write() {
        let h = Harness::new(MockCatalog::new(), MockCoverArt::new());
        h.store.insert(queen());

        let result = h.service(fast_config()).enrich_file(&queen().path).await;

        assert_eq!(result.status, EnrichmentStatus::Skipped);
        assert_eq!(
            result.reason.as_deref(),
            Some("no genre found, no cover found")
        );
        assert_eq!(h.store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_cover_priority_prefers_artist_album() {
        let catalog = MockCatalog::new()
            .with_releases(CoverStrategy::ArtistAlbum, &["a-miss", "a-hit"])
            .with_releases(CoverStrategy::FileName, &["f-hit"])
            .with_releases(CoverStrategy::ArtistOnly, &["o-hit"]);
        let covers = MockCoverArt::new()
            .with_cover("a-hit", 1)
            .with_cover("f-hit", 2)
            .with_cover("o-hit", 3);
        let h = Harness::new(catalog, covers);
        let mut item = queen();
        item.tags.insert("GENRE", "Rock");
        h.store.insert(item.clone());

        let outcome = h.service(fast_config()).find_cover(&item).await;

        let found = outcome.found.unwrap();
        assert_eq!(found.strategy, CoverStrategy::ArtistAlbum);
        assert_eq!(found.release.id, "a-hit");
        assert_eq!(outcome.attempted, CoverStrategy::ALL.to_vec());

        let fetched = h.covers.fetched();
        let miss = fetched.iter().position(|id| id == "a-miss").unwrap();
        let hit = fetched.iter().position(|id| id == "a-hit").unwrap();
        assert!(miss < hit);
    }

    #[tokio::test]
    async fn test_cover_falls_through_to_file_name() {
        let catalog = MockCatalog::new()
            .with_releases(CoverStrategy::ArtistAlbum, &["a-miss"])
            .with_releases(CoverStrategy::FileName, &["f-hit"]);
        let covers = MockCoverArt::new().with_cover("f-hit", 2);
        let h = Harness::new(catalog, covers);
        let mut item = queen();
        item.tags.insert("GENRE", "Rock");
        h.store.insert(item.clone());

        let result = h.service(fast_config()).enrich_file(&item.path).await;

        assert_eq!(result.cover_strategy, Some(CoverStrategy::FileName));
        assert_eq!(h.store.get(&item.path).unwrap().images[0].data, vec![0xFF, 0xD8, 2]);
    }

    #[tokio::test]
    async fn test_hanging_download_is_a_miss() {
        let catalog = MockCatalog::new()
            .with_releases(CoverStrategy::ArtistAlbum, &["slow"])
            .with_releases(CoverStrategy::FileName, &["f-hit"]);
        let covers = MockCoverArt::new().hanging_on("slow").with_cover("f-hit", 2);
        let h = Harness::new(catalog, covers);
        let mut item = queen();
        item.tags.insert("GENRE", "Rock");
        h.store.insert(item.clone());

        let config = EnrichmentConfig {
            request_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let result = h.service(config).enrich_file(&item.path).await;

        assert_eq!(result.status, EnrichmentStatus::Completed);
        assert_eq!(result.cover_strategy, Some(CoverStrategy::FileName));
        assert!(result.lookup_errors.contains(&EnrichmentError::Timeout));
    }

    #[tokio::test]
    async fn test_catalog_outage_degrades_to_no_match() {
        let catalog = MockCatalog {
            release_error: Some(EnrichmentError::Network("connection refused".into())),
            recording_error: Some(EnrichmentError::RateLimited),
            artist_error: Some(EnrichmentError::RateLimited),
            ..Default::default()
        };
        let h = Harness::new(catalog, MockCoverArt::new());
        h.store.insert(queen());

        let result = h.service(fast_config()).enrich_file(&queen().path).await;

        assert_eq!(result.status, EnrichmentStatus::Skipped);
        assert!(!result.lookup_errors.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_cover_is_skipped() {
        let catalog = MockCatalog::new()
            .with_releases(CoverStrategy::ArtistAlbum, &["bad", "good"]);
        let covers = MockCoverArt::new().corrupt_on("bad").with_cover("good", 7);
        let h = Harness::new(catalog, covers);
        let mut item = queen();
        item.tags.insert("GENRE", "Rock");

        let outcome = h.service(fast_config()).find_cover(&item).await;
        assert_eq!(outcome.found.unwrap().release.id, "good");
        assert!(matches!(outcome.errors[0], EnrichmentError::Decode(_)));
    }

    #[tokio::test]
    async fn test_load_failure_is_failed() {
        let h = Harness::new(MockCatalog::new(), MockCoverArt::new());
        let result = h
            .service(fast_config())
            .enrich_file(Path::new("/music/missing.flac"))
            .await;
        assert_eq!(result.status, EnrichmentStatus::Failed);
        assert!(result.reason.is_some());
        assert!(h.catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_is_failed() {
        let (catalog, covers) = full_catalog();
        let h = Harness::new(catalog, covers);
        h.store.insert(queen());
        h.store.fail_saves_for(&queen().path);

        let result = h.service(fast_config()).enrich_file(&queen().path).await;
        assert_eq!(result.status, EnrichmentStatus::Failed);
        assert!(!result.saved);
    }

    #[tokio::test]
    async fn test_legacy_removed_and_reloaded_before_genre() {
        let h = Harness::new(
            MockCatalog::new().with_recording_votes(&[("rock", 1)]),
            MockCoverArt::new(),
        );
        let mut item = queen();
        item.tags.insert("ARTIST", "Stale");
        item.has_legacy_tags = true;
        h.store.insert(item.clone());
        h.remover.set_artist("Fresh");

        let result = h.service(fast_config()).enrich_file(&item.path).await;

        assert!(result.legacy_removed);
        assert_eq!(h.remover.calls(), vec![item.path.clone()]);
        assert_eq!(h.catalog.calls()[0], "recording:Fresh/Bohemian Rhapsody");
    }

    #[tokio::test]
    async fn test_legacy_failure_is_only_logged() {
        let h = Harness::new(
            MockCatalog::new().with_recording_votes(&[("rock", 1)]),
            MockCoverArt::new(),
        );
        let mut item = queen();
        item.has_legacy_tags = true;
        h.store.insert(item.clone());
        h.remover.fail();

        let result = h.service(fast_config()).enrich_file(&item.path).await;

        assert!(!result.legacy_removed);
        assert_eq!(result.status, EnrichmentStatus::Partial);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let (catalog, covers) = full_catalog();
        let h = Harness::new(catalog, covers);
        let mut item = queen();
        item.has_legacy_tags = true;
        h.store.insert(item.clone());

        let config = EnrichmentConfig {
            dry_run: true,
            ..fast_config()
        };
        let result = h.service(config).enrich_file(&item.path).await;

        assert_eq!(result.status, EnrichmentStatus::Completed);
        assert!(!result.saved);
        assert!(!result.legacy_removed);
        assert!(h.remover.calls().is_empty());
        assert_eq!(h.store.save_count(), 0);
    }

    fn replace_policy() -> EnrichmentConfig {
        EnrichmentConfig {
            cover_policy: CoverPolicy::ReplaceExisting,
            ..fast_config()
        }
    }

    #[tokio::test]
    async fn test_replace_policy_clears_invalid_images() {
        let (catalog, covers) = full_catalog();
        let h = Harness::new(catalog, covers);
        let mut item = queen();
        item.tags.insert("GENRE", "Rock");
        item.images.push(EmbeddedImage {
            mime_type: "-->".to_string(),
            role: ImageRole::FrontCover,
            description: None,
            data: vec![9, 9],
        });
        h.store.insert(item.clone());

        let result = h.service(replace_policy()).enrich_file(&item.path).await;

        assert_eq!(result.status, EnrichmentStatus::Completed);
        let saved = h.store.get(&item.path).unwrap();
        assert_eq!(saved.images.len(), 1);
        assert_eq!(saved.images[0].mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_replace_policy_second_run_is_a_noop() {
        let (catalog, covers) = full_catalog();
        let h = Harness::new(catalog, covers);
        h.store.insert(queen());
        let service = h.service(replace_policy());

        let first = service.enrich_file(&queen().path).await;
        let fetched = h.covers.fetched().len();
        let second = service.enrich_file(&queen().path).await;

        assert_eq!(first.status, EnrichmentStatus::Completed);
        assert_eq!(second.status, EnrichmentStatus::Skipped);
        assert_eq!(second.reason.as_deref(), Some("nothing missing"));
        assert_eq!(h.store.save_count(), 1);
        assert_eq!(h.covers.fetched().len(), fetched);
    }

    #[tokio::test]
    async fn test_replace_policy_keeps_valid_cover() {
        let (catalog, covers) = full_catalog();
        let h = Harness::new(catalog, covers);
        let mut item = queen();
        item.tags.insert("GENRE", "Rock");
        item.images.push(EmbeddedImage {
            mime_type: "image/png".to_string(),
            role: ImageRole::FrontCover,
            description: None,
            data: vec![9, 9],
        });
        h.store.insert(item.clone());

        let result = h.service(replace_policy()).enrich_file(&item.path).await;

        assert_eq!(result.status, EnrichmentStatus::Skipped);
        assert!(h.covers.fetched().is_empty());
        assert_eq!(h.store.save_count(), 0);
    }

    fn untagged() -> MediaItem {
        tagged_item("/music/Queen - Bohemian Rhapsody.flac", &[])
    }

    fn released_catalog() -> (MockCatalog, MockCoverArt) {
        (
            MockCatalog::new()
                .with_released_recording(
                    "Queen",
                    "Bohemian Rhapsody",
                    "opera",
                    "A Night at the Opera",
                )
                .with_artist_votes(&[("rock", 9)]),
            MockCoverArt::new().with_cover("opera", 4),
        )
    }

    #[tokio::test]
    async fn test_recording_completes_basic_fields() {
        let (catalog, covers) = released_catalog();
        let h = Harness::new(catalog, covers);
        h.store.insert(untagged());

        let result = h.service(fast_config()).enrich_file(&untagged().path).await;

        assert_eq!(result.status, EnrichmentStatus::Completed);
        assert_eq!(
            result.added_fields,
            vec!["ARTIST", "TITLE", "ALBUM", "GENRE"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
        assert_eq!(result.cover_strategy, Some(CoverStrategy::ArtistAlbum));
        assert_eq!(h.covers.fetched()[0], "opera");

        let saved = h.store.get(&untagged().path).unwrap();
        assert_eq!(saved.tags.get("ARTIST"), Some("Queen"));
        assert_eq!(saved.tags.get("ALBUM"), Some("A Night at the Opera"));
        assert_eq!(saved.images[0].data, vec![0xFF, 0xD8, 4]);
        assert_eq!(h.store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_recording_completion_keeps_present_fields() {
        let (catalog, covers) = released_catalog();
        let h = Harness::new(catalog, covers);
        let item = tagged_item(
            "/music/track01.flac",
            &[("ARTIST", "QUEEN"), ("TITLE", "Bohemian Rhapsody")],
        );
        h.store.insert(item.clone());

        let result = h.service(fast_config()).enrich_file(&item.path).await;

        assert_eq!(result.added_fields[0], "ALBUM");
        assert_eq!(h.catalog.calls()[0], "recording:QUEEN/Bohemian Rhapsody");
        let saved = h.store.get(&item.path).unwrap();
        assert_eq!(saved.tags.get("ARTIST"), Some("QUEEN"));
        assert_eq!(saved.tags.get("ALBUM"), Some("A Night at the Opera"));
    }

    #[tokio::test]
    async fn test_recording_completion_failure_is_a_lookup_error() {
        let catalog = MockCatalog {
            recording_error: Some(EnrichmentError::RateLimited),
            ..MockCatalog::new().with_artist_votes(&[("rock", 1)])
        };
        let h = Harness::new(catalog, MockCoverArt::new());
        h.store.insert(untagged());

        let result = h.service(fast_config()).enrich_file(&untagged().path).await;

        assert_eq!(result.status, EnrichmentStatus::Partial);
        assert_eq!(result.added_fields, vec!["GENRE".to_string()]);
        assert!(result.lookup_errors.contains(&EnrichmentError::RateLimited));
    }

    #[tokio::test]
    async fn test_completion_alone_does_not_trigger_lookups() {
        let (catalog, covers) = released_catalog();
        let h = Harness::new(catalog, covers);
        let mut item = untagged();
        item.tags.insert("GENRE", "Rock");
        item.images.push(EmbeddedImage {
            mime_type: "image/jpeg".to_string(),
            role: ImageRole::FrontCover,
            description: None,
            data: vec![1],
        });
        h.store.insert(item.clone());

        let result = h.service(fast_config()).enrich_file(&item.path).await;

        assert_eq!(result.status, EnrichmentStatus::Skipped);
        assert!(h.catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn test_genre_lookup_is_bounded() {
        let catalog = MockCatalog {
            recordings_hang: true,
            ..MockCatalog::new().with_artist_votes(&[("rock", 2)])
        };
        let h = Harness::new(catalog, MockCoverArt::new());
        h.store.insert(queen());

        let config = EnrichmentConfig {
            request_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let result = h.service(config).enrich_file(&queen().path).await;

        assert_eq!(result.genre.as_deref(), Some("Rock"));
        assert!(result.lookup_errors.contains(&EnrichmentError::Timeout));
    }

    #[tokio::test]
    async fn test_invalid_mime_does_not_count_as_cover() {
        let (catalog, covers) = full_catalog();
        let h = Harness::new(catalog, covers);
        let mut item = queen();
        item.tags.insert("GENRE", "Rock");
        item.images.push(EmbeddedImage {
            mime_type: "application/octet-stream".to_string(),
            role: ImageRole::FrontCover,
            description: None,
            data: vec![1],
        });
        h.store.insert(item.clone());

        let result = h.service(fast_config()).enrich_file(&item.path).await;

        assert!(result.cover_embedded);
        // add-if-absent keeps what was there
        assert_eq!(h.store.get(&item.path).unwrap().images.len(), 2);
    }

    #[tokio::test]
    async fn test_collect_covers_from_every_strategy() {
        let catalog = MockCatalog::new()
            .with_releases(CoverStrategy::ArtistAlbum, &["a1", "a2"])
            .with_releases(CoverStrategy::FileName, &["f1"])
            .with_releases(CoverStrategy::ArtistOnly, &["o1", "o-miss"]);
        let covers = MockCoverArt::new()
            .with_cover("a1", 1)
            .with_cover("a2", 2)
            .with_cover("f1", 3)
            .with_cover("o1", 4);
        let h = Harness::new(catalog, covers);
        let service = Arc::new(h.service(fast_config()));

        let mut rx = service.collect_covers(&queen());
        let mut received = Vec::new();
        while let Some(candidate) = rx.recv().await {
            received.push((candidate.strategy, candidate.release.id));
        }

        assert_eq!(received.len(), 4);
        let album: Vec<_> = received
            .iter()
            .filter(|(s, _)| *s == CoverStrategy::ArtistAlbum)
            .map(|(_, id)| id.as_str())
            .collect();
        assert_eq!(album, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_search_covers_free_text() {
        let catalog = MockCatalog::new().with_releases(CoverStrategy::FileName, &["f1"]);
        let covers = MockCoverArt::new().with_cover("f1", 3);
        let h = Harness::new(catalog, covers);
        let service = Arc::new(h.service(fast_config()));

        let mut rx = service.search_covers("queen opera");
        let first = rx.recv().await.unwrap();
        assert_eq!(first.release.id, "f1");
        assert!(rx.recv().await.is_none());

        let mut empty = service.search_covers("   ");
        assert!(empty.recv().await.is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_enrichment_never_overwrites(
            artist in "[A-Za-z]{1,10}",
            genre in proptest::option::of("[A-Za-z]{1,10}"),
            extra in "[A-Za-z0-9 ]{1,16}",
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let (catalog, covers) = full_catalog();
            let h = Harness::new(catalog, covers);

            let mut item = tagged_item("/music/x.flac", &[("ARTIST", artist.as_str()), ("COMMENT", extra.as_str())]);
            if let Some(ref g) = genre {
                item.tags.insert("GENRE", g.clone());
            }
            h.store.insert(item.clone());

            runtime.block_on(h.service(fast_config()).enrich_file(&item.path));

            let after = h.store.get(&item.path).unwrap_or(item.clone());
            for (field, value) in item.tags.iter() {
                prop_assert_eq!(after.tags.get(field), Some(value));
            }
        }
    }
}
