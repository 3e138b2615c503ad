//! Metadata completion - fills in missing genres and cover art from external services.
//!
//! # Architecture
//!
//! This module follows a clean separation between:
//! - **Domain models** (`domain.rs`) - Internal types that represent our business logic
//! - **API DTOs** (`musicbrainz/dto.rs`) - Exact API response shapes
//! - **Adapters** - Convert DTOs to domain models
//! - **Clients** - HTTP clients for external APIs
//! - **Strategies** (`strategy.rs`) - Which searches a file's tags allow
//! - **Genre chain** (`genre.rs`) - Vote selection with recording → artist fallback
//! - **Completion** (`completion.rs`) - Artist/title/album from a matching recording
//! - **Service** - Per-file orchestration and candidate collection
//!
//! This decoupling means:
//! 1. API changes don't ripple through our codebase
//! 2. We can test API contracts independently
//! 3. Everything above the clients is tested against mocks (`traits::mocks`)
//!
//! # Usage
//!
//! ```ignore
//! use enrichment::{EnrichmentService, EnrichmentConfig};
//!
//! let config = config::load();
//! let service = EnrichmentService::from_config(&config, EnrichmentConfig::from_config(&config))?;
//!
//! let result = service.enrich_file(Path::new("song.flac")).await;
//! println!("{}: {}", result.path.display(), result.status);
//! ```

pub mod completion;
pub mod coverart;
pub mod domain;
pub mod genre;
pub mod musicbrainz;
pub mod service;
pub mod strategy;
pub mod traits;

pub use domain::{CandidateRelease, EnrichmentError, GenreVote, VoteScope};
pub use service::{CoverCandidate, CoverOutcome, EnrichmentConfig, EnrichmentService};
pub use strategy::CoverStrategy;
