//! Cover Art Archive integration
//!
//! Fetches album artwork from coverartarchive.org using MusicBrainz release
//! IDs and normalizes it to JPEG. No API key required.

mod client;
pub mod normalize;

pub use client::{CoverArtClient, CoverSize};
pub use normalize::normalize;
