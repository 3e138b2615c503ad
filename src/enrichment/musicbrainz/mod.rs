//! MusicBrainz API integration
//!
//! The remote catalog: release search for cover candidates, recording and
//! artist searches for genre votes.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API

pub mod dto;
mod adapter;
mod client;

pub use client::{MusicBrainzClient, release_query};
