//! Adapter layer: Convert MusicBrainz DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! Catalog relevance order is preserved everywhere.

use super::dto;
use crate::enrichment::domain::{
    ArtistMatch, CandidateRelease, GenreVote, RecordingMatch, VoteScope,
};

/// Convert a release search response to candidates, in relevance order
pub fn to_candidates(response: dto::ReleaseSearchResponse) -> Vec<CandidateRelease> {
    response
        .releases
        .into_iter()
        .filter(|r| !r.id.is_empty())
        .map(to_candidate)
        .collect()
}

fn to_candidate(release: dto::Release) -> CandidateRelease {
    let album = release
        .release_group
        .as_ref()
        .and_then(|rg| rg.title.clone())
        .or_else(|| Some(release.title.clone()));

    CandidateRelease {
        artist: build_artist_string(&release.artist_credit),
        id: release.id,
        title: release.title,
        album,
    }
}

/// Convert a recording search response to recordings with recording-scope votes
///
/// Releases nested in a recording usually carry no artist credit of their
/// own; they inherit the recording's.
pub fn to_recordings(response: dto::RecordingSearchResponse) -> Vec<RecordingMatch> {
    response
        .recordings
        .into_iter()
        .map(|recording| {
            let artist = build_artist_string(&recording.artist_credit);
            let release = recording
                .releases
                .into_iter()
                .find(|r| !r.id.is_empty())
                .map(to_candidate)
                .map(|mut release| {
                    if release.artist.is_none() {
                        release.artist = artist.clone();
                    }
                    release
                });

            RecordingMatch {
                votes: to_votes(&recording.tags, VoteScope::Recording),
                artist,
                release,
                id: recording.id,
                title: recording.title,
            }
        })
        .collect()
}

/// Convert an artist search response to artist matches
pub fn to_artist_matches(response: dto::ArtistSearchResponse) -> Vec<ArtistMatch> {
    response
        .artists
        .into_iter()
        .map(|a| ArtistMatch {
            id: a.id,
            name: a.name,
        })
        .collect()
}

/// Artist-scope votes from an artist lookup
pub fn to_artist_votes(artist: &dto::Artist) -> Vec<GenreVote> {
    to_votes(&artist.tags, VoteScope::Artist)
}

/// Tags keep their catalog order; blank names are dropped
fn to_votes(tags: &[dto::Tag], scope: VoteScope) -> Vec<GenreVote> {
    tags.iter()
        .filter(|t| !t.name.trim().is_empty())
        .map(|t| GenreVote {
            label: t.name.trim().to_string(),
            count: t.count,
            scope,
        })
        .collect()
}

/// Build a combined artist string from artist credits
fn build_artist_string(credits: &[dto::ArtistCredit]) -> Option<String> {
    if credits.is_empty() {
        return None;
    }

    let mut result = String::new();
    for credit in credits {
        // Use credited name if available, otherwise official name
        let name = credit.name.as_ref().unwrap_or(&credit.artist.name);
        result.push_str(name);

        if let Some(ref join) = credit.joinphrase {
            result.push_str(join);
        }
    }

    Some(result)
}
