//! Genre resolution by tag popularity.
//!
//! Recording-scope votes are tried first; artist-scope votes only when the
//! recordings yield nothing. The two scopes are never mixed.

use std::time::Duration;

use super::domain::{EnrichmentError, GenreVote, RecordingMatch, VoteScope};
use super::strategy::GenreQuery;
use super::traits::{CatalogApi, bounded};

/// A resolved genre and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGenre {
    /// Normalized label, e.g. `Rock`
    pub genre: String,
    pub scope: VoteScope,
    /// Popularity count of the winning vote
    pub count: i64,
}

/// Outcome of running the chain for one file.
#[derive(Debug, Clone, Default)]
pub struct GenreOutcome {
    pub resolved: Option<ResolvedGenre>,
    /// Scopes actually queried, in order
    pub attempted: Vec<VoteScope>,
    /// Lookup errors that were degraded to "no votes"
    pub errors: Vec<EnrichmentError>,
}

/// Pick the most popular vote; ties go to the earliest.
pub fn select_vote(votes: &[GenreVote]) -> Option<&GenreVote> {
    votes.iter().fold(None, |best: Option<&GenreVote>, vote| match best {
        Some(b) if b.count >= vote.count => Some(b),
        _ => Some(vote),
    })
}

/// Uppercase the first character and lowercase the rest: `hip HOP` → `Hip hop`.
pub fn normalize_label(label: &str) -> String {
    let label = label.trim();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// First recording, in catalog order, carrying any vote.
pub fn first_voted(recordings: &[RecordingMatch]) -> Option<&RecordingMatch> {
    recordings.iter().find(|r| !r.votes.is_empty())
}

fn resolve(votes: &[GenreVote]) -> Option<ResolvedGenre> {
    let vote = select_vote(votes)?;
    let genre = normalize_label(&vote.label);
    if genre.is_empty() {
        return None;
    }
    Some(ResolvedGenre {
        genre,
        scope: vote.scope,
        count: vote.count,
    })
}

/// Run the chain. Stops at the first query producing a genre.
///
/// Each lookup is bounded by `timeout`; a timed-out scope falls through to
/// the next one like any other error.
pub async fn resolve_genre(
    catalog: &dyn CatalogApi,
    queries: &[GenreQuery],
    timeout: Duration,
) -> GenreOutcome {
    let mut outcome = GenreOutcome::default();

    for query in queries {
        let resolved = match query {
            GenreQuery::Recording {
                artist,
                title,
                limit,
            } => {
                outcome.attempted.push(VoteScope::Recording);
                match bounded(timeout, catalog.search_recordings(artist, title, *limit)).await {
                    Ok(recordings) => {
                        first_voted(&recordings).and_then(|recording| resolve(&recording.votes))
                    }
                    Err(e) => {
                        tracing::warn!(artist = %artist, title = %title, error = %e, "Recording genre lookup failed");
                        outcome.errors.push(e);
                        None
                    }
                }
            }
            GenreQuery::Artist { artist, limit } => {
                outcome.attempted.push(VoteScope::Artist);
                match bounded(timeout, catalog.search_artist_votes(artist, *limit)).await {
                    Ok(votes) => resolve(&votes),
                    Err(e) => {
                        tracing::warn!(artist = %artist, error = %e, "Artist genre lookup failed");
                        outcome.errors.push(e);
                        None
                    }
                }
            }
        };

        if let Some(found) = resolved {
            tracing::debug!(genre = %found.genre, scope = %found.scope, count = found.count, "Resolved genre");
            outcome.resolved = Some(found);
            break;
        }
    }

    outcome
}
