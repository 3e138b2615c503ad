//! Basic field completion from a recording search.
//!
//! A file missing its artist, title or album borrows them from the first
//! recording that appears on a release. That release is also the most
//! direct cover candidate there is.

use super::domain::{CandidateRelease, RecordingMatch};
use crate::model::{MediaItem, fields};

/// Fields a recording can fill, in the order they are filled.
pub const COMPLETABLE: [&str; 3] = [fields::ARTIST, fields::TITLE, fields::ALBUM];

/// Whether any completable field is absent or blank.
pub fn needs_completion(item: &MediaItem) -> bool {
    COMPLETABLE.iter().any(|field| !item.tags.has_value(field))
}

/// First recording, in catalog order, that appears on a release.
pub fn first_released(
    recordings: &[RecordingMatch],
) -> Option<(&RecordingMatch, &CandidateRelease)> {
    recordings
        .iter()
        .find_map(|recording| recording.release.as_ref().map(|release| (recording, release)))
}

/// Fill absent fields from a recording and its release.
///
/// Returns the fields that were added. Present values are never touched.
pub fn complete(
    item: &mut MediaItem,
    recording: &RecordingMatch,
    release: &CandidateRelease,
) -> Vec<String> {
    let values = [
        recording.artist.as_deref(),
        Some(recording.title.as_str()),
        Some(release.title.as_str()),
    ];

    COMPLETABLE
        .iter()
        .zip(values)
        .filter_map(|(field, value)| {
            let value = value?;
            item.tags.fill(field, value).then(|| field.to_string())
        })
        .collect()
}
