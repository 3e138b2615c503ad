//! Search strategies: how a file's known attributes become catalog queries.
//!
//! Everything here is pure. Queries whose inputs are missing are simply not
//! produced.

use std::fmt;

use crate::model::{MediaItem, fields};

/// Named way of forming a cover search, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CoverStrategy {
    /// Artist + album tags
    ArtistAlbum,
    /// Free text from the file name (extension stripped)
    FileName,
    /// Artist tag alone
    ArtistOnly,
}

impl CoverStrategy {
    pub const ALL: [CoverStrategy; 3] = [Self::ArtistAlbum, Self::FileName, Self::ArtistOnly];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ArtistAlbum => "by album",
            Self::FileName => "by file name",
            Self::ArtistOnly => "by artist",
        }
    }
}

impl fmt::Display for CoverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A release search against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    ByArtistAlbum {
        artist: String,
        album: String,
        limit: u32,
    },
    ByFreeText {
        text: String,
        limit: u32,
    },
    ByArtistOnly {
        artist: String,
        limit: u32,
    },
}

impl SearchQuery {
    pub fn limit(&self) -> u32 {
        match self {
            Self::ByArtistAlbum { limit, .. }
            | Self::ByFreeText { limit, .. }
            | Self::ByArtistOnly { limit, .. } => *limit,
        }
    }

    /// Bucket that results of this query are attributed to.
    pub fn strategy(&self) -> CoverStrategy {
        match self {
            Self::ByArtistAlbum { .. } => CoverStrategy::ArtistAlbum,
            Self::ByFreeText { .. } => CoverStrategy::FileName,
            Self::ByArtistOnly { .. } => CoverStrategy::ArtistOnly,
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByArtistAlbum { artist, album, .. } => write!(f, "{} - {}", artist, album),
            Self::ByFreeText { text, .. } => write!(f, "\"{}\"", text),
            Self::ByArtistOnly { artist, .. } => write!(f, "{}", artist),
        }
    }
}

/// A genre vote lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenreQuery {
    /// Recording-scope votes for (artist, title)
    Recording {
        artist: String,
        title: String,
        limit: u32,
    },
    /// Artist-scope votes for the artist alone
    Artist { artist: String, limit: u32 },
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Cover queries for an item, in priority order: artist+album, file name,
/// artist only.
pub fn cover_queries(item: &MediaItem, limit: u32) -> Vec<SearchQuery> {
    let artist = non_blank(item.tags.value(fields::ARTIST));
    let album = non_blank(item.tags.value(fields::ALBUM));

    let mut queries = Vec::with_capacity(3);

    if let (Some(artist), Some(album)) = (artist.clone(), album) {
        queries.push(SearchQuery::ByArtistAlbum {
            artist,
            album,
            limit,
        });
    }

    if let Some(text) = non_blank(item.file_stem()) {
        queries.push(SearchQuery::ByFreeText { text, limit });
    }

    if let Some(artist) = artist {
        queries.push(SearchQuery::ByArtistOnly { artist, limit });
    }

    queries
}

/// Free-text query typed by a user (candidate display search box).
pub fn free_text_query(text: &str, limit: u32) -> Option<SearchQuery> {
    non_blank(Some(text)).map(|text| SearchQuery::ByFreeText { text, limit })
}

/// Split an `Artist - Title` file stem on the first ` - `.
pub fn split_artist_title(stem: &str) -> Option<(String, String)> {
    let (artist, title) = stem.split_once(" - ")?;
    let artist = artist.trim();
    let title = title.trim();
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some((artist.to_string(), title.to_string()))
}

/// Artist and title to look a recording up by.
///
/// Both come from the tags when both are set. Otherwise both come from an
/// `Artist - Title` file name; the two sources are never mixed.
pub fn lookup_pair(item: &MediaItem) -> Option<(String, String)> {
    let artist = non_blank(item.tags.value(fields::ARTIST));
    let title = non_blank(item.tags.value(fields::TITLE));

    match (artist, title) {
        (Some(artist), Some(title)) => Some((artist, title)),
        _ => item.file_stem().and_then(split_artist_title),
    }
}

/// Genre queries for an item: recording-level first, artist-level fallback.
///
/// Empty without a [`lookup_pair`].
pub fn genre_queries(item: &MediaItem, recording_limit: u32, artist_limit: u32) -> Vec<GenreQuery> {
    let Some((artist, title)) = lookup_pair(item) else {
        return Vec::new();
    };

    vec![
        GenreQuery::Recording {
            artist: artist.clone(),
            title,
            limit: recording_limit,
        },
        GenreQuery::Artist {
            artist,
            limit: artist_limit,
        },
    ]
}
