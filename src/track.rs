use serde::{Deserialize, Serialize};

/// Represents a track from the Tidal catalog.
///
/// A transfer only ever needs the identifier; the rest is decoded when Tidal
/// sends it and shows up in debug output.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Track {
    /// Unique track identifier
    pub id: u64,
    /// Track title
    pub title: String,
    /// Version or remix information
    pub version: Option<String>,
    /// Track number within the album
    pub track_number: u32,
    /// Duration of the track in seconds
    pub duration: u32,
    /// Whether the track contains explicit content
    pub explicit: bool,
    /// International Standard Recording Code (ISRC)
    pub isrc: Option<String>,
    /// Artists credited on the track
    pub artists: Vec<ArtistSummary>,
    /// Album the track belongs to
    pub album: Option<AlbumSummary>,
    /// Tidal URL for the track
    pub url: Option<String>,
}

impl Track {
    /// The identifier in the string form playlists are keyed by.
    pub fn track_id(&self) -> String {
        self.id.to_string()
    }
}

/// Artist credit attached to a track.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ArtistSummary {
    pub id: u64,
    pub name: String,
}

/// A simplified representation of an album used in track listings.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlbumSummary {
    /// Unique album identifier
    pub id: u64,
    /// Album title
    pub title: String,
    /// Album cover image identifier
    pub cover: Option<String>,
}
