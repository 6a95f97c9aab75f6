use crate::Error;
use crate::List;
use crate::TidalClient;
use crate::deserialize_null_default;
use crate::track::Track;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page size used when listing a user's playlists.
pub const PLAYLISTS_PAGE_SIZE: u32 = 50;

/// Page size used when listing a playlist's items.
pub const PLAYLIST_ITEMS_PAGE_SIZE: u32 = 100;

/// Represents a playlist from the Tidal catalog.
///
/// Every field has a default so the shorter bodies Tidal returns from
/// playlist creation decode too.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Playlist {
    /// Unique playlist identifier (UUID format)
    pub uuid: String,
    /// Playlist title
    pub title: String,
    /// Playlist description
    #[serde(deserialize_with = "deserialize_null_default")]
    pub description: String,
    /// Tidal URL for the playlist
    pub url: Option<String>,
    /// Information about the playlist creator
    pub creator: PlaylistCreator,

    /// Total number of tracks in the playlist
    pub number_of_tracks: u32,
    /// Total number of videos in the playlist
    pub number_of_videos: u32,
    /// Total duration of the playlist in seconds
    pub duration: u32,

    /// ISO timestamp when the playlist was created
    pub created: Option<String>,
    /// ISO timestamp when the playlist was last updated
    pub last_updated: Option<String>,

    /// Type of playlist (e.g., "USER", "EDITORIAL")
    #[serde(rename = "type")]
    pub playlist_type: Option<String>,
    /// Whether the playlist is publicly visible
    pub public_playlist: bool,
}

/// Information about the creator of a playlist.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlaylistCreator {
    /// The user ID of the playlist creator.
    /// Will be None or zero if the playlist creator is not a known user.
    #[serde(default)]
    pub id: Option<u64>,
}

/// One entry of a playlist.
///
/// Tidal playlists can mix tracks and videos; anything else Tidal may add
/// later is kept as `Other` with its type name.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(try_from = "RawPlaylistItem")]
pub enum PlaylistItem {
    Track(Track),
    /// Videos are never transferred, so they stay raw JSON
    Video(Value),
    Other(String),
}

impl PlaylistItem {
    /// The track, if this item is one.
    pub fn as_track(&self) -> Option<&Track> {
        match self {
            PlaylistItem::Track(track) => Some(track),
            _ => None,
        }
    }

    /// The type name Tidal uses for this kind of item.
    pub fn kind(&self) -> &str {
        match self {
            PlaylistItem::Track(_) => "track",
            PlaylistItem::Video(_) => "video",
            PlaylistItem::Other(kind) => kind,
        }
    }
}

/// Wire shape of a playlist item: `{"item": {...}, "type": "track"}`.
///
/// This is an internal helper type used only for deserializing the API response.
#[derive(Debug, Deserialize)]
struct RawPlaylistItem {
    #[serde(default)]
    item: Value,
    #[serde(rename = "type")]
    item_type: String,
}

impl TryFrom<RawPlaylistItem> for PlaylistItem {
    type Error = serde_json::Error;

    fn try_from(raw: RawPlaylistItem) -> Result<Self, Self::Error> {
        match raw.item_type.to_ascii_lowercase().as_str() {
            "track" => Ok(PlaylistItem::Track(serde_json::from_value(raw.item)?)),
            "video" => Ok(PlaylistItem::Video(raw.item)),
            _ => Ok(PlaylistItem::Other(raw.item_type)),
        }
    }
}

impl TidalClient {
    /// Get one page of the items (tracks and videos) of a playlist.
    ///
    /// # Arguments
    ///
    /// * `playlist_id` - The unique identifier (UUID) of the playlist
    /// * `offset` - Number of items to skip (default: 0)
    /// * `limit` - Maximum number of items to return (default: 100)
    pub async fn playlist_items(
        &self,
        playlist_id: &str,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<List<PlaylistItem>, Error> {
        let url = format!("{}/playlists/{playlist_id}/items", self.api_base_url);
        let mut params = self.default_params();
        params["offset"] = offset.unwrap_or(0).into();
        params["limit"] = limit.unwrap_or(PLAYLIST_ITEMS_PAGE_SIZE).into();

        let resp: List<PlaylistItem> = self
            .do_request(Method::GET, &url, Some(params), None, None)
            .await?;

        Ok(resp)
    }

    /// Get every item of a playlist, following pagination to the end.
    pub async fn all_playlist_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>, Error> {
        let mut items = Vec::new();
        let mut offset: u32 = 0;

        loop {
            let page = self
                .playlist_items(playlist_id, Some(offset), Some(PLAYLIST_ITEMS_PAGE_SIZE))
                .await?;

            let fetched = page.items.len();
            let done = fetched == 0 || page.num_left() == 0;
            items.extend(page.items);

            if done {
                break;
            }
            offset += fetched as u32;
        }

        Ok(items)
    }

    /// Get one page of the playlists created by a user.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Owner of the playlists
    /// * `offset` - Number of playlists to skip (default: 0)
    /// * `limit` - Maximum number of playlists to return (default: 50)
    pub async fn user_playlists(
        &self,
        user_id: u64,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<List<Playlist>, Error> {
        let url = format!("{}/users/{user_id}/playlists", self.api_base_url);
        let mut params = self.default_params();
        params["offset"] = offset.unwrap_or(0).into();
        params["limit"] = limit.unwrap_or(PLAYLISTS_PAGE_SIZE).into();

        let resp: List<Playlist> = self
            .do_request(Method::GET, &url, Some(params), None, None)
            .await?;

        Ok(resp)
    }

    /// Get every playlist created by a user, following pagination to the end.
    pub async fn all_user_playlists(&self, user_id: u64) -> Result<Vec<Playlist>, Error> {
        let mut playlists = Vec::new();
        let mut offset: u32 = 0;

        loop {
            let page = self
                .user_playlists(user_id, Some(offset), Some(PLAYLISTS_PAGE_SIZE))
                .await?;

            let fetched = page.items.len();
            let done = fetched == 0 || page.num_left() == 0;
            playlists.extend(page.items);

            if done {
                break;
            }
            offset += fetched as u32;
        }

        Ok(playlists)
    }

    /// Create a new playlist for a user.
    ///
    /// # Returns
    ///
    /// Returns the newly created `Playlist`; its `uuid` identifies it from now on.
    pub async fn create_playlist(
        &self,
        user_id: u64,
        title: &str,
        description: &str,
    ) -> Result<Playlist, Error> {
        let url = format!("{}/users/{user_id}/playlists", self.api_base_url);
        let mut params = self.default_params();
        params["title"] = title.into();
        params["description"] = description.into();

        let resp: Playlist = self
            .do_request(Method::POST, &url, Some(params), None, None)
            .await?;
        Ok(resp)
    }

    /// Insert a single track into a playlist at `to_index`.
    ///
    /// Duplicates are always accepted. The request is sent with
    /// `If-None-Match: *` and the session identifier, which lets Tidal accept
    /// it without the playlist's current ETag. Without `session_id` the
    /// client's own session identifier is sent.
    pub async fn add_track_to_playlist(
        &self,
        playlist_id: &str,
        track_id: &str,
        to_index: usize,
        session_id: Option<&str>,
    ) -> Result<(), Error> {
        let url = format!("{}/playlists/{playlist_id}/items", self.api_base_url);
        let mut params = self.default_params();
        params["trackIds"] = track_id.into();
        params["toIndex"] = to_index.into();
        params["onDupes"] = "ADD".into();

        let mut headers = HeaderMap::new();
        let session_id = session_id
            .map(str::to_string)
            .or_else(|| self.get_session_id());
        if let Some(session_id) = session_id {
            headers.insert("x-tidal-sessionid", HeaderValue::from_str(&session_id)?);
        }

        let _: Value = self
            .do_request(Method::POST, &url, Some(params), Some("*"), Some(headers))
            .await?;

        Ok(())
    }
}
