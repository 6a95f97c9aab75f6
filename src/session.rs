use crate::Error;
use crate::TidalClient;
use crate::playlist::{Playlist, PlaylistItem};
use serde::{Deserialize, Serialize};

/// Identity of an authenticated session, as reported by Tidal's `sessions`
/// endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Tidal session identifier
    pub session_id: String,
    /// ID of the user the session belongs to
    pub user_id: u64,
    /// Country the account is registered in
    pub country_code: String,
}

/// What a transfer needs from an authenticated account.
///
/// [`TidalClient`] is the real implementation. Everything is sequential:
/// callers await each operation before issuing the next one.
#[allow(async_fn_in_trait)]
pub trait Session {
    /// ID of the account's user.
    ///
    /// Fails with [`Error::UserAuthenticationRequired`] before the session
    /// has been established.
    fn user_id(&self) -> Result<u64, Error>;

    /// Session identifier sent along with playlist modifications.
    fn session_id(&self) -> Option<String>;

    /// Every playlist owned by `user_id`, in the order Tidal lists them.
    async fn user_playlists(&self, user_id: u64) -> Result<Vec<Playlist>, Error>;

    /// Every item of a playlist, in playlist order.
    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>, Error>;

    /// Create an empty playlist owned by `user_id`.
    async fn create_playlist(
        &self,
        user_id: u64,
        title: &str,
        description: &str,
    ) -> Result<Playlist, Error>;

    /// Insert one track into a playlist at `to_index`.
    ///
    /// `session_id` identifies the session the modification is made under.
    async fn add_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        to_index: usize,
        session_id: Option<&str>,
    ) -> Result<(), Error>;
}

impl Session for TidalClient {
    fn user_id(&self) -> Result<u64, Error> {
        self.get_user_id().ok_or(Error::UserAuthenticationRequired)
    }

    fn session_id(&self) -> Option<String> {
        self.get_session_id()
    }

    async fn user_playlists(&self, user_id: u64) -> Result<Vec<Playlist>, Error> {
        self.all_user_playlists(user_id).await
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>, Error> {
        self.all_playlist_items(playlist_id).await
    }

    async fn create_playlist(
        &self,
        user_id: u64,
        title: &str,
        description: &str,
    ) -> Result<Playlist, Error> {
        TidalClient::create_playlist(self, user_id, title, description).await
    }

    async fn add_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        to_index: usize,
        session_id: Option<&str>,
    ) -> Result<(), Error> {
        self.add_track_to_playlist(playlist_id, track_id, to_index, session_id)
            .await
    }
}
