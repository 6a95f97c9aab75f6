//! In-memory account used to exercise transfers without a network.
//!
//! Behaves like a Tidal account as far as the `Session` trait can see:
//! playlists are listed in creation order, new playlists get fresh ids and
//! tracks are inserted at the requested index, clamped to the playlist length.

#![allow(dead_code)]

use std::sync::Mutex;
use tidal_transfer::{Error, Playlist, PlaylistItem, Session, TidalApiError, Track};

/// A request the account has served.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UserPlaylists(u64),
    PlaylistItems(String),
    CreatePlaylist(String),
    AddTrack {
        playlist_id: String,
        track_id: String,
        to_index: usize,
        session_id: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct StoredPlaylist {
    pub id: String,
    pub name: String,
    pub items: Vec<PlaylistItem>,
}

#[derive(Default)]
struct AccountState {
    playlists: Vec<StoredPlaylist>,
    created: usize,
    added: usize,
    calls: Vec<Call>,
}

pub struct MemoryAccount {
    user_id: Option<u64>,
    prefix: String,
    fail_after_adds: Option<usize>,
    state: Mutex<AccountState>,
}

pub fn track(id: u64) -> PlaylistItem {
    PlaylistItem::Track(Track {
        id,
        title: format!("Track {id}"),
        ..Default::default()
    })
}

pub fn video(id: u64) -> PlaylistItem {
    PlaylistItem::Video(serde_json::json!({ "id": id, "title": format!("Video {id}") }))
}

fn service_error(status: u16, message: &str) -> Error {
    Error::TidalApiError(TidalApiError {
        status,
        sub_status: 0,
        user_message: message.to_string(),
    })
}

impl MemoryAccount {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id: Some(user_id),
            prefix: format!("u{user_id}"),
            fail_after_adds: None,
            state: Mutex::new(AccountState::default()),
        }
    }

    /// An account whose session was never established.
    pub fn unauthenticated() -> Self {
        Self {
            user_id: None,
            prefix: "anon".to_string(),
            fail_after_adds: None,
            state: Mutex::new(AccountState::default()),
        }
    }

    /// Reject every track added after the first `count`.
    pub fn failing_after_adds(mut self, count: usize) -> Self {
        self.fail_after_adds = Some(count);
        self
    }

    pub fn with_playlist(self, id: &str, name: &str, items: Vec<PlaylistItem>) -> Self {
        self.state
            .lock()
            .unwrap()
            .playlists
            .push(StoredPlaylist {
                id: id.to_string(),
                name: name.to_string(),
                items,
            });
        self
    }

    pub fn playlists(&self) -> Vec<StoredPlaylist> {
        self.state.lock().unwrap().playlists.clone()
    }

    pub fn playlists_named(&self, name: &str) -> Vec<StoredPlaylist> {
        self.playlists()
            .into_iter()
            .filter(|playlist| playlist.name == name)
            .collect()
    }

    /// Track ids of the only playlist called `name`.
    pub fn track_ids(&self, name: &str) -> Vec<String> {
        let playlists = self.playlists_named(name);
        assert_eq!(playlists.len(), 1, "expected one playlist named {name}");
        playlists[0]
            .items
            .iter()
            .filter_map(|item| item.as_track().map(|track| track.track_id()))
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn add_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::AddTrack { .. }))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

impl Session for MemoryAccount {
    fn user_id(&self) -> Result<u64, Error> {
        self.user_id.ok_or(Error::UserAuthenticationRequired)
    }

    fn session_id(&self) -> Option<String> {
        self.user_id.map(|_| format!("{}-session", self.prefix))
    }

    async fn user_playlists(&self, user_id: u64) -> Result<Vec<Playlist>, Error> {
        if Some(user_id) != self.user_id {
            return Err(service_error(403, "Not the owner of these playlists"));
        }

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UserPlaylists(user_id));

        Ok(state
            .playlists
            .iter()
            .map(|playlist| Playlist {
                uuid: playlist.id.clone(),
                title: playlist.name.clone(),
                number_of_tracks: playlist
                    .items
                    .iter()
                    .filter(|item| item.as_track().is_some())
                    .count() as u32,
                ..Default::default()
            })
            .collect())
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::PlaylistItems(playlist_id.to_string()));

        state
            .playlists
            .iter()
            .find(|playlist| playlist.id == playlist_id)
            .map(|playlist| playlist.items.clone())
            .ok_or_else(|| service_error(404, "Playlist not found"))
    }

    async fn create_playlist(
        &self,
        user_id: u64,
        title: &str,
        description: &str,
    ) -> Result<Playlist, Error> {
        if Some(user_id) != self.user_id {
            return Err(service_error(403, "Cannot create playlists for another user"));
        }

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreatePlaylist(title.to_string()));
        state.created += 1;

        let id = format!("{}-new-{}", self.prefix, state.created);
        state.playlists.push(StoredPlaylist {
            id: id.clone(),
            name: title.to_string(),
            items: Vec::new(),
        });

        Ok(Playlist {
            uuid: id,
            title: title.to_string(),
            description: description.to_string(),
            ..Default::default()
        })
    }

    async fn add_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        to_index: usize,
        session_id: Option<&str>,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::AddTrack {
            playlist_id: playlist_id.to_string(),
            track_id: track_id.to_string(),
            to_index,
            session_id: session_id.map(str::to_string),
        });

        if self.fail_after_adds == Some(state.added) {
            return Err(service_error(503, "Service unavailable"));
        }

        let id: u64 = track_id
            .parse()
            .map_err(|_| service_error(400, "Invalid track id"))?;

        let playlist = state
            .playlists
            .iter_mut()
            .find(|playlist| playlist.id == playlist_id)
            .ok_or_else(|| service_error(404, "Playlist not found"))?;

        let index = to_index.min(playlist.items.len());
        playlist.items.insert(index, track(id));
        state.added += 1;

        Ok(())
    }
}
