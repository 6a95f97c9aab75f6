use crate::Error;
use crate::playlist::PlaylistItem;
use crate::session::Session;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index every transferred track is inserted at.
///
/// Tidal inserts at this position rather than appending, so a playlist with
/// three or more tracks does not keep its source order on the target.
pub const DEFAULT_INSERT_INDEX: usize = 1;

/// A source playlist together with its track membership.
///
/// Built once per playlist, complete before it is handed to the saver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistData {
    /// Identifier of the playlist on the source account
    pub id: String,
    /// Playlist name, matched against the target account's playlists
    pub name: String,
    /// Track identifiers in source order, duplicates included
    pub track_ids: Vec<String>,
}

/// Reads playlists and their tracks from the source account.
pub struct SourceLoader<'a, S: Session> {
    session: &'a S,
    user_id: u64,
}

impl<'a, S: Session> SourceLoader<'a, S> {
    /// Fails if the session has no user, i.e. was never authenticated.
    pub fn new(session: &'a S) -> Result<Self, Error> {
        let user_id = session.user_id()?;
        Ok(Self { session, user_id })
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// `(id, name)` of every playlist the source user owns.
    pub async fn list_playlists(&self) -> Result<Vec<(String, String)>, Error> {
        let playlists = self.session.user_playlists(self.user_id).await?;

        Ok(playlists
            .into_iter()
            .map(|playlist| (playlist.uuid, playlist.title))
            .collect())
    }

    /// Identifiers of the tracks in a playlist, in playlist order.
    ///
    /// Videos and any other non-track items are left out.
    pub async fn get_track_ids(&self, playlist_id: &str) -> Result<Vec<String>, Error> {
        let items = self.session.playlist_items(playlist_id).await?;

        Ok(items
            .iter()
            .filter_map(|item| match item {
                PlaylistItem::Track(track) => Some(track.track_id()),
                other => {
                    debug!("Skipping {} item in playlist {}", other.kind(), playlist_id);
                    None
                }
            })
            .collect())
    }

    /// Start a fresh pass over the source playlists.
    ///
    /// Nothing is requested until the cursor is pulled.
    pub fn load_playlists(&self) -> PlaylistCursor<'_, 'a, S> {
        PlaylistCursor {
            loader: self,
            remaining: None,
        }
    }
}

/// Lazy, finite pass over the source playlists.
///
/// The playlist listing is fetched on the first pull; every pull after that
/// fetches the tracks of exactly one playlist.
pub struct PlaylistCursor<'l, 'a, S: Session> {
    loader: &'l SourceLoader<'a, S>,
    remaining: Option<std::vec::IntoIter<(String, String)>>,
}

impl<S: Session> PlaylistCursor<'_, '_, S> {
    async fn pending(&mut self) -> Result<&mut std::vec::IntoIter<(String, String)>, Error> {
        let remaining = match self.remaining.take() {
            Some(remaining) => remaining,
            None => {
                let playlists = self.loader.list_playlists().await?;
                info!("Found {} playlists on source account", playlists.len());
                playlists.into_iter()
            }
        };

        Ok(self.remaining.insert(remaining))
    }

    /// The next playlist with its tracks, or `None` once all have been read.
    pub async fn try_next(&mut self) -> Result<Option<PlaylistData>, Error> {
        let Some((id, name)) = self.pending().await?.next() else {
            return Ok(None);
        };

        let track_ids = self.loader.get_track_ids(&id).await?;
        Ok(Some(PlaylistData {
            id,
            name,
            track_ids,
        }))
    }

    /// Pass over the next `count` playlists without reading their tracks.
    ///
    /// Returns how many were actually skipped.
    pub async fn skip(&mut self, count: usize) -> Result<usize, Error> {
        let pending = self.pending().await?;
        Ok(pending.by_ref().take(count).count())
    }

    /// Read every remaining playlist.
    pub async fn collect(mut self) -> Result<Vec<PlaylistData>, Error> {
        let mut playlists = Vec::new();
        while let Some(playlist) = self.try_next().await? {
            playlists.push(playlist);
        }
        Ok(playlists)
    }
}

/// Writes playlists into the target account.
///
/// Playlist creation is idempotent by name; adding tracks is not, so saving
/// the same playlist twice doubles its tracks.
pub struct TargetSaver<'a, S: Session> {
    session: &'a S,
    user_id: u64,
    session_id: Option<String>,
    insert_index: usize,
}

impl<'a, S: Session> TargetSaver<'a, S> {
    /// Fails if the session has no user, i.e. was never authenticated.
    pub fn new(session: &'a S) -> Result<Self, Error> {
        let user_id = session.user_id()?;
        Ok(Self {
            session,
            user_id,
            session_id: session.session_id(),
            insert_index: DEFAULT_INSERT_INDEX,
        })
    }

    /// Insert tracks at `insert_index` instead of [`DEFAULT_INSERT_INDEX`].
    pub fn with_insert_index(mut self, insert_index: usize) -> Self {
        self.insert_index = insert_index;
        self
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn insert_index(&self) -> usize {
        self.insert_index
    }

    /// Session identifier every track add is made under.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    // Name to id of every playlist on the target. When names repeat, the one
    // listed last wins.
    async fn existing_playlists(&self) -> Result<HashMap<String, String>, Error> {
        let playlists = self.session.user_playlists(self.user_id).await?;

        Ok(playlists
            .into_iter()
            .map(|playlist| (playlist.title, playlist.uuid))
            .collect())
    }

    /// Id of the target playlist called exactly `name`, if there is one.
    ///
    /// Asks the service every time; nothing is cached between calls.
    pub async fn find_existing(&self, name: &str) -> Result<Option<String>, Error> {
        let mut existing = self.existing_playlists().await?;
        Ok(existing.remove(name))
    }

    /// Create an empty playlist called `name` and return its id.
    pub async fn create_playlist(&self, name: &str) -> Result<String, Error> {
        let playlist = self.session.create_playlist(self.user_id, name, "").await?;

        if playlist.uuid.is_empty() {
            return Err(Error::MissingPlaylistId(name.to_string()));
        }

        info!("Created playlist `{}` ({})", name, playlist.uuid);
        Ok(playlist.uuid)
    }

    /// Id of the playlist called `name`, creating it if needed.
    pub async fn ensure_playlist(&self, name: &str) -> Result<String, Error> {
        match self.find_existing(name).await? {
            Some(playlist_id) => {
                debug!("Reusing playlist `{}` ({})", name, playlist_id);
                Ok(playlist_id)
            }
            None => self.create_playlist(name).await,
        }
    }

    /// Add one track to a playlist at the saver's insert index.
    pub async fn add_track(&self, track_id: &str, playlist_id: &str) -> Result<(), Error> {
        debug!("Adding track {} to playlist {}", track_id, playlist_id);
        self.session
            .add_track(
                playlist_id,
                track_id,
                self.insert_index,
                self.session_id.as_deref(),
            )
            .await
    }

    /// Make sure the playlist exists on the target, then add its tracks one
    /// by one in source order.
    ///
    /// Returns the number of tracks added. A failure leaves the tracks added
    /// so far in place.
    pub async fn save_playlist(&self, playlist: &PlaylistData) -> Result<usize, Error> {
        let playlist_id = self.ensure_playlist(&playlist.name).await?;
        info!("Save tracks to playlist `{}`", playlist.name);

        for track_id in &playlist.track_ids {
            self.add_track(track_id, &playlist_id).await?;
        }

        Ok(playlist.track_ids.len())
    }
}

/// Work done by a transfer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
    /// Source playlists passed over without being read
    pub skipped: usize,
    /// Playlists saved to the target
    pub playlists: usize,
    /// Tracks added to the target
    pub tracks: usize,
}

/// Copy every playlist of `source` to `target`, one playlist at a time.
///
/// The first error stops the run and is returned as is. Running again
/// reuses the playlists already created but adds their tracks a second time.
pub async fn transfer_playlists<S, T>(source: &S, target: &T) -> Result<TransferReport, Error>
where
    S: Session,
    T: Session,
{
    transfer_playlists_from(source, target, 0).await
}

/// Like [`transfer_playlists`], but starts after the first `skip` source
/// playlists.
///
/// Lets an interrupted run pick up where it stopped without adding the
/// tracks of already finished playlists again.
pub async fn transfer_playlists_from<S, T>(
    source: &S,
    target: &T,
    skip: usize,
) -> Result<TransferReport, Error>
where
    S: Session,
    T: Session,
{
    let source_loader = SourceLoader::new(source)?;
    let target_saver = TargetSaver::new(target)?;
    let mut report = TransferReport::default();

    info!("Load tracks from source account.");
    let mut playlists = source_loader.load_playlists();

    if skip > 0 {
        report.skipped = playlists.skip(skip).await?;
        info!("Skipped {} playlists", report.skipped);
    }

    while let Some(playlist) = playlists.try_next().await? {
        report.tracks += target_saver.save_playlist(&playlist).await?;
        report.playlists += 1;
    }

    Ok(report)
}
