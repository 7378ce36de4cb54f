// Catalog - where tracks and playlists come from
// The playback side never fetches; it only gets tracks handed to `play`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::audio::{Track, TrackId};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("playlist not found: {0}")]
    PlaylistNotFound(String),
}

/// A named grouping of tracks, used as the queue when one of them is played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "songs")]
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn queue(&self) -> Arc<[Track]> {
        Arc::from(self.tracks.as_slice())
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn find_track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| &track.id == id)
    }

    fn matches(&self, key: &str) -> bool {
        self.id == key || self.name.eq_ignore_ascii_case(key)
    }
}

pub trait CatalogProvider {
    /// All playlists, newest first.
    fn playlists(&self) -> Result<Vec<Playlist>, CatalogError>;

    /// Look a playlist up by id, or by name ignoring ASCII case.
    fn playlist(&self, key: &str) -> Result<Playlist, CatalogError> {
        self.playlists()?
            .into_iter()
            .find(|playlist| playlist.matches(key))
            .ok_or_else(|| CatalogError::PlaylistNotFound(key.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    playlists: Vec<Playlist>,
}

/// Catalog exported to a JSON file: `{ "playlists": [ { "id", "name", "tracks": [...] } ] }`.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogProvider for JsonCatalog {
    fn playlists(&self) -> Result<Vec<Playlist>, CatalogError> {
        let content = fs::read_to_string(&self.path).map_err(|source| CatalogError::Read {
            path: self.path.clone(),
            source,
        })?;
        let file: CatalogFile = serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let mut playlists = file.playlists;
        for playlist in playlists.iter().filter(|p| p.is_empty()) {
            warn!("Playlist '{}' has no tracks", playlist.name);
        }
        sort_newest_first(&mut playlists);
        info!("Loaded {} playlists from {}", playlists.len(), self.path.display());
        Ok(playlists)
    }
}

/// Newest `created_at` first; undated playlists keep their order at the end.
pub fn sort_newest_first(playlists: &mut [Playlist]) {
    playlists.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
