// playdeck library - playlist browsing on top of a single-owner playback controller
// UI, catalog and device are swappable; only `playback` holds state

pub mod audio;    // device abstraction, tracks, queue
pub mod catalog;  // playlists and where they come from
pub mod config;   // settings and preferences
pub mod playback; // controller state machine and its service loop
pub mod ui;       // terminal and headless consumers

// Export the stuff other modules actually use
pub use audio::{AudioDevice, DeviceError, PlaylistQueue, SimulatedDevice, Track, TrackId};
pub use catalog::{CatalogError, CatalogProvider, JsonCatalog, Playlist};
pub use config::Config;
pub use playback::{
    Command, PlaybackController, PlaybackError, PlaybackState, PlaybackStatus, PlayerHandle, PlayerNotice,
    PlayerService, Progress,
};
