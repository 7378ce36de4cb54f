// Playback - the one stateful part of playdeck
// Controller owns the state machine, service runs it on its own event loop

pub mod controller;
pub mod service;
pub mod state;

pub use controller::{Command, ControllerOptions, PlaybackController};
pub use service::{PlayerHandle, PlayerService};
pub use state::{clamp_volume, DeviceOperation, PlaybackState, PlaybackStatus, PlayerNotice, Progress};

use crate::audio::DeviceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The playback loop has exited; commands can no longer be delivered
    #[error("playback service is not running")]
    ServiceStopped,

    #[error("audio device error: {0}")]
    Device(#[from] DeviceError),

    #[error("playback runtime error: {0}")]
    Runtime(String),
}
