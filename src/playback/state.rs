use std::fmt;
use std::time::Duration;

use crate::audio::{PlaylistQueue, Track, TrackId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Paused,
    Playing,
}

/// Everything consumers can observe about playback.
///
/// Only the controller writes it; consumers receive clones.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub(super) current_track: Option<Track>,
    pub(super) is_playing: bool,
    pub(super) volume: f32,
    pub(super) is_looping: bool,
    pub(super) queue: PlaylistQueue,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::with_settings(1.0, true)
    }

    pub(crate) fn with_settings(volume: f32, is_looping: bool) -> Self {
        Self {
            current_track: None,
            is_playing: false,
            volume: clamp_volume(volume),
            is_looping,
            queue: PlaylistQueue::empty(),
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping
    }

    pub fn queue(&self) -> &PlaylistQueue {
        &self.queue
    }

    pub fn current_index(&self) -> usize {
        self.queue.index()
    }

    pub fn status(&self) -> PlaybackStatus {
        match (&self.current_track, self.is_playing) {
            (None, _) => PlaybackStatus::Idle,
            (Some(_), true) => PlaybackStatus::Playing,
            (Some(_), false) => PlaybackStatus::Paused,
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp into `0.0..=1.0`; NaN counts as silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Elapsed/total time mirrored from the device. Never part of `PlaybackState`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    pub elapsed: Duration,
    pub duration: Option<Duration>,
}

impl Progress {
    /// Position as a ratio for gauges; 0.0 while the length is unknown.
    pub fn ratio(&self) -> f64 {
        match self.duration {
            Some(total) if !total.is_zero() => {
                (self.elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOperation {
    Load,
    Play,
    Seek,
}

impl fmt::Display for DeviceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceOperation::Load => "load",
            DeviceOperation::Play => "play",
            DeviceOperation::Seek => "seek",
        };
        f.write_str(name)
    }
}

/// Out-of-band reports for consumers that want to surface problems.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotice {
    DeviceFailure {
        operation: DeviceOperation,
        track: Option<TrackId>,
        message: String,
    },
}

impl fmt::Display for PlayerNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerNotice::DeviceFailure {
                operation,
                track: Some(track),
                message,
            } => write!(f, "{} failed for {}: {}", operation, track, message),
            PlayerNotice::DeviceFailure {
                operation, message, ..
            } => write!(f, "{} failed: {}", operation, message),
        }
    }
}
