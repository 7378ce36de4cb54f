// Capability interface for the single audio output the controller drives.
// Any backend (rodio sink, simulated clock, a platform media element) plugs in here.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Identity of one loaded media resource. Every `load` hands out a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic source of binding ids for device implementations.
#[derive(Debug, Default)]
pub struct BindingSequence {
    last: u64,
}

impl BindingSequence {
    pub fn next_id(&mut self) -> BindingId {
        self.last += 1;
        BindingId(self.last)
    }
}

/// Handle returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEventKind {
    Progressed,
    MetadataLoaded,
    Ended,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSignal {
    Progressed {
        elapsed: Duration,
        duration: Option<Duration>,
    },
    MetadataLoaded {
        duration: Option<Duration>,
    },
    Ended,
    /// The bound resource became unplayable after `load` returned, e.g. a
    /// background download or decode failed.
    Failed {
        reason: String,
    },
}

impl DeviceSignal {
    pub fn kind(&self) -> DeviceEventKind {
        match self {
            DeviceSignal::Progressed { .. } => DeviceEventKind::Progressed,
            DeviceSignal::MetadataLoaded { .. } => DeviceEventKind::MetadataLoaded,
            DeviceSignal::Ended => DeviceEventKind::Ended,
            DeviceSignal::Failed { .. } => DeviceEventKind::Failed,
        }
    }
}

/// A signal as delivered to one listener, tagged with the binding it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEvent {
    pub listener: ListenerId,
    pub binding: BindingId,
    pub signal: DeviceSignal,
}

pub type DeviceEventSender = mpsc::UnboundedSender<DeviceEvent>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no media resource is loaded")]
    NoResource,

    #[error("media resource unavailable: {url}: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("playback rejected: {0}")]
    Rejected(String),

    #[error("seek failed: {0}")]
    Seek(String),

    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// One audio output binding.
///
/// Calls never block: loading and decoding may finish later and are reported
/// through subscribed listeners. `load` always releases the previous resource,
/// even when loading the new one fails.
pub trait AudioDevice {
    fn load(&mut self, url: &str) -> Result<BindingId, DeviceError>;

    /// Start (or resume) the loaded resource.
    fn play(&mut self) -> Result<(), DeviceError>;

    fn pause(&mut self);

    fn current_time(&self) -> Duration;

    fn set_current_time(&mut self, position: Duration) -> Result<(), DeviceError>;

    fn volume(&self) -> f32;

    /// `volume` is already clamped to `0.0..=1.0` by the caller.
    fn set_volume(&mut self, volume: f32);

    /// Total length of the loaded resource, once known.
    fn duration(&self) -> Option<Duration>;

    fn subscribe(&mut self, kinds: &[DeviceEventKind], sender: DeviceEventSender) -> ListenerId;

    fn unsubscribe(&mut self, listener: ListenerId);

    /// Driven by the playback loop on a fixed interval. Backends without a
    /// callback thread of their own emit their events from here.
    fn poll(&mut self) {}
}

impl<D: AudioDevice + ?Sized> AudioDevice for Box<D> {
    fn load(&mut self, url: &str) -> Result<BindingId, DeviceError> {
        (**self).load(url)
    }

    fn play(&mut self) -> Result<(), DeviceError> {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn current_time(&self) -> Duration {
        (**self).current_time()
    }

    fn set_current_time(&mut self, position: Duration) -> Result<(), DeviceError> {
        (**self).set_current_time(position)
    }

    fn volume(&self) -> f32 {
        (**self).volume()
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume)
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }

    fn subscribe(&mut self, kinds: &[DeviceEventKind], sender: DeviceEventSender) -> ListenerId {
        (**self).subscribe(kinds, sender)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        (**self).unsubscribe(listener)
    }

    fn poll(&mut self) {
        (**self).poll()
    }
}
