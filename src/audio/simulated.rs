// In-process device with a virtual clock.
// Backs `--simulate` and the test suite; behaves like a media element that
// decodes instantly and never produces sound.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::device::{
    AudioDevice, BindingId, BindingSequence, DeviceError, DeviceEventKind, DeviceEventSender,
    DeviceSignal, ListenerId,
};
use super::events::ListenerSet;

const DEFAULT_TRACK_LENGTH: Duration = Duration::from_secs(180);

/// Every call the controller made, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Load(String),
    Play,
    Pause,
    Seek(Duration),
    SetVolume(f32),
}

struct Loaded {
    binding: BindingId,
    url: String,
    position: Duration,
    length: Duration,
    ended: bool,
}

struct Sim {
    listeners: ListenerSet,
    bindings: BindingSequence,
    loaded: Option<Loaded>,
    playing: bool,
    volume: f32,
    lengths: HashMap<String, Duration>,
    missing: HashSet<String>,
    rejected: HashSet<String>,
    calls: Vec<DeviceCall>,
    realtime: bool,
    last_poll: Option<Instant>,
}

impl Sim {
    fn advance(&mut self, delta: Duration) {
        if !self.playing {
            return;
        }
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        if loaded.ended {
            return;
        }

        loaded.position = (loaded.position + delta).min(loaded.length);
        let binding = loaded.binding;
        let elapsed = loaded.position;
        let length = loaded.length;
        let finished = elapsed >= length;
        if finished {
            loaded.ended = true;
            self.playing = false;
        }

        self.listeners.emit(
            binding,
            DeviceSignal::Progressed {
                elapsed,
                duration: Some(length),
            },
        );
        if finished {
            self.listeners.emit(binding, DeviceSignal::Ended);
        }
    }
}

pub struct SimulatedDevice {
    shared: Arc<Mutex<Sim>>,
}

/// Test-side view of a [`SimulatedDevice`]: drives the virtual hardware and
/// inspects it, but cannot issue transport calls.
#[derive(Clone)]
pub struct SimulatedControls {
    shared: Arc<Mutex<Sim>>,
}

fn lock(shared: &Mutex<Sim>) -> MutexGuard<'_, Sim> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Sim {
                listeners: ListenerSet::new(),
                bindings: BindingSequence::default(),
                loaded: None,
                playing: false,
                volume: 1.0,
                lengths: HashMap::new(),
                missing: HashSet::new(),
                rejected: HashSet::new(),
                calls: Vec::new(),
                realtime: false,
                last_poll: None,
            })),
        }
    }

    /// Advance the clock by wall time on every `poll`.
    pub fn realtime(self) -> Self {
        lock(&self.shared).realtime = true;
        self
    }

    pub fn with_length(self, url: impl Into<String>, length: Duration) -> Self {
        lock(&self.shared).lengths.insert(url.into(), length);
        self
    }

    /// `load` of this url fails as if the resource did not exist.
    pub fn with_missing(self, url: impl Into<String>) -> Self {
        lock(&self.shared).missing.insert(url.into());
        self
    }

    /// `play` of this url is refused, like an autoplay policy would.
    pub fn with_rejected(self, url: impl Into<String>) -> Self {
        lock(&self.shared).rejected.insert(url.into());
        self
    }

    pub fn controls(&self) -> SimulatedControls {
        SimulatedControls {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for SimulatedDevice {
    fn load(&mut self, url: &str) -> Result<BindingId, DeviceError> {
        let mut sim = lock(&self.shared);
        sim.calls.push(DeviceCall::Load(url.to_string()));
        sim.loaded = None;
        sim.playing = false;

        if sim.missing.contains(url) {
            return Err(DeviceError::Unavailable {
                url: url.to_string(),
                reason: "not found".to_string(),
            });
        }

        let binding = sim.bindings.next_id();
        let length = sim.lengths.get(url).copied().unwrap_or(DEFAULT_TRACK_LENGTH);
        sim.loaded = Some(Loaded {
            binding,
            url: url.to_string(),
            position: Duration::ZERO,
            length,
            ended: false,
        });
        sim.listeners.emit(
            binding,
            DeviceSignal::MetadataLoaded {
                duration: Some(length),
            },
        );
        Ok(binding)
    }

    fn play(&mut self) -> Result<(), DeviceError> {
        let mut sim = lock(&self.shared);
        sim.calls.push(DeviceCall::Play);
        let rejected = match sim.loaded.as_ref() {
            None => return Err(DeviceError::NoResource),
            Some(loaded) => sim.rejected.contains(&loaded.url),
        };
        if rejected {
            return Err(DeviceError::Rejected("playback not allowed for this resource".to_string()));
        }
        if let Some(loaded) = sim.loaded.as_mut() {
            if loaded.ended {
                loaded.ended = false;
                loaded.position = Duration::ZERO;
            }
        }
        sim.playing = true;
        sim.last_poll = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        let mut sim = lock(&self.shared);
        sim.calls.push(DeviceCall::Pause);
        sim.playing = false;
    }

    fn current_time(&self) -> Duration {
        lock(&self.shared)
            .loaded
            .as_ref()
            .map(|loaded| loaded.position)
            .unwrap_or(Duration::ZERO)
    }

    fn set_current_time(&mut self, position: Duration) -> Result<(), DeviceError> {
        let mut sim = lock(&self.shared);
        sim.calls.push(DeviceCall::Seek(position));
        let loaded = sim.loaded.as_mut().ok_or(DeviceError::NoResource)?;
        loaded.position = position.min(loaded.length);
        if loaded.position < loaded.length {
            loaded.ended = false;
        }
        Ok(())
    }

    fn volume(&self) -> f32 {
        lock(&self.shared).volume
    }

    fn set_volume(&mut self, volume: f32) {
        let mut sim = lock(&self.shared);
        sim.calls.push(DeviceCall::SetVolume(volume));
        sim.volume = volume;
    }

    fn duration(&self) -> Option<Duration> {
        lock(&self.shared).loaded.as_ref().map(|loaded| loaded.length)
    }

    fn subscribe(&mut self, kinds: &[DeviceEventKind], sender: DeviceEventSender) -> ListenerId {
        lock(&self.shared).listeners.subscribe(kinds, sender)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        lock(&self.shared).listeners.unsubscribe(listener);
    }

    fn poll(&mut self) {
        let mut sim = lock(&self.shared);
        if !sim.realtime {
            return;
        }
        let now = Instant::now();
        let delta = sim.last_poll.map(|last| now - last).unwrap_or(Duration::ZERO);
        sim.last_poll = Some(now);
        sim.advance(delta);
    }
}

impl SimulatedControls {
    /// Move the virtual clock forward; emits progress and, at the end of the
    /// resource, `Ended`.
    pub fn advance(&self, delta: Duration) {
        lock(&self.shared).advance(delta);
    }

    /// Run the loaded resource to its end.
    pub fn finish(&self) {
        let mut sim = lock(&self.shared);
        let remaining = sim
            .loaded
            .as_ref()
            .map(|loaded| loaded.length.saturating_sub(loaded.position))
            .unwrap_or(Duration::ZERO);
        sim.advance(remaining);
    }

    /// Report the loaded resource as broken, like a download dying midway.
    pub fn fail(&self, reason: &str) {
        let mut sim = lock(&self.shared);
        let Some(binding) = sim.loaded.as_ref().map(|loaded| loaded.binding) else {
            return;
        };
        sim.playing = false;
        sim.listeners.emit(
            binding,
            DeviceSignal::Failed {
                reason: reason.to_string(),
            },
        );
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        lock(&self.shared).calls.clone()
    }

    pub fn take_calls(&self) -> Vec<DeviceCall> {
        std::mem::take(&mut lock(&self.shared).calls)
    }

    pub fn loaded_url(&self) -> Option<String> {
        lock(&self.shared).loaded.as_ref().map(|loaded| loaded.url.clone())
    }

    pub fn current_binding(&self) -> Option<BindingId> {
        lock(&self.shared).loaded.as_ref().map(|loaded| loaded.binding)
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.shared).playing
    }

    pub fn volume(&self) -> f32 {
        lock(&self.shared).volume
    }

    pub fn position(&self) -> Duration {
        lock(&self.shared)
            .loaded
            .as_ref()
            .map(|loaded| loaded.position)
            .unwrap_or(Duration::ZERO)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.shared).listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_clock_runs_only_while_playing() {
        let mut device = SimulatedDevice::new().with_length("a", Duration::from_secs(10));
        let controls = device.controls();
        device.load("a").unwrap();

        controls.advance(Duration::from_secs(3));
        assert_eq!(controls.position(), Duration::ZERO);

        device.play().unwrap();
        controls.advance(Duration::from_secs(3));
        assert_eq!(device.current_time(), Duration::from_secs(3));
    }

    #[test]
    fn test_finish_emits_progress_then_ended() {
        let mut device = SimulatedDevice::new().with_length("a", Duration::from_secs(5));
        let controls = device.controls();
        let (tx, mut rx) = mpsc::unbounded_channel();
        device.subscribe(&[DeviceEventKind::Ended, DeviceEventKind::Progressed], tx);

        let binding = device.load("a").unwrap();
        device.play().unwrap();
        controls.finish();

        let first = rx.try_recv().unwrap();
        assert!(matches!(first.signal, DeviceSignal::Progressed { elapsed, .. } if elapsed == Duration::from_secs(5)));
        let second = rx.try_recv().unwrap();
        assert_eq!(second.signal, DeviceSignal::Ended);
        assert_eq!(second.binding, binding);
        assert!(!controls.is_playing());
    }

    #[test]
    fn test_failures_are_reported() {
        let mut device = SimulatedDevice::new().with_missing("gone").with_rejected("blocked");
        assert!(matches!(device.play(), Err(DeviceError::NoResource)));
        assert!(matches!(device.load("gone"), Err(DeviceError::Unavailable { .. })));

        device.load("blocked").unwrap();
        assert!(matches!(device.play(), Err(DeviceError::Rejected(_))));
    }

    #[test]
    fn test_play_after_end_restarts() {
        let mut device = SimulatedDevice::new().with_length("a", Duration::from_secs(2));
        let controls = device.controls();
        device.load("a").unwrap();
        device.play().unwrap();
        controls.finish();

        device.play().unwrap();
        assert_eq!(controls.position(), Duration::ZERO);
        assert!(controls.is_playing());
    }
}
