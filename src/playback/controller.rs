//! The playback state machine.
//!
//! `PlaybackController` is the only writer of [`PlaybackState`] and the only
//! caller of the audio device. Every command and every device event runs to
//! completion: state is updated first, then the device is reconciled to it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use super::state::{clamp_volume, DeviceOperation, PlaybackState, PlayerNotice, Progress};
use crate::audio::{
    AudioDevice, BindingId, DeviceError, DeviceEvent, DeviceEventKind, DeviceEventSender,
    DeviceSignal, ListenerId, PlaylistQueue, Track,
};
use crate::config::PlaybackConfig;

/// Transport commands accepted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play { track: Track, queue: Arc<[Track]> },
    Pause,
    Toggle,
    Next,
    Previous,
    SetVolume(f32),
    ToggleLoop,
    Seek(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerOptions {
    pub initial_volume: f32,
    pub start_looping: bool,
    pub reset_on_device_error: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            start_looping: true,
            reset_on_device_error: false,
        }
    }
}

impl From<&PlaybackConfig> for ControllerOptions {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            initial_volume: config.initial_volume,
            start_looping: config.start_looping,
            reset_on_device_error: config.reset_on_device_error,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Forward,
    Back,
}

/// The state an end-of-track listener was acquired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListenerKey {
    volume_bits: u32,
    is_looping: bool,
    queue_len: usize,
    index: usize,
}

impl ListenerKey {
    fn of(state: &PlaybackState) -> Self {
        Self {
            volume_bits: state.volume.to_bits(),
            is_looping: state.is_looping,
            queue_len: state.queue.len(),
            index: state.queue.index(),
        }
    }
}

struct ScopedListener {
    id: ListenerId,
    key: ListenerKey,
}

// Released listeners remembered per binding, so an end-of-track already in
// flight when the key changed is still judged by the key it was sent under
const RELEASED_LISTENER_LIMIT: usize = 16;

/// What reconciliation compares against.
#[derive(Debug, Clone, Copy)]
struct Before {
    is_playing: bool,
    epoch: u64,
}

pub struct PlaybackController<D: AudioDevice> {
    state: PlaybackState,
    device: D,
    events: DeviceEventSender,
    binding: Option<BindingId>,
    // Bumped every time `current_track` is assigned, even to an equal track
    track_epoch: u64,
    ended_listener: Option<ScopedListener>,
    released_listeners: VecDeque<ScopedListener>,
    progress_listener: ListenerId,
    progress: Progress,
    notices: Option<broadcast::Sender<PlayerNotice>>,
    reset_on_device_error: bool,
}

impl<D: AudioDevice> PlaybackController<D> {
    /// Take ownership of `device`. The returned receiver yields the device
    /// events to feed back through [`handle_device_event`](Self::handle_device_event).
    pub fn new(mut device: D, options: ControllerOptions) -> (Self, mpsc::UnboundedReceiver<DeviceEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let state = PlaybackState::with_settings(options.initial_volume, options.start_looping);

        device.set_volume(state.volume);
        let progress_listener = device.subscribe(
            &[
                DeviceEventKind::Progressed,
                DeviceEventKind::MetadataLoaded,
                DeviceEventKind::Failed,
            ],
            events.clone(),
        );

        let mut controller = Self {
            state,
            device,
            events,
            binding: None,
            track_epoch: 0,
            ended_listener: None,
            released_listeners: VecDeque::new(),
            progress_listener,
            progress: Progress::default(),
            notices: None,
            reset_on_device_error: options.reset_on_device_error,
        };
        controller.sync_ended_listener();
        (controller, receiver)
    }

    pub fn with_notices(mut self, notices: broadcast::Sender<PlayerNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Play { track, queue } => self.play(track, queue),
            Command::Pause => self.pause(),
            Command::Toggle => self.toggle(),
            Command::Next => self.next(),
            Command::Previous => self.previous(),
            Command::SetVolume(volume) => self.set_volume(volume),
            Command::ToggleLoop => self.toggle_loop(),
            Command::Seek(position) => self.seek(position),
        }
    }

    /// Start `track`, with `queue` as the new navigation context.
    ///
    /// When `track` is not part of `queue` the position falls back to 0 and
    /// the track still plays.
    pub fn play(&mut self, track: Track, queue: impl Into<Arc<[Track]>>) {
        let before = self.before();
        let queue = PlaylistQueue::from_tracks(queue, &track.id);
        info!(
            track = %track.id,
            index = queue.index(),
            queue_len = queue.len(),
            "Playing '{}'",
            track.display_title()
        );

        self.state.queue = queue;
        self.state.current_track = Some(track);
        self.state.is_playing = true;
        self.track_epoch += 1;
        self.commit(before);
    }

    pub fn pause(&mut self) {
        let before = self.before();
        self.state.is_playing = false;
        self.commit(before);
    }

    pub fn toggle(&mut self) {
        if self.state.current_track.is_none() {
            debug!("Toggle ignored, nothing loaded");
            return;
        }
        let before = self.before();
        self.state.is_playing = !self.state.is_playing;
        self.commit(before);
    }

    pub fn next(&mut self) {
        self.navigate(Step::Forward);
    }

    pub fn previous(&mut self) {
        self.navigate(Step::Back);
    }

    pub fn set_volume(&mut self, volume: f32) {
        let before = self.before();
        self.state.volume = clamp_volume(volume);
        self.device.set_volume(self.state.volume);
        self.commit(before);
    }

    pub fn toggle_loop(&mut self) {
        let before = self.before();
        self.state.is_looping = !self.state.is_looping;
        debug!(looping = self.state.is_looping, "Loop toggled");
        self.commit(before);
    }

    /// Move the playhead of the bound resource. Clamped to the known length.
    pub fn seek(&mut self, position: Duration) {
        if self.binding.is_none() {
            debug!("Seek ignored, no resource bound");
            return;
        }
        let target = match self.progress.duration.or_else(|| self.device.duration()) {
            Some(total) => position.min(total),
            None => position,
        };
        match self.device.set_current_time(target) {
            Ok(()) => self.progress.elapsed = target,
            Err(e) => self.report(DeviceOperation::Seek, e),
        }
    }

    /// React to one device event. Returns true when `PlaybackState` changed.
    ///
    /// Events from a superseded binding are dropped. An end-of-track for the
    /// live binding that reached a listener released in the meantime is
    /// handled with the looping flag that listener was acquired under.
    pub fn handle_device_event(&mut self, event: DeviceEvent) -> bool {
        if self.binding != Some(event.binding) {
            trace!(binding = event.binding.get(), "Dropping event from superseded binding");
            return false;
        }

        match event.signal {
            DeviceSignal::Progressed { elapsed, duration } => {
                self.progress.elapsed = elapsed;
                if duration.is_some() {
                    self.progress.duration = duration;
                }
                false
            }
            DeviceSignal::MetadataLoaded { duration } => {
                self.progress.duration = duration;
                false
            }
            DeviceSignal::Ended => {
                let Some(looping) = self.looping_for(event.listener) else {
                    debug!("Dropping end-of-track from an unknown listener");
                    return false;
                };
                self.track_ended(looping);
                true
            }
            DeviceSignal::Failed { reason } => {
                // Unbound, so resuming loads the track again
                self.binding = None;
                let before = self.before();
                self.report_message(DeviceOperation::Load, reason);
                let changed = before.is_playing != self.state.is_playing;
                self.commit(before);
                changed
            }
        }
    }

    /// Give the device a chance to emit events.
    pub fn poll_device(&mut self) {
        self.device.poll();
    }

    /// Silence the device and release listeners.
    pub fn shutdown(&mut self) {
        self.device.pause();
        if let Some(listener) = self.ended_listener.take() {
            self.device.unsubscribe(listener.id);
        }
        self.device.unsubscribe(self.progress_listener);
    }

    fn looping_for(&self, listener: ListenerId) -> Option<bool> {
        match &self.ended_listener {
            Some(live) if live.id == listener => Some(self.state.is_looping),
            _ => self
                .released_listeners
                .iter()
                .find(|released| released.id == listener)
                .map(|released| {
                    trace!("End-of-track reached a released listener, using its key");
                    released.key.is_looping
                }),
        }
    }

    fn track_ended(&mut self, looping: bool) {
        self.released_listeners.clear();
        let before = self.before();
        if looping && !self.state.queue.is_empty() {
            debug!("Track ended, advancing");
            self.advance(Step::Forward);
        } else {
            debug!("Track ended, stopping");
            self.state.is_playing = false;
        }
        self.commit(before);
    }

    fn navigate(&mut self, step: Step) {
        if self.state.queue.is_empty() {
            debug!(?step, "Navigation ignored, queue is empty");
            return;
        }
        let before = self.before();
        self.advance(step);
        self.commit(before);
    }

    fn advance(&mut self, step: Step) {
        let track = match step {
            Step::Forward => self.state.queue.step_forward(),
            Step::Back => self.state.queue.step_back(),
        }
        .cloned();
        if let Some(track) = track {
            debug!(index = self.state.queue.index(), track = %track.id, "Moved to '{}'", track.display_title());
            self.state.current_track = Some(track);
            self.track_epoch += 1;
        }
    }

    fn before(&self) -> Before {
        Before {
            is_playing: self.state.is_playing,
            epoch: self.track_epoch,
        }
    }

    /// Bring the device in line with the state after a transition.
    fn commit(&mut self, before: Before) {
        if self.track_epoch != before.epoch {
            self.rebind();
        } else if self.state.is_playing != before.is_playing {
            if self.state.is_playing {
                self.start();
            } else {
                self.device.pause();
            }
        }
        self.sync_ended_listener();
    }

    fn rebind(&mut self) {
        self.binding = None;
        self.released_listeners.clear();
        self.progress = Progress::default();

        let Some(url) = self.state.current_track.as_ref().map(|track| track.media_url.clone()) else {
            self.device.pause();
            return;
        };

        match self.device.load(&url) {
            Ok(binding) => {
                trace!(binding = binding.get(), "Resource bound");
                self.binding = Some(binding);
            }
            Err(e) => {
                self.report(DeviceOperation::Load, e);
                return;
            }
        }

        if self.state.is_playing {
            self.start_bound();
        } else {
            self.device.pause();
        }
    }

    fn start(&mut self) {
        if self.binding.is_none() {
            // An earlier load failed; try the current track again
            self.rebind();
        } else {
            self.start_bound();
        }
    }

    fn start_bound(&mut self) {
        if let Err(e) = self.device.play() {
            self.report(DeviceOperation::Play, e);
        }
    }

    fn sync_ended_listener(&mut self) {
        let key = ListenerKey::of(&self.state);
        if matches!(&self.ended_listener, Some(listener) if listener.key == key) {
            return;
        }
        if let Some(previous) = self.ended_listener.take() {
            self.device.unsubscribe(previous.id);
            if self.released_listeners.len() == RELEASED_LISTENER_LIMIT {
                self.released_listeners.pop_front();
            }
            self.released_listeners.push_back(previous);
        }
        let id = self.device.subscribe(&[DeviceEventKind::Ended], self.events.clone());
        self.ended_listener = Some(ScopedListener { id, key });
    }

    fn report(&mut self, operation: DeviceOperation, error: DeviceError) {
        self.report_message(operation, error.to_string());
    }

    fn report_message(&mut self, operation: DeviceOperation, message: String) {
        let track = self.state.current_track.as_ref().map(|track| track.id.clone());
        warn!(%operation, track = ?track, "Device {} failed: {}", operation, message);

        if let Some(notices) = &self.notices {
            // No receivers is fine
            let _ = notices.send(PlayerNotice::DeviceFailure {
                operation,
                track,
                message,
            });
        }

        if self.reset_on_device_error && operation != DeviceOperation::Seek && self.state.is_playing {
            info!("Pausing after device failure");
            self.state.is_playing = false;
        }
    }
}
