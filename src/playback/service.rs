//! The process-wide playback service.
//!
//! One `PlayerService` is spawned at startup and every consumer receives a
//! [`PlayerHandle`] to it; there is no global player. The controller and its
//! device live on a dedicated thread running a single-threaded event loop, so
//! commands and device events are handled strictly one at a time.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::controller::{Command, ControllerOptions, PlaybackController};
use super::state::{PlaybackState, PlayerNotice, Progress};
use super::PlaybackError;
use crate::audio::{AudioDevice, DeviceError, DeviceEvent, Track};
use crate::config::PlaybackConfig;

const NOTICE_CAPACITY: usize = 32;

enum Request {
    Command(Command),
    Shutdown,
}

/// Cloneable access to the running service: the command surface plus
/// read-only views of its state.
#[derive(Clone)]
pub struct PlayerHandle {
    requests: mpsc::UnboundedSender<Request>,
    state: watch::Receiver<PlaybackState>,
    progress: watch::Receiver<Progress>,
    notices: broadcast::Sender<PlayerNotice>,
}

impl PlayerHandle {
    fn send(&self, command: Command) -> Result<(), PlaybackError> {
        self.requests
            .send(Request::Command(command))
            .map_err(|_| PlaybackError::ServiceStopped)
    }

    pub fn play(&self, track: Track, queue: impl Into<Arc<[Track]>>) -> Result<(), PlaybackError> {
        self.send(Command::Play {
            track,
            queue: queue.into(),
        })
    }

    pub fn pause(&self) -> Result<(), PlaybackError> {
        self.send(Command::Pause)
    }

    pub fn toggle(&self) -> Result<(), PlaybackError> {
        self.send(Command::Toggle)
    }

    pub fn next(&self) -> Result<(), PlaybackError> {
        self.send(Command::Next)
    }

    pub fn previous(&self) -> Result<(), PlaybackError> {
        self.send(Command::Previous)
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.send(Command::SetVolume(volume))
    }

    pub fn toggle_loop(&self) -> Result<(), PlaybackError> {
        self.send(Command::ToggleLoop)
    }

    pub fn seek(&self, position: Duration) -> Result<(), PlaybackError> {
        self.send(Command::Seek(position))
    }

    /// Latest published state.
    pub fn snapshot(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// Change notifications for every published transition.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    pub fn watch_progress(&self) -> watch::Receiver<Progress> {
        self.progress.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<PlayerNotice> {
        self.notices.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }

    /// Consumers call this when they are built so a dead service is noticed
    /// up front rather than as silently stale data.
    pub fn ensure_running(&self) -> Result<(), PlaybackError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(PlaybackError::ServiceStopped)
        }
    }

    pub fn shutdown(&self) {
        let _ = self.requests.send(Request::Shutdown);
    }
}

pub struct PlayerService {
    handle: PlayerHandle,
    thread: Option<JoinHandle<()>>,
}

impl PlayerService {
    /// Start the playback thread. `factory` builds the device on that thread,
    /// so devices that are not `Send` work; its error is returned from here.
    pub fn spawn<D, F>(config: &PlaybackConfig, factory: F) -> Result<Self, PlaybackError>
    where
        D: AudioDevice + 'static,
        F: FnOnce() -> Result<D, DeviceError> + Send + 'static,
    {
        let options = ControllerOptions::from(config);
        let poll_interval = Duration::from_millis(config.poll_interval_ms.max(1));

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let initial = PlaybackState::with_settings(options.initial_volume, options.start_looping);
        let (state_tx, state_rx) = watch::channel(initial);
        let (progress_tx, progress_rx) = watch::channel(Progress::default());
        let (notices_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        let loop_notices = notices_tx.clone();
        let thread = std::thread::Builder::new()
            .name("playdeck-playback".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(PlaybackError::Runtime(e.to_string())));
                        return;
                    }
                };
                let device = match factory() {
                    Ok(device) => device,
                    Err(e) => {
                        let _ = ready_tx.send(Err(PlaybackError::Device(e)));
                        return;
                    }
                };

                let (controller, device_events) = PlaybackController::new(device, options);
                let controller = controller.with_notices(loop_notices);
                let _ = ready_tx.send(Ok(()));

                runtime.block_on(run_loop(
                    controller,
                    device_events,
                    requests_rx,
                    state_tx,
                    progress_tx,
                    poll_interval,
                ));
            })
            .map_err(|e| PlaybackError::Runtime(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(PlaybackError::ServiceStopped);
            }
        }

        info!("Playback service started");
        Ok(Self {
            handle: PlayerHandle {
                requests: requests_tx,
                state: state_rx,
                progress: progress_rx,
                notices: notices_tx,
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> PlayerHandle {
        self.handle.clone()
    }

    /// Stop the loop and wait for the playback thread.
    pub fn shutdown(mut self) -> Result<(), PlaybackError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        self.handle.shutdown();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| PlaybackError::Runtime("playback thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for PlayerService {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
    }
}

async fn run_loop<D: AudioDevice>(
    mut controller: PlaybackController<D>,
    mut device_events: mpsc::UnboundedReceiver<DeviceEvent>,
    mut requests: mpsc::UnboundedReceiver<Request>,
    state_tx: watch::Sender<PlaybackState>,
    progress_tx: watch::Sender<Progress>,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(interval_ms = poll_interval.as_millis() as u64, "Playback loop running");

    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(Request::Command(command)) => {
                    debug!(?command, "Command");
                    controller.apply(command);
                }
                Some(Request::Shutdown) | None => break,
            },
            Some(event) = device_events.recv() => {
                controller.handle_device_event(event);
            }
            _ = ticker.tick() => controller.poll_device(),
        }
        publish(&controller, &state_tx, &progress_tx);
    }

    controller.shutdown();
    publish(&controller, &state_tx, &progress_tx);
    info!("Playback loop stopped");
}

fn publish<D: AudioDevice>(
    controller: &PlaybackController<D>,
    state_tx: &watch::Sender<PlaybackState>,
    progress_tx: &watch::Sender<Progress>,
) {
    state_tx.send_if_modified(|published| {
        if published == controller.state() {
            false
        } else {
            *published = controller.state().clone();
            true
        }
    });
    let progress = controller.progress();
    progress_tx.send_if_modified(|published| {
        if *published == progress {
            false
        } else {
            *published = progress;
            true
        }
    });
}
