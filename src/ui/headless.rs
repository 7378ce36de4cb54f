// Headless mode - no terminal UI, one printed line per playback transition

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::catalog::Playlist;
use crate::playback::{PlaybackError, PlaybackState, PlaybackStatus, PlayerHandle};

pub struct StatusPrinter {
    player: PlayerHandle,
}

impl StatusPrinter {
    pub fn new(player: PlayerHandle) -> Result<Self, PlaybackError> {
        player.ensure_running()?;
        Ok(Self { player })
    }

    /// Play `playlist` from its first track and print every state change until
    /// playback stops or ctrl-c arrives.
    pub async fn run(&self, playlist: &Playlist) -> Result<()> {
        let Some(first) = playlist.tracks.first() else {
            println!("Playlist '{}' is empty, nothing to play", playlist.name);
            return Ok(());
        };

        let mut states = self.player.subscribe();
        let mut notices = self.player.notices();
        states.mark_unchanged();
        self.player.play(first.clone(), playlist.queue())?;
        info!("Headless playback of '{}'", playlist.name);

        let mut started = false;
        loop {
            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        warn!("Playback service stopped");
                        break;
                    }
                    let state = states.borrow_and_update().clone();
                    println!("{}", describe(&state));
                    match state.status() {
                        PlaybackStatus::Playing => started = true,
                        _ if started => break,
                        _ => {}
                    }
                }
                notice = notices.recv() => match notice {
                    Ok(notice) => eprintln!("warning: {}", notice),
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    println!("Interrupted");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// One-line summary of a snapshot.
pub fn describe(state: &PlaybackState) -> String {
    let Some(track) = state.current_track() else {
        return "Stopped".to_string();
    };

    let status = match state.status() {
        PlaybackStatus::Playing => "Playing",
        _ => "Paused",
    };
    let position = if state.queue().is_empty() {
        String::new()
    } else {
        format!(" {}/{}", state.current_index() + 1, state.queue().len())
    };
    let looping = if state.is_looping() { ", loop" } else { "" };

    format!(
        "{}{}: {} - {} (vol {:.0}%{})",
        status,
        position,
        track.display_artist(),
        track.display_title(),
        state.volume() * 100.0,
        looping
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{SimulatedDevice, Track};
    use crate::playback::{ControllerOptions, PlaybackController};

    #[test]
    fn test_describe_idle() {
        assert_eq!(describe(&PlaybackState::new()), "Stopped");
    }

    #[test]
    fn test_describe_playing_and_paused() {
        let tracks = vec![
            Track::new("a", "Alpha", "Band", "file:///a.mp3"),
            Track::new("b", "", "", "file:///b.mp3"),
        ];
        let (mut controller, _events) = PlaybackController::new(SimulatedDevice::new(), ControllerOptions::default());
        controller.play(tracks[1].clone(), tracks.clone());
        controller.set_volume(0.5);

        assert_eq!(
            describe(controller.state()),
            "Playing 2/2: Unknown Artist - Unknown (vol 50%, loop)"
        );

        controller.toggle_loop();
        controller.pause();
        assert_eq!(
            describe(controller.state()),
            "Paused 2/2: Unknown Artist - Unknown (vol 50%)"
        );
    }
}
