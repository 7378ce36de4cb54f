use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    // UI Events
    Quit,
    Tick,
    Render,

    // Playback Events
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    SeekForward,
    SeekBackward,

    // Navigation Events
    Up,
    Down,
    Enter,
    SwitchPane,

    // Volume Events
    VolumeUp,
    VolumeDown,

    // Playlist Events
    ToggleLoop,
}

pub struct EventHandler {
    event_sender: mpsc::UnboundedSender<AppEvent>,
    event_receiver: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        Self {
            event_sender,
            event_receiver,
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.event_sender.clone()
    }

    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.event_receiver.recv().await
    }

    /// Read terminal input on its own thread; emits a `Tick` every `tick_rate`.
    pub fn start_input(&self, tick_rate: Duration) -> std::io::Result<()> {
        let sender = self.sender();
        std::thread::Builder::new()
            .name("playdeck-input".to_string())
            .spawn(move || loop {
                match event::poll(tick_rate) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                            if let Some(app_event) = key_to_app_event(key) {
                                if sender.send(app_event).is_err() {
                                    return;
                                }
                            }
                        }
                        Ok(Event::Resize(_, _)) => {
                            let _ = sender.send(AppEvent::Render);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Terminal read failed: {}", e);
                            return;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Terminal poll failed: {}", e);
                        return;
                    }
                }

                if sender.send(AppEvent::Tick).is_err() {
                    return;
                }
            })?;
        Ok(())
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

pub fn key_to_app_event(key: KeyEvent) -> Option<AppEvent> {
    match key.code {
        // Quit
        KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Quit),

        // Playback controls
        KeyCode::Char(' ') => Some(AppEvent::TogglePlayPause),
        KeyCode::Char('n') | KeyCode::Right => Some(AppEvent::NextTrack),
        KeyCode::Char('b') | KeyCode::Left => Some(AppEvent::PreviousTrack),
        KeyCode::Char('.') => Some(AppEvent::SeekForward),
        KeyCode::Char(',') => Some(AppEvent::SeekBackward),

        // Navigation
        KeyCode::Up => Some(AppEvent::Up),
        KeyCode::Down => Some(AppEvent::Down),
        KeyCode::Enter => Some(AppEvent::Enter),
        KeyCode::Tab => Some(AppEvent::SwitchPane),

        // Volume
        KeyCode::Char('+') | KeyCode::Char('=') => Some(AppEvent::VolumeUp),
        KeyCode::Char('-') => Some(AppEvent::VolumeDown),

        // Loop
        KeyCode::Char('r') => Some(AppEvent::ToggleLoop),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[test]
    fn test_key_bindings() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(key_to_app_event(key(KeyCode::Char(' '))), Some(AppEvent::TogglePlayPause));
        assert_eq!(key_to_app_event(key(KeyCode::Right)), Some(AppEvent::NextTrack));
        assert_eq!(key_to_app_event(key(KeyCode::Char('b'))), Some(AppEvent::PreviousTrack));
        assert_eq!(key_to_app_event(key(KeyCode::Char('r'))), Some(AppEvent::ToggleLoop));
        assert_eq!(key_to_app_event(key(KeyCode::Tab)), Some(AppEvent::SwitchPane));
        assert_eq!(key_to_app_event(key(KeyCode::Char('x'))), None);
    }
}
