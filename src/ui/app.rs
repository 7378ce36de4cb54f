use super::{format_time, AppEvent, EventHandler, TerminalManager};
use crate::catalog::Playlist;
use crate::config::UiConfig;
use crate::playback::{PlaybackState, PlaybackStatus, PlayerHandle, PlayerNotice, Progress};
use anyhow::Result;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph},
    Frame,
};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Playlists,
    Tracks,
}

pub struct App {
    config: UiConfig,
    terminal: TerminalManager,
    event_handler: EventHandler,
    player: PlayerHandle,
    notices: broadcast::Receiver<PlayerNotice>,

    // Catalog
    pub playlists: Vec<Playlist>,
    pub playlist_state: ListState,
    pub track_state: ListState,
    pub focus: Pane,

    pub last_notice: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: UiConfig, player: PlayerHandle, playlists: Vec<Playlist>) -> Result<Self> {
        // Refuse to start against a dead service
        player.ensure_running()?;

        let terminal = TerminalManager::new()?;
        let event_handler = EventHandler::new();
        let notices = player.notices();

        let mut playlist_state = ListState::default();
        let mut track_state = ListState::default();
        if let Some(first) = playlists.first() {
            playlist_state.select(Some(0));
            if !first.is_empty() {
                track_state.select(Some(0));
            }
        }

        Ok(Self {
            config,
            terminal,
            event_handler,
            player,
            notices,
            playlists,
            playlist_state,
            track_state,
            focus: Pane::Playlists,
            last_notice: None,
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let tick_rate = Duration::from_millis(self.config.tick_rate_ms.max(10));
        self.event_handler.start_input(tick_rate)?;

        while !self.should_quit {
            self.drain_notices();

            let state = self.player.snapshot();
            let progress = self.player.progress();
            let playlists = &self.playlists;
            let playlist_state = &mut self.playlist_state;
            let track_state = &mut self.track_state;
            let focus = self.focus;
            let notice = self.last_notice.as_deref();

            self.terminal.draw(|f| {
                Self::render_ui(f, &state, progress, playlists, playlist_state, track_state, focus, notice);
            })?;

            match self.event_handler.next_event().await {
                Some(event) => self.handle_event(event, &state, progress)?,
                None => break,
            }
        }

        Ok(())
    }

    fn drain_notices(&mut self) {
        loop {
            match self.notices.try_recv() {
                Ok(notice) => self.last_notice = Some(notice.to_string()),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!("Skipped {} playback notices", skipped);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    warn!("Playback service went away");
                    self.should_quit = true;
                    break;
                }
            }
        }
    }

    fn handle_event(&mut self, event: AppEvent, state: &PlaybackState, progress: Progress) -> Result<()> {
        let seek_step = Duration::from_secs(self.config.seek_step_secs);
        match event {
            AppEvent::Quit => {
                self.should_quit = true;
            }
            AppEvent::TogglePlayPause => self.player.toggle()?,
            AppEvent::NextTrack => self.player.next()?,
            AppEvent::PreviousTrack => self.player.previous()?,
            AppEvent::SeekForward => self.player.seek(progress.elapsed.saturating_add(seek_step))?,
            AppEvent::SeekBackward => self.player.seek(progress.elapsed.saturating_sub(seek_step))?,
            AppEvent::VolumeUp => self.player.set_volume(state.volume() + self.config.volume_step)?,
            AppEvent::VolumeDown => self.player.set_volume(state.volume() - self.config.volume_step)?,
            AppEvent::ToggleLoop => self.player.toggle_loop()?,
            AppEvent::Up => self.move_selection(-1),
            AppEvent::Down => self.move_selection(1),
            AppEvent::SwitchPane => {
                self.focus = match self.focus {
                    Pane::Playlists => Pane::Tracks,
                    Pane::Tracks => Pane::Playlists,
                };
            }
            AppEvent::Enter => match self.focus {
                Pane::Playlists => {
                    if self.selected_playlist().is_some_and(|p| !p.is_empty()) {
                        self.focus = Pane::Tracks;
                        self.track_state.select(Some(0));
                    }
                }
                Pane::Tracks => self.play_selected()?,
            },
            AppEvent::Tick | AppEvent::Render => {}
        }

        Ok(())
    }

    fn play_selected(&mut self) -> Result<()> {
        let Some(playlist) = self.selected_playlist() else {
            return Ok(());
        };
        let Some(track) = self.track_state.selected().and_then(|i| playlist.tracks.get(i)) else {
            return Ok(());
        };
        self.player.play(track.clone(), playlist.queue())?;
        Ok(())
    }

    fn selected_playlist(&self) -> Option<&Playlist> {
        self.playlist_state.selected().and_then(|i| self.playlists.get(i))
    }

    fn move_selection(&mut self, delta: i32) {
        let (len, list_state) = match self.focus {
            Pane::Playlists => (self.playlists.len(), &mut self.playlist_state),
            Pane::Tracks => {
                let len = self
                    .playlist_state
                    .selected()
                    .and_then(|i| self.playlists.get(i))
                    .map_or(0, Playlist::track_count);
                (len, &mut self.track_state)
            }
        };
        if len == 0 {
            return;
        }

        let current = list_state.selected().unwrap_or(0);
        let new_index = if delta < 0 {
            current.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            (current + delta as usize).min(len - 1)
        };
        list_state.select(Some(new_index));

        // A different playlist starts its track list from the top
        if self.focus == Pane::Playlists && new_index != current {
            self.track_state.select(Some(0));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_ui(
        f: &mut Frame,
        state: &PlaybackState,
        progress: Progress,
        playlists: &[Playlist],
        playlist_state: &mut ListState,
        track_state: &mut ListState,
        focus: Pane,
        notice: Option<&str>,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Catalog
                Constraint::Length(3), // Progress
                Constraint::Length(3), // Player controls
            ])
            .split(f.area());

        Self::render_header(f, chunks[0], notice);

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(chunks[1]);
        Self::render_playlists(f, main[0], playlists, playlist_state, focus);
        let selected = playlist_state.selected().and_then(|i| playlists.get(i));
        Self::render_tracks(f, main[1], selected, state, track_state, focus);

        Self::render_progress(f, chunks[2], progress);
        Self::render_player_controls(f, chunks[3], state);
    }

    fn render_header(f: &mut Frame, area: Rect, notice: Option<&str>) {
        let (text, style) = match notice {
            Some(notice) => (format!("playdeck - {}", notice), Style::default().fg(Color::Red)),
            None => (
                "playdeck - Space play/pause  n/b next/prev  +/- volume  r loop  q quit".to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
        };
        let title = Paragraph::new(text)
            .style(style)
            .block(Block::default().borders(Borders::ALL));

        f.render_widget(title, area);
    }

    fn pane_block(title: String, focused: bool) -> Block<'static> {
        let border = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        Block::default().borders(Borders::ALL).border_style(border).title(title)
    }

    fn render_playlists(f: &mut Frame, area: Rect, playlists: &[Playlist], list_state: &mut ListState, focus: Pane) {
        let items: Vec<ListItem> = playlists
            .iter()
            .map(|playlist| ListItem::new(format!("{} ({})", playlist.name, playlist.track_count())))
            .collect();

        let list = List::new(items)
            .block(Self::pane_block("Playlists".to_string(), focus == Pane::Playlists))
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");

        f.render_stateful_widget(list, area, list_state);
    }

    fn render_tracks(
        f: &mut Frame,
        area: Rect,
        playlist: Option<&Playlist>,
        state: &PlaybackState,
        list_state: &mut ListState,
        focus: Pane,
    ) {
        let current = state.current_track().map(|track| &track.id);
        let items: Vec<ListItem> = playlist
            .map(|p| p.tracks.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|track| {
                let is_current = current == Some(&track.id);
                let prefix = if is_current { "* " } else { "  " };
                let content = format!("{}{} - {}", prefix, track.display_artist(), track.display_title());

                let style = if is_current {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };

                ListItem::new(content).style(style)
            })
            .collect();

        let title = playlist.map_or_else(|| "Tracks".to_string(), |p| p.name.clone());
        let list = List::new(items)
            .block(Self::pane_block(title, focus == Pane::Tracks))
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");

        f.render_stateful_widget(list, area, list_state);
    }

    fn render_progress(f: &mut Frame, area: Rect, progress: Progress) {
        let label = format!("{} / {}", format_time(Some(progress.elapsed)), format_time(progress.duration));
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Magenta))
            .ratio(progress.ratio())
            .label(label);
        f.render_widget(gauge, area);
    }

    fn render_player_controls(f: &mut Frame, area: Rect, state: &PlaybackState) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(60), // Track info
                Constraint::Percentage(20), // Volume
                Constraint::Percentage(20), // Status
            ])
            .split(area);

        let track_info = match state.current_track() {
            Some(track) => format!(
                "[{}] {} - {}",
                track.initial(),
                track.display_artist(),
                track.display_title()
            ),
            None => "No track selected".to_string(),
        };
        let info_widget =
            Paragraph::new(track_info).block(Block::default().borders(Borders::ALL).title("Now Playing"));
        f.render_widget(info_widget, chunks[0]);

        let volume_widget = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Volume"))
            .gauge_style(Style::default().fg(Color::Green))
            .ratio(f64::from(state.volume()));
        f.render_widget(volume_widget, chunks[1]);

        let status = match state.status() {
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Idle => "Stopped",
        };
        let looping = if state.is_looping() { " (loop)" } else { "" };
        let status_widget = Paragraph::new(format!("{}{}", status, looping))
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status_widget, chunks[2]);
    }
}
