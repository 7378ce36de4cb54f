// UI consumers - read playback snapshots, send commands, own no playback state
// The terminal app is built with ratatui; headless mode just logs transitions

#[cfg(feature = "tui")]
mod app; // main application state and event loop
#[cfg(feature = "tui")]
pub mod events; // keyboard event handling
pub mod headless; // line-oriented status output

#[cfg(feature = "tui")]
pub use app::{App, Pane};
#[cfg(feature = "tui")]
pub use events::{AppEvent, EventHandler};
pub use headless::StatusPrinter;

use std::time::Duration;

/// `m:ss` for display; unknown lengths render as `0:00`.
pub fn format_time(time: Option<Duration>) -> String {
    let secs = time.map(|t| t.as_secs()).unwrap_or(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(feature = "tui")]
pub use terminal::TerminalManager;

#[cfg(feature = "tui")]
mod terminal {
    use anyhow::Result;
    use crossterm::{
        cursor,
        event::{DisableMouseCapture, EnableMouseCapture},
        execute,
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    };
    use ratatui::{backend::CrosstermBackend, Terminal};
    use std::io;

    pub struct TerminalManager {
        terminal: Terminal<CrosstermBackend<io::Stdout>>,
        _cleanup_guard: CleanupGuard,
    }

    struct CleanupGuard;

    impl Drop for CleanupGuard {
        fn drop(&mut self) {
            // No stdout writes here, the terminal may already be half torn down
            let _ = disable_raw_mode();

            let mut stdout = io::stdout();
            let _ = execute!(stdout, LeaveAlternateScreen, DisableMouseCapture);
            let _ = execute!(stdout, cursor::Show);
        }
    }

    impl TerminalManager {
        pub fn new() -> Result<Self> {
            // Ensure clean terminal state first
            let _ = disable_raw_mode();
            let mut stdout = io::stdout();
            let _ = execute!(stdout, LeaveAlternateScreen, DisableMouseCapture);

            enable_raw_mode()?;
            execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
            let backend = CrosstermBackend::new(stdout);
            let mut terminal = Terminal::new(backend)?;
            terminal.clear()?;

            Ok(Self {
                terminal,
                _cleanup_guard: CleanupGuard,
            })
        }

        pub fn draw<F>(&mut self, f: F) -> Result<()>
        where
            F: FnOnce(&mut ratatui::Frame),
        {
            self.terminal.draw(f)?;
            Ok(())
        }
    }

    impl Drop for TerminalManager {
        fn drop(&mut self) {
            let _ = self.terminal.clear();
            let _ = self.terminal.show_cursor();
            // CleanupGuard will handle the rest
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(None), "0:00");
        assert_eq!(format_time(Some(Duration::ZERO)), "0:00");
        assert_eq!(format_time(Some(Duration::from_millis(59_900))), "0:59");
        assert_eq!(format_time(Some(Duration::from_secs(61))), "1:01");
        assert_eq!(format_time(Some(Duration::from_secs(3725))), "62:05");
    }
}
