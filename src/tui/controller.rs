//! TUI controller for managing the display lifecycle.
//!
//! The TuiController owns the terminal: it enters and leaves the alternate
//! screen, draws session snapshots and reads the few keys the front end
//! reacts to. In non-TUI modes every method is a no-op.

use std::error::Error;
use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, Terminal};

use super::display_mode::DisplayMode;
use super::renderer::render_frame;
use crate::session::SessionState;

/// Whether `key` asks to abandon the run: `q`, Esc or Ctrl-C.
pub fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Whether `key` asks for another run from the results screen.
pub fn is_retry_key(key: &KeyEvent) -> bool {
    key.kind == KeyEventKind::Press
        && matches!(key.code, KeyCode::Char('r') | KeyCode::Char('R'))
}

/// What the user chose once a run has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterRun {
    Retry,
    Exit,
}

/// Controller for the TUI display.
pub struct TuiController {
    /// Current display mode
    mode: DisplayMode,
    /// Terminal instance (only present in TUI mode)
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl TuiController {
    pub fn new(mode: DisplayMode) -> Result<Self, Box<dyn Error>> {
        Ok(Self { mode, terminal: None, initialized: false })
    }

    /// Initialize the TUI.
    ///
    /// In TUI mode, this enters the alternate screen and hides the cursor.
    /// In other modes, this is a no-op.
    pub fn init(&mut self) -> Result<(), Box<dyn Error>> {
        if self.mode != DisplayMode::Tui {
            return Ok(());
        }

        enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        let backend = CrosstermBackend::new(stdout);
        self.terminal = Some(Terminal::new(backend)?);
        self.initialized = true;

        Ok(())
    }

    /// Clean up and restore terminal state.
    pub fn cleanup(&mut self) -> Result<(), Box<dyn Error>> {
        if !self.initialized {
            return Ok(());
        }

        if let Some(ref mut terminal) = self.terminal {
            execute!(
                terminal.backend_mut(),
                LeaveAlternateScreen,
                cursor::Show
            )?;
        }

        disable_raw_mode()?;

        self.initialized = false;
        self.terminal = None;

        Ok(())
    }

    /// Draw one snapshot.
    pub fn render(
        &mut self,
        state: &SessionState,
    ) -> Result<(), Box<dyn Error>> {
        if self.mode != DisplayMode::Tui {
            return Ok(());
        }

        if let Some(ref mut terminal) = self.terminal {
            terminal.draw(|frame| render_frame(frame, state))?;
        }

        Ok(())
    }

    /// Drain pending key events without blocking.
    ///
    /// Returns true if one of them was a quit key.
    pub fn quit_requested(&self) -> Result<bool, Box<dyn Error>> {
        if !self.initialized {
            return Ok(false);
        }

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if is_quit_key(&key) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Block until a key is pressed: `r` asks for another run, any other
    /// key exits.
    pub fn wait_for_choice(&self) -> Result<AfterRun, Box<dyn Error>> {
        if !self.initialized {
            return Ok(AfterRun::Exit);
        }

        loop {
            if let Event::Key(key) = event::read()? {
                if is_retry_key(&key) {
                    return Ok(AfterRun::Retry);
                }
                if key.kind == KeyEventKind::Press {
                    return Ok(AfterRun::Exit);
                }
            }
        }
    }
}

impl Drop for TuiController {
    /// Restore the terminal even if cleanup() was not called.
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
