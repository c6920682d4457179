//! Output mode selection.
//!
//! Chooses between the live TUI, plain colored output and JSON from the
//! `--json` flag and whether stdout is a terminal.

use log::LevelFilter;

/// The display mode for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Live progress on the alternate screen
    Tui,
    /// No output until the final results, which are printed as text
    Silent,
    /// Final results as JSON on stdout
    Json,
}

impl DisplayMode {
    /// `Json` whenever `json_flag` is set, otherwise `Tui` on a terminal and
    /// `Silent` elsewhere.
    pub fn detect(json_flag: bool, is_tty: bool) -> Self {
        if json_flag {
            DisplayMode::Json
        } else if is_tty {
            DisplayMode::Tui
        } else {
            DisplayMode::Silent
        }
    }

    /// Log level for this mode.
    ///
    /// The TUI owns the terminal, so logging stays off there unless the
    /// user asked for it with `-v`/`-q`.
    pub fn log_level(
        self,
        requested: LevelFilter,
        explicitly_set: bool,
    ) -> LevelFilter {
        match self {
            DisplayMode::Tui if !explicitly_set => LevelFilter::Off,
            _ => requested,
        }
    }
}
