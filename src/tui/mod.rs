//! Terminal front end for net-pulse.
//!
//! Renders session snapshots while a run is in flight and picks the output
//! mode from the command line and the terminal.

pub mod controller;
pub mod display_mode;
pub mod renderer;

pub use controller::{AfterRun, TuiController};
pub use display_mode::DisplayMode;
