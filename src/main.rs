extern crate clap;

mod engine;
mod errors;
mod measurements;
mod results;
mod samples;
mod session;
mod stats;
mod transport;
mod tui;

use crate::engine::{EngineConfig, MeasurementEngine};
use crate::errors::{exit_codes, format_error_for_display, MeasurementError};
use crate::results::MeasurementSummary;
use crate::session::SpeedTestSession;
use crate::transport::{HttpTransport, Transport};
use crate::tui::renderer::{format_latency, format_loss, format_speed};
use crate::tui::{AfterRun, DisplayMode, TuiController};
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colored::Colorize;
use std::error::Error;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Redraw cadence of the TUI while a run is in flight.
const RENDER_INTERVAL: Duration = Duration::from_millis(100);

type RunOutcome = Result<MeasurementSummary, MeasurementError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print the results as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mode = DisplayMode::detect(cli.json, std::io::stdout().is_terminal());

    env_logger::Builder::new()
        .filter_level(
            mode.log_level(cli.verbose.log_level_filter(), cli.verbose.is_present()),
        )
        .parse_default_env()
        .init();

    let code = match run(mode).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {}", error);
            exit_codes::UNKNOWN_ERROR
        }
    };

    std::process::exit(code);
}

async fn run(mode: DisplayMode) -> Result<i32, Box<dyn Error>> {
    let config = EngineConfig::default();
    let transport: Arc<dyn Transport> =
        match HttpTransport::new(&config.transport) {
            Ok(transport) => Arc::new(transport),
            Err(error) => {
                eprintln!("Error: could not set up HTTP client: {}", error);
                return Ok(exit_codes::CONFIG_ERROR);
            }
        };
    let engine = Arc::new(MeasurementEngine::new(config, transport));
    let session = SpeedTestSession::new(engine);

    let outcome = match mode {
        DisplayMode::Tui => run_with_tui(&session).await?,
        DisplayMode::Silent | DisplayMode::Json => {
            tokio::select! {
                outcome = session.start_run() => Some(outcome),
                _ = tokio::signal::ctrl_c() => None,
            }
        }
    };

    let Some(outcome) = outcome else {
        return Ok(exit_codes::INTERRUPTED);
    };

    match (&outcome, mode) {
        (Ok(summary), DisplayMode::Json) => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        (Err(error), DisplayMode::Json) => {
            let report = serde_json::json!({
                "error": error.to_string(),
                "suggestion": error.suggestion(),
                "exit_code": error.exit_code(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        (Ok(summary), _) => print_summary(summary),
        (Err(error), _) => eprintln!("{}", format_error_for_display(error)),
    }

    Ok(match outcome {
        Ok(_) => exit_codes::SUCCESS,
        Err(error) => error.exit_code(),
    })
}

/// Run with live rendering, offering another run each time one finishes.
///
/// Returns the last run's outcome, or `None` if the user quit mid-run.
async fn run_with_tui(
    session: &SpeedTestSession,
) -> Result<Option<RunOutcome>, Box<dyn Error>> {
    let mut controller = TuiController::new(DisplayMode::Tui)?;
    controller.init()?;

    let outcome = loop {
        let Some(outcome) = drive_run(&mut controller, session).await? else {
            break None;
        };

        controller.render(&session.snapshot())?;
        match tokio::task::block_in_place(|| controller.wait_for_choice())? {
            AfterRun::Retry => session.reset(),
            AfterRun::Exit => break Some(outcome),
        }
    };
    controller.cleanup()?;

    Ok(outcome)
}

/// Redraw one run until it ends. `None` if a quit key was pressed first.
async fn drive_run(
    controller: &mut TuiController,
    session: &SpeedTestSession,
) -> Result<Option<RunOutcome>, Box<dyn Error>> {
    let run = session.start_run();
    tokio::pin!(run);
    let mut ticker = interval(RENDER_INTERVAL);

    loop {
        tokio::select! {
            outcome = &mut run => return Ok(Some(outcome)),
            _ = ticker.tick() => {
                controller.render(&session.snapshot())?;
                if controller.quit_requested()? {
                    return Ok(None);
                }
            }
        }
    }
}

fn print_summary(summary: &MeasurementSummary) {
    let result = &summary.result;

    println!("{} {} ms", "Ping:".bold().white(), result.ping_ms);
    println!(
        "{} {}",
        "Jitter:".bold().white(),
        format_latency(result.jitter_ms)
    );
    println!(
        "{} {}",
        "Download:".bold().white(),
        format_speed(result.download_mbps).bright_cyan()
    );
    println!(
        "{} {}",
        "Upload:".bold().white(),
        format_speed(result.upload_mbps).bright_cyan()
    );
    println!(
        "{} {}",
        "Probe loss:".bold().white(),
        format_loss(result.packet_loss_pct)
    );
    println!(
        "{} {}",
        "Network:".bold().white(),
        result.network_type.to_string().bright_blue()
    );
    println!(
        "{} min {}  avg {}  max {}",
        "Samples:".bold().white(),
        format_speed(summary.speed.min_mbps),
        format_speed(summary.speed.avg_mbps),
        format_speed(summary.speed.max_mbps)
    );
}
