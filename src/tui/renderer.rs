//! TUI rendering logic using ratatui.
//!
//! Draws one [`SessionState`] snapshot: phase header, overall progress
//! gauge, then either the live view (sparkline and min/avg/max), the final
//! results or the error. Narrow terminals get the same layout with the
//! sparkline dropped.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Sparkline},
    Frame,
};

use crate::engine::MeasurementPhase;
use crate::results::MeasurementSummary;
use crate::session::{ErrorInfo, SessionState};

/// Get color for speed value based on thresholds.
///
/// - Green: >= 100 Mbps (fast)
/// - Yellow: 25-100 Mbps (moderate)
/// - Red: < 25 Mbps (slow)
pub fn speed_color(speed_mbps: f64) -> Color {
    if speed_mbps >= 100.0 {
        Color::Green
    } else if speed_mbps >= 25.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Format speed value with 2 decimal places.
pub fn format_speed(speed_mbps: f64) -> String {
    format!("{:.2} Mbps", speed_mbps)
}

/// Format latency value with 2 decimal places.
pub fn format_latency(latency_ms: f64) -> String {
    format!("{:.2} ms", latency_ms)
}

pub fn format_loss(loss_pct: f64) -> String {
    format!("{:.1}%", loss_pct)
}

/// Below this width the sparkline is left out.
const COMPACT_THRESHOLD: u16 = 60;

pub fn is_compact(width: u16) -> bool {
    width < COMPACT_THRESHOLD
}

/// Scale samples for the sparkline, which only takes integers.
fn sparkline_data(samples: &[f64]) -> Vec<u64> {
    samples
        .iter()
        .map(|mbps| (mbps.max(0.0) * 100.0).round() as u64)
        .collect()
}

/// Render the TUI to the terminal.
pub fn render_frame(frame: &mut Frame, state: &SessionState) {
    let compact = is_compact(frame.area().width);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Phase
            Constraint::Length(1), // Progress
            Constraint::Min(4),    // Live view / results
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_phase_indicator(frame, chunks[0], state);
    render_progress(frame, chunks[1], state);
    render_body(frame, chunks[2], state, compact);
    render_status_bar(frame, chunks[3], state);
}

fn render_phase_indicator(
    frame: &mut Frame,
    area: Rect,
    state: &SessionState,
) {
    let symbol = match state.phase {
        MeasurementPhase::Complete => "✓",
        MeasurementPhase::Failed => "✗",
        phase if phase.is_active() => "▶",
        _ => "◐",
    };

    let color = match state.phase {
        MeasurementPhase::Complete => Color::Green,
        MeasurementPhase::Failed => Color::Red,
        _ => Color::Yellow,
    };

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paragraph = Paragraph::new(format!("{} {}", symbol, state.phase_label))
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD));
    frame.render_widget(paragraph, inner);
}

fn render_progress(frame: &mut Frame, area: Rect, state: &SessionState) {
    let percent = (state.progress.clamp(0.0, 1.0) * 100.0).round() as u16;

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(percent)
        .label(format!("{}%", percent));
    frame.render_widget(gauge, area);
}

fn render_body(
    frame: &mut Frame,
    area: Rect,
    state: &SessionState,
    compact: bool,
) {
    if let Some(ref error) = state.error {
        render_error(frame, area, error);
    } else if let Some(ref summary) = state.summary {
        render_final_results(frame, area, summary);
    } else {
        render_live(frame, area, state, compact);
    }
}

fn render_live(
    frame: &mut Frame,
    area: Rect,
    state: &SessionState,
    compact: bool,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Current speed and stats
            Constraint::Min(0),    // Sparkline
        ])
        .split(area);

    let mut lines = Vec::new();

    if state.phase == MeasurementPhase::Latency {
        let text = match state.latency.trips_ms.last() {
            Some(&last) => format!("Current: {}", format_latency(last)),
            None => "Measuring...".to_string(),
        };
        lines.push(Line::from(Span::styled(
            text,
            Style::default().fg(Color::White),
        )));
    } else if let Some(&current) = state.samples.iter().last() {
        lines.push(Line::from(Span::styled(
            format!("Current: {}", format_speed(current)),
            Style::default().fg(speed_color(current)),
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "Min {}  Avg {}  Max {}",
                format_speed(state.speed.min_mbps),
                format_speed(state.speed.avg_mbps),
                format_speed(state.speed.max_mbps)
            ),
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines), chunks[0]);

    if !compact && !state.samples.is_empty() {
        let data = sparkline_data(&state.samples.to_vec());
        let sparkline = Sparkline::default()
            .block(Block::default().borders(Borders::TOP).title("Throughput"))
            .style(Style::default().fg(Color::Cyan))
            .data(&data);
        frame.render_widget(sparkline, chunks[1]);
    }
}

fn result_line(
    label: &'static str,
    value: String,
    color: Color,
) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            label,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(value, Style::default().fg(color)),
    ])
}

/// Render final results summary.
fn render_final_results(
    frame: &mut Frame,
    area: Rect,
    summary: &MeasurementSummary,
) {
    let result = &summary.result;

    let lines = vec![
        result_line(
            "Ping: ",
            format!("{} ms", result.ping_ms),
            Color::Cyan,
        ),
        result_line("Jitter: ", format_latency(result.jitter_ms), Color::Cyan),
        result_line(
            "Download: ",
            format_speed(result.download_mbps),
            speed_color(result.download_mbps),
        ),
        result_line(
            "Upload: ",
            format_speed(result.upload_mbps),
            speed_color(result.upload_mbps),
        ),
        result_line(
            "Probe loss: ",
            format_loss(result.packet_loss_pct),
            Color::Cyan,
        ),
        result_line("Network: ", result.network_type.to_string(), Color::Cyan),
        result_line(
            "Samples: ",
            format!(
                "min {}  avg {}  max {}",
                format_speed(summary.speed.min_mbps),
                format_speed(summary.speed.avg_mbps),
                format_speed(summary.speed.max_mbps)
            ),
            Color::DarkGray,
        ),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

/// Render error message.
fn render_error(frame: &mut Frame, area: Rect, error: &ErrorInfo) {
    let mut lines = vec![Line::from(Span::styled(
        format!("Error: {}", error.message),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))];

    if let Some(ref suggestion) = error.suggestion {
        lines.push(Line::from(Span::styled(
            format!("Suggestion: {}", suggestion),
            Style::default().fg(Color::Yellow),
        )));
    }

    frame.render_widget(Paragraph::new(lines), area);
}

fn render_status_bar(frame: &mut Frame, area: Rect, state: &SessionState) {
    let status_text = match state.phase {
        MeasurementPhase::Latency if state.latency.total > 0 => format!(
            "Latency probe {}/{}",
            state.latency.current, state.latency.total
        ),
        MeasurementPhase::Download | MeasurementPhase::Upload => format!(
            "{}/{} samples",
            state.samples.len(),
            state.samples.capacity()
        ),
        phase if phase.is_terminal() => {
            "Press r to run again, any other key to exit".to_string()
        }
        _ => String::new(),
    };

    let paragraph = Paragraph::new(status_text)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
