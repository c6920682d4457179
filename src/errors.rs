//! Error types for a measurement run.
//!
//! Every failure is terminal for the run it happens in. Each kind maps to a
//! user-facing suggestion and a process exit code so the front end can
//! render it without inspecting the underlying transport error.

use std::error::Error;
use std::fmt;

/// Exit codes for the application.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// No usable network interface.
    pub const NO_CONNECTIVITY: i32 = 1;
    /// One of the measurement phases failed.
    pub const MEASUREMENT_FAILED: i32 = 2;
    /// Invalid configuration or arguments.
    pub const CONFIG_ERROR: i32 = 3;
    /// Transport failed in a way no phase accounted for.
    pub const TRANSPORT_ERROR: i32 = 4;
    /// The user abandoned the run.
    pub const INTERRUPTED: i32 = 130;
    /// Unknown/unexpected error.
    pub const UNKNOWN_ERROR: i32 = 99;
}

/// Failure of a measurement run.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementError {
    /// No active network interface was found before the run started.
    NoConnectivity,
    /// Every latency probe failed or returned a non-positive time.
    LatencyFailed(String),
    /// The download phase transferred no bytes.
    DownloadFailed(String),
    /// The upload phase transferred no bytes on either endpoint.
    UploadFailed(String),
    /// A transport error escaped a phase boundary.
    UnexpectedTransportError(String),
    /// `run()` was called while another run was active. Nothing happened.
    AlreadyRunning,
}

impl MeasurementError {
    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            MeasurementError::NoConnectivity => exit_codes::NO_CONNECTIVITY,
            MeasurementError::LatencyFailed(_)
            | MeasurementError::DownloadFailed(_)
            | MeasurementError::UploadFailed(_) => {
                exit_codes::MEASUREMENT_FAILED
            }
            MeasurementError::UnexpectedTransportError(_) => {
                exit_codes::TRANSPORT_ERROR
            }
            MeasurementError::AlreadyRunning => exit_codes::UNKNOWN_ERROR,
        }
    }

    /// Short description of the failing step.
    pub fn description(&self) -> &'static str {
        match self {
            MeasurementError::NoConnectivity => "No internet connection",
            MeasurementError::LatencyFailed(_) => "Latency check failed",
            MeasurementError::DownloadFailed(_) => "Download check failed",
            MeasurementError::UploadFailed(_) => "Upload check failed",
            MeasurementError::UnexpectedTransportError(_) => {
                "Measurement failed"
            }
            MeasurementError::AlreadyRunning => {
                "A measurement is already running"
            }
        }
    }

    /// Suggestion for how to resolve the error, if one applies.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            MeasurementError::NoConnectivity => {
                Some("Connect to a Wi-Fi, mobile or wired network and try again.")
            }
            MeasurementError::LatencyFailed(_) => Some(
                "The probe endpoint may be unreachable. Check your connection and try again.",
            ),
            MeasurementError::DownloadFailed(_)
            | MeasurementError::UploadFailed(_) => Some(
                "The test servers may be blocked or overloaded. Try again later.",
            ),
            MeasurementError::UnexpectedTransportError(_) => {
                Some("Check your internet connection and try again.")
            }
            MeasurementError::AlreadyRunning => None,
        }
    }

    /// Underlying message attached to the failure, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            MeasurementError::LatencyFailed(detail)
            | MeasurementError::DownloadFailed(detail)
            | MeasurementError::UploadFailed(detail)
            | MeasurementError::UnexpectedTransportError(detail) => {
                Some(detail.as_str())
            }
            _ => None,
        }
    }
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) if !detail.is_empty() => {
                write!(f, "{}: {}", self.description(), detail)
            }
            _ => write!(f, "{}", self.description()),
        }
    }
}

impl Error for MeasurementError {}

/// Classified cause of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be established (DNS, TCP, TLS).
    Connect,
    /// The request or a read timed out.
    Timeout,
    /// The server answered with a non-success status.
    Status,
    /// Reading or writing the body failed mid-transfer.
    Body,
    /// Anything else.
    Other,
}

/// Failure of a single HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn status(status: http::StatusCode) -> Self {
        Self::new(
            TransportErrorKind::Status,
            format!("server responded with status {}", status),
        )
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_status() {
            TransportErrorKind::Status
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };

        TransportError::new(kind, error.to_string())
    }
}

/// Format an error for user display.
///
/// Includes the description, the attached detail and any suggestion.
pub fn format_error_for_display(error: &MeasurementError) -> String {
    let mut output = format!("Error: {}", error);

    if let Some(suggestion) = error.suggestion() {
        output.push_str(&format!("\n\nSuggestion: {}", suggestion));
    }

    output
}
