//! Unified error type for the plussy-lib crate.
//!
//! [`PlussyError`] covers caller mistakes (`InvalidLedIndex`, `Color`,
//! `Config`), wire-format violations (`MalformedFrame`) and the transport
//! outcomes the network thread reacts to (`DiscoveryTimeout`, `Cancelled`,
//! `ConnectFailed`, `Disconnected`, `Io`). A `From` impl lets `?` lift
//! `std::io::Error` into it.

use std::fmt;

/// Unified error type for plussy-lib operations.
#[derive(Debug)]
pub enum PlussyError {
    /// LED index outside `0..LED_COUNT`.
    InvalidLedIndex(u8),
    /// Inbound line violates the wire format.
    MalformedFrame(String),
    /// No announcement arrived within one discovery attempt.
    DiscoveryTimeout,
    /// The operation observed a cancel request and gave up.
    Cancelled,
    /// The control connection could not be opened.
    ConnectFailed(String),
    /// The control connection was closed or reset by the peer.
    Disconnected,
    /// Standard I/O error (socket setup, config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
    /// Color parsing error.
    Color(String),
}

impl fmt::Display for PlussyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlussyError::InvalidLedIndex(led) => {
                write!(f, "Invalid LED index: {led} (must be below 20)")
            }
            PlussyError::MalformedFrame(e) => write!(f, "Malformed frame: {e}"),
            PlussyError::DiscoveryTimeout => write!(f, "No device announcement received"),
            PlussyError::Cancelled => write!(f, "Operation cancelled"),
            PlussyError::ConnectFailed(e) => write!(f, "Could not connect to device: {e}"),
            PlussyError::Disconnected => write!(f, "Device disconnected"),
            PlussyError::Io(e) => write!(f, "I/O error: {e}"),
            PlussyError::Config(e) => write!(f, "Config error: {e}"),
            PlussyError::Color(e) => write!(f, "Color error: {e}"),
        }
    }
}

impl std::error::Error for PlussyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlussyError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlussyError {
    fn from(e: std::io::Error) -> Self {
        PlussyError::Io(e)
    }
}

/// Blocking sockets report an expired read timeout as `WouldBlock` on Unix
/// and `TimedOut` on Windows.
pub(crate) fn is_timeout_kind(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

/// Crate-level Result alias using [`PlussyError`].
pub type Result<T> = std::result::Result<T, PlussyError>;
