//! Error handling for the smartserial engine
//!
//! All transport-level failures funnel into [`TransportError`]. On the
//! monitoring path these are caught and converted into a forced close plus a
//! backoff sleep; on the write path they become a `false` return. No error
//! ever crosses the engine boundary through a callback.

use thiserror::Error;

/// Transport error type
///
/// Represents I/O failures raised by the underlying serial transport:
/// open failures, read/write failures, and enumeration failures.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to open the port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Operation attempted on a port that is not open
    #[error("Port not open")]
    NotOpen,

    /// Device enumeration failed
    #[error("Failed to enumerate devices: {reason}")]
    Enumeration {
        /// The reason enumeration failed.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// Serial port library error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Create an enumeration error from a message
    pub fn enumeration(reason: impl Into<String>) -> Self {
        TransportError::Enumeration {
            reason: reason.into(),
        }
    }

    /// Check if this is an open failure
    pub fn is_open_failure(&self) -> bool {
        matches!(self, TransportError::FailedToOpen { .. })
    }
}

/// Result type using TransportError
pub type Result<T> = std::result::Result<T, TransportError>;
