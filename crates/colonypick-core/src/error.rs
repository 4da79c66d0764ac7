//! Error handling for ColonyPick
//!
//! Provides error types for all layers of the application:
//! - Connection errors (serial link, handshake)
//! - Control errors (facade refusals, bad arguments)
//! - Picking errors (state machine misuse)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents errors on the serial link to the rig firmware, from port
/// discovery through handshake and steady-state I/O.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// No serial link is open
    #[error("Not connected")]
    Disconnected,

    /// Failed to open the port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// No responsive port/baud pair was found during a scan
    #[error("No responsive device found")]
    NoDeviceFound,

    /// A motion command waited past the deadline for an acknowledgment
    #[error("Acknowledgment timed out after {timeout_ms}ms")]
    AckTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// I/O failure on an open link
    #[error("I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Control error type
///
/// Represents refusals and argument errors raised synchronously by the
/// control facade before anything reaches the wire.
#[derive(Error, Debug, Clone)]
pub enum ControlError {
    /// The emergency latch is set and the operation is not in the recovery set
    #[error("Refused: emergency latch is set ({operation})")]
    LatchRefused {
        /// The operation that was refused.
        operation: String,
    },

    /// The operation requires an open link
    #[error("Refused: not connected ({operation})")]
    NotConnected {
        /// The operation that was refused.
        operation: String,
    },

    /// The command pipeline has been torn down
    #[error("Command pipeline is not running")]
    PipelineDown,

    /// Invalid argument supplied to a facade operation
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// The reason the argument is invalid.
        reason: String,
    },
}

/// Picking error type
///
/// Represents state machine misuse and run failures in the picking engine.
#[derive(Error, Debug, Clone)]
pub enum PickingError {
    /// `start()` was called with an empty plan
    #[error("No picking plan")]
    NoPlan,

    /// `start()` was called while a run is already active
    #[error("A picking run is already active")]
    AlreadyRunning,

    /// `resume_after_stop()` was called without a resumable run
    #[error("No stopped run to resume")]
    NotResumable,

    /// A move request was rejected mid-run
    #[error("Move for point {index} rejected: {reason}")]
    MoveRejected {
        /// The plan index whose move was rejected.
        index: usize,
        /// The reason the move was rejected.
        reason: String,
    },
}

/// Main error type for ColonyPick
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Control error
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Picking error
    #[error(transparent)]
    Picking(#[from] PickingError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is an acknowledgment timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::AckTimeout { .. }))
    }

    /// Check if this is a facade refusal (latch or disconnected)
    pub fn is_refused(&self) -> bool {
        matches!(
            self,
            Error::Control(ControlError::LatchRefused { .. })
                | Error::Control(ControlError::NotConnected { .. })
        )
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_timeout() {
        let e: Error = ConnectionError::AckTimeout { timeout_ms: 5000 }.into();
        assert!(e.is_timeout());
        assert!(e.is_connection_error());
        assert!(!e.is_refused());
    }

    #[test]
    fn latch_refusal_is_refused() {
        let e: Error = ControlError::LatchRefused {
            operation: "manual_jog".to_string(),
        }
        .into();
        assert!(e.is_refused());
        assert_eq!(
            e.to_string(),
            "Refused: emergency latch is set (manual_jog)"
        );
    }
}
