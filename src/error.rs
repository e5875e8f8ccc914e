//! Error types for the gxact coordinator.
//!
//! Defines a unified error type used across the phase automaton, log
//! codec, transaction set, coordinator and recovery worker.

use std::fmt;
use std::io;

/// Unified error type for gxact operations.
#[derive(Debug)]
pub enum GxactError {
    /// Illegal phase transition, missing/corrupt log file, name overflow,
    /// or a set-file collision.
    InvalidTransactionState(String),
    /// A host event the coordinator does not support (nested prepare).
    FeatureNotSupported(String),
    /// Randomness source failure or other unclassified internal error.
    Internal(String),
    /// A log record could not be parsed or exceeded the line length bound.
    CorruptLog(String),
    /// I/O error (log file, directory, lock file).
    Io(io::Error),
}

impl fmt::Display for GxactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GxactError::InvalidTransactionState(msg) => {
                write!(f, "invalid transaction state: {}", msg)
            }
            GxactError::FeatureNotSupported(msg) => write!(f, "feature not supported: {}", msg),
            GxactError::Internal(msg) => write!(f, "internal error: {}", msg),
            GxactError::CorruptLog(msg) => write!(f, "corrupt log: {}", msg),
            GxactError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for GxactError {}

impl From<io::Error> for GxactError {
    fn from(e: io::Error) -> Self {
        GxactError::Io(e)
    }
}

/// Result type alias for gxact operations.
pub type Result<T> = std::result::Result<T, GxactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let e = GxactError::InvalidTransactionState("bad phase".into());
        assert_eq!(e.to_string(), "invalid transaction state: bad phase");

        let e = GxactError::FeatureNotSupported("nested prepare".into());
        assert_eq!(e.to_string(), "feature not supported: nested prepare");
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let e: GxactError = io_err.into();
        assert!(matches!(e, GxactError::Io(_)));
    }
}
