use thiserror::Error;

use crate::crypto::CryptoError;
use crate::interface::DriverError;

/// Errors surfaced by engine operations.
///
/// None of these are fatal: a failed operation leaves the engine idle and
/// ready for the next command.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The radio refused a mode switch, channel change or transmit.
    #[error("driver error: {0}")]
    Driver(DriverError),

    /// The scan result buffer could not be allocated. Results were discarded.
    #[error("could not allocate room for {requested} scan results")]
    Allocation { requested: usize },

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The radio transmit queue is full. Raised in place of
    /// `Driver(QueueFull)` so callers can retry without matching driver
    /// details.
    #[error("transmit queue full")]
    Transmit,

    /// An attack was started without a usable target.
    #[error("{0}")]
    InvalidTarget(String),

    /// The requested attack is already running.
    #[error("{0} is already running")]
    Busy(&'static str),

    #[error("could not spawn {name} task: {reason}")]
    Task { name: String, reason: String },
}

impl EngineError {
    pub fn invalid_target(message: impl Into<String>) -> Self {
        EngineError::InvalidTarget(message.into())
    }
}

impl From<DriverError> for EngineError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::QueueFull => EngineError::Transmit,
            e => EngineError::Driver(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_becomes_transmit() {
        assert!(matches!(
            EngineError::from(DriverError::QueueFull),
            EngineError::Transmit
        ));
        assert!(matches!(
            EngineError::from(DriverError::Io("socket closed".to_string())),
            EngineError::Driver(DriverError::Io(_))
        ));
        assert_eq!(EngineError::Transmit.to_string(), "transmit queue full");
    }
}
