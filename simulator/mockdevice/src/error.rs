//! Error taxonomy for simulator sessions.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Broker connection failed: {0}")]
    Connection(String),
    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },
}

impl SimulatorError {
    /// Only publish failures are recoverable; everything else ends the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SimulatorError::Publish { .. })
    }
}

pub type SimulatorResult<T> = Result<T, SimulatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_errors_are_not_fatal() {
        let err = SimulatorError::Publish {
            topic: "abc/device-status-metrics".to_string(),
            reason: "request channel closed".to_string(),
        };
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Publish to 'abc/device-status-metrics' failed: request channel closed"
        );

        assert!(SimulatorError::Connection("refused".into()).is_fatal());
        assert!(SimulatorError::Config("empty".into()).is_fatal());
    }
}
