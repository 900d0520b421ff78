//! Error types for visionguard-server

use thiserror::Error;
use visionguard_core::Error as CoreError;
use visionguard_eye::VisionError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::Validation("port cannot be 0".to_string());
        assert_eq!(err.to_string(), "Validation error: port cannot be 0");

        let err: ServerError = VisionError::Decode("empty payload".to_string()).into();
        assert_eq!(err.to_string(), "Vision error: Decode error: empty payload");
    }
}
