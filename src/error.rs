use std::time::Duration;

use tutor_realtime_types::SessionStatus;

/// Failures while establishing the session channel.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid session endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("no answer from the tutoring service after {0:?}")]
    Timeout(Duration),
    #[error("failed to encode start message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures of the microphone capture lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordingError {
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("a recording is already in progress")]
    AlreadyInProgress,
}

/// A single fragment could not be rendered. Never stops the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("undecodable audio fragment: {0}")]
    Decode(String),
    #[error("audio output failed: {0}")]
    Device(String),
}

/// Errors returned by the [`SessionEngine`](crate::SessionEngine) command surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("recording is only allowed while listening (status is {0})")]
    NotListening(SessionStatus),
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error("the session engine has stopped")]
    Stopped,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}
