//! Mission error taxonomy

use rover_shared::CommandParseError;
use thiserror::Error;

/// Failures of the planning/vision backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed backend response: {0}")]
    Malformed(String),
}

/// Errors that end or prevent a mission
#[derive(Error, Debug)]
pub enum MissionError {
    /// Transient link trouble; the owning worker retries
    #[error("Link error: {0}")]
    Link(String),

    /// An acknowledgement can no longer arrive; fatal to the running mission
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// No usable plan; the mission does not start
    #[error("Planning failed: {0}")]
    Planning(String),

    /// Recognition gave up after its bounded attempts
    #[error("Recognition failed for obstacle {obstacle_id} after {attempts} attempts")]
    Recognition { obstacle_id: u32, attempts: u32 },
}

impl From<BackendError> for MissionError {
    fn from(e: BackendError) -> Self {
        MissionError::Planning(e.to_string())
    }
}

impl From<CommandParseError> for MissionError {
    fn from(e: CommandParseError) -> Self {
        MissionError::Planning(format!("malformed plan: {}", e))
    }
}
