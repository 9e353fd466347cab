//! Rover Shared Protocol Types
//!
//! Types shared between the onboard controller and operator tooling: the
//! operator link messages and their framing, the motor-board command
//! vocabulary, and the command-follower state machine.

pub mod codec;
pub mod command;
pub mod message;
pub mod proto;
pub mod state_machine;

use std::time::{SystemTime, UNIX_EPOCH};

pub use command::{is_ack, ActuatorCommand, CommandKind, CommandParseError, Motion, MotionKind};
pub use message::{OperatorAction, OperatorMessage, Pose};
pub use proto::*;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Default timing and retry parameters
pub mod limits {
    /// Operator link read timeout before a receive counts as "no message"
    pub const OPERATOR_READ_TIMEOUT_MS: u64 = 2000;

    /// Motor-board read timeout before a receive yields the idle placeholder
    pub const ACTUATOR_READ_TIMEOUT_MS: u64 = 1000;

    /// Delay before a dropped link is re-established
    pub const RECONNECT_DELAY_MS: u64 = 2000;

    /// Capture-and-recognise attempts per snapshot
    pub const RECOGNITION_ATTEMPTS: u32 = 3;

    /// Timeout for the backend liveness check
    pub const STATUS_TIMEOUT_MS: u64 = 1000;
}

impl Header {
    /// Create a new header with the given device ID and category
    pub fn new(device_id: impl Into<String>, category: Category, sequence_id: u64) -> Self {
        Self {
            device_id: device_id.into(),
            sequence_id,
            timestamp_ms: now_ms(),
            category: category.into(),
        }
    }
}
