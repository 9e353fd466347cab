//! Controller configuration
//!
//! Every section has working defaults; a YAML file can override any subset
//! of fields.

use anyhow::{Context, Result};
use rover_shared::{limits, Pose};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Transport carrying the operator link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorTransport {
    /// Bluetooth RFCOMM listener (requires the `bluetooth` feature)
    Rfcomm,
    /// TCP listener (for development and the operator console)
    #[default]
    Tcp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub transport: OperatorTransport,
    /// Listen address when the transport is TCP
    pub tcp_address: String,
    /// RFCOMM channel when the transport is Bluetooth
    pub rfcomm_channel: u8,
    /// A receive with no data after this long counts as "no message"
    pub read_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            transport: OperatorTransport::Tcp,
            tcp_address: "0.0.0.0:9000".into(),
            rfcomm_channel: 1,
            read_timeout_ms: limits::OPERATOR_READ_TIMEOUT_MS,
            reconnect_delay_ms: limits::RECONNECT_DELAY_MS,
        }
    }
}

impl OperatorConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Connection to the motor-control board
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActuatorConnection {
    /// Serial port (e.g. "/dev/ttyUSB0")
    Serial { port: String, baud: u32 },
    /// TCP (motor-board simulator)
    Tcp { address: String },
}

impl Default for ActuatorConnection {
    fn default() -> Self {
        Self::Serial {
            port: "/dev/ttyUSB0".into(),
            baud: 115_200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub connection: ActuatorConnection,
    /// A receive with no token after this long yields the idle placeholder
    pub read_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            connection: ActuatorConnection::default(),
            read_timeout_ms: limits::ACTUATOR_READ_TIMEOUT_MS,
            reconnect_delay_ms: limits::RECONNECT_DELAY_MS,
        }
    }
}

impl ActuatorConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Planning / vision backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub status_timeout_ms: u64,
    /// Applies to path, image and stitch requests
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.1.10:5000".into(),
            status_timeout_ms: limits::STATUS_TIMEOUT_MS,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Capture-and-recognise attempts before an obstacle is marked failed
    pub attempts: u32,
    /// Still-capture program writing a JPEG to stdout
    pub capture_program: String,
    pub capture_args: Vec<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            attempts: limits::RECOGNITION_ATTEMPTS,
            capture_program: "rpicam-still".into(),
            capture_args: vec![
                "--nopreview".into(),
                "--immediate".into(),
                "--encoding".into(),
                "jpg".into(),
                "--output".into(),
                "-".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Pose the robot starts each run from
    pub start_x: i32,
    pub start_y: i32,
    pub start_d: i32,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            start_x: 1,
            start_y: 1,
            start_d: 0,
        }
    }
}

impl MissionConfig {
    pub fn start_pose(&self) -> Pose {
        Pose::new(self.start_x, self.start_y, self.start_d)
    }
}

/// Top-level controller configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    pub device_id: String,
    pub operator: OperatorConfig,
    pub actuator: ActuatorConfig,
    pub backend: BackendConfig,
    pub vision: VisionConfig,
    pub mission: MissionConfig,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            device_id: "rover-001".into(),
            operator: OperatorConfig::default(),
            actuator: ActuatorConfig::default(),
            backend: BackendConfig::default(),
            vision: VisionConfig::default(),
            mission: MissionConfig::default(),
        }
    }
}

impl RoverConfig {
    /// Parse a YAML document; missing fields keep their defaults
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml(&text)
    }

    /// Load from the file named by the first argument or `ROVER_CONFIG`,
    /// falling back to defaults when neither is set
    pub fn from_env() -> Result<Self> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var("ROVER_CONFIG").ok());

        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.vision.attempts == 0 {
            anyhow::bail!("vision.attempts must be at least 1");
        }
        if self.backend.base_url.is_empty() {
            anyhow::bail!("backend.base_url must not be empty");
        }
        Ok(())
    }
}
