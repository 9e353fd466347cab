//! Domain-level operator messages
//!
//! [`OperatorMessage`] is what the controller produces for the operator,
//! [`OperatorAction`] is what the operator asks the controller to do. Both
//! convert to and from the [`Envelope`] wire form.

use crate::proto::{
    envelope::Payload, Category, Control, ControlAction, Envelope, Header, Location, Notice,
    Obstacle, ObstacleResult, ObstacleSet, RobotStatus, StatusReport,
};

/// Robot pose on the arena grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pose {
    pub x: i32,
    pub y: i32,
    pub d: i32,
}

impl Pose {
    pub fn new(x: i32, y: i32, d: i32) -> Self {
        Self { x, y, d }
    }
}

/// A message bound for the operator: a category tag plus its value
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorMessage {
    Info(String),
    Error(String),
    Status(RobotStatus),
    Location(Pose),
    ObstacleResult {
        id: u32,
        symbol: String,
        recognized: bool,
    },
}

impl OperatorMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self::Info(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error(text.into())
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Info(_) => Category::Info,
            Self::Error(_) => Category::Error,
            Self::Status(_) => Category::Status,
            Self::Location(_) => Category::Location,
            Self::ObstacleResult { .. } => Category::ObstacleResult,
        }
    }

    /// Wrap the message in an envelope ready for the codec
    pub fn into_envelope(self, device_id: &str, sequence_id: u64) -> Envelope {
        let header = Header::new(device_id, self.category(), sequence_id);
        let payload = match self {
            Self::Info(text) | Self::Error(text) => Payload::Notice(Notice { text }),
            Self::Status(status) => Payload::Status(StatusReport {
                status: status.into(),
            }),
            Self::Location(pose) => Payload::Location(Location {
                x: pose.x,
                y: pose.y,
                d: pose.d,
            }),
            Self::ObstacleResult {
                id,
                symbol,
                recognized,
            } => Payload::ObstacleResult(ObstacleResult {
                id,
                symbol,
                recognized,
            }),
        };

        Envelope {
            header: Some(header),
            payload: Some(payload),
        }
    }

    /// Rebuild an operator message from an envelope (used by operator tooling)
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        let category = envelope
            .header
            .as_ref()
            .and_then(|h| Category::try_from(h.category).ok())
            .unwrap_or(Category::Unknown);

        match envelope.payload.as_ref()? {
            Payload::Notice(notice) if category == Category::Error => {
                Some(Self::Error(notice.text.clone()))
            }
            Payload::Notice(notice) => Some(Self::Info(notice.text.clone())),
            Payload::Status(report) => Some(Self::Status(
                RobotStatus::try_from(report.status).unwrap_or(RobotStatus::StatusUnknown),
            )),
            Payload::Location(loc) => Some(Self::Location(Pose::new(loc.x, loc.y, loc.d))),
            Payload::ObstacleResult(result) => Some(Self::ObstacleResult {
                id: result.id,
                symbol: result.symbol.clone(),
                recognized: result.recognized,
            }),
            Payload::Obstacles(_) | Payload::Control(_) => None,
        }
    }
}

/// An instruction decoded from the operator link
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorAction {
    /// New mission: obstacle set plus planner mode
    Obstacles { obstacles: Vec<Obstacle>, mode: String },
    Start,
    Stop,
}

impl OperatorAction {
    /// Decode an inbound envelope; anything that is not an operator
    /// instruction yields `None`
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        match envelope.payload.as_ref()? {
            Payload::Obstacles(set) => Some(Self::Obstacles {
                obstacles: set.obstacles.clone(),
                mode: set.mode.clone(),
            }),
            Payload::Control(control) => match ControlAction::try_from(control.action) {
                Ok(ControlAction::Start) => Some(Self::Start),
                Ok(ControlAction::Stop) => Some(Self::Stop),
                _ => None,
            },
            _ => None,
        }
    }

    /// Encode as an envelope (used by operator tooling)
    pub fn into_envelope(self, device_id: &str, sequence_id: u64) -> Envelope {
        let (category, payload) = match self {
            Self::Obstacles { obstacles, mode } => (
                Category::Obstacles,
                Payload::Obstacles(ObstacleSet { obstacles, mode }),
            ),
            Self::Start => (
                Category::Control,
                Payload::Control(Control {
                    action: ControlAction::Start.into(),
                }),
            ),
            Self::Stop => (
                Category::Control,
                Payload::Control(Control {
                    action: ControlAction::Stop.into(),
                }),
            ),
        };

        Envelope {
            header: Some(Header::new(device_id, category, sequence_id)),
            payload: Some(payload),
        }
    }
}
