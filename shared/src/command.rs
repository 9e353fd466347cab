//! Motor-board command vocabulary
//!
//! Every instruction travels to the motor controller as a short ASCII token:
//! ```text
//! RS00            reset heading (gyro zero)
//! FW01, BR00 ...  motion: two-letter kind + distance-coded digits
//! SNAP<id>_<sym>  capture and recognise the symbol on obstacle <id>
//! FIN             end of plan
//! ```
//! `Display` re-emits the exact token that was parsed.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Token that resets the heading
pub const RESET_HEADING: &str = "RS00";

/// Token that ends a plan
pub const FINISH: &str = "FIN";

/// Prefix of snapshot instructions
pub const SNAPSHOT_PREFIX: &str = "SNAP";

/// Prefix of every acknowledgement the motor board sends back
pub const ACK_PREFIX: &str = "ACK";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Empty command token")]
    Empty,

    #[error("Unknown command token: {0}")]
    Unknown(String),

    #[error("Invalid motion magnitude in {0}")]
    InvalidMagnitude(String),

    #[error("Invalid snapshot instruction: {0}")]
    InvalidSnapshot(String),
}

/// Motion kinds understood by the motor board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionKind {
    Forward,
    Backward,
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
    ForwardSensor,
    BackwardSensor,
    TurnLeft,
    TurnRight,
}

impl MotionKind {
    const ALL: [MotionKind; 10] = [
        MotionKind::Forward,
        MotionKind::Backward,
        MotionKind::ForwardLeft,
        MotionKind::ForwardRight,
        MotionKind::BackwardLeft,
        MotionKind::BackwardRight,
        MotionKind::ForwardSensor,
        MotionKind::BackwardSensor,
        MotionKind::TurnLeft,
        MotionKind::TurnRight,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            MotionKind::Forward => "FW",
            MotionKind::Backward => "BW",
            MotionKind::ForwardLeft => "FL",
            MotionKind::ForwardRight => "FR",
            MotionKind::BackwardLeft => "BL",
            MotionKind::BackwardRight => "BR",
            MotionKind::ForwardSensor => "FS",
            MotionKind::BackwardSensor => "BS",
            MotionKind::TurnLeft => "TL",
            MotionKind::TurnRight => "TR",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }
}

/// A motion instruction with its distance-coded magnitude
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Motion {
    pub kind: MotionKind,
    pub magnitude: u32,
    /// Digit count on the wire, kept so the token round-trips exactly
    width: usize,
}

impl Motion {
    pub fn new(kind: MotionKind, magnitude: u32) -> Self {
        Self {
            kind,
            magnitude,
            width: 2,
        }
    }
}

/// Coarse classification used by the follower state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Reset,
    Move,
    Snapshot,
    Finish,
}

/// One instruction of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorCommand {
    ResetHeading,
    Move(Motion),
    Snapshot { obstacle_id: u32, symbol: String },
    Finish,
}

impl ActuatorCommand {
    /// Parse a wire token
    pub fn parse(token: &str) -> Result<Self, CommandParseError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CommandParseError::Empty);
        }

        if token == RESET_HEADING {
            return Ok(Self::ResetHeading);
        }
        if token == FINISH {
            return Ok(Self::Finish);
        }
        if let Some(rest) = token.strip_prefix(SNAPSHOT_PREFIX) {
            return parse_snapshot(token, rest);
        }

        // Motion: two ASCII letters followed by digits
        if token.len() < 3 || !token.is_char_boundary(2) {
            return Err(CommandParseError::Unknown(token.into()));
        }
        let (prefix, digits) = token.split_at(2);
        let kind = MotionKind::from_prefix(prefix)
            .ok_or_else(|| CommandParseError::Unknown(token.into()))?;

        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CommandParseError::InvalidMagnitude(token.into()));
        }
        let magnitude = digits
            .parse::<u32>()
            .map_err(|_| CommandParseError::InvalidMagnitude(token.into()))?;

        Ok(Self::Move(Motion {
            kind,
            magnitude,
            width: digits.len(),
        }))
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::ResetHeading => CommandKind::Reset,
            Self::Move(_) => CommandKind::Move,
            Self::Snapshot { .. } => CommandKind::Snapshot,
            Self::Finish => CommandKind::Finish,
        }
    }

    /// Whether this instruction is written to the motor board
    pub fn is_actuated(&self) -> bool {
        matches!(self, Self::ResetHeading | Self::Move(_))
    }
}

fn parse_snapshot(token: &str, rest: &str) -> Result<ActuatorCommand, CommandParseError> {
    let (id, symbol) = rest
        .split_once('_')
        .ok_or_else(|| CommandParseError::InvalidSnapshot(token.into()))?;

    let obstacle_id = id
        .parse::<u32>()
        .map_err(|_| CommandParseError::InvalidSnapshot(token.into()))?;

    Ok(ActuatorCommand::Snapshot {
        obstacle_id,
        symbol: symbol.to_string(),
    })
}

impl FromStr for ActuatorCommand {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResetHeading => write!(f, "{}", RESET_HEADING),
            Self::Move(motion) => write!(
                f,
                "{}{:0width$}",
                motion.kind.prefix(),
                motion.magnitude,
                width = motion.width
            ),
            Self::Snapshot {
                obstacle_id,
                symbol,
            } => write!(f, "{}{}_{}", SNAPSHOT_PREFIX, obstacle_id, symbol),
            Self::Finish => write!(f, "{}", FINISH),
        }
    }
}

/// Whether a token received from the motor board is an acknowledgement
pub fn is_ack(token: &str) -> bool {
    token.trim_start().starts_with(ACK_PREFIX)
}
