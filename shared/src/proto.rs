//! Operator link wire messages
//!
//! Hand-derived prost messages. Every frame on the operator link is one
//! [`Envelope`]; the payload variant determines the message category.

use prost::{Enumeration, Message, Oneof};

/// Closed set of message categories exchanged with the operator app
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum Category {
    Unknown = 0,
    Info = 1,
    Error = 2,
    Status = 3,
    Location = 4,
    ObstacleResult = 5,
    Obstacles = 6,
    Control = 7,
}

/// Robot status values reported to the operator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum RobotStatus {
    StatusUnknown = 0,
    Ready = 1,
    Running = 2,
    Stopped = 3,
    Finished = 4,
    Aborted = 5,
}

/// Mission controls sent by the operator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ControlAction {
    ControlUnknown = 0,
    Start = 1,
    Stop = 2,
}

#[derive(Clone, PartialEq, Message)]
pub struct Header {
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(uint64, tag = "2")]
    pub sequence_id: u64,
    #[prost(uint64, tag = "3")]
    pub timestamp_ms: u64,
    #[prost(enumeration = "Category", tag = "4")]
    pub category: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(oneof = "envelope::Payload", tags = "2, 3, 4, 5, 6, 7")]
    pub payload: Option<envelope::Payload>,
}

pub mod envelope {
    use super::*;

    #[derive(Clone, PartialEq, Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Obstacles(ObstacleSet),
        #[prost(message, tag = "3")]
        Control(Control),
        #[prost(message, tag = "4")]
        Notice(Notice),
        #[prost(message, tag = "5")]
        Status(StatusReport),
        #[prost(message, tag = "6")]
        Location(Location),
        #[prost(message, tag = "7")]
        ObstacleResult(ObstacleResult),
    }
}

/// A single obstacle on the arena grid
#[derive(Clone, PartialEq, Message)]
pub struct Obstacle {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(int32, tag = "2")]
    pub x: i32,
    #[prost(int32, tag = "3")]
    pub y: i32,
    /// Direction code of the obstacle face carrying the symbol
    #[prost(int32, tag = "4")]
    pub d: i32,
}

/// Mission submission: the full obstacle set plus a planner mode
#[derive(Clone, PartialEq, Message)]
pub struct ObstacleSet {
    #[prost(message, repeated, tag = "1")]
    pub obstacles: Vec<Obstacle>,
    #[prost(string, tag = "2")]
    pub mode: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Control {
    #[prost(enumeration = "ControlAction", tag = "1")]
    pub action: i32,
}

/// Free-form info or error text
#[derive(Clone, PartialEq, Message)]
pub struct Notice {
    #[prost(string, tag = "1")]
    pub text: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct StatusReport {
    #[prost(enumeration = "RobotStatus", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Location {
    #[prost(int32, tag = "1")]
    pub x: i32,
    #[prost(int32, tag = "2")]
    pub y: i32,
    #[prost(int32, tag = "3")]
    pub d: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ObstacleResult {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub symbol: String,
    #[prost(bool, tag = "3")]
    pub recognized: bool,
}
