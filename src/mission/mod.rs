//! Mission execution core
//!
//! The dispatcher turns operator actions into plans and start/stop
//! decisions; the follower drains the plan against the motor board and
//! runs the vision step at snapshot points.

pub mod dispatcher;
pub mod follower;
pub mod planner;
pub mod queue;
pub mod state;
pub mod vision;

pub use dispatcher::MissionDispatcher;
pub use follower::CommandFollower;
pub use planner::PlanAcquisition;
pub use queue::PlanQueue;
pub use state::{MissionState, MovementLock, MovementPermit, ObstacleOutcomes, StartGate};
pub use vision::VisionStep;

use rover_shared::{Obstacle, OperatorAction, OperatorMessage};
use tokio::sync::mpsc;
use tracing::debug;

/// Work items for the mission dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// New obstacle set: store it and plan
    Obstacles { obstacles: Vec<Obstacle>, mode: String },
    Start,
    Stop,
    /// Ask the backend to stitch the mission's images
    Stitch,
}

impl From<OperatorAction> for Action {
    fn from(action: OperatorAction) -> Self {
        match action {
            OperatorAction::Obstacles { obstacles, mode } => Action::Obstacles { obstacles, mode },
            OperatorAction::Start => Action::Start,
            OperatorAction::Stop => Action::Stop,
        }
    }
}

/// Queue a message for the operator-sender
pub(crate) fn report(outbound: &mpsc::UnboundedSender<OperatorMessage>, message: OperatorMessage) {
    if let Err(e) = outbound.send(message) {
        debug!("[MISSION] Operator sender gone, dropping {:?}", e.0);
    }
}
