//! Plan acquisition: obstacle set in, command and path queues out

use crate::backend::{Backend, PathRequest};
use crate::error::MissionError;
use crate::mission::queue::PlanQueue;
use crate::mission::report;
use crate::mission::state::MissionState;
use rover_shared::{ActuatorCommand, OperatorMessage, Pose, RobotStatus};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

pub struct PlanAcquisition {
    backend: Arc<dyn Backend>,
    queue: Arc<PlanQueue>,
    state: Arc<MissionState>,
    outbound: mpsc::UnboundedSender<OperatorMessage>,
}

impl PlanAcquisition {
    pub fn new(
        backend: Arc<dyn Backend>,
        queue: Arc<PlanQueue>,
        state: Arc<MissionState>,
        outbound: mpsc::UnboundedSender<OperatorMessage>,
    ) -> Self {
        Self {
            backend,
            queue,
            state,
            outbound,
        }
    }

    /// Plan for the stored obstacles and load the result in one step
    ///
    /// The queues are emptied first and stay empty when planning fails.
    /// Returns the number of queued commands.
    pub async fn acquire(&self, mode: &str) -> Result<usize, MissionError> {
        self.queue.clear().await;

        match self.fetch(mode).await {
            Ok((commands, path)) => {
                let count = commands.len();
                self.queue.load_plan(commands, path).await;

                info!("[PLANNER] Plan loaded: {} commands", count);
                report(
                    &self.outbound,
                    OperatorMessage::info(format!("Plan ready: {} commands", count)),
                );
                report(&self.outbound, OperatorMessage::Status(RobotStatus::Ready));
                Ok(count)
            }
            Err(e) => {
                error!("[PLANNER] {}", e);
                report(&self.outbound, OperatorMessage::error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn fetch(&self, mode: &str) -> Result<(Vec<ActuatorCommand>, Vec<Pose>), MissionError> {
        let obstacles = self.state.obstacles().await;
        let robot = self.state.location().await;
        let request = PathRequest::new(&obstacles, mode, robot);

        let plan = self.backend.request_path(&request).await?.data;

        // One bad token spoils the whole plan
        let commands = plan
            .commands
            .iter()
            .map(|token| ActuatorCommand::parse(token))
            .collect::<Result<Vec<_>, _>>()?;
        if commands.is_empty() {
            return Err(MissionError::Planning("planner returned no commands".into()));
        }

        // The first waypoint is the pose the robot starts from
        let path = plan.path.into_iter().skip(1).map(Pose::from).collect();

        Ok((commands, path))
    }
}
