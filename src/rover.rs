//! Worker wiring
//!
//! Builds the shared mission state and channels and spawns the five
//! workers: operator receiver and sender, actuator receiver, mission
//! dispatcher and command follower.

use crate::backend::Backend;
use crate::camera::Camera;
use crate::config::RoverConfig;
use crate::link::{actuator, operator, ActuatorLink, OperatorLink};
use crate::mission::{
    CommandFollower, MissionDispatcher, MissionState, PlanAcquisition, PlanQueue, VisionStep,
};
use futures::future::select_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// External collaborators the workers talk to
pub struct Collaborators {
    pub operator: Arc<dyn OperatorLink>,
    pub actuator: Arc<dyn ActuatorLink>,
    pub backend: Arc<dyn Backend>,
    pub camera: Arc<dyn Camera>,
}

/// Handle to the running workers
pub struct Rover {
    pub state: Arc<MissionState>,
    pub queue: Arc<PlanQueue>,
    workers: Vec<(&'static str, JoinHandle<()>)>,
}

impl Rover {
    pub fn spawn(collaborators: Collaborators, config: &RoverConfig) -> Self {
        let Collaborators {
            operator,
            actuator,
            backend,
            camera,
        } = collaborators;

        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();

        let state = Arc::new(MissionState::new(config.mission.start_pose()));
        let queue = Arc::new(PlanQueue::new());

        let vision = VisionStep::new(
            backend.clone(),
            camera,
            state.clone(),
            outbound_tx.clone(),
            config.vision.attempts,
        );
        let planner = PlanAcquisition::new(
            backend.clone(),
            queue.clone(),
            state.clone(),
            outbound_tx.clone(),
        );
        let dispatcher = MissionDispatcher::new(
            planner,
            backend,
            queue.clone(),
            state.clone(),
            outbound_tx.clone(),
        );
        let follower = CommandFollower::new(
            actuator.clone(),
            ack_rx,
            queue.clone(),
            state.clone(),
            vision,
            outbound_tx,
            action_tx.clone(),
        );

        let operator_delay = config.operator.reconnect_delay();
        let workers = vec![
            (
                "operator-receiver",
                tokio::spawn(operator::run_receiver(
                    operator.clone(),
                    action_tx,
                    operator_delay,
                )),
            ),
            (
                "operator-sender",
                tokio::spawn(operator::run_sender(operator, outbound_rx, operator_delay)),
            ),
            (
                "actuator-receiver",
                tokio::spawn(actuator::run_receiver(
                    actuator,
                    ack_tx,
                    config.actuator.reconnect_delay(),
                )),
            ),
            ("mission-dispatcher", tokio::spawn(dispatcher.run(action_rx))),
            ("command-follower", tokio::spawn(follower.run())),
        ];
        info!("[ROVER] {} workers started", workers.len());

        Self {
            state,
            queue,
            workers,
        }
    }

    /// Wait for the first worker to exit and return its name
    pub async fn wait(&mut self) -> &'static str {
        let (_, index, _) = select_all(self.workers.iter_mut().map(|(_, handle)| handle)).await;
        self.workers[index].0
    }

    /// Stop every worker
    pub async fn shutdown(self) {
        self.queue.close().await;
        for (name, handle) in self.workers {
            handle.abort();
            let _ = handle.await;
            info!("[ROVER] {} stopped", name);
        }
    }
}
