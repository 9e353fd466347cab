//! Mission dispatcher: applies operator actions to the mission

use crate::backend::Backend;
use crate::mission::planner::PlanAcquisition;
use crate::mission::queue::PlanQueue;
use crate::mission::state::MissionState;
use crate::mission::{report, Action};
use rover_shared::{OperatorMessage, RobotStatus};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct MissionDispatcher {
    planner: PlanAcquisition,
    backend: Arc<dyn Backend>,
    queue: Arc<PlanQueue>,
    state: Arc<MissionState>,
    outbound: mpsc::UnboundedSender<OperatorMessage>,
}

impl MissionDispatcher {
    pub fn new(
        planner: PlanAcquisition,
        backend: Arc<dyn Backend>,
        queue: Arc<PlanQueue>,
        state: Arc<MissionState>,
        outbound: mpsc::UnboundedSender<OperatorMessage>,
    ) -> Self {
        Self {
            planner,
            backend,
            queue,
            state,
            outbound,
        }
    }

    /// Handle actions until every producer is gone
    pub async fn run(self, mut actions: mpsc::UnboundedReceiver<Action>) {
        info!("[DISPATCH] Started");
        while let Some(action) = actions.recv().await {
            self.handle(action).await;
        }
        info!("[DISPATCH] Action queue closed, dispatcher stopping");
    }

    pub async fn handle(&self, action: Action) {
        match action {
            Action::Obstacles { obstacles, mode } => {
                info!(
                    "[DISPATCH] {} obstacles received (mode {})",
                    obstacles.len(),
                    mode
                );
                // A new obstacle set needs a fresh start
                self.state.gate().close();

                // Let an in-flight command finish so the plan starts from
                // where the robot actually is
                let permit = match self.state.movement_lock().acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        warn!("[DISPATCH] Cannot replan: {}", e);
                        report(&self.outbound, OperatorMessage::error(e.to_string()));
                        return;
                    }
                };
                self.state.set_obstacles(obstacles).await;
                // Failures are reported by the planner
                if let Ok(count) = self.planner.acquire(&mode).await {
                    debug!("[DISPATCH] Plan of {} commands queued", count);
                }
                permit.release();
            }

            Action::Start => {
                if self.queue.is_empty().await {
                    warn!("[DISPATCH] Start with no plan queued");
                    report(
                        &self.outbound,
                        OperatorMessage::error("No plan queued; send obstacles first"),
                    );
                    return;
                }

                // The plan is already local, so an unreachable backend only
                // affects recognition
                if let Err(e) = self.backend.status().await {
                    warn!("[DISPATCH] Backend not reachable: {}", e);
                    report(
                        &self.outbound,
                        OperatorMessage::error(format!("Backend not reachable: {}", e)),
                    );
                }

                self.state.gate().open();
                info!("[DISPATCH] Mission started");
                report(&self.outbound, OperatorMessage::Status(RobotStatus::Running));
            }

            Action::Stop => {
                self.state.gate().close();
                info!("[DISPATCH] Mission stopped");
                report(&self.outbound, OperatorMessage::Status(RobotStatus::Stopped));
            }

            Action::Stitch => match self.backend.stitch().await {
                Ok(()) => {
                    info!("[DISPATCH] Images stitched");
                    report(&self.outbound, OperatorMessage::info("Images stitched"));
                }
                Err(e) => {
                    warn!("[DISPATCH] Stitch failed: {}", e);
                    report(
                        &self.outbound,
                        OperatorMessage::error(format!("Stitch failed: {}", e)),
                    );
                }
            },
        }
    }
}
