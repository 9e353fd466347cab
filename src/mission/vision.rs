//! Snapshot side-trip: capture, recognise, record, release

use crate::backend::Backend;
use crate::camera::Camera;
use crate::error::MissionError;
use crate::mission::report;
use crate::mission::state::{MissionState, MovementPermit};
use rover_shared::OperatorMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct VisionStep {
    backend: Arc<dyn Backend>,
    camera: Arc<dyn Camera>,
    state: Arc<MissionState>,
    outbound: mpsc::UnboundedSender<OperatorMessage>,
    attempts: u32,
}

impl VisionStep {
    pub fn new(
        backend: Arc<dyn Backend>,
        camera: Arc<dyn Camera>,
        state: Arc<MissionState>,
        outbound: mpsc::UnboundedSender<OperatorMessage>,
        attempts: u32,
    ) -> Self {
        Self {
            backend,
            camera,
            state,
            outbound,
            attempts: attempts.max(1),
        }
    }

    /// Recognise the symbol on one obstacle
    ///
    /// Records the outcome, reports it to the operator and releases the
    /// movement lock whether or not recognition succeeded.
    pub async fn run(
        &self,
        obstacle_id: u32,
        expected: &str,
        permit: MovementPermit,
    ) -> Result<(), MissionError> {
        let result = match self.recognize(obstacle_id, expected).await {
            Some(symbol) => {
                info!("[VISION] Obstacle {} recognised as {}", obstacle_id, symbol);
                self.state.record_success(obstacle_id).await;
                report(
                    &self.outbound,
                    OperatorMessage::ObstacleResult {
                        id: obstacle_id,
                        symbol,
                        recognized: true,
                    },
                );
                Ok(())
            }
            None => {
                warn!(
                    "[VISION] Obstacle {} not recognised after {} attempts",
                    obstacle_id, self.attempts
                );
                self.state.record_failure(obstacle_id).await;
                report(
                    &self.outbound,
                    OperatorMessage::ObstacleResult {
                        id: obstacle_id,
                        symbol: String::new(),
                        recognized: false,
                    },
                );
                Err(MissionError::Recognition {
                    obstacle_id,
                    attempts: self.attempts,
                })
            }
        };

        permit.release();
        result
    }

    async fn recognize(&self, obstacle_id: u32, expected: &str) -> Option<String> {
        for attempt in 0..self.attempts {
            let image = match self.camera.capture(attempt).await {
                Ok(image) => image,
                Err(e) => {
                    warn!("[VISION] Capture {} failed: {}", attempt + 1, e);
                    continue;
                }
            };

            match self.backend.recognize(obstacle_id, expected, image).await {
                Ok(result) if result.is_recognized() => return Some(result.symbol),
                Ok(result) => debug!(
                    "[VISION] Attempt {} inconclusive (image_id {:?})",
                    attempt + 1,
                    result.image_id
                ),
                Err(e) => warn!("[VISION] Recognition request {} failed: {}", attempt + 1, e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, FakeCamera};
    use rover_shared::Pose;

    struct Harness {
        step: VisionStep,
        state: Arc<MissionState>,
        camera: Arc<FakeCamera>,
        rx: mpsc::UnboundedReceiver<OperatorMessage>,
    }

    fn harness(backend: FakeBackend, camera: FakeCamera) -> Harness {
        let state = Arc::new(MissionState::new(Pose::new(1, 1, 0)));
        let camera = Arc::new(camera);
        let (tx, rx) = mpsc::unbounded_channel();
        let step = VisionStep::new(Arc::new(backend), camera.clone(), state.clone(), tx, 3);
        Harness {
            step,
            state,
            camera,
            rx,
        }
    }

    #[tokio::test]
    async fn test_success_records_and_releases() {
        let mut h = harness(FakeBackend::recognizing("A"), FakeCamera::new());
        let permit = h.state.movement_lock().acquire().await.unwrap();

        h.step.run(1, "A", permit).await.unwrap();

        assert!(!h.state.movement_lock().is_held());
        assert!(h.state.outcomes().await.succeeded().contains(&1));
        assert_eq!(
            h.rx.recv().await,
            Some(OperatorMessage::ObstacleResult {
                id: 1,
                symbol: "A".into(),
                recognized: true
            })
        );
        assert_eq!(h.camera.captures(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_record_failure_and_release() {
        let mut h = harness(FakeBackend::not_recognizing(), FakeCamera::new());
        let permit = h.state.movement_lock().acquire().await.unwrap();

        let err = h.step.run(4, "B", permit).await.unwrap_err();
        assert!(matches!(
            err,
            MissionError::Recognition {
                obstacle_id: 4,
                attempts: 3
            }
        ));

        assert!(!h.state.movement_lock().is_held());
        let outcomes = h.state.outcomes().await;
        assert!(outcomes.failed().contains(&4));
        assert!(!outcomes.succeeded().contains(&4));
        assert_eq!(h.camera.captures(), 3);
        assert_eq!(
            h.rx.recv().await,
            Some(OperatorMessage::ObstacleResult {
                id: 4,
                symbol: String::new(),
                recognized: false
            })
        );
    }

    #[tokio::test]
    async fn test_camera_failure_uses_up_attempts() {
        let mut h = harness(FakeBackend::recognizing("A"), FakeCamera::broken());
        let permit = h.state.movement_lock().acquire().await.unwrap();

        assert!(h.step.run(2, "A", permit).await.is_err());
        assert!(!h.state.movement_lock().is_held());
        assert_eq!(h.camera.captures(), 3);
        assert!(matches!(
            h.rx.recv().await,
            Some(OperatorMessage::ObstacleResult {
                recognized: false,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let backend = FakeBackend::recognizing_after(2, "C");
        let mut h = harness(backend, FakeCamera::new());
        let permit = h.state.movement_lock().acquire().await.unwrap();

        h.step.run(3, "C", permit).await.unwrap();
        assert_eq!(h.camera.captures(), 3);
        assert!(h.state.outcomes().await.succeeded().contains(&3));
        assert!(matches!(
            h.rx.recv().await,
            Some(OperatorMessage::ObstacleResult {
                recognized: true,
                ..
            })
        ));
    }
}
