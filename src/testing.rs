//! In-process fakes for the external collaborators, and end-to-end
//! mission tests built on them

use crate::backend::types::{PathPoint, PlanData};
use crate::backend::{Backend, PathRequest, PlanResponse, Recognition};
use crate::camera::Camera;
use crate::error::BackendError;
use crate::link::{ActuatorLink, OperatorLink};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rover_shared::{ActuatorCommand, Obstacle, OperatorAction, OperatorMessage};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;

const POLL: Duration = Duration::from_millis(10);

pub fn obstacle(id: u32, x: i32, y: i32, d: i32) -> Obstacle {
    Obstacle { id, x, y, d }
}

enum RecognitionBehavior {
    /// Inconclusive this many times, then the symbol
    After(u32, String),
    Never,
}

/// Backend with a canned plan and scripted recognition
pub struct FakeBackend {
    plan: Option<PlanData>,
    recognition: RecognitionBehavior,
    online: bool,
    recognize_calls: AtomicU32,
    path_requests: Arc<Mutex<Vec<PathRequest>>>,
}

impl FakeBackend {
    fn new(plan: Option<PlanData>, recognition: RecognitionBehavior) -> Self {
        Self {
            plan,
            recognition,
            online: true,
            recognize_calls: AtomicU32::new(0),
            path_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Plans `commands`/`path` and recognises every image as "A"
    pub fn with_plan(commands: &[&str], path: &[(i32, i32, i32)]) -> Self {
        let plan = PlanData {
            commands: commands.iter().map(|c| c.to_string()).collect(),
            path: path.iter().map(|&(x, y, d)| PathPoint { x, y, d }).collect(),
        };
        Self::new(Some(plan), RecognitionBehavior::After(0, "A".into()))
    }

    pub fn failing_path() -> Self {
        Self::new(None, RecognitionBehavior::After(0, "A".into()))
    }

    pub fn recognizing(symbol: &str) -> Self {
        Self::recognizing_after(0, symbol)
    }

    pub fn recognizing_after(misses: u32, symbol: &str) -> Self {
        Self::new(None, RecognitionBehavior::After(misses, symbol.into()))
    }

    pub fn not_recognizing() -> Self {
        Self::new(None, RecognitionBehavior::Never)
    }

    /// Recognition never succeeds
    pub fn blind(mut self) -> Self {
        self.recognition = RecognitionBehavior::Never;
        self
    }

    /// Status and stitch fail
    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn path_requests(&self) -> Arc<Mutex<Vec<PathRequest>>> {
        self.path_requests.clone()
    }

    fn unavailable() -> BackendError {
        BackendError::Status {
            status: 503,
            body: "unavailable".into(),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn status(&self) -> Result<(), BackendError> {
        if self.online {
            Ok(())
        } else {
            Err(Self::unavailable())
        }
    }

    async fn request_path(&self, request: &PathRequest) -> Result<PlanResponse, BackendError> {
        if let Ok(mut requests) = self.path_requests.lock() {
            requests.push(request.clone());
        }
        match &self.plan {
            Some(data) => Ok(PlanResponse { data: data.clone() }),
            None => Err(BackendError::Status {
                status: 500,
                body: "no path".into(),
            }),
        }
    }

    async fn recognize(
        &self,
        obstacle_id: u32,
        _symbol: &str,
        _image: Vec<u8>,
    ) -> Result<Recognition, BackendError> {
        let call = self.recognize_calls.fetch_add(1, Ordering::SeqCst);
        let (image_id, symbol) = match &self.recognition {
            RecognitionBehavior::After(misses, symbol) if call >= *misses => {
                (obstacle_id.to_string(), symbol.clone())
            }
            _ => ("NA".to_string(), String::new()),
        };
        Ok(Recognition {
            image_id,
            symbol,
            obstacle_id: obstacle_id.to_string(),
        })
    }

    async fn stitch(&self) -> Result<(), BackendError> {
        self.status().await
    }
}

/// Camera returning a tiny JPEG, or failing every capture
pub struct FakeCamera {
    broken: bool,
    captures: AtomicU32,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            broken: false,
            captures: AtomicU32::new(0),
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new()
        }
    }

    pub fn captures(&self) -> u32 {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn capture(&self, _attempt: u32) -> Result<Vec<u8>> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(anyhow!("camera unplugged"));
        }
        Ok(vec![0xff, 0xd8, 0xff, 0xd9])
    }
}

type SendHook = Box<dyn Fn(&str) + Send + Sync>;

/// Motor board that records every command and replays scripted tokens
pub struct FakeActuator {
    sent: Mutex<Vec<String>>,
    sent_changed: Notify,
    on_send: Mutex<Option<SendHook>>,
    board_tx: mpsc::UnboundedSender<String>,
    board_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl FakeActuator {
    pub fn new() -> Self {
        let (board_tx, board_rx) = mpsc::unbounded_channel();
        Self {
            sent: Mutex::new(Vec::new()),
            sent_changed: Notify::new(),
            on_send: Mutex::new(None),
            board_tx,
            board_rx: tokio::sync::Mutex::new(board_rx),
        }
    }

    /// Run `hook` with each token as it is written
    pub fn on_send(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        if let Ok(mut slot) = self.on_send.lock() {
            *slot = Some(Box::new(hook));
        }
    }

    /// Queue a token for the link to deliver
    pub fn reply(&self, token: &str) {
        let _ = self.board_tx.send(token.to_string());
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.sent_changed.notified();
            if self.sent().len() >= count {
                return;
            }
            let _ = timeout(POLL, notified).await;
        }
    }
}

#[async_trait]
impl ActuatorLink for FakeActuator {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, command: &ActuatorCommand) -> Result<()> {
        let token = command.to_string();
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(token.clone());
        }
        self.sent_changed.notify_waiters();
        if let Ok(hook) = self.on_send.lock() {
            if let Some(hook) = hook.as_ref() {
                hook(&token);
            }
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Option<String>> {
        let mut rx = self.board_rx.lock().await;
        match timeout(POLL, rx.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(token)) => Ok(Some(token)),
            Ok(None) => Err(anyhow!("board gone")),
        }
    }
}

/// Operator app fed from a channel, recording what it receives
pub struct FakeOperator {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<OperatorAction>>,
    delivered: mpsc::UnboundedSender<OperatorMessage>,
    failing_sends: AtomicU32,
}

impl FakeOperator {
    /// Returns the link, the app's outgoing side and what the app receives
    pub fn new() -> (
        Self,
        mpsc::UnboundedSender<OperatorAction>,
        mpsc::UnboundedReceiver<OperatorMessage>,
    ) {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let link = Self {
            inbound: tokio::sync::Mutex::new(action_rx),
            delivered: message_tx,
            failing_sends: AtomicU32::new(0),
        };
        (link, action_tx, message_rx)
    }

    /// Fail the next `count` sends as a dropped link would
    pub fn fail_sends(&self, count: u32) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl OperatorLink for FakeOperator {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, message: &OperatorMessage) -> Result<()> {
        let failing = self.failing_sends.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_sends.store(failing - 1, Ordering::SeqCst);
            return Err(anyhow!("operator link down"));
        }
        self.delivered
            .send(message.clone())
            .map_err(|_| anyhow!("operator app gone"))
    }

    async fn recv(&self) -> Result<Option<OperatorAction>> {
        let mut rx = self.inbound.lock().await;
        match timeout(POLL, rx.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(action)) => Ok(Some(action)),
            Ok(None) => {
                // App gone: behave like a quiet link
                drop(rx);
                tokio::time::sleep(POLL).await;
                Ok(None)
            }
        }
    }
}

mod scenario {
    use super::*;
    use crate::config::RoverConfig;
    use crate::link::operator;
    use crate::rover::{Collaborators, Rover};
    use rover_shared::{Pose, RobotStatus};

    const STEP: Duration = Duration::from_secs(2);

    struct Mission {
        rover: Rover,
        actuator: Arc<FakeActuator>,
        app_tx: mpsc::UnboundedSender<OperatorAction>,
        app_rx: mpsc::UnboundedReceiver<OperatorMessage>,
    }

    impl Mission {
        fn launch(backend: FakeBackend) -> Self {
            let (operator, app_tx, app_rx) = FakeOperator::new();
            let actuator = Arc::new(FakeActuator::new());
            let rover = Rover::spawn(
                Collaborators {
                    operator: Arc::new(operator),
                    actuator: actuator.clone(),
                    backend: Arc::new(backend),
                    camera: Arc::new(FakeCamera::new()),
                },
                &RoverConfig::default(),
            );
            Self {
                rover,
                actuator,
                app_tx,
                app_rx,
            }
        }

        /// Next message the app receives
        async fn expect(&mut self) -> OperatorMessage {
            timeout(STEP, self.app_rx.recv())
                .await
                .expect("operator message in time")
                .expect("sender alive")
        }

        /// Skip messages until one matches
        async fn expect_match(&mut self, wanted: impl Fn(&OperatorMessage) -> bool) -> OperatorMessage {
            loop {
                let message = self.expect().await;
                if wanted(&message) {
                    return message;
                }
            }
        }

        async fn submit_and_start(&mut self) {
            self.app_tx
                .send(OperatorAction::Obstacles {
                    obstacles: vec![obstacle(1, 2, 1, 0)],
                    mode: "0".into(),
                })
                .unwrap();
            self.expect_match(|m| *m == OperatorMessage::Status(RobotStatus::Ready))
                .await;

            self.app_tx.send(OperatorAction::Start).unwrap();
            self.expect_match(|m| *m == OperatorMessage::Status(RobotStatus::Running))
                .await;
        }
    }

    fn scenario_backend() -> FakeBackend {
        FakeBackend::with_plan(&["RS00", "FW01", "SNAP1_A", "FIN"], &[(1, 1, 0), (2, 1, 0)])
    }

    #[tokio::test]
    async fn test_reset_move_snapshot_finish() {
        let mut m = Mission::launch(scenario_backend());
        m.submit_and_start().await;

        timeout(STEP, m.actuator.wait_for_sent(1)).await.unwrap();
        assert_eq!(m.actuator.sent(), vec!["RS00"]);

        // Reset: accepted, then settled; the robot has not moved
        m.actuator.reply("ACK");
        m.actuator.reply("ACK");
        timeout(STEP, m.actuator.wait_for_sent(2)).await.unwrap();
        assert_eq!(m.actuator.sent(), vec!["RS00", "FW01"]);
        assert_eq!(m.rover.state.location().await, Pose::new(1, 1, 0));

        // Third ACK completes the move
        m.actuator.reply("ACK");
        assert_eq!(
            m.expect().await,
            OperatorMessage::Location(Pose::new(2, 1, 0))
        );
        assert_eq!(m.rover.state.location().await, Pose::new(2, 1, 0));

        assert_eq!(
            m.expect().await,
            OperatorMessage::ObstacleResult {
                id: 1,
                symbol: "A".into(),
                recognized: true
            }
        );
        assert!(matches!(m.expect().await, OperatorMessage::Info(_)));
        assert_eq!(
            m.expect().await,
            OperatorMessage::Status(RobotStatus::Finished)
        );
        assert_eq!(m.expect().await, OperatorMessage::info("Images stitched"));

        let outcomes = m.rover.state.outcomes().await;
        assert!(outcomes.succeeded().contains(&1));
        assert!(outcomes.failed().is_empty());
        assert!(!m.rover.state.movement_lock().is_held());

        // Snapshot and finish never reach the motor board
        assert_eq!(m.actuator.sent(), vec!["RS00", "FW01"]);

        m.rover.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_recognition_still_finishes() {
        let mut m = Mission::launch(scenario_backend().blind());
        m.submit_and_start().await;

        timeout(STEP, m.actuator.wait_for_sent(1)).await.unwrap();
        m.actuator.reply("ACK");
        m.actuator.reply("ACK");
        timeout(STEP, m.actuator.wait_for_sent(2)).await.unwrap();
        m.actuator.reply("ACK");

        let result = m
            .expect_match(|msg| matches!(msg, OperatorMessage::ObstacleResult { .. }))
            .await;
        assert_eq!(
            result,
            OperatorMessage::ObstacleResult {
                id: 1,
                symbol: String::new(),
                recognized: false
            }
        );
        m.expect_match(|msg| *msg == OperatorMessage::Status(RobotStatus::Finished))
            .await;

        let outcomes = m.rover.state.outcomes().await;
        assert!(outcomes.failed().contains(&1));
        assert!(!outcomes.succeeded().contains(&1));
        assert!(!m.rover.state.movement_lock().is_held());

        m.rover.shutdown().await;
    }

    #[tokio::test]
    async fn test_planning_failure_leaves_nothing_to_run() {
        let mut m = Mission::launch(FakeBackend::failing_path());

        m.app_tx
            .send(OperatorAction::Obstacles {
                obstacles: vec![obstacle(1, 2, 1, 0)],
                mode: "0".into(),
            })
            .unwrap();
        assert!(matches!(m.expect().await, OperatorMessage::Error(_)));
        assert!(m.rover.queue.is_empty().await);

        m.app_tx.send(OperatorAction::Start).unwrap();
        assert!(matches!(m.expect().await, OperatorMessage::Error(_)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(m.actuator.sent().is_empty());

        m.rover.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_halts_between_commands() {
        let mut m = Mission::launch(scenario_backend());
        m.submit_and_start().await;
        timeout(STEP, m.actuator.wait_for_sent(1)).await.unwrap();

        // Stop while RS00 is in flight: it completes, FW01 is held back
        m.app_tx.send(OperatorAction::Stop).unwrap();
        m.expect_match(|msg| *msg == OperatorMessage::Status(RobotStatus::Stopped))
            .await;
        m.actuator.reply("ACK");
        m.actuator.reply("ACK");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(m.actuator.sent(), vec!["RS00"]);
        assert!(!m.rover.state.movement_lock().is_held());

        m.app_tx.send(OperatorAction::Start).unwrap();
        timeout(STEP, m.actuator.wait_for_sent(2)).await.unwrap();
        assert_eq!(m.actuator.sent(), vec!["RS00", "FW01"]);

        m.rover.shutdown().await;
    }

    #[tokio::test]
    async fn test_new_obstacles_during_move_replan_from_landed_pose() {
        let backend = FakeBackend::with_plan(&["FW01", "FIN"], &[(1, 1, 0), (2, 1, 0)]);
        let requests = backend.path_requests();
        let mut m = Mission::launch(backend);
        m.submit_and_start().await;
        timeout(STEP, m.actuator.wait_for_sent(1)).await.unwrap();

        // Resubmit while FW01 waits for its ACK
        m.app_tx
            .send(OperatorAction::Obstacles {
                obstacles: vec![obstacle(1, 2, 1, 0)],
                mode: "0".into(),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        m.actuator.reply("ACK");

        assert_eq!(
            m.expect_match(|msg| matches!(msg, OperatorMessage::Location(_)))
                .await,
            OperatorMessage::Location(Pose::new(2, 1, 0))
        );
        m.expect_match(|msg| *msg == OperatorMessage::Status(RobotStatus::Ready))
            .await;

        let robot = {
            let requests = requests.lock().unwrap();
            assert_eq!(requests.len(), 2);
            (requests[1].robot_x, requests[1].robot_y)
        };
        assert_eq!(robot, (2, 1));
        assert_eq!(m.rover.state.location().await, Pose::new(2, 1, 0));
        assert_eq!(m.rover.queue.len().await, (2, 1));
        assert!(!m.rover.state.gate().is_open());
        assert_eq!(m.actuator.sent(), vec!["FW01"]);

        m.rover.shutdown().await;
    }

    #[tokio::test]
    async fn test_sender_preserves_order_across_failures() {
        let (link, _app_tx, mut app_rx) = FakeOperator::new();
        link.fail_sends(2);
        let (tx, rx) = mpsc::unbounded_channel();

        let expected: Vec<OperatorMessage> = (0..5)
            .map(|i| OperatorMessage::info(format!("message {}", i)))
            .collect();
        for message in &expected {
            tx.send(message.clone()).unwrap();
        }
        drop(tx);

        operator::run_sender(Arc::new(link), rx, Duration::from_millis(5)).await;

        let mut delivered = Vec::new();
        while let Ok(message) = app_rx.try_recv() {
            delivered.push(message);
        }
        assert_eq!(delivered, expected);
    }

    #[tokio::test]
    async fn test_one_token_per_command_in_order() {
        let commands = ["RS00", "FW01", "FR02", "BW10", "TL01", "FIN"];
        let path = [(1, 1, 0), (2, 1, 0), (3, 2, 1), (3, 1, 1), (3, 1, 3)];
        let mut m = Mission::launch(FakeBackend::with_plan(&commands, &path));
        let actuator = m.actuator.clone();
        actuator.on_send({
            let board = actuator.clone();
            move |token: &str| {
                board.reply("ACK");
                if token == "RS00" {
                    board.reply("ACK");
                }
            }
        });

        m.submit_and_start().await;
        m.expect_match(|msg| *msg == OperatorMessage::Status(RobotStatus::Finished))
            .await;

        assert_eq!(m.actuator.sent(), vec!["RS00", "FW01", "FR02", "BW10", "TL01"]);
        assert_eq!(m.rover.state.location().await, Pose::new(3, 1, 3));

        m.rover.shutdown().await;
    }
}
