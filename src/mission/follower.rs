//! Command follower
//!
//! Drains the plan one command at a time. Reset and move commands go to the
//! motor board and hold the movement lock until acknowledged (twice for a
//! reset). Snapshot commands hand the lock to the vision step, which releases
//! it when recognition concludes. Finish reports mission completion.

use crate::error::MissionError;
use crate::link::{ActuatorEvent, ActuatorLink};
use crate::mission::queue::{PlanQueue, PlannedCommand};
use crate::mission::state::{MissionState, MovementPermit};
use crate::mission::vision::VisionStep;
use crate::mission::{report, Action};
use rover_shared::state_machine::{Effect, FollowerEvent, FollowerStateMachine, TransitionResult};
use rover_shared::{is_ack, ActuatorCommand, OperatorMessage, RobotStatus};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub struct CommandFollower {
    actuator: Arc<dyn ActuatorLink>,
    acks: mpsc::UnboundedReceiver<ActuatorEvent>,
    queue: Arc<PlanQueue>,
    state: Arc<MissionState>,
    vision: VisionStep,
    outbound: mpsc::UnboundedSender<OperatorMessage>,
    actions: mpsc::UnboundedSender<Action>,
    fsm: FollowerStateMachine,
}

impl CommandFollower {
    pub fn new(
        actuator: Arc<dyn ActuatorLink>,
        acks: mpsc::UnboundedReceiver<ActuatorEvent>,
        queue: Arc<PlanQueue>,
        state: Arc<MissionState>,
        vision: VisionStep,
        outbound: mpsc::UnboundedSender<OperatorMessage>,
        actions: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self {
            actuator,
            acks,
            queue,
            state,
            vision,
            outbound,
            actions,
            fsm: FollowerStateMachine::new(),
        }
    }

    /// Run until the plan queue is closed
    pub async fn run(mut self) {
        info!("[FOLLOWER] Started");

        while let Some(PlannedCommand {
            command,
            generation,
        }) = self.next_command().await
        {
            if let Err(e) = self.execute(command, generation).await {
                self.abort(e, generation).await;
            }
        }

        info!("[FOLLOWER] Plan queue closed, follower stopping");
    }

    /// Pop the next command, but only while the start gate is open
    async fn next_command(&self) -> Option<PlannedCommand> {
        let gate = self.state.gate();
        loop {
            gate.wait_open().await;
            tokio::select! {
                planned = self.queue.pop_command() => return planned,
                _ = gate.wait_closed() => debug!("[FOLLOWER] Stopped while idle"),
            }
        }
    }

    async fn execute(
        &mut self,
        command: ActuatorCommand,
        generation: u64,
    ) -> Result<(), MissionError> {
        let permit = self.state.movement_lock().acquire().await?;

        // The plan may have been replaced while we waited for the lock
        if !self.queue.is_current(generation).await {
            info!("[FOLLOWER] Dropping {} from a replaced plan", command);
            return Ok(());
        }
        debug!("[FOLLOWER] Executing {}", command);

        match &command {
            c if c.is_actuated() => self.drive(c, permit).await,
            ActuatorCommand::Snapshot {
                obstacle_id,
                symbol,
            } => {
                self.transition(FollowerEvent::Dispatched(command.kind()))?;

                if let Err(e) = self.vision.run(*obstacle_id, symbol, permit).await {
                    warn!("[FOLLOWER] {}", e);
                }
                self.transition(FollowerEvent::SnapshotConcluded)?;
                Ok(())
            }
            // Finish
            _ => {
                if self.transition(FollowerEvent::Dispatched(command.kind()))?
                    == Effect::MissionComplete
                {
                    self.complete().await;
                }
                self.transition(FollowerEvent::MissionReset)?;
                permit.release();
                Ok(())
            }
        }
    }

    /// Send a motor-board command and hold the lock until it is acknowledged
    async fn drive(
        &mut self,
        command: &ActuatorCommand,
        permit: MovementPermit,
    ) -> Result<(), MissionError> {
        self.discard_stale_events();
        self.transition(FollowerEvent::Dispatched(command.kind()))?;

        self.actuator
            .send(command)
            .await
            .map_err(|e| MissionError::Protocol(format!("failed to send {}: {}", command, e)))?;
        info!("[FOLLOWER] Sent {}", command);

        let effect = loop {
            self.await_ack().await?;
            match self.transition(FollowerEvent::Acknowledged)? {
                Effect::HeadingZeroed => info!("[FOLLOWER] Heading zeroed, waiting for reset to settle"),
                effect => break effect,
            }
        };

        // Advance under the lock so a replan cannot swap the path underneath
        if effect == Effect::ReleaseLockAndAdvance {
            self.advance().await;
        }
        permit.release();
        Ok(())
    }

    /// Block for the next acknowledgement; other tokens are skipped
    async fn await_ack(&mut self) -> Result<(), MissionError> {
        loop {
            match self.acks.recv().await {
                Some(ActuatorEvent::Token(token)) if is_ack(&token) => {
                    debug!("[FOLLOWER] {} in {:?}", token, self.fsm.state());
                    return Ok(());
                }
                Some(ActuatorEvent::Token(token)) => {
                    debug!("[FOLLOWER] Ignoring {:?} while waiting for ACK", token)
                }
                Some(ActuatorEvent::Disconnected { reason }) => {
                    return Err(MissionError::Protocol(format!(
                        "motor board link lost while waiting for ACK: {}",
                        reason
                    )))
                }
                None => {
                    return Err(MissionError::Protocol(
                        "acknowledgement channel closed".into(),
                    ))
                }
            }
        }
    }

    /// Drop tokens that arrived while no command was in flight
    fn discard_stale_events(&mut self) {
        while let Ok(event) = self.acks.try_recv() {
            debug!("[FOLLOWER] Discarding stale {:?}", event);
        }
    }

    async fn advance(&self) {
        match self.queue.pop_path().await {
            Some(pose) => {
                self.state.set_location(pose).await;
                info!("[FOLLOWER] Location ({}, {}, {})", pose.x, pose.y, pose.d);
                report(&self.outbound, OperatorMessage::Location(pose));
            }
            None => warn!("[FOLLOWER] Move acknowledged but the path is exhausted"),
        }
    }

    async fn complete(&self) {
        // Anything after FIN is not part of this mission
        self.queue.clear().await;
        self.state.gate().close();

        let outcomes = self.state.outcomes().await;
        info!(
            "[FOLLOWER] Mission complete: {} recognised, {} failed",
            outcomes.succeeded().len(),
            outcomes.failed().len()
        );
        report(
            &self.outbound,
            OperatorMessage::info(format!(
                "Mission complete: {} recognised, {} failed",
                outcomes.succeeded().len(),
                outcomes.failed().len()
            )),
        );
        report(&self.outbound, OperatorMessage::Status(RobotStatus::Finished));

        if self.actions.send(Action::Stitch).is_err() {
            warn!("[FOLLOWER] Dispatcher gone, skipping stitch");
        }
    }

    /// Controlled reset after a fatal mission error
    async fn abort(&mut self, reason: MissionError, generation: u64) {
        error!("[FOLLOWER] Mission aborted: {}", reason);
        if self.fsm.is_busy() {
            warn!("[FOLLOWER] Abandoning command in {:?}", self.fsm.state());
        }

        self.fsm.process_event(FollowerEvent::Aborted);
        // A plan loaded since the failure is left alone
        self.queue.discard(generation).await;
        self.state.gate().close();

        report(
            &self.outbound,
            OperatorMessage::error(format!("Mission aborted: {}", reason)),
        );
        report(&self.outbound, OperatorMessage::Status(RobotStatus::Aborted));
    }

    fn transition(&mut self, event: FollowerEvent) -> Result<Effect, MissionError> {
        match self.fsm.process_event(event) {
            TransitionResult::Success { state, effect } => {
                debug!("[FOLLOWER] {:?} -> {:?} ({:?})", event, state, effect);
                Ok(effect)
            }
            TransitionResult::Invalid { from, event } => Err(MissionError::Protocol(format!(
                "{:?} is not valid in {:?}",
                event, from
            ))),
        }
    }
}
