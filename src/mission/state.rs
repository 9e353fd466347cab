//! Shared mission state
//!
//! Current-Location, the obstacle registry and recognition outcomes, the
//! movement lock and the start gate. Only the command follower and the
//! vision step write the location and outcomes.

use crate::error::MissionError;
use rover_shared::{Obstacle, Pose};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{watch, OwnedSemaphorePermit, RwLock, Semaphore};

/// Disjoint record of recognised and failed obstacles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObstacleOutcomes {
    succeeded: BTreeSet<u32>,
    failed: BTreeSet<u32>,
}

impl ObstacleOutcomes {
    /// A later success overrides an earlier failure
    pub fn record_success(&mut self, obstacle_id: u32) {
        self.failed.remove(&obstacle_id);
        self.succeeded.insert(obstacle_id);
    }

    /// Returns false (and records nothing) if the obstacle already succeeded
    pub fn record_failure(&mut self, obstacle_id: u32) -> bool {
        if self.succeeded.contains(&obstacle_id) {
            return false;
        }
        self.failed.insert(obstacle_id)
    }

    pub fn succeeded(&self) -> &BTreeSet<u32> {
        &self.succeeded
    }

    pub fn failed(&self) -> &BTreeSet<u32> {
        &self.failed
    }

    pub fn clear(&mut self) {
        self.succeeded.clear();
        self.failed.clear();
    }
}

/// Binary lock held while a command is in flight
///
/// Acquiring yields an owned [`MovementPermit`]. Whoever ends up holding the
/// permit releases the lock by dropping it, which lets the follower hand a
/// snapshot's permit to the vision step.
#[derive(Debug, Clone)]
pub struct MovementLock {
    semaphore: Arc<Semaphore>,
}

/// Proof of holding the movement lock; dropping it releases the lock
#[derive(Debug)]
pub struct MovementPermit {
    _permit: OwnedSemaphorePermit,
}

impl MovementPermit {
    /// Release explicitly (equivalent to dropping)
    pub fn release(self) {}
}

impl Default for MovementLock {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementLock {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wait for the lock. Never acquire while already holding a permit.
    pub async fn acquire(&self) -> Result<MovementPermit, MissionError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MissionError::Protocol("movement lock closed".into()))?;
        Ok(MovementPermit { _permit: permit })
    }

    pub fn is_held(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

/// Enables the command follower; closed until the operator starts a mission
#[derive(Debug, Clone)]
pub struct StartGate {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StartGate {
    fn default() -> Self {
        Self::new()
    }
}

impl StartGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn close(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the gate is open
    pub async fn wait_open(&self) {
        self.wait_for(true).await
    }

    /// Wait until the gate is closed
    pub async fn wait_closed(&self) {
        self.wait_for(false).await
    }

    async fn wait_for(&self, open: bool) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|state| *state == open).await;
    }
}

/// State shared by the dispatcher, the follower and the vision step
#[derive(Debug)]
pub struct MissionState {
    location: RwLock<Pose>,
    obstacles: RwLock<BTreeMap<u32, Obstacle>>,
    outcomes: RwLock<ObstacleOutcomes>,
    lock: MovementLock,
    gate: StartGate,
}

impl MissionState {
    pub fn new(start: Pose) -> Self {
        Self {
            location: RwLock::new(start),
            obstacles: RwLock::new(BTreeMap::new()),
            outcomes: RwLock::new(ObstacleOutcomes::default()),
            lock: MovementLock::new(),
            gate: StartGate::new(),
        }
    }

    pub async fn location(&self) -> Pose {
        *self.location.read().await
    }

    pub async fn set_location(&self, pose: Pose) {
        *self.location.write().await = pose;
    }

    /// Registered obstacles in id order
    pub async fn obstacles(&self) -> Vec<Obstacle> {
        self.obstacles.read().await.values().cloned().collect()
    }

    /// Replace the obstacle registry for a new mission
    ///
    /// Ids are unique; a repeated id keeps the last obstacle sent.
    pub async fn set_obstacles(&self, obstacles: Vec<Obstacle>) {
        let registry = obstacles.into_iter().map(|o| (o.id, o)).collect();
        *self.obstacles.write().await = registry;
        self.outcomes.write().await.clear();
    }

    pub async fn outcomes(&self) -> ObstacleOutcomes {
        self.outcomes.read().await.clone()
    }

    pub async fn record_success(&self, obstacle_id: u32) {
        self.outcomes.write().await.record_success(obstacle_id);
    }

    pub async fn record_failure(&self, obstacle_id: u32) -> bool {
        self.outcomes.write().await.record_failure(obstacle_id)
    }

    pub fn movement_lock(&self) -> &MovementLock {
        &self.lock
    }

    pub fn gate(&self) -> &StartGate {
        &self.gate
    }
}
