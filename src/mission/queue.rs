//! Command and path queues
//!
//! Both FIFOs live under one lock so the follower never sees a plan that is
//! only partly loaded. Every load or clear starts a new generation, so a
//! command popped from a replaced plan can be recognised as stale.

use rover_shared::{ActuatorCommand, Pose};
use std::collections::VecDeque;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Default)]
struct PlanQueueState {
    commands: VecDeque<ActuatorCommand>,
    path: VecDeque<Pose>,
    generation: u64,
    closed: bool,
}

/// A command together with the plan generation it was popped from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub command: ActuatorCommand,
    pub generation: u64,
}

/// The plan the follower drains
#[derive(Debug, Default)]
pub struct PlanQueue {
    inner: Mutex<PlanQueueState>,
    available: Notify,
}

impl PlanQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is queued with a complete plan, then wake the follower
    pub async fn load_plan(&self, commands: Vec<ActuatorCommand>, path: Vec<Pose>) {
        let mut guard = self.inner.lock().await;
        guard.commands = commands.into();
        guard.path = path.into();
        guard.generation += 1;
        drop(guard);
        self.available.notify_one();
    }

    pub async fn clear(&self) {
        let mut guard = self.inner.lock().await;
        guard.commands.clear();
        guard.path.clear();
        guard.generation += 1;
    }

    /// Clear the queues only if they still hold plan `generation`
    pub async fn discard(&self, generation: u64) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            return false;
        }
        guard.commands.clear();
        guard.path.clear();
        guard.generation += 1;
        true
    }

    /// Generation of the plan currently loaded
    pub async fn generation(&self) -> u64 {
        self.inner.lock().await.generation
    }

    /// Whether `generation` still names the loaded plan
    pub async fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().await.generation == generation
    }

    /// Wait for the next command; `None` once the queue is closed
    pub async fn pop_command(&self) -> Option<PlannedCommand> {
        loop {
            {
                let mut guard = self.inner.lock().await;
                if let Some(command) = guard.commands.pop_front() {
                    return Some(PlannedCommand {
                        command,
                        generation: guard.generation,
                    });
                }
                if guard.closed {
                    return None;
                }
            }
            // A notify_one with no waiter is stored, so a plan loaded
            // between the check and here is not missed
            self.available.notified().await;
        }
    }

    /// Next waypoint, if the plan has one left
    pub async fn pop_path(&self) -> Option<Pose> {
        self.inner.lock().await.path.pop_front()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.commands.is_empty()
    }

    /// Queued (commands, path points)
    pub async fn len(&self) -> (usize, usize) {
        let guard = self.inner.lock().await;
        (guard.commands.len(), guard.path.len())
    }

    /// Wake the consumer for good
    pub async fn close(&self) {
        self.inner.lock().await.closed = true;
        self.available.notify_one();
    }
}
