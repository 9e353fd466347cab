//! Command-Follower State Machine
//!
//! Defines the valid transitions of the command follower and the side effect
//! each one asks its driver to perform. The machine itself performs no I/O.

use crate::command::CommandKind;

/// Where the follower is in its dispatch/acknowledge cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerState {
    /// Ready for the next command
    Idle,
    /// Reset sent, waiting for the "accepted" acknowledgement
    AwaitingResetAck,
    /// Reset accepted, waiting for the "settled" acknowledgement
    AwaitingResetRelease,
    /// Motion sent, waiting for its acknowledgement
    AwaitingMoveAck,
    /// Snapshot side-trip in progress
    AwaitingSnapshot,
    /// Finish processed
    Finished,
}

/// Events that drive the follower
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerEvent {
    /// A command of this kind has been handed to its executor
    Dispatched(CommandKind),
    /// The motor board acknowledged
    Acknowledged,
    /// The snapshot side-trip concluded (recognised or given up)
    SnapshotConcluded,
    /// Back to idle after a finished mission
    MissionReset,
    /// Mission aborted; valid from every state
    Aborted,
}

/// What the driver must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// First reset acknowledgement: heading is now zeroed
    HeadingZeroed,
    /// Release the movement lock
    ReleaseLock,
    /// Release the movement lock and advance the current location
    ReleaseLockAndAdvance,
    /// Report mission completion
    MissionComplete,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// Transition was valid
    Success { state: FollowerState, effect: Effect },
    /// Event is not valid in the current state; state unchanged
    Invalid {
        from: FollowerState,
        event: FollowerEvent,
    },
}

/// State machine for the command follower
#[derive(Debug)]
pub struct FollowerStateMachine {
    current_state: FollowerState,
    heading_zeroed: bool,
}

impl Default for FollowerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FollowerStateMachine {
    /// Create a new state machine in Idle state
    pub fn new() -> Self {
        Self {
            current_state: FollowerState::Idle,
            heading_zeroed: false,
        }
    }

    /// Get current state
    pub fn state(&self) -> FollowerState {
        self.current_state
    }

    /// Whether the first reset acknowledgement has been seen this mission
    pub fn heading_zeroed(&self) -> bool {
        self.heading_zeroed
    }

    /// Whether a motion or snapshot is in flight
    pub fn is_busy(&self) -> bool {
        !matches!(
            self.current_state,
            FollowerState::Idle | FollowerState::Finished
        )
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: FollowerEvent) -> TransitionResult {
        use FollowerState::*;

        if event == FollowerEvent::Aborted {
            self.current_state = Idle;
            self.heading_zeroed = false;
            return TransitionResult::Success {
                state: Idle,
                effect: Effect::ReleaseLock,
            };
        }

        let next = match (self.current_state, event) {
            (Idle, FollowerEvent::Dispatched(kind)) => Some(match kind {
                CommandKind::Reset => (AwaitingResetAck, Effect::None),
                CommandKind::Move => (AwaitingMoveAck, Effect::None),
                CommandKind::Snapshot => (AwaitingSnapshot, Effect::None),
                CommandKind::Finish => (Finished, Effect::MissionComplete),
            }),

            (AwaitingResetAck, FollowerEvent::Acknowledged) => {
                self.heading_zeroed = true;
                Some((AwaitingResetRelease, Effect::HeadingZeroed))
            }
            (AwaitingResetRelease, FollowerEvent::Acknowledged) => {
                Some((Idle, Effect::ReleaseLock))
            }
            (AwaitingMoveAck, FollowerEvent::Acknowledged) => {
                Some((Idle, Effect::ReleaseLockAndAdvance))
            }

            // The vision step releases the lock itself
            (AwaitingSnapshot, FollowerEvent::SnapshotConcluded) => Some((Idle, Effect::None)),

            (Finished, FollowerEvent::MissionReset) => {
                self.heading_zeroed = false;
                Some((Idle, Effect::None))
            }

            _ => None,
        };

        match next {
            Some((state, effect)) => {
                self.current_state = state;
                TransitionResult::Success { state, effect }
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }
}
