use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{JobCycle, StepOutcome};

/// States of a job cycle.
///
/// Each job flows through: IDLE → DOWNLOADING → UPLOADING → STARTING →
/// MONITORING → {COMPLETED, FAILED} → IDLE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Idle,
    Downloading,
    Uploading,
    Starting,
    Monitoring,
    Completed,
    Failed,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Completed | State::Failed)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "IDLE"),
            State::Downloading => write!(f, "DOWNLOADING"),
            State::Uploading => write!(f, "UPLOADING"),
            State::Starting => write!(f, "STARTING"),
            State::Monitoring => write!(f, "MONITORING"),
            State::Completed => write!(f, "COMPLETED"),
            State::Failed => write!(f, "FAILED"),
        }
    }
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Move to the given state.
    Next(State),
    /// Shutdown interrupted the cycle; the state is left where it was.
    Interrupted,
}

/// Drives a `JobCycle` through the state machine.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the next transition for `cycle` given the outcome
    /// of the stage it is in.
    ///
    /// - A successful stage advances to the following state; a successful
    ///   `Monitoring` stage ends in `Completed`.
    /// - A failed stage goes straight to `Failed`, skipping every later stage.
    /// - `Completed` and `Failed` always return to `Idle` (cleanup done).
    /// - `Interrupted` freezes the cycle in its current state.
    pub fn next(cycle: &mut JobCycle, outcome: StepOutcome) -> Transition {
        let transition = match (cycle.state, outcome) {
            (State::Completed | State::Failed, _) => Transition::Next(State::Idle),
            (_, StepOutcome::Interrupted) => Transition::Interrupted,
            (State::Idle, StepOutcome::Success) => Transition::Next(State::Downloading),
            // Nothing was acquired; there is no cycle to fail.
            (State::Idle, StepOutcome::Failure(_)) => Transition::Next(State::Idle),
            (State::Downloading, StepOutcome::Success) => Transition::Next(State::Uploading),
            (State::Uploading, StepOutcome::Success) => Transition::Next(State::Starting),
            (State::Starting, StepOutcome::Success) => Transition::Next(State::Monitoring),
            (State::Monitoring, StepOutcome::Success) => Transition::Next(State::Completed),
            (_, StepOutcome::Failure(cause)) => {
                cycle.failure = Some(cause);
                Transition::Next(State::Failed)
            }
        };

        match &transition {
            Transition::Next(next_state) => {
                cycle.state_history.push(cycle.state);
                cycle.state = *next_state;
            }
            Transition::Interrupted => cycle.interrupted = true,
        }
        cycle.updated_at = chrono::Utc::now();

        transition
    }
}
