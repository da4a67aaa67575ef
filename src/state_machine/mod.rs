mod job;
mod state;

pub use job::{CycleOutcome, CycleRecord, FailureCause, JobCycle, StepOutcome};
pub use state::{State, StateMachine, Transition};
