use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::State;
use crate::gateway::Job;
use crate::printer::PrinterStatus;

/// Why a job cycle ended in `Failed`. The `Display` form is the reason
/// string sent to the job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// The job file could not be fetched to local storage.
    Download(String),
    /// The file could not be stored on the printer.
    Upload,
    /// The start command could not be published.
    Start(String),
    /// The printer reported a failure; carries its error code if any.
    Printer(Option<String>),
    /// The printer fell back to idle after making progress.
    StoppedUnexpectedly,
    /// No progress within the start watchdog window.
    DidNotStart,
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::Download(msg) => write!(f, "download error: {msg}"),
            FailureCause::Upload => write!(f, "upload error"),
            FailureCause::Start(msg) => write!(f, "start error: {msg}"),
            FailureCause::Printer(Some(code)) => write!(f, "{code}"),
            FailureCause::Printer(None) => write!(f, "unknown"),
            FailureCause::StoppedUnexpectedly => write!(f, "stopped unexpectedly"),
            FailureCause::DidNotStart => write!(f, "print did not start"),
        }
    }
}

/// Result of running one stage of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure(FailureCause),
    /// Shutdown was requested while the stage was waiting.
    Interrupted,
}

/// How a job cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    Completed,
    Failed(FailureCause),
    /// Abandoned on shutdown; the job queue keeps its last known state.
    Interrupted,
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleOutcome::Completed => write!(f, "completed"),
            CycleOutcome::Failed(cause) => write!(f, "failed ({cause})"),
            CycleOutcome::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// One pass of the state machine for a single job.
#[derive(Debug, Clone)]
pub struct JobCycle {
    pub job: Job,
    pub state: State,
    pub state_history: Vec<State>,
    pub failure: Option<FailureCause>,
    pub interrupted: bool,
    /// Highest progress reported to the job queue during this cycle.
    pub last_reported_progress: Option<u8>,
    /// Snapshot seen right before the start command; identical reports
    /// after it are leftovers from the previous print.
    pub pre_start_status: Option<PrinterStatus>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobCycle {
    pub fn new(job: Job) -> Self {
        let now = Utc::now();
        Self {
            job,
            state: State::Idle,
            state_history: Vec::new(),
            failure: None,
            interrupted: false,
            last_reported_progress: None,
            pre_start_status: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// `None` while the cycle is still running.
    pub fn outcome(&self) -> Option<CycleOutcome> {
        if self.interrupted {
            return Some(CycleOutcome::Interrupted);
        }
        match self.state {
            State::Completed => Some(CycleOutcome::Completed),
            State::Failed => Some(CycleOutcome::Failed(
                self.failure.clone().unwrap_or(FailureCause::Printer(None)),
            )),
            _ => None,
        }
    }
}

/// Summary of a finished cycle, logged and optionally printed as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub job_id: String,
    pub filename: String,
    pub outcome: Option<CycleOutcome>,
    pub state_transitions: Vec<State>,
    pub last_reported_progress: Option<u8>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl CycleRecord {
    pub fn from_cycle(cycle: &JobCycle) -> Self {
        let now = Utc::now();
        let mut transitions = cycle.state_history.clone();
        transitions.push(cycle.state);

        Self {
            job_id: cycle.job.id.clone(),
            filename: cycle.job.filename.clone(),
            outcome: cycle.outcome(),
            state_transitions: transitions,
            last_reported_progress: cycle.last_reported_progress,
            started_at: cycle.started_at,
            finished_at: now,
            duration_ms: (now - cycle.started_at).num_milliseconds(),
        }
    }
}
