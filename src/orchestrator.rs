use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::gateway::{Job, JobGateway, TerminalOutcome};
use crate::printer::{PrintState, PrinterLink, PrinterStatus, SessionState};
use crate::state_machine::{
    CycleOutcome, CycleRecord, FailureCause, JobCycle, State, StateMachine, StepOutcome,
    Transition,
};

/// Timing and filesystem settings for the control loop.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub poll_interval: Duration,
    pub progress_update_interval: Duration,
    pub monitor_interval: Duration,
    pub download_dir: PathBuf,
    pub start_watchdog: Option<Duration>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            progress_update_interval: config.progress_update_interval(),
            monitor_interval: config.monitor_interval(),
            download_dir: config.download_dir.clone(),
            start_watchdog: config.start_watchdog(),
        }
    }
}

/// Drives jobs from the queue through the printer, one at a time.
pub struct JobOrchestrator<G, P> {
    gateway: G,
    printer: P,
    settings: OrchestratorSettings,
    shutdown: CancellationToken,
    records: Option<mpsc::Sender<CycleRecord>>,
}

impl<G: JobGateway, P: PrinterLink> JobOrchestrator<G, P> {
    pub fn new(
        gateway: G,
        printer: P,
        settings: OrchestratorSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            printer,
            settings,
            shutdown,
            records: None,
        }
    }

    /// Also hand every finished cycle's record to `sink`. A full sink drops
    /// the record rather than stalling the loop.
    pub fn with_record_sink(mut self, sink: mpsc::Sender<CycleRecord>) -> Self {
        self.records = Some(sink);
        self
    }

    pub fn printer(&self) -> &P {
        &self.printer
    }

    /// Poll for jobs until shutdown.
    ///
    /// Returns `Ok(())` on shutdown and [`ControllerError::Connection`] once
    /// the printer session is gone. Job-level faults never escape.
    pub async fn run(&self) -> Result<(), ControllerError> {
        tracing::info!(
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "controller started"
        );

        while !self.shutdown.is_cancelled() {
            self.ensure_session()?;

            if !self.printer.is_idle() {
                tracing::debug!("printer busy or no status yet");
                if !self.pause(self.settings.poll_interval).await {
                    break;
                }
                continue;
            }

            match self.gateway.fetch_next_job().await {
                Ok(Some(job)) => {
                    self.process_job(job).await;
                }
                Ok(None) => {
                    tracing::debug!("no jobs in queue");
                    if !self.pause(self.settings.poll_interval).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to fetch next job");
                    if !self.pause(self.settings.poll_interval).await {
                        break;
                    }
                }
            }
        }

        tracing::info!("controller stopped");
        Ok(())
    }

    fn ensure_session(&self) -> Result<(), ControllerError> {
        match self.printer.session_state() {
            SessionState::Connected => Ok(()),
            state => Err(ControllerError::Connection(format!(
                "printer session lost ({state:?})"
            ))),
        }
    }

    /// Sleep for `duration` unless shutdown comes first. Returns `false`
    /// on shutdown.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }

    /// Run one full job cycle and return its record. The local file is
    /// removed afterwards whatever the outcome.
    pub async fn process_job(&self, job: Job) -> CycleRecord {
        tracing::info!(job_id = %job.id, filename = %job.filename, "processing job");

        let local_path = self.settings.download_dir.join(job.local_filename());
        let mut cycle = JobCycle::new(job);
        StateMachine::next(&mut cycle, StepOutcome::Success);

        self.drive(&mut cycle, &local_path).await;
        self.report_outcome(&cycle).await;

        if let Err(e) = tokio::fs::remove_file(&local_path).await {
            tracing::debug!(path = %local_path.display(), error = %e, "temp file not removed");
        }

        let record = CycleRecord::from_cycle(&cycle);
        if cycle.state.is_terminal() {
            StateMachine::next(&mut cycle, StepOutcome::Success);
        }
        self.emit(&record);
        record
    }

    async fn drive(&self, cycle: &mut JobCycle, local_path: &Path) {
        loop {
            let outcome = if self.shutdown.is_cancelled() {
                StepOutcome::Interrupted
            } else {
                match cycle.state {
                    State::Downloading => self.download(cycle, local_path).await,
                    State::Uploading => self.upload(cycle, local_path).await,
                    State::Starting => self.start(cycle).await,
                    State::Monitoring => self.monitor(cycle).await,
                    State::Idle | State::Completed | State::Failed => break,
                }
            };

            match StateMachine::next(cycle, outcome) {
                Transition::Next(state) => {
                    tracing::info!(job_id = %cycle.job.id, %state, "job state changed");
                }
                Transition::Interrupted => {
                    tracing::info!(
                        job_id = %cycle.job.id,
                        state = %cycle.state,
                        "job cycle interrupted by shutdown"
                    );
                    break;
                }
            }
        }
    }

    async fn download(&self, cycle: &JobCycle, local_path: &Path) -> StepOutcome {
        match self.gateway.download_job_file(&cycle.job, local_path).await {
            Ok(bytes) => {
                tracing::info!(
                    job_id = %cycle.job.id,
                    bytes,
                    path = %local_path.display(),
                    "downloaded job file"
                );
                StepOutcome::Success
            }
            Err(e) => {
                tracing::error!(job_id = %cycle.job.id, error = %e, "download failed");
                StepOutcome::Failure(FailureCause::Download(e.to_string()))
            }
        }
    }

    async fn upload(&self, cycle: &JobCycle, local_path: &Path) -> StepOutcome {
        let remote = cycle.job.remote_filename();
        if self.printer.upload(local_path, &remote).await {
            StepOutcome::Success
        } else {
            StepOutcome::Failure(FailureCause::Upload)
        }
    }

    async fn start(&self, cycle: &mut JobCycle) -> StepOutcome {
        if let Err(e) = self.gateway.mark_started(&cycle.job.id).await {
            tracing::warn!(job_id = %cycle.job.id, error = %e, "failed to mark job started");
        }

        cycle.pre_start_status = self.printer.status();
        match self.printer.start_print(&cycle.job.remote_filename()).await {
            Ok(()) => StepOutcome::Success,
            Err(e) => {
                tracing::error!(job_id = %cycle.job.id, error = %e, "start command failed");
                StepOutcome::Failure(FailureCause::Start(e.to_string()))
            }
        }
    }

    /// Watch the status snapshot until the print reaches a terminal state.
    ///
    /// Per tick: report progress, then check Finished, then Failed or an
    /// error code, then a regression to Idle after progress was seen.
    async fn monitor(&self, cycle: &mut JobCycle) -> StepOutcome {
        let started = Instant::now();
        let mut ticker = interval(self.settings.monitor_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stale = cycle.pre_start_status.take();
        let mut last_report_at: Option<Instant> = None;
        let mut max_progress: u8 = 0;
        let mut print_began = false;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return StepOutcome::Interrupted,
                _ = ticker.tick() => {}
            }

            if self.printer.session_state() != SessionState::Connected {
                tracing::error!(job_id = %cycle.job.id, "printer session lost while monitoring");
                return StepOutcome::Interrupted;
            }

            let status = self.printer.status();
            if stale.is_some() && stale == status {
                if let Some(outcome) = self.check_watchdog(started, print_began) {
                    return outcome;
                }
                continue;
            }
            stale = None;

            let Some(status) = status else {
                if let Some(outcome) = self.check_watchdog(started, print_began) {
                    return outcome;
                }
                continue;
            };

            max_progress = max_progress.max(status.progress_percent);
            print_began |= status.is_printing() || status.is_finished();

            self.maybe_report_progress(cycle, &status, &mut last_report_at).await;

            if let Some(outcome) = terminal_outcome(&status, max_progress) {
                return outcome;
            }
            if let Some(outcome) = self.check_watchdog(started, print_began) {
                return outcome;
            }
        }
    }

    async fn maybe_report_progress(
        &self,
        cycle: &mut JobCycle,
        status: &PrinterStatus,
        last_report_at: &mut Option<Instant>,
    ) {
        let progress = status.progress_percent;
        let increased = cycle.last_reported_progress.is_none_or(|last| progress > last);
        let due = last_report_at
            .is_none_or(|at| at.elapsed() >= self.settings.progress_update_interval);
        if !(increased && due) {
            return;
        }

        match self.gateway.report_progress(&cycle.job.id, progress).await {
            Ok(()) => {
                tracing::info!(
                    job_id = %cycle.job.id,
                    progress,
                    layer = status.current_layer,
                    total_layers = status.total_layers,
                    "progress reported"
                );
                cycle.last_reported_progress = Some(progress);
                *last_report_at = Some(Instant::now());
            }
            Err(e) => {
                tracing::warn!(job_id = %cycle.job.id, progress, error = %e, "failed to report progress");
            }
        }
    }

    fn check_watchdog(&self, started: Instant, print_began: bool) -> Option<StepOutcome> {
        let limit = self.settings.start_watchdog?;
        if !print_began && started.elapsed() >= limit {
            tracing::error!(limit_secs = limit.as_secs(), "print did not start in time");
            return Some(StepOutcome::Failure(FailureCause::DidNotStart));
        }
        None
    }

    async fn report_outcome(&self, cycle: &JobCycle) {
        let result = match cycle.outcome() {
            Some(CycleOutcome::Completed) => {
                tracing::info!(job_id = %cycle.job.id, "job completed");
                self.gateway
                    .mark_terminal(&cycle.job.id, TerminalOutcome::Success, None)
                    .await
            }
            Some(CycleOutcome::Failed(cause)) => {
                let reason = cause.to_string();
                tracing::error!(job_id = %cycle.job.id, %reason, "job failed");
                self.gateway
                    .mark_terminal(&cycle.job.id, TerminalOutcome::Failure, Some(&reason))
                    .await
            }
            Some(CycleOutcome::Interrupted) | None => return,
        };

        if let Err(e) = result {
            tracing::warn!(job_id = %cycle.job.id, error = %e, "failed to report job outcome");
        }
    }

    fn emit(&self, record: &CycleRecord) {
        match serde_json::to_string(record) {
            Ok(json) => tracing::info!(record = %json, "job cycle finished"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize cycle record"),
        }
        if let Some(sink) = &self.records {
            let _ = sink.try_send(record.clone());
        }
    }
}

/// Terminal rules for one fresh status, in priority order.
fn terminal_outcome(status: &PrinterStatus, max_progress: u8) -> Option<StepOutcome> {
    if status.is_finished() {
        return Some(StepOutcome::Success);
    }
    if status.has_error() {
        return Some(StepOutcome::Failure(FailureCause::Printer(
            status.error_code.clone(),
        )));
    }
    if status.state == PrintState::Idle && max_progress > 0 {
        return Some(StepOutcome::Failure(FailureCause::StoppedUnexpectedly));
    }
    None
}
