pub mod client;
pub mod error;
pub mod types;

use std::path::Path;

pub use client::GatewayClient;
pub use error::GatewayError;
pub use types::{Job, TerminalOutcome};

/// The four operations the control loop needs from the remote job queue,
/// plus the opaque file download that precedes an upload.
#[allow(async_fn_in_trait)]
pub trait JobGateway {
    /// Next approved job, or `None` when the queue is empty.
    async fn fetch_next_job(&self) -> Result<Option<Job>, GatewayError>;

    /// Stream the job's file to `destination`, returning the bytes written.
    async fn download_job_file(&self, job: &Job, destination: &Path) -> Result<u64, GatewayError>;

    async fn mark_started(&self, job_id: &str) -> Result<(), GatewayError>;

    /// Fails upstream unless the job is in the printing state.
    async fn report_progress(&self, job_id: &str, percent: u8) -> Result<(), GatewayError>;

    async fn mark_terminal(
        &self,
        job_id: &str,
        outcome: TerminalOutcome,
        reason: Option<&str>,
    ) -> Result<(), GatewayError>;
}
