use std::path::Path;
use std::time::Duration;

use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;

use super::error::GatewayError;
use super::types::{DownloadResponse, FailRequest, Job, ProgressUpdate, TerminalOutcome};
use super::JobGateway;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client for the `/printer/jobs/*` routes of the job-queue API.
pub struct GatewayClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/printer/jobs{path}", self.base_url)
    }

    async fn get(&self, path: &str) -> Result<Response, GatewayError> {
        let response = self
            .client
            .get(self.url(path))
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;
        check_status(response).await
    }

    async fn post<B: serde::Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, GatewayError> {
        let mut request = self
            .client
            .post(self.url(path))
            .header("X-API-Key", &self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }
        check_status(request.send().await?).await
    }

    async fn download_url(&self, job_id: &str) -> Result<String, GatewayError> {
        let body = self
            .get(&format!("/{job_id}/download"))
            .await?
            .json::<DownloadResponse>()
            .await?;
        Ok(body.download_url)
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(GatewayError::Api {
        status: status.as_u16(),
        message,
    })
}

impl JobGateway for GatewayClient {
    async fn fetch_next_job(&self) -> Result<Option<Job>, GatewayError> {
        let job = self.get("/next").await?.json::<Option<Job>>().await?;
        Ok(job)
    }

    async fn download_job_file(&self, job: &Job, destination: &Path) -> Result<u64, GatewayError> {
        let url = self.download_url(&job.id).await?;

        // Pre-signed storage URL: no API key, longer timeout.
        let response = self.client.get(&url).timeout(DOWNLOAD_TIMEOUT).send().await?;
        let mut response = check_status(response).await?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(job_id = %job.id, bytes = written, "download stream finished");
        Ok(written)
    }

    async fn mark_started(&self, job_id: &str) -> Result<(), GatewayError> {
        self.post::<()>(&format!("/{job_id}/start"), None).await?;
        Ok(())
    }

    async fn report_progress(&self, job_id: &str, percent: u8) -> Result<(), GatewayError> {
        if percent > 100 {
            return Err(GatewayError::Validation(format!(
                "progress {percent} outside 0-100"
            )));
        }
        let body = ProgressUpdate { progress: percent };
        self.post(&format!("/{job_id}/progress"), Some(&body)).await?;
        Ok(())
    }

    async fn mark_terminal(
        &self,
        job_id: &str,
        outcome: TerminalOutcome,
        reason: Option<&str>,
    ) -> Result<(), GatewayError> {
        match outcome {
            TerminalOutcome::Success => {
                self.post::<()>(&format!("/{job_id}/complete"), None).await?;
            }
            TerminalOutcome::Failure => {
                let body = FailRequest {
                    error_message: reason.unwrap_or("unknown").to_string(),
                };
                self.post(&format!("/{job_id}/fail"), Some(&body)).await?;
            }
        }
        Ok(())
    }
}
