use import_core::{ErrorCode, ImportType, JobError, JobId, JobPatch, JobStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of a submit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub import_type: ImportType,
    pub source_url: String,
    /// Raw page content captured client-side, when the server cannot fetch it itself.
    #[serde(rename = "content", skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

impl SubmitRequest {
    pub fn new(import_type: ImportType, source_url: impl Into<String>) -> Self {
        Self {
            import_type,
            source_url: source_url.into(),
            raw_content: None,
        }
    }

    pub fn with_raw_content(mut self, content: Option<String>) -> Self {
        self.raw_content = content;
        self
    }
}

/// Job descriptor returned by a successful submit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: JobId,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusProgress {
    pub percentage: f64,
    #[serde(default)]
    pub current_step: Option<String>,
}

/// Current server-side state of one job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<StatusProgress>,
    #[serde(default)]
    pub estimated_time_remaining: Option<u64>,
    #[serde(default)]
    pub error: Option<JobError>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl StatusReport {
    /// The registry patch carrying everything the server reported.
    pub fn into_patch(self) -> JobPatch {
        let mut patch = JobPatch::new()
            .status(self.status)
            .estimated_time_remaining(self.estimated_time_remaining)
            .error(self.error)
            .result(self.result);
        match self.progress {
            Some(progress) => {
                patch = patch
                    .progress(progress.percentage)
                    .current_step(progress.current_step);
            }
            None if self.status == JobStatus::Completed => {
                patch = patch.progress(100.0).current_step(None);
            }
            None => {}
        }
        patch
    }
}

/// A failed Status Channel exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ChannelError {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    pub http_status: Option<u16>,
}

impl ChannelError {
    /// Transport-level failure; always retryable.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::NetworkError,
            message: message.into(),
            retryable: true,
            http_status: None,
        }
    }

    /// The server answered with a non-success status.
    ///
    /// Extraction blockers keep the server's code and are never retryable;
    /// anything else gets the operation's code and is retryable on 5xx.
    pub fn rejected(
        operation_code: ErrorCode,
        http_status: u16,
        server_code: Option<ErrorCode>,
        message: impl Into<String>,
    ) -> Self {
        let (code, retryable) = match server_code {
            Some(code) if code.is_extraction_blocker() => (code, false),
            _ => (operation_code, http_status >= 500),
        };
        Self {
            code,
            message: message.into(),
            retryable,
            http_status: Some(http_status),
        }
    }

    pub fn to_job_error(&self) -> JobError {
        JobError::new(self.code, self.message.clone(), self.retryable)
    }
}
