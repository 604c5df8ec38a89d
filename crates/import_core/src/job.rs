use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on the number of jobs tracked at once.
pub const MAX_JOBS: usize = 3;

/// Server-assigned job identifier.
pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportType {
    Video,
    Website,
    Photo,
}

impl ImportType {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportType::Video => "video",
            ImportType::Website => "website",
            ImportType::Photo => "photo",
        }
    }
}

impl fmt::Display for ImportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ImportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(ImportType::Video),
            "website" => Ok(ImportType::Website),
            "photo" => Ok(ImportType::Photo),
            other => Err(format!("unknown import type '{other}'")),
        }
    }
}

/// Lifecycle state of a job.
///
/// `Pending` and `Processing` are active; `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.pad(label)
    }
}

/// Machine-readable failure classification shared by the server and the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Transport failure; always retryable.
    NetworkError,
    SubmitFailed,
    StatusFailed,
    CancelFailed,
    /// Assigned locally when a retry's resubmission fails.
    RetryFailed,
    /// Extraction was blocked; the caller should fall back to interactive browsing.
    BotDetected,
    AccessDenied,
    /// Server reported the job as failed without a usable error payload.
    ImportFailed,
    #[serde(other)]
    Unknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::SubmitFailed => "SUBMIT_FAILED",
            ErrorCode::StatusFailed => "STATUS_FAILED",
            ErrorCode::CancelFailed => "CANCEL_FAILED",
            ErrorCode::RetryFailed => "RETRY_FAILED",
            ErrorCode::BotDetected => "BOT_DETECTED",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::ImportFailed => "IMPORT_FAILED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Extraction blockers are never retried through the same path.
    pub fn is_extraction_blocker(self) -> bool {
        matches!(self, ErrorCode::BotDetected | ErrorCode::AccessDenied)
    }

    /// Parses a server-supplied code, mapping anything unrecognised to `Unknown`.
    pub fn parse(code: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(code.to_string()))
            .unwrap_or(ErrorCode::Unknown)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
}

impl JobError {
    pub fn new(code: ErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }
}

/// One tracked import, persisted as-is (camelCase JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub job_id: JobId,
    pub import_type: ImportType,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    /// Milliseconds, advisory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Opaque server payload, forwarded untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: String,
    /// Set while a retry's resubmission is in flight. Such a row is not
    /// polled and accepts no status updates until the retry settles.
    #[serde(skip)]
    pub retry_pending: bool,
}

impl ImportJob {
    /// A freshly admitted job: pending, no progress.
    pub fn pending(
        job_id: impl Into<JobId>,
        import_type: ImportType,
        source_url: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            import_type,
            source_url: source_url.into(),
            platform: None,
            status: JobStatus::Pending,
            progress: 0.0,
            current_step: None,
            estimated_time_remaining: None,
            error: None,
            result: None,
            created_at: created_at.into(),
            retry_pending: false,
        }
    }

    pub fn with_platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self.normalize();
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Active and not waiting on a retry's resubmission.
    pub fn needs_polling(&self) -> bool {
        self.is_active() && !self.retry_pending
    }

    /// Whether the UI should offer a retry action.
    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed && self.error.as_ref().is_some_and(|e| e.retryable)
    }

    /// Restores the field invariants tied to `status`: `error` iff failed,
    /// `result` iff completed, progress within [0, 100].
    pub(crate) fn normalize(&mut self) {
        self.progress = clamp_progress(self.progress);
        if self.status != JobStatus::Pending {
            self.retry_pending = false;
        }
        match self.status {
            JobStatus::Failed => {
                if self.error.is_none() {
                    self.error = Some(JobError::new(
                        ErrorCode::ImportFailed,
                        "Import failed",
                        false,
                    ));
                }
                self.result = None;
            }
            JobStatus::Completed => {
                self.error = None;
            }
            JobStatus::Pending | JobStatus::Processing => {
                self.error = None;
                self.result = None;
            }
        }
    }
}

pub(crate) fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
