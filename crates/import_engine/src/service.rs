use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use import_core::{Admission, ErrorCode, ImportJob, JobError, JobId, JobStatus};
use import_logging::{import_info, import_warn};
use thiserror::Error;

use crate::{ChannelError, JobRegistry, StatusChannel, SubmitReceipt, SubmitRequest};

/// Produces the ISO-8601 timestamp stamped on jobs the server did not date.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

pub fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("job {0} is not registered")]
    NotFound(JobId),
    #[error("job {job_id} is {status}; only failed jobs can be retried")]
    NotRetryable { job_id: JobId, status: JobStatus },
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub job: ImportJob,
    /// `Rejected` means the server accepted the job but every local slot is busy.
    pub admission: Admission,
}

/// Submission, retry and removal composed over the registry and the channel.
///
/// Cheap to clone; every clone shares the same registry.
#[derive(Clone)]
pub struct ImportService {
    registry: Arc<JobRegistry>,
    channel: Arc<dyn StatusChannel>,
    clock: Clock,
}

impl ImportService {
    pub fn new(registry: Arc<JobRegistry>, channel: Arc<dyn StatusChannel>) -> Self {
        Self {
            registry,
            channel,
            clock: Arc::new(utc_now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Whether a new submission could be admitted right now.
    pub fn has_capacity(&self) -> bool {
        self.registry.has_capacity()
    }

    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome, ChannelError> {
        let receipt = self.channel.submit(&request).await?;
        let job = self.job_from_receipt(&request, receipt);
        let admission = self.registry.add(job.clone());
        import_info!(
            "Submitted {} import {} for {} (admitted={})",
            job.import_type,
            job.job_id,
            job.source_url,
            admission.is_admitted()
        );
        Ok(SubmitOutcome { job, admission })
    }

    /// Resubmits a failed job under a new server id.
    ///
    /// The row is reset to pending before the request goes out and is not
    /// polled while the request is in flight. On success the replacement takes
    /// over the original's slot; on failure the original is marked failed
    /// again with `RETRY_FAILED`.
    pub async fn retry(&self, job_id: &str) -> Result<ImportJob, ServiceError> {
        let original = self
            .registry
            .get(job_id)
            .ok_or_else(|| ServiceError::NotFound(job_id.to_string()))?;
        if !self.registry.begin_retry(job_id) {
            return Err(match self.registry.get(job_id) {
                Some(job) => ServiceError::NotRetryable {
                    job_id: job_id.to_string(),
                    status: job.status,
                },
                None => ServiceError::NotFound(job_id.to_string()),
            });
        }

        let request = SubmitRequest::new(original.import_type, original.source_url.clone());
        let receipt = match self.channel.submit(&request).await {
            Ok(receipt) => receipt,
            Err(err) => {
                import_warn!("Retry of job {} failed: {}", job_id, err);
                self.registry.fail_retry(
                    job_id,
                    JobError::new(ErrorCode::RetryFailed, err.message.clone(), err.retryable),
                );
                return Err(err.into());
            }
        };

        let replacement = self.job_from_receipt(&request, receipt);
        if self.registry.replace(job_id, replacement.clone()) {
            import_info!("Retried job {} as {}", job_id, replacement.job_id);
            return Ok(replacement);
        }

        // Discarded while the resubmission was in flight: the discard wins.
        import_warn!(
            "Job {} vanished during retry; cancelling replacement {}",
            job_id,
            replacement.job_id
        );
        if let Err(err) = self.channel.cancel(&replacement.job_id).await {
            import_warn!(
                "Failed to cancel orphaned job {}: {}",
                replacement.job_id,
                err
            );
        }
        Err(ServiceError::NotFound(job_id.to_string()))
    }

    /// Removes the job unconditionally; a no-op if it is absent.
    pub fn discard(&self, job_id: &str) -> Option<ImportJob> {
        self.registry.remove(job_id)
    }

    /// Asks the server to stop an active job, then forgets it locally.
    ///
    /// Terminal jobs are removed without a server call. If the cancel request
    /// fails the job stays registered.
    pub async fn cancel(&self, job_id: &str) -> Result<ImportJob, ServiceError> {
        let job = self
            .registry
            .get(job_id)
            .ok_or_else(|| ServiceError::NotFound(job_id.to_string()))?;
        if job.is_active() {
            self.channel.cancel(job_id).await?;
        }
        Ok(self.registry.remove(job_id).unwrap_or(job))
    }

    pub fn clear_terminal(&self) -> usize {
        self.registry.clear_terminal()
    }

    fn job_from_receipt(&self, request: &SubmitRequest, receipt: SubmitReceipt) -> ImportJob {
        let created_at = receipt.created_at.unwrap_or_else(|| (self.clock)());
        ImportJob::pending(
            receipt.job_id,
            request.import_type,
            request.source_url.clone(),
            created_at,
        )
        .with_platform(receipt.platform)
        .with_status(receipt.status)
    }
}
