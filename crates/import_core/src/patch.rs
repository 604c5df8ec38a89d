use crate::{ImportJob, JobError, JobStatus};

/// A partial set of field changes merged into one job by `JobBook::update`.
///
/// Outer `None` leaves a field untouched; for the clearable fields an inner
/// `None` resets it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<f64>,
    pub current_step: Option<Option<String>>,
    pub estimated_time_remaining: Option<Option<u64>>,
    pub error: Option<Option<JobError>>,
    pub result: Option<Option<serde_json::Value>>,
    pub platform: Option<Option<String>>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn current_step(mut self, step: Option<String>) -> Self {
        self.current_step = Some(step);
        self
    }

    pub fn estimated_time_remaining(mut self, millis: Option<u64>) -> Self {
        self.estimated_time_remaining = Some(millis);
        self
    }

    pub fn error(mut self, error: Option<JobError>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn result(mut self, result: Option<serde_json::Value>) -> Self {
        self.result = Some(result);
        self
    }

    pub fn platform(mut self, platform: Option<String>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// The optimistic first phase of a retry: back to a blank pending row.
    pub(crate) fn optimistic_retry() -> Self {
        Self::new()
            .status(JobStatus::Pending)
            .progress(0.0)
            .current_step(None)
            .estimated_time_remaining(None)
            .error(None)
            .result(None)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the patch into `job`, then restores the status-bound invariants.
    ///
    /// Progress never moves backwards while the job stays active; a transition
    /// into an active state from a terminal one (retry) resets the baseline.
    /// Callers decide whether the job's current state accepts the patch.
    pub(crate) fn apply_to(self, job: &mut ImportJob) {
        let was_active = job.status.is_active();
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(progress) = self.progress {
            let progress = crate::job::clamp_progress(progress);
            job.progress = if was_active && job.status.is_active() {
                job.progress.max(progress)
            } else {
                progress
            };
        }
        if let Some(step) = self.current_step {
            job.current_step = step;
        }
        if let Some(eta) = self.estimated_time_remaining {
            job.estimated_time_remaining = eta;
        }
        if let Some(error) = self.error {
            job.error = error;
        }
        if let Some(result) = self.result {
            job.result = result;
        }
        if let Some(platform) = self.platform {
            job.platform = platform;
        }
        job.normalize();
    }
}
