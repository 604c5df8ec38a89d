use crate::{Admission, ImportJob, JobError, JobPatch, JobStatus, MAX_JOBS};

/// The in-memory job collection and its admission rules.
///
/// Jobs are kept in registration order. Every mutator reports whether it
/// changed anything so the owning registry knows when to persist and notify.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobBook {
    jobs: Vec<ImportJob>,
}

impl JobBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from a persisted snapshot, re-admitting each entry in
    /// order so duplicates and overflow are dropped.
    pub fn restore(jobs: Vec<ImportJob>) -> Self {
        let mut book = Self::new();
        for job in jobs {
            book.add(job);
        }
        book
    }

    /// Admits a job subject to the capacity bound.
    ///
    /// Below `MAX_JOBS` the job is appended. At capacity the first terminal job
    /// in registration order is evicted to make room; if every slot is active
    /// the book is left unchanged and `Admission::Rejected` is returned.
    pub fn add(&mut self, mut job: ImportJob) -> Admission {
        if self.contains(&job.job_id) {
            return Admission::Duplicate;
        }
        job.normalize();
        if self.jobs.len() < MAX_JOBS {
            self.jobs.push(job);
            return Admission::Admitted;
        }
        match self.jobs.iter().position(ImportJob::is_terminal) {
            Some(index) => {
                let evicted = self.jobs.remove(index);
                self.jobs.push(job);
                Admission::Evicted(evicted)
            }
            None => Admission::Rejected,
        }
    }

    /// Whether `add` of a new job would succeed right now.
    pub fn has_capacity(&self) -> bool {
        self.jobs.len() < MAX_JOBS || self.jobs.iter().any(ImportJob::is_terminal)
    }

    /// Merges `patch` into the job with `job_id`.
    ///
    /// Returns false if the job is absent or no longer accepts updates:
    /// completed jobs are final, a failed job leaves that state only through
    /// `begin_retry`, and a job with a retry in flight waits for
    /// `fail_retry` or `replace` to settle it.
    pub fn update(&mut self, job_id: &str, patch: JobPatch) -> bool {
        match self.find_mut(job_id) {
            Some(job) if job.is_active() && !job.retry_pending => {
                patch.apply_to(job);
                true
            }
            _ => false,
        }
    }

    /// Resets a failed job to a blank pending row and marks its resubmission
    /// as in flight. Returns false unless the job exists and has failed.
    pub fn begin_retry(&mut self, job_id: &str) -> bool {
        match self.find_mut(job_id) {
            Some(job) if job.status == JobStatus::Failed => {
                JobPatch::optimistic_retry().apply_to(job);
                job.retry_pending = true;
                true
            }
            _ => false,
        }
    }

    /// Marks an in-flight retry as failed with `error`. Returns false if the
    /// job is absent or has no retry pending.
    pub fn fail_retry(&mut self, job_id: &str, error: JobError) -> bool {
        match self.find_mut(job_id) {
            Some(job) if job.retry_pending => {
                JobPatch::new()
                    .status(JobStatus::Failed)
                    .error(Some(error))
                    .apply_to(job);
                true
            }
            _ => false,
        }
    }

    /// Removes the job if present.
    pub fn remove(&mut self, job_id: &str) -> Option<ImportJob> {
        let index = self.jobs.iter().position(|job| job.job_id == job_id)?;
        Some(self.jobs.remove(index))
    }

    /// Swaps the entry `old_id` for `job` at the same position, bypassing
    /// admission: the slot is already reserved. Returns false if `old_id` is
    /// absent or `job`'s id collides with a different entry.
    pub fn replace(&mut self, old_id: &str, mut job: ImportJob) -> bool {
        if job.job_id != old_id && self.contains(&job.job_id) {
            return false;
        }
        let Some(slot) = self.find_mut(old_id) else {
            return false;
        };
        job.normalize();
        *slot = job;
        true
    }

    pub fn get(&self, job_id: &str) -> Option<&ImportJob> {
        self.jobs.iter().find(|job| job.job_id == job_id)
    }

    fn find_mut(&mut self, job_id: &str) -> Option<&mut ImportJob> {
        self.jobs.iter_mut().find(|job| job.job_id == job_id)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.get(job_id).is_some()
    }

    pub fn jobs(&self) -> &[ImportJob] {
        &self.jobs
    }

    pub fn list_active(&self) -> Vec<ImportJob> {
        self.jobs.iter().filter(|job| job.is_active()).cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.jobs.iter().filter(|job| job.is_active()).count()
    }

    /// Active jobs the poller should query; excludes rows awaiting a retry.
    pub fn list_pollable(&self) -> Vec<ImportJob> {
        self.jobs
            .iter()
            .filter(|job| job.needs_polling())
            .cloned()
            .collect()
    }

    pub fn pollable_count(&self) -> usize {
        self.jobs.iter().filter(|job| job.needs_polling()).count()
    }

    /// Drops every completed or failed job, returning how many were removed.
    pub fn clear_terminal(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(ImportJob::is_active);
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
