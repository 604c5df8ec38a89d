use std::sync::{Mutex, MutexGuard, PoisonError};

use import_core::{Admission, ImportJob, JobBook, JobError, JobPatch};
use import_logging::{import_info, import_warn};
use tokio::sync::watch;

use crate::persist::{BackgroundWriter, JobStore, MemoryStore};

/// The single source of truth for locally known import jobs.
///
/// Each operation runs under one lock, queues the resulting collection for
/// the persistence thread and publishes it to subscribers before returning.
/// Persistence failures are logged; the in-memory collection stays
/// authoritative.
pub struct JobRegistry {
    book: Mutex<JobBook>,
    writer: BackgroundWriter,
    changes: watch::Sender<Vec<ImportJob>>,
}

impl JobRegistry {
    /// Opens the registry, reloading whatever `store` holds.
    pub fn open(store: impl JobStore + 'static) -> Self {
        let persisted = match store.load() {
            Ok(jobs) => jobs,
            Err(err) => {
                import_warn!("Failed to load persisted import jobs: {}", err);
                Vec::new()
            }
        };
        let loaded = persisted.len();
        let book = JobBook::restore(persisted);
        if book.len() != loaded {
            import_warn!(
                "Dropped {} invalid persisted import jobs",
                loaded - book.len()
            );
        }
        import_info!(
            "Import registry opened with {} jobs ({} active)",
            book.len(),
            book.active_count()
        );

        let (changes, _) = watch::channel(book.jobs().to_vec());
        Self {
            book: Mutex::new(book),
            writer: BackgroundWriter::spawn(Box::new(store)),
            changes,
        }
    }

    /// A registry that does not outlive the process.
    pub fn in_memory() -> Self {
        Self::open(MemoryStore::new())
    }

    pub fn add(&self, job: ImportJob) -> Admission {
        let job_id = job.job_id.clone();
        let mut book = self.lock();
        let admission = book.add(job);
        match &admission {
            Admission::Admitted => {}
            Admission::Evicted(evicted) => {
                import_info!(
                    "Evicted terminal job {} ({}) to admit {}",
                    evicted.job_id,
                    evicted.status,
                    job_id
                );
            }
            Admission::Rejected => {
                import_warn!("Rejected job {}: all slots hold active jobs", job_id);
            }
            Admission::Duplicate => {
                import_warn!("Rejected job {}: already registered", job_id);
            }
        }
        if admission.is_admitted() {
            self.commit(&book);
        }
        admission
    }

    /// Merges `patch` into the job. Returns false, changing nothing, if the id
    /// is absent or the job no longer accepts updates (see `JobBook::update`).
    pub fn update(&self, job_id: &str, patch: JobPatch) -> bool {
        let mut book = self.lock();
        let before = book.get(job_id).cloned();
        if !book.update(job_id, patch) {
            return false;
        }
        if book.get(job_id) != before.as_ref() {
            self.commit(&book);
        }
        true
    }

    /// Starts a retry of a failed job: resets the row and holds it out of polling.
    pub fn begin_retry(&self, job_id: &str) -> bool {
        let mut book = self.lock();
        let started = book.begin_retry(job_id);
        if started {
            self.commit(&book);
        }
        started
    }

    /// Settles a pending retry as failed.
    pub fn fail_retry(&self, job_id: &str, error: JobError) -> bool {
        let mut book = self.lock();
        let settled = book.fail_retry(job_id, error);
        if settled {
            self.commit(&book);
        }
        settled
    }

    /// Deletes the job if present; idempotent.
    pub fn remove(&self, job_id: &str) -> Option<ImportJob> {
        let mut book = self.lock();
        let removed = book.remove(job_id);
        if removed.is_some() {
            self.commit(&book);
        }
        removed
    }

    /// Swaps `old_id` for `job` in place, without an admission check.
    pub fn replace(&self, old_id: &str, job: ImportJob) -> bool {
        let mut book = self.lock();
        let replaced = book.replace(old_id, job);
        if replaced {
            self.commit(&book);
        }
        replaced
    }

    pub fn clear_terminal(&self) -> usize {
        let mut book = self.lock();
        let removed = book.clear_terminal();
        if removed > 0 {
            self.commit(&book);
        }
        removed
    }

    pub fn get(&self, job_id: &str) -> Option<ImportJob> {
        self.lock().get(job_id).cloned()
    }

    pub fn list(&self) -> Vec<ImportJob> {
        self.lock().jobs().to_vec()
    }

    pub fn list_active(&self) -> Vec<ImportJob> {
        self.lock().list_active()
    }

    pub fn active_count(&self) -> usize {
        self.lock().active_count()
    }

    pub fn list_pollable(&self) -> Vec<ImportJob> {
        self.lock().list_pollable()
    }

    pub fn pollable_count(&self) -> usize {
        self.lock().pollable_count()
    }

    pub fn has_capacity(&self) -> bool {
        self.lock().has_capacity()
    }

    /// Blocks until every committed snapshot has reached the store.
    pub fn flush(&self) {
        self.writer.flush();
    }

    /// Yields the full collection after every mutation.
    ///
    /// A slow subscriber may miss intermediate snapshots but always sees the latest.
    pub fn subscribe(&self) -> watch::Receiver<Vec<ImportJob>> {
        self.changes.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, JobBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, book: &JobBook) {
        let snapshot = book.jobs().to_vec();
        self.writer.save(snapshot.clone());
        self.changes.send_replace(snapshot);
    }
}
