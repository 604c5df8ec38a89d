use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread;

use import_core::ImportJob;
use import_logging::import_error;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fixed key the job collection is stored under.
pub const STORAGE_KEY: &str = "recipe_import_jobs";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize jobs: {0}")]
    Serialize(String),
    #[error("failed to parse persisted jobs: {0}")]
    Parse(String),
}

/// Durable storage for the whole job collection as one JSON array.
pub trait JobStore: Send + Sync {
    /// Loads the stored collection; an absent document is an empty collection.
    fn load(&self) -> Result<Vec<ImportJob>, PersistError>;

    fn save(&self, jobs: &[ImportJob]) -> Result<(), PersistError>;
}

/// Ensure the state directory exists; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StateDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_state_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Stores the collection as `{dir}/{STORAGE_KEY}.json`.
pub struct JsonFileStore {
    writer: AtomicFileWriter,
    filename: String,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir.into()),
            filename: format!("{STORAGE_KEY}.json"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(&self.filename)
    }
}

impl JobStore for JsonFileStore {
    fn load(&self) -> Result<Vec<ImportJob>, PersistError> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&content).map_err(|e| PersistError::Parse(e.to_string()))
    }

    fn save(&self, jobs: &[ImportJob]) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(jobs)
            .map_err(|e| PersistError::Serialize(e.to_string()))?;
        self.writer.write(&self.filename, &content)?;
        Ok(())
    }
}

/// Keeps the serialized document in memory; for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a raw document, as if written by an earlier process.
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
        }
    }

    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl JobStore for MemoryStore {
    fn load(&self) -> Result<Vec<ImportJob>, PersistError> {
        match self.document() {
            Some(text) => {
                serde_json::from_str(&text).map_err(|e| PersistError::Parse(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, jobs: &[ImportJob]) -> Result<(), PersistError> {
        let content =
            serde_json::to_string(jobs).map_err(|e| PersistError::Serialize(e.to_string()))?;
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(content);
        Ok(())
    }
}

enum WriteRequest {
    Save(Vec<ImportJob>),
    Flush(mpsc::Sender<()>),
}

/// Runs `JobStore::save` on a dedicated thread so mutations never wait on disk.
///
/// Snapshots are written in the order they were queued; a backlog collapses to
/// its newest snapshot. Dropping the writer drains the queue and joins the thread.
pub(crate) struct BackgroundWriter {
    requests: Option<mpsc::Sender<WriteRequest>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl BackgroundWriter {
    pub(crate) fn spawn(store: Box<dyn JobStore>) -> Self {
        let (requests, queue) = mpsc::channel();
        let worker = thread::spawn(move || drain(store.as_ref(), queue));
        Self {
            requests: Some(requests),
            worker: Some(worker),
        }
    }

    pub(crate) fn save(&self, jobs: Vec<ImportJob>) {
        if !self.send(WriteRequest::Save(jobs)) {
            import_error!("Persistence writer has stopped; snapshot not saved");
        }
    }

    /// Blocks until every snapshot queued so far has been written.
    pub(crate) fn flush(&self) {
        let (ack, done) = mpsc::channel();
        if self.send(WriteRequest::Flush(ack)) {
            let _ = done.recv();
        }
    }

    fn send(&self, request: WriteRequest) -> bool {
        self.requests
            .as_ref()
            .is_some_and(|requests| requests.send(request).is_ok())
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                import_error!("Persistence writer panicked");
            }
        }
    }
}

fn drain(store: &dyn JobStore, queue: mpsc::Receiver<WriteRequest>) {
    while let Ok(first) = queue.recv() {
        let mut latest = None;
        let mut waiters = Vec::new();
        for request in std::iter::once(first).chain(queue.try_iter()) {
            match request {
                WriteRequest::Save(jobs) => latest = Some(jobs),
                WriteRequest::Flush(ack) => waiters.push(ack),
            }
        }
        if let Some(jobs) = latest {
            if let Err(err) = store.save(&jobs) {
                import_error!("Failed to persist import jobs: {}", err);
            }
        }
        for ack in waiters {
            let _ = ack.send(());
        }
    }
}
