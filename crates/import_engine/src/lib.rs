//! Import engine: status channel, persisted registry and the polling coordinator.
mod channel;
mod persist;
mod poller;
mod registry;
mod service;
mod types;

pub use channel::{ChannelSettings, ChannelSetupError, HttpStatusChannel, StatusChannel};
pub use persist::{
    ensure_state_dir, AtomicFileWriter, JobStore, JsonFileStore, MemoryStore, PersistError,
    STORAGE_KEY,
};
pub use poller::{
    poll_pass, AppLifecycle, PassSummary, PollSettings, PollingCoordinator, POLL_INTERVAL,
};
pub use registry::JobRegistry;
pub use service::{utc_now, Clock, ImportService, ServiceError, SubmitOutcome};
pub use types::{ChannelError, StatusProgress, StatusReport, SubmitReceipt, SubmitRequest};
