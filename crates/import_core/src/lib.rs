//! Import core: job model, admission state and view-model helpers.
mod effect;
mod job;
mod patch;
mod state;
mod view_model;

pub use effect::Admission;
pub use job::{ErrorCode, ImportJob, ImportType, JobError, JobId, JobStatus, MAX_JOBS};
pub use patch::JobPatch;
pub use state::JobBook;
pub use view_model::{rows, JobRowView};
