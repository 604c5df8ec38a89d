use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::{ErrorCode, ImportJob, ImportType, JobId, JobStatus};

/// One display row for a tracked import.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub import_type: ImportType,
    pub source_url: String,
    pub platform: Option<String>,
    pub status: JobStatus,
    /// Only set while the job is active.
    pub progress: Option<f64>,
    pub current_step: Option<String>,
    pub estimated_time_remaining: Option<u64>,
    pub error_message: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub can_retry: bool,
    pub can_dismiss: bool,
    /// The server refused extraction; the user should open the page interactively instead.
    pub needs_browser_fallback: bool,
    pub created_at: String,
}

impl From<&ImportJob> for JobRowView {
    fn from(job: &ImportJob) -> Self {
        let active = job.is_active();
        Self {
            job_id: job.job_id.clone(),
            import_type: job.import_type,
            source_url: job.source_url.clone(),
            platform: job.platform.clone(),
            status: job.status,
            progress: active.then_some(job.progress),
            current_step: if active { job.current_step.clone() } else { None },
            estimated_time_remaining: if active {
                job.estimated_time_remaining
            } else {
                None
            },
            error_message: job.error.as_ref().map(|e| e.message.clone()),
            error_code: job.error.as_ref().map(|e| e.code),
            can_retry: job.can_retry(),
            can_dismiss: job.is_terminal(),
            needs_browser_fallback: job
                .error
                .as_ref()
                .is_some_and(|e| e.code.is_extraction_blocker()),
            created_at: job.created_at.clone(),
        }
    }
}

/// Rows ordered newest first by `createdAt`; ties keep registration order.
///
/// Timestamps are compared as instants, so differing UTC offsets order
/// correctly. Rows whose timestamp does not parse sort after the rest.
pub fn rows(jobs: &[ImportJob]) -> Vec<JobRowView> {
    let mut ordered: Vec<(Option<DateTime<Utc>>, &ImportJob)> = jobs
        .iter()
        .map(|job| (parse_created_at(&job.created_at), job))
        .collect();
    ordered.sort_by(|(a_at, a), (b_at, b)| newest_first(a_at, b_at, a, b));
    ordered
        .into_iter()
        .map(|(_, job)| JobRowView::from(job))
        .collect()
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn newest_first(
    a_at: &Option<DateTime<Utc>>,
    b_at: &Option<DateTime<Utc>>,
    a: &ImportJob,
    b: &ImportJob,
) -> Ordering {
    match (a_at, b_at) {
        (Some(a_at), Some(b_at)) => b_at.cmp(a_at),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.created_at.cmp(&a.created_at),
    }
}
