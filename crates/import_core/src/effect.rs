use crate::ImportJob;

/// Outcome of `JobBook::add`.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted,
    /// Admitted after evicting this terminal job.
    Evicted(ImportJob),
    /// All slots hold active jobs; nothing changed.
    Rejected,
    /// A job with the same id is already registered; nothing changed.
    Duplicate,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted | Admission::Evicted(_))
    }

    pub fn evicted(&self) -> Option<&ImportJob> {
        match self {
            Admission::Evicted(job) => Some(job),
            _ => None,
        }
    }
}
