use chrono::{DateTime, Utc};
use import_core::{ImportJob, JobRowView, JobStatus};

/// Renders the job list as a plain-text table, newest first.
pub fn render(jobs: &[ImportJob], now: DateTime<Utc>) -> String {
    let rows = import_core::rows(jobs);
    if rows.is_empty() {
        return "No imports tracked.".to_string();
    }
    rows.iter()
        .map(|row| render_row(row, now))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_row(row: &JobRowView, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "{:<24} {:<7} {:<10} {}",
        row.job_id,
        row.import_type,
        status_label(row),
        row.source_url
    );
    if let Some(age) = format_age(&row.created_at, now) {
        line.push_str(&format!("  ({age})"));
    }
    if let Some(step) = &row.current_step {
        line.push_str(&format!("\n    {step}"));
    }
    if let Some(millis) = row.estimated_time_remaining {
        line.push_str(&format!("\n    ~{}s remaining", millis.div_ceil(1000)));
    }
    if let Some(message) = &row.error_message {
        line.push_str(&format!("\n    error: {message}"));
        if row.can_retry {
            line.push_str(" [retry available]");
        } else if row.needs_browser_fallback {
            line.push_str(" [open the page in a browser instead]");
        }
    }
    line
}

fn status_label(row: &JobRowView) -> String {
    match (row.status, row.progress) {
        (JobStatus::Pending | JobStatus::Processing, Some(progress)) => {
            format!("{progress:>5.1}%")
        }
        (status, _) => status.to_string(),
    }
}

fn format_age(created_at: &str, now: DateTime<Utc>) -> Option<String> {
    let created = DateTime::parse_from_rfc3339(created_at).ok()?;
    let seconds = (now - created.with_timezone(&Utc)).num_seconds().max(0);
    Some(match seconds {
        0..=59 => format!("{seconds}s ago"),
        60..=3599 => format!("{}m ago", seconds / 60),
        _ => format!("{}h ago", seconds / 3600),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use import_core::{ErrorCode, ImportType, JobBook, JobError, JobPatch};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-01T10:05:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn empty_list_has_a_placeholder() {
        assert_eq!(render(&[], now()), "No imports tracked.");
    }

    #[test]
    fn rows_show_progress_age_and_retry_hint() {
        let mut book = JobBook::new();
        book.add(ImportJob::pending(
            "a",
            ImportType::Video,
            "https://v.test/1",
            "2026-05-01T10:00:00Z",
        ));
        book.add(ImportJob::pending(
            "b",
            ImportType::Website,
            "https://w.test/2",
            "2026-05-01T10:04:30Z",
        ));
        book.update(
            "a",
            JobPatch::new()
                .status(JobStatus::Processing)
                .progress(42.0)
                .current_step(Some("Transcribing".into())),
        );
        book.update(
            "b",
            JobPatch::new()
                .status(JobStatus::Failed)
                .error(Some(JobError::new(ErrorCode::SubmitFailed, "server busy", true))),
        );

        let text = render(book.jobs(), now());
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("b "));
        assert!(lines[0].contains("failed"));
        assert!(lines[0].ends_with("(30s ago)"));
        assert_eq!(lines[1], "    error: server busy [retry available]");
        assert!(lines[2].contains(" 42.0%"));
        assert!(lines[2].ends_with("(5m ago)"));
        assert_eq!(lines[3], "    Transcribing");
    }
}
