use std::sync::Once;

use import_core::{
    rows, ErrorCode, ImportJob, ImportType, JobBook, JobError, JobPatch, JobStatus,
};
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(import_logging::initialize_for_tests);
}

fn pending(id: &str) -> ImportJob {
    ImportJob::pending(id, ImportType::Website, "https://example.com/r", "2026-01-01T00:00:00Z")
}

fn book_with(ids: &[&str]) -> JobBook {
    let mut book = JobBook::new();
    for id in ids {
        book.add(pending(id));
    }
    book
}

#[test]
fn poll_result_merges_status_and_progress() {
    init_logging();
    let mut book = book_with(&["j1"]);

    let changed = book.update(
        "j1",
        JobPatch::new()
            .status(JobStatus::Processing)
            .progress(50.0)
            .current_step(Some("Downloading video".into())),
    );

    assert!(changed);
    let job = book.get("j1").unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.progress, 50.0);
    assert_eq!(job.current_step.as_deref(), Some("Downloading video"));
}

#[test]
fn update_leaves_other_jobs_untouched() {
    init_logging();
    let mut book = book_with(&["a", "b", "c"]);
    let b_before = book.get("b").unwrap().clone();
    let c_before = book.get("c").unwrap().clone();

    book.update("a", JobPatch::new().status(JobStatus::Processing).progress(10.0));

    assert_eq!(book.get("b").unwrap(), &b_before);
    assert_eq!(book.get("c").unwrap(), &c_before);
}

#[test]
fn progress_does_not_regress_while_active() {
    init_logging();
    let mut book = book_with(&["a"]);
    book.update("a", JobPatch::new().status(JobStatus::Processing).progress(70.0));
    book.update("a", JobPatch::new().progress(40.0));

    assert_eq!(book.get("a").unwrap().progress, 70.0);
}

#[test]
fn progress_is_clamped() {
    init_logging();
    let mut book = book_with(&["a"]);
    book.update("a", JobPatch::new().progress(250.0));
    assert_eq!(book.get("a").unwrap().progress, 100.0);
}

#[test]
fn failed_status_always_carries_an_error() {
    init_logging();
    let mut book = book_with(&["a"]);
    book.update("a", JobPatch::new().status(JobStatus::Failed));

    let job = book.get("a").unwrap();
    let error = job.error.as_ref().expect("synthesized error");
    assert_eq!(error.code, ErrorCode::ImportFailed);
    assert!(!error.retryable);
    assert!(job.result.is_none());
}

#[test]
fn completion_clears_error_and_keeps_result() {
    init_logging();
    let mut book = book_with(&["a"]);
    book.update(
        "a",
        JobPatch::new()
            .status(JobStatus::Completed)
            .progress(100.0)
            .error(Some(JobError::new(ErrorCode::StatusFailed, "stale", true)))
            .result(Some(json!({ "recipeId": "r-1" }))),
    );

    let job = book.get("a").unwrap();
    assert!(job.error.is_none());
    assert_eq!(job.result, Some(json!({ "recipeId": "r-1" })));
}

fn fail(book: &mut JobBook, id: &str, code: ErrorCode) {
    book.update(
        id,
        JobPatch::new()
            .status(JobStatus::Failed)
            .error(Some(JobError::new(code, "boom", true))),
    );
}

#[test]
fn begin_retry_resets_a_failed_job() {
    init_logging();
    let mut book = book_with(&["f1"]);
    book.update(
        "f1",
        JobPatch::new()
            .status(JobStatus::Processing)
            .progress(80.0)
            .current_step(Some("Parsing".into())),
    );
    fail(&mut book, "f1", ErrorCode::StatusFailed);

    assert!(book.begin_retry("f1"));

    let job = book.get("f1").unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0.0);
    assert!(job.current_step.is_none());
    assert!(job.error.is_none());
    assert!(job.retry_pending);
    assert!(!job.needs_polling());
    assert_eq!(book.active_count(), 1);
    assert!(book.list_pollable().is_empty());
    assert_eq!(book.pollable_count(), 0);
}

#[test]
fn completed_jobs_are_final() {
    init_logging();
    let mut book = book_with(&["a"]);
    book.update(
        "a",
        JobPatch::new()
            .status(JobStatus::Completed)
            .progress(100.0)
            .result(Some(json!({ "recipeId": "r-1" }))),
    );
    let settled = book.get("a").unwrap().clone();

    // A late poll answer from before completion.
    let accepted = book.update("a", JobPatch::new().status(JobStatus::Processing).progress(40.0));

    assert!(!accepted);
    assert_eq!(book.get("a").unwrap(), &settled);
    assert!(!book.begin_retry("a"));
    assert!(!book.fail_retry("a", JobError::new(ErrorCode::RetryFailed, "x", true)));
    assert_eq!(book.get("a").unwrap(), &settled);
    assert_eq!(book.active_count(), 0);
}

#[test]
fn failed_jobs_leave_only_through_retry() {
    init_logging();
    let mut book = book_with(&["f1"]);
    fail(&mut book, "f1", ErrorCode::StatusFailed);
    let settled = book.get("f1").unwrap().clone();

    assert!(!book.update("f1", JobPatch::new().status(JobStatus::Processing).progress(10.0)));
    assert!(!book.update("f1", JobPatch::new().status(JobStatus::Completed)));
    assert!(!book.fail_retry("f1", JobError::new(ErrorCode::RetryFailed, "x", true)));
    assert_eq!(book.get("f1").unwrap(), &settled);
}

#[test]
fn pending_retry_ignores_status_updates_until_settled() {
    init_logging();
    let mut book = book_with(&["f1"]);
    fail(&mut book, "f1", ErrorCode::StatusFailed);
    assert!(book.begin_retry("f1"));
    assert!(!book.begin_retry("f1"));

    // The server still reports the old id as failed.
    assert!(!book.update("f1", JobPatch::new().status(JobStatus::Failed)));
    assert_eq!(book.get("f1").unwrap().status, JobStatus::Pending);

    assert!(book.fail_retry(
        "f1",
        JobError::new(ErrorCode::RetryFailed, "offline", true)
    ));
    let job = book.get("f1").unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_ref().unwrap().code, ErrorCode::RetryFailed);
    assert!(!job.retry_pending);
    assert!(job.can_retry());
}

#[test]
fn replacement_settles_a_pending_retry() {
    init_logging();
    let mut book = book_with(&["f1"]);
    fail(&mut book, "f1", ErrorCode::StatusFailed);
    book.begin_retry("f1");

    assert!(book.replace("f1", pending("f2")));

    let job = book.get("f2").unwrap();
    assert!(!job.retry_pending);
    assert!(job.needs_polling());
    assert_eq!(book.pollable_count(), 1);
}

#[test]
fn rows_are_newest_first_and_gate_retry() {
    init_logging();
    let mut book = JobBook::new();
    book.add(ImportJob::pending("old", ImportType::Video, "u1", "2026-01-01T00:00:00Z"));
    book.add(ImportJob::pending("new", ImportType::Photo, "u2", "2026-01-02T00:00:00Z"));
    book.add(ImportJob::pending("blocked", ImportType::Video, "u3", "2026-01-01T12:00:00Z"));
    book.update(
        "old",
        JobPatch::new()
            .status(JobStatus::Failed)
            .error(Some(JobError::new(ErrorCode::SubmitFailed, "server down", true))),
    );
    book.update(
        "blocked",
        JobPatch::new()
            .status(JobStatus::Failed)
            .error(Some(JobError::new(ErrorCode::BotDetected, "blocked", false))),
    );

    let rows = rows(book.jobs());
    let order: Vec<_> = rows.iter().map(|r| r.job_id.as_str()).collect();
    assert_eq!(order, vec!["new", "blocked", "old"]);

    assert!(rows[2].can_retry);
    assert!(rows[2].can_dismiss);
    assert_eq!(rows[2].error_message.as_deref(), Some("server down"));
    assert_eq!(rows[2].progress, None);

    assert!(!rows[1].can_retry);
    assert!(rows[1].needs_browser_fallback);

    assert!(!rows[0].can_dismiss);
    assert_eq!(rows[0].progress, Some(0.0));
}

#[test]
fn rows_compare_timestamps_across_offsets() {
    init_logging();
    let mut book = JobBook::new();
    // 08:00Z, written with a +02:00 offset.
    book.add(ImportJob::pending("offset", ImportType::Video, "u1", "2026-03-01T10:00:00+02:00"));
    book.add(ImportJob::pending("utc", ImportType::Video, "u2", "2026-03-01T09:00:00Z"));
    book.add(ImportJob::pending("undated", ImportType::Video, "u3", "yesterday"));

    let order: Vec<_> = rows(book.jobs()).into_iter().map(|r| r.job_id).collect();

    assert_eq!(order, vec!["utc", "offset", "undated"]);
}
