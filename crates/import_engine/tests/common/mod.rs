#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use import_core::{ImportJob, ImportType, JobStatus};
use import_engine::{
    ChannelError, StatusChannel, StatusProgress, StatusReport, SubmitReceipt, SubmitRequest,
};
use tokio::sync::Notify;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(import_logging::initialize_for_tests);
}

pub fn job(id: &str, status: JobStatus) -> ImportJob {
    ImportJob::pending(
        id,
        ImportType::Video,
        format!("https://www.instagram.com/reel/{id}"),
        "2026-05-01T10:00:00.000Z",
    )
    .with_status(status)
}

pub fn report(id: &str, status: JobStatus, percentage: f64) -> StatusReport {
    StatusReport {
        job_id: id.to_string(),
        status,
        progress: Some(StatusProgress {
            percentage,
            current_step: Some("Extracting recipe".to_string()),
        }),
        estimated_time_remaining: Some(4_000),
        error: None,
        result: None,
    }
}

pub fn receipt(id: &str) -> SubmitReceipt {
    SubmitReceipt {
        job_id: id.to_string(),
        status: JobStatus::Pending,
        platform: None,
        created_at: Some("2026-05-02T08:00:00.000Z".to_string()),
    }
}

/// Scripted in-process status channel.
#[derive(Default)]
pub struct FakeChannel {
    statuses: Mutex<HashMap<String, Result<StatusReport, ChannelError>>>,
    queued_statuses: Mutex<HashMap<String, VecDeque<(Duration, Result<StatusReport, ChannelError>)>>>,
    submits: Mutex<VecDeque<Result<SubmitReceipt, ChannelError>>>,
    cancel_result: Mutex<Option<ChannelError>>,
    status_delay: Mutex<Option<Duration>>,
    submit_gate: Mutex<Option<Arc<Notify>>>,
    status_calls: Mutex<Vec<String>>,
    submit_calls: Mutex<Vec<SubmitRequest>>,
    cancel_calls: Mutex<Vec<String>>,
}

impl FakeChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_status(&self, job_id: &str, result: Result<StatusReport, ChannelError>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(job_id.to_string(), result);
    }

    /// Answers the next status call for `job_id` after `delay`, ahead of `set_status`.
    pub fn queue_status(
        &self,
        job_id: &str,
        delay: Duration,
        result: Result<StatusReport, ChannelError>,
    ) {
        self.queued_statuses
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push_back((delay, result));
    }

    pub fn push_submit(&self, result: Result<SubmitReceipt, ChannelError>) {
        self.submits.lock().unwrap().push_back(result);
    }

    pub fn fail_cancel(&self, error: ChannelError) {
        *self.cancel_result.lock().unwrap() = Some(error);
    }

    pub fn delay_status(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    /// Submits block until the returned handle is notified.
    pub fn gate_submits(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.submit_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn submit_calls(&self) -> Vec<SubmitRequest> {
        self.submit_calls.lock().unwrap().clone()
    }

    pub fn cancel_calls(&self) -> Vec<String> {
        self.cancel_calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StatusChannel for FakeChannel {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReceipt, ChannelError> {
        self.submit_calls.lock().unwrap().push(request.clone());
        let gate = self.submit_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChannelError::network("no scripted submit")))
    }

    async fn fetch_status(&self, job_id: &str) -> Result<StatusReport, ChannelError> {
        self.status_calls.lock().unwrap().push(job_id.to_string());
        let queued = self
            .queued_statuses
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(VecDeque::pop_front);
        if let Some((delay, result)) = queued {
            tokio::time::sleep(delay).await;
            return result;
        }
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.statuses
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| Err(ChannelError::network("no scripted status")))
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ChannelError> {
        self.cancel_calls.lock().unwrap().push(job_id.to_string());
        match self.cancel_result.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
