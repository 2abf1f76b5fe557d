//! Scripted in-memory pipeline for controller tests.

use crate::error::TransportError;
use crate::model::{
    Ack, HealthReport, ResultSnapshot, RunStatus, Score, StartAck, StartPayload, StatusReport,
    TestSummary, TimelineEvent, TimelineReport,
};
use crate::transport::PipelineTransport;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Queue<T> = Mutex<VecDeque<Result<T, TransportError>>>;

/// Responses are served in order. Once a queue runs dry a default is used:
/// `running` for status, an empty timeline, a default start ack and 404 for
/// results.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    starts: Queue<StartAck>,
    statuses: Queue<StatusReport>,
    results: Queue<ResultSnapshot>,
    timelines: Queue<TimelineReport>,
    fail_reset: AtomicBool,
    start_gate: Mutex<Option<Arc<Notify>>>,
    status_gate: Mutex<Option<Arc<Notify>>>,
    results_gate: Mutex<Option<Arc<Notify>>>,
    start_calls: AtomicUsize,
    status_calls: AtomicUsize,
    results_calls: AtomicUsize,
    timeline_calls: AtomicUsize,
    reset_calls: AtomicUsize,
    payloads: Mutex<Vec<StartPayload>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_start(
        self,
        items: impl IntoIterator<Item = Result<StartAck, TransportError>>,
    ) -> Self {
        self.starts.lock().unwrap().extend(items);
        self
    }

    pub(crate) fn with_statuses(
        self,
        items: impl IntoIterator<Item = Result<StatusReport, TransportError>>,
    ) -> Self {
        self.statuses.lock().unwrap().extend(items);
        self
    }

    pub(crate) fn with_results(
        self,
        items: impl IntoIterator<Item = Result<ResultSnapshot, TransportError>>,
    ) -> Self {
        self.results.lock().unwrap().extend(items);
        self
    }

    pub(crate) fn with_timelines(
        self,
        items: impl IntoIterator<Item = Result<TimelineReport, TransportError>>,
    ) -> Self {
        self.timelines.lock().unwrap().extend(items);
        self
    }

    pub(crate) fn failing_reset(self) -> Self {
        self.fail_reset.store(true, Ordering::SeqCst);
        self
    }

    /// Hold every start call until the returned gate is notified.
    pub(crate) fn gate_start(&self) -> Arc<Notify> {
        install_gate(&self.start_gate)
    }

    pub(crate) fn gate_status(&self) -> Arc<Notify> {
        install_gate(&self.status_gate)
    }

    pub(crate) fn gate_results(&self) -> Arc<Notify> {
        install_gate(&self.results_gate)
    }

    pub(crate) fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn results_calls(&self) -> usize {
        self.results_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn timeline_calls(&self) -> usize {
        self.timeline_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn start_payloads(&self) -> Vec<StartPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

fn install_gate(slot: &Mutex<Option<Arc<Notify>>>) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *slot.lock().unwrap() = Some(gate.clone());
    gate
}

async fn pass_gate(slot: &Mutex<Option<Arc<Notify>>>) {
    let gate = slot.lock().unwrap().clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

fn next<T>(queue: &Queue<T>) -> Option<Result<T, TransportError>> {
    queue.lock().unwrap().pop_front()
}

#[async_trait]
impl PipelineTransport for ScriptedTransport {
    async fn start(&self, payload: &StartPayload) -> Result<StartAck, TransportError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        pass_gate(&self.start_gate).await;
        next(&self.starts).unwrap_or_else(|| Ok(StartAck::default()))
    }

    async fn poll_status(&self) -> Result<StatusReport, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.status_gate).await;
        next(&self.statuses).unwrap_or_else(|| status(RunStatus::Running))
    }

    async fn fetch_results(&self) -> Result<ResultSnapshot, TransportError> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.results_gate).await;
        next(&self.results)
            .unwrap_or_else(|| Err(http_error(404, Some("No results available yet."), "")))
    }

    async fn fetch_timeline(&self) -> Result<TimelineReport, TransportError> {
        self.timeline_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.timelines).unwrap_or_else(|| Ok(TimelineReport::default()))
    }

    async fn reset_remote(&self) -> Result<Ack, TransportError> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reset.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        Ok(Ack::default())
    }

    async fn health(&self) -> Result<HealthReport, TransportError> {
        Ok(HealthReport {
            status: "ok".into(),
            service: None,
            timestamp: None,
        })
    }
}

pub(crate) fn status(status: RunStatus) -> Result<StatusReport, TransportError> {
    Ok(StatusReport {
        status,
        run_id: None,
        started_at: None,
        message: None,
    })
}

pub(crate) fn http_error(code: u16, detail: Option<&str>, body: &str) -> TransportError {
    TransportError::Status {
        status: StatusCode::from_u16(code).unwrap(),
        detail: detail.map(str::to_string),
        body: body.to_string(),
    }
}

pub(crate) fn timeline(events: &[&str]) -> TimelineReport {
    TimelineReport {
        status: Some(RunStatus::Running),
        timeline: events
            .iter()
            .enumerate()
            .map(|(i, name)| TimelineEvent {
                event: name.to_string(),
                timestamp: format!("2026-01-01T00:00:{i:02}Z"),
                detail: None,
                status: None,
            })
            .collect(),
    }
}

pub(crate) fn snapshot(status: RunStatus) -> ResultSnapshot {
    ResultSnapshot {
        run_id: "run-1".into(),
        status,
        branch_name: "ACME_ORG_J_DOE_AI_Fix".into(),
        fixes: Vec::new(),
        fixes_formatted_output: Vec::new(),
        cicd_timeline: Vec::new(),
        test_summary: TestSummary::default(),
        total_tests: None,
        tests_passed: None,
        tests_failed: None,
        score: Score::default(),
        commit_sha: "0123abc".into(),
        pr_url: None,
        repo_url: Some("https://github.com/a/b".into()),
        team_name: None,
        leader_name: None,
        language: Some("python".into()),
        started_at: None,
        finished_at: None,
        duration_seconds: 0.0,
        retry_count: 0,
        retry_limit: Some(3),
        failures: Vec::new(),
        cicd_status: None,
        error_message: None,
    }
}
