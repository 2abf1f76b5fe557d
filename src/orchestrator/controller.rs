//! Run lifecycle controller.
//!
//! Owns start/reset orchestration, drives the status and timeline pollers and
//! emits events for presentation layers. All writes to `RunState` go through
//! this type under a short lock that is never held across an await.

use super::poller::{schedule_repeating, BestEffort, TaskHandle};
use super::state::{RunState, RunView};
use crate::error::{ControllerError, TransportError};
use crate::model::{
    FormField, PollConfig, ResultSnapshot, RunStatus, StartAck, TimelineEvent,
};
use crate::transport::PipelineTransport;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Notifications for presentation layers, sent in the order the state changed.
#[derive(Debug, Clone)]
pub enum RunEvent {
    StatusChanged(RunStatus),
    /// Newly observed live events, in arrival order.
    TimelineAppended(Vec<TimelineEvent>),
    /// The terminal snapshot's timeline replaced the live one.
    TimelineReplaced(Vec<TimelineEvent>),
    // Box to keep RunEvent small; the snapshot is large.
    ResultsReady(Box<ResultSnapshot>),
    Error(String),
    Reset,
}

struct Inner {
    transport: Arc<dyn PipelineTransport>,
    poll: PollConfig,
    state: Mutex<RunState>,
    event_tx: Option<UnboundedSender<RunEvent>>,
}

/// Handle to one run controller. Clones share the same state.
#[derive(Clone)]
pub struct RunController {
    inner: Arc<Inner>,
}

impl RunController {
    pub fn new(
        transport: Arc<dyn PipelineTransport>,
        poll: PollConfig,
        event_tx: Option<UnboundedSender<RunEvent>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                poll,
                state: Mutex::new(RunState::default()),
                event_tx,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.inner.event_tx {
            let _ = tx.send(event);
        }
    }

    pub fn set_field(&self, field: FormField, value: impl Into<String>) {
        self.state().form.set(field, value);
    }

    pub fn view(&self) -> RunView {
        self.state().view()
    }

    pub fn branch_preview(&self) -> String {
        self.state().form.branch_preview()
    }

    /// Start a run with the current form inputs.
    ///
    /// Rejected while a run is queued or running. On acceptance the status and
    /// timeline pollers are launched; on failure the run ends as `failed`.
    pub async fn start(&self) -> Result<StartAck, ControllerError> {
        let (generation, cancel, payload) = {
            let mut st = self.state();
            if st.active_poll.is_some() {
                return Err(ControllerError::AlreadyRunning);
            }
            let Some(payload) = st.form.to_payload() else {
                let msg = "Repository URL is required".to_string();
                st.error = Some(msg.clone());
                self.emit(RunEvent::Error(msg.clone()));
                return Err(ControllerError::Validation(msg));
            };
            let (generation, cancel) = st.begin_run();
            self.emit(RunEvent::StatusChanged(RunStatus::Queued));
            (generation, cancel, payload)
        };
        info!(generation, repo_url = %payload.repo_url, retry_limit = payload.retry_limit, "starting pipeline run");

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ControllerError::Cancelled),
            res = self.inner.transport.start(&payload) => res,
        };

        let mut st = self.state();
        if !st.is_current(generation) {
            return Err(ControllerError::Cancelled);
        }
        match res {
            Ok(ack) => {
                st.status = RunStatus::Running;
                if let Some(handle) = st.active_poll.as_mut() {
                    let status_task = self.spawn_status_poller(generation, handle.child_token());
                    let timeline_task =
                        self.spawn_timeline_poller(generation, handle.child_token());
                    handle.attach(status_task, timeline_task);
                }
                self.emit(RunEvent::StatusChanged(RunStatus::Running));
                debug!(generation, message = ?ack.message, "run accepted");
                Ok(ack)
            }
            Err(e) => {
                warn!(generation, error = %e, "start request failed");
                self.fail_locked(&mut st, e.user_message());
                Err(ControllerError::Transport(e))
            }
        }
    }

    /// Stop polling and return to `idle`. Never fails; the remote reset is
    /// best-effort and runs after local state is already cleared. A remote run
    /// that is still executing is left orphaned.
    pub async fn reset(&self) {
        {
            let mut st = self.state();
            st.reset();
            self.emit(RunEvent::Reset);
        }
        match self.inner.transport.reset_remote().await {
            Ok(_) => debug!("remote pipeline reset"),
            Err(e) => warn!(error = %e, "remote reset failed; local state already cleared"),
        }
    }

    fn fail_locked(&self, st: &mut RunState, message: String) {
        st.status = RunStatus::Failed;
        st.error = Some(message.clone());
        st.end_polling();
        self.emit(RunEvent::StatusChanged(RunStatus::Failed));
        self.emit(RunEvent::Error(message));
    }

    fn spawn_status_poller(&self, generation: u64, cancel: CancellationToken) -> TaskHandle {
        let this = self.clone();
        schedule_repeating(self.inner.poll.status_interval, cancel, move || {
            let this = this.clone();
            async move { this.status_tick(generation).await }
        })
    }

    fn spawn_timeline_poller(&self, generation: u64, cancel: CancellationToken) -> TaskHandle {
        let this = self.clone();
        schedule_repeating(self.inner.poll.timeline_interval, cancel, move || {
            let this = this.clone();
            async move { this.timeline_tick(generation).await }
        })
    }

    async fn status_tick(&self, generation: u64) -> ControlFlow<()> {
        let res = self.inner.transport.poll_status().await;

        let mut st = self.state();
        if !st.is_current(generation) || !st.status.is_active() {
            debug!(generation, "discarding stale status response");
            return ControlFlow::Break(());
        }
        let report = match res {
            Ok(report) => report,
            Err(e) => {
                warn!(generation, error = %e, "status poll failed");
                self.fail_locked(&mut st, e.user_message());
                return ControlFlow::Break(());
            }
        };

        match report.status {
            status if status.is_terminal() => {
                info!(generation, %status, "run reached terminal status");
                st.status = status;
                st.end_polling();
                self.emit(RunEvent::StatusChanged(status));
                let this = self.clone();
                let cancel = st.run_cancel();
                tokio::spawn(async move { this.fetch_results_once(generation, cancel).await });
                ControlFlow::Break(())
            }
            RunStatus::Idle => {
                warn!(generation, "remote reported idle while a run was active");
                let message = report
                    .message
                    .unwrap_or_else(|| "Remote pipeline is idle; the run was lost".to_string());
                self.fail_locked(&mut st, message);
                ControlFlow::Break(())
            }
            RunStatus::Queued if st.status == RunStatus::Running => {
                debug!(generation, "ignoring remote queued after running");
                ControlFlow::Continue(())
            }
            status => {
                if st.status != status {
                    st.status = status;
                    self.emit(RunEvent::StatusChanged(status));
                }
                ControlFlow::Continue(())
            }
        }
    }

    async fn fetch_results_once(&self, generation: u64, cancel: CancellationToken) {
        let res: Result<ResultSnapshot, TransportError> = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            res = self.inner.transport.fetch_results() => res,
        };

        let mut st = self.state();
        if !st.is_current(generation) {
            debug!(generation, "discarding stale results");
            return;
        }
        match res {
            Ok(snapshot) => {
                if st.timeline.adopt_snapshot(&snapshot.cicd_timeline) {
                    self.emit(RunEvent::TimelineReplaced(snapshot.cicd_timeline.clone()));
                }
                info!(generation, run_id = %snapshot.run_id, fixes = snapshot.fixes.len(), "results fetched");
                st.results = Some(snapshot.clone());
                self.emit(RunEvent::ResultsReady(Box::new(snapshot)));
            }
            Err(e) => {
                warn!(generation, error = %e, "results fetch failed");
                let message = ControllerError::PartialResult(e.user_message()).to_string();
                st.error = Some(message.clone());
                self.emit(RunEvent::Error(message));
            }
        }
    }

    async fn timeline_tick(&self, generation: u64) -> ControlFlow<()> {
        let fetched = BestEffort::from(self.inner.transport.fetch_timeline().await);

        let mut st = self.state();
        if !st.is_current(generation) || !st.status.is_active() {
            return ControlFlow::Break(());
        }
        match fetched {
            BestEffort::Fresh(report) => {
                let appended = st.timeline.merge_live(report.timeline);
                if !appended.is_empty() {
                    self.emit(RunEvent::TimelineAppended(appended));
                }
            }
            BestEffort::Stale { reason } => {
                debug!(generation, %reason, "timeline fetch skipped");
            }
        }
        ControlFlow::Continue(())
    }
}
