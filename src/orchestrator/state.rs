//! Mutable record of the current run, owned by one `RunController`.

use super::poller::TaskHandle;
use super::timeline::{LiveTimeline, TimelineSource};
use crate::model::{FormInputs, ResultSnapshot, RunStatus, TimelineEvent};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Ownership token for the pollers of one run. Present exactly while the run
/// is queued or running; dropping it stops both pollers.
pub(crate) struct PollHandle {
    generation: u64,
    cancel: CancellationToken,
    status_task: Option<TaskHandle>,
    timeline_task: Option<TaskHandle>,
}

impl PollHandle {
    fn new(generation: u64, cancel: CancellationToken) -> Self {
        Self {
            generation,
            cancel,
            status_task: None,
            timeline_task: None,
        }
    }

    /// Token for a poller task; cancelled together with this handle.
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub(crate) fn attach(&mut self, status_task: TaskHandle, timeline_task: TaskHandle) {
        self.status_task = Some(status_task);
        self.timeline_task = Some(timeline_task);
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
        for task in [&self.status_task, &self.timeline_task].into_iter().flatten() {
            task.cancel();
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
        debug!(
            generation = self.generation,
            status_done = self.status_task.as_ref().map_or(true, TaskHandle::is_finished),
            timeline_done = self.timeline_task.as_ref().map_or(true, TaskHandle::is_finished),
            "poll handle released"
        );
    }
}

pub(crate) struct RunState {
    pub(crate) form: FormInputs,
    pub(crate) status: RunStatus,
    pub(crate) results: Option<ResultSnapshot>,
    pub(crate) error: Option<String>,
    pub(crate) timeline: LiveTimeline,
    pub(crate) active_poll: Option<PollHandle>,
    /// Bumped on every start and reset; async work captures it and only
    /// writes back while it still matches.
    generation: u64,
    /// Covers all work of the current generation, including the one-shot
    /// results fetch that outlives the poll handle.
    run_cancel: CancellationToken,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            form: FormInputs::default(),
            status: RunStatus::Idle,
            results: None,
            error: None,
            timeline: LiveTimeline::default(),
            active_poll: None,
            generation: 0,
            run_cancel: CancellationToken::new(),
        }
    }
}

impl RunState {
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub(crate) fn run_cancel(&self) -> CancellationToken {
        self.run_cancel.clone()
    }

    /// Enter `queued` for a new run and claim the poll handle. Returns the
    /// new generation and a token that fires if the run is reset.
    pub(crate) fn begin_run(&mut self) -> (u64, CancellationToken) {
        self.invalidate();
        self.results = None;
        self.error = None;
        self.timeline.clear();
        self.status = RunStatus::Queued;
        self.active_poll = Some(PollHandle::new(
            self.generation,
            self.run_cancel.child_token(),
        ));
        (self.generation, self.run_cancel.clone())
    }

    /// Release the poll handle, stopping both pollers.
    pub(crate) fn end_polling(&mut self) {
        self.active_poll = None;
    }

    /// Back to the initial state. Form inputs are kept.
    pub(crate) fn reset(&mut self) {
        self.invalidate();
        self.status = RunStatus::Idle;
        self.results = None;
        self.error = None;
        self.timeline.clear();
    }

    fn invalidate(&mut self) {
        self.run_cancel.cancel();
        self.active_poll = None;
        self.generation += 1;
        self.run_cancel = CancellationToken::new();
    }

    pub(crate) fn view(&self) -> RunView {
        RunView {
            form: self.form.clone(),
            status: self.status,
            results: self.results.clone(),
            error: self.error.clone(),
            timeline: self.timeline.events().to_vec(),
            timeline_source: self.timeline.source(),
            polling: self.active_poll.is_some(),
        }
    }
}

/// Read-only copy of the run state for presentation layers.
#[derive(Debug, Clone, PartialEq)]
pub struct RunView {
    pub form: FormInputs,
    pub status: RunStatus,
    pub results: Option<ResultSnapshot>,
    pub error: Option<String>,
    pub timeline: Vec<TimelineEvent>,
    pub timeline_source: TimelineSource,
    /// Whether a poll handle is held for the current run.
    pub polling: bool,
}

impl RunView {
    /// Finished from the caller's point of view: terminal and either results
    /// or an error are in.
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal() && (self.results.is_some() || self.error.is_some())
    }
}
