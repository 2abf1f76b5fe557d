//! Cancellable periodic tasks used by the status and timeline pollers.

use crate::error::TransportError;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to a repeating task. Cancelling it stops the next tick and drops any
/// tick that is still awaiting the network.
pub(crate) struct TaskHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Run `action` every `period` until it returns `Break` or `cancel` fires.
///
/// The first tick happens one period after scheduling. Ticks never overlap: a
/// tick that overruns its period absorbs the missed ones instead of queueing
/// them.
pub(crate) fn schedule_repeating<F, Fut>(
    period: Duration,
    cancel: CancellationToken,
    mut action: F,
) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let token = cancel.clone();
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let flow = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                flow = action() => flow,
            };
            if flow.is_break() {
                break;
            }
        }
    });
    TaskHandle { cancel, join }
}

/// Result of a fetch whose failure is tolerated. A stale outcome carries the
/// reason for logging only; it has no error path to the user.
#[derive(Debug)]
pub(crate) enum BestEffort<T> {
    Fresh(T),
    Stale { reason: String },
}

impl<T> From<Result<T, TransportError>> for BestEffort<T> {
    fn from(res: Result<T, TransportError>) -> Self {
        match res {
            Ok(v) => BestEffort::Fresh(v),
            Err(e) => BestEffort::Stale {
                reason: e.to_string(),
            },
        }
    }
}
