//! Run orchestration and live-status synchronization.
//!
//! `RunController` owns the run state machine. It launches the status and
//! timeline pollers on start and tears them down on terminal status or reset.
//! Presentation layers read `RunView` snapshots or consume `RunEvent`s.

mod controller;
mod poller;
mod state;
#[cfg(test)]
pub(crate) mod testing;
mod timeline;

pub(crate) use controller::{RunController, RunEvent};
pub(crate) use state::RunView;
pub(crate) use timeline::TimelineSource;
