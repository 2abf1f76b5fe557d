//! Display timeline that only grows during a run.

use crate::model::TimelineEvent;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineSource {
    #[default]
    Live,
    Snapshot,
}

/// Events shown to consumers for the current run.
///
/// Live polls are appended and never remove anything already shown. Once the
/// terminal snapshot carries a timeline it replaces the live list outright and
/// later live data is ignored.
#[derive(Debug, Clone, Default)]
pub(crate) struct LiveTimeline {
    events: Vec<TimelineEvent>,
    source: TimelineSource,
}

impl LiveTimeline {
    pub(crate) fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub(crate) fn source(&self) -> TimelineSource {
        self.source
    }

    /// Merge a polled list and return the events that were appended.
    pub(crate) fn merge_live(&mut self, incoming: Vec<TimelineEvent>) -> Vec<TimelineEvent> {
        if self.source == TimelineSource::Snapshot {
            return Vec::new();
        }
        let before = self.events.len();
        let extends_known =
            incoming.len() >= before && incoming[..before] == self.events[..];
        if extends_known {
            self.events.extend(incoming.into_iter().skip(before));
        } else {
            // Remote list was rewritten or truncated; keep what we have and add
            // anything unseen in arrival order.
            for ev in incoming {
                if !self.events.contains(&ev) {
                    self.events.push(ev);
                }
            }
        }
        self.events[before..].to_vec()
    }

    /// Replace the live list with the snapshot's. Returns false when the
    /// snapshot has no timeline, in which case the live list stays.
    pub(crate) fn adopt_snapshot(&mut self, events: &[TimelineEvent]) -> bool {
        if events.is_empty() {
            return false;
        }
        self.events = events.to_vec();
        self.source = TimelineSource::Snapshot;
        true
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.source = TimelineSource::Live;
    }
}
