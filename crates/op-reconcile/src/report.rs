// report.rs: Operator-facing progress events.
//
// The reconciler never prints. Every status line goes through an injected
// Reporter so the CLI decides the formatting and tests can assert on the
// exact sequence of events.

use serde::Serialize;

use crate::error::Step;
use crate::index::TargetLabel;
use crate::mode::ApplyMode;

/// Something the operator should hear about.
///
/// Mutating events carry the [`ApplyMode`] so a dry-run reads as "would".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    DocumentValidated {
        policy: String,
        size: usize,
        limit: usize,
    },
    PolicyCreated {
        policy: String,
        /// `None` under dry-run: nothing was assigned yet.
        id: Option<String>,
        mode: ApplyMode,
    },
    PolicyUpdated {
        policy: String,
        id: String,
        mode: ApplyMode,
    },
    TargetAttached {
        policy: String,
        target: TargetLabel,
        mode: ApplyMode,
    },
    TargetDetached {
        policy: String,
        target: TargetLabel,
        mode: ApplyMode,
    },
    AttachmentsInSync {
        policy: String,
    },
    EntrySkipped {
        policy: String,
        step: Step,
        reason: String,
    },
}

impl ReportEvent {
    /// The policy this event is about.
    pub fn policy(&self) -> &str {
        match self {
            ReportEvent::DocumentValidated { policy, .. }
            | ReportEvent::PolicyCreated { policy, .. }
            | ReportEvent::PolicyUpdated { policy, .. }
            | ReportEvent::TargetAttached { policy, .. }
            | ReportEvent::TargetDetached { policy, .. }
            | ReportEvent::AttachmentsInSync { policy }
            | ReportEvent::EntrySkipped { policy, .. } => policy,
        }
    }
}

/// Sink for report events.
pub trait Reporter {
    fn report(&mut self, event: ReportEvent);
}

/// Keeps every event in order. Used by tests and by callers that render
/// the report after the run.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events for one policy, in order.
    pub fn for_policy<'a>(&'a self, policy: &'a str) -> impl Iterator<Item = &'a ReportEvent> {
        self.events.iter().filter(move |e| e.policy() == policy)
    }
}

impl Reporter for RecordingReporter {
    fn report(&mut self, event: ReportEvent) {
        self.events.push(event);
    }
}
