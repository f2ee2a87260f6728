//! Decision events and operation outcomes
//!
//! Hierarchy operations do no logging themselves. Each one returns an
//! [`Outcome`] holding its result plus the ordered list of decisions it took;
//! the service layer hands those to an `EventSink`.

use crate::hierarchy::HierarchyError;
use serde::Serialize;
use std::fmt;

/// Severity of a decision event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warn,
    Error,
}

/// What happened at a decision branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetail {
    /// Step completed, nothing further to report
    Done,
    /// Step completed and touched `count` rows
    Count { count: u64 },
    /// Step refused because the target still has children
    Rejected { reason: String, children: usize },
    /// Step failed; `error` is the rendered store or validation error
    Failed { error: String },
}

impl fmt::Display for EventDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("ok"),
            Self::Count { count } => write!(f, "count={}", count),
            Self::Rejected { reason, children } => {
                write!(f, "rejected: {} (children={})", reason, children)
            }
            Self::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// One decision taken by a hierarchy operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyEvent {
    /// Dotted event name, e.g. `ensure.parent.created`
    pub name: String,
    /// Dotted path of the request that produced the event
    pub path: String,
    pub severity: EventSeverity,
    pub detail: EventDetail,
}

/// Result of one hierarchy operation
///
/// `value` is the zero value (0 / empty) whenever `error` is set or the
/// operation was rejected.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<HierarchyEvent>,
    pub error: Option<HierarchyError>,
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Names of the recorded events, in order
    pub fn event_names(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.iter().any(|e| e.name == name)
    }

    /// Drop the events and surface the aborting error, if any
    pub fn into_result(self) -> Result<T, HierarchyError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

/// Event collector bound to one request path
#[derive(Debug)]
pub(crate) struct EventLog {
    path: String,
    events: Vec<HierarchyEvent>,
}

impl EventLog {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            events: Vec::new(),
        }
    }

    fn push(&mut self, name: String, severity: EventSeverity, detail: EventDetail) {
        self.events.push(HierarchyEvent {
            name,
            path: self.path.clone(),
            severity,
            detail,
        });
    }

    pub(crate) fn info(&mut self, name: impl Into<String>) {
        self.push(name.into(), EventSeverity::Info, EventDetail::Done);
    }

    pub(crate) fn info_count(&mut self, name: impl Into<String>, count: u64) {
        self.push(name.into(), EventSeverity::Info, EventDetail::Count { count });
    }

    pub(crate) fn rejected(
        &mut self,
        name: impl Into<String>,
        reason: impl Into<String>,
        children: usize,
    ) {
        self.push(
            name.into(),
            EventSeverity::Warn,
            EventDetail::Rejected {
                reason: reason.into(),
                children,
            },
        );
    }

    pub(crate) fn warn(&mut self, name: impl Into<String>, err: &impl fmt::Display) {
        self.push(
            name.into(),
            EventSeverity::Warn,
            EventDetail::Failed {
                error: err.to_string(),
            },
        );
    }

    pub(crate) fn error(&mut self, name: impl Into<String>, err: &impl fmt::Display) {
        self.push(
            name.into(),
            EventSeverity::Error,
            EventDetail::Failed {
                error: err.to_string(),
            },
        );
    }

    pub(crate) fn finish<T>(self, value: T) -> Outcome<T> {
        Outcome {
            value,
            events: self.events,
            error: None,
        }
    }

    pub(crate) fn fail<T>(self, value: T, error: impl Into<HierarchyError>) -> Outcome<T> {
        Outcome {
            value,
            events: self.events,
            error: Some(error.into()),
        }
    }
}
