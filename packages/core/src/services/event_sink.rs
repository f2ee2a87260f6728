//! Observability sinks for hierarchy decision events

use crate::hierarchy::{EventDetail, EventSeverity, HierarchyEvent};

/// Receives the decision events of every service operation
///
/// `operation` is `ensure`, `query` or `delete`.
pub trait EventSink: Send + Sync {
    fn record(&self, operation: &str, event: &HierarchyEvent);
}

/// Emits events through `tracing` at a level matching their severity
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, operation: &str, event: &HierarchyEvent) {
        match (&event.severity, &event.detail) {
            (EventSeverity::Error, EventDetail::Failed { error }) => tracing::error!(
                operation,
                event = %event.name,
                path = %event.path,
                error = %error,
                "hierarchy operation failed"
            ),
            (EventSeverity::Error, detail) => tracing::error!(
                operation,
                event = %event.name,
                path = %event.path,
                detail = %detail,
                "hierarchy operation failed"
            ),
            (EventSeverity::Warn, detail) => tracing::warn!(
                operation,
                event = %event.name,
                path = %event.path,
                detail = %detail,
                "hierarchy operation warning"
            ),
            (EventSeverity::Info, detail) => tracing::info!(
                operation,
                event = %event.name,
                path = %event.path,
                detail = %detail,
                "hierarchy event"
            ),
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _operation: &str, _event: &HierarchyEvent) {}
}
