//! Business Services
//!
//! - `StreeService` - request-level ensure, query and delete
//! - `EventSink` - where decision events go (`TracingSink`, `NullSink`)

pub mod event_sink;
pub mod stree_service;

pub use event_sink::{EventSink, NullSink, TracingSink};
pub use stree_service::StreeService;
