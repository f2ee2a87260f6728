//! Hierarchy engine
//!
//! The three operations over the g.p.a tree. Each component holds nothing but
//! its store handle and returns an [`Outcome`]: the result value plus the
//! decision events taken on the way.

mod deleter;
mod error;
mod events;
mod inserter;
mod query;

pub use deleter::HierarchyDeleter;
pub use error::HierarchyError;
pub use events::{EventDetail, EventSeverity, HierarchyEvent, Outcome};
pub use inserter::HierarchyInserter;
pub use query::{HierarchyQueryEngine, TreeQuery};
