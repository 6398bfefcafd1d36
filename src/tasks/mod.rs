//! Tasks: the schedulable units of work and the store that owns them.
//!
//! - `model`: `Task`, status state machine (Pending → InProgress → Completed/Failed), priority
//! - `store`: `TaskStore`, the only writer of task status

pub mod model;
pub mod store;

pub use model::{Task, TaskPriority, TaskStatus, TaskSummary};
pub use store::TaskStore;
