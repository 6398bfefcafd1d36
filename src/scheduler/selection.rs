//! Per-tick task selection: priority ordering and the capacity cut.

use crate::tasks::Task;

/// Order eligible tasks by priority, highest first.
///
/// The sort is stable, so tasks of equal priority keep the store's
/// insertion order.
pub fn prioritize(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
}

/// Pick the tasks to dispatch this tick.
pub fn select(mut eligible: Vec<Task>, capacity: usize) -> Vec<Task> {
    prioritize(&mut eligible);
    eligible.truncate(capacity);
    eligible
}
