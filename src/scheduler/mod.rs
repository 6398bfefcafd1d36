//! Task scheduling: tick sources, per-tick selection and the dispatch loop.

mod engine;
pub mod selection;
pub mod ticker;

pub use engine::{DispatchHandle, Scheduler, TickReport};
pub use ticker::{IntervalTicker, ManualTicker, TickHandle, Ticker};
