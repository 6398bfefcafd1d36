//! Failure handling: bounded retry and the error log.

pub mod log;
pub mod retry;

pub use log::{ErrorFilter, ErrorLog, ErrorRecord};
pub use retry::RetryPolicy;
