//! Shared helpers

pub mod retry;
pub mod schedule;

pub use retry::{RetryPolicy, with_retry};
pub use schedule::spawn_periodic;
