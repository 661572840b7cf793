mod config;
mod decision;

pub use config::{Backoff, RetryConfig};
pub use decision::{decide_retry, RetryDecision, RetryReason};
