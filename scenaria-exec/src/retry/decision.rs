use std::time::Duration;

use scenaria_core::error::ErrorPhase;

use crate::retry::config::{Backoff, RetryConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter { delay: Duration, reason: RetryReason },
    Stop { reason: RetryReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    NotRetryable,
    AttemptsExhausted,
    TimeoutNotRetried,
    Failure(ErrorPhase),
}

/// Decide if a failed attempt should be retried and how long to wait.
///
/// - `attempt_no`: 1-based number of the attempt that just failed.
/// - `phase`: where the failure came from. Render, invoke and assert failures
///   are retried; timeouts only when the policy opts in; everything else is fatal.
/// - `rand_u64`: RNG for jitter.
pub fn decide_retry(
    cfg: &RetryConfig,
    attempt_no: usize,
    phase: Option<ErrorPhase>,
    rand_u64: impl Fn() -> u64,
) -> RetryDecision {
    let phase = match phase {
        Some(p @ (ErrorPhase::Render | ErrorPhase::Invoke | ErrorPhase::Assert)) => p,
        Some(ErrorPhase::Timeout) if cfg.retry_timeout => ErrorPhase::Timeout,
        Some(ErrorPhase::Timeout) => {
            return RetryDecision::Stop {
                reason: RetryReason::TimeoutNotRetried,
            }
        }
        _ => {
            return RetryDecision::Stop {
                reason: RetryReason::NotRetryable,
            }
        }
    };

    if attempt_no >= cfg.max_attempts() {
        return RetryDecision::Stop {
            reason: RetryReason::AttemptsExhausted,
        };
    }

    let delay = match &cfg.backoff {
        Backoff::Constant { interval } => *interval,
        Backoff::Exponential {
            initial,
            max,
            factor,
            jitter,
        } => {
            // initial * factor^(attempt_no-1), spread by ±jitter, capped at max.
            let exp = attempt_no.saturating_sub(1) as i32;
            let raw = (initial.as_millis() as f64) * factor.powi(exp);
            let spread = if *jitter > 0.0 {
                let r = (rand_u64() % 2001) as f64 / 1000.0 - 1.0;
                raw * jitter * r
            } else {
                0.0
            };
            let ms = (raw + spread).min(max.as_millis() as f64).max(0.0) as u64;
            Duration::from_millis(ms)
        }
    };
    RetryDecision::RetryAfter {
        delay,
        reason: RetryReason::Failure(phase),
    }
}
