use std::time::Duration;

use scenaria_core::scenario::Retry;

#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    Constant {
        interval: Duration,
    },
    Exponential {
        initial: Duration,
        max: Duration,
        factor: f64,
        /// Randomization factor in `[0, 1]`.
        jitter: f64,
    },
}

/// Retry settings of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub backoff: Backoff,
    pub max_retries: u32,
    /// Whether attempts that ran past the step timeout are retried.
    pub retry_timeout: bool,
}

impl RetryConfig {
    /// A single attempt.
    pub fn none() -> Self {
        Self {
            backoff: Backoff::Constant {
                interval: Duration::ZERO,
            },
            max_retries: 0,
            retry_timeout: false,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries as usize + 1
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::none()
    }
}

impl From<&Retry> for RetryConfig {
    fn from(r: &Retry) -> Self {
        let backoff = match (&r.constant, &r.exponential) {
            (Some(c), _) => Backoff::Constant {
                interval: c.interval,
            },
            (None, Some(e)) => Backoff::Exponential {
                initial: e.initial_interval,
                max: e.max_interval,
                factor: e.factor,
                jitter: e.jitter,
            },
            (None, None) => Backoff::Constant {
                interval: Duration::ZERO,
            },
        };
        Self {
            backoff,
            max_retries: r.max_retries(),
            retry_timeout: r.timeout,
        }
    }
}
