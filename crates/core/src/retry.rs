//! Exponential-backoff retry for transient failures.
//!
//! Only [`PlotError::Connection`] and [`PlotError::Timeout`] are retried.
//! Everything else (job, config, not-found errors) is returned on the
//! first occurrence.

use std::time::Duration;

use crate::error::{PlotError, PlotResult};

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first re-attempt.
    pub base_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// Never re-attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before re-attempt number `attempt + 1` (0-based).
    ///
    /// The error's own retry-after hint acts as a floor.
    pub fn delay_for(&self, attempt: u32, err: &PlotError) -> Duration {
        let factor = self.backoff_factor.powi(attempt as i32);
        let backoff = Duration::from_secs_f64(self.base_delay.as_secs_f64() * factor);
        match err.retry_after() {
            Some(floor) => backoff.max(floor),
            None => backoff,
        }
    }

    /// Run `op`, re-attempting transient failures with blocking sleeps.
    ///
    /// `label` only feeds the log lines.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> PlotResult<T>
    where
        F: FnMut() -> PlotResult<T>,
    {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt, &e);
                    tracing::warn!(
                        operation = label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying",
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
