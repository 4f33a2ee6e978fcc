//! Bounded retry with a fixed delay between attempts.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::Result;

/// How often, and how patiently, a failing call is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// A policy that makes exactly one attempt.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    ///
    /// Returns the last error when every attempt failed.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;

        loop {
            match op(attempt) {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}/{}", label, attempt, attempts);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!("{} attempt {}/{} failed: {}", label, attempt, attempts, err);
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
                Err(err) => {
                    warn!("{} giving up after attempt {}/{}: {}", label, attempt, attempts, err);
                    return Err(err);
                }
            }
        }
    }
}
