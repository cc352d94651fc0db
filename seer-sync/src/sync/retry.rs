//! Exponential backoff for transient failures.
//!
//! The one place retry timing lives. The manifest fetch and every file fetch
//! go through [`RetryPolicy::run`].

use crate::config::RetryConfig;
use crate::utils::errors::SyncError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Errors that can tell whether trying again might help.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for SyncError {
    fn is_transient(&self) -> bool {
        SyncError::is_transient(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// Wait before the first retry
    pub base_delay: Duration,
    /// Growth factor of the wait between retries
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_multiplier,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, 1.0)
    }

    /// Wait after the failed attempt number `attempt` (0-indexed):
    /// `base_delay * backoff_multiplier^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    /// Run `operation` until it succeeds, fails with a non-transient error,
    /// or `max_retries + 1` attempts have been made.
    ///
    /// `what` names the operation in log output.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.max_retries => {
                    error!("{} failed after {} attempts: {}", what, attempt + 1, e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:.1}s",
                        what,
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            config.backoff_multiplier,
        )
    }
}
