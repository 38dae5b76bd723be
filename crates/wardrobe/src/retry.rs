//! Bounded retry for outbound calls.
//!
//! A policy is plain data: attempt budget, first delay, and whether the delay
//! doubles. Execution decides per failure whether it is worth another try;
//! anything not recognized as transient is returned on first occurrence.
//!
//! Exhaustion behaves one of two ways:
//! - [`RetryPolicy::run`] propagates the last failure unchanged.
//! - [`RetryPolicy::run_or`] substitutes a caller-supplied value.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
  /// Delay doubles after every retry
  Exponential,
  /// Same delay before every retry
  Constant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  max_attempts: u32,
  initial_delay: Duration,
  backoff: Backoff,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::rate_limited()
  }
}

impl RetryPolicy {
  pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
    Self { max_attempts, initial_delay, backoff: Backoff::Exponential }
  }

  pub fn constant(max_attempts: u32, delay: Duration) -> Self {
    Self { max_attempts, initial_delay: delay, backoff: Backoff::Constant }
  }

  /// Generation API default: 3 attempts, 1s then 2s
  pub fn rate_limited() -> Self {
    Self::exponential(3, Duration::from_millis(1000))
  }

  /// Weather and geocoding calls: first try plus 2 retries, 500ms apart
  pub fn network() -> Self {
    Self::constant(3, Duration::from_millis(500))
  }

  /// Total attempts including the first; never less than one
  pub fn max_attempts(&self) -> u32 {
    self.max_attempts.max(1)
  }

  /// Delay slept before retry number `retry` (0 = the wait after the first failure)
  pub fn delay_before_retry(&self, retry: u32) -> Duration {
    match self.backoff {
      Backoff::Constant => self.initial_delay,
      Backoff::Exponential => {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
      }
    }
  }

  /// Run `operation`, retrying failures for which `is_transient` holds.
  ///
  /// Returns the first success, the first non-transient failure, or the
  /// failure of the final attempt.
  pub async fn run<T, E, F, Fut, P>(&self, mut operation: F, is_transient: P) -> Result<T, E>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
  {
    let attempts = self.max_attempts();
    let mut retry = 0;

    loop {
      match operation().await {
        Ok(value) => return Ok(value),
        Err(err) => {
          let attempt = retry + 1;
          if !is_transient(&err) {
            debug!(attempt, error = %err, "non-transient failure, not retrying");
            return Err(err);
          }
          if attempt >= attempts {
            warn!(attempt, error = %err, "retry budget exhausted");
            return Err(err);
          }

          let delay = self.delay_before_retry(retry);
          warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "transient failure, retrying");
          sleep(delay).await;
          retry += 1;
        }
      }
    }
  }

  /// Like [`run`](Self::run) but any final failure becomes `fallback`
  pub async fn run_or<T, E, F, Fut, P>(&self, operation: F, is_transient: P, fallback: T) -> T
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
  {
    match self.run(operation, is_transient).await {
      Ok(value) => value,
      Err(err) => {
        warn!(error = %err, "substituting fallback after failure");
        fallback
      }
    }
  }
}
