//! Timeout + bounded retry with exponential backoff for network calls
//!
//! Every outbound call (listing page, landing page, PDF, LLM completion) is
//! wrapped here so a hung or flaky endpoint costs at most
//! `max_attempts * timeout` plus backoff.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::settings::Settings;

/// Errors that know whether another attempt could succeed
pub trait Transient {
    fn is_transient(&self) -> bool;

    /// Build the error reported when an attempt exceeds its timeout
    fn timed_out(after: Duration) -> Self;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            timeout: Duration::from_secs(settings.request_timeout_secs),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Backoff before attempt `attempt + 1` (attempt is 1-based), with up to 25% jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt - 1).min(16);
        let base = self.initial_backoff.saturating_mul(factor).min(self.max_backoff);
        let jitter_ms = (base.as_millis() as u64) / 4;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(E::timed_out(policy.timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let wait = policy.backoff(attempt);
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "[Retry] {} failed; retrying in {:?}",
                    label,
                    wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
