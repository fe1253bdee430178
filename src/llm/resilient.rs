//! Retry with exponential backoff for calls to overloaded model providers.
//!
//! Every generation and embedding call goes through [`ResilientInvoker`];
//! nothing else in the crate retries on its own.

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;

use super::types::UpstreamError;
use crate::core::config::RagSettings;

static OVERLOAD_PATTERN: OnceLock<Regex> = OnceLock::new();

fn overload_pattern() -> &'static Regex {
    OVERLOAD_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)overload|unavailable|temporarily|busy|503").expect("valid regex")
    })
}

/// True when the error means "try again later" rather than "this will never work".
pub fn is_transient_overload<E: UpstreamError + ?Sized>(err: &E) -> bool {
    if err.status_code() == Some(503) {
        return true;
    }
    if err
        .status_text()
        .is_some_and(|text| text.eq_ignore_ascii_case("UNAVAILABLE"))
    {
        return true;
    }
    overload_pattern().is_match(&err.to_string())
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(600),
            max_jitter: Duration::from_millis(200),
        }
    }
}

impl From<&RagSettings> for RetryPolicy {
    fn from(settings: &RagSettings) -> Self {
        Self {
            retries: settings.retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_jitter: Duration::from_millis(settings.max_jitter_ms),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResilientInvoker {
    policy: RetryPolicy,
}

impl ResilientInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Runs `call`, retrying transient-overload failures with backoff.
    ///
    /// Non-transient errors are returned after the first attempt. Once the
    /// retries are used up the last error is returned unchanged. Only the
    /// calling task sleeps between attempts.
    pub async fn invoke<T, E, F, Fut>(&self, label: &str, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: UpstreamError,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.policy.retries || !is_transient_overload(&err) {
                        return Err(err);
                    }

                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        "{} overloaded (attempt {}/{}), retrying in {}ms: {}",
                        label,
                        attempt,
                        self.policy.retries,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// `base * 2^(attempt-1) + jitter`, for `attempt >= 1`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.policy.base_delay.saturating_mul(1u32 << exponent);
        backoff + jitter(self.policy.max_jitter)
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_ms))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::llm::LlmError;

    fn overloaded() -> LlmError {
        LlmError::status("gemini", 503, "The model is overloaded.")
    }

    #[test]
    fn classifies_transient_overload() {
        assert!(is_transient_overload(&overloaded()));
        assert!(is_transient_overload(&LlmError::Status {
            provider: "gemini".into(),
            status: 500,
            code: Some("unavailable".into()),
            message: "backend".into(),
        }));
        assert!(is_transient_overload(&LlmError::transport(
            "openai",
            "server is temporarily down"
        )));
        assert!(is_transient_overload(&LlmError::status("openai", 429, "Server BUSY")));

        assert!(!is_transient_overload(&LlmError::status(
            "gemini",
            400,
            "API key not valid"
        )));
        assert!(!is_transient_overload(&LlmError::malformed("gemini", "no candidates")));
    }

    #[test]
    fn backoff_doubles_per_attempt_within_jitter() {
        let invoker = ResilientInvoker::default();
        for (attempt, base) in [(1u32, 600u64), (2, 1200), (3, 2400)] {
            let delay = invoker.backoff_delay(attempt).as_millis() as u64;
            assert!(delay >= base && delay < base + 200, "attempt {attempt}: {delay}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let invoker = ResilientInvoker::default();
        let calls = AtomicUsize::new(0);

        let result: Result<&str, LlmError> = invoker
            .invoke("generate", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(overloaded())
                    } else {
                        Ok("SELECT 1")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "SELECT 1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_error_propagates_immediately() {
        let invoker = ResilientInvoker::default();
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<(), LlmError> = invoker
            .invoke("generate", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::status("gemini", 400, "invalid argument")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_last_error() {
        let invoker = ResilientInvoker::new(RetryPolicy {
            retries: 2,
            base_delay: Duration::from_millis(100),
            max_jitter: Duration::ZERO,
        });
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<(), LlmError> = invoker
            .invoke("embed", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(LlmError::status("gemini", 503, format!("overloaded #{n}"))) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("overloaded #2"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(310));
    }

    #[tokio::test(start_paused = true)]
    async fn first_retry_waits_at_least_base_delay() {
        let invoker = ResilientInvoker::default();
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let _: Result<(), LlmError> = invoker
            .invoke("generate", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(overloaded())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(600));
        assert!(elapsed < Duration::from_millis(800));
    }
}
