//! Starting a generation with bounded retries

use std::time::Duration;

use natter_ai::{FragmentStream, Generator, ModelProfile, Turn};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Open a response stream, retrying transient failures.
///
/// `on_retry` is called with the retry number (starting at 1) and the error
/// before each wait. Non-retryable errors are returned at once; a retryable
/// error on the last attempt becomes [`Error::RetriesExhausted`]. Returns
/// `Ok(None)` when `cancel` fires while connecting or waiting to retry.
pub async fn open_stream(
    generator: &dyn Generator,
    model: &ModelProfile,
    turns: &[Turn],
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut on_retry: impl FnMut(u32, &natter_ai::Error),
) -> Result<Option<FragmentStream>> {
    let mut attempt = 0u32;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            result = generator.stream(model, turns) => result,
        };
        match result {
            Ok(stream) => return Ok(Some(stream)),
            Err(e) if e.is_retryable() => {
                if attempt >= policy.max_retries {
                    return Err(Error::RetriesExhausted {
                        attempts: attempt + 1,
                        source: e,
                    });
                }
                attempt += 1;
                tracing::warn!(
                    "Request failed (retry {}/{}): {}. Retrying in {:?}...",
                    attempt,
                    policy.max_retries,
                    e,
                    policy.delay
                );
                on_retry(attempt, &e);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(None),
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use natter_ai::StreamEvent;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times with the given error, then streams "ok".
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        retryable: bool,
    }

    #[async_trait]
    impl Generator for Flaky {
        async fn stream(&self, _model: &ModelProfile, _turns: &[Turn]) -> natter_ai::Result<FragmentStream> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(if self.retryable {
                    natter_ai::Error::Transient("busy".into())
                } else {
                    natter_ai::Error::InvalidApiKey
                });
            }
            Ok(Box::pin(async_stream::stream! {
                yield StreamEvent::delta("ok");
            }))
        }
    }

    fn instant(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    fn model() -> ModelProfile {
        ModelProfile::new("gpt-4", 8192)
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let generator = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let mut retries = Vec::new();
        let result = open_stream(&generator, &model(), &[], &instant(5), &CancellationToken::new(), |n, _| {
            retries.push(n)
        })
        .await;
        assert!(matches!(result, Ok(Some(_))));
        assert_eq!(retries, vec![1, 2]);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let generator = Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let mut retries = 0;
        let result = open_stream(&generator, &model(), &[], &instant(5), &CancellationToken::new(), |_, _| {
            retries += 1
        })
        .await;
        match result {
            Err(Error::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 6),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected failure"),
        }
        assert_eq!(retries, 5);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let generator = Flaky {
            failures: 1,
            calls: AtomicU32::new(0),
            retryable: false,
        };
        let result = open_stream(&generator, &model(), &[], &instant(5), &CancellationToken::new(), |_, _| {}).await;
        assert!(matches!(result, Err(Error::Ai(natter_ai::Error::InvalidApiKey))));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_retry_wait() {
        let generator = Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let policy = RetryPolicy {
            max_retries: 5,
            delay: Duration::from_secs(3600),
        };
        let cancel = CancellationToken::new();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            open_stream(&generator, &model(), &[], &policy, &cancel, |_, _| cancel.cancel()),
        )
        .await
        .expect("cancel should end the retry wait");
        assert!(matches!(result, Ok(None)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_connect() {
        let generator = Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = open_stream(&generator, &model(), &[], &instant(5), &cancel, |_, _| {}).await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }
}
