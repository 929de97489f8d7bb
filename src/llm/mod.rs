// file: src/llm/mod.rs
// description: completion gateway with bounded retry, timeout and backpressure
// reference: semaphore-bounded upstream concurrency, exponential backoff

pub mod api;

pub use api::{ApiFailure, CompletionApi, CompletionRequest, HttpCompletionApi, RawCompletion};

use crate::config::LlmConfig;
use crate::context::Prompt;
use crate::error::{RagError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const BACKOFF_BASE_MS: u64 = 200;
/// 200ms << 7 = 25.6s; longer waits add nothing for a per-request retry loop.
const MAX_BACKOFF_EXPONENT: usize = 7;

/// Fronts the remote completion model. Concurrency is capped at
/// `max_concurrent` in-flight requests; up to `queue_depth` more may wait,
/// and anything beyond that fails fast with `Backpressure`.
pub struct LlmGateway<A: CompletionApi> {
    api: A,
    config: LlmConfig,
    queue: Arc<Semaphore>,
    active: Arc<Semaphore>,
}

impl<A: CompletionApi> LlmGateway<A> {
    pub fn new(api: A, config: LlmConfig) -> Self {
        let queue = Arc::new(Semaphore::new(config.max_concurrent + config.queue_depth));
        let active = Arc::new(Semaphore::new(config.max_concurrent));

        Self {
            api,
            config,
            queue,
            active,
        }
    }

    /// Send the rendered prompt upstream. Transient failures (timeout, 429,
    /// 5xx) are retried with exponential backoff for at most
    /// `max_retries` attempts total; client errors surface immediately.
    pub async fn complete(&self, prompt: &Prompt) -> Result<RawCompletion> {
        self.complete_text(&prompt.render()).await
    }

    /// Same admission, timeout and retry policy for a pre-rendered prompt,
    /// used by operations that do not go through context assembly.
    pub async fn complete_text(&self, prompt_text: &str) -> Result<RawCompletion> {
        let _queued = self
            .queue
            .clone()
            .try_acquire_owned()
            .map_err(|_| RagError::Backpressure)?;

        let _active = self
            .active
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RagError::Backpressure)?;

        let request = CompletionRequest {
            prompt_text: prompt_text.to_string(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let max_attempts = self.config.max_retries.max(1);
        let attempt_timeout = Duration::from_secs(self.config.timeout_seconds);
        let mut last_failure = String::new();

        for attempt in 1..=max_attempts {
            debug!(attempt, max_attempts, "Dispatching completion request");

            let outcome =
                tokio::time::timeout(attempt_timeout, self.api.complete(&request)).await;

            match outcome {
                Ok(Ok(completion)) => {
                    debug!(
                        finish_reason = completion.finish_reason.as_deref().unwrap_or("unknown"),
                        "Completion received"
                    );
                    return Ok(completion);
                }
                Ok(Err(ApiFailure::Fatal { status, message })) => {
                    return Err(RagError::UpstreamRejected { status, message });
                }
                Ok(Err(ApiFailure::Transient(message))) => {
                    warn!(attempt, "Transient completion failure: {}", message);
                    last_failure = message;
                }
                Err(_) => {
                    warn!(
                        attempt,
                        "Completion attempt timed out after {}s", self.config.timeout_seconds
                    );
                    last_failure =
                        format!("timed out after {}s", self.config.timeout_seconds);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }

        Err(RagError::UpstreamUnavailable {
            attempts: max_attempts,
            message: last_failure,
        })
    }
}

/// Exponential backoff after the given 1-based attempt, capped so that an
/// arbitrarily large retry budget cannot overflow the shift.
fn backoff_delay(attempt: usize) -> Duration {
    let exponent = (attempt - 1).min(MAX_BACKOFF_EXPONENT) as u32;
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(1 << exponent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Prompt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn test_prompt() -> Prompt {
        Prompt {
            system: "system".to_string(),
            context: Vec::new(),
            history: Vec::new(),
            question: "question".to_string(),
        }
    }

    fn test_config(max_retries: usize, max_concurrent: usize, queue_depth: usize) -> LlmConfig {
        LlmConfig {
            endpoint: "https://example.invalid".to_string(),
            model: "test".to_string(),
            api_key: Some("key".to_string()),
            max_tokens: 64,
            temperature: 0.0,
            timeout_seconds: 5,
            max_retries,
            max_concurrent,
            queue_depth,
        }
    }

    struct ScriptedApi {
        calls: AtomicUsize,
        fail_times: usize,
        failure: ApiFailure,
    }

    impl ScriptedApi {
        fn failing(fail_times: usize, failure: ApiFailure) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_times,
                failure,
            }
        }
    }

    impl CompletionApi for &ScriptedApi {
        async fn complete(&self, _request: &CompletionRequest) -> api::ApiResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                Err(self.failure.clone())
            } else {
                Ok(RawCompletion {
                    text: "ok".to_string(),
                    finish_reason: Some("stop".to_string()),
                })
            }
        }
    }

    struct BlockedApi {
        release: Arc<Notify>,
    }

    impl CompletionApi for BlockedApi {
        async fn complete(&self, _request: &CompletionRequest) -> api::ApiResult {
            self.release.notified().await;
            Ok(RawCompletion {
                text: "ok".to_string(),
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    #[test]
    fn test_backoff_caps_instead_of_overflowing() {
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(2), Duration::from_millis(400));

        // Attempts beyond the cap all wait the same bounded delay; a huge
        // configured retry budget must not panic the shift.
        let cap = backoff_delay(8);
        assert_eq!(cap, Duration::from_millis(200 << 7));
        assert_eq!(backoff_delay(100), cap);
        assert_eq!(backoff_delay(usize::MAX), cap);
    }

    #[tokio::test]
    async fn test_exhausts_retries_on_persistent_503() {
        let api = ScriptedApi::failing(10, ApiFailure::Transient("503".to_string()));
        let gateway = LlmGateway::new(&api, test_config(3, 2, 2));

        let err = gateway.complete(&test_prompt()).await.unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_UNAVAILABLE");
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_recovers_within_retry_budget() {
        let api = ScriptedApi::failing(2, ApiFailure::Transient("502".to_string()));
        let gateway = LlmGateway::new(&api, test_config(3, 2, 2));

        let completion = gateway.complete(&test_prompt()).await.unwrap();
        assert_eq!(completion.text, "ok");
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let api = ScriptedApi::failing(
            10,
            ApiFailure::Fatal {
                status: 400,
                message: "bad request".to_string(),
            },
        );
        let gateway = LlmGateway::new(&api, test_config(3, 2, 2));

        let err = gateway.complete(&test_prompt()).await.unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_REJECTED");
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backpressure_when_queue_full() {
        let release = Arc::new(Notify::new());
        let gateway = Arc::new(LlmGateway::new(
            BlockedApi {
                release: release.clone(),
            },
            test_config(1, 1, 1),
        ));

        let first = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.complete(&test_prompt()).await }
        });
        let second = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.complete(&test_prompt()).await }
        });

        // Let both tasks claim their queue slots before the third arrives.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = gateway.complete(&test_prompt()).await.unwrap_err();
        assert_eq!(err.code(), "BACKPRESSURE");

        // Drain the queued work; keep notifying until both tasks finish,
        // since the second only starts waiting after the first releases.
        while !(first.is_finished() && second.is_finished()) {
            release.notify_waiters();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
    }
}
