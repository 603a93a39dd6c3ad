//! Decision engine: provider abstraction, prompt assembly, and the
//! bounded-retry combinator around one model call. This component never
//! touches the device and never writes the session log.

pub mod anthropic;
pub mod openai;
pub mod prompt;
pub mod schema;
mod utils;

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{Provider, ProviderSettings};
use crate::errors::DecisionError;
use crate::frame::EncodedFrame;
use self::schema::Decision;

pub use self::anthropic::ClaudeDecisionProvider;
pub use self::openai::OpenAiDecisionProvider;

/// Everything one decision call needs. The frame is consumed once and
/// never persisted.
#[derive(Debug)]
pub struct DecisionInput<'a> {
    pub goal: &'a str,
    pub frame: &'a EncodedFrame,
    pub hierarchy: &'a str,
    /// Optional annotation computed by the control loop, e.g. a
    /// high-latency observation, injected for this call only.
    pub ux_signal: Option<&'a str>,
}

/// Abstraction over vision-model vendors so at least two providers are
/// interchangeable behind configuration.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// One model call: screenshot + hierarchy + goal in, one validated
    /// decision out. Transport and validation failures are classified by
    /// [`DecisionError::is_retryable`]; retrying is the caller's job.
    async fn decide(&self, input: &DecisionInput<'_>) -> Result<Decision, DecisionError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

/// Build the configured provider.
pub fn create_provider(
    settings: &ProviderSettings,
) -> Result<Box<dyn DecisionProvider>, DecisionError> {
    match settings.provider {
        Provider::OpenAi => Ok(Box::new(OpenAiDecisionProvider::new(settings.clone())?)),
        Provider::Anthropic => Ok(Box::new(ClaudeDecisionProvider::new(settings.clone())?)),
    }
}

/// Bounded exponential backoff policy for decision retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt ceiling, counting the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based): base,
    /// 2*base, 4*base, ... capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Call the provider until it yields a well-formed decision, retrying
/// retryable failures up to the policy's attempt ceiling. Retry here is
/// ordinary control flow: a malformed payload means "ask again", not a
/// program fault.
pub async fn decide_with_retry(
    provider: &dyn DecisionProvider,
    input: &DecisionInput<'_>,
    policy: &RetryPolicy,
) -> Result<Decision, DecisionError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match provider.decide(input).await {
            Ok(decision) => return Ok(decision),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= policy.max_attempts => {
                return Err(DecisionError::Exhausted {
                    attempts: attempt,
                    last: err.to_string(),
                })
            }
            Err(err) => {
                let delay = policy.delay_after(attempt);
                warn!(attempt, ?delay, error = %err, "decision attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::schema::{UiAction, UxAudit, UxStatus};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedProvider {
        calls: AtomicU32,
        fail_first: u32,
        error: fn() -> DecisionError,
    }

    impl ScriptedProvider {
        fn new(fail_first: u32, error: fn() -> DecisionError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
                error,
            }
        }
    }

    #[async_trait]
    impl DecisionProvider for ScriptedProvider {
        async fn decide(&self, _input: &DecisionInput<'_>) -> Result<Decision, DecisionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                return Err((self.error)());
            }
            Ok(Decision {
                reasoning: format!("attempt {call}"),
                action: UiAction::GoBack,
                ux_audit: UxAudit {
                    status: UxStatus::Pass,
                    issue: None,
                },
                goal_achieved: false,
            })
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn test_input<'a>(frame: &'a EncodedFrame) -> DecisionInput<'a> {
        DecisionInput {
            goal: "goal",
            frame,
            hierarchy: "",
            ux_signal: None,
        }
    }

    fn fixture_frame() -> EncodedFrame {
        EncodedFrame {
            base64: "AAAA".to_string(),
            width: 1,
            height: 1,
        }
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_after_invalid_payloads() {
        let provider = ScriptedProvider::new(2, || DecisionError::invalid("malformed"));
        let frame = fixture_frame();
        let decision = decide_with_retry(&provider, &test_input(&frame), &test_policy())
            .await
            .unwrap();
        assert_eq!(decision.reasoning, "attempt 3");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_ceiling() {
        let provider = ScriptedProvider::new(10, || DecisionError::transport("503"));
        let frame = fixture_frame();
        let err = decide_with_retry(&provider, &test_input(&frame), &test_policy())
            .await
            .unwrap_err();
        match err {
            DecisionError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let provider = ScriptedProvider::new(10, || DecisionError::rejected("401"));
        let frame = fixture_frame();
        let err = decide_with_retry(&provider, &test_input(&frame), &test_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, DecisionError::Rejected(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(4), Duration::from_secs(10));
    }
}
