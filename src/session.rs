//! Control loop: the only stateful component.
//!
//! One session drives capture -> encode -> decide -> act -> record until
//! the goal is achieved or a budget is exhausted:
//!
//! `INIT -> ITERATING -> {GOAL_ACHIEVED, BUDGET_EXHAUSTED, FATAL_ERROR} -> SEALED`
//!
//! Loop counters and the last-action clock live in an explicit state
//! value, never in globals, so the loop is restartable and testable with
//! injected fakes for the device, the decision provider, and the
//! recorder.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::LoopConfig;
use crate::device::DeviceControl;
use crate::frame::{encode_frame, EncodedFrame};
use crate::llm::schema::UiAction;
use crate::llm::{decide_with_retry, DecisionInput, DecisionProvider, RetryPolicy};
use crate::report::Recorder;

/// Terminal cause of one session, each with a plain-language reason that
/// ends up in the sealed report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    GoalAchieved { steps: u32 },
    BudgetExhausted { steps: u32 },
    FatalError { reason: String },
    Cancelled { steps: u32 },
}

impl Termination {
    pub fn reason(&self) -> String {
        match self {
            Self::GoalAchieved { steps } => format!("goal achieved after {steps} step(s)"),
            Self::BudgetExhausted { steps } => {
                format!("iteration budget exhausted after {steps} step(s)")
            }
            Self::FatalError { reason } => format!("fatal error: {reason}"),
            Self::Cancelled { steps } => format!("cancelled by operator after {steps} step(s)"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::GoalAchieved { .. })
    }
}

/// Outcome handed back to the caller once the session is sealed.
#[derive(Debug)]
pub struct SessionOutcome {
    pub termination: Termination,
    pub steps: u32,
    /// Set when sealing the report failed; the session still terminated.
    pub seal_failed: bool,
}

/// Per-session mutable state, passed through each iteration.
struct LoopState {
    step: u32,
    last_action_at: Instant,
}

pub struct SessionRunner<'a> {
    device: &'a dyn DeviceControl,
    provider: &'a dyn DecisionProvider,
    recorder: &'a mut dyn Recorder,
    config: LoopConfig,
    cancel: CancellationToken,
}

impl<'a> SessionRunner<'a> {
    pub fn new(
        device: &'a dyn DeviceControl,
        provider: &'a dyn DecisionProvider,
        recorder: &'a mut dyn Recorder,
        config: LoopConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            device,
            provider,
            recorder,
            config,
            cancel,
        }
    }

    /// Run one session to its terminal state, then seal the report.
    ///
    /// `seal` is invoked exactly once here, whichever terminal state was
    /// reached; a seal failure is reported in the outcome but does not
    /// mask the termination cause.
    pub async fn run(mut self, goal: &str) -> SessionOutcome {
        info!(goal, model = self.provider.model(), "session started");
        let mut state = LoopState {
            step: 0,
            last_action_at: Instant::now(),
        };

        let termination = self.drive(goal, &mut state).await;
        info!(reason = %termination.reason(), "session terminated");

        let seal_failed = match self.recorder.seal(&termination.reason()) {
            Ok(()) => false,
            Err(err) => {
                error!(error = %err, "failed to seal session report");
                true
            }
        };

        SessionOutcome {
            steps: state.step,
            termination,
            seal_failed,
        }
    }

    async fn drive(&mut self, goal: &str, state: &mut LoopState) -> Termination {
        let retry_policy = RetryPolicy {
            max_attempts: self.config.decision_attempts,
            base_delay: self.config.decision_backoff_base,
            max_delay: self.config.decision_backoff_max,
        };

        loop {
            if self.cancel.is_cancelled() {
                return Termination::Cancelled { steps: state.step };
            }
            if state.step >= self.config.max_steps {
                return Termination::BudgetExhausted { steps: state.step };
            }
            state.step += 1;
            info!(step = state.step, "iteration started");

            let (frame, hierarchy) = match self.observe().await {
                Ok(observed) => observed,
                Err(reason) => return Termination::FatalError { reason },
            };

            // Latency-based UX signal, recomputed every iteration and
            // injected into this decision call only.
            let elapsed = state.last_action_at.elapsed();
            let ux_signal = if elapsed >= self.config.latency_threshold {
                let signal = format!(
                    "HIGH LATENCY DETECTED: {} ms since the previous action. The app may be slow or unresponsive.",
                    elapsed.as_millis()
                );
                warn!(elapsed_ms = elapsed.as_millis() as u64, "high latency observed");
                Some(signal)
            } else {
                None
            };

            let input = DecisionInput {
                goal,
                frame: &frame,
                hierarchy: &hierarchy,
                ux_signal: ux_signal.as_deref(),
            };
            let decision = match decide_with_retry(self.provider, &input, &retry_policy).await {
                Ok(decision) => decision,
                Err(err) => {
                    return Termination::FatalError {
                        reason: format!("decision engine failed: {err}"),
                    }
                }
            };
            info!(
                step = state.step,
                action = %decision.action.summary(),
                ux_status = decision.ux_audit.status.as_str(),
                goal_achieved = decision.goal_achieved,
                "decision received"
            );

            if let Err(err) = self.recorder.record_step(
                state.step,
                &decision.action,
                &decision.reasoning,
                &decision.ux_audit,
            ) {
                return Termination::FatalError {
                    reason: format!("session log append failed: {err}"),
                };
            }

            // Action failures are not fatal: the model observes the
            // unchanged screen on the next iteration and adjusts.
            if let Err(err) = self.execute(&decision.action).await {
                warn!(error = %err, "action execution failed, continuing");
            }
            state.last_action_at = Instant::now();

            if decision.goal_achieved {
                return Termination::GoalAchieved { steps: state.step };
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Termination::Cancelled { steps: state.step };
                }
                _ = tokio::time::sleep(self.config.settle_delay) => {}
            }
        }
    }

    /// Capture, encode, and dump the hierarchy, with bounded retries.
    /// Exhaustion is fatal to the session.
    async fn observe(&self) -> Result<(EncodedFrame, String), String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_observe().await {
                Ok(observed) => return Ok(observed),
                Err(reason) if attempt >= self.config.device_attempts => return Err(reason),
                Err(reason) => {
                    warn!(attempt, reason = %reason, "device observation failed, retrying");
                    tokio::time::sleep(self.config.device_retry_pause).await;
                }
            }
        }
    }

    async fn try_observe(&self) -> Result<(EncodedFrame, String), String> {
        let raw = self
            .device
            .capture_screen()
            .await
            .map_err(|err| format!("screen capture failed: {err}"))?;
        let frame = encode_frame(&raw, self.config.frame_max_edge, self.config.frame_quality)
            .map_err(|err| format!("frame encoding failed: {err}"))?;
        let hierarchy = self
            .device
            .get_hierarchy()
            .await
            .map_err(|err| format!("hierarchy dump failed: {err}"))?;
        Ok((frame, hierarchy))
    }

    /// Action variants map one-to-one onto device controller calls.
    async fn execute(&self, action: &UiAction) -> Result<(), crate::errors::DeviceError> {
        match action {
            UiAction::Tap { text } => self.device.tap(text).await,
            UiAction::TapPoint { x, y } => self.device.tap_point(*x, *y).await,
            UiAction::InputText { text } => self.device.input_text(text).await,
            UiAction::GoBack => self.device.go_back().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_reasons_are_plain_language() {
        assert_eq!(
            Termination::GoalAchieved { steps: 3 }.reason(),
            "goal achieved after 3 step(s)"
        );
        assert_eq!(
            Termination::BudgetExhausted { steps: 50 }.reason(),
            "iteration budget exhausted after 50 step(s)"
        );
        assert!(Termination::FatalError {
            reason: "device gone".into()
        }
        .reason()
        .contains("device gone"));
        assert!(Termination::Cancelled { steps: 1 }
            .reason()
            .contains("cancelled"));
    }

    #[test]
    fn only_goal_achieved_is_success() {
        assert!(Termination::GoalAchieved { steps: 1 }.is_success());
        assert!(!Termination::BudgetExhausted { steps: 1 }.is_success());
        assert!(!Termination::Cancelled { steps: 0 }.is_success());
    }
}
