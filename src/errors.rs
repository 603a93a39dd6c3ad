use std::time::Duration;
use thiserror::Error;

/// Errors raised by the device controller.
///
/// Every variant carries the name of the failed operation and whatever
/// diagnostic output the external tool produced, verbatim. The controller
/// never retries on its own; retry policy belongs to the session loop.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The external command exited non-zero.
    #[error("device command `{op}` failed: {detail}")]
    CommandFailed { op: &'static str, detail: String },

    /// The external command did not finish within its deadline.
    #[error("device command `{op}` timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    /// The external binary could not be started at all.
    #[error("failed to spawn device command `{op}`: {source}")]
    Spawn {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The command succeeded but returned nothing usable.
    #[error("device command `{op}` produced no output")]
    EmptyOutput { op: &'static str },
}

/// Errors raised by the decision engine.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// Transient transport failure: connect error, timeout, 429 or 5xx.
    #[error("model transport failure: {0}")]
    Transport(String),

    /// The model replied, but the payload is not a well-formed decision.
    #[error("invalid decision payload: {0}")]
    InvalidDecision(String),

    /// The provider rejected the request outright (bad key, bad model).
    /// Retrying will not help.
    #[error("model request rejected: {0}")]
    Rejected(String),

    /// Bounded retries were exhausted without a well-formed decision.
    #[error("decision retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl DecisionError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidDecision(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Whether the retry combinator should attempt the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::InvalidDecision(_))
    }
}

/// Errors raised by the session recorder. A failed append is isolated:
/// previously written steps are never lost or rewritten.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to create session report at {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append step {index} to session report: {source}")]
    Append {
        index: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to seal session report: {source}")]
    Seal {
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_invalid_are_retryable() {
        assert!(DecisionError::transport("timed out").is_retryable());
        assert!(DecisionError::invalid("missing field").is_retryable());
    }

    #[test]
    fn rejection_and_exhaustion_are_terminal() {
        assert!(!DecisionError::rejected("401 unauthorized").is_retryable());
        assert!(!DecisionError::Exhausted {
            attempts: 3,
            last: "invalid JSON".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn device_error_carries_operation_and_diagnostics() {
        let err = DeviceError::CommandFailed {
            op: "capture_screen",
            detail: "error: no devices/emulators found".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("capture_screen"));
        assert!(rendered.contains("no devices/emulators found"));
    }
}
