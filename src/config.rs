//! Configuration surface for the agent.
//!
//! Everything tunable lives here: provider selection and credentials,
//! frame sizing, latency threshold, settle delay, iteration budget and
//! retry ceilings. The session loop itself hardcodes none of these.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while resolving configuration, before any device
/// interaction happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("unsupported provider `{0}` (expected `openai` or `anthropic`)")]
    UnknownProvider(String),

    #[error("invalid value for {name}: {detail}")]
    Invalid { name: &'static str, detail: String },
}

/// Vision-model vendor backing the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Anthropic => "claude-sonnet-4-20250514",
        }
    }

    fn default_api_base(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    fn key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn model_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_MODEL",
            Self::Anthropic => "ANTHROPIC_MODEL",
        }
    }

    fn base_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_BASE_URL",
            Self::Anthropic => "ANTHROPIC_BASE_URL",
        }
    }
}

/// Connection settings for one decision-engine provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Deadline for one model call; the retry combinator sits above this.
    pub timeout: Duration,
}

impl ProviderSettings {
    /// Resolve provider settings from CLI overrides and the environment.
    ///
    /// Precedence: CLI flag, then environment variable, then the
    /// provider default. A missing API key is a hard error.
    pub fn resolve(
        provider_flag: Option<&str>,
        model_flag: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let provider = match provider_flag {
            Some(value) => Provider::parse(value)?,
            None => match env::var("UXPILOT_PROVIDER") {
                Ok(value) => Provider::parse(&value)?,
                Err(_) => Provider::OpenAi,
            },
        };

        let api_key = env::var(provider.key_env())
            .map_err(|_| ConfigError::MissingEnv(provider.key_env()))?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingEnv(provider.key_env()));
        }

        let model = model_flag
            .map(str::to_string)
            .or_else(|| env::var(provider.model_env()).ok())
            .unwrap_or_else(|| provider.default_model().to_string());

        let api_base = env::var(provider.base_env())
            .unwrap_or_else(|_| provider.default_api_base().to_string());

        Ok(Self {
            provider,
            api_key,
            model,
            api_base,
            temperature: 0.1,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        })
    }
}

/// Knobs for the control loop and the components it drives.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Iteration budget before the session stops as exhausted.
    /// Default: 50
    pub max_steps: u32,

    /// Elapsed time since the last action above which a high-latency
    /// UX signal is injected into the next decision call.
    /// Default: 5 s
    pub latency_threshold: Duration,

    /// Pause after executing an action, before the next capture.
    /// Default: 2 s
    pub settle_delay: Duration,

    /// Bounded attempts for the capture/encode/hierarchy phase before
    /// the failure is fatal to the session.
    /// Default: 2
    pub device_attempts: u32,

    /// Pause between device attempts.
    /// Default: 1 s
    pub device_retry_pause: Duration,

    /// Attempt ceiling for one decision, counting the first call.
    /// Default: 3
    pub decision_attempts: u32,

    /// Base delay for exponential backoff between decision attempts.
    /// Default: 2 s
    pub decision_backoff_base: Duration,

    /// Cap on the backoff delay.
    /// Default: 10 s
    pub decision_backoff_max: Duration,

    /// Longest edge of the encoded frame sent to the model, in pixels.
    /// Smaller screenshots pass through untouched.
    /// Default: 1024
    pub frame_max_edge: u32,

    /// JPEG quality for the encoded frame (1-100).
    /// Default: 85
    pub frame_quality: u8,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            latency_threshold: Duration::from_secs(5),
            settle_delay: Duration::from_secs(2),
            device_attempts: 2,
            device_retry_pause: Duration::from_secs(1),
            decision_attempts: 3,
            decision_backoff_base: Duration::from_secs(2),
            decision_backoff_max: Duration::from_secs(10),
            frame_max_edge: 1024,
            frame_quality: 85,
        }
    }
}

impl LoopConfig {
    /// Fast knobs for tests: tiny budgets and near-zero pauses.
    pub fn minimal() -> Self {
        Self {
            max_steps: 5,
            latency_threshold: Duration::from_secs(5),
            settle_delay: Duration::from_millis(1),
            device_attempts: 2,
            device_retry_pause: Duration::from_millis(1),
            decision_attempts: 3,
            decision_backoff_base: Duration::from_millis(1),
            decision_backoff_max: Duration::from_millis(4),
            frame_max_edge: 1024,
            frame_quality: 85,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid {
                name: "max_steps",
                detail: "must be at least 1".to_string(),
            });
        }
        if self.frame_quality == 0 || self.frame_quality > 100 {
            return Err(ConfigError::Invalid {
                name: "frame_quality",
                detail: format!("{} is outside 1-100", self.frame_quality),
            });
        }
        if self.decision_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "decision_attempts",
                detail: "must be at least 1".to_string(),
            });
        }
        if self.device_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "device_attempts",
                detail: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Full agent configuration: one provider, one device, one session.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub provider: ProviderSettings,
    pub loop_config: LoopConfig,
    /// Deadline for one automation command (capture uses a shorter one).
    pub command_timeout: Duration,
    pub capture_timeout: Duration,
    pub reports_dir: PathBuf,
}

impl AgentConfig {
    pub fn new(provider: ProviderSettings, loop_config: LoopConfig, reports_dir: PathBuf) -> Self {
        Self {
            provider,
            loop_config,
            command_timeout: Duration::from_secs(30),
            capture_timeout: Duration::from_secs(10),
            reports_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_accepts_known_vendors() {
        assert_eq!(Provider::parse("openai").unwrap(), Provider::OpenAi);
        assert_eq!(Provider::parse("Anthropic").unwrap(), Provider::Anthropic);
        assert_eq!(Provider::parse("claude").unwrap(), Provider::Anthropic);
        assert!(Provider::parse("gemini").is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = LoopConfig::default();
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.latency_threshold, Duration::from_secs(5));
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.decision_attempts, 3);
        assert_eq!(config.frame_max_edge, 1024);
        assert_eq!(config.frame_quality, 85);
    }

    #[test]
    fn validate_rejects_zero_budget_and_bad_quality() {
        let mut config = LoopConfig::default();
        config.max_steps = 0;
        assert!(config.validate().is_err());

        let mut config = LoopConfig::default();
        config.frame_quality = 0;
        assert!(config.validate().is_err());

        let mut config = LoopConfig::default();
        config.frame_quality = 101;
        assert!(config.validate().is_err());

        assert!(LoopConfig::default().validate().is_ok());
    }
}
