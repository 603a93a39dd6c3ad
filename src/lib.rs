//! UXPilot - autonomous mobile QA and UX audit agent.
//!
//! Drives a mobile application under test by repeatedly capturing the
//! screen, asking a vision-capable LLM for the next UI action and a UX
//! assessment, executing that action on the attached device, and logging
//! every step to an append-only session report.

pub mod config;
pub mod device;
pub mod errors;
pub mod frame;
pub mod llm;
pub mod preflight;
pub mod report;
pub mod session;

pub use config::{AgentConfig, ConfigError, LoopConfig, Provider, ProviderSettings};
pub use errors::{DecisionError, DeviceError, RecorderError};
pub use llm::schema::{Decision, UiAction, UxAudit, UxStatus};
pub use session::{SessionOutcome, SessionRunner, Termination};
