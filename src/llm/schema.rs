//! Decision wire contract.
//!
//! The model must reply with a single JSON object; this module turns the
//! raw payload into a well-formed [`Decision`] or a typed validation
//! error. A decision is either fully trusted or invalid, never partially
//! parsed and trusted downstream.

use serde::Deserialize;

use crate::errors::DecisionError;

/// Raw payload as the model emits it. Field presence and types are
/// enforced here by serde; semantic consistency (action parameters,
/// status values) is enforced by [`decision_from_payload`].
#[derive(Debug, Deserialize)]
pub struct DecisionPayload {
    pub reasoning: String,
    pub action: ActionPayload,
    pub ux_audit: UxAuditPayload,
    pub goal_achieved: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub x: Option<i64>,
    #[serde(default)]
    pub y: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UxAuditPayload {
    pub status: String,
    #[serde(default)]
    pub issue: Option<String>,
}

/// One UI action, parameters already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    /// Tap an element by its visible text.
    Tap { text: String },
    /// Tap a screen coordinate.
    TapPoint { x: i64, y: i64 },
    /// Type text into the focused field.
    InputText { text: String },
    /// Hardware back action.
    GoBack,
}

impl UiAction {
    /// One-line summary for the session report.
    pub fn summary(&self) -> String {
        match self {
            Self::Tap { text } => format!("Tapped '{text}'"),
            Self::TapPoint { x, y } => format!("Tapped point ({x}, {y})"),
            Self::InputText { text } => format!("Entered text: '{text}'"),
            Self::GoBack => "Pressed Back button".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UxStatus {
    Pass,
    Fail,
}

impl UxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UxAudit {
    pub status: UxStatus,
    pub issue: Option<String>,
}

/// One well-formed model decision.
#[derive(Debug, Clone)]
pub struct Decision {
    pub reasoning: String,
    pub action: UiAction,
    pub ux_audit: UxAudit,
    pub goal_achieved: bool,
}

/// Parse a JSON string into a decision, classifying every defect as
/// [`DecisionError::InvalidDecision`] so the caller's retry path handles
/// malformed output and inconsistent parameters the same way.
pub fn decision_from_json(json: &str) -> Result<Decision, DecisionError> {
    let payload: DecisionPayload = serde_json::from_str(json)
        .map_err(|err| DecisionError::invalid(format!("decision JSON rejected: {err}")))?;
    decision_from_payload(payload)
}

pub fn decision_from_payload(payload: DecisionPayload) -> Result<Decision, DecisionError> {
    let action = action_from_payload(&payload.action)?;

    let status = match payload.ux_audit.status.as_str() {
        "PASS" => UxStatus::Pass,
        "FAIL" => UxStatus::Fail,
        other => {
            return Err(DecisionError::invalid(format!(
                "unknown ux_audit status `{other}`"
            )))
        }
    };
    let issue = payload
        .ux_audit
        .issue
        .filter(|issue| !issue.trim().is_empty());

    Ok(Decision {
        reasoning: payload.reasoning,
        action,
        ux_audit: UxAudit { status, issue },
        goal_achieved: payload.goal_achieved,
    })
}

fn action_from_payload(payload: &ActionPayload) -> Result<UiAction, DecisionError> {
    match payload.kind.as_str() {
        "tap" => {
            let text = require_value(payload, "tap")?;
            Ok(UiAction::Tap { text })
        }
        "tap_point" => match (payload.x, payload.y) {
            (Some(x), Some(y)) => Ok(UiAction::TapPoint { x, y }),
            _ => Err(DecisionError::invalid(
                "action `tap_point` requires both `x` and `y`",
            )),
        },
        "input_text" => {
            let text = require_value(payload, "input_text")?;
            Ok(UiAction::InputText { text })
        }
        "go_back" => Ok(UiAction::GoBack),
        other => Err(DecisionError::invalid(format!(
            "unknown action type `{other}`"
        ))),
    }
}

fn require_value(payload: &ActionPayload, kind: &str) -> Result<String, DecisionError> {
    match payload.value.as_deref() {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(DecisionError::invalid(format!(
            "action `{kind}` requires a non-empty `value`"
        ))),
    }
}
