//! Prompt assembly for the decision engine. The system prompt fixes the
//! agent's role and the exact output schema; the user turn carries the
//! goal, the optional UX signal, and the (bounded) UI hierarchy.

use std::borrow::Cow;

use super::DecisionInput;

/// Hierarchies beyond this are truncated before transport to keep token
/// usage bounded.
pub const MAX_HIERARCHY_CHARS: usize = 10_000;

const SYSTEM_PROMPT: &str = r#"You are an autonomous mobile QA agent. You analyze mobile app screenshots and UI hierarchies to progress toward a user-specified goal while auditing the user experience.

## Your Responsibilities:
1. Analyze the current screen state from the screenshot and the UI hierarchy
2. Decide the single next action to progress toward the goal
3. Detect UX issues (broken UI, confusing layouts, inaccessible controls)
4. Determine whether the goal has been achieved

## Available Actions:
- tap: tap an element by its visible text (requires "value")
- tap_point: tap specific coordinates (requires "x" and "y")
- input_text: type text into the focused field (requires "value")
- go_back: press the hardware back button

## Response Format:
Respond with a single valid JSON object and nothing else:

{
    "reasoning": "What you see and why you chose this action",
    "action": { "type": "tap|tap_point|input_text|go_back", "value": "...", "x": 0, "y": 0 },
    "ux_audit": { "status": "PASS|FAIL", "issue": "Description of the UX issue, or null" },
    "goal_achieved": false
}

## UX Audit Guidelines:
- PASS: the screen looks correct and usable
- FAIL: broken layout, overlapping elements, inaccessible controls, crash indicators, or a latency problem reported in the context

## Rules:
1. Analyze the screenshot carefully before deciding
2. Be specific in your reasoning; name the UI elements you see
3. Use the UI hierarchy for accurate element identification
4. If you are stuck in a loop, try a different approach (go_back, a different tap target)
5. When the goal is achieved, set goal_achieved to true"#;

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn build_user_prompt(&self, input: &DecisionInput<'_>) -> String {
        let mut sections = Vec::new();
        sections.push(format!("## Current Goal:\n{}", input.goal.trim()));

        if let Some(signal) = input.ux_signal {
            sections.push(format!("## Context:\n{signal}"));
        }

        if !input.hierarchy.trim().is_empty() {
            sections.push(format!(
                "## UI Hierarchy:\n```\n{}\n```",
                truncate_hierarchy(input.hierarchy)
            ));
        }

        sections.push(
            "## Instructions:\nAnalyze the screenshot and hierarchy above. Respond with JSON only."
                .to_string(),
        );

        sections.join("\n\n")
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_hierarchy(hierarchy: &str) -> Cow<'_, str> {
    if hierarchy.len() <= MAX_HIERARCHY_CHARS {
        return Cow::Borrowed(hierarchy);
    }
    let mut cut = MAX_HIERARCHY_CHARS;
    while !hierarchy.is_char_boundary(cut) {
        cut -= 1;
    }
    Cow::Owned(format!("{}\n... [truncated]", &hierarchy[..cut]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::EncodedFrame;

    fn frame() -> EncodedFrame {
        EncodedFrame {
            base64: "AAAA".to_string(),
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn user_prompt_includes_goal_and_hierarchy() {
        let frame = frame();
        let input = DecisionInput {
            goal: "tap Login",
            frame: &frame,
            hierarchy: "<node text=\"Login\"/>",
            ux_signal: None,
        };
        let prompt = PromptBuilder::new().build_user_prompt(&input);
        assert!(prompt.contains("tap Login"));
        assert!(prompt.contains("<node text=\"Login\"/>"));
        assert!(!prompt.contains("## Context:"));
    }

    #[test]
    fn ux_signal_lands_in_context_section() {
        let frame = frame();
        let input = DecisionInput {
            goal: "tap Login",
            frame: &frame,
            hierarchy: "",
            ux_signal: Some("High latency detected: 6200 ms since the previous action."),
        };
        let prompt = PromptBuilder::new().build_user_prompt(&input);
        assert!(prompt.contains("## Context:"));
        assert!(prompt.contains("High latency detected"));
    }

    #[test]
    fn oversized_hierarchy_is_truncated() {
        let frame = frame();
        let hierarchy = "x".repeat(MAX_HIERARCHY_CHARS + 500);
        let input = DecisionInput {
            goal: "g",
            frame: &frame,
            hierarchy: &hierarchy,
            ux_signal: None,
        };
        let prompt = PromptBuilder::new().build_user_prompt(&input);
        assert!(prompt.contains("... [truncated]"));
        assert!(prompt.len() < hierarchy.len());
    }
}
