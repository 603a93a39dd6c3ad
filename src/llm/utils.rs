/// Pull a JSON object out of model output that may wrap it in markdown
/// fences or surrounding prose. Returns `None` when no object is found.
pub fn extract_json_object(raw: &str) -> Option<String> {
    if raw.trim_start().starts_with('{') {
        return Some(trim_symmetric(raw));
    }

    let fence = "```";
    if let Some(start) = raw.find(fence) {
        let after_fence = &raw[start + fence.len()..];
        let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
        if let Some(end) = after_lang.find(fence) {
            let block = &after_lang[..end];
            if block.contains('{') {
                return Some(trim_symmetric(block));
            }
        }
    }

    let start = raw.find('{')?;
    let rest = &raw[start + 1..];
    let mut depth = 1i32;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(trim_symmetric(&raw[start..=start + 1 + idx]));
                }
            }
            _ => {}
        }
    }
    None
}

fn trim_symmetric(value: &str) -> String {
    value.trim().trim_matches('`').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_fenced_block() {
        let input = "Here is my decision:\n```json\n{\"goal_achieved\":false}\n```";
        let extracted = extract_json_object(input).expect("json");
        assert!(extracted.contains("goal_achieved"));
        assert!(extracted.starts_with('{'));
    }

    #[test]
    fn extracts_from_inline_object() {
        let input = "text { \"reasoning\": \"a\" } more";
        let extracted = extract_json_object(input).expect("json");
        assert_eq!(extracted, "{ \"reasoning\": \"a\" }");
    }

    #[test]
    fn passes_bare_object_through() {
        let input = "  {\"reasoning\": \"a\"}  ";
        assert_eq!(extract_json_object(input).unwrap(), "{\"reasoning\": \"a\"}");
    }

    #[test]
    fn handles_nested_braces() {
        let input = "decision: {\"action\":{\"type\":\"tap\"}} done";
        let extracted = extract_json_object(input).unwrap();
        assert_eq!(extracted, "{\"action\":{\"type\":\"tap\"}}");
    }

    #[test]
    fn extracts_full_decision_from_unfenced_prose() {
        let input = concat!(
            "Here is my decision: ",
            r#"{"reasoning":"tap it","action":{"type":"tap","value":"Login"},"ux_audit":{"status":"PASS"},"goal_achieved":false}"#,
            " — let me know if {anything} else is needed."
        );
        let extracted = extract_json_object(input).expect("json");
        let parsed = crate::llm::schema::decision_from_json(&extracted).expect("decision");
        assert_eq!(
            parsed.action,
            crate::llm::schema::UiAction::Tap {
                text: "Login".to_string()
            }
        );
    }

    #[test]
    fn returns_none_when_missing() {
        assert!(extract_json_object("no braces here").is_none());
    }
}
