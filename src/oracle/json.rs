//! JSON extraction from oracle output.
//!
//! Models occasionally wrap their JSON in markdown fences or surrounding
//! prose despite instructions. Every stage decodes through this helper so
//! malformed responses are caught at one boundary and routed into the
//! stage's fallback path.

/// Extract a JSON object from oracle output (handles markdown wrapping).
pub fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in a ```json code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    // Wrapped in a bare code block
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Embedded in prose — take the outermost object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_object() {
        let input = r#"{"classification": "fyi"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn markdown_block() {
        let input = "```json\n{\"priority_score\": 75}\n```";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.contains("priority_score"));
    }

    #[test]
    fn bare_code_block() {
        let input = "```\n{\"summary\": \"x\"}\n```";
        let result = extract_json_object(input);
        assert_eq!(result, "{\"summary\": \"x\"}");
    }

    #[test]
    fn embedded_in_prose() {
        let input = "Here is my analysis: {\"classification\": \"spam\"} hope that helps.";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.ends_with('}'));
    }

    #[test]
    fn no_json_returns_trimmed_input() {
        assert_eq!(extract_json_object("  not json  "), "not json");
    }
}
