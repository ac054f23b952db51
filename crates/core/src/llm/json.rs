pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// JSON object embedded in model text, if any.
pub fn parse_object(text: &str) -> Option<serde_json::Value> {
    let json_str = extract_json(text)?;
    match serde_json::from_str::<serde_json::Value>(&json_str) {
        Ok(v) if v.is_object() => Some(v),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(error = %err, "model text is not a JSON object");
            None
        }
    }
}
