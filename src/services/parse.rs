//! Lenient parsing of backend responses.
//!
//! Backends are asked for strict JSON, but real responses arrive wrapped in
//! prose, code fences, or with trailing commentary. These helpers extract
//! the structured payload and fall back to line scanning before giving up.

use serde_json::Value;

/// Extract a list of policy names from a response expected to contain a JSON
/// string array. Returns an empty vector when nothing usable is found.
pub fn name_list(response: &str) -> Vec<String> {
    let trimmed = response.trim();

    if let Some(names) = parse_json_array(trimmed) {
        return names;
    }

    // Look for the first bracketed region inside surrounding prose.
    if let Some(start) = trimmed.find('[') {
        if let Some(end) = trimmed[start..].find(']') {
            if let Some(names) = parse_json_array(&trimmed[start..=start + end]) {
                return names;
            }
        }
    }

    // Last resort: lines that look like policy names.
    trimmed
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches('-')
                .trim()
                .trim_matches(|c| c == '"' || c == '\'' || c == ',')
                .to_string()
        })
        .filter(|line| looks_like_policy_name(line))
        .collect()
}

/// Extract a string-to-string mapping from a response expected to contain a
/// JSON object. Returns `None` when no object can be recovered.
pub fn name_mapping(response: &str) -> Option<Vec<(String, String)>> {
    let trimmed = response.trim();

    let candidate = if trimmed.starts_with('{') {
        trimmed.to_string()
    } else {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end <= start {
            return None;
        }
        trimmed[start..=end].to_string()
    };

    let value: Value = serde_json::from_str(&candidate).ok()?;
    let object = value.as_object()?;

    Some(
        object
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.trim().to_string())))
            .filter(|(_, v)| !v.is_empty())
            .collect(),
    )
}

/// Extract a document body from a repair response, stripping Markdown code
/// fences and any language tag.
pub fn document_body(response: &str) -> String {
    let trimmed = response.trim();

    if let Some(fence_start) = trimmed.find("```") {
        let after_fence = &trimmed[fence_start + 3..];
        // Skip the language tag line, if present.
        let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
        let body = &after_fence[body_start..];
        if let Some(fence_end) = body.find("```") {
            return body[..fence_end].trim().to_string();
        }
        return body.trim().to_string();
    }

    trimmed.to_string()
}

fn parse_json_array(candidate: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let array = value.as_array()?;
    let names: Vec<String> = array
        .iter()
        .filter_map(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Some(names)
}

fn looks_like_policy_name(line: &str) -> bool {
    line.len() > 3
        && line.len() < 100
        && line.contains('-')
        && !line.contains(' ')
        && !line.contains('`')
        && line
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
