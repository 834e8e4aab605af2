const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Pulls the JSON document out of a generation response.
///
/// Tries a ```json fence, then a bare fence, then the outermost `{ ... }` span.
/// Falls back to the trimmed input.
pub fn extract_json(response: &str) -> String {
    if let Some(body) = fenced(response, JSON_FENCE) {
        return body;
    }
    if let Some(body) = fenced(response, FENCE) {
        return body;
    }
    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if start < end {
            return response[start..=end].trim().to_string();
        }
    }
    response.trim().to_string()
}

fn fenced(response: &str, opening: &str) -> Option<String> {
    let start = response.find(opening)? + opening.len();
    let end = response[start..].find(FENCE)?;
    Some(response[start..start + end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let text = "Here you go:\n```json\n{\"name\": \"a\"}\n```\nanything else";
        assert_eq!(extract_json(text), "{\"name\": \"a\"}");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(extract_json("```\n{}\n```"), "{}");
    }

    #[test]
    fn finds_braces_in_prose() {
        assert_eq!(extract_json("sure {\"a\": {\"b\": 1}} done"), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn passes_through_plain_text() {
        assert_eq!(extract_json("  no json here "), "no json here");
    }
}
