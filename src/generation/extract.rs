//! Pulls answers and code out of generated text.
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::GenerationError;
use super::prompt::{CODE_END_MARKER, CODE_START_MARKER};

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n(.*?)```").unwrap());

fn json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// The answer in a generated response.
///
/// JSON-formatted responses carry it in an `answer` field, or as the only
/// string value of the object. Anything else is used as plain text.
pub fn extract_answer(response: &str) -> Result<String, GenerationError> {
    let answer = match json_object(response) {
        Some(map) => match map.get("answer") {
            Some(Value::String(s)) => s.clone(),
            _ => {
                let strings: Vec<&String> = map
                    .values()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                match strings.as_slice() {
                    [only] => (*only).clone(),
                    _ => response.trim().to_string(),
                }
            }
        },
        None => response.trim().to_string(),
    };

    if answer.trim().is_empty() {
        return Err(GenerationError::Malformed("empty answer".into()));
    }
    Ok(answer)
}

/// The program in a generated response.
///
/// Looked up in order: a `code` or `script` field of a JSON object, the text
/// between the code markers, the first fenced block, then the whole response.
pub fn extract_code(response: &str) -> Result<String, GenerationError> {
    let code = from_json(response)
        .or_else(|| between_markers(response))
        .or_else(|| first_fence(response))
        .unwrap_or_else(|| response.trim().to_string());

    if code.trim().is_empty() {
        return Err(GenerationError::Malformed(
            "no code found in response".into(),
        ));
    }
    Ok(code)
}

fn from_json(response: &str) -> Option<String> {
    let map = json_object(response)?;
    ["code", "script"].iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) => {
            // The field itself may still hold markers or a fence.
            Some(between_markers(s).or_else(|| first_fence(s)).unwrap_or_else(|| s.clone()))
        }
        _ => None,
    })
}

fn between_markers(text: &str) -> Option<String> {
    let start = text.find(CODE_START_MARKER)? + CODE_START_MARKER.len();
    let end = text[start..].find(CODE_END_MARKER)? + start;
    Some(text[start..end].trim().to_string())
}

fn first_fence(text: &str) -> Option<String> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_answer() {
        assert_eq!(extract_answer(r#"{"answer": "Dhaka"}"#).unwrap(), "Dhaka");
        assert_eq!(extract_answer(r#"{"capital": "Dhaka"}"#).unwrap(), "Dhaka");
        assert_eq!(extract_answer("  Dhaka.\n").unwrap(), "Dhaka.");
        let multi = r#"{"a": "x", "b": "y"}"#;
        assert_eq!(extract_answer(multi).unwrap(), multi);
    }

    #[test]
    fn test_extract_answer_empty() {
        assert!(extract_answer("  ").is_err());
        assert!(extract_answer(r#"{"answer": ""}"#).is_err());
    }

    #[test]
    fn test_code_from_markers() {
        let resp = "Here you go:\n###START_CODE###\nimport sys\nprint(1)\n###END_CODE###\nDone.";
        assert_eq!(extract_code(resp).unwrap(), "import sys\nprint(1)");
    }

    #[test]
    fn test_code_from_fence() {
        let resp = "Sure.\n```python\n    x = 1\nprint(x)\n```\nmore\n```\nother\n```";
        assert_eq!(extract_code(resp).unwrap(), "    x = 1\nprint(x)");
    }

    #[test]
    fn test_code_from_json_field() {
        let resp = r#"{"code": "import sys\\nprint(sys.argv[1])"}"#;
        assert_eq!(extract_code(resp).unwrap(), "import sys\\nprint(sys.argv[1])");

        let wrapped = r#"{"script": "```python\nprint(1)\n```"}"#;
        assert_eq!(extract_code(wrapped).unwrap(), "print(1)");
    }

    #[test]
    fn test_marker_without_end_falls_back() {
        let resp = "###START_CODE###\nprint(1)";
        assert_eq!(extract_code(resp).unwrap(), resp);
    }

    #[test]
    fn test_plain_code_and_empty() {
        assert_eq!(extract_code("\nprint(1)\n").unwrap(), "print(1)");
        assert!(matches!(extract_code(" \n"), Err(GenerationError::Malformed(_))));
        assert!(extract_code("```python\n```").is_err());
    }
}
