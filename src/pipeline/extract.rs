//! Structured response extraction
//!
//! Reasoning-service replies are untrusted free text. [`extract_structured`]
//! recovers a JSON object from them, trying in order:
//!
//! 1. fenced blocks tagged `json`, then untagged fenced blocks; blocks tagged
//!    with any other language are skipped
//! 2. the span from the first `{` to the last `}`
//! 3. the whole trimmed reply
//!
//! A located but syntactically broken object is never repaired; it counts as
//! "no structured output" and the caller takes its fallback path.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::trace;

/// A stage's decision object: string keys to arbitrary JSON values
pub type StructuredOutput = Map<String, Value>;

fn any_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```([A-Za-z0-9_+.-]*)[ \t]*\r?\n?([\s\S]*?)```").expect("valid fence regex")
    })
}

/// Interiors of fenced blocks that may hold an object: `json` first, then untagged.
fn fenced_candidates(text: &str) -> Vec<&str> {
    let mut tagged = Vec::new();
    let mut untagged = Vec::new();

    for caps in any_fence().captures_iter(text) {
        let (Some(tag), Some(interior)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        match tag.as_str().to_lowercase().as_str() {
            "json" => tagged.push(interior.as_str()),
            "" => untagged.push(interior.as_str()),
            _ => {}
        }
    }

    tagged.extend(untagged);
    tagged
}

fn code_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```([A-Za-z0-9_+.-]*)[ \t]*\r?\n([\s\S]*?)```").expect("valid fence regex")
    })
}

fn parse_object(candidate: &str) -> Option<StructuredOutput> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Recovers a structured mapping from `text`, or `None` when every strategy fails.
pub fn extract_structured(text: &str) -> Option<StructuredOutput> {
    if let Some(map) = fenced_candidates(text).into_iter().find_map(parse_object) {
        trace!("Extracted object from fenced block");
        return Some(map);
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(map) = parse_object(&text[start..=end]) {
                trace!("Extracted object from brace span");
                return Some(map);
            }
        }
    }

    parse_object(text)
}

/// A fenced code block found in free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info string after the opening fence, lowercased; empty if untagged
    pub language: String,
    pub code: String,
}

/// Returns the first fenced block in `text`, skipping blocks tagged `json`.
pub fn extract_code_block(text: &str) -> Option<CodeBlock> {
    code_fence()
        .captures_iter(text)
        .map(|caps| CodeBlock {
            language: caps
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default(),
            code: caps
                .get(2)
                .map(|m| m.as_str().trim_end().to_string())
                .unwrap_or_default(),
        })
        .find(|block| block.language != "json" && !block.code.trim().is_empty())
}

/// Strips a surrounding fence if present, otherwise returns the trimmed text.
pub fn strip_code_fences(text: &str) -> String {
    match extract_code_block(text) {
        Some(block) => block.code,
        None => text.trim().to_string(),
    }
}
