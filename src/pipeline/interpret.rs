//! Change-request interpretation: instruction → replacement mapping.
//!
//! One completion call per request. The model is asked for a bare JSON
//! object, but completions routinely arrive wrapped in prose or Markdown
//! fences, so [`parse_replacement_response`] recovers the object with three
//! strategies, stopping at the first that yields a JSON **object**:
//!
//! 1. the whole trimmed response;
//! 2. the first fenced code block (```` ``` ```` or ```` ```json ````);
//! 3. the span from the first `{` to the last `}`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::InterpretError;
use crate::llm::{CompletionBackend, Prompt};
use crate::pipeline::replace::ReplacementMapping;
use crate::prompts::{template_edit_prompt, TEMPLATE_EDIT_SYSTEM_PROMPT};

/// Reserved key the model uses to report an unclear request.
pub const ERROR_KEY: &str = "_error";

/// Characters of the raw response kept in [`InterpretError::UnparseableResponse`].
const EXCERPT_CHARS: usize = 200;

static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").unwrap());

/// Ask the model for a mapping and validate its answer.
///
/// `structural_text` is used as given; callers truncate it first.
pub async fn interpret_change_request(
    backend: &dyn CompletionBackend,
    structural_text: &str,
    instruction: &str,
) -> Result<ReplacementMapping, InterpretError> {
    let prompt = Prompt::new(
        TEMPLATE_EDIT_SYSTEM_PROMPT,
        template_edit_prompt(structural_text, instruction),
    );
    debug!(
        "Interpreting change request ({} chars of document)",
        structural_text.chars().count()
    );
    let raw = backend.complete(&prompt).await?;
    let mapping = parse_replacement_response(&raw)?;
    info!("Model proposed {} replacements", mapping.len());
    Ok(mapping)
}

/// Recover and validate a replacement mapping from a raw completion.
pub fn parse_replacement_response(raw: &str) -> Result<ReplacementMapping, InterpretError> {
    let object = extract_json_object(raw).ok_or_else(|| {
        warn!("No JSON object in model response");
        InterpretError::UnparseableResponse {
            excerpt: raw.chars().take(EXCERPT_CHARS).collect(),
        }
    })?;

    if let Some(message) = object.get(ERROR_KEY) {
        let message = match message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(InterpretError::AmbiguousRequest { message });
    }
    let mapping = coerce_mapping(object);
    if mapping.is_empty() {
        return Err(InterpretError::NoChangesIdentified);
    }
    Ok(mapping)
}

/// Run the three strategies in order; the first JSON object wins.
fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    if let Some(object) = parse_object(trimmed) {
        debug!("Parsed response as bare JSON");
        return Some(object);
    }

    for body in RE_FENCED_BLOCK.captures_iter(raw).filter_map(|c| c.get(1)) {
        if let Some(object) = parse_object(body.as_str().trim()) {
            debug!("Parsed response from fenced block");
            return Some(object);
        }
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    let object = parse_object(&raw[start..=end])?;
    debug!("Parsed response from brace span");
    Some(object)
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

/// Strings are kept verbatim, numbers and booleans are stringified, other
/// values are dropped.
fn coerce_mapping(object: Map<String, Value>) -> ReplacementMapping {
    let mut mapping = ReplacementMapping::new();
    for (key, value) in object {
        let replacement = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                warn!("Dropping replacement for {:?}: unsupported value {}", key, other);
                continue;
            }
        };
        mapping.insert(key, replacement);
    }
    mapping
}
