//! Response unwrapper
//!
//! Model replies that should be JSON frequently arrive wrapped in markdown
//! code fences, with prose around them. This module extracts the payload and
//! decodes it, without ever touching conversation state.
//!
//! Fence policy: the first well-formed ```json block wins; failing that, the
//! first generic fenced block; failing that, the whole reply is treated as
//! the JSON payload. Indented code blocks are not fences and are ignored.

#[cfg(test)]
mod proptests;

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde_json::Value;
use thiserror::Error;

/// Reply text could not be decoded as JSON
#[derive(Debug, Error)]
#[error("reply is not valid JSON: {source}")]
pub struct ParseError {
    #[from]
    source: serde_json::Error,
}

/// Result of fence extraction: the candidate payload and whether it came
/// from inside a fence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPayload {
    pub fenced: bool,
    pub payload: String,
}

/// Scan `text` for fenced code blocks and pick the JSON candidate.
pub fn extract_payload(text: &str) -> ExtractedPayload {
    let mut first_generic: Option<String> = None;
    // (is json-tagged, accumulated content) for the fence currently open
    let mut open_fence: Option<(bool, String)> = None;

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let tag = info.split_whitespace().next().unwrap_or("");
                open_fence = Some((tag.eq_ignore_ascii_case("json"), String::new()));
            }
            Event::Text(chunk) => {
                if let Some((_, content)) = open_fence.as_mut() {
                    content.push_str(&chunk);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((json_tagged, content)) = open_fence.take() {
                    if json_tagged {
                        return ExtractedPayload {
                            fenced: true,
                            payload: content.trim().to_string(),
                        };
                    }
                    if first_generic.is_none() {
                        first_generic = Some(content);
                    }
                }
            }
            _ => {}
        }
    }

    match first_generic {
        Some(content) => ExtractedPayload {
            fenced: true,
            payload: content.trim().to_string(),
        },
        None => ExtractedPayload {
            fenced: false,
            payload: text.trim().to_string(),
        },
    }
}

/// Unwrap a model reply and decode it as JSON.
///
/// # Errors
///
/// Returns [`ParseError`] when the extracted payload is not valid JSON.
pub fn unwrap_json(text: &str) -> Result<Value, ParseError> {
    let extracted = extract_payload(text);
    tracing::debug!(fenced = extracted.fenced, "Unwrapping model reply");
    let doc = serde_json::from_str(&extracted.payload)?;
    Ok(doc)
}
