//! # Wire protocol
//!
//! Clients send plain text frames: the first one is the display name, every
//! later one is a chat message. The server answers with JSON frames of the
//! form `{"type": ..., "data": ...}`:
//!
//! | type      | data                                   |
//! |-----------|----------------------------------------|
//! | `color`   | assigned color (string)                |
//! | `history` | array of `{time, text, author, color}` |
//! | `message` | `{time, text, author, color}`          |
//! | `error`   | reason the session is being rejected   |

use crate::error::ChatResult;
use crate::identity::Color;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One accepted chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Milliseconds since the Unix epoch
    pub time: i64,
    pub text: String,
    pub author: String,
    pub color: Color,
}

impl ChatMessage {
    /// Builds a message stamped with the current time, sanitizing `raw_text`
    pub fn new(author: &str, color: &Color, raw_text: &str) -> Self {
        Self {
            time: chrono::Utc::now().timestamp_millis(),
            text: sanitize(raw_text),
            author: author.to_string(),
            color: color.clone(),
        }
    }
}

/// Server to client frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    Color(Color),
    History(Vec<ChatMessage>),
    Message(ChatMessage),
    Error(String),
}

impl ServerEvent {
    /// Serializes the event once so it can be shared across every recipient
    pub fn encode(&self) -> ChatResult<Arc<str>> {
        Ok(serde_json::to_string(self)?.into())
    }
}

const ENTITIES: [&str; 4] = ["amp;", "lt;", "gt;", "quot;"];

/// Escapes `&`, `<`, `>` and `"` as HTML entities.
///
/// An `&` that already starts one of those four entities is left alone, which
/// makes the function idempotent.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (i, ch) in input.char_indices() {
        match ch {
            '&' => {
                let rest = &input[i + 1..];
                if ENTITIES.iter().any(|entity| rest.starts_with(entity)) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
