//! Bus topics and their payload decoding.
//!
//! Payloads arrive as loose JSON from other threads/processes, so every
//! decoder returns `None` for malformed data and logs why.

use serde_json::{json, Value};

use crate::message::{InboundMessage, MessageSource};

pub const VOICE_TRANSCRIBED: &str = "voice.transcribed";
pub const CHAT_RECEIVED: &str = "chat.received";
pub const AUTO_REPLY_SET: &str = "ui.auto_reply.set";
pub const RESPOND_NOW: &str = "ui.respond_now";
pub const RESPOND_SUGGESTION: &str = "ui.respond_suggestion";
pub const VISION_CONTEXT: &str = "vision.context";

pub const MESSAGE_RECEIVED: &str = "ai.message_received";
pub const MESSAGE_REPLIED: &str = "ai.message_replied";

/// A chat-path message plus the sender's role string (for command gating).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPayload {
    pub message: InboundMessage,
    pub role: String,
}

/// `voice.transcribed {text}` → voice-origin message.
pub fn decode_voice(payload: &Value) -> Option<InboundMessage> {
    let text = string_field(payload, "text", VOICE_TRANSCRIBED)?;
    Some(InboundMessage::voice(text))
}

/// `chat.received {user, text, role?, source?}`.
///
/// Voice-labelled sources are downgraded to chat: only the transcription
/// topic may produce ungated voice messages.
pub fn decode_chat(payload: &Value) -> Option<ChatPayload> {
    let text = string_field(payload, "text", CHAT_RECEIVED)?;
    let user = payload
        .get("user")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let role = payload
        .get("role")
        .and_then(Value::as_str)
        .unwrap_or("everyone")
        .to_string();
    let source = match payload.get("source").and_then(Value::as_str).map(MessageSource::parse) {
        Some(MessageSource::Cli) => MessageSource::Cli,
        _ => MessageSource::Chat,
    };
    Some(ChatPayload {
        message: InboundMessage::new(user, text, source),
        role,
    })
}

/// `ui.auto_reply.set {enabled}`.
pub fn decode_auto_reply(payload: &Value) -> Option<bool> {
    match payload.get("enabled").and_then(Value::as_bool) {
        Some(enabled) => Some(enabled),
        None => {
            log::warn!("Dropping malformed {AUTO_REPLY_SET} payload: {payload}");
            None
        }
    }
}

/// `vision.context {description}`; `null` or missing clears the context.
pub fn decode_vision(payload: &Value) -> Option<Option<String>> {
    match payload.get("description") {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) if s.trim().is_empty() => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(other) => {
            log::warn!("Dropping malformed {VISION_CONTEXT} description: {other}");
            None
        }
    }
}

pub fn received_payload(message: &InboundMessage) -> Value {
    json!({
        "user": message.user,
        "text": message.text,
        "source": message.source.as_str(),
    })
}

pub fn replied_payload(text: &str) -> Value {
    json!({ "text": text })
}

fn string_field(payload: &Value, field: &str, topic: &str) -> Option<String> {
    match payload.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            log::debug!("Dropping {topic} with empty {field}");
            None
        }
        other => {
            log::warn!("Dropping malformed {topic} payload: {field}={other:?}");
            None
        }
    }
}
