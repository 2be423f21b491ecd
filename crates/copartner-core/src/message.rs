//! Inbound message types shared by the router, memory and orchestrator.

use serde::{Deserialize, Serialize};

/// Where a message came from. Only voice bypasses the permission gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    VoiceInput,
    Chat,
    Cli,
}

impl MessageSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VoiceInput => "voice_input",
            Self::Chat => "chat",
            Self::Cli => "cli",
        }
    }

    /// Parse a source label; anything unrecognised is treated as chat.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "voice_input" | "voice" => Self::VoiceInput,
            "cli" => Self::Cli,
            _ => Self::Chat,
        }
    }

    pub fn is_voice(self) -> bool {
        self == Self::VoiceInput
    }
}

impl std::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message awaiting a routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub user: String,
    pub text: String,
    pub source: MessageSource,
}

impl InboundMessage {
    pub fn new(user: impl Into<String>, text: impl Into<String>, source: MessageSource) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
            source,
        }
    }

    pub fn voice(text: impl Into<String>) -> Self {
        Self::new("voice", text, MessageSource::VoiceInput)
    }

    pub fn chat(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(user, text, MessageSource::Chat)
    }
}
