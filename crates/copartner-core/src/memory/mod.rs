//! Conversation memory: append-only log of processed messages and replies.

pub mod jsonl;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::{resolve_path, MemoryConfig};
use crate::message::{InboundMessage, MessageSource};

pub use jsonl::JsonlMemoryStore;

/// One remembered entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl MemoryItem {
    pub fn new(text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            text: text.into(),
            metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

/// Voice is direct address, so it ranks above chat.
pub fn infer_priority(source: MessageSource) -> Priority {
    match source {
        MessageSource::VoiceInput => Priority::High,
        MessageSource::Chat | MessageSource::Cli => Priority::Normal,
    }
}

/// `{source, user, priority}` metadata for an inbound message.
pub fn message_metadata(message: &InboundMessage, priority: Priority) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("source".into(), Value::from(message.source.as_str()));
    meta.insert("user".into(), Value::from(message.user.as_str()));
    meta.insert("priority".into(), Value::from(priority.as_str()));
    meta
}

/// Storage seam. Implementations are shared between the router worker and
/// the operator console, so they synchronise internally.
pub trait MemoryStore: Send + Sync {
    /// Record `text`. Returns the stored item.
    fn append(&self, text: &str, metadata: Map<String, Value>) -> anyhow::Result<MemoryItem>;
    /// Case-insensitive substring search, oldest first.
    fn search(&self, keyword: &str) -> anyhow::Result<Vec<MemoryItem>>;
    /// Up to `limit` most recent items, oldest first.
    fn recent(&self, limit: usize) -> Vec<MemoryItem>;
}

/// Build the configured store. Persistence problems degrade to RAM-only.
pub fn create_memory(cfg: &MemoryConfig) -> JsonlMemoryStore {
    if !cfg.enabled {
        log::info!("Long-term memory disabled; keeping short-term memory only");
        return JsonlMemoryStore::in_memory();
    }
    open_or_ram(&resolve_path(&cfg.directory))
}

fn open_or_ram(dir: &Path) -> JsonlMemoryStore {
    match JsonlMemoryStore::open(dir) {
        Ok(store) => store,
        Err(e) => {
            log::warn!("Long-term memory unavailable ({e:#}); keeping short-term memory only");
            JsonlMemoryStore::in_memory()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_by_source() {
        assert_eq!(infer_priority(MessageSource::VoiceInput), Priority::High);
        assert_eq!(infer_priority(MessageSource::Chat), Priority::Normal);
        assert_eq!(infer_priority(MessageSource::Cli), Priority::Normal);
    }

    #[test]
    fn metadata_carries_source_user_priority() {
        let meta = message_metadata(&InboundMessage::chat("bob", "hi"), Priority::Low);
        assert_eq!(meta["source"], "chat");
        assert_eq!(meta["user"], "bob");
        assert_eq!(meta["priority"], "low");
    }

    #[test]
    fn item_serialises_rfc3339_timestamp() {
        let item = MemoryItem::new("hello", Map::new());
        let v = serde_json::to_value(&item).unwrap();
        let ts = v["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok(), "{ts}");
        assert_eq!(v["id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn unwritable_directory_falls_back_to_ram() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file can't host the memory directory.
        let store = open_or_ram(&file.path().join("memory"));
        assert!(store.long_term_path().is_none());
        store.append("still works", Map::new()).unwrap();
        assert_eq!(store.recent(5).len(), 1);
    }
}
