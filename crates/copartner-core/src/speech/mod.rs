//! Speech-to-text — pluggable trait + factory, and the hop from a finished
//! recording onto the bus as `voice.transcribed`.

#[cfg(feature = "stt-http")]
pub mod http;

use std::path::Path;

use serde_json::json;

use crate::config::SttConfig;
use crate::event_bus::EventBus;
use crate::events::VOICE_TRANSCRIBED;

/// Trait for speech-to-text backends.
pub trait Transcriber: Send + Sync {
    /// Transcribe audio from a WAV file path.
    fn transcribe(&self, wav_path: &Path) -> anyhow::Result<String>;
    /// Human-readable name for logs.
    fn name(&self) -> &str;
    /// Check if the backend is reachable.
    fn is_available(&self) -> bool;
}

// ── Pending placeholder ─────────────────────────────────────────────────

/// Stand-in when the configured backend can't be built. Every attempt fails
/// with the backend name and reason; nothing else is affected.
pub struct PendingTranscriber {
    backend: String,
    reason: String,
}

impl PendingTranscriber {
    pub fn new(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            reason: reason.into(),
        }
    }
}

impl Transcriber for PendingTranscriber {
    fn transcribe(&self, _wav_path: &Path) -> anyhow::Result<String> {
        anyhow::bail!("{}: {}", self.backend, self.reason)
    }
    fn name(&self) -> &str {
        "pending"
    }
    fn is_available(&self) -> bool {
        false
    }
}

/// Create an STT backend from config. Never fails: unknown or uncompiled
/// backends become a [`PendingTranscriber`].
pub fn create_transcriber(cfg: &SttConfig) -> Box<dyn Transcriber> {
    let result: anyhow::Result<Box<dyn Transcriber>> = match cfg.backend.as_str() {
        "http" => {
            #[cfg(feature = "stt-http")]
            { Ok(Box::new(http::HttpTranscriber::new(cfg))) }
            #[cfg(not(feature = "stt-http"))]
            { Err(anyhow::anyhow!("stt-http feature not compiled in")) }
        }
        other => Err(anyhow::anyhow!("Unknown STT backend: {other}")),
    };

    result.unwrap_or_else(|e| {
        let reason = format!("{e:#}");
        log::warn!("STT backend '{}' unavailable: {reason}; voice input disabled", cfg.backend);
        Box::new(PendingTranscriber::new(cfg.backend.clone(), reason))
    })
}

/// Normalise raw STT output: drop bracketed non-speech markers such as
/// `[BLANK_AUDIO]` or `[Music]`, collapse whitespace, trim.
pub fn clean_transcript(raw: &str) -> String {
    let mut spoken = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' => depth += 1,
            ']' if depth > 0 => {
                depth -= 1;
                spoken.push(' ');
            }
            _ if depth == 0 => spoken.push(c),
            _ => {}
        }
    }
    spoken.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Transcribe `wav_path` and publish the cleaned text as `voice.transcribed`.
///
/// Returns the published text, or `None` when nothing was said.
pub fn transcribe_and_publish(
    transcriber: &dyn Transcriber,
    wav_path: &Path,
    bus: &EventBus,
) -> anyhow::Result<Option<String>> {
    log::info!("Transcribing {:?} with {}", wav_path, transcriber.name());
    let raw = transcriber.transcribe(wav_path)?;
    let text = clean_transcript(&raw);
    if text.is_empty() {
        log::info!("Transcription empty; nothing published");
        return Ok(None);
    }
    log::info!("Transcribed: {text:?}");
    bus.publish(VOICE_TRANSCRIBED, &json!({ "text": text }));
    Ok(Some(text))
}
