//! Response backends — pluggable trait + factory.
//!
//! A backend is an opaque text-in/text-out service: system prompt and user
//! prompt in, generated text out. The router calls it twice per approved reply.

#[cfg(feature = "backend-http")]
pub mod chat_completions;
pub mod echo;

use thiserror::Error;

use crate::config::BackendConfig;

pub use echo::EchoBackend;

/// Why a backend call produced no text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No endpoint or key configured, or the backend isn't compiled in.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Transport failure, timeout or non-2xx status.
    #[error("backend request failed: {0}")]
    Request(String),
    /// The response arrived but didn't contain completion text.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Trait for language-model backends.
pub trait ResponseBackend: Send + Sync {
    /// Generate a full (non-streamed) completion.
    fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError>;
    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

// ── Unavailable placeholder ─────────────────────────────────────────────

/// Placeholder returned when the configured backend can't be built.
///
/// The app stays alive; every generation attempt fails with a clear reason.
pub struct UnavailableBackend {
    backend: String,
    reason: String,
}

impl UnavailableBackend {
    pub fn new(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            reason: reason.into(),
        }
    }
}

impl ResponseBackend for UnavailableBackend {
    fn generate(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String, BackendError> {
        Err(BackendError::Unavailable(format!("{}: {}", self.backend, self.reason)))
    }
    fn name(&self) -> &str {
        "unavailable"
    }
}

// ── Fallback chain ──────────────────────────────────────────────────────

/// Tries `primary`, then `secondary` on any error. Used for
/// offline-with-online-backup mode.
pub struct FallbackBackend {
    primary: Box<dyn ResponseBackend>,
    secondary: Box<dyn ResponseBackend>,
    name: String,
}

impl FallbackBackend {
    pub fn new(primary: Box<dyn ResponseBackend>, secondary: Box<dyn ResponseBackend>) -> Self {
        let name = format!("{} → {}", primary.name(), secondary.name());
        Self { primary, secondary, name }
    }
}

impl ResponseBackend for FallbackBackend {
    fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError> {
        match self.primary.generate(system_prompt, user_prompt) {
            Ok(text) => Ok(text),
            Err(e) => {
                log::warn!(
                    "Backend '{}' failed ({e}); falling back to '{}'",
                    self.primary.name(),
                    self.secondary.name()
                );
                self.secondary.generate(system_prompt, user_prompt)
            }
        }
    }
    fn name(&self) -> &str {
        &self.name
    }
}

// ── Factory ─────────────────────────────────────────────────────────────

/// Create a backend from config.
///
/// Never fails: a backend that can't be built becomes an
/// [`UnavailableBackend`] and the reason is logged once here.
pub fn create_backend(cfg: &BackendConfig) -> Box<dyn ResponseBackend> {
    create_backend_with_env(cfg, |key| std::env::var(key).ok())
}

/// As [`create_backend`], with the API-key lookup injected.
pub fn create_backend_with_env(
    cfg: &BackendConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Box<dyn ResponseBackend> {
    let primary = build_named(&cfg.backend, cfg, &lookup);

    let wants_backup = !cfg.offline_only && cfg.backend != "hosted" && cfg.backend != "echo";
    let backend = if wants_backup {
        match build_named("hosted", cfg, &lookup) {
            Ok(hosted) => match primary {
                Ok(local) => Ok(Box::new(FallbackBackend::new(local, hosted)) as Box<dyn ResponseBackend>),
                Err(e) => {
                    log::warn!("Primary backend '{}' unavailable ({e}); using hosted only", cfg.backend);
                    Ok(hosted)
                }
            },
            Err(e) => {
                log::info!("Online backup not configured: {e}");
                primary
            }
        }
    } else {
        primary
    };

    match backend {
        Ok(b) => {
            log::info!("Response backend: {}", b.name());
            b
        }
        Err(e) => {
            log::warn!("Backend '{}' unavailable: {e}; replies disabled", cfg.backend);
            Box::new(UnavailableBackend::new(cfg.backend.clone(), e.to_string()))
        }
    }
}

fn build_named(
    name: &str,
    cfg: &BackendConfig,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Box<dyn ResponseBackend>, BackendError> {
    match name {
        "echo" => Ok(Box::new(EchoBackend)),
        "local-http" => {
            #[cfg(feature = "backend-http")]
            {
                Ok(Box::new(chat_completions::ChatCompletionsBackend::local(cfg)))
            }
            #[cfg(not(feature = "backend-http"))]
            {
                let _ = cfg;
                Err(BackendError::Unavailable("backend-http feature not compiled in".into()))
            }
        }
        "hosted" => {
            let key = lookup(&cfg.api_key_env)
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| BackendError::Unavailable(format!("{} is not set", cfg.api_key_env)))?;
            #[cfg(feature = "backend-http")]
            {
                Ok(Box::new(chat_completions::ChatCompletionsBackend::hosted(cfg, key)))
            }
            #[cfg(not(feature = "backend-http"))]
            {
                let _ = key;
                Err(BackendError::Unavailable("backend-http feature not compiled in".into()))
            }
        }
        other => Err(BackendError::Unavailable(format!("unknown backend: {other}"))),
    }
}
