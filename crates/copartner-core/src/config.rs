//! Config: nested sections for each collaborator, loaded from config.json.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Sub-configs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// "local-http", "hosted" or "echo".
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_local_url")]
    pub local_url: String,
    #[serde(default = "default_local_model")]
    pub local_model: String,
    #[serde(default = "default_hosted_url")]
    pub hosted_url: String,
    #[serde(default = "default_hosted_model")]
    pub hosted_model: String,
    /// Name of the environment variable holding the hosted API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// When false, a hosted backend is chained behind the local one.
    #[serde(default = "default_true")]
    pub offline_only: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_url: default_local_url(),
            local_model: default_local_model(),
            hosted_url: default_hosted_url(),
            hosted_model: default_hosted_model(),
            api_key_env: default_api_key_env(),
            offline_only: true,
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Who the assistant is helping; appears in the behavioural rules.
    #[serde(default = "default_operator_name")]
    pub operator_name: String,
    /// Initial value of the auto-reply master switch.
    #[serde(default)]
    pub auto_reply: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            operator_name: default_operator_name(),
            auto_reply: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Custom commands file. Relative paths resolve next to the binary.
    #[serde(default = "default_commands_path")]
    pub path: PathBuf,
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<char>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            path: default_commands_path(),
            prefixes: default_prefixes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Directory holding long_term.jsonl. Relative paths resolve next to the binary.
    #[serde(default = "default_memory_dir")]
    pub directory: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_memory_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// "http" or "none".
    #[serde(default = "default_stt_backend")]
    pub backend: String,
    #[serde(default = "default_stt_url")]
    pub url: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            backend: default_stt_backend(),
            url: default_stt_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// "console" or "type-text".
    #[serde(default = "default_output_backend")]
    pub backend: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: default_output_backend(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    #[serde(default = "default_auto_reply_toggle")]
    pub auto_reply_toggle: String,
    #[serde(default = "default_respond_now")]
    pub respond_now: String,
    #[serde(default = "default_respond_suggestion")]
    pub respond_suggestion: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            auto_reply_toggle: default_auto_reply_toggle(),
            respond_now: default_respond_now(),
            respond_suggestion: default_respond_suggestion(),
        }
    }
}

// ── Top-level config ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub hotkey: HotkeyConfig,
}

// ── Defaults ───────────────────────────────────────────────────────────────

fn default_true() -> bool { true }
fn default_backend() -> String { "local-http".into() }
fn default_local_url() -> String { "http://127.0.0.1:11434".into() }
fn default_local_model() -> String { "llama3.2".into() }
fn default_hosted_url() -> String { "https://api.openai.com".into() }
fn default_hosted_model() -> String { "gpt-4o-mini".into() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".into() }
fn default_timeout_secs() -> u64 { 60 }
fn default_temperature() -> f32 { 0.3 }
fn default_operator_name() -> String { "the operator".into() }
fn default_commands_path() -> PathBuf { PathBuf::from("commands.json") }
fn default_prefixes() -> Vec<char> { vec!['!', '/'] }
fn default_memory_dir() -> PathBuf { PathBuf::from("memory") }
fn default_stt_backend() -> String { "http".into() }
fn default_stt_url() -> String { "http://127.0.0.1:5200".into() }
fn default_output_backend() -> String { "console".into() }
fn default_auto_reply_toggle() -> String { "Ctrl+Shift+F10".into() }
fn default_respond_now() -> String { "Ctrl+Shift+F11".into() }
fn default_respond_suggestion() -> String { "Ctrl+Shift+F12".into() }

// ── Load ───────────────────────────────────────────────────────────────────

/// Directory containing the running binary, falling back to the working directory.
pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve a configured path: absolute paths are kept, relative ones land next to the binary.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        exe_dir().join(path)
    }
}

fn default_config_path() -> PathBuf {
    exe_dir().join("config.json")
}

/// Load config from `path` (or config.json next to the binary), then apply
/// environment overrides. Never fails: a missing or broken file yields defaults.
pub fn load_config(path: Option<&Path>) -> Config {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    let mut cfg = match std::fs::read_to_string(&path) {
        Ok(contents) => parse_config(&contents).unwrap_or_else(|e| {
            log::warn!("Failed to parse {:?}: {e}. Using defaults.", path);
            Config::default()
        }),
        Err(_) => {
            log::info!("No config at {:?}, using defaults", path);
            Config::default()
        }
    };
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    cfg
}

pub fn parse_config(contents: &str) -> serde_json::Result<Config> {
    serde_json::from_str(contents)
}

/// Apply `COPARTNER_*` overrides. `lookup` is injected so tests don't touch the process env.
pub fn apply_env_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("COPARTNER_BACKEND") {
        let v = v.trim().to_lowercase();
        if !v.is_empty() {
            log::info!("COPARTNER_BACKEND override: {} → {}", cfg.backend.backend, v);
            cfg.backend.backend = v;
        }
    }
    if let Some(v) = lookup("COPARTNER_OFFLINE_ONLY").and_then(|v| parse_flag(&v)) {
        cfg.backend.offline_only = v;
    }
    if let Some(v) = lookup("COPARTNER_AUTO_REPLY").and_then(|v| parse_flag(&v)) {
        cfg.router.auto_reply = v;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            log::warn!("Ignoring unrecognised boolean override {other:?}");
            None
        }
    }
}
