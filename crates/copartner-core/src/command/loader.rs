//! Custom command definitions from `commands.json`.
//!
//! ```json
//! {
//!   "hello": {"response": "Hi {{user}}!", "permission": "everyone", "cooldown_seconds": 3},
//!   "!so":   {"response": "Shoutout @{{args}}", "permission": "moderator"}
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use super::roles::Role;

/// A custom chat command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDefinition {
    pub name: String,
    pub response_template: String,
    pub permission_role: Role,
    pub cooldown: Duration,
    pub user_cooldown: Duration,
    pub enabled: bool,
}

impl CommandDefinition {
    /// Definition with the default policy (everyone, 3s global, 10s per user).
    pub fn new(name: &str, response_template: impl Into<String>) -> Self {
        Self {
            name: normalise_name(name),
            response_template: response_template.into(),
            permission_role: Role::Everyone,
            cooldown: Duration::from_secs_f64(default_cooldown()),
            user_cooldown: Duration::from_secs_f64(default_user_cooldown()),
            enabled: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(default)]
    response: String,
    #[serde(default)]
    permission: String,
    #[serde(default = "default_cooldown")]
    cooldown_seconds: f64,
    #[serde(default = "default_user_cooldown")]
    user_cooldown_seconds: f64,
    #[serde(default = "default_true")]
    enabled: bool,
}

fn default_cooldown() -> f64 { 3.0 }
fn default_user_cooldown() -> f64 { 10.0 }
fn default_true() -> bool { true }

/// Command names are matched lower-case without the `!` prefix.
pub fn normalise_name(raw: &str) -> String {
    raw.trim().trim_start_matches('!').to_lowercase()
}

/// A window of `0` (or negative, or NaN) turns that gate off rather than
/// falling back to the default. Values too large for a `Duration` saturate.
fn seconds(raw: f64) -> Duration {
    if raw > 0.0 {
        Duration::try_from_secs_f64(raw).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Load definitions from `path`. A missing file is not an error.
pub fn load_commands(path: &Path) -> Result<Vec<CommandDefinition>> {
    if !path.exists() {
        log::info!("Custom commands file not found (ok): {:?}", path);
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let commands = parse_commands(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    log::info!("Loaded {} custom commands from {:?}", commands.len(), path);
    Ok(commands)
}

/// Parse the top-level object. Invalid entries are skipped, not fatal.
pub fn parse_commands(contents: &str) -> Result<Vec<CommandDefinition>> {
    let root: Value = serde_json::from_str(contents)?;
    let Value::Object(entries) = root else {
        bail!("commands file must be a JSON object at top level");
    };

    let mut commands = Vec::with_capacity(entries.len());
    for (name, body) in entries {
        let name = normalise_name(&name);
        if name.is_empty() {
            continue;
        }
        let raw: RawCommand = match serde_json::from_value(body) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Skipping command '{name}': {e}");
                continue;
            }
        };
        let response = raw.response.trim();
        if response.is_empty() {
            log::warn!("Skipping command '{name}': empty response");
            continue;
        }
        commands.push(CommandDefinition {
            name,
            response_template: response.to_string(),
            permission_role: Role::parse(&raw.permission),
            cooldown: seconds(raw.cooldown_seconds),
            user_cooldown: seconds(raw.user_cooldown_seconds),
            enabled: raw.enabled,
        });
    }
    Ok(commands)
}
