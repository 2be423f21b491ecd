//! Command handler: chat `!command` / `/command` syntax with role and cooldown gates.
//!
//! Commands are answered here and never reach the intent router.

pub mod cooldown;
pub mod loader;
pub mod roles;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::{resolve_path, CommandsConfig};

pub use cooldown::CooldownLedger;
pub use loader::{load_commands, CommandDefinition};
pub use roles::Role;

const BUILT_INS: [&str; 2] = ["help", "ping"];
const HELP_CUSTOM_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    UnknownCommand,
    Disabled,
    Blocked,
    Cooldown,
    Error,
}

/// Uniform `{status, message, data}` result. `data` is always an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl CommandResult {
    pub fn new(status: CommandStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == CommandStatus::Ok
    }

    pub fn to_value(&self) -> Value {
        json!({
            "status": self.status,
            "message": self.message,
            "data": self.data,
        })
    }
}

pub struct CommandHandler {
    path: Option<PathBuf>,
    prefixes: Vec<char>,
    commands: BTreeMap<String, CommandDefinition>,
    ledger: CooldownLedger,
}

impl CommandHandler {
    /// Handler backed by a commands file. Load failures leave zero custom
    /// commands and are logged.
    pub fn new(path: impl Into<PathBuf>, prefixes: Vec<char>) -> Self {
        let mut handler = Self {
            path: Some(path.into()),
            prefixes,
            commands: BTreeMap::new(),
            ledger: CooldownLedger::new(),
        };
        handler.reload();
        handler
    }

    pub fn from_config(cfg: &CommandsConfig) -> Self {
        Self::new(resolve_path(&cfg.path), cfg.prefixes.clone())
    }

    /// Handler over an in-memory command set (no file).
    pub fn with_commands(commands: Vec<CommandDefinition>, prefixes: Vec<char>) -> Self {
        Self {
            path: None,
            prefixes,
            commands: commands.into_iter().map(|c| (c.name.clone(), c)).collect(),
            ledger: CooldownLedger::new(),
        }
    }

    /// Re-read the commands file. Returns the number of custom commands loaded.
    /// Cooldown history is kept.
    pub fn reload(&mut self) -> usize {
        let Some(path) = &self.path else {
            return self.commands.len();
        };
        self.commands = match load_commands(path) {
            Ok(cmds) => cmds.into_iter().map(|c| (c.name.clone(), c)).collect(),
            Err(e) => {
                log::error!("Failed to load custom commands: {e:#}");
                BTreeMap::new()
            }
        };
        self.commands.len()
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.commands.values()
    }

    /// Whether `text` would be treated as a command.
    pub fn is_command(&self, text: &str) -> bool {
        self.prefix_of(text.trim()).is_some()
    }

    fn prefix_of(&self, text: &str) -> Option<char> {
        text.chars().next().filter(|c| self.prefixes.contains(c))
    }

    /// Chat entry point. `None` means the text isn't a command.
    pub fn handle_chat_message(&mut self, text: &str, user: &str, role: &str) -> Option<CommandResult> {
        self.handle_chat_message_at(text, user, role, Instant::now())
    }

    pub fn handle_chat_message_at(
        &mut self,
        text: &str,
        user: &str,
        role: &str,
        now: Instant,
    ) -> Option<CommandResult> {
        let msg = text.trim();
        let prefix = self.prefix_of(msg)?;

        let (name, args) = split_command(msg, prefix);
        if name.is_empty() {
            return Some(CommandResult::new(CommandStatus::Error, "Empty command name"));
        }

        if BUILT_INS.contains(&name.as_str()) {
            return Some(self.run_built_in(&name));
        }

        let Some(cmd) = self.commands.get(&name) else {
            return Some(CommandResult::new(
                CommandStatus::UnknownCommand,
                format!("Unknown command: {prefix}{name}"),
            ));
        };

        if !cmd.enabled {
            return Some(CommandResult::new(
                CommandStatus::Disabled,
                format!("Command disabled: {prefix}{name}"),
            ));
        }

        let user_role = Role::parse(role);
        if !user_role.allows(cmd.permission_role) {
            log::info!(
                "Blocked {prefix}{name} for {user} (role {user_role}, requires {})",
                cmd.permission_role
            );
            return Some(CommandResult::new(CommandStatus::Blocked, "Not allowed for your role"));
        }

        if let Some(wait) = self.ledger.remaining(&name, user, now, cmd.cooldown, cmd.user_cooldown) {
            let secs = wait.as_secs_f64();
            return Some(
                CommandResult::new(
                    CommandStatus::Cooldown,
                    format!("Cooldown active. Try again in {secs:.1}s"),
                )
                .with("retry_after_seconds", json!(secs)),
            );
        }

        let rendered = render_template(&cmd.response_template, user, &args);
        self.ledger.mark_used(&name, user, now);
        log::info!("Command {prefix}{name} executed for {user} ({user_role})");

        Some(CommandResult::new(CommandStatus::Ok, rendered).with("command", json!(name)))
    }

    /// CLI-style entry: exact built-in names only (`ping`, `help`).
    pub fn handle_command(&self, raw: &str, source: &str) -> CommandResult {
        log::info!("Incoming command {raw:?} from {source}");
        let cmd = raw.trim().to_lowercase();
        if cmd.is_empty() {
            return CommandResult::new(CommandStatus::Error, "Empty command");
        }
        if !BUILT_INS.contains(&cmd.as_str()) {
            log::warn!("Unknown command: {cmd}");
            return CommandResult::new(CommandStatus::UnknownCommand, format!("Unknown command: {cmd}"));
        }
        self.run_built_in(&cmd)
    }

    fn run_built_in(&self, name: &str) -> CommandResult {
        match name {
            "ping" => CommandResult::new(CommandStatus::Ok, "pong").with("command", json!("ping")),
            _ => self.help(),
        }
    }

    fn help(&self) -> CommandResult {
        let custom: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        let mut message = format!("Built-in: {}", BUILT_INS.join(", "));
        if !custom.is_empty() {
            let shown = &custom[..custom.len().min(HELP_CUSTOM_LIMIT)];
            message.push_str(&format!(" | Custom: {}", shown.join(", ")));
            if custom.len() > HELP_CUSTOM_LIMIT {
                message.push_str(" ...");
            }
        }
        CommandResult::new(CommandStatus::Ok, message)
            .with("built_in", json!(BUILT_INS))
            .with("custom", json!(custom))
    }
}

/// `"!hello there bob"` → `("hello", "there bob")`.
fn split_command(msg: &str, prefix: char) -> (String, String) {
    let raw = msg.trim_start_matches(prefix).trim();
    match raw.split_once(char::is_whitespace) {
        Some((name, args)) => (name.to_lowercase(), args.trim().to_string()),
        None => (raw.to_lowercase(), String::new()),
    }
}

/// Literal `{{user}}` / `{{args}}` substitution; nothing else is interpreted.
pub fn render_template(template: &str, user: &str, args: &str) -> String {
    template.replace("{{user}}", user).replace("{{args}}", args)
}
