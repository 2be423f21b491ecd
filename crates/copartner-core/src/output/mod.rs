//! Reply sinks: where released replies and command results go.

#[cfg(feature = "type-text")]
pub mod type_text;

use std::io::Write;

use crate::command::CommandResult;
use crate::config::OutputConfig;

/// Trait for reply output backends.
pub trait ReplySink: Send + Sync {
    /// Deliver a verified reply.
    fn speak(&self, text: &str) -> anyhow::Result<()>;

    /// Deliver a command result. Successful results are spoken; rejections
    /// are only logged.
    fn notice(&self, result: &CommandResult) -> anyhow::Result<()> {
        if result.is_ok() {
            self.speak(&result.message)
        } else {
            log::info!("Command result {:?}: {}", result.status, result.message);
            Ok(())
        }
    }

    /// A co-pilot draft is queued for approval. Nothing is delivered yet.
    fn suggest(&self, draft: &str) {
        log::info!("Suggestion queued: {draft}");
    }

    fn name(&self) -> &str;
}

/// Prints replies to stdout.
pub struct ConsoleSink;

impl ReplySink for ConsoleSink {
    fn speak(&self, text: &str) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", format_reply(text))?;
        out.flush()?;
        Ok(())
    }

    fn notice(&self, result: &CommandResult) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", format_notice(result))?;
        Ok(())
    }

    fn suggest(&self, draft: &str) {
        println!("(suggestion, not sent) {draft}");
    }

    fn name(&self) -> &str {
        "console"
    }
}

pub fn format_reply(text: &str) -> String {
    format!("copartner> {text}")
}

pub fn format_notice(result: &CommandResult) -> String {
    let status = serde_json::to_value(result.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    format!("[{status}] {}", result.message)
}

/// Create the configured sink, falling back to the console.
pub fn create_sink(cfg: &OutputConfig) -> Box<dyn ReplySink> {
    match cfg.backend.as_str() {
        "console" => Box::new(ConsoleSink),
        "type-text" => {
            #[cfg(feature = "type-text")]
            { Box::new(type_text::TypeTextSink) }
            #[cfg(not(feature = "type-text"))]
            {
                log::warn!("type-text output not compiled in; using console");
                Box::new(ConsoleSink)
            }
        }
        other => {
            log::warn!("Unknown output backend '{other}'; using console");
            Box::new(ConsoleSink)
        }
    }
}
