//! Interactive text loop: the operator's console.
//!
//! Lines starting with a known `/control` drive the assistant; everything
//! else is published as chat from the operator (role broadcaster).

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use serde_json::json;

use copartner_core::events::{AUTO_REPLY_SET, CHAT_RECEIVED, RESPOND_NOW, RESPOND_SUGGESTION, VISION_CONTEXT, VOICE_TRANSCRIBED};
use copartner_core::memory::MemoryStore;
use copartner_core::{Job, Orchestrator};

pub const USAGE: &str = "\
Controls:
  /auto on|off      auto-reply to chat
  /respond          reply to the pending chat message now
  /suggest          send the queued suggestion
  /voice <text>     simulate spoken input
  /vision <text>    set screen context (empty clears)
  /memory <word>    search memory
  /reload           reload commands.json
  /quit             exit
Anything else is sent as chat from you.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Empty,
    Quit,
    AutoReply(bool),
    RespondNow,
    RespondSuggestion,
    Voice(String),
    Vision(Option<String>),
    Memory(String),
    Reload,
    Usage(&'static str),
    Chat(String),
}

pub fn parse_line(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Empty;
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (line, ""),
    };
    match head.to_lowercase().as_str() {
        "/quit" | "/exit" | "/q" => Line::Quit,
        "/auto" => match rest.to_lowercase().as_str() {
            "on" => Line::AutoReply(true),
            "off" => Line::AutoReply(false),
            _ => Line::Usage("usage: /auto on|off"),
        },
        "/respond" => Line::RespondNow,
        "/suggest" => Line::RespondSuggestion,
        "/voice" if rest.is_empty() => Line::Usage("usage: /voice <text>"),
        "/voice" => Line::Voice(rest.to_string()),
        "/vision" => Line::Vision((!rest.is_empty()).then(|| rest.to_string())),
        "/memory" if rest.is_empty() => Line::Usage("usage: /memory <keyword>"),
        "/memory" => Line::Memory(rest.to_string()),
        "/reload" => Line::Reload,
        "/controls" | "/?" => Line::Usage(USAGE),
        _ => Line::Chat(line.to_string()),
    }
}

/// Read lines until EOF or `/quit`.
pub fn run(
    input: impl BufRead,
    orchestrator: &Orchestrator,
    operator: &str,
    auto_reply: &AtomicBool,
) -> Result<()> {
    println!("Type a message, or /? for controls.");
    for line in input.lines() {
        let line = line?;
        if !apply(parse_line(&line), orchestrator, operator, auto_reply) {
            break;
        }
    }
    Ok(())
}

/// Act on one parsed line. Returns `false` to stop the loop.
fn apply(line: Line, orchestrator: &Orchestrator, operator: &str, auto_reply: &AtomicBool) -> bool {
    let bus = orchestrator.bus();
    match line {
        Line::Empty => {}
        Line::Quit => return false,
        Line::AutoReply(enabled) => {
            auto_reply.store(enabled, Ordering::SeqCst);
            bus.publish(AUTO_REPLY_SET, &json!({ "enabled": enabled }));
        }
        Line::RespondNow => {
            bus.publish(RESPOND_NOW, &json!({}));
        }
        Line::RespondSuggestion => {
            bus.publish(RESPOND_SUGGESTION, &json!({}));
        }
        Line::Voice(text) => {
            bus.publish(VOICE_TRANSCRIBED, &json!({ "text": text }));
        }
        Line::Vision(description) => {
            bus.publish(VISION_CONTEXT, &json!({ "description": description }));
        }
        Line::Memory(keyword) => match orchestrator.memory().search(&keyword) {
            Ok(items) if items.is_empty() => println!("(no memories matching {keyword:?})"),
            Ok(items) => {
                for item in items {
                    let source = item.metadata.get("source").and_then(|v| v.as_str()).unwrap_or("?");
                    println!("{} [{source}] {}", item.timestamp.format("%Y-%m-%d %H:%M:%S"), item.text);
                }
            }
            Err(e) => log::error!("Memory search failed: {e:#}"),
        },
        Line::Reload => {
            orchestrator.submit(Job::ReloadCommands);
        }
        Line::Usage(text) => println!("{text}"),
        Line::Chat(text) => {
            bus.publish(
                CHAT_RECEIVED,
                &json!({ "user": operator, "text": text, "role": "broadcaster", "source": "cli" }),
            );
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_aliases() {
        for q in ["/quit", "/exit", "/q", "  /QUIT  "] {
            assert_eq!(parse_line(q), Line::Quit, "{q}");
        }
    }

    #[test]
    fn auto_reply_switch() {
        assert_eq!(parse_line("/auto on"), Line::AutoReply(true));
        assert_eq!(parse_line("/auto OFF"), Line::AutoReply(false));
        assert!(matches!(parse_line("/auto maybe"), Line::Usage(_)));
    }

    #[test]
    fn payload_controls() {
        assert_eq!(parse_line("/voice  what's  next"), Line::Voice("what's  next".into()));
        assert!(matches!(parse_line("/voice"), Line::Usage(_)));
        assert_eq!(parse_line("/vision Blender, sculpt mode"), Line::Vision(Some("Blender, sculpt mode".into())));
        assert_eq!(parse_line("/vision"), Line::Vision(None));
        assert_eq!(parse_line("/memory boss"), Line::Memory("boss".into()));
    }

    #[test]
    fn everything_else_is_chat() {
        assert_eq!(parse_line("hello chat"), Line::Chat("hello chat".into()));
        assert_eq!(parse_line("!so bob"), Line::Chat("!so bob".into()));
        // Unknown slash words go to the command handler.
        assert_eq!(parse_line("/help"), Line::Chat("/help".into()));
        assert_eq!(parse_line("   "), Line::Empty);
    }
}
