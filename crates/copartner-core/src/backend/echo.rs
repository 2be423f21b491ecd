//! Echo backend: offline stand-in that needs no model.
//!
//! Draft prompts get the message text back; verify prompts get the draft back.
//! The pass is told apart by the task line that ends every router prompt.

use super::{BackendError, ResponseBackend};
use crate::router::prompt::{DRAFT_HEADER, MESSAGE_HEADER, VERIFY_TASK};

pub struct EchoBackend;

impl ResponseBackend for EchoBackend {
    fn generate(&self, _system_prompt: &str, user_prompt: &str) -> Result<String, BackendError> {
        let lines: Vec<&str> = user_prompt.lines().collect();
        let (task, body) = match lines.split_last() {
            Some((task, body)) if task.starts_with("TASK:") => (*task, body),
            _ => return Err(BackendError::Malformed("prompt does not end with a TASK line".into())),
        };
        let start = body
            .iter()
            .position(|l| *l == MESSAGE_HEADER)
            .ok_or_else(|| BackendError::Malformed("prompt has no MESSAGE section".into()))?;
        let body = &body[start + 1..];

        if task == VERIFY_TASK {
            let split = body
                .iter()
                .position(|l| *l == DRAFT_HEADER)
                .ok_or_else(|| BackendError::Malformed("verify prompt has no DRAFT RESPONSE section".into()))?;
            return Ok(body[split + 1..].join("\n"));
        }

        let message = body.join("\n");
        let text = message.split_once(": ").map_or(message.as_str(), |(_, t)| t);
        Ok(format!("heard: {text}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::InboundMessage;
    use crate::router::prompt::PromptBuilder;

    #[test]
    fn echoes_message_on_draft() {
        let prompt = PromptBuilder::default().draft(&InboundMessage::chat("bob", "hello there"), None);
        assert_eq!(EchoBackend.generate("", &prompt).unwrap(), "heard: hello there");
    }

    #[test]
    fn echoes_draft_on_verify() {
        let msg = InboundMessage::chat("bob", "hello");
        let prompt = PromptBuilder::default().verify(&msg, Some("a terminal"), "heard: hello");
        assert_eq!(EchoBackend.generate("", &prompt).unwrap(), "heard: hello");
    }

    #[test]
    fn multi_line_message_is_echoed_whole() {
        let builder = PromptBuilder::default();
        let msg = InboundMessage::chat("bob", "first line\nsecond line");
        let draft = EchoBackend.generate("", &builder.draft(&msg, None)).unwrap();
        assert_eq!(draft, "heard: first line\nsecond line");

        let verified = EchoBackend.generate("", &builder.verify(&msg, None, &draft)).unwrap();
        assert_eq!(verified, draft);
    }

    #[test]
    fn draft_header_inside_message_stays_a_draft_pass() {
        let msg = InboundMessage::chat("bob", format!("look:\n{DRAFT_HEADER}\nnot a draft"));
        let prompt = PromptBuilder::default().draft(&msg, None);
        assert_eq!(
            EchoBackend.generate("", &prompt).unwrap(),
            format!("heard: look:\n{DRAFT_HEADER}\nnot a draft")
        );
    }

    #[test]
    fn unstructured_prompt_is_malformed() {
        assert!(matches!(EchoBackend.generate("", "just text"), Err(BackendError::Malformed(_))));
        assert!(matches!(
            EchoBackend.generate("", "no message here\nTASK: draft"),
            Err(BackendError::Malformed(_))
        ));
    }
}
