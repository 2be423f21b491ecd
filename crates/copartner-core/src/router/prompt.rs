//! Prompt builder for the draft and verify passes.

use crate::message::InboundMessage;

pub const CONTEXT_HEADER: &str = "VISION CONTEXT:";
pub const MESSAGE_HEADER: &str = "MESSAGE:";
pub const DRAFT_HEADER: &str = "DRAFT RESPONSE:";

pub(crate) const DRAFT_TASK: &str = "TASK: Draft a helpful response. Do not over-explain.";
pub(crate) const VERIFY_TASK: &str = "TASK: Verify the draft matches the context. Fix errors. \
Shorten if needed. If confidence is low, ask one question instead.";

/// Builds the (system, user) prompt pair for each pass.
///
/// The behavioural rules live in the system prompt and are identical for
/// both passes; context, message, draft and task go in the user prompt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
}

impl PromptBuilder {
    pub fn new(operator_name: &str) -> Self {
        let system = [
            format!("You are an AI co-partner assisting {operator_name}."),
            "Rules:".to_string(),
            "- Be concise and step-by-step.".to_string(),
            "- Do NOT guess.".to_string(),
            "- If uncertain, ask ONE short question.".to_string(),
            "- Stay calm and respectful.".to_string(),
        ]
        .join("\n");
        Self { system }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system
    }

    pub fn draft(&self, message: &InboundMessage, context: Option<&str>) -> String {
        let mut parts = self.common(message, context);
        parts.push(DRAFT_TASK.to_string());
        parts.join("\n")
    }

    pub fn verify(&self, message: &InboundMessage, context: Option<&str>, draft: &str) -> String {
        let mut parts = self.common(message, context);
        parts.push(DRAFT_HEADER.to_string());
        parts.push(draft.to_string());
        parts.push(VERIFY_TASK.to_string());
        parts.join("\n")
    }

    fn common(&self, message: &InboundMessage, context: Option<&str>) -> Vec<String> {
        let mut parts = Vec::with_capacity(7);
        if let Some(ctx) = context.map(str::trim).filter(|c| !c.is_empty()) {
            parts.push(CONTEXT_HEADER.to_string());
            parts.push(ctx.to_string());
        }
        parts.push(MESSAGE_HEADER.to_string());
        parts.push(format!("{}: {}", message.user, message.text));
        parts
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("the operator")
    }
}
