//! Intent Router: the gate every inbound message passes before a reply is released.
//!
//! Voice input is direct address and always answered. Chat-origin input is
//! gated by the auto-reply master switch and two one-shot triggers; without
//! them the router runs in co-pilot mode and only queues a draft suggestion.
//!
//! Every released reply comes from two backend calls: a draft pass and a
//! verify pass over that draft. Only verify output is ever returned.
//!
//! The router never speaks, stores memory or retries; backend errors go
//! straight back to the caller.

pub mod prompt;

use crate::backend::{BackendError, ResponseBackend};
use crate::config::RouterConfig;
use crate::message::InboundMessage;

use prompt::PromptBuilder;

/// Permission switches. Mutated only through the router's control API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionState {
    pub auto_reply_enabled: bool,
    pub respond_now_requested: bool,
    pub respond_to_suggestion_requested: bool,
}

/// A co-pilot draft waiting for operator approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedResponse {
    pub message: InboundMessage,
    pub draft: String,
}

/// Where the router stands with respect to its pending message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterStage {
    /// Nothing to respond to (never registered, or already answered).
    Idle,
    /// A message is registered and no suggestion is queued.
    MessageRegistered,
    /// A draft suggestion is queued for the registered message.
    Drafted,
}

pub struct IntentRouter {
    permissions: PermissionState,
    last_message: Option<InboundMessage>,
    suggestion: Option<SuggestedResponse>,
    prompts: PromptBuilder,
}

impl IntentRouter {
    pub fn new(prompts: PromptBuilder) -> Self {
        Self {
            permissions: PermissionState::default(),
            last_message: None,
            suggestion: None,
            prompts,
        }
    }

    pub fn from_config(cfg: &RouterConfig) -> Self {
        let mut router = Self::new(PromptBuilder::new(&cfg.operator_name));
        if cfg.auto_reply {
            router.set_auto_reply(true);
        }
        router
    }

    // ── Permission controls ─────────────────────────────────────────────

    pub fn set_auto_reply(&mut self, enabled: bool) {
        self.permissions.auto_reply_enabled = enabled;
        log::info!("Auto-reply set to {enabled}");
    }

    pub fn trigger_respond_now(&mut self) {
        self.permissions.respond_now_requested = true;
        log::info!("Respond-now triggered");
    }

    pub fn trigger_respond_to_suggestion(&mut self) {
        self.permissions.respond_to_suggestion_requested = true;
        log::info!("Respond-to-suggestion triggered");
    }

    /// Drop any one-shot trigger that routing did not consume.
    pub fn clear_triggers(&mut self) {
        let p = &mut self.permissions;
        if p.respond_now_requested || p.respond_to_suggestion_requested {
            log::debug!("Unconsumed triggers cleared");
        }
        p.respond_now_requested = false;
        p.respond_to_suggestion_requested = false;
    }

    // ── Input registration ──────────────────────────────────────────────

    /// Replace the pending message. Any queued suggestion answered the
    /// previous message, so it is discarded unconditionally.
    pub fn register_message(&mut self, message: InboundMessage) {
        if self.suggestion.take().is_some() {
            log::info!("Queued suggestion discarded by new message");
        }
        log::debug!("Message registered from {} ({})", message.user, message.source);
        self.last_message = Some(message);
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn permissions(&self) -> PermissionState {
        self.permissions
    }

    pub fn last_message(&self) -> Option<&InboundMessage> {
        self.last_message.as_ref()
    }

    pub fn suggestion(&self) -> Option<&SuggestedResponse> {
        self.suggestion.as_ref()
    }

    pub fn stage(&self) -> RouterStage {
        match (&self.last_message, &self.suggestion) {
            (None, _) => RouterStage::Idle,
            (Some(_), None) => RouterStage::MessageRegistered,
            (Some(_), Some(_)) => RouterStage::Drafted,
        }
    }

    // ── Routing ─────────────────────────────────────────────────────────

    /// Decide whether the pending message gets a reply.
    ///
    /// Returns the verified reply text, or `None` when the router must stay
    /// silent. `context` is an optional description (e.g. of the screen)
    /// added to both passes.
    pub fn route_intent(
        &mut self,
        backend: &dyn ResponseBackend,
        context: Option<&str>,
    ) -> Result<Option<String>, BackendError> {
        let Some(message) = self.last_message.clone() else {
            return Ok(None);
        };

        if message.source.is_voice() {
            log::debug!("Voice input: responding");
            return self.respond(backend, &message, context).map(Some);
        }

        if self.permissions.auto_reply_enabled {
            log::debug!("Auto-reply on: responding to {}", message.user);
            return self.respond(backend, &message, context).map(Some);
        }

        if self.permissions.respond_now_requested {
            self.permissions.respond_now_requested = false;
            log::debug!("Respond-now consumed: responding to {}", message.user);
            return self.respond(backend, &message, context).map(Some);
        }

        // Co-pilot mode: queue a draft, speak only on explicit approval.
        if self.suggestion.is_none() {
            let draft = self.draft(backend, &message, context)?;
            self.suggestion = Some(SuggestedResponse { message, draft });
            log::info!("Suggested response queued (not spoken)");
        }

        if self.permissions.respond_to_suggestion_requested {
            if let Some(suggestion) = self.suggestion.clone() {
                self.permissions.respond_to_suggestion_requested = false;
                let verified = self.verify(backend, &suggestion.message, context, &suggestion.draft)?;
                self.suggestion = None;
                self.last_message = None;
                log::info!("Approved suggestion released");
                return Ok(Some(verified));
            }
        }

        Ok(None)
    }

    /// Full two-pass generation for the pending message.
    fn respond(
        &mut self,
        backend: &dyn ResponseBackend,
        message: &InboundMessage,
        context: Option<&str>,
    ) -> Result<String, BackendError> {
        let draft = self.draft(backend, message, context)?;
        let verified = self.verify(backend, message, context, &draft)?;
        self.last_message = None;
        self.suggestion = None;
        Ok(verified)
    }

    fn draft(
        &self,
        backend: &dyn ResponseBackend,
        message: &InboundMessage,
        context: Option<&str>,
    ) -> Result<String, BackendError> {
        log::debug!("Drafting response via {}", backend.name());
        backend.generate(self.prompts.system_prompt(), &self.prompts.draft(message, context))
    }

    fn verify(
        &self,
        backend: &dyn ResponseBackend,
        message: &InboundMessage,
        context: Option<&str>,
        draft: &str,
    ) -> Result<String, BackendError> {
        log::debug!("Verifying draft via {}", backend.name());
        backend.generate(self.prompts.system_prompt(), &self.prompts.verify(message, context, draft))
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new(PromptBuilder::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use prompt::{CONTEXT_HEADER, DRAFT_HEADER};

    /// Records every call; replies "draft:<n>" to draft prompts and
    /// "final:<n>" to verify prompts, or fails on the configured call.
    #[derive(Default)]
    struct ScriptedBackend {
        calls: Mutex<Vec<String>>,
        fail_on_call: Option<usize>,
    }

    impl ScriptedBackend {
        fn failing_on(call: usize) -> Self {
            Self { fail_on_call: Some(call), ..Default::default() }
        }
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
        fn prompt(&self, idx: usize) -> String {
            self.calls.lock().unwrap()[idx].clone()
        }
    }

    impl ResponseBackend for ScriptedBackend {
        fn generate(&self, _system: &str, user: &str) -> Result<String, BackendError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(user.to_string());
            let n = calls.len();
            if self.fail_on_call == Some(n) {
                return Err(BackendError::Request("timeout".into()));
            }
            if user.contains(DRAFT_HEADER) {
                Ok(format!("final:{n}"))
            } else {
                Ok(format!("draft:{n}"))
            }
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn nothing_registered_returns_none() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        assert_eq!(router.route_intent(&backend, None).unwrap(), None);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(router.stage(), RouterStage::Idle);
    }

    #[test]
    fn voice_always_gets_two_pass_reply() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.register_message(InboundMessage::voice("open the logs"));

        let reply = router.route_intent(&backend, None).unwrap();
        assert_eq!(reply.as_deref(), Some("final:2"));
        assert_eq!(backend.call_count(), 2);
        assert!(!backend.prompt(0).contains(DRAFT_HEADER));
        assert!(backend.prompt(1).contains("DRAFT RESPONSE:\ndraft:1"));
        assert_eq!(router.suggestion(), None);
    }

    #[test]
    fn voice_ignores_permission_state() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.trigger_respond_to_suggestion();
        router.register_message(InboundMessage::voice("hi"));

        assert!(router.route_intent(&backend, None).unwrap().is_some());
        assert_eq!(backend.call_count(), 2);
        // Voice doesn't consume chat triggers.
        assert!(router.permissions().respond_to_suggestion_requested);
    }

    #[test]
    fn answered_message_is_not_answered_again() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.register_message(InboundMessage::voice("hi"));
        router.route_intent(&backend, None).unwrap();

        assert_eq!(router.stage(), RouterStage::Idle);
        assert_eq!(router.route_intent(&backend, None).unwrap(), None);
        assert_eq!(backend.call_count(), 2);
    }

    #[test]
    fn auto_reply_bypasses_suggestion_queue() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.set_auto_reply(true);
        router.register_message(InboundMessage::chat("viewer1", "hello"));

        assert_eq!(router.route_intent(&backend, None).unwrap().as_deref(), Some("final:2"));
        assert_eq!(router.suggestion(), None);
        assert!(router.permissions().auto_reply_enabled);
    }

    #[test]
    fn respond_now_is_consumed_once() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.trigger_respond_now();
        router.trigger_respond_now();
        router.register_message(InboundMessage::chat("viewer1", "first"));

        assert!(router.route_intent(&backend, None).unwrap().is_some());
        assert!(!router.permissions().respond_now_requested);

        router.register_message(InboundMessage::chat("viewer2", "second"));
        for _ in 0..3 {
            assert_eq!(router.route_intent(&backend, None).unwrap(), None);
            assert!(!router.permissions().respond_now_requested);
        }
        // Two passes for the first message, one draft for the second.
        assert_eq!(backend.call_count(), 3);
    }

    #[test]
    fn copilot_queues_then_releases_on_approval() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.register_message(InboundMessage::chat("viewer1", "what game is this?"));

        assert_eq!(router.route_intent(&backend, None).unwrap(), None);
        assert_eq!(backend.call_count(), 1);
        assert_eq!(router.stage(), RouterStage::Drafted);
        assert_eq!(router.suggestion().unwrap().draft, "draft:1");

        // Routing again without a trigger neither re-drafts nor speaks.
        assert_eq!(router.route_intent(&backend, None).unwrap(), None);
        assert_eq!(backend.call_count(), 1);

        router.trigger_respond_to_suggestion();
        let reply = router.route_intent(&backend, None).unwrap();
        assert_eq!(reply.as_deref(), Some("final:2"));
        assert!(backend.prompt(1).contains("DRAFT RESPONSE:\ndraft:1"));
        assert_eq!(router.suggestion(), None);
        assert!(!router.permissions().respond_to_suggestion_requested);

        assert_eq!(router.route_intent(&backend, None).unwrap(), None);
        assert_eq!(backend.call_count(), 2);
    }

    #[test]
    fn new_message_discards_stale_suggestion() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.register_message(InboundMessage::chat("a", "message A"));
        router.route_intent(&backend, None).unwrap();
        assert!(router.suggestion().is_some());

        router.register_message(InboundMessage::chat("b", "message B"));
        assert_eq!(router.suggestion(), None);
        assert_eq!(router.stage(), RouterStage::MessageRegistered);

        router.trigger_respond_to_suggestion();
        let reply = router.route_intent(&backend, None).unwrap();
        assert_eq!(reply.as_deref(), Some("final:3"));
        // Fresh draft for B, verified against B, never A's draft.
        assert!(backend.prompt(1).contains("b: message B"));
        assert!(backend.prompt(2).contains("b: message B"));
        assert!(backend.prompt(2).contains("DRAFT RESPONSE:\ndraft:2"));
        assert!(!backend.prompt(2).contains("draft:1"));
    }

    #[test]
    fn respond_now_supersedes_queued_suggestion() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.register_message(InboundMessage::chat("a", "hi"));
        router.route_intent(&backend, None).unwrap();
        assert!(router.suggestion().is_some());

        router.trigger_respond_now();
        assert!(router.route_intent(&backend, None).unwrap().is_some());
        assert_eq!(router.suggestion(), None);
    }

    #[test]
    fn clear_triggers_leaves_auto_reply_alone() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.set_auto_reply(true);
        router.trigger_respond_now();
        router.trigger_respond_to_suggestion();
        router.clear_triggers();
        assert_eq!(
            router.permissions(),
            PermissionState { auto_reply_enabled: true, ..Default::default() }
        );

        // Nothing pending: routing is a no-op and calls no backend.
        assert_eq!(router.route_intent(&backend, None).unwrap(), None);
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn draft_failure_propagates_and_queues_nothing() {
        let backend = ScriptedBackend::failing_on(1);
        let mut router = IntentRouter::default();
        router.register_message(InboundMessage::chat("a", "hi"));

        assert!(router.route_intent(&backend, None).is_err());
        assert_eq!(router.suggestion(), None);
        assert_eq!(router.stage(), RouterStage::MessageRegistered);
    }

    #[test]
    fn verify_failure_never_releases_draft() {
        let backend = ScriptedBackend::failing_on(2);
        let mut router = IntentRouter::default();
        router.register_message(InboundMessage::voice("hi"));

        let err = router.route_intent(&backend, None).unwrap_err();
        assert_eq!(err, BackendError::Request("timeout".into()));
        // The message is still pending; nothing was spoken.
        assert_eq!(router.stage(), RouterStage::MessageRegistered);
    }

    #[test]
    fn failed_approval_keeps_suggestion_for_retry() {
        let backend = ScriptedBackend::failing_on(2);
        let mut router = IntentRouter::default();
        router.register_message(InboundMessage::chat("a", "hi"));
        router.route_intent(&backend, None).unwrap();

        router.trigger_respond_to_suggestion();
        assert!(router.route_intent(&backend, None).is_err());
        assert!(!router.permissions().respond_to_suggestion_requested);
        assert_eq!(router.suggestion().map(|s| s.draft.as_str()), Some("draft:1"));

        router.trigger_respond_to_suggestion();
        assert_eq!(router.route_intent(&backend, None).unwrap().as_deref(), Some("final:3"));
    }

    #[test]
    fn context_reaches_both_passes() {
        let backend = ScriptedBackend::default();
        let mut router = IntentRouter::default();
        router.register_message(InboundMessage::voice("what am I looking at?"));
        router.route_intent(&backend, Some("Firefox: docs.rs")).unwrap();

        assert!(backend.prompt(0).starts_with(CONTEXT_HEADER));
        assert!(backend.prompt(1).contains("Firefox: docs.rs"));
    }

    #[test]
    fn from_config_applies_auto_reply() {
        let cfg = RouterConfig { auto_reply: true, ..Default::default() };
        assert!(IntentRouter::from_config(&cfg).permissions().auto_reply_enabled);
    }
}
