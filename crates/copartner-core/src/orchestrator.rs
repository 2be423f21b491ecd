//! Orchestrator: wires bus topics to a single router worker.
//!
//! Hotkey, voice and chat threads only publish; the bus callbacks turn those
//! events into [`Job`]s on a channel. One `router-worker` thread owns the
//! [`Session`] and handles jobs strictly in order, so backend latency never
//! blocks an input thread and router state is only ever touched by one thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use serde_json::{Map, Value};

use crate::backend::{create_backend, ResponseBackend};
use crate::command::CommandHandler;
use crate::config::Config;
use crate::event_bus::{panic_message, EventBus};
use crate::events::{self, ChatPayload};
use crate::firewall::InputFirewall;
use crate::memory::{create_memory, infer_priority, message_metadata, MemoryStore, Priority};
use crate::message::InboundMessage;
use crate::output::{create_sink, ReplySink};
use crate::router::{IntentRouter, RouterStage};

const WORKER_TAG: &str = "router-worker";

/// Work item for the router worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Inbound { message: InboundMessage, role: String },
    SetAutoReply(bool),
    RespondNow,
    RespondSuggestion,
    SetContext(Option<String>),
    ReloadCommands,
    Shutdown,
}

/// Components a [`Session`] is assembled from.
pub struct SessionParts {
    pub router: IntentRouter,
    pub commands: CommandHandler,
    pub backend: Box<dyn ResponseBackend>,
    pub memory: Arc<dyn MemoryStore>,
    pub sink: Box<dyn ReplySink>,
    pub bus: Arc<EventBus>,
}

/// Everything the worker mutates. Not shared; lives on the worker thread.
pub struct Session {
    router: IntentRouter,
    commands: CommandHandler,
    backend: Box<dyn ResponseBackend>,
    memory: Arc<dyn MemoryStore>,
    sink: Box<dyn ReplySink>,
    bus: Arc<EventBus>,
    firewall: InputFirewall,
    context: Option<String>,
}

impl Session {
    pub fn new(parts: SessionParts) -> Self {
        Self {
            router: parts.router,
            commands: parts.commands,
            backend: parts.backend,
            memory: parts.memory,
            sink: parts.sink,
            bus: parts.bus,
            firewall: InputFirewall::new(),
            context: None,
        }
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    /// Handle one job. Returns the reply text if one was released.
    pub fn handle(&mut self, job: Job) -> Option<String> {
        match job {
            Job::Inbound { message, role } => self.on_inbound(message, &role),
            Job::SetAutoReply(enabled) => {
                self.router.set_auto_reply(enabled);
                None
            }
            Job::RespondNow => self.on_trigger("Respond-now", IntentRouter::trigger_respond_now),
            Job::RespondSuggestion => {
                self.on_trigger("Respond-to-suggestion", IntentRouter::trigger_respond_to_suggestion)
            }
            Job::SetContext(context) => {
                log::debug!("Vision context {}", if context.is_some() { "updated" } else { "cleared" });
                self.context = context;
                None
            }
            Job::ReloadCommands => {
                let n = self.commands.reload();
                log::info!("Commands reloaded: {n} custom");
                None
            }
            Job::Shutdown => None,
        }
    }

    fn on_inbound(&mut self, message: InboundMessage, role: &str) -> Option<String> {
        let message = InboundMessage {
            text: self.firewall.sanitize(&message.text),
            ..message
        };

        // Commands are a chat feature; speech never triggers them.
        if !message.source.is_voice() {
            if let Some(result) = self.commands.handle_chat_message(&message.text, &message.user, role) {
                let mut meta = message_metadata(&message, Priority::Low);
                if let Some(name) = result.data.get("command") {
                    meta.insert("command".into(), name.clone());
                }
                self.remember(&message.text, meta);
                if let Err(e) = self.sink.notice(&result) {
                    log::error!("Sink '{}' failed to deliver command result: {e:#}", self.sink.name());
                }
                return None;
            }
        }

        self.remember(&message.text, message_metadata(&message, infer_priority(message.source)));
        self.bus.publish(events::MESSAGE_RECEIVED, &events::received_payload(&message));
        self.router.register_message(message);
        self.route()
    }

    /// A trigger answers the message pending when it fires, never a later one.
    fn on_trigger(&mut self, name: &str, trigger: fn(&mut IntentRouter)) -> Option<String> {
        if self.router.stage() == RouterStage::Idle {
            log::info!("{name} ignored: no pending message");
            return None;
        }
        trigger(&mut self.router);
        let reply = self.route();
        self.router.clear_triggers();
        reply
    }

    fn route(&mut self) -> Option<String> {
        let had_suggestion = self.router.suggestion().is_some();
        match self.router.route_intent(self.backend.as_ref(), self.context.as_deref()) {
            Ok(Some(reply)) => {
                self.deliver(&reply);
                Some(reply)
            }
            Ok(None) => {
                if !had_suggestion {
                    if let Some(suggestion) = self.router.suggestion() {
                        self.sink.suggest(&suggestion.draft);
                    }
                }
                None
            }
            Err(e) => {
                log::error!("Backend '{}' failed: {e}; staying silent", self.backend.name());
                None
            }
        }
    }

    fn deliver(&mut self, reply: &str) {
        if let Err(e) = self.sink.speak(reply) {
            log::error!("Sink '{}' failed to deliver reply: {e:#}", self.sink.name());
        }
        let mut meta = Map::new();
        meta.insert("source".into(), Value::from("assistant"));
        meta.insert("priority".into(), Value::from(Priority::Normal.as_str()));
        self.remember(reply, meta);
        self.bus.publish(events::MESSAGE_REPLIED, &events::replied_payload(reply));
    }

    fn remember(&self, text: &str, metadata: Map<String, Value>) {
        if let Err(e) = self.memory.append(text, metadata) {
            log::error!("Memory append failed: {e:#}");
        }
    }
}

// ── Worker ──────────────────────────────────────────────────────────────

/// A [`Session`] running on its own thread, fed through an mpsc channel.
pub struct Worker {
    tx: Sender<Job>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(mut session: Session) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = std::thread::Builder::new()
            .name(WORKER_TAG.into())
            .spawn(move || {
                log::info!("Router worker started");
                while let Ok(job) = rx.recv() {
                    if job == Job::Shutdown {
                        break;
                    }
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| session.handle(job))) {
                        log::error!("Router worker recovered from panic: {}", panic_message(panic.as_ref()));
                    }
                }
                log::info!("Router worker stopped");
            })
            .context("spawn router worker thread")?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    pub fn sender(&self) -> Sender<Job> {
        self.tx.clone()
    }

    /// Queue a job. Returns `false` if the worker has stopped.
    pub fn submit(&self, job: Job) -> bool {
        self.tx.send(job).is_ok()
    }

    /// Stop after the jobs already queued, and wait for the thread.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(Job::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Router worker thread panicked");
            }
        }
    }
}

// ── Orchestrator ────────────────────────────────────────────────────────

pub struct Orchestrator {
    bus: Arc<EventBus>,
    memory: Arc<dyn MemoryStore>,
    worker: Worker,
}

impl Orchestrator {
    /// Build every component from config and start the worker.
    pub fn start(cfg: &Config) -> anyhow::Result<Self> {
        let bus = Arc::new(EventBus::new());
        let memory: Arc<dyn MemoryStore> = Arc::new(create_memory(&cfg.memory));
        let session = Session::new(SessionParts {
            router: IntentRouter::from_config(&cfg.router),
            commands: CommandHandler::from_config(&cfg.commands),
            backend: create_backend(&cfg.backend),
            memory: memory.clone(),
            sink: create_sink(&cfg.output),
            bus: bus.clone(),
        });
        log::info!(
            "Orchestrator: backend={}, auto_reply={}",
            session.backend.name(),
            session.router.permissions().auto_reply_enabled,
        );
        Self::from_parts(bus, memory, session)
    }

    /// Start a worker for a pre-built session and subscribe it to the bus.
    /// `bus` and `memory` should be the ones the session was built with.
    pub fn from_parts(bus: Arc<EventBus>, memory: Arc<dyn MemoryStore>, session: Session) -> anyhow::Result<Self> {
        let worker = Worker::spawn(session)?;
        wire(&bus, &worker.sender());
        Ok(Self { bus, memory, worker })
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    /// Queue a job directly, bypassing the bus.
    pub fn submit(&self, job: Job) -> bool {
        self.worker.submit(job)
    }

    pub fn shutdown(self) {
        self.worker.shutdown();
    }
}

fn wire(bus: &EventBus, tx: &Sender<Job>) {
    forward(bus, events::VOICE_TRANSCRIBED, tx, |p| {
        events::decode_voice(p).map(|message| Job::Inbound {
            message,
            role: "everyone".into(),
        })
    });
    forward(bus, events::CHAT_RECEIVED, tx, |p| {
        events::decode_chat(p).map(|ChatPayload { message, role }| Job::Inbound { message, role })
    });
    forward(bus, events::AUTO_REPLY_SET, tx, |p| events::decode_auto_reply(p).map(Job::SetAutoReply));
    forward(bus, events::RESPOND_NOW, tx, |_| Some(Job::RespondNow));
    forward(bus, events::RESPOND_SUGGESTION, tx, |_| Some(Job::RespondSuggestion));
    forward(bus, events::VISION_CONTEXT, tx, |p| events::decode_vision(p).map(Job::SetContext));

    bus.subscribe(events::MESSAGE_RECEIVED, "activity-log", |p| {
        log::info!("[AI] message received: {p}");
        Ok(())
    });
    bus.subscribe(events::MESSAGE_REPLIED, "activity-log", |p| {
        log::info!("[AI] message replied: {p}");
        Ok(())
    });
}

fn forward<F>(bus: &EventBus, topic: &str, tx: &Sender<Job>, decode: F)
where
    F: Fn(&Value) -> Option<Job> + Send + Sync + 'static,
{
    let tx = tx.clone();
    bus.subscribe(topic, WORKER_TAG, move |payload| {
        if let Some(job) = decode(payload) {
            tx.send(job).map_err(|_| anyhow::anyhow!("router worker has stopped"))?;
        }
        Ok(())
    });
}
