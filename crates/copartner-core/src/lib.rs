//! copartner-core: routing and gating core of the copartner desktop assistant.
//!
//! Provides the event bus, intent router, command handler, memory, response
//! backends, speech and output adapters, and the orchestrator that wires them.
//! The `copartner` binary adds the CLI, logging, hotkeys and the text loop.

pub mod backend;
pub mod command;
pub mod config;
pub mod event_bus;
pub mod events;
pub mod firewall;
pub mod memory;
pub mod message;
pub mod orchestrator;
pub mod output;
pub mod router;
pub mod speech;

pub use event_bus::EventBus;
pub use message::{InboundMessage, MessageSource};
pub use orchestrator::{Job, Orchestrator};
pub use router::IntentRouter;
