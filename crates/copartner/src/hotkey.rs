//! Global hotkeys: operator controls published onto the bus.
//!
//! Ctrl+Shift+F10 toggles auto-reply, F11 asks for an immediate reply to the
//! pending chat message, F12 approves the queued suggestion (all configurable).
//! Registration and delivery happen on a winit event loop on the main thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use serde_json::json;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use copartner_core::config::HotkeyConfig;
use copartner_core::events::{AUTO_REPLY_SET, RESPOND_NOW, RESPOND_SUGGESTION};
use copartner_core::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    ToggleAutoReply,
    RespondNow,
    RespondSuggestion,
}

/// Parse a shortcut string like "Ctrl+Shift+F10".
pub fn parse_shortcut(s: &str) -> Result<HotKey> {
    s.trim()
        .parse::<HotKey>()
        .map_err(|e| anyhow::anyhow!("invalid shortcut {s:?}: {e}"))
}

/// Parsed shortcuts and the action each one fires.
pub struct HotkeyBindings {
    bindings: Vec<(HotKey, HotkeyAction)>,
}

impl HotkeyBindings {
    /// Invalid shortcuts are logged and left unbound.
    pub fn from_config(cfg: &HotkeyConfig) -> Self {
        let wanted = [
            (&cfg.auto_reply_toggle, HotkeyAction::ToggleAutoReply),
            (&cfg.respond_now, HotkeyAction::RespondNow),
            (&cfg.respond_suggestion, HotkeyAction::RespondSuggestion),
        ];
        let bindings = wanted
            .into_iter()
            .filter_map(|(shortcut, action)| match parse_shortcut(shortcut) {
                Ok(hk) => Some((hk, action)),
                Err(e) => {
                    log::warn!("{e}; {action:?} hotkey disabled");
                    None
                }
            })
            .collect();
        Self { bindings }
    }

    pub fn action_for(&self, id: u32) -> Option<HotkeyAction> {
        self.bindings
            .iter()
            .find(|(hk, _)| hk.id() == id)
            .map(|(_, action)| *action)
    }

    pub fn hotkeys(&self) -> impl Iterator<Item = HotKey> + '_ {
        self.bindings.iter().map(|(hk, _)| *hk)
    }
}

/// Translate one hotkey event into a bus publication.
///
/// `auto_reply` mirrors the router's switch so the toggle knows which way to flip.
pub fn dispatch(
    event: &GlobalHotKeyEvent,
    bindings: &HotkeyBindings,
    bus: &EventBus,
    auto_reply: &AtomicBool,
) -> Option<HotkeyAction> {
    if event.state != HotKeyState::Pressed {
        return None;
    }
    let action = bindings.action_for(event.id)?;
    match action {
        HotkeyAction::ToggleAutoReply => {
            let enabled = !auto_reply.fetch_xor(true, Ordering::SeqCst);
            log::info!("Hotkey: auto-reply {}", if enabled { "ON" } else { "OFF" });
            bus.publish(AUTO_REPLY_SET, &json!({ "enabled": enabled }));
        }
        HotkeyAction::RespondNow => {
            log::info!("Hotkey: respond now");
            bus.publish(RESPOND_NOW, &json!({}));
        }
        HotkeyAction::RespondSuggestion => {
            log::info!("Hotkey: respond to suggestion");
            bus.publish(RESPOND_SUGGESTION, &json!({}));
        }
    }
    Some(action)
}

/// Hotkey events are drained at least this often, even when the OS posts
/// nothing to the event loop (X11 delivers them from a background thread).
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Routes drained hotkey events onto the bus.
pub struct HotkeyDispatcher {
    bindings: HotkeyBindings,
    bus: Arc<EventBus>,
    auto_reply: Arc<AtomicBool>,
}

impl HotkeyDispatcher {
    pub fn new(bindings: HotkeyBindings, bus: Arc<EventBus>, auto_reply: Arc<AtomicBool>) -> Self {
        Self { bindings, bus, auto_reply }
    }

    /// Dispatch every event in `events`. Returns how many fired an action.
    pub fn pump(&self, events: impl IntoIterator<Item = GlobalHotKeyEvent>) -> usize {
        events
            .into_iter()
            .filter_map(|event| dispatch(&event, &self.bindings, &self.bus, &self.auto_reply))
            .count()
    }
}

/// Register the configured hotkeys. `None` when nothing could be registered;
/// the caller carries on without hotkeys. The manager must stay alive for as
/// long as the hotkeys should stay registered.
pub fn setup_hotkeys(cfg: &HotkeyConfig) -> Option<(GlobalHotKeyManager, HotkeyBindings)> {
    let bindings = HotkeyBindings::from_config(cfg);
    let manager = match GlobalHotKeyManager::new() {
        Ok(m) => m,
        Err(e) => {
            log::warn!("Global hotkeys unavailable: {e}. Use the text controls instead.");
            return None;
        }
    };

    let mut registered = 0;
    for hk in bindings.hotkeys() {
        match manager.register(hk) {
            Ok(()) => registered += 1,
            Err(e) => log::warn!("Failed to register hotkey {hk:?}: {e}"),
        }
    }
    if registered == 0 {
        log::warn!("No hotkeys registered. Use the text controls instead.");
        return None;
    }
    log::info!(
        "Hotkeys: {} auto-reply, {} respond now, {} respond to suggestion",
        cfg.auto_reply_toggle,
        cfg.respond_now,
        cfg.respond_suggestion
    );
    Some((manager, bindings))
}

// ── Event loop ───────────────────────────────────────────────────────────

enum AppEvent {
    ConsoleClosed,
}

struct App {
    _manager: GlobalHotKeyManager,
    dispatcher: HotkeyDispatcher,
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _window_id: WindowId, _event: WindowEvent) {}

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::ConsoleClosed => {
                log::debug!("Console closed; leaving hotkey loop");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let rx = GlobalHotKeyEvent::receiver();
        self.dispatcher.pump(std::iter::from_fn(|| rx.try_recv().ok()));
        event_loop.set_control_flow(ControlFlow::wait_duration(POLL_INTERVAL));
    }
}

/// Run `console` with global hotkeys live.
///
/// The native event loop that Windows and macOS need for hotkey delivery
/// owns the main thread; `console` runs on its own thread and ends the loop
/// when it returns. Without a usable event loop or any registered hotkey,
/// `console` simply runs on the calling thread.
pub fn run_with_console<F>(
    cfg: &HotkeyConfig,
    bus: Arc<EventBus>,
    auto_reply: Arc<AtomicBool>,
    console: F,
) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send,
{
    let event_loop = match EventLoop::<AppEvent>::with_user_event().build() {
        Ok(el) => el,
        Err(e) => {
            log::warn!("No event loop for global hotkeys ({e}). Use the text controls instead.");
            return console();
        }
    };
    let Some((manager, bindings)) = setup_hotkeys(cfg) else {
        return console();
    };

    let proxy = event_loop.create_proxy();
    let mut app = App {
        _manager: manager,
        dispatcher: HotkeyDispatcher::new(bindings, bus, auto_reply),
    };

    std::thread::scope(|s| {
        let console_thread = std::thread::Builder::new()
            .name("console".into())
            .spawn_scoped(s, move || {
                let result = console();
                let _ = proxy.send_event(AppEvent::ConsoleClosed);
                result
            })
            .context("spawn console thread")?;

        if let Err(e) = event_loop.run_app(&mut app) {
            log::error!("Hotkey event loop stopped: {e}. Text controls still work.");
        }
        console_thread
            .join()
            .map_err(|_| anyhow::anyhow!("console thread panicked"))?
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use global_hotkey::hotkey::{Code, Modifiers};
    use std::sync::Mutex;

    fn capture(bus: &EventBus) -> Arc<Mutex<Vec<(String, serde_json::Value)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for topic in [AUTO_REPLY_SET, RESPOND_NOW, RESPOND_SUGGESTION] {
            let seen = seen.clone();
            bus.subscribe(topic, "test", move |p| {
                seen.lock().unwrap().push((topic.to_string(), p.clone()));
                Ok(())
            });
        }
        seen
    }

    fn pressed(hk: HotKey) -> GlobalHotKeyEvent {
        GlobalHotKeyEvent { id: hk.id(), state: HotKeyState::Pressed }
    }

    #[test]
    fn default_shortcuts_parse() {
        let hk = parse_shortcut("Ctrl+Shift+F10").unwrap();
        let expected = HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::F10);
        assert_eq!(hk.id(), expected.id());
        assert_eq!(HotkeyBindings::from_config(&HotkeyConfig::default()).hotkeys().count(), 3);
    }

    #[test]
    fn invalid_shortcut_is_unbound() {
        let cfg = HotkeyConfig {
            respond_now: "Ctrl+Banana".into(),
            ..Default::default()
        };
        let bindings = HotkeyBindings::from_config(&cfg);
        assert_eq!(bindings.hotkeys().count(), 2);
        assert!(parse_shortcut("Ctrl+Banana").is_err());
    }

    #[test]
    fn toggle_flips_and_publishes() {
        let cfg = HotkeyConfig::default();
        let bindings = HotkeyBindings::from_config(&cfg);
        let bus = EventBus::new();
        let seen = capture(&bus);
        let auto = AtomicBool::new(false);
        let toggle = parse_shortcut(&cfg.auto_reply_toggle).unwrap();

        assert_eq!(dispatch(&pressed(toggle), &bindings, &bus, &auto), Some(HotkeyAction::ToggleAutoReply));
        assert!(auto.load(Ordering::SeqCst));
        dispatch(&pressed(toggle), &bindings, &bus, &auto);
        assert!(!auto.load(Ordering::SeqCst));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (AUTO_REPLY_SET.to_string(), json!({"enabled": true})));
        assert_eq!(seen[1], (AUTO_REPLY_SET.to_string(), json!({"enabled": false})));
    }

    #[test]
    fn triggers_publish_their_topics() {
        let cfg = HotkeyConfig::default();
        let bindings = HotkeyBindings::from_config(&cfg);
        let bus = EventBus::new();
        let seen = capture(&bus);
        let auto = AtomicBool::new(false);

        dispatch(&pressed(parse_shortcut(&cfg.respond_now).unwrap()), &bindings, &bus, &auto);
        dispatch(&pressed(parse_shortcut(&cfg.respond_suggestion).unwrap()), &bindings, &bus, &auto);

        let topics: Vec<String> = seen.lock().unwrap().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(topics, vec![RESPOND_NOW.to_string(), RESPOND_SUGGESTION.to_string()]);
    }

    #[test]
    fn pump_drains_every_queued_event() {
        let cfg = HotkeyConfig::default();
        let bus = Arc::new(EventBus::new());
        let seen = capture(&bus);
        let auto = Arc::new(AtomicBool::new(false));
        let dispatcher = HotkeyDispatcher::new(HotkeyBindings::from_config(&cfg), bus, auto.clone());
        let toggle = parse_shortcut(&cfg.auto_reply_toggle).unwrap();
        let now = parse_shortcut(&cfg.respond_now).unwrap();

        let events = vec![
            pressed(toggle),
            GlobalHotKeyEvent { id: now.id(), state: HotKeyState::Released },
            pressed(now),
        ];
        assert_eq!(dispatcher.pump(events), 2);
        assert!(auto.load(Ordering::SeqCst));
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(dispatcher.pump(std::iter::empty()), 0);
    }

    #[test]
    fn released_and_unrelated_events_are_ignored() {
        let cfg = HotkeyConfig::default();
        let bindings = HotkeyBindings::from_config(&cfg);
        let bus = EventBus::new();
        let seen = capture(&bus);
        let auto = AtomicBool::new(false);
        let hk = parse_shortcut(&cfg.respond_now).unwrap();

        let released = GlobalHotKeyEvent { id: hk.id(), state: HotKeyState::Released };
        assert_eq!(dispatch(&released, &bindings, &bus, &auto), None);
        let unrelated = GlobalHotKeyEvent { id: 99999, state: HotKeyState::Pressed };
        assert_eq!(dispatch(&unrelated, &bindings, &bus, &auto), None);
        assert!(seen.lock().unwrap().is_empty());
    }
}
