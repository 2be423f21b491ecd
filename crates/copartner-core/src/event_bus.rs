//! EventBus — in-process publish/subscribe keyed by topic name.
//!
//! Producers (hotkeys, voice, vision, the text loop) publish JSON payloads;
//! consumers subscribe with a human-readable tag that shows up in the logs.
//! Dispatch is synchronous on the publisher's thread, in subscription order.
//! Every callback is isolated: an `Err` or a panic is logged and the
//! remaining subscribers still run.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Subscriber callback. Returning `Err` is logged, never propagated.
pub type Callback = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
struct Subscription {
    tag: String,
    callback: Callback,
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Callbacks that were invoked.
    pub invoked: usize,
    /// Callbacks that returned an error or panicked.
    pub failed: usize,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Subscription>>>,
}

impl EventBus {
    pub fn new() -> Self {
        log::debug!("EventBus initialised");
        Self::default()
    }

    /// Register `callback` for `event`. Duplicate registrations all fire.
    pub fn subscribe<F>(&self, event: &str, tag: &str, callback: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let sub = Subscription {
            tag: tag.to_string(),
            callback: Arc::new(callback),
        };
        let mut map = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(event.to_string()).or_default().push(sub);
        log::info!("Subscribed '{tag}' to '{event}'");
    }

    /// Invoke every subscriber of `event` with `payload`.
    ///
    /// The subscriber list is snapshotted first, so callbacks may publish or
    /// subscribe re-entrantly. Subscriptions added during dispatch only see
    /// later events.
    pub fn publish(&self, event: &str, payload: &Value) -> Delivery {
        let subs: Vec<Subscription> = {
            let map = self
                .subscribers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match map.get(event) {
                Some(subs) => subs.clone(),
                None => Vec::new(),
            }
        };

        if subs.is_empty() {
            log::debug!("No subscribers for '{event}'");
            return Delivery::default();
        }

        log::debug!("Publishing '{event}' to {} subscriber(s): {payload}", subs.len());

        let mut delivery = Delivery::default();
        for sub in &subs {
            delivery.invoked += 1;
            match catch_unwind(AssertUnwindSafe(|| (sub.callback)(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    delivery.failed += 1;
                    log::error!("Subscriber '{}' failed on '{event}': {e:#}", sub.tag);
                }
                Err(panic) => {
                    delivery.failed += 1;
                    log::error!(
                        "Subscriber '{}' panicked on '{event}': {}",
                        sub.tag,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        delivery
    }

    /// Number of subscriptions currently registered for `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(event)
            .map_or(0, Vec::len)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    "unknown panic payload".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |label: &str| -> Callback {
            let log = log_clone.clone();
            let label = label.to_string();
            Arc::new(move |_: &Value| {
                log.lock().unwrap().push(label.clone());
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        let delivery = bus.publish("nobody.listens", &json!({"x": 1}));
        assert_eq!(delivery, Delivery::default());
    }

    #[test]
    fn subscribers_fire_in_order_including_duplicates() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        bus.subscribe("topic", "a", move |v| a(v));
        bus.subscribe("topic", "b", move |v| b(v));
        let a2 = make("a");
        bus.subscribe("topic", "a-again", move |v| a2(v));

        let delivery = bus.publish("topic", &Value::Null);
        assert_eq!(delivery.invoked, 3);
        assert_eq!(delivery.failed, 0);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "a"]);
    }

    #[test]
    fn failing_subscriber_does_not_stop_siblings() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.subscribe("topic", "errs", |_| anyhow::bail!("boom"));
        bus.subscribe("topic", "panics", |_| panic!("kaboom"));
        let after = make("after");
        bus.subscribe("topic", "after", move |v| after(v));

        let delivery = bus.publish("topic", &json!({}));
        assert_eq!(delivery.invoked, 3);
        assert_eq!(delivery.failed, 2);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn topics_are_independent() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        bus.subscribe("one", "a", move |v| a(v));
        bus.publish("two", &Value::Null);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.subscriber_count("one"), 1);
        assert_eq!(bus.subscriber_count("two"), 0);
    }

    #[test]
    fn callbacks_may_publish_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let (log, make) = recorder();
        let inner = make("inner");
        bus.subscribe("inner", "inner", move |v| inner(v));

        let bus_clone = bus.clone();
        bus.subscribe("outer", "forwarder", move |v| {
            bus_clone.publish("inner", v);
            Ok(())
        });

        bus.publish("outer", &json!({"n": 1}));
        assert_eq!(*log.lock().unwrap(), vec!["inner"]);
    }

    #[test]
    fn payload_reaches_subscriber() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        bus.subscribe("voice.transcribed", "probe", move |v| {
            *seen_clone.lock().unwrap() = v["text"].as_str().map(String::from);
            Ok(())
        });
        bus.publish("voice.transcribed", &json!({"text": "hello"}));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("hello"));
    }
}
