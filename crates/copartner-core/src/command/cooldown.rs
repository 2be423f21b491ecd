//! Cooldown ledger: last-use timestamps per command and per (command, user).
//!
//! Entries are never evicted; the maps grow with the number of distinct
//! commands and chatters seen over the process lifetime.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct CooldownLedger {
    global: HashMap<String, Instant>,
    per_user: HashMap<(String, String), Instant>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining wait before `command` may run for `user`, or `None` if both
    /// gates are open. The global window is checked first. A zero window
    /// disables that gate.
    pub fn remaining(
        &self,
        command: &str,
        user: &str,
        now: Instant,
        global_window: Duration,
        user_window: Duration,
    ) -> Option<Duration> {
        if let Some(wait) = wait_left(self.global.get(command), now, global_window) {
            return Some(wait);
        }
        let key = (command.to_string(), user.to_string());
        wait_left(self.per_user.get(&key), now, user_window)
    }

    /// Stamp both ledgers for a successful invocation.
    pub fn mark_used(&mut self, command: &str, user: &str, now: Instant) {
        self.global.insert(command.to_string(), now);
        self.per_user.insert((command.to_string(), user.to_string()), now);
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.per_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_user.is_empty()
    }
}

fn wait_left(last: Option<&Instant>, now: Instant, window: Duration) -> Option<Duration> {
    let last = last?;
    if window.is_zero() {
        return None;
    }
    let elapsed = now.saturating_duration_since(*last);
    (elapsed < window).then(|| window - elapsed)
}
