//! Chat permission tiers.

use serde::{Deserialize, Serialize};

/// Permission tier, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Everyone,
    Subscriber,
    Vip,
    Moderator,
    Broadcaster,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Everyone,
        Role::Subscriber,
        Role::Vip,
        Role::Moderator,
        Role::Broadcaster,
    ];

    /// Normalise a role label. Unknown or empty labels map to `Everyone`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "subscriber" => Self::Subscriber,
            "vip" => Self::Vip,
            "moderator" => Self::Moderator,
            "broadcaster" => Self::Broadcaster,
            _ => Self::Everyone,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Everyone => "everyone",
            Self::Subscriber => "subscriber",
            Self::Vip => "vip",
            Self::Moderator => "moderator",
            Self::Broadcaster => "broadcaster",
        }
    }

    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Whether a user holding `self` may run a command requiring `required`.
    pub fn allows(self, required: Role) -> bool {
        self >= required
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
