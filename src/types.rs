//! Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of switchable entity a client can toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchableType {
    Relay,
    WifiRelay,
    ActionSwitch,
    Mode,
}

impl SwitchableType {
    /// Wire name, also used in payloads and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchableType::Relay => "relay",
            SwitchableType::WifiRelay => "wifi_relay",
            SwitchableType::ActionSwitch => "action_switch",
            SwitchableType::Mode => "mode",
        }
    }
}

impl fmt::Display for SwitchableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one logical switch; built from request parameters, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchableRef {
    pub kind: SwitchableType,
    pub id: i32,
}

impl SwitchableRef {
    pub fn new(kind: SwitchableType, id: i32) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for SwitchableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Inbound toggle body as received; both fields must be present to dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeBody {
    pub actor: Option<String>,
    pub state: Option<bool>,
}

/// Validated toggle request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionRequest {
    pub actor: String,
    pub state: bool,
}

/// Downstream vocabulary for the direction of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionMode {
    Subscribe,
    Unsubscribe,
}

impl From<bool> for SubscriptionMode {
    fn from(state: bool) -> Self {
        if state {
            SubscriptionMode::Subscribe
        } else {
            SubscriptionMode::Unsubscribe
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_display_with_wire_names() {
        assert_eq!(
            SwitchableRef::new(SwitchableType::ActionSwitch, 7).to_string(),
            "action_switch 7"
        );
        assert_eq!(
            serde_json::to_value(SwitchableType::WifiRelay).unwrap(),
            serde_json::json!(SwitchableType::WifiRelay.as_str())
        );
    }

    #[test]
    fn subscription_mode_follows_state() {
        assert_eq!(SubscriptionMode::from(true), SubscriptionMode::Subscribe);
        assert_eq!(
            serde_json::to_value(SubscriptionMode::from(false)).unwrap(),
            serde_json::json!("unsubscribe")
        );
    }
}
