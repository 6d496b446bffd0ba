//! Builds the per-target state payloads sent to the device-control service.

use serde::Serialize;

use crate::database::models::{Relay, WifiRelay};
use crate::database::SwitchRecord;
use crate::types::{SubscriptionMode, SwitchableType};

/// Physical target a state change can be written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Relay(Relay),
    WifiRelay(WifiRelay),
}

impl Target {
    pub fn kind(&self) -> SwitchableType {
        match self {
            Target::Relay(_) => SwitchableType::Relay,
            Target::WifiRelay(_) => SwitchableType::WifiRelay,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Target::Relay(relay) => relay.id,
            Target::WifiRelay(relay) => relay.id,
        }
    }
}

impl TryFrom<SwitchRecord> for Target {
    type Error = SwitchRecord;

    fn try_from(record: SwitchRecord) -> Result<Self, Self::Error> {
        match record {
            SwitchRecord::Relay(relay) => Ok(Target::Relay(relay)),
            SwitchRecord::WifiRelay(relay) => Ok(Target::WifiRelay(relay)),
            other @ (SwitchRecord::ActionSwitch(_) | SwitchRecord::Mode(_)) => Err(other),
        }
    }
}

/// Type-specific identity of a target on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TargetAddress {
    Relay {
        relay_position: String,
    },
    WifiRelay {
        vendor_id: String,
        mqtt_topic: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        relay_position: Option<String>,
    },
}

/// One element of the batch posted to the device-control service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatePayload {
    pub switchable_type: SwitchableType,
    pub switchable_id: i32,
    #[serde(flatten)]
    pub address: TargetAddress,
    pub actor: String,
    pub mode: SubscriptionMode,
    /// Only present when subscribing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
}

/// Compose the payload for one target.
///
/// `requested` is the logical direction of the change. `effective` overrides the
/// physical state written when turning on (action switch members carry their
/// configured `on_state` here); it is ignored when turning off.
pub fn compose(
    target: &Target,
    actor: &str,
    requested: bool,
    effective: Option<bool>,
) -> TargetStatePayload {
    let address = match target {
        Target::Relay(relay) => TargetAddress::Relay {
            relay_position: relay.relay_position.clone(),
        },
        Target::WifiRelay(relay) => TargetAddress::WifiRelay {
            vendor_id: relay.vendor_id.clone(),
            mqtt_topic: relay.mqtt_topic.clone(),
            relay_position: relay.relay_position.clone(),
        },
    };

    TargetStatePayload {
        switchable_type: target.kind(),
        switchable_id: target.id(),
        address,
        actor: actor.to_string(),
        mode: SubscriptionMode::from(requested),
        state: requested.then(|| effective.unwrap_or(true)),
    }
}
