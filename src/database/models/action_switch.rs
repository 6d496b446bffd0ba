use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use thiserror::Error;

use crate::types::SwitchableType;

/// Composite switch driving several relays at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ActionSwitch {
    pub id: i32,
    pub name: String,
    pub icon: Option<String>,
    /// JSON array of `{ switch_type, switch_id, on_state }`
    pub switches: Value,
}

/// One member of an action switch, in stored order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSwitchMember {
    pub switch_type: SwitchableType,
    #[serde(deserialize_with = "deserialize_id")]
    pub switch_id: i32,
    /// Physical state the member takes when the action switch is turned on
    pub on_state: bool,
}

#[derive(Debug, Error)]
pub enum MemberError {
    #[error("switches of action switch {id} are malformed: {source}")]
    Malformed {
        id: i32,
        #[source]
        source: serde_json::Error,
    },

    #[error("member {index} of action switch {id} has unsupported type '{switch_type}'")]
    UnsupportedType {
        id: i32,
        index: usize,
        switch_type: SwitchableType,
    },
}

impl ActionSwitch {
    /// Parse the stored member list. Only relays and wifi relays may be members.
    pub fn members(&self) -> Result<Vec<ActionSwitchMember>, MemberError> {
        // Some writers store the array as a JSON string
        let parsed = match &self.switches {
            Value::String(raw) => serde_json::from_str::<Vec<ActionSwitchMember>>(raw),
            other => serde_json::from_value::<Vec<ActionSwitchMember>>(other.clone()),
        };
        let members = parsed.map_err(|source| MemberError::Malformed { id: self.id, source })?;

        for (index, member) in members.iter().enumerate() {
            if !matches!(
                member.switch_type,
                SwitchableType::Relay | SwitchableType::WifiRelay
            ) {
                return Err(MemberError::UnsupportedType {
                    id: self.id,
                    index,
                    switch_type: member.switch_type,
                });
            }
        }

        Ok(members)
    }
}

/// Member ids arrive either as numbers or numeric strings
fn deserialize_id<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(v) => i32::try_from(v).map_err(de::Error::custom),
        RawId::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}
