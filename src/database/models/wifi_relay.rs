use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Network relay addressed over MQTT rather than GPIO
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WifiRelay {
    pub id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub vendor_id: String,
    pub mqtt_topic: String,
    pub relay_position: Option<String>,
}
