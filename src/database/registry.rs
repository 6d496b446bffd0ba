//! Read-only lookup of switchable records by type and id.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{ActionSwitch, Mode, Relay, WifiRelay};
use crate::types::SwitchableType;

/// Stored record for any switchable type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwitchRecord {
    Relay(Relay),
    WifiRelay(WifiRelay),
    ActionSwitch(ActionSwitch),
    Mode(Mode),
}

impl SwitchRecord {
    pub fn kind(&self) -> SwitchableType {
        match self {
            SwitchRecord::Relay(_) => SwitchableType::Relay,
            SwitchRecord::WifiRelay(_) => SwitchableType::WifiRelay,
            SwitchRecord::ActionSwitch(_) => SwitchableType::ActionSwitch,
            SwitchRecord::Mode(_) => SwitchableType::Mode,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            SwitchRecord::Relay(r) => r.id,
            SwitchRecord::WifiRelay(r) => r.id,
            SwitchRecord::ActionSwitch(r) => r.id,
            SwitchRecord::Mode(r) => r.id,
        }
    }
}

/// Persistent store of switchable records.
///
/// `lookup` reports absence as `Ok(None)`; `Err` is reserved for storage failures.
#[async_trait]
pub trait SwitchRegistry: Send + Sync {
    async fn lookup(
        &self,
        kind: SwitchableType,
        id: i32,
    ) -> Result<Option<SwitchRecord>, DatabaseError>;

    /// Connectivity check used by the health endpoint
    async fn ping(&self) -> Result<(), DatabaseError>;
}

const SELECT_RELAY: &str = "SELECT id, name, relay_position, icon FROM relays WHERE id = $1";
const SELECT_WIFI_RELAY: &str =
    "SELECT id, name, icon, vendor_id, mqtt_topic, relay_position FROM wifi_relays WHERE id = $1";
const SELECT_ACTION_SWITCH: &str =
    "SELECT id, name, icon, switches FROM action_switches WHERE id = $1";
const SELECT_MODE: &str = "SELECT id, name, key, icon FROM modes WHERE id = $1";

/// Postgres-backed registry
#[derive(Clone)]
pub struct PgSwitchRegistry {
    pool: PgPool,
}

impl PgSwitchRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SwitchRegistry for PgSwitchRegistry {
    async fn lookup(
        &self,
        kind: SwitchableType,
        id: i32,
    ) -> Result<Option<SwitchRecord>, DatabaseError> {
        let record = match kind {
            SwitchableType::Relay => sqlx::query_as::<_, Relay>(SELECT_RELAY)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(SwitchRecord::Relay),
            SwitchableType::WifiRelay => sqlx::query_as::<_, WifiRelay>(SELECT_WIFI_RELAY)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(SwitchRecord::WifiRelay),
            SwitchableType::ActionSwitch => sqlx::query_as::<_, ActionSwitch>(SELECT_ACTION_SWITCH)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(SwitchRecord::ActionSwitch),
            SwitchableType::Mode => sqlx::query_as::<_, Mode>(SELECT_MODE)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(SwitchRecord::Mode),
        };

        tracing::debug!(%kind, id, found = record.is_some(), "registry lookup");
        Ok(record)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}
