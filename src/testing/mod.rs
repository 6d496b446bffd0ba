//! In-memory stand-ins for the registry and the control services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::database::models::{ActionSwitch, Mode, Relay, WifiRelay};
use crate::database::{DatabaseError, SwitchRecord, SwitchRegistry};
use crate::services::composer::TargetStatePayload;
use crate::services::control::ControlService;
use crate::services::downstream::{DownstreamError, DownstreamResponse};
use crate::types::{StateTransitionRequest, SwitchableType};

/// Registry seeded in code, counting every lookup
#[derive(Default)]
pub struct InMemoryRegistry {
    records: HashMap<(SwitchableType, i32), SwitchRecord>,
    lookups: AtomicUsize,
    unavailable: bool,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: SwitchRecord) -> Self {
        self.records.insert((record.kind(), record.id()), record);
        self
    }

    pub fn relay(self, id: i32, relay_position: &str) -> Self {
        self.with_record(SwitchRecord::Relay(Relay {
            id,
            name: format!("Relay {}", id),
            relay_position: relay_position.to_string(),
            icon: None,
        }))
    }

    pub fn wifi_relay(self, id: i32, vendor_id: &str, mqtt_topic: &str) -> Self {
        self.with_record(SwitchRecord::WifiRelay(WifiRelay {
            id,
            name: format!("Wifi relay {}", id),
            icon: None,
            vendor_id: vendor_id.to_string(),
            mqtt_topic: mqtt_topic.to_string(),
            relay_position: None,
        }))
    }

    pub fn action_switch(self, id: i32, switches: Value) -> Self {
        self.with_record(SwitchRecord::ActionSwitch(ActionSwitch {
            id,
            name: format!("Action switch {}", id),
            icon: None,
            switches,
        }))
    }

    pub fn mode(self, id: i32, mode_key: &str) -> Self {
        self.with_record(SwitchRecord::Mode(Mode {
            id,
            name: format!("Mode {}", id),
            mode_key: mode_key.to_string(),
            icon: None,
        }))
    }

    /// Make `ping` fail like an unreachable database
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwitchRegistry for InMemoryRegistry {
    async fn lookup(
        &self,
        kind: SwitchableType,
        id: i32,
    ) -> Result<Option<SwitchRecord>, DatabaseError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.get(&(kind, id)).cloned())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        if self.unavailable {
            Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

/// Control service that records every call instead of sending it
pub struct RecordingControl {
    batches: Mutex<Vec<Vec<TargetStatePayload>>>,
    mode_calls: Mutex<Vec<(String, StateTransitionRequest)>>,
    reply: Mutex<Box<dyn Fn() -> Result<DownstreamResponse, DownstreamError> + Send>>,
}

impl Default for RecordingControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingControl {
    pub fn new() -> Self {
        Self::replying(|| Ok(DownstreamResponse::json(StatusCode::OK, &json!({ "ok": true }))))
    }

    pub fn replying<F>(reply: F) -> Self
    where
        F: Fn() -> Result<DownstreamResponse, DownstreamError> + Send + 'static,
    {
        Self {
            batches: Mutex::new(Vec::new()),
            mode_calls: Mutex::new(Vec::new()),
            reply: Mutex::new(Box::new(reply)),
        }
    }

    pub fn batches(&self) -> Vec<Vec<TargetStatePayload>> {
        lock(&self.batches).clone()
    }

    pub fn mode_calls(&self) -> Vec<(String, StateTransitionRequest)> {
        lock(&self.mode_calls).clone()
    }

    fn reply(&self) -> Result<DownstreamResponse, DownstreamError> {
        (lock(&self.reply))()
    }
}

#[async_trait]
impl ControlService for RecordingControl {
    async fn post_states(
        &self,
        batch: &[TargetStatePayload],
    ) -> Result<DownstreamResponse, DownstreamError> {
        lock(&self.batches).push(batch.to_vec());
        self.reply()
    }

    async fn post_mode_state(
        &self,
        mode_key: &str,
        request: &StateTransitionRequest,
    ) -> Result<DownstreamResponse, DownstreamError> {
        lock(&self.mode_calls).push((mode_key.to_string(), request.clone()));
        self.reply()
    }
}

/// Lock even if a panicking test poisoned the mutex
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
