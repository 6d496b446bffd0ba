//! Entry point for toggle requests: validate, resolve, compose, send.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::database::{SwitchRecord, SwitchRegistry};
use crate::services::composer::{compose, TargetStatePayload};
use crate::services::control::ControlService;
use crate::services::downstream::DownstreamResponse;
use crate::services::error::DispatchError;
use crate::services::resolver::SwitchResolver;
use crate::types::{StateChangeBody, StateTransitionRequest, SwitchableRef, SwitchableType};

#[derive(Clone)]
pub struct StateDispatcher {
    registry: Arc<dyn SwitchRegistry>,
    control: Arc<dyn ControlService>,
    resolver: SwitchResolver,
}

impl StateDispatcher {
    pub fn new(registry: Arc<dyn SwitchRegistry>, control: Arc<dyn ControlService>) -> Self {
        Self {
            resolver: SwitchResolver::new(registry.clone()),
            registry,
            control,
        }
    }

    /// Both `actor` and `state` must be present
    pub fn validate(body: &StateChangeBody) -> Result<StateTransitionRequest, DispatchError> {
        match (&body.actor, body.state) {
            (Some(actor), Some(state)) => Ok(StateTransitionRequest {
                actor: actor.clone(),
                state,
            }),
            (actor, state) => {
                let missing: Vec<&str> = [("actor", actor.is_none()), ("state", state.is_none())]
                    .into_iter()
                    .filter_map(|(field, absent)| absent.then_some(field))
                    .collect();
                Err(DispatchError::BadRequest(missing.join(", ")))
            }
        }
    }

    /// Resolve a relay, wifi relay or action switch into the batch sent downstream
    pub async fn compose_batch(
        &self,
        reference: SwitchableRef,
        request: &StateTransitionRequest,
    ) -> Result<Vec<TargetStatePayload>, DispatchError> {
        let targets = self.resolver.resolve(reference, request.state).await?;
        Ok(targets
            .iter()
            .map(|resolved| {
                compose(
                    &resolved.target,
                    &request.actor,
                    request.state,
                    resolved.effective_state,
                )
            })
            .collect())
    }

    /// Handle one toggle request end to end and return the downstream reply
    pub async fn dispatch(
        &self,
        reference: SwitchableRef,
        body: StateChangeBody,
    ) -> Result<DownstreamResponse, DispatchError> {
        let span = tracing::info_span!(
            "dispatch",
            request_id = %Uuid::new_v4(),
            kind = %reference.kind,
            id = reference.id,
        );

        async move {
            let request = Self::validate(&body)?;

            let response = match reference.kind {
                SwitchableType::Mode => self.dispatch_mode(reference, &request).await?,
                _ => {
                    let batch = self.compose_batch(reference, &request).await?;
                    tracing::info!(
                        targets = batch.len(),
                        state = request.state,
                        actor = %request.actor,
                        "sending state batch"
                    );
                    self.control.post_states(&batch).await?
                }
            };

            tracing::debug!(status = %response.status, "state change accepted");
            Ok::<_, DispatchError>(response)
        }
        .instrument(span)
        .await
    }

    async fn dispatch_mode(
        &self,
        reference: SwitchableRef,
        request: &StateTransitionRequest,
    ) -> Result<DownstreamResponse, DispatchError> {
        let mode = match self.registry.lookup(reference.kind, reference.id).await? {
            Some(SwitchRecord::Mode(mode)) => mode,
            Some(other) => {
                return Err(DispatchError::Unroutable(SwitchableRef::new(
                    other.kind(),
                    other.id(),
                )))
            }
            None => return Err(DispatchError::NotFound(reference)),
        };

        tracing::info!(mode_key = %mode.mode_key, state = request.state, "sending mode change");
        Ok(self.control.post_mode_state(&mode.mode_key, request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::downstream::DownstreamError;
    use crate::testing::{InMemoryRegistry, RecordingControl};
    use axum::body::Bytes;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn body(actor: &str, state: bool) -> StateChangeBody {
        StateChangeBody {
            actor: Some(actor.to_string()),
            state: Some(state),
        }
    }

    fn registry() -> InMemoryRegistry {
        InMemoryRegistry::new()
            .relay(1, "r1")
            .relay(2, "r2")
            .wifi_relay(3, "shelly1", "shellies/awning")
            .action_switch(
                10,
                json!([
                    { "switch_type": "relay", "switch_id": 1, "on_state": true },
                    { "switch_type": "relay", "switch_id": 2, "on_state": false }
                ]),
            )
            .action_switch(
                11,
                json!([
                    { "switch_type": "relay", "switch_id": 1, "on_state": true },
                    { "switch_type": "relay", "switch_id": 99, "on_state": true }
                ]),
            )
            .mode(20, "night_mode")
    }

    fn setup(
        registry: InMemoryRegistry,
    ) -> (StateDispatcher, Arc<InMemoryRegistry>, Arc<RecordingControl>) {
        let registry = Arc::new(registry);
        let control = Arc::new(RecordingControl::new());
        let dispatcher = StateDispatcher::new(registry.clone(), control.clone());
        (dispatcher, registry, control)
    }

    fn sent(control: &RecordingControl) -> Vec<Value> {
        control
            .batches()
            .iter()
            .map(|batch| serde_json::to_value(batch).unwrap())
            .collect()
    }

    #[test]
    fn validate_lists_missing_fields() {
        let err = StateDispatcher::validate(&StateChangeBody::default()).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field(s): actor, state");

        let err = StateDispatcher::validate(&StateChangeBody {
            actor: Some("panel".to_string()),
            state: None,
        })
        .unwrap_err();
        assert!(matches!(err, DispatchError::BadRequest(fields) if fields == "state"));
    }

    #[tokio::test]
    async fn relay_on_sends_single_subscribe_payload() {
        let (dispatcher, _, control) = setup(registry());

        let response = dispatcher
            .dispatch(SwitchableRef::new(SwitchableType::Relay, 1), body("panel", true))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            sent(&control),
            vec![json!([{
                "switchable_type": "relay",
                "switchable_id": 1,
                "relay_position": "r1",
                "actor": "panel",
                "mode": "subscribe",
                "state": true
            }])]
        );
    }

    #[tokio::test]
    async fn wifi_relay_off_sends_unsubscribe_without_state() {
        let (dispatcher, _, control) = setup(registry());

        dispatcher
            .dispatch(SwitchableRef::new(SwitchableType::WifiRelay, 3), body("panel", false))
            .await
            .unwrap();
        assert_eq!(
            sent(&control),
            vec![json!([{
                "switchable_type": "wifi_relay",
                "switchable_id": 3,
                "vendor_id": "shelly1",
                "mqtt_topic": "shellies/awning",
                "actor": "panel",
                "mode": "unsubscribe"
            }])]
        );
    }

    #[tokio::test]
    async fn action_switch_on_sends_ordered_batch_with_member_states() {
        let (dispatcher, _, control) = setup(registry());

        dispatcher
            .dispatch(
                SwitchableRef::new(SwitchableType::ActionSwitch, 10),
                body("automation", true),
            )
            .await
            .unwrap();

        let batches = sent(&control);
        assert_eq!(batches.len(), 1);
        let batch = batches[0].as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0]["switchable_id"], 1);
        assert_eq!(batch[0]["state"], true);
        assert_eq!(batch[1]["switchable_id"], 2);
        assert_eq!(batch[1]["state"], false);
        assert!(batch.iter().all(|p| p["mode"] == "subscribe" && p["actor"] == "automation"));
    }

    #[tokio::test]
    async fn action_switch_off_unsubscribes_every_member() {
        let (dispatcher, _, control) = setup(registry());

        dispatcher
            .dispatch(
                SwitchableRef::new(SwitchableType::ActionSwitch, 10),
                body("panel", false),
            )
            .await
            .unwrap();

        let batch = sent(&control).remove(0);
        let batch = batch.as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch
            .iter()
            .all(|p| p["mode"] == "unsubscribe" && p.get("state").is_none()));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_and_nothing_is_sent() {
        let (dispatcher, _, control) = setup(registry());

        let result = dispatcher
            .dispatch(SwitchableRef::new(SwitchableType::Relay, 404), body("panel", true))
            .await;
        assert!(matches!(result, Err(DispatchError::NotFound(_))));
        assert!(control.batches().is_empty());
    }

    #[tokio::test]
    async fn unknown_mode_is_not_found_and_nothing_is_sent() {
        let (dispatcher, _, control) = setup(registry());

        let result = dispatcher
            .dispatch(SwitchableRef::new(SwitchableType::Mode, 404), body("panel", true))
            .await;
        assert!(matches!(
            result,
            Err(DispatchError::NotFound(SwitchableRef { kind: SwitchableType::Mode, id: 404 }))
        ));
        assert!(control.mode_calls().is_empty());
        assert!(control.batches().is_empty());
    }

    #[tokio::test]
    async fn invalid_body_is_rejected_before_any_lookup() {
        let (dispatcher, registry, control) = setup(registry());

        let result = dispatcher
            .dispatch(
                SwitchableRef::new(SwitchableType::Relay, 404),
                StateChangeBody {
                    actor: None,
                    state: Some(true),
                },
            )
            .await;
        assert!(matches!(result, Err(DispatchError::BadRequest(_))));
        assert_eq!(registry.lookup_count(), 0);
        assert!(control.batches().is_empty());
    }

    #[tokio::test]
    async fn missing_member_aborts_whole_batch() {
        let (dispatcher, _, control) = setup(registry());

        let result = dispatcher
            .dispatch(
                SwitchableRef::new(SwitchableType::ActionSwitch, 11),
                body("panel", true),
            )
            .await;
        assert!(matches!(
            result,
            Err(DispatchError::MemberNotFound { id: 11, member_id: 99, .. })
        ));
        assert!(control.batches().is_empty());
    }

    #[tokio::test]
    async fn repeated_requests_send_identical_batches() {
        let (dispatcher, _, control) = setup(registry());
        let reference = SwitchableRef::new(SwitchableType::ActionSwitch, 10);

        dispatcher.dispatch(reference, body("panel", true)).await.unwrap();
        dispatcher.dispatch(reference, body("panel", true)).await.unwrap();

        let batches = sent(&control);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], batches[1]);
    }

    #[tokio::test]
    async fn mode_is_sent_to_automation_by_key() {
        let (dispatcher, _, control) = setup(registry());

        dispatcher
            .dispatch(SwitchableRef::new(SwitchableType::Mode, 20), body("panel", false))
            .await
            .unwrap();

        assert!(control.batches().is_empty());
        assert_eq!(
            control.mode_calls(),
            vec![(
                "night_mode".to_string(),
                StateTransitionRequest {
                    actor: "panel".to_string(),
                    state: false
                }
            )]
        );
    }

    #[tokio::test]
    async fn downstream_rejection_is_returned_unchanged() {
        let registry = Arc::new(registry());
        let control = Arc::new(RecordingControl::replying(|| {
            Err(DownstreamError::Rejected(DownstreamResponse {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                content_type: None,
                body: Bytes::from_static(b"relay busy"),
            }))
        }));
        let dispatcher = StateDispatcher::new(registry, control.clone());

        let result = dispatcher
            .dispatch(SwitchableRef::new(SwitchableType::Relay, 2), body("panel", true))
            .await;
        match result {
            Err(DispatchError::Downstream(DownstreamError::Rejected(response))) => {
                assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(&response.body[..], b"relay busy");
            }
            other => panic!("expected downstream rejection, got {:?}", other),
        }
        assert_eq!(control.batches().len(), 1);
    }
}
