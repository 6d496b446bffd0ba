use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::DownstreamResponse;
use crate::types::{StateChangeBody, SwitchableRef, SwitchableType};

type StateResult = Result<DownstreamResponse, ApiError>;

/// POST /relays/:id/state - Toggle a wired relay
pub async fn relay(
    State(app): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<StateChangeBody>, JsonRejection>,
) -> StateResult {
    toggle(app, SwitchableType::Relay, id, body).await
}

/// POST /wifi_relays/:id/state - Toggle a wifi relay
pub async fn wifi_relay(
    State(app): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<StateChangeBody>, JsonRejection>,
) -> StateResult {
    toggle(app, SwitchableType::WifiRelay, id, body).await
}

/// POST /action_switches/:id/state - Toggle every member of an action switch
pub async fn action_switch(
    State(app): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<StateChangeBody>, JsonRejection>,
) -> StateResult {
    toggle(app, SwitchableType::ActionSwitch, id, body).await
}

/// POST /modes/:id/state - Turn an automation mode on or off
pub async fn mode(
    State(app): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<StateChangeBody>, JsonRejection>,
) -> StateResult {
    toggle(app, SwitchableType::Mode, id, body).await
}

async fn toggle(
    app: AppState,
    kind: SwitchableType,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<StateChangeBody>, JsonRejection>,
) -> StateResult {
    let Path(id) = id.map_err(|e| {
        ApiError::bad_request(format!("Invalid {} id: {}", kind, e.body_text()))
    })?;
    let Json(body) = body.map_err(|e| ApiError::invalid_json(e.body_text()))?;

    let response = app
        .dispatcher
        .dispatch(SwitchableRef::new(kind, id), body)
        .await?;
    Ok(response)
}
