use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    Json,
};
use serde_json::Value;
use url::Url;

use crate::app::AppState;
use crate::config::{is_valid_tier, DownstreamConfig};
use crate::error::ApiError;
use crate::services::downstream::join_segments;
use crate::services::{DownstreamError, DownstreamResponse, ForwardRequest};

type ForwardResult = Result<DownstreamResponse, ApiError>;

const TOKEN_AUTH: HeaderName = HeaderName::from_static("token_auth");

/// Parts of the inbound request relayed to the device and automation APIs
struct Inbound {
    method: Method,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

/// GET|POST /relays/state - Relay states on the device API
pub async fn relays_state(
    State(app): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ForwardResult {
    let inbound = Inbound {
        method,
        query,
        headers,
        body,
    };
    let root = &app.config.downstream.vanpi_api_root_url;
    passthrough(&app, root, &["relays", "state"], inbound).await
}

/// GET /usb_devices - Connected USB devices
pub async fn usb_devices(
    State(app): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ForwardResult {
    let inbound = Inbound {
        method,
        query,
        headers,
        body,
    };
    let root = &app.config.downstream.vanpi_api_root_url;
    passthrough(&app, root, &["usb_devices"], inbound).await
}

/// GET /batteries/:connection_type/:device_type/:device_id/state
pub async fn battery_state(
    State(app): State<AppState>,
    Path((connection_type, device_type, device_id)): Path<(String, String, String)>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ForwardResult {
    let inbound = Inbound {
        method,
        query,
        headers,
        body,
    };
    let root = &app.config.downstream.vanpi_api_root_url;
    let segments = [
        "batteries",
        path_param(&connection_type)?,
        path_param(&device_type)?,
        path_param(&device_id)?,
        "state",
    ];
    passthrough(&app, root, &segments, inbound).await
}

/// GET /water_tanks/:connection_type/:device_type/:device_id/state
pub async fn water_tank_state(
    State(app): State<AppState>,
    Path((connection_type, device_type, device_id)): Path<(String, String, String)>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ForwardResult {
    let inbound = Inbound {
        method,
        query,
        headers,
        body,
    };
    let root = &app.config.downstream.vanpi_api_root_url;
    let segments = [
        "water_tanks",
        path_param(&connection_type)?,
        path_param(&device_type)?,
        path_param(&device_id)?,
        "state",
    ];
    passthrough(&app, root, &segments, inbound).await
}

/// PUT /settings/:setting_key - Update one device setting
pub async fn setting(
    State(app): State<AppState>,
    Path(setting_key): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ForwardResult {
    let inbound = Inbound {
        method,
        query,
        headers,
        body,
    };
    let root = &app.config.downstream.vanpi_api_root_url;
    passthrough(&app, root, &["settings", path_param(&setting_key)?], inbound).await
}

/// GET /modes/state - Mode states on the automation API
pub async fn mode_states(
    State(app): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ForwardResult {
    let inbound = Inbound {
        method,
        query,
        headers,
        body,
    };
    let root = &app.config.downstream.automation_api_root_url;
    passthrough(&app, root, &["modes", "state"], inbound).await
}

async fn passthrough(
    app: &AppState,
    root: &Url,
    segments: &[&str],
    inbound: Inbound,
) -> ForwardResult {
    let url = join_segments(root, segments).map_err(DownstreamError::from)?;
    let request = ForwardRequest::new(inbound.method, url)
        .with_query(inbound.query.as_deref())
        .with_inbound_headers(&inbound.headers)
        .with_body(inbound.body);

    Ok(app.forwarder.forward(request).await?)
}

/// Decoded path parameters become single downstream segments; dot segments
/// would walk out of the forwarded route
fn path_param(value: &str) -> Result<&str, ApiError> {
    match value {
        "" | "." | ".." => Err(ApiError::bad_request(format!(
            "Invalid path parameter '{}'",
            value
        ))),
        _ => Ok(value),
    }
}

/// POST /services/blink_cameras/login - Camera cloud login on the configured tier
pub async fn blink_login(
    State(app): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ForwardResult {
    let Json(body) = body.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let root = DownstreamConfig::blink_api_root_url(&app.config.downstream.blink_api_tier)
        .map_err(DownstreamError::from)?;

    let request = blink_login_request(&root, &body)?;
    Ok(app.forwarder.forward(request).await?)
}

/// POST /services/blink_cameras/tier/:tier/account/:account_id/client/:client_id - Verify a login PIN
pub async fn blink_verify_pin(
    State(app): State<AppState>,
    Path((tier, account_id, client_id)): Path<(String, String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ForwardResult {
    if !is_valid_tier(&tier) {
        return Err(ApiError::bad_request(format!("Invalid tier '{}'", tier)));
    }
    let Json(body) = body.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let root = DownstreamConfig::blink_api_root_url(&tier).map_err(DownstreamError::from)?;

    let request = blink_pin_verify_request(&root, &account_id, &client_id, body)?;
    Ok(app.forwarder.forward(request).await?)
}

/// Camera cloud requests carry none of the inbound headers
fn blink_request(method: Method, url: Url, body: &Value) -> ForwardRequest {
    ForwardRequest::new(method, url)
        .with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )
        .with_body(Bytes::from(body.to_string()))
}

fn blink_login_request(root: &Url, body: &Value) -> Result<ForwardRequest, ApiError> {
    let url = join_segments(root, &["v5", "account", "login"]).map_err(DownstreamError::from)?;
    Ok(blink_request(Method::POST, url, body))
}

/// `auth_token` moves from the body to the `TOKEN_AUTH` header
fn blink_pin_verify_request(
    root: &Url,
    account_id: &str,
    client_id: &str,
    mut body: Value,
) -> Result<ForwardRequest, ApiError> {
    let fields = body
        .as_object_mut()
        .ok_or_else(|| ApiError::bad_request("Request body must be a JSON object"))?;

    let token = match fields.remove("auth_token") {
        None | Some(Value::Null) => None,
        Some(Value::String(token)) => Some(
            HeaderValue::from_str(&token)
                .map_err(|_| ApiError::bad_request("auth_token is not a valid header value"))?,
        ),
        Some(_) => return Err(ApiError::bad_request("auth_token must be a string")),
    };

    let segments = [
        "v4",
        "account",
        path_param(account_id)?,
        "client",
        path_param(client_id)?,
        "pin",
        "verify",
    ];
    let url = join_segments(root, &segments)
    .map_err(DownstreamError::from)?;

    let request = blink_request(Method::POST, url, &body);
    Ok(match token {
        Some(token) => request.with_header(TOKEN_AUTH, token),
        None => request,
    })
}
