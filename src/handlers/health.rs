use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - Service info and endpoint list
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "VanPi App API",
            "version": version,
            "description": "Control panel gateway for relays, wifi relays, action switches and modes",
            "endpoints": {
                "switches": "/relays/:id/state, /wifi_relays/:id/state, /action_switches/:id/state, /modes/:id/state (POST)",
                "relays": "/relays/state",
                "usb_devices": "/usb_devices",
                "batteries": "/batteries/:connection_type/:device_type/:device_id/state",
                "water_tanks": "/water_tanks/:connection_type/:device_type/:device_id/state",
                "settings": "/settings/:setting_key (PUT)",
                "modes": "/modes/state",
                "blink_cameras": "/services/blink_cameras/login, /services/blink_cameras/tier/:tier/account/:account_id/client/:client_id",
                "health": "/health",
            }
        }
    }))
}

/// GET /health - Store connectivity
pub async fn health(State(app): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match app.registry.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}
