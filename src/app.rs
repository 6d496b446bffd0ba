//! Router assembly and shared handler state.

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::database::SwitchRegistry;
use crate::handlers;
use crate::services::{ControlService, Forwarder, StateDispatcher};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<dyn SwitchRegistry>,
    pub dispatcher: StateDispatcher,
    pub forwarder: Forwarder,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        registry: Arc<dyn SwitchRegistry>,
        control: Arc<dyn ControlService>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: StateDispatcher::new(registry.clone(), control),
            registry,
            forwarder: Forwarder::new(client),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(state_routes())
        .merge(forward_routes())
        .with_state(state)
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn state_routes() -> Router<AppState> {
    use handlers::state;

    Router::new()
        .route("/relays/:id/state", post(state::relay))
        .route("/wifi_relays/:id/state", post(state::wifi_relay))
        .route("/action_switches/:id/state", post(state::action_switch))
        .route("/modes/:id/state", post(state::mode))
}

fn forward_routes() -> Router<AppState> {
    use handlers::forward;

    Router::new()
        // Device API
        .route(
            "/relays/state",
            get(forward::relays_state).post(forward::relays_state),
        )
        .route("/usb_devices", get(forward::usb_devices))
        .route(
            "/batteries/:connection_type/:device_type/:device_id/state",
            get(forward::battery_state),
        )
        .route(
            "/water_tanks/:connection_type/:device_type/:device_id/state",
            get(forward::water_tank_state),
        )
        .route("/settings/:setting_key", put(forward::setting))
        // Automation API
        .route("/modes/state", get(forward::mode_states))
        // Camera cloud
        .route("/services/blink_cameras/login", post(forward::blink_login))
        .route(
            "/services/blink_cameras/tier/:tier/account/:account_id/client/:client_id",
            post(forward::blink_verify_pin),
        )
}

/// Reflect only whitelisted origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .allow_credentials(true)
}
