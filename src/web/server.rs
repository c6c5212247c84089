use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::context::SessionContext;
use crate::position::{PositionSource, ReplaySource, UnavailableSource};
use crate::session::TrackingSessionManager;
use crate::uplink::HttpUplink;
use crate::wake_lock::{InhibitorWakeLock, UnsupportedWakeLock, WakeLock};

use super::api::session as session_handlers;
use super::api_doc::ApiDoc;
use super::config::{Config, ConfigError};

#[derive(Clone)]
pub struct AppState {
    pub context: SessionContext,
    pub manager: TrackingSessionManager,
}

impl AppState {
    /// Wires the context, adapters and manager described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let context = match &config.state_file {
            Some(path) => SessionContext::open(path.clone())?,
            None => SessionContext::in_memory(),
        };
        if let Some(token) = &config.token {
            if context.credential().is_none() {
                context.set_credential(token.clone());
            }
        }
        if let Some(vehicle_id) = config.vehicle_id {
            if context.selected_vehicle().is_none() {
                context.select_vehicle(vehicle_id);
            }
        }

        let source: Arc<dyn PositionSource> = match &config.position {
            Some(position) => Arc::new(ReplaySource::from_file(&position.replay)?),
            None => {
                log::warn!("No position source configured, tracking cannot start");
                Arc::new(UnavailableSource)
            }
        };
        let wake_lock: Arc<dyn WakeLock> = match &config.wake_lock {
            Some(wake_lock) => Arc::new(InhibitorWakeLock::new(wake_lock.command.clone())),
            None => Arc::new(UnsupportedWakeLock),
        };
        if context.auth_state().is_signed_out() {
            log::warn!("No credential stored, reports will be rejected until one is set");
        }
        let uplink = Arc::new(HttpUplink::new(&config.api.base_url, context.clone()));
        log::info!("Uplinking reports to {}", uplink.endpoint());

        let manager = TrackingSessionManager::new(context.clone(), source, wake_lock, uplink);
        Ok(Self { context, manager })
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/session", get(session_handlers::status))
        .route("/api/session/enter", post(session_handlers::enter))
        .route("/api/session/start", post(session_handlers::start))
        .route("/api/session/stop", post(session_handlers::stop))
        .route("/api/session/toggle", post(session_handlers::toggle))
        .route("/api/session/logout", post(session_handlers::logout))
        .route(
            "/api/vehicle",
            put(session_handlers::select_vehicle).delete(session_handlers::clear_vehicle),
        )
        .route("/api/credential", put(session_handlers::set_credential))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(bind_addr: &str, state: AppState) -> std::io::Result<()> {
    let manager = state.manager.clone();
    let app = router(state);

    log::info!("Starting control API on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    manager.stop();
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
