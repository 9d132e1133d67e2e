use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use agora_core::UserId;

use crate::health::{self, HealthResponse};
use crate::hub::Hub;
use crate::session::run_session;

/// Listen address.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            hub,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WsConnectQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OnlineUsersResponse {
    pub online_users: Vec<UserId>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ws/connect", get(ws_handler))
        .route("/api/ws/online-users", get(online_users_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve. Returns once the listener is up.
pub async fn start(config: ServerConfig, hub: Arc<Hub>) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(AppState::new(hub));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(host = %config.host, port = local_addr.port(), "agora server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                // A dropped handle is not a shutdown request.
                if shutdown_rx.await.is_err() {
                    std::future::pending::<()>().await;
                }
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        shutdown: Some(shutdown_tx),
        server,
    })
}

/// Handle returned by `start()`. Dropping it leaves the server running.
pub struct ServerHandle {
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for the serve task to finish.
    /// Open sockets are not force-closed.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.server.await;
    }
}

/// WebSocket upgrade. Authentication happens after the upgrade so a
/// rejected token can be reported with a close code.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsConnectQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state.hub, params.token))
}

async fn online_users_handler(State(state): State<AppState>) -> Json<OnlineUsersResponse> {
    Json(OnlineUsersResponse {
        online_users: state.hub.list_online(),
    })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let hub = &state.hub;
    let resp = health::health_check(
        state.started_at,
        hub.registry().connection_count(),
        hub.rooms().room_count(),
        &hub.stats().snapshot(),
    );
    Json(resp)
}
