//! HTTP routes for Signal Relay.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwtManager, UserStore};
use crate::chat::ChatStore;
use crate::config::Config;
use crate::handlers;
use crate::hub::Hub;
use crate::middleware::{require_auth, AuthState};
use crate::observability::{health_router, HealthState};
use crate::recording::RecordingStore;
use crate::rooms::RoomRegistry;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

/// Application state shared across all handlers.
///
/// Every store is owned here and lives from startup to shutdown; nothing
/// is process-global.
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Session token issuer and validator.
    pub jwt: Arc<JwtManager>,

    /// Registered accounts.
    pub users: UserStore,

    /// Room directory, shared with the hub.
    pub registry: Arc<RoomRegistry>,

    /// Connection lifecycle owner.
    pub hub: Arc<Hub>,

    pub chat: ChatStore,

    pub recordings: RecordingStore,

    /// Liveness/readiness, flipped by the shutdown path.
    pub health: Arc<HealthState>,
}

impl AppState {
    /// Build every store from `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let jwt = Arc::new(JwtManager::new(
            &config.jwt_secret,
            Duration::from_secs(config.jwt_ttl_seconds),
            Duration::from_secs(config.jwt_clock_skew_seconds),
        ));
        let registry = Arc::new(RoomRegistry::new());
        let hub = Arc::new(Hub::new(
            Arc::clone(&registry),
            config.signal_channel_capacity,
            config.idle_timeout(),
        ));

        Self {
            jwt,
            users: UserStore::new(config.bcrypt_cost),
            registry,
            hub,
            chat: ChatStore::new(config.chat_history_limit),
            recordings: RecordingStore::new(config.recordings_dir.clone()),
            health: Arc::new(HealthState::new()),
            config,
        }
    }

    /// Reap idle rooms and release what the collaborator stores keep under
    /// their ids, so a room later created under the same id starts empty.
    /// Recording files stay on disk.
    pub async fn reap_idle_rooms(&self, ttl: Duration) -> Vec<String> {
        let reaped = self.registry.reap_idle(ttl).await;
        for room_id in &reaped {
            let messages = self.chat.clear(room_id).await;
            let recordings = self.recordings.forget_room(room_id).await.len();
            debug!(
                target: "relay.registry",
                room_id = %room_id,
                messages,
                recordings,
                "Released reaped room state"
            );
        }
        reaped
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready` - Liveness and readiness probes - public
/// - `/register`, `/login` - Account endpoints - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/create-room`, `/join-room`, `/leave-room`, `/rooms` - Room administration
/// - `/ws?room_id=..` - WebSocket signaling connection
/// - `/chat/send`, `/chat/history/:room_id` - Chat log
/// - `/recording/start`, `/recording/stop`, `/recording/list/:room_id` - Recording metadata
/// - TraceLayer for request logging, permissive CORS for browser clients
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        jwt: Arc::clone(&state.jwt),
    });

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .with_state(Arc::clone(&state));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/create-room", post(handlers::create_room))
        .route("/join-room", post(handlers::join_room))
        .route("/leave-room", post(handlers::leave_room))
        .route("/rooms", get(handlers::list_rooms))
        .route("/ws", get(handlers::ws_handler))
        .route("/chat/send", post(handlers::send_chat_message))
        .route("/chat/history/:room_id", get(handlers::chat_history))
        .route("/recording/start", post(handlers::start_recording))
        .route("/recording/stop", post(handlers::stop_recording))
        .route("/recording/list/:room_id", get(handlers::list_recordings))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(Arc::clone(&state));

    public_routes
        .merge(health_router(Arc::clone(&state.health)))
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
