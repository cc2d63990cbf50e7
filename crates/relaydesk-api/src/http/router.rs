//! Axum router configuration with middleware.
//!
//! REST routes are under `/api/v1/`; the duplex socket is at `/ws`.
//! Middleware: CORS (origins from config, any when unset) and request tracing.

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let api_routes = Router::new()
        // Directory
        .route("/users/{tenant}", get(handlers::conversation::list_directory))
        // Conversations
        .route(
            "/conversations/{id}/messages",
            get(handlers::conversation::list_messages).post(handlers::conversation::send_reply),
        )
        .route(
            "/conversations/{id}/escalation",
            put(handlers::conversation::set_escalation),
        )
        .route(
            "/conversations/{id}/automation",
            put(handlers::conversation::set_automation),
        )
        .route("/conversations/{id}/read", post(handlers::unread::mark_read))
        .route(
            "/conversations/{id}/stream",
            get(handlers::stream::conversation_stream),
        )
        // Unread
        .route("/unread", get(handlers::unread::batch_unread))
        .route("/inbox/stream", get(handlers::stream::inbox_stream))
        // Platform ingestion
        .route("/inbound", post(handlers::inbound::receive_inbound));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no identity required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
