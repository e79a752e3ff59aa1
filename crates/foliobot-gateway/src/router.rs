use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::SharedState;

/// Build the main application router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/chat", post(api::chat))
        .route("/api/chat/sessions/{id}/end", post(api::end_session))
        .route("/api/chat/sessions/{id}/history", get(api::session_history))
        .route("/api/knowledge/init", post(api::init_knowledge))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let status = state.chatbot.status(false).await;
    Json(serde_json::json!({
        "status": "running",
        "bot": state.config.bot.name,
        "providers": status.providers,
        "embeddingProvider": status.embedding_provider,
        "embeddingModel": status.embedding_model,
        "knowledgeItems": status.knowledge_items,
        "secondaryBackend": status.secondary_backend,
    }))
}
