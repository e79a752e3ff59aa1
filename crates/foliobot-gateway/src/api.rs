use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use foliobot_agents::ClientMeta;
use foliobot_common::{Error, SessionId};
use foliobot_db::ChatMessage;
use foliobot_security::InputValidator;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub user_message: String,
    pub bot_reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_used: Option<String>,
    pub created_at: String,
}

impl From<ChatMessage> for HistoryEntry {
    fn from(message: ChatMessage) -> Self {
        Self {
            user_message: message.user_message,
            bot_reply: message.bot_reply,
            context_used: message.context_used,
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistoryResponse {
    pub session_id: String,
    pub messages: Vec<HistoryEntry>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::Provider(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client IP and user agent as reported by the request headers.
pub fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let ip = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .map(str::to_string);

    ClientMeta {
        ip,
        user_agent: header_str(headers, header::USER_AGENT.as_str()).map(str::to_string),
    }
}

fn parse_session_id(raw: &str) -> Result<SessionId, Response> {
    InputValidator::validate_session_id(raw)
        .map(|()| SessionId::from_str(raw))
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))
}

/// POST /api/chat: answer one visitor message.
pub async fn chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Response {
    let message =
        match InputValidator::validate_message(&body.message, state.config.gateway.max_message_len)
        {
            Ok(message) => message,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        };

    // A malformed client id starts a fresh session instead of failing the request.
    let session_id = match body.session_id.as_deref() {
        Some(raw) => match InputValidator::validate_session_id(raw) {
            Ok(()) => Some(SessionId::from_str(raw)),
            Err(e) => {
                warn!("ignoring client session id: {e}");
                None
            }
        },
        None => None,
    };

    let answer = state
        .chatbot
        .answer(&message, session_id.as_ref(), &client_meta(&headers))
        .await;
    debug!(method = answer.method.as_str(), "chat answered");

    Json(answer).into_response()
}

/// POST /api/chat/sessions/{id}/end: mark a session as ended.
pub async fn end_session(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let session_id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.chatbot.end_session(&session_id).await {
        Ok(()) => Json(serde_json::json!({ "sessionId": session_id, "ended": true })).into_response(),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

/// GET /api/chat/sessions/{id}/history: exchanges of one session, oldest first.
pub async fn session_history(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Response {
    let session_id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.chatbot.session_history(&session_id).await {
        Ok(messages) => Json(SessionHistoryResponse {
            session_id: session_id.into_string(),
            messages: messages.into_iter().map(HistoryEntry::from).collect(),
        })
        .into_response(),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

/// POST /api/knowledge/init: seed the knowledge base with the default facts.
pub async fn init_knowledge(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(expected) = state.config.gateway.api_key.as_deref()
        && !expected.is_empty()
    {
        let provided = header_str(&headers, header::AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or_default();
        if !InputValidator::verify_api_key(expected, provided.trim()) {
            warn!("rejected knowledge init with missing or invalid API key");
            return error_response(StatusCode::UNAUTHORIZED, "invalid or missing API key");
        }
    }

    let inserted = match state.chatbot.seed_knowledge().await {
        Ok(inserted) => inserted,
        Err(e) => {
            warn!("knowledge seeding failed: {e}");
            return error_response(status_for(&e), e.to_string());
        }
    };

    let total = state.chatbot.status(false).await.knowledge_items;
    Json(serde_json::json!({
        "success": true,
        "inserted": inserted,
        "total": total,
    }))
    .into_response()
}
