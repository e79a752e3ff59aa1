use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use foliobot_agents::{
    Chatbot, EmbeddingProvider, KnowledgeBase, LlmProvider, LlmRequest, LlmResponse, Persona,
    ResponseComposer, SiteProfile,
};
use foliobot_common::{Error, Result};
use foliobot_config::{AppConfig, RagConfig};
use foliobot_db::{SqliteConversationLog, SqliteKnowledgeStore};
use foliobot_gateway::{AppState, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

struct FixedLlm {
    reply: Option<&'static str>,
}

#[async_trait]
impl LlmProvider for FixedLlm {
    fn provider_id(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        match self.reply {
            Some(text) => Ok(LlmResponse {
                text: text.to_string(),
                model: request.model.clone(),
                usage: None,
                stop_reason: Some("stop".to_string()),
            }),
            None => Err(Error::Provider("upstream unavailable".into())),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.reply.is_some())
    }
}

/// Every text maps to the same unit vector.
struct ConstantEmbedder;

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    fn provider_id(&self) -> &str {
        "constant"
    }

    fn model(&self) -> &str {
        "constant-2d"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

fn app(reply: Option<&'static str>, api_key: Option<&str>) -> axum::Router {
    let mut config = AppConfig::default();
    config.gateway.api_key = api_key.map(str::to_string);

    let store = Arc::new(SqliteKnowledgeStore::in_memory().unwrap());
    let log = Arc::new(SqliteConversationLog::in_memory().unwrap());
    let composer = ResponseComposer::new(
        vec![Arc::new(FixedLlm { reply }) as Arc<dyn LlmProvider>],
        Persona::from(&config.bot),
    );
    let knowledge = KnowledgeBase::new(
        store,
        log.clone(),
        Arc::new(ConstantEmbedder),
        RagConfig::default(),
    );
    let chatbot = Chatbot::new(composer, knowledge, log, SiteProfile::default());

    build_router(Arc::new(AppState::new(config, chatbot)))
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = app(Some("hi"), None);
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn greeting_gets_session_and_method() {
    let app = app(Some("Hey there!"), None);
    let (status, body) = send(&app, post_json("/api/chat", json!({ "message": "hello" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Hey there!");
    assert_eq!(body["method"], "greeting");
    assert!(
        body["sessionId"]
            .as_str()
            .is_some_and(|id| id.starts_with("session_"))
    );
}

#[tokio::test]
async fn session_id_is_reused_and_history_recorded() {
    let app = app(Some("Happy to help."), None);
    let (_, first) = send(&app, post_json("/api/chat", json!({ "message": "hello" }))).await;
    let session_id = first["sessionId"].as_str().unwrap().to_string();

    let (status, second) = send(
        &app,
        post_json(
            "/api/chat",
            json!({ "message": "What are your skills?", "sessionId": session_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["sessionId"], session_id.as_str());
    assert_eq!(second["method"], "data");

    let (status, history) = send(
        &app,
        Request::get(format!("/api/chat/sessions/{session_id}/history"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["userMessage"], "hello");
    assert_eq!(messages[1]["contextUsed"], "website_data");
}

#[tokio::test]
async fn invalid_messages_are_rejected() {
    let app = app(Some("unused"), None);

    let (status, body) = send(&app, post_json("/api/chat", json!({ "message": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("empty"));

    let (status, _) = send(
        &app,
        post_json("/api/chat", json!({ "message": "a".repeat(1001) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_session_id_starts_new_session() {
    let app = app(Some("Hello!"), None);
    let (status, body) = send(
        &app,
        post_json(
            "/api/chat",
            json!({ "message": "hello", "sessionId": "bad id; drop table" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["sessionId"], "bad id; drop table");
}

#[tokio::test]
async fn provider_outage_returns_fallback_apology() {
    let app = app(None, None);
    let (status, body) = send(
        &app,
        post_json(
            "/api/chat",
            json!({ "message": "What are his long-term career goals?" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "fallback");
    assert!(
        body["reply"]
            .as_str()
            .unwrap()
            .contains("rameezbaderkhwaja@gmail.com")
    );
}

#[tokio::test]
async fn rag_answer_reports_context_after_seeding() {
    let app = app(Some("He aims to be an AI-first engineer."), None);
    let (status, seeded) = send(&app, post_empty("/api/knowledge/init", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seeded["inserted"], 8);

    let (status, body) = send(
        &app,
        post_json(
            "/api/chat",
            json!({ "message": "What are his long-term career goals?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "rag");
    assert_eq!(body["reply"], "He aims to be an AI-first engineer.");
    assert_eq!(body["contextUsed"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn knowledge_init_requires_bearer_key_when_configured() {
    let app = app(Some("unused"), Some("admin-secret"));

    let (status, _) = send(&app, post_empty("/api/knowledge/init", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, post_empty("/api/knowledge/init", Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, post_empty("/api/knowledge/init", Some("admin-secret"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 8);
}

#[tokio::test]
async fn ending_unknown_session_is_not_found() {
    let app = app(Some("Hi!"), None);
    let (status, _) = send(&app, post_empty("/api/chat/sessions/session_missing/end", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, post_json("/api/chat", json!({ "message": "hello" }))).await;
    let session_id = body["sessionId"].as_str().unwrap();
    let (status, ended) = send(
        &app,
        post_empty(&format!("/api/chat/sessions/{session_id}/end"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["ended"], true);
}

#[tokio::test]
async fn status_lists_configured_providers() {
    let app = app(Some("hi"), None);
    let (status, body) = send(
        &app,
        Request::get("/api/status").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["providers"][0]["id"], "fixed");
    assert_eq!(body["embeddingModel"], "constant-2d");
    assert_eq!(body["knowledgeItems"], 0);
}
