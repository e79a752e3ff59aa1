use std::sync::Arc;
use std::time::Duration;

use foliobot_common::{Result, SessionId};
use foliobot_db::{ChatMessage, ConversationLog, NewChatMessage};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::composer::ResponseComposer;
use crate::fallback::SecondaryBackend;
use crate::knowledge::KnowledgeBase;
use crate::profile::SiteProfile;
use crate::router::{Route, SmartRouter};

const GREETING_CONTEXT: &str = "greeting";
const WEBSITE_DATA_CONTEXT: &str = "website_data";
const DEFAULT_SECONDARY_TIMEOUT: Duration = Duration::from_secs(10);

/// Which path produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMethod {
    Greeting,
    Data,
    Rag,
    Fallback,
}

impl AnswerMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Data => "data",
            Self::Rag => "rag",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub reply: String,
    pub session_id: SessionId,
    pub method: AnswerMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_used: Option<Vec<String>>,
}

/// Request metadata recorded on new sessions.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: String,
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatbotStatus {
    pub providers: Vec<ProviderStatus>,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub knowledge_items: Option<usize>,
    pub secondary_backend: Option<String>,
}

/// The answer pipeline: route, retrieve, compose, fall back, record.
pub struct Chatbot {
    router: SmartRouter,
    profile: SiteProfile,
    composer: ResponseComposer,
    knowledge: KnowledgeBase,
    log: Arc<dyn ConversationLog>,
    secondary: Option<Arc<dyn SecondaryBackend>>,
    secondary_timeout: Duration,
}

impl Chatbot {
    pub fn new(
        composer: ResponseComposer,
        knowledge: KnowledgeBase,
        log: Arc<dyn ConversationLog>,
        profile: SiteProfile,
    ) -> Self {
        Self {
            router: SmartRouter::new(),
            profile,
            composer,
            knowledge,
            log,
            secondary: None,
            secondary_timeout: DEFAULT_SECONDARY_TIMEOUT,
        }
    }

    pub fn with_secondary(mut self, backend: Arc<dyn SecondaryBackend>, timeout: Duration) -> Self {
        self.secondary = Some(backend);
        self.secondary_timeout = timeout;
        self
    }

    /// Answer one message. Always produces a reply.
    #[instrument(skip(self, message, client), fields(method))]
    pub async fn answer(
        &self,
        message: &str,
        session_id: Option<&SessionId>,
        client: &ClientMeta,
    ) -> ChatAnswer {
        let session_id = self.resolve_session(session_id, client).await;

        let answer = match self.router.classify(message) {
            Route::Greeting => {
                let reply = self.composer.greeting(message).await;
                self.record(&session_id, message, &reply, None, Some(GREETING_CONTEXT.into()))
                    .await;
                ChatAnswer {
                    reply,
                    session_id,
                    method: AnswerMethod::Greeting,
                    context_used: Some(vec![GREETING_CONTEXT.to_string()]),
                }
            }
            Route::Data(topic) => {
                debug!(%topic, "answering from site data");
                let section = self.profile.section(topic);
                let reply = self.composer.data(message, &section).await;
                self.record(
                    &session_id,
                    message,
                    &reply,
                    None,
                    Some(WEBSITE_DATA_CONTEXT.into()),
                )
                .await;
                ChatAnswer {
                    reply,
                    session_id,
                    method: AnswerMethod::Data,
                    context_used: Some(vec![WEBSITE_DATA_CONTEXT.to_string()]),
                }
            }
            Route::Rag => self.answer_with_retrieval(message, session_id).await,
        };

        tracing::Span::current().record("method", answer.method.as_str());
        answer
    }

    async fn answer_with_retrieval(&self, message: &str, session_id: SessionId) -> ChatAnswer {
        let query_embedding = match self.knowledge.embedder().embed_query(message).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("query embedding failed, answering without retrieval: {e}");
                None
            }
        };

        let (knowledge, history) = match &query_embedding {
            Some(query) => {
                tokio::join!(
                    self.knowledge.retrieve_context(query),
                    self.knowledge.search_history(query)
                )
            }
            None => (Vec::new(), Vec::new()),
        };

        let snippets: Vec<String> = knowledge.into_iter().map(|s| s.item.content).collect();
        let history: Vec<_> = history.into_iter().map(|s| s.item).collect();

        match self.composer.rag(message, &snippets, &history).await {
            Ok(reply) => {
                let context = (!snippets.is_empty()).then(|| snippets.join("\n\n"));
                self.record(&session_id, message, &reply, query_embedding, context)
                    .await;
                ChatAnswer {
                    reply,
                    session_id,
                    method: AnswerMethod::Rag,
                    context_used: Some(snippets),
                }
            }
            Err(e) => {
                warn!("answer generation failed, using fallback chain: {e}");
                ChatAnswer {
                    reply: self.fallback_reply(message).await,
                    session_id,
                    method: AnswerMethod::Fallback,
                    context_used: None,
                }
            }
        }
    }

    /// Secondary backend once, under a hard timeout, then the canned apology.
    async fn fallback_reply(&self, message: &str) -> String {
        if let Some(backend) = &self.secondary {
            match tokio::time::timeout(self.secondary_timeout, backend.reply(message)).await {
                Ok(Ok(reply)) => {
                    info!(backend = backend.backend_id(), "answered by secondary backend");
                    return reply;
                }
                Ok(Err(e)) => warn!(backend = backend.backend_id(), "secondary backend failed: {e}"),
                Err(_) => warn!(
                    backend = backend.backend_id(),
                    "secondary backend timed out after {:?}", self.secondary_timeout
                ),
            }
        }
        self.composer.apology()
    }

    async fn resolve_session(&self, session_id: Option<&SessionId>, client: &ClientMeta) -> SessionId {
        match self
            .log
            .get_or_create_session(
                session_id,
                client.ip.as_deref(),
                client.user_agent.as_deref(),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!("session store unavailable, using a local session id: {e}");
                SessionId::new()
            }
        }
    }

    async fn record(
        &self,
        session_id: &SessionId,
        message: &str,
        reply: &str,
        embedding: Option<Vec<f32>>,
        context_used: Option<String>,
    ) {
        let result = self
            .log
            .insert(NewChatMessage {
                session_id: session_id.clone(),
                user_message: message.to_string(),
                bot_reply: reply.to_string(),
                embedding,
                context_used,
            })
            .await;
        if let Err(e) = result {
            warn!(%session_id, "failed to record exchange: {e}");
        }
    }

    pub async fn end_session(&self, session_id: &SessionId) -> Result<()> {
        self.log.end_session(session_id).await?;
        info!(%session_id, "session ended");
        Ok(())
    }

    pub async fn session_history(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>> {
        self.log.session_messages(session_id).await
    }

    pub async fn seed_knowledge(&self) -> Result<usize> {
        self.knowledge.seed().await
    }

    pub async fn add_knowledge(
        &self,
        content: &str,
        category: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<String> {
        self.knowledge.add_knowledge(content, category, metadata).await
    }

    /// Configuration summary; with `check_health`, every provider is health-checked concurrently.
    pub async fn status(&self, check_health: bool) -> ChatbotStatus {
        let providers = self.composer.providers();
        let health: Vec<Option<bool>> = if check_health {
            join_all(providers.iter().map(|p| async move {
                Some(p.health_check().await.unwrap_or(false))
            }))
            .await
        } else {
            vec![None; providers.len()]
        };

        let knowledge_items = match self.knowledge.store().count().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("failed to count knowledge items: {e}");
                None
            }
        };

        ChatbotStatus {
            providers: providers
                .iter()
                .zip(health)
                .map(|(p, healthy)| ProviderStatus {
                    id: p.provider_id().to_string(),
                    model: p.configured_model().map(str::to_string),
                    healthy,
                })
                .collect(),
            embedding_provider: self.knowledge.embedder().provider_id().to_string(),
            embedding_model: self.knowledge.embedder().model().to_string(),
            knowledge_items,
            secondary_backend: self.secondary.as_ref().map(|b| b.backend_id().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::Persona;
    use crate::embeddings::EmbeddingProvider;
    use crate::providers::LlmProvider;
    use crate::test_support::{KeywordEmbedder, ScriptedBackend, ScriptedLlm};
    use async_trait::async_trait;
    use foliobot_common::Error;
    use foliobot_config::RagConfig;
    use foliobot_db::{ChatSession, SqliteConversationLog, SqliteKnowledgeStore};

    struct Harness {
        bot: Chatbot,
        llm: Arc<ScriptedLlm>,
        embedder: Arc<KeywordEmbedder>,
        log: Arc<SqliteConversationLog>,
    }

    fn harness_with(
        llm: Arc<ScriptedLlm>,
        embedder: Arc<KeywordEmbedder>,
        log: Arc<dyn ConversationLog>,
        sqlite_log: Arc<SqliteConversationLog>,
    ) -> Harness {
        let store = Arc::new(SqliteKnowledgeStore::in_memory().unwrap());
        let knowledge = KnowledgeBase::new(
            store,
            log.clone(),
            embedder.clone() as Arc<dyn EmbeddingProvider>,
            RagConfig::default(),
        );
        let composer = ResponseComposer::new(
            vec![llm.clone() as Arc<dyn LlmProvider>],
            Persona::default(),
        );
        Harness {
            bot: Chatbot::new(composer, knowledge, log, SiteProfile::default()),
            llm,
            embedder,
            log: sqlite_log,
        }
    }

    fn harness(llm: Arc<ScriptedLlm>, embedder: Arc<KeywordEmbedder>) -> Harness {
        let log = Arc::new(SqliteConversationLog::in_memory().unwrap());
        harness_with(llm, embedder, log.clone(), log)
    }

    #[tokio::test]
    async fn greeting_never_embeds_and_is_recorded() {
        let h = harness(
            ScriptedLlm::replying("gemini", "Hey! I'm RameezBot."),
            KeywordEmbedder::new(),
        );

        let answer = h.bot.answer("hello", None, &ClientMeta::default()).await;
        assert_eq!(answer.method, AnswerMethod::Greeting);
        assert_eq!(answer.reply, "Hey! I'm RameezBot.");
        assert_eq!(h.embedder.calls(), 0);

        let history = h.bot.session_history(&answer.session_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].context_used.as_deref(), Some("greeting"));
        assert!(history[0].embedding.is_none());
    }

    #[tokio::test]
    async fn skills_question_uses_site_data_without_embedding() {
        // Provider down: the raw section is returned verbatim.
        let h = harness(ScriptedLlm::failing("gemini"), KeywordEmbedder::new());

        let answer = h
            .bot
            .answer("What are your skills?", None, &ClientMeta::default())
            .await;
        assert_eq!(answer.method, AnswerMethod::Data);
        assert!(answer.reply.contains("**Frontend:**"));
        assert!(answer.reply.contains("**Backend:**"));
        assert!(answer.reply.contains("**Tools:**"));
        assert_eq!(h.embedder.calls(), 0);
        assert_eq!(
            answer.context_used,
            Some(vec!["website_data".to_string()])
        );

        let history = h.bot.session_history(&answer.session_id).await.unwrap();
        assert_eq!(history[0].context_used.as_deref(), Some("website_data"));
    }

    #[tokio::test]
    async fn open_question_retrieves_context_and_records_embedding() {
        let h = harness(
            ScriptedLlm::replying("gemini", "He wants to be an AI-first engineer."),
            KeywordEmbedder::new(),
        );
        h.bot.seed_knowledge().await.unwrap();

        let answer = h
            .bot
            .answer(
                "What are his long-term career goals?",
                None,
                &ClientMeta::default(),
            )
            .await;
        assert_eq!(answer.method, AnswerMethod::Rag);
        let used = answer.context_used.unwrap();
        assert_eq!(used.len(), 1);
        assert!(used[0].contains("AI-first Full Stack Engineer"));

        let prompt = h.llm.last_request().unwrap().system.unwrap();
        assert!(prompt.contains("AI-first Full Stack Engineer"));

        let history = h.bot.session_history(&answer.session_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].embedding.is_some());
        assert_eq!(history[0].context_used.as_deref(), Some(used[0].as_str()));
    }

    #[tokio::test]
    async fn past_exchanges_feed_later_prompts() {
        let h = harness(
            ScriptedLlm::replying("gemini", "Long-term he aims at AI engineering."),
            KeywordEmbedder::new(),
        );
        let first = h
            .bot
            .answer("What are his long-term career goals?", None, &ClientMeta::default())
            .await;
        assert_eq!(first.method, AnswerMethod::Rag);

        h.bot
            .answer(
                "And what goals does he have for next year?",
                Some(&first.session_id),
                &ClientMeta::default(),
            )
            .await;
        let prompt = h.llm.last_request().unwrap().system.unwrap();
        assert!(prompt.contains(
            "Similar past conversations:\nUser: What are his long-term career goals?"
        ));
    }

    #[tokio::test]
    async fn embedding_failure_still_answers_without_context() {
        let h = harness(
            ScriptedLlm::replying("gemini", "I'm not sure, sorry."),
            KeywordEmbedder::failing(),
        );

        let answer = h
            .bot
            .answer("What are his long-term career goals?", None, &ClientMeta::default())
            .await;
        assert_eq!(answer.method, AnswerMethod::Rag);
        assert_eq!(answer.context_used, Some(Vec::new()));
        let prompt = h.llm.last_request().unwrap().system.unwrap();
        assert!(prompt.contains("No specific context found."));

        let history = h.bot.session_history(&answer.session_id).await.unwrap();
        assert!(history[0].embedding.is_none());
        assert!(history[0].context_used.is_none());
    }

    #[tokio::test]
    async fn primary_and_secondary_failure_returns_apology() {
        let h = harness(ScriptedLlm::failing("gemini"), KeywordEmbedder::new());
        let backend = ScriptedBackend::failing();
        let bot = h
            .bot
            .with_secondary(backend.clone(), Duration::from_secs(1));

        let answer = bot
            .answer("What are his long-term career goals?", None, &ClientMeta::default())
            .await;
        assert_eq!(answer.method, AnswerMethod::Fallback);
        assert!(!answer.reply.is_empty());
        assert!(answer.reply.contains("rameezbaderkhwaja@gmail.com"));
        assert_eq!(backend.calls(), 1);

        // Fallback replies are not recorded.
        assert!(bot.session_history(&answer.session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn secondary_backend_answers_when_providers_fail() {
        let h = harness(ScriptedLlm::failing("gemini"), KeywordEmbedder::new());
        let bot = h.bot.with_secondary(
            ScriptedBackend::replying("Python bot says hi"),
            Duration::from_secs(1),
        );

        let answer = bot
            .answer("What are his long-term career goals?", None, &ClientMeta::default())
            .await;
        assert_eq!(answer.method, AnswerMethod::Fallback);
        assert_eq!(answer.reply, "Python bot says hi");
    }

    struct StalledBackend;

    #[async_trait]
    impl SecondaryBackend for StalledBackend {
        fn backend_id(&self) -> &str {
            "stalled"
        }

        async fn reply(&self, _message: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }
    }

    #[tokio::test]
    async fn secondary_backend_is_bounded_by_timeout() {
        let h = harness(ScriptedLlm::failing("gemini"), KeywordEmbedder::new());
        let bot = h
            .bot
            .with_secondary(Arc::new(StalledBackend), Duration::from_millis(20));

        let answer = bot
            .answer("What are his long-term career goals?", None, &ClientMeta::default())
            .await;
        assert_eq!(answer.method, AnswerMethod::Fallback);
        assert!(answer.reply.starts_with("I apologize"));
    }

    #[tokio::test]
    async fn existing_session_is_reused() {
        let h = harness(ScriptedLlm::replying("gemini", "hi"), KeywordEmbedder::new());
        let client = ClientMeta {
            ip: Some("203.0.113.9".into()),
            user_agent: Some("curl/8".into()),
        };

        let first = h.bot.answer("hello", None, &client).await;
        let second = h.bot.answer("thanks", Some(&first.session_id), &client).await;
        assert_eq!(first.session_id, second.session_id);

        let session = h.log.get_session(&first.session_id).await.unwrap().unwrap();
        assert_eq!(session.user_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(h.bot.session_history(&first.session_id).await.unwrap().len(), 2);

        let unknown = SessionId::from_str("session_does_not_exist");
        let third = h.bot.answer("hey", Some(&unknown), &client).await;
        assert_ne!(third.session_id, unknown);
    }

    /// Conversation log whose every call fails.
    struct BrokenLog;

    #[async_trait]
    impl ConversationLog for BrokenLog {
        async fn get_or_create_session(
            &self,
            _session_id: Option<&SessionId>,
            _user_ip: Option<&str>,
            _user_agent: Option<&str>,
        ) -> Result<SessionId> {
            Err(Error::Store("database is locked".into()))
        }

        async fn get_session(&self, _session_id: &SessionId) -> Result<Option<ChatSession>> {
            Err(Error::Store("database is locked".into()))
        }

        async fn end_session(&self, _session_id: &SessionId) -> Result<()> {
            Err(Error::Store("database is locked".into()))
        }

        async fn insert(&self, _message: NewChatMessage) -> Result<String> {
            Err(Error::Store("database is locked".into()))
        }

        async fn list_recent(&self, _limit: usize) -> Result<Vec<ChatMessage>> {
            Err(Error::Store("database is locked".into()))
        }

        async fn list_recent_embedded(&self, _limit: usize) -> Result<Vec<ChatMessage>> {
            Err(Error::Store("database is locked".into()))
        }

        async fn session_messages(&self, _session_id: &SessionId) -> Result<Vec<ChatMessage>> {
            Err(Error::Store("database is locked".into()))
        }
    }

    #[tokio::test]
    async fn store_failures_do_not_block_answers() {
        let sqlite = Arc::new(SqliteConversationLog::in_memory().unwrap());
        let h = harness_with(
            ScriptedLlm::replying("gemini", "Still here."),
            KeywordEmbedder::new(),
            Arc::new(BrokenLog),
            sqlite,
        );

        let answer = h
            .bot
            .answer("What are his long-term career goals?", None, &ClientMeta::default())
            .await;
        assert_eq!(answer.method, AnswerMethod::Rag);
        assert_eq!(answer.reply, "Still here.");
        assert!(answer.session_id.as_str().starts_with("session_"));
    }

    #[tokio::test]
    async fn end_session_and_status() {
        let h = harness(ScriptedLlm::replying("gemini", "hi"), KeywordEmbedder::new());
        let answer = h.bot.answer("hello", None, &ClientMeta::default()).await;
        h.bot.end_session(&answer.session_id).await.unwrap();
        let session = h.log.get_session(&answer.session_id).await.unwrap().unwrap();
        assert!(session.ended_at.is_some());

        h.bot.seed_knowledge().await.unwrap();
        let status = h.bot.status(true).await;
        assert_eq!(status.providers.len(), 1);
        assert_eq!(status.providers[0].id, "gemini");
        assert_eq!(status.providers[0].healthy, Some(true));
        assert_eq!(status.embedding_model, "bag-of-keywords");
        assert_eq!(status.knowledge_items, Some(8));
        assert!(status.secondary_backend.is_none());
    }

    #[test]
    fn answer_serializes_camel_case() {
        let answer = ChatAnswer {
            reply: "hi".into(),
            session_id: SessionId::from_str("session_abc"),
            method: AnswerMethod::Rag,
            context_used: None,
        };
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["sessionId"], "session_abc");
        assert_eq!(json["method"], "rag");
        assert!(json.get("contextUsed").is_none());
    }
}
