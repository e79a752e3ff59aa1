use std::sync::Arc;

use foliobot_common::{Error, Result};
use foliobot_config::RagConfig;
use foliobot_db::{ConversationLog, KnowledgeItem, KnowledgeStore, NewKnowledgeItem};
use tracing::{debug, info, instrument, warn};

use crate::composer::PastExchange;
use crate::embeddings::EmbeddingProvider;
use crate::similarity::{Scored, top_k_similar};

/// A fact to seed into the knowledge store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedFact {
    pub content: &'static str,
    pub category: &'static str,
}

/// Facts about the site owner loaded by `seed`.
pub fn default_facts() -> &'static [SeedFact] {
    const FACTS: &[SeedFact] = &[
        SeedFact {
            content: "Rameez Bader Khwaja is a Full-Stack Developer and AI enthusiast from \
                      Karachi, Pakistan. He specializes in Next.js, TypeScript, React, and \
                      AI-driven technologies.",
            category: "about",
        },
        SeedFact {
            content: "Rameez has completed ADP in Computer Information Systems from Hamdard \
                      University, focusing on Programming, Software Development, Data \
                      Management, and Computer Systems Architecture.",
            category: "education",
        },
        SeedFact {
            content: "Rameez is part of the Governor Sindh IT Initiative (Panaverse Program), \
                      learning TypeScript, Next.js, Python, Node.js, and Agentic AI.",
            category: "education",
        },
        SeedFact {
            content: "Technical skills include: Next.js, TypeScript, React, Tailwind CSS, \
                      Framer Motion (frontend); Node.js, Express.js, Prisma, PostgreSQL, REST \
                      APIs (backend); Python, OpenAI SDK, Gemini API, FastAPI, Agentic AI (AI & \
                      DevOps); Git, GitHub, Vercel, Supabase, Passport.js, ShadCN UI (tools).",
            category: "skills",
        },
        SeedFact {
            content: "Notable projects include AuthApp Sage (authentication system with OAuth), \
                      RameezBot (AI chatbot), and full-stack applications with Next.js, Express, \
                      Prisma, and PostgreSQL.",
            category: "projects",
        },
        SeedFact {
            content: "Rameez's hobbies include building interactive UIs, exploring Agentic AI \
                      with OpenAI and Gemini APIs, working with Express.js and databases, cloud \
                      deployments, cybersecurity, and learning new frameworks.",
            category: "interests",
        },
        SeedFact {
            content: "Contact information: Email is rameezbaderkhwaja@gmail.com, GitHub is \
                      github.com/RameezBadruddinKhwaja, LinkedIn is \
                      linkedin.com/in/rameezbaderkhwaja, located in Karachi, Pakistan.",
            category: "contact",
        },
        SeedFact {
            content: "Rameez's goal is to become an AI-first Full Stack Engineer capable of \
                      developing intelligent, scalable, and interactive applications.",
            category: "goals",
        },
    ];
    FACTS
}

/// Retrieval over the knowledge store and the conversation log.
pub struct KnowledgeBase {
    store: Arc<dyn KnowledgeStore>,
    log: Arc<dyn ConversationLog>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RagConfig,
}

impl KnowledgeBase {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        log: Arc<dyn ConversationLog>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RagConfig,
    ) -> Self {
        Self {
            store,
            log,
            embedder,
            config,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Embed and store the default facts, skipping any whose content is
    /// already present. Returns the number of new rows.
    #[instrument(skip(self))]
    pub async fn seed(&self) -> Result<usize> {
        let facts = default_facts();
        let texts: Vec<String> = facts.iter().map(|f| f.content.to_string()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != facts.len() {
            return Err(Error::Provider(format!(
                "expected {} embeddings, got {}",
                facts.len(),
                embeddings.len()
            )));
        }

        let mut inserted = 0;
        for (fact, embedding) in facts.iter().zip(embeddings) {
            let item = NewKnowledgeItem {
                content: fact.content.to_string(),
                embedding,
                category: Some(fact.category.to_string()),
                metadata: None,
            };
            if self.store.insert_if_absent(item).await? {
                inserted += 1;
            }
        }

        info!(
            inserted,
            total = facts.len(),
            model = self.embedder.model(),
            "knowledge base seeded"
        );
        Ok(inserted)
    }

    /// Embed and store one extra fact.
    pub async fn add_knowledge(
        &self,
        content: &str,
        category: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<String> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation("knowledge content cannot be empty".into()));
        }

        let embedding = self.embedder.embed_query(content).await?;
        let id = self
            .store
            .insert(NewKnowledgeItem {
                content: content.to_string(),
                embedding,
                category: category.map(str::to_string),
                metadata,
            })
            .await?;
        debug!(%id, "knowledge added");
        Ok(id)
    }

    /// Knowledge items most similar to the query, best first.
    pub async fn retrieve_context(&self, query_embedding: &[f32]) -> Vec<Scored<KnowledgeItem>> {
        let items = match self.store.list_all().await {
            Ok(items) => items,
            Err(e) => {
                warn!("knowledge lookup failed, continuing without context: {e}");
                return Vec::new();
            }
        };

        let ranked = top_k_similar(
            query_embedding,
            items,
            |item| item.embedding.as_slice(),
            self.config.knowledge_top_k,
            self.config.knowledge_threshold,
        );
        debug!(matches = ranked.len(), "knowledge retrieved");
        ranked
    }

    /// Past exchanges most similar to the query, drawn from recent history.
    pub async fn search_history(&self, query_embedding: &[f32]) -> Vec<Scored<PastExchange>> {
        let messages = match self
            .log
            .list_recent_embedded(self.config.history_scan_limit)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!("history lookup failed, continuing without it: {e}");
                return Vec::new();
            }
        };

        let candidates = messages.into_iter().filter_map(|m| {
            m.embedding.map(|embedding| {
                (
                    PastExchange {
                        user_message: m.user_message,
                        bot_reply: m.bot_reply,
                    },
                    embedding,
                )
            })
        });

        top_k_similar(
            query_embedding,
            candidates,
            |(_, embedding)| embedding.as_slice(),
            self.config.history_top_k,
            self.config.history_threshold,
        )
        .into_iter()
        .map(|s| Scored {
            item: s.item.0,
            score: s.score,
        })
        .collect()
    }
}
