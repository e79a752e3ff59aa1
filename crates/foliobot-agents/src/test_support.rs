//! Scripted providers shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use foliobot_common::{Error, Result};

use crate::embeddings::EmbeddingProvider;
use crate::fallback::SecondaryBackend;
use crate::providers::{LlmProvider, LlmRequest, LlmResponse};

pub struct ScriptedLlm {
    id: String,
    reply: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn replying(id: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            reply: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<LlmRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Some(text) => Ok(LlmResponse {
                text: text.clone(),
                model: "scripted".into(),
                usage: None,
                stop_reason: Some("stop".into()),
            }),
            None => Err(Error::Provider(format!("{} is down", self.id))),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.reply.is_some())
    }
}

/// Bag-of-keywords embedder: one dimension per keyword, counting occurrences.
pub struct KeywordEmbedder {
    fail: bool,
    calls: AtomicUsize,
}

pub const KEYWORDS: [&str; 6] = ["goal", "skill", "project", "hobb", "contact", "education"];

impl KeywordEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .map(|kw| lower.matches(kw).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn provider_id(&self) -> &str {
        "keywords"
    }

    fn model(&self) -> &str {
        "bag-of-keywords"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Provider("embedding service unavailable".into()));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Provider("embedding service unavailable".into()));
        }
        Ok(Self::vector(text))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }
}

pub struct ScriptedBackend {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondaryBackend for ScriptedBackend {
    fn backend_id(&self) -> &str {
        "scripted"
    }

    async fn reply(&self, _message: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| Error::Provider("secondary backend timed out".into()))
    }
}
