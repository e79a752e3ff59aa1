use async_trait::async_trait;
use foliobot_common::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::embeddings::EmbeddingProvider;
use crate::providers::{LlmProvider, LlmRequest, LlmResponse, Usage};

const DEFAULT_MODEL: &str = "llama3.1";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: Client::new(),
        }
    }

    fn build_request_body(&self, request: &LlmRequest) -> Value {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        let mut messages: Vec<Value> = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.extend(request.messages.iter().map(|msg| {
            serde_json::json!({
                "role": msg.role.as_str(),
                "content": msg.content,
            })
        }));

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });

        let mut options = serde_json::Map::new();
        if let Some(temp) = request.temperature {
            options.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict".to_string(), serde_json::json!(max_tokens));
        }
        if !options.is_empty()
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("options".to_string(), Value::Object(options));
        }

        body
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("ollama request failed: {e}")))?;

        if !res.status().is_success() {
            return Err(Error::Provider(format!(
                "ollama error status: {}",
                res.status()
            )));
        }
        Ok(res)
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("failed to list models: {e}")))?;

        if !res.status().is_success() {
            return Err(Error::Provider(format!(
                "ollama error status: {}",
                res.status()
            )));
        }

        let models_res: OllamaModelsResponse = res
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to parse models response: {e}")))?;

        Ok(models_res.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn provider_id(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request))]
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = self.build_request_body(request);
        debug!("ollama request: model={}", body["model"]);

        let ollama_res: OllamaResponse = self
            .post("/api/chat", &body)
            .await?
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to parse ollama response: {e}")))?;

        Ok(LlmResponse {
            text: ollama_res.message.map(|m| m.content).unwrap_or_default(),
            model: ollama_res.model,
            usage: Some(Usage {
                input_tokens: ollama_res.prompt_eval_count,
                output_tokens: ollama_res.eval_count,
            }),
            stop_reason: ollama_res.done.then(|| "stop".to_string()),
        })
    }

    fn configured_model(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

/// Ollama `/api/embed` client. Kept separate from [`OllamaProvider`] because
/// chat and embedding models are configured independently.
#[derive(Clone)]
pub struct OllamaEmbeddingProvider {
    inner: OllamaProvider,
}

impl OllamaEmbeddingProvider {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            inner: OllamaProvider::new(
                Some(model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string())),
                base_url,
            ),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn provider_id(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.inner.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({ "model": self.inner.model, "input": texts });
        let res: OllamaEmbedResponse = self
            .inner
            .post("/api/embed", &body)
            .await?
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to parse ollama embeddings: {e}")))?;

        if res.embeddings.len() != texts.len() {
            return Err(Error::Provider(format!(
                "ollama returned {} embeddings for {} inputs",
                res.embeddings.len(),
                texts.len()
            )));
        }
        Ok(res.embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_documents(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::Provider("ollama returned no embeddings for query".into()))
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    model: String,
    message: Option<OllamaMessage>,
    done: bool,
    #[serde(default)]
    eval_count: u32,
    #[serde(default)]
    prompt_eval_count: u32,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}
