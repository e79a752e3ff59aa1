use async_trait::async_trait;
use foliobot_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::embeddings::EmbeddingProvider;
use crate::providers::{LlmProvider, LlmRequest, LlmResponse, Usage};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI Chat Completions and Embeddings provider.
/// Also works with OpenAI-compatible APIs (Azure, local models) via `base_url`.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Build an embeddings-only client; `model` names the embedding model.
    pub fn for_embeddings(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        let mut provider = Self::new(api_key, None, base_url);
        if let Some(model) = model {
            provider.embedding_model = model;
        }
        provider
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &LlmRequest) -> OpenAiRequest {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        let mut messages: Vec<OpenAiMessage> = Vec::with_capacity(request.messages.len() + 1);

        // System message from the request
        if let Some(system) = &request.system {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }

        messages.extend(request.messages.iter().map(|msg| OpenAiMessage {
            role: msg.role.as_str().to_string(),
            content: Some(msg.content.clone()),
        }));

        OpenAiRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("openai request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "openai API error: status={status}, body={body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to parse openai response: {e}")))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model))]
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = self.build_request(request);

        tracing::Span::current().record("model", body.model.as_str());
        debug!("openai request: model={}", body.model);

        let api_response: OpenAiResponse = self.post_json("chat/completions", &body).await?;
        from_openai_response(api_response)
    }

    fn configured_model(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn health_check(&self) -> Result<bool> {
        let request = LlmRequest::prompt(None, "ping").with_max_tokens(1);

        match self.complete(&request).await {
            Ok(_) => Ok(true),
            Err(e) => {
                info!("openai health check failed: {e}");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = OpenAiEmbeddingRequest {
            model: self.embedding_model.clone(),
            input: texts.to_vec(),
        };
        let response: OpenAiEmbeddingResponse = self.post_json("embeddings", &body).await?;

        let mut data = response.data;
        // The API documents `index` but does not promise ordering.
        data.sort_by_key(|d| d.index);
        if data.len() != texts.len() {
            return Err(Error::Provider(format!(
                "openai returned {} embeddings for {} inputs",
                data.len(),
                texts.len()
            )));
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_documents(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::Provider("openai returned no embeddings for query".into()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.embed_query("health check").await.is_ok())
    }
}

// --- OpenAI Wire Types (private) ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    model: String,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

fn from_openai_response(response: OpenAiResponse) -> Result<LlmResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Provider("openai returned no choices".into()))?;

    Ok(LlmResponse {
        text: choice.message.content.unwrap_or_default(),
        model: response.model,
        usage: response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
        stop_reason: choice.finish_reason,
    })
}
