use async_trait::async_trait;
use foliobot_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::embeddings::EmbeddingProvider;
use crate::providers::{LlmProvider, LlmRequest, LlmResponse, LlmRole, Usage};

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini `generateContent` provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn model_url(&self, model: &str, action: &str) -> String {
        format!(
            "{}/models/{model}:{action}",
            self.base_url.trim_end_matches('/')
        )
    }

    fn build_request(&self, request: &LlmRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .filter(|msg| msg.role != LlmRole::System)
            .map(|msg| GeminiContent {
                // Gemini names the assistant role "model".
                role: Some(
                    match msg.role {
                        LlmRole::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        let mut system_text: Vec<&str> = request
            .messages
            .iter()
            .filter(|msg| msg.role == LlmRole::System)
            .map(|msg| msg.content.as_str())
            .collect();
        if let Some(system) = &request.system {
            system_text.insert(0, system.as_str());
        }

        let system_instruction = (!system_text.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: system_text.join("\n"),
            }],
        });

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "gemini API error: status={status}, body={body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to parse gemini response: {e}")))
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_id(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model))]
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let model = if request.model.is_empty() {
            self.model.as_str()
        } else {
            request.model.as_str()
        };
        tracing::Span::current().record("model", model);
        debug!("gemini request: model={model}");

        let body = self.build_request(request);
        let response: GeminiResponse = self
            .post(self.model_url(model, "generateContent"), &body)
            .await?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("no candidates returned from gemini".into()))?;

        let text = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default();

        Ok(LlmResponse {
            text,
            model: model.to_string(),
            usage: response.usage_metadata.map(|u| Usage {
                input_tokens: u.prompt_token_count.unwrap_or(0),
                output_tokens: u.candidates_token_count.unwrap_or(0),
            }),
            stop_reason: candidate.finish_reason,
        })
    }

    fn configured_model(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn health_check(&self) -> Result<bool> {
        let request = LlmRequest::prompt(None, "ping").with_max_tokens(1);
        match self.complete(&request).await {
            Ok(_) => Ok(true),
            Err(e) => {
                info!("gemini health check failed: {e}");
                Ok(false)
            }
        }
    }
}

/// Gemini `embedContent` / `batchEmbedContents` client.
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingProvider {
    inner: GeminiProvider,
}

impl GeminiEmbeddingProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            inner: GeminiProvider::new(
                api_key,
                Some(model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string())),
                base_url,
            ),
        }
    }

    fn embed_request(&self, text: &str, task_type: &'static str) -> EmbedContentRequest {
        EmbedContentRequest {
            model: format!("models/{}", self.inner.model),
            content: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            },
            task_type,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn provider_id(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.inner.model
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|t| self.embed_request(t, "RETRIEVAL_DOCUMENT"))
                .collect(),
        };
        let response: BatchEmbedResponse = self
            .inner
            .post(
                self.inner.model_url(&self.inner.model, "batchEmbedContents"),
                &body,
            )
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::Provider(format!(
                "gemini returned {} embeddings for {} inputs",
                response.embeddings.len(),
                texts.len()
            )));
        }
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }

    #[instrument(skip(self, text))]
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let response: EmbedContentResponse = self
            .inner
            .post(
                self.inner.model_url(&self.inner.model, "embedContent"),
                &self.embed_request(text, "RETRIEVAL_QUERY"),
            )
            .await?;

        if response.embedding.values.is_empty() {
            return Err(Error::Provider("gemini returned an empty embedding".into()));
        }
        Ok(response.embedding.values)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.embed_query("health check").await.is_ok())
    }
}

// --- Gemini Wire Types (private) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: GeminiContent,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: GeminiEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}
