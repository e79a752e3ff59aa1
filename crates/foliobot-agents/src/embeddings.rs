use async_trait::async_trait;
use foliobot_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Converts text into fixed-length vectors within one embedding space.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn provider_id(&self) -> &str;
    fn model(&self) -> &str;
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
    async fn health_check(&self) -> Result<bool>;
}

/// Stand-in used when no embedding provider is configured. Every call fails,
/// so answers proceed without retrieval.
pub struct DisabledEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddingProvider {
    fn provider_id(&self) -> &str {
        "none"
    }

    fn model(&self) -> &str {
        "none"
    }

    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Provider("no embedding provider configured".into()))
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::Provider("no embedding provider configured".into()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Cohere embeddings provider.
pub struct CohereEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl CohereEmbeddingProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| "embed-english-v3.0".to_string()),
            base_url: base_url.unwrap_or_else(|| "https://api.cohere.com".to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embed", self.base_url.trim_end_matches('/'))
    }

    fn build_request_body(&self, texts: &[String], input_type: &str) -> CohereEmbedRequest {
        CohereEmbedRequest {
            model: self.model.clone(),
            texts: texts.to_vec(),
            input_type: input_type.to_string(),
            embedding_types: vec!["float".to_string()],
            truncate: "END".to_string(),
        }
    }

    async fn embed_with_input_type(
        &self,
        texts: &[String],
        input_type: &str,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.build_request_body(texts, input_type))
            .send()
            .await
            .map_err(|e| Error::Provider(format!("cohere request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "cohere embed request failed: status={status}, body={body}"
            )));
        }

        let payload: CohereEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to decode cohere response: {e}")))?;

        payload.into_float_embeddings()
    }
}

#[async_trait]
impl EmbeddingProvider for CohereEmbeddingProvider {
    fn provider_id(&self) -> &str {
        "cohere"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_input_type(texts, "search_document").await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let texts = vec![text.to_string()];
        let mut embeddings = self.embed_with_input_type(&texts, "search_query").await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::Provider("cohere returned no embeddings for query".into()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.embed_query("health check").await.is_ok())
    }
}

#[derive(Debug, Clone, Serialize)]
struct CohereEmbedRequest {
    model: String,
    texts: Vec<String>,
    input_type: String,
    embedding_types: Vec<String>,
    truncate: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CohereEmbedResponse {
    embeddings: Option<CohereEmbeddings>,
}

#[derive(Debug, Clone, Deserialize)]
struct CohereEmbeddings {
    float: Option<Vec<Vec<f32>>>,
}

impl CohereEmbedResponse {
    fn into_float_embeddings(self) -> Result<Vec<Vec<f32>>> {
        self.embeddings
            .and_then(|e| e.float)
            .ok_or_else(|| Error::Provider("cohere response missing float embeddings".into()))
    }
}
