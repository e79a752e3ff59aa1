use std::time::Duration;

use async_trait::async_trait;
use foliobot_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// Independent bot service consulted when every model provider has failed.
#[async_trait]
pub trait SecondaryBackend: Send + Sync {
    fn backend_id(&self) -> &str;

    async fn reply(&self, message: &str) -> Result<String>;
}

/// HTTP bot exposing `POST /chat {"message"} -> {"reply"}`.
pub struct HttpBotBackend {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpBotBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid fallback url '{base_url}': {e}")))?;
        // Join relative to the base path, not replacing its last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("chat")
            .map_err(|e| Error::Config(format!("invalid fallback url '{base_url}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct BotRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct BotResponse {
    reply: String,
}

#[async_trait]
impl SecondaryBackend for HttpBotBackend {
    fn backend_id(&self) -> &str {
        "http-bot"
    }

    #[instrument(skip(self, message), fields(endpoint = %self.endpoint))]
    async fn reply(&self, message: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&BotRequest { message })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Provider("secondary bot timed out".into())
                } else {
                    Error::Provider(format!("secondary bot request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "secondary bot returned status {}",
                response.status()
            )));
        }

        let body: BotResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to decode secondary bot reply: {e}")))?;

        let reply = body.reply.trim();
        if reply.is_empty() {
            return Err(Error::Provider("secondary bot returned an empty reply".into()));
        }
        debug!("secondary bot replied ({} chars)", reply.len());
        Ok(reply.to_string())
    }
}
