use std::sync::Arc;

use foliobot_agents::Chatbot;
use foliobot_common::Result;
use foliobot_config::AppConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Binds the configured address and serves the chat API.
pub struct GatewayServer {
    config: AppConfig,
    chatbot: Chatbot,
}

impl GatewayServer {
    pub fn new(config: AppConfig, chatbot: Chatbot) -> Self {
        Self { config, chatbot }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);

        let state = Arc::new(AppState::new(self.config, self.chatbot));
        let app = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("FolioBot gateway listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| foliobot_common::Error::Gateway(format!("server error: {e}")))?;

        Ok(())
    }
}
