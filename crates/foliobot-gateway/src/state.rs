use std::sync::Arc;

use foliobot_agents::Chatbot;
use foliobot_config::AppConfig;

/// Shared application state accessible from all request handlers.
pub struct AppState {
    pub config: AppConfig,
    pub chatbot: Chatbot,
}

impl AppState {
    pub fn new(config: AppConfig, chatbot: Chatbot) -> Self {
        Self { config, chatbot }
    }
}

pub type SharedState = Arc<AppState>;
