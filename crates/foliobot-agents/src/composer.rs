use std::sync::Arc;

use foliobot_common::{Error, Result};
use foliobot_config::{BotConfig, RagConfig};
use tracing::{debug, instrument, warn};

use crate::profile::SiteProfile;
use crate::providers::{LlmProvider, LlmRequest};

const GREETING_MAX_TOKENS: u32 = 150;
const DATA_MAX_TOKENS: u32 = 300;

/// Who the bot speaks as, and for whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub bot_name: String,
    pub owner_name: String,
    pub contact_email: String,
}

impl Persona {
    pub fn owner_short_name(&self) -> &str {
        self.owner_name
            .split_whitespace()
            .next()
            .unwrap_or(self.owner_name.as_str())
    }

    /// Take the owner's name and contact email from a site profile. The bot
    /// name stays as configured.
    pub fn with_profile(mut self, profile: &SiteProfile) -> Self {
        self.owner_name = profile.about.name.clone();
        self.contact_email = profile.contact.email.clone();
        self
    }
}

impl From<&BotConfig> for Persona {
    fn from(config: &BotConfig) -> Self {
        Self {
            bot_name: config.name.clone(),
            owner_name: config.owner_name.clone(),
            contact_email: config.contact_email.clone(),
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::from(&BotConfig::default())
    }
}

/// A past exchange surfaced as conversational context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastExchange {
    pub user_message: String,
    pub bot_reply: String,
}

/// Builds prompts and walks the provider chain.
pub struct ResponseComposer {
    providers: Vec<Arc<dyn LlmProvider>>,
    persona: Persona,
    max_tokens: u32,
    temperature: f64,
}

impl ResponseComposer {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, persona: Persona) -> Self {
        let rag = RagConfig::default();
        Self {
            providers,
            persona,
            max_tokens: rag.max_tokens,
            temperature: rag.temperature,
        }
    }

    pub fn with_generation(mut self, max_tokens: u32, temperature: f64) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn providers(&self) -> &[Arc<dyn LlmProvider>] {
        &self.providers
    }

    /// Try each provider once, in order, until one produces a non-empty reply.
    pub async fn complete(&self, system: String, user: String, max_tokens: u32) -> Result<String> {
        if self.providers.is_empty() {
            return Err(Error::Provider("no LLM providers configured".into()));
        }

        let request = LlmRequest::prompt(Some(system), user)
            .with_max_tokens(max_tokens)
            .with_temperature(self.temperature);

        let mut last_error = None;
        for provider in &self.providers {
            match provider.complete(&request).await {
                Ok(response) if !response.text.trim().is_empty() => {
                    debug!(
                        provider = provider.provider_id(),
                        model = %response.model,
                        "completion succeeded"
                    );
                    return Ok(response.text.trim().to_string());
                }
                Ok(_) => {
                    warn!(provider = provider.provider_id(), "provider returned an empty reply");
                    last_error = Some(format!("{} returned an empty reply", provider.provider_id()));
                }
                Err(e) => {
                    warn!(provider = provider.provider_id(), "provider failed: {e}");
                    last_error = Some(format!("{}: {e}", provider.provider_id()));
                }
            }
        }

        Err(Error::Provider(format!(
            "all providers failed (last: {})",
            last_error.unwrap_or_default()
        )))
    }

    pub fn canned_greeting(&self) -> String {
        format!(
            "Hi! I'm {} 👋 I'm here to help you learn about {}'s skills, projects, and \
             experience. What would you like to know?",
            self.persona.bot_name,
            self.persona.owner_short_name()
        )
    }

    pub fn apology(&self) -> String {
        format!(
            "I apologize, but I'm having trouble processing your request right now. Please \
             try again in a moment or contact {} directly at {}.",
            self.persona.owner_short_name(),
            self.persona.contact_email
        )
    }

    /// Short persona reply; never fails.
    #[instrument(skip(self, message))]
    pub async fn greeting(&self, message: &str) -> String {
        let system = format!(
            "You are {bot}, a friendly AI assistant for {owner}'s portfolio.\n\n\
             Respond in a friendly, casual way. Keep it short (1-2 sentences). You can:\n\
             - Greet them warmly\n\
             - Introduce yourself as {bot}\n\
             - Offer to help with questions about {short}'s skills, projects, or background\n\
             - Keep it professional but friendly",
            bot = self.persona.bot_name,
            owner = self.persona.owner_name,
            short = self.persona.owner_short_name(),
        );

        match self
            .complete(system, message.to_string(), GREETING_MAX_TOKENS)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("greeting falls back to canned reply: {e}");
                self.canned_greeting()
            }
        }
    }

    /// Paraphrase a profile section; the raw section is the fallback.
    #[instrument(skip(self, message, section))]
    pub async fn data(&self, message: &str, section: &str) -> String {
        let system = format!(
            "You are {bot}, helping users learn about {owner}.\n\n\
             Here's relevant information from the website:\n{section}\n\n\
             Instructions:\n\
             - Answer based on the website data above\n\
             - Be concise (2-3 sentences)\n\
             - Be friendly and professional\n\
             - If the data doesn't fully answer the question, say so",
            bot = self.persona.bot_name,
            owner = self.persona.owner_name,
        );

        match self
            .complete(system, message.to_string(), DATA_MAX_TOKENS)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("data answer falls back to raw section: {e}");
                section.to_string()
            }
        }
    }

    pub fn rag_system_prompt(&self, knowledge: &[String], history: &[PastExchange]) -> String {
        let context = if knowledge.is_empty() {
            "No specific context found.".to_string()
        } else {
            knowledge.join("\n\n")
        };

        let past = if history.is_empty() {
            String::new()
        } else {
            let pairs = history
                .iter()
                .map(|h| format!("User: {}\nBot: {}", h.user_message, h.bot_reply))
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("Similar past conversations:\n{pairs}\n\n")
        };

        format!(
            "You are {bot}, an AI assistant for {owner}'s portfolio website.\n\n\
             Context from knowledge base:\n{context}\n\n\
             {past}\
             Instructions:\n\
             - Answer based on the context provided above\n\
             - Be friendly, professional, and helpful\n\
             - If you don't know something from the context, say so honestly\n\
             - Keep responses concise (2-3 paragraphs max)\n\
             - Use the information from past conversations if relevant\n\
             - Maintain {short}'s voice and personality",
            bot = self.persona.bot_name,
            owner = self.persona.owner_name,
            short = self.persona.owner_short_name(),
        )
    }

    /// Grounded answer from retrieved context. Errors when every provider fails.
    #[instrument(skip_all, fields(knowledge = knowledge.len(), history = history.len()))]
    pub async fn rag(
        &self,
        message: &str,
        knowledge: &[String],
        history: &[PastExchange],
    ) -> Result<String> {
        let system = self.rag_system_prompt(knowledge, history);
        self.complete(system, message.to_string(), self.max_tokens)
            .await
    }
}
