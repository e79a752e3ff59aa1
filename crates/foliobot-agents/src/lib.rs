pub mod chatbot;
pub mod composer;
pub mod embeddings;
pub mod fallback;
pub mod gemini;
pub mod knowledge;
pub mod ollama;
pub mod openai;
pub mod profile;
pub mod providers;
pub mod router;
pub mod similarity;

#[cfg(test)]
mod test_support;

pub use chatbot::{AnswerMethod, ChatAnswer, Chatbot, ChatbotStatus, ClientMeta, ProviderStatus};
pub use composer::{PastExchange, Persona, ResponseComposer};
pub use embeddings::{CohereEmbeddingProvider, DisabledEmbeddingProvider, EmbeddingProvider};
pub use fallback::{HttpBotBackend, SecondaryBackend};
pub use gemini::{GeminiEmbeddingProvider, GeminiProvider};
pub use knowledge::{KnowledgeBase, SeedFact, default_facts};
pub use ollama::{OllamaEmbeddingProvider, OllamaProvider};
pub use openai::OpenAiProvider;
pub use profile::SiteProfile;
pub use providers::{LlmMessage, LlmProvider, LlmRequest, LlmResponse, LlmRole, Usage};
pub use router::{Route, SmartRouter, Topic};
pub use similarity::{Scored, cosine_similarity, top_k_similar};
