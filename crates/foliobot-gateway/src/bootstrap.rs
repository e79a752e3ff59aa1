use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use foliobot_agents::{
    Chatbot, CohereEmbeddingProvider, DisabledEmbeddingProvider, EmbeddingProvider,
    GeminiEmbeddingProvider, GeminiProvider, HttpBotBackend, KnowledgeBase, LlmProvider,
    OllamaEmbeddingProvider, OllamaProvider, OpenAiProvider, Persona, ResponseComposer,
    SiteProfile,
};
use foliobot_common::Result;
use foliobot_config::{AppConfig, EmbeddingConfig, LlmProviderConfig};
use foliobot_db::{SqliteConversationLog, SqliteKnowledgeStore};
use tracing::{info, warn};

pub const KNOWLEDGE_DB_FILE: &str = "knowledge.db";
pub const CONVERSATIONS_DB_FILE: &str = "conversations.db";

/// Resolve an API key from config, then the environment.
fn resolve_api_key(config_key: Option<&str>, env_var: &str) -> Option<String> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Some(key.to_string());
    }

    std::env::var(env_var).ok().filter(|v| !v.is_empty())
}

/// Providers used when the config lists none: whatever the environment has keys for.
fn implied_llm_configs() -> Vec<LlmProviderConfig> {
    [("gemini", "GEMINI_API_KEY"), ("openai", "OPENAI_API_KEY")]
        .into_iter()
        .filter(|(_, env_var)| std::env::var(env_var).is_ok_and(|v| !v.is_empty()))
        .map(|(provider, _)| LlmProviderConfig {
            name: None,
            provider: provider.to_string(),
            model: None,
            api_key: None,
            base_url: None,
        })
        .collect()
}

/// Build the ordered generative provider list from the application config.
pub fn build_llm_providers(config: &AppConfig) -> Vec<Arc<dyn LlmProvider>> {
    let configs = if config.llm.is_empty() {
        implied_llm_configs()
    } else {
        config.llm.clone()
    };

    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();
    for llm_config in &configs {
        let name = llm_config.display_name();
        match llm_config.provider.as_str() {
            "gemini" => {
                match resolve_api_key(llm_config.api_key.as_deref(), "GEMINI_API_KEY") {
                    Some(key) => {
                        providers.push(Arc::new(GeminiProvider::new(
                            key,
                            llm_config.model.clone(),
                            llm_config.base_url.clone(),
                        )));
                        info!("configured gemini provider: {name}");
                    }
                    None => warn!(
                        "skipping gemini provider {name}: no API key (set api_key in config or GEMINI_API_KEY env var)"
                    ),
                }
            }
            "openai" => {
                match resolve_api_key(llm_config.api_key.as_deref(), "OPENAI_API_KEY") {
                    Some(key) => {
                        providers.push(Arc::new(OpenAiProvider::new(
                            key,
                            llm_config.model.clone(),
                            llm_config.base_url.clone(),
                        )));
                        info!("configured openai provider: {name}");
                    }
                    None => warn!(
                        "skipping openai provider {name}: no API key (set api_key in config or OPENAI_API_KEY env var)"
                    ),
                }
            }
            "ollama" => {
                providers.push(Arc::new(OllamaProvider::new(
                    llm_config.model.clone(),
                    llm_config.base_url.clone(),
                )));
                info!("configured ollama provider: {name}");
            }
            other => warn!("unknown LLM provider type: {other}, skipping {name}"),
        }
    }

    if providers.is_empty() {
        warn!("no LLM providers configured; model-backed answers will use the fallback chain");
    }
    providers
}

/// Build the embedding provider. Without configuration, Gemini is used when
/// `GEMINI_API_KEY` is set; otherwise retrieval is disabled.
pub fn build_embedding_provider(config: &AppConfig) -> Arc<dyn EmbeddingProvider> {
    let embed_config = config.embeddings.clone().unwrap_or_else(|| EmbeddingConfig {
        provider: "gemini".to_string(),
        model: None,
        api_key: None,
        base_url: None,
    });

    let provider: Option<Arc<dyn EmbeddingProvider>> = match embed_config.provider.as_str() {
        "gemini" => resolve_api_key(embed_config.api_key.as_deref(), "GEMINI_API_KEY").map(
            |key| -> Arc<dyn EmbeddingProvider> {
                Arc::new(GeminiEmbeddingProvider::new(
                    key,
                    embed_config.model.clone(),
                    embed_config.base_url.clone(),
                ))
            },
        ),
        "openai" => resolve_api_key(embed_config.api_key.as_deref(), "OPENAI_API_KEY").map(
            |key| -> Arc<dyn EmbeddingProvider> {
                Arc::new(OpenAiProvider::for_embeddings(
                    key,
                    embed_config.model.clone(),
                    embed_config.base_url.clone(),
                ))
            },
        ),
        "cohere" => resolve_api_key(embed_config.api_key.as_deref(), "COHERE_API_KEY").map(
            |key| -> Arc<dyn EmbeddingProvider> {
                Arc::new(CohereEmbeddingProvider::new(
                    key,
                    embed_config.model.clone(),
                    embed_config.base_url.clone(),
                ))
            },
        ),
        "ollama" => Some(Arc::new(OllamaEmbeddingProvider::new(
            embed_config.model.clone(),
            embed_config.base_url.clone(),
        )) as Arc<dyn EmbeddingProvider>),
        other => {
            warn!("unknown embedding provider type: {other}");
            None
        }
    };

    match provider {
        Some(provider) => {
            info!(
                "configured {} embeddings: {}",
                provider.provider_id(),
                provider.model()
            );
            provider
        }
        None => {
            warn!("no embedding provider available; answers will run without retrieval");
            Arc::new(DisabledEmbeddingProvider)
        }
    }
}

/// Wire stores, providers, and profile into a ready `Chatbot`.
pub fn build_chatbot(config: &AppConfig, data_dir: &Path) -> Result<Chatbot> {
    std::fs::create_dir_all(data_dir)?;

    let store = Arc::new(SqliteKnowledgeStore::open(
        &data_dir.join(KNOWLEDGE_DB_FILE),
    )?);
    let log = Arc::new(SqliteConversationLog::open(
        &data_dir.join(CONVERSATIONS_DB_FILE),
    )?);

    let profile = SiteProfile::load_or_default(config.bot.profile_path.as_deref())?;
    let mut persona = Persona::from(&config.bot);
    if config.bot.profile_path.is_some() {
        persona = persona.with_profile(&profile);
    }
    let composer = ResponseComposer::new(build_llm_providers(config), persona)
        .with_generation(config.rag.max_tokens, config.rag.temperature);
    let knowledge = KnowledgeBase::new(
        store,
        log.clone(),
        build_embedding_provider(config),
        config.rag.clone(),
    );

    let mut chatbot = Chatbot::new(composer, knowledge, log, profile);

    if let Some(url) = config.fallback.url.as_deref().filter(|u| !u.is_empty()) {
        let timeout = Duration::from_secs(config.fallback.timeout_secs);
        let backend = HttpBotBackend::new(url, timeout)?;
        info!("configured secondary bot backend: {}", backend.endpoint());
        chatbot = chatbot.with_secondary(Arc::new(backend), timeout);
    }

    Ok(chatbot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm(provider: &str, api_key: Option<&str>) -> LlmProviderConfig {
        LlmProviderConfig {
            name: Some(format!("{provider}-test")),
            provider: provider.to_string(),
            model: Some("test-model".to_string()),
            api_key: api_key.map(str::to_string),
            base_url: Some("http://127.0.0.1:9".to_string()),
        }
    }

    #[test]
    fn config_key_wins_over_environment() {
        assert_eq!(
            resolve_api_key(Some("from-config"), "FOLIOBOT_TEST_UNSET_VAR"),
            Some("from-config".to_string())
        );
        assert_eq!(resolve_api_key(Some(""), "FOLIOBOT_TEST_UNSET_VAR"), None);
        assert_eq!(resolve_api_key(None, "FOLIOBOT_TEST_UNSET_VAR"), None);
    }

    #[test]
    fn providers_follow_config_order() {
        let config = AppConfig {
            llm: vec![
                llm("ollama", None),
                llm("openai", Some("sk-test")),
                llm("gemini", Some("g-test")),
                llm("mystery", None),
            ],
            ..AppConfig::default()
        };

        let ids: Vec<String> = build_llm_providers(&config)
            .iter()
            .map(|p| p.provider_id().to_string())
            .collect();
        assert_eq!(ids, vec!["ollama", "openai", "gemini"]);
    }

    #[test]
    fn explicit_embedding_config_is_honoured() {
        let config = AppConfig {
            embeddings: Some(EmbeddingConfig {
                provider: "ollama".to_string(),
                model: Some("nomic-embed-text".to_string()),
                api_key: None,
                base_url: None,
            }),
            ..AppConfig::default()
        };
        let embedder = build_embedding_provider(&config);
        assert_eq!(embedder.provider_id(), "ollama");
        assert_eq!(embedder.model(), "nomic-embed-text");
    }

    #[test]
    fn unknown_embedding_provider_disables_retrieval() {
        let config = AppConfig {
            embeddings: Some(EmbeddingConfig {
                provider: "mystery".to_string(),
                model: None,
                api_key: None,
                base_url: None,
            }),
            ..AppConfig::default()
        };
        assert_eq!(build_embedding_provider(&config).provider_id(), "none");
    }

    #[tokio::test]
    async fn builds_chatbot_with_databases_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            llm: vec![llm("ollama", None)],
            ..AppConfig::default()
        };

        let chatbot = build_chatbot(&config, dir.path()).unwrap();
        assert!(dir.path().join(KNOWLEDGE_DB_FILE).exists());
        assert!(dir.path().join(CONVERSATIONS_DB_FILE).exists());

        let status = chatbot.status(false).await;
        assert_eq!(status.providers.len(), 1);
        assert_eq!(status.knowledge_items, Some(0));
        assert!(status.secondary_backend.is_none());
    }

    #[test]
    fn invalid_fallback_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.fallback.url = Some("not a url".to_string());
        assert!(build_chatbot(&config, dir.path()).is_err());
    }

    #[tokio::test]
    async fn custom_profile_sets_owner_in_apology() {
        let dir = tempfile::tempdir().unwrap();
        let profile_path = dir.path().join("profile.yml");
        std::fs::write(
            &profile_path,
            "about:\n  name: Ada Lovelace\n  title: Analyst\n  location: London\n  bio: Wrote the first program.\nskills:\n  tools: [Difference Engine]\ncontact:\n  email: ada@example.com\n",
        )
        .unwrap();

        let mut config = AppConfig {
            llm: vec![llm("ollama", None)],
            embeddings: Some(EmbeddingConfig {
                provider: "ollama".to_string(),
                model: None,
                api_key: None,
                base_url: Some("http://127.0.0.1:9".to_string()),
            }),
            ..AppConfig::default()
        };
        config.bot.profile_path = Some(profile_path);

        let chatbot = build_chatbot(&config, &dir.path().join("data")).unwrap();
        let answer = chatbot
            .answer(
                "What are his long-term career goals?",
                None,
                &foliobot_agents::ClientMeta::default(),
            )
            .await;

        assert_eq!(answer.method, foliobot_agents::AnswerMethod::Fallback);
        assert!(answer.reply.contains("contact Ada directly at ada@example.com"));
    }
}
