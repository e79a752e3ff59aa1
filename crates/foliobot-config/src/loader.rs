use std::path::{Path, PathBuf};

use foliobot_common::{Error, Result};
use tracing::info;

use crate::model::AppConfig;

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir();
        Ok(Self { config_dir })
    }

    pub fn default_config_dir() -> PathBuf {
        let home_config = dirs::home_dir().map(|h| h.join(".foliobot"));
        let xdg_config = dirs::config_dir().map(|c| c.join("foliobot"));

        match (xdg_config, home_config) {
            (Some(xdg), Some(home)) => {
                // Prefer XDG unless only the legacy home dir exists.
                if xdg.exists() || !home.exists() {
                    xdg
                } else {
                    home
                }
            }
            (Some(xdg), None) => xdg,
            (None, Some(home)) => home,
            (None, None) => PathBuf::from(".foliobot"),
        }
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Directory holding the SQLite databases, honoring `data_dir` when set.
    pub fn data_dir(&self, config: &AppConfig) -> PathBuf {
        config
            .data_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join("data"))
    }

    /// Returns true if a config file (YAML or TOML) exists on disk.
    pub fn config_file_exists(&self) -> bool {
        self.config_dir.join("config.yml").exists() || self.config_dir.join("config.toml").exists()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let yaml_path = self.config_dir.join("config.yml");
        let toml_path = self.config_dir.join("config.toml");

        let config: AppConfig = if yaml_path.exists() {
            info!("loading config from {}", yaml_path.display());
            let contents = std::fs::read_to_string(&yaml_path)?;
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}")))?
        } else if toml_path.exists() {
            info!("loading config from {}", toml_path.display());
            let contents = std::fs::read_to_string(&toml_path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}")))?
        } else {
            info!("no config file found, using defaults");
            AppConfig::default()
        };

        validate(&config)?;
        Ok(config)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let dirs = [self.config_dir.clone(), self.config_dir.join("data")];

        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }

        Ok(())
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    let rag = &config.rag;
    for (name, threshold) in [
        ("knowledge_threshold", rag.knowledge_threshold),
        ("history_threshold", rag.history_threshold),
    ] {
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "rag.{name} must be within [-1, 1], got {threshold}"
            )));
        }
    }

    if config.gateway.max_message_len == 0 {
        return Err(Error::Config(
            "gateway.max_message_len must be greater than zero".into(),
        ));
    }

    Ok(())
}
