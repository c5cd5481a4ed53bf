//! Configuration loader and validator for the clickpack moderation bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::catalog::DEFAULT_CATALOG_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub discord: Discord,
    pub pipeline: Pipeline,
    #[serde(default)]
    pub git: GitSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Discord {
    pub bot_token: String,
    /// Channels whose archive uploads are sent for review.
    pub watched_channels: Vec<u64>,
    pub moderation_channel: u64,
    /// Public channel for approval notices; none disables them.
    #[serde(default)]
    pub announce_channel: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pipeline {
    /// Checkout of the clickpack repository; steps and git run here.
    pub repo_dir: String,
    /// Where approved archives land, relative to `repo_dir`.
    pub archive_dir: String,
    pub steps: Vec<StepCommand>,
}

/// One external conversion/index command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepCommand {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitSettings {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    /// GitHub token used for pushing over https.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            user_name: None,
            user_email: None,
            token: None,
            remote: default_remote(),
        }
    }
}

fn default_remote() -> String {
    "origin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogSettings {
    #[serde(default = "default_catalog_url")]
    pub url: String,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_max_age_secs() -> u64 {
    3600
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `DATABASE_URL` if set, otherwise a file under `app.data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/downloads.db",
                self.app.data_dir.trim_end_matches('/')
            )
        })
    }

    /// Secrets may come from the environment instead of the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("CLICKPACKDB_DISCORD_TOKEN") {
            if !token.trim().is_empty() {
                self.discord.bot_token = token;
            }
        }
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.trim().is_empty() {
                self.git.token = Some(token);
            }
        }
    }
}

/// Load configuration from a YAML file, apply environment overrides and
/// validate it. If `path` is None, uses `config.yaml` in the current directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env_overrides();
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.discord.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("discord.bot_token must be non-empty"));
    }
    if cfg.discord.watched_channels.is_empty() {
        return Err(ConfigError::Invalid("discord.watched_channels must list at least one channel"));
    }
    if cfg.discord.watched_channels.contains(&0) {
        return Err(ConfigError::Invalid("discord.watched_channels must not contain 0"));
    }
    if cfg.discord.moderation_channel == 0 {
        return Err(ConfigError::Invalid("discord.moderation_channel must be set"));
    }
    if cfg.discord.announce_channel == Some(0) {
        return Err(ConfigError::Invalid("discord.announce_channel must not be 0"));
    }

    if cfg.pipeline.repo_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("pipeline.repo_dir must be non-empty"));
    }
    if cfg.pipeline.archive_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("pipeline.archive_dir must be non-empty"));
    }
    for step in &cfg.pipeline.steps {
        if step.name.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline.steps[].name must be non-empty"));
        }
        if step.program.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline.steps[].program must be non-empty"));
        }
    }

    if cfg.git.remote.trim().is_empty() {
        return Err(ConfigError::Invalid("git.remote must be non-empty"));
    }

    if cfg.catalog.url.trim().is_empty() {
        return Err(ConfigError::Invalid("catalog.url must be non-empty"));
    }
    if cfg.catalog.max_age_secs == 0 {
        return Err(ConfigError::Invalid("catalog.max_age_secs must be > 0"));
    }

    Ok(())
}

/// Complete example configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

discord:
  bot_token: "YOUR_DISCORD_BOT_TOKEN"
  watched_channels:
    - 952187055092416582
  moderation_channel: 1383734997181005885
  announce_channel: 1383790392008249384

pipeline:
  repo_dir: ".."
  archive_dir: "db"
  steps:
    - name: "audio2ogg.py"
      program: "python3"
      args: ["audio2ogg.py"]
    - name: "index.py"
      program: "python3"
      args: ["index.py"]

git:
  user_name: "clickpack-bot"
  user_email: "bot@example.com"
  remote: "origin"

catalog:
  url: "https://raw.githubusercontent.com/zeozeozeo/clickpack-db/main/db.json"
  max_age_secs: 3600
"#
}
