use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SyncError};
use crate::models::Account;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub notify: NotifySettings,
}

/// One `[[accounts]]` entry in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
}

impl AccountConfig {
    pub fn to_account(&self) -> Account {
        Account {
            id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            use_tls: self.use_tls,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Size of the historical backfill window, in days
    #[serde(default = "default_backfill_days")]
    pub backfill_days: i64,
    /// Yield control after this many processed messages during backfill
    #[serde(default = "default_yield_every")]
    pub yield_every: usize,
    /// Keep-alive probe period, in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Delay before reconnecting a closed connection, in seconds
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            backfill_days: default_backfill_days(),
            yield_every: default_yield_every(),
            keepalive_secs: default_keepalive_secs(),
            reconnect_secs: default_reconnect_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_index_url")]
    pub url: String,
    #[serde(default = "default_index_name")]
    pub index: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            index: default_index_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_classifier_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            model: default_classifier_model(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifySettings {
    /// Chat (Slack-style) incoming webhook URL
    #[serde(default)]
    pub chat_webhook_url: Option<String>,
    /// Generic webhook sink URL
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_imap_port() -> u16 {
    993
}

fn default_use_tls() -> bool {
    true
}

fn default_backfill_days() -> i64 {
    30
}

fn default_yield_every() -> usize {
    25
}

fn default_keepalive_secs() -> u64 {
    300
}

fn default_reconnect_secs() -> u64 {
    10
}

fn default_index_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index_name() -> String {
    "emails".to_string()
}

fn default_classifier_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| SyncError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sync.backfill_days < 1 {
            return Err(SyncError::Config(
                "sync.backfill_days must be at least 1".to_string(),
            ));
        }
        if self.sync.backfill_days > 365 {
            return Err(SyncError::Config(
                "sync.backfill_days cannot exceed 365 (1 year)".to_string(),
            ));
        }
        if self.sync.yield_every == 0 {
            return Err(SyncError::Config(
                "sync.yield_every must be at least 1".to_string(),
            ));
        }
        if self.sync.keepalive_secs < 30 {
            return Err(SyncError::Config(
                "sync.keepalive_secs must be at least 30".to_string(),
            ));
        }
        if self.sync.reconnect_secs == 0 {
            return Err(SyncError::Config(
                "sync.reconnect_secs must be at least 1".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for account in &self.accounts {
            if account.id.is_empty() {
                return Err(SyncError::Config("account id must not be empty".to_string()));
            }
            if account.host.is_empty() {
                return Err(SyncError::Config(format!(
                    "account '{}' has an empty host",
                    account.id
                )));
            }
            if !seen.insert(&account.id) {
                return Err(SyncError::Config(format!(
                    "duplicate account id '{}'",
                    account.id
                )));
            }
        }

        if self.index.url.is_empty() || self.index.index.is_empty() {
            return Err(SyncError::Config(
                "index.url and index.index must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.iter().map(AccountConfig::to_account).collect()
    }
}
