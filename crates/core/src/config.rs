// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync engine configuration.
//!
//! Configuration is a TOML file with three sections:
//!
//! ```toml
//! [jira]
//! base_url = "https://example.atlassian.net"
//! email = "dev@example.com"
//! token = "${JMD_API_TOKEN}"
//! project = "JMD"
//!
//! [sync]
//! interval_secs = 300
//! markdown_dir = "~/tickets"
//! watch_enabled = false
//!
//! [storage]
//! db_path = "~/.jmd/state.db"
//! busy_timeout_ms = 5000
//! ```
//!
//! `${VAR}` references are expanded from the environment before parsing,
//! a leading `~/` in paths is expanded to the home directory, and
//! `JMD_API_TOKEN` overrides `jira.token` when set.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::StoreConfig;

/// Environment variable that overrides `jira.token`.
pub const TOKEN_ENV_VAR: &str = "JMD_API_TOKEN";

const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    }
});

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub jira: JiraConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote tracker connection settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    /// API token. Usually supplied through [`TOKEN_ENV_VAR`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default)]
    pub project: String,
}

impl std::fmt::Debug for JiraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("project", &self.project)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub markdown_dir: String,
    #[serde(default)]
    pub watch_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            interval_secs: DEFAULT_INTERVAL_SECS,
            markdown_dir: String::new(),
            watch_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub db_path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig { db_path: String::new(), busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS }
    }
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl Config {
    /// Loads configuration from a TOML file, applying environment
    /// expansion, the token override and home-directory expansion.
    ///
    /// The result is not validated; call [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let home = dirs::home_dir();
        Self::from_toml(&content, |name| std::env::var(name).ok(), home.as_deref())
    }

    fn from_toml(
        content: &str,
        env: impl Fn(&str) -> Option<String>,
        home: Option<&Path>,
    ) -> Result<Self> {
        let expanded = expand_env(content, &env);
        let mut config: Config = toml::from_str(&expanded)?;

        if let Some(token) = env(TOKEN_ENV_VAR).filter(|t| !t.is_empty()) {
            config.jira.token = token;
        }
        config.sync.markdown_dir = expand_home(&config.sync.markdown_dir, home);
        config.storage.db_path = expand_home(&config.storage.db_path, home);
        Ok(config)
    }

    /// Saves configuration as TOML. The token is omitted when empty.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Checks every field, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        let jira = &self.jira;
        if jira.base_url.trim().is_empty() {
            return Err(Error::Config("jira.base_url is required".into()));
        }
        if !jira.base_url.starts_with("https://") {
            return Err(Error::Config("jira.base_url must use https://".into()));
        }
        if jira.email.trim().is_empty() {
            return Err(Error::Config("jira.email is required".into()));
        }
        if !jira.email.contains('@') {
            return Err(Error::Config("jira.email must be a valid email address".into()));
        }
        if jira.token.trim().is_empty() {
            return Err(Error::Config(format!(
                "jira.token is required (set {TOKEN_ENV_VAR} environment variable)"
            )));
        }
        let project = jira.project.trim();
        if project.is_empty() {
            return Err(Error::Config("jira.project is required".into()));
        }
        if !(2..=10).contains(&project.chars().count()) {
            return Err(Error::Config(
                "jira.project must be between 2 and 10 characters".into(),
            ));
        }
        if self.sync.interval_secs == 0 {
            return Err(Error::Config("sync.interval must be positive".into()));
        }
        if self.sync.markdown_dir.trim().is_empty() {
            return Err(Error::Config("sync.markdown_dir is required".into()));
        }
        if self.storage.db_path.trim().is_empty() {
            return Err(Error::Config("storage.db_path is required".into()));
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn markdown_dir(&self) -> PathBuf {
        PathBuf::from(&self.sync.markdown_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.db_path)
    }

    /// Connection settings for [`crate::store::StateStore::open_with`].
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig { busy_timeout: Duration::from_millis(self.storage.busy_timeout_ms) }
    }
}

/// Replaces `${VAR}` references; unset variables become empty.
fn expand_env(content: &str, env: impl Fn(&str) -> Option<String>) -> String {
    ENV_REF
        .replace_all(content, |caps: &Captures<'_>| env(&caps[1]).unwrap_or_default())
        .into_owned()
}

fn expand_home(path: &str, home: Option<&Path>) -> String {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => path.to_string(),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
