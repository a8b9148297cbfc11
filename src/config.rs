// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading for Confab.
//!
//! Configuration lives in a single JSON file, looked up in the workspace
//! (`confab.json`) and then in the user config directory
//! (`~/.config/confab/config.json`). Field names are camelCase to match the
//! settings surface of the original editor extension.
//!
//! [`ConfigStore`] holds the live config and supports `reload()`; the engine
//! snapshots the generation settings at turn start, so a reload mid-turn
//! never tears a running turn.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mcp::ServerConfig;

/// Workspace config file name.
pub const CONFIG_FILE: &str = "confab.json";

/// Default chat completions endpoint base.
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_true() -> bool {
    true
}

/// Generation settings snapshotted per turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`. `chat/completions` is
    /// appended when building requests.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    pub system_prompt: Option<String>,

    #[serde(default = "default_true")]
    pub enable_stream: bool,

    #[serde(default = "default_true")]
    pub enable_tools: bool,

    /// Allow-list of built-in tool names. Empty means all tools enabled.
    pub enabled_tools: Vec<String>,

    /// Extra headers sent verbatim on every request.
    pub custom_headers: HashMap<String, String>,

    /// Extra body fields, merged into the default body, or replacing it
    /// entirely when `override_default_body` is set.
    pub custom_body_fields: serde_json::Map<String, serde_json::Value>,

    pub override_default_body: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            enable_stream: true,
            enable_tools: true,
            enabled_tools: Vec::new(),
            custom_headers: HashMap::new(),
            custom_body_fields: serde_json::Map::new(),
            override_default_body: false,
        }
    }
}

impl GenerationConfig {
    /// Check that a credential is available before issuing any request.
    ///
    /// A custom `Authorization` header (any casing) counts as a credential.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() && !self.has_authorization_header() {
            return Err(ConfigError::MissingCredential);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "temperature".to_string(),
                message: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }
        Ok(())
    }

    /// Whether custom headers already carry an Authorization value.
    pub fn has_authorization_header(&self) -> bool {
        self.custom_headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("authorization"))
    }

    /// Endpoint URL for chat completions.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base_url.trim_end_matches('/'))
    }

    /// Whether a built-in tool name passes the allow-list.
    pub fn tool_enabled(&self, name: &str) -> bool {
        self.enabled_tools.is_empty() || self.enabled_tools.iter().any(|t| t == name)
    }
}

/// Full configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[serde(flatten)]
    pub generation: GenerationConfig,

    /// Ordered provider list; order is preserved for catalog merging.
    pub mcp_servers: Vec<ServerConfig>,
}

/// Locate the config file: workspace first, then user config directory.
pub fn find_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let workspace = workspace_root.join(CONFIG_FILE);
    if workspace.is_file() {
        return Some(workspace);
    }
    let global = dirs::config_dir()?.join("confab").join("config.json");
    global.is_file().then_some(global)
}

/// Load and parse a config file.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(path.display().to_string()),
            _ => ConfigError::IoError(e.to_string()),
        })?;
    let config = serde_json::from_str(&text)?;
    Ok(config)
}

/// Live configuration handle, reloadable in place.
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    inner: RwLock<Config>,
}

impl ConfigStore {
    /// Build a store from an already-parsed config (no file backing).
    pub fn from_config(config: Config) -> Self {
        Self {
            path: None,
            inner: RwLock::new(config),
        }
    }

    /// Load from a file, remembering the path for later reloads.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = load_config_file(&path)?;
        Ok(Self {
            path: Some(path),
            inner: RwLock::new(config),
        })
    }

    /// Re-read the backing file, swapping the live config on success.
    ///
    /// Turns already snapshotted keep their old settings.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let config = load_config_file(path)?;
        *self.inner.write().unwrap() = config;
        Ok(())
    }

    /// Snapshot the generation settings for one turn.
    pub fn generation(&self) -> GenerationConfig {
        self.inner.read().unwrap().generation.clone()
    }

    /// Current provider list.
    pub fn servers(&self) -> Vec<ServerConfig> {
        self.inner.read().unwrap().mcp_servers.clone()
    }

    /// Replace the live config wholesale.
    pub fn replace(&self, config: Config) {
        *self.inner.write().unwrap() = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.generation.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.generation.model, DEFAULT_MODEL);
        assert_eq!(config.generation.max_tokens, 2000);
        assert!(config.generation.enable_stream);
        assert!(config.generation.enable_tools);
        assert!(config.mcp_servers.is_empty());
    }

    #[test]
    fn test_camel_case_fields() {
        let config: Config = serde_json::from_str(
            r#"{
                "apiBaseUrl": "https://example.com/v1/",
                "apiKey": "sk-test",
                "maxTokens": 512,
                "customHeaders": {"X-Org": "acme"},
                "overrideDefaultBody": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.generation.api_key, "sk-test");
        assert_eq!(config.generation.max_tokens, 512);
        assert!(config.generation.override_default_body);
        assert_eq!(
            config.generation.completions_url(),
            "https://example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_validate_requires_credential() {
        let config = GenerationConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCredential)
        ));

        let mut with_key = GenerationConfig::default();
        with_key.api_key = "sk-test".to_string();
        assert!(with_key.validate().is_ok());

        let mut with_header = GenerationConfig::default();
        with_header
            .custom_headers
            .insert("authorization".to_string(), "Bearer abc".to_string());
        assert!(with_header.validate().is_ok());
    }

    #[test]
    fn test_tool_allow_list() {
        let mut config = GenerationConfig::default();
        assert!(config.tool_enabled("readFile"));

        config.enabled_tools = vec!["readFile".to_string()];
        assert!(config.tool_enabled("readFile"));
        assert!(!config.tool_enabled("writeFile"));
    }

    #[test]
    fn test_store_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"model": "first"}"#).unwrap();

        let store = ConfigStore::load(&path).unwrap();
        assert_eq!(store.generation().model, "first");

        std::fs::write(&path, r#"{"model": "second"}"#).unwrap();
        store.reload().unwrap();
        assert_eq!(store.generation().model, "second");
    }

    #[test]
    fn test_find_config_path_prefers_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "{}").unwrap();
        let found = find_config_path(temp.path()).unwrap();
        assert_eq!(found, temp.path().join(CONFIG_FILE));
    }
}
