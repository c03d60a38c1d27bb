//! Persisted user settings: which provider is active and how to reach it.
//!
//! Settings live in a TOML file. A missing or corrupt file is replaced by the
//! defaults so the tool always starts with something usable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_PROVIDER: &str = "Ollama";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Settings file {path} is not valid TOML: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to serialize settings: {0}")]
    Serialize(String),

    #[error("Unknown AI provider: {name}")]
    UnknownProvider { name: String },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Wire format family a provider speaks.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    /// Built-in names map to a kind; anything else needs an explicit `kind`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Ollama" => Some(ProviderKind::Ollama),
            "OpenAI" | "Groq" => Some(ProviderKind::OpenAi),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GeneralSettings {
    pub drain_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub preview_chars: usize,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            drain_interval_ms: 100,
            connect_timeout_secs: 60,
            preview_chars: 100,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub api_url: String,
    pub model_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProviderKind>,
}

/// Fully resolved record handed to the provider factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider_name: String,
    pub kind: ProviderKind,
    pub api_url: String,
    pub model_name: String,
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn requires_api_key(&self) -> bool {
        self.kind != ProviderKind::Ollama
    }

    /// The key, unless it is blank or still a `YOUR_...` placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !key.contains("YOUR_"))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    pub current_provider: String,
    #[serde(default)]
    pub general: GeneralSettings,
    pub providers: BTreeMap<String, ProviderSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            "Ollama".to_string(),
            ProviderSettings {
                api_url: "http://localhost:11434/v1/chat/completions".to_string(),
                model_name: "granite4:latest".to_string(),
                api_key: String::new(),
                kind: None,
            },
        );
        providers.insert(
            "OpenAI".to_string(),
            ProviderSettings {
                api_url: "https://api.openai.com/v1/chat/completions".to_string(),
                model_name: "gpt-4o".to_string(),
                api_key: "YOUR_OPENAI_API_KEY".to_string(),
                kind: None,
            },
        );
        providers.insert(
            "Groq".to_string(),
            ProviderSettings {
                api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
                model_name: "llama3-8b-8192".to_string(),
                api_key: "YOUR_GROQ_API_KEY".to_string(),
                kind: None,
            },
        );
        Self {
            current_provider: DEFAULT_PROVIDER.to_string(),
            general: GeneralSettings::default(),
            providers,
        }
    }
}

impl Settings {
    /// `<config_dir>/quickai/settings.toml`, or the working directory when
    /// the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("quickai"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("settings.toml")
    }

    pub fn load(path: &Path) -> SettingsResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Loads `path`, writing defaults when it is missing or unreadable.
    pub fn load_or_init(path: &Path) -> SettingsResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No settings file, writing defaults");
            let settings = Settings::default();
            settings.save(path)?;
            return Ok(settings);
        }

        match Self::load(path) {
            Ok(settings) => {
                debug!(path = %path.display(), "Settings loaded");
                Ok(settings)
            }
            Err(e) => {
                warn!(error = %e, "Settings unreadable, falling back to defaults");
                let settings = Settings::default();
                settings.save(path)?;
                Ok(settings)
            }
        }
    }

    pub fn save(&self, path: &Path) -> SettingsResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let raw = toml::to_string_pretty(self).map_err(|e| SettingsError::Serialize(e.to_string()))?;
        fs::write(path, raw).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Resolves the active provider; an unknown selection falls back to the
    /// built-in Ollama record.
    pub fn current_provider_config(&self) -> ProviderConfig {
        self.provider_config(&self.current_provider)
            .unwrap_or_else(|_| {
                warn!(
                    provider = %self.current_provider,
                    "Unknown current provider, using Ollama defaults"
                );
                let defaults = Settings::default();
                let ollama = &defaults.providers[DEFAULT_PROVIDER];
                resolve(DEFAULT_PROVIDER, ollama, ProviderKind::Ollama)
            })
    }

    pub fn provider_config(&self, name: &str) -> SettingsResult<ProviderConfig> {
        let entry = self
            .providers
            .get(name)
            .ok_or_else(|| SettingsError::UnknownProvider {
                name: name.to_string(),
            })?;
        let kind = entry
            .kind
            .or_else(|| ProviderKind::from_name(name))
            .ok_or_else(|| SettingsError::UnknownProvider {
                name: name.to_string(),
            })?;
        Ok(resolve(name, entry, kind))
    }

    pub fn set_current_provider(&mut self, name: &str) -> SettingsResult<()> {
        self.provider_config(name)?;
        self.current_provider = name.to_string();
        Ok(())
    }

    pub fn update_provider(
        &mut self,
        name: &str,
        api_url: String,
        model_name: String,
        api_key: Option<String>,
    ) -> SettingsResult<()> {
        let entry = self
            .providers
            .get_mut(name)
            .ok_or_else(|| SettingsError::UnknownProvider {
                name: name.to_string(),
            })?;
        entry.api_url = api_url;
        entry.model_name = model_name;
        if let Some(key) = api_key {
            entry.api_key = key;
        }
        Ok(())
    }
}

fn resolve(name: &str, entry: &ProviderSettings, kind: ProviderKind) -> ProviderConfig {
    let api_key = Some(entry.api_key.clone()).filter(|k| !k.is_empty());
    ProviderConfig {
        provider_name: name.to_string(),
        kind,
        api_url: entry.api_url.clone(),
        model_name: entry.model_name.clone(),
        api_key,
    }
}

/* ---------- environment overrides ---------- */

/// Variables read (after `.env` is loaded) on top of the settings file.
pub const ENV_PROVIDER: &str = "QUICKAI_PROVIDER";
pub const ENV_API_URL: &str = "QUICKAI_API_URL";
pub const ENV_MODEL: &str = "QUICKAI_MODEL";
pub const ENV_API_KEY: &str = "QUICKAI_API_KEY";

/// Applies runtime overrides. They are never written back to disk.
pub fn apply_env_overrides(
    settings: &Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> ProviderConfig {
    let mut config = match lookup(ENV_PROVIDER) {
        Some(name) => settings.provider_config(&name).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring {}", ENV_PROVIDER);
            settings.current_provider_config()
        }),
        None => settings.current_provider_config(),
    };

    if let Some(url) = lookup(ENV_API_URL) {
        config.api_url = url;
    }
    if let Some(model) = lookup(ENV_MODEL) {
        config.model_name = model;
    }
    if let Some(key) = lookup(ENV_API_KEY) {
        config.api_key = Some(key);
    }
    config
}

/// Loads `.env` if present and applies overrides from the process environment.
pub fn resolve_active_provider(settings: &Settings) -> ProviderConfig {
    if let Ok(path) = dotenv::dotenv() {
        debug!(path = %path.display(), "Loaded .env");
    }
    apply_env_overrides(settings, |name| {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    })
}
