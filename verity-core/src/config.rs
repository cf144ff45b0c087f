//! Configuration: preset tables from YAML/JSON, orchestrator timing and
//! provider credentials from the environment.
//!
//! Preset tables are validated at load time and frozen into a
//! [`PresetCatalog`]; nothing here is consulted again once a request runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::catalog::PresetCatalog;
use crate::error::CatalogError;
use crate::types::{Provider, VerificationPreset};

// ---------------------------------------------------------------------------
// Preset table
// ---------------------------------------------------------------------------

/// On-disk shape of a preset table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetTable {
    #[serde(default = "default_table_version")]
    pub version: String,
    pub presets: Vec<VerificationPreset>,
}

fn default_table_version() -> String {
    "1".to_string()
}

impl PresetTable {
    pub fn parse_yaml(source: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(source).map_err(|e| CatalogError::Parse {
            message: e.to_string(),
        })
    }

    pub fn parse_json(source: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(source).map_err(|e| CatalogError::Parse {
            message: e.to_string(),
        })
    }

    /// Validate and freeze into a catalog.
    pub fn into_catalog(self) -> Result<PresetCatalog, CatalogError> {
        PresetCatalog::from_presets(self.version, self.presets)
    }
}

/// Load a preset table file and build the catalog.
///
/// `.json` files are parsed as JSON, everything else as YAML.
pub fn load_catalog(path: &Path) -> Result<PresetCatalog> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let table = if is_json {
        PresetTable::parse_json(&content)
    } else {
        PresetTable::parse_yaml(&content)
    }
    .with_context(|| format!("Parsing {}", path.display()))?;

    let catalog = table
        .into_catalog()
        .with_context(|| format!("Validating presets in {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        version = catalog.version(),
        presets = catalog.len(),
        "Loaded preset catalog"
    );
    Ok(catalog)
}

// ---------------------------------------------------------------------------
// Orchestrator timing
// ---------------------------------------------------------------------------

/// Timing and retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Global budget applied when the caller does not supply one.
    pub default_deadline: Duration,
    /// Budget for one provider round-trip. Kept below the global deadline
    /// so a retry can still fit.
    pub call_timeout: Duration,
    /// Extra attempts after a transient failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    pub retry_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_deadline: Duration::from_secs(30),
            call_timeout: Duration::from_secs(20),
            max_retries: 1,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl OrchestratorConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_deadline: env_millis("VERITY_DEADLINE_MS").unwrap_or(defaults.default_deadline),
            call_timeout: env_millis("VERITY_CALL_TIMEOUT_MS").unwrap_or(defaults.call_timeout),
            max_retries: std::env::var("VERITY_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_backoff: env_millis("VERITY_RETRY_BACKOFF_MS").unwrap_or(defaults.retry_backoff),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

// ---------------------------------------------------------------------------
// Provider credentials
// ---------------------------------------------------------------------------

/// API keys per provider.
#[derive(Clone, Default)]
pub struct ProviderSettings {
    keys: HashMap<Provider, String>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("configured", &self.configured())
            .finish()
    }
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        for provider in Provider::ALL {
            let key = env_keys(provider)
                .iter()
                .find_map(|name| std::env::var(name).ok())
                .filter(|k| !k.trim().is_empty());
            if let Some(key) = key {
                settings.keys.insert(provider, key);
            }
        }
        settings
    }

    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.keys.insert(provider, key.into());
        self
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        self.keys.get(&provider).map(String::as_str)
    }

    /// Providers with a key, sorted.
    pub fn configured(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.keys.keys().copied().collect();
        providers.sort();
        providers
    }
}

fn env_keys(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Openai => &["OPENAI_API_KEY"],
        Provider::Anthropic => &["ANTHROPIC_API_KEY"],
        Provider::Perplexity => &["PERPLEXITY_API_KEY"],
        Provider::Google => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        Provider::Xai => &["XAI_API_KEY"],
        Provider::Deepseek => &["DEEPSEEK_API_KEY"],
    }
}
