//! Application configuration and data paths.
//!
//! Settings come from a JSON file deep-merged over built-in defaults.
//! Environment variables only fill values the file leaves empty.
//!
//! | Variable | Fills |
//! |----------|-------|
//! | `PROREF_DATA_DIR` | data directory (default `data`) |
//! | `PROREF_CONFIG` | config file (default `<data>/config.json`) |
//! | `PROREF_DATABASE_URL` | database (default `sqlite:<data>/proref.db`) |
//! | `PROREF_AI_PROVIDER` | `ai_provider`, when the file omits it |
//! | `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GOOGLE_API_KEY` | provider keys |
//! | `OPENAI_MODEL_QUESTIONS`, `OPENAI_MODEL_TESTCASES`, `OPENAI_MODEL_CHAT`, `OPENAI_MODEL_EMBEDDING` | OpenAI models |
//! | `JIRA_BASE_URL`, `JIRA_USER`, `JIRA_API_TOKEN`, `JIRA_PROJECT`, `JIRA_SPRINT`, `JIRA_JQL` | Jira settings |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use proref_core::{Error, Result};
use proref_inference::{InferenceConfig, ProviderKind};
use proref_jira::JiraConfig;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "proref.db";

/// Where proref keeps its database, config and generated markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_url: String,
}

impl Paths {
    /// Resolve paths under `data_dir` with the default file names.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_file: data_dir.join(CONFIG_FILE_NAME),
            database_url: format!("sqlite:{}", data_dir.join(DATABASE_FILE_NAME).display()),
            data_dir,
        }
    }

    /// Resolve paths from environment variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = non_empty(lookup("PROREF_DATA_DIR"))
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let mut paths = Self::new(data_dir);
        if let Some(config_file) = non_empty(lookup("PROREF_CONFIG")) {
            paths.config_file = PathBuf::from(config_file);
        }
        if let Some(database_url) = non_empty(lookup("PROREF_DATABASE_URL")) {
            paths.database_url = database_url;
        }
        paths
    }

    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn questions_file(&self) -> PathBuf {
        self.data_dir.join("questions").join("questions_by_ticket.md")
    }

    pub fn test_cases_file(&self) -> PathBuf {
        self.data_dir.join("test_cases").join("test_cases_by_ticket.md")
    }
}

/// Full application configuration, as stored in `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub jira: JiraConfig,
}

impl AppConfig {
    /// Load `path` over the defaults, then apply process environment
    /// fallbacks. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let file = match tokio::fs::read_to_string(path).await {
            Ok(text) => Some(serde_json::from_str::<JsonValue>(&text).map_err(|e| {
                Error::Config(format!("Invalid config file {}: {}", path.display(), e))
            })?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(subsystem = "cli", component = "config", path = %path.display(), "No config file, using defaults");
                None
            }
            Err(e) => return Err(Error::Io(e)),
        };
        Self::from_file_value(file, env_lookup)
    }

    /// Merge an optional parsed config file over the defaults and fill
    /// empty values through `lookup`.
    pub fn from_file_value(
        file: Option<JsonValue>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;
        let file_sets_provider = file
            .as_ref()
            .is_some_and(|value| value.get("ai_provider").is_some());
        if let Some(file) = file {
            merge_json(&mut merged, file);
        }

        let mut config: Self = serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;

        if !file_sets_provider {
            if let Some(provider) = non_empty(lookup("PROREF_AI_PROVIDER")) {
                config.inference.ai_provider = provider.parse::<ProviderKind>()?;
            }
        }
        config.apply_env_fallback(lookup);
        Ok(config)
    }

    /// Fill empty settings from `lookup`. Non-empty values are kept.
    pub fn apply_env_fallback(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let inference = &mut self.inference;
        let jira = &mut self.jira;
        let fields: [(&mut String, &str); 13] = [
            (&mut inference.openai.api_key, "OPENAI_API_KEY"),
            (&mut inference.anthropic.api_key, "ANTHROPIC_API_KEY"),
            (&mut inference.google.api_key, "GOOGLE_API_KEY"),
            (&mut inference.openai.model_questions, "OPENAI_MODEL_QUESTIONS"),
            (&mut inference.openai.model_testcases, "OPENAI_MODEL_TESTCASES"),
            (&mut inference.openai.model_chat, "OPENAI_MODEL_CHAT"),
            (&mut inference.openai.model_embedding, "OPENAI_MODEL_EMBEDDING"),
            (&mut jira.base_url, "JIRA_BASE_URL"),
            (&mut jira.user, "JIRA_USER"),
            (&mut jira.api_token, "JIRA_API_TOKEN"),
            (&mut jira.project, "JIRA_PROJECT"),
            (&mut jira.sprint, "JIRA_SPRINT"),
            (&mut jira.jql, "JIRA_JQL"),
        ];

        for (field, name) in fields {
            if field.is_empty() {
                if let Some(value) = non_empty(lookup(name)) {
                    *field = value;
                }
            }
        }
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, text).await?;
        Ok(())
    }
}

/// Recursively merge `overlay` into `base`. Objects merge key by key; any
/// other value replaces the base value.
pub fn merge_json(base: &mut JsonValue, overlay: JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base), JsonValue::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn env_lookup(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => Some(value),
        Err(std::env::VarError::NotPresent) => None,
        Err(e) => {
            warn!(subsystem = "cli", component = "config", variable = name, error = %e, "Ignoring unreadable variable");
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
