//! Jira connection settings.

use serde::{Deserialize, Serialize};

use proref_core::defaults::TRACKER_MAX_RESULTS;
use proref_core::{Error, Result};

/// Jira section of the application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Site root, e.g. `https://example.atlassian.net`.
    pub base_url: String,
    /// Account email used for basic auth.
    pub user: String,
    pub api_token: String,
    pub project: String,
    pub sprint: String,
    /// Explicit query; wins over `project` + `sprint`.
    pub jql: String,
    pub max_results: u32,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user: String::new(),
            api_token: String::new(),
            project: String::new(),
            sprint: String::new(),
            jql: String::new(),
            max_results: TRACKER_MAX_RESULTS,
        }
    }
}

impl JiraConfig {
    /// The backlog query: explicit JQL, else built from project and sprint.
    pub fn jql(&self) -> Result<String> {
        if !self.jql.trim().is_empty() {
            return Ok(self.jql.clone());
        }
        if !self.project.is_empty() && !self.sprint.is_empty() {
            return Ok(format!(
                "project = {} AND Sprint = \"{}\" ORDER BY updated DESC",
                self.project, self.sprint
            ));
        }
        Err(Error::Config(
            "Either JIRA_JQL or both JIRA_PROJECT and JIRA_SPRINT must be set".to_string(),
        ))
    }

    /// Require the connection settings.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("JIRA_BASE_URL", &self.base_url),
            ("JIRA_USER", &self.user),
            ("JIRA_API_TOKEN", &self.api_token),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Missing required Jira configuration: {}",
                missing.join(", ")
            )))
        }
    }

    /// `base_url` without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
