//! Jira REST response types and their mapping to [`IncomingTicket`].

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use proref_core::defaults::SPIKE_ISSUE_TYPE;
use proref_core::IncomingTicket;

use crate::adf::adf_to_text;

/// Format of the `updated` field, e.g. `2024-01-15T10:30:00.000+0000`.
pub const JIRA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Fields requested from every search endpoint.
pub const SEARCH_FIELDS: [&str; 5] = ["summary", "description", "status", "updated", "issuetype"];

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    /// ADF document (v3) or plain string (v2).
    #[serde(default)]
    pub description: Option<JsonValue>,
    #[serde(default)]
    pub status: Option<NamedField>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub issuetype: Option<NamedField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedField {
    #[serde(default)]
    pub name: String,
}

impl Issue {
    /// Lower-cased issue type name, empty when absent.
    pub fn issue_type(&self) -> String {
        self.fields
            .issuetype
            .as_ref()
            .map(|t| t.name.to_lowercase())
            .unwrap_or_default()
    }

    pub fn is_spike(&self) -> bool {
        self.issue_type() == SPIKE_ISSUE_TYPE
    }

    /// Convert to an [`IncomingTicket`], or `None` for spikes.
    ///
    /// An unparseable `updated` value is logged and treated as missing.
    pub fn into_ticket(self) -> Option<IncomingTicket> {
        if self.is_spike() {
            return None;
        }
        let issue_type = self.issue_type();

        let description = match self.fields.description {
            Some(JsonValue::String(text)) => text,
            Some(JsonValue::Null) | None => String::new(),
            Some(doc) => adf_to_text(&doc),
        };

        let updated_at = self.fields.updated.as_deref().and_then(|raw| {
            DateTime::parse_from_str(raw, JIRA_TIMESTAMP_FORMAT)
                .map_err(|e| {
                    warn!(
                        subsystem = "jira",
                        ticket_key = %self.key,
                        value = raw,
                        error = %e,
                        "Unparseable updated timestamp"
                    )
                })
                .ok()
        });

        Some(IncomingTicket {
            key: self.key,
            title: self.fields.summary,
            description: Some(description),
            status: self.fields.status.map(|s| s.name).unwrap_or_default(),
            issue_type,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use serde_json::json;

    fn issue(fields: JsonValue) -> Issue {
        serde_json::from_value(json!({"key": "PROJ-7", "fields": fields})).unwrap()
    }

    #[test]
    fn test_maps_v3_issue() {
        let ticket = issue(json!({
            "summary": "Login page",
            "description": {"type": "doc", "version": 1, "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "Users sign in"}]}
            ]},
            "status": {"name": "In Progress"},
            "updated": "2024-01-15T10:30:00.000+0100",
            "issuetype": {"name": "Story"}
        }))
        .into_ticket()
        .unwrap();

        assert_eq!(ticket.key, "PROJ-7");
        assert_eq!(ticket.title.as_deref(), Some("Login page"));
        assert_eq!(ticket.description.as_deref(), Some("Users sign in"));
        assert_eq!(ticket.status, "In Progress");
        assert_eq!(ticket.issue_type, "story");

        let naive = ticket.updated_at_naive().unwrap();
        assert_eq!(naive.date(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(naive.hour(), 10);
    }

    #[test]
    fn test_v2_string_description_and_missing_fields() {
        let ticket = issue(json!({
            "summary": "Plain",
            "description": "Line one\nLine two",
            "issuetype": {"name": "Bug"}
        }))
        .into_ticket()
        .unwrap();
        assert_eq!(ticket.description.as_deref(), Some("Line one\nLine two"));
        assert_eq!(ticket.status, "");
        assert!(ticket.updated_at.is_none());
    }

    #[test]
    fn test_null_description_becomes_empty() {
        let ticket = issue(json!({"summary": "No body", "description": null}))
            .into_ticket()
            .unwrap();
        assert_eq!(ticket.description.as_deref(), Some(""));
        assert_eq!(ticket.issue_type, "");
    }

    #[test]
    fn test_spike_is_skipped() {
        let spike = issue(json!({"summary": "Research", "issuetype": {"name": "SPIKE"}}));
        assert!(spike.is_spike());
        assert!(spike.into_ticket().is_none());
    }

    #[test]
    fn test_bad_timestamp_is_dropped() {
        let ticket = issue(json!({"summary": "x", "updated": "yesterday"}))
            .into_ticket()
            .unwrap();
        assert!(ticket.updated_at.is_none());
    }
}
