//! Jira REST client: backlog search and comment publishing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value as JsonValue};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use proref_core::defaults::HTTP_TIMEOUT_SECS;
use proref_core::{
    CommentPublisher, Error, IncomingTicket, Result, RetryPolicy, TicketSource,
};

use crate::config::JiraConfig;
use crate::types::{Issue, SearchResponse, SEARCH_FIELDS};

/// Search endpoints in the order they are tried.
///
/// Atlassian retires search APIs with `410 Gone`, so older sites and newer
/// sites each answer on a different one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEndpoint {
    /// `POST /rest/api/3/search/jql`
    JqlV3,
    /// `GET /rest/api/3/search`
    SearchV3,
    /// `GET /rest/api/2/search`
    SearchV2,
}

impl SearchEndpoint {
    pub const FALLBACK_ORDER: [SearchEndpoint; 3] = [Self::JqlV3, Self::SearchV3, Self::SearchV2];

    pub fn path(&self) -> &'static str {
        match self {
            Self::JqlV3 => "/rest/api/3/search/jql",
            Self::SearchV3 => "/rest/api/3/search",
            Self::SearchV2 => "/rest/api/2/search",
        }
    }
}

pub struct JiraClient {
    client: Client,
    config: JiraConfig,
    jql: String,
    fetch_retry: RetryPolicy,
    publish_retry: RetryPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl JiraClient {
    /// Validate `config` and build a client. Fails without connection
    /// settings or a resolvable JQL query.
    pub fn new(config: JiraConfig) -> Result<Self> {
        config.validate()?;
        let jql = config.jql()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "jira",
            component = "client",
            base_url = %config.api_root(),
            jql = %jql,
            "Initializing Jira client"
        );

        Ok(Self {
            client,
            config,
            jql,
            fetch_retry: RetryPolicy::default(),
            publish_retry: RetryPolicy::for_publishing(),
            shutdown: None,
        })
    }

    pub fn with_fetch_retry(mut self, retry: RetryPolicy) -> Self {
        self.fetch_retry = retry;
        self
    }

    pub fn with_publish_retry(mut self, retry: RetryPolicy) -> Self {
        self.publish_retry = retry;
        self
    }

    /// Abort backoff waits once `shutdown` turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn jql(&self) -> &str {
        &self.jql
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.config.user, Some(&self.config.api_token))
            .header(ACCEPT, "application/json")
    }

    async fn with_retry<T, F, Fut>(&self, retry: RetryPolicy, op: &str, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match self.shutdown.clone() {
            Some(mut shutdown) => retry.run_with_shutdown(op, f, &mut shutdown).await,
            None => retry.run(op, f).await,
        }
    }

    /// One search request. `Ok(None)` means the endpoint is gone (410).
    async fn try_endpoint(&self, endpoint: SearchEndpoint) -> Result<Option<Vec<Issue>>> {
        let url = format!("{}{}", self.config.api_root(), endpoint.path());
        let max_results = self.config.max_results;

        let request = match endpoint {
            SearchEndpoint::JqlV3 => self.client.post(url).json(&json!({
                "jql": self.jql,
                "fields": SEARCH_FIELDS,
                "maxResults": max_results,
            })),
            SearchEndpoint::SearchV3 | SearchEndpoint::SearchV2 => {
                self.client.get(url).query(&[
                    ("jql", self.jql.clone()),
                    ("fields", SEARCH_FIELDS.join(",")),
                    ("maxResults", max_results.to_string()),
                ])
            }
        };

        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Invalid search response: {}", e)))?;
        Ok(Some(body.issues))
    }

    /// Try each search endpoint in turn. Gone endpoints are skipped; any
    /// other failure is remembered and the next endpoint tried.
    async fn search_issues(&self) -> Result<Vec<Issue>> {
        let mut last_error = None;

        for endpoint in SearchEndpoint::FALLBACK_ORDER {
            match self.try_endpoint(endpoint).await {
                Ok(Some(issues)) => {
                    info!(
                        subsystem = "jira",
                        endpoint = endpoint.path(),
                        result_count = issues.len(),
                        "Search succeeded"
                    );
                    return Ok(issues);
                }
                Ok(None) => {
                    debug!(endpoint = endpoint.path(), "Endpoint gone, trying next");
                }
                Err(e) => {
                    warn!(
                        subsystem = "jira",
                        endpoint = endpoint.path(),
                        error = %e,
                        "Search endpoint failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Tracker("All Jira search endpoints failed".to_string())))
    }

    /// Fetch the backlog for the configured JQL, spikes excluded.
    #[instrument(skip(self), fields(subsystem = "jira", component = "client", op = "fetch_tickets"))]
    pub async fn fetch_tickets(&self) -> Result<Vec<IncomingTicket>> {
        let issues = self
            .with_retry(self.fetch_retry, "fetch_tickets", move || self.search_issues())
            .await?;

        let total = issues.len();
        let tickets: Vec<IncomingTicket> = issues
            .into_iter()
            .filter_map(|issue| {
                let key = issue.key.clone();
                let ticket = issue.into_ticket();
                if ticket.is_none() {
                    debug!(ticket_key = %key, "Skipping spike");
                }
                ticket
            })
            .collect();

        info!(
            result_count = tickets.len(),
            skipped_spikes = total - tickets.len(),
            "Fetched backlog"
        );
        Ok(tickets)
    }

    /// Post an ADF document as a comment on `ticket_key`.
    #[instrument(skip(self, body), fields(subsystem = "jira", component = "client", op = "post_comment", ticket_key = %ticket_key))]
    pub async fn post_comment(&self, ticket_key: &str, body: &JsonValue) -> Result<()> {
        let url = format!(
            "{}/rest/api/3/issue/{}/comment",
            self.config.api_root(),
            ticket_key
        );
        let payload = json!({ "body": body });
        let (url, payload) = (&url, &payload);

        self.with_retry(self.publish_retry, "post_comment", move || async move {
            let response = self
                .authed(self.client.post(url))
                .json(payload)
                .send()
                .await
                .map_err(|e| Error::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(Error::Http {
                    status: status.as_u16(),
                    message: message.trim().to_string(),
                });
            }
            Ok(())
        })
        .await?;

        info!("Comment posted");
        Ok(())
    }
}

#[async_trait]
impl TicketSource for JiraClient {
    async fn fetch_tickets(&self) -> Result<Vec<IncomingTicket>> {
        JiraClient::fetch_tickets(self).await
    }
}

#[async_trait]
impl CommentPublisher for JiraClient {
    async fn post_comment(&self, ticket_key: &str, body: &JsonValue) -> Result<()> {
        JiraClient::post_comment(self, ticket_key, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JiraConfig {
        JiraConfig {
            base_url: "https://example.atlassian.net".to_string(),
            user: "qa@example.com".to_string(),
            api_token: "token".to_string(),
            jql: "project = APP".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_order_and_paths() {
        let paths: Vec<&str> = SearchEndpoint::FALLBACK_ORDER
            .iter()
            .map(|e| e.path())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/rest/api/3/search/jql",
                "/rest/api/3/search",
                "/rest/api/2/search"
            ]
        );
    }

    #[test]
    fn test_new_resolves_jql() {
        let client = JiraClient::new(config()).unwrap();
        assert_eq!(client.jql(), "project = APP");
    }

    #[test]
    fn test_new_rejects_incomplete_config() {
        let missing_token = JiraConfig {
            api_token: String::new(),
            ..config()
        };
        assert!(matches!(JiraClient::new(missing_token), Err(Error::Config(_))));

        let missing_query = JiraConfig {
            jql: String::new(),
            ..config()
        };
        assert!(matches!(JiraClient::new(missing_query), Err(Error::Config(_))));
    }
}
