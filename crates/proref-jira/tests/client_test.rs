//! Jira client tests against a mock server.

use std::time::Duration;

use proref_core::{Error, RetryPolicy, TicketSource};
use proref_jira::{format_questions, JiraClient, JiraConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10), 2.0).unwrap()
}

fn client(server: &MockServer) -> JiraClient {
    JiraClient::new(JiraConfig {
        base_url: format!("{}/", server.uri()),
        user: "qa@example.com".to_string(),
        api_token: "token".to_string(),
        project: "APP".to_string(),
        sprint: "Sprint 4".to_string(),
        max_results: 50,
        ..Default::default()
    })
    .unwrap()
    .with_fetch_retry(fast_retry())
    .with_publish_retry(fast_retry())
}

fn search_body() -> serde_json::Value {
    json!({
        "issues": [
            {
                "key": "APP-1",
                "fields": {
                    "summary": "Login page",
                    "description": {"type": "doc", "version": 1, "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "Users sign in"}]}
                    ]},
                    "status": {"name": "To Do"},
                    "updated": "2024-03-01T09:00:00.000+0000",
                    "issuetype": {"name": "Story"}
                }
            },
            {
                "key": "APP-2",
                "fields": {
                    "summary": "Evaluate SSO vendors",
                    "issuetype": {"name": "Spike"}
                }
            }
        ]
    })
}

#[tokio::test]
async fn test_fetch_uses_jql_endpoint_and_skips_spikes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search/jql"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "jql": "project = APP AND Sprint = \"Sprint 4\" ORDER BY updated DESC",
            "maxResults": 50
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let tickets = client(&server).fetch_tickets().await.unwrap();

    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].key, "APP-1");
    assert_eq!(tickets[0].description.as_deref(), Some("Users sign in"));
    assert_eq!(tickets[0].issue_type, "story");
    assert!(tickets[0].updated_at.is_some());
}

#[tokio::test]
async fn test_gone_endpoint_falls_back_to_legacy_search() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search/jql"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/search"))
        .and(query_param("fields", "summary,description,status,updated,issuetype"))
        .and(query_param("maxResults", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let tickets = TicketSource::fetch_tickets(&client(&server)).await.unwrap();
    assert_eq!(tickets.len(), 1);
}

#[tokio::test]
async fn test_v2_search_is_last_resort() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search/jql"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/search"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": [{
                "key": "APP-9",
                "fields": {"summary": "Legacy", "description": "plain text", "issuetype": {"name": "Bug"}}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tickets = client(&server).fetch_tickets().await.unwrap();
    assert_eq!(tickets[0].key, "APP-9");
    assert_eq!(tickets[0].description.as_deref(), Some("plain text"));
}

#[tokio::test]
async fn test_all_endpoints_failing_returns_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search/jql"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/search"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad JQL"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).fetch_tickets().await.unwrap_err();
    match err {
        Error::Http { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_every_endpoint_gone_is_tracker_error() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let err = client(&server).fetch_tickets().await.unwrap_err();
    assert!(matches!(err, Error::Tracker(_)));
}

#[tokio::test]
async fn test_fetch_retries_when_every_endpoint_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search/jql"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search/jql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let tickets = client(&server).fetch_tickets().await.unwrap();
    assert_eq!(tickets.len(), 1);
}

#[tokio::test]
async fn test_post_comment_sends_adf_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/issue/APP-1/comment"))
        .and(body_partial_json(json!({
            "body": {"type": "doc", "version": 1}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "10000"})))
        .expect(1)
        .mount(&server)
        .await;

    let body = format_questions(&["Which roles can log in?".to_string()]);
    client(&server).post_comment("APP-1", &body).await.unwrap();
}

#[tokio::test]
async fn test_post_comment_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/issue/APP-1/comment"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/issue/APP-1/comment"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .post_comment("APP-1", &json!({"type": "doc", "version": 1, "content": []}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_post_comment_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/issue/APP-1/comment"))
        .respond_with(ResponseTemplate::new(400).set_body_string("INVALID_INPUT"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .post_comment("APP-1", &json!({"type": "doc"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http { status: 400, .. }));
}
