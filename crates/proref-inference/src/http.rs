//! HTTP plumbing shared by the vendor backends.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;

use proref_core::{Error, Result};

/// Error envelope used by OpenAI, Anthropic and Google alike.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Build a client with a bounded request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Pass 2xx responses through; turn anything else into [`Error::Http`].
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Http {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Vendor error message if the body carries one, else the raw body.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if body.trim().is_empty() => "Unknown error".to_string(),
        _ => body.trim().to_string(),
    }
}

/// Map a failed `send()` to [`Error::Request`].
pub(crate) fn transport_error(e: reqwest::Error) -> Error {
    Error::Request(e.to_string())
}
