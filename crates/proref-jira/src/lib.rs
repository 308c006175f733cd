//! # proref-jira
//!
//! Jira Cloud integration for proref.
//!
//! - [`JiraClient`] fetches the backlog ([`TicketSource`]) and publishes
//!   comments ([`CommentPublisher`])
//! - [`adf`] converts between Atlassian Document Format and plain text and
//!   builds the comment bodies for generated content
//!
//! [`TicketSource`]: proref_core::TicketSource
//! [`CommentPublisher`]: proref_core::CommentPublisher

pub mod adf;
pub mod client;
pub mod config;
pub mod types;

pub use adf::{adf_to_text, format_questions, format_test_cases, plain_text_document, AdfDocument};
pub use client::{JiraClient, SearchEndpoint};
pub use config::JiraConfig;
pub use types::{Issue, SearchResponse};
