//! Core data models for proref.
//!
//! These types are shared across all proref crates and represent the
//! tracker tickets, their embeddings, and the content generated for them.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults::{QUALITY_SCORE_MAX, QUALITY_SCORE_MIN};
use crate::error::{Error, Result};

// =============================================================================
// TICKET TYPES
// =============================================================================

/// A tracker ticket as persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// External tracker key, e.g. `PROJ-123`.
    pub key: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub issue_type: String,
    /// Remote last-modified time as naive wall-clock (offset stripped).
    pub updated_at: Option<NaiveDateTime>,
    /// When this record was last refreshed from the tracker.
    pub fetched_at: DateTime<Utc>,
    /// Questions are up to date; `false` means generation is pending.
    pub questions_generated: bool,
    /// Test cases are up to date; `false` means generation is pending.
    pub test_cases_generated: bool,
    /// MD5 fingerprint of `title|description`.
    pub content_hash: Option<String>,
    /// Title/description changed since generated content was produced.
    pub content_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_scored_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Text submitted to the embedding model for this ticket.
    pub fn embedding_text(&self) -> String {
        format!(
            "{}\n\n{}",
            self.title.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or("")
        )
    }

    /// Whether the tracker classifies this ticket as a spike.
    pub fn is_spike(&self) -> bool {
        self.issue_type
            .eq_ignore_ascii_case(crate::defaults::SPIKE_ISSUE_TYPE)
    }

    /// Lightweight view used in search results.
    pub fn summary(&self) -> TicketSummary {
        TicketSummary {
            key: self.key.clone(),
            title: self.title.clone(),
        }
    }
}

/// Freshly fetched ticket data, as produced by the tracker client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingTicket {
    pub key: String,
    pub title: Option<String>,
    /// Plain text; rich-document bodies are flattened before this point.
    pub description: Option<String>,
    pub status: String,
    pub issue_type: String,
    /// Remote last-modified time including its offset.
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl IncomingTicket {
    /// Remote timestamp with the offset dropped, keeping the wall-clock value.
    pub fn updated_at_naive(&self) -> Option<NaiveDateTime> {
        self.updated_at.map(|ts| ts.naive_local())
    }
}

/// Key and title of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub key: String,
    pub title: Option<String>,
}

/// Result of merging one incoming ticket into persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReconcileOutcome {
    /// First sighting; a new record was created.
    Inserted,
    /// Existing record overwritten with newer data.
    Updated { content_changed: bool },
    /// Incoming snapshot was not newer than the stored one.
    Skipped,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated { .. } => "updated",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Updated {
                content_changed: true,
            } => write!(f, "updated (content changed)"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Tally of a batch reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub content_changed: usize,
    pub skipped: usize,
}

impl ReconcileSummary {
    pub fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Inserted => self.inserted += 1,
            ReconcileOutcome::Updated { content_changed } => {
                self.updated += 1;
                if content_changed {
                    self.content_changed += 1;
                }
            }
            ReconcileOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.skipped
    }
}

/// Counters shown by the status command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStats {
    pub total: i64,
    pub with_questions: i64,
    pub with_test_cases: i64,
    pub content_changed: i64,
    pub scored: i64,
}

// =============================================================================
// QUALITY TYPES
// =============================================================================

/// AI (or heuristic) assessment of how ready a ticket is for implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScore {
    /// 1 (not ready) to 10 (well defined).
    pub score: u8,
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl QualityScore {
    /// Clamp a raw score into the valid range.
    pub fn clamp_score(raw: i64) -> u8 {
        raw.clamp(QUALITY_SCORE_MIN as i64, QUALITY_SCORE_MAX as i64) as u8
    }

    /// Reject scores outside `1..=10`.
    pub fn validate(&self) -> Result<()> {
        if (QUALITY_SCORE_MIN..=QUALITY_SCORE_MAX).contains(&self.score) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "quality score must be between {} and {}, got {}",
                QUALITY_SCORE_MIN, QUALITY_SCORE_MAX, self.score
            )))
        }
    }

    /// Readiness label for display.
    pub fn label(&self) -> &'static str {
        match self.score {
            8.. => "Ready",
            5..=7 => "Needs Work",
            _ => "Not Ready",
        }
    }
}

// =============================================================================
// GENERATED CONTENT TYPES
// =============================================================================

/// Kind of AI-generated content attached to a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Questions,
    TestCases,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Questions => "questions",
            Self::TestCases => "test_cases",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Questions => "Questions",
            Self::TestCases => "Test Cases",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "questions" => Ok(Self::Questions),
            "test_cases" => Ok(Self::TestCases),
            other => Err(Error::InvalidInput(format!(
                "unknown content kind: {}",
                other
            ))),
        }
    }
}

/// A structured test case produced by the test-case generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub pre: String,
    #[serde(default, alias = "pasos")]
    pub steps: String,
    #[serde(default, alias = "esperado")]
    pub expected: String,
}

/// One stored generation result. The latest record per (ticket, kind) is current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub id: i64,
    pub ticket_key: String,
    pub kind: ContentKind,
    /// JSON array of strings (questions) or of [`TestCase`] records.
    pub payload: JsonValue,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

impl GeneratedContent {
    /// Decode the payload as a list of questions.
    pub fn questions(&self) -> Result<Vec<String>> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Decode the payload as a list of test cases.
    pub fn test_cases(&self) -> Result<Vec<TestCase>> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Published/pending counts per content kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationStats {
    pub questions_published: i64,
    pub test_cases_published: i64,
    pub questions_pending: i64,
    pub test_cases_pending: i64,
}

// =============================================================================
// EMBEDDING & SEARCH TYPES
// =============================================================================

/// A stored ticket embedding together with the ticket's display metadata.
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub ticket: TicketSummary,
    pub vector: Vec<f32>,
}

/// A ticket found close to a query ticket in embedding space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedTicket {
    pub key: String,
    pub title: Option<String>,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

// =============================================================================
// GENERATION TYPES
// =============================================================================

/// Sampling knobs passed to a generation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}
