//! Ticket quality scoring.
//!
//! The model grades a ticket 1-10 against a fixed rubric. When the model is
//! unreachable a local heuristic produces a comparable score instead, so
//! scoring never fails.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

use proref_core::{GenerationBackend, GenerationOptions, QualityScore, Ticket};

use crate::ticket_text;

pub const QUALITY_TEMPERATURE: f32 = 0.3;
pub const QUALITY_MAX_TOKENS: u32 = 500;

/// Items kept per list when parsing a model reply.
const MAX_PARSED_ITEMS: usize = 5;
/// Items kept per list by the heuristic.
const MAX_HEURISTIC_ITEMS: usize = 3;

static ACCEPTANCE_CRITERIA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)acceptance criteria|AC:|definition of done|DoD:|expected behavior|should be able to|given.*when.*then|\[\s*\]",
    )
    .expect("valid acceptance criteria regex")
});

static EDGE_CASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)edge case|error|fail|invalid|empty|null|boundary|limit")
        .expect("valid edge case regex")
});

pub struct QualityScorer {
    backend: Arc<dyn GenerationBackend>,
}

impl QualityScorer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Score `ticket`, falling back to [`heuristic_score`] on backend errors.
    #[instrument(skip(self, ticket), fields(subsystem = "inference", component = "quality", op = "score", ticket_key = %ticket.key))]
    pub async fn score(&self, ticket: &Ticket) -> QualityScore {
        if ticket_text(&ticket.title).is_none() && ticket_text(&ticket.description).is_none() {
            debug!("Ticket has no content");
            return empty_ticket_score();
        }

        let options = GenerationOptions::default()
            .with_temperature(QUALITY_TEMPERATURE)
            .with_max_tokens(QUALITY_MAX_TOKENS);

        match self
            .backend
            .generate(&build_quality_prompt(ticket), options)
            .await
        {
            Ok(content) => parse_score_response(&content),
            Err(e) => {
                warn!(error = %e, "Scoring backend failed, using heuristic");
                heuristic_score(ticket)
            }
        }
    }
}

/// Fixed result for a ticket with neither title nor description.
pub fn empty_ticket_score() -> QualityScore {
    QualityScore {
        score: 1,
        summary: "Ticket has no content".to_string(),
        issues: vec!["No title".to_string(), "No description".to_string()],
        suggestions: vec![
            "Add a descriptive title".to_string(),
            "Add detailed description".to_string(),
        ],
    }
}

pub fn build_quality_prompt(ticket: &Ticket) -> String {
    let issue_type = match ticket.issue_type.trim() {
        "" => "Unknown",
        other => other,
    };
    format!(
        "Analyze this Jira ticket and score its quality from 1-10.

TICKET:
Title: {title}
Type: {issue_type}
Description:
{description}

SCORING CRITERIA:
- Clear title that describes the work (0-2 points)
- Detailed description explaining the context (0-2 points)
- Acceptance criteria or definition of done (0-2 points)
- Edge cases or error scenarios mentioned (0-2 points)
- Technical details or dependencies noted (0-2 points)

RESPOND IN THIS EXACT FORMAT:
SCORE: [number 1-10]
SUMMARY: [one sentence summary of quality]
ISSUES:
- [issue 1]
- [issue 2]
SUGGESTIONS:
- [suggestion 1]
- [suggestion 2]

Be concise. Max 3 issues and 3 suggestions.",
        title = ticket_text(&ticket.title).unwrap_or("No title"),
        description = ticket_text(&ticket.description).unwrap_or("No description"),
    )
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListSection {
    Issues,
    Suggestions,
}

/// Parse a `SCORE/SUMMARY/ISSUES/SUGGESTIONS` reply.
///
/// Missing or malformed fields keep their defaults: score 5 and summary
/// "Unable to parse response". `7/10` is read as 7; scores are clamped to
/// 1..=10.
pub fn parse_score_response(content: &str) -> QualityScore {
    let mut result = QualityScore {
        score: 5,
        summary: "Unable to parse response".to_string(),
        issues: Vec::new(),
        suggestions: Vec::new(),
    };
    let mut section = None;

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(rest) = line.strip_prefix("SCORE:") {
            let number = rest.split('/').next().unwrap_or("").trim();
            if let Ok(raw) = number.parse::<i64>() {
                result.score = QualityScore::clamp_score(raw);
            }
        } else if let Some(rest) = line.strip_prefix("SUMMARY:") {
            result.summary = rest.trim().to_string();
        } else if line.starts_with("ISSUES:") {
            section = Some(ListSection::Issues);
        } else if line.starts_with("SUGGESTIONS:") {
            section = Some(ListSection::Suggestions);
        } else if line.starts_with("- ") || line.starts_with("* ") {
            let item = line.trim_start_matches(['-', '*', ' ']).trim();
            let list = match section {
                Some(ListSection::Issues) => &mut result.issues,
                Some(ListSection::Suggestions) => &mut result.suggestions,
                None => continue,
            };
            if !item.is_empty() && list.len() < MAX_PARSED_ITEMS {
                list.push(item.to_string());
            }
        }
    }

    result
}

/// Score a ticket from title/description length and keyword checks.
pub fn heuristic_score(ticket: &Ticket) -> QualityScore {
    let mut score: i64 = 5;
    let mut issues: Vec<&str> = Vec::new();
    let mut suggestions: Vec<&str> = Vec::new();

    match ticket.title.as_deref() {
        None | Some("") => {
            score -= 2;
            issues.push("Missing title");
            suggestions.push("Add a descriptive title");
        }
        Some(title) if title.chars().count() < 10 => {
            score -= 1;
            issues.push("Title is too short");
            suggestions.push("Make title more descriptive");
        }
        Some(_) => {}
    }

    let description = ticket.description.as_deref().unwrap_or("");
    let description_len = description.chars().count();
    if description.is_empty() {
        score -= 3;
        issues.push("No description");
        suggestions.push("Add a detailed description");
    } else if description_len < 50 {
        score -= 2;
        issues.push("Description is very brief");
        suggestions.push("Expand the description with more details");
    } else if description_len < 150 {
        score -= 1;
        issues.push("Description could be more detailed");
    }

    if !ACCEPTANCE_CRITERIA.is_match(description) {
        score -= 1;
        issues.push("No clear acceptance criteria");
        suggestions.push("Add acceptance criteria or definition of done");
    }

    if !EDGE_CASES.is_match(description) && description_len > 100 {
        issues.push("No edge cases mentioned");
        suggestions.push("Consider documenting error scenarios");
    }

    let score = QualityScore::clamp_score(score);
    QualityScore {
        score,
        summary: summary_for_score(score).to_string(),
        issues: take_items(issues),
        suggestions: take_items(suggestions),
    }
}

fn take_items(items: Vec<&str>) -> Vec<String> {
    items
        .into_iter()
        .take(MAX_HEURISTIC_ITEMS)
        .map(str::to_string)
        .collect()
}

/// One-line verdict for a heuristic score.
pub fn summary_for_score(score: u8) -> &'static str {
    match score {
        8.. => "Well-defined ticket with clear requirements",
        6..=7 => "Adequate ticket, minor improvements possible",
        4..=5 => "Ticket needs more detail before implementation",
        _ => "Ticket requires significant refinement",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInferenceBackend;
    use crate::test_support::test_ticket;

    #[test]
    fn test_parse_full_reply() {
        let reply = "SCORE: 7/10
SUMMARY: Clear goal but thin on errors.
ISSUES:
- No error handling described
* Missing acceptance criteria
SUGGESTIONS:
- Describe failure modes";
        let score = parse_score_response(reply);
        assert_eq!(score.score, 7);
        assert_eq!(score.summary, "Clear goal but thin on errors.");
        assert_eq!(
            score.issues,
            vec!["No error handling described", "Missing acceptance criteria"]
        );
        assert_eq!(score.suggestions, vec!["Describe failure modes"]);
    }

    #[test]
    fn test_parse_clamps_and_defaults() {
        assert_eq!(parse_score_response("SCORE: 42").score, 10);
        assert_eq!(parse_score_response("SCORE: 0").score, 1);

        let garbage = parse_score_response("I think it's fine");
        assert_eq!(garbage.score, 5);
        assert_eq!(garbage.summary, "Unable to parse response");
        assert!(garbage.issues.is_empty());

        assert_eq!(parse_score_response("SCORE: seven").score, 5);
    }

    #[test]
    fn test_parse_caps_lists_and_ignores_orphan_items() {
        let mut reply = String::from("- orphan\nISSUES:\n");
        for i in 0..8 {
            reply.push_str(&format!("- issue {}\n", i));
        }
        let score = parse_score_response(&reply);
        assert_eq!(score.issues.len(), 5);
        assert_eq!(score.issues[0], "issue 0");
        assert!(score.suggestions.is_empty());
    }

    #[test]
    fn test_heuristic_empty_description() {
        let score = heuristic_score(&test_ticket(Some("Short"), None));
        // 5 - 1 (short title) - 3 (no description) - 1 (no AC) -> clamped to 1
        assert_eq!(score.score, 1);
        assert_eq!(
            score.issues,
            vec!["Title is too short", "No description", "No clear acceptance criteria"]
        );
        assert_eq!(score.summary, "Ticket requires significant refinement");
    }

    #[test]
    fn test_heuristic_well_written_ticket() {
        let description = "As a user I should be able to reset my password from the login page. \
            Acceptance criteria: a reset email is sent within one minute. \
            Invalid or expired tokens show an error.";
        let score = heuristic_score(&test_ticket(Some("Password reset flow"), Some(description)));
        assert_eq!(score.score, 5);
        assert!(score.issues.is_empty());
        assert_eq!(score.summary, "Ticket needs more detail before implementation");
    }

    #[test]
    fn test_heuristic_long_description_without_edge_cases() {
        let description = "Display the monthly revenue dashboard with charts for each region, \
            grouped by product line, with export to CSV and a date picker on top.";
        assert!(description.len() > 100 && description.len() < 150);
        let score = heuristic_score(&test_ticket(Some("Revenue dashboard"), Some(description)));
        // 5 - 1 (could be more detailed) - 1 (no AC)
        assert_eq!(score.score, 3);
        assert_eq!(
            score.issues,
            vec![
                "Description could be more detailed",
                "No clear acceptance criteria",
                "No edge cases mentioned",
            ]
        );
        assert_eq!(
            score.suggestions,
            vec![
                "Add acceptance criteria or definition of done",
                "Consider documenting error scenarios",
            ]
        );
    }

    #[test]
    fn test_summary_bands() {
        assert_eq!(summary_for_score(10), "Well-defined ticket with clear requirements");
        assert_eq!(summary_for_score(6), "Adequate ticket, minor improvements possible");
        assert_eq!(summary_for_score(4), "Ticket needs more detail before implementation");
        assert_eq!(summary_for_score(3), "Ticket requires significant refinement");
    }

    #[tokio::test]
    async fn test_score_empty_ticket_without_call() {
        let mock = Arc::new(MockInferenceBackend::new());
        let scorer = QualityScorer::new(mock.clone());

        let score = scorer.score(&test_ticket(None, Some("  "))).await;
        assert_eq!(score, empty_ticket_score());
        assert_eq!(mock.generate_call_count(), 0);
    }

    #[tokio::test]
    async fn test_score_uses_model_reply_and_options() {
        let mock = Arc::new(
            MockInferenceBackend::new().with_default_response("SCORE: 9\nSUMMARY: Solid."),
        );
        let scorer = QualityScorer::new(mock.clone());

        let score = scorer
            .score(&test_ticket(Some("Login"), Some("Users sign in")))
            .await;
        assert_eq!(score.score, 9);
        assert_eq!(score.summary, "Solid.");

        let options = mock.calls()[0].options.unwrap();
        assert_eq!(options.temperature, Some(QUALITY_TEMPERATURE));
        assert_eq!(options.max_tokens, Some(QUALITY_MAX_TOKENS));
    }

    #[tokio::test]
    async fn test_score_falls_back_on_backend_error() {
        let mock = Arc::new(MockInferenceBackend::new().with_failure_status(503));
        let scorer = QualityScorer::new(mock);

        let ticket = test_ticket(Some("Short"), None);
        let score = scorer.score(&ticket).await;
        assert_eq!(score, heuristic_score(&ticket));
    }
}
