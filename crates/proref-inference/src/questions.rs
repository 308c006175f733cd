//! Refinement question generation.

use std::sync::Arc;

use tracing::{debug, instrument};

use proref_core::{GenerationBackend, GenerationOptions, Result, Ticket};

use crate::ticket_text;

/// Sampling temperature for question generation.
pub const QUESTIONS_TEMPERATURE: f32 = 0.3;

/// Asks an LLM for clarifying questions about a ticket.
pub struct QuestionGenerator {
    backend: Arc<dyn GenerationBackend>,
}

impl QuestionGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Questions for `ticket`, one per list entry.
    ///
    /// A ticket without both a title and a description gets no questions
    /// and the backend is not called.
    #[instrument(skip(self, ticket), fields(subsystem = "inference", component = "questions", op = "generate", ticket_key = %ticket.key))]
    pub async fn generate(&self, ticket: &Ticket) -> Result<Vec<String>> {
        let Some(prompt) = build_questions_prompt(ticket) else {
            debug!("Ticket lacks title or description, skipping");
            return Ok(Vec::new());
        };

        let options = GenerationOptions::default().with_temperature(QUESTIONS_TEMPERATURE);
        let content = self.backend.generate(&prompt, options).await?;
        let questions = parse_questions(&content);

        debug!(result_count = questions.len(), "Questions generated");
        Ok(questions)
    }
}

/// Prompt for `ticket`, or `None` when title or description is blank.
pub fn build_questions_prompt(ticket: &Ticket) -> Option<String> {
    let title = ticket_text(&ticket.title)?;
    let description = ticket_text(&ticket.description)?;

    Some(format!(
        "You are a QA assistant helping a team refine tickets before development starts.

Define 3 to 5 sharp questions the team should answer before implementing this ticket.

---
Title: {title}
Description: {description}
Issue type: {issue_type}
---

Aim to uncover:
- Edge cases and system dependencies
- Risky assumptions or vague requirements
- Workflow or domain-specific considerations
- Scenarios that could break under real-world usage

Return only the questions, in clear English, as a bullet list. No explanations or commentary.",
        issue_type = ticket.issue_type,
    ))
}

const LIST_MARKERS: [char; 4] = ['-', '*', '.', ' '];

/// Split a model reply into questions.
///
/// Leading bullets, numbering and whitespace are stripped; lines that end up
/// empty are dropped.
pub fn parse_questions(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| {
            line.trim_start()
                .trim_start_matches(|c: char| LIST_MARKERS.contains(&c) || c.is_ascii_digit())
                .trim()
        })
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInferenceBackend;
    use crate::test_support::test_ticket;

    #[test]
    fn test_parse_strips_bullets_and_numbering() {
        let content = "- What happens on timeout?\n* Who can edit?\n1. Is SSO required?\n  10. Any audit trail?\n\n";
        assert_eq!(
            parse_questions(content),
            vec![
                "What happens on timeout?",
                "Who can edit?",
                "Is SSO required?",
                "Any audit trail?",
            ]
        );
    }

    #[test]
    fn test_parse_drops_blank_and_separator_lines() {
        assert_eq!(parse_questions("\n   \n---\n- Only one?\n"), vec!["Only one?"]);
        assert!(parse_questions("").is_empty());
    }

    #[test]
    fn test_prompt_requires_title_and_description() {
        assert!(build_questions_prompt(&test_ticket(Some("Login"), None)).is_none());
        assert!(build_questions_prompt(&test_ticket(None, Some("body"))).is_none());
        assert!(build_questions_prompt(&test_ticket(Some("  "), Some("body"))).is_none());

        let prompt = build_questions_prompt(&test_ticket(Some(" Login "), Some("Users sign in")))
            .unwrap();
        assert!(prompt.contains("Title: Login\n"));
        assert!(prompt.contains("Description: Users sign in\n"));
        assert!(prompt.contains("Issue type: story"));
    }

    #[tokio::test]
    async fn test_generate_skips_incomplete_ticket() {
        let mock = Arc::new(MockInferenceBackend::new().with_default_response("- q?"));
        let generator = QuestionGenerator::new(mock.clone());

        let questions = generator
            .generate(&test_ticket(Some("Login"), None))
            .await
            .unwrap();
        assert!(questions.is_empty());
        assert_eq!(mock.generate_call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_parses_reply_with_low_temperature() {
        let mock = Arc::new(
            MockInferenceBackend::new()
                .with_default_response("1. What about locked accounts?\n2. Which browsers?"),
        );
        let generator = QuestionGenerator::new(mock.clone());

        let questions = generator
            .generate(&test_ticket(Some("Login"), Some("Users sign in")))
            .await
            .unwrap();

        assert_eq!(
            questions,
            vec!["What about locked accounts?", "Which browsers?"]
        );
        let options = mock.calls()[0].options.unwrap();
        assert_eq!(options.temperature, Some(QUESTIONS_TEMPERATURE));
        assert_eq!(options.max_tokens, None);
    }

    #[tokio::test]
    async fn test_generate_propagates_backend_error() {
        let mock = Arc::new(MockInferenceBackend::new().with_failure_status(500));
        let generator = QuestionGenerator::new(mock);

        let result = generator
            .generate(&test_ticket(Some("Login"), Some("Users sign in")))
            .await;
        assert!(result.is_err());
    }
}
