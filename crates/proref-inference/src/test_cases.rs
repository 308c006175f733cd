//! Structured test case generation.
//!
//! The model is asked for blocks of the form:
//!
//! ```text
//! TC-1: Short title
//!
//! PRE: Preconditions
//!
//! STEPS:
//! 1. First step
//! 2. Second step
//!
//! EXPECTED:
//! - Expected result
//!
//! ---
//! ```
//!
//! Spanish section headers (`PASOS:`, `ESPERADO:`) are accepted as well.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use proref_core::{GenerationBackend, GenerationOptions, Result, TestCase, Ticket};

use crate::ticket_text;

/// Sampling temperature for test case generation.
pub const TEST_CASES_TEMPERATURE: f32 = 0.2;

static TC_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TC-\d+:").expect("valid test case marker regex"));
static TC_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^TC-(\d+):\s*(.+)").expect("valid test case header regex"));

pub struct TestCaseGenerator {
    backend: Arc<dyn GenerationBackend>,
}

impl TestCaseGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Test cases for `ticket`. Empty without a call when title or
    /// description is blank.
    #[instrument(skip(self, ticket), fields(subsystem = "inference", component = "test_cases", op = "generate", ticket_key = %ticket.key))]
    pub async fn generate(&self, ticket: &Ticket) -> Result<Vec<TestCase>> {
        let Some(prompt) = build_test_cases_prompt(ticket) else {
            debug!("Ticket lacks title or description, skipping");
            return Ok(Vec::new());
        };

        let options = GenerationOptions::default().with_temperature(TEST_CASES_TEMPERATURE);
        let content = self.backend.generate(&prompt, options).await?;
        let cases = parse_test_cases(&content);

        debug!(result_count = cases.len(), "Test cases generated");
        Ok(cases)
    }
}

pub fn build_test_cases_prompt(ticket: &Ticket) -> Option<String> {
    let title = ticket_text(&ticket.title)?;
    let description = ticket_text(&ticket.description)?;

    Some(format!(
        "You are a senior QA analyst.
Write up to 5 functional test cases for the ticket below.

RULES:
- Cover the happy path and at least one negative or edge case
- Avoid redundancy; fewer than 5 is fine
- Use concrete test data
- Output ONLY test cases in the EXACT format below, with no other text

FORMAT (repeat for each test case):
TC-1: [Short descriptive title]

PRE: [Preconditions, e.g. user logged in as Admin]

STEPS:
1. [First step]
2. [Second step]
   - [Sub-item if needed]
3. [Final step]

EXPECTED:
- [Expected result 1]
- [Expected message or validation]

---

(Number the cases TC-1, TC-2, TC-3 and so on.)

---
TICKET:
Title: {title}
Description: {description}
Issue type: {issue_type}
---
",
        issue_type = ticket.issue_type,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Pre,
    Steps,
    Expected,
}

/// Parse every `TC-N:` block of a model reply.
///
/// A block is kept when it has an id and either a title or steps.
pub fn parse_test_cases(content: &str) -> Vec<TestCase> {
    let content = content.trim();

    let mut bounds: Vec<usize> = TC_MARKER.find_iter(content).map(|m| m.start()).collect();
    if bounds.first() != Some(&0) {
        bounds.insert(0, 0);
    }
    bounds.push(content.len());

    bounds
        .windows(2)
        .filter_map(|w| parse_block(&content[w[0]..w[1]]))
        .collect()
}

fn parse_block(block: &str) -> Option<TestCase> {
    let block = block.trim();
    if !block.starts_with("TC-") {
        return None;
    }

    let mut case = TestCase::default();
    let mut section: Option<Section> = None;
    let mut lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        let stripped = line.trim();

        if stripped.starts_with("TC-") {
            if let Some(caps) = TC_HEADER.captures(stripped) {
                case.id = caps[1].to_string();
                case.title = caps[2].to_string();
            }
            continue;
        }

        if let Some((next, rest)) = section_header(stripped) {
            store_section(&mut case, section, &lines);
            section = Some(next);
            lines.clear();
            if !rest.is_empty() {
                lines.push(rest);
            }
            continue;
        }

        if stripped == "---" {
            continue;
        }

        if section.is_some() && !stripped.is_empty() {
            lines.push(line);
        }
    }
    store_section(&mut case, section, &lines);

    let keep = !case.id.is_empty() && (!case.title.is_empty() || !case.steps.is_empty());
    keep.then_some(case)
}

/// Recognize a section header. Only `PRE:` keeps text on the header line.
fn section_header(line: &str) -> Option<(Section, &str)> {
    if let Some(rest) = line.strip_prefix("PRE:") {
        return Some((Section::Pre, rest.trim()));
    }
    if line.starts_with("STEPS:") || line.starts_with("PASOS:") {
        return Some((Section::Steps, ""));
    }
    if line.starts_with("EXPECTED:") || line.starts_with("ESPERADO:") {
        return Some((Section::Expected, ""));
    }
    None
}

fn store_section(case: &mut TestCase, section: Option<Section>, lines: &[&str]) {
    let Some(section) = section else {
        return;
    };
    if lines.is_empty() {
        return;
    }
    let text = lines.join("\n").trim().to_string();
    match section {
        Section::Pre => case.pre = text,
        Section::Steps => case.steps = text,
        Section::Expected => case.expected = text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInferenceBackend;
    use crate::test_support::test_ticket;

    const TWO_CASES: &str = "TC-1: Valid login

PRE: User exists

STEPS:
1. Open login page
2. Enter credentials
   - email: a@b.com
3. Submit

EXPECTED:
- Dashboard is shown
- Welcome message appears

---

TC-2: Wrong password
PRE:
User exists
STEPS:
1. Enter a wrong password
EXPECTED:
- Error \"Invalid credentials\"
---";

    #[test]
    fn test_parse_two_cases() {
        let cases = parse_test_cases(TWO_CASES);
        assert_eq!(cases.len(), 2);

        assert_eq!(cases[0].id, "1");
        assert_eq!(cases[0].title, "Valid login");
        assert_eq!(cases[0].pre, "User exists");
        assert_eq!(
            cases[0].steps,
            "1. Open login page\n2. Enter credentials\n   - email: a@b.com\n3. Submit"
        );
        assert_eq!(
            cases[0].expected,
            "- Dashboard is shown\n- Welcome message appears"
        );

        assert_eq!(cases[1].id, "2");
        assert_eq!(cases[1].title, "Wrong password");
        assert_eq!(cases[1].pre, "User exists");
        assert_eq!(cases[1].steps, "1. Enter a wrong password");
        assert_eq!(cases[1].expected, "- Error \"Invalid credentials\"");
    }

    #[test]
    fn test_parse_spanish_headers() {
        let content = "TC-3: Alta de usuario\nPASOS:\n1. Abrir formulario\nESPERADO:\n- Usuario creado";
        let cases = parse_test_cases(content);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].steps, "1. Abrir formulario");
        assert_eq!(cases[0].expected, "- Usuario creado");
        assert_eq!(cases[0].pre, "");
    }

    #[test]
    fn test_parse_ignores_preamble() {
        let content = "Here are your test cases:\n\nTC-1: Happy path\nSTEPS:\n1. Do it";
        let cases = parse_test_cases(content);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].title, "Happy path");
    }

    #[test]
    fn test_text_after_steps_header_is_dropped() {
        let content = "TC-1: Inline\nSTEPS: 1. inline step\n2. next step";
        let cases = parse_test_cases(content);
        assert_eq!(cases[0].steps, "2. next step");
    }

    #[test]
    fn test_header_without_title_is_dropped() {
        assert!(parse_test_cases("TC-1:\nPRE: something").is_empty());
        assert!(parse_test_cases("TC-4:\nSTEPS:\n1. Click").is_empty());
    }

    #[test]
    fn test_parse_empty_and_garbage() {
        assert!(parse_test_cases("").is_empty());
        assert!(parse_test_cases("No structured output here").is_empty());
    }

    #[tokio::test]
    async fn test_generate_uses_parser_and_temperature() {
        let mock = Arc::new(MockInferenceBackend::new().with_default_response(TWO_CASES));
        let generator = TestCaseGenerator::new(mock.clone());

        let cases = generator
            .generate(&test_ticket(Some("Login"), Some("Users sign in")))
            .await
            .unwrap();

        assert_eq!(cases.len(), 2);
        let call = &mock.calls()[0];
        assert_eq!(call.options.unwrap().temperature, Some(TEST_CASES_TEMPERATURE));
        assert!(call.input.contains("Title: Login"));
    }

    #[tokio::test]
    async fn test_generate_skips_incomplete_ticket() {
        let mock = Arc::new(MockInferenceBackend::new().with_default_response(TWO_CASES));
        let generator = TestCaseGenerator::new(mock.clone());

        let cases = generator
            .generate(&test_ticket(None, Some("Users sign in")))
            .await
            .unwrap();
        assert!(cases.is_empty());
        assert_eq!(mock.generate_call_count(), 0);
    }
}
