//! Markdown output of generated questions and test cases.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use proref_core::{Result, TestCase, Ticket};

/// Section for one ticket's generated questions.
pub fn questions_markdown(ticket: &Ticket, questions: &[String]) -> String {
    let mut out = ticket_header(ticket);
    out.push_str("**Generated questions:**\n");
    for question in questions {
        out.push_str(&format!("- {}\n", question));
    }
    out.push_str("\n---\n\n");
    out
}

/// Section for one ticket's generated test cases.
pub fn test_cases_markdown(ticket: &Ticket, cases: &[TestCase]) -> String {
    let mut out = ticket_header(ticket);
    for (i, case) in cases.iter().enumerate() {
        let id = if case.id.is_empty() {
            (i + 1).to_string()
        } else {
            case.id.clone()
        };
        out.push_str(&format!("### TC-{}: {}\n\n", id, case.title));
        if !case.pre.is_empty() {
            out.push_str(&format!("**PRE:** {}\n\n", case.pre));
        }
        if !case.steps.is_empty() {
            out.push_str(&format!("**STEPS:**\n```\n{}\n```\n\n", case.steps));
        }
        if !case.expected.is_empty() {
            out.push_str(&format!("**EXPECTED:**\n{}\n\n", case.expected));
        }
        out.push_str("---\n\n");
    }
    out
}

fn ticket_header(ticket: &Ticket) -> String {
    format!(
        "## {} - {}\n**Type:** {}\n\n",
        ticket.key,
        ticket.title.as_deref().map(str::trim).unwrap_or(""),
        ticket.issue_type
    )
}

/// Append `section` to `path`, creating the file and its directory.
pub async fn append_section(path: &Path, section: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(section.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ticket() -> Ticket {
        Ticket {
            key: "APP-3".to_string(),
            title: Some(" Password reset ".to_string()),
            description: Some("Users reset passwords by email".to_string()),
            status: "To Do".to_string(),
            issue_type: "story".to_string(),
            updated_at: None,
            fetched_at: Utc::now(),
            questions_generated: false,
            test_cases_generated: false,
            content_hash: None,
            content_changed: false,
            quality: None,
            quality_scored_at: None,
        }
    }

    #[test]
    fn test_questions_markdown() {
        let md = questions_markdown(&ticket(), &["How long is the link valid?".to_string()]);
        assert_eq!(
            md,
            "## APP-3 - Password reset\n**Type:** story\n\n**Generated questions:**\n- How long is the link valid?\n\n---\n\n"
        );
    }

    #[test]
    fn test_test_cases_markdown_skips_empty_sections() {
        let cases = vec![
            TestCase {
                id: "1".to_string(),
                title: "Reset link sent".to_string(),
                pre: "User exists".to_string(),
                steps: "1. Request reset".to_string(),
                expected: "- Email received".to_string(),
            },
            TestCase {
                id: String::new(),
                title: "Unknown email".to_string(),
                ..Default::default()
            },
        ];
        let md = test_cases_markdown(&ticket(), &cases);

        assert!(md.starts_with("## APP-3 - Password reset\n**Type:** story\n\n"));
        assert!(md.contains("### TC-1: Reset link sent\n\n**PRE:** User exists\n\n"));
        assert!(md.contains("**STEPS:**\n```\n1. Request reset\n```\n\n"));
        assert!(md.contains("**EXPECTED:**\n- Email received\n\n---\n\n"));
        assert!(md.ends_with("### TC-2: Unknown email\n\n---\n\n"));
    }

    #[tokio::test]
    async fn test_append_section_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions").join("out.md");

        append_section(&path, "first\n").await.unwrap();
        append_section(&path, "second\n").await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "first\nsecond\n");
    }
}
