//! Atlassian Document Format (ADF) helpers.
//!
//! Jira Cloud v3 stores rich text as a JSON node tree. Descriptions are
//! flattened to plain text on fetch; comments are built as ADF documents.

use serde_json::{json, Value as JsonValue};

use proref_core::TestCase;

/// Default heading level for section titles.
pub const DEFAULT_HEADING_LEVEL: u8 = 3;

// =============================================================================
// READING
// =============================================================================

/// Flatten an ADF node tree to plain text.
///
/// Block nodes end with a newline, hard breaks become newlines and list
/// items are prefixed with `- `. Unknown nodes contribute their children.
pub fn adf_to_text(node: &JsonValue) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out.trim().to_string()
}

fn write_node(node: &JsonValue, out: &mut String) {
    let node_type = node.get("type").and_then(JsonValue::as_str).unwrap_or("");

    match node_type {
        "text" => {
            if let Some(text) = node.get("text").and_then(JsonValue::as_str) {
                out.push_str(text);
            }
            return;
        }
        "hardBreak" => {
            out.push('\n');
            return;
        }
        "mention" | "emoji" => {
            if let Some(text) = attr(node, "text").or_else(|| attr(node, "shortName")) {
                out.push_str(text);
            }
            return;
        }
        "inlineCard" => {
            if let Some(url) = attr(node, "url") {
                out.push_str(url);
            }
            return;
        }
        "listItem" => {
            end_line(out);
            out.push_str("- ");
        }
        _ => {}
    }

    if let Some(children) = node.get("content").and_then(JsonValue::as_array) {
        for child in children {
            write_node(child, out);
        }
    }

    if matches!(
        node_type,
        "paragraph" | "heading" | "codeBlock" | "blockquote" | "rule" | "listItem" | "tableRow"
    ) {
        end_line(out);
    }
}

fn attr<'a>(node: &'a JsonValue, name: &str) -> Option<&'a str> {
    node.get("attrs")
        .and_then(|attrs| attrs.get(name))
        .and_then(JsonValue::as_str)
}

fn end_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

// =============================================================================
// WRITING
// =============================================================================

/// Inline content for `text`: one text node per non-empty line, separated
/// by hard breaks. Never empty: blank input yields a single `" "` node.
pub fn text_to_adf_content(text: &str) -> Vec<JsonValue> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut content = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if !line.is_empty() {
            content.push(json!({"type": "text", "text": line}));
        }
        if i + 1 < lines.len() {
            content.push(json!({"type": "hardBreak"}));
        }
    }

    if content.is_empty() {
        content.push(json!({"type": "text", "text": " "}));
    }
    content
}

/// Incremental builder for an ADF `doc` node.
#[derive(Debug, Default)]
pub struct AdfDocument {
    content: Vec<JsonValue>,
}

impl AdfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heading(&mut self, level: u8, text: &str) -> &mut Self {
        self.content.push(json!({
            "type": "heading",
            "attrs": {"level": level},
            "content": [{"type": "text", "text": text}]
        }));
        self
    }

    /// Paragraph with hard breaks. Empty text adds nothing.
    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        if !text.is_empty() {
            self.content.push(json!({
                "type": "paragraph",
                "content": text_to_adf_content(text)
            }));
        }
        self
    }

    pub fn code_block(&mut self, text: &str) -> &mut Self {
        self.content.push(json!({
            "type": "codeBlock",
            "attrs": {"language": "text"},
            "content": [{"type": "text", "text": text}]
        }));
        self
    }

    pub fn rule(&mut self) -> &mut Self {
        self.content.push(json!({"type": "rule"}));
        self
    }

    /// Bullet list with one paragraph per item. No items adds nothing.
    pub fn bullet_list<I, S>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list_items: Vec<JsonValue> = items
            .into_iter()
            .map(|item| {
                json!({
                    "type": "listItem",
                    "content": [{
                        "type": "paragraph",
                        "content": [{"type": "text", "text": item.as_ref()}]
                    }]
                })
            })
            .collect();

        if !list_items.is_empty() {
            self.content.push(json!({
                "type": "bulletList",
                "content": list_items
            }));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn to_value(&self) -> JsonValue {
        json!({
            "type": "doc",
            "version": 1,
            "content": self.content
        })
    }
}

/// Comment body for a plain text message.
pub fn plain_text_document(text: &str) -> JsonValue {
    AdfDocument::new().paragraph(text).to_value()
}

/// Comment body listing generated refinement questions.
pub fn format_questions(questions: &[String]) -> JsonValue {
    AdfDocument::new()
        .heading(DEFAULT_HEADING_LEVEL, "Generated Refinement Questions")
        .bullet_list(questions)
        .to_value()
}

/// Comment body with one section per test case, separated by rules.
pub fn format_test_cases(cases: &[TestCase]) -> JsonValue {
    let mut doc = AdfDocument::new();
    doc.heading(DEFAULT_HEADING_LEVEL, "Generated Test Cases");

    for (i, case) in cases.iter().enumerate() {
        if i > 0 {
            doc.rule();
        }

        let id = if case.id.is_empty() { "?" } else { case.id.as_str() };
        doc.heading(4, &format!("TC-{}: {}", id, case.title));

        if !case.pre.is_empty() {
            doc.paragraph(&format!("PRE: {}", case.pre));
        }

        if !case.steps.is_empty() {
            doc.paragraph("STEPS:").code_block(&case.steps);
        }

        if !case.expected.is_empty() {
            doc.paragraph("EXPECTED:");
            let items: Vec<&str> = case
                .expected
                .split('\n')
                .filter(|line| !line.trim().is_empty())
                .map(|line| line.trim_start_matches(['-', ' ']).trim())
                .collect();
            doc.bullet_list(items);
        }
    }

    doc.to_value()
}
