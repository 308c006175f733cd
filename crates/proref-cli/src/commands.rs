//! Batch commands behind the `proref` subcommands.
//!
//! Every batch walks its tickets sequentially. A failure on one ticket is
//! logged with the ticket key and counted; the batch moves on. Storage
//! failures while listing the work are returned.

use std::fmt;

use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use proref_core::{
    CommentPublisher, ContentKind, ContentRepository, EmbeddingRepository, Error,
    GeneratedContent, PublicationStats, ReconcileOutcome, ReconcileSummary, RelatedTicket,
    Result, TicketRepository, TicketSource, TicketStats,
};
use proref_db::Database;
use proref_inference::{Embedder, QualityScorer, QuestionGenerator, TestCaseGenerator};
use proref_jira::{format_questions, format_test_cases};
use proref_search::{format_related_summary, RelatedQuery, RelatedTicketFinder};

use crate::config::Paths;
use crate::export;

/// Shared state for one command invocation.
pub struct Context {
    pub db: Database,
    pub paths: Paths,
    shutdown: watch::Receiver<bool>,
}

impl Context {
    pub fn new(db: Database, paths: Paths, shutdown: watch::Receiver<bool>) -> Self {
        Self { db, paths, shutdown }
    }

    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn stop_if_requested(&self, remaining: usize) -> bool {
        let stop = self.shutdown_requested();
        if stop {
            warn!(subsystem = "cli", remaining, "Shutdown requested, stopping batch");
        }
        stop
    }
}

/// Per-ticket tally of a batch command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub published: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    fn fail(&mut self, ticket_key: &str, op: &str, err: &Error) {
        self.failed += 1;
        error!(subsystem = "cli", ticket_key, op, error = %err, "Ticket failed");
        println!("  Failed: {}", err);
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed",
            self.succeeded, self.skipped, self.failed
        )?;
        if self.published > 0 {
            write!(f, ", {} published", self.published)?;
        }
        Ok(())
    }
}

// =============================================================================
// FETCH & EMBED
// =============================================================================

/// Result of merging a fetched backlog into the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub fetched: usize,
    pub summary: ReconcileSummary,
    pub failed: usize,
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetched: {} new, {} updated ({} with changed content), {} unchanged, {} failed",
            self.fetched,
            self.summary.inserted,
            self.summary.updated,
            self.summary.content_changed,
            self.summary.skipped,
            self.failed
        )
    }
}

/// Pull the backlog from `source` and reconcile it ticket by ticket.
#[instrument(skip_all, fields(subsystem = "cli", op = "fetch"))]
pub async fn fetch(ctx: &Context, source: &dyn TicketSource) -> Result<FetchReport> {
    let incoming = source.fetch_tickets().await?;
    let mut report = FetchReport {
        fetched: incoming.len(),
        ..Default::default()
    };

    for ticket in &incoming {
        match ctx.db.tickets.reconcile(ticket).await {
            Ok(outcome) => {
                if matches!(outcome, ReconcileOutcome::Updated { content_changed: true }) {
                    println!("  {}: content changed since last generation", ticket.key);
                }
                report.summary.record(outcome);
            }
            Err(e) => {
                report.failed += 1;
                error!(ticket_key = %ticket.key, op = "reconcile", error = %e, "Ticket failed");
            }
        }
    }

    info!(
        fetched = report.fetched,
        inserted = report.summary.inserted,
        updated = report.summary.updated,
        failed = report.failed,
        "Fetch complete"
    );
    Ok(report)
}

/// Embed every stored ticket and store the vectors.
#[instrument(skip_all, fields(subsystem = "cli", op = "embed"))]
pub async fn embed(ctx: &Context, embedder: &Embedder) -> Result<BatchReport> {
    let tickets = ctx.db.tickets.list_all().await?;
    let mut report = BatchReport::default();

    for (idx, ticket) in tickets.iter().enumerate() {
        if ctx.stop_if_requested(tickets.len() - idx) {
            break;
        }
        println!("[{}/{}] Embedding {}...", idx + 1, tickets.len(), ticket.key);

        let vector = match embedder.embed_ticket(ticket).await {
            Ok(vector) => vector,
            Err(e) => {
                report.fail(&ticket.key, "embed", &e);
                continue;
            }
        };
        match ctx.db.embeddings.save_embedding(&ticket.key, &vector).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => report.fail(&ticket.key, "save_embedding", &e),
        }
    }

    info!(succeeded = report.succeeded, failed = report.failed, "Embedding complete");
    Ok(report)
}

// =============================================================================
// GENERATION
// =============================================================================

enum Generated {
    Stored { published: bool },
    Empty,
}

impl BatchReport {
    fn record(&mut self, outcome: Generated) {
        match outcome {
            Generated::Stored { published } => {
                self.succeeded += 1;
                if published {
                    self.published += 1;
                }
            }
            Generated::Empty => self.skipped += 1,
        }
    }
}

/// Generate refinement questions for every pending ticket.
///
/// Results are stored, flagged, appended to the questions markdown file and,
/// with a `publisher`, posted as comments.
#[instrument(skip_all, fields(subsystem = "cli", op = "questions"))]
pub async fn questions(
    ctx: &Context,
    generator: &QuestionGenerator,
    publisher: Option<&dyn CommentPublisher>,
) -> Result<BatchReport> {
    let tickets = ctx.db.tickets.pending_questions().await?;
    let mut report = BatchReport::default();
    if tickets.is_empty() {
        println!("No tickets pending question generation.");
        return Ok(report);
    }

    let finder = RelatedTicketFinder::new(ctx.db.embeddings.clone());
    let output = ctx.paths.questions_file();
    println!("Generating questions for {} tickets...", tickets.len());

    for (idx, ticket) in tickets.iter().enumerate() {
        if ctx.stop_if_requested(tickets.len() - idx) {
            break;
        }
        println!("[{}/{}] Generating for {}...", idx + 1, tickets.len(), ticket.key);

        match finder.find_related(&ticket.key, RelatedQuery::default()).await {
            Ok(related) if !related.is_empty() => {
                for line in format_related_summary(&related).lines() {
                    println!("  {}", line);
                }
            }
            Ok(_) => {}
            Err(e) => warn!(ticket_key = %ticket.key, error = %e, "Related ticket lookup failed"),
        }

        let result = async {
            let questions = generator.generate(ticket).await?;
            if questions.is_empty() {
                return Ok(Generated::Empty);
            }

            let id = ctx
                .db
                .content
                .record_generation(&ticket.key, ContentKind::Questions, serde_json::to_value(&questions)?)
                .await?;
            write_markdown(&output, &export::questions_markdown(ticket, &questions)).await;

            let published = match publisher {
                Some(publisher) => {
                    publish_one(ctx, publisher, &ticket.key, id, &format_questions(&questions)).await
                }
                None => false,
            };
            Ok::<_, Error>(Generated::Stored { published })
        }
        .await;

        match result {
            Ok(outcome) => report.record(outcome),
            Err(e) => report.fail(&ticket.key, "generate_questions", &e),
        }
    }

    info!(%report, "Question generation complete");
    Ok(report)
}

/// Generate test cases for every pending ticket. Mirrors [`questions`].
#[instrument(skip_all, fields(subsystem = "cli", op = "test_cases"))]
pub async fn test_cases(
    ctx: &Context,
    generator: &TestCaseGenerator,
    publisher: Option<&dyn CommentPublisher>,
) -> Result<BatchReport> {
    let tickets = ctx.db.tickets.pending_test_cases().await?;
    let mut report = BatchReport::default();
    if tickets.is_empty() {
        println!("No tickets pending test case generation.");
        return Ok(report);
    }

    let output = ctx.paths.test_cases_file();
    println!("Generating test cases for {} tickets...", tickets.len());

    for (idx, ticket) in tickets.iter().enumerate() {
        if ctx.stop_if_requested(tickets.len() - idx) {
            break;
        }
        println!("[{}/{}] Generating for {}...", idx + 1, tickets.len(), ticket.key);

        let result = async {
            let cases = generator.generate(ticket).await?;
            if cases.is_empty() {
                return Ok(Generated::Empty);
            }

            let id = ctx
                .db
                .content
                .record_generation(&ticket.key, ContentKind::TestCases, serde_json::to_value(&cases)?)
                .await?;
            write_markdown(&output, &export::test_cases_markdown(ticket, &cases)).await;

            let published = match publisher {
                Some(publisher) => {
                    publish_one(ctx, publisher, &ticket.key, id, &format_test_cases(&cases)).await
                }
                None => false,
            };
            Ok::<_, Error>(Generated::Stored { published })
        }
        .await;

        match result {
            Ok(outcome) => report.record(outcome),
            Err(e) => report.fail(&ticket.key, "generate_test_cases", &e),
        }
    }

    info!(%report, "Test case generation complete");
    Ok(report)
}

async fn write_markdown(path: &std::path::Path, section: &str) {
    if let Err(e) = export::append_section(path, section).await {
        warn!(subsystem = "cli", path = %path.display(), error = %e, "Failed to write markdown");
    }
}

/// Post one stored record and flag it published. Failures are logged and
/// leave the record pending.
async fn publish_one(
    ctx: &Context,
    publisher: &dyn CommentPublisher,
    ticket_key: &str,
    content_id: i64,
    body: &JsonValue,
) -> bool {
    let result = async {
        publisher.post_comment(ticket_key, body).await?;
        ctx.db.content.mark_published(content_id).await
    }
    .await;

    match result {
        Ok(()) => {
            println!("  Published to {}", ticket_key);
            true
        }
        Err(e) => {
            warn!(subsystem = "cli", ticket_key, content_id, error = %e, "Publish failed");
            println!("  Failed to publish: {}", e);
            false
        }
    }
}

// =============================================================================
// PUBLISHING
// =============================================================================

/// Comment body for a stored record, or `None` when it holds no items.
pub fn comment_body(content: &GeneratedContent) -> Result<Option<JsonValue>> {
    let body = match content.kind {
        ContentKind::Questions => {
            let questions = content.questions()?;
            (!questions.is_empty()).then(|| format_questions(&questions))
        }
        ContentKind::TestCases => {
            let cases = content.test_cases()?;
            (!cases.is_empty()).then(|| format_test_cases(&cases))
        }
    };
    Ok(body)
}

fn preview_lines(content: &GeneratedContent) -> Result<Vec<String>> {
    let lines = match content.kind {
        ContentKind::Questions => content
            .questions()?
            .into_iter()
            .map(|q| format!("- {}", q))
            .collect(),
        ContentKind::TestCases => content
            .test_cases()?
            .into_iter()
            .map(|tc| format!("TC-{}: {}", tc.id, tc.title))
            .collect(),
    };
    Ok(lines)
}

/// Post every unpublished record, oldest first. Without a `publisher` the
/// records are only previewed.
#[instrument(skip_all, fields(subsystem = "cli", op = "publish", dry_run = publisher.is_none()))]
pub async fn publish(ctx: &Context, publisher: Option<&dyn CommentPublisher>) -> Result<BatchReport> {
    let pending = ctx.db.content.list_unpublished().await?;
    let mut report = BatchReport::default();
    if pending.is_empty() {
        println!("No pending content to publish.");
        return Ok(report);
    }
    println!("Found {} items pending publication.", pending.len());

    for (idx, content) in pending.iter().enumerate() {
        if ctx.stop_if_requested(pending.len() - idx) {
            break;
        }
        let title = match ctx.db.tickets.get(&content.ticket_key).await {
            Ok(ticket) => ticket.and_then(|t| t.title).unwrap_or_default(),
            Err(e) => {
                report.fail(&content.ticket_key, "publish", &e);
                continue;
            }
        };
        println!(
            "[{}/{}] {} - {} ({})",
            idx + 1,
            pending.len(),
            content.ticket_key,
            title,
            content.kind.label()
        );

        let body = match comment_body(content) {
            Ok(Some(body)) => body,
            Ok(None) => {
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                report.fail(&content.ticket_key, "publish", &e);
                continue;
            }
        };

        let Some(publisher) = publisher else {
            for line in preview_lines(content)? {
                println!("    {}", line);
            }
            report.skipped += 1;
            continue;
        };

        if publish_one(ctx, publisher, &content.ticket_key, content.id, &body).await {
            report.succeeded += 1;
            report.published += 1;
        } else {
            report.failed += 1;
        }
    }

    info!(%report, "Publishing complete");
    Ok(report)
}

// =============================================================================
// SINGLE-TICKET COMMANDS
// =============================================================================

/// Tickets related to `ticket_key` by embedding similarity.
pub async fn related(ctx: &Context, ticket_key: &str, query: RelatedQuery) -> Result<Vec<RelatedTicket>> {
    if ctx.db.tickets.get(ticket_key).await?.is_none() {
        return Err(Error::NotFound(format!("ticket {}", ticket_key)));
    }
    RelatedTicketFinder::new(ctx.db.embeddings.clone())
        .find_related(ticket_key, query)
        .await
}

/// Score one ticket, or every ticket without a score.
#[instrument(skip_all, fields(subsystem = "cli", op = "score"))]
pub async fn score(ctx: &Context, scorer: &QualityScorer, ticket_key: Option<&str>) -> Result<BatchReport> {
    let tickets = match ticket_key {
        Some(key) => vec![ctx
            .db
            .tickets
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ticket {}", key)))?],
        None => ctx
            .db
            .tickets
            .list_all()
            .await?
            .into_iter()
            .filter(|t| t.quality.is_none())
            .collect(),
    };

    let mut report = BatchReport::default();
    if tickets.is_empty() {
        println!("No tickets pending quality scoring.");
        return Ok(report);
    }

    for (idx, ticket) in tickets.iter().enumerate() {
        if ctx.stop_if_requested(tickets.len() - idx) {
            break;
        }
        let quality = scorer.score(ticket).await;
        match ctx.db.tickets.save_quality_score(&ticket.key, &quality).await {
            Ok(_) => {
                report.succeeded += 1;
                println!(
                    "[{}/{}] {}: {}/10 ({}) {}",
                    idx + 1,
                    tickets.len(),
                    ticket.key,
                    quality.score,
                    quality.label(),
                    quality.summary
                );
            }
            Err(e) => report.fail(&ticket.key, "save_quality_score", &e),
        }
    }

    Ok(report)
}

/// Ticket and publication counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub tickets: TicketStats,
    pub publication: PublicationStats,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.tickets;
        let p = &self.publication;
        writeln!(f, "ProRef Status")?;
        writeln!(f, "{}", "=".repeat(40))?;
        writeln!(f, "Tickets:")?;
        writeln!(f, "  Total:                 {}", t.total)?;
        writeln!(f, "  With questions:        {}", t.with_questions)?;
        writeln!(f, "  With test cases:       {}", t.with_test_cases)?;
        writeln!(f, "  Content changed:       {}", t.content_changed)?;
        writeln!(f, "  Quality scored:        {}", t.scored)?;
        writeln!(f, "Publication:")?;
        writeln!(f, "  Questions published:   {}", p.questions_published)?;
        writeln!(f, "  Test cases published:  {}", p.test_cases_published)?;
        writeln!(f, "  Questions pending:     {}", p.questions_pending)?;
        write!(f, "  Test cases pending:    {}", p.test_cases_pending)
    }
}

pub async fn status(ctx: &Context) -> Result<StatusReport> {
    Ok(StatusReport {
        tickets: ctx.db.tickets.stats().await?,
        publication: ctx.db.content.publication_stats().await?,
    })
}

/// Clear the changed-content flag of a ticket.
pub async fn review(ctx: &Context, ticket_key: &str) -> Result<()> {
    if !ctx.db.tickets.mark_content_reviewed(ticket_key).await? {
        return Err(Error::NotFound(format!("ticket {}", ticket_key)));
    }
    info!(subsystem = "cli", ticket_key, "Marked content reviewed");
    Ok(())
}

/// Queue a ticket for regeneration. With neither flag set both kinds are
/// reset.
pub async fn reset(ctx: &Context, ticket_key: &str, questions: bool, tests: bool) -> Result<()> {
    let (questions, tests) = if questions || tests {
        (questions, tests)
    } else {
        (true, true)
    };
    if !ctx
        .db
        .tickets
        .reset_for_regeneration(ticket_key, questions, tests)
        .await?
    {
        return Err(Error::NotFound(format!("ticket {}", ticket_key)));
    }
    info!(subsystem = "cli", ticket_key, questions, tests, "Reset for regeneration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proref_core::TestCase;
    use serde_json::json;

    fn content(kind: ContentKind, payload: JsonValue) -> GeneratedContent {
        GeneratedContent {
            id: 1,
            ticket_key: "APP-1".to_string(),
            kind,
            payload,
            published: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_batch_report_display() {
        let report = BatchReport {
            succeeded: 3,
            skipped: 1,
            failed: 2,
            published: 0,
        };
        assert_eq!(report.to_string(), "3 succeeded, 1 skipped, 2 failed");
        assert_eq!(report.total(), 6);

        let report = BatchReport {
            published: 3,
            ..report
        };
        assert!(report.to_string().ends_with(", 3 published"));
    }

    #[test]
    fn test_comment_body_by_kind() {
        let body = comment_body(&content(ContentKind::Questions, json!(["Who?"])))
            .unwrap()
            .unwrap();
        assert_eq!(body, format_questions(&["Who?".to_string()]));

        let cases = vec![TestCase {
            id: "1".to_string(),
            title: "Login".to_string(),
            ..Default::default()
        }];
        let body = comment_body(&content(ContentKind::TestCases, serde_json::to_value(&cases).unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(body, format_test_cases(&cases));
    }

    #[test]
    fn test_comment_body_empty_and_malformed() {
        assert!(comment_body(&content(ContentKind::Questions, json!([])))
            .unwrap()
            .is_none());
        assert!(matches!(
            comment_body(&content(ContentKind::TestCases, json!("not a list"))),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_preview_lines() {
        let lines = preview_lines(&content(
            ContentKind::TestCases,
            json!([{"id": "2", "title": "Logout"}]),
        ))
        .unwrap();
        assert_eq!(lines, vec!["TC-2: Logout"]);
    }
}
