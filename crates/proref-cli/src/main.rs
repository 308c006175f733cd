//! proref: ticket refinement assistant.
//!
//! Fetches the backlog from Jira, embeds it, generates refinement questions,
//! test cases and quality scores with the configured LLM provider, and
//! publishes the results back as Jira comments.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proref_cli::commands::{self, Context};
use proref_cli::{AppConfig, Paths};
use proref_core::defaults::{RELATED_THRESHOLD, RELATED_TOP_K};
use proref_core::CommentPublisher;
use proref_db::Database;
use proref_inference::{
    embedding_backend, generation_backend, Embedder, ModelTask, QualityScorer, QuestionGenerator,
    TestCaseGenerator,
};
use proref_jira::JiraClient;
use proref_search::{format_related_summary, RelatedQuery};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str =
    "proref=info,proref_cli=info,proref_core=info,proref_db=info,proref_search=info,proref_inference=info,proref_jira=info";

#[derive(Parser)]
#[command(name = "proref")]
#[command(author, version, about = "ProRef - product refinement automation assistant")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the backlog from Jira and reconcile it with the local database
    Fetch,

    /// Generate embeddings for all tickets
    Embed,

    /// Generate refinement questions for pending tickets
    Questions {
        /// Post each result to Jira right after generation
        #[arg(short, long)]
        publish: bool,
    },

    /// Generate test cases for pending tickets
    Testcases {
        /// Post each result to Jira right after generation
        #[arg(short, long)]
        publish: bool,
    },

    /// List tickets similar to a ticket
    Related {
        /// Ticket key, e.g. PROJ-123
        key: String,

        /// Minimum cosine similarity
        #[arg(short, long, default_value_t = RELATED_THRESHOLD)]
        threshold: f32,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value_t = RELATED_TOP_K)]
        top_k: usize,
    },

    /// Score ticket quality (one ticket, or every unscored ticket)
    Score {
        /// Ticket key; omit to score all unscored tickets
        key: Option<String>,
    },

    /// Show ticket and publication counters
    Status,

    /// Publish pending generated content to Jira
    Publish {
        /// Preview pending content without posting
        #[arg(long)]
        dry_run: bool,
    },

    /// Mark a ticket's changed content as reviewed
    Review {
        /// Ticket key
        key: String,
    },

    /// Queue a ticket for regeneration (both kinds unless one is chosen)
    Reset {
        /// Ticket key
        key: String,

        /// Reset refinement questions
        #[arg(long)]
        questions: bool,

        /// Reset test cases
        #[arg(long)]
        tests: bool,
    },
}

fn init_tracing() {
    // LOG_FORMAT - "json" or "text" (default: "text")
    // RUST_LOG   - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Shutdown signal flipped by Ctrl-C. Retry backoff and batch loops watch it.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(subsystem = "cli", "Interrupt received, finishing current item");
            let _ = tx.send(true);
        }
    });
    rx
}

fn jira_client(config: &AppConfig, shutdown: &watch::Receiver<bool>) -> anyhow::Result<JiraClient> {
    let client = JiraClient::new(config.jira.clone())
        .context("Jira is not configured")?
        .with_shutdown(shutdown.clone());
    Ok(client)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let paths = Paths::from_env();
    let config = AppConfig::load(&paths.config_file)
        .await
        .with_context(|| format!("Failed to load {}", paths.config_file.display()))?;

    info!(
        subsystem = "cli",
        data_dir = %paths.data_dir.display(),
        provider = %config.inference.ai_provider,
        "Starting proref"
    );

    let db = Database::connect(&paths.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", paths.database_url))?;
    db.migrate().await.context("Failed to run migrations")?;

    let shutdown = shutdown_signal();
    let ctx = Context::new(db, paths, shutdown.clone());

    match cli.command {
        Commands::Fetch => {
            println!("Fetching tickets from Jira...");
            let jira = jira_client(&config, &shutdown)?;
            let report = commands::fetch(&ctx, &jira).await?;
            println!("\nDone! {}", report);
        }
        Commands::Embed => {
            println!("Generating embeddings for tickets...");
            let embedder = Embedder::new(embedding_backend(&config.inference)?)
                .with_shutdown(shutdown.clone());
            let report = commands::embed(&ctx, &embedder).await?;
            println!("\nDone! {}", report);
        }
        Commands::Questions { publish } => {
            let generator =
                QuestionGenerator::new(generation_backend(&config.inference, ModelTask::Questions)?);
            let jira = if publish {
                Some(jira_client(&config, &shutdown)?)
            } else {
                None
            };
            let publisher = jira.as_ref().map(|j| j as &dyn CommentPublisher);
            let report = commands::questions(&ctx, &generator, publisher).await?;
            println!(
                "\nDone! {}. Questions saved to {}",
                report,
                ctx.paths.questions_file().display()
            );
        }
        Commands::Testcases { publish } => {
            let generator =
                TestCaseGenerator::new(generation_backend(&config.inference, ModelTask::TestCases)?);
            let jira = if publish {
                Some(jira_client(&config, &shutdown)?)
            } else {
                None
            };
            let publisher = jira.as_ref().map(|j| j as &dyn CommentPublisher);
            let report = commands::test_cases(&ctx, &generator, publisher).await?;
            println!(
                "\nDone! {}. Test cases saved to {}",
                report,
                ctx.paths.test_cases_file().display()
            );
        }
        Commands::Related {
            key,
            threshold,
            top_k,
        } => {
            let query = RelatedQuery::default()
                .with_threshold(threshold)
                .with_top_k(top_k);
            let related = commands::related(&ctx, &key, query).await?;
            println!("{}", format_related_summary(&related));
        }
        Commands::Score { key } => {
            let scorer = QualityScorer::new(generation_backend(&config.inference, ModelTask::Questions)?);
            let report = commands::score(&ctx, &scorer, key.as_deref()).await?;
            println!("\nDone! {}", report);
        }
        Commands::Status => {
            let report = commands::status(&ctx).await?;
            println!("\n{}\n", report);
        }
        Commands::Publish { dry_run } => {
            let jira = if dry_run {
                None
            } else {
                Some(jira_client(&config, &shutdown)?)
            };
            let publisher = jira.as_ref().map(|j| j as &dyn CommentPublisher);
            let report = commands::publish(&ctx, publisher).await?;
            println!("\nDone! {}", report);
        }
        Commands::Review { key } => {
            commands::review(&ctx, &key).await?;
            println!("Marked {} as reviewed.", key);
        }
        Commands::Reset {
            key,
            questions,
            tests,
        } => {
            commands::reset(&ctx, &key, questions, tests).await?;
            println!("{} queued for regeneration.", key);
        }
    }

    Ok(())
}
