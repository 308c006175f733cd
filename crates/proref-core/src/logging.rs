//! Structured logging field name constants for proref.
//!
//! All crates use these names for `tracing` fields so that log output can be
//! filtered by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Operation gave up (retries exhausted, storage unavailable) |
//! | WARN  | Recoverable issue, retry or fallback applied |
//! | INFO  | Batch start/finish, per-ticket outcomes |
//! | DEBUG | Decision points (reconcile branch, endpoint choice) |
//! | TRACE | Per-item iteration, similarity scores |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "search", "inference", "jira", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "tickets", "embeddings", "openai", "retry"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "reconcile", "save_embedding", "find_related", "post_comment"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// External tracker key of the ticket being operated on.
pub const TICKET_KEY: &str = "ticket_key";

/// Generated content kind ("questions", "test_cases").
pub const CONTENT_KIND: &str = "content_kind";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned.
pub const RESULT_COUNT: &str = "result_count";

/// Attempt number inside a retry loop (1-based).
pub const ATTEMPT: &str = "attempt";

/// Delay before the next attempt, in milliseconds.
pub const DELAY_MS: &str = "delay_ms";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Reconciliation outcome ("inserted", "updated", "skipped").
pub const OUTCOME: &str = "outcome";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
