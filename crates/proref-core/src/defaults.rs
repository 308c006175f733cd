//! Centralized default constants for proref.
//!
//! Crates reference these instead of defining their own magic numbers.

// =============================================================================
// EMBEDDING
// =============================================================================

/// Dimension of every stored ticket embedding (text-embedding-3-small).
pub const EMBEDDING_DIMENSION: usize = 1536;

/// Texts longer than this many characters are truncated before embedding
/// (roughly 8k tokens).
pub const EMBED_MAX_CHARS: usize = 30_000;

// =============================================================================
// RELATED TICKETS
// =============================================================================

/// Minimum cosine similarity for a ticket to count as related.
pub const RELATED_THRESHOLD: f32 = 0.8;

/// Maximum number of related tickets returned.
pub const RELATED_TOP_K: usize = 5;

// =============================================================================
// RETRY
// =============================================================================

/// Attempts made by the default retry policy.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff delay of the default retry policy, in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 1_000;

/// Backoff multiplier of the default retry policy.
pub const RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Initial backoff delay for comment publishing, in milliseconds.
pub const PUBLISH_RETRY_INITIAL_DELAY_MS: u64 = 2_000;

/// Upper bound on a single backoff wait, in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 3_600;

// =============================================================================
// QUALITY SCORING
// =============================================================================

/// Lowest valid quality score.
pub const QUALITY_SCORE_MIN: u8 = 1;

/// Highest valid quality score.
pub const QUALITY_SCORE_MAX: u8 = 10;

// =============================================================================
// TRACKER
// =============================================================================

/// Maximum issues requested per backlog fetch.
pub const TRACKER_MAX_RESULTS: u32 = 150;

/// Issue type that is never refined.
pub const SPIKE_ISSUE_TYPE: &str = "spike";

/// HTTP request timeout for tracker and LLM calls, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 120;
