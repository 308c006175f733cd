//! # proref-core
//!
//! Core types, traits, and resilience primitives for proref.
//!
//! This crate provides the data structures and trait definitions that the
//! storage, search, inference, and tracker crates depend on.

pub mod defaults;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod models;
pub mod retry;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use fingerprint::compute_content_hash;
pub use models::*;
pub use retry::{RetryPolicy, RetryPredicate};
pub use traits::*;
