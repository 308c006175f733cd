//! # proref-search
//!
//! Related-ticket search for proref.
//!
//! This crate provides:
//! - Cosine similarity over `f32` embeddings
//! - Brute-force nearest-neighbour search over the embedding store
//! - Plain-text summaries of related tickets
//!
//! ## Example
//!
//! ```ignore
//! use proref_search::{RelatedQuery, RelatedTicketFinder};
//!
//! let finder = RelatedTicketFinder::new(db.embeddings.clone());
//! let related = finder
//!     .find_related("PROJ-42", RelatedQuery::default().with_top_k(3))
//!     .await?;
//! ```

pub mod related;
pub mod similarity;

pub use related::{format_related_summary, RelatedQuery, RelatedTicketFinder};
pub use similarity::cosine_similarity;
