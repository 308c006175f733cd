//! OpenAI inference backend.
//!
//! Serves both embeddings (`/embeddings`) and chat completions
//! (`/chat/completions`). Ticket embeddings always come from this backend,
//! whichever provider generates text.
//!
//! # Example
//!
//! ```rust,no_run
//! use proref_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use proref_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         api_key: "sk-...".to_string(),
//!         ..Default::default()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!     let vectors = backend.embed_texts(&["Login page".to_string()]).await.unwrap();
//!     assert_eq!(vectors[0].len(), backend.dimension());
//! }
//! ```

mod backend;
pub mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_EMBED_MODEL, DEFAULT_GEN_MODEL, DEFAULT_OPENAI_URL,
};
