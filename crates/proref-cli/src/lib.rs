//! # proref-cli
//!
//! Command implementations and configuration loading for the `proref`
//! binary. The binary in `main.rs` parses arguments, builds the backends
//! and dispatches here.

pub mod commands;
pub mod config;
pub mod export;

pub use commands::{BatchReport, Context, FetchReport, StatusReport};
pub use config::{AppConfig, Paths};
