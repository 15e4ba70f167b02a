//! Core engine for AI-evaluated mock interviews: resilient storage with a
//! three-tier backend chain (Postgres, SQLite, flat files), typed
//! repositories over a schemaless record contract, an LLM evaluation
//! service that degrades to deterministic output, the interview session
//! state machine, and admin reporting.

pub mod admin;
pub mod config;
pub mod errors;
pub mod evaluation;
pub mod llm_client;
pub mod models;
pub mod repos;
pub mod session;
pub mod store;

pub use config::Config;
pub use errors::CoreError;
