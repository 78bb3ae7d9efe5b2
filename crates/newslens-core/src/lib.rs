/// Core library for the newslens political-bias scoring service.
///
/// This crate contains all business logic: configuration management, error
/// types, the LLM scoring client, the composite score engine, progress
/// tracking, the response cache, the SQLite storage layer, and the
/// reanalysis orchestrator that ties them together.
pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod progress;
pub mod scoring;
pub mod storage;

pub use error::*;

/// Returns the version of the newslens-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
