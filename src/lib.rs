//! Signalbook - daily technical analysis with a persistent result store

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use config::{AnalysisConfig, Config, ZeroLossPolicy};
pub use error::{AnalysisError, SourceError, StoreError};
pub use services::{Analysis, Analyzer, ResultStore};
pub use sources::{BarSource, JsonFileSource};
pub use types::*;
