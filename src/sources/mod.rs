//! Bar sources.
//!
//! Fetching from a market data vendor happens outside this crate; anything
//! that can hand over daily bars implements [`BarSource`].

pub mod json_file;

pub use json_file::JsonFileSource;

use crate::error::SourceError;
use crate::types::{Bar, DateRange};

/// Supplies daily bars for an instrument.
pub trait BarSource: Send + Sync {
    /// Bars for `instrument_id` within `range`, in any order. An empty vector
    /// means the source has no data for that window.
    fn fetch(&self, instrument_id: &str, range: DateRange) -> Result<Vec<Bar>, SourceError>;
}
