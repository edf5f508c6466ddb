pub mod analyzer;
pub mod classifier;
pub mod indicators;
pub mod prepare;
pub mod sqlite_store;
pub mod summary;

pub use analyzer::{evaluate, Analysis, Analyzer};
pub use classifier::classify;
pub use indicators::{compute_features, simple_moving_average, smoothed_rsi};
pub use prepare::prepare_series;
pub use sqlite_store::{ResultStore, StoredResult, StoredSeries};
pub use summary::render_summary;
