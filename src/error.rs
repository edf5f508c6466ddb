use crate::services::Analysis;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors from one instrument's analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No bars supplied for {instrument_id}")]
    EmptySeries { instrument_id: String },

    #[error("Invalid bar on {date}: {reason}")]
    InvalidBar { date: NaiveDate, reason: String },

    #[error("Insufficient history: need {required} rows, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("RSI({period}) average loss is zero at row {index}")]
    DivisionDegenerate { period: usize, index: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid instrument id: {0:?}")]
    InvalidInstrument(String),

    /// The analysis finished but could not be stored. The in-memory result is
    /// kept so the caller can retry the write.
    #[error("Failed to persist analysis for {instrument_id}: {source}")]
    StoreWrite {
        instrument_id: String,
        #[source]
        source: StoreError,
        analysis: Box<Analysis>,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Result store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("Store connection lock poisoned")]
    LockPoisoned,

    #[error("Invalid instrument id: {0:?}")]
    InvalidInstrument(String),

    #[error("Volume {0} does not fit the volume column")]
    VolumeOutOfRange(u64),

    #[error("Corrupt stored row: {0}")]
    Corrupt(String),
}

/// Bar source errors.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No data file for {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
