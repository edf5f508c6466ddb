//! SQLite persistence for raw series and analysis results.
//!
//! Both tables hold one row per instrument:
//! - `raw_series`: the prepared feature series as a JSON blob
//! - `analysed_results`: the latest classification
//!
//! Writes are upserts keyed by instrument id. The connection sits behind a
//! mutex, so a write for one instrument never interleaves with another write.

use crate::error::StoreError;
use crate::types::{ClassificationResult, CompositeSignal, DateRange, FeatureSeries, RsiSignal};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A stored raw series with its bookkeeping columns.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSeries {
    pub instrument_id: String,
    pub range: DateRange,
    pub series: FeatureSeries,
    pub last_updated: DateTime<Utc>,
}

/// A stored classification with its last write time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub result: ClassificationResult,
    pub last_updated: DateTime<Utc>,
}

/// SQLite store for raw series and classification results.
pub struct ResultStore {
    conn: Mutex<Connection>,
}

impl ResultStore {
    /// Open (or create) a store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("Result store opened at {}", path.as_ref().display());
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory result store initialized");
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS raw_series (
                instrument_id TEXT PRIMARY KEY,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                raw_data TEXT NOT NULL,
                last_updated INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS analysed_results (
                instrument_id TEXT PRIMARY KEY,
                analysis_date TEXT NOT NULL,
                open_price REAL NOT NULL,
                high_price REAL NOT NULL,
                low_price REAL NOT NULL,
                close_price REAL NOT NULL,
                trading_volume INTEGER NOT NULL,
                moving_averages TEXT NOT NULL,
                volume_averages TEXT NOT NULL,
                rsi_values TEXT NOT NULL,
                rsi_short_value REAL NOT NULL,
                rsi_medium_value REAL NOT NULL,
                condition1_met INTEGER NOT NULL,
                condition2_met INTEGER NOT NULL,
                volume_condition_met INTEGER NOT NULL,
                volume_hits TEXT NOT NULL,
                rsi_short_signal TEXT NOT NULL,
                rsi_medium_signal TEXT NOT NULL,
                composite_signal TEXT NOT NULL,
                analysis_text TEXT NOT NULL,
                last_updated INTEGER NOT NULL
            );",
        )?;

        Ok(())
    }

    // ========== Writes ==========

    /// Insert or replace the raw series for an instrument.
    pub fn upsert_raw(
        &self,
        instrument_id: &str,
        range: DateRange,
        series: &FeatureSeries,
    ) -> Result<(), StoreError> {
        let id = normalize_id(instrument_id)?;
        let conn = self.lock()?;
        write_raw(&conn, id, range, series)?;
        debug!("Upserted raw series for {} ({} rows)", id, series.len());
        Ok(())
    }

    /// Insert or replace the classification for an instrument.
    pub fn upsert_result(
        &self,
        instrument_id: &str,
        result: &ClassificationResult,
    ) -> Result<(), StoreError> {
        let id = normalize_id(instrument_id)?;
        let conn = self.lock()?;
        write_result(&conn, id, result)?;
        debug!("Upserted analysis result for {}", id);
        Ok(())
    }

    /// Upsert the raw series and the classification in one transaction.
    pub fn persist_analysis(
        &self,
        instrument_id: &str,
        range: DateRange,
        series: &FeatureSeries,
        result: &ClassificationResult,
    ) -> Result<(), StoreError> {
        let id = normalize_id(instrument_id)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_raw(&tx, id, range, series)?;
        write_result(&tx, id, result)?;
        tx.commit()?;
        debug!("Persisted analysis for {}", id);
        Ok(())
    }

    /// Remove both rows for an instrument. Returns whether anything was deleted.
    pub fn delete(&self, instrument_id: &str) -> Result<bool, StoreError> {
        let id = normalize_id(instrument_id)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let raw = tx.execute("DELETE FROM raw_series WHERE instrument_id = ?1", params![id])?;
        let results = tx.execute(
            "DELETE FROM analysed_results WHERE instrument_id = ?1",
            params![id],
        )?;
        tx.commit()?;
        Ok(raw + results > 0)
    }

    // ========== Reads ==========

    /// Get the stored raw series for an instrument.
    pub fn get_raw(&self, instrument_id: &str) -> Result<Option<StoredSeries>, StoreError> {
        let id = normalize_id(instrument_id)?;
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT instrument_id, start_date, end_date, raw_data, last_updated
                 FROM raw_series WHERE instrument_id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((instrument_id, start, end, raw_data, last_updated)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredSeries {
            instrument_id,
            range: DateRange::new(parse_date(&start)?, parse_date(&end)?),
            series: serde_json::from_str(&raw_data)?,
            last_updated: parse_millis(last_updated)?,
        }))
    }

    /// Get the stored classification for an instrument.
    pub fn get_result(&self, instrument_id: &str) -> Result<Option<StoredResult>, StoreError> {
        let id = normalize_id(instrument_id)?;
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT instrument_id, analysis_date, open_price, high_price, low_price,
                        close_price, trading_volume, moving_averages, volume_averages,
                        rsi_values, rsi_short_value, rsi_medium_value, condition1_met,
                        condition2_met, volume_condition_met, volume_hits, rsi_short_signal,
                        rsi_medium_signal, composite_signal, analysis_text, last_updated
                 FROM analysed_results WHERE instrument_id = ?1",
                params![id],
                |row| {
                    Ok(ResultRow {
                        instrument_id: row.get(0)?,
                        analysis_date: row.get(1)?,
                        open: row.get(2)?,
                        high: row.get(3)?,
                        low: row.get(4)?,
                        close: row.get(5)?,
                        volume: row.get(6)?,
                        moving_averages: row.get(7)?,
                        volume_averages: row.get(8)?,
                        rsi_values: row.get(9)?,
                        rsi_short: row.get(10)?,
                        rsi_medium: row.get(11)?,
                        condition1: row.get(12)?,
                        condition2: row.get(13)?,
                        volume_condition: row.get(14)?,
                        volume_hits: row.get(15)?,
                        rsi_short_signal: row.get(16)?,
                        rsi_medium_signal: row.get(17)?,
                        composite: row.get(18)?,
                        summary: row.get(19)?,
                        last_updated: row.get(20)?,
                    })
                },
            )
            .optional()?;

        row.map(ResultRow::into_stored).transpose()
    }

    /// Instruments with a stored result, sorted.
    pub fn list_instruments(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT instrument_id FROM analysed_results ORDER BY instrument_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Total rows in the results table.
    pub fn result_count(&self) -> Result<usize, StoreError> {
        self.count("SELECT COUNT(*) FROM analysed_results")
    }

    /// Total rows in the raw series table.
    pub fn raw_count(&self) -> Result<usize, StoreError> {
        self.count("SELECT COUNT(*) FROM raw_series")
    }

    fn count(&self, sql: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn write_raw(
    conn: &Connection,
    id: &str,
    range: DateRange,
    series: &FeatureSeries,
) -> Result<(), StoreError> {
    let raw_data = serde_json::to_string(series)?;

    conn.execute(
        "INSERT INTO raw_series (instrument_id, start_date, end_date, raw_data, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(instrument_id) DO UPDATE SET
            start_date = excluded.start_date,
            end_date = excluded.end_date,
            raw_data = excluded.raw_data,
            last_updated = excluded.last_updated",
        params![
            id,
            range.start.format(DATE_FORMAT).to_string(),
            range.end.format(DATE_FORMAT).to_string(),
            raw_data,
            Utc::now().timestamp_millis(),
        ],
    )?;

    Ok(())
}

fn write_result(
    conn: &Connection,
    id: &str,
    result: &ClassificationResult,
) -> Result<(), StoreError> {
    let volume = i64::try_from(result.volume)
        .map_err(|_| StoreError::VolumeOutOfRange(result.volume))?;

    conn.execute(
        "INSERT INTO analysed_results
         (instrument_id, analysis_date, open_price, high_price, low_price, close_price,
          trading_volume, moving_averages, volume_averages, rsi_values, rsi_short_value,
          rsi_medium_value, condition1_met, condition2_met, volume_condition_met, volume_hits,
          rsi_short_signal, rsi_medium_signal, composite_signal, analysis_text, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21)
         ON CONFLICT(instrument_id) DO UPDATE SET
            analysis_date = excluded.analysis_date,
            open_price = excluded.open_price,
            high_price = excluded.high_price,
            low_price = excluded.low_price,
            close_price = excluded.close_price,
            trading_volume = excluded.trading_volume,
            moving_averages = excluded.moving_averages,
            volume_averages = excluded.volume_averages,
            rsi_values = excluded.rsi_values,
            rsi_short_value = excluded.rsi_short_value,
            rsi_medium_value = excluded.rsi_medium_value,
            condition1_met = excluded.condition1_met,
            condition2_met = excluded.condition2_met,
            volume_condition_met = excluded.volume_condition_met,
            volume_hits = excluded.volume_hits,
            rsi_short_signal = excluded.rsi_short_signal,
            rsi_medium_signal = excluded.rsi_medium_signal,
            composite_signal = excluded.composite_signal,
            analysis_text = excluded.analysis_text,
            last_updated = excluded.last_updated",
        params![
            id,
            result.analysis_date.format(DATE_FORMAT).to_string(),
            result.open,
            result.high,
            result.low,
            result.close,
            volume,
            serde_json::to_string(&result.close_ma)?,
            serde_json::to_string(&result.volume_ma)?,
            serde_json::to_string(&result.rsi)?,
            result.rsi_short,
            result.rsi_medium,
            result.condition1,
            result.condition2,
            result.volume_condition,
            serde_json::to_string(&result.volume_hits)?,
            result.rsi_short_signal.label(),
            result.rsi_medium_signal.label(),
            result.composite.label(),
            result.summary,
            Utc::now().timestamp_millis(),
        ],
    )?;

    Ok(())
}

/// Column values of one `analysed_results` row before decoding.
struct ResultRow {
    instrument_id: String,
    analysis_date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
    moving_averages: String,
    volume_averages: String,
    rsi_values: String,
    rsi_short: f64,
    rsi_medium: f64,
    condition1: bool,
    condition2: bool,
    volume_condition: bool,
    volume_hits: String,
    rsi_short_signal: String,
    rsi_medium_signal: String,
    composite: String,
    summary: String,
    last_updated: i64,
}

impl ResultRow {
    fn into_stored(self) -> Result<StoredResult, StoreError> {
        let volume = u64::try_from(self.volume)
            .map_err(|_| StoreError::Corrupt(format!("negative volume {}", self.volume)))?;

        let result = ClassificationResult {
            analysis_date: parse_date(&self.analysis_date)?,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume,
            close_ma: serde_json::from_str(&self.moving_averages)?,
            volume_ma: serde_json::from_str(&self.volume_averages)?,
            rsi: serde_json::from_str(&self.rsi_values)?,
            rsi_short: self.rsi_short,
            rsi_medium: self.rsi_medium,
            condition1: self.condition1,
            condition2: self.condition2,
            volume_condition: self.volume_condition,
            volume_hits: serde_json::from_str(&self.volume_hits)?,
            rsi_short_signal: parse_rsi_signal(&self.rsi_short_signal)?,
            rsi_medium_signal: parse_rsi_signal(&self.rsi_medium_signal)?,
            composite: CompositeSignal::from_label(&self.composite).ok_or_else(|| {
                StoreError::Corrupt(format!("composite signal {:?}", self.composite))
            })?,
            summary: self.summary,
            instrument_id: self.instrument_id,
        };

        Ok(StoredResult {
            result,
            last_updated: parse_millis(self.last_updated)?,
        })
    }
}

fn normalize_id(instrument_id: &str) -> Result<&str, StoreError> {
    let id = instrument_id.trim();
    if id.is_empty() {
        return Err(StoreError::InvalidInstrument(instrument_id.to_string()));
    }
    Ok(id)
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("date {:?}: {}", s, e)))
}

fn parse_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {}", ms)))
}

fn parse_rsi_signal(s: &str) -> Result<RsiSignal, StoreError> {
    RsiSignal::from_label(s).ok_or_else(|| StoreError::Corrupt(format!("RSI signal {:?}", s)))
}
