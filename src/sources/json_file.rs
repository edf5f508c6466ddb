//! Bars from `<dir>/<instrument>.json` files.

use super::BarSource;
use crate::error::SourceError;
use crate::types::{Bar, DateRange};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads a JSON array of bars per instrument from a directory.
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, instrument_id: &str) -> Option<PathBuf> {
        let id = instrument_id.trim();
        let safe = !id.is_empty()
            && !id.contains(&['/', '\\'][..])
            && id != "."
            && id != "..";
        safe.then(|| self.dir.join(format!("{}.json", id)))
    }
}

impl BarSource for JsonFileSource {
    fn fetch(&self, instrument_id: &str, range: DateRange) -> Result<Vec<Bar>, SourceError> {
        let path = self
            .path_for(instrument_id)
            .filter(|p| p.is_file())
            .ok_or_else(|| SourceError::NotFound(instrument_id.to_string()))?;

        let contents = fs::read_to_string(&path)?;
        let bars: Vec<Bar> = serde_json::from_str(&contents)?;
        let total = bars.len();

        let bars: Vec<Bar> = bars.into_iter().filter(|b| range.contains(b.date)).collect();
        debug!(
            "Loaded {} of {} bars for {} from {}",
            bars.len(),
            total,
            instrument_id,
            path.display()
        );

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn write_bars(dir: &Path, id: &str, bars: &[Bar]) {
        fs::write(
            dir.join(format!("{}.json", id)),
            serde_json::to_string(bars).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_fetch_filters_to_range() {
        let dir = tempfile::tempdir().unwrap();
        let bars: Vec<Bar> = (1..=10)
            .map(|d| Bar::new(day(d), 1.0, 1.0, 1.0, 1.0, 10))
            .collect();
        write_bars(dir.path(), "2330", &bars);

        let source = JsonFileSource::new(dir.path());
        let fetched = source.fetch("2330", DateRange::new(day(3), day(5))).unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].date, day(3));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonFileSource::new(dir.path());
        let err = source
            .fetch("0050", DateRange::new(day(1), day(2)))
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn test_path_like_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonFileSource::new(dir.path());
        let err = source
            .fetch("../etc/passwd", DateRange::new(day(1), day(2)))
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn test_malformed_file_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2330.json"), "{not json").unwrap();
        let source = JsonFileSource::new(dir.path());
        let err = source
            .fetch("2330", DateRange::new(day(1), day(2)))
            .unwrap_err();
        assert!(matches!(err, SourceError::SerdeJson(_)));
    }
}
