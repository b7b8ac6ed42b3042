//! The persisted weekly summary table.
//!
//! The table lives in a single CSV file with a fixed header. Every update is a
//! locked read-modify-write: load the table, replace the row for one period,
//! re-sort, and atomically swap the file, so replaying a week never disturbs
//! the other weeks.

use chrono::NaiveDate;
use csv::WriterBuilder;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::artifact;
use crate::error::PipelineError;
use crate::weekly::{WEEKLY_SUMMARY_COLUMNS, WeeklySummary};

/// Weekly summaries, unique by `period` and sorted ascending by it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeeklySummaryTable {
    rows: Vec<WeeklySummary>,
}

impl WeeklySummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[WeeklySummary] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, period: NaiveDate) -> Option<&WeeklySummary> {
        self.rows.iter().find(|r| r.period == period)
    }

    /// Inserts `summary`, replacing any row with the same period.
    pub fn upsert(&mut self, summary: WeeklySummary) {
        self.rows.retain(|r| r.period != summary.period);
        self.rows.push(summary);
        self.rows.sort_by_key(|r| r.period);
    }

    /// Parses a table from CSV, validating the header and row uniqueness.
    ///
    /// `path` is only used to label errors.
    pub fn from_csv<R: Read>(reader: R, path: &Path) -> Result<Self, PipelineError> {
        let mut rdr = csv::Reader::from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| PipelineError::corrupt(path, format!("unreadable header: {e}")))?
            .clone();

        let missing: Vec<&str> = WEEKLY_SUMMARY_COLUMNS
            .iter()
            .copied()
            .filter(|column| !headers.iter().any(|h| h == *column))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::corrupt(
                path,
                format!("missing column(s): {}", missing.join(", ")),
            ));
        }

        if let Some(extra) = headers
            .iter()
            .find(|&h| !WEEKLY_SUMMARY_COLUMNS.contains(&h))
        {
            return Err(PipelineError::corrupt(
                path,
                format!("unexpected column '{extra}'"),
            ));
        }

        let mut rows = Vec::new();
        let mut seen = HashSet::new();

        for result in rdr.deserialize::<WeeklySummary>() {
            let record = result.map_err(|e| PipelineError::corrupt(path, e.to_string()))?;
            if !seen.insert(record.period) {
                return Err(PipelineError::corrupt(
                    path,
                    format!("duplicate period {}", record.period),
                ));
            }
            rows.push(record);
        }

        rows.sort_by_key(|r| r.period);
        Ok(Self { rows })
    }

    /// Writes the header and every row in table order.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

        writer.write_record(WEEKLY_SUMMARY_COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Owner of the weekly summary CSV artifact.
///
/// Upserts through one store are serialized; share the store (e.g. in an
/// `Arc`) between tasks that write the same file.
#[derive(Debug)]
pub struct WeeklySummaryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl WeeklySummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current table. A missing file is an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CorruptArtifact`] if the file exists but does
    /// not match the summary schema.
    pub fn load(&self) -> Result<WeeklySummaryTable, PipelineError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No summary table yet, starting empty");
                return Ok(WeeklySummaryTable::new());
            }
            Err(e) => return Err(PipelineError::io(&self.path, e)),
        };

        WeeklySummaryTable::from_csv(file, &self.path)
    }

    /// Replaces the row for `summary.period` and persists the whole table.
    ///
    /// Running this twice with the same summary leaves the file unchanged
    /// after the first run. Returns the table as written.
    #[tracing::instrument(skip_all, fields(period = %summary.period, path = %self.path.display()))]
    pub async fn upsert(&self, summary: WeeklySummary) -> Result<WeeklySummaryTable, PipelineError> {
        let _guard = self.lock.lock().await;

        let mut table = self.load()?;
        let replaced = table.get(summary.period).is_some();
        table.upsert(summary);
        self.persist(&table)?;

        info!(rows = table.len(), replaced, "Weekly summary table updated");
        Ok(table)
    }

    fn persist(&self, table: &WeeklySummaryTable) -> Result<(), PipelineError> {
        let mut buf = Vec::new();
        table
            .write_csv(&mut buf)
            .map_err(|e| PipelineError::io(&self.path, io::Error::other(e)))?;
        artifact::write_atomic(&self.path, &buf)
    }
}
