//! Session export - writes billed sessions to file
//!
//! Each record is written as one export row in JSONL format (one JSON
//! object per line) to the file specified in config. The file holds one
//! run's sessions and is replaced on every export. Spreadsheet conversion
//! happens downstream.

use crate::domain::session::SessionRecord;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Export writer for session records
pub struct SessionExporter {
    file_path: String,
}

impl SessionExporter {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "export_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write all records, returning how many rows were written.
    ///
    /// An empty slice writes nothing and leaves no file behind.
    pub fn write_records(&self, records: &[SessionRecord]) -> std::io::Result<usize> {
        if records.is_empty() {
            warn!(file_path = %self.file_path, "export_skipped_no_sessions");
            return Ok(0);
        }

        let mut lines = Vec::with_capacity(records.len());
        for record in records {
            let row = record.to_export_row();
            lines.push(serde_json::to_string(&row).map_err(std::io::Error::other)?);
        }

        match self.write_lines(&lines) {
            Ok(()) => {
                let total_fee: u64 = records.iter().map(|r| r.fee).sum();
                info!(
                    file_path = %self.file_path,
                    rows = %lines.len(),
                    total_fee = %total_fee,
                    "sessions_exported"
                );
                Ok(lines.len())
            }
            Err(e) => {
                error!(file_path = %self.file_path, error = %e, "session_export_failed");
                Err(e)
            }
        }
    }

    fn write_lines(&self, lines: &[String]) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        for line in lines {
            writeln!(file, "{}", line)?;
        }
        debug!(file = %self.file_path, rows = %lines.len(), "export_written");

        Ok(())
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::new_uuid_v7;
    use crate::domain::types::{SlotKey, SlotNumber};
    use chrono::{Duration, TimeZone, Utc};
    use std::fs;
    use tempfile::tempdir;

    fn record(slot: u32, minutes: i64, fee: u64) -> SessionRecord {
        let entry = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        SessionRecord {
            session_id: new_uuid_v7(),
            slot_key: SlotKey::new(slot as i64 * 100, 20),
            slot_number: SlotNumber(slot),
            entry_time: entry,
            exit_time: entry + Duration::minutes(minutes),
            duration_minutes: minutes as f64,
            fee,
        }
    }

    #[test]
    fn test_write_records() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("out").join("sessions.jsonl");
        let exporter = SessionExporter::new(file_path.to_str().unwrap());

        let written = exporter.write_records(&[record(1, 7, 4000), record(2, 12, 6000)]).unwrap();
        assert_eq!(written, 2);

        let content = fs::read_to_string(&file_path).unwrap();
        let rows: Vec<serde_json::Value> =
            content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["slot"], 1);
        assert_eq!(rows[0]["entry"], "2025-06-01 08:00:00");
        assert_eq!(rows[0]["exit"], "2025-06-01 08:07:00");
        assert_eq!(rows[0]["duration_minutes"], 7.0);
        assert_eq!(rows[1]["fee"], 6000);
    }

    #[test]
    fn test_empty_export_writes_nothing() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("sessions.jsonl");
        let exporter = SessionExporter::new(file_path.to_str().unwrap());

        assert_eq!(exporter.write_records(&[]).unwrap(), 0);
        assert!(!file_path.exists());
    }

    #[test]
    fn test_second_run_replaces_previous_rows() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("sessions.jsonl");
        let exporter = SessionExporter::new(file_path.to_str().unwrap());

        exporter.write_records(&[record(1, 7, 4000), record(2, 12, 6000)]).unwrap();
        exporter.write_records(&[record(3, 3, 2000)]).unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        let rows: Vec<serde_json::Value> =
            content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["slot"], 3);
    }
}
