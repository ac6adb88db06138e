//! Session record persistence.
//!
//! Finished sessions are appended to a JSONL (JSON Lines) file, one record
//! per line, under an exclusive file lock. The sink is fire-and-forget: a
//! failed append is reported to the caller and never retried.

use crate::record::SessionRecord;
use crate::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Storage collaborator that receives finished session records
pub trait RecordSink {
    fn append(&mut self, record: &SessionRecord) -> Result<()>;
}

/// JSONL-based record sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, record: &SessionRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::info!("Appended session {} to {:?}", record.id, self.path);
        Ok(())
    }
}

/// Read every record from a JSONL file, skipping lines that fail to parse
pub fn read_records(path: &Path) -> Result<Vec<SessionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SessionRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse session record at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} session records from {:?}", records.len(), path);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Action, Engine};
    use crate::types::{Outcome, Rhythm};

    fn finished_record(outcome: Outcome) -> SessionRecord {
        let mut engine = Engine::default();
        engine.apply(Action::Start).unwrap();
        engine.apply(Action::SelectRhythm(Rhythm::Vf)).unwrap();
        engine.advance(5);
        engine
            .apply(Action::ConfirmShock { energy_joules: 200 })
            .unwrap();
        engine.end(outcome, "").unwrap()
    }

    #[test]
    fn test_append_and_read_single_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sessions.jsonl");

        let record = finished_record(Outcome::Rosc);
        let mut sink = JsonlSink::new(&path);
        sink.append(&record).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record.id);
        assert_eq!(records[0].shocks().len(), 1);
    }

    #[test]
    fn test_append_multiple_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("sessions.jsonl");

        let mut sink = JsonlSink::new(&path);
        for outcome in [Outcome::Rosc, Outcome::Deceased, Outcome::VaEcmo] {
            sink.append(&finished_record(outcome)).unwrap();
        }

        let outcomes: Vec<_> = read_records(&path)
            .unwrap()
            .into_iter()
            .map(|r| r.outcome)
            .collect();
        assert_eq!(outcomes, vec![Outcome::Rosc, Outcome::Deceased, Outcome::VaEcmo]);
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sessions.jsonl");

        let mut sink = JsonlSink::new(&path);
        sink.append(&finished_record(Outcome::Rosc)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "{{ not json").unwrap();
        }
        sink.append(&finished_record(Outcome::Transferred)).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let records = read_records(&temp_dir.path().join("missing.jsonl")).unwrap();
        assert!(records.is_empty());
    }
}
