//! Session history log.
//!
//! Finished session summaries are appended to a JSONL (JSON Lines) file with
//! file locking so that several counters can share one data directory. Only
//! summaries are kept; counter state itself is never persisted.

use crate::{Result, SessionSummary};
use chrono::{Duration, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append-only log of finished sessions
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    /// Create a log handle for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The log file inside a data directory
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("sessions.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, summary: &SessionSummary) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(summary)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended session {} to history", summary.id);
        Ok(())
    }
}

/// Read every summary in a history file, oldest first
///
/// Corrupted lines are logged and skipped.
pub fn read_summaries(path: &Path) -> Result<Vec<SessionSummary>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut summaries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SessionSummary>(&line) {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                tracing::warn!("Failed to parse session at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} sessions from history", summaries.len());
    Ok(summaries)
}

/// Sessions finished within the last `days` days, newest first
///
/// A window reaching past the representable calendar covers all history.
pub fn load_recent(path: &Path, days: i64) -> Result<Vec<SessionSummary>> {
    let cutoff = Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window));
    let mut recent: Vec<_> = read_summaries(path)?
        .into_iter()
        .filter(|s| cutoff.map_or(true, |cutoff| s.finished_at >= cutoff))
        .collect();
    recent.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
    Ok(recent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JointTriplet;
    use uuid::Uuid;

    fn create_test_summary(age_days: i64, count: f64) -> SessionSummary {
        let finished_at = Utc::now() - Duration::days(age_days);
        SessionSummary {
            id: Uuid::new_v4(),
            started_at: finished_at - Duration::minutes(5),
            finished_at,
            joint: JointTriplet::default(),
            count,
            whole_reps: count as u32,
            frames: 300,
            processed: 280,
            no_person: 20,
            missing_landmark: 0,
            cues: 12,
            resets: 0,
        }
    }

    #[test]
    fn test_append_and_read_single_summary() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::in_data_dir(temp_dir.path());

        let summary = create_test_summary(0, 10.0);
        log.append(&summary).unwrap();

        let summaries = read_summaries(log.path()).unwrap();
        assert_eq!(summaries, vec![summary]);
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let summaries = read_summaries(&temp_dir.path().join("nope.jsonl")).unwrap();
        assert!(summaries.is_empty());
    }

    #[test]
    fn test_corrupted_lines_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::in_data_dir(temp_dir.path());
        log.append(&create_test_summary(0, 3.0)).unwrap();

        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        writeln!(file, "{{ partial").unwrap();

        log.append(&create_test_summary(0, 4.0)).unwrap();

        let summaries = read_summaries(log.path()).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].count, 4.0);
    }

    #[test]
    fn test_load_recent_filters_and_orders() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::in_data_dir(temp_dir.path());

        log.append(&create_test_summary(10, 1.0)).unwrap();
        log.append(&create_test_summary(2, 2.0)).unwrap();
        log.append(&create_test_summary(1, 3.0)).unwrap();

        let recent = load_recent(log.path(), 7).unwrap();
        let counts: Vec<f64> = recent.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![3.0, 2.0]);
    }

    #[test]
    fn test_load_recent_huge_window_returns_everything() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::in_data_dir(temp_dir.path());

        log.append(&create_test_summary(400, 1.0)).unwrap();
        log.append(&create_test_summary(0, 2.0)).unwrap();

        for days in [1_000_000_000, i64::MAX] {
            let recent = load_recent(log.path(), days).unwrap();
            let counts: Vec<f64> = recent.iter().map(|s| s.count).collect();
            assert_eq!(counts, vec![2.0, 1.0]);
        }
    }
}
