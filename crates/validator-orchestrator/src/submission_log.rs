//! Append-only JSON submission log (spec §4.I / §6 persisted state).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use validator_types::Uid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionLogEntry {
    pub timestamp: String,
    pub tx_hash: String,
    pub version_key: u64,
    pub weights: BTreeMap<Uid, u16>,
}

pub struct SubmissionLog {
    path: PathBuf,
}

impl SubmissionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends `entry` to the JSON array at `path`, rewriting the whole file
    /// through a temp-file-then-rename swap so a crash mid-write never
    /// corrupts previously logged submissions. Never propagated as a
    /// pipeline failure (spec §7 item 6): callers log and move on.
    pub fn append(&self, entry: SubmissionLogEntry) {
        if let Err(err) = self.try_append(entry) {
            warn!(error = %err, path = %self.path.display(), "failed to write submission log entry");
        }
    }

    fn try_append(&self, entry: SubmissionLogEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut entries = self.read_existing().unwrap_or_default();
        entries.push(entry);

        let json = serde_json::to_vec_pretty(&entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn read_existing(&self) -> Option<Vec<SubmissionLogEntry>> {
        let bytes = fs::read(&self.path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    #[cfg(test)]
    pub fn read_all(&self) -> Vec<SubmissionLogEntry> {
        self.read_existing().unwrap_or_default()
    }
}

pub fn path_for_workdir(workdir: &Path) -> PathBuf {
    workdir.join("weights").join("weights_history.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(version_key: u64) -> SubmissionLogEntry {
        SubmissionLogEntry {
            timestamp: "2026-07-28T00:00:00Z".to_string(),
            tx_hash: "0xabc".to_string(),
            version_key,
            weights: [(0u16, 100u16)].into_iter().collect(),
        }
    }

    #[test]
    fn appends_accumulate_across_calls() {
        let dir = std::env::temp_dir().join(format!("sublog-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let log = SubmissionLog::new(dir.join("weights_history.json"));

        log.append(sample_entry(1));
        log.append(sample_entry(2));

        let all = log.read_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].version_key, 1);
        assert_eq!(all[1].version_key, 2);

        let _ = fs::remove_dir_all(&dir);
    }
}
