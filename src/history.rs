// src/history.rs
//
// Bounded processing history persisted as one JSON file. Inserting past the
// cap evicts the oldest entry and deletes its artifact directory; writes go
// through a temp file and rename so a crash never leaves a torn file.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::types::{FusionResult, TranscriptSegment};

/// On-disk artifacts belonging to one processed video. The whole
/// `output_dir` is removed when the entry is evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub output_dir: PathBuf,
    pub processed_clip: Option<PathBuf>,
    pub sequence_clips: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub video_id: String,
    pub fusion: FusionResult,
    pub transcript: Vec<TranscriptSegment>,
    pub frame_count: u64,
    pub artifacts: ArtifactSet,
    pub processing_secs: f64,
    pub processed_at: DateTime<Utc>,
}

pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries,
            lock: Mutex::new(()),
        }
    }

    fn read_entries(&self) -> Result<Vec<HistoryEntry>, PipelineError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map_err(|e| PipelineError::Storage(format!("corrupt history file: {}", e)))
    }

    fn write_entries(&self, entries: &[HistoryEntry]) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| PipelineError::Storage(format!("failed to serialize history: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Inserts an entry, evicting oldest entries beyond the cap. Returns the
    /// ids of the evicted videos. Eviction ties on timestamp break toward
    /// the lexicographically smaller video id.
    pub fn save(&self, entry: HistoryEntry) -> Result<Vec<String>, PipelineError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PipelineError::Storage("history lock poisoned".to_string()))?;

        let mut entries = self.read_entries()?;
        entries.retain(|e| e.video_id != entry.video_id);
        entries.push(entry);

        let mut removed = Vec::new();
        while entries.len() > self.max_entries {
            let oldest = entries
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    (a.processed_at, &a.video_id).cmp(&(b.processed_at, &b.video_id))
                })
                .map(|(i, _)| i);
            let Some(index) = oldest else { break };
            removed.push(entries.remove(index));
        }

        // Persist first; artifact directories go only once the file no
        // longer references them, so a failed write keeps both in place.
        self.write_entries(&entries)?;

        let mut evicted = Vec::new();
        for entry in removed {
            if let Err(e) = std::fs::remove_dir_all(&entry.artifacts.output_dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "⚠️ failed to delete artifacts for evicted '{}': {}",
                        entry.video_id, e
                    );
                }
            }
            info!("🗑️ evicted history entry '{}'", entry.video_id);
            evicted.push(entry.video_id);
        }
        Ok(evicted)
    }

    pub fn load(&self, video_id: &str) -> Result<Option<HistoryEntry>, PipelineError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PipelineError::Storage("history lock poisoned".to_string()))?;
        Ok(self
            .read_entries()?
            .into_iter()
            .find(|e| e.video_id == video_id))
    }

    /// All entries, newest first.
    pub fn list(&self) -> Result<Vec<HistoryEntry>, PipelineError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PipelineError::Storage("history lock poisoned".to_string()))?;
        let mut entries = self.read_entries()?;
        entries.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AggregateScores, DetectionMode, FusionResult, TextScore, Verdict,
    };
    use chrono::TimeZone;
    use std::path::Path;

    fn entry(id: &str, minute: u32, output_dir: &Path) -> HistoryEntry {
        HistoryEntry {
            video_id: id.to_string(),
            fusion: FusionResult {
                mode: DetectionMode::Violence,
                text_score: TextScore {
                    harmful: 0.1,
                    safe: 0.9,
                    highlighted: String::new(),
                },
                visual_score: AggregateScores::default(),
                combined_harmful_score: 0.2,
                verdict: Verdict::Safe,
                confidence: 0.8,
            },
            transcript: Vec::new(),
            frame_count: 100,
            artifacts: ArtifactSet {
                output_dir: output_dir.to_path_buf(),
                processed_clip: None,
                sequence_clips: Vec::new(),
            },
            processing_secs: 1.5,
            processed_at: Utc.with_ymd_and_hms(2026, 8, 25, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"), 5);
        assert!(store.list().unwrap().is_empty());
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"), 5);
        let artifacts = dir.path().join("v1");

        let evicted = store.save(entry("v1", 0, &artifacts)).unwrap();
        assert!(evicted.is_empty());

        let loaded = store.load("v1").unwrap().unwrap();
        assert_eq!(loaded.video_id, "v1");
        assert_eq!(loaded.frame_count, 100);
    }

    #[test]
    fn test_eviction_removes_oldest_and_its_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"), 2);

        let oldest_dir = dir.path().join("old");
        std::fs::create_dir_all(&oldest_dir).unwrap();
        std::fs::write(oldest_dir.join("clip.gif"), b"gif").unwrap();

        store.save(entry("old", 0, &oldest_dir)).unwrap();
        store.save(entry("mid", 1, &dir.path().join("mid"))).unwrap();
        let evicted = store.save(entry("new", 2, &dir.path().join("new"))).unwrap();

        assert_eq!(evicted, vec!["old".to_string()]);
        assert!(!oldest_dir.exists());

        let remaining = store.list().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].video_id, "new");
        assert_eq!(remaining[1].video_id, "mid");
    }

    #[test]
    fn test_eviction_tie_breaks_on_video_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"), 2);

        store.save(entry("bbb", 0, &dir.path().join("bbb"))).unwrap();
        store.save(entry("aaa", 0, &dir.path().join("aaa"))).unwrap();
        let evicted = store.save(entry("ccc", 1, &dir.path().join("ccc"))).unwrap();

        assert_eq!(evicted, vec!["aaa".to_string()]);
    }

    #[test]
    fn test_failed_write_keeps_evicted_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::new(&path, 1);

        let old_dir = dir.path().join("old");
        std::fs::create_dir_all(&old_dir).unwrap();
        std::fs::write(old_dir.join("clip.gif"), b"gif").unwrap();
        store.save(entry("old", 0, &old_dir)).unwrap();

        // A directory squatting on the temp path makes the replace fail.
        std::fs::create_dir_all(path.with_extension("json.tmp")).unwrap();
        let result = store.save(entry("new", 1, &dir.path().join("new")));
        assert!(result.is_err());

        // The persisted history still lists "old" and its artifacts remain.
        std::fs::remove_dir_all(path.with_extension("json.tmp")).unwrap();
        assert!(store.load("old").unwrap().is_some());
        assert!(old_dir.join("clip.gif").exists());
    }

    #[test]
    fn test_write_is_complete_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::new(&path, 5);

        store.save(entry("v1", 0, &dir.path().join("v1"))).unwrap();
        store.save(entry("v2", 1, &dir.path().join("v2"))).unwrap();

        // No temp file left behind and the file is valid JSON on its own.
        assert!(!path.with_extension("json.tmp").exists());
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<HistoryEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_resave_replaces_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"), 5);

        store.save(entry("v1", 0, &dir.path().join("v1"))).unwrap();
        let mut updated = entry("v1", 5, &dir.path().join("v1"));
        updated.frame_count = 200;
        store.save(updated).unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].frame_count, 200);
    }
}
