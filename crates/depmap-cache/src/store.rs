//! On-disk cache store.
//!
//! One binary entry file per cached run plus a JSON index mapping
//! `cache_id → {project_root, created_at, expires_at, file_count}`. Entry
//! files start with a magic/version header; a bad header, a truncated body
//! or an undecodable payload all yield a clean miss and the entry is
//! removed. Writes go through a temporary file in the cache directory and an
//! atomic rename, so a crashed writer can never leave a half-entry behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use depmap_core::{AnalysisOptions, AnalysisResult, AnalyzeError, AnalyzeResult, FileAnalysis};

use crate::fingerprint::{content_digest, FileFingerprint};

/// `DMAP` + format version.
const ENTRY_MAGIC: &[u8; 8] = b"DMAPCH\x00\x01";
const ENTRY_EXTENSION: &str = "bin";
const INDEX_FILE: &str = "cache_index.json";

/// Default entry lifetime.
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// One cached analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_id: String,
    pub project_root: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Fingerprint per analysed file.
    pub fingerprints: BTreeMap<String, FileFingerprint>,
    /// Per-file extractions, reusable by the incremental path.
    pub file_analyses: Vec<FileAnalysis>,
    /// The assembled result of the cached run.
    pub result: AnalysisResult,
}

impl CacheEntry {
    pub fn new(
        cache_id: String,
        project_root: String,
        fingerprints: BTreeMap<String, FileFingerprint>,
        file_analyses: Vec<FileAnalysis>,
        result: AnalysisResult,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            cache_id,
            project_root,
            created_at,
            expires_at: Some(created_at + Duration::days(DEFAULT_TTL_DAYS)),
            fingerprints,
            file_analyses,
            result,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub project_root: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub file_count: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    entries: BTreeMap<String, IndexRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
}

pub struct CacheStore {
    dir: PathBuf,
    max_bytes: u64,
    index: CacheIndex,
}

impl CacheStore {
    /// Open (creating if needed) a cache directory. A corrupt index is
    /// discarded; expired entries are removed up front.
    pub fn open(dir: impl Into<PathBuf>, max_size_mb: u64) -> AnalyzeResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| AnalyzeError::Cache(format!("cannot create cache dir: {e}")))?;

        let index_path = dir.join(INDEX_FILE);
        let index = match fs::read(&index_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(error = %e, "cache index corrupt, starting empty");
                CacheIndex::default()
            }),
            Err(_) => CacheIndex::default(),
        };

        let mut store = Self {
            dir,
            max_bytes: max_size_mb * 1024 * 1024,
            index,
        };
        store.remove_expired();
        Ok(store)
    }

    /// Deterministic cache id for a project + option set.
    pub fn cache_id(project_root: &Path, options: &AnalysisOptions) -> String {
        let root = fs::canonicalize(project_root)
            .unwrap_or_else(|_| project_root.to_path_buf());
        let material = format!(
            "{}\n{}",
            root.to_string_lossy(),
            options.cache_key_material()
        );
        content_digest(material.as_bytes())[..16].to_string()
    }

    /// Load an entry; any corruption is a miss and removes the entry.
    pub fn load(&mut self, cache_id: &str) -> Option<CacheEntry> {
        if !self.index.entries.contains_key(cache_id) {
            return None;
        }
        let path = self.entry_path(cache_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => {
                debug!(cache_id, "index entry without file, dropping");
                self.remove(cache_id);
                return None;
            }
        };
        if bytes.len() < ENTRY_MAGIC.len() || &bytes[..ENTRY_MAGIC.len()] != ENTRY_MAGIC {
            warn!(cache_id, "cache entry header mismatch, dropping");
            self.remove(cache_id);
            return None;
        }
        match bincode::deserialize::<CacheEntry>(&bytes[ENTRY_MAGIC.len()..]) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(cache_id, error = %e, "cache entry undecodable, dropping");
                self.remove(cache_id);
                None
            }
        }
    }

    /// Persist an entry atomically and update the index.
    pub fn save(&mut self, entry: &CacheEntry) -> AnalyzeResult<()> {
        self.enforce_size_budget();

        let payload = bincode::serialize(entry)
            .map_err(|e| AnalyzeError::Cache(format!("cannot encode cache entry: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| AnalyzeError::Cache(format!("cannot create temp file: {e}")))?;
        tmp.write_all(ENTRY_MAGIC)
            .and_then(|_| tmp.write_all(&payload))
            .map_err(|e| AnalyzeError::Cache(format!("cannot write cache entry: {e}")))?;
        tmp.persist(self.entry_path(&entry.cache_id))
            .map_err(|e| AnalyzeError::Cache(format!("cannot persist cache entry: {e}")))?;

        self.index.entries.insert(
            entry.cache_id.clone(),
            IndexRecord {
                project_root: entry.project_root.clone(),
                created_at: entry.created_at,
                expires_at: entry.expires_at,
                file_count: entry.fingerprints.len(),
            },
        );
        self.save_index();
        Ok(())
    }

    pub fn invalidate(&mut self, cache_id: &str) {
        self.remove(cache_id);
    }

    pub fn clear(&mut self) {
        let ids: Vec<String> = self.index.entries.keys().cloned().collect();
        for id in ids {
            self.remove(&id);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.index.entries.len(),
            total_bytes: self.entry_files().iter().map(|(_, size, _)| size).sum(),
            max_bytes: self.max_bytes,
        }
    }

    fn remove(&mut self, cache_id: &str) {
        self.index.entries.remove(cache_id);
        let path = self.entry_path(cache_id);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!(cache_id, error = %e, "failed to remove cache entry file");
            }
        }
        self.save_index();
    }

    fn remove_expired(&mut self) {
        let now = Utc::now();
        let expired: Vec<String> = self
            .index
            .entries
            .iter()
            .filter(|(_, record)| record.expires_at.is_some_and(|at| at < now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            debug!(cache_id = %id, "removing expired cache entry");
            self.remove(&id);
        }
    }

    /// Least-recently-used eviction against the byte budget; oldest entry
    /// files go first.
    fn enforce_size_budget(&mut self) {
        let mut files = self.entry_files();
        let mut total: u64 = files.iter().map(|(_, size, _)| size).sum();
        if total <= self.max_bytes {
            return;
        }
        files.sort_by_key(|(_, _, mtime)| *mtime);
        for (id, size, _) in files {
            if total <= self.max_bytes {
                break;
            }
            debug!(cache_id = %id, "evicting cache entry for size budget");
            self.remove(&id);
            total = total.saturating_sub(size);
        }
    }

    /// `(cache_id, size, mtime)` for every entry file on disk.
    fn entry_files(&self) -> Vec<(String, u64, std::time::SystemTime)> {
        let Ok(reader) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut files = Vec::new();
        for dent in reader.flatten() {
            let path = dent.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(metadata) = dent.metadata() else {
                continue;
            };
            let mtime = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
            files.push((stem.to_string(), metadata.len(), mtime));
        }
        files
    }

    fn entry_path(&self, cache_id: &str) -> PathBuf {
        self.dir.join(format!("{cache_id}.{ENTRY_EXTENSION}"))
    }

    fn save_index(&self) {
        let path = self.dir.join(INDEX_FILE);
        match serde_json::to_vec_pretty(&self.index) {
            Ok(bytes) => {
                if let Err(e) = fs::write(&path, bytes) {
                    warn!(error = %e, "failed to write cache index");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode cache index"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depmap_core::{AnalysisMetrics, DependencyGraph, ProjectInfo};

    fn empty_result(analysis_id: &str) -> AnalysisResult {
        AnalysisResult {
            analysis_id: analysis_id.to_string(),
            project_info: ProjectInfo {
                name: "p".into(),
                path: "/p".into(),
                analyzed_at: "2026-01-01T00:00:00Z".into(),
                total_files: 0,
                analysis_duration_seconds: 0.0,
                analyzer_version: "0.0.0".into(),
                analysis_options: AnalysisOptions::default(),
            },
            dependency_graph: DependencyGraph::default(),
            relationships: Vec::new(),
            cycles: Vec::new(),
            metrics: AnalysisMetrics::default(),
            quality_metrics: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn entry(id: &str) -> CacheEntry {
        CacheEntry::new(
            id.to_string(),
            "/p".to_string(),
            BTreeMap::new(),
            Vec::new(),
            empty_result("run"),
        )
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CacheStore::open(dir.path(), 100).unwrap();
        store.save(&entry("abc123")).unwrap();

        let loaded = store.load("abc123").expect("entry present");
        assert_eq!(loaded.cache_id, "abc123");
        assert_eq!(loaded.project_root, "/p");
        assert!(store.load("missing").is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_clean_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CacheStore::open(dir.path(), 100).unwrap();
        store.save(&entry("abc123")).unwrap();

        fs::write(dir.path().join("abc123.bin"), b"garbage").unwrap();
        assert!(store.load("abc123").is_none());
        // Removed on the failed load.
        assert!(!dir.path().join("abc123.bin").exists());
    }

    #[test]
    fn test_corrupt_index_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = CacheStore::open(dir.path(), 100).unwrap();
            store.save(&entry("abc123")).unwrap();
        }
        fs::write(dir.path().join(INDEX_FILE), b"{not json").unwrap();
        let mut store = CacheStore::open(dir.path(), 100).unwrap();
        assert!(store.load("abc123").is_none());
    }

    #[test]
    fn test_expired_entries_are_dropped_at_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = CacheStore::open(dir.path(), 100).unwrap();
            let mut stale = entry("old111");
            stale.expires_at = Some(Utc::now() - Duration::days(1));
            store.save(&stale).unwrap();
        }
        let mut store = CacheStore::open(dir.path(), 100).unwrap();
        assert!(store.load("old111").is_none());
    }

    #[test]
    fn test_cache_id_is_deterministic_and_option_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let options = AnalysisOptions::default();
        let a = CacheStore::cache_id(dir.path(), &options);
        let b = CacheStore::cache_id(dir.path(), &options);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        let changed = AnalysisOptions {
            max_workers: options.max_workers + 1,
            ..options
        };
        assert_ne!(a, CacheStore::cache_id(dir.path(), &changed));
    }

    #[test]
    fn test_persisted_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = CacheStore::open(dir.path(), 100).unwrap();
            store.save(&entry("keepme")).unwrap();
        }
        let mut store = CacheStore::open(dir.path(), 100).unwrap();
        assert!(store.load("keepme").is_some());
        assert_eq!(store.stats().entry_count, 1);
    }

    #[test]
    fn test_size_budget_evicts_older_entries() {
        let dir = tempfile::tempdir().unwrap();
        // A zero budget forces eviction of whatever is already on disk
        // before each write.
        let mut store = CacheStore::open(dir.path(), 0).unwrap();
        store.save(&entry("first0")).unwrap();
        store.save(&entry("second")).unwrap();
        assert!(store.load("first0").is_none());
        assert!(store.load("second").is_some());
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CacheStore::open(dir.path(), 100).unwrap();
        store.save(&entry("gone")).unwrap();
        store.invalidate("gone");
        assert!(store.load("gone").is_none());
        assert_eq!(store.stats().entry_count, 0);
    }
}
