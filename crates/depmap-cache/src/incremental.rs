//! Incremental analysis planning.
//!
//! Given a prior cache entry and the current file list, classify every file
//! as reusable, changed, new or dropped. When too much of the tree changed
//! the partial-merge bookkeeping costs more than it saves, so the plan is
//! declared unsafe and the caller falls back to a full run.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::debug;

use crate::store::CacheEntry;

/// Change ratio above which an incremental plan is discarded.
pub const SAFETY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncrementalPlan {
    /// Present in both runs, fingerprint unchanged.
    pub reuse: Vec<String>,
    /// Present in both runs, fingerprint changed.
    pub reanalyze: Vec<String>,
    /// Only in the current file list.
    pub new: Vec<String>,
    /// Only in the cache (removed from disk).
    pub dropped: Vec<String>,
}

impl IncrementalPlan {
    /// Files that must go through extraction this run.
    pub fn files_to_extract(&self) -> Vec<PathBuf> {
        self.reanalyze
            .iter()
            .chain(self.new.iter())
            .map(PathBuf::from)
            .collect()
    }

    /// A plan is safe when at most [`SAFETY_THRESHOLD`] of the current tree
    /// needs re-extraction.
    pub fn is_safe(&self, current_count: usize) -> bool {
        if current_count == 0 {
            return false;
        }
        let changed = self.reanalyze.len() + self.new.len();
        (changed as f64 / current_count as f64) <= SAFETY_THRESHOLD
    }
}

pub fn plan_incremental(entry: &CacheEntry, current_files: &[PathBuf]) -> IncrementalPlan {
    let current: BTreeSet<String> = current_files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    let mut plan = IncrementalPlan::default();

    for (path, fingerprint) in &entry.fingerprints {
        if !current.contains(path) {
            plan.dropped.push(path.clone());
        } else if fingerprint.is_outdated() {
            plan.reanalyze.push(path.clone());
        } else {
            plan.reuse.push(path.clone());
        }
    }

    for path in &current {
        if !entry.fingerprints.contains_key(path) {
            plan.new.push(path.clone());
        }
    }

    debug!(
        reuse = plan.reuse.len(),
        reanalyze = plan.reanalyze.len(),
        new = plan.new.len(),
        dropped = plan.dropped.len(),
        "incremental plan computed"
    );
    plan
}
