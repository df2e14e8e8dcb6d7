//! Large-tree streaming support: size estimation, batching and the memory
//! monitor backing the soft ceiling.

use std::path::PathBuf;

use sysinfo::{Pid, System};
use tracing::{debug, warn};

/// File count above which the streamed path is taken.
pub const LARGE_TREE_THRESHOLD: usize = 1_000;
/// File count above which optional passes (call-cycle detection, quality
/// metrics) are skipped. Import-cycle detection always runs.
pub const VERY_LARGE_TREE_THRESHOLD: usize = 5_000;
/// Files per batch on the streamed path.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Smallest batch the streamer will shrink to under memory pressure.
pub const MIN_BATCH_SIZE: usize = 10;
/// Per-file byte cap; larger files are skipped with a warning.
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
/// Fraction of the ceiling at which reclamation starts.
const MEMORY_PRESSURE_FRACTION: f64 = 0.8;

#[derive(Debug, Default)]
pub struct SizeEstimate {
    pub total_files: usize,
    pub total_bytes: u64,
    /// Files over the per-file cap, excluded from analysis.
    pub oversized: Vec<PathBuf>,
}

/// Stat every candidate file; unreadable files count as zero bytes and stay
/// in the list (extraction will record their read error).
pub fn estimate_tree(files: &[PathBuf], max_file_size: u64) -> SizeEstimate {
    let mut estimate = SizeEstimate {
        total_files: files.len(),
        ..SizeEstimate::default()
    };
    for file in files {
        let size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
        if size > max_file_size {
            warn!(file = %file.display(), size, "file exceeds per-file cap, skipping");
            estimate.oversized.push(file.clone());
        } else {
            estimate.total_bytes += size;
        }
    }
    estimate
}

/// Resident-set probe for the streamer's soft ceiling.
pub struct MemoryMonitor {
    system: System,
    pid: Option<Pid>,
    ceiling_bytes: u64,
    peak_bytes: u64,
}

impl MemoryMonitor {
    pub fn new(max_memory_mb: usize) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if pid.is_none() {
            warn!("cannot determine own pid; memory ceiling checks disabled");
        }
        Self {
            system: System::new(),
            pid,
            ceiling_bytes: max_memory_mb as u64 * 1024 * 1024,
            peak_bytes: 0,
        }
    }

    /// Current resident-set size in bytes; 0 when probing is unavailable.
    pub fn rss(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        self.system.refresh_process(pid);
        let rss = self
            .system
            .process(pid)
            .map(|process| process.memory())
            .unwrap_or(0);
        self.peak_bytes = self.peak_bytes.max(rss);
        rss
    }

    /// True when RSS exceeds 80 % of the configured ceiling.
    pub fn is_critical(&mut self) -> bool {
        let rss = self.rss();
        let threshold = (self.ceiling_bytes as f64 * MEMORY_PRESSURE_FRACTION) as u64;
        let critical = rss > threshold;
        if critical {
            debug!(rss, threshold, "memory pressure");
        }
        critical
    }

    pub fn peak(&self) -> u64 {
        self.peak_bytes
    }
}
