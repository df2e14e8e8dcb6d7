//! # depmap-cache
//!
//! File fingerprinting and the incremental-analysis cache.
//!
//! A cache entry records one full run: per-file fingerprints, the per-file
//! extractions and the assembled result. On the next run the planner
//! classifies every file as `reuse`, `reanalyze`, `new` or `dropped`; when
//! the change ratio stays under the safety threshold only the changed files
//! are re-extracted and the rest is replayed from the entry.
//!
//! The store is the orchestrator's private resource: workers may read a
//! loaded entry, only the orchestrator writes, and writes happen after the
//! parallel phase (atomic rename keeps concurrent readers safe).

mod fingerprint;
mod incremental;
mod store;

pub use fingerprint::{content_digest, FileFingerprint};
pub use incremental::{plan_incremental, IncrementalPlan, SAFETY_THRESHOLD};
pub use store::{CacheEntry, CacheStats, CacheStore, IndexRecord, DEFAULT_TTL_DAYS};
