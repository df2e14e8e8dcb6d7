//! # depmap
//!
//! Five-level dependency analysis for Python source trees: Package →
//! Module → Class → Method → Field, the relationships among them (imports,
//! inheritance, calls, attribute access) and the strongly-connected
//! components they form. Purely static: sources are parsed, never executed.
//!
//! ## Example
//!
//! ```no_run
//! use depmap::{analyze_project, AnalysisOptions};
//! use depmap_core::NullSink;
//! use std::path::Path;
//!
//! let result = analyze_project(
//!     Path::new("./my-project"),
//!     AnalysisOptions::default(),
//!     &NullSink,
//! )?;
//! println!(
//!     "{} modules, {} cycles",
//!     result.dependency_graph.modules.len(),
//!     result.cycles.len()
//! );
//! # Ok::<(), depmap_core::AnalyzeError>(())
//! ```

mod discovery;
mod engine;
mod patterns;
mod streaming;

pub use discovery::{discover_files, SOURCE_EXTENSION};
pub use engine::AnalyzerEngine;
pub use patterns::GitignoreMatcher;
pub use streaming::{
    estimate_tree, MemoryMonitor, SizeEstimate, DEFAULT_BATCH_SIZE, LARGE_TREE_THRESHOLD,
    MAX_FILE_SIZE_BYTES, MIN_BATCH_SIZE, VERY_LARGE_TREE_THRESHOLD,
};

pub use depmap_core::{
    AnalysisLevel, AnalysisOptions, AnalysisResult, AnalysisStage, AnalyzeError, AnalyzeResult,
    CancellationToken, CohesionMetrics, CycleKind, CyclicDependency, DependencyGraph,
    DependencyKind, EntityKind, NullSink, ProgressSink, ProgressUpdate, QualityGrade,
    QualityMetrics, Severity,
};

use std::path::Path;

/// Analyse a project with the given options, reporting progress to `sink`.
pub fn analyze_project(
    root: &Path,
    options: AnalysisOptions,
    sink: &dyn ProgressSink,
) -> AnalyzeResult<AnalysisResult> {
    AnalyzerEngine::new(options).analyze_project(root, sink)
}
