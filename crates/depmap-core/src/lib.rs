//! # depmap-core
//!
//! Shared contracts for the depmap dependency analyser: the five-level
//! entity model (Package → Module → Class → Method → Field), relationship
//! and cycle records, the identifier scheme, analysis options, the progress
//! contract and the error taxonomy.
//!
//! This crate holds data and invariants only; extraction, integration and
//! orchestration live in the sibling crates.

pub mod cancel;
pub mod error;
pub mod ids;
pub mod models;
pub mod options;
pub mod progress;

pub use cancel::CancellationToken;
pub use error::{AnalyzeError, AnalyzeResult};
pub use models::{
    AnalysisMetrics, AnalysisResult, ClassInfo, CohesionMetrics, CouplingMetrics, CycleEdge,
    CycleKind, CycleMetrics, CyclicDependency, DependencyGraph, DependencyKind, EntityCounts,
    EntityKind, FieldInfo, FileAnalysis, ImportKind, ImportRecord, MethodInfo, ModuleInfo,
    PackageInfo, ProjectInfo, QualityGrade, QualityMetrics, Relationship, Severity,
};
pub use options::{AnalysisLevel, AnalysisOptions, DEFAULT_EXCLUDES};
pub use progress::{AnalysisStage, NullSink, ProgressSink, ProgressUpdate};
