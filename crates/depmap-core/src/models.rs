//! The five-level data model: Package → Module → Class → Method → Field,
//! plus the relationships and cycle records built on top of it.
//!
//! All types serialize with `serde`; enum variants use their lowercase
//! textual names in JSON. Entities are created once by extraction or
//! integration and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::options::AnalysisOptions;

/// Kinds of dependencies between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Import,
    Inheritance,
    Call,
    AttributeAccess,
    Reference,
    Composition,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DependencyKind::Import => "import",
            DependencyKind::Inheritance => "inheritance",
            DependencyKind::Call => "call",
            DependencyKind::AttributeAccess => "attribute_access",
            DependencyKind::Reference => "reference",
            DependencyKind::Composition => "composition",
        };
        f.write_str(name)
    }
}

/// How an import statement was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportKind {
    #[serde(rename = "plain_import")]
    Plain,
    #[serde(rename = "from_import")]
    From,
}

/// One import statement as it appears in a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Target module dotted name (`os.path` in `from os.path import join`).
    pub module: String,
    /// Imported symbol for `from` imports (`join` above).
    pub name: Option<String>,
    /// Local alias, if any (`import numpy as np`).
    pub alias: Option<String>,
    pub line_number: usize,
    #[serde(rename = "variant")]
    pub kind: ImportKind,
    /// True when the import level is non-zero (`from . import x`).
    pub is_relative: bool,
}

/// A class attribute or instance attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub id: String,
    pub name: String,
    pub class_id: String,
    pub line_number: usize,
    pub file_path: String,
    pub type_annotation: Option<String>,
    pub default_value: Option<String>,
    /// True iff the assignment's nearest enclosing scope is the class body.
    pub is_class_variable: bool,
}

/// A method or module-level function. Functions are methods with no owning
/// class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub id: String,
    pub name: String,
    pub line_number: usize,
    pub file_path: String,
    /// `None` for module-level functions.
    pub class_id: Option<String>,
    /// Positional parameter names only.
    pub args: Vec<String>,
    pub return_annotation: Option<String>,
    pub decorators: Vec<String>,
    pub is_method: bool,
    pub is_static: bool,
    pub is_class_method: bool,
    pub is_property: bool,
    /// Cyclomatic complexity, base 1.
    pub complexity: u32,
    /// Cognitive complexity: branch points weighted by nesting depth.
    pub cognitive_complexity: u32,
    /// Maximum nesting depth of the body.
    pub nesting_depth: usize,
    /// Source lines spanned by the definition.
    pub lines_of_code: usize,
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: String,
    pub name: String,
    pub module_id: String,
    pub line_number: usize,
    pub file_path: String,
    /// Base-class names as written in the source, unresolved.
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    /// Owned method ids, in source order.
    pub methods: Vec<String>,
    /// Owned field ids, in source order.
    pub fields: Vec<String>,
    pub is_abstract: bool,
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub id: String,
    /// Dotted module name (`app.models.user`).
    pub name: String,
    pub file_path: String,
    pub package_id: Option<String>,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub imports: Vec<ImportRecord>,
    /// Lines of code in the source file.
    pub loc: usize,
    pub docstring: Option<String>,
}

impl ModuleInfo {
    /// A bare descriptor for a module whose source could not be analysed,
    /// or one contributed by a secondary import source.
    pub fn descriptor(id: String, name: String, file_path: String) -> Self {
        Self {
            id,
            name,
            file_path,
            package_id: None,
            classes: Vec::new(),
            functions: Vec::new(),
            imports: Vec::new(),
            loc: 0,
            docstring: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub id: String,
    pub name: String,
    pub path: String,
    /// Child module ids, in first-seen order.
    pub modules: Vec<String>,
    /// Direct sub-package ids, in first-seen order.
    pub sub_packages: Vec<String>,
}

/// A directed, tagged edge between two entities.
///
/// `to_entity` may be an unresolved textual name when integration could not
/// bind it; such edges are preserved, not dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub from_entity: String,
    pub to_entity: String,
    #[serde(rename = "variant")]
    pub kind: DependencyKind,
    pub line_number: usize,
    pub file_path: String,
    pub strength: f64,
}

/// Which relation a cycle was detected over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleKind {
    Import,
    Call,
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleKind::Import => f.write_str("import"),
            CycleKind::Call => f.write_str("call"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One intra-SCC edge in a reported cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "variant")]
    pub kind: DependencyKind,
    pub strength: f64,
    pub file_path: Option<String>,
    pub line_number: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    /// Number of entities in the SCC.
    pub length: usize,
    pub edge_count: usize,
    pub average_strength: f64,
    pub total_coupling: f64,
}

/// A strongly-connected component of size ≥ 2, or a self-loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclicDependency {
    pub id: String,
    /// SCC members in discovery order.
    pub entities: Vec<String>,
    /// Every intra-SCC edge.
    pub paths: Vec<CycleEdge>,
    #[serde(rename = "variant")]
    pub kind: CycleKind,
    pub severity: Severity,
    pub metrics: CycleMetrics,
    pub description: String,
}

/// Everything extracted from a single source file.
///
/// A file that fails to parse still produces an analysis: the module
/// descriptor is present, the entity lists are empty and `parse_error`
/// carries the parser diagnostic. This is non-fatal to the rest of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub file_path: String,
    pub module: ModuleInfo,
    pub classes: Vec<ClassInfo>,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
    pub relationships: Vec<Relationship>,
    pub parse_error: Option<String>,
}

/// The integrated five-level graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub packages: Vec<PackageInfo>,
    pub modules: Vec<ModuleInfo>,
    pub classes: Vec<ClassInfo>,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
}

impl DependencyGraph {
    pub fn module_by_id(&self, id: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub fn class_by_id(&self, id: &str) -> Option<&ClassInfo> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn contains_entity(&self, id: &str) -> bool {
        self.packages.iter().any(|p| p.id == id)
            || self.modules.iter().any(|m| m.id == id)
            || self.classes.iter().any(|c| c.id == id)
            || self.methods.iter().any(|m| m.id == id)
            || self.fields.iter().any(|f| f.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub packages: usize,
    pub modules: usize,
    pub classes: usize,
    pub methods: usize,
    pub fields: usize,
    pub relationships: usize,
    pub cycles: usize,
}

/// The five entity kinds of the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Package,
    Module,
    Class,
    Method,
    Field,
}

/// Afferent/efferent coupling for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouplingMetrics {
    /// Incoming dependency count (Ca).
    pub afferent_coupling: usize,
    /// Outgoing dependency count (Ce).
    pub efferent_coupling: usize,
    /// Instability I = Ce / (Ca + Ce); 0 when isolated.
    pub instability: f64,
}

/// Lack-of-cohesion measures for one class, derived from which fields each
/// method reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohesionMetrics {
    /// Method pairs sharing no field.
    pub lcom1: usize,
    /// `max(0, P − Q)`: non-sharing pairs minus sharing pairs.
    pub lcom2: usize,
    /// Henderson-Sellers LCOM: `(m − Σ|methods(f)|/f) / (m − 1)`.
    pub lcom3: f64,
    /// Tight class cohesion: share-connected pairs over all pairs.
    pub tcc: f64,
}

/// Letter grade summarising an entity's quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    F,
}

/// Per-entity quality record, reported for modules and classes when quality
/// metrics are enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub entity_id: String,
    pub entity_type: EntityKind,
    /// Average cyclomatic complexity of the owned methods, rounded.
    pub cyclomatic_complexity: u32,
    /// Average cognitive complexity of the owned methods, rounded.
    pub cognitive_complexity: u32,
    /// Deepest nesting among the owned methods.
    pub nesting_depth: usize,
    pub lines_of_code: usize,
    pub afferent_coupling: usize,
    pub efferent_coupling: usize,
    /// I = Ce / (Ca + Ce).
    pub instability: f64,
    /// A = abstract classes / total classes (for a class: 1 or 0).
    pub abstractness: f64,
    /// Distance from the main sequence, D = |A + I − 1|.
    pub distance: f64,
    /// Present for classes only.
    pub cohesion: Option<CohesionMetrics>,
    /// MI = max(0, 171 − 0.23·CC − 16.2·ln(LOC)).
    pub maintainability_index: f64,
    /// min(1, CC/10 + Ce/20); lower is better.
    pub technical_debt_ratio: f64,
    pub quality_grade: QualityGrade,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub entity_counts: EntityCounts,
    /// Per-method cyclomatic complexity; populated when quality metrics are
    /// enabled.
    pub complexity: BTreeMap<String, u32>,
    /// Per-entity coupling; populated when quality metrics are enabled.
    pub coupling: BTreeMap<String, CouplingMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: String,
    /// RFC 3339 timestamp of the run. Volatile: excluded from determinism
    /// comparisons.
    pub analyzed_at: String,
    pub total_files: usize,
    pub analysis_duration_seconds: f64,
    pub analyzer_version: String,
    pub analysis_options: AnalysisOptions,
}

/// Complete analysis result for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: String,
    pub project_info: ProjectInfo,
    pub dependency_graph: DependencyGraph,
    pub relationships: Vec<Relationship>,
    pub cycles: Vec<CyclicDependency>,
    pub metrics: AnalysisMetrics,
    /// Per-module and per-class quality records; empty when quality metrics
    /// are disabled.
    pub quality_metrics: Vec<QualityMetrics>,
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    pub fn entity_counts(&self) -> EntityCounts {
        EntityCounts {
            packages: self.dependency_graph.packages.len(),
            modules: self.dependency_graph.modules.len(),
            classes: self.dependency_graph.classes.len(),
            methods: self.dependency_graph.methods.len(),
            fields: self.dependency_graph.fields.len(),
            relationships: self.relationships.len(),
            cycles: self.cycles.len(),
        }
    }

    pub fn relationships_of_kind(&self, kind: DependencyKind) -> Vec<&Relationship> {
        self.relationships.iter().filter(|r| r.kind == kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_kind_serializes_lowercase() {
        let json = serde_json::to_string(&DependencyKind::AttributeAccess).unwrap();
        assert_eq!(json, "\"attribute_access\"");
        let json = serde_json::to_string(&DependencyKind::Import).unwrap();
        assert_eq!(json, "\"import\"");
    }

    #[test]
    fn test_import_kind_wire_names() {
        assert_eq!(serde_json::to_string(&ImportKind::Plain).unwrap(), "\"plain_import\"");
        assert_eq!(serde_json::to_string(&ImportKind::From).unwrap(), "\"from_import\"");
    }

    #[test]
    fn test_relationship_kind_serializes_under_the_variant_member() {
        let rel = Relationship {
            id: "rel:mod:a->mod:b:import".into(),
            from_entity: "mod:a".into(),
            to_entity: "mod:b".into(),
            kind: DependencyKind::Import,
            line_number: 1,
            file_path: "a.py".into(),
            strength: 1.0,
        };
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["variant"], "import");
        assert_eq!(json["from_entity"], "mod:a");
    }

    #[test]
    fn test_quality_grade_wire_names_are_letters() {
        assert_eq!(serde_json::to_string(&QualityGrade::A).unwrap(), "\"A\"");
        assert_eq!(serde_json::to_string(&QualityGrade::F).unwrap(), "\"F\"");
        assert!(QualityGrade::A < QualityGrade::B);
    }

    #[test]
    fn test_entity_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EntityKind::Module).unwrap(), "\"module\"");
        assert_eq!(serde_json::to_string(&EntityKind::Class).unwrap(), "\"class\"");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
    }

    #[test]
    fn test_cycle_kind_display_matches_serde() {
        assert_eq!(CycleKind::Import.to_string(), "import");
        assert_eq!(serde_json::to_string(&CycleKind::Import).unwrap(), "\"import\"");
    }

    #[test]
    fn test_graph_lookup() {
        let mut graph = DependencyGraph::default();
        graph.modules.push(ModuleInfo::descriptor(
            "mod:a".into(),
            "a".into(),
            "a.py".into(),
        ));
        assert!(graph.contains_entity("mod:a"));
        assert!(!graph.contains_entity("mod:b"));
        assert_eq!(graph.module_by_id("mod:a").map(|m| m.name.as_str()), Some("a"));
    }
}
