//! # depmap-graph
//!
//! Turns per-file extractions into the global dependency graph: package
//! hierarchy construction, module import edges, best-effort reference
//! resolution, strength refinement, strongly-connected-component detection
//! and metric aggregation.
//!
//! The integrator appends; it never mutates entity records after
//! construction. The cycle detector is the single authoritative source of
//! cycle records.

mod cycles;
mod integrate;
mod metrics;
mod quality;
mod resolve;
mod secondary;
mod strength;

pub use cycles::detect_cycles;
pub use integrate::GraphIntegrator;
pub use metrics::compute_metrics;
pub use quality::compute_quality_metrics;
pub use secondary::{ExternalEdge, ExternalModule, ModuleGraphSource};

#[cfg(test)]
mod tests {
    use super::*;
    use depmap_ast::FileAnalyzer;
    use depmap_core::{
        AnalysisOptions, CycleKind, DependencyKind, FileAnalysis, Severity,
    };

    fn analyze(source: &str, file: &str, module: &str) -> FileAnalysis {
        FileAnalyzer::default().analyze_source(source, file, module)
    }

    fn integrate(analyses: Vec<FileAnalysis>) -> (depmap_core::DependencyGraph, Vec<depmap_core::Relationship>) {
        let mut integrator = GraphIntegrator::new();
        integrator.add_analyses(analyses);
        integrator.finish(None, &AnalysisOptions::default())
    }

    #[test]
    fn test_two_module_import_cycle_end_to_end() {
        let a = analyze("import b\n", "a.py", "a");
        let b = analyze("import a\n", "b.py", "b");
        let (_, relationships) = integrate(vec![a, b]);

        let cycles = detect_cycles(&relationships, CycleKind::Import);
        assert_eq!(cycles.len(), 1);
        let cycle = &cycles[0];
        assert_eq!(cycle.entities, vec!["mod:a".to_string(), "mod:b".to_string()]);
        assert_eq!(cycle.severity, Severity::Medium);
        assert_eq!(cycle.metrics.edge_count, 2);
    }

    #[test]
    fn test_self_import_is_a_self_loop() {
        let a = analyze("import selfmod\n", "selfmod.py", "selfmod");
        let (_, relationships) = integrate(vec![a]);
        let cycles = detect_cycles(&relationships, CycleKind::Import);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].metrics.length, 1);
        assert_eq!(cycles[0].entities, vec!["mod:selfmod".to_string()]);
    }

    #[test]
    fn test_package_hierarchy() {
        let deep = analyze("x = 1\n", "/p/app/db/conn.py", "app.db.conn");
        let shallow = analyze("y = 2\n", "/p/app/util.py", "app.util");
        let (graph, _) = integrate(vec![deep, shallow]);

        let pkg_ids: Vec<&str> = graph.packages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(pkg_ids, vec!["pkg:app", "pkg:app.db"]);

        let app = &graph.packages[0];
        assert_eq!(app.sub_packages, vec!["pkg:app.db".to_string()]);
        assert_eq!(app.modules, vec!["mod:app.util".to_string()]);

        let db = &graph.packages[1];
        assert_eq!(db.modules, vec!["mod:app.db.conn".to_string()]);

        let conn = graph.module_by_id("mod:app.db.conn").unwrap();
        assert_eq!(conn.package_id.as_deref(), Some("pkg:app.db"));
        let top_level = graph.module_by_id("mod:app.util").unwrap();
        assert_eq!(top_level.package_id.as_deref(), Some("pkg:app"));
    }

    #[test]
    fn test_single_component_module_has_no_package() {
        let solo = analyze("x = 1\n", "main.py", "main");
        let (graph, _) = integrate(vec![solo]);
        assert!(graph.packages.is_empty());
        assert_eq!(graph.modules[0].package_id, None);
    }

    #[test]
    fn test_relative_import_resolution() {
        let init = analyze("from .models import User\n", "/p/app/__init__.py", "app");
        let models = analyze("import app\n", "/p/app/models.py", "app.models");
        let (_, relationships) = integrate(vec![init, models]);

        let imports: Vec<_> = relationships
            .iter()
            .filter(|r| r.kind == DependencyKind::Import)
            .collect();
        assert!(imports
            .iter()
            .any(|r| r.from_entity == "mod:app" && r.to_entity == "mod:app.models"));
        assert!(imports
            .iter()
            .any(|r| r.from_entity == "mod:app.models" && r.to_entity == "mod:app"));

        let cycles = detect_cycles(&relationships, CycleKind::Import);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].metrics.length, 2);
    }

    #[test]
    fn test_unresolved_imports_are_preserved() {
        let a = analyze("import os\nimport sys\n", "a.py", "a");
        let (_, relationships) = integrate(vec![a]);
        let targets: Vec<&str> = relationships
            .iter()
            .filter(|r| r.kind == DependencyKind::Import)
            .map(|r| r.to_entity.as_str())
            .collect();
        assert!(targets.contains(&"os"));
        assert!(targets.contains(&"sys"));
        assert!(detect_cycles(&relationships, CycleKind::Import).is_empty());
    }

    #[test]
    fn test_mutual_recursion_forms_a_call_cycle() {
        let source = "def even(n):\n    return n == 0 or odd(n - 1)\n\ndef odd(n):\n    return n != 0 and even(n - 1)\n";
        let a = analyze(source, "parity.py", "parity");
        let (_, relationships) = integrate(vec![a]);

        let calls: Vec<_> = relationships
            .iter()
            .filter(|r| r.kind == DependencyKind::Call)
            .collect();
        assert!(calls
            .iter()
            .any(|r| r.from_entity == "func:even:1" && r.to_entity == "func:odd:4"));
        assert!(calls
            .iter()
            .any(|r| r.from_entity == "func:odd:4" && r.to_entity == "func:even:1"));

        let cycles = detect_cycles(&relationships, CycleKind::Call);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].severity, Severity::Low);
    }

    #[test]
    fn test_inheritance_resolves_within_module() {
        let source = "class Base:\n    pass\n\nclass Child(Base):\n    pass\n";
        let a = analyze(source, "m.py", "m");
        let (_, relationships) = integrate(vec![a]);
        let inheritance: Vec<_> = relationships
            .iter()
            .filter(|r| r.kind == DependencyKind::Inheritance)
            .collect();
        assert_eq!(inheritance.len(), 1);
        assert_eq!(inheritance[0].to_entity, "cls:mod:m:Base");
    }

    #[test]
    fn test_self_call_resolves_to_sibling_method() {
        let source = "class C:\n    def run(self):\n        return self.step()\n\n    def step(self):\n        return 1\n";
        let a = analyze(source, "m.py", "m");
        let (_, relationships) = integrate(vec![a]);
        assert!(relationships.iter().any(|r| {
            r.kind == DependencyKind::Call
                && r.from_entity == "meth:cls:mod:m:C:run:2"
                && r.to_entity == "meth:cls:mod:m:C:step:5"
        }));
    }

    #[test]
    fn test_self_attribute_resolves_to_field() {
        let source = "class C:\n    def __init__(self):\n        self.total = 0\n\n    def read(self):\n        return self.total\n";
        let a = analyze(source, "m.py", "m");
        let (_, relationships) = integrate(vec![a]);
        assert!(relationships.iter().any(|r| {
            r.kind == DependencyKind::AttributeAccess
                && r.to_entity == "field:cls:mod:m:C:total"
        }));
    }

    #[test]
    fn test_integration_never_drops_unresolved_references(){
        let source = "class C(ExternalBase):\n    def run(self):\n        external.call()\n";
        let a = analyze(source, "m.py", "m");
        let (graph, relationships) = integrate(vec![a]);

        let unresolved: Vec<_> = relationships
            .iter()
            .filter(|r| !graph.contains_entity(&r.to_entity))
            .collect();
        assert!(unresolved.iter().any(|r| r.to_entity == "ExternalBase"));
        assert!(unresolved.iter().any(|r| r.to_entity == "external.call"));
    }

    #[test]
    fn test_secondary_source_merges_by_id() {
        struct Stub;
        impl ModuleGraphSource for Stub {
            fn modules(&self) -> Vec<ExternalModule> {
                vec![
                    ExternalModule {
                        name: "vendor.lib".into(),
                        path: None,
                        depth: 1,
                    },
                    ExternalModule {
                        name: "a".into(),
                        path: None,
                        depth: 0,
                    },
                ]
            }
            fn edges(&self) -> Vec<ExternalEdge> {
                vec![ExternalEdge {
                    from_module: "a".into(),
                    to_module: "vendor.lib".into(),
                }]
            }
        }

        let a = analyze("x = 1\n", "a.py", "a");
        let mut integrator = GraphIntegrator::new();
        integrator.add_analyses(vec![a]);
        let (graph, relationships) =
            integrator.finish(Some(&Stub), &AnalysisOptions::default());

        // `a` is not duplicated; `vendor.lib` arrives as a descriptor entry.
        assert_eq!(
            graph.modules.iter().filter(|m| m.id == "mod:a").count(),
            1
        );
        assert!(graph.modules.iter().any(|m| m.id == "mod:vendor.lib"));
        assert!(relationships
            .iter()
            .any(|r| r.from_entity == "mod:a" && r.to_entity == "mod:vendor.lib"));
    }

    #[test]
    fn test_max_depth_limits_secondary_modules() {
        struct Deep;
        impl ModuleGraphSource for Deep {
            fn modules(&self) -> Vec<ExternalModule> {
                vec![ExternalModule {
                    name: "far.away".into(),
                    path: None,
                    depth: 9,
                }]
            }
            fn edges(&self) -> Vec<ExternalEdge> {
                Vec::new()
            }
        }

        let options = AnalysisOptions {
            max_depth: 2,
            ..AnalysisOptions::default()
        };
        let mut integrator = GraphIntegrator::new();
        integrator.add_analyses(vec![analyze("x = 1\n", "a.py", "a")]);
        let (graph, _) = integrator.finish(Some(&Deep), &options);
        assert!(!graph.modules.iter().any(|m| m.id == "mod:far.away"));
    }

    #[test]
    fn test_exact_duplicate_relationships_are_deduplicated() {
        let a = analyze("import b\n", "a.py", "a");
        let duplicate = a.clone();
        let mut integrator = GraphIntegrator::new();
        integrator.add_analyses(vec![a, duplicate]);
        let (_, relationships) = integrator.finish(None, &AnalysisOptions::default());
        let import_edges: Vec<_> = relationships
            .iter()
            .filter(|r| r.kind == DependencyKind::Import)
            .collect();
        assert_eq!(import_edges.len(), 1);
    }
}
