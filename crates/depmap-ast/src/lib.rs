//! # depmap-ast
//!
//! Per-file AST extraction for the depmap dependency analyser.
//!
//! Each source file is parsed with `rustpython-parser` and walked twice:
//! pass 1 builds the symbol table (classes, methods, fields, imports), pass 2
//! extracts references (inheritance, calls, attribute loads). The result is a
//! self-contained [`FileAnalysis`]; files are independent, which is what
//! makes extraction embarrassingly parallel.
//!
//! A file that fails to parse is not an error: its analysis carries a module
//! descriptor, empty entity lists and the parser diagnostic in
//! `parse_error`.

mod complexity;
mod module_name;
mod refs;
mod render;
mod source_map;
mod symbols;

pub use module_name::derive_module_name;

use std::fs;
use std::path::Path;

use rustpython_ast as ast;
use rustpython_parser::{parse, Mode};
use tracing::{debug, warn};

use depmap_core::{ids, AnalysisLevel, AnalysisOptions, FileAnalysis, ModuleInfo};

use refs::ReferenceExtractor;
use source_map::LineIndex;
use symbols::{CollectConfig, SymbolCollector};

/// Stateless per-file extractor. One instance is shared across a worker
/// pool; all per-file state lives on the stack of `analyze_file`.
#[derive(Debug, Clone)]
pub struct FileAnalyzer {
    collect_classes: bool,
    collect_methods: bool,
    collect_fields: bool,
    keep_annotations: bool,
}

impl FileAnalyzer {
    pub fn new(options: &AnalysisOptions) -> Self {
        Self {
            collect_classes: options.has_level(AnalysisLevel::Class),
            collect_methods: options.has_level(AnalysisLevel::Method),
            collect_fields: options.has_level(AnalysisLevel::Field),
            keep_annotations: options.enable_type_inference,
        }
    }

    /// Read and analyse one file. An unreadable or unparsable file yields a
    /// descriptor-only analysis with `parse_error` set.
    pub fn analyze_file(&self, path: &Path) -> FileAnalysis {
        let module_name = derive_module_name(path);
        let file_path = path.to_string_lossy().into_owned();
        match fs::read_to_string(path) {
            Ok(source) => self.analyze_source(&source, &file_path, &module_name),
            Err(err) => {
                warn!(file = %file_path, error = %err, "failed to read source file");
                self.failed(&file_path, &module_name, format!("read error: {err}"))
            }
        }
    }

    /// Analyse in-memory source under an explicit module name.
    pub fn analyze_source(
        &self,
        source: &str,
        file_path: &str,
        module_name: &str,
    ) -> FileAnalysis {
        let module = match parse(source, Mode::Module, file_path) {
            Ok(ast::Mod::Module(module)) => module,
            Ok(_) => {
                return self.failed(file_path, module_name, "not a module".to_string());
            }
            Err(err) => {
                debug!(file = %file_path, error = %err, "parse error");
                return self.failed(file_path, module_name, err.to_string());
            }
        };

        let module_id = ids::module_id(module_name);
        let lines = LineIndex::new(source);

        let mut collector = SymbolCollector::new(
            file_path,
            &module_id,
            &lines,
            CollectConfig {
                classes: self.collect_classes,
                methods: self.collect_methods,
                fields: self.collect_fields,
                annotations: self.keep_annotations,
            },
        );
        collector.collect(&module.body);

        let mut extractor = ReferenceExtractor::new(
            file_path,
            &module_id,
            &lines,
            self.collect_classes,
            self.collect_methods,
        );
        extractor.extract(&module.body);

        let module_info = ModuleInfo {
            id: module_id.clone(),
            name: module_name.to_string(),
            file_path: file_path.to_string(),
            package_id: None,
            classes: collector.classes.iter().map(|c| c.id.clone()).collect(),
            functions: collector
                .methods
                .iter()
                .filter(|m| !m.is_method)
                .map(|m| m.id.clone())
                .collect(),
            imports: collector.imports,
            loc: source.lines().count(),
            docstring: render::docstring_of(&module.body),
        };

        FileAnalysis {
            file_path: file_path.to_string(),
            module: module_info,
            classes: collector.classes,
            methods: collector.methods,
            fields: collector.fields,
            relationships: extractor.relationships,
            parse_error: None,
        }
    }

    fn failed(&self, file_path: &str, module_name: &str, error: String) -> FileAnalysis {
        let module = ModuleInfo::descriptor(
            ids::module_id(module_name),
            module_name.to_string(),
            file_path.to_string(),
        );
        FileAnalysis {
            file_path: file_path.to_string(),
            module,
            classes: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            relationships: Vec::new(),
            parse_error: Some(error),
        }
    }
}

impl Default for FileAnalyzer {
    fn default() -> Self {
        Self::new(&AnalysisOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depmap_core::{DependencyKind, ImportKind};

    fn analyze(source: &str) -> FileAnalysis {
        FileAnalyzer::default().analyze_source(source, "m.py", "m")
    }

    #[test]
    fn test_simple_class_with_method() {
        let source = "\nclass C:\n    def m(self):\n        return 1\n";
        let analysis = analyze(source);

        assert_eq!(analysis.classes.len(), 1);
        assert_eq!(analysis.classes[0].id, "cls:mod:m:C");
        assert_eq!(analysis.classes[0].line_number, 2);

        assert_eq!(analysis.methods.len(), 1);
        let method = &analysis.methods[0];
        assert_eq!(method.id, "meth:cls:mod:m:C:m:3");
        assert_eq!(method.complexity, 1);
        assert!(method.is_method);
        assert_eq!(method.args, vec!["self".to_string()]);
        assert_eq!(analysis.classes[0].methods, vec![method.id.clone()]);
        assert!(analysis.parse_error.is_none());
    }

    #[test]
    fn test_module_level_function_gets_func_id() {
        let analysis = analyze("def main():\n    pass\n");
        assert_eq!(analysis.methods.len(), 1);
        assert_eq!(analysis.methods[0].id, "func:main:1");
        assert!(!analysis.methods[0].is_method);
        assert_eq!(analysis.module.functions, vec!["func:main:1".to_string()]);
        assert!(analysis.module.classes.is_empty());
    }

    #[test]
    fn test_method_metric_fields() {
        let source =
            "\nclass C:\n    def m(self, x):\n        if x:\n            return 1\n        return 0\n";
        let analysis = analyze(source);
        let method = &analysis.methods[0];
        assert_eq!(method.complexity, 2);
        assert_eq!(method.cognitive_complexity, 1);
        assert_eq!(method.nesting_depth, 1);
        // `def` on line 3, body through line 6.
        assert_eq!(method.lines_of_code, 4);
    }

    #[test]
    fn test_decorator_flags() {
        let source = "\nclass C:\n    @staticmethod\n    def s():\n        pass\n\n    @classmethod\n    def c(cls):\n        pass\n\n    @property\n    def p(self):\n        return 1\n";
        let analysis = analyze(source);
        let by_name = |name: &str| {
            analysis
                .methods
                .iter()
                .find(|m| m.name == name)
                .expect("method present")
        };
        assert!(by_name("s").is_static);
        assert!(by_name("c").is_class_method);
        assert!(by_name("p").is_property);
    }

    #[test]
    fn test_abstract_flag_from_decorators() {
        let source = "\nimport abc\n\n@abc.abstractmethod\nclass Base:\n    pass\n\nclass Plain:\n    pass\n";
        let analysis = analyze(source);
        let base = analysis.classes.iter().find(|c| c.name == "Base").unwrap();
        let plain = analysis.classes.iter().find(|c| c.name == "Plain").unwrap();
        assert!(base.is_abstract);
        assert!(!plain.is_abstract);
    }

    #[test]
    fn test_class_fields_and_instance_fields() {
        let source = "\nclass C:\n    version: int = 2\n    flag = True\n\n    def __init__(self):\n        self.count = 0\n        local = 5\n        self.count = 1\n";
        let analysis = analyze(source);

        let names: Vec<&str> = analysis.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["version", "flag", "count"]);

        let version = &analysis.fields[0];
        assert!(version.is_class_variable);
        assert_eq!(version.type_annotation.as_deref(), Some("int"));
        assert_eq!(version.default_value.as_deref(), Some("2"));

        let count = &analysis.fields[2];
        assert!(!count.is_class_variable);
        assert_eq!(count.line_number, 7);
        // `local = 5` inside the method is not a field, and the second
        // `self.count` assignment does not duplicate the id.
        assert_eq!(analysis.fields.len(), 3);
        assert_eq!(analysis.classes[0].fields.len(), 3);
    }

    #[test]
    fn test_imports_plain_from_and_relative() {
        let source = "import os\nimport numpy as np\nfrom os.path import join as j\nfrom . import sibling\nfrom ..pkg import thing\n";
        let analysis = analyze(source);
        let imports = &analysis.module.imports;
        assert_eq!(imports.len(), 5);

        assert_eq!(imports[0].module, "os");
        assert_eq!(imports[0].kind, ImportKind::Plain);
        assert!(!imports[0].is_relative);

        assert_eq!(imports[1].alias.as_deref(), Some("np"));

        assert_eq!(imports[2].module, "os.path");
        assert_eq!(imports[2].name.as_deref(), Some("join"));
        assert_eq!(imports[2].alias.as_deref(), Some("j"));
        assert_eq!(imports[2].kind, ImportKind::From);

        assert_eq!(imports[3].module, ".");
        assert!(imports[3].is_relative);
        assert_eq!(imports[3].name.as_deref(), Some("sibling"));

        assert_eq!(imports[4].module, "..pkg");
        assert!(imports[4].is_relative);
    }

    #[test]
    fn test_inheritance_relationships() {
        let source = "\nclass Base:\n    pass\n\nclass Child(Base, abc.ABC):\n    pass\n";
        let analysis = analyze(source);
        let inheritance: Vec<_> = analysis
            .relationships
            .iter()
            .filter(|r| r.kind == DependencyKind::Inheritance)
            .collect();
        assert_eq!(inheritance.len(), 2);
        assert_eq!(inheritance[0].from_entity, "cls:mod:m:Child");
        assert_eq!(inheritance[0].to_entity, "Base");
        assert_eq!(inheritance[1].to_entity, "abc.ABC");
    }

    #[test]
    fn test_call_and_attribute_relationships() {
        let source = "\nclass C:\n    def run(self):\n        self.helper()\n        value = other.field\n        print(value)\n";
        let analysis = analyze(source);

        let calls: Vec<_> = analysis
            .relationships
            .iter()
            .filter(|r| r.kind == DependencyKind::Call)
            .collect();
        let call_targets: Vec<&str> = calls.iter().map(|r| r.to_entity.as_str()).collect();
        assert!(call_targets.contains(&"self.helper"));
        assert!(call_targets.contains(&"print"));
        assert!(calls.iter().all(|r| r.from_entity == "meth:cls:mod:m:C:run:3"));
        assert!(calls.iter().all(|r| (r.strength - 1.0).abs() < f64::EPSILON));

        let attrs: Vec<_> = analysis
            .relationships
            .iter()
            .filter(|r| r.kind == DependencyKind::AttributeAccess)
            .collect();
        assert!(attrs.iter().any(|r| r.to_entity == "other.field"));
        assert!(attrs.iter().all(|r| (r.strength - 0.5).abs() < f64::EPSILON));
    }

    #[test]
    fn test_calls_outside_methods_are_not_recorded() {
        let analysis = analyze("print('module level')\n");
        assert!(analysis
            .relationships
            .iter()
            .all(|r| r.kind != DependencyKind::Call));
    }

    #[test]
    fn test_syntax_error_is_non_fatal() {
        let analysis = analyze("def broken(:\n    pass\n");
        assert!(analysis.parse_error.is_some());
        assert!(analysis.classes.is_empty());
        assert!(analysis.methods.is_empty());
        assert!(analysis.relationships.is_empty());
        assert_eq!(analysis.module.id, "mod:m");
    }

    #[test]
    fn test_docstrings() {
        let source = "\"\"\"Module doc.\"\"\"\n\nclass C:\n    \"\"\"Class doc.\"\"\"\n\n    def m(self):\n        \"\"\"Method doc.\"\"\"\n        return 1\n";
        let analysis = analyze(source);
        assert_eq!(analysis.module.docstring.as_deref(), Some("Module doc."));
        assert_eq!(analysis.classes[0].docstring.as_deref(), Some("Class doc."));
        assert_eq!(analysis.methods[0].docstring.as_deref(), Some("Method doc."));
    }

    #[test]
    fn test_return_annotation_preserved() {
        let analysis = analyze("def f(x) -> dict[str, int]:\n    return {}\n");
        assert_eq!(
            analysis.methods[0].return_annotation.as_deref(),
            Some("dict[str, int]")
        );
    }

    #[test]
    fn test_type_inference_disabled_drops_annotations() {
        let options = AnalysisOptions {
            enable_type_inference: false,
            ..AnalysisOptions::default()
        };
        let analyzer = FileAnalyzer::new(&options);
        let analysis =
            analyzer.analyze_source("class C:\n    x: int = 1\n", "m.py", "m");
        assert_eq!(analysis.fields[0].type_annotation, None);
    }

    #[test]
    fn test_level_gating_skips_lower_levels() {
        let options = AnalysisOptions {
            analysis_levels: vec![
                depmap_core::AnalysisLevel::Package,
                depmap_core::AnalysisLevel::Module,
            ],
            ..AnalysisOptions::default()
        };
        let analyzer = FileAnalyzer::new(&options);
        let analysis = analyzer.analyze_source(
            "class C:\n    def m(self):\n        return 1\n",
            "m.py",
            "m",
        );
        assert!(analysis.classes.is_empty());
        assert!(analysis.methods.is_empty());
        assert!(analysis.fields.is_empty());
        assert!(analysis.relationships.is_empty());
        // Module-level facts survive.
        assert_eq!(analysis.module.loc, 3);
    }

    #[test]
    fn test_nested_def_is_not_a_method() {
        let source = "\nclass C:\n    def outer(self):\n        def inner():\n            pass\n        return inner\n";
        let analysis = analyze(source);
        let inner = analysis.methods.iter().find(|m| m.name == "inner").unwrap();
        assert!(!inner.is_method);
        assert!(inner.class_id.is_none());
        assert_eq!(analysis.classes[0].methods.len(), 1);
    }

    #[test]
    fn test_async_def_is_extracted() {
        let analysis = analyze("async def fetch(url):\n    return url\n");
        assert_eq!(analysis.methods.len(), 1);
        assert_eq!(analysis.methods[0].name, "fetch");
    }

    #[test]
    fn test_analyze_file_missing_path_reports_read_error() {
        let analyzer = FileAnalyzer::default();
        let analysis = analyzer.analyze_file(Path::new("/nonexistent/never.py"));
        assert!(analysis
            .parse_error
            .as_deref()
            .is_some_and(|e| e.starts_with("read error:")));
    }
}
