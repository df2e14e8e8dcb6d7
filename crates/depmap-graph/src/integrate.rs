//! Merges per-file analyses into the global five-level graph.
//!
//! The integrator consumes path-sorted `FileAnalysis` values (all at once on
//! the standard path, batch by batch on the streamed path), then builds the
//! package hierarchy, derives module-level import edges from the recorded
//! import statements, binds what references it can and refines import-edge
//! strengths. Entities are appended as-is; the integrator never mutates
//! class, method or field records after construction.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use depmap_core::{
    ids, AnalysisOptions, DependencyGraph, DependencyKind, FileAnalysis, ImportRecord,
    ModuleInfo, PackageInfo, Relationship,
};

use crate::resolve;
use crate::secondary::ModuleGraphSource;
use crate::strength;

#[derive(Debug, Default)]
pub struct GraphIntegrator {
    modules: Vec<ModuleInfo>,
    classes: Vec<depmap_core::ClassInfo>,
    methods: Vec<depmap_core::MethodInfo>,
    fields: Vec<depmap_core::FieldInfo>,
    relationships: Vec<Relationship>,
    /// Exact-duplicate guard over (from, to, kind, line).
    seen_edges: HashSet<(String, String, DependencyKind, usize)>,
    seen_modules: HashSet<String>,
}

impl GraphIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of per-file analyses. Callers feed batches in path
    /// order so the output is independent of worker scheduling.
    pub fn add_analyses(&mut self, analyses: Vec<FileAnalysis>) {
        for analysis in analyses {
            // Two files can derive the same dotted name (stray scripts named
            // alike outside any package). Ids must stay unique; the first
            // path in sort order wins.
            if !self.seen_modules.insert(analysis.module.id.clone()) {
                tracing::warn!(
                    module = %analysis.module.id,
                    file = %analysis.file_path,
                    "duplicate module name skipped"
                );
                continue;
            }
            self.modules.push(analysis.module);
            self.classes.extend(analysis.classes);
            self.methods.extend(analysis.methods);
            self.fields.extend(analysis.fields);
            for rel in analysis.relationships {
                let key = (
                    rel.from_entity.clone(),
                    rel.to_entity.clone(),
                    rel.kind,
                    rel.line_number,
                );
                if self.seen_edges.insert(key) {
                    self.relationships.push(rel);
                }
            }
        }
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Reclamation pass for the streamed path: return retained capacity to
    /// the allocator between batches.
    pub fn shrink(&mut self) {
        self.modules.shrink_to_fit();
        self.classes.shrink_to_fit();
        self.methods.shrink_to_fit();
        self.fields.shrink_to_fit();
        self.relationships.shrink_to_fit();
    }

    /// Close integration: merge the secondary source, build packages, derive
    /// and refine import edges, resolve references.
    pub fn finish(
        mut self,
        secondary: Option<&dyn ModuleGraphSource>,
        options: &AnalysisOptions,
    ) -> (DependencyGraph, Vec<Relationship>) {
        if let Some(source) = secondary {
            self.merge_secondary(source, options);
        }

        let packages = self.build_packages();
        self.derive_import_edges();

        resolve::resolve_relationships(
            &mut self.relationships,
            &self.modules,
            &self.classes,
            &self.methods,
            &self.fields,
        );

        strength::refine_import_strengths(&mut self.relationships, &self.modules);

        let graph = DependencyGraph {
            packages,
            modules: self.modules,
            classes: self.classes,
            methods: self.methods,
            fields: self.fields,
        };
        (graph, self.relationships)
    }

    fn merge_secondary(&mut self, source: &dyn ModuleGraphSource, options: &AnalysisOptions) {
        let stdlib_prefix = source.stdlib_prefix().map(|p| p.to_path_buf());
        let mut known: HashSet<String> = self.modules.iter().map(|m| m.id.clone()).collect();

        for external in source.modules() {
            if options.max_depth > 0 && external.depth > options.max_depth {
                continue;
            }
            if !options.include_stdlib {
                if let (Some(prefix), Some(path)) = (&stdlib_prefix, &external.path) {
                    if path.starts_with(prefix) {
                        continue;
                    }
                }
            }
            let id = ids::module_id(&external.name);
            if known.insert(id.clone()) {
                let path = external
                    .path
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.modules
                    .push(ModuleInfo::descriptor(id, external.name, path));
            }
        }

        for edge in source.edges() {
            let from = ids::module_id(&edge.from_module);
            let to = ids::module_id(&edge.to_module);
            // Merge is by id equality only; edges to unknown modules are
            // dropped rather than invented.
            if !known.contains(&from) || !known.contains(&to) {
                continue;
            }
            let key = (from.clone(), to.clone(), DependencyKind::Import, 0);
            if self.seen_edges.insert(key) {
                self.relationships.push(Relationship {
                    id: ids::relationship_id(&from, &to, DependencyKind::Import),
                    from_entity: from,
                    to_entity: to,
                    kind: DependencyKind::Import,
                    line_number: 0,
                    file_path: String::new(),
                    strength: 1.0,
                });
            }
        }
    }

    /// One package per distinct dotted prefix; modules join their immediate
    /// parent, parents link their sub-packages.
    fn build_packages(&mut self) -> Vec<PackageInfo> {
        let mut packages: Vec<PackageInfo> = Vec::new();
        let mut index: BTreeMap<String, usize> = BTreeMap::new();

        for module in &mut self.modules {
            let parts: Vec<&str> = module.name.split('.').collect();
            if parts.len() < 2 {
                continue;
            }

            // The module's own directory depth differs for package modules
            // (`__init__` collapses onto its directory).
            let is_package_module = module
                .file_path
                .ends_with("__init__.py");

            for depth in 1..parts.len() {
                let prefix = parts[..depth].join(".");
                let id = ids::package_id(&prefix);
                if !index.contains_key(&id) {
                    let path = package_path(&module.file_path, parts.len(), depth, is_package_module);
                    packages.push(PackageInfo {
                        id: id.clone(),
                        name: prefix.clone(),
                        path,
                        modules: Vec::new(),
                        sub_packages: Vec::new(),
                    });
                    index.insert(id.clone(), packages.len() - 1);
                }
                if depth >= 2 {
                    let parent_id = ids::package_id(&parts[..depth - 1].join("."));
                    if let Some(&parent_idx) = index.get(&parent_id) {
                        if !packages[parent_idx].sub_packages.contains(&id) {
                            packages[parent_idx].sub_packages.push(id.clone());
                        }
                    }
                }
            }

            let parent_id = ids::package_id(&parts[..parts.len() - 1].join("."));
            if let Some(&idx) = index.get(&parent_id) {
                packages[idx].modules.push(module.id.clone());
                module.package_id = Some(parent_id);
            }
        }

        packages
    }

    /// Turn each module's import records into module-level `import` edges.
    /// Unresolvable targets keep their textual name.
    fn derive_import_edges(&mut self) {
        let by_name: BTreeMap<String, String> = self
            .modules
            .iter()
            .map(|m| (m.name.clone(), m.id.clone()))
            .collect();

        let mut new_edges: Vec<Relationship> = Vec::new();
        for module in &self.modules {
            let is_package = module.file_path.ends_with("__init__.py");
            for record in &module.imports {
                let target = resolve_import_target(&module.name, is_package, record, &by_name);
                let key = (
                    module.id.clone(),
                    target.clone(),
                    DependencyKind::Import,
                    record.line_number,
                );
                if !self.seen_edges.insert(key) {
                    continue;
                }
                new_edges.push(Relationship {
                    id: ids::relationship_id(&module.id, &target, DependencyKind::Import),
                    from_entity: module.id.clone(),
                    to_entity: target,
                    kind: DependencyKind::Import,
                    line_number: record.line_number,
                    file_path: module.file_path.clone(),
                    strength: 1.0,
                });
            }
        }
        debug!(edges = new_edges.len(), "derived module import edges");
        self.relationships.extend(new_edges);
    }
}

/// Resolve one import record against the known module names. Returns the
/// target module id, or the most specific textual guess when nothing in the
/// tree matches.
fn resolve_import_target(
    importer: &str,
    importer_is_package: bool,
    record: &ImportRecord,
    by_name: &BTreeMap<String, String>,
) -> String {
    let dots = record.module.chars().take_while(|&c| c == '.').count();
    let base = &record.module[dots..];

    let absolute = if dots > 0 {
        // One leading dot names the current package. For a package module
        // (`__init__`) the dotted name already is the package; for a plain
        // module the last component must be dropped first.
        let drop = if importer_is_package { dots - 1 } else { dots };
        let parts: Vec<&str> = importer.split('.').collect();
        if drop > parts.len() {
            // Relative import escaping the tree root; keep the raw text.
            return record.module.clone();
        }
        let prefix = parts[..parts.len() - drop].join(".");
        match (prefix.is_empty(), base.is_empty()) {
            (true, true) => String::new(),
            (true, false) => base.to_string(),
            (false, true) => prefix,
            (false, false) => format!("{prefix}.{base}"),
        }
    } else {
        base.to_string()
    };

    // `from X import y` may name a submodule: prefer the more specific
    // candidate before the package itself.
    if let Some(symbol) = &record.name {
        let candidate = if absolute.is_empty() {
            symbol.clone()
        } else {
            format!("{absolute}.{symbol}")
        };
        if let Some(id) = by_name.get(&candidate) {
            return id.clone();
        }
    }
    if let Some(id) = by_name.get(&absolute) {
        return id.clone();
    }

    if dots > 0 {
        // Expanded guess is more useful than the raw dotted text.
        if absolute.is_empty() {
            record.module.clone()
        } else {
            absolute
        }
    } else {
        record.module.clone()
    }
}

/// Directory of the package at `depth` dotted components, derived from one
/// of its modules' file paths.
///
/// A plain module `a.b.c` lives at `<root>/a/b/c.py`, so its parent
/// directory corresponds to dotted depth `parts - 1`; an `__init__` module
/// `a.b` lives at `<root>/a/b/__init__.py`, whose parent corresponds to
/// depth `parts`.
fn package_path(
    file_path: &str,
    module_parts: usize,
    depth: usize,
    is_package_module: bool,
) -> String {
    let parent_depth = if is_package_module {
        module_parts
    } else {
        module_parts.saturating_sub(1)
    };
    let mut levels_up = parent_depth.saturating_sub(depth);
    let mut current = std::path::Path::new(file_path).parent();
    while levels_up > 0 {
        current = current.and_then(|p| p.parent());
        levels_up -= 1;
    }
    current
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}
