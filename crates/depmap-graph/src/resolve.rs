//! Best-effort binding of textual reference targets.
//!
//! Base classes, call targets and attribute reads leave extraction as the
//! text that appeared in the source. This pass matches that text against the
//! global symbol tables — same class first, then same module, then a global
//! sorted-first match — and rewrites `to_entity` where a binding is found.
//! Everything else keeps its textual name; unresolved edges are preserved,
//! never dropped.

use std::collections::BTreeMap;

use depmap_core::{
    ClassInfo, DependencyKind, FieldInfo, MethodInfo, ModuleInfo, Relationship,
};

struct SymbolIndex<'a> {
    /// class name → class ids, sorted.
    classes: BTreeMap<&'a str, Vec<&'a ClassInfo>>,
    /// function name → module-level methods, sorted by id.
    functions: BTreeMap<&'a str, Vec<&'a MethodInfo>>,
    /// method name → class-owned methods, sorted by id.
    methods: BTreeMap<&'a str, Vec<&'a MethodInfo>>,
    /// existing field ids.
    fields: BTreeMap<&'a str, &'a FieldInfo>,
    /// class id → module id.
    class_module: BTreeMap<&'a str, &'a str>,
    /// file path → module id (functions carry only their file path).
    file_module: BTreeMap<&'a str, &'a str>,
}

impl<'a> SymbolIndex<'a> {
    fn build(
        modules: &'a [ModuleInfo],
        classes: &'a [ClassInfo],
        methods: &'a [MethodInfo],
        fields: &'a [FieldInfo],
    ) -> Self {
        let mut class_index: BTreeMap<&str, Vec<&ClassInfo>> = BTreeMap::new();
        let mut class_module = BTreeMap::new();
        for class in classes {
            class_index.entry(class.name.as_str()).or_default().push(class);
            class_module.insert(class.id.as_str(), class.module_id.as_str());
        }

        let mut functions: BTreeMap<&str, Vec<&MethodInfo>> = BTreeMap::new();
        let mut class_methods: BTreeMap<&str, Vec<&MethodInfo>> = BTreeMap::new();
        for method in methods {
            if method.is_method {
                class_methods.entry(method.name.as_str()).or_default().push(method);
            } else {
                functions.entry(method.name.as_str()).or_default().push(method);
            }
        }
        for bucket in class_index.values_mut() {
            bucket.sort_by(|a, b| a.id.cmp(&b.id));
        }
        for bucket in functions.values_mut() {
            bucket.sort_by(|a, b| a.id.cmp(&b.id));
        }
        for bucket in class_methods.values_mut() {
            bucket.sort_by(|a, b| a.id.cmp(&b.id));
        }

        let field_index = fields.iter().map(|f| (f.id.as_str(), f)).collect();
        let file_module = modules
            .iter()
            .map(|m| (m.file_path.as_str(), m.id.as_str()))
            .collect();

        Self {
            classes: class_index,
            functions,
            methods: class_methods,
            fields: field_index,
            class_module,
            file_module,
        }
    }

    /// Module id of the entity a relationship starts from.
    fn module_of_source(&self, rel: &Relationship) -> Option<&str> {
        self.file_module.get(rel.file_path.as_str()).copied()
    }

    fn class_of_method_id<'b>(&self, method_id: &'b str) -> Option<&'b str> {
        // `meth:<class_id>:<name>:<line>`
        let rest = method_id.strip_prefix("meth:")?;
        let rest = rest.rsplitn(3, ':').nth(2)?;
        Some(rest)
    }

    fn resolve_class(&self, name: &str, source_module: Option<&str>) -> Option<String> {
        let last = name.rsplit('.').next().unwrap_or(name);
        let candidates = self.classes.get(last)?;
        if let Some(module) = source_module {
            if let Some(hit) = candidates.iter().find(|c| c.module_id == module) {
                return Some(hit.id.clone());
            }
        }
        candidates.first().map(|c| c.id.clone())
    }

    fn resolve_call(&self, target: &str, rel: &Relationship) -> Option<String> {
        let source_module = self.module_of_source(rel);
        let parts: Vec<&str> = target.split('.').collect();
        let last = *parts.last()?;

        // `self.helper()` binds inside the calling method's own class.
        if parts.len() == 2 && parts[0] == "self" {
            let class_id = self.class_of_method_id(&rel.from_entity)?;
            let candidates = self.methods.get(last)?;
            return candidates
                .iter()
                .find(|m| m.class_id.as_deref() == Some(class_id))
                .map(|m| m.id.clone());
        }

        if parts.len() == 1 {
            // Bare name: a function in the same module, then a class
            // (constructor call) in the same module, then sorted-first
            // globally.
            if let Some(candidates) = self.functions.get(last) {
                if let Some(module) = source_module {
                    if let Some(hit) = candidates
                        .iter()
                        .find(|m| self.file_module.get(m.file_path.as_str()).copied() == Some(module))
                    {
                        return Some(hit.id.clone());
                    }
                }
                if let Some(first) = candidates.first() {
                    return Some(first.id.clone());
                }
            }
            return self.resolve_class(last, source_module);
        }

        // `Receiver.method()`: bind when the qualifier names a known class.
        let qualifier = parts[parts.len() - 2];
        if let Some(class_candidates) = self.classes.get(qualifier) {
            let method_candidates = self.methods.get(last)?;
            for class in class_candidates {
                if let Some(hit) = method_candidates
                    .iter()
                    .find(|m| m.class_id.as_deref() == Some(class.id.as_str()))
                {
                    return Some(hit.id.clone());
                }
            }
        }
        None
    }

    fn resolve_attribute(&self, target: &str, rel: &Relationship) -> Option<String> {
        // Only `self.attr` binds confidently: the owning class is known.
        let attr = target.strip_prefix("self.")?;
        if attr.contains('.') {
            return None;
        }
        let class_id = self.class_of_method_id(&rel.from_entity)?;
        let field_id = depmap_core::ids::field_id(class_id, attr);
        self.fields.get(field_id.as_str()).map(|f| f.id.clone())
    }
}

/// Rewrite resolvable `to_entity` targets in place.
pub(crate) fn resolve_relationships(
    relationships: &mut [Relationship],
    modules: &[ModuleInfo],
    classes: &[ClassInfo],
    methods: &[MethodInfo],
    fields: &[FieldInfo],
) {
    let index = SymbolIndex::build(modules, classes, methods, fields);

    for rel in relationships.iter_mut() {
        let resolved = match rel.kind {
            DependencyKind::Inheritance => {
                let source_module = index.class_module.get(rel.from_entity.as_str()).copied();
                index.resolve_class(&rel.to_entity, source_module)
            }
            DependencyKind::Call => index.resolve_call(&rel.to_entity.clone(), rel),
            DependencyKind::AttributeAccess => {
                index.resolve_attribute(&rel.to_entity.clone(), rel)
            }
            _ => None,
        };
        if let Some(target) = resolved {
            rel.id = depmap_core::ids::relationship_id(&rel.from_entity, &target, rel.kind);
            rel.to_entity = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_extraction_from_method_id() {
        let index = SymbolIndex::build(&[], &[], &[], &[]);
        assert_eq!(
            index.class_of_method_id("meth:cls:mod:m:C:run:3"),
            Some("cls:mod:m:C")
        );
        assert_eq!(index.class_of_method_id("func:main:1"), None);
    }
}
