//! Pass 1: the symbol table.
//!
//! A hand-written match-based walk over the statement tree that records
//! classes, methods, fields and imports. The enclosing scope is threaded
//! through the recursion as an explicit `Scope` value, so there is no hidden
//! mutable scope stack; pass 2 follows the same convention.

use std::collections::HashSet;

use rustpython_ast as ast;

use depmap_core::{ids, ClassInfo, FieldInfo, ImportKind, ImportRecord, MethodInfo};

use crate::complexity;
use crate::render::{docstring_of, render_annotation, render_name, render_value};
use crate::source_map::LineIndex;

/// Which entity kinds this run collects, derived from the analysis levels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CollectConfig {
    pub classes: bool,
    pub methods: bool,
    pub fields: bool,
    /// When false, textual annotations are discarded.
    pub annotations: bool,
}

/// The enclosing scope at the current point of the walk.
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    /// Index into `classes` of the innermost enclosing class, if any.
    class_idx: Option<usize>,
    /// True once the walk has entered a def body.
    in_method: bool,
}

pub(crate) struct SymbolCollector<'a> {
    file_path: &'a str,
    module_id: &'a str,
    lines: &'a LineIndex,
    config: CollectConfig,
    pub classes: Vec<ClassInfo>,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
    pub imports: Vec<ImportRecord>,
    seen_class_ids: HashSet<String>,
    seen_field_ids: HashSet<String>,
}

impl<'a> SymbolCollector<'a> {
    pub(crate) fn new(
        file_path: &'a str,
        module_id: &'a str,
        lines: &'a LineIndex,
        config: CollectConfig,
    ) -> Self {
        Self {
            file_path,
            module_id,
            lines,
            config,
            classes: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            imports: Vec::new(),
            seen_class_ids: HashSet::new(),
            seen_field_ids: HashSet::new(),
        }
    }

    pub(crate) fn collect(&mut self, body: &[ast::Stmt]) {
        for stmt in body {
            self.visit_stmt(stmt, Scope::default());
        }
    }

    fn visit_stmt(&mut self, stmt: &ast::Stmt, scope: Scope) {
        match stmt {
            ast::Stmt::ClassDef(class) => self.visit_class(class, scope),
            ast::Stmt::FunctionDef(func) => {
                self.visit_function(
                    func.name.as_str(),
                    &func.args,
                    &func.body,
                    &func.decorator_list,
                    func.returns.as_deref(),
                    &func.range,
                    scope,
                );
            }
            ast::Stmt::AsyncFunctionDef(func) => {
                self.visit_function(
                    func.name.as_str(),
                    &func.args,
                    &func.body,
                    &func.decorator_list,
                    func.returns.as_deref(),
                    &func.range,
                    scope,
                );
            }
            ast::Stmt::Import(import) => {
                let line = self.lines.line_of_range(&import.range);
                for alias in &import.names {
                    self.imports.push(ImportRecord {
                        module: alias.name.to_string(),
                        name: None,
                        alias: alias.asname.as_ref().map(|a| a.to_string()),
                        line_number: line,
                        kind: ImportKind::Plain,
                        is_relative: false,
                    });
                }
            }
            ast::Stmt::ImportFrom(import) => {
                let line = self.lines.line_of_range(&import.range);
                let level = import.level.as_ref().map(|l| l.to_u32() as usize).unwrap_or(0);
                // Relative imports keep their dots so integration can expand
                // them against the importing module's package.
                let module = format!(
                    "{}{}",
                    ".".repeat(level),
                    import.module.as_ref().map(|m| m.as_str()).unwrap_or("")
                );
                for alias in &import.names {
                    self.imports.push(ImportRecord {
                        module: module.clone(),
                        name: Some(alias.name.to_string()),
                        alias: alias.asname.as_ref().map(|a| a.to_string()),
                        line_number: line,
                        kind: ImportKind::From,
                        is_relative: level > 0,
                    });
                }
            }
            ast::Stmt::Assign(assign) => {
                self.visit_assign(assign, scope);
            }
            ast::Stmt::AnnAssign(assign) => {
                self.visit_ann_assign(assign, scope);
            }
            ast::Stmt::If(s) => {
                self.visit_body(&s.body, scope);
                self.visit_body(&s.orelse, scope);
            }
            ast::Stmt::While(s) => {
                self.visit_body(&s.body, scope);
                self.visit_body(&s.orelse, scope);
            }
            ast::Stmt::For(s) => {
                self.visit_body(&s.body, scope);
                self.visit_body(&s.orelse, scope);
            }
            ast::Stmt::AsyncFor(s) => {
                self.visit_body(&s.body, scope);
                self.visit_body(&s.orelse, scope);
            }
            ast::Stmt::With(s) => self.visit_body(&s.body, scope),
            ast::Stmt::AsyncWith(s) => self.visit_body(&s.body, scope),
            ast::Stmt::Try(s) => {
                self.visit_body(&s.body, scope);
                for handler in &s.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    self.visit_body(&h.body, scope);
                }
                self.visit_body(&s.orelse, scope);
                self.visit_body(&s.finalbody, scope);
            }
            ast::Stmt::Match(s) => {
                for case in &s.cases {
                    self.visit_body(&case.body, scope);
                }
            }
            _ => {}
        }
    }

    fn visit_body(&mut self, body: &[ast::Stmt], scope: Scope) {
        for stmt in body {
            self.visit_stmt(stmt, scope);
        }
    }

    fn visit_class(&mut self, class: &ast::StmtClassDef, scope: Scope) {
        if !self.config.classes {
            return;
        }

        let id = ids::class_id(self.module_id, class.name.as_str());
        if !self.seen_class_ids.insert(id.clone()) {
            // A redefinition shadows the first; the original definition keeps
            // the id.
            tracing::debug!(class = %id, "duplicate class definition skipped");
            return;
        }

        let bases: Vec<String> = class.bases.iter().filter_map(render_name).collect();
        let decorators: Vec<String> =
            class.decorator_list.iter().filter_map(render_name).collect();
        let is_abstract = decorators.iter().any(|d| {
            let lowered = d.to_lowercase();
            lowered.contains("abstract") || lowered.contains("abc")
        });

        let info = ClassInfo {
            id,
            name: class.name.to_string(),
            module_id: self.module_id.to_string(),
            line_number: self.lines.line_of_range(&class.range),
            file_path: self.file_path.to_string(),
            bases,
            decorators,
            methods: Vec::new(),
            fields: Vec::new(),
            is_abstract,
            docstring: docstring_of(&class.body),
        };

        self.classes.push(info);
        let class_scope = Scope {
            class_idx: Some(self.classes.len() - 1),
            in_method: false,
        };
        self.visit_body(&class.body, class_scope);
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_function(
        &mut self,
        name: &str,
        args: &ast::Arguments,
        body: &[ast::Stmt],
        decorator_list: &[ast::Expr],
        returns: Option<&ast::Expr>,
        range: &ast::text_size::TextRange,
        scope: Scope,
    ) {
        let line = self.lines.line_of_range(range);
        // A def directly inside a class body is a method; a def nested in
        // another def is a plain function even when a class encloses both.
        let is_method = scope.class_idx.is_some() && !scope.in_method;
        let class_id = if is_method {
            scope.class_idx.map(|idx| self.classes[idx].id.clone())
        } else {
            None
        };

        let id = ids::method_id(class_id.as_deref(), name, line);

        let mut positional: Vec<String> = Vec::new();
        for arg in args.posonlyargs.iter().chain(args.args.iter()) {
            positional.push(arg.def.arg.to_string());
        }

        let decorators: Vec<String> = decorator_list.iter().filter_map(render_name).collect();
        let is_static = decorators.iter().any(|d| d == "staticmethod");
        let is_class_method = decorators.iter().any(|d| d == "classmethod");
        let is_property = decorators.iter().any(|d| d == "property");

        let return_annotation = if self.config.annotations {
            returns.map(render_annotation)
        } else {
            None
        };

        if self.config.methods {
            if let (true, Some(idx)) = (is_method, scope.class_idx) {
                self.classes[idx].methods.push(id.clone());
            }
            let (cognitive_complexity, nesting_depth) = complexity::cognitive(body);
            let end_line = self
                .lines
                .line_of(usize::from(range.end()).saturating_sub(1));
            self.methods.push(MethodInfo {
                id,
                name: name.to_string(),
                line_number: line,
                file_path: self.file_path.to_string(),
                class_id,
                args: positional,
                return_annotation,
                decorators,
                is_method,
                is_static,
                is_class_method,
                is_property,
                complexity: complexity::cyclomatic(body),
                cognitive_complexity,
                nesting_depth,
                lines_of_code: end_line.saturating_sub(line) + 1,
                docstring: docstring_of(body),
            });
        }

        let inner = Scope {
            class_idx: scope.class_idx,
            in_method: true,
        };
        self.visit_body(body, inner);
    }

    fn visit_assign(&mut self, assign: &ast::StmtAssign, scope: Scope) {
        let Some(class_idx) = scope.class_idx else {
            return;
        };
        let line = self.lines.line_of_range(&assign.range);
        for target in &assign.targets {
            match target {
                ast::Expr::Name(name) if !scope.in_method => {
                    self.add_field(class_idx, name.id.as_str(), line, None, Some(&assign.value), true);
                }
                ast::Expr::Attribute(attr) if scope.in_method => {
                    if let ast::Expr::Name(base) = attr.value.as_ref() {
                        if base.id.as_str() == "self" {
                            self.add_field(
                                class_idx,
                                attr.attr.as_str(),
                                line,
                                None,
                                Some(&assign.value),
                                false,
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_ann_assign(&mut self, assign: &ast::StmtAnnAssign, scope: Scope) {
        let Some(class_idx) = scope.class_idx else {
            return;
        };
        let line = self.lines.line_of_range(&assign.range);
        match assign.target.as_ref() {
            ast::Expr::Name(name) if !scope.in_method => {
                self.add_field(
                    class_idx,
                    name.id.as_str(),
                    line,
                    Some(&assign.annotation),
                    assign.value.as_deref(),
                    true,
                );
            }
            ast::Expr::Attribute(attr) if scope.in_method => {
                if let ast::Expr::Name(base) = attr.value.as_ref() {
                    if base.id.as_str() == "self" {
                        self.add_field(
                            class_idx,
                            attr.attr.as_str(),
                            line,
                            Some(&assign.annotation),
                            assign.value.as_deref(),
                            false,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn add_field(
        &mut self,
        class_idx: usize,
        name: &str,
        line: usize,
        annotation: Option<&ast::Expr>,
        value: Option<&ast::Expr>,
        is_class_variable: bool,
    ) {
        if !self.config.fields {
            return;
        }

        let class_id = self.classes[class_idx].id.clone();
        let id = ids::field_id(&class_id, name);
        // Field ids carry no line number; the first sighting wins.
        if !self.seen_field_ids.insert(id.clone()) {
            return;
        }

        let type_annotation = if self.config.annotations {
            annotation.map(render_annotation)
        } else {
            None
        };

        self.classes[class_idx].fields.push(id.clone());
        self.fields.push(FieldInfo {
            id,
            name: name.to_string(),
            class_id,
            line_number: line,
            file_path: self.file_path.to_string(),
            type_annotation,
            default_value: value.and_then(render_value),
            is_class_variable,
        });
    }
}
