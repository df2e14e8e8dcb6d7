//! Pass 2: reference extraction.
//!
//! Re-walks the tree with the current class and method threaded as context
//! and emits the intra-file relationships: one `inheritance` edge per base
//! class, one `call` edge per call expression inside a method body, and one
//! `attribute_access` edge per `obj.attr` load. Targets are textual at this
//! point; the integrator binds what it can and preserves the rest.

use rustpython_ast as ast;

use depmap_core::{ids, DependencyKind, Relationship};

use crate::render::render_name;
use crate::source_map::LineIndex;

/// Strength assigned to attribute reads; weaker than a call.
const ATTRIBUTE_STRENGTH: f64 = 0.5;

#[derive(Debug, Clone, Default)]
struct RefScope {
    class_id: Option<String>,
    method_id: Option<String>,
    in_method: bool,
}

pub(crate) struct ReferenceExtractor<'a> {
    file_path: &'a str,
    module_id: &'a str,
    lines: &'a LineIndex,
    emit_inheritance: bool,
    emit_calls: bool,
    pub relationships: Vec<Relationship>,
}

impl<'a> ReferenceExtractor<'a> {
    pub(crate) fn new(
        file_path: &'a str,
        module_id: &'a str,
        lines: &'a LineIndex,
        emit_inheritance: bool,
        emit_calls: bool,
    ) -> Self {
        Self {
            file_path,
            module_id,
            lines,
            emit_inheritance,
            emit_calls,
            relationships: Vec::new(),
        }
    }

    pub(crate) fn extract(&mut self, body: &[ast::Stmt]) {
        let scope = RefScope::default();
        for stmt in body {
            self.visit_stmt(stmt, &scope);
        }
    }

    fn push(&mut self, from: &str, to: &str, kind: DependencyKind, line: usize, strength: f64) {
        self.relationships.push(Relationship {
            id: ids::relationship_id(from, to, kind),
            from_entity: from.to_string(),
            to_entity: to.to_string(),
            kind,
            line_number: line,
            file_path: self.file_path.to_string(),
            strength,
        });
    }

    fn visit_stmt(&mut self, stmt: &ast::Stmt, scope: &RefScope) {
        match stmt {
            ast::Stmt::ClassDef(class) => {
                let class_id = ids::class_id(self.module_id, class.name.as_str());
                let line = self.lines.line_of_range(&class.range);
                if self.emit_inheritance {
                    for base in &class.bases {
                        if let Some(base_name) = render_name(base) {
                            self.push(&class_id, &base_name, DependencyKind::Inheritance, line, 1.0);
                        }
                    }
                }
                let inner = RefScope {
                    class_id: Some(class_id),
                    method_id: None,
                    in_method: false,
                };
                self.visit_body(&class.body, &inner);
            }
            ast::Stmt::FunctionDef(func) => {
                let line = self.lines.line_of_range(&func.range);
                self.visit_function(func.name.as_str(), &func.body, line, scope);
            }
            ast::Stmt::AsyncFunctionDef(func) => {
                let line = self.lines.line_of_range(&func.range);
                self.visit_function(func.name.as_str(), &func.body, line, scope);
            }
            ast::Stmt::Assign(s) => {
                self.visit_expr(&s.value, scope);
            }
            ast::Stmt::AugAssign(s) => {
                self.visit_expr(&s.value, scope);
            }
            ast::Stmt::AnnAssign(s) => {
                if let Some(value) = &s.value {
                    self.visit_expr(value, scope);
                }
            }
            ast::Stmt::Expr(s) => self.visit_expr(&s.value, scope),
            ast::Stmt::Return(s) => {
                if let Some(value) = &s.value {
                    self.visit_expr(value, scope);
                }
            }
            ast::Stmt::Raise(s) => {
                if let Some(exc) = &s.exc {
                    self.visit_expr(exc, scope);
                }
            }
            ast::Stmt::Assert(s) => {
                self.visit_expr(&s.test, scope);
                if let Some(msg) = &s.msg {
                    self.visit_expr(msg, scope);
                }
            }
            ast::Stmt::Delete(s) => {
                for target in &s.targets {
                    self.visit_expr(target, scope);
                }
            }
            ast::Stmt::If(s) => {
                self.visit_expr(&s.test, scope);
                self.visit_body(&s.body, scope);
                self.visit_body(&s.orelse, scope);
            }
            ast::Stmt::While(s) => {
                self.visit_expr(&s.test, scope);
                self.visit_body(&s.body, scope);
                self.visit_body(&s.orelse, scope);
            }
            ast::Stmt::For(s) => {
                self.visit_expr(&s.iter, scope);
                self.visit_body(&s.body, scope);
                self.visit_body(&s.orelse, scope);
            }
            ast::Stmt::AsyncFor(s) => {
                self.visit_expr(&s.iter, scope);
                self.visit_body(&s.body, scope);
                self.visit_body(&s.orelse, scope);
            }
            ast::Stmt::With(s) => {
                for item in &s.items {
                    self.visit_expr(&item.context_expr, scope);
                }
                self.visit_body(&s.body, scope);
            }
            ast::Stmt::AsyncWith(s) => {
                for item in &s.items {
                    self.visit_expr(&item.context_expr, scope);
                }
                self.visit_body(&s.body, scope);
            }
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
                self.visit_expr(&s.subject, scope);
                for case in &s.cases {
                    if let Some(guard) = &case.guard {
                        self.visit_expr(guard, scope);
                    }
                    self.visit_body(&case.body, scope);
                }
            }
            _ => {}
        }
    }

    fn visit_body(&mut self, body: &[ast::Stmt], scope: &RefScope) {
        for stmt in body {
            self.visit_stmt(stmt, scope);
        }
    }

    fn visit_function(&mut self, name: &str, body: &[ast::Stmt], line: usize, scope: &RefScope) {
        // Mirror of pass 1: only a def directly in a class body is a method.
        let is_method = scope.class_id.is_some() && !scope.in_method;
        let class_id = if is_method { scope.class_id.as_deref() } else { None };
        let method_id = ids::method_id(class_id, name, line);

        let inner = RefScope {
            class_id: scope.class_id.clone(),
            method_id: Some(method_id),
            in_method: true,
        };
        self.visit_body(body, &inner);
    }

    fn visit_expr(&mut self, expr: &ast::Expr, scope: &RefScope) {
        match expr {
            ast::Expr::Call(call) => {
                if self.emit_calls {
                    if let Some(method_id) = scope.method_id.clone() {
                        if let Some(target) = render_name(&call.func) {
                            let line = self.lines.line_of_range(&call.range);
                            self.push(&method_id, &target, DependencyKind::Call, line, 1.0);
                        }
                    }
                }
                self.visit_expr(&call.func, scope);
                for arg in &call.args {
                    self.visit_expr(arg, scope);
                }
                for keyword in &call.keywords {
                    self.visit_expr(&keyword.value, scope);
                }
            }
            ast::Expr::Attribute(attr) => {
                if self.emit_calls
                    && scope.method_id.is_some()
                    && matches!(attr.ctx, ast::ExprContext::Load)
                {
                    if let ast::Expr::Name(base) = attr.value.as_ref() {
                        if let Some(method_id) = scope.method_id.clone() {
                            let target = format!("{}.{}", base.id, attr.attr);
                            let line = self.lines.line_of_range(&attr.range);
                            self.push(
                                &method_id,
                                &target,
                                DependencyKind::AttributeAccess,
                                line,
                                ATTRIBUTE_STRENGTH,
                            );
                        }
                    }
                }
                self.visit_expr(&attr.value, scope);
            }
            ast::Expr::BoolOp(op) => {
                for value in &op.values {
                    self.visit_expr(value, scope);
                }
            }
            ast::Expr::BinOp(op) => {
                self.visit_expr(&op.left, scope);
                self.visit_expr(&op.right, scope);
            }
            ast::Expr::UnaryOp(op) => self.visit_expr(&op.operand, scope),
            ast::Expr::IfExp(e) => {
                self.visit_expr(&e.test, scope);
                self.visit_expr(&e.body, scope);
                self.visit_expr(&e.orelse, scope);
            }
            ast::Expr::Compare(cmp) => {
                self.visit_expr(&cmp.left, scope);
                for comparator in &cmp.comparators {
                    self.visit_expr(comparator, scope);
                }
            }
            ast::Expr::Lambda(lambda) => self.visit_expr(&lambda.body, scope),
            ast::Expr::Await(e) => self.visit_expr(&e.value, scope),
            ast::Expr::Starred(e) => self.visit_expr(&e.value, scope),
            ast::Expr::NamedExpr(e) => self.visit_expr(&e.value, scope),
            ast::Expr::Subscript(sub) => {
                self.visit_expr(&sub.value, scope);
                self.visit_expr(&sub.slice, scope);
            }
            ast::Expr::Slice(slice) => {
                if let Some(lower) = &slice.lower {
                    self.visit_expr(lower, scope);
                }
                if let Some(upper) = &slice.upper {
                    self.visit_expr(upper, scope);
                }
                if let Some(step) = &slice.step {
                    self.visit_expr(step, scope);
                }
            }
            ast::Expr::List(e) => {
                for elt in &e.elts {
                    self.visit_expr(elt, scope);
                }
            }
            ast::Expr::Tuple(e) => {
                for elt in &e.elts {
                    self.visit_expr(elt, scope);
                }
            }
            ast::Expr::Set(e) => {
                for elt in &e.elts {
                    self.visit_expr(elt, scope);
                }
            }
            ast::Expr::Dict(e) => {
                for key in e.keys.iter().flatten() {
                    self.visit_expr(key, scope);
                }
                for value in &e.values {
                    self.visit_expr(value, scope);
                }
            }
            ast::Expr::ListComp(comp) => {
                self.visit_expr(&comp.elt, scope);
                self.visit_generators(&comp.generators, scope);
            }
            ast::Expr::SetComp(comp) => {
                self.visit_expr(&comp.elt, scope);
                self.visit_generators(&comp.generators, scope);
            }
            ast::Expr::GeneratorExp(comp) => {
                self.visit_expr(&comp.elt, scope);
                self.visit_generators(&comp.generators, scope);
            }
            ast::Expr::DictComp(comp) => {
                self.visit_expr(&comp.key, scope);
                self.visit_expr(&comp.value, scope);
                self.visit_generators(&comp.generators, scope);
            }
            ast::Expr::JoinedStr(e) => {
                for value in &e.values {
                    self.visit_expr(value, scope);
                }
            }
            ast::Expr::FormattedValue(e) => self.visit_expr(&e.value, scope),
            ast::Expr::Yield(e) => {
                if let Some(value) = &e.value {
                    self.visit_expr(value, scope);
                }
            }
            ast::Expr::YieldFrom(e) => self.visit_expr(&e.value, scope),
            _ => {}
        }
    }

    fn visit_generators(&mut self, generators: &[ast::Comprehension], scope: &RefScope) {
        for generator in generators {
            self.visit_expr(&generator.iter, scope);
            for condition in &generator.ifs {
                self.visit_expr(condition, scope);
            }
        }
    }
}
