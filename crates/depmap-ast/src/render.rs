//! Textual rendering of AST expressions.
//!
//! Base classes, decorators, annotations, call targets and default values
//! are all captured as the text a reader would see in the source: bare names
//! and dotted attribute chains joined with `.`, constants by their Python
//! string form. Anything richer stays unresolved text until integration.

use rustpython_ast as ast;

/// Render a name-like expression: `Name`, dotted `Attribute` chains and
/// constants. Returns `None` for expressions with no stable textual name
/// (call results, subscripts of complex bases, and so on).
pub(crate) fn render_name(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Name(name) => Some(name.id.to_string()),
        ast::Expr::Attribute(attr) => {
            let base = render_name(&attr.value)?;
            Some(format!("{base}.{}", attr.attr))
        }
        ast::Expr::Constant(constant) => Some(render_constant(&constant.value)),
        // A parameterised decorator or base renders as its callee name:
        // `@dataclass(frozen=True)` is recorded as `dataclass`.
        ast::Expr::Call(call) => render_name(&call.func),
        _ => None,
    }
}

/// Render a type annotation. Falls back to `...` for expressions this
/// renderer does not model; annotations are preserved text, never
/// interpreted.
pub(crate) fn render_annotation(expr: &ast::Expr) -> String {
    match expr {
        ast::Expr::Name(name) => name.id.to_string(),
        ast::Expr::Attribute(attr) => {
            format!("{}.{}", render_annotation(&attr.value), attr.attr)
        }
        ast::Expr::Constant(constant) => render_constant(&constant.value),
        ast::Expr::Subscript(sub) => {
            format!(
                "{}[{}]",
                render_annotation(&sub.value),
                render_annotation(&sub.slice)
            )
        }
        ast::Expr::Tuple(tuple) => {
            let parts: Vec<String> = tuple.elts.iter().map(render_annotation).collect();
            parts.join(", ")
        }
        ast::Expr::List(list) => {
            let parts: Vec<String> = list.elts.iter().map(render_annotation).collect();
            format!("[{}]", parts.join(", "))
        }
        // PEP 604 unions: `int | None`.
        ast::Expr::BinOp(binop) if matches!(binop.op, ast::Operator::BitOr) => {
            format!(
                "{} | {}",
                render_annotation(&binop.left),
                render_annotation(&binop.right)
            )
        }
        _ => "...".to_string(),
    }
}

/// Render a default value. `None` when the expression has no compact form.
pub(crate) fn render_value(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Constant(constant) => Some(render_constant(&constant.value)),
        ast::Expr::Name(name) => Some(name.id.to_string()),
        ast::Expr::Attribute(_) => render_name(expr),
        ast::Expr::List(list) if list.elts.is_empty() => Some("[]".to_string()),
        ast::Expr::Dict(dict) if dict.keys.is_empty() => Some("{}".to_string()),
        ast::Expr::Tuple(tuple) if tuple.elts.is_empty() => Some("()".to_string()),
        ast::Expr::Call(call) => render_name(&call.func).map(|name| format!("{name}(...)")),
        _ => None,
    }
}

/// Constants rendered the way Python writes them.
pub(crate) fn render_constant(constant: &ast::Constant) -> String {
    match constant {
        ast::Constant::None => "None".to_string(),
        ast::Constant::Bool(true) => "True".to_string(),
        ast::Constant::Bool(false) => "False".to_string(),
        ast::Constant::Str(s) => format!("'{s}'"),
        ast::Constant::Bytes(_) => "b'...'".to_string(),
        ast::Constant::Int(i) => i.to_string(),
        ast::Constant::Float(f) => f.to_string(),
        ast::Constant::Complex { real, imag } => format!("({real}+{imag}j)"),
        ast::Constant::Ellipsis => "...".to_string(),
        ast::Constant::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(render_constant).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Docstring of a statement body: the first statement, when it is a bare
/// string literal.
pub(crate) fn docstring_of(body: &[ast::Stmt]) -> Option<String> {
    if let Some(ast::Stmt::Expr(expr)) = body.first() {
        if let ast::Expr::Constant(constant) = expr.value.as_ref() {
            if let ast::Constant::Str(s) = &constant.value {
                return Some(s.clone());
            }
        }
    }
    None
}
