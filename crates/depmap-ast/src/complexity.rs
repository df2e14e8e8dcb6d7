//! Complexity measures over the parsed AST.
//!
//! Cyclomatic complexity: base 1 per function, plus one for each `if`,
//! `for`/async-for, `while`, `except` handler and comprehension clause, and
//! one per additional operand of a boolean chain (`a and b and c` adds two).
//! Nested function and class bodies are part of the walk, so a method's
//! complexity includes the decision points of its inner defs.
//!
//! Cognitive complexity weights branch points by their nesting depth (an
//! `if` three levels deep reads worse than one at the top), and the same
//! walk tracks the maximum nesting depth.

use rustpython_ast as ast;

pub(crate) fn cyclomatic(body: &[ast::Stmt]) -> u32 {
    1 + body_complexity(body)
}

fn body_complexity(body: &[ast::Stmt]) -> u32 {
    body.iter().map(stmt_complexity).sum()
}

fn stmt_complexity(stmt: &ast::Stmt) -> u32 {
    match stmt {
        ast::Stmt::If(s) => {
            1 + expr_complexity(&s.test) + body_complexity(&s.body) + body_complexity(&s.orelse)
        }
        ast::Stmt::While(s) => {
            1 + expr_complexity(&s.test) + body_complexity(&s.body) + body_complexity(&s.orelse)
        }
        ast::Stmt::For(s) => {
            1 + expr_complexity(&s.iter) + body_complexity(&s.body) + body_complexity(&s.orelse)
        }
        ast::Stmt::AsyncFor(s) => {
            1 + expr_complexity(&s.iter) + body_complexity(&s.body) + body_complexity(&s.orelse)
        }
        ast::Stmt::Try(s) => {
            let handlers: u32 = s
                .handlers
                .iter()
                .map(|handler| {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    1 + body_complexity(&h.body)
                })
                .sum();
            body_complexity(&s.body) + handlers + body_complexity(&s.orelse) + body_complexity(&s.finalbody)
        }
        ast::Stmt::With(s) => {
            let items: u32 = s.items.iter().map(|i| expr_complexity(&i.context_expr)).sum();
            items + body_complexity(&s.body)
        }
        ast::Stmt::AsyncWith(s) => {
            let items: u32 = s.items.iter().map(|i| expr_complexity(&i.context_expr)).sum();
            items + body_complexity(&s.body)
        }
        ast::Stmt::FunctionDef(s) => body_complexity(&s.body),
        ast::Stmt::AsyncFunctionDef(s) => body_complexity(&s.body),
        ast::Stmt::ClassDef(s) => body_complexity(&s.body),
        ast::Stmt::Return(s) => s.value.as_deref().map_or(0, expr_complexity),
        ast::Stmt::Assign(s) => expr_complexity(&s.value),
        ast::Stmt::AugAssign(s) => expr_complexity(&s.value),
        ast::Stmt::AnnAssign(s) => s.value.as_deref().map_or(0, expr_complexity),
        ast::Stmt::Expr(s) => expr_complexity(&s.value),
        ast::Stmt::Assert(s) => {
            expr_complexity(&s.test) + s.msg.as_deref().map_or(0, expr_complexity)
        }
        ast::Stmt::Raise(s) => s.exc.as_deref().map_or(0, expr_complexity),
        _ => 0,
    }
}

fn expr_complexity(expr: &ast::Expr) -> u32 {
    match expr {
        // `a and b and c` is one chain with three operands: two extra paths.
        ast::Expr::BoolOp(op) => {
            let operands: u32 = op.values.iter().map(expr_complexity).sum();
            (op.values.len().saturating_sub(1)) as u32 + operands
        }
        ast::Expr::ListComp(comp) => {
            comprehension_complexity(&comp.generators) + expr_complexity(&comp.elt)
        }
        ast::Expr::SetComp(comp) => {
            comprehension_complexity(&comp.generators) + expr_complexity(&comp.elt)
        }
        ast::Expr::GeneratorExp(comp) => {
            comprehension_complexity(&comp.generators) + expr_complexity(&comp.elt)
        }
        ast::Expr::DictComp(comp) => {
            comprehension_complexity(&comp.generators)
                + expr_complexity(&comp.key)
                + expr_complexity(&comp.value)
        }
        ast::Expr::BinOp(op) => expr_complexity(&op.left) + expr_complexity(&op.right),
        ast::Expr::UnaryOp(op) => expr_complexity(&op.operand),
        ast::Expr::IfExp(e) => {
            expr_complexity(&e.test) + expr_complexity(&e.body) + expr_complexity(&e.orelse)
        }
        ast::Expr::Compare(cmp) => {
            expr_complexity(&cmp.left) + cmp.comparators.iter().map(expr_complexity).sum::<u32>()
        }
        ast::Expr::Call(call) => {
            expr_complexity(&call.func)
                + call.args.iter().map(expr_complexity).sum::<u32>()
                + call.keywords.iter().map(|k| expr_complexity(&k.value)).sum::<u32>()
        }
        ast::Expr::Attribute(attr) => expr_complexity(&attr.value),
        ast::Expr::Subscript(sub) => expr_complexity(&sub.value) + expr_complexity(&sub.slice),
        ast::Expr::Lambda(lambda) => expr_complexity(&lambda.body),
        ast::Expr::Await(e) => expr_complexity(&e.value),
        ast::Expr::Starred(e) => expr_complexity(&e.value),
        ast::Expr::NamedExpr(e) => expr_complexity(&e.value),
        ast::Expr::List(e) => e.elts.iter().map(expr_complexity).sum(),
        ast::Expr::Tuple(e) => e.elts.iter().map(expr_complexity).sum(),
        ast::Expr::Set(e) => e.elts.iter().map(expr_complexity).sum(),
        ast::Expr::Dict(e) => {
            e.keys.iter().flatten().map(expr_complexity).sum::<u32>()
                + e.values.iter().map(expr_complexity).sum::<u32>()
        }
        _ => 0,
    }
}

fn comprehension_complexity(generators: &[ast::Comprehension]) -> u32 {
    generators
        .iter()
        .map(|g| {
            1 + expr_complexity(&g.iter) + g.ifs.iter().map(expr_complexity).sum::<u32>()
        })
        .sum()
}

/// Cognitive complexity and maximum nesting depth of a function body.
///
/// Each `if`/`for`/`while` costs `1 + nesting`, an `except` handler costs
/// one, and `if`/`for`/`while`/`try`/`with` bodies nest one level deeper.
pub(crate) fn cognitive(body: &[ast::Stmt]) -> (u32, usize) {
    cognitive_body(body, 0)
}

fn cognitive_body(body: &[ast::Stmt], depth: usize) -> (u32, usize) {
    let mut total = 0;
    let mut max_depth = depth;
    for stmt in body {
        let (cost, reached) = cognitive_stmt(stmt, depth);
        total += cost;
        max_depth = max_depth.max(reached);
    }
    (total, max_depth)
}

fn cognitive_stmt(stmt: &ast::Stmt, depth: usize) -> (u32, usize) {
    match stmt {
        ast::Stmt::If(s) => {
            let (body, body_depth) = cognitive_body(&s.body, depth + 1);
            let (orelse, orelse_depth) = cognitive_body(&s.orelse, depth + 1);
            (1 + depth as u32 + body + orelse, body_depth.max(orelse_depth))
        }
        ast::Stmt::While(s) => {
            let (body, body_depth) = cognitive_body(&s.body, depth + 1);
            let (orelse, orelse_depth) = cognitive_body(&s.orelse, depth + 1);
            (1 + depth as u32 + body + orelse, body_depth.max(orelse_depth))
        }
        ast::Stmt::For(s) => {
            let (body, body_depth) = cognitive_body(&s.body, depth + 1);
            let (orelse, orelse_depth) = cognitive_body(&s.orelse, depth + 1);
            (1 + depth as u32 + body + orelse, body_depth.max(orelse_depth))
        }
        ast::Stmt::AsyncFor(s) => {
            let (body, body_depth) = cognitive_body(&s.body, depth + 1);
            let (orelse, orelse_depth) = cognitive_body(&s.orelse, depth + 1);
            (1 + depth as u32 + body + orelse, body_depth.max(orelse_depth))
        }
        ast::Stmt::Try(s) => {
            let mut cost = s.handlers.len() as u32;
            let (body, mut reached) = cognitive_body(&s.body, depth + 1);
            cost += body;
            for handler in &s.handlers {
                let ast::ExceptHandler::ExceptHandler(h) = handler;
                let (handler_cost, handler_depth) = cognitive_body(&h.body, depth + 1);
                cost += handler_cost;
                reached = reached.max(handler_depth);
            }
            let (orelse, orelse_depth) = cognitive_body(&s.orelse, depth + 1);
            let (finalbody, final_depth) = cognitive_body(&s.finalbody, depth + 1);
            cost += orelse + finalbody;
            (cost, reached.max(orelse_depth).max(final_depth))
        }
        ast::Stmt::With(s) => cognitive_body(&s.body, depth + 1),
        ast::Stmt::AsyncWith(s) => cognitive_body(&s.body, depth + 1),
        // Inner defs keep the surrounding depth, like the rest of the walk.
        ast::Stmt::FunctionDef(s) => cognitive_body(&s.body, depth),
        ast::Stmt::AsyncFunctionDef(s) => cognitive_body(&s.body, depth),
        ast::Stmt::ClassDef(s) => cognitive_body(&s.body, depth),
        ast::Stmt::Match(s) => {
            let mut total = 0;
            let mut reached = depth;
            for case in &s.cases {
                let (cost, case_depth) = cognitive_body(&case.body, depth);
                total += cost;
                reached = reached.max(case_depth);
            }
            (total, reached)
        }
        _ => (0, depth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustpython_parser::{parse, Mode};

    fn complexity_of(source: &str) -> u32 {
        let parsed = parse(source, Mode::Module, "<test>").unwrap();
        let ast::Mod::Module(module) = parsed else {
            panic!("expected a module");
        };
        let ast::Stmt::FunctionDef(func) = &module.body[0] else {
            panic!("expected a function at the top of the test source");
        };
        cyclomatic(&func.body)
    }

    #[test]
    fn test_straight_line_is_one() {
        assert_eq!(complexity_of("def f():\n    return 42\n"), 1);
    }

    #[test]
    fn test_if_adds_one() {
        assert_eq!(complexity_of("def f(x):\n    if x:\n        return 1\n    return 0\n"), 2);
    }

    #[test]
    fn test_if_elif_adds_two() {
        let src = "def f(x):\n    if x > 1:\n        return 1\n    elif x > 0:\n        return 2\n    return 0\n";
        assert_eq!(complexity_of(src), 3);
    }

    #[test]
    fn test_loops_add_one_each() {
        let src = "def f(xs):\n    for x in xs:\n        while x:\n            x -= 1\n";
        assert_eq!(complexity_of(src), 3);
    }

    #[test]
    fn test_except_handlers_count() {
        let src = "def f():\n    try:\n        g()\n    except ValueError:\n        pass\n    except KeyError:\n        pass\n";
        assert_eq!(complexity_of(src), 3);
    }

    #[test]
    fn test_boolean_chain_counts_extra_operands() {
        // `a and b and c` is one chain of three operands: +2.
        assert_eq!(complexity_of("def f(a, b, c):\n    return a and b and c\n"), 3);
        // `a and b or c` is two chains of two: +2.
        assert_eq!(complexity_of("def f(a, b, c):\n    return a and b or c\n"), 3);
    }

    #[test]
    fn test_comprehension_clauses_count() {
        assert_eq!(complexity_of("def f(xs):\n    return [x for x in xs]\n"), 2);
        assert_eq!(
            complexity_of("def f(xs, ys):\n    return [x + y for x in xs for y in ys]\n"),
            3
        );
    }

    #[test]
    fn test_nested_function_bodies_are_included() {
        let src = "def f(x):\n    def g(y):\n        if y:\n            return 1\n        return 0\n    return g(x)\n";
        assert_eq!(complexity_of(src), 2);
    }

    fn cognitive_of(source: &str) -> (u32, usize) {
        let parsed = parse(source, Mode::Module, "<test>").unwrap();
        let ast::Mod::Module(module) = parsed else {
            panic!("expected a module");
        };
        let ast::Stmt::FunctionDef(func) = &module.body[0] else {
            panic!("expected a function at the top of the test source");
        };
        cognitive(&func.body)
    }

    #[test]
    fn test_cognitive_straight_line_is_zero() {
        assert_eq!(cognitive_of("def f():\n    return 42\n"), (0, 0));
    }

    #[test]
    fn test_cognitive_top_level_if_costs_one() {
        let src = "def f(x):\n    if x:\n        return 1\n    return 0\n";
        assert_eq!(cognitive_of(src), (1, 1));
    }

    #[test]
    fn test_cognitive_nested_branches_cost_their_depth() {
        // Outer if: 1 + 0; inner if: 1 + 1.
        let src = "def f(x):\n    if x:\n        if x > 1:\n            return 2\n    return 0\n";
        assert_eq!(cognitive_of(src), (3, 2));
    }

    #[test]
    fn test_cognitive_except_handlers_cost_one_each() {
        let src = "def f():\n    try:\n        g()\n    except ValueError:\n        pass\n    except KeyError:\n        pass\n";
        assert_eq!(cognitive_of(src), (2, 1));
    }

    #[test]
    fn test_nesting_counts_loops_and_with() {
        let src = "def f(xs):\n    with open('x') as h:\n        for x in xs:\n            while x:\n                x -= 1\n";
        let (_, nesting) = cognitive_of(src);
        assert_eq!(nesting, 3);
    }
}
