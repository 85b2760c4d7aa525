//! The statement AST.
//!
//! Statements are deliberately minimal: exactly what expression evaluation
//! observes (scope push/pop, the return flag) plus the declarations and
//! control flow needed to write real modules. Sequencing semantics beyond
//! that live outside the core.

use ahash::AHashSet;

use crate::expr::Expr;
use crate::intern::StringId;
use crate::program::FunctionDef;

/// A statement in a function body or block.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// An expression evaluated for its effect; the value is discarded.
    Expr(Expr),
    /// `var name = init;`: declares a new binding in the innermost scope.
    VarDecl { name: StringId, init: Option<Expr> },
    /// `return expr;`: sets the frame's return value and raises the return flag.
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `foreach (var in source) { ... }`: iterates a sequence in order.
    Foreach {
        var: StringId,
        source: Expr,
        body: Vec<Stmt>,
    },
    /// A nested block with its own scope.
    Block(Vec<Stmt>),
}

impl Stmt {
    /// Yields the expressions directly contained in this statement.
    pub fn expressions(&self) -> impl Iterator<Item = &Expr> + '_ {
        let mut exprs: Vec<&Expr> = Vec::new();
        match self {
            Self::Expr(e) => exprs.push(e),
            Self::VarDecl { init, .. } => exprs.extend(init.iter()),
            Self::Return(e) => exprs.extend(e.iter()),
            Self::If { cond, .. } => exprs.push(cond),
            Self::While { cond, .. } => exprs.push(cond),
            Self::Foreach { source, .. } => exprs.push(source),
            Self::Block(_) => {}
        }
        exprs.into_iter()
    }

    /// Yields the nested statement blocks of this statement.
    fn blocks(&self) -> impl Iterator<Item = &[Stmt]> + '_ {
        let mut blocks: Vec<&[Stmt]> = Vec::new();
        match self {
            Self::If {
                then_body,
                else_body,
                ..
            } => {
                blocks.push(then_body);
                blocks.push(else_body);
            }
            Self::While { body, .. } | Self::Foreach { body, .. } => blocks.push(body),
            Self::Block(body) => blocks.push(body),
            Self::Expr(_) | Self::VarDecl { .. } | Self::Return(_) => {}
        }
        blocks.into_iter()
    }
}

/// Computes the free variables of a function definition.
///
/// A name is free when it is referenced somewhere in the body but bound
/// neither by a parameter nor by any local declaration (`var`, `foreach`
/// variables, comprehension variables). Nested anonymous functions
/// contribute their own free variables, minus whatever the outer body binds.
///
/// The result preserves first-use order and contains no duplicates; closure
/// construction snapshots the current binding of each name that resolves in
/// the enclosing environment.
pub fn free_variables(def: &FunctionDef) -> Vec<StringId> {
    let mut bound: AHashSet<StringId> = def.params.iter().map(|p| p.name).collect();
    // Locals bind for the whole body: Heron declarations are hoisted for the
    // purposes of capture, so a later `var x` keeps an earlier use of `x`
    // from being captured from the enclosing scope.
    collect_locals(&def.body, &mut bound);

    let mut free = Vec::new();
    let mut seen = AHashSet::new();
    collect_free_in_block(&def.body, &bound, &mut seen, &mut free);
    free
}

fn collect_locals(body: &[Stmt], bound: &mut AHashSet<StringId>) {
    for stmt in body {
        match stmt {
            Stmt::VarDecl { name, .. } => {
                bound.insert(*name);
            }
            Stmt::Foreach { var, .. } => {
                bound.insert(*var);
            }
            _ => {}
        }
        for block in stmt.blocks() {
            collect_locals(block, bound);
        }
    }
}

fn collect_free_in_block(
    body: &[Stmt],
    bound: &AHashSet<StringId>,
    seen: &mut AHashSet<StringId>,
    free: &mut Vec<StringId>,
) {
    for stmt in body {
        for expr in stmt.expressions() {
            collect_free_in_expr(expr, bound, seen, free);
        }
        for block in stmt.blocks() {
            collect_free_in_block(block, bound, seen, free);
        }
    }
}

fn collect_free_in_expr(
    expr: &Expr,
    bound: &AHashSet<StringId>,
    seen: &mut AHashSet<StringId>,
    free: &mut Vec<StringId>,
) {
    let mut note = |name: StringId| {
        if !bound.contains(&name) && seen.insert(name) {
            free.push(name);
        }
    };
    match expr {
        Expr::Name(name) => note(*name),
        // A nested closure's free variables are free here too unless the
        // outer body binds them.
        Expr::Function(def) => {
            for name in free_variables(def) {
                note(name);
            }
        }
        // Comprehension variables bind only within their own node; shadow
        // them while walking the dependent sub-expressions.
        Expr::Select {
            var,
            source,
            predicate,
        } => {
            collect_free_in_expr(source, bound, seen, free);
            let inner = with_bound(bound, &[*var]);
            collect_free_in_expr(predicate, &inner, seen, free);
        }
        Expr::MapEach {
            var,
            source,
            yield_expr,
        } => {
            collect_free_in_expr(source, bound, seen, free);
            let inner = with_bound(bound, &[*var]);
            collect_free_in_expr(yield_expr, &inner, seen, free);
        }
        Expr::Accumulate {
            acc,
            init,
            each,
            source,
            step,
        } => {
            collect_free_in_expr(init, bound, seen, free);
            collect_free_in_expr(source, bound, seen, free);
            let inner = with_bound(bound, &[*acc, *each]);
            collect_free_in_expr(step, &inner, seen, free);
        }
        Expr::Reduce {
            left,
            right,
            source,
            combine,
        } => {
            collect_free_in_expr(source, bound, seen, free);
            let inner = with_bound(bound, &[*left, *right]);
            collect_free_in_expr(combine, &inner, seen, free);
        }
        _ => {
            for child in expr.sub_expressions() {
                collect_free_in_expr(child, bound, seen, free);
            }
        }
    }
}

fn with_bound(bound: &AHashSet<StringId>, extra: &[StringId]) -> AHashSet<StringId> {
    let mut inner = bound.clone();
    inner.extend(extra.iter().copied());
    inner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use crate::program::{FunctionDef, Param};

    fn def(params: &[StringId], body: Vec<Stmt>) -> FunctionDef {
        FunctionDef {
            name: crate::intern::known::ANONYMOUS,
            params: params
                .iter()
                .map(|&name| Param {
                    name,
                    type_name: None,
                })
                .collect(),
            return_type: None,
            body,
            module: crate::program::ModuleId::GLOBAL,
        }
    }

    #[test]
    fn params_and_locals_are_not_free() {
        let mut names = Interner::new();
        let (a, b, c) = (names.intern("a"), names.intern("b"), names.intern("c"));
        let body = vec![
            Stmt::VarDecl {
                name: b,
                init: Some(Expr::Name(c)),
            },
            Stmt::Return(Some(Expr::Binary {
                op: crate::expr::BinaryOp::Add,
                left: Box::new(Expr::Name(a)),
                right: Box::new(Expr::Name(b)),
            })),
        ];
        assert_eq!(free_variables(&def(&[a], body)), vec![c]);
    }

    #[test]
    fn comprehension_variables_shadow() {
        let mut names = Interner::new();
        let (x, xs) = (names.intern("x"), names.intern("xs"));
        let body = vec![Stmt::Return(Some(Expr::MapEach {
            var: x,
            source: Box::new(Expr::Name(xs)),
            yield_expr: Box::new(Expr::Name(x)),
        }))];
        assert_eq!(free_variables(&def(&[], body)), vec![xs]);
    }

    #[test]
    fn nested_function_free_vars_propagate() {
        let mut names = Interner::new();
        let (x, y) = (names.intern("x"), names.intern("y"));
        let inner = def(&[x], vec![Stmt::Return(Some(Expr::Name(y)))]);
        let outer = def(
            &[],
            vec![Stmt::Expr(Expr::Function(std::sync::Arc::new(inner)))],
        );
        assert_eq!(free_variables(&outer), vec![y]);
    }
}
