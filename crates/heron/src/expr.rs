//! The expression AST.
//!
//! Expressions are immutable once constructed by the parser. Every node can
//! enumerate its direct children through [`Expr::sub_expressions`], which
//! drives tree traversal and free-variable analysis, and can render itself
//! back to source-like text through `Display`, which is what failure
//! diagnostics quote.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use strum::Display;

use crate::intern::{Interner, StringId};
use crate::program::FunctionDef;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOp {
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "~")]
    BitNot,
}

/// Binary operators, including the type tests `is` and `as`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Rem,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "^^")]
    Xor,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "as")]
    As,
}

/// Literal values carried directly in the tree.
///
/// These are detached from the runtime heap; they become real
/// [`Value`](crate::value::Value)s only when evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    /// An interned string literal; the text lives in the interner.
    Str(StringId),
}

/// An expression in the AST.
#[derive(Debug, Clone)]
pub enum Expr {
    /// The `null` literal.
    Null,
    Literal(Literal),
    Name(StringId),
    /// Assignment; the target must be a `Name`, `Field`, or `Index` node.
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Field {
        receiver: Box<Expr>,
        name: StringId,
    },
    Index {
        collection: Box<Expr>,
        index: Box<Expr>,
    },
    New {
        type_name: StringId,
        args: Vec<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// An anonymous function; evaluates to a closure capturing its free
    /// variables from the enclosing environment.
    Function(Arc<FunctionDef>),
    /// `target++`: reads the target, assigns `target + 1`, yields the old value.
    PostIncrement {
        target: Box<Expr>,
    },
    /// `[a, b, c]`; evaluates to a fresh list.
    Tuple(Vec<Expr>),
    /// `select (var from source) where predicate`
    Select {
        var: StringId,
        source: Box<Expr>,
        predicate: Box<Expr>,
    },
    /// `mapeach (var in source) yield`
    MapEach {
        var: StringId,
        source: Box<Expr>,
        yield_expr: Box<Expr>,
    },
    /// `accumulate (acc = init forall each in source) step`
    Accumulate {
        acc: StringId,
        init: Box<Expr>,
        each: StringId,
        source: Box<Expr>,
        step: Box<Expr>,
    },
    /// `reduce (left, right in source) combine`: an associative parallel fold.
    Reduce {
        left: StringId,
        right: StringId,
        source: Box<Expr>,
        combine: Box<Expr>,
    },
}

impl Expr {
    /// Yields each direct child expression exactly once.
    ///
    /// Function bodies are statement blocks, not expressions, so
    /// `Expr::Function` has no expression children here; free-variable
    /// analysis descends into bodies separately (see [`crate::stmt`]).
    pub fn sub_expressions(&self) -> impl Iterator<Item = &Expr> + '_ {
        let mut children: SmallVec<[&Expr; 4]> = SmallVec::new();
        match self {
            Self::Null | Self::Literal(_) | Self::Name(_) | Self::Function(_) => {}
            Self::Assign { target, value } => {
                children.push(target);
                children.push(value);
            }
            Self::Field { receiver, .. } => children.push(receiver),
            Self::Index { collection, index } => {
                children.push(collection);
                children.push(index);
            }
            Self::New { args, .. } => children.extend(args.iter()),
            Self::Call { callee, args } => {
                children.push(callee);
                children.extend(args.iter());
            }
            Self::Unary { operand, .. } => children.push(operand),
            Self::Binary { left, right, .. } => {
                children.push(left);
                children.push(right);
            }
            Self::PostIncrement { target } => children.push(target),
            Self::Tuple(items) => children.extend(items.iter()),
            Self::Select {
                source, predicate, ..
            } => {
                children.push(source);
                children.push(predicate);
            }
            Self::MapEach {
                source, yield_expr, ..
            } => {
                children.push(source);
                children.push(yield_expr);
            }
            Self::Accumulate {
                init, source, step, ..
            } => {
                children.push(init);
                children.push(source);
                children.push(step);
            }
            Self::Reduce {
                source, combine, ..
            } => {
                children.push(source);
                children.push(combine);
            }
        }
        children.into_iter()
    }

    /// Renders the expression as source-like text using `interner` for names.
    pub fn render(&self, interner: &Interner) -> String {
        Rendered {
            expr: self,
            interner,
        }
        .to_string()
    }
}

/// Pairs an expression with an interner so `Display` can spell out names.
struct Rendered<'a> {
    expr: &'a Expr,
    interner: &'a Interner,
}

impl Rendered<'_> {
    fn child<'b>(&'b self, expr: &'b Expr) -> Rendered<'b> {
        Rendered {
            expr,
            interner: self.interner,
        }
    }

    /// Wraps compound sub-expressions in parentheses so the rendering stays
    /// unambiguous without tracking the parser's precedence table.
    fn operand<'b>(&'b self, expr: &'b Expr) -> String {
        match expr {
            Expr::Null | Expr::Literal(_) | Expr::Name(_) | Expr::Tuple(_) => {
                self.child(expr).to_string()
            }
            _ => format!("({})", self.child(expr)),
        }
    }

    fn comma_list(&self, f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.child(item))?;
        }
        Ok(())
    }
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.interner;
        match self.expr {
            Expr::Null => f.write_str("null"),
            Expr::Literal(lit) => match lit {
                Literal::Bool(b) => write!(f, "{b}"),
                Literal::Int(v) => write!(f, "{v}"),
                Literal::Float(v) => write!(f, "{}", crate::object::format_float(*v)),
                Literal::Char(c) => write!(f, "'{c}'"),
                Literal::Str(id) => write!(f, "\"{}\"", names.get(*id)),
            },
            Expr::Name(id) => f.write_str(names.get(*id)),
            Expr::Assign { target, value } => {
                write!(f, "{} = {}", self.child(target), self.child(value))
            }
            Expr::Field { receiver, name } => {
                write!(f, "{}.{}", self.operand(receiver), names.get(*name))
            }
            Expr::Index { collection, index } => {
                write!(f, "{}[{}]", self.operand(collection), self.child(index))
            }
            Expr::New { type_name, args } => {
                write!(f, "new {}(", names.get(*type_name))?;
                self.comma_list(f, args)?;
                f.write_str(")")
            }
            Expr::Call { callee, args } => {
                write!(f, "{}(", self.operand(callee))?;
                self.comma_list(f, args)?;
                f.write_str(")")
            }
            Expr::Unary { op, operand } => write!(f, "{op}{}", self.operand(operand)),
            Expr::Binary { op, left, right } => {
                write!(f, "{} {op} {}", self.operand(left), self.operand(right))
            }
            Expr::Function(def) => {
                f.write_str("function (")?;
                for (i, param) in def.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    f.write_str(names.get(param.name))?;
                }
                f.write_str(") { ... }")
            }
            Expr::PostIncrement { target } => write!(f, "{}++", self.operand(target)),
            Expr::Tuple(items) => {
                f.write_str("[")?;
                self.comma_list(f, items)?;
                f.write_str("]")
            }
            Expr::Select {
                var,
                source,
                predicate,
            } => write!(
                f,
                "select ({} from {}) where {}",
                names.get(*var),
                self.child(source),
                self.child(predicate)
            ),
            Expr::MapEach {
                var,
                source,
                yield_expr,
            } => write!(
                f,
                "mapeach ({} in {}) {}",
                names.get(*var),
                self.child(source),
                self.child(yield_expr)
            ),
            Expr::Accumulate {
                acc,
                init,
                each,
                source,
                step,
            } => write!(
                f,
                "accumulate ({} = {} forall {} in {}) {}",
                names.get(*acc),
                self.child(init),
                names.get(*each),
                self.child(source),
                self.child(step)
            ),
            Expr::Reduce {
                left,
                right,
                source,
                combine,
            } => write!(
                f,
                "reduce ({}, {} in {}) {}",
                names.get(*left),
                names.get(*right),
                self.child(source),
                self.child(combine)
            ),
        }
    }
}
