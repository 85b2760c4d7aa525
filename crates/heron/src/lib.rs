#![doc = include_str!("../../../README.md")]
mod comprehension;
mod config;
mod error;
mod eval;
mod expr;
mod heap;
mod intern;
mod lexer;
mod loader;
mod object;
mod ops;
mod parse;
mod program;
mod run;
mod scope;
mod stmt;
mod value;
mod vm;

pub use crate::{
    config::Config,
    error::{ErrorKind, HeronError},
    eval::{eval, exec_block, exec_stmts},
    expr::{BinaryOp, Expr, Literal, UnaryOp},
    intern::{Interner, StringId},
    object::HeronObject,
    program::{FunctionDef, ModuleId, Param, Program},
    run::Interpreter,
    stmt::Stmt,
    value::Value,
    vm::Vm,
};
