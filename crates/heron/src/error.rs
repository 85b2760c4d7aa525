//! Failure reporting for parsing, loading, and evaluation.
//!
//! The interpreter never recovers locally from a failure: every error value
//! unwinds through the scope and frame guards up to the public entry points,
//! collecting context on the way. [`HeronError`] carries the error kind, a
//! human message, the rendered source of the innermost failing expression,
//! and a call-stack summary built as frames unwind.

use std::fmt;

use strum::Display;

/// The closed taxonomy of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    ParseError,
    NameNotFound,
    NotAssignable,
    NoSuchField,
    NullDereference,
    NotAType,
    TypeMismatch,
    IncompatibleTypes,
    UnsupportedOperation,
    DivisionByZero,
    ArityMismatch,
    NotCallable,
    NoEntryPoint,
    ModuleNotFound,
    CircularModuleDependency,
    InternalInvariantViolation,
}

/// A failure produced anywhere in the interpreter.
///
/// `expr` holds the textual rendering of the innermost expression that was
/// being evaluated when the failure occurred; `stack` holds one entry per
/// unwound call frame, outermost last.
#[derive(Debug, Clone)]
pub struct HeronError {
    pub kind: ErrorKind,
    pub message: String,
    pub expr: Option<String>,
    pub stack: Vec<String>,
}

impl HeronError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            expr: None,
            stack: Vec::new(),
        }
    }

    /// Records the failing expression's source text, keeping the innermost one.
    pub(crate) fn note_expr(mut self, render: impl FnOnce() -> String) -> Self {
        if self.expr.is_none() {
            self.expr = Some(render());
        }
        self
    }

    /// Appends a call-frame summary while the failure unwinds.
    pub(crate) fn note_frame(mut self, frame: String) -> Self {
        self.stack.push(frame);
        self
    }
}

impl fmt::Display for HeronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(expr) = &self.expr {
            write!(f, "\n  while evaluating: {expr}")?;
        }
        for frame in &self.stack {
            write!(f, "\n  in {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for HeronError {}

/// Result alias used throughout the evaluator.
pub type EvalResult<T> = Result<T, HeronError>;

/// Builds an `Err(HeronError)` with a formatted message.
///
/// ```ignore
/// return err!(DivisionByZero; "integer division by zero");
/// ```
macro_rules! err {
    ($kind:ident; $($fmt:tt)*) => {
        Err($crate::error::HeronError::new(
            $crate::error::ErrorKind::$kind,
            format!($($fmt)*),
        ))
    };
}

pub(crate) use err;
