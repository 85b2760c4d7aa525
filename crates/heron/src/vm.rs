//! The evaluation machine: a stack of frames over a shared program.
//!
//! The `Vm` owns the heap and the frame stack and exposes the hooks the
//! statement executor drives: scope and frame lifecycle, variable and field
//! access, and the return flag. Scopes and frames are strictly LIFO;
//! [`Vm::with_scope`] and [`Vm::with_frame`] guarantee release on every exit
//! path, success or failure.
//!
//! `reduce` workers run on [`Vm::fork`]s: disjoint evaluator state sharing
//! only the immutable program descriptors (by reference) and the aggregate
//! values reachable from the cloned heap (by handle).

use crate::error::{err, ErrorKind, EvalResult};
use crate::heap::Heap;
use crate::intern::StringId;
use crate::program::{ModuleId, Program};
use crate::scope::{Frame, Scope};
use crate::value::Value;

/// Evaluator state for one execution.
#[derive(Debug)]
pub struct Vm<'p> {
    program: &'p Program,
    pub(crate) heap: Heap,
    frames: Vec<Frame>,
    return_slot: Option<Value>,
    returning: bool,
    max_threads: usize,
}

impl<'p> Vm<'p> {
    /// Creates a machine with a single empty top-level frame.
    pub fn new(program: &'p Program, max_threads: usize) -> Self {
        Self {
            program,
            heap: Heap::default(),
            frames: vec![Frame::top_level(ModuleId::GLOBAL)],
            return_slot: None,
            returning: false,
            max_threads: max_threads.max(1),
        }
    }

    #[must_use]
    pub fn program(&self) -> &'p Program {
        self.program
    }

    #[must_use]
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    #[must_use]
    pub fn frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty")
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    #[must_use]
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.frame().scope_depth()
    }

    /// Forks this machine for a parallel worker.
    ///
    /// The fork gets its own frame stack seeded with a copy of the current
    /// frame (so names visible here stay resolvable) and a clone of the
    /// arena, keeping every outstanding handle valid. The program is shared;
    /// the reduce contract forbids workers from mutating shared aggregates.
    #[must_use]
    pub fn fork(&self) -> Vm<'p> {
        Vm {
            program: self.program,
            heap: self.heap.clone(),
            frames: vec![self.frame().clone()],
            return_slot: None,
            returning: false,
            max_threads: self.max_threads,
        }
    }

    /// Consumes the machine, releasing its heap. Used when a reduce worker
    /// parks its state for the merge step.
    #[must_use]
    pub(crate) fn into_heap(self) -> Heap {
        self.heap
    }

    // ---- scope and frame lifecycle -------------------------------------

    pub fn push_scope(&mut self) {
        self.frame_mut().push_scope(Scope::new());
    }

    pub fn push_scope_with(&mut self, scope: Scope) {
        self.frame_mut().push_scope(scope);
    }

    pub fn pop_scope(&mut self) {
        let popped = self.frame_mut().pop_scope();
        debug_assert!(popped.is_some(), "pop_scope on an empty scope stack");
    }

    /// Runs `body` inside a fresh scope, popping it on every exit path.
    pub fn with_scope<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        self.scoped(Scope::new(), body)
    }

    /// Runs `body` with `scope` pushed, popping it on every exit path.
    pub fn scoped<T>(
        &mut self,
        scope: Scope,
        body: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        self.push_scope_with(scope);
        let result = body(self);
        self.pop_scope();
        result
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        if self.frames.len() == 1 {
            return None;
        }
        self.frames.pop()
    }

    /// Runs `body` inside `frame`, popping it on every exit path. Failures
    /// pick up a call-stack entry naming the frame as they unwind.
    pub fn with_frame<T>(
        &mut self,
        frame: Frame,
        body: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        self.frames.push(frame);
        let result = body(self);
        let frame = self.frames.pop().expect("frame pushed above");
        result.map_err(|e| e.note_frame(self.describe_frame(&frame)))
    }

    fn describe_frame(&self, frame: &Frame) -> String {
        let module = self.program.interner.get(self.program.module(frame.module).name);
        match &frame.function {
            Some(def) => format!("{module}.{}", self.program.interner.get(def.name)),
            None => format!("{module}.<top-level>"),
        }
    }

    // ---- variables ------------------------------------------------------

    /// Declares a new binding in the innermost scope of the current frame.
    pub fn add_var(&mut self, name: StringId, value: Value) -> EvalResult<()> {
        if self.frame_mut().declare(name, value) {
            Ok(())
        } else {
            err!(
                NotAssignable;
                "'{}' is already declared in this scope",
                self.program.interner.get(name)
            )
        }
    }

    /// Replaces an existing binding in the current frame, falling back to a
    /// field of the current receiver.
    pub fn set_var(&mut self, name: StringId, value: Value) -> EvalResult<()> {
        if self.frame_mut().assign(name, value.clone()) {
            return Ok(());
        }
        if let Some(receiver) = self.frame().receiver.clone() {
            if receiver.has_field(name, &self.heap) {
                return receiver.set_field(name, value, &mut self.heap, self.program);
            }
        }
        err!(
            NotAssignable;
            "no assignable variable or field named '{}'",
            self.program.interner.get(name)
        )
    }

    #[must_use]
    pub fn has_var(&self, name: StringId) -> bool {
        self.frame().has_var(name)
    }

    #[must_use]
    pub fn get_var(&self, name: StringId) -> Option<Value> {
        self.frame().lookup(name).cloned()
    }

    /// Resolves a name: frame scopes innermost-first (the closure capture
    /// scope sits at the bottom of the stack), then the receiver's fields
    /// and methods, then the current module's type table, then the global
    /// module's.
    pub fn lookup_name(&mut self, name: StringId) -> EvalResult<Value> {
        if let Some(value) = self.frame().lookup(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.receiver_member(name)? {
            return Ok(value);
        }
        if let Some(type_id) = self.program.lookup_type(self.frame().module, name) {
            return Ok(Value::Type(type_id));
        }
        err!(
            NameNotFound;
            "no variable, field, or type named '{}'",
            self.program.interner.get(name)
        )
    }

    /// Probes the current receiver for a field or bound method without
    /// turning "not there" into a failure.
    fn receiver_member(&mut self, name: StringId) -> EvalResult<Option<Value>> {
        let Some(receiver) = self.frame().receiver.clone() else {
            return Ok(None);
        };
        match receiver.get_field_or_method(name, &mut self.heap, self.program) {
            Ok(value) => Ok(Some(value)),
            Err(e)
                if matches!(
                    e.kind,
                    ErrorKind::NoSuchField | ErrorKind::UnsupportedOperation
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // ---- receiver fields ------------------------------------------------

    #[must_use]
    pub fn has_field(&self, name: StringId) -> bool {
        self.frame()
            .receiver
            .as_ref()
            .is_some_and(|r| r.has_field(name, &self.heap))
    }

    pub fn get_field(&mut self, name: StringId) -> EvalResult<Value> {
        match self.frame().receiver.clone() {
            Some(receiver) => receiver.get_field_or_method(name, &mut self.heap, self.program),
            None => err!(NoSuchField; "no receiver in the current frame"),
        }
    }

    pub fn set_field(&mut self, name: StringId, value: Value) -> EvalResult<()> {
        match self.frame().receiver.clone() {
            Some(receiver) => receiver.set_field(name, value, &mut self.heap, self.program),
            None => err!(NoSuchField; "no receiver in the current frame"),
        }
    }

    // ---- return flag ----------------------------------------------------

    /// Records a return value and raises the return flag.
    pub fn return_value(&mut self, value: Value) {
        self.return_slot = Some(value);
        self.returning = true;
    }

    /// Consumes a pending return, clearing the flag.
    pub fn take_return(&mut self) -> Option<Value> {
        self.returning = false;
        self.return_slot.take()
    }

    /// True while a return is propagating and statements should unwind.
    #[must_use]
    pub fn should_exit_scope(&self) -> bool {
        self.returning
    }

    /// Renders an expression for diagnostics.
    #[must_use]
    pub fn render(&self, expr: &crate::expr::Expr) -> String {
        expr.render(&self.program.interner)
    }
}
