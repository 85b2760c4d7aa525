//! Lexical scopes and activation records.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::intern::StringId;
use crate::program::{FunctionDef, ModuleId};
use crate::value::Value;

/// An insertion-ordered mapping from names to values.
///
/// Used for lexical scopes, closure capture snapshots, and instance field
/// maps alike. Declaration refuses to shadow within the same scope;
/// assignment refuses to create.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: IndexMap<StringId, Value, ahash::RandomState>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new binding. Returns `false` if the name is already present
    /// at this scope.
    pub fn declare(&mut self, name: StringId, value: Value) -> bool {
        if self.bindings.contains_key(&name) {
            return false;
        }
        self.bindings.insert(name, value);
        true
    }

    /// Replaces an existing binding. Returns `false` if the name is absent.
    pub fn assign(&mut self, name: StringId, value: Value) -> bool {
        match self.bindings.get_mut(&name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Sets the binding if it exists, otherwise adds it.
    pub fn set_or_add(&mut self, name: StringId, value: Value) {
        self.bindings.insert(name, value);
    }

    #[must_use]
    pub fn lookup(&self, name: StringId) -> Option<&Value> {
        self.bindings.get(&name)
    }

    #[must_use]
    pub fn contains(&self, name: StringId) -> bool {
        self.bindings.contains_key(&name)
    }

    pub fn names(&self) -> impl Iterator<Item = StringId> + '_ {
        self.bindings.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StringId, &Value)> + '_ {
        self.bindings.iter().map(|(name, value)| (*name, value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl FromIterator<(StringId, Value)> for Scope {
    fn from_iter<I: IntoIterator<Item = (StringId, Value)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// An activation record.
///
/// Frames do not inherit scopes from their caller: the caller's locals are
/// invisible inside a called function. A closure's captured variables enter
/// as the frame's outermost scope, pushed before the parameter scope.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The active function, `None` for the synthetic top-level frame.
    pub function: Option<Arc<FunctionDef>>,
    /// The bound receiver (class or module instance), if any.
    pub receiver: Option<Value>,
    /// Module whose type table this frame resolves names against.
    pub module: ModuleId,
    scopes: Vec<Scope>,
}

impl Frame {
    pub fn top_level(module: ModuleId) -> Self {
        Self {
            function: None,
            receiver: None,
            module,
            scopes: vec![Scope::new()],
        }
    }

    pub fn call(function: Arc<FunctionDef>, receiver: Option<Value>) -> Self {
        let module = function.module;
        Self {
            function: Some(function),
            receiver,
            module,
            scopes: Vec::new(),
        }
    }

    /// Frame used while running field initializers of a fresh instance.
    pub fn initializer(module: ModuleId, receiver: Value) -> Self {
        Self {
            function: None,
            receiver: Some(receiver),
            module,
            scopes: vec![Scope::new()],
        }
    }

    pub fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Looks a name up through the scope stack, innermost first.
    #[must_use]
    pub fn lookup(&self, name: StringId) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.lookup(name))
    }

    #[must_use]
    pub fn has_var(&self, name: StringId) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    /// Replaces the innermost existing binding of `name`.
    pub fn assign(&mut self, name: StringId, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if scope.assign(name, value.clone()) {
                return true;
            }
        }
        false
    }

    /// Declares a binding in the innermost scope.
    pub fn declare(&mut self, name: StringId, value: Value) -> bool {
        match self.scopes.last_mut() {
            Some(scope) => scope.declare(name, value),
            None => false,
        }
    }
}
