//! The arena backing aggregate runtime values.
//!
//! Aggregates (computed strings, lists, arrays, instances, closures) live in
//! an append-only arena and are referenced by [`HeapId`]; copying a `Value`
//! copies the handle, which is what gives aggregates reference semantics.
//! The arena is dropped wholesale with its owning [`Vm`](crate::vm::Vm);
//! memory management within a run is the host runtime's problem, not the
//! interpreter's.
//!
//! `Vm::fork` clones the whole arena so every outstanding handle stays valid
//! inside a reduce worker; [`Heap::transfer_from`] deep-copies a value graph
//! back across heap boundaries when a worker's result is merged.

use std::sync::Arc;

use ahash::AHashMap;

use crate::program::{FunctionDef, ModuleId, TypeId};
use crate::scope::Scope;
use crate::value::{Builtin, Value};

/// Handle to an entry in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(u32);

impl HeapId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A class instance: its class descriptor and mutable field map.
#[derive(Debug, Clone)]
pub struct Instance {
    pub class: TypeId,
    pub fields: Scope,
}

/// A module instance, produced once per `run_file`.
#[derive(Debug, Clone)]
pub struct ModuleInstance {
    pub module: ModuleId,
    pub fields: Scope,
}

/// An interface-typed view over a class instance.
///
/// Method dispatch goes through the interface's declared method set to the
/// underlying instance; identity is the identity of the target.
#[derive(Debug, Clone)]
pub struct InterfaceView {
    pub interface: TypeId,
    pub target: HeapId,
}

/// A function value: the shared definition, an optional bound receiver, and
/// the free-variable snapshot taken when the closure was constructed.
#[derive(Debug, Clone)]
pub struct Closure {
    pub def: Arc<FunctionDef>,
    pub receiver: Option<Value>,
    pub captured: Scope,
}

/// Everything that lives in the arena.
#[derive(Debug, Clone)]
pub enum HeapData {
    /// A computed (non-literal) string.
    Str(String),
    List(Vec<Value>),
    Array(Vec<Value>),
    Instance(Instance),
    Module(ModuleInstance),
    Interface(InterfaceView),
    Function(Closure),
    /// A built-in method bound to its receiver, e.g. `xs.Add`.
    BoundBuiltin { receiver: Value, builtin: Builtin },
}

/// Append-only arena of aggregate values.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    entries: Vec<HeapData>,
}

impl Heap {
    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(u32::try_from(self.entries.len()).expect("heap overflow"));
        self.entries.push(data);
        id
    }

    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.entries[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.entries[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves interface views to the instance they wrap; other handles are
    /// returned unchanged. Identity comparisons go through this.
    #[must_use]
    pub fn identity_target(&self, id: HeapId) -> HeapId {
        match self.get(id) {
            HeapData::Interface(view) => view.target,
            _ => id,
        }
    }

    /// Deep-copies a value graph from another heap into this one.
    ///
    /// Used when a reduce worker's fold result crosses back into the parent
    /// (or a sibling) evaluator. Shared handles within the source graph are
    /// copied once, and cyclic structures terminate.
    pub fn transfer_from(&mut self, source: &Heap, value: &Value) -> Value {
        let mut moved = AHashMap::new();
        self.transfer_value(source, value, &mut moved)
    }

    fn transfer_value(
        &mut self,
        source: &Heap,
        value: &Value,
        moved: &mut AHashMap<HeapId, HeapId>,
    ) -> Value {
        match value {
            Value::Ref(id) => Value::Ref(self.transfer_entry(source, *id, moved)),
            Value::Any(inner) => Value::Any(Box::new(self.transfer_value(source, inner, moved))),
            other => other.clone(),
        }
    }

    fn transfer_entry(
        &mut self,
        source: &Heap,
        id: HeapId,
        moved: &mut AHashMap<HeapId, HeapId>,
    ) -> HeapId {
        if let Some(new_id) = moved.get(&id) {
            return *new_id;
        }
        // Reserve the slot before copying children so cyclic graphs terminate.
        let new_id = self.allocate(HeapData::List(Vec::new()));
        moved.insert(id, new_id);
        let data = match source.get(id) {
            HeapData::Str(s) => HeapData::Str(s.clone()),
            HeapData::List(items) => HeapData::List(self.transfer_values(source, items, moved)),
            HeapData::Array(items) => HeapData::Array(self.transfer_values(source, items, moved)),
            HeapData::Instance(instance) => HeapData::Instance(Instance {
                class: instance.class,
                fields: self.transfer_scope(source, &instance.fields, moved),
            }),
            HeapData::Module(module) => HeapData::Module(ModuleInstance {
                module: module.module,
                fields: self.transfer_scope(source, &module.fields, moved),
            }),
            HeapData::Interface(view) => HeapData::Interface(InterfaceView {
                interface: view.interface,
                target: self.transfer_entry(source, view.target, moved),
            }),
            HeapData::Function(closure) => {
                let receiver = closure
                    .receiver
                    .as_ref()
                    .map(|r| self.transfer_value(source, r, moved));
                HeapData::Function(Closure {
                    def: Arc::clone(&closure.def),
                    receiver,
                    captured: self.transfer_scope(source, &closure.captured, moved),
                })
            }
            HeapData::BoundBuiltin { receiver, builtin } => HeapData::BoundBuiltin {
                receiver: self.transfer_value(source, receiver, moved),
                builtin: *builtin,
            },
        };
        *self.get_mut(new_id) = data;
        new_id
    }

    fn transfer_values(
        &mut self,
        source: &Heap,
        values: &[Value],
        moved: &mut AHashMap<HeapId, HeapId>,
    ) -> Vec<Value> {
        values
            .iter()
            .map(|v| self.transfer_value(source, v, moved))
            .collect()
    }

    fn transfer_scope(
        &mut self,
        source: &Heap,
        scope: &Scope,
        moved: &mut AHashMap<HeapId, HeapId>,
    ) -> Scope {
        scope
            .iter()
            .map(|(name, value)| (name, self.transfer_value(source, value, moved)))
            .collect()
    }
}

/// Helper for deciding how a name on a string value resolves; strings exist
/// both interned and on the heap.
pub fn string_content<'a>(
    value: &'a Value,
    heap: &'a Heap,
    interner: &'a crate::intern::Interner,
) -> Option<&'a str> {
    match value {
        Value::Str(id) => Some(interner.get(*id)),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Str(s) => Some(s.as_str()),
            _ => None,
        },
        _ => None,
    }
}
