//! Runtime values and their capability set.
//!
//! `Value` uses a hybrid design: small immediate values (ints, floats,
//! chars, interned string literals, enum members, first-class types) are
//! stored inline, while aggregates live in the arena and are referenced via
//! `Ref(HeapId)`. Copying a `Value` is always cheap; aggregates get
//! reference semantics through the shared handle, primitives get value
//! semantics by construction.
//!
//! Every value exposes the same capability set (field and method access,
//! indexing, equality), and unsupported capabilities fail with
//! `UnsupportedOperation`.

use std::sync::Arc;

use strum::Display;

use crate::error::{err, ErrorKind, EvalResult, HeronError};
use crate::heap::{string_content, Closure, Heap, HeapData, HeapId};
use crate::intern::{known, StringId};
use crate::program::{Program, TypeDef, TypeId};

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// The result of a function that returns nothing.
    Void,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    /// An interned string literal; computed strings live on the heap.
    Str(StringId),
    /// An enumeration member: the enum descriptor and the member's index.
    Enum(TypeId, u32),
    /// A first-class type, usable with `is`, `as`, and `new`.
    Type(TypeId),
    /// A type-erased wrapper; only `is` and `as` see through it.
    Any(Box<Value>),
    /// Handle to an aggregate in the arena.
    Ref(HeapId),
}

/// Built-in methods on aggregate values, dispatched without a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Builtin {
    /// `list.Add(item)`: appends in place.
    ListAdd,
    /// `seq.Count()`: element count of a list or array.
    SeqCount,
    /// `str.Length()`: character count.
    StrLength,
}

impl Value {
    /// Strips `Any` wrappers, however deeply nested.
    #[must_use]
    pub fn unwrap_any(&self) -> &Value {
        let mut value = self;
        while let Value::Any(inner) = value {
            value = inner;
        }
        value
    }

    /// The type name of this value, for diagnostics.
    #[must_use]
    pub fn type_name<'p>(&self, program: &'p Program, heap: &Heap) -> &'p str {
        program.type_name(program.type_of(self, heap))
    }

    /// Retrieves a field value or a method bound to this receiver.
    ///
    /// Methods come back as callable values carrying the receiver. Kinds
    /// with no field concept at all fail `UnsupportedOperation`; kinds with
    /// fields fail `NoSuchField` when the name is absent.
    pub fn get_field_or_method(
        &self,
        name: StringId,
        heap: &mut Heap,
        program: &Program,
    ) -> EvalResult<Value> {
        // Built-in methods on sequences and strings.
        if let Some(builtin) = self.builtin_method(name, heap) {
            let id = heap.allocate(HeapData::BoundBuiltin {
                receiver: self.clone(),
                builtin,
            });
            return Ok(Value::Ref(id));
        }

        match self {
            Value::Type(type_id) => match program.type_def(*type_id) {
                TypeDef::Enum(def) => match def.member_index(name) {
                    Some(index) => Ok(Value::Enum(*type_id, index)),
                    None => err!(
                        NoSuchField;
                        "enum {} has no member '{}'",
                        program.type_name(*type_id),
                        program.interner.get(name)
                    ),
                },
                _ => err!(
                    NoSuchField;
                    "type {} has no member '{}'",
                    program.type_name(*type_id),
                    program.interner.get(name)
                ),
            },
            Value::Ref(id) => self.get_ref_field_or_method(*id, name, heap, program),
            _ => err!(
                UnsupportedOperation;
                "{} does not support field access",
                self.type_name(program, heap)
            ),
        }
    }

    fn get_ref_field_or_method(
        &self,
        id: HeapId,
        name: StringId,
        heap: &mut Heap,
        program: &Program,
    ) -> EvalResult<Value> {
        enum Found {
            Value(Value),
            Method(Arc<crate::program::FunctionDef>, Value),
        }

        let found = match heap.get(id) {
            HeapData::Instance(instance) => {
                if let Some(value) = instance.fields.lookup(name) {
                    Some(Found::Value(value.clone()))
                } else if let TypeDef::Class(class) = program.type_def(instance.class) {
                    class
                        .methods
                        .get(&name)
                        .map(|def| Found::Method(Arc::clone(def), Value::Ref(id)))
                } else {
                    None
                }
            }
            HeapData::Module(module) => {
                if let Some(value) = module.fields.lookup(name) {
                    Some(Found::Value(value.clone()))
                } else {
                    program
                        .module(module.module)
                        .methods
                        .get(&name)
                        .map(|def| Found::Method(Arc::clone(def), Value::Ref(id)))
                }
            }
            HeapData::Interface(view) => {
                // Only the interface's declared method set is visible
                // through an interface-typed value.
                let interface = match program.type_def(view.interface) {
                    TypeDef::Interface(def) => def,
                    _ => {
                        return err!(
                            InternalInvariantViolation;
                            "interface view does not reference an interface descriptor"
                        )
                    }
                };
                if !interface.methods.contains(&name) {
                    return err!(
                        NoSuchField;
                        "interface {} has no method '{}'",
                        program.type_name(view.interface),
                        program.interner.get(name)
                    );
                }
                let target = view.target;
                match heap.get(target) {
                    HeapData::Instance(instance) => match program.type_def(instance.class) {
                        TypeDef::Class(class) => class
                            .methods
                            .get(&name)
                            .map(|def| Found::Method(Arc::clone(def), Value::Ref(target))),
                        _ => None,
                    },
                    _ => None,
                }
            }
            _ => {
                return err!(
                    UnsupportedOperation;
                    "{} does not support field access",
                    self.type_name(program, heap)
                )
            }
        };

        match found {
            Some(Found::Value(value)) => Ok(value),
            Some(Found::Method(def, receiver)) => {
                let closure = Closure {
                    def,
                    receiver: Some(receiver),
                    captured: crate::scope::Scope::new(),
                };
                Ok(Value::Ref(heap.allocate(HeapData::Function(closure))))
            }
            None => err!(
                NoSuchField;
                "{} has no field or method '{}'",
                self.type_name(program, heap),
                program.interner.get(name)
            ),
        }
    }

    fn builtin_method(&self, name: StringId, heap: &Heap) -> Option<Builtin> {
        match self {
            Value::Str(_) if name == known::LENGTH => Some(Builtin::StrLength),
            Value::Ref(id) => match heap.get(*id) {
                HeapData::Str(_) if name == known::LENGTH => Some(Builtin::StrLength),
                HeapData::List(_) if name == known::ADD => Some(Builtin::ListAdd),
                HeapData::List(_) | HeapData::Array(_) if name == known::COUNT => {
                    Some(Builtin::SeqCount)
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Sets an existing field. Fails `NoSuchField` when absent and
    /// `UnsupportedOperation` on kinds without fields.
    pub fn set_field(
        &self,
        name: StringId,
        value: Value,
        heap: &mut Heap,
        program: &Program,
    ) -> EvalResult<()> {
        if let Value::Ref(id) = self {
            let assigned = match heap.get_mut(*id) {
                HeapData::Instance(instance) => Some(instance.fields.assign(name, value)),
                HeapData::Module(module) => Some(module.fields.assign(name, value)),
                _ => None,
            };
            match assigned {
                Some(true) => return Ok(()),
                Some(false) => {
                    return err!(
                        NoSuchField;
                        "{} has no field '{}'",
                        self.type_name(program, heap),
                        program.interner.get(name)
                    )
                }
                None => {}
            }
        }
        err!(
            UnsupportedOperation;
            "{} does not support field assignment",
            self.type_name(program, heap)
        )
    }

    /// Whether this value has a settable field named `name`.
    #[must_use]
    pub fn has_field(&self, name: StringId, heap: &Heap) -> bool {
        match self {
            Value::Ref(id) => match heap.get(*id) {
                HeapData::Instance(instance) => instance.fields.contains(name),
                HeapData::Module(module) => module.fields.contains(name),
                _ => false,
            },
            _ => false,
        }
    }

    /// Reads an element of a list or array. The index must be an `Int`.
    pub fn get_at_index(&self, index: &Value, heap: &Heap, program: &Program) -> EvalResult<Value> {
        let items = self.sequence(heap).ok_or_else(|| {
            HeronError::new(
                ErrorKind::UnsupportedOperation,
                format!("{} does not support indexing", self.type_name(program, heap)),
            )
        })?;
        let at = sequence_index(index, items.len(), program, heap)?;
        Ok(items[at].clone())
    }

    /// Writes an element of a list or array. The index must be an `Int`.
    pub fn set_at_index(
        &self,
        index: &Value,
        value: Value,
        heap: &mut Heap,
        program: &Program,
    ) -> EvalResult<()> {
        let len = match self.sequence(heap) {
            Some(items) => items.len(),
            None => {
                return err!(
                    UnsupportedOperation;
                    "{} does not support index assignment",
                    self.type_name(program, heap)
                )
            }
        };
        let at = sequence_index(index, len, program, heap)?;
        if let Value::Ref(id) = self {
            match heap.get_mut(*id) {
                HeapData::List(items) | HeapData::Array(items) => {
                    items[at] = value;
                    return Ok(());
                }
                _ => {}
            }
        }
        err!(
            UnsupportedOperation;
            "{} does not support index assignment",
            self.type_name(program, heap)
        )
    }

    /// Borrows this value's elements when it is a list or an array.
    #[must_use]
    pub fn sequence<'a>(&self, heap: &'a Heap) -> Option<&'a [Value]> {
        match self {
            Value::Ref(id) => match heap.get(*id) {
                HeapData::List(items) | HeapData::Array(items) => Some(items),
                _ => None,
            },
            _ => None,
        }
    }

    /// Structural/identity equality, the shared implementation of `==`.
    ///
    /// Mixed numerics compare after promotion; strings and sequences
    /// compare by content; class and interface instances compare by the
    /// identity of the underlying instance; enum members compare by
    /// (descriptor, member). Values of unrelated kinds are unequal rather
    /// than an error, matching the null policy's shape.
    #[must_use]
    pub fn equals(&self, other: &Value, heap: &Heap, program: &Program) -> bool {
        let (a, b) = (self.unwrap_any(), other.unwrap_any());
        // Strings first: they straddle the immediate/heap split.
        if let (Some(s1), Some(s2)) = (
            string_content(a, heap, &program.interner),
            string_content(b, heap, &program.interner),
        ) {
            return s1 == s2;
        }
        match (a, b) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x == y,
            (Value::Int(x), Value::Float(y)) => (*x as f64) == *y,
            (Value::Float(x), Value::Int(y)) => *x == (*y as f64),
            (Value::Char(x), Value::Char(y)) => x == y,
            (Value::Enum(t1, m1), Value::Enum(t2, m2)) => t1 == t2 && m1 == m2,
            (Value::Type(t1), Value::Type(t2)) => t1 == t2,
            (Value::Ref(i1), Value::Ref(i2)) => match (heap.get(*i1), heap.get(*i2)) {
                (HeapData::List(x), HeapData::List(y))
                | (HeapData::Array(x), HeapData::Array(y)) => {
                    x.len() == y.len()
                        && x.iter().zip(y).all(|(a, b)| a.equals(b, heap, program))
                }
                (HeapData::Instance(_) | HeapData::Interface(_), HeapData::Instance(_))
                | (HeapData::Instance(_) | HeapData::Interface(_), HeapData::Interface(_)) => {
                    heap.identity_target(*i1) == heap.identity_target(*i2)
                }
                (HeapData::Module(_), HeapData::Module(_))
                | (HeapData::Function(_), HeapData::Function(_))
                | (HeapData::BoundBuiltin { .. }, HeapData::BoundBuiltin { .. }) => i1 == i2,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Validates an index value against a sequence length.
fn sequence_index(
    index: &Value,
    len: usize,
    program: &Program,
    heap: &Heap,
) -> EvalResult<usize> {
    let at = match index {
        Value::Int(i) => *i,
        _ => {
            return err!(
                IncompatibleTypes;
                "sequence index must be Int, not {}",
                index.type_name(program, heap)
            )
        }
    };
    if at < 0 || at as usize >= len {
        return err!(
            UnsupportedOperation;
            "index {at} out of range for sequence of length {len}"
        );
    }
    Ok(at as usize)
}

/// Dispatches a bound built-in method call.
pub fn call_builtin(
    builtin: Builtin,
    receiver: &Value,
    args: Vec<Value>,
    heap: &mut Heap,
    program: &Program,
) -> EvalResult<Value> {
    match builtin {
        Builtin::ListAdd => {
            let [item] = require_args::<1>(builtin, args)?;
            match receiver {
                Value::Ref(id) => match heap.get_mut(*id) {
                    HeapData::List(items) => {
                        items.push(item);
                        Ok(Value::Void)
                    }
                    _ => err!(InternalInvariantViolation; "Add bound to a non-list receiver"),
                },
                _ => err!(InternalInvariantViolation; "Add bound to a non-list receiver"),
            }
        }
        Builtin::SeqCount => {
            require_args::<0>(builtin, args)?;
            match receiver.sequence(heap) {
                Some(items) => Ok(Value::Int(items.len() as i64)),
                None => err!(InternalInvariantViolation; "Count bound to a non-sequence receiver"),
            }
        }
        Builtin::StrLength => {
            require_args::<0>(builtin, args)?;
            match string_content(receiver, heap, &program.interner) {
                Some(s) => Ok(Value::Int(s.chars().count() as i64)),
                None => err!(InternalInvariantViolation; "Length bound to a non-string receiver"),
            }
        }
    }
}

fn require_args<const N: usize>(builtin: Builtin, args: Vec<Value>) -> EvalResult<[Value; N]> {
    let got = args.len();
    args.try_into()
        .map_err(|_| HeronError::new(
            ErrorKind::ArityMismatch,
            format!("{builtin} takes {N} argument(s), got {got}"),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ModuleId;

    #[test]
    fn mixed_numeric_equality_promotes() {
        let program = Program::new();
        let heap = Heap::default();
        assert!(Value::Int(2).equals(&Value::Float(2.0), &heap, &program));
        assert!(!Value::Int(2).equals(&Value::Float(2.5), &heap, &program));
    }

    #[test]
    fn unrelated_kinds_are_unequal_not_errors() {
        let program = Program::new();
        let heap = Heap::default();
        assert!(!Value::Int(1).equals(&Value::Bool(true), &heap, &program));
        assert!(!Value::Null.equals(&Value::Int(0), &heap, &program));
    }

    #[test]
    fn string_equality_crosses_representations() {
        let mut program = Program::new();
        let mut heap = Heap::default();
        let lit = Value::Str(program.interner.intern("abc"));
        let heaped = Value::Ref(heap.allocate(HeapData::Str("abc".to_owned())));
        assert!(lit.equals(&heaped, &heap, &program));
    }

    #[test]
    fn lists_compare_structurally() {
        let program = Program::new();
        let mut heap = Heap::default();
        let a = Value::Ref(heap.allocate(HeapData::List(vec![Value::Int(1), Value::Int(2)])));
        let b = Value::Ref(heap.allocate(HeapData::List(vec![Value::Int(1), Value::Int(2)])));
        assert!(a.equals(&b, &heap, &program));
    }

    #[test]
    fn index_bounds_are_checked() {
        let program = Program::new();
        let mut heap = Heap::default();
        let list = Value::Ref(heap.allocate(HeapData::List(vec![Value::Int(7)])));
        assert_eq!(
            list.get_at_index(&Value::Int(0), &heap, &program).unwrap(),
            Value::Int(7)
        );
        let err = list.get_at_index(&Value::Int(3), &heap, &program).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
        let err = list
            .get_at_index(&Value::Bool(true), &heap, &program)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompatibleTypes);
    }

    #[test]
    fn list_add_appends_through_the_bound_builtin() {
        let program = Program::new();
        let mut heap = Heap::default();
        let list = Value::Ref(heap.allocate(HeapData::List(vec![])));
        let method = list
            .get_field_or_method(known::ADD, &mut heap, &program)
            .unwrap();
        let Value::Ref(method_id) = method else {
            panic!("expected a bound method");
        };
        let HeapData::BoundBuiltin { receiver, builtin } = heap.get(method_id).clone() else {
            panic!("expected a bound builtin");
        };
        call_builtin(builtin, &receiver, vec![Value::Int(9)], &mut heap, &program).unwrap();
        assert_eq!(list.sequence(&heap).unwrap(), &[Value::Int(9)]);
    }

    #[test]
    fn module_id_is_stable() {
        assert_eq!(ModuleId::GLOBAL.index(), 0);
    }
}
