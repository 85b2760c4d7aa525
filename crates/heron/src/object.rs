//! `HeronObject`: heap-independent values crossing the public boundary.
//!
//! Runtime `Value`s are only meaningful next to the heap that owns their
//! aggregates, so results returned to the host are deep-copied into this
//! self-contained form. Values with no portable representation (instances,
//! closures, types) come back as an `Opaque` rendering.

use std::fmt;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::heap::{Heap, HeapData, HeapId};
use crate::program::{Program, TypeDef};
use crate::value::Value;

/// A self-contained snapshot of a runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeronObject {
    Null,
    Void,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    List(Vec<HeronObject>),
    Array(Vec<HeronObject>),
    Enum { enumeration: String, member: String },
    /// Rendering of a value with no portable representation.
    Opaque(String),
}

impl HeronObject {
    /// Deep-copies a runtime value out of its heap.
    pub(crate) fn from_value(value: &Value, heap: &Heap, program: &Program) -> Self {
        let mut seen = AHashSet::new();
        Self::convert(value, heap, program, &mut seen)
    }

    fn convert(
        value: &Value,
        heap: &Heap,
        program: &Program,
        seen: &mut AHashSet<HeapId>,
    ) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Void => Self::Void,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(v) => Self::Int(*v),
            Value::Float(v) => Self::Float(*v),
            Value::Char(c) => Self::Char(*c),
            Value::Str(id) => Self::Str(program.interner.get(*id).to_owned()),
            Value::Enum(type_id, member) => {
                let member = match program.type_def(*type_id) {
                    TypeDef::Enum(def) => program
                        .interner
                        .get(def.members[*member as usize])
                        .to_owned(),
                    _ => member.to_string(),
                };
                Self::Enum {
                    enumeration: program.type_name(*type_id).to_owned(),
                    member,
                }
            }
            Value::Type(type_id) => Self::Opaque(format!("<type {}>", program.type_name(*type_id))),
            Value::Any(inner) => Self::convert(inner, heap, program, seen),
            Value::Ref(id) => {
                if !seen.insert(*id) {
                    return Self::Opaque("...".to_owned());
                }
                let converted = match heap.get(*id) {
                    HeapData::Str(s) => Self::Str(s.clone()),
                    HeapData::List(items) => {
                        Self::List(Self::convert_all(items, heap, program, seen))
                    }
                    HeapData::Array(items) => {
                        Self::Array(Self::convert_all(items, heap, program, seen))
                    }
                    HeapData::Instance(instance) => {
                        Self::Opaque(format!("<{} instance>", program.type_name(instance.class)))
                    }
                    HeapData::Module(module) => Self::Opaque(format!(
                        "<module {}>",
                        program.interner.get(program.module(module.module).name)
                    )),
                    HeapData::Interface(view) => {
                        Self::Opaque(format!("<{} view>", program.type_name(view.interface)))
                    }
                    HeapData::Function(closure) => Self::Opaque(format!(
                        "<function '{}'>",
                        program.interner.get(closure.def.name)
                    )),
                    HeapData::BoundBuiltin { builtin, .. } => {
                        Self::Opaque(format!("<built-in {builtin}>"))
                    }
                };
                seen.remove(id);
                converted
            }
        }
    }

    fn convert_all(
        items: &[Value],
        heap: &Heap,
        program: &Program,
        seen: &mut AHashSet<HeapId>,
    ) -> Vec<Self> {
        items
            .iter()
            .map(|item| Self::convert(item, heap, program, seen))
            .collect()
    }
}

impl fmt::Display for HeronObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Void => f.write_str("void"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::Char(c) => write!(f, "'{c}'"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::List(items) | Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Enum {
                enumeration,
                member,
            } => write!(f, "{enumeration}.{member}"),
            Self::Opaque(text) => f.write_str(text),
        }
    }
}

/// Formats a float so integral values still read as floats.
pub(crate) fn format_float(value: f64) -> String {
    let s = value.to_string();
    if value.is_finite() && !s.contains('.') && !s.contains('e') {
        format!("{s}.0")
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_keep_a_decimal_point() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn nested_lists_convert() {
        let program = Program::new();
        let mut heap = Heap::default();
        let inner = heap.allocate(HeapData::List(vec![Value::Int(1)]));
        let outer = heap.allocate(HeapData::List(vec![Value::Ref(inner), Value::Bool(true)]));
        let object = HeronObject::from_value(&Value::Ref(outer), &heap, &program);
        assert_eq!(
            object,
            HeronObject::List(vec![
                HeronObject::List(vec![HeronObject::Int(1)]),
                HeronObject::Bool(true),
            ])
        );
        assert_eq!(object.to_string(), "[[1], true]");
    }

    #[test]
    fn cyclic_values_render_as_ellipsis() {
        let program = Program::new();
        let mut heap = Heap::default();
        let id = heap.allocate(HeapData::List(Vec::new()));
        if let HeapData::List(items) = heap.get_mut(id) {
            items.push(Value::Ref(id));
        }
        let object = HeronObject::from_value(&Value::Ref(id), &heap, &program);
        assert_eq!(
            object,
            HeronObject::List(vec![HeronObject::Opaque("...".to_owned())])
        );
    }
}
