//! Module, type, and function descriptors.
//!
//! Descriptors are built by the loader in two passes: pass one constructs
//! every descriptor, pass two wires inter-descriptor references (interface
//! lists) by id. After linking, a [`Program`] is immutable for the duration
//! of an evaluation; inter-descriptor links are stored as arena ids
//! ([`TypeId`], [`ModuleId`]) rather than owning references, which is what
//! lets modules and classes refer to each other freely.

use std::sync::Arc;

use ahash::AHashMap;
use indexmap::IndexMap;
use strum::Display;

use crate::expr::Expr;
use crate::heap::{Heap, HeapData};
use crate::intern::{Interner, StringId};
use crate::stmt::Stmt;
use crate::value::Value;

/// Index into the program's type arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("type arena overflow"))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the program's module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(u32);

impl ModuleId {
    /// The global module holding the built-in types; always index 0.
    pub const GLOBAL: ModuleId = ModuleId(0);

    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("module arena overflow"))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Built-in primitive types registered in the global module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Primitive {
    Null,
    Void,
    Bool,
    Int,
    Float,
    Char,
    String,
    List,
    Array,
    Any,
    Function,
    Module,
    Type,
}

/// Type ids of the built-in primitives.
///
/// [`Program::new`] allocates the primitives in this exact order.
pub mod builtin {
    use super::TypeId;

    pub const NULL: TypeId = TypeId(0);
    pub const VOID: TypeId = TypeId(1);
    pub const BOOL: TypeId = TypeId(2);
    pub const INT: TypeId = TypeId(3);
    pub const FLOAT: TypeId = TypeId(4);
    pub const CHAR: TypeId = TypeId(5);
    pub const STRING: TypeId = TypeId(6);
    pub const LIST: TypeId = TypeId(7);
    pub const ARRAY: TypeId = TypeId(8);
    pub const ANY: TypeId = TypeId(9);
    pub const FUNCTION: TypeId = TypeId(10);
    pub const MODULE: TypeId = TypeId(11);
    pub const TYPE: TypeId = TypeId(12);
}

const PRIMITIVES: [Primitive; 13] = [
    Primitive::Null,
    Primitive::Void,
    Primitive::Bool,
    Primitive::Int,
    Primitive::Float,
    Primitive::Char,
    Primitive::String,
    Primitive::List,
    Primitive::Array,
    Primitive::Any,
    Primitive::Function,
    Primitive::Module,
    Primitive::Type,
];

/// A field declaration with an optional initializer expression.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: StringId,
    pub init: Option<Expr>,
}

/// A formal parameter with an optional type annotation.
///
/// Annotations are resolved by name at call time; types are checked at
/// evaluation time, never statically.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: StringId,
    pub type_name: Option<StringId>,
}

/// A function definition: named module/class methods and anonymous
/// functions alike. Shared by `Arc` between descriptors, closure values,
/// and the AST nodes that carry anonymous functions.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: StringId,
    pub params: Vec<Param>,
    /// Carried for diagnostics and tooling; not enforced on return.
    pub return_type: Option<StringId>,
    pub body: Vec<Stmt>,
    /// Module the function was declared in; its frame resolves names there.
    pub module: ModuleId,
}

/// A class descriptor.
#[derive(Debug)]
pub struct ClassDef {
    pub name: StringId,
    pub module: ModuleId,
    /// Interfaces this class implements, wired during the link pass.
    pub implements: Vec<TypeId>,
    pub fields: Vec<FieldDef>,
    pub methods: IndexMap<StringId, Arc<FunctionDef>>,
}

/// An interface descriptor: a named method set.
#[derive(Debug)]
pub struct InterfaceDef {
    pub name: StringId,
    pub module: ModuleId,
    pub methods: Vec<StringId>,
}

/// An enumeration descriptor with its ordered member names.
#[derive(Debug)]
pub struct EnumDef {
    pub name: StringId,
    pub module: ModuleId,
    pub members: Vec<StringId>,
}

impl EnumDef {
    pub fn member_index(&self, name: StringId) -> Option<u32> {
        self.members
            .iter()
            .position(|&m| m == name)
            .map(|i| u32::try_from(i).expect("enum member overflow"))
    }
}

/// A type descriptor.
#[derive(Debug)]
pub enum TypeDef {
    Primitive(Primitive),
    Class(ClassDef),
    Interface(InterfaceDef),
    Enum(EnumDef),
}

/// A module descriptor: the types, fields, and functions it declares.
#[derive(Debug, Default)]
pub struct ModuleDef {
    pub name: StringId,
    pub imports: Vec<ModuleId>,
    pub types: IndexMap<StringId, TypeId>,
    pub fields: Vec<FieldDef>,
    pub methods: IndexMap<StringId, Arc<FunctionDef>>,
}

/// All descriptors of a loaded program plus the interner.
///
/// Mutable while the loader runs; treated as immutable (and shared across
/// reduce workers by reference) during evaluation.
#[derive(Debug)]
pub struct Program {
    pub interner: Interner,
    types: Vec<TypeDef>,
    modules: Vec<ModuleDef>,
    modules_by_name: AHashMap<StringId, ModuleId>,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    /// Creates a program containing the global module and the built-in types.
    pub fn new() -> Self {
        let mut interner = Interner::new();
        let mut global = ModuleDef {
            name: crate::intern::known::GLOBAL,
            ..ModuleDef::default()
        };
        let mut types = Vec::with_capacity(PRIMITIVES.len());
        for primitive in PRIMITIVES {
            let id = TypeId::new(types.len());
            let name = interner.intern(&primitive.to_string());
            types.push(TypeDef::Primitive(primitive));
            global.types.insert(name, id);
        }
        let mut modules_by_name = AHashMap::new();
        modules_by_name.insert(global.name, ModuleId::GLOBAL);
        Self {
            interner,
            types,
            modules: vec![global],
            modules_by_name,
        }
    }

    pub fn add_type(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId::new(self.types.len());
        self.types.push(def);
        id
    }

    #[must_use]
    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    pub(crate) fn type_def_mut(&mut self, id: TypeId) -> &mut TypeDef {
        &mut self.types[id.index()]
    }

    pub fn add_module(&mut self, def: ModuleDef) -> ModuleId {
        let id = ModuleId::new(self.modules.len());
        self.modules_by_name.insert(def.name, id);
        self.modules.push(def);
        id
    }

    /// Reserves a module slot without binding a name, so the loader can
    /// hand an id to the parser before the module's name is known.
    pub(crate) fn reserve_module(&mut self) -> ModuleId {
        let id = ModuleId::new(self.modules.len());
        self.modules.push(ModuleDef::default());
        id
    }

    /// Binds a name to a previously reserved module slot.
    pub(crate) fn register_module_name(&mut self, id: ModuleId, name: StringId) {
        self.modules_by_name.insert(name, id);
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> &ModuleDef {
        &self.modules[id.index()]
    }

    pub(crate) fn module_mut(&mut self, id: ModuleId) -> &mut ModuleDef {
        &mut self.modules[id.index()]
    }

    #[must_use]
    pub fn lookup_module(&self, name: StringId) -> Option<ModuleId> {
        self.modules_by_name.get(&name).copied()
    }

    /// Resolves a type name against a module's table, then the tables of
    /// its imports, then the global one.
    #[must_use]
    pub fn lookup_type(&self, module: ModuleId, name: StringId) -> Option<TypeId> {
        let def = self.module(module);
        if let Some(found) = def.types.get(&name) {
            return Some(*found);
        }
        for &import in &def.imports {
            if let Some(found) = self.module(import).types.get(&name) {
                return Some(*found);
            }
        }
        self.module(ModuleId::GLOBAL).types.get(&name).copied()
    }

    /// Returns the declared name of a type, for diagnostics.
    #[must_use]
    pub fn type_name(&self, id: TypeId) -> &str {
        match self.type_def(id) {
            TypeDef::Primitive(p) => match p {
                Primitive::Null => "Null",
                Primitive::Void => "Void",
                Primitive::Bool => "Bool",
                Primitive::Int => "Int",
                Primitive::Float => "Float",
                Primitive::Char => "Char",
                Primitive::String => "String",
                Primitive::List => "List",
                Primitive::Array => "Array",
                Primitive::Any => "Any",
                Primitive::Function => "Function",
                Primitive::Module => "Module",
                Primitive::Type => "Type",
            },
            TypeDef::Class(c) => self.interner.get(c.name),
            TypeDef::Interface(i) => self.interner.get(i.name),
            TypeDef::Enum(e) => self.interner.get(e.name),
        }
    }

    /// Returns the type of a runtime value, as used by `type_of` and error
    /// messages. `Any` answers as the erased `Any` type.
    #[must_use]
    pub fn type_of(&self, value: &Value, heap: &Heap) -> TypeId {
        match value {
            Value::Null => builtin::NULL,
            Value::Void => builtin::VOID,
            Value::Bool(_) => builtin::BOOL,
            Value::Int(_) => builtin::INT,
            Value::Float(_) => builtin::FLOAT,
            Value::Char(_) => builtin::CHAR,
            Value::Str(_) => builtin::STRING,
            Value::Enum(id, _) => *id,
            Value::Type(_) => builtin::TYPE,
            Value::Any(_) => builtin::ANY,
            Value::Ref(id) => match heap.get(*id) {
                HeapData::Str(_) => builtin::STRING,
                HeapData::List(_) => builtin::LIST,
                HeapData::Array(_) => builtin::ARRAY,
                HeapData::Instance(instance) => instance.class,
                HeapData::Module(_) => builtin::MODULE,
                HeapData::Interface(iface) => iface.interface,
                HeapData::Function(_) | HeapData::BoundBuiltin { .. } => builtin::FUNCTION,
            },
        }
    }

    /// Whether a class (by id) implements an interface (by id).
    #[must_use]
    pub fn class_implements(&self, class: TypeId, interface: TypeId) -> bool {
        match self.type_def(class) {
            TypeDef::Class(c) => c.implements.contains(&interface),
            _ => false,
        }
    }

    /// Runtime type compatibility, the shared core of `is` and `as`.
    ///
    /// `Null` is compatible with no type at all, so `null is T` is false and
    /// `null as T` is null for every `T`. `Any` wrappers are transparent.
    #[must_use]
    pub fn is_compatible(&self, ty: TypeId, value: &Value, heap: &Heap) -> bool {
        let value = value.unwrap_any();
        if matches!(value, Value::Null) {
            return false;
        }
        match self.type_def(ty) {
            TypeDef::Primitive(Primitive::Any) => true,
            TypeDef::Primitive(Primitive::Null) => false,
            TypeDef::Primitive(p) => {
                let actual = self.type_of(value, heap);
                match self.type_def(actual) {
                    TypeDef::Primitive(actual_p) => actual_p == p,
                    // Class instances answer only for their class and
                    // interfaces; interface wrappers answer below.
                    _ => false,
                }
            }
            TypeDef::Class(_) => match value {
                Value::Ref(id) => match heap.get(*id) {
                    HeapData::Instance(instance) => instance.class == ty,
                    HeapData::Interface(iface) => {
                        matches!(heap.get(iface.target), HeapData::Instance(inner) if inner.class == ty)
                    }
                    _ => false,
                },
                _ => false,
            },
            TypeDef::Interface(_) => match value {
                Value::Ref(id) => match heap.get(*id) {
                    HeapData::Instance(instance) => self.class_implements(instance.class, ty),
                    HeapData::Interface(iface) => {
                        iface.interface == ty
                            || matches!(
                                heap.get(iface.target),
                                HeapData::Instance(inner) if self.class_implements(inner.class, ty)
                            )
                    }
                    _ => false,
                },
                _ => false,
            },
            TypeDef::Enum(_) => matches!(value, Value::Enum(id, _) if *id == ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_registered_in_the_global_module() {
        let program = Program::new();
        let int = program.interner.lookup("Int").unwrap();
        assert_eq!(program.lookup_type(ModuleId::GLOBAL, int), Some(builtin::INT));
        assert_eq!(program.type_name(builtin::STRING), "String");
    }

    #[test]
    fn primitive_compatibility_is_exact() {
        let program = Program::new();
        let heap = Heap::default();
        assert!(program.is_compatible(builtin::INT, &Value::Int(1), &heap));
        assert!(!program.is_compatible(builtin::FLOAT, &Value::Int(1), &heap));
        assert!(program.is_compatible(builtin::ANY, &Value::Int(1), &heap));
    }

    #[test]
    fn null_is_compatible_with_nothing() {
        let program = Program::new();
        let heap = Heap::default();
        assert!(!program.is_compatible(builtin::NULL, &Value::Null, &heap));
        assert!(!program.is_compatible(builtin::ANY, &Value::Null, &heap));
    }

    #[test]
    fn any_wrappers_are_transparent() {
        let program = Program::new();
        let heap = Heap::default();
        let wrapped = Value::Any(Box::new(Value::Int(3)));
        assert!(program.is_compatible(builtin::INT, &wrapped, &heap));
    }
}
