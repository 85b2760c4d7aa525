//! String interning for identifiers and string literals.
//!
//! Every name that appears in a Heron program (variables, fields, methods,
//! types, modules) and every string literal is stored once in the interner
//! and referred to by a [`StringId`]. Ids are cheap to copy and compare,
//! which keeps the AST and the scope tables free of owned strings; the
//! actual text is only needed for error messages and rendering.
//!
//! A handful of well-known names are interned at construction time so the
//! runtime can compare against them without a lookup (see [`known`]).

use ahash::AHashMap;

/// Index into the interner's storage.
///
/// Uses `u32` to save space; four billion distinct names is plenty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pre-interned names the runtime compares against directly.
///
/// These ids are assigned in [`Interner::new`] in this exact order.
pub mod known {
    use super::StringId;

    /// Name used for the synthetic top-level frame and the global module.
    pub const GLOBAL: StringId = StringId(0);
    /// Entry point invoked by `run_file`.
    pub const MAIN: StringId = StringId(1);
    /// Optional pre-entry hook invoked before `Main`.
    pub const META: StringId = StringId(2);
    /// Class constructor method name.
    pub const CONSTRUCTOR: StringId = StringId(3);
    /// Name given to anonymous function values.
    pub const ANONYMOUS: StringId = StringId(4);

    // Built-in methods on aggregate values.
    pub const ADD: StringId = StringId(5);
    pub const COUNT: StringId = StringId(6);
    pub const LENGTH: StringId = StringId(7);
}

/// Interns strings, returning stable [`StringId`]s.
///
/// Owned by the [`Program`](crate::program::Program); populated during
/// parsing and only read during evaluation.
#[derive(Debug, Default, Clone)]
pub struct Interner {
    strings: Vec<Box<str>>,
    ids: AHashMap<Box<str>, StringId>,
}

impl Interner {
    /// Creates an interner with the well-known names pre-registered.
    pub fn new() -> Self {
        let mut interner = Self::default();
        for name in [
            "<global>",
            "Main",
            "Meta",
            "Constructor",
            "<anonymous>",
            "Add",
            "Count",
            "Length",
        ] {
            interner.intern(name);
        }
        interner
    }

    /// Returns the id for `text`, interning it first if it is new.
    pub fn intern(&mut self, text: &str) -> StringId {
        if let Some(id) = self.ids.get(text) {
            return *id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("interner overflow"));
        self.strings.push(text.into());
        self.ids.insert(text.into(), id);
        id
    }

    /// Returns the text for a previously interned id.
    ///
    /// # Panics
    /// Panics if the id did not come from this interner.
    #[must_use]
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Returns the id for `text` if it has been interned before.
    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<StringId> {
        self.ids.get(text).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut interner = Interner::new();
        let a = interner.intern("alpha");
        let b = interner.intern("beta");
        assert_ne!(a, b);
        assert_eq!(interner.intern("alpha"), a);
        assert_eq!(interner.get(a), "alpha");
        assert_eq!(interner.get(b), "beta");
    }

    #[test]
    fn known_names_match_their_constants() {
        let interner = Interner::new();
        assert_eq!(interner.lookup("Main"), Some(known::MAIN));
        assert_eq!(interner.lookup("Meta"), Some(known::META));
        assert_eq!(interner.lookup("Constructor"), Some(known::CONSTRUCTOR));
        assert_eq!(interner.lookup("Count"), Some(known::COUNT));
    }
}
