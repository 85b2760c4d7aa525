//! Module loading: file resolution, recursive imports, and linking.
//!
//! Loading is two-pass. Pass one parses a module and constructs every
//! descriptor it declares, with interface lists still held as names. Pass
//! two (after the module's imports are loaded, so cross-module names can
//! resolve) wires those references by id. A module whose imports lead back
//! to a module still being loaded fails `CircularModuleDependency`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::Config;
use crate::error::{err, EvalResult};
use crate::intern::StringId;
use crate::parse::{self, ParsedClass, ParsedModule};
use crate::program::{ClassDef, ModuleDef, ModuleId, Program, TypeDef, TypeId};

/// Loads a module from a file, recursively loading its imports.
pub fn load_file(program: &mut Program, config: &Config, path: &Path) -> EvalResult<ModuleId> {
    let mut loader = Loader {
        program,
        config,
        base_dir: path.parent().map(Path::to_path_buf),
        loading: Vec::new(),
    };
    loader.load_path(path)
}

/// Loads a module from in-memory source. Imports resolve against the
/// configured search paths only.
pub fn load_source(program: &mut Program, config: &Config, source: &str) -> EvalResult<ModuleId> {
    let mut loader = Loader {
        program,
        config,
        base_dir: None,
        loading: Vec::new(),
    };
    loader.load_text(source)
}

struct Loader<'a> {
    program: &'a mut Program,
    config: &'a Config,
    /// Directory of the root file, searched before the configured paths so
    /// sibling modules resolve without extra configuration.
    base_dir: Option<PathBuf>,
    /// Names of modules currently mid-load, for cycle detection.
    loading: Vec<StringId>,
}

impl Loader<'_> {
    fn load_path(&mut self, path: &Path) -> EvalResult<ModuleId> {
        debug!(path = %path.display(), "loading module file");
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => return err!(ModuleNotFound; "cannot read {}: {e}", path.display()),
        };
        self.load_text(&source)
    }

    fn load_text(&mut self, source: &str) -> EvalResult<ModuleId> {
        let id = self.program.reserve_module();
        let parsed = parse::parse_module(source, &mut self.program.interner, id)?;

        // Loading the same module twice hands back the existing descriptor;
        // the reserved slot stays unused.
        if let Some(existing) = self.program.lookup_module(parsed.name) {
            return Ok(existing);
        }
        if self.loading.contains(&parsed.name) {
            return err!(
                CircularModuleDependency;
                "module '{}' transitively imports itself",
                self.program.interner.get(parsed.name)
            );
        }

        self.loading.push(parsed.name);
        let imports = self.load_imports(&parsed);
        self.loading.pop();
        let imports = imports?;

        self.register(id, parsed, imports)
    }

    fn load_imports(&mut self, parsed: &ParsedModule) -> EvalResult<Vec<ModuleId>> {
        let mut imports = Vec::with_capacity(parsed.imports.len());
        for &name in &parsed.imports {
            imports.push(self.load_import(name)?);
        }
        Ok(imports)
    }

    fn load_import(&mut self, name: StringId) -> EvalResult<ModuleId> {
        if let Some(id) = self.program.lookup_module(name) {
            return Ok(id);
        }
        if self.loading.contains(&name) {
            return err!(
                CircularModuleDependency;
                "module '{}' transitively imports itself",
                self.program.interner.get(name)
            );
        }
        let text = self.program.interner.get(name).to_owned();
        let path = self.resolve(&text)?;
        let id = self.load_path(&path)?;
        let declared = self.program.module(id).name;
        if declared != name {
            return err!(
                ModuleNotFound;
                "{} declares module '{}', expected '{}'",
                path.display(),
                self.program.interner.get(declared),
                text
            );
        }
        Ok(id)
    }

    /// Resolves a module name to a file using the search directories and
    /// acceptable extensions, in order.
    fn resolve(&self, name: &str) -> EvalResult<PathBuf> {
        let dirs = self
            .base_dir
            .iter()
            .chain(self.config.input_paths.iter());
        for dir in dirs {
            for ext in &self.config.extensions {
                let candidate = dir.join(format!("{name}{ext}"));
                if candidate.is_file() {
                    debug!(module = name, path = %candidate.display(), "resolved module");
                    return Ok(candidate);
                }
            }
        }
        err!(ModuleNotFound; "no file found for module '{name}' in the search path")
    }

    /// Pass one: construct descriptors. Pass two: wire interface lists.
    fn register(
        &mut self,
        id: ModuleId,
        parsed: ParsedModule,
        imports: Vec<ModuleId>,
    ) -> EvalResult<ModuleId> {
        let mut def = ModuleDef {
            name: parsed.name,
            imports,
            types: IndexMap::default(),
            fields: parsed.fields,
            methods: parsed
                .functions
                .into_iter()
                .map(|f| (f.name, Arc::new(f)))
                .collect(),
        };

        for interface in parsed.interfaces {
            let name = interface.name;
            let type_id = self.program.add_type(TypeDef::Interface(interface));
            def.types.insert(name, type_id);
        }
        for enumeration in parsed.enums {
            let name = enumeration.name;
            let type_id = self.program.add_type(TypeDef::Enum(enumeration));
            def.types.insert(name, type_id);
        }
        let mut unlinked: Vec<(TypeId, Vec<StringId>)> = Vec::new();
        for class in parsed.classes {
            let ParsedClass {
                name,
                implements,
                fields,
                methods,
            } = class;
            let type_id = self.program.add_type(TypeDef::Class(ClassDef {
                name,
                module: id,
                implements: Vec::new(),
                fields,
                methods: methods.into_iter().map(|f| (f.name, Arc::new(f))).collect(),
            }));
            def.types.insert(name, type_id);
            unlinked.push((type_id, implements));
        }

        self.program.register_module_name(id, def.name);
        *self.program.module_mut(id) = def;

        // Link pass: interface names resolve against this module's table,
        // its imports, and the global table, now that every descriptor
        // exists.
        for (class_id, interface_names) in unlinked {
            let mut resolved = Vec::with_capacity(interface_names.len());
            for name in interface_names {
                let Some(interface_id) = self.program.lookup_type(id, name) else {
                    return err!(
                        NotAType;
                        "unknown interface '{}' in implements list",
                        self.program.interner.get(name)
                    );
                };
                if !matches!(self.program.type_def(interface_id), TypeDef::Interface(_)) {
                    return err!(
                        NotAType;
                        "'{}' is not an interface",
                        self.program.interner.get(name)
                    );
                }
                resolved.push(interface_id);
            }
            if let TypeDef::Class(class) = self.program.type_def_mut(class_id) {
                class.implements = resolved;
            }
        }
        Ok(id)
    }
}
