//! Public interface for running Heron code.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{err, HeronError};
use crate::eval::{eval, instantiate_module, invoke};
use crate::expr::Expr;
use crate::intern::known;
use crate::loader;
use crate::object::HeronObject;
use crate::parse;
use crate::program::{ModuleId, Program};
use crate::vm::Vm;

/// The interpreter: a program under construction plus its configuration.
///
/// Modules accumulate across `load_*`/`run_*` calls; each evaluation runs
/// on a fresh machine against the loaded program.
///
/// # Example
/// ```
/// use heron::{HeronObject, Interpreter};
///
/// let mut interpreter = Interpreter::with_defaults();
/// let result = interpreter.eval_source("1 + 2 * 3").unwrap();
/// assert_eq!(result, HeronObject::Int(7));
/// ```
#[derive(Debug)]
pub struct Interpreter {
    config: Config,
    program: Program,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            program: Program::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parses and evaluates a single expression against the loaded program.
    pub fn eval_source(&mut self, source: &str) -> Result<HeronObject, HeronError> {
        let expr = parse::parse_expression(source, &mut self.program.interner, ModuleId::GLOBAL)?;
        self.eval(&expr)
    }

    /// Evaluates an already-built expression tree.
    pub fn eval(&mut self, expr: &Expr) -> Result<HeronObject, HeronError> {
        let mut vm = Vm::new(&self.program, self.config.max_threads);
        let value = eval(&mut vm, expr)?;
        Ok(HeronObject::from_value(&value, &vm.heap, &self.program))
    }

    /// Loads a module (and, recursively, its imports) from a file.
    pub fn load_file(&mut self, path: &Path) -> Result<ModuleId, HeronError> {
        loader::load_file(&mut self.program, &self.config, path)
    }

    /// Loads a module from in-memory source.
    pub fn load_source(&mut self, source: &str) -> Result<ModuleId, HeronError> {
        loader::load_source(&mut self.program, &self.config, source)
    }

    /// Loads a module file and runs it: instantiate, `Meta` if present,
    /// then `Main`. Returns `Main`'s result.
    pub fn run_file(&mut self, path: &Path) -> Result<HeronObject, HeronError> {
        let started = Instant::now();
        let module = self.load_file(path)?;
        if self.config.show_timing {
            info!(elapsed = ?started.elapsed(), path = %path.display(), "module loaded");
        }
        self.run_module(module)
    }

    /// Loads a module from source and runs it, as `run_file` does.
    pub fn run_source(&mut self, source: &str) -> Result<HeronObject, HeronError> {
        let module = self.load_source(source)?;
        self.run_module(module)
    }

    /// Instantiates a loaded module and invokes its entry points.
    pub fn run_module(&mut self, module_id: ModuleId) -> Result<HeronObject, HeronError> {
        let started = Instant::now();
        let program = &self.program;
        let mut vm = Vm::new(program, self.config.max_threads);
        let instance = instantiate_module(&mut vm, module_id)?;
        let module = program.module(module_id);

        if self.config.run_unit_tests {
            for (name, def) in &module.methods {
                if program.interner.get(*name).starts_with("test") && def.params.is_empty() {
                    debug!(test = program.interner.get(*name), "running module test");
                    invoke(&mut vm, instance.clone(), def, Vec::new())?;
                }
            }
        }

        if let Some(meta) = module.methods.get(&known::META) {
            invoke(&mut vm, instance.clone(), meta, Vec::new())?;
        }
        let Some(main) = module.methods.get(&known::MAIN) else {
            return err!(
                NoEntryPoint;
                "module '{}' has no Main method",
                program.interner.get(module.name)
            );
        };
        let result = invoke(&mut vm, instance, main, Vec::new())?;
        if self.config.show_timing {
            info!(elapsed = ?started.elapsed(), "module run finished");
        }
        Ok(HeronObject::from_value(&result, &vm.heap, program))
    }
}
