//! Process configuration.
//!
//! The configuration is an explicit, immutable bag handed to the
//! [`Interpreter`](crate::run::Interpreter) constructor; there are no hidden
//! globals. The CLI deserializes it from an optional `heron.toml` next to
//! the executable.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Recognized configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// File suffixes tried when resolving a module name, in order.
    pub extensions: Vec<String>,
    /// Directories searched for modules, in order.
    pub input_paths: Vec<PathBuf>,
    /// Parallelism bound for the `reduce` comprehension.
    pub max_threads: usize,
    /// Log parse and run durations.
    pub show_timing: bool,
    /// Run zero-argument module methods named `test*` before `Main`.
    pub run_unit_tests: bool,
    /// Accepted for compatibility; the grammar dumper is not part of this build.
    pub output_grammar: bool,
    /// Accepted for compatibility; the primitives dumper is not part of this build.
    pub output_primitives: bool,
    /// Wait for a keypress before the CLI exits.
    pub wait_for_keypress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: vec![".heron".to_owned()],
            input_paths: vec![PathBuf::from(".")],
            max_threads: num_cpus::get().max(1),
            show_timing: false,
            run_unit_tests: false,
            output_grammar: false,
            output_primitives: false,
            wait_for_keypress: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.extensions, vec![".heron".to_owned()]);
        assert!(config.max_threads >= 1);
        assert!(!config.run_unit_tests);
    }

    #[test]
    fn deserializes_partial_toml() {
        let config: Config = toml::from_str("max_threads = 2\nshow_timing = true\n").unwrap();
        assert_eq!(config.max_threads, 2);
        assert!(config.show_timing);
        assert_eq!(config.input_paths, vec![PathBuf::from(".")]);
    }
}
