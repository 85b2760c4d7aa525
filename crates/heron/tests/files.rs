use std::fs;
use std::path::Path;

use heron::{Config, ErrorKind, HeronObject, Interpreter};
use pretty_assertions::assert_eq;

fn write(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(name), source).unwrap();
}

#[test]
fn run_file_invokes_main() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.heron",
        "module Main { function Main() { return 6 * 7; } }",
    );
    let result = Interpreter::with_defaults()
        .run_file(&dir.path().join("main.heron"))
        .unwrap();
    assert_eq!(result, HeronObject::Int(42));
}

#[test]
fn imports_resolve_next_to_the_root_file() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.heron",
        "module Main {
            import Geometry;
            function Main() { return new Circle(3).Area(); }
        }",
    );
    write(
        dir.path(),
        "Geometry.heron",
        "module Geometry {
            class Circle {
                var radius;
                function Constructor(r) { radius = r; }
                function Area() { return radius * radius * 3; }
            }
        }",
    );
    let result = Interpreter::with_defaults()
        .run_file(&dir.path().join("main.heron"))
        .unwrap();
    assert_eq!(result, HeronObject::Int(27));
}

#[test]
fn imports_resolve_through_configured_paths_and_extensions() {
    let libs = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    write(libs.path(), "Util.hrn", "module Util { var answer = 42; }");
    write(
        dir.path(),
        "main.heron",
        "module Main {
            import Util;
            function Main() { return 1; }
        }",
    );
    let config = Config {
        extensions: vec![".heron".to_owned(), ".hrn".to_owned()],
        input_paths: vec![libs.path().to_path_buf()],
        ..Config::default()
    };
    let result = Interpreter::new(config)
        .run_file(&dir.path().join("main.heron"))
        .unwrap();
    assert_eq!(result, HeronObject::Int(1));
}

#[test]
fn missing_files_and_imports_fail() {
    let e = Interpreter::with_defaults()
        .run_file(Path::new("no/such/file.heron"))
        .unwrap_err();
    assert_eq!(e.kind, ErrorKind::ModuleNotFound);

    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.heron",
        "module Main { import Absent; function Main() { return 0; } }",
    );
    let e = Interpreter::with_defaults()
        .run_file(&dir.path().join("main.heron"))
        .unwrap_err();
    assert_eq!(e.kind, ErrorKind::ModuleNotFound);
}

#[test]
fn circular_imports_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "A.heron",
        "module A { import B; function Main() { return 0; } }",
    );
    write(dir.path(), "B.heron", "module B { import A; }");
    let e = Interpreter::with_defaults()
        .run_file(&dir.path().join("A.heron"))
        .unwrap_err();
    assert_eq!(e.kind, ErrorKind::CircularModuleDependency);
}

#[test]
fn imported_types_are_visible_across_modules() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.heron",
        "module Main {
            import Shapes;
            class Disc implements Shape {
                function Area() { return 1; }
            }
            function Main() { return new Disc() is Shape; }
        }",
    );
    write(
        dir.path(),
        "Shapes.heron",
        "module Shapes { interface Shape { Area(); } }",
    );
    let result = Interpreter::with_defaults()
        .run_file(&dir.path().join("main.heron"))
        .unwrap();
    assert_eq!(result, HeronObject::Bool(true));
}
