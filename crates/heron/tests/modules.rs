use heron::{Config, ErrorKind, HeronObject, Interpreter};
use pretty_assertions::assert_eq;

fn run(source: &str) -> HeronObject {
    Interpreter::with_defaults()
        .run_source(source)
        .unwrap_or_else(|e| panic!("{e}"))
}

fn run_err(source: &str) -> heron::HeronError {
    Interpreter::with_defaults()
        .run_source(source)
        .expect_err("expected a failure")
}

#[test]
fn locals_control_flow_and_post_increment() {
    let result = run(
        "module M {
            function Main() {
                var x = 5;
                var old = x++;
                var sum = 0;
                foreach (i in [1, 2, 3]) { sum = sum + i; }
                var n = 0;
                while (n < 3) { n++; }
                if (x == 6) { sum = sum + 10; } else { sum = 0; }
                return [old, x, sum, n];
            }
        }",
    );
    assert_eq!(
        result,
        HeronObject::List(vec![
            HeronObject::Int(5),
            HeronObject::Int(6),
            HeronObject::Int(16),
            HeronObject::Int(3),
        ])
    );
}

#[test]
fn module_functions_call_each_other() {
    let result = run(
        "module M {
            function Square(x) { return x * x; }
            function Main() { return Square(3) + Square(4); }
        }",
    );
    assert_eq!(result, HeronObject::Int(25));
}

#[test]
fn functions_without_a_return_yield_void() {
    assert_eq!(
        run("module M { function Noop() { } function Main() { return Noop(); } }"),
        HeronObject::Void
    );
}

#[test]
fn classes_constructors_and_methods() {
    let result = run(
        "module M {
            class Point {
                var x;
                var y = 0;
                function Constructor(px, py) { x = px; y = py; }
                function LengthSquared() { return x * x + y * y; }
            }
            function Main() {
                var p = new Point(3, 4);
                p.x = p.x + 0;
                return p.LengthSquared();
            }
        }",
    );
    assert_eq!(result, HeronObject::Int(25));
}

#[test]
fn field_initializers_run_before_the_constructor() {
    let result = run(
        "module M {
            class Counter {
                var count = 10;
                function Constructor(bump) { count = count + bump; }
            }
            function Main() { return new Counter(5).count; }
        }",
    );
    assert_eq!(result, HeronObject::Int(15));
}

#[test]
fn class_without_constructor_takes_no_arguments() {
    let e = run_err(
        "module M {
            class Empty { var x; }
            function Main() { return new Empty(1); }
        }",
    );
    assert_eq!(e.kind, ErrorKind::ArityMismatch);
}

#[test]
fn new_requires_a_class_type() {
    let e = run_err("module M { function Main() { return new Int(); } }");
    assert_eq!(e.kind, ErrorKind::UnsupportedOperation);
    let e = run_err("module M { function Main() { var x = 1; return new x(); } }");
    assert_eq!(e.kind, ErrorKind::NotAType);
}

#[test]
fn instances_compare_by_identity() {
    let result = run(
        "module M {
            class Box { var v; }
            function Main() {
                var a = new Box();
                var b = new Box();
                var c = a;
                return [a == b, a == c];
            }
        }",
    );
    assert_eq!(
        result,
        HeronObject::List(vec![HeronObject::Bool(false), HeronObject::Bool(true)])
    );
}

#[test]
fn aggregates_share_state_through_references() {
    let result = run(
        "module M {
            function Fill(xs) { xs.Add(42); }
            function Main() {
                var xs = [];
                Fill(xs);
                xs[0] = xs[0] + 1;
                return xs;
            }
        }",
    );
    assert_eq!(result, HeronObject::List(vec![HeronObject::Int(43)]));
}

#[test]
fn interfaces_cast_and_dispatch() {
    let result = run(
        "module M {
            interface Shape { Area(); }
            class Square implements Shape {
                var side;
                function Constructor(s) { side = s; }
                function Area() { return side * side; }
                function Side() { return side; }
            }
            function Main() {
                var s = new Square(4) as Shape;
                var back = s as Square;
                return [s is Shape, s is Square, s.Area(), back.Side()];
            }
        }",
    );
    assert_eq!(
        result,
        HeronObject::List(vec![
            HeronObject::Bool(true),
            HeronObject::Bool(true),
            HeronObject::Int(16),
            HeronObject::Int(4),
        ])
    );
}

#[test]
fn interface_views_hide_non_interface_methods() {
    let e = run_err(
        "module M {
            interface Shape { Area(); }
            class Square implements Shape {
                var side;
                function Area() { return side; }
                function Side() { return side; }
            }
            function Main() { return (new Square() as Shape).Side(); }
        }",
    );
    assert_eq!(e.kind, ErrorKind::NoSuchField);
}

#[test]
fn casting_an_unrelated_class_yields_null() {
    let result = run(
        "module M {
            interface Shape { Area(); }
            class Blob { }
            function Main() { return new Blob() as Shape; }
        }",
    );
    assert_eq!(result, HeronObject::Null);
}

#[test]
fn enums_compare_by_descriptor_and_member() {
    let result = run(
        "module M {
            enum Color { Red; Green; Blue; }
            enum Mood { Red; }
            function Main() {
                return [
                    Color.Red == Color.Red,
                    Color.Red == Color.Green,
                    Color.Red == Mood.Red,
                    Color.Blue is Color,
                ];
            }
        }",
    );
    assert_eq!(
        result,
        HeronObject::List(vec![
            HeronObject::Bool(true),
            HeronObject::Bool(false),
            HeronObject::Bool(false),
            HeronObject::Bool(true),
        ])
    );
}

#[test]
fn enum_members_only_support_equality() {
    let e = run_err(
        "module M {
            enum Color { Red; Green; }
            function Main() { return Color.Red < Color.Green; }
        }",
    );
    assert_eq!(e.kind, ErrorKind::UnsupportedOperation);
}

#[test]
fn closures_snapshot_their_free_variables() {
    let result = run(
        "module M {
            function Main() {
                var x = 1;
                var f = function () { return x; };
                x = 2;
                return [f(), x];
            }
        }",
    );
    assert_eq!(
        result,
        HeronObject::List(vec![HeronObject::Int(1), HeronObject::Int(2)])
    );
}

#[test]
fn closures_carry_the_receiver() {
    let result = run(
        "module M {
            var base = 100;
            function MakeAdder(n) { return function (x) { return base + n + x; }; }
            function Main() { return MakeAdder(10)(5); }
        }",
    );
    assert_eq!(result, HeronObject::Int(115));
}

#[test]
fn methods_bind_their_receiver() {
    let result = run(
        "module M {
            class Greeter {
                var prefix;
                function Constructor(p) { prefix = p; }
                function Greet(name) { return prefix + name; }
            }
            function Main() {
                var greet = new Greeter(\"hi \").Greet;
                return greet(\"heron\");
            }
        }",
    );
    assert_eq!(result, HeronObject::Str("hi heron".to_owned()));
}

#[test]
fn null_dereference_reports_the_receiver() {
    let e = run_err(
        "module M {
            function Main() {
                var p = null;
                return p.x;
            }
        }",
    );
    assert_eq!(e.kind, ErrorKind::NullDereference);
    assert!(e.message.contains('x'));
}

#[test]
fn missing_fields_and_arity_errors() {
    let e = run_err(
        "module M {
            class Box { var v; }
            function Main() { return new Box().nope; }
        }",
    );
    assert_eq!(e.kind, ErrorKind::NoSuchField);

    let e = run_err(
        "module M {
            function F(a, b) { return a; }
            function Main() { return F(1); }
        }",
    );
    assert_eq!(e.kind, ErrorKind::ArityMismatch);

    let e = run_err("module M { function Main() { return 1(); } }");
    assert_eq!(e.kind, ErrorKind::NotCallable);
}

#[test]
fn parameter_annotations_check_at_call_time() {
    let result = run(
        "module M {
            function Twice(x : Int) { return x * 2; }
            function Main() { return Twice(21); }
        }",
    );
    assert_eq!(result, HeronObject::Int(42));

    let e = run_err(
        "module M {
            function Twice(x : Int) { return x * 2; }
            function Main() { return Twice(\"a\"); }
        }",
    );
    assert_eq!(e.kind, ErrorKind::TypeMismatch);
}

#[test]
fn meta_runs_before_main() {
    let result = run(
        "module M {
            var greeting;
            function Meta() { greeting = \"ready\"; }
            function Main() { return greeting; }
        }",
    );
    assert_eq!(result, HeronObject::Str("ready".to_owned()));
}

#[test]
fn missing_main_is_no_entry_point() {
    let e = run_err("module M { function Helper() { return 1; } }");
    assert_eq!(e.kind, ErrorKind::NoEntryPoint);
}

#[test]
fn module_tests_run_when_configured() {
    let source = "module M {
        var seeded = 0;
        function testSeed() { seeded = 42; }
        function Main() { return seeded; }
    }";
    assert_eq!(
        Interpreter::with_defaults().run_source(source).unwrap(),
        HeronObject::Int(0)
    );
    let config = Config {
        run_unit_tests: true,
        ..Config::default()
    };
    assert_eq!(
        Interpreter::new(config).run_source(source).unwrap(),
        HeronObject::Int(42)
    );
}

#[test]
fn failures_carry_a_call_stack_summary() {
    let e = run_err(
        "module M {
            function Boom() { return 1 / 0; }
            function Main() { return Boom(); }
        }",
    );
    assert_eq!(e.kind, ErrorKind::DivisionByZero);
    assert_eq!(e.expr.as_deref(), Some("1 / 0"));
    assert!(e.stack.iter().any(|f| f.contains("M.Boom")), "{:?}", e.stack);
    assert!(e.stack.iter().any(|f| f.contains("M.Main")), "{:?}", e.stack);
}
