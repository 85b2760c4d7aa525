use heron::{ErrorKind, HeronObject, Interpreter};
use pretty_assertions::assert_eq;

fn eval(source: &str) -> HeronObject {
    Interpreter::with_defaults()
        .eval_source(source)
        .unwrap_or_else(|e| panic!("{source}: {e}"))
}

fn eval_err(source: &str) -> heron::HeronError {
    Interpreter::with_defaults()
        .eval_source(source)
        .expect_err("expected a failure")
}

#[test]
fn precedence_is_the_parsers_problem_dispatch_is_ours() {
    assert_eq!(eval("1 + 2 * 3"), HeronObject::Int(7));
    assert_eq!(eval("(1 + 2) * 3"), HeronObject::Int(9));
}

#[test]
fn string_concatenation_chains() {
    assert_eq!(eval("\"a\" + \"b\" + \"c\""), HeronObject::Str("abc".to_owned()));
}

#[test]
fn int_arithmetic_stays_int() {
    assert_eq!(eval("7 / 2"), HeronObject::Int(3));
    assert_eq!(eval("7 % 2"), HeronObject::Int(1));
    assert_eq!(eval("-7 / 2"), HeronObject::Int(-3));
}

#[test]
fn mixed_numerics_equal_their_promoted_form() {
    // a op b == float(a) op b for every op in the matrix.
    for op in ["+", "-", "*", "/", "%", "<", ">", "<=", ">=", "==", "!="] {
        let mixed = eval(&format!("7 {op} 2.0"));
        let floats = eval(&format!("7.0 {op} 2.0"));
        assert_eq!(mixed, floats, "op {op}");
    }
}

#[test]
fn float_division_follows_ieee() {
    assert_eq!(eval("1.0 / 0.0"), HeronObject::Float(f64::INFINITY));
    assert_eq!(eval("-1.0 / 0.0"), HeronObject::Float(f64::NEG_INFINITY));
}

#[test]
fn integer_division_by_zero_fails() {
    assert_eq!(eval_err("1 / 0").kind, ErrorKind::DivisionByZero);
    assert_eq!(eval_err("1 % 0").kind, ErrorKind::DivisionByZero);
}

#[test]
fn unary_operators() {
    assert_eq!(eval("-(1 + 2)"), HeronObject::Int(-3));
    assert_eq!(eval("!true"), HeronObject::Bool(false));
    assert_eq!(eval("~0"), HeronObject::Int(-1));
    assert_eq!(eval_err("!1").kind, ErrorKind::UnsupportedOperation);
}

#[test]
fn logical_operators_are_bool_only() {
    assert_eq!(eval("true && false"), HeronObject::Bool(false));
    assert_eq!(eval("true ^^ false"), HeronObject::Bool(true));
    assert_eq!(eval_err("1 && 2").kind, ErrorKind::UnsupportedOperation);
}

#[test]
fn char_and_string_comparisons() {
    assert_eq!(eval("'a' < 'b'"), HeronObject::Bool(true));
    assert_eq!(eval("\"abc\" < \"abd\""), HeronObject::Bool(true));
    assert_eq!(eval("'a' == 'a'"), HeronObject::Bool(true));
    assert_eq!(eval_err("'a' < \"a\"").kind, ErrorKind::UnsupportedOperation);
}

#[test]
fn null_policy() {
    assert_eq!(eval("null == null"), HeronObject::Bool(true));
    assert_eq!(eval("null == 1"), HeronObject::Bool(false));
    assert_eq!(eval("null != \"x\""), HeronObject::Bool(true));
    assert_eq!(eval_err("null + 1").kind, ErrorKind::UnsupportedOperation);
}

#[test]
fn number_mixed_with_non_number_is_incompatible() {
    assert_eq!(eval_err("1 + \"a\"").kind, ErrorKind::IncompatibleTypes);
    assert_eq!(eval_err("1 < 'a'").kind, ErrorKind::IncompatibleTypes);
}

#[test]
fn tuples_evaluate_to_lists() {
    assert_eq!(
        eval("[1, 2 + 3, \"x\"]"),
        HeronObject::List(vec![
            HeronObject::Int(1),
            HeronObject::Int(5),
            HeronObject::Str("x".to_owned()),
        ])
    );
}

#[test]
fn indexing_and_bounds() {
    assert_eq!(eval("[10, 20, 30][1]"), HeronObject::Int(20));
    assert_eq!(eval_err("[1][5]").kind, ErrorKind::UnsupportedOperation);
    assert_eq!(eval_err("[1][true]").kind, ErrorKind::IncompatibleTypes);
    assert_eq!(eval_err("1[0]").kind, ErrorKind::UnsupportedOperation);
}

#[test]
fn builtin_sequence_and_string_methods() {
    assert_eq!(eval("[1, 2, 3].Count()"), HeronObject::Int(3));
    assert_eq!(eval("\"abc\".Length()"), HeronObject::Int(3));
    assert_eq!(eval("(\"ab\" + \"c\").Length()"), HeronObject::Int(3));
}

#[test]
fn is_and_as_on_primitives() {
    assert_eq!(eval("1 is Int"), HeronObject::Bool(true));
    assert_eq!(eval("1 is Float"), HeronObject::Bool(false));
    assert_eq!(eval("1 as Int"), HeronObject::Int(1));
    assert_eq!(eval("1 as Float"), HeronObject::Null);
    assert_eq!(eval("\"x\" is String"), HeronObject::Bool(true));
    assert_eq!(eval("[1] is List"), HeronObject::Bool(true));
}

#[test]
fn any_erases_and_recovers() {
    assert_eq!(eval("(1 as Any) is Int"), HeronObject::Bool(true));
    assert_eq!(eval("(1 as Any) as Int"), HeronObject::Int(1));
    // The snapshot crossing the public boundary sees through the wrapper.
    assert_eq!(eval("1 as Any"), HeronObject::Int(1));
}

#[test]
fn null_is_compatible_with_nothing() {
    assert_eq!(eval("null is Int"), HeronObject::Bool(false));
    assert_eq!(eval("null is Any"), HeronObject::Bool(false));
    assert_eq!(eval("null as Int"), HeronObject::Null);
}

#[test]
fn is_requires_a_type() {
    assert_eq!(eval_err("1 is 2").kind, ErrorKind::NotAType);
}

#[test]
fn unknown_names_fail() {
    let e = eval_err("nope + 1");
    assert_eq!(e.kind, ErrorKind::NameNotFound);
    assert!(e.message.contains("nope"));
}

#[test]
fn failures_quote_the_innermost_expression() {
    let e = eval_err("(1 / 0) + 2");
    assert_eq!(e.kind, ErrorKind::DivisionByZero);
    assert_eq!(e.expr.as_deref(), Some("1 / 0"));
}

#[test]
fn parse_errors_surface_with_positions() {
    let e = eval_err("1 +");
    assert_eq!(e.kind, ErrorKind::ParseError);
    assert!(e.message.contains("line 1"));
}
