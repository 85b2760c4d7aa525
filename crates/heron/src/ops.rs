//! Unary and binary operator dispatch.
//!
//! Dispatch is keyed on the operand kinds after a promotion pre-pass: a
//! mixed `Int`/`Float` pair is normalized to `Float`/`Float` before any
//! arithmetic or ordering rule runs. The matrix is:
//!
//! * `is` / `as`: the right operand must be a type; `as` yields `null` on
//!   an incompatible cast.
//! * `+ - * / %`: numeric; `+` also concatenates strings. `Int` with `Int`
//!   stays `Int`; integer division by zero fails, float division follows
//!   IEEE-754.
//! * `== !=`: total, with numeric promotion, string/char content, enum
//!   (descriptor, member), instance identity; unrelated kinds are unequal.
//! * `< > <= >=`: numeric, string, or char, same kind on both sides after
//!   promotion.
//! * `&& || ^^`: `Bool` only.
//!
//! A number mixed with any non-numeric operand fails `IncompatibleTypes`;
//! combinations outside the matrix fail `UnsupportedOperation`.

use std::cmp::Ordering;

use crate::error::{err, EvalResult, HeronError};
use crate::expr::{BinaryOp, UnaryOp};
use crate::heap::{string_content, Heap, HeapData, InterfaceView};
use crate::program::{Program, TypeDef};
use crate::value::Value;

pub fn unary(op: UnaryOp, operand: Value, heap: &Heap, program: &Program) -> EvalResult<Value> {
    match (op, &operand) {
        (UnaryOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::BitNot, Value::Int(v)) => Ok(Value::Int(!v)),
        (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        _ => err!(
            UnsupportedOperation;
            "unary {op} is not defined for {}",
            operand.type_name(program, heap)
        ),
    }
}

pub fn binary(
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    heap: &mut Heap,
    program: &Program,
) -> EvalResult<Value> {
    match op {
        BinaryOp::Is => {
            let target = type_operand(op, &rhs, heap, program)?;
            Ok(Value::Bool(program.is_compatible(target, &lhs, heap)))
        }
        BinaryOp::As => {
            let target = type_operand(op, &rhs, heap, program)?;
            Ok(cast(target, lhs, heap, program))
        }
        // Equality is total; the null policy falls out of `equals`.
        BinaryOp::Eq => Ok(Value::Bool(lhs.equals(&rhs, heap, program))),
        BinaryOp::Ne => Ok(Value::Bool(!lhs.equals(&rhs, heap, program))),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => logical(op, &lhs, &rhs, heap, program),
        _ => {
            if matches!(lhs, Value::Null) || matches!(rhs, Value::Null) {
                return err!(
                    UnsupportedOperation;
                    "null supports only == and !=, not {op}"
                );
            }
            dispatch(op, lhs, rhs, heap, program)
        }
    }
}

/// Extracts the `TypeId` from the right operand of `is`/`as`.
fn type_operand(
    op: BinaryOp,
    rhs: &Value,
    heap: &Heap,
    program: &Program,
) -> EvalResult<crate::program::TypeId> {
    match rhs.unwrap_any() {
        Value::Type(id) => Ok(*id),
        other => err!(
            NotAType;
            "right operand of {op} must be a type, not {}",
            other.type_name(program, heap)
        ),
    }
}

/// `lhs as target`: the cast value, or `Null` when incompatible.
fn cast(target: crate::program::TypeId, lhs: Value, heap: &mut Heap, program: &Program) -> Value {
    if !program.is_compatible(target, &lhs, heap) {
        return Value::Null;
    }
    let inner = lhs.unwrap_any().clone();
    match program.type_def(target) {
        TypeDef::Primitive(crate::program::Primitive::Any) => Value::Any(Box::new(inner)),
        TypeDef::Interface(_) => {
            let Value::Ref(id) = inner else {
                return Value::Null;
            };
            // Rewrap at the concrete instance, whichever view we start from.
            let instance = heap.identity_target(id);
            if let HeapData::Interface(view) = heap.get(id) {
                if view.interface == target {
                    return Value::Ref(id);
                }
            }
            Value::Ref(heap.allocate(HeapData::Interface(InterfaceView {
                interface: target,
                target: instance,
            })))
        }
        TypeDef::Class(_) => {
            // Casting an interface view back to the class unwraps it.
            let Value::Ref(id) = inner else {
                return Value::Null;
            };
            Value::Ref(heap.identity_target(id))
        }
        _ => inner,
    }
}

fn logical(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    heap: &Heap,
    program: &Program,
) -> EvalResult<Value> {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
            BinaryOp::And => *a && *b,
            BinaryOp::Or => *a || *b,
            BinaryOp::Xor => *a ^ *b,
            _ => unreachable!("logical called with a non-logical operator"),
        })),
        _ => err!(
            UnsupportedOperation;
            "{op} requires Bool operands, got {} and {}",
            lhs.type_name(program, heap),
            rhs.type_name(program, heap)
        ),
    }
}

/// Operand kinds after promotion, the key of the dispatch table.
///
/// String contents are owned here so the `+` arm can allocate the result
/// without fighting the heap borrow.
enum Operands {
    Ints(i64, i64),
    Floats(f64, f64),
    Strs(String, String),
    Chars(char, char),
    Other,
}

fn classify(lhs: &Value, rhs: &Value, heap: &Heap, program: &Program) -> Operands {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Operands::Ints(*a, *b),
        (Value::Float(a), Value::Float(b)) => Operands::Floats(*a, *b),
        // Promotion: Int meets Float as Float.
        (Value::Int(a), Value::Float(b)) => Operands::Floats(*a as f64, *b),
        (Value::Float(a), Value::Int(b)) => Operands::Floats(*a, *b as f64),
        (Value::Char(a), Value::Char(b)) => Operands::Chars(*a, *b),
        _ => match (
            string_content(lhs, heap, &program.interner),
            string_content(rhs, heap, &program.interner),
        ) {
            (Some(a), Some(b)) => Operands::Strs(a.to_owned(), b.to_owned()),
            _ => Operands::Other,
        },
    }
}

fn dispatch(
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    heap: &mut Heap,
    program: &Program,
) -> EvalResult<Value> {
    let result = match classify(&lhs, &rhs, heap, program) {
        Operands::Ints(a, b) => Some(int_op(op, a, b)?),
        Operands::Floats(a, b) => Some(float_op(op, a, b)?),
        Operands::Strs(a, b) => match op {
            BinaryOp::Add => {
                let concat = format!("{a}{b}");
                Some(Value::Ref(heap.allocate(HeapData::Str(concat))))
            }
            _ => ordering_op(op, a.as_str().cmp(b.as_str())),
        },
        Operands::Chars(a, b) => ordering_op(op, a.cmp(&b)),
        Operands::Other => None,
    };
    match result {
        Some(value) => Ok(value),
        None => {
            // A number mixed with anything else is a type error; the rest of
            // the matrix is simply undefined.
            let numeric = |v: &Value| matches!(v, Value::Int(_) | Value::Float(_));
            if numeric(&lhs) != numeric(&rhs) {
                err!(
                    IncompatibleTypes;
                    "{op} is not defined between {} and {}",
                    lhs.type_name(program, heap),
                    rhs.type_name(program, heap)
                )
            } else {
                err!(
                    UnsupportedOperation;
                    "{op} is not defined for {} and {}",
                    lhs.type_name(program, heap),
                    rhs.type_name(program, heap)
                )
            }
        }
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> EvalResult<Value> {
    let value = match op {
        // Overflow falls back to float arithmetic rather than wrapping.
        BinaryOp::Add => a
            .checked_add(b)
            .map_or(Value::Float(a as f64 + b as f64), Value::Int),
        BinaryOp::Sub => a
            .checked_sub(b)
            .map_or(Value::Float(a as f64 - b as f64), Value::Int),
        BinaryOp::Mul => a
            .checked_mul(b)
            .map_or(Value::Float(a as f64 * b as f64), Value::Int),
        BinaryOp::Div => {
            if b == 0 {
                return err!(DivisionByZero; "integer division by zero");
            }
            Value::Int(a.wrapping_div(b))
        }
        BinaryOp::Rem => {
            if b == 0 {
                return err!(DivisionByZero; "integer modulo by zero");
            }
            Value::Int(a.wrapping_rem(b))
        }
        _ => {
            return ordering_op(op, a.cmp(&b)).ok_or_else(|| {
                HeronError::new(
                    crate::error::ErrorKind::UnsupportedOperation,
                    format!("{op} is not defined for Int and Int"),
                )
            })
        }
    };
    Ok(value)
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> EvalResult<Value> {
    let value = match op {
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Sub => Value::Float(a - b),
        BinaryOp::Mul => Value::Float(a * b),
        // IEEE-754: division by zero yields infinities or NaN, no failure.
        BinaryOp::Div => Value::Float(a / b),
        BinaryOp::Rem => Value::Float(a % b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Ge => Value::Bool(a >= b),
        _ => {
            return err!(
                UnsupportedOperation;
                "{op} is not defined for Float and Float"
            )
        }
    };
    Ok(value)
}

fn ordering_op(op: BinaryOp, ordering: Ordering) -> Option<Value> {
    let truth = match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        _ => return None,
    };
    Some(Value::Bool(truth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::program::builtin;

    fn fixture() -> (Program, Heap) {
        (Program::new(), Heap::default())
    }

    #[test]
    fn int_arithmetic_stays_int() {
        let (program, mut heap) = fixture();
        let v = binary(BinaryOp::Div, Value::Int(7), Value::Int(2), &mut heap, &program).unwrap();
        assert_eq!(v, Value::Int(3));
    }

    #[test]
    fn mixed_numerics_promote_to_float() {
        let (program, mut heap) = fixture();
        for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div, BinaryOp::Rem] {
            let mixed = binary(op, Value::Int(7), Value::Float(2.0), &mut heap, &program).unwrap();
            let float = binary(op, Value::Float(7.0), Value::Float(2.0), &mut heap, &program).unwrap();
            assert_eq!(mixed, float, "{op} should promote Int to Float");
        }
    }

    #[test]
    fn integer_division_by_zero_fails() {
        let (program, mut heap) = fixture();
        for op in [BinaryOp::Div, BinaryOp::Rem] {
            let e = binary(op, Value::Int(1), Value::Int(0), &mut heap, &program).unwrap_err();
            assert_eq!(e.kind, ErrorKind::DivisionByZero);
        }
    }

    #[test]
    fn float_division_by_zero_is_ieee() {
        let (program, mut heap) = fixture();
        let v = binary(BinaryOp::Div, Value::Float(1.0), Value::Float(0.0), &mut heap, &program)
            .unwrap();
        assert_eq!(v, Value::Float(f64::INFINITY));
    }

    #[test]
    fn string_concatenation_and_ordering() {
        let (mut program, mut heap) = fixture();
        let a = Value::Str(program.interner.intern("a"));
        let b = Value::Str(program.interner.intern("b"));
        let joined = binary(BinaryOp::Add, a.clone(), b.clone(), &mut heap, &program).unwrap();
        assert_eq!(string_content(&joined, &heap, &program.interner), Some("ab"));
        let lt = binary(BinaryOp::Lt, a, b, &mut heap, &program).unwrap();
        assert_eq!(lt, Value::Bool(true));
    }

    #[test]
    fn null_supports_only_equality() {
        let (program, mut heap) = fixture();
        let eq = binary(BinaryOp::Eq, Value::Null, Value::Int(1), &mut heap, &program).unwrap();
        assert_eq!(eq, Value::Bool(false));
        let ne = binary(BinaryOp::Ne, Value::Null, Value::Null, &mut heap, &program).unwrap();
        assert_eq!(ne, Value::Bool(false));
        let e = binary(BinaryOp::Add, Value::Null, Value::Int(1), &mut heap, &program).unwrap_err();
        assert_eq!(e.kind, ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn logical_operators_require_bools() {
        let (program, mut heap) = fixture();
        let v = binary(
            BinaryOp::Xor,
            Value::Bool(true),
            Value::Bool(true),
            &mut heap,
            &program,
        )
        .unwrap();
        assert_eq!(v, Value::Bool(false));
        let e = binary(BinaryOp::And, Value::Int(1), Value::Int(1), &mut heap, &program).unwrap_err();
        assert_eq!(e.kind, ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn number_with_non_number_is_incompatible() {
        let (mut program, mut heap) = fixture();
        let s = Value::Str(program.interner.intern("x"));
        let e = binary(BinaryOp::Add, Value::Int(1), s, &mut heap, &program).unwrap_err();
        assert_eq!(e.kind, ErrorKind::IncompatibleTypes);
    }

    #[test]
    fn is_requires_a_type_operand() {
        let (program, mut heap) = fixture();
        let e = binary(BinaryOp::Is, Value::Int(1), Value::Int(2), &mut heap, &program).unwrap_err();
        assert_eq!(e.kind, ErrorKind::NotAType);
        let v = binary(
            BinaryOp::Is,
            Value::Int(1),
            Value::Type(builtin::INT),
            &mut heap,
            &program,
        )
        .unwrap();
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn as_yields_null_on_incompatible_casts() {
        let (program, mut heap) = fixture();
        let v = binary(
            BinaryOp::As,
            Value::Int(1),
            Value::Type(builtin::FLOAT),
            &mut heap,
            &program,
        )
        .unwrap();
        assert_eq!(v, Value::Null);
        let wrapped = binary(
            BinaryOp::As,
            Value::Int(1),
            Value::Type(builtin::ANY),
            &mut heap,
            &program,
        )
        .unwrap();
        assert_eq!(wrapped, Value::Any(Box::new(Value::Int(1))));
    }

    #[test]
    fn unary_dispatch() {
        let (program, heap) = fixture();
        assert_eq!(
            unary(UnaryOp::Neg, Value::Int(3), &heap, &program).unwrap(),
            Value::Int(-3)
        );
        assert_eq!(
            unary(UnaryOp::BitNot, Value::Int(0), &heap, &program).unwrap(),
            Value::Int(-1)
        );
        assert_eq!(
            unary(UnaryOp::Not, Value::Bool(true), &heap, &program).unwrap(),
            Value::Bool(false)
        );
        let e = unary(UnaryOp::Neg, Value::Bool(true), &heap, &program).unwrap_err();
        assert_eq!(e.kind, ErrorKind::UnsupportedOperation);
    }
}
