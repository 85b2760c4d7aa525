//! The expression evaluator and function application.
//!
//! Evaluation is a recursive walk over the expression tree against a
//! [`Vm`]. Sub-expressions evaluate strictly left-to-right, depth-first.
//! Failures unwind through the scope/frame guards; each one picks up the
//! rendering of the innermost failing expression and a frame summary per
//! unwound call.

use std::sync::Arc;

use crate::comprehension;
use crate::error::{err, EvalResult};
use crate::expr::{BinaryOp, Expr, Literal};
use crate::heap::{Closure, HeapData};
use crate::intern::{known, StringId};
use crate::ops;
use crate::program::{FunctionDef, ModuleId, TypeDef, TypeId};
use crate::scope::{Frame, Scope};
use crate::stmt::{free_variables, Stmt};
use crate::value::{call_builtin, Value};
use crate::vm::Vm;

/// Evaluates an expression to a value.
pub fn eval(vm: &mut Vm, expr: &Expr) -> EvalResult<Value> {
    eval_inner(vm, expr).map_err(|e| e.note_expr(|| vm.render(expr)))
}

fn eval_inner(vm: &mut Vm, expr: &Expr) -> EvalResult<Value> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Literal(lit) => Ok(literal_value(*lit)),
        Expr::Name(name) => vm.lookup_name(*name),
        Expr::Assign { target, value } => {
            // Right side first, then the place.
            let value = eval(vm, value)?;
            assign_to(vm, target, value.clone())?;
            Ok(value)
        }
        Expr::Field { receiver, name } => {
            let program = vm.program();
            let value = eval(vm, receiver)?;
            if matches!(value, Value::Null) {
                return err!(
                    NullDereference;
                    "null has no field '{}' (receiver: {})",
                    program.interner.get(*name),
                    vm.render(receiver)
                );
            }
            value.get_field_or_method(*name, &mut vm.heap, program)
        }
        Expr::Index { collection, index } => {
            let collection = eval(vm, collection)?;
            let index = eval(vm, index)?;
            collection.get_at_index(&index, &vm.heap, vm.program())
        }
        Expr::New { type_name, args } => {
            let args = eval_args(vm, args)?;
            let target = vm.lookup_name(*type_name)?;
            let Value::Type(type_id) = target else {
                return err!(
                    NotAType;
                    "'{}' is not a type",
                    vm.program().interner.get(*type_name)
                );
            };
            instantiate(vm, type_id, args)
        }
        Expr::Call { callee, args } => {
            // Arguments evaluate left-to-right before the callee.
            let args = eval_args(vm, args)?;
            let callee = eval(vm, callee)?;
            call_value(vm, callee, args)
        }
        Expr::Unary { op, operand } => {
            let operand = eval(vm, operand)?;
            ops::unary(*op, operand, &vm.heap, vm.program())
        }
        Expr::Binary { op, left, right } => {
            let program = vm.program();
            let left = eval(vm, left)?;
            let right = eval(vm, right)?;
            ops::binary(*op, left, right, &mut vm.heap, program)
        }
        Expr::Function(def) => Ok(make_closure(vm, def)),
        Expr::PostIncrement { target } => {
            let program = vm.program();
            let old = eval(vm, target)?;
            let incremented = ops::binary(
                BinaryOp::Add,
                old.clone(),
                Value::Int(1),
                &mut vm.heap,
                program,
            )?;
            assign_to(vm, target, incremented)?;
            Ok(old)
        }
        Expr::Tuple(items) => {
            let values = eval_args(vm, items)?;
            Ok(Value::Ref(vm.heap.allocate(HeapData::List(values))))
        }
        Expr::Select {
            var,
            source,
            predicate,
        } => comprehension::select(vm, *var, source, predicate),
        Expr::MapEach {
            var,
            source,
            yield_expr,
        } => comprehension::map_each(vm, *var, source, yield_expr),
        Expr::Accumulate {
            acc,
            init,
            each,
            source,
            step,
        } => comprehension::accumulate(vm, *acc, init, *each, source, step),
        Expr::Reduce {
            left,
            right,
            source,
            combine,
        } => comprehension::reduce(vm, *left, *right, source, combine),
    }
}

fn literal_value(lit: Literal) -> Value {
    match lit {
        Literal::Bool(b) => Value::Bool(b),
        Literal::Int(v) => Value::Int(v),
        Literal::Float(v) => Value::Float(v),
        Literal::Char(c) => Value::Char(c),
        Literal::Str(id) => Value::Str(id),
    }
}

fn eval_args(vm: &mut Vm, exprs: &[Expr]) -> EvalResult<Vec<Value>> {
    exprs.iter().map(|e| eval(vm, e)).collect()
}

/// Stores `value` into an assignable place: a name, a field, or an index.
fn assign_to(vm: &mut Vm, target: &Expr, value: Value) -> EvalResult<()> {
    match target {
        Expr::Name(name) => vm.set_var(*name, value),
        Expr::Field { receiver, name } => {
            let program = vm.program();
            let receiver = eval(vm, receiver)?;
            if matches!(receiver, Value::Null) {
                return err!(
                    NullDereference;
                    "cannot assign field '{}' on null",
                    program.interner.get(*name)
                );
            }
            receiver.set_field(*name, value, &mut vm.heap, program)
        }
        Expr::Index { collection, index } => {
            let program = vm.program();
            let collection = eval(vm, collection)?;
            let index = eval(vm, index)?;
            collection.set_at_index(&index, value, &mut vm.heap, program)
        }
        _ => err!(NotAssignable; "expression is not assignable"),
    }
}

/// Constructs a closure value from an anonymous function node.
///
/// Free variables that are bound in the enclosing frame's scopes are
/// snapshotted by value; names that aren't stay unresolved until call time,
/// when they fall through to the receiver and the module/global type
/// tables. The current receiver rides along so field access keeps working
/// inside the closure.
fn make_closure(vm: &mut Vm, def: &Arc<FunctionDef>) -> Value {
    let mut captured = Scope::new();
    for name in free_variables(def) {
        if let Some(value) = vm.get_var(name) {
            captured.declare(name, value);
        }
    }
    let closure = Closure {
        def: Arc::clone(def),
        receiver: vm.frame().receiver.clone(),
        captured,
    };
    Value::Ref(vm.heap.allocate(HeapData::Function(closure)))
}

/// Applies a callable value to already-evaluated arguments.
pub fn call_value(vm: &mut Vm, callee: Value, args: Vec<Value>) -> EvalResult<Value> {
    match &callee {
        Value::Ref(id) => match vm.heap.get(*id) {
            HeapData::Function(closure) => {
                let closure = closure.clone();
                call_closure(vm, &closure, args)
            }
            HeapData::BoundBuiltin { receiver, builtin } => {
                let program = vm.program();
                let (receiver, builtin) = (receiver.clone(), *builtin);
                call_builtin(builtin, &receiver, args, &mut vm.heap, program)
            }
            _ => err!(
                NotCallable;
                "{} is not callable",
                callee.type_name(vm.program(), &vm.heap)
            ),
        },
        _ => err!(
            NotCallable;
            "{} is not callable",
            callee.type_name(vm.program(), &vm.heap)
        ),
    }
}

/// Calls a closure: new frame bound to the receiver, captured snapshot
/// below a scope binding the formals, body, return value via the flag.
pub fn call_closure(vm: &mut Vm, closure: &Closure, args: Vec<Value>) -> EvalResult<Value> {
    let def = &closure.def;
    let program = vm.program();
    if args.len() != def.params.len() {
        return err!(
            ArityMismatch;
            "function '{}' takes {} argument(s), got {}",
            program.interner.get(def.name),
            def.params.len(),
            args.len()
        );
    }

    let mut params = Scope::new();
    for (param, arg) in def.params.iter().zip(args) {
        check_annotation(vm, def, param.name, param.type_name, &arg)?;
        params.declare(param.name, arg);
    }

    let frame = Frame::call(Arc::clone(def), closure.receiver.clone());
    let captured = closure.captured.clone();
    let body = Arc::clone(def);
    let result = vm.with_frame(frame, |vm| {
        vm.scoped(captured, |vm| {
            vm.scoped(params, |vm| exec_stmts(vm, &body.body))
        })
    });
    // Clear the flag on both paths so a pending return never leaks upward.
    let returned = vm.take_return();
    result?;
    Ok(returned.unwrap_or(Value::Void))
}

/// Enforces a parameter's type annotation at call time.
fn check_annotation(
    vm: &Vm,
    def: &FunctionDef,
    param: StringId,
    annotation: Option<StringId>,
    arg: &Value,
) -> EvalResult<()> {
    let Some(type_name) = annotation else {
        return Ok(());
    };
    let program = vm.program();
    let Some(type_id) = program.lookup_type(def.module, type_name) else {
        return err!(
            NotAType;
            "unknown type '{}' in parameter annotation",
            program.interner.get(type_name)
        );
    };
    if program.is_compatible(type_id, arg, &vm.heap) {
        Ok(())
    } else {
        err!(
            TypeMismatch;
            "argument '{}' of '{}' must be {}, got {}",
            program.interner.get(param),
            program.interner.get(def.name),
            program.type_name(type_id),
            arg.type_name(program, &vm.heap)
        )
    }
}

/// Invokes a method on a receiver, passing the arguments through.
pub fn invoke(
    vm: &mut Vm,
    receiver: Value,
    def: &Arc<FunctionDef>,
    args: Vec<Value>,
) -> EvalResult<Value> {
    let closure = Closure {
        def: Arc::clone(def),
        receiver: Some(receiver),
        captured: Scope::new(),
    };
    call_closure(vm, &closure, args)
}

/// `new T(args)`: builds a fresh instance of a class type.
///
/// Field initializers run first, receiver bound, in declaration order; then
/// the `Constructor` method (if declared) is applied to the arguments. A
/// class without a constructor accepts only an empty argument list.
pub fn instantiate(vm: &mut Vm, type_id: TypeId, args: Vec<Value>) -> EvalResult<Value> {
    let program = vm.program();
    let TypeDef::Class(class) = program.type_def(type_id) else {
        return err!(
            UnsupportedOperation;
            "cannot instantiate {}",
            program.type_name(type_id)
        );
    };

    let mut fields = Scope::new();
    for field in &class.fields {
        fields.declare(field.name, Value::Null);
    }
    let id = vm.heap.allocate(HeapData::Instance(crate::heap::Instance {
        class: type_id,
        fields,
    }));
    let receiver = Value::Ref(id);

    run_field_initializers(vm, class.module, &class.fields, receiver.clone())?;

    match class.methods.get(&known::CONSTRUCTOR) {
        Some(ctor) => {
            let ctor = Arc::clone(ctor);
            invoke(vm, receiver.clone(), &ctor, args)?;
        }
        None if !args.is_empty() => {
            return err!(
                ArityMismatch;
                "class {} has no constructor; new takes no arguments",
                program.type_name(type_id)
            );
        }
        None => {}
    }
    Ok(receiver)
}

/// Instantiates a module: one module instance with its fields initialized.
pub fn instantiate_module(vm: &mut Vm, module_id: ModuleId) -> EvalResult<Value> {
    let module = vm.program().module(module_id);
    let mut fields = Scope::new();
    for field in &module.fields {
        fields.declare(field.name, Value::Null);
    }
    let id = vm
        .heap
        .allocate(HeapData::Module(crate::heap::ModuleInstance {
            module: module_id,
            fields,
        }));
    let receiver = Value::Ref(id);
    run_field_initializers(vm, module_id, &module.fields, receiver.clone())?;
    Ok(receiver)
}

fn run_field_initializers(
    vm: &mut Vm,
    module: ModuleId,
    fields: &[crate::program::FieldDef],
    receiver: Value,
) -> EvalResult<()> {
    if fields.iter().all(|f| f.init.is_none()) {
        return Ok(());
    }
    vm.with_frame(Frame::initializer(module, receiver.clone()), |vm| {
        for field in fields {
            if let Some(init) = &field.init {
                let value = eval(vm, init)?;
                // Set-or-add keeps redeclared names from failing the init.
                set_or_add_field(vm, &receiver, field.name, value);
            }
        }
        Ok(())
    })
}

fn set_or_add_field(vm: &mut Vm, receiver: &Value, name: StringId, value: Value) {
    if let Value::Ref(id) = receiver {
        match vm.heap.get_mut(*id) {
            HeapData::Instance(instance) => instance.fields.set_or_add(name, value),
            HeapData::Module(module) => module.fields.set_or_add(name, value),
            _ => {}
        }
    }
}

/// Executes statements in the current scope, stopping when a return
/// propagates.
pub fn exec_stmts(vm: &mut Vm, stmts: &[Stmt]) -> EvalResult<()> {
    for stmt in stmts {
        exec_stmt(vm, stmt)?;
        if vm.should_exit_scope() {
            break;
        }
    }
    Ok(())
}

/// Executes statements inside a fresh scope.
pub fn exec_block(vm: &mut Vm, stmts: &[Stmt]) -> EvalResult<()> {
    vm.with_scope(|vm| exec_stmts(vm, stmts))
}

fn exec_stmt(vm: &mut Vm, stmt: &Stmt) -> EvalResult<()> {
    match stmt {
        Stmt::Expr(expr) => {
            eval(vm, expr)?;
            Ok(())
        }
        Stmt::VarDecl { name, init } => {
            let value = match init {
                Some(expr) => eval(vm, expr)?,
                None => Value::Null,
            };
            vm.add_var(*name, value)
        }
        Stmt::Return(expr) => {
            let value = match expr {
                Some(expr) => eval(vm, expr)?,
                None => Value::Void,
            };
            vm.return_value(value);
            Ok(())
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => {
            if condition(vm, cond)? {
                exec_block(vm, then_body)
            } else {
                exec_block(vm, else_body)
            }
        }
        Stmt::While { cond, body } => {
            while condition(vm, cond)? {
                exec_block(vm, body)?;
                if vm.should_exit_scope() {
                    break;
                }
            }
            Ok(())
        }
        Stmt::Foreach { var, source, body } => {
            let source_value = eval(vm, source)?;
            let Some(items) = source_value.sequence(&vm.heap).map(<[Value]>::to_vec) else {
                return err!(
                    UnsupportedOperation;
                    "foreach requires a List or Array, got {}",
                    source_value.type_name(vm.program(), &vm.heap)
                );
            };
            for item in items {
                vm.with_scope(|vm| {
                    vm.add_var(*var, item)?;
                    exec_stmts(vm, body)
                })?;
                if vm.should_exit_scope() {
                    break;
                }
            }
            Ok(())
        }
        Stmt::Block(stmts) => exec_block(vm, stmts),
    }
}

fn condition(vm: &mut Vm, cond: &Expr) -> EvalResult<bool> {
    match eval(vm, cond)? {
        Value::Bool(b) => Ok(b),
        other => err!(
            TypeMismatch;
            "condition must be Bool, got {}",
            other.type_name(vm.program(), &vm.heap)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_expression;
    use crate::program::Program;

    fn eval_in(program: &mut Program, source: &str) -> (EvalResult<Value>, usize, usize) {
        let expr = parse_expression(source, &mut program.interner, ModuleId::GLOBAL).unwrap();
        let mut vm = Vm::new(program, 2);
        let frames = vm.frame_depth();
        let scopes = vm.scope_depth();
        let result = eval(&mut vm, &expr);
        assert_eq!(vm.frame_depth(), frames, "frame depth drifted: {source}");
        assert_eq!(vm.scope_depth(), scopes, "scope depth drifted: {source}");
        (result, frames, scopes)
    }

    #[test]
    fn stack_depths_are_restored_on_success_and_failure() {
        let mut program = Program::new();
        for source in [
            "1 + 2 * 3",
            "accumulate (r = 0 forall x in [1,2]) r + x",
            "reduce (a, b in [1,2,3]) a + b",
            "(function (x) { return x; })(1)",
            // Failing evaluations must unwind cleanly too.
            "1 / 0",
            "accumulate (r = 0 forall x in [1,2]) r / 0",
            "(function () { return missing; })()",
        ] {
            let _ = eval_in(&mut program, source);
        }
    }

    #[test]
    fn post_increment_yields_the_old_value() {
        let mut program = Program::new();
        let x = program.interner.intern("x");
        let expr = parse_expression("x++", &mut program.interner, ModuleId::GLOBAL).unwrap();
        let mut vm = Vm::new(&program, 1);
        vm.add_var(x, Value::Int(5)).unwrap();
        let old = eval(&mut vm, &expr).unwrap();
        assert_eq!(old, Value::Int(5));
        assert_eq!(vm.get_var(x), Some(Value::Int(6)));
    }

    #[test]
    fn calls_evaluate_arguments_before_the_callee() {
        // The callee expression is a missing name; the argument failure
        // must win because arguments evaluate first.
        let mut program = Program::new();
        let (result, _, _) = eval_in(&mut program, "missing_callee(1 / 0)");
        let e = result.unwrap_err();
        assert_eq!(e.kind, crate::error::ErrorKind::DivisionByZero);
    }

    #[test]
    fn closure_snapshots_survive_rebinding() {
        let mut program = Program::new();
        let x = program.interner.intern("x");
        let expr =
            parse_expression("function () { return x; }", &mut program.interner, ModuleId::GLOBAL)
                .unwrap();
        let mut vm = Vm::new(&program, 1);
        vm.add_var(x, Value::Int(1)).unwrap();
        let closure = eval(&mut vm, &expr).unwrap();
        vm.set_var(x, Value::Int(2)).unwrap();
        let result = call_value(&mut vm, closure, Vec::new()).unwrap();
        assert_eq!(result, Value::Int(1));
    }
}
