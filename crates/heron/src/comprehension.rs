//! The comprehension operators: select, mapeach, accumulate, reduce.
//!
//! All four evaluate their source to a sequence, snapshot its elements, and
//! iterate. Select, mapeach, and accumulate preserve source order and run
//! on the calling machine. Reduce is the one parallel construct in the
//! interpreter: the index range is partitioned into chunks over a bounded
//! worker pool, each worker left-folds its chunk on a [`Vm::fork`], and the
//! per-chunk results are deposited under a mutex and folded in chunk order
//! at the join. The user contract is that the combine expression is
//! associative and pure; chunk boundaries are then unobservable and the
//! result equals the sequential left fold.

use std::thread;

use parking_lot::Mutex;

use crate::error::{err, EvalResult, HeronError};
use crate::eval::eval;
use crate::expr::Expr;
use crate::heap::{Heap, HeapData};
use crate::intern::StringId;
use crate::value::Value;
use crate::vm::Vm;

/// Evaluates the source expression and snapshots its elements.
fn sequence_items(vm: &mut Vm, source: &Expr, operator: &str) -> EvalResult<Vec<Value>> {
    let value = eval(vm, source)?;
    match value.sequence(&vm.heap) {
        Some(items) => Ok(items.to_vec()),
        None => err!(
            UnsupportedOperation;
            "{operator} requires a List or Array source, got {}",
            value.type_name(vm.program(), &vm.heap)
        ),
    }
}

/// `select (var from source) where predicate`: keeps the items for which
/// the predicate holds, in source order.
pub fn select(vm: &mut Vm, var: StringId, source: &Expr, predicate: &Expr) -> EvalResult<Value> {
    let items = sequence_items(vm, source, "select")?;
    let mut kept = Vec::new();
    vm.with_scope(|vm| {
        vm.add_var(var, Value::Null)?;
        for item in items {
            vm.set_var(var, item.clone())?;
            match eval(vm, predicate)? {
                Value::Bool(true) => kept.push(item),
                Value::Bool(false) => {}
                other => {
                    return err!(
                        TypeMismatch;
                        "select predicate must be Bool, got {}",
                        other.type_name(vm.program(), &vm.heap)
                    )
                }
            }
        }
        Ok(())
    })?;
    Ok(Value::Ref(vm.heap.allocate(HeapData::List(kept))))
}

/// `mapeach (var in source) expr`: transforms each item, in source order.
pub fn map_each(vm: &mut Vm, var: StringId, source: &Expr, yield_expr: &Expr) -> EvalResult<Value> {
    let items = sequence_items(vm, source, "mapeach")?;
    let mut mapped = Vec::with_capacity(items.len());
    vm.with_scope(|vm| {
        vm.add_var(var, Value::Null)?;
        for item in items {
            vm.set_var(var, item)?;
            mapped.push(eval(vm, yield_expr)?);
        }
        Ok(())
    })?;
    Ok(Value::Ref(vm.heap.allocate(HeapData::List(mapped))))
}

/// `accumulate (acc = init forall each in source) step`: a sequential
/// left fold. The scope holding `acc` and `each` is popped on every exit
/// path, including failure.
pub fn accumulate(
    vm: &mut Vm,
    acc: StringId,
    init: &Expr,
    each: StringId,
    source: &Expr,
    step: &Expr,
) -> EvalResult<Value> {
    let items = sequence_items(vm, source, "accumulate")?;
    vm.with_scope(|vm| {
        let seed = eval(vm, init)?;
        vm.add_var(acc, seed)?;
        vm.add_var(each, Value::Null)?;
        for item in items {
            vm.set_var(each, item)?;
            let next = eval(vm, step)?;
            vm.set_var(acc, next)?;
        }
        Ok(vm.get_var(acc).unwrap_or(Value::Null))
    })
}

/// `reduce (a, b in source) combine`: an associative reduction.
///
/// Over an empty source this yields an empty list; otherwise it yields a
/// one-element array holding the fold result. A single partition
/// degenerates to the plain sequential left fold.
pub fn reduce(
    vm: &mut Vm,
    left: StringId,
    right: StringId,
    source: &Expr,
    combine: &Expr,
) -> EvalResult<Value> {
    let items = sequence_items(vm, source, "reduce")?;
    if items.is_empty() {
        return Ok(Value::Ref(vm.heap.allocate(HeapData::List(Vec::new()))));
    }

    let workers = vm.max_threads().min(items.len());
    let result = if workers <= 1 {
        let mut acc = items[0].clone();
        for item in &items[1..] {
            acc = combine_step(vm, left, right, acc, item.clone(), combine)?;
        }
        acc
    } else {
        parallel_reduce(vm, left, right, &items, combine, workers)?
    };
    Ok(Value::Ref(vm.heap.allocate(HeapData::Array(vec![result]))))
}

fn parallel_reduce(
    vm: &mut Vm,
    left: StringId,
    right: StringId,
    items: &[Value],
    combine: &Expr,
    workers: usize,
) -> EvalResult<Value> {
    let chunk_size = items.len().div_ceil(workers);
    let chunk_count = items.len().div_ceil(chunk_size);
    // One deposit slot per chunk. Each worker's fold result stays paired
    // with the arena that owns it until the join imports it.
    let deposits: Mutex<Vec<Option<(Heap, Value)>>> = Mutex::new(vec![None; chunk_count]);
    let failure: Mutex<Option<HeronError>> = Mutex::new(None);

    thread::scope(|s| {
        for (index, chunk) in items.chunks(chunk_size).enumerate() {
            let mut worker = vm.fork();
            let (deposits, failure) = (&deposits, &failure);
            s.spawn(move || {
                let outcome = (|| -> EvalResult<()> {
                    let mut local = chunk[0].clone();
                    for item in &chunk[1..] {
                        // A sibling already failed: the reduce is aborting.
                        if failure.lock().is_some() {
                            return Ok(());
                        }
                        local =
                            combine_step(&mut worker, left, right, local, item.clone(), combine)?;
                    }
                    deposits.lock()[index] = Some((worker.into_heap(), local));
                    Ok(())
                })();
                if let Err(e) = outcome {
                    let mut first = failure.lock();
                    if first.is_none() {
                        *first = Some(e);
                    }
                }
            });
        }
    });

    if let Some(e) = failure.into_inner() {
        return Err(e);
    }

    // Fold the per-chunk results in chunk order. Combine is associative, so
    // this equals the sequential left fold over the whole source; it is not
    // required to be commutative, which is why the order matters here.
    let mut acc: Option<Value> = None;
    for slot in deposits.into_inner() {
        let Some((heap, value)) = slot else {
            return err!(InternalInvariantViolation; "reduce worker finished without a result");
        };
        let imported = vm.heap.transfer_from(&heap, &value);
        acc = Some(match acc {
            None => imported,
            Some(previous) => combine_step(vm, left, right, previous, imported, combine)?,
        });
    }
    match acc {
        Some(result) => Ok(result),
        None => err!(InternalInvariantViolation; "reduce finished without a merged result"),
    }
}

/// One application of the combine expression with `a` and `b` bound.
fn combine_step(
    vm: &mut Vm,
    left: StringId,
    right: StringId,
    a: Value,
    b: Value,
    combine: &Expr,
) -> EvalResult<Value> {
    vm.with_scope(|vm| {
        vm.add_var(left, a)?;
        vm.add_var(right, b)?;
        eval(vm, combine)
    })
}
