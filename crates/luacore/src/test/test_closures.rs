/// Closure and upvalue sharing tests
use std::rc::Rc;

use crate::lua_value::{LuaUpvalue, LuaValue, Prototype, UpvalueDesc};
use crate::lua_vm::{ExecutionEngine, LifecycleError, LuaError, LuaResult, LuaVM, SafeOption};
use crate::object_pool::ClosureId;

// Opcodes of the toy engine below
const OP_INC_UPVAL0: u32 = 0;
const OP_RET_UPVAL0: u32 = 1;
const OP_RET_ARGS: u32 = 2;
const OP_CALL_SELF: u32 = 3;

/// Interprets a handful of opcodes, enough to drive closures through
/// `LuaVM::call_function`.
struct ToyEngine;

impl ExecutionEngine for ToyEngine {
    fn execute(
        &self,
        vm: &mut LuaVM,
        closure: ClosureId,
        proto: &Prototype,
        args: &[LuaValue],
    ) -> LuaResult<Vec<LuaValue>> {
        for &op in &proto.code {
            match op {
                OP_INC_UPVAL0 => {
                    let cell = vm.store().upvalue(closure, 0)?;
                    let n = cell.get().as_integer().unwrap_or(0);
                    cell.set(LuaValue::integer(n + 1));
                }
                OP_RET_UPVAL0 => return Ok(vec![vm.store().get_upvalue(closure, 0)?]),
                OP_RET_ARGS => return Ok(args.to_vec()),
                OP_CALL_SELF => {
                    return vm.call_function(&LuaValue::function(closure), args);
                }
                _ => return Err(vm.error(format!("unknown opcode {op}"))),
            }
        }
        Ok(Vec::new())
    }
}

fn vm_with_engine(safe_option: SafeOption) -> LuaVM {
    let mut vm = LuaVM::new(safe_option);
    vm.set_execution_engine(Rc::new(ToyEngine));
    vm
}

#[test]
fn test_closures_share_bound_cell() {
    let mut vm = LuaVM::default();
    let store = vm.store_mut();
    let id = store.create_proto(Prototype::new(vec![]).with_upvalue_count(1));
    let a = store.new_closure(id, 1).unwrap();
    let b = store.new_closure(id, 1).unwrap();

    let cell = LuaUpvalue::new(LuaValue::integer(10));
    store.bind_upvalue(a, 0, cell.clone()).unwrap();
    store.bind_upvalue(b, 0, cell).unwrap();

    store.set_upvalue(a, 0, LuaValue::integer(20)).unwrap();
    assert_eq!(store.get_upvalue(b, 0), Ok(LuaValue::integer(20)));
}

#[test]
fn test_cell_survives_free_of_one_holder() {
    let mut vm = LuaVM::default();
    let store = vm.store_mut();
    let id = store.create_proto(Prototype::new(vec![]).with_upvalue_count(1));
    let a = store.new_closure(id, 1).unwrap();
    let b = store.new_closure(id, 1).unwrap();
    let cell = LuaUpvalue::new(LuaValue::string("kept"));
    store.bind_upvalue(a, 0, cell.clone()).unwrap();
    store.bind_upvalue(b, 0, cell).unwrap();

    store.free_closure(a).unwrap();
    assert_eq!(store.get_upvalue(b, 0), Ok(LuaValue::string("kept")));
    assert!(store.get_upvalue(a, 0).is_err());
}

#[test]
fn test_instantiate_shares_frame_and_enclosing_cells() {
    let mut vm = LuaVM::default();
    let store = vm.store_mut();

    let outer_id = store.create_proto(Prototype::new(vec![]).with_upvalue_count(1));
    let outer = store.new_closure(outer_id, 1).unwrap();
    let outer_cell = LuaUpvalue::new(LuaValue::integer(1));
    store.bind_upvalue(outer, 0, outer_cell.clone()).unwrap();

    // inner captures local 1 of the running frame and upvalue 0 of outer
    let inner_id = store.create_proto(
        Prototype::new(vec![])
            .with_upvalues(vec![UpvalueDesc::local(1), UpvalueDesc::enclosing(0)]),
    );
    let frame = vec![
        LuaUpvalue::new(LuaValue::Nil),
        LuaUpvalue::new(LuaValue::integer(2)),
    ];
    let inner = store.instantiate(inner_id, Some(outer), &frame).unwrap();

    assert_eq!(store.get_upvalue(inner, 0), Ok(LuaValue::integer(2)));
    assert_eq!(store.get_upvalue(inner, 1), Ok(LuaValue::integer(1)));

    // Writes go through the shared cells in both directions
    store.set_upvalue(inner, 0, LuaValue::integer(22)).unwrap();
    assert_eq!(frame[1].get(), LuaValue::integer(22));
    outer_cell.set(LuaValue::integer(11));
    assert_eq!(store.get_upvalue(inner, 1), Ok(LuaValue::integer(11)));
    assert!(Rc::ptr_eq(&store.upvalue(inner, 1).unwrap(), &outer_cell));

    // Two instances from the same frame alias each other
    let twin = store.instantiate(inner_id, Some(outer), &frame).unwrap();
    store.set_upvalue(twin, 0, LuaValue::integer(33)).unwrap();
    assert_eq!(store.get_upvalue(inner, 0), Ok(LuaValue::integer(33)));
    assert_eq!(store.live_closures(inner_id), Ok(2));
}

#[test]
fn test_instantiate_requires_enclosing_closure() {
    let mut vm = LuaVM::default();
    let store = vm.store_mut();
    let id = store.create_proto(Prototype::new(vec![]).with_upvalues(vec![UpvalueDesc::enclosing(0)]));
    assert_eq!(
        store.instantiate(id, None, &[]),
        Err(LifecycleError::MissingEnclosingClosure)
    );
}

#[test]
fn test_instantiate_from_unbound_enclosing_slot() {
    let mut vm = LuaVM::default();
    let store = vm.store_mut();
    let outer_id = store.create_proto(Prototype::new(vec![]).with_upvalue_count(1));
    let outer = store.new_closure(outer_id, 1).unwrap();
    let id = store.create_proto(Prototype::new(vec![]).with_upvalues(vec![UpvalueDesc::enclosing(0)]));
    assert_eq!(
        store.instantiate(id, Some(outer), &[]),
        Err(LifecycleError::UnboundUpvalue(0))
    );
    assert_eq!(store.live_closures(id), Ok(0));
}

#[test]
fn test_counter_closures_through_engine() {
    let mut vm = vm_with_engine(SafeOption::default());
    let counter_proto = Prototype::new(vec![OP_INC_UPVAL0, OP_RET_UPVAL0])
        .with_upvalues(vec![UpvalueDesc::local(0)]);
    let id = vm.store_mut().create_proto(counter_proto);

    // Each "call" of the factory runs with a fresh frame cell
    let make_counter = |vm: &mut LuaVM| {
        let frame = vec![LuaUpvalue::new(LuaValue::integer(0))];
        let counter = vm.store_mut().instantiate(id, None, &frame).unwrap();
        LuaValue::function(counter)
    };
    let first = make_counter(&mut vm);
    let second = make_counter(&mut vm);

    assert_eq!(vm.call_function(&first, &[]).unwrap(), vec![LuaValue::integer(1)]);
    assert_eq!(vm.call_function(&first, &[]).unwrap(), vec![LuaValue::integer(2)]);
    assert_eq!(vm.call_function(&second, &[]).unwrap(), vec![LuaValue::integer(1)]);
    assert_eq!(vm.call_function(&first, &[]).unwrap(), vec![LuaValue::integer(3)]);
}

#[test]
fn test_engine_receives_arguments() {
    let mut vm = vm_with_engine(SafeOption::default());
    let id = vm.store_mut().create_proto(Prototype::new(vec![OP_RET_ARGS]));
    let f = LuaValue::function(vm.store_mut().new_closure(id, 0).unwrap());
    let args = [LuaValue::integer(1), LuaValue::string("two")];
    assert_eq!(vm.call_function(&f, &args).unwrap(), args.to_vec());
}

#[test]
fn test_lua_closure_without_engine() {
    let mut vm = LuaVM::default();
    let id = vm.store_mut().create_proto(Prototype::new(vec![OP_RET_ARGS]));
    let f = LuaValue::function(vm.store_mut().new_closure(id, 0).unwrap());
    let err = vm.call_function(&f, &[]).unwrap_err();
    assert!(matches!(err, LuaError::Runtime(msg) if msg.contains("no execution engine")));
}

#[test]
fn test_call_non_function() {
    let mut vm = LuaVM::default();
    let err = vm.call_function(&LuaValue::integer(3), &[]).unwrap_err();
    assert_eq!(err, LuaError::Runtime("attempt to call a number value".to_string()));
}

#[test]
fn test_call_freed_closure_is_stale() {
    let mut vm = LuaVM::default();
    let id = vm.store_mut().create_proto(Prototype::new(vec![]));
    let closure = vm.store_mut().new_closure(id, 0).unwrap();
    vm.store_mut().free_closure(closure).unwrap();
    let err = vm.call_function(&LuaValue::function(closure), &[]).unwrap_err();
    assert_eq!(err, LuaError::Lifecycle(LifecycleError::StaleClosure(closure)));
}

#[test]
fn test_runaway_recursion_hits_call_depth() {
    let mut vm = vm_with_engine(SafeOption {
        max_call_depth: 16,
        ..SafeOption::default()
    });
    let id = vm.store_mut().create_proto(Prototype::new(vec![OP_CALL_SELF]));
    let f = LuaValue::function(vm.store_mut().new_closure(id, 0).unwrap());
    assert_eq!(vm.call_function(&f, &[]), Err(LuaError::StackOverflow));

    // The depth unwinds, so later calls work again
    let ok = vm.store_mut().create_proto(Prototype::new(vec![OP_RET_ARGS]));
    let g = LuaValue::function(vm.store_mut().new_closure(ok, 0).unwrap());
    assert!(vm.call_function(&g, &[]).is_ok());
}

#[test]
fn test_native_closure_reads_its_upvalues() {
    fn bump(vm: &mut LuaVM) -> LuaResult<usize> {
        let n = vm.current_upvalue(0)?.as_integer().unwrap_or(0) + 1;
        vm.set_current_upvalue(0, LuaValue::integer(n))?;
        vm.push_value(LuaValue::integer(n))?;
        Ok(1)
    }

    let mut vm = LuaVM::default();
    let cell = LuaUpvalue::new(LuaValue::integer(40));
    let id = vm.store_mut().new_native_closure(bump, 1).unwrap();
    vm.store_mut().bind_upvalue(id, 0, cell.clone()).unwrap();
    let f = LuaValue::function(id);

    assert_eq!(vm.call_function(&f, &[]).unwrap(), vec![LuaValue::integer(41)]);
    assert_eq!(vm.call_function(&f, &[]).unwrap(), vec![LuaValue::integer(42)]);
    assert_eq!(cell.get(), LuaValue::integer(42));
}

#[test]
fn test_native_closure_with_unbound_upvalue() {
    fn read(vm: &mut LuaVM) -> LuaResult<usize> {
        let v = vm.current_upvalue(0)?;
        vm.push_value(v)?;
        Ok(1)
    }

    let mut vm = LuaVM::default();
    let f = LuaValue::function(vm.store_mut().new_native_closure(read, 1).unwrap());
    assert_eq!(
        vm.call_function(&f, &[]),
        Err(LuaError::Lifecycle(LifecycleError::UnboundUpvalue(0)))
    );
}
