/// Prototype store lifecycle tests
use crate::lua_value::{LocVar, LuaValue, Prototype};
use crate::lua_vm::LifecycleError;
use crate::lua_vm::lua_limits::MAXUPVAL;
use crate::object_pool::FunctionStore;

fn proto_with_upvalues(count: usize) -> Prototype {
    Prototype::new(vec![0, 1, 2]).with_upvalue_count(count)
}

#[test]
fn test_create_and_release_without_closures() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(Prototype::new(vec![]));
    assert!(store.contains_proto(id));
    assert_eq!(store.live_closures(id), Ok(0));

    store.release_proto(id).unwrap();
    assert!(!store.contains_proto(id));
    assert_eq!(store.proto_count(), 0);
}

#[test]
fn test_release_with_live_closure_is_rejected() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(proto_with_upvalues(1));
    let closure = store.new_closure(id, 1).unwrap();

    assert_eq!(
        store.release_proto(id),
        Err(LifecycleError::LivenessViolation { id, live: 1 })
    );
    // Still registered and usable
    assert!(store.contains_proto(id));
    assert_eq!(store.closure(closure).unwrap().proto_id(), Some(id));

    store.free_closure(closure).unwrap();
    assert_eq!(store.release_proto(id), Ok(()));
}

#[test]
fn test_release_twice_is_stale() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(Prototype::new(vec![]));
    store.release_proto(id).unwrap();
    assert_eq!(store.release_proto(id), Err(LifecycleError::StalePrototype(id)));
}

#[test]
fn test_stale_id_does_not_alias_new_prototype() {
    let mut store = FunctionStore::new();
    let old = store.create_proto(Prototype::new(vec![1]));
    store.release_proto(old).unwrap();
    let new = store.create_proto(Prototype::new(vec![2]));

    assert_eq!(old.index(), new.index());
    assert_ne!(old, new);
    assert!(store.proto(old).is_err());
    assert_eq!(store.proto(new).unwrap().code, vec![2]);
}

#[test]
fn test_closure_counter_across_many_closures() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(proto_with_upvalues(0));
    let closures: Vec<_> = (0..5).map(|_| store.new_closure(id, 0).unwrap()).collect();
    assert_eq!(store.live_closures(id), Ok(5));

    for closure in &closures[..4] {
        store.free_closure(*closure).unwrap();
    }
    assert!(store.release_proto(id).is_err());
    store.free_closure(closures[4]).unwrap();
    assert!(store.release_proto(id).is_ok());
}

#[test]
fn test_free_closure_twice_is_stale() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(proto_with_upvalues(0));
    let closure = store.new_closure(id, 0).unwrap();
    store.free_closure(closure).unwrap();
    assert_eq!(
        store.free_closure(closure),
        Err(LifecycleError::StaleClosure(closure))
    );
    // The failed free must not touch the counter
    assert_eq!(store.live_closures(id), Ok(0));
}

#[test]
fn test_new_closure_checks_upvalue_count() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(proto_with_upvalues(2));
    assert_eq!(
        store.new_closure(id, 3),
        Err(LifecycleError::UpvalueCountMismatch {
            requested: 3,
            expected: 2
        })
    );
    assert_eq!(store.closure_count(), 0);
    assert_eq!(store.live_closures(id), Ok(0));
}

#[test]
fn test_upvalue_limit() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(proto_with_upvalues(MAXUPVAL + 1));
    assert_eq!(
        store.new_closure(id, MAXUPVAL + 1),
        Err(LifecycleError::TooManyUpvalues(MAXUPVAL + 1))
    );

    let id = store.create_proto(proto_with_upvalues(MAXUPVAL));
    assert!(store.new_closure(id, MAXUPVAL).is_ok());
}

#[test]
fn test_closure_on_released_proto() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(proto_with_upvalues(0));
    store.release_proto(id).unwrap();
    assert_eq!(store.new_closure(id, 0), Err(LifecycleError::StalePrototype(id)));
}

#[test]
fn test_upvalue_bounds_and_binding() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(proto_with_upvalues(2));
    let closure = store.new_closure(id, 2).unwrap();

    assert_eq!(store.upvalue_count(closure), Ok(2));
    assert_eq!(
        store.get_upvalue(closure, 0),
        Err(LifecycleError::UnboundUpvalue(0))
    );
    assert_eq!(
        store.get_upvalue(closure, 2),
        Err(LifecycleError::UpvalueOutOfRange { index: 2, count: 2 })
    );
    assert!(
        store
            .bind_upvalue(closure, 5, crate::lua_value::LuaUpvalue::new(LuaValue::Nil))
            .is_err()
    );

    store
        .bind_upvalue(closure, 1, crate::lua_value::LuaUpvalue::new(LuaValue::integer(7)))
        .unwrap();
    assert_eq!(store.get_upvalue(closure, 1), Ok(LuaValue::integer(7)));
    assert!(store.closure(closure).unwrap().is_bound(1));
    assert!(!store.closure(closure).unwrap().is_bound(0));
}

#[test]
fn test_lookup_local_name() {
    let mut store = FunctionStore::new();
    let proto = Prototype::new(vec![])
        .with_local_var(LocVar::new("x", 0, 1, 5))
        .with_local_var(LocVar::new("y", 1, 2, 4))
        .with_local_var(LocVar::new("z", 1, 4, 8));
    let id = store.create_proto(proto);

    assert_eq!(store.lookup_local_name(id, 0, 1), Ok(Some("x")));
    assert_eq!(store.lookup_local_name(id, 1, 3), Ok(Some("y")));
    // end_line is exclusive: at line 4 register 1 already holds z
    assert_eq!(store.lookup_local_name(id, 1, 4), Ok(Some("z")));
    assert_eq!(store.lookup_local_name(id, 0, 5), Ok(None));
    assert_eq!(store.lookup_local_name(id, 2, 3), Ok(None));

    store.release_proto(id).unwrap();
    assert!(store.lookup_local_name(id, 0, 1).is_err());
}

#[test]
fn test_prototype_shared_by_closures() {
    let mut store = FunctionStore::new();
    let id = store.create_proto(
        Prototype::new(vec![10, 20])
            .with_constants(vec![LuaValue::integer(1), LuaValue::string("k")])
            .with_source("chunk", 1, 3),
    );
    let a = store.new_closure(id, 0).unwrap();
    let b = store.new_closure(id, 0).unwrap();

    let pa = store.closure(a).unwrap().proto().unwrap();
    let pb = store.closure(b).unwrap().proto().unwrap();
    assert!(std::rc::Rc::ptr_eq(pa, pb));
    assert_eq!(pa.constants.len(), 2);
    assert_eq!(pa.source_name.as_deref(), Some("chunk"));
}
