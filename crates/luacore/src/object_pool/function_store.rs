// Prototype store and closure factory
//
// Prototypes and closures live in two generation-checked pools. Each
// prototype entry counts the closures instantiated from it; a prototype can
// only be released once that count is back to zero.

use std::rc::Rc;

use log::{debug, error, trace};

use super::pool::Pool;
use super::pool_id::{ClosureId, ProtoId};
use crate::lua_value::{CFunction, FunctionBody, LuaClosure, LuaValue, Prototype, UpvalueRef};
use crate::lua_vm::LifecycleError;
use crate::lua_vm::lua_limits::MAXUPVAL;

struct ProtoEntry {
    proto: Rc<Prototype>,
    live_closures: usize,
}

/// Log a lifecycle error as it is raised; it always points at a host bug.
fn report(err: LifecycleError) -> LifecycleError {
    error!("{err}");
    err
}

fn check_upvalue_limit(count: usize) -> Result<(), LifecycleError> {
    if count > MAXUPVAL {
        return Err(report(LifecycleError::TooManyUpvalues(count)));
    }
    Ok(())
}

#[derive(Default)]
pub struct FunctionStore {
    protos: Pool<ProtoEntry>,
    closures: Pool<LuaClosure>,
}

impl FunctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ============ Prototypes ============

    pub fn create_proto(&mut self, proto: Prototype) -> ProtoId {
        let constants = proto.constants.len();
        let (index, generation) = self.protos.insert(ProtoEntry {
            proto: Rc::new(proto),
            live_closures: 0,
        });
        let id = ProtoId { index, generation };
        debug!("created {id} ({constants} constants)");
        id
    }

    /// Release a prototype. Fails, leaving it registered, while any closure
    /// instantiated from it is still alive.
    pub fn release_proto(&mut self, id: ProtoId) -> Result<(), LifecycleError> {
        let entry = self
            .protos
            .get(id.index, id.generation)
            .ok_or_else(|| report(LifecycleError::StalePrototype(id)))?;
        if entry.live_closures > 0 {
            return Err(report(LifecycleError::LivenessViolation {
                id,
                live: entry.live_closures,
            }));
        }
        self.protos.remove(id.index, id.generation);
        debug!("released {id}");
        Ok(())
    }

    pub fn proto(&self, id: ProtoId) -> Result<&Rc<Prototype>, LifecycleError> {
        self.protos
            .get(id.index, id.generation)
            .map(|entry| &entry.proto)
            .ok_or(LifecycleError::StalePrototype(id))
    }

    pub fn contains_proto(&self, id: ProtoId) -> bool {
        self.protos.contains(id.index, id.generation)
    }

    /// Number of closures currently alive for `id`.
    pub fn live_closures(&self, id: ProtoId) -> Result<usize, LifecycleError> {
        self.protos
            .get(id.index, id.generation)
            .map(|entry| entry.live_closures)
            .ok_or(LifecycleError::StalePrototype(id))
    }

    /// Name of the local in register `local_index` at `line`, `None` when no
    /// debug record covers it.
    pub fn lookup_local_name(
        &self,
        id: ProtoId,
        local_index: u32,
        line: u32,
    ) -> Result<Option<&str>, LifecycleError> {
        Ok(self.proto(id)?.local_name(local_index, line))
    }

    // ============ Closures ============

    /// Create a closure over `proto_id` with every upvalue slot unbound.
    pub fn new_closure(
        &mut self,
        proto_id: ProtoId,
        upvalue_count: usize,
    ) -> Result<ClosureId, LifecycleError> {
        check_upvalue_limit(upvalue_count)?;
        let proto = self.proto(proto_id).map_err(report)?;
        if upvalue_count != proto.upvalue_count {
            return Err(report(LifecycleError::UpvalueCountMismatch {
                requested: upvalue_count,
                expected: proto.upvalue_count,
            }));
        }
        let body = FunctionBody::Lua {
            proto_id,
            proto: proto.clone(),
        };
        Ok(self.insert_lua_closure(proto_id, LuaClosure::new(body, upvalue_count)))
    }

    /// Create a native closure with `upvalue_count` unbound slots.
    pub fn new_native_closure(
        &mut self,
        func: CFunction,
        upvalue_count: usize,
    ) -> Result<ClosureId, LifecycleError> {
        check_upvalue_limit(upvalue_count)?;
        let (index, generation) = self
            .closures
            .insert(LuaClosure::new(FunctionBody::Native(func), upvalue_count));
        let id = ClosureId { index, generation };
        trace!("created native {id} with {upvalue_count} upvalue(s)");
        Ok(id)
    }

    /// Instantiate `proto_id` the way a closure-creation instruction does:
    /// every slot is bound according to the prototype's upvalue descriptors,
    /// sharing `frame[index]` for locals of the running function and the
    /// enclosing closure's slot otherwise. Nothing is allocated on failure.
    pub fn instantiate(
        &mut self,
        proto_id: ProtoId,
        enclosing: Option<ClosureId>,
        frame: &[UpvalueRef],
    ) -> Result<ClosureId, LifecycleError> {
        let proto = self.proto(proto_id).map_err(report)?.clone();
        if proto.upvalue_descs.len() != proto.upvalue_count {
            return Err(report(LifecycleError::UpvalueCountMismatch {
                requested: proto.upvalue_descs.len(),
                expected: proto.upvalue_count,
            }));
        }
        check_upvalue_limit(proto.upvalue_count)?;

        let mut cells = Vec::with_capacity(proto.upvalue_count);
        for desc in &proto.upvalue_descs {
            let index = desc.index as usize;
            let cell = if desc.in_stack {
                frame.get(index).cloned().ok_or_else(|| {
                    report(LifecycleError::UpvalueOutOfRange {
                        index,
                        count: frame.len(),
                    })
                })?
            } else {
                let parent = enclosing.ok_or_else(|| report(LifecycleError::MissingEnclosingClosure))?;
                self.upvalue(parent, index)?
            };
            cells.push(cell);
        }

        let body = FunctionBody::Lua {
            proto_id,
            proto: proto.clone(),
        };
        Ok(self.insert_lua_closure(proto_id, LuaClosure::with_cells(body, cells)))
    }

    fn insert_lua_closure(&mut self, proto_id: ProtoId, closure: LuaClosure) -> ClosureId {
        let upvalues = closure.upvalue_count();
        if let Some(entry) = self.protos.get_mut(proto_id.index, proto_id.generation) {
            entry.live_closures += 1;
        }
        let (index, generation) = self.closures.insert(closure);
        let id = ClosureId { index, generation };
        trace!("created {id} from {proto_id} with {upvalues} upvalue(s)");
        id
    }

    /// Free a closure. Its cells survive in any other closure sharing them;
    /// the prototype is never freed here.
    pub fn free_closure(&mut self, id: ClosureId) -> Result<(), LifecycleError> {
        let closure = self
            .closures
            .remove(id.index, id.generation)
            .ok_or_else(|| report(LifecycleError::StaleClosure(id)))?;
        if let Some(proto_id) = closure.proto_id()
            && let Some(entry) = self.protos.get_mut(proto_id.index, proto_id.generation)
        {
            entry.live_closures -= 1;
        }
        trace!("freed {id}");
        Ok(())
    }

    pub fn closure(&self, id: ClosureId) -> Result<&LuaClosure, LifecycleError> {
        self.closures
            .get(id.index, id.generation)
            .ok_or(LifecycleError::StaleClosure(id))
    }

    pub fn contains_closure(&self, id: ClosureId) -> bool {
        self.closures.contains(id.index, id.generation)
    }

    pub fn upvalue_count(&self, id: ClosureId) -> Result<usize, LifecycleError> {
        Ok(self.closure(id)?.upvalue_count())
    }

    /// Bind `cell` into `slot`. Binding the same cell into several closures
    /// makes them share the variable.
    pub fn bind_upvalue(
        &mut self,
        id: ClosureId,
        slot: usize,
        cell: UpvalueRef,
    ) -> Result<(), LifecycleError> {
        let closure = self
            .closures
            .get_mut(id.index, id.generation)
            .ok_or_else(|| report(LifecycleError::StaleClosure(id)))?;
        closure.bind(slot, cell).map_err(report)
    }

    /// The cell bound into `slot`, for sharing with another closure.
    pub fn upvalue(&self, id: ClosureId, slot: usize) -> Result<UpvalueRef, LifecycleError> {
        self.closure(id)
            .and_then(|closure| closure.upvalue(slot).cloned())
            .map_err(report)
    }

    pub fn get_upvalue(&self, id: ClosureId, slot: usize) -> Result<LuaValue, LifecycleError> {
        Ok(self.upvalue(id, slot)?.get())
    }

    pub fn set_upvalue(
        &self,
        id: ClosureId,
        slot: usize,
        value: LuaValue,
    ) -> Result<(), LifecycleError> {
        self.upvalue(id, slot)?.set(value);
        Ok(())
    }

    pub fn proto_count(&self) -> usize {
        self.protos.len()
    }

    pub fn closure_count(&self) -> usize {
        self.closures.len()
    }
}
