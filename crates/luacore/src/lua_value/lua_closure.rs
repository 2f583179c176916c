use std::rc::Rc;

use super::{CFunction, Prototype, UpvalueRef};
use crate::lua_vm::LifecycleError;
use crate::object_pool::ProtoId;

/// What a closure runs.
#[derive(Clone)]
pub enum FunctionBody {
    /// Compiled function; `proto` keeps the template reachable while the
    /// closure lives, `proto_id` is what the liveness counter is keyed on
    Lua {
        proto_id: ProtoId,
        proto: Rc<Prototype>,
    },
    /// Rust function
    Native(CFunction),
}

/// A function value: body plus its upvalue slots.
/// A slot is `None` until a cell is bound into it.
pub struct LuaClosure {
    body: FunctionBody,
    upvalues: Box<[Option<UpvalueRef>]>,
}

impl LuaClosure {
    pub(crate) fn new(body: FunctionBody, upvalue_count: usize) -> Self {
        LuaClosure {
            body,
            upvalues: vec![None; upvalue_count].into_boxed_slice(),
        }
    }

    pub(crate) fn with_cells(body: FunctionBody, cells: Vec<UpvalueRef>) -> Self {
        LuaClosure {
            body,
            upvalues: cells.into_iter().map(Some).collect(),
        }
    }

    #[inline]
    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }

    pub fn proto(&self) -> Option<&Rc<Prototype>> {
        match &self.body {
            FunctionBody::Lua { proto, .. } => Some(proto),
            FunctionBody::Native(_) => None,
        }
    }

    pub fn proto_id(&self) -> Option<ProtoId> {
        match &self.body {
            FunctionBody::Lua { proto_id, .. } => Some(*proto_id),
            FunctionBody::Native(_) => None,
        }
    }

    #[inline]
    pub fn upvalue_count(&self) -> usize {
        self.upvalues.len()
    }

    pub fn is_bound(&self, index: usize) -> bool {
        matches!(self.upvalues.get(index), Some(Some(_)))
    }

    pub fn upvalue(&self, index: usize) -> Result<&UpvalueRef, LifecycleError> {
        match self.upvalues.get(index) {
            Some(Some(cell)) => Ok(cell),
            Some(None) => Err(LifecycleError::UnboundUpvalue(index)),
            None => Err(LifecycleError::UpvalueOutOfRange {
                index,
                count: self.upvalues.len(),
            }),
        }
    }

    /// Bind `cell` into slot `index`, replacing any previous binding.
    pub(crate) fn bind(&mut self, index: usize, cell: UpvalueRef) -> Result<(), LifecycleError> {
        let count = self.upvalues.len();
        let slot = self
            .upvalues
            .get_mut(index)
            .ok_or(LifecycleError::UpvalueOutOfRange { index, count })?;
        *slot = Some(cell);
        Ok(())
    }
}
