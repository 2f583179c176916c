// Lua Runtime Core
// Prototypes, closures with shared upvalue cells, the io/string/math
// libraries and the Lua pattern matching engine

#[cfg(test)]
mod test;

pub mod lib_registry;
pub mod lua_value;
pub mod lua_vm;
pub mod object_pool;
pub mod stdlib;

pub use lib_registry::LibraryRegistry;
pub use lua_value::{
    CFunction, FunctionBody, LocVar, LuaClosure, LuaString, LuaTable, LuaUpvalue, LuaValue,
    Prototype, UpvalueDesc, UpvalueRef,
};
pub use lua_vm::{ExecutionEngine, LifecycleError, LuaError, LuaResult, LuaVM, PatternError, SafeOption};
pub use object_pool::{ClosureId, FunctionStore, ProtoId};
pub use stdlib::Stdlib;
