use crate::lua_value::{LuaValue, Prototype};
use crate::lua_vm::{LuaResult, LuaVM};
use crate::object_pool::ClosureId;

/// Bytecode executor for Lua closures.
///
/// The core never interprets `Prototype::code`; `LuaVM::call_function`
/// hands every Lua closure to the attached engine. The engine reaches the
/// closure's upvalues through `vm.store()` and creates nested closures with
/// `FunctionStore::instantiate`.
pub trait ExecutionEngine {
    fn execute(
        &self,
        vm: &mut LuaVM,
        closure: ClosureId,
        proto: &Prototype,
        args: &[LuaValue],
    ) -> LuaResult<Vec<LuaValue>>;
}
