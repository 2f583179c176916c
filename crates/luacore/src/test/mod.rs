// Test module organization
pub mod test_closures;
pub mod test_lifecycle;

use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaResult, LuaVM, SafeOption};
use crate::stdlib::Stdlib;

/// VM with every standard library opened.
pub(crate) fn vm_with_libs() -> LuaVM {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    vm
}

/// Call `lib.name(args...)` through the global namespace.
pub(crate) fn call_lib(
    vm: &mut LuaVM,
    lib: &str,
    name: &str,
    args: &[LuaValue],
) -> LuaResult<Vec<LuaValue>> {
    let func = match vm.get_global(lib).as_table() {
        Some(table) => table.borrow().get_str(name),
        None => LuaValue::Nil,
    };
    vm.call_function(&func, args)
}
