// Standard libraries: io, string and math

pub mod io;
pub mod math;
pub mod string;

use crate::lib_registry::{self, LibraryRegistry};
use crate::lua_vm::{LuaResult, LuaVM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stdlib {
    Io,
    String,
    Math,

    All,
}

pub(crate) fn open_lib(vm: &mut LuaVM, lib: Stdlib) -> LuaResult<()> {
    let module = match lib {
        Stdlib::Io => io::create_io_lib(),
        Stdlib::String => string::create_string_lib(),
        Stdlib::Math => math::create_math_lib(),
        Stdlib::All => return lib_registry::create_standard_registry().load_all(vm),
    };
    let mut registry = LibraryRegistry::new();
    registry.register(module);
    registry.load_all(vm)
}
