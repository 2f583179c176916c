// Library registration
// A library is a named list of entries; loading one wraps every native
// function in a closure, collects the entries into a table and binds that
// table as a global.

use log::debug;
use smol_str::SmolStr;

use crate::lua_value::{CFunction, FunctionBody, LuaTable, LuaValue, TableRef};
use crate::lua_vm::{LuaResult, LuaVM};
use crate::object_pool::ClosureId;
use crate::stdlib;

/// Builds a library value when the module loads (constants like `math.pi`)
pub type ValueInitializer = fn(&mut LuaVM) -> LuaValue;

pub enum LibraryEntry {
    Function(CFunction),
    Value(ValueInitializer),
}

pub struct LibraryModule {
    pub name: SmolStr,
    pub entries: Vec<(SmolStr, LibraryEntry)>,
}

impl LibraryModule {
    pub fn new(name: &'static str) -> Self {
        Self {
            name: SmolStr::new_static(name),
            entries: Vec::new(),
        }
    }

    pub fn with_function(mut self, name: &'static str, func: CFunction) -> Self {
        self.entries
            .push((SmolStr::new_static(name), LibraryEntry::Function(func)));
        self
    }

    pub fn with_value(mut self, name: &'static str, value_init: ValueInitializer) -> Self {
        self.entries
            .push((SmolStr::new_static(name), LibraryEntry::Value(value_init)));
        self
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            LibraryEntry::Function(_) => Some(name.as_str()),
            LibraryEntry::Value(_) => None,
        })
    }
}

/// Build a `LibraryModule` from `"name" => function` pairs
#[macro_export]
macro_rules! lib_module {
    ($name:expr, {
        $($item_name:expr => $item:expr),* $(,)?
    }) => {{
        let mut module = $crate::lib_registry::LibraryModule::new($name);
        $(
            module = module.with_function($item_name, $item);
        )*
        module
    }};
}

/// Ordered set of library modules; later registrations win on load.
pub struct LibraryRegistry {
    modules: Vec<LibraryModule>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn register(&mut self, module: LibraryModule) {
        self.modules.push(module);
    }

    pub fn load_all(&self, vm: &mut LuaVM) -> LuaResult<()> {
        for module in &self.modules {
            self.load_module(vm, module)?;
        }
        Ok(())
    }

    /// Load one module: its table replaces whatever global had its name.
    /// When that global was an earlier load of the same library, closures
    /// wrapping the same function are reused, so ids a script already
    /// holds stay valid and reopening does not grow the closure pool.
    pub fn load_module(&self, vm: &mut LuaVM, module: &LibraryModule) -> LuaResult<()> {
        let previous = vm.get_global(&module.name).as_table().cloned();
        let mut lib_table = LuaTable::new();
        let mut reused = 0usize;
        for (name, entry) in &module.entries {
            let value = match entry {
                LibraryEntry::Function(func) => {
                    match reusable_closure(vm, previous.as_ref(), name, *func) {
                        Some(id) => {
                            reused += 1;
                            LuaValue::function(id)
                        }
                        None => LuaValue::function(vm.store_mut().new_native_closure(*func, 0)?),
                    }
                }
                LibraryEntry::Value(value_init) => value_init(vm),
            };
            lib_table.set_str(name, value);
        }
        vm.set_global(&module.name, LuaValue::table(lib_table));
        debug!(
            "opened library '{}' ({} entries, {} closures reused)",
            module.name,
            module.entries.len(),
            reused
        );
        Ok(())
    }

    pub fn get_module(&self, name: &str) -> Option<&LibraryModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &LibraryModule> {
        self.modules.iter()
    }
}

/// The closure an earlier load bound under `name`, if it is still live and
/// runs `func` with no upvalues.
fn reusable_closure(
    vm: &LuaVM,
    previous: Option<&TableRef>,
    name: &str,
    func: CFunction,
) -> Option<ClosureId> {
    let id = previous?.borrow().get_str(name).as_function()?;
    let closure = vm.store().closure(id).ok()?;
    match closure.body() {
        FunctionBody::Native(existing)
            if std::ptr::fn_addr_eq(*existing, func) && closure.upvalue_count() == 0 =>
        {
            Some(id)
        }
        _ => None,
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry holding io, string and math.
pub fn create_standard_registry() -> LibraryRegistry {
    let mut registry = LibraryRegistry::new();
    registry.register(stdlib::io::create_io_lib());
    registry.register(stdlib::string::create_string_lib());
    registry.register(stdlib::math::create_math_lib());
    registry
}
