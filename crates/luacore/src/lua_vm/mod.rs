// Lua runtime state
// Owns the function store, the global namespace and the native call stack.
// Lua closures are delegated to an attached ExecutionEngine.
mod call_info;
mod execution;
pub mod lua_error;
pub mod lua_limits;
mod safe_option;

use std::cell::RefCell;
use std::io::{self, BufRead, BufReader, Write};
use std::rc::Rc;

use log::{debug, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::lua_value::{FunctionBody, LuaString, LuaTable, LuaValue, TableRef};
use crate::object_pool::{ClosureId, FunctionStore};
use crate::stdlib::{self, Stdlib};
pub use call_info::CallInfo;
pub use execution::ExecutionEngine;
pub use lua_error::{LifecycleError, LuaError, LuaResult, MalformedKind, PatternError};
use lua_limits::LUA_MINSTACK;
pub use safe_option::SafeOption;

pub struct LuaVM {
    store: FunctionStore,
    globals: TableRef,

    // Native call stack: arguments and results of running Rust functions
    stack: Vec<LuaValue>,
    call_stack: Vec<CallInfo>,
    // Nesting of call_function, native and Lua alike
    call_depth: usize,

    engine: Option<Rc<dyn ExecutionEngine>>,
    output: Box<dyn Write>,
    input: Box<dyn BufRead>,
    pub(crate) rng: StdRng,

    safe_option: SafeOption,
}

impl LuaVM {
    pub fn new(safe_option: SafeOption) -> Self {
        LuaVM {
            store: FunctionStore::new(),
            globals: Rc::new(RefCell::new(LuaTable::new())),
            stack: Vec::with_capacity(LUA_MINSTACK),
            call_stack: Vec::new(),
            call_depth: 0,
            engine: None,
            output: Box::new(io::stdout()),
            input: Box::new(BufReader::new(io::stdin())),
            rng: StdRng::from_entropy(),
            safe_option,
        }
    }

    /// Register the standard libraries; reopening a library rebinds its
    /// global to a fresh table.
    /// Reopening rebinds each library global to a fresh table but keeps
    /// the native closures from the earlier open.
    pub fn open_stdlib(&mut self, lib: Stdlib) -> LuaResult<()> {
        stdlib::open_lib(self, lib)
    }

    #[inline]
    pub fn safe_option(&self) -> &SafeOption {
        &self.safe_option
    }

    #[inline]
    pub fn store(&self) -> &FunctionStore {
        &self.store
    }

    #[inline]
    pub fn store_mut(&mut self) -> &mut FunctionStore {
        &mut self.store
    }

    pub fn globals(&self) -> &TableRef {
        &self.globals
    }

    pub fn get_global(&self, name: &str) -> LuaValue {
        self.globals.borrow().get_str(name)
    }

    pub fn set_global(&mut self, name: &str, value: LuaValue) {
        self.globals.borrow_mut().set_str(name, value);
    }

    pub fn create_table(&self) -> LuaValue {
        LuaValue::table(LuaTable::new())
    }

    pub fn set_execution_engine(&mut self, engine: Rc<dyn ExecutionEngine>) {
        self.engine = Some(engine);
    }

    /// Redirect `io.write`.
    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    /// Redirect `io.read`.
    pub fn set_input(&mut self, input: Box<dyn BufRead>) {
        self.input = input;
    }

    pub(crate) fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    pub(crate) fn input(&mut self) -> &mut dyn BufRead {
        self.input.as_mut()
    }

    pub fn seed_random(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // ============ Calls ============

    /// Call a function value and collect all of its results.
    pub fn call_function(&mut self, func: &LuaValue, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
        let Some(id) = func.as_function() else {
            return Err(self.error(format!("attempt to call a {} value", func.type_name())));
        };
        if self.call_depth >= self.safe_option.max_call_depth {
            warn!("call depth limit {} reached", self.safe_option.max_call_depth);
            return Err(LuaError::StackOverflow);
        }
        let body = self.store.closure(id)?.body().clone();

        self.call_depth += 1;
        let result = match body {
            FunctionBody::Native(f) => self.call_native(id, f, args),
            FunctionBody::Lua { proto, .. } => match self.engine.clone() {
                Some(engine) => engine.execute(self, id, &proto, args),
                None => Err(self.error("cannot call a Lua function: no execution engine attached")),
            },
        };
        self.call_depth -= 1;
        result
    }

    fn call_native(
        &mut self,
        id: ClosureId,
        f: crate::lua_value::CFunction,
        args: &[LuaValue],
    ) -> LuaResult<Vec<LuaValue>> {
        let base = self.stack.len();
        if base + args.len() + LUA_MINSTACK > self.safe_option.max_stack_size {
            return Err(LuaError::StackOverflow);
        }
        self.stack.extend_from_slice(args);
        self.call_stack.push(CallInfo::new(id, base, args.len()));

        let result = f(self);

        self.call_stack.pop();
        let results = result.map(|n| {
            // Results are the top `n` values, never reaching below the frame
            let first = self.stack.len().saturating_sub(n).max(base);
            self.stack[first..].to_vec()
        });
        self.stack.truncate(base);
        results
    }

    // ============ Native function helpers ============

    #[inline]
    fn current_frame(&self) -> Option<&CallInfo> {
        self.call_stack.last()
    }

    /// Number of arguments passed to the running native function.
    pub fn arg_count(&self) -> usize {
        self.current_frame().map_or(0, |frame| frame.nargs)
    }

    /// Argument `index` (1-based) of the running native function.
    /// `None` when that argument was not passed.
    pub fn get_arg(&self, index: usize) -> Option<LuaValue> {
        let slot = self.current_frame()?.arg_slot(index)?;
        self.stack.get(slot).cloned()
    }

    pub fn get_args(&self) -> Vec<LuaValue> {
        match self.current_frame() {
            Some(frame) => self.stack[frame.base..frame.base + frame.nargs].to_vec(),
            None => Vec::new(),
        }
    }

    pub fn push_value(&mut self, value: LuaValue) -> LuaResult<()> {
        if self.stack.len() >= self.safe_option.max_stack_size {
            warn!("stack limit {} reached", self.safe_option.max_stack_size);
            return Err(LuaError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    /// The closure whose native body is running.
    pub fn current_function(&self) -> LuaResult<ClosureId> {
        self.current_frame()
            .map(|frame| frame.func)
            .ok_or_else(|| self.error("no native function is running"))
    }

    /// Read upvalue `slot` of the running native closure.
    pub fn current_upvalue(&self, slot: usize) -> LuaResult<LuaValue> {
        Ok(self.store.get_upvalue(self.current_function()?, slot)?)
    }

    pub fn set_current_upvalue(&mut self, slot: usize, value: LuaValue) -> LuaResult<()> {
        let id = self.current_function()?;
        Ok(self.store.set_upvalue(id, slot, value)?)
    }

    pub fn error(&self, message: impl Into<String>) -> LuaError {
        let message = message.into();
        debug!("runtime error: {message}");
        LuaError::Runtime(message)
    }

    pub fn arg_error(&self, index: usize, fname: &str, message: &str) -> LuaError {
        self.error(format!("bad argument #{index} to '{fname}' ({message})"))
    }

    fn type_error(&self, index: usize, fname: &str, expected: &str, got: Option<&LuaValue>) -> LuaError {
        let got = got.map_or("no value", LuaValue::type_name);
        self.arg_error(index, fname, &format!("{expected} expected, got {got}"))
    }

    /// Any value, `nil` included, as long as the argument was passed.
    pub fn check_any(&self, index: usize, fname: &str) -> LuaResult<LuaValue> {
        self.get_arg(index)
            .ok_or_else(|| self.arg_error(index, fname, "value expected"))
    }

    /// String argument; numbers are converted to their text.
    pub fn check_string(&self, index: usize, fname: &str) -> LuaResult<LuaString> {
        let arg = self.get_arg(index);
        match &arg {
            Some(LuaValue::String(s)) => Ok(s.clone()),
            Some(v) if v.is_number() => v
                .to_string_bytes()
                .map(LuaString::from)
                .ok_or_else(|| self.type_error(index, fname, "string", arg.as_ref())),
            _ => Err(self.type_error(index, fname, "string", arg.as_ref())),
        }
    }

    pub fn check_integer(&self, index: usize, fname: &str) -> LuaResult<i64> {
        let arg = self.get_arg(index);
        match &arg {
            Some(v) => match v.to_integer() {
                Some(i) => Ok(i),
                None if v.to_number().is_some() => {
                    Err(self.arg_error(index, fname, "number has no integer representation"))
                }
                None => Err(self.type_error(index, fname, "number", arg.as_ref())),
            },
            None => Err(self.type_error(index, fname, "number", None)),
        }
    }

    /// Integer argument, `default` when absent or nil.
    pub fn opt_integer(&self, index: usize, fname: &str, default: i64) -> LuaResult<i64> {
        match self.get_arg(index) {
            None | Some(LuaValue::Nil) => Ok(default),
            Some(_) => self.check_integer(index, fname),
        }
    }

    pub fn check_number(&self, index: usize, fname: &str) -> LuaResult<f64> {
        let arg = self.get_arg(index);
        arg.as_ref()
            .and_then(LuaValue::to_number)
            .ok_or_else(|| self.type_error(index, fname, "number", arg.as_ref()))
    }
}

impl Default for LuaVM {
    fn default() -> Self {
        Self::new(SafeOption::default())
    }
}
