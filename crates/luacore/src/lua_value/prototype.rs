// Compiled function template
// A Prototype is immutable once handed to the FunctionStore; the store wraps
// it in an Rc so that every closure instantiated from it can reach the code.

use smol_str::SmolStr;

use super::LuaValue;

/// Debug record for a local variable: `name` lives in `register` while the
/// current line is in `[start_line, end_line)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocVar {
    pub name: SmolStr,
    pub register: u32,
    pub start_line: u32,
    pub end_line: u32,
}

impl LocVar {
    pub fn new(name: impl Into<SmolStr>, register: u32, start_line: u32, end_line: u32) -> Self {
        LocVar {
            name: name.into(),
            register,
            start_line,
            end_line,
        }
    }

    #[inline]
    pub fn is_active_at(&self, line: u32) -> bool {
        self.start_line <= line && line < self.end_line
    }
}

/// Where a closure's upvalue comes from when it is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    /// true: cell of the enclosing frame's local at `index`
    /// false: upvalue `index` of the enclosing closure
    pub in_stack: bool,
    pub index: u8,
}

impl UpvalueDesc {
    pub fn local(index: u8) -> Self {
        UpvalueDesc {
            in_stack: true,
            index,
        }
    }

    pub fn enclosing(index: u8) -> Self {
        UpvalueDesc {
            in_stack: false,
            index,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Prototype {
    pub code: Vec<u32>,
    pub constants: Vec<LuaValue>,
    pub local_vars: Vec<LocVar>,
    pub upvalue_count: usize,
    pub upvalue_descs: Vec<UpvalueDesc>,
    pub param_count: usize,
    pub is_vararg: bool,
    pub max_stack_size: usize,
    pub source_name: Option<SmolStr>,
    pub line_defined: u32,
    pub last_line_defined: u32,
    pub line_info: Vec<u32>,
}

impl Prototype {
    pub fn new(code: Vec<u32>) -> Self {
        Prototype {
            code,
            ..Default::default()
        }
    }

    pub fn with_constants(mut self, constants: Vec<LuaValue>) -> Self {
        self.constants = constants;
        self
    }

    pub fn with_local_var(mut self, var: LocVar) -> Self {
        self.local_vars.push(var);
        self
    }

    /// Set the upvalue descriptors; the upvalue count follows their number.
    pub fn with_upvalues(mut self, descs: Vec<UpvalueDesc>) -> Self {
        self.upvalue_count = descs.len();
        self.upvalue_descs = descs;
        self
    }

    /// Declare an upvalue count without descriptors, for closures whose
    /// cells are bound one by one.
    pub fn with_upvalue_count(mut self, count: usize) -> Self {
        self.upvalue_count = count;
        self
    }

    pub fn with_params(mut self, param_count: usize, is_vararg: bool) -> Self {
        self.param_count = param_count;
        self.is_vararg = is_vararg;
        self
    }

    pub fn with_source(mut self, name: impl Into<SmolStr>, line_defined: u32, last_line_defined: u32) -> Self {
        self.source_name = Some(name.into());
        self.line_defined = line_defined;
        self.last_line_defined = last_line_defined;
        self
    }

    pub fn with_line_info(mut self, line_info: Vec<u32>) -> Self {
        self.line_info = line_info;
        self
    }

    /// Name of the local held in register `local_index` while `line` runs.
    /// When several records match, the earliest declared one wins.
    pub fn local_name(&self, local_index: u32, line: u32) -> Option<&str> {
        self.local_vars
            .iter()
            .find(|var| var.register == local_index && var.is_active_at(line))
            .map(|var| var.name.as_str())
    }

    /// Source line of the instruction at `pc`, if line info was recorded.
    pub fn line_at(&self, pc: usize) -> Option<u32> {
        self.line_info.get(pc).copied()
    }
}
