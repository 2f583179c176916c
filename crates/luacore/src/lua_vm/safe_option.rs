use crate::lua_vm::lua_limits::{LUAI_MAXSTACK, MAX_CALL_DEPTH, MAX_STRING_SIZE, MAXCCALLS_PATTERN};

#[derive(Debug, Clone)]
pub struct SafeOption {
    pub max_stack_size: usize,
    pub max_call_depth: usize,
    /// Recursion bound handed to the pattern engine on every match.
    pub max_pattern_depth: usize,
    /// Largest string `string.rep` and `string.gsub` may build.
    pub max_string_size: usize,
}

impl Default for SafeOption {
    fn default() -> Self {
        Self {
            max_stack_size: LUAI_MAXSTACK,
            max_call_depth: MAX_CALL_DEPTH,
            max_pattern_depth: MAXCCALLS_PATTERN,
            max_string_size: MAX_STRING_SIZE,
        }
    }
}
