// Runtime value representation
// Byte strings with cached hash, string/integer keyed tables, shared upvalue
// cells, compiled prototypes and the closures instantiated from them.
mod lua_closure;
mod lua_table;
mod lua_value;
mod prototype;

use crate::LuaVM;
use crate::lua_vm::LuaResult;
use std::cell::RefCell;
use std::fmt;
use std::hash::Hasher;
use std::rc::Rc;

pub use lua_closure::{FunctionBody, LuaClosure};
pub use lua_table::{LuaTable, TableRef};
pub use lua_value::{LuaValue, format_float, parse_number};
pub use prototype::{LocVar, Prototype, UpvalueDesc};

/// Native function type - Rust function callable from scripts.
/// Arguments are read with `vm.get_arg`, results pushed with `vm.push_value`;
/// the return value is the number of results pushed.
pub type CFunction = fn(&mut LuaVM) -> LuaResult<usize>;

/// Immutable byte string with cached hash
#[derive(Clone)]
pub struct LuaString {
    hash: u64, // Keep hash first for alignment
    data: Rc<[u8]>,
}

impl LuaString {
    pub fn new(bytes: &[u8]) -> Self {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for &byte in bytes {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        LuaString {
            hash,
            data: Rc::from(bytes),
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The string as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn cached_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for LuaString {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: compare hashes first
        if self.hash != other.hash {
            return false;
        }
        self.data == other.data
    }
}

impl Eq for LuaString {}

impl std::hash::Hash for LuaString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.data))
    }
}

impl fmt::Display for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.data))
    }
}

impl From<&str> for LuaString {
    fn from(s: &str) -> Self {
        LuaString::new(s.as_bytes())
    }
}

impl From<&[u8]> for LuaString {
    fn from(bytes: &[u8]) -> Self {
        LuaString::new(bytes)
    }
}

impl From<Vec<u8>> for LuaString {
    fn from(bytes: Vec<u8>) -> Self {
        LuaString::new(&bytes)
    }
}

impl From<String> for LuaString {
    fn from(s: String) -> Self {
        LuaString::new(s.as_bytes())
    }
}

/// Captured variable cell.
/// Closures created in the same scope hold the same `Rc`, so a write through
/// one closure is seen by every other holder. The cell lives as long as its
/// longest holder.
#[derive(Default)]
pub struct LuaUpvalue {
    value: RefCell<LuaValue>,
}

pub type UpvalueRef = Rc<LuaUpvalue>;

impl LuaUpvalue {
    pub fn new(value: LuaValue) -> UpvalueRef {
        Rc::new(LuaUpvalue {
            value: RefCell::new(value),
        })
    }

    #[inline]
    pub fn get(&self) -> LuaValue {
        self.value.borrow().clone()
    }

    #[inline]
    pub fn set(&self, value: LuaValue) {
        *self.value.borrow_mut() = value;
    }
}

impl fmt::Debug for LuaUpvalue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Upvalue({:?})", self.value.borrow())
    }
}
