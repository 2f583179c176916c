use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use super::{LuaString, LuaValue};
use crate::lua_vm::{LuaError, LuaResult};

pub type TableRef = Rc<RefCell<LuaTable>>;

/// Key/value table with string and integer keys.
/// Floats with an exact integer value are normalized to integer keys.
/// Storing `nil` removes the entry.
#[derive(Default)]
pub struct LuaTable {
    strings: AHashMap<LuaString, LuaValue>,
    integers: AHashMap<i64, LuaValue>,
}

enum Key {
    Str(LuaString),
    Int(i64),
}

fn normalize_key(key: &LuaValue) -> LuaResult<Key> {
    match key {
        LuaValue::String(s) => Ok(Key::Str(s.clone())),
        LuaValue::Integer(i) => Ok(Key::Int(*i)),
        LuaValue::Float(f) if f.is_nan() => Err(LuaError::Runtime("table index is NaN".to_string())),
        LuaValue::Float(_) => key.as_integer().map(Key::Int).ok_or_else(|| {
            LuaError::Runtime("table index must be a string or an integer".to_string())
        }),
        LuaValue::Nil => Err(LuaError::Runtime("table index is nil".to_string())),
        other => Err(LuaError::Runtime(format!(
            "table index must be a string or an integer (got {})",
            other.type_name()
        ))),
    }
}

impl LuaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_get(&self, key: &LuaValue) -> LuaValue {
        match normalize_key(key) {
            Ok(Key::Str(s)) => self.strings.get(&s).cloned().unwrap_or_default(),
            Ok(Key::Int(i)) => self.raw_geti(i),
            Err(_) => LuaValue::Nil,
        }
    }

    pub fn raw_set(&mut self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        match normalize_key(&key)? {
            Key::Str(s) => {
                if value.is_nil() {
                    self.strings.remove(&s);
                } else {
                    self.strings.insert(s, value);
                }
            }
            Key::Int(i) => self.raw_seti(i, value),
        }
        Ok(())
    }

    pub fn raw_geti(&self, index: i64) -> LuaValue {
        self.integers.get(&index).cloned().unwrap_or_default()
    }

    pub fn raw_seti(&mut self, index: i64, value: LuaValue) {
        if value.is_nil() {
            self.integers.remove(&index);
        } else {
            self.integers.insert(index, value);
        }
    }

    pub fn get_str(&self, name: &str) -> LuaValue {
        self.strings
            .get(&LuaString::from(name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_str(&mut self, name: &str, value: LuaValue) {
        let key = LuaString::from(name);
        if value.is_nil() {
            self.strings.remove(&key);
        } else {
            self.strings.insert(key, value);
        }
    }

    /// Length of the sequence part: the largest `n` such that keys `1..=n`
    /// are all present.
    pub fn len(&self) -> usize {
        let mut n = 0usize;
        while self.integers.contains_key(&(n as i64 + 1)) {
            n += 1;
        }
        n
    }

    /// Total number of entries.
    pub fn entry_count(&self) -> usize {
        self.strings.len() + self.integers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.integers.is_empty()
    }

    /// String keys in unspecified order.
    pub fn string_keys(&self) -> impl Iterator<Item = &LuaString> {
        self.strings.keys()
    }
}
