use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{LuaString, LuaTable, TableRef};
use crate::object_pool::ClosureId;

/// A runtime value.
/// Tables compare by identity, functions by closure id, and integers and
/// floats compare numerically with each other.
#[derive(Clone, Default)]
pub enum LuaValue {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(LuaString),
    Table(TableRef),
    Function(ClosureId),
}

impl LuaValue {
    #[inline(always)]
    pub fn nil() -> Self {
        LuaValue::Nil
    }

    #[inline(always)]
    pub fn boolean(b: bool) -> Self {
        LuaValue::Boolean(b)
    }

    #[inline(always)]
    pub fn integer(i: i64) -> Self {
        LuaValue::Integer(i)
    }

    #[inline(always)]
    pub fn float(f: f64) -> Self {
        LuaValue::Float(f)
    }

    pub fn string(s: impl AsRef<[u8]>) -> Self {
        LuaValue::String(LuaString::new(s.as_ref()))
    }

    pub fn table(table: LuaTable) -> Self {
        LuaValue::Table(Rc::new(RefCell::new(table)))
    }

    #[inline(always)]
    pub fn function(id: ClosureId) -> Self {
        LuaValue::Function(id)
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    /// Everything except `nil` and `false` is true.
    #[inline(always)]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    #[inline(always)]
    pub fn is_number(&self) -> bool {
        matches!(self, LuaValue::Integer(_) | LuaValue::Float(_))
    }

    #[inline(always)]
    pub fn is_string(&self) -> bool {
        matches!(self, LuaValue::String(_))
    }

    #[inline(always)]
    pub fn is_table(&self) -> bool {
        matches!(self, LuaValue::Table(_))
    }

    #[inline(always)]
    pub fn is_function(&self) -> bool {
        matches!(self, LuaValue::Function(_))
    }

    /// Integer value, accepting floats with an exact integer representation.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LuaValue::Integer(i) => Some(*i),
            LuaValue::Float(f) => float_to_integer(*f),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            LuaValue::Integer(i) => Some(*i as f64),
            LuaValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_lua_string(&self) -> Option<&LuaString> {
        match self {
            LuaValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.as_lua_string().map(LuaString::as_bytes)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_lua_string().and_then(LuaString::as_str)
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            LuaValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<ClosureId> {
        match self {
            LuaValue::Function(id) => Some(*id),
            _ => None,
        }
    }

    /// Number value with string coercion.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            LuaValue::String(s) => parse_number(s.as_bytes()).and_then(|v| v.as_number()),
            _ => self.as_number(),
        }
    }

    /// Integer value with string coercion.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            LuaValue::String(s) => parse_number(s.as_bytes()).and_then(|v| v.as_integer()),
            _ => self.as_integer(),
        }
    }

    /// Byte text of strings and numbers; `None` for every other type.
    pub fn to_string_bytes(&self) -> Option<Vec<u8>> {
        match self {
            LuaValue::String(s) => Some(s.as_bytes().to_vec()),
            LuaValue::Integer(i) => {
                let mut buffer = itoa::Buffer::new();
                Some(buffer.format(*i).as_bytes().to_vec())
            }
            LuaValue::Float(f) => Some(format_float(*f).into_bytes()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            LuaValue::Nil => "nil",
            LuaValue::Boolean(_) => "boolean",
            LuaValue::Integer(_) | LuaValue::Float(_) => "number",
            LuaValue::String(_) => "string",
            LuaValue::Table(_) => "table",
            LuaValue::Function(_) => "function",
        }
    }
}

fn float_to_integer(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it overflows i64
    if f.fract() == 0.0 && f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0 {
        Some(f as i64)
    } else {
        None
    }
}

/// Format a float the way scripts expect to see it: integral values keep a
/// trailing `.0`, non-finite values print as `inf`, `-inf` or `nan`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Parse numeric text (decimal integer, hexadecimal integer or decimal float)
/// surrounded by optional whitespace.
pub fn parse_number(bytes: &[u8]) -> Option<LuaValue> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    let (negative, digits) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        // Hexadecimal integers wrap around like C Lua
        if hex.is_empty() || !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let mut value: i64 = 0;
        for c in hex.bytes() {
            let digit = (c as char).to_digit(16)? as i64;
            value = value.wrapping_mul(16).wrapping_add(digit);
        }
        return Some(LuaValue::integer(if negative {
            value.wrapping_neg()
        } else {
            value
        }));
    }
    // Reject what Rust parses but scripts do not ("inf", "nan", "1_0", ...)
    if !digits
        .bytes()
        .all(|c| c.is_ascii_digit() || matches!(c, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(LuaValue::integer(i));
    }
    text.parse::<f64>().ok().map(LuaValue::float)
}

impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Integer(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Integer(i), LuaValue::Float(f)) | (LuaValue::Float(f), LuaValue::Integer(i)) => {
                float_to_integer(*f) == Some(*i)
            }
            (LuaValue::String(a), LuaValue::String(b)) => a == b,
            (LuaValue::Table(a), LuaValue::Table(b)) => Rc::ptr_eq(a, b),
            (LuaValue::Function(a), LuaValue::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Nil => write!(f, "nil"),
            LuaValue::Boolean(b) => write!(f, "{}", b),
            LuaValue::Integer(i) => write!(f, "{}", i),
            LuaValue::Float(n) => write!(f, "{}", format_float(*n)),
            LuaValue::String(s) => write!(f, "{:?}", s),
            LuaValue::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            LuaValue::Function(id) => write!(f, "function: {}", id),
        }
    }
}

impl From<bool> for LuaValue {
    fn from(b: bool) -> Self {
        LuaValue::Boolean(b)
    }
}

impl From<i64> for LuaValue {
    fn from(i: i64) -> Self {
        LuaValue::Integer(i)
    }
}

impl From<f64> for LuaValue {
    fn from(f: f64) -> Self {
        LuaValue::Float(f)
    }
}

impl From<&str> for LuaValue {
    fn from(s: &str) -> Self {
        LuaValue::string(s)
    }
}

impl From<LuaString> for LuaValue {
    fn from(s: LuaString) -> Self {
        LuaValue::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(b"42"), Some(LuaValue::integer(42)));
        assert_eq!(parse_number(b"  -7 "), Some(LuaValue::integer(-7)));
        assert_eq!(parse_number(b"0x1F"), Some(LuaValue::integer(31)));
        assert_eq!(parse_number(b"2.5"), Some(LuaValue::float(2.5)));
        assert_eq!(parse_number(b"1e3"), Some(LuaValue::float(1000.0)));
        assert!(parse_number(b"inf").is_none());
        assert!(parse_number(b"12a").is_none());
        assert!(parse_number(b"").is_none());
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_coercions() {
        assert_eq!(LuaValue::string("10").to_integer(), Some(10));
        assert_eq!(LuaValue::float(4.0).as_integer(), Some(4));
        assert_eq!(LuaValue::float(4.5).as_integer(), None);
        assert_eq!(LuaValue::integer(5).to_string_bytes(), Some(b"5".to_vec()));
        assert_eq!(LuaValue::nil().to_string_bytes(), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!LuaValue::nil().is_truthy());
        assert!(!LuaValue::boolean(false).is_truthy());
        assert!(LuaValue::integer(0).is_truthy());
        assert!(LuaValue::string("").is_truthy());
    }
}
