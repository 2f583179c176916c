// String library
// Implements: byte, char, find, gmatch, gsub, len, lower, match, rep,
// reverse, sub, upper
pub mod pattern;

use crate::lib_registry::LibraryModule;
use crate::lua_value::{LuaString, LuaUpvalue, LuaValue};
use crate::lua_vm::{LuaError, LuaResult, LuaVM};
use pattern::{CaptureValue, GMatchCursor, MatchInfo, MatchLimits, Matcher};

pub fn create_string_lib() -> LibraryModule {
    crate::lib_module!("string", {
        "byte" => string_byte,
        "char" => string_char,
        "find" => string_find,
        "gmatch" => string_gmatch,
        "gsub" => string_gsub,
        "len" => string_len,
        "lower" => string_lower,
        "match" => string_match,
        "rep" => string_rep,
        "reverse" => string_reverse,
        "sub" => string_sub,
        "upper" => string_upper,
    })
}

/// Translate a relative initial position: negatives count from the end,
/// zero and anything before the start clamp to 1.
fn posrelat_start(pos: i64, len: usize) -> usize {
    let len = len as i64;
    if pos > 0 {
        pos as usize
    } else if pos == 0 || pos < -len {
        1
    } else {
        (len + pos + 1) as usize
    }
}

/// Translate a relative end position, clamped to `len`.
fn get_end_pos(pos: i64, len: usize) -> usize {
    let ilen = len as i64;
    if pos > ilen {
        len
    } else if pos >= 0 {
        pos as usize
    } else if pos < -ilen {
        0
    } else {
        (ilen + pos + 1) as usize
    }
}

fn pattern_limits(vm: &LuaVM) -> MatchLimits {
    MatchLimits {
        max_depth: vm.safe_option().max_pattern_depth,
    }
}

fn capture_to_value(src: &[u8], capture: CaptureValue) -> LuaValue {
    match capture {
        CaptureValue::Substring(start, end) => LuaValue::string(&src[start..end]),
        // Positions are 1-based on the script side
        CaptureValue::Position(offset) => LuaValue::integer(offset as i64 + 1),
    }
}

/// Push the captures of `m`, or the whole match when there are none.
fn push_captures(vm: &mut LuaVM, src: &[u8], m: &MatchInfo) -> LuaResult<usize> {
    for index in 0..m.value_count() {
        vm.push_value(capture_to_value(src, m.capture_or_whole(index)?))?;
    }
    Ok(m.value_count())
}

/// string.len(s)
fn string_len(vm: &mut LuaVM) -> LuaResult<usize> {
    let s = vm.check_string(1, "len")?;
    vm.push_value(LuaValue::integer(s.len() as i64))?;
    Ok(1)
}

/// string.sub(s, i [, j]) - bytes i..=j
fn string_sub(vm: &mut LuaVM) -> LuaResult<usize> {
    let s = vm.check_string(1, "sub")?;
    let len = s.len();
    let start = posrelat_start(vm.opt_integer(2, "sub", 1)?, len);
    let end = get_end_pos(vm.opt_integer(3, "sub", -1)?, len);
    let result = if start <= end {
        LuaValue::string(&s.as_bytes()[start - 1..end])
    } else {
        LuaValue::string("")
    };
    vm.push_value(result)?;
    Ok(1)
}

fn string_upper(vm: &mut LuaVM) -> LuaResult<usize> {
    let s = vm.check_string(1, "upper")?;
    vm.push_value(LuaValue::string(s.as_bytes().to_ascii_uppercase()))?;
    Ok(1)
}

fn string_lower(vm: &mut LuaVM) -> LuaResult<usize> {
    let s = vm.check_string(1, "lower")?;
    vm.push_value(LuaValue::string(s.as_bytes().to_ascii_lowercase()))?;
    Ok(1)
}

/// string.rep(s, n [, sep]) - Repeat string
fn string_rep(vm: &mut LuaVM) -> LuaResult<usize> {
    let s = vm.check_string(1, "rep")?;
    let n = vm.check_integer(2, "rep")?;
    let sep = match vm.get_arg(3) {
        None | Some(LuaValue::Nil) => LuaString::from(""),
        Some(_) => vm.check_string(3, "rep")?,
    };

    if n <= 0 || (s.is_empty() && sep.is_empty()) {
        vm.push_value(LuaValue::string(""))?;
        return Ok(1);
    }

    // Check for overflow before allocating
    let n = n as usize;
    let total_size = s
        .len()
        .checked_mul(n)
        .and_then(|size| sep.len().checked_mul(n - 1)?.checked_add(size));
    match total_size {
        Some(size) if size <= vm.safe_option().max_string_size => {
            let mut result = Vec::with_capacity(size);
            for i in 0..n {
                if i > 0 {
                    result.extend_from_slice(sep.as_bytes());
                }
                result.extend_from_slice(s.as_bytes());
            }
            vm.push_value(LuaValue::string(result))?;
            Ok(1)
        }
        _ => Err(vm.error("resulting string too large")),
    }
}

fn string_reverse(vm: &mut LuaVM) -> LuaResult<usize> {
    let s = vm.check_string(1, "reverse")?;
    let mut reversed = s.as_bytes().to_vec();
    reversed.reverse();
    vm.push_value(LuaValue::string(reversed))?;
    Ok(1)
}

/// string.byte(s [, i [, j]]) - Return byte values
fn string_byte(vm: &mut LuaVM) -> LuaResult<usize> {
    let s = vm.check_string(1, "byte")?;
    let i = vm.opt_integer(2, "byte", 1)?;
    let start = posrelat_start(i, s.len());
    let end = get_end_pos(vm.opt_integer(3, "byte", i)?, s.len());
    if start > end {
        return Ok(0);
    }
    for &byte in &s.as_bytes()[start - 1..end] {
        vm.push_value(LuaValue::integer(byte as i64))?;
    }
    Ok(end - start + 1)
}

/// string.char(...) - Convert bytes to string
fn string_char(vm: &mut LuaVM) -> LuaResult<usize> {
    let nargs = vm.arg_count();
    let mut bytes = Vec::with_capacity(nargs);
    for index in 1..=nargs {
        let code = vm.check_integer(index, "char")?;
        let byte = u8::try_from(code).map_err(|_| vm.arg_error(index, "char", "value out of range"))?;
        bytes.push(byte);
    }
    vm.push_value(LuaValue::string(bytes))?;
    Ok(1)
}

/// string.find(s, pattern [, init [, plain]]) - Find pattern
fn string_find(vm: &mut LuaVM) -> LuaResult<usize> {
    str_find_aux(vm, true)
}

/// string.match(s, pattern [, init]) - Match pattern
fn string_match(vm: &mut LuaVM) -> LuaResult<usize> {
    str_find_aux(vm, false)
}

fn str_find_aux(vm: &mut LuaVM, find: bool) -> LuaResult<usize> {
    let fname = if find { "find" } else { "match" };
    let s = vm.check_string(1, fname)?;
    let pat = vm.check_string(2, fname)?;
    let init = posrelat_start(vm.opt_integer(3, fname, 1)?, s.len());
    if init > s.len() + 1 {
        vm.push_value(LuaValue::Nil)?;
        return Ok(1);
    }
    let plain = find && vm.get_arg(4).is_some_and(|v| v.is_truthy());

    let matcher = if plain {
        Matcher::literal(pat.as_bytes())
    } else {
        Matcher::new(pat.as_bytes())?.with_limits(pattern_limits(vm))
    };
    let src = s.as_bytes();
    match matcher.find(src, init - 1)? {
        Some(m) if find => {
            vm.push_value(LuaValue::integer(m.start as i64 + 1))?;
            vm.push_value(LuaValue::integer(m.end as i64))?;
            // find reports only explicit captures after the span
            for capture in &m.captures {
                vm.push_value(capture_to_value(src, *capture))?;
            }
            Ok(2 + m.captures.len())
        }
        Some(m) => push_captures(vm, src, &m),
        None => {
            vm.push_value(LuaValue::Nil)?;
            Ok(1)
        }
    }
}

// gmatch iterator state, one cell each
const GMATCH_SUBJECT: usize = 0;
const GMATCH_PATTERN: usize = 1;
const GMATCH_POS: usize = 2;
const GMATCH_LAST: usize = 3;

/// string.gmatch(s, pattern [, init]) - Returns an iterator closure
fn string_gmatch(vm: &mut LuaVM) -> LuaResult<usize> {
    let s = vm.check_string(1, "gmatch")?;
    let pat = vm.check_string(2, "gmatch")?;
    // Surface pattern errors at creation rather than on the first step
    Matcher::new(pat.as_bytes())?;
    let init = posrelat_start(vm.opt_integer(3, "gmatch", 1)?, s.len()).min(s.len() + 1);

    let store = vm.store_mut();
    let iter = store.new_native_closure(gmatch_iterator, 4)?;
    store.bind_upvalue(iter, GMATCH_SUBJECT, LuaUpvalue::new(LuaValue::String(s)))?;
    store.bind_upvalue(iter, GMATCH_PATTERN, LuaUpvalue::new(LuaValue::String(pat)))?;
    store.bind_upvalue(iter, GMATCH_POS, LuaUpvalue::new(LuaValue::integer(init as i64 - 1)))?;
    store.bind_upvalue(iter, GMATCH_LAST, LuaUpvalue::new(LuaValue::Nil))?;

    vm.push_value(LuaValue::function(iter))?;
    Ok(1)
}

fn gmatch_iterator(vm: &mut LuaVM) -> LuaResult<usize> {
    let subject = vm.current_upvalue(GMATCH_SUBJECT)?;
    let pattern = vm.current_upvalue(GMATCH_PATTERN)?;
    let (Some(src), Some(pat)) = (subject.as_bytes(), pattern.as_bytes()) else {
        return Err(vm.error("gmatch iterator state is corrupted"));
    };
    let mut cursor = GMatchCursor {
        pos: vm.current_upvalue(GMATCH_POS)?.as_integer().unwrap_or(0).max(0) as usize,
        last_match: vm
            .current_upvalue(GMATCH_LAST)?
            .as_integer()
            .map(|end| end as usize),
    };

    let matcher = Matcher::new(pat)?.with_limits(pattern_limits(vm));
    let found = matcher.gmatch_step(src, &mut cursor)?;

    vm.set_current_upvalue(GMATCH_POS, LuaValue::integer(cursor.pos as i64))?;
    let last = cursor.last_match.map_or(LuaValue::Nil, |end| LuaValue::integer(end as i64));
    vm.set_current_upvalue(GMATCH_LAST, last)?;

    match found {
        Some(m) => push_captures(vm, src, &m),
        None => Ok(0),
    }
}

/// Convert a replacement function/table result; false and nil keep the match.
fn replacement_bytes(vm: &LuaVM, value: &LuaValue) -> LuaResult<Option<Vec<u8>>> {
    match value {
        LuaValue::Nil | LuaValue::Boolean(false) => Ok(None),
        LuaValue::String(_) | LuaValue::Integer(_) | LuaValue::Float(_) => Ok(value.to_string_bytes()),
        other => Err(vm.error(format!("invalid replacement value (a {})", other.type_name()))),
    }
}

/// string.gsub(s, pattern, repl [, n]) - Global substitution
fn string_gsub(vm: &mut LuaVM) -> LuaResult<usize> {
    let s = vm.check_string(1, "gsub")?;
    let pat = vm.check_string(2, "gsub")?;
    let repl = vm.get_arg(3).unwrap_or_default();
    let max = match vm.get_arg(4) {
        None | Some(LuaValue::Nil) => None,
        Some(_) => Some(vm.check_integer(4, "gsub")?.max(0) as usize),
    };

    let matcher = Matcher::new(pat.as_bytes())?.with_limits(pattern_limits(vm));
    let src = s.as_bytes();

    let (result, count) = match &repl {
        LuaValue::String(_) | LuaValue::Integer(_) | LuaValue::Float(_) => {
            let template = repl.to_string_bytes().unwrap_or_default();
            matcher.gsub::<LuaError, _>(src, max, |m| {
                Ok(Some(pattern::expand_replacement(&template, src, m)?))
            })?
        }
        LuaValue::Table(table) => matcher.gsub::<LuaError, _>(src, max, |m| {
            let key = capture_to_value(src, m.capture_or_whole(0)?);
            let value = table.borrow().raw_get(&key);
            replacement_bytes(vm, &value)
        })?,
        LuaValue::Function(_) => matcher.gsub::<LuaError, _>(src, max, |m| {
            let args = (0..m.value_count())
                .map(|index| Ok(capture_to_value(src, m.capture_or_whole(index)?)))
                .collect::<LuaResult<Vec<_>>>()?;
            let results = vm.call_function(&repl, &args)?;
            let first = results.into_iter().next().unwrap_or_default();
            replacement_bytes(vm, &first)
        })?,
        other => {
            return Err(vm.arg_error(
                3,
                "gsub",
                &format!("string/function/table expected, got {}", other.type_name()),
            ));
        }
    };

    if result.len() > vm.safe_option().max_string_size {
        return Err(vm.error("resulting string too large"));
    }
    vm.push_value(LuaValue::string(result))?;
    vm.push_value(LuaValue::integer(count as i64))?;
    Ok(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posrelat_start() {
        assert_eq!(posrelat_start(1, 5), 1);
        assert_eq!(posrelat_start(0, 5), 1);
        assert_eq!(posrelat_start(-1, 5), 5);
        assert_eq!(posrelat_start(-5, 5), 1);
        assert_eq!(posrelat_start(-10, 5), 1);
        assert_eq!(posrelat_start(9, 5), 9);
    }

    #[test]
    fn test_get_end_pos() {
        assert_eq!(get_end_pos(-1, 5), 5);
        assert_eq!(get_end_pos(10, 5), 5);
        assert_eq!(get_end_pos(0, 5), 0);
        assert_eq!(get_end_pos(-6, 5), 0);
        assert_eq!(get_end_pos(-2, 5), 4);
    }
}
