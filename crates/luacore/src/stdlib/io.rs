// IO library
// Implements: write, read
// Both work on the VM's output and input handles (stdout/stdin by default,
// see LuaVM::set_output / LuaVM::set_input).

use std::io::{BufRead, Read, Write};

use crate::lib_registry::LibraryModule;
use crate::lua_value::{LuaValue, parse_number};
use crate::lua_vm::{LuaResult, LuaVM};

pub fn create_io_lib() -> LibraryModule {
    crate::lib_module!("io", {
        "write" => io_write,
        "read" => io_read,
    })
}

/// io.write(...) - strings and numbers, written without separators
fn io_write(vm: &mut LuaVM) -> LuaResult<usize> {
    let mut buffer = Vec::new();
    for (i, arg) in vm.get_args().iter().enumerate() {
        let bytes = arg.to_string_bytes().ok_or_else(|| {
            vm.arg_error(
                i + 1,
                "write",
                &format!("string expected, got {}", arg.type_name()),
            )
        })?;
        buffer.extend_from_slice(&bytes);
    }
    let output = vm.output();
    let written = output.write_all(&buffer).and_then(|_| output.flush());
    match written {
        Ok(()) => vm.push_value(LuaValue::boolean(true))?,
        Err(e) => {
            // Same shape as C Lua's failing file operations: nil, message
            vm.push_value(LuaValue::Nil)?;
            vm.push_value(LuaValue::string(e.to_string()))?;
            return Ok(2);
        }
    }
    Ok(1)
}

enum ReadFormat {
    Line { keep_newline: bool },
    Number,
    All,
    Count(usize),
}

fn parse_format(vm: &LuaVM) -> LuaResult<ReadFormat> {
    let arg = match vm.get_arg(1) {
        None | Some(LuaValue::Nil) => return Ok(ReadFormat::Line { keep_newline: false }),
        Some(arg) => arg,
    };
    if let LuaValue::Integer(_) | LuaValue::Float(_) = arg {
        let n = vm.check_integer(1, "read")?;
        return Ok(ReadFormat::Count(n.max(0) as usize));
    }
    let fmt = vm.check_string(1, "read")?;
    // Accept the old "*l" spelling
    let code = fmt.as_bytes().strip_prefix(b"*").unwrap_or(fmt.as_bytes());
    match code.first() {
        Some(b'l') => Ok(ReadFormat::Line { keep_newline: false }),
        Some(b'L') => Ok(ReadFormat::Line { keep_newline: true }),
        Some(b'n') => Ok(ReadFormat::Number),
        Some(b'a') => Ok(ReadFormat::All),
        _ => Err(vm.arg_error(1, "read", "invalid format")),
    }
}

/// Read one line; `None` at end of input.
fn read_line(vm: &mut LuaVM, keep_newline: bool) -> std::io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    if vm.input().read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    if !keep_newline && line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(Some(line))
}

/// Read up to `n` bytes; `None` at end of input. Zero bytes only probe for
/// end of input.
fn read_count(vm: &mut LuaVM, n: usize) -> std::io::Result<LuaValue> {
    let input = vm.input();
    if n == 0 {
        let at_end = input.fill_buf()?.is_empty();
        return Ok(if at_end { LuaValue::Nil } else { LuaValue::string("") });
    }
    let mut chunk = Vec::with_capacity(n.min(1 << 16));
    (&mut *input).take(n as u64).read_to_end(&mut chunk)?;
    Ok(if chunk.is_empty() { LuaValue::Nil } else { LuaValue::string(chunk) })
}

/// io.read([fmt]) - "l" line, "L" line with newline, "n" number, "a" rest of
/// input, or a byte count. Returns nil at end of input ("a" returns "").
fn io_read(vm: &mut LuaVM) -> LuaResult<usize> {
    let format = parse_format(vm)?;
    let result = match format {
        ReadFormat::Line { keep_newline } => {
            read_line(vm, keep_newline).map(|line| line.map_or(LuaValue::Nil, LuaValue::string))
        }
        // A number takes a whole line; text that is not numeric reads as nil
        ReadFormat::Number => read_line(vm, false)
            .map(|line| line.and_then(|l| parse_number(&l)).unwrap_or(LuaValue::Nil)),
        ReadFormat::All => {
            let mut rest = Vec::new();
            vm.input()
                .read_to_end(&mut rest)
                .map(|_| LuaValue::string(rest))
        }
        ReadFormat::Count(n) => read_count(vm, n),
    };
    match result {
        Ok(value) => {
            vm.push_value(value)?;
            Ok(1)
        }
        Err(e) => {
            vm.push_value(LuaValue::Nil)?;
            vm.push_value(LuaValue::string(e.to_string()))?;
            Ok(2)
        }
    }
}
