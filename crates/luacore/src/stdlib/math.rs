// Math library
// Implements: abs, ceil, cos, exp, floor, fmod, log, max, min, modf, random,
// randomseed, sin, sqrt, tan, tointeger, type, pi, huge, maxinteger, mininteger

use std::cmp::Ordering;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaResult, LuaVM};

pub fn create_math_lib() -> LibraryModule {
    let mut module = crate::lib_module!("math", {
        "abs" => math_abs,
        "ceil" => math_ceil,
        "cos" => math_cos,
        "exp" => math_exp,
        "floor" => math_floor,
        "fmod" => math_fmod,
        "log" => math_log,
        "max" => math_max,
        "min" => math_min,
        "modf" => math_modf,
        "random" => math_random,
        "randomseed" => math_randomseed,
        "sin" => math_sin,
        "sqrt" => math_sqrt,
        "tan" => math_tan,
        "tointeger" => math_tointeger,
        "type" => math_type,
    });

    module = module.with_value("pi", |_vm| LuaValue::float(std::f64::consts::PI));
    module = module.with_value("huge", |_vm| LuaValue::float(f64::INFINITY));
    module = module.with_value("maxinteger", |_vm| LuaValue::integer(i64::MAX));
    module = module.with_value("mininteger", |_vm| LuaValue::integer(i64::MIN));

    module
}

/// Number argument keeping its integer/float subtype.
fn check_numeric(vm: &LuaVM, index: usize, fname: &str) -> LuaResult<LuaValue> {
    match vm.get_arg(index) {
        Some(v @ (LuaValue::Integer(_) | LuaValue::Float(_))) => Ok(v),
        Some(LuaValue::String(s)) => crate::lua_value::parse_number(s.as_bytes())
            .ok_or_else(|| vm.arg_error(index, fname, "number expected, got string")),
        _ => Ok(LuaValue::float(vm.check_number(index, fname)?)),
    }
}

fn float_to_value(f: f64) -> LuaValue {
    // Integral results that fit become integers, like math.floor in C Lua
    match LuaValue::float(f).as_integer() {
        Some(i) => LuaValue::integer(i),
        None => LuaValue::float(f),
    }
}

fn math_abs(vm: &mut LuaVM) -> LuaResult<usize> {
    let result = match check_numeric(vm, 1, "abs")? {
        LuaValue::Integer(i) => LuaValue::integer(i.wrapping_abs()),
        other => LuaValue::float(other.as_number().unwrap_or_default().abs()),
    };
    vm.push_value(result)?;
    Ok(1)
}

fn math_ceil(vm: &mut LuaVM) -> LuaResult<usize> {
    let result = match check_numeric(vm, 1, "ceil")? {
        v @ LuaValue::Integer(_) => v,
        other => float_to_value(other.as_number().unwrap_or_default().ceil()),
    };
    vm.push_value(result)?;
    Ok(1)
}

fn math_floor(vm: &mut LuaVM) -> LuaResult<usize> {
    let result = match check_numeric(vm, 1, "floor")? {
        v @ LuaValue::Integer(_) => v,
        other => float_to_value(other.as_number().unwrap_or_default().floor()),
    };
    vm.push_value(result)?;
    Ok(1)
}

fn unary_float(vm: &mut LuaVM, fname: &str, op: fn(f64) -> f64) -> LuaResult<usize> {
    let x = vm.check_number(1, fname)?;
    vm.push_value(LuaValue::float(op(x)))?;
    Ok(1)
}

fn math_sqrt(vm: &mut LuaVM) -> LuaResult<usize> {
    unary_float(vm, "sqrt", f64::sqrt)
}

fn math_sin(vm: &mut LuaVM) -> LuaResult<usize> {
    unary_float(vm, "sin", f64::sin)
}

fn math_cos(vm: &mut LuaVM) -> LuaResult<usize> {
    unary_float(vm, "cos", f64::cos)
}

fn math_tan(vm: &mut LuaVM) -> LuaResult<usize> {
    unary_float(vm, "tan", f64::tan)
}

fn math_exp(vm: &mut LuaVM) -> LuaResult<usize> {
    unary_float(vm, "exp", f64::exp)
}

fn math_log(vm: &mut LuaVM) -> LuaResult<usize> {
    let x = vm.check_number(1, "log")?;
    let result = match vm.get_arg(2) {
        None | Some(LuaValue::Nil) => x.ln(),
        Some(_) => {
            let base = vm.check_number(2, "log")?;
            if base == 2.0 {
                x.log2()
            } else if base == 10.0 {
                x.log10()
            } else {
                x.ln() / base.ln()
            }
        }
    };
    vm.push_value(LuaValue::float(result))?;
    Ok(1)
}

fn math_fmod(vm: &mut LuaVM) -> LuaResult<usize> {
    let a = check_numeric(vm, 1, "fmod")?;
    let b = check_numeric(vm, 2, "fmod")?;
    let result = match (&a, &b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => {
            if *y == 0 {
                return Err(vm.arg_error(2, "fmod", "zero"));
            }
            // i64::MIN % -1 overflows; the result is 0 either way
            LuaValue::integer(x.checked_rem(*y).unwrap_or(0))
        }
        _ => LuaValue::float(a.as_number().unwrap_or_default() % b.as_number().unwrap_or_default()),
    };
    vm.push_value(result)?;
    Ok(1)
}

fn math_modf(vm: &mut LuaVM) -> LuaResult<usize> {
    match check_numeric(vm, 1, "modf")? {
        v @ LuaValue::Integer(_) => {
            vm.push_value(v)?;
            vm.push_value(LuaValue::float(0.0))?;
        }
        other => {
            let x = other.as_number().unwrap_or_default();
            let int_part = x.trunc();
            let frac = if x.is_infinite() { 0.0 } else { x - int_part };
            vm.push_value(LuaValue::float(int_part))?;
            vm.push_value(LuaValue::float(frac))?;
        }
    }
    Ok(2)
}

fn compare_numbers(a: &LuaValue, b: &LuaValue) -> Option<Ordering> {
    match (a, b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => Some(x.cmp(y)),
        _ => a.as_number()?.partial_cmp(&b.as_number()?),
    }
}

fn pick_extreme(vm: &mut LuaVM, fname: &str, wanted: Ordering) -> LuaResult<usize> {
    let mut best = check_numeric(vm, 1, fname)?;
    for index in 2..=vm.arg_count() {
        let candidate = check_numeric(vm, index, fname)?;
        if compare_numbers(&candidate, &best) == Some(wanted) {
            best = candidate;
        }
    }
    vm.push_value(best)?;
    Ok(1)
}

fn math_max(vm: &mut LuaVM) -> LuaResult<usize> {
    pick_extreme(vm, "max", Ordering::Greater)
}

fn math_min(vm: &mut LuaVM) -> LuaResult<usize> {
    pick_extreme(vm, "min", Ordering::Less)
}

fn math_random(vm: &mut LuaVM) -> LuaResult<usize> {
    let (low, high) = match vm.arg_count() {
        0 => {
            let x: f64 = vm.rng.gen_range(0.0..1.0);
            vm.push_value(LuaValue::float(x))?;
            return Ok(1);
        }
        1 => (1, vm.check_integer(1, "random")?),
        2 => (vm.check_integer(1, "random")?, vm.check_integer(2, "random")?),
        _ => return Err(vm.error("wrong number of arguments to 'random'")),
    };
    if low > high {
        return Err(vm.arg_error(vm.arg_count(), "random", "interval is empty"));
    }
    let n = vm.rng.gen_range(low..=high);
    vm.push_value(LuaValue::integer(n))?;
    Ok(1)
}

fn math_randomseed(vm: &mut LuaVM) -> LuaResult<usize> {
    match vm.get_arg(1) {
        None | Some(LuaValue::Nil) => vm.rng = StdRng::from_entropy(),
        Some(_) => {
            let seed = match check_numeric(vm, 1, "randomseed")? {
                LuaValue::Integer(i) => i as u64,
                other => other.as_number().unwrap_or_default().to_bits(),
            };
            vm.seed_random(seed);
        }
    }
    Ok(0)
}

fn math_tointeger(vm: &mut LuaVM) -> LuaResult<usize> {
    let value = vm.check_any(1, "tointeger")?;
    let result = match value {
        LuaValue::Integer(_) | LuaValue::Float(_) => {
            value.as_integer().map_or(LuaValue::Nil, LuaValue::integer)
        }
        _ => LuaValue::Nil,
    };
    vm.push_value(result)?;
    Ok(1)
}

fn math_type(vm: &mut LuaVM) -> LuaResult<usize> {
    let result = match vm.check_any(1, "type")? {
        LuaValue::Integer(_) => LuaValue::string("integer"),
        LuaValue::Float(_) => LuaValue::string("float"),
        _ => LuaValue::Nil,
    };
    vm.push_value(result)?;
    Ok(1)
}
