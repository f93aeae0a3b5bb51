//! The `debug` library (spec.md §4.6/§4.13, restricted by spec.md §1's
//! Non-goal "full `debug.*` introspection beyond call-stack traceback").
//! Grounded on the teacher's `stdlib/debug.rs`, which itself only ever
//! implemented `traceback`/`getinfo` as real entry points — this crate
//! keeps exactly that surface plus `getmetatable`/`setmetatable` (thin,
//! metamethod-free wrappers already needed by `base`) and stubs the rest
//! (`sethook`, `getlocal`, `getupvalue`, ...) to `nil`/no-ops rather than
//! omitting the names, since scripts that merely *probe* for them (a
//! common `pcall(debug.sethook, ...)` guard) should not hard-error.

use super::arg;
use crate::error::LuaResult;
use crate::interp::Interpreter;
use crate::value::{TableRef, Value};

pub fn install(interp: &mut Interpreter) -> TableRef {
    let t = super::new_lib(interp, "debug");
    super::register(&t, "traceback", debug_traceback);
    super::register(&t, "getinfo", debug_getinfo);
    super::register(&t, "getmetatable", debug_getmetatable);
    super::register(&t, "setmetatable", debug_setmetatable);
    super::register(&t, "sethook", |_, _| Ok(Vec::new()));
    super::register(&t, "gethook", |_, _| Ok(vec![Value::Nil]));
    super::register(&t, "getlocal", |_, _| Ok(vec![Value::Nil]));
    super::register(&t, "setlocal", |_, _| Ok(vec![Value::Nil]));
    super::register(&t, "getupvalue", |_, _| Ok(vec![Value::Nil]));
    super::register(&t, "setupvalue", |_, _| Ok(vec![Value::Nil]));
    super::register(&t, "getregistry", |_, _| Ok(vec![Value::Table(super::new_table())]));
    t
}

/// `debug.traceback([message [, level]])`. The teacher's thread-argument
/// overload is not reachable here: each coroutine runs as its own
/// `Interpreter` on its own OS thread (`coroutine.rs`), so there is no
/// cross-thread call stack to format — `debug.traceback(co, ...)` simply
/// renders the calling interpreter's own stack, same as the no-thread
/// form.
fn debug_traceback(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let (message, level_idx) = match arg(&args, 0) {
        Value::Str(s) => (Some(s.as_lossy_str().into_owned()), 1),
        Value::Nil => (None, 1),
        // thread argument form: skip it, message (if any) follows.
        Value::Coroutine(_) => match arg(&args, 1) {
            Value::Str(s) => (Some(s.as_lossy_str().into_owned()), 2),
            _ => (None, 2),
        },
        other => (Some(interp.tostring(&other)?.as_lossy_str().into_owned()), 1),
    };
    let _level = super::opt_int(&args, level_idx, "traceback", 1)?;
    Ok(vec![Value::from_bytes(interp.call_stack.traceback(message.as_deref()).into_bytes())])
}

/// `debug.getinfo(f [, what])`. Returns a table with the handful of
/// fields spec.md's in-scope traceback support can back honestly
/// (`source`, `currentline`, `what`, `short_src`); fields this crate has
/// no data for (`nparams`, `nups`, `linedefined`, ...) are simply absent
/// rather than faked.
fn debug_getinfo(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = super::new_table();
    let set = |k: &str, v: Value| t.borrow_mut().set(Value::from_str(k), v).unwrap();
    match arg(&args, 0) {
        Value::Function(crate::value::Function::Lua(closure)) => {
            set("source", Value::from_bytes(format!("@{}", closure.source).into_bytes()));
            set("short_src", Value::from_bytes(closure.source.as_bytes().to_vec()));
            set("what", Value::from_str("Lua"));
            set("currentline", Value::Int(closure.span.line as i64));
        }
        Value::Function(crate::value::Function::Host(h)) => {
            set("source", Value::from_str("=[C]"));
            set("short_src", Value::from_str("[C]"));
            set("what", Value::from_str("C"));
            set("name", Value::from_str(h.name));
            set("currentline", Value::Int(-1));
        }
        Value::Int(_) => {
            if let Some(frame) = interp.call_stack.top() {
                set("source", Value::from_bytes(format!("@{}", frame.source).into_bytes()));
                set("short_src", Value::from_bytes(frame.source.as_bytes().to_vec()));
                set("currentline", Value::Int(frame.current_line as i64));
                set("what", Value::from_str("Lua"));
                set("name", Value::from_bytes(frame.name.as_bytes().to_vec()));
            } else {
                return Ok(vec![Value::Nil]);
            }
        }
        _ => return Ok(vec![Value::Nil]),
    }
    Ok(vec![Value::Table(t)])
}

fn debug_getmetatable(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    match interp.metatable_of(&arg(&args, 0)) {
        Some(mt) => Ok(vec![Value::Table(mt)]),
        None => Ok(vec![Value::Nil]),
    }
}

/// Unlike `setmetatable`, `debug.setmetatable` ignores `__metatable`
/// protection (matches real Lua: it's the escape hatch for exactly that
/// protection).
fn debug_setmetatable(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let target = arg(&args, 0);
    let mt = match arg(&args, 1) {
        Value::Table(t) => Some(t),
        Value::Nil => None,
        other => return Err(super::arg_err(1, "setmetatable", format!("nil or table expected, got {}", other.type_name()))),
    };
    if let Value::Table(t) = &target {
        t.borrow_mut().metatable = mt;
    } else if let Value::UserData(u) = &target {
        u.borrow_mut().metatable = mt;
    }
    Ok(vec![target])
}
