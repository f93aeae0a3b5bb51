//! The `coroutine` library (spec.md §4.5), a thin binding over the
//! rendezvous-channel `Coroutine` object in `crate::coroutine` — this
//! file only ever does argument checking and status-string translation,
//! matching how thin the teacher's own `stdlib/coroutine.rs` wrapper is
//! over its (very differently implemented) VM-level thread object.

use super::arg;
use crate::coroutine::{Coroutine, Status};
use crate::error::{Control, LuaResult};
use crate::interp::Interpreter;
use crate::value::{CoroutineRef, Function, TableRef, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub fn install(interp: &mut Interpreter) -> TableRef {
    let t = super::new_lib(interp, "coroutine");
    super::register(&t, "create", coroutine_create);
    super::register(&t, "resume", coroutine_resume);
    super::register(&t, "yield", coroutine_yield);
    super::register(&t, "status", coroutine_status);
    super::register(&t, "running", coroutine_running);
    super::register(&t, "wrap", coroutine_wrap);
    super::register(&t, "isyieldable", coroutine_isyieldable);
    super::register(&t, "close", coroutine_close);
    t
}

fn check_function_value(v: &Value, fname: &str) -> LuaResult<()> {
    if v.is_callable() {
        Ok(())
    } else {
        Err(super::arg_err(0, fname, format!("function expected, got {}", v.type_name())))
    }
}

fn coroutine_create(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let f = arg(&args, 0);
    check_function_value(&f, "create")?;
    let co = Coroutine::create(interp.globals.clone(), interp.string_metatable.clone(), f);
    Ok(vec![Value::Coroutine(Rc::new(RefCell::new(co)))])
}

fn as_coroutine(v: &Value, fname: &str) -> LuaResult<CoroutineRef> {
    match v {
        Value::Coroutine(c) => Ok(c.clone()),
        other => Err(super::arg_err(0, fname, format!("coroutine expected, got {}", other.type_name()))),
    }
}

fn coroutine_resume(_: &mut Interpreter, mut args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if args.is_empty() {
        return Err(super::arg_err(0, "resume", "coroutine expected"));
    }
    let co = as_coroutine(&args.remove(0), "resume")?;
    match co.borrow_mut().resume(args) {
        Ok(mut results) => {
            let mut out = vec![Value::Bool(true)];
            out.append(&mut results);
            Ok(out)
        }
        Err(e) => Ok(vec![Value::Bool(false), e.value]),
    }
}

fn coroutine_yield(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    Coroutine::yield_now(args)
}

fn coroutine_status(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let co = as_coroutine(&arg(&args, 0), "status")?;
    let status = co.borrow().status();
    Ok(vec![Value::from_str(status_name(status))])
}

fn status_name(status: Status) -> &'static str {
    match status {
        Status::Suspended => "suspended",
        Status::Running => "running",
        Status::Normal => "normal",
        Status::Dead => "dead",
    }
}

/// `coroutine.running()`. This crate has no handle onto "the coroutine
/// object currently executing on this OS thread" (the rendezvous design
/// only tracks the yield channel, not a `CoroutineRef` back-pointer — see
/// `coroutine.rs`), so the running coroutine itself cannot be returned;
/// `isyieldable()`'s thread-local is enough to answer the "is this the
/// main thread" half honestly.
fn coroutine_running(_: &mut Interpreter, _args: Vec<Value>) -> LuaResult<Vec<Value>> {
    Ok(vec![Value::Nil, Value::Bool(!Coroutine::is_yieldable())])
}

fn coroutine_wrap(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let f = arg(&args, 0);
    check_function_value(&f, "wrap")?;
    let co: CoroutineRef = Rc::new(RefCell::new(Coroutine::create(interp.globals.clone(), interp.string_metatable.clone(), f)));
    let wrapper = move |_: &mut Interpreter, args: Vec<Value>| -> LuaResult<Vec<Value>> { co.borrow_mut().resume(args).map_err(Control::Error) };
    Ok(vec![Value::Function(Function::host("wrapped_coroutine", wrapper))])
}

fn coroutine_isyieldable(_: &mut Interpreter, _args: Vec<Value>) -> LuaResult<Vec<Value>> {
    Ok(vec![Value::Bool(Coroutine::is_yieldable())])
}

/// `coroutine.close(co)` (spec.md §4.5/§5). Real Lua runs pending
/// `__close` handlers for the suspended frame's to-be-closed locals; this
/// crate's coroutine body runs to completion or error on its own OS
/// thread with its own `Interpreter`, so there is no way to resume just
/// far enough to unwind to-be-closed locals without also running the rest
/// of the body. Dropping the `Coroutine` (which joins/abandons its
/// thread, see `coroutine.rs`'s `Drop` impl) is the closest honest
/// approximation: it forcibly ends the coroutine without executing any
/// more of its Lua code, matching `close`'s "no further code runs"
/// contract even though any to-be-closed `__close` calls inside it are
/// skipped rather than invoked.
fn coroutine_close(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let co = as_coroutine(&arg(&args, 0), "close")?;
    let status = co.borrow().status();
    if status == Status::Running {
        return Err(Control::err("cannot close a running coroutine"));
    }
    if status == Status::Normal {
        return Err(Control::err("cannot close a normal coroutine"));
    }
    co.borrow_mut().close();
    Ok(vec![Value::Bool(true)])
}
