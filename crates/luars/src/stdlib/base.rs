//! The basic library (`_G`'s own global functions): spec.md §4.1/§4.2/§4.4/
//! §4.6/§4.7. Grounded on the teacher's `stdlib/basic/mod.rs` function set
//! and naming (`lua_print`, `lua_type`, ... renamed here without the
//! `lua_`/register-VM-stack plumbing, since this tree-walker's host
//! functions take `Vec<Value>` directly).

use super::{arg, arg_err, check_table};
use crate::coroutine::NonYieldableGuard;
use crate::error::{Control, LuaError, LuaResult};
use crate::interp::ast::Span;
use crate::interp::Interpreter;
use crate::value::{Function, Value};
use std::rc::Rc;

pub fn install(interp: &mut Interpreter) {
    let g = interp.globals.clone();
    macro_rules! reg {
        ($name:literal, $f:expr) => {
            g.borrow_mut().set(Value::from_str($name), Value::Function(Function::host($name, $f))).unwrap();
        };
    }

    g.borrow_mut().set(Value::from_str("_G"), Value::Table(g.clone())).unwrap();
    g.borrow_mut().set(Value::from_str("_VERSION"), Value::from_str("Lua 5.4")).unwrap();

    reg!("print", lua_print);
    reg!("type", lua_type);
    reg!("assert", lua_assert);
    reg!("error", lua_error);
    reg!("tonumber", lua_tonumber);
    reg!("tostring", lua_tostring);
    reg!("select", lua_select);
    reg!("ipairs", lua_ipairs);
    reg!("pairs", lua_pairs);
    reg!("next", lua_next);
    reg!("pcall", lua_pcall);
    reg!("xpcall", lua_xpcall);
    reg!("getmetatable", lua_getmetatable);
    reg!("setmetatable", lua_setmetatable);
    reg!("rawget", lua_rawget);
    reg!("rawset", lua_rawset);
    reg!("rawlen", lua_rawlen);
    reg!("rawequal", lua_rawequal);
    reg!("collectgarbage", lua_collectgarbage);
    reg!("load", lua_load);
    reg!("loadstring", lua_load);
    reg!("dofile", lua_dofile);
    reg!("loadfile", lua_loadfile);
    reg!("warn", lua_warn);
}

fn lua_print(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let mut out = String::new();
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        out.push_str(&interp.tostring(a)?.as_lossy_str());
    }
    println!("{out}");
    Ok(Vec::new())
}

fn lua_type(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if args.is_empty() {
        return Err(arg_err(0, "type", "value expected"));
    }
    Ok(vec![Value::from_str(arg(&args, 0).type_name())])
}

fn lua_assert(_: &mut Interpreter, mut args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let cond = arg(&args, 0);
    if cond.is_truthy() {
        Ok(args)
    } else if args.len() >= 2 {
        Err(Control::err_value(args.swap_remove(1)))
    } else {
        Err(Control::err("assertion failed!"))
    }
}

/// `error(msg [, level])`. `level` 1 (default) prepends `source:line:`;
/// `level` 0 leaves a non-string `msg` (e.g. a table) untouched, matching
/// spec.md §4.8/§7.
fn lua_error(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let msg = arg(&args, 0);
    let level = super::opt_int(&args, 1, "error", 1)?;
    let value = match &msg {
        Value::Str(s) if level > 0 => {
            let source = interp.call_stack.frames().iter().rev().nth(level as usize).map(|f| f.source.clone()).unwrap_or_else(|| Rc::from("?"));
            let line = interp.call_stack.frames().iter().rev().nth(level as usize).map(|f| f.current_line).unwrap_or(0);
            Value::from_bytes(format!("{source}:{line}: {}", s.as_lossy_str()).into_bytes())
        }
        other => other.clone(),
    };
    Err(Control::Error(LuaError::value(value).with_traceback(interp.call_stack.traceback(None))))
}

fn lua_tonumber(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if args.len() >= 2 {
        let base = super::check_int(&args, 1, "tonumber")?;
        let Value::Str(s) = arg(&args, 0) else {
            return Err(arg_err(0, "tonumber", "string expected"));
        };
        let text = s.as_lossy_str();
        let text = text.trim();
        let (neg, digits) = match text.strip_prefix('-') {
            Some(d) => (true, d),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        return match i64::from_str_radix(digits, base as u32) {
            Ok(n) => Ok(vec![Value::Int(if neg { -n } else { n })]),
            Err(_) => Ok(vec![Value::Nil]),
        };
    }
    Ok(vec![match arg(&args, 0) {
        v @ (Value::Int(_) | Value::Float(_) | Value::BigInt(_)) => v,
        Value::Str(s) => s.as_str().ok().and_then(|s| crate::numeric::parse_number(s.trim())).unwrap_or(Value::Nil),
        _ => Value::Nil,
    }])
}

fn lua_tostring(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    Ok(vec![Value::Str(interp.tostring(&arg(&args, 0))?)])
}

fn lua_select(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    match arg(&args, 0) {
        Value::Str(s) if s.as_bytes() == b"#" => Ok(vec![Value::Int(args.len() as i64 - 1)]),
        n => {
            let i = super::check_int(&args, 0, "select")?;
            let rest = &args[1..];
            if i < 0 {
                let idx = rest.len() as i64 + i;
                if idx < 0 {
                    return Err(arg_err(0, "select", "index out of range"));
                }
                return Ok(rest[idx as usize..].to_vec());
            }
            if i == 0 {
                return Err(arg_err(0, "select", "index out of range"));
            }
            let _ = n;
            let idx = (i - 1) as usize;
            Ok(if idx < rest.len() { rest[idx..].to_vec() } else { Vec::new() })
        }
    }
}

fn lua_ipairs(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = arg(&args, 0);
    if !matches!(t, Value::Table(_)) {
        return Err(arg_err(0, "ipairs", format!("table expected, got {}", t.type_name())));
    }
    Ok(vec![Value::Function(Function::host("ipairs_iterator", ipairs_iterator)), t, Value::Int(0)])
}

fn ipairs_iterator(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let Value::Table(t) = arg(&args, 0) else { return Ok(vec![Value::Nil]) };
    let i = super::check_int(&args, 1, "ipairs")? + 1;
    let v = t.borrow().get(&Value::Int(i));
    if v.is_nil() {
        Ok(vec![Value::Nil])
    } else {
        Ok(vec![Value::Int(i), v])
    }
}

fn lua_pairs(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = arg(&args, 0);
    if let Some(mm) = interp.get_metamethod(&t, "__pairs") {
        return interp.call_value(mm, vec![t], Span::default());
    }
    check_table(&args, 0, "pairs")?;
    Ok(vec![Value::Function(Function::host("next", lua_next)), t, Value::Nil])
}

fn lua_next(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = check_table(&args, 0, "next")?;
    let key = arg(&args, 1);
    match t.borrow().next(&key) {
        Ok(Some((k, v))) => Ok(vec![k, v]),
        Ok(None) => Ok(vec![Value::Nil]),
        Err(e) => Err(Control::err(e)),
    }
}

fn lua_pcall(interp: &mut Interpreter, mut args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if args.is_empty() {
        return Err(arg_err(0, "pcall", "value expected"));
    }
    let f = args.remove(0);
    let _guard = NonYieldableGuard::enter();
    match interp.call_value(f, args, Span::default()) {
        Ok(mut results) => {
            let mut out = vec![Value::Bool(true)];
            out.append(&mut results);
            Ok(out)
        }
        Err(Control::Error(e)) => Ok(vec![Value::Bool(false), e.value]),
        Err(other) => Err(other),
    }
}

fn lua_xpcall(interp: &mut Interpreter, mut args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if args.len() < 2 {
        return Err(arg_err(1, "xpcall", "value expected"));
    }
    let f = args.remove(0);
    let handler = args.remove(0);
    let _guard = NonYieldableGuard::enter();
    match interp.call_value(f, args, Span::default()) {
        Ok(mut results) => {
            let mut out = vec![Value::Bool(true)];
            out.append(&mut results);
            Ok(out)
        }
        Err(Control::Error(e)) => {
            let handled = interp.call_value(handler, vec![e.value], Span::default())?;
            let mut out = vec![Value::Bool(false)];
            out.extend(handled.into_iter().take(1));
            Ok(out)
        }
        Err(other) => Err(other),
    }
}

fn lua_getmetatable(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let v = arg(&args, 0);
    match interp.metatable_of(&v) {
        Some(mt) => {
            let protect = mt.borrow().get(&Value::from_str("__metatable"));
            Ok(vec![if protect.is_nil() { Value::Table(mt) } else { protect }])
        }
        None => Ok(vec![Value::Nil]),
    }
}

fn lua_setmetatable(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = check_table(&args, 0, "setmetatable")?;
    if let Some(existing) = &t.borrow().metatable {
        let protect = existing.borrow().get(&Value::from_str("__metatable"));
        if !protect.is_nil() {
            return Err(Control::err("cannot change a protected metatable"));
        }
    }
    match arg(&args, 1) {
        Value::Nil => {
            t.borrow_mut().metatable = None;
        }
        Value::Table(mt) => {
            t.borrow_mut().metatable = Some(mt);
        }
        other => return Err(arg_err(1, "setmetatable", format!("nil or table expected, got {}", other.type_name()))),
    }
    Ok(vec![Value::Table(t)])
}

fn lua_rawget(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = check_table(&args, 0, "rawget")?;
    Ok(vec![t.borrow().get(&arg(&args, 1))])
}

fn lua_rawset(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = check_table(&args, 0, "rawset")?;
    t.borrow_mut().set(arg(&args, 1), arg(&args, 2)).map_err(Control::err)?;
    Ok(vec![Value::Table(t)])
}

fn lua_rawlen(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    match arg(&args, 0) {
        Value::Table(t) => Ok(vec![Value::Int(t.borrow().length())]),
        Value::Str(s) => Ok(vec![Value::Int(s.len() as i64)]),
        other => Err(arg_err(0, "rawlen", format!("table or string expected, got {}", other.type_name()))),
    }
}

fn lua_rawequal(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    Ok(vec![Value::Bool(arg(&args, 0).raw_equal(&arg(&args, 1)))])
}

fn lua_collectgarbage(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let opt = match arg(&args, 0) {
        Value::Str(s) => s.as_lossy_str().into_owned(),
        Value::Nil => "collect".to_string(),
        _ => "collect".to_string(),
    };
    match opt.as_str() {
        "count" => {
            let kb = crate::gc::live_table_count() as f64 * 0.064;
            Ok(vec![Value::Float(kb), Value::Float(0.0)])
        }
        "isrunning" => Ok(vec![Value::Bool(true)]),
        "collect" | "step" | "" => {
            // Drains the finalizer queue `Table::drop`/`UserData::drop`
            // populate as the last `Rc` to an object with a `__gc`
            // metamethod goes out of scope (spec.md §4.10). There is no
            // tracing sweep to drive here (see gc.rs), but this is the
            // one explicit point — besides interpreter shutdown — where
            // a script can observe those finalizers actually running.
            for f in crate::gc::take_pending_finalizers() {
                let _ = interp.call_value(Value::Function(f), vec![Value::Nil], Span::default());
            }
            Ok(vec![Value::Int(0)])
        }
        _ => Ok(vec![Value::Int(0)]),
    }
}

/// `load(chunk [, chunkname [, mode [, env]]])`. Accepts a string chunk
/// or a function-as-reader (called repeatedly until it returns nil/"").
/// Returns `(nil, errmsg)` on a parse failure rather than raising (spec.md
/// §4.4).
fn lua_load(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let source = match arg(&args, 0) {
        Value::Str(s) => s.as_bytes().to_vec(),
        f @ Value::Function(_) => {
            let mut buf = Vec::new();
            loop {
                let piece = interp.call_value(f.clone(), Vec::new(), Span::default())?;
                match piece.into_iter().next() {
                    Some(Value::Str(s)) if !s.is_empty() => buf.extend_from_slice(s.as_bytes()),
                    _ => break,
                }
            }
            buf
        }
        other => return Err(arg_err(0, "load", format!("string or function expected, got {}", other.type_name()))),
    };
    let name = match arg(&args, 1) {
        Value::Str(s) => s.as_lossy_str().into_owned(),
        _ => "chunk".to_string(),
    };
    let env = match arg(&args, 3) {
        Value::Table(t) => t,
        _ => interp.globals.clone(),
    };
    match crate::interp::parser::parse(&source, &name) {
        Ok(chunk) => {
            let closure = crate::chunk_to_closure(chunk, env, &interp.root_scope, Some(name));
            Ok(vec![Value::Function(Function::Lua(Rc::new(closure)))])
        }
        Err(e) => Ok(vec![Value::Nil, Value::from_bytes(e.into_bytes())]),
    }
}

fn lua_loadfile(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let Value::Str(path) = arg(&args, 0) else {
        return Err(arg_err(0, "loadfile", "string expected"));
    };
    let path = path.as_lossy_str().into_owned();
    match std::fs::read(&path) {
        Ok(bytes) => match crate::interp::parser::parse(&bytes, &path) {
            Ok(chunk) => {
                let closure = crate::chunk_to_closure(chunk, interp.globals.clone(), &interp.root_scope, Some(path));
                Ok(vec![Value::Function(Function::Lua(Rc::new(closure)))])
            }
            Err(e) => Ok(vec![Value::Nil, Value::from_bytes(e.into_bytes())]),
        },
        Err(e) => Ok(vec![Value::Nil, Value::from_bytes(format!("cannot open {path}: {e}").into_bytes())]),
    }
}

fn lua_dofile(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let loaded = lua_loadfile(interp, args)?;
    match loaded.into_iter().next() {
        Some(f @ Value::Function(_)) => interp.call_value(f, Vec::new(), Span::default()),
        _ => Err(Control::err("cannot open file")),
    }
}

fn lua_warn(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let mut msg = String::new();
    for a in &args {
        if let Value::Str(s) = a {
            msg.push_str(&s.as_lossy_str());
        }
    }
    if msg.starts_with('@') {
        return Ok(Vec::new());
    }
    eprintln!("Lua warning: {msg}");
    Ok(Vec::new())
}
