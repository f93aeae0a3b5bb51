//! `package`/`require` (spec.md §4.7), grounded on the teacher's
//! `stdlib/package.rs` (searcher list, `package.searchpath`) and
//! `stdlib/basic/require.rs` (the `require` algorithm itself — the
//! teacher registers it under the basic library, but it cannot run until
//! `package` exists, so this crate installs it here instead, as the last
//! library `stdlib::install` brings up).
//!
//! Per DESIGN.md's Open Question resolution, `LUA_PATH`/`LUA_PATH_5_4`
//! expansion happens at the CLI boundary (`luars_interpreter`'s
//! `main.rs`), not here — `package.path`'s default is the hardcoded
//! `./?.lua;./?/init.lua` spec.md §6 names.

use super::{arg, arg_err, check_str};
use crate::error::{Control, LuaResult};
use crate::interp::ast::Span;
use crate::interp::Interpreter;
use crate::value::{Function, TableRef, Value};
use std::rc::Rc;

const DEFAULT_PATH: &str = "./?.lua;./?/init.lua";
const DEFAULT_CPATH: &str = "./?.so;./?.dll;./?.dylib";

pub fn install(interp: &mut Interpreter) -> TableRef {
    let pkg = super::new_lib(interp, "package");
    let loaded = super::new_table();
    let preload = super::new_table();
    pkg.borrow_mut().set(Value::from_str("loaded"), Value::Table(loaded)).unwrap();
    pkg.borrow_mut().set(Value::from_str("preload"), Value::Table(preload)).unwrap();
    pkg.borrow_mut().set(Value::from_str("path"), Value::from_str(DEFAULT_PATH)).unwrap();
    pkg.borrow_mut().set(Value::from_str("cpath"), Value::from_str(DEFAULT_CPATH)).unwrap();
    pkg.borrow_mut()
        .set(Value::from_str("config"), Value::from_str(if cfg!(windows) { "\\\n;\n?\n!\n-\n" } else { "/\n;\n?\n!\n-\n" }))
        .unwrap();

    let searchers = super::new_table();
    searchers.borrow_mut().set(Value::Int(1), Value::Function(Function::host("searcher_preload", searcher_preload))).unwrap();
    searchers.borrow_mut().set(Value::Int(2), Value::Function(Function::host("searcher_lua", searcher_lua))).unwrap();
    pkg.borrow_mut().set(Value::from_str("searchers"), Value::Table(searchers)).unwrap();

    super::register(&pkg, "searchpath", package_searchpath);
    super::register(&pkg, "loadlib", |_, _| Ok(vec![Value::Nil, Value::from_str("loadlib not supported"), Value::from_str("absent")]));

    super::register(&interp.globals.clone(), "require", lua_require);
    pkg
}

fn package_table(interp: &Interpreter) -> LuaResult<TableRef> {
    match interp.globals.borrow().get(&Value::from_str("package")) {
        Value::Table(t) => Ok(t),
        _ => Err(Control::err("package table not found")),
    }
}

fn sub_table(pkg: &TableRef, field: &str) -> LuaResult<TableRef> {
    match pkg.borrow().get(&Value::from_str(field)) {
        Value::Table(t) => Ok(t),
        _ => Err(Control::err(format!("package.{field} not found"))),
    }
}

/// `require(modname)` (spec.md §4.7's numbered algorithm).
fn lua_require(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let name = check_str(&args, 0, "require")?;
    let name_str = String::from_utf8_lossy(&name).into_owned();
    let name_val = Value::from_bytes(name.clone());

    let pkg = package_table(interp)?;
    let loaded = sub_table(&pkg, "loaded")?;

    match loaded.borrow().get(&name_val) {
        Value::Nil => {}
        Value::Bool(false) => return Err(Control::err(format!("loop or previous error loading module '{name_str}'"))),
        already => return Ok(vec![already]),
    }

    loaded.borrow_mut().set(name_val.clone(), Value::Bool(false)).map_err(Control::err)?;

    let preload = sub_table(&pkg, "preload")?;
    let preload_loader = preload.borrow().get(&name_val);

    let (loader, extra, mut errors) = if !preload_loader.is_nil() {
        (preload_loader, Value::from_str(":preload:"), Vec::new())
    } else {
        let searchers = sub_table(&pkg, "searchers")?;
        let mut found = None;
        let mut errors = Vec::new();
        let mut i = 1i64;
        loop {
            let searcher = searchers.borrow().get(&Value::Int(i));
            if searcher.is_nil() {
                break;
            }
            let result = interp.call_value(searcher, vec![name_val.clone()], Span::default())?;
            let mut it = result.into_iter();
            match it.next() {
                Some(f) if f.is_callable() => {
                    found = Some((f, it.next().unwrap_or(Value::Nil)));
                    break;
                }
                Some(Value::Str(msg)) => errors.push(msg.as_lossy_str().into_owned()),
                _ => {}
            }
            i += 1;
        }
        match found {
            Some((f, extra)) => (f, extra, errors),
            None => {
                loaded.borrow_mut().set(name_val, Value::Nil).map_err(Control::err)?;
                let mut msg = format!("module '{name_str}' not found:");
                for e in errors.drain(..) {
                    msg.push_str("\n\t");
                    msg.push_str(&e);
                }
                return Err(Control::err(msg));
            }
        }
    };
    errors.clear();

    let result = interp.call_value(loader, vec![name_val.clone(), extra], Span::default());
    let value = match result {
        Ok(mut r) => r.pop().unwrap_or(Value::Bool(true)),
        Err(e) => {
            loaded.borrow_mut().set(name_val, Value::Nil).map_err(Control::err)?;
            return Err(e);
        }
    };
    let stored = if value.is_nil() { Value::Bool(true) } else { value };
    loaded.borrow_mut().set(name_val, stored.clone()).map_err(Control::err)?;
    Ok(vec![stored])
}

/// Searcher 1: `package.preload[name]`. Returns a lone `false` (no loader
/// found, no message worth accumulating) when absent, matching real
/// Lua's searcher-1 contract.
fn searcher_preload(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let name = arg(&args, 0);
    let pkg = package_table(interp)?;
    let preload = sub_table(&pkg, "preload")?;
    match preload.borrow().get(&name) {
        Value::Nil => Ok(vec![Value::from_str(":preload:")]),
        loader => Ok(vec![loader, Value::from_str(":preload:")]),
    }
}

/// Searcher 2: `package.path`, substituting `?` per dot-to-slash module
/// name convention (spec.md §4.7's `package.searchpath` rule).
fn searcher_lua(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let Value::Str(name) = arg(&args, 0) else {
        return Err(arg_err(0, "searcher_lua", "string expected"));
    };
    let name_str = name.as_lossy_str().into_owned();
    let pkg = package_table(interp)?;
    let path = match pkg.borrow().get(&Value::from_str("path")) {
        Value::Str(s) => s.as_lossy_str().into_owned(),
        _ => DEFAULT_PATH.to_string(),
    };
    match search_path(&name_str, &path, ".", "/") {
        Some(filepath) => match std::fs::read(&filepath) {
            Ok(bytes) => match crate::interp::parser::parse(&bytes, &format!("@{filepath}")) {
                Ok(chunk) => {
                    let closure = crate::chunk_to_closure(chunk, interp.globals.clone(), &interp.root_scope, Some(filepath.clone()));
                    Ok(vec![Value::Function(Function::Lua(Rc::new(closure))), Value::from_bytes(filepath.into_bytes())])
                }
                Err(e) => Ok(vec![Value::from_bytes(format!("error loading module '{name_str}' from file '{filepath}':\n\t{e}").into_bytes())]),
            },
            Err(e) => Ok(vec![Value::from_bytes(format!("cannot open '{filepath}': {e}").into_bytes())]),
        },
        None => Ok(vec![Value::from_bytes(no_file_message(&name_str, &path, ".", "/").into_bytes())]),
    }
}

fn no_file_message(name: &str, path: &str, sep: &str, rep: &str) -> String {
    let searchname = name.replace(sep, rep);
    path.split(';')
        .map(|t| format!("\n\tno file '{}'", t.replace('?', &searchname)))
        .collect::<Vec<_>>()
        .join("")
}

fn search_path(name: &str, path: &str, sep: &str, rep: &str) -> Option<String> {
    let searchname = name.replace(sep, rep);
    path.split(';').map(|t| t.replace('?', &searchname)).find(|candidate| std::path::Path::new(candidate).exists())
}

/// `package.searchpath(name, path [, sep [, rep]])`.
fn package_searchpath(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let name = check_str(&args, 0, "searchpath")?;
    let name_str = String::from_utf8_lossy(&name).into_owned();
    let path = check_str(&args, 1, "searchpath")?;
    let path_str = String::from_utf8_lossy(&path).into_owned();
    let sep = super::opt_str(&args, 2, "searchpath", b".")?;
    let sep_str = String::from_utf8_lossy(&sep).into_owned();
    let rep = super::opt_str(&args, 3, "searchpath", b"/")?;
    let rep_str = String::from_utf8_lossy(&rep).into_owned();
    match search_path(&name_str, &path_str, &sep_str, &rep_str) {
        Some(filepath) => Ok(vec![Value::from_bytes(filepath.into_bytes())]),
        None => Ok(vec![Value::Nil, Value::from_bytes(no_file_message(&name_str, &path_str, &sep_str, &rep_str).into_bytes())]),
    }
}
