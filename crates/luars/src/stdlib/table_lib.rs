//! The `table` library (spec.md §4.3/table operations), grounded on
//! the teacher's `stdlib/table.rs` function set (`insert remove concat
//! sort pack unpack move`), re-expressed against the array+hash
//! `Table` defined in `table.rs` instead of the teacher's register-VM
//! array part.

use crate::error::{Control, LuaResult};
use crate::interp::ast::Span;
use crate::interp::Interpreter;
use crate::value::{TableRef, Value};

pub fn install(interp: &mut Interpreter) -> TableRef {
    let t = super::new_lib(interp, "table");
    super::register(&t, "insert", lua_insert);
    super::register(&t, "remove", lua_remove);
    super::register(&t, "concat", lua_concat);
    super::register(&t, "sort", lua_sort);
    super::register(&t, "pack", lua_pack);
    super::register(&t, "unpack", lua_unpack);
    super::register(&t, "move", lua_move);
    t
}

fn lua_insert(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = super::check_table(&args, 0, "insert")?;
    match args.len() {
        2 => {
            let len = t.borrow().length();
            t.borrow_mut().set(Value::Int(len + 1), args[1].clone()).map_err(Control::err)?;
        }
        3 => {
            let pos = super::check_int(&args, 1, "insert")?;
            t.borrow_mut().insert_at(pos, args[2].clone()).map_err(Control::err)?;
        }
        _ => return Err(Control::err("wrong number of arguments to 'insert'")),
    }
    Ok(Vec::new())
}

fn lua_remove(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = super::check_table(&args, 0, "remove")?;
    let len = t.borrow().length();
    let pos = super::opt_int(&args, 1, "remove", len)?;
    if len == 0 && args.len() < 2 {
        return Ok(vec![Value::Nil]);
    }
    let removed = t.borrow_mut().remove_at(pos).map_err(Control::err)?;
    Ok(vec![removed])
}

fn lua_concat(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = super::check_table(&args, 0, "concat")?;
    let sep = super::opt_str(&args, 1, "concat", b"")?;
    let i = super::opt_int(&args, 2, "concat", 1)?;
    let j = super::opt_int(&args, 3, "concat", t.borrow().length())?;
    let mut out = Vec::new();
    let mut k = i;
    while k <= j {
        if k > i {
            out.extend_from_slice(&sep);
        }
        let v = t.borrow().get(&Value::Int(k));
        match v {
            Value::Str(s) => out.extend_from_slice(s.as_bytes()),
            Value::Int(_) | Value::Float(_) | Value::BigInt(_) => out.extend_from_slice(interp.tostring(&v)?.as_bytes()),
            other => return Err(Control::err(format!("invalid value ({}) at index {k} in table for 'concat'", other.type_name()))),
        }
        k += 1;
    }
    Ok(vec![Value::from_bytes(out)])
}

fn lua_sort(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = super::check_table(&args, 0, "sort")?;
    let len = t.borrow().length();
    let cmp = super::arg(&args, 1);
    let mut items: Vec<Value> = (1..=len).map(|i| t.borrow().get(&Value::Int(i))).collect();
    // insertion sort: Lua's comparator may error, and a fallible
    // comparison doesn't fit `sort_by`'s infallible `Ordering` closure
    // cleanly, so this walks the array directly instead.
    let mut err = None;
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 {
            let less = if cmp.is_nil() {
                interp.less_than(&items[j], &items[j - 1], Span::default())
            } else {
                interp
                    .call_value(cmp.clone(), vec![items[j].clone(), items[j - 1].clone()], Span::default())
                    .map(|r| r.into_iter().next().unwrap_or(Value::Nil).is_truthy())
            };
            match less {
                Ok(true) => {
                    items.swap(j, j - 1);
                    j -= 1;
                }
                Ok(false) => break,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        if err.is_some() {
            break;
        }
    }
    if let Some(e) = err {
        return Err(e);
    }
    for (idx, v) in items.into_iter().enumerate() {
        t.borrow_mut().set(Value::Int(idx as i64 + 1), v).map_err(Control::err)?;
    }
    Ok(Vec::new())
}

fn lua_pack(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = super::new_table();
    for (i, v) in args.iter().enumerate() {
        t.borrow_mut().set(Value::Int(i as i64 + 1), v.clone()).map_err(Control::err)?;
    }
    t.borrow_mut().set(Value::from_str("n"), Value::Int(args.len() as i64)).map_err(Control::err)?;
    Ok(vec![Value::Table(t)])
}

fn lua_unpack(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let t = super::check_table(&args, 0, "unpack")?;
    let i = super::opt_int(&args, 1, "unpack", 1)?;
    let j = super::opt_int(&args, 2, "unpack", t.borrow().length())?;
    if i > j {
        return Ok(Vec::new());
    }
    Ok((i..=j).map(|k| t.borrow().get(&Value::Int(k))).collect())
}

fn lua_move(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let a1 = super::check_table(&args, 0, "move")?;
    let f = super::check_int(&args, 1, "move")?;
    let e = super::check_int(&args, 2, "move")?;
    let t = super::check_int(&args, 3, "move")?;
    let a2 = if args.len() > 4 { super::check_table(&args, 4, "move")? } else { a1.clone() };
    if e >= f {
        if t > f || t > e || !Value::Table(a1.clone()).raw_equal(&Value::Table(a2.clone())) {
            let mut i = f;
            while i <= e {
                let v = a1.borrow().get(&Value::Int(i));
                a2.borrow_mut().set(Value::Int(t + (i - f)), v).map_err(Control::err)?;
                i += 1;
            }
        } else {
            let mut i = e;
            while i >= f {
                let v = a1.borrow().get(&Value::Int(i));
                a2.borrow_mut().set(Value::Int(t + (i - f)), v).map_err(Control::err)?;
                i -= 1;
            }
        }
    }
    Ok(vec![Value::Table(a2)])
}
