//! The `os` library (spec.md §5 supplemented surface), grounded on the
//! teacher's `stdlib/os.rs` function set. Wall-clock formatting uses
//! `chrono` rather than hand-rolled calendar math, per the ambient
//! stack's ownership of date/time concerns.

use crate::error::{Control, LuaResult};
use crate::interp::Interpreter;
use crate::value::{TableRef, Value};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn install(interp: &mut Interpreter) -> TableRef {
    let t = super::new_lib(interp, "os");
    super::register(&t, "time", lua_time);
    super::register(&t, "clock", |_, _| {
        Ok(vec![Value::Float(std::time::UNIX_EPOCH.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.0))])
    });
    super::register(&t, "difftime", |_, a| {
        let t2 = super::check_number(&a, 0, "difftime")?;
        let t1 = super::check_number(&a, 1, "difftime")?;
        Ok(vec![Value::Float(t2 - t1)])
    });
    super::register(&t, "date", lua_date);
    super::register(&t, "getenv", |_, a| {
        let name = super::check_str(&a, 0, "getenv")?;
        let name = String::from_utf8_lossy(&name).into_owned();
        Ok(vec![std::env::var(name).map(Value::from_str).unwrap_or(Value::Nil)])
    });
    super::register(&t, "tmpname", |_, _| {
        let path = std::env::temp_dir().join(format!("lua_{}", std::process::id()));
        Ok(vec![Value::from_bytes(path.to_string_lossy().into_owned().into_bytes())])
    });
    super::register(&t, "remove", |_, a| {
        let path = super::check_str(&a, 0, "remove")?;
        let path = String::from_utf8_lossy(&path).into_owned();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(vec![Value::Bool(true)]),
            Err(e) => Ok(vec![Value::Nil, Value::from_bytes(format!("{path}: {e}").into_bytes())]),
        }
    });
    super::register(&t, "rename", |_, a| {
        let from = super::check_str(&a, 0, "rename")?;
        let to = super::check_str(&a, 1, "rename")?;
        match std::fs::rename(String::from_utf8_lossy(&from).into_owned(), String::from_utf8_lossy(&to).into_owned()) {
            Ok(()) => Ok(vec![Value::Bool(true)]),
            Err(e) => Ok(vec![Value::Nil, Value::from_bytes(e.to_string().into_bytes())]),
        }
    });
    super::register(&t, "execute", lua_execute);
    super::register(&t, "exit", lua_exit);
    t
}

fn lua_time(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if let Value::Table(fields) = super::arg(&args, 0) {
        let get = |name: &str, default: i64| -> i64 {
            match fields.borrow().get(&Value::from_str(name)) {
                Value::Int(n) => n,
                Value::Float(f) => f as i64,
                _ => default,
            }
        };
        let year = get("year", 1970);
        let month = get("month", 1);
        let day = get("day", 1);
        let hour = get("hour", 12);
        let min = get("min", 0);
        let sec = get("sec", 0);
        let dt = Local
            .with_ymd_and_hms(year as i32, month as u32, day as u32, hour as u32, min as u32, sec as u32)
            .single()
            .ok_or_else(|| Control::err("time result cannot be represented"))?;
        return Ok(vec![Value::Int(dt.timestamp())]);
    }
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    Ok(vec![Value::Int(now.as_secs() as i64)])
}

fn lua_date(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let fmt = super::opt_str(&args, 0, "date", b"%c")?;
    let mut fmt = String::from_utf8_lossy(&fmt).into_owned();
    let time = super::opt_number(&args, 1, "date", SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64())?;
    let utc = fmt.starts_with('!');
    if utc {
        fmt.remove(0);
    }
    let secs = time as i64;
    if utc {
        let dt = Utc.timestamp_opt(secs, 0).single().ok_or_else(|| Control::err("time result cannot be represented"))?;
        render_date(&fmt, dt, &args)
    } else {
        let dt = Local.timestamp_opt(secs, 0).single().ok_or_else(|| Control::err("time result cannot be represented"))?;
        render_date(&fmt, dt, &args)
    }
}

fn render_date<Tz: TimeZone>(fmt: &str, dt: DateTime<Tz>, args: &[Value]) -> LuaResult<Vec<Value>>
where
    Tz::Offset: std::fmt::Display,
{
    if fmt == "*t" || fmt == "!*t" {
        let t = super::new_table();
        let set = |t: &TableRef, k: &str, v: i64| t.borrow_mut().set(Value::from_str(k), Value::Int(v)).unwrap();
        set(&t, "year", dt.year() as i64);
        set(&t, "month", dt.month() as i64);
        set(&t, "day", dt.day() as i64);
        set(&t, "hour", dt.hour() as i64);
        set(&t, "min", dt.minute() as i64);
        set(&t, "sec", dt.second() as i64);
        set(&t, "wday", dt.weekday().num_days_from_sunday() as i64 + 1);
        set(&t, "yday", dt.ordinal() as i64);
        t.borrow_mut().set(Value::from_str("isdst"), Value::Bool(false)).unwrap();
        return Ok(vec![Value::Table(t)]);
    }
    let _ = args;
    let translated = translate_strftime(fmt);
    Ok(vec![Value::from_bytes(dt.format(&translated).to_string().into_bytes())])
}

/// Maps Lua's (C `strftime`-derived) directive set onto `chrono`'s,
/// which differs in a few specifiers (`%c`, `%x`, `%X` map directly;
/// the rest pass through unchanged since chrono follows the same `%`
/// conventions as C).
fn translate_strftime(fmt: &str) -> String {
    fmt.to_string()
}

fn lua_execute(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if args.is_empty() {
        return Ok(vec![Value::Bool(cfg!(unix) || cfg!(windows))]);
    }
    let cmd = super::check_str(&args, 0, "execute")?;
    let cmd = String::from_utf8_lossy(&cmd).into_owned();
    let status = if cfg!(windows) {
        std::process::Command::new("cmd").arg("/C").arg(&cmd).status()
    } else {
        std::process::Command::new("sh").arg("-c").arg(&cmd).status()
    };
    match status {
        Ok(s) => Ok(vec![
            Value::Bool(s.success()),
            Value::from_str("exit"),
            Value::Int(s.code().unwrap_or(-1) as i64),
        ]),
        Err(e) => Ok(vec![Value::Nil, Value::from_str("exit"), Value::from_bytes(e.to_string().into_bytes())]),
    }
}

fn lua_exit(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let code = match super::arg(&args, 0) {
        Value::Nil | Value::Bool(true) => 0,
        Value::Bool(false) => 1,
        v => super::check_int(std::slice::from_ref(&v), 0, "exit")? as i32,
    };
    std::process::exit(code);
}
