//! The `string` library (spec.md §4.3): byte-indexed substring,
//! search, and pattern operations, plus the `format`/`pack`/`unpack`
//! engines from the sibling modules. Grounded on the teacher's
//! `stdlib/string/mod.rs` function set and argument conventions
//! (negative indices count from the end, `init` defaults and clamps
//! the way `str_find_aux` in real Lua does).

use super::pattern::{self, CaptureValue};
use crate::error::{Control, LuaResult};
use crate::interp::Interpreter;
use crate::value::{Function, TableRef, Value};

pub fn install(interp: &mut Interpreter) -> TableRef {
    let t = super::new_lib(interp, "string");
    super::register(&t, "len", |_, args| Ok(vec![Value::Int(super::check_str(&args, 0, "len")?.len() as i64)]));
    super::register(&t, "sub", lua_sub);
    super::register(&t, "upper", |_, args| {
        let s = super::check_str(&args, 0, "upper")?;
        Ok(vec![Value::from_bytes(s.iter().map(|b| b.to_ascii_uppercase()).collect())])
    });
    super::register(&t, "lower", |_, args| {
        let s = super::check_str(&args, 0, "lower")?;
        Ok(vec![Value::from_bytes(s.iter().map(|b| b.to_ascii_lowercase()).collect())])
    });
    super::register(&t, "rep", lua_rep);
    super::register(&t, "reverse", |_, args| {
        let mut s = super::check_str(&args, 0, "reverse")?;
        s.reverse();
        Ok(vec![Value::from_bytes(s)])
    });
    super::register(&t, "byte", lua_byte);
    super::register(&t, "char", lua_char);
    super::register(&t, "format", lua_format);
    super::register(&t, "find", lua_find);
    super::register(&t, "match", lua_match);
    super::register(&t, "gmatch", lua_gmatch);
    super::register(&t, "gsub", lua_gsub);
    super::register(&t, "pack", |_, args| {
        let fmt = super::check_str(&args, 0, "pack")?;
        Ok(vec![Value::from_bytes(super::pack::pack(&fmt, &args[1.min(args.len())..])?)])
    });
    super::register(&t, "packsize", |_, args| {
        let fmt = super::check_str(&args, 0, "packsize")?;
        Ok(vec![Value::Int(super::pack::packsize(&fmt)? as i64)])
    });
    super::register(&t, "unpack", |_, args| {
        let fmt = super::check_str(&args, 0, "unpack")?;
        let data = super::check_str(&args, 1, "unpack")?;
        let init = super::opt_int(&args, 2, "unpack", 1)?;
        let init = resolve_index(init, data.len()).saturating_sub(1);
        let (mut vals, next_pos) = super::pack::unpack(&fmt, &data, init)?;
        vals.push(Value::Int(next_pos as i64));
        Ok(vals)
    });
    t
}

/// Converts a Lua 1-based, possibly-negative index into a 0-based byte
/// offset, clamped to `[0, len]` the way `str_sub`/`posrelat` do.
fn resolve_index(i: i64, len: usize) -> usize {
    if i >= 0 {
        i as usize
    } else {
        let from_end = len as i64 + i + 1;
        from_end.max(0) as usize
    }
}

fn lua_sub(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "sub")?;
    let len = s.len();
    let i = super::opt_int(&args, 1, "sub", 1)?;
    let j = super::opt_int(&args, 2, "sub", -1)?;
    let mut start = if i == 0 { 1 } else if i < 0 { (len as i64 + i + 1).max(1) } else { i };
    let mut end = if j < 0 { len as i64 + j + 1 } else { j.min(len as i64) };
    if start < 1 {
        start = 1;
    }
    if end > len as i64 {
        end = len as i64;
    }
    if start > end {
        return Ok(vec![Value::from_bytes(Vec::new())]);
    }
    Ok(vec![Value::from_bytes(s[(start - 1) as usize..end as usize].to_vec())])
}

fn lua_rep(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "rep")?;
    let n = super::check_int(&args, 1, "rep")?;
    let sep = super::opt_str(&args, 2, "rep", b"")?;
    if n <= 0 {
        return Ok(vec![Value::from_bytes(Vec::new())]);
    }
    let mut out = Vec::with_capacity(s.len() * n as usize);
    for i in 0..n {
        if i > 0 {
            out.extend_from_slice(&sep);
        }
        out.extend_from_slice(&s);
    }
    Ok(vec![Value::from_bytes(out)])
}

fn lua_byte(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "byte")?;
    let len = s.len();
    let i = super::opt_int(&args, 1, "byte", 1)?;
    let j = super::opt_int(&args, 2, "byte", i)?;
    let lo = if i < 0 { (len as i64 + i).max(0) as usize } else { (i - 1).max(0) as usize };
    let hi = if j < 0 { (len as i64 + j + 1).max(0) as usize } else { j.min(len as i64).max(0) as usize };
    if lo >= len || lo >= hi {
        return Ok(Vec::new());
    }
    Ok(s[lo..hi.min(len)].iter().map(|&b| Value::Int(b as i64)).collect())
}

fn lua_char(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let mut out = Vec::with_capacity(args.len());
    for i in 0..args.len() {
        let n = super::check_int(&args, i, "char")?;
        if !(0..=255).contains(&n) {
            return Err(super::arg_err(i, "char", "value out of range"));
        }
        out.push(n as u8);
    }
    Ok(vec![Value::from_bytes(out)])
}

fn lua_format(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let fmt = super::check_str(&args, 0, "format")?;
    let rest = if args.len() > 1 { &args[1..] } else { &[] };
    Ok(vec![Value::from_bytes(super::format::format(interp, &fmt, rest)?)])
}

fn captures_to_values(src: &[u8], caps: &pattern::Captures) -> Vec<Value> {
    if caps.groups.is_empty() {
        return vec![Value::from_bytes(src[caps.whole.0..caps.whole.1].to_vec())];
    }
    caps.groups
        .iter()
        .map(|c| match c {
            CaptureValue::Span(a, b) => Value::from_bytes(src[*a..*b].to_vec()),
            CaptureValue::Position(p) => Value::Int(*p as i64),
        })
        .collect()
}

fn lua_find(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "find")?;
    let pat = super::check_str(&args, 1, "find")?;
    let init = super::opt_int(&args, 2, "find", 1)?;
    let plain = matches!(args.get(3), Some(v) if v.is_truthy());
    let start = resolve_index(if init == 0 { 1 } else { init }, s.len()).saturating_sub(1).min(s.len());
    if plain || !pat.iter().any(|b| b"^$*+?.([%-".contains(b)) {
        if let Some(pos) = find_plain(&s, &pat, start) {
            return Ok(vec![Value::Int(pos as i64 + 1), Value::Int((pos + pat.len()) as i64)]);
        }
        return Ok(vec![Value::Nil]);
    }
    match pattern::find(&s, &pat, start).map_err(|e| Control::err(e.0))? {
        None => Ok(vec![Value::Nil]),
        Some(caps) => {
            let mut out = vec![Value::Int(caps.whole.0 as i64 + 1), Value::Int(caps.whole.1 as i64)];
            for c in &caps.groups {
                out.push(match c {
                    CaptureValue::Span(a, b) => Value::from_bytes(s[*a..*b].to_vec()),
                    CaptureValue::Position(p) => Value::Int(*p as i64),
                });
            }
            Ok(out)
        }
    }
}

fn find_plain(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(start);
    }
    haystack.get(start..)?.windows(needle.len()).position(|w| w == needle).map(|p| p + start)
}

fn lua_match(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "match")?;
    let pat = super::check_str(&args, 1, "match")?;
    let init = super::opt_int(&args, 2, "match", 1)?;
    let start = resolve_index(if init == 0 { 1 } else { init }, s.len()).saturating_sub(1).min(s.len());
    match pattern::find(&s, &pat, start).map_err(|e| Control::err(e.0))? {
        None => Ok(vec![Value::Nil]),
        Some(caps) => Ok(captures_to_values(&s, &caps)),
    }
}

fn lua_gmatch(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "gmatch")?;
    let pat = super::check_str(&args, 1, "gmatch")?;
    let pos = std::cell::Cell::new(0usize);
    let iterator = move |_: &mut Interpreter, _: Vec<Value>| -> LuaResult<Vec<Value>> {
        loop {
            if pos.get() > s.len() {
                return Ok(vec![Value::Nil]);
            }
            match pattern::find(&s, &pat, pos.get()).map_err(|e| Control::err(e.0))? {
                None => {
                    pos.set(s.len() + 1);
                    return Ok(vec![Value::Nil]);
                }
                Some(caps) => {
                    pos.set(if caps.whole.1 > caps.whole.0 { caps.whole.1 } else { caps.whole.1 + 1 });
                    return Ok(captures_to_values(&s, &caps));
                }
            }
        }
    };
    Ok(vec![Value::Function(Function::host("gmatch iterator", iterator))])
}

fn lua_gsub(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "gsub")?;
    let pat = super::check_str(&args, 1, "gsub")?;
    let repl = super::arg(&args, 2);
    let max_n = super::opt_int(&args, 3, "gsub", i64::MAX)?;
    let mut out = Vec::new();
    let mut pos = 0usize;
    let mut count = 0i64;
    while pos <= s.len() && count < max_n {
        let Some(caps) = pattern::find(&s, &pat, pos).map_err(|e| Control::err(e.0))? else { break };
        out.extend_from_slice(&s[pos..caps.whole.0]);
        let matched = &s[caps.whole.0..caps.whole.1];
        let cap_values = captures_to_values(&s, &caps);
        let replacement = apply_replacement(interp, &repl, matched, &cap_values)?;
        match replacement {
            Some(bytes) => out.extend_from_slice(&bytes),
            None => out.extend_from_slice(matched),
        }
        count += 1;
        pos = if caps.whole.1 > caps.whole.0 {
            caps.whole.1
        } else {
            if caps.whole.1 < s.len() {
                out.push(s[caps.whole.1]);
            }
            caps.whole.1 + 1
        };
    }
    if pos < s.len() {
        out.extend_from_slice(&s[pos.min(s.len())..]);
    }
    Ok(vec![Value::from_bytes(out), Value::Int(count)])
}

/// Computes the replacement text for one `gsub` match, or `None` to
/// keep the original match text (a string/table/function result of
/// `false`/`nil`, per spec.md).
fn apply_replacement(interp: &mut Interpreter, repl: &Value, matched: &[u8], caps: &[Value]) -> LuaResult<Option<Vec<u8>>> {
    match repl {
        Value::Str(r) => Ok(Some(expand_repl_string(r.as_bytes(), matched, caps))),
        Value::Int(_) | Value::Float(_) | Value::BigInt(_) => {
            let s = interp.tostring(repl)?;
            Ok(Some(expand_repl_string(s.as_bytes(), matched, caps)))
        }
        Value::Table(t) => {
            let key = caps.first().cloned().unwrap_or(Value::from_bytes(matched.to_vec()));
            let v = t.borrow().get(&key);
            value_to_repl(v)
        }
        Value::Function(_) => {
            let results = interp.call_value(repl.clone(), caps.to_vec(), crate::interp::ast::Span::default())?;
            value_to_repl(results.into_iter().next().unwrap_or(Value::Nil))
        }
        _ => Err(Control::err("bad argument #3 to 'gsub' (string/function/table expected)")),
    }
}

fn value_to_repl(v: Value) -> LuaResult<Option<Vec<u8>>> {
    match v {
        Value::Nil | Value::Bool(false) => Ok(None),
        Value::Str(s) => Ok(Some(s.as_bytes().to_vec())),
        Value::Int(n) => Ok(Some(n.to_string().into_bytes())),
        Value::Float(f) => Ok(Some(crate::value::float_to_display(f).into_bytes())),
        other => Err(Control::err(format!("invalid replacement value (a {})", other.type_name()))),
    }
}

fn expand_repl_string(repl: &[u8], matched: &[u8], caps: &[Value]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < repl.len() {
        if repl[i] == b'%' && i + 1 < repl.len() {
            let c = repl[i + 1];
            if c == b'%' {
                out.push(b'%');
            } else if c == b'0' {
                out.extend_from_slice(matched);
            } else if c.is_ascii_digit() {
                let idx = (c - b'1') as usize;
                if let Some(Value::Str(s)) = caps.get(idx) {
                    out.extend_from_slice(s.as_bytes());
                } else if let Some(Value::Int(n)) = caps.get(idx) {
                    out.extend_from_slice(n.to_string().as_bytes());
                }
            } else {
                out.push(c);
            }
            i += 2;
        } else {
            out.push(repl[i]);
            i += 1;
        }
    }
    out
}
