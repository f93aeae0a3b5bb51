//! The `utf8` library (spec.md §5 supplemented surface), grounded on
//! the teacher's `stdlib/utf8.rs` function set (`char codepoint len
//! offset codes charpattern`), operating on the same raw byte strings
//! as the rest of this crate rather than assuming valid UTF-8 input.

use crate::error::{Control, LuaResult};
use crate::interp::Interpreter;
use crate::value::{Function, TableRef, Value};

pub fn install(interp: &mut Interpreter) -> TableRef {
    let t = super::new_lib(interp, "utf8");
    t.borrow_mut()
        .set(Value::from_str("charpattern"), Value::from_bytes(b"[\x00-\x7F\xC2-\xFD][\x80-\xBF]*".to_vec()))
        .unwrap();
    super::register(&t, "char", lua_char);
    super::register(&t, "len", lua_len);
    super::register(&t, "codepoint", lua_codepoint);
    super::register(&t, "offset", lua_offset);
    super::register(&t, "codes", lua_codes);
    t
}

/// Decodes one UTF-8 sequence starting at `s[i]`, returning `(codepoint,
/// byte length)`. Lua's decoder additionally accepts the non-shortest,
/// up-to-6-byte historical extension; this crate sticks to strict UTF-8
/// (RFC 3629), matching the `utf8` library's default `lax = false` path.
fn decode(s: &[u8], i: usize) -> Option<(u32, usize)> {
    let b0 = *s.get(i)?;
    let len = if b0 & 0x80 == 0 {
        1
    } else if b0 & 0xe0 == 0xc0 {
        2
    } else if b0 & 0xf0 == 0xe0 {
        3
    } else if b0 & 0xf8 == 0xf0 {
        4
    } else {
        return None;
    };
    if i + len > s.len() {
        return None;
    }
    std::str::from_utf8(&s[i..i + len]).ok().and_then(|chunk| chunk.chars().next()).map(|c| (c as u32, len))
}

fn lua_char(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let mut out = String::new();
    for i in 0..args.len() {
        let cp = super::check_int(&args, i, "char")?;
        let c = char::from_u32(cp as u32).ok_or_else(|| super::arg_err(i, "char", "value out of range"))?;
        out.push(c);
    }
    Ok(vec![Value::from_bytes(out.into_bytes())])
}

fn lua_len(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "len")?;
    let i = super::opt_int(&args, 1, "len", 1)?;
    let j = super::opt_int(&args, 2, "len", -1)?;
    let start = resolve(i, s.len());
    let end = resolve(j, s.len());
    let mut pos = start;
    let mut count = 0i64;
    while pos < end {
        match decode(&s, pos) {
            Some((_, len)) => {
                pos += len;
                count += 1;
            }
            None => return Ok(vec![Value::Nil, Value::Int(pos as i64 + 1)]),
        }
    }
    Ok(vec![Value::Int(count)])
}

fn resolve(i: i64, len: usize) -> usize {
    if i > 0 {
        (i - 1) as usize
    } else if i == 0 {
        0
    } else {
        (len as i64 + i + 1).max(0) as usize
    }
}

fn lua_codepoint(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "codepoint")?;
    let i = super::opt_int(&args, 1, "codepoint", 1)?;
    let j = super::opt_int(&args, 2, "codepoint", i)?;
    let start = resolve(i, s.len());
    let end = resolve(j, s.len()) + 1;
    let mut out = Vec::new();
    let mut pos = start;
    while pos < end && pos < s.len() {
        let (cp, len) = decode(&s, pos).ok_or_else(|| Control::err("invalid UTF-8 code"))?;
        out.push(Value::Int(cp as i64));
        pos += len;
    }
    Ok(out)
}

fn lua_offset(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "offset")?;
    let n = super::check_int(&args, 1, "offset")?;
    let default_i = if n >= 0 { 1 } else { s.len() as i64 + 1 };
    let i = super::opt_int(&args, 2, "offset", default_i)?;
    let mut pos = resolve(i, s.len()) as i64;
    let mut n = n;
    if n > 0 {
        if pos < s.len() as i64 {
            n -= 1;
        }
        while n > 0 && (pos as usize) < s.len() {
            pos += 1;
            while (pos as usize) < s.len() && s[pos as usize] & 0xc0 == 0x80 {
                pos += 1;
            }
            n -= 1;
        }
    } else if n < 0 {
        while n < 0 && pos > 0 {
            pos -= 1;
            while pos > 0 && s[pos as usize] & 0xc0 == 0x80 {
                pos -= 1;
            }
            n += 1;
        }
    } else {
        while pos > 0 && (pos as usize) < s.len() && s[pos as usize] & 0xc0 == 0x80 {
            pos -= 1;
        }
    }
    if n != 0 {
        return Ok(vec![Value::Nil]);
    }
    Ok(vec![Value::Int(pos + 1)])
}

fn lua_codes(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let s = super::check_str(&args, 0, "codes")?;
    let s_for_iter = s.clone();
    let iterator = move |_: &mut Interpreter, iter_args: Vec<Value>| -> LuaResult<Vec<Value>> {
        let s = &s_for_iter;
        let prev = super::check_int(&iter_args, 1, "codes")?;
        let mut pos = if prev == 0 { 0 } else { prev as usize - 1 + decode(&s, prev as usize - 1).map(|(_, l)| l).unwrap_or(1) };
        if pos >= s.len() {
            return Ok(vec![Value::Nil]);
        }
        if prev == 0 {
            pos = 0;
        }
        let (cp, _) = decode(&s, pos).ok_or_else(|| Control::err("invalid UTF-8 code"))?;
        Ok(vec![Value::Int(pos as i64 + 1), Value::Int(cp as i64)])
    };
    Ok(vec![Value::Function(Function::host("codes iterator", iterator)), Value::from_bytes(s), Value::Int(0)])
}
