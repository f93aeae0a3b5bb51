//! Numeric literal/coercion parsing shared by the lexer and `tonumber`
//! (spec.md §3, §4.1). Grounded on the algorithmic shape of the teacher's
//! `compiler/parse_lua_number.rs` (try integer first, fall back to float
//! on overflow) but hand-written without that file's `emmylua_parser`
//! token dependency, which the workspace never actually declared.

use crate::value::Value;
use num_bigint::BigInt;
use std::rc::Rc;

/// Parses a Lua numeral the way `tonumber(s)` and the lexer's number
/// tokens do: optional sign, decimal or `0x`-hex, optional fractional
/// part and exponent (`e`/`E` for decimal, `p`/`P` for hex floats per
/// Lua 5.4's hex-float extension).
pub fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (neg, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        return parse_hex(hex, neg);
    }
    if rest.bytes().all(|b| b.is_ascii_digit()) && !rest.is_empty() {
        if let Ok(i) = rest.parse::<i64>() {
            return Some(Value::Int(if neg { -i } else { i }));
        }
        // Wider than i64: fall back to the arbitrary-precision arm rather
        // than silently losing precision (spec.md §3's BigInt arm).
        let mut digits = rest.to_string();
        if neg {
            digits.insert(0, '-');
        }
        return BigInt::parse_bytes(digits.as_bytes(), 10).map(|b| Value::BigInt(Rc::new(b)));
    }
    rest.parse::<f64>().ok().map(|f| Value::Float(if neg { -f } else { f }))
}

fn parse_hex(hex: &str, neg: bool) -> Option<Value> {
    if hex.is_empty() {
        return None;
    }
    if !hex.contains('.') && !hex.to_ascii_lowercase().contains('p') {
        let v = u64::from_str_radix(hex, 16).ok()?;
        let i = v as i64;
        return Some(Value::Int(if neg { i.wrapping_neg() } else { i }));
    }
    // Hex float: mantissa in hex, binary exponent after 'p'/'P'.
    let lower = hex.to_ascii_lowercase();
    let (mantissa, exp) = match lower.split_once('p') {
        Some((m, e)) => (m, e.parse::<i32>().ok()?),
        None => (lower.as_str(), 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut value = 0f64;
    for c in int_part.chars() {
        value = value * 16.0 + c.to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        value += c.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    value *= 2f64.powi(exp);
    Some(Value::Float(if neg { -value } else { value }))
}

/// `tointeger` semantics: only values with no fractional part convert,
/// never raising on failure (returns `None`).
pub fn to_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        // `i64::MAX as f64` rounds up to 2^63, which no i64 can hold, so the
        // upper bound must stay a strict `<` against it (mirrors real Lua's
        // `f < -(lua_Number)LLONG_MIN` check in `luaV_tointeger`).
        Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < -(i64::MIN as f64) => Some(*f as i64),
        Value::Str(s) => s.as_str().ok().and_then(|s| parse_number(s.trim())).and_then(|n| to_integer(&n)),
        _ => None,
    }
}
