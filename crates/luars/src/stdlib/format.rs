//! `string.format` (spec.md §4.3.2): a printf-style engine over Lua
//! values. Grounded on the conversion set the teacher's
//! `stdlib/string/string_format.rs` supports (`%d %i %u %c %x %X %o %e
//! %E %f %g %G %q %s %%`), with `%a`/`%A` hex-float conversions added
//! per spec.md and the `%q` quoting rules taken from the Lua 5.4
//! manual (escapes control characters, doubles embedded `"`, emits
//! integers/floats so `tonumber` round-trips them, `nil`/booleans/
//! integers accepted directly).

use crate::error::{Control, LuaResult};
use crate::interp::Interpreter;
use crate::value::Value;
use std::fmt::Write as _;

struct Spec {
    flags: String,
    width: Option<usize>,
    precision: Option<usize>,
    conv: u8,
}

pub fn format(interp: &mut Interpreter, fmt: &[u8], args: &[Value]) -> LuaResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut argi = 0usize;
    let mut i = 0usize;
    while i < fmt.len() {
        if fmt[i] != b'%' {
            out.push(fmt[i]);
            i += 1;
            continue;
        }
        i += 1;
        if fmt.get(i) == Some(&b'%') {
            out.push(b'%');
            i += 1;
            continue;
        }
        let (spec, next) = parse_spec(fmt, i)?;
        i = next;
        let value = args.get(argi).cloned().unwrap_or(Value::Nil);
        argi += 1;
        render(interp, &spec, &value, argi, &mut out)?;
    }
    Ok(out)
}

fn parse_spec(fmt: &[u8], mut i: usize) -> LuaResult<(Spec, usize)> {
    let mut flags = String::new();
    while matches!(fmt.get(i), Some(b'-' | b'+' | b' ' | b'#' | b'0')) {
        flags.push(fmt[i] as char);
        i += 1;
    }
    let mut width = None;
    let start = i;
    while matches!(fmt.get(i), Some(c) if c.is_ascii_digit()) {
        i += 1;
    }
    if i > start {
        width = std::str::from_utf8(&fmt[start..i]).ok().and_then(|s| s.parse().ok());
    }
    let mut precision = None;
    if fmt.get(i) == Some(&b'.') {
        i += 1;
        let start = i;
        while matches!(fmt.get(i), Some(c) if c.is_ascii_digit()) {
            i += 1;
        }
        precision = Some(std::str::from_utf8(&fmt[start..i]).ok().and_then(|s| s.parse().ok()).unwrap_or(0));
    }
    let Some(&conv) = fmt.get(i) else {
        return Err(Control::err("invalid conversion to 'format'"));
    };
    Ok((Spec { flags, width, precision, conv }, i + 1))
}

fn pad(flags: &str, width: Option<usize>, s: String, numeric: bool) -> String {
    let Some(w) = width else { return s };
    if s.len() >= w {
        return s;
    }
    let fill = w - s.len();
    if flags.contains('-') {
        format!("{}{}", s, " ".repeat(fill))
    } else if flags.contains('0') && numeric {
        if let Some(rest) = s.strip_prefix('-') {
            format!("-{}{}", "0".repeat(fill), rest)
        } else {
            format!("{}{}", "0".repeat(fill), s)
        }
    } else {
        format!("{}{}", " ".repeat(fill), s)
    }
}

fn sign_prefix(flags: &str, negative: bool) -> &'static str {
    if negative {
        ""
    } else if flags.contains('+') {
        "+"
    } else if flags.contains(' ') {
        " "
    } else {
        ""
    }
}

fn render(interp: &mut Interpreter, spec: &Spec, value: &Value, argn: usize, out: &mut Vec<u8>) -> LuaResult<()> {
    let fname = "format";
    match spec.conv {
        b'd' | b'i' => {
            let n = super::check_int(std::slice::from_ref(value), 0, fname).map_err(|_| super::arg_err(argn - 1, fname, "number expected"))?;
            let mut s = n.unsigned_abs().to_string();
            if let Some(p) = spec.precision {
                if s.len() < p {
                    s = "0".repeat(p - s.len()) + &s;
                }
            }
            let body = format!("{}{}{}", if n < 0 { "-" } else { "" }, sign_prefix(&spec.flags, n < 0), s);
            out.extend_from_slice(pad(&spec.flags, spec.width, body, true).as_bytes());
        }
        b'u' => {
            let n = super::check_int(std::slice::from_ref(value), 0, fname)?;
            let body = (n as u64).to_string();
            out.extend_from_slice(pad(&spec.flags, spec.width, body, true).as_bytes());
        }
        b'x' | b'X' => {
            let n = super::check_int(std::slice::from_ref(value), 0, fname)?;
            let mut body = if spec.conv == b'x' { format!("{:x}", n as u64) } else { format!("{:X}", n as u64) };
            if let Some(p) = spec.precision {
                if body.len() < p {
                    body = "0".repeat(p - body.len()) + &body;
                }
            }
            if spec.flags.contains('#') && n != 0 {
                body = format!("{}{}", if spec.conv == b'x' { "0x" } else { "0X" }, body);
            }
            out.extend_from_slice(pad(&spec.flags, spec.width, body, true).as_bytes());
        }
        b'o' => {
            let n = super::check_int(std::slice::from_ref(value), 0, fname)?;
            let body = format!("{:o}", n as u64);
            out.extend_from_slice(pad(&spec.flags, spec.width, body, true).as_bytes());
        }
        b'c' => {
            let n = super::check_int(std::slice::from_ref(value), 0, fname)?;
            out.push(n as u8);
        }
        b'f' | b'F' => {
            let n = super::check_number(std::slice::from_ref(value), 0, fname)?;
            let prec = spec.precision.unwrap_or(6);
            let body = format!("{}{:.*}", sign_prefix(&spec.flags, n < 0.0), prec, n);
            out.extend_from_slice(pad(&spec.flags, spec.width, body, true).as_bytes());
        }
        b'e' | b'E' => {
            let n = super::check_number(std::slice::from_ref(value), 0, fname)?;
            let prec = spec.precision.unwrap_or(6);
            let mut body = format!("{:.*e}", prec, n);
            body = normalize_exponent(&body, spec.conv == b'E');
            out.extend_from_slice(pad(&spec.flags, spec.width, body, true).as_bytes());
        }
        b'g' | b'G' => {
            let n = super::check_number(std::slice::from_ref(value), 0, fname)?;
            let prec = spec.precision.unwrap_or(6).max(1);
            let body = format_g(n, prec, spec.conv == b'G');
            out.extend_from_slice(pad(&spec.flags, spec.width, body, true).as_bytes());
        }
        b'a' | b'A' => {
            let n = super::check_number(std::slice::from_ref(value), 0, fname)?;
            let body = hex_float(n, spec.conv == b'A');
            out.extend_from_slice(pad(&spec.flags, spec.width, body, true).as_bytes());
        }
        b's' => {
            let s = interp.tostring(value)?;
            if spec.width.is_some() && s.as_bytes().contains(&0) {
                return Err(Control::err("string contains zeros"));
            }
            let mut body = String::from_utf8_lossy(s.as_bytes()).into_owned();
            if let Some(p) = spec.precision {
                body.truncate(p);
            }
            out.extend_from_slice(pad(&spec.flags, spec.width, body, false).as_bytes());
        }
        b'q' => {
            out.extend_from_slice(quote(value)?.as_slice());
        }
        other => {
            return Err(Control::err(format!("invalid conversion '%{}' to 'format'", other as char)));
        }
    }
    Ok(())
}

fn normalize_exponent(s: &str, upper: bool) -> String {
    let Some(pos) = s.find('e') else { return s.to_string() };
    let (mantissa, exp) = s.split_at(pos);
    let exp_num: i32 = exp[1..].parse().unwrap_or(0);
    format!("{}{}{}{:02}", mantissa, if upper { "E" } else { "e" }, if exp_num >= 0 { "+" } else { "-" }, exp_num.abs())
}

fn format_g(n: f64, prec: usize, upper: bool) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if !n.is_finite() {
        return if n.is_nan() { "nan".to_string() } else if n > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let exp = n.abs().log10().floor() as i32;
    if exp < -4 || exp >= prec as i32 {
        let s = format!("{:.*e}", prec - 1, n);
        let s = normalize_exponent(&s, upper);
        trim_g(&s)
    } else {
        let decimals = (prec as i32 - 1 - exp).max(0) as usize;
        trim_g(&format!("{:.*}", decimals, n))
    }
}

fn trim_g(s: &str) -> String {
    let (mantissa, rest) = match s.find(['e', 'E']) {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, ""),
    };
    if !mantissa.contains('.') {
        return format!("{mantissa}{rest}");
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{rest}")
}

fn hex_float(n: f64, upper: bool) -> String {
    if n == 0.0 {
        return if upper { "0X0P+0".to_string() } else { "0x0p+0".to_string() };
    }
    let bits = n.to_bits();
    let sign = if bits >> 63 == 1 { "-" } else { "" };
    let exp_bits = ((bits >> 52) & 0x7ff) as i64;
    let mantissa = bits & 0xf_ffff_ffff_ffff;
    let (lead, exp) = if exp_bits == 0 { (0, -1022i64) } else { (1, exp_bits - 1023) };
    let mut frac = format!("{:013x}", mantissa);
    while frac.ends_with('0') && frac.len() > 1 {
        frac.pop();
    }
    let body = if frac == "0" {
        format!("{sign}0x{lead}p{}{}", if exp >= 0 { "+" } else { "-" }, exp.abs())
    } else {
        format!("{sign}0x{lead}.{frac}p{}{}", if exp >= 0 { "+" } else { "-" }, exp.abs())
    };
    if upper { body.to_uppercase().replace("0X", "0X") } else { body }
}

/// `%q`: quotes so the result, read back by the Lua lexer, reproduces
/// the original value exactly (spec.md §4.3.2's round-trip guarantee).
fn quote(value: &Value) -> LuaResult<Vec<u8>> {
    match value {
        Value::Str(s) => {
            let bytes = s.as_bytes();
            let mut out = String::from("\"");
            for (i, &b) in bytes.iter().enumerate() {
                match b {
                    b'"' => out.push_str("\\\""),
                    b'\\' => out.push_str("\\\\"),
                    b'\n' => out.push_str("\\n"),
                    b'\r' => out.push_str("\\r"),
                    b if b < 0x20 || b == 0x7f => {
                        // Matches Lua's `addquoted`: zero-pad to `\ddd` when
                        // the following byte is a digit, or the decimal
                        // escape would absorb it into a different number
                        // when the string is read back.
                        let next_is_digit = bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
                        if next_is_digit {
                            let _ = write!(out, "\\{:03}", b);
                        } else {
                            let _ = write!(out, "\\{}", b);
                        }
                    }
                    b => out.push(b as char),
                }
            }
            out.push('"');
            Ok(out.into_bytes())
        }
        Value::Int(n) => {
            if *n == i64::MIN {
                Ok(format!("{:#x}", *n as u64).into_bytes())
            } else {
                Ok(n.to_string().into_bytes())
            }
        }
        Value::Float(f) => {
            // spec.md §4.3.2: non-finite floats don't have a hex-float
            // literal form the lexer accepts, so `%q` spells them out the
            // way Lua's own `lua_number2strx`/`tostringbuff` do instead.
            if f.is_nan() {
                Ok(b"(0/0)".to_vec())
            } else if f.is_infinite() {
                Ok(if *f > 0.0 { b"1e9999".to_vec() } else { b"-1e9999".to_vec() })
            } else {
                Ok(hex_float(*f, false).into_bytes())
            }
        }
        Value::Nil => Ok(b"nil".to_vec()),
        Value::Bool(b) => Ok(b.to_string().into_bytes()),
        other => Err(Control::err(format!("value has no literal form ({})", other.type_name()))),
    }
}
