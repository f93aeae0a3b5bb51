//! The polymorphic runtime value (spec.md §3/§4.1).
//!
//! The teacher (`lua_value/lua_value.rs`) models this as a 16-byte
//! bit-packed union mirroring Lua's C `TValue` exactly, with hand-rolled
//! tag bits and `unsafe` accessors. spec.md §9 explicitly asks for the
//! opposite in a systems target language: "Model as a tagged sum variant
//! with explicit arms; avoid inheritance." `Value` here is a plain safe
//! Rust enum; heap objects are shared via `Rc` rather than the teacher's
//! GC-arena integer ids (also sanctioned by spec.md §9: "reference-counted
//! handles with cycle-aware drop" is offered as an equally valid
//! alternative to an arena). See DESIGN.md.

use crate::coroutine::Coroutine;
use crate::interp::LuaClosure;
use crate::string_pool::LuaStr;
use crate::table::Table;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::cell::RefCell;
use std::rc::Rc;

pub type TableRef = Rc<RefCell<Table>>;
pub type CoroutineRef = Rc<RefCell<Coroutine>>;

/// Host (Rust-implemented) callable. A boxed closure rather than the
/// teacher's bare `fn` pointer + manual upvalue table, so builtins like
/// `coroutine.wrap` can simply capture their state in the closure instead
/// of threading an explicit upvalue vector through every call site.
pub type HostFn = dyn Fn(&mut crate::interp::Interpreter, Vec<Value>) -> crate::error::LuaResult<Vec<Value>>;

#[derive(Clone)]
pub enum Function {
    Host(Rc<HostFnEntry>),
    Lua(Rc<LuaClosure>),
}

pub struct HostFnEntry {
    pub name: &'static str,
    pub f: Box<HostFn>,
}

impl Function {
    pub fn host(name: &'static str, f: impl Fn(&mut crate::interp::Interpreter, Vec<Value>) -> crate::error::LuaResult<Vec<Value>> + 'static) -> Self {
        Function::Host(Rc::new(HostFnEntry { name, f: Box::new(f) }))
    }

    pub fn name(&self) -> &str {
        match self {
            Function::Host(h) => h.name,
            Function::Lua(c) => c.name.as_deref().unwrap_or("?"),
        }
    }
}

pub struct UserData {
    pub type_name: &'static str,
    pub data: RefCell<Box<dyn std::any::Any>>,
    pub metatable: Option<TableRef>,
}

impl Drop for UserData {
    fn drop(&mut self) {
        if let Some(mt) = &self.metatable {
            let gc = mt.borrow().get(&Value::from_str("__gc"));
            if let Value::Function(f) = gc {
                crate::gc::queue_finalizer(f);
            }
        }
    }
}

/// A userdata handle. Most host-bound resources (open files, etc.) are
/// represented this way, matching the teacher's `io::file` design.
pub type UserDataRef = Rc<RefCell<UserData>>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary-precision overflow fallback (spec.md §3). Produced only by
    /// parsing integer literals wider than i64 — Lua 5.4 itself silently
    /// wraps `i64` arithmetic rather than auto-promoting, and this crate
    /// follows that (see DESIGN.md Open Question #1 under "numeric core").
    BigInt(Rc<BigInt>),
    Str(LuaStr),
    Table(TableRef),
    Function(Function),
    Coroutine(CoroutineRef),
    UserData(UserDataRef),
}

impl Value {
    pub fn from_bytes(bytes: Vec<u8>) -> Value {
        Value::Str(LuaStr::from_vec(bytes))
    }

    pub fn from_str(s: &str) -> Value {
        Value::Str(LuaStr::from_vec(s.as_bytes().to_vec()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) | Value::BigInt(_) => "number",
            Value::Str(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
            Value::Coroutine(_) => "thread",
            Value::UserData(_) => "userdata",
        }
    }

    /// l_isfalse: only nil and false are falsy (spec.md §3).
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_coroutine(&self) -> Option<&CoroutineRef> {
        match self {
            Value::Coroutine(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Raw (metamethod-free) equality, as used by `next`/table key lookup
    /// and `rawequal`.
    pub fn raw_equal(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (BigInt(a), BigInt(b)) => a == b,
            (BigInt(a), Int(b)) | (Int(b), BigInt(a)) => a.as_ref() == &BigInt::from(*b),
            (BigInt(a), Float(b)) | (Float(b), BigInt(a)) => match a.to_f64() {
                Some(af) => af == *b,
                None => false,
            },
            (Str(a), Str(b)) => a.as_bytes() == b.as_bytes(),
            (Table(a), Table(b)) => Rc::ptr_eq(a, b),
            (Coroutine(a), Coroutine(b)) => Rc::ptr_eq(a, b),
            (UserData(a), UserData(b)) => Rc::ptr_eq(a, b),
            (Function(Function::Lua(a)), Function(Function::Lua(b))) => Rc::ptr_eq(a, b),
            (Function(Function::Host(a)), Function(Function::Host(b))) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Convertible to a table key: non-nil, non-NaN (spec.md §3).
    pub fn is_valid_key(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Float(f) => !f.is_nan(),
            _ => true,
        }
    }
}

pub fn float_to_display(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if n.floor() == n && n.abs() < 1e15 {
        format!("{:.1}", n)
    } else {
        let s = format!("{:.14e}", n);
        // Lua uses %.14g; approximate with Rust's general formatting.
        format_g(n, 14).unwrap_or(s)
    }
}

/// Approximates C's `%.14g` formatting used by `tostring`/`print` on floats.
fn format_g(n: f64, precision: usize) -> Option<String> {
    if n == 0.0 {
        return Some(if n.is_sign_negative() { "-0.0".to_string() } else { "0.0".to_string() });
    }
    let exp = n.abs().log10().floor() as i32;
    if exp < -4 || exp >= precision as i32 {
        let s = format!("{:.*e}", precision - 1, n);
        Some(trim_exponential(&s))
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        let s = format!("{:.*}", decimals, n);
        Some(trim_trailing_zeros(&s))
    }
}

fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
}

fn trim_exponential(s: &str) -> String {
    let Some(epos) = s.find('e') else { return s.to_string() };
    let (mantissa, exp) = s.split_at(epos);
    let mantissa = trim_trailing_zeros(mantissa);
    let exp_num: i32 = exp[1..].parse().unwrap_or(0);
    format!("{}e{}{:02}", mantissa, if exp_num >= 0 { "+" } else { "-" }, exp_num.abs())
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{}", itoa::Buffer::new().format(*i)),
            Value::Float(n) => write!(f, "{}", float_to_display(*n)),
            Value::BigInt(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{:?}", s.as_lossy_str()),
            Value::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Value::Function(Function::Lua(c)) => write!(f, "function: {:p}", Rc::as_ptr(c)),
            Value::Function(Function::Host(h)) => write!(f, "function: builtin#{}", h.name),
            Value::Coroutine(c) => write!(f, "thread: {:p}", Rc::as_ptr(c)),
            Value::UserData(u) => write!(f, "userdata: {:p}", Rc::as_ptr(u)),
        }
    }
}

/// Hashable, NaN/nil-rejecting wrapper used as the key type of a table's
/// hash part (spec.md §3: "nil ≡ absent key", NaN cannot be stored).
#[derive(Clone)]
pub struct ValueKey(pub Value);

impl ValueKey {
    pub fn new(v: Value) -> Option<ValueKey> {
        if v.is_valid_key() { Some(ValueKey(v)) } else { None }
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.raw_equal(&other.0)
    }
}
impl Eq for ValueKey {}

impl std::hash::Hash for ValueKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use std::hash::Hash;
        match &self.0 {
            Value::Nil => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(n) => {
                // Integral floats must hash identically to the equal Int,
                // since Int(3) == Float(3.0) under raw_equal.
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    2u8.hash(state);
                    (*n as i64).hash(state);
                } else {
                    3u8.hash(state);
                    n.to_bits().hash(state);
                }
            }
            Value::BigInt(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Str(s) => {
                4u8.hash(state);
                s.as_bytes().hash(state);
            }
            Value::Table(t) => {
                5u8.hash(state);
                (Rc::as_ptr(t) as usize).hash(state);
            }
            Value::Function(Function::Lua(c)) => {
                6u8.hash(state);
                (Rc::as_ptr(c) as usize).hash(state);
            }
            Value::Function(Function::Host(h)) => {
                6u8.hash(state);
                (Rc::as_ptr(h) as *const () as usize).hash(state);
            }
            Value::Coroutine(c) => {
                7u8.hash(state);
                (Rc::as_ptr(c) as usize).hash(state);
            }
            Value::UserData(u) => {
                8u8.hash(state);
                (Rc::as_ptr(u) as usize).hash(state);
            }
        }
    }
}
