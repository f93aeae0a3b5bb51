//! Lua error model (spec.md §4.8/§7).
//!
//! Unlike the teacher's bytecode VM, which keeps a `Copy` 1-byte `LuaError`
//! enum and stashes the message in the VM, a tree-walking evaluator unwinds
//! through plain `Result`s, so the error can simply carry the raised
//! [`Value`] directly. This is what lets `error({code = 1})` hand the exact
//! table back out of `pcall` unmodified, as spec.md §4.8 requires.

use crate::value::Value;
use std::fmt;

/// A raised Lua error: the value passed to `error()` (or synthesized by a
/// runtime fault), plus whether a `chunkname:line:` prefix has already been
/// applied (`error(msg, 0)` suppresses it; runtime faults always apply it
/// when a source position is known).
#[derive(Debug, Clone)]
pub struct LuaError {
    pub value: Value,
    /// Traceback captured at the point the error left a protected frame's
    /// C-call boundary, rendered lazily by `debug.traceback`.
    pub traceback: Option<String>,
}

impl LuaError {
    pub fn msg(message: impl Into<String>) -> Self {
        LuaError {
            value: Value::from_bytes(message.into().into_bytes()),
            traceback: None,
        }
    }

    pub fn value(value: Value) -> Self {
        LuaError {
            value,
            traceback: None,
        }
    }

    pub fn with_traceback(mut self, tb: String) -> Self {
        self.traceback = Some(tb);
        self
    }

    /// Render the error object the way Lua's standalone interpreter would
    /// for an uncaught error (calls `__tostring` when present; otherwise the
    /// raw bytes or a `(error object is a <type> value)` placeholder).
    pub fn display_message(&self) -> String {
        match &self.value {
            Value::Str(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => crate::value::float_to_display(*f),
            other => format!("(error object is a {} value)", other.type_name()),
        }
    }
}

impl fmt::Display for LuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_message())
    }
}

impl std::error::Error for LuaError {}

pub type LuaResult<T> = Result<T, Control>;

/// Non-local control flow inside the evaluator. Only [`Control::Error`]
/// crosses a `pcall`/`xpcall` boundary as a value; `Break`, `Return`, and
/// `Goto` are structural and must be fully consumed by the statement
/// executor within the same function activation (a `Return`/`Break`/`Goto`
/// that escapes the surrounding function is this evaluator's bug, not the
/// user's — it does not need an error message, so it is distinguished from
/// `Error` at the type level).
#[derive(Debug)]
pub enum Control {
    Error(LuaError),
    Break,
    Return(Vec<Value>),
    Goto(crate::interp::ast::LabelName),
}

impl Control {
    pub fn err(message: impl Into<String>) -> Self {
        Control::Error(LuaError::msg(message))
    }

    pub fn err_value(value: Value) -> Self {
        Control::Error(LuaError::value(value))
    }

    /// Extracts the error, panicking if this was structural control flow
    /// that should never reach a `pcall` boundary. Used at the boundary
    /// between `eval` (which returns `Control`) and `pcall`'s catch site.
    pub fn into_error(self) -> LuaError {
        match self {
            Control::Error(e) => e,
            other => panic!("structural control flow {other:?} escaped to a protected call"),
        }
    }
}

impl From<LuaError> for Control {
    fn from(e: LuaError) -> Self {
        Control::Error(e)
    }
}
