//! Lua's string model (spec.md §4.2): immutable byte strings, equal by
//! content, with short strings interned for cheap equality/hashing.
//!
//! Lua strings are byte strings, not UTF-8 — `s:len()` counts bytes and
//! `string.char(0)` is legal. `LuaStr` therefore wraps `Rc<[u8]>` rather
//! than `Rc<str>`; UTF-8 views are provided on demand for the pieces of the
//! standard library (`utf8.*`, source/error text) that need them.
//!
//! Interning mirrors the teacher's short-string table (`lua_value.rs` kept
//! one per `LuaContext`); this crate uses a thread-local table instead,
//! since each coroutine in this implementation runs on its own OS thread
//! (see `coroutine.rs`) and the per-thread pools never need to be shared or
//! synchronized. Interning is strictly an identity/perf optimization: two
//! `LuaStr`s are always compared and hashed by content, never by pointer,
//! so its absence would never be user-observable.

use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Strings at or under this length are interned. Matches Lua 5.4's own
/// `LUAI_MAXSHORTLEN` threshold.
const MAX_SHORT_LEN: usize = 40;

thread_local! {
    static INTERN: RefCell<AHashMap<Box<[u8]>, Rc<[u8]>>> = RefCell::new(AHashMap::new());
}

#[derive(Clone)]
pub struct LuaStr(Rc<[u8]>);

impl LuaStr {
    pub fn from_vec(bytes: Vec<u8>) -> LuaStr {
        if bytes.len() <= MAX_SHORT_LEN {
            LuaStr(intern(&bytes))
        } else {
            LuaStr(Rc::from(bytes.into_boxed_slice()))
        }
    }

    pub fn from_static(s: &'static str) -> LuaStr {
        LuaStr::from_vec(s.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Valid UTF-8 view, for the parts of the standard library that need
    /// one (e.g. matching against Rust's `str` APIs). Lua source itself
    /// never requires strings to be UTF-8.
    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    pub fn as_lossy_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }
}

fn intern(bytes: &[u8]) -> Rc<[u8]> {
    INTERN.with(|table| {
        let mut table = table.borrow_mut();
        if let Some(existing) = table.get(bytes) {
            return existing.clone();
        }
        let rc: Rc<[u8]> = Rc::from(bytes);
        table.insert(bytes.to_vec().into_boxed_slice(), rc.clone());
        rc
    })
}

impl PartialEq for LuaStr {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}
impl Eq for LuaStr {}

impl std::hash::Hash for LuaStr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state);
    }
}

impl std::fmt::Debug for LuaStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_lossy_str())
    }
}

impl From<&str> for LuaStr {
    fn from(s: &str) -> Self {
        LuaStr::from_vec(s.as_bytes().to_vec())
    }
}

impl From<String> for LuaStr {
    fn from(s: String) -> Self {
        LuaStr::from_vec(s.into_bytes())
    }
}
