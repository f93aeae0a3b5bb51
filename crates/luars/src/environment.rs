//! Lexical environment / closures (spec.md §4.5).
//!
//! A parent-linked chain of scopes, each variable boxed in its own
//! `Rc<RefCell<Value>>` cell so a closure can share (not copy) an upvalue
//! with the scope that created it — this is what makes the classic
//! "counter factory" closure idiom work. `_ENV` is not special-cased: it is
//! simply the outermost scope's binding named `_ENV`, resolved like any
//! other free variable (see DESIGN.md's Open Question on `_G`). `_G` itself
//! is the actual global table value, not a proxy wrapping an empty table.

use crate::value::Value;
use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type Cell = Rc<RefCell<Value>>;

pub struct Scope {
    vars: RefCell<AHashMap<Rc<str>, Cell>>,
    pub parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn root() -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::new(AHashMap::new()),
            parent: None,
        })
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::new(AHashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    /// Declares a new local in this scope, shadowing any outer binding of
    /// the same name (and any existing binding of the same name in this
    /// exact scope, matching Lua's `local x = 1; local x = 2` rebind).
    pub fn declare(&self, name: Rc<str>, value: Value) -> Cell {
        let cell = Rc::new(RefCell::new(value));
        self.vars.borrow_mut().insert(name, cell.clone());
        cell
    }

    /// Finds the cell for `name`, searching outward through parents. This
    /// is how a closure's captured upvalues are resolved: the closure keeps
    /// a reference to the defining `Scope`, and lookups simply walk it.
    pub fn resolve(self: &Rc<Self>, name: &str) -> Option<Cell> {
        if let Some(cell) = self.vars.borrow().get(name) {
            return Some(cell.clone());
        }
        self.parent.as_ref().and_then(|p| p.resolve(name))
    }

    pub fn get(self: &Rc<Self>, name: &str) -> Option<Value> {
        self.resolve(name).map(|c| c.borrow().clone())
    }

    /// Assigns through an existing binding if one is visible, otherwise
    /// falls back to setting a field on `_ENV` (plain global assignment).
    pub fn assign(self: &Rc<Self>, name: &str, value: Value) -> Result<(), &'static str> {
        if let Some(cell) = self.resolve(name) {
            *cell.borrow_mut() = value;
            Ok(())
        } else {
            let env = self.resolve("_ENV").ok_or("no _ENV in scope")?;
            let Value::Table(t) = &*env.borrow() else {
                return Err("_ENV is not a table");
            };
            t.borrow_mut().set(Value::from_str(name), value).map_err(|e| e)
        }
    }
}
