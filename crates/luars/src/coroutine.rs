//! Coroutines (spec.md §4.7).
//!
//! A tree-walking evaluator has no single program counter to save and
//! restore the way the teacher's register VM did for its own (now
//! removed) coroutine support, so `yield` cannot simply stash an
//! instruction pointer. This crate instead runs each coroutine body on a
//! real OS thread and uses a pair of zero-capacity
//! `std::sync::mpsc::sync_channel(0)` rendezvous channels to hand control
//! (and values) back and forth — `resume` blocks until the coroutine
//! either yields or returns, and `yield` blocks until the next `resume`.
//! Because the rendezvous enforces that exactly one side is ever running,
//! two coroutines never truly execute concurrently, which is what makes
//! it sound to move the `Rc`-based `Value` graph across the thread
//! boundary at all — but that soundness argument is about *which thread is
//! currently permitted to run*, not about which thread allocated a given
//! value, so `send_wrapper::SendWrapper` (which panics unless accessed from
//! its *creating* thread) cannot express it: every handoff here is created
//! on one side of the rendezvous and consumed on the other. [`Rendezvous`]
//! below is the purpose-built replacement — a bare `unsafe impl Send`
//! under the single-runner discipline the channel pair enforces. See
//! DESIGN.md's "coroutine implementation strategy" entry for the
//! alternatives this was weighed against.

use crate::error::{Control, LuaError, LuaResult};
use crate::value::{TableRef, Value};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

/// Carries a value across the coroutine/resumer thread boundary. Sound
/// only under the rendezvous discipline this module enforces: the paired
/// zero-capacity channels guarantee the sending side blocks until the
/// receiving side is the only one running, so a wrapped value is never
/// touched by two threads at once. Unlike `send_wrapper::SendWrapper`
/// (which asserts "only ever accessed from the thread that created it"),
/// this makes no claim about which thread allocated or reads the value —
/// only that the two never race it — which is exactly what a handoff that
/// is *created* on one side and *consumed* on the other needs.
struct Rendezvous<T>(T);

unsafe impl<T> Send for Rendezvous<T> {}

impl<T> Rendezvous<T> {
    fn new(v: T) -> Rendezvous<T> {
        Rendezvous(v)
    }

    fn into_inner(self) -> T {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Suspended,
    Running,
    Normal,
    Dead,
}

enum ToCoroutine {
    Resume(Vec<Value>),
}

enum FromCoroutine {
    Yield(Vec<Value>),
    Done(LuaResult<Vec<Value>>),
}

pub struct Coroutine {
    status: Status,
    to_co: Option<SyncSender<Rendezvous<ToCoroutine>>>,
    from_co: Option<Receiver<Rendezvous<FromCoroutine>>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

thread_local! {
    /// The yield channel pair for the coroutine currently executing on
    /// *this* OS thread, if any. `coroutine.yield` reads this rather than
    /// threading a channel handle through every evaluator call.
    static CURRENT: std::cell::RefCell<Option<(SyncSender<Rendezvous<FromCoroutine>>, Receiver<Rendezvous<ToCoroutine>>)>> =
        const { std::cell::RefCell::new(None) };
}

/// The coroutine body's closure-over state, bundled so a single
/// `Rendezvous` wrapper covers the whole move into the spawned thread.
struct Body {
    globals: TableRef,
    string_metatable: Option<TableRef>,
    f: Value,
}

impl Coroutine {
    /// `coroutine.create(f)`. The body does not start running until the
    /// first `resume` — the thread blocks immediately on the rendezvous
    /// channel waiting for it.
    pub fn create(globals: crate::value::TableRef, string_metatable: Option<crate::value::TableRef>, f: Value) -> Coroutine {
        let (to_co_tx, to_co_rx) = sync_channel::<Rendezvous<ToCoroutine>>(0);
        let (from_co_tx, from_co_rx) = sync_channel::<Rendezvous<FromCoroutine>>(0);
        // Built on the resumer thread, consumed once on the coroutine
        // thread before anything is sent back — there is no concurrent
        // access, only a one-time handoff, so `Rendezvous` applies here
        // exactly as it does to the channel messages below.
        let body = Rendezvous::new(Body { globals, string_metatable, f });
        let handle = std::thread::Builder::new()
            .stack_size(16 * 1024 * 1024)
            .spawn(move || {
                let first = match to_co_rx.recv() {
                    Ok(msg) => match msg.into_inner() {
                        ToCoroutine::Resume(args) => args,
                    },
                    Err(_) => return,
                };
                CURRENT.with(|c| *c.borrow_mut() = Some((from_co_tx.clone(), to_co_rx)));
                let Body { globals, string_metatable, f } = body.into_inner();
                let mut interp = crate::interp::Interpreter::new();
                interp.globals = globals;
                interp.string_metatable = string_metatable;
                let result = interp.call_value(f, first, crate::interp::ast::Span::default());
                let result = result.map_err(|c| match c {
                    Control::Error(e) => e,
                    other => LuaError::msg(format!("{other:?}")),
                });
                let _ = from_co_tx.send(Rendezvous::new(FromCoroutine::Done(result.map_err(Control::Error))));
            })
            .expect("failed to spawn coroutine thread");
        Coroutine {
            status: Status::Suspended,
            to_co: Some(to_co_tx),
            from_co: Some(from_co_rx),
            handle: Some(handle),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// `coroutine.resume(co, ...)`. Never panics on a Lua-level error:
    /// errors raised inside the coroutine come back as `Err`, matching
    /// `resume`'s `false, err` return convention (the caller wraps this).
    pub fn resume(&mut self, args: Vec<Value>) -> Result<Vec<Value>, LuaError> {
        if self.status == Status::Dead {
            return Err(LuaError::msg("cannot resume dead coroutine"));
        }
        if self.status != Status::Suspended {
            return Err(LuaError::msg("cannot resume non-suspended coroutine"));
        }
        let Some(tx) = &self.to_co else {
            return Err(LuaError::msg("cannot resume dead coroutine"));
        };
        self.status = Status::Running;
        if tx.send(Rendezvous::new(ToCoroutine::Resume(args))).is_err() {
            self.status = Status::Dead;
            return Err(LuaError::msg("cannot resume dead coroutine"));
        }
        let Some(rx) = &self.from_co else {
            self.status = Status::Dead;
            return Err(LuaError::msg("cannot resume dead coroutine"));
        };
        match rx.recv() {
            Ok(msg) => match msg.into_inner() {
                FromCoroutine::Yield(vals) => {
                    self.status = Status::Suspended;
                    Ok(vals)
                }
                FromCoroutine::Done(result) => {
                    self.status = Status::Dead;
                    self.join();
                    result.map_err(|c| c.into_error())
                }
            },
            Err(_) => {
                self.status = Status::Dead;
                Err(LuaError::msg("coroutine thread terminated unexpectedly"))
            }
        }
    }

    /// `coroutine.close(co)` on a non-running coroutine: tears down the
    /// rendezvous channels and joins (or abandons, if already blocked
    /// past recovery) the body thread without resuming it further, then
    /// marks the coroutine permanently `Dead`. See `coroutine_lib.rs` for
    /// why this is the closest honest approximation of `__close`
    /// unwinding a tree-walking coroutine body is able to offer.
    pub fn close(&mut self) {
        self.status = Status::Dead;
        self.join();
    }

    fn join(&mut self) {
        self.to_co = None;
        self.from_co = None;
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }

    /// `coroutine.yield(...)`, called from inside the coroutine's own
    /// thread. Blocks until the next `resume` hands back control (and
    /// arguments).
    pub fn yield_now(args: Vec<Value>) -> LuaResult<Vec<Value>> {
        if NONYIELDABLE_DEPTH.with(|d| d.get() > 0) {
            return Err(Control::err("attempt to yield across a C-call boundary"));
        }
        CURRENT.with(|c| {
            let borrow = c.borrow();
            let Some((tx, rx)) = borrow.as_ref() else {
                return Err(Control::err("attempt to yield from outside a coroutine"));
            };
            if tx.send(Rendezvous::new(FromCoroutine::Yield(args))).is_err() {
                return Err(Control::err("coroutine resumer is gone"));
            }
            match rx.recv() {
                Ok(msg) => match msg.into_inner() {
                    ToCoroutine::Resume(args) => Ok(args),
                },
                Err(_) => Err(Control::err("coroutine resumer is gone")),
            }
        })
    }

    pub fn is_yieldable() -> bool {
        CURRENT.with(|c| c.borrow().is_some()) && NONYIELDABLE_DEPTH.with(|d| d.get() == 0)
    }
}

thread_local! {
    /// Depth of nested non-yieldable host-call boundaries (spec.md §4.6:
    /// "during a pcall the yieldable flag is cleared"). `pcall`/`xpcall`
    /// bump this around the protected call; `coroutine.yield` consults it
    /// alongside `CURRENT` to produce the "across a C-call boundary" error.
    static NONYIELDABLE_DEPTH: std::cell::Cell<u32> = const { std::cell::Cell::new(0) };
}

/// RAII guard raising the non-yieldable depth for the duration of a
/// protected call.
pub struct NonYieldableGuard;

impl NonYieldableGuard {
    pub fn enter() -> NonYieldableGuard {
        NONYIELDABLE_DEPTH.with(|d| d.set(d.get() + 1));
        NonYieldableGuard
    }
}

impl Drop for NonYieldableGuard {
    fn drop(&mut self) {
        NONYIELDABLE_DEPTH.with(|d| d.set(d.get() - 1));
    }
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        // Dropping the sender unblocks a suspended coroutine's `recv` with
        // an error, letting its thread unwind and exit rather than being
        // leaked as a permanently blocked thread.
        self.to_co = None;
        self.join();
    }
}
