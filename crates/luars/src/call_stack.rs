//! Call stack bookkeeping for tracebacks and `debug.getinfo` (spec.md
//! §4.6). The teacher's register-VM call stack (`lua_vm/lua_context.rs`)
//! tracked a base register and program counter per frame; a tree walker
//! has no register window, so each frame here instead records what
//! `debug.traceback` actually needs to print: the callee's name, its
//! source location, and the current line being executed.

use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Frame {
    pub name: Rc<str>,
    pub source: Rc<str>,
    pub current_line: u32,
    pub is_tail_call: bool,
}

/// Lua caps recursion to guard against stack overflow in the host
/// process; this mirrors `LUAI_MAXCCALLS`.
pub const MAX_CALL_DEPTH: usize = 200;

#[derive(Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    pub fn new() -> CallStack {
        CallStack::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), &'static str> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err("stack overflow");
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn set_current_line(&mut self, line: u32) {
        if let Some(top) = self.frames.last_mut() {
            top.current_line = line;
        }
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Renders a traceback in the style `lua.c` prints for uncaught
    /// errors: most recent call first, `\t` indented.
    pub fn traceback(&self, message: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(m) = message {
            out.push_str(m);
            out.push('\n');
        }
        out.push_str("stack traceback:");
        for frame in self.frames.iter().rev() {
            out.push_str(&format!("\n\t{}:{}: in {}", frame.source, frame.current_line, frame.name));
            if frame.is_tail_call {
                out.push_str("\n\t(...tail calls...)");
            }
        }
        out
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}
