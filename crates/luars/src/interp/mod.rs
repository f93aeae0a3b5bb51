//! The tree-walking evaluator (spec.md §4, all subsections): statement
//! execution, expression evaluation, metatable dispatch, and the function
//! call protocol, replacing the teacher's bytecode compiler + register VM
//! (`compiler/`, `lua_vm/`) with a direct walk of the `ast` module above.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

use crate::call_stack::CallStack;
use crate::environment::Scope;
use crate::value::TableRef;
use ast::{FunctionBody, Span};
use std::rc::Rc;

/// A Lua closure: a function body plus the scope it was defined in. Two
/// closures created from the same `function() ... end` literal at
/// different times are distinct `Rc`s (and thus distinct by `==`) even
/// though they share the same `FunctionBody`, matching Lua's rule that
/// `function` expressions produce a fresh closure value on each
/// evaluation.
pub struct LuaClosure {
    pub body: Rc<FunctionBody>,
    pub captured: Rc<Scope>,
    pub name: Option<String>,
    pub source: Rc<str>,
    pub span: Span,
}

/// One Lua execution context: the global table, the root lexical scope,
/// and the call stack used for tracebacks and recursion-depth limiting.
/// `coroutine.create` spins up an entirely new `Interpreter` sharing the
/// same globals (see `coroutine.rs`), the way Lua's `lua_newthread`
/// shares one `global_State` across every `lua_State` in a VM instance.
pub struct Interpreter {
    pub globals: TableRef,
    pub root_scope: Rc<Scope>,
    pub call_stack: CallStack,
    pub string_metatable: Option<TableRef>,
    pub depth: usize,
    pub(crate) varargs: Vec<Vec<crate::value::Value>>,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        let globals = Rc::new(std::cell::RefCell::new(crate::table::Table::new()));
        let root_scope = Scope::root();
        root_scope.declare(Rc::from("_ENV"), crate::value::Value::Table(globals.clone()));
        Interpreter {
            globals,
            root_scope,
            call_stack: CallStack::new(),
            string_metatable: None,
            depth: 0,
            varargs: Vec::new(),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}
