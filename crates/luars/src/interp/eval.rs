//! Expression/statement evaluation, metamethod dispatch and the function
//! call protocol (spec.md §4.1/§4.4/§4.6/§4.8).

use super::ast::{Attrib, BinaryOperator, Block, Expr, FunctionBody, Span, Stat, UnaryOperator};
use super::{Interpreter, LuaClosure};
use crate::call_stack::Frame;
use crate::environment::Scope;
use crate::error::{Control, LuaError, LuaResult};
use crate::value::{Function, TableRef, Value};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::rc::Rc;

impl Interpreter {
    pub fn run_chunk(&mut self, chunk: &super::ast::Chunk) -> LuaResult<Vec<Value>> {
        self.run_chunk_in(&self.root_scope.clone(), chunk)
    }

    /// Runs `chunk`'s body in `scope` (a fresh child of it, so the chunk's
    /// own locals don't leak into the caller) — used both for top-level
    /// execution and for `load`'s custom-`_ENV` closures, which hand in a
    /// scope whose `_ENV` binding has already been overridden.
    pub fn run_chunk_in(&mut self, parent: &Rc<Scope>, chunk: &super::ast::Chunk) -> LuaResult<Vec<Value>> {
        let scope = Scope::child(parent);
        self.varargs_push(Vec::new());
        self.call_stack
            .push(Frame {
                name: Rc::from("main chunk"),
                source: chunk.source_name.clone(),
                current_line: 0,
                is_tail_call: false,
            })
            .map_err(Control::err)?;
        let r = self.exec_block(&scope, &chunk.body);
        self.call_stack.pop();
        self.varargs_pop();
        match r {
            Ok(()) => Ok(Vec::new()),
            Err(Control::Return(vals)) => Ok(vals),
            Err(other) => Err(other),
        }
    }

    // ---- varargs plumbing -------------------------------------------------

    fn varargs_push(&mut self, v: Vec<Value>) {
        self.varargs.push(v);
    }
    fn varargs_pop(&mut self) {
        self.varargs.pop();
    }
    fn varargs_current(&self) -> &[Value] {
        self.varargs.last().map(|v| v.as_slice()).unwrap_or(&[])
    }

    // ---- blocks / statements -----------------------------------------------

    pub fn exec_block(&mut self, scope: &Rc<Scope>, block: &Block) -> LuaResult<()> {
        let inner = Scope::child(scope);
        let mut close_list = crate::gc::CloseList::new();
        let result = self.exec_stats(&inner, &block.stats, &mut close_list);
        let close_err = self.run_close_list(&mut close_list);
        result?;
        close_err?;
        Ok(())
    }

    fn exec_stats(&mut self, scope: &Rc<Scope>, stats: &[Stat], closes: &mut crate::gc::CloseList) -> LuaResult<()> {
        let mut i = 0usize;
        while i < stats.len() {
            match self.exec_stat(scope, &stats[i], closes) {
                Ok(()) => i += 1,
                Err(Control::Goto(label)) => {
                    if let Some(pos) = stats.iter().position(|s| matches!(s, Stat::Label(l) if *l == label)) {
                        i = pos + 1;
                    } else {
                        return Err(Control::Goto(label));
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    fn run_close_list(&mut self, closes: &mut crate::gc::CloseList) -> LuaResult<()> {
        let mut first_err = None;
        for v in closes.take() {
            if v.is_nil() {
                continue;
            }
            if let Some(close_fn) = self.get_metamethod(&v, "__close") {
                if let Err(e) = self.call_value(close_fn, vec![v, Value::Nil], Span::default()) {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn exec_stat(&mut self, scope: &Rc<Scope>, stat: &Stat, closes: &mut crate::gc::CloseList) -> LuaResult<()> {
        match stat {
            Stat::Expr(e, span) => {
                self.call_stack.set_current_line(span.line);
                self.eval_expr_multi(scope, e)?;
                Ok(())
            }
            Stat::Local { names, exprs, span } => {
                self.call_stack.set_current_line(span.line);
                let values = self.eval_exprlist(scope, exprs, names.len())?;
                for (i, (name, attrib)) in names.iter().enumerate() {
                    let v = values.get(i).cloned().unwrap_or(Value::Nil);
                    if *attrib == Some(Attrib::Close) {
                        if !v.is_nil() && self.get_metamethod(&v, "__close").is_none() {
                            return Err(Control::err(format!(
                                "variable '{name}' got a non-closable value"
                            )));
                        }
                        closes.push(v.clone());
                    }
                    scope.declare(name.clone(), v);
                }
                Ok(())
            }
            Stat::Assign { targets, exprs, span } => {
                self.call_stack.set_current_line(span.line);
                let values = self.eval_exprlist(scope, exprs, targets.len())?;
                for (i, target) in targets.iter().enumerate() {
                    let v = values.get(i).cloned().unwrap_or(Value::Nil);
                    self.assign_to(scope, target, v)?;
                }
                Ok(())
            }
            Stat::Do(block) => self.exec_block(scope, block),
            Stat::While { cond, body, span } => {
                self.call_stack.set_current_line(span.line);
                loop {
                    if !self.eval_expr(scope, cond)?.is_truthy() {
                        break;
                    }
                    match self.exec_block(scope, body) {
                        Ok(()) => {}
                        Err(Control::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            Stat::Repeat { body, cond, span } => {
                self.call_stack.set_current_line(span.line);
                loop {
                    // repeat's until-condition can see the body's locals,
                    // so this cannot reuse exec_block wholesale.
                    let inner = Scope::child(scope);
                    let mut inner_closes = crate::gc::CloseList::new();
                    let body_result = self.exec_stats(&inner, &body.stats, &mut inner_closes);
                    if let Err(e) = body_result {
                        self.run_close_list(&mut inner_closes)?;
                        if matches!(e, Control::Break) {
                            break;
                        }
                        return Err(e);
                    }
                    let stop = self.eval_expr(&inner, cond)?.is_truthy();
                    self.run_close_list(&mut inner_closes)?;
                    if stop {
                        break;
                    }
                }
                Ok(())
            }
            Stat::If { arms, else_block, span } => {
                self.call_stack.set_current_line(span.line);
                for (cond, block) in arms {
                    if self.eval_expr(scope, cond)?.is_truthy() {
                        return self.exec_block(scope, block);
                    }
                }
                if let Some(block) = else_block {
                    return self.exec_block(scope, block);
                }
                Ok(())
            }
            Stat::NumericFor { var, start, stop, step, body, span } => {
                self.call_stack.set_current_line(span.line);
                self.exec_numeric_for(scope, var, start, stop, step.as_ref(), body)
            }
            Stat::GenericFor { names, exprs, body, span } => {
                self.call_stack.set_current_line(span.line);
                self.exec_generic_for(scope, names, exprs, body)
            }
            Stat::FunctionDecl { target, is_method, body, span } => {
                self.call_stack.set_current_line(span.line);
                let mut body = (**body).clone();
                if *is_method {
                    body.params.insert(0, Rc::from("self"));
                }
                let closure = Value::Function(Function::Lua(Rc::new(LuaClosure {
                    body: Rc::new(body),
                    captured: scope.clone(),
                    name: expr_name_hint(target),
                    source: self.call_stack.top().map(|f| f.source.clone()).unwrap_or_else(|| Rc::from("?")),
                    span: *span,
                })));
                self.assign_to(scope, target, closure)
            }
            Stat::LocalFunction { name, body, span } => {
                self.call_stack.set_current_line(span.line);
                // The local is declared before the closure is built so the
                // function can recurse through its own name.
                let cell = scope.declare(name.clone(), Value::Nil);
                let closure = Value::Function(Function::Lua(Rc::new(LuaClosure {
                    body: body.clone(),
                    captured: scope.clone(),
                    name: Some(name.to_string()),
                    source: self.call_stack.top().map(|f| f.source.clone()).unwrap_or_else(|| Rc::from("?")),
                    span: *span,
                })));
                *cell.borrow_mut() = closure;
                Ok(())
            }
            Stat::Return(exprs, span) => {
                self.call_stack.set_current_line(span.line);
                let values = self.eval_exprlist_all(scope, exprs)?;
                Err(Control::Return(values))
            }
            Stat::Break(_) => Err(Control::Break),
            Stat::Goto(label, _) => Err(Control::Goto(label.clone())),
            Stat::Label(_) => Ok(()),
        }
    }

    fn exec_numeric_for(
        &mut self,
        scope: &Rc<Scope>,
        var: &Rc<str>,
        start: &Expr,
        stop: &Expr,
        step: Option<&Expr>,
        body: &Block,
    ) -> LuaResult<()> {
        let start_v = self.eval_expr(scope, start)?;
        let stop_v = self.eval_expr(scope, stop)?;
        let step_v = match step {
            Some(e) => self.eval_expr(scope, e)?,
            None => Value::Int(1),
        };
        // Lua 5.4: if all three are integers the loop runs entirely in
        // integer arithmetic; otherwise everything is coerced to float.
        let all_int = matches!(start_v, Value::Int(_)) && matches!(stop_v, Value::Int(_)) && matches!(step_v, Value::Int(_));
        if all_int {
            let (mut i, stop_i, step_i) = (as_int(&start_v).unwrap(), as_int(&stop_v).unwrap(), as_int(&step_v).unwrap());
            if step_i == 0 {
                return Err(Control::err("'for' step is zero"));
            }
            loop {
                if step_i > 0 {
                    if i > stop_i {
                        break;
                    }
                } else if i < stop_i {
                    break;
                }
                let inner = Scope::child(scope);
                inner.declare(var.clone(), Value::Int(i));
                match self.exec_block(&inner, body) {
                    Ok(()) => {}
                    Err(Control::Break) => break,
                    Err(other) => return Err(other),
                }
                match i.checked_add(step_i) {
                    Some(n) => i = n,
                    None => break,
                }
            }
        } else {
            let mut i = to_number(&start_v).ok_or_else(|| Control::err("'for' initial value must be a number"))?;
            let stop_f = to_number(&stop_v).ok_or_else(|| Control::err("'for' limit must be a number"))?;
            let step_f = to_number(&step_v).ok_or_else(|| Control::err("'for' step must be a number"))?;
            if step_f == 0.0 {
                return Err(Control::err("'for' step is zero"));
            }
            loop {
                if step_f > 0.0 {
                    if i > stop_f {
                        break;
                    }
                } else if i < stop_f {
                    break;
                }
                let inner = Scope::child(scope);
                inner.declare(var.clone(), Value::Float(i));
                match self.exec_block(&inner, body) {
                    Ok(()) => {}
                    Err(Control::Break) => break,
                    Err(other) => return Err(other),
                }
                i += step_f;
            }
        }
        Ok(())
    }

    fn exec_generic_for(&mut self, scope: &Rc<Scope>, names: &[Rc<str>], exprs: &[Expr], body: &Block) -> LuaResult<()> {
        let mut ctrl = self.eval_exprlist(scope, exprs, 3)?;
        while ctrl.len() < 3 {
            ctrl.push(Value::Nil);
        }
        let iter_fn = ctrl[0].clone();
        let state = ctrl[1].clone();
        let mut control_var = ctrl[2].clone();
        loop {
            let results = self.call_value(iter_fn.clone(), vec![state.clone(), control_var.clone()], Span::default())?;
            let first = results.first().cloned().unwrap_or(Value::Nil);
            if first.is_nil() {
                break;
            }
            control_var = first.clone();
            let inner = Scope::child(scope);
            for (i, name) in names.iter().enumerate() {
                inner.declare(name.clone(), results.get(i).cloned().unwrap_or(Value::Nil));
            }
            match self.exec_block(&inner, body) {
                Ok(()) => {}
                Err(Control::Break) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    fn assign_to(&mut self, scope: &Rc<Scope>, target: &Expr, value: Value) -> LuaResult<()> {
        match target {
            Expr::Name(name) => scope.assign(name, value).map_err(Control::err),
            Expr::Index(obj, key, span) => {
                let obj_v = self.eval_expr(scope, obj)?;
                let key_v = self.eval_expr(scope, key)?;
                self.newindex(obj_v, key_v, value, *span)
            }
            other => Err(Control::err(format!("cannot assign to {other:?}"))),
        }
    }

    // ---- expressions --------------------------------------------------

    pub fn eval_expr(&mut self, scope: &Rc<Scope>, expr: &Expr) -> LuaResult<Value> {
        Ok(match expr {
            Expr::Nil => Value::Nil,
            Expr::True => Value::Bool(true),
            Expr::False => Value::Bool(false),
            Expr::Int(i) => Value::Int(*i),
            Expr::Float(f) => Value::Float(*f),
            Expr::Str(s) => Value::Str(crate::string_pool::LuaStr::from_vec(s.to_vec())),
            Expr::Vararg => self.varargs_current().first().cloned().unwrap_or(Value::Nil),
            Expr::Name(name) => scope.get(name).unwrap_or_else(|| self.global_get(name)),
            Expr::Paren(inner) => self.eval_expr(scope, inner)?,
            Expr::Index(obj, key, span) => {
                let obj_v = self.eval_expr(scope, obj)?;
                let key_v = self.eval_expr(scope, key)?;
                self.index(obj_v, key_v, *span)?
            }
            Expr::Call { .. } | Expr::MethodCall { .. } => self.eval_expr_multi(scope, expr)?.into_iter().next().unwrap_or(Value::Nil),
            Expr::Function(body) => Value::Function(Function::Lua(Rc::new(LuaClosure {
                body: body.clone(),
                captured: scope.clone(),
                name: body.name.as_ref().map(|s| s.to_string()),
                source: self.call_stack.top().map(|f| f.source.clone()).unwrap_or_else(|| Rc::from("?")),
                span: body.span,
            }))),
            Expr::Table { array_items, keyed_items, span } => self.eval_table_ctor(scope, array_items, keyed_items, *span)?,
            Expr::Unary(op, inner, span) => {
                let v = self.eval_expr(scope, inner)?;
                self.eval_unary(*op, v, *span)?
            }
            Expr::Binary(BinaryOperator::And, lhs, rhs, _) => {
                let l = self.eval_expr(scope, lhs)?;
                if !l.is_truthy() { l } else { self.eval_expr(scope, rhs)? }
            }
            Expr::Binary(BinaryOperator::Or, lhs, rhs, _) => {
                let l = self.eval_expr(scope, lhs)?;
                if l.is_truthy() { l } else { self.eval_expr(scope, rhs)? }
            }
            Expr::Binary(op, lhs, rhs, span) => {
                let l = self.eval_expr(scope, lhs)?;
                let r = self.eval_expr(scope, rhs)?;
                self.eval_binary(*op, l, r, *span)?
            }
        })
    }

    fn eval_table_ctor(&mut self, scope: &Rc<Scope>, array_items: &[Expr], keyed_items: &[(Expr, Expr)], span: Span) -> LuaResult<Value> {
        let table = Rc::new(std::cell::RefCell::new(crate::table::Table::new()));
        for (k, v) in keyed_items {
            let kv = self.eval_expr(scope, k)?;
            let vv = self.eval_expr(scope, v)?;
            table.borrow_mut().set(kv, vv).map_err(|e| self.runtime_error(e, span))?;
        }
        if let Some((last, rest)) = array_items.split_last() {
            for (i, item) in rest.iter().enumerate() {
                let v = self.eval_expr(scope, item)?;
                table.borrow_mut().set(Value::Int(i as i64 + 1), v).map_err(|e| self.runtime_error(e, span))?;
            }
            let tail = self.eval_expr_multi(scope, last)?;
            let base = rest.len() as i64;
            for (i, v) in tail.into_iter().enumerate() {
                table.borrow_mut().set(Value::Int(base + i as i64 + 1), v).map_err(|e| self.runtime_error(e, span))?;
            }
        }
        Ok(Value::Table(table))
    }

    /// Evaluates an expression in a context where it may yield more than
    /// one value (a call or `...`); every other expression yields exactly
    /// one.
    fn eval_expr_multi(&mut self, scope: &Rc<Scope>, expr: &Expr) -> LuaResult<Vec<Value>> {
        match expr {
            Expr::Vararg => Ok(self.varargs_current().to_vec()),
            Expr::Call { func, args, span } => {
                let f = self.eval_expr(scope, func)?;
                let argv = self.eval_exprlist_all(scope, args)?;
                self.call_value(f, argv, *span)
            }
            Expr::MethodCall { object, method, args, span } => {
                let obj = self.eval_expr(scope, object)?;
                let f = self.index(obj.clone(), Value::from_str(method), *span)?;
                let mut argv = vec![obj];
                argv.extend(self.eval_exprlist_all(scope, args)?);
                self.call_value(f, argv, *span)
            }
            other => Ok(vec![self.eval_expr(scope, other)?]),
        }
    }

    /// Evaluates an expression list where only the final element may
    /// expand to multiple values, padding/truncating to `want` results
    /// (used for `local`/assignment targets, for-loop control values).
    fn eval_exprlist(&mut self, scope: &Rc<Scope>, exprs: &[Expr], want: usize) -> LuaResult<Vec<Value>> {
        let mut values = self.eval_exprlist_all(scope, exprs)?;
        values.resize(want.max(values.len().min(want)), Value::Nil);
        if values.len() < want {
            values.resize(want, Value::Nil);
        }
        Ok(values)
    }

    /// Evaluates an expression list with the last element fully expanded
    /// (used for call arguments, `return`, and table array constructors).
    fn eval_exprlist_all(&mut self, scope: &Rc<Scope>, exprs: &[Expr]) -> LuaResult<Vec<Value>> {
        let Some((last, rest)) = exprs.split_last() else {
            return Ok(Vec::new());
        };
        let mut values = Vec::with_capacity(exprs.len());
        for e in rest {
            values.push(self.eval_expr(scope, e)?);
        }
        values.extend(self.eval_expr_multi(scope, last)?);
        Ok(values)
    }

    fn global_get(&self, name: &str) -> Value {
        self.globals.borrow().get(&Value::from_str(name))
    }

    // ---- calls ----------------------------------------------------------

    pub fn call_value(&mut self, f: Value, args: Vec<Value>, span: Span) -> LuaResult<Vec<Value>> {
        self.depth += 1;
        if self.depth > crate::call_stack::MAX_CALL_DEPTH {
            self.depth -= 1;
            return Err(Control::err("stack overflow"));
        }
        let result = self.call_value_inner(f, args, span);
        self.depth -= 1;
        result
    }

    fn call_value_inner(&mut self, f: Value, args: Vec<Value>, span: Span) -> LuaResult<Vec<Value>> {
        match &f {
            Value::Function(Function::Host(h)) => {
                self.call_stack.push(Frame {
                    name: Rc::from(h.name),
                    source: Rc::from("[C]"),
                    current_line: 0,
                    is_tail_call: false,
                })
                .map_err(Control::err)?;
                let r = (h.f)(self, args);
                self.call_stack.pop();
                r
            }
            Value::Function(Function::Lua(closure)) => self.call_lua_closure(closure.clone(), args),
            _ => {
                if let Some(call_mm) = self.get_metamethod(&f, "__call") {
                    let mut new_args = vec![f];
                    new_args.extend(args);
                    self.call_value(call_mm, new_args, span)
                } else {
                    Err(self.runtime_error(format!("attempt to call a {} value", f.type_name()), span))
                }
            }
        }
    }

    fn call_lua_closure(&mut self, closure: Rc<LuaClosure>, args: Vec<Value>) -> LuaResult<Vec<Value>> {
        let call_scope = Scope::child(&closure.captured);
        let nparams = closure.body.params.len();
        for (i, p) in closure.body.params.iter().enumerate() {
            call_scope.declare(p.clone(), args.get(i).cloned().unwrap_or(Value::Nil));
        }
        let extra = if closure.body.is_vararg && args.len() > nparams {
            args[nparams..].to_vec()
        } else {
            Vec::new()
        };
        self.call_stack
            .push(Frame {
                name: Rc::from(closure.name.clone().unwrap_or_else(|| "?".to_string())),
                source: closure.source.clone(),
                current_line: closure.span.line,
                is_tail_call: false,
            })
            .map_err(Control::err)?;
        self.varargs_push(extra);
        let result = self.exec_block(&call_scope, &closure.body.block);
        self.varargs_pop();
        self.call_stack.pop();
        match result {
            Ok(()) => Ok(Vec::new()),
            Err(Control::Return(vals)) => Ok(vals),
            Err(other) => Err(other),
        }
    }

    // ---- metatables -------------------------------------------------------

    pub fn metatable_of(&self, v: &Value) -> Option<TableRef> {
        match v {
            Value::Table(t) => t.borrow().metatable.clone(),
            Value::Str(_) => self.string_metatable.clone(),
            Value::UserData(u) => u.borrow().metatable.clone(),
            _ => None,
        }
    }

    pub fn get_metamethod(&self, v: &Value, name: &str) -> Option<Value> {
        let mt = self.metatable_of(v)?;
        let r = mt.borrow().get(&Value::from_str(name));
        if r.is_nil() { None } else { Some(r) }
    }

    fn index(&mut self, obj: Value, key: Value, span: Span) -> LuaResult<Value> {
        if let Value::Table(t) = &obj {
            let raw = t.borrow().get(&key);
            if !raw.is_nil() {
                return Ok(raw);
            }
            match self.get_metamethod(&obj, "__index") {
                Some(Value::Function(_)) => return Ok(self.call_value(self.get_metamethod(&obj, "__index").unwrap(), vec![obj, key], span)?.into_iter().next().unwrap_or(Value::Nil)),
                Some(next) => return self.index(next, key, span),
                None => return Ok(Value::Nil),
            }
        }
        if let Some(mm) = self.get_metamethod(&obj, "__index") {
            return match mm {
                Value::Function(_) => Ok(self.call_value(mm, vec![obj, key], span)?.into_iter().next().unwrap_or(Value::Nil)),
                other => self.index(other, key, span),
            };
        }
        Err(self.runtime_error(format!("attempt to index a {} value", obj.type_name()), span))
    }

    fn newindex(&mut self, obj: Value, key: Value, value: Value, span: Span) -> LuaResult<()> {
        if let Value::Table(t) = &obj {
            let has_raw = !t.borrow().get(&key).is_nil();
            if has_raw {
                t.borrow_mut().set(key, value).map_err(|e| self.runtime_error(e, span))?;
                return Ok(());
            }
            match self.get_metamethod(&obj, "__newindex") {
                Some(Value::Function(_)) => {
                    let mm = self.get_metamethod(&obj, "__newindex").unwrap();
                    self.call_value(mm, vec![obj, key, value], span)?;
                    Ok(())
                }
                Some(next) => self.newindex(next, key, value, span),
                None => {
                    t.borrow_mut().set(key, value).map_err(|e| self.runtime_error(e, span))?;
                    Ok(())
                }
            }
        } else if let Some(mm) = self.get_metamethod(&obj, "__newindex") {
            match mm {
                Value::Function(_) => {
                    self.call_value(mm, vec![obj, key, value], span)?;
                    Ok(())
                }
                other => self.newindex(other, key, value, span),
            }
        } else {
            Err(self.runtime_error(format!("attempt to index a {} value", obj.type_name()), span))
        }
    }

    pub fn tostring(&mut self, v: &Value) -> LuaResult<crate::string_pool::LuaStr> {
        if let Some(mm) = self.get_metamethod(v, "__tostring") {
            let r = self.call_value(mm, vec![v.clone()], Span::default())?;
            return match r.into_iter().next() {
                Some(Value::Str(s)) => Ok(s),
                _ => Err(Control::err("'__tostring' must return a string")),
            };
        }
        if let Some(mt) = self.metatable_of(v) {
            let name = mt.borrow().get(&Value::from_str("__name"));
            if let Value::Str(n) = name {
                if let Value::Table(t) = v {
                    return Ok(crate::string_pool::LuaStr::from_vec(format!("{}: {:p}", n.as_lossy_str(), Rc::as_ptr(t)).into_bytes()));
                }
            }
        }
        Ok(crate::string_pool::LuaStr::from_vec(format!("{v:?}").into_bytes()))
    }

    pub fn len(&mut self, v: Value, span: Span) -> LuaResult<Value> {
        match &v {
            Value::Str(s) => Ok(Value::Int(s.len() as i64)),
            Value::Table(t) => {
                if let Some(mm) = self.get_metamethod(&v, "__len") {
                    return Ok(self.call_value(mm, vec![v], span)?.into_iter().next().unwrap_or(Value::Nil));
                }
                Ok(Value::Int(t.borrow().length()))
            }
            _ => {
                if let Some(mm) = self.get_metamethod(&v, "__len") {
                    return Ok(self.call_value(mm, vec![v], span)?.into_iter().next().unwrap_or(Value::Nil));
                }
                Err(self.runtime_error(format!("attempt to get length of a {} value", v.type_name()), span))
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOperator, v: Value, span: Span) -> LuaResult<Value> {
        match op {
            UnaryOperator::Not => Ok(Value::Bool(!v.is_truthy())),
            UnaryOperator::Len => self.len(v, span),
            UnaryOperator::Neg => match coerce_number(&v) {
                Some(Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
                Some(Value::Float(f)) => Ok(Value::Float(-f)),
                Some(Value::BigInt(b)) => Ok(normalize_bigint(-b.as_ref().clone())),
                _ => self.arith_metamethod("__unm", v.clone(), v, span),
            },
            UnaryOperator::BNot => match as_int_strict(&v) {
                Some(i) => Ok(Value::Int(!i)),
                None if coerce_number(&v).is_some() => Err(self.runtime_error("number has no integer representation", span)),
                None => self.arith_metamethod("__bnot", v.clone(), v, span),
            },
        }
    }

    fn eval_binary(&mut self, op: BinaryOperator, l: Value, r: Value, span: Span) -> LuaResult<Value> {
        use BinaryOperator::*;
        match op {
            Add | Sub | Mul | Mod | IDiv | Pow | Div => self.arith(op, l, r, span),
            BAnd | BOr | BXor | Shl | Shr => self.bitwise(op, l, r, span),
            Concat => self.concat(l, r, span),
            Eq => Ok(Value::Bool(self.values_equal(&l, &r, span)?)),
            Ne => Ok(Value::Bool(!self.values_equal(&l, &r, span)?)),
            Lt => Ok(Value::Bool(self.less_than(&l, &r, span)?)),
            Gt => Ok(Value::Bool(self.less_than(&r, &l, span)?)),
            Le => Ok(Value::Bool(self.less_equal(&l, &r, span)?)),
            Ge => Ok(Value::Bool(self.less_equal(&r, &l, span)?)),
            And | Or => unreachable!("short-circuit operators handled in eval_expr"),
        }
    }

    fn arith(&mut self, op: BinaryOperator, l: Value, r: Value, span: Span) -> LuaResult<Value> {
        use BinaryOperator::*;
        let ln = coerce_number(&l);
        let rn = coerce_number(&r);
        let (Some(ln), Some(rn)) = (ln, rn) else {
            let mm = match op {
                Add => "__add",
                Sub => "__sub",
                Mul => "__mul",
                Div => "__div",
                Mod => "__mod",
                IDiv => "__idiv",
                Pow => "__pow",
                _ => unreachable!(),
            };
            return self.arith_metamethod(mm, l, r, span);
        };
        // Division and exponentiation always operate in floats, matching
        // Lua 5.4's "/" and "^" even when both operands are integers.
        if matches!(op, Div | Pow) {
            let a = as_f64(&ln);
            let b = as_f64(&rn);
            return Ok(Value::Float(match op {
                Div => a / b,
                Pow => a.powf(b),
                _ => unreachable!(),
            }));
        }
        // A float operand always contaminates the result to float, same as
        // real Lua — this takes priority over the BigInt branch below since
        // "exact" arithmetic is meaningless once a float is involved.
        if matches!(ln, Value::Float(_)) || matches!(rn, Value::Float(_)) {
            let a = as_f64(&ln);
            let b = as_f64(&rn);
            return Ok(Value::Float(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Mod => a - (a / b).floor() * b,
                IDiv => (a / b).floor(),
                _ => unreachable!(),
            }));
        }
        // spec.md §3: "except when inputs include a BigInt, in which case
        // the operation is exact" — any BigInt operand (from an integer
        // literal too wide for i64, or a prior overflowing op) routes
        // through arbitrary-precision arithmetic instead of wrapping i64.
        if matches!(ln, Value::BigInt(_)) || matches!(rn, Value::BigInt(_)) {
            return self.arith_bigint(op, &ln, &rn, span);
        }
        if let (Value::Int(a), Value::Int(b)) = (&ln, &rn) {
            let a = *a;
            let b = *b;
            return match op {
                Add => Ok(Value::Int(a.wrapping_add(b))),
                Sub => Ok(Value::Int(a.wrapping_sub(b))),
                Mul => Ok(Value::Int(a.wrapping_mul(b))),
                Mod => {
                    if b == 0 {
                        Err(self.runtime_error("attempt to perform 'n%0'", span))
                    } else {
                        Ok(Value::Int(lua_imod(a, b)))
                    }
                }
                IDiv => {
                    if b == 0 {
                        Err(self.runtime_error("attempt to perform 'n//0'", span))
                    } else {
                        Ok(Value::Int(lua_ifloordiv(a, b)))
                    }
                }
                _ => unreachable!(),
            };
        }
        unreachable!("coerce_number only ever produces Int, Float, or BigInt")
    }

    /// `+ - * // %` when at least one operand is a [`Value::BigInt`]
    /// (spec.md §3). `/`/`^` never reach here — `arith` already routed
    /// those through `as_f64` before this is called.
    fn arith_bigint(&self, op: BinaryOperator, ln: &Value, rn: &Value, span: Span) -> LuaResult<Value> {
        use BinaryOperator::*;
        let a = to_bigint(ln);
        let b = to_bigint(rn);
        let result = match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Mod => {
                if b == BigInt::from(0) {
                    return Err(self.runtime_error("attempt to perform 'n%0'", span));
                }
                // Lua's `%` takes the sign of the divisor, matching the
                // floored-division residual `lua_imod`'s i64 fast path
                // already computes for in-range operands.
                let r = &a % &b;
                let zero = BigInt::from(0);
                if r != zero && (r < zero) != (b < zero) { r + b } else { r }
            }
            IDiv => {
                if b == BigInt::from(0) {
                    return Err(self.runtime_error("attempt to perform 'n//0'", span));
                }
                let (q, r) = (&a / &b, &a % &b);
                let zero = BigInt::from(0);
                if r != zero && (r < zero) != (b < zero) { q - BigInt::from(1) } else { q }
            }
            _ => unreachable!("arith_bigint only handles +-*//%"),
        };
        Ok(normalize_bigint(result))
    }

    fn bitwise(&mut self, op: BinaryOperator, l: Value, r: Value, span: Span) -> LuaResult<Value> {
        use BinaryOperator::*;
        let (Some(a), Some(b)) = (as_int_strict(&l), as_int_strict(&r)) else {
            // A numeric-but-non-integer-representable operand (a float
            // with a fractional part, or out of i64 range) is a hard
            // error distinct from "wrong type" — spec.md §4.1 requires
            // `number has no integer representation` here rather than
            // falling through to the generic arithmetic-metamethod path.
            if coerce_number(&l).is_some() && as_int_strict(&l).is_none() {
                return Err(self.runtime_error("number has no integer representation", span));
            }
            if coerce_number(&r).is_some() && as_int_strict(&r).is_none() {
                return Err(self.runtime_error("number has no integer representation", span));
            }
            let mm = match op {
                BAnd => "__band",
                BOr => "__bor",
                BXor => "__bxor",
                Shl => "__shl",
                Shr => "__shr",
                _ => unreachable!(),
            };
            return self.arith_metamethod(mm, l, r, span);
        };
        Ok(Value::Int(match op {
            BAnd => a & b,
            BOr => a | b,
            BXor => a ^ b,
            Shl => shift_left(a, b),
            Shr => shift_left(a, -b),
            _ => unreachable!(),
        }))
    }

    fn arith_metamethod(&mut self, name: &str, l: Value, r: Value, span: Span) -> LuaResult<Value> {
        if let Some(mm) = self.get_metamethod(&l, name).or_else(|| self.get_metamethod(&r, name)) {
            return Ok(self.call_value(mm, vec![l, r], span)?.into_iter().next().unwrap_or(Value::Nil));
        }
        let bad = if coerce_number(&l).is_none() { &l } else { &r };
        Err(self.runtime_error(format!("attempt to perform arithmetic on a {} value", bad.type_name()), span))
    }

    fn concat(&mut self, l: Value, r: Value, span: Span) -> LuaResult<Value> {
        if let (Some(a), Some(b)) = (concat_bytes(&l), concat_bytes(&r)) {
            let mut out = a;
            out.extend(b);
            return Ok(Value::Str(crate::string_pool::LuaStr::from_vec(out)));
        }
        if let Some(mm) = self.get_metamethod(&l, "__concat").or_else(|| self.get_metamethod(&r, "__concat")) {
            return Ok(self.call_value(mm, vec![l, r], span)?.into_iter().next().unwrap_or(Value::Nil));
        }
        let bad = if concat_bytes(&l).is_none() { &l } else { &r };
        Err(self.runtime_error(format!("attempt to concatenate a {} value", bad.type_name()), span))
    }

    pub fn values_equal(&mut self, l: &Value, r: &Value, span: Span) -> LuaResult<bool> {
        if l.raw_equal(r) {
            return Ok(true);
        }
        if matches!((l, r), (Value::Table(_), Value::Table(_))) | matches!((l, r), (Value::UserData(_), Value::UserData(_))) {
            if let Some(mm) = self.get_metamethod(l, "__eq").or_else(|| self.get_metamethod(r, "__eq")) {
                let result = self.call_value(mm, vec![l.clone(), r.clone()], span)?;
                return Ok(result.into_iter().next().unwrap_or(Value::Nil).is_truthy());
            }
        }
        Ok(false)
    }

    pub fn less_than(&mut self, l: &Value, r: &Value, span: Span) -> LuaResult<bool> {
        match (numeric_cmp(l, r), (l, r)) {
            (Some(ord), _) => Ok(ord == std::cmp::Ordering::Less),
            (None, (Value::Str(a), Value::Str(b))) => Ok(a.as_bytes() < b.as_bytes()),
            _ => {
                if let Some(mm) = self.get_metamethod(l, "__lt").or_else(|| self.get_metamethod(r, "__lt")) {
                    let result = self.call_value(mm, vec![l.clone(), r.clone()], span)?;
                    Ok(result.into_iter().next().unwrap_or(Value::Nil).is_truthy())
                } else {
                    Err(self.runtime_error(format!("attempt to compare {} with {}", l.type_name(), r.type_name()), span))
                }
            }
        }
    }

    fn less_equal(&mut self, l: &Value, r: &Value, span: Span) -> LuaResult<bool> {
        match (numeric_cmp(l, r), (l, r)) {
            (Some(ord), _) => Ok(ord != std::cmp::Ordering::Greater),
            (None, (Value::Str(a), Value::Str(b))) => Ok(a.as_bytes() <= b.as_bytes()),
            _ => {
                if let Some(mm) = self.get_metamethod(l, "__le").or_else(|| self.get_metamethod(r, "__le")) {
                    let result = self.call_value(mm, vec![l.clone(), r.clone()], span)?;
                    Ok(result.into_iter().next().unwrap_or(Value::Nil).is_truthy())
                } else {
                    Err(self.runtime_error(format!("attempt to compare {} with {}", l.type_name(), r.type_name()), span))
                }
            }
        }
    }

    pub fn runtime_error(&self, message: impl Into<String>, span: Span) -> Control {
        let source = self.call_stack.top().map(|f| f.source.clone()).unwrap_or_else(|| Rc::from("?"));
        let line = if span.line != 0 { span.line } else { self.call_stack.top().map(|f| f.current_line).unwrap_or(0) };
        let err = LuaError::msg(format!("{source}:{line}: {}", message.into())).with_traceback(self.call_stack.traceback(None));
        Control::Error(err)
    }

    pub fn index_pub(&mut self, obj: Value, key: Value) -> LuaResult<Value> {
        self.index(obj, key, Span::default())
    }

    pub fn newindex_pub(&mut self, obj: Value, key: Value, value: Value) -> LuaResult<()> {
        self.newindex(obj, key, value, Span::default())
    }
}

fn expr_name_hint(e: &Expr) -> Option<String> {
    match e {
        Expr::Name(n) => Some(n.to_string()),
        Expr::Index(_, key, _) => match key.as_ref() {
            Expr::Str(s) => Some(String::from_utf8_lossy(s).into_owned()),
            _ => None,
        },
        _ => None,
    }
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}

/// Strict integer coercion used by bitwise ops: a float with a
/// fractional part is a hard error in real Lua, not silently truncated.
fn as_int_strict(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
        Value::BigInt(b) => b.to_i64(),
        Value::Str(s) => s.as_str().ok().and_then(|s| crate::numeric::parse_number(s.trim())).and_then(|v| as_int_strict(&v)),
        _ => None,
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::BigInt(b) => b.to_f64().unwrap_or(f64::INFINITY),
        _ => f64::NAN,
    }
}

/// Implicit string->number coercion for arithmetic (spec.md §3's numeric
/// tower: strings coerce the way `tonumber` would).
fn coerce_number(v: &Value) -> Option<Value> {
    match v {
        Value::Int(_) | Value::Float(_) | Value::BigInt(_) => Some(v.clone()),
        Value::Str(s) => s.as_str().ok().and_then(|s| crate::numeric::parse_number(s.trim())),
        _ => None,
    }
}

/// Widens an already-numeric [`Value`] (Int or BigInt — never called with a
/// Float, `arith` routes those through the float path first) to `BigInt`.
fn to_bigint(v: &Value) -> BigInt {
    match v {
        Value::Int(i) => BigInt::from(*i),
        Value::BigInt(b) => b.as_ref().clone(),
        other => unreachable!("to_bigint called with non-integer value {other:?}"),
    }
}

/// Narrows a `BigInt` arithmetic result back to `Value::Int` when it fits,
/// so results that no longer overflow i64 (e.g. a BigInt minus itself) don't
/// stay needlessly boxed.
fn normalize_bigint(n: BigInt) -> Value {
    match n.to_i64() {
        Some(i) => Value::Int(i),
        None => Value::BigInt(Rc::new(n)),
    }
}

fn to_number(v: &Value) -> Option<f64> {
    coerce_number(v).map(|n| as_f64(&n))
}

/// Byte form of an operand to `..` (spec.md §4.1/§4.3). Integers go through
/// `itoa` rather than `i64::to_string`, matching the teacher's own
/// concatenation fast path (`lua_vm/dispatcher/upvalue_instructions.rs`),
/// which reaches for the same crate to avoid the intermediate `String`'s
/// formatting machinery on this hot path.
fn concat_bytes(v: &Value) -> Option<Vec<u8>> {
    match v {
        Value::Str(s) => Some(s.as_bytes().to_vec()),
        Value::Int(i) => {
            let mut buf = itoa::Buffer::new();
            Some(buf.format(*i).as_bytes().to_vec())
        }
        Value::Float(f) => Some(crate::value::float_to_display(*f).into_bytes()),
        Value::BigInt(b) => Some(b.to_string().into_bytes()),
        _ => None,
    }
}

fn numeric_cmp(l: &Value, r: &Value) -> Option<std::cmp::Ordering> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::BigInt(a), Value::BigInt(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (Value::BigInt(a), Value::Int(b)) => Some(a.as_ref().cmp(&BigInt::from(*b))),
        (Value::Int(a), Value::BigInt(b)) => Some(BigInt::from(*a).cmp(b.as_ref())),
        (Value::BigInt(a), Value::Float(b)) => a.to_f64().and_then(|af| af.partial_cmp(b)),
        (Value::Float(a), Value::BigInt(b)) => b.to_f64().and_then(|bf| a.partial_cmp(&bf)),
        _ => None,
    }
}

/// Floor division, rounding toward negative infinity (Lua 5.4 `//` on
/// integers, distinct from Rust's truncating `/`).
fn lua_ifloordiv(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q }
}

/// `a % b` with the sign of `b` (Lua 5.4 `%` on integers), satisfying
/// `a == lua_ifloordiv(a, b) * b + lua_imod(a, b)`.
fn lua_imod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) { r + b } else { r }
}

fn shift_left(a: i64, b: i64) -> i64 {
    if b <= -64 || b >= 64 {
        0
    } else if b >= 0 {
        ((a as u64) << b) as i64
    } else {
        ((a as u64) >> (-b)) as i64
    }
}
