//! The `math` library (spec.md §4.3), grounded on the teacher's
//! `stdlib/math.rs` function set. `math.random`/`randomseed` use the
//! `rand` crate's `StdRng` rather than the teacher's bespoke
//! xoshiro256** (SPEC_FULL.md §2: ambient-stack alignment favors the
//! pack's PRNG crate over a hand-rolled one once the bytecode VM's
//! deterministic-trace requirement that motivated it is gone).

use crate::error::{Control, LuaResult};
use crate::interp::Interpreter;
use crate::value::{TableRef, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

pub fn install(interp: &mut Interpreter) -> TableRef {
    let t = super::new_lib(interp, "math");
    t.borrow_mut().set(Value::from_str("pi"), Value::Float(std::f64::consts::PI)).unwrap();
    t.borrow_mut().set(Value::from_str("huge"), Value::Float(f64::INFINITY)).unwrap();
    t.borrow_mut().set(Value::from_str("maxinteger"), Value::Int(i64::MAX)).unwrap();
    t.borrow_mut().set(Value::from_str("mininteger"), Value::Int(i64::MIN)).unwrap();

    super::register(&t, "abs", |_, a| num_fn(&a, "abs", |n| n.abs(), |n| n.wrapping_abs()));
    super::register(&t, "ceil", |_, a| Ok(vec![Value::Int(super::check_number(&a, 0, "ceil")?.ceil() as i64)]));
    super::register(&t, "floor", |_, a| Ok(vec![Value::Int(super::check_number(&a, 0, "floor")?.floor() as i64)]));
    super::register(&t, "sqrt", |_, a| float_fn(&a, "sqrt", f64::sqrt));
    super::register(&t, "sin", |_, a| float_fn(&a, "sin", f64::sin));
    super::register(&t, "cos", |_, a| float_fn(&a, "cos", f64::cos));
    super::register(&t, "tan", |_, a| float_fn(&a, "tan", f64::tan));
    super::register(&t, "asin", |_, a| float_fn(&a, "asin", f64::asin));
    super::register(&t, "acos", |_, a| float_fn(&a, "acos", f64::acos));
    super::register(&t, "atan", |_, a| {
        let y = super::check_number(&a, 0, "atan")?;
        let x = super::opt_number(&a, 1, "atan", 1.0)?;
        Ok(vec![Value::Float(y.atan2(x))])
    });
    super::register(&t, "exp", |_, a| float_fn(&a, "exp", f64::exp));
    super::register(&t, "log", |_, a| {
        let x = super::check_number(&a, 0, "log")?;
        match super::arg(&a, 1) {
            Value::Nil => Ok(vec![Value::Float(x.ln())]),
            _ => {
                let base = super::check_number(&a, 1, "log")?;
                Ok(vec![Value::Float(x.log(base))])
            }
        }
    });
    super::register(&t, "fmod", |_, a| {
        let x = super::check_number(&a, 0, "fmod")?;
        let y = super::check_number(&a, 1, "fmod")?;
        Ok(vec![Value::Float(x % y)])
    });
    super::register(&t, "modf", |_, a| {
        let x = super::check_number(&a, 0, "modf")?;
        let int_part = if x >= 0.0 { x.floor() } else { x.ceil() };
        Ok(vec![Value::Float(int_part), Value::Float(x - int_part)])
    });
    super::register(&t, "max", |_, a| reduce(&a, "max", |acc, n| if n > acc { n } else { acc }));
    super::register(&t, "min", |_, a| reduce(&a, "min", |acc, n| if n < acc { n } else { acc }));
    super::register(&t, "tointeger", |_, a| {
        Ok(vec![crate::numeric::to_integer(&super::arg(&a, 0)).map(Value::Int).unwrap_or(Value::Nil)])
    });
    super::register(&t, "type", |_, a| {
        Ok(vec![match super::arg(&a, 0) {
            Value::Int(_) | Value::BigInt(_) => Value::from_str("integer"),
            Value::Float(_) => Value::from_str("float"),
            _ => Value::Nil,
        }])
    });
    super::register(&t, "ult", |_, a| {
        let x = super::check_int(&a, 0, "ult")? as u64;
        let y = super::check_int(&a, 1, "ult")? as u64;
        Ok(vec![Value::Bool(x < y)])
    });
    super::register(&t, "random", lua_random);
    super::register(&t, "randomseed", lua_randomseed);
    t
}

fn float_fn(args: &[Value], fname: &str, f: fn(f64) -> f64) -> LuaResult<Vec<Value>> {
    Ok(vec![Value::Float(f(super::check_number(args, 0, fname)?))])
}

fn num_fn(args: &[Value], fname: &str, ffloat: fn(f64) -> f64, fint: fn(i64) -> i64) -> LuaResult<Vec<Value>> {
    Ok(vec![match super::arg(args, 0) {
        Value::Int(n) => Value::Int(fint(n)),
        other => Value::Float(ffloat(super::check_number(std::slice::from_ref(&other), 0, fname)?)),
    }])
}

fn reduce(args: &[Value], fname: &str, pick: fn(f64, f64) -> f64) -> LuaResult<Vec<Value>> {
    if args.is_empty() {
        return Err(super::arg_err(0, fname, "value expected"));
    }
    let mut best = args[0].clone();
    let mut best_n = super::check_number(args, 0, fname)?;
    for i in 1..args.len() {
        let n = super::check_number(args, i, fname)?;
        if pick(best_n, n) != best_n {
            best_n = n;
            best = args[i].clone();
        }
    }
    Ok(vec![best])
}

fn lua_random(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    match args.len() {
        0 => Ok(vec![Value::Float(RNG.with(|r| r.borrow_mut().gen::<f64>()))]),
        1 => {
            let m = super::check_int(&args, 0, "random")?;
            if m == 0 {
                return Ok(vec![Value::Int(RNG.with(|r| r.borrow_mut().gen::<i64>()))]);
            }
            if m < 1 {
                return Err(super::arg_err(0, "random", "interval is empty"));
            }
            Ok(vec![Value::Int(RNG.with(|r| r.borrow_mut().gen_range(1..=m)))])
        }
        _ => {
            let lo = super::check_int(&args, 0, "random")?;
            let hi = super::check_int(&args, 1, "random")?;
            if lo > hi {
                return Err(Control::err("bad argument #2 to 'random' (interval is empty)"));
            }
            Ok(vec![Value::Int(RNG.with(|r| r.borrow_mut().gen_range(lo..=hi)))])
        }
    }
}

fn lua_randomseed(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let seed = if args.is_empty() {
        rand::random::<u64>()
    } else {
        super::check_int(&args, 0, "randomseed")? as u64
    };
    RNG.with(|r| *r.borrow_mut() = StdRng::seed_from_u64(seed));
    Ok(Vec::new())
}
