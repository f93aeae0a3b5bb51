//! CLI entry point (spec.md §6's "CLI contract (delegated to external
//! collaborator)"): option parsing, the `arg` table, `LUA_INIT`/`LUA_PATH`/
//! `LUA_CPATH` handling, and the REPL loop, grounded on the teacher's
//! `src/bin/main.rs` shape (flag set, big-stack spawn thread, expression-
//! first REPL retry) but rewritten against this crate's own `Lua`/
//! `Interpreter` façade rather than the teacher's removed `LuaVM`.

use luars::value::Value;
use luars::Lua;
use std::env;
use std::fs;
use std::io::{self, BufRead, Read, Write};

const VERSION: &str = "Lua-RS 5.4 (compatible)";
const COPYRIGHT: &str = "Copyright (C) 2026 lua-rs CppCXY";

fn print_usage() {
    eprintln!("usage: lua [options] [script [args]]");
    eprintln!("Available options are:");
    eprintln!("  -e stat   execute string 'stat'");
    eprintln!("  -i        enter interactive mode after executing 'script'");
    eprintln!("  -l mod    require library 'mod' into global 'mod'");
    eprintln!("  -v        show version information");
    eprintln!("  -E        ignore environment variables");
    eprintln!("  -W        turn warnings on");
    eprintln!("  --        stop handling options");
    eprintln!("  -         stop handling options and execute stdin");
}

fn print_version() {
    println!("{}", VERSION);
    println!("{}", COPYRIGHT);
}

#[derive(Default)]
struct Options {
    execute_strings: Vec<String>,
    interactive: bool,
    script_file: Option<String>,
    script_args: Vec<String>,
    require_modules: Vec<String>,
    show_version: bool,
    read_stdin: bool,
    ignore_env: bool,
    warnings_on: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut opts = Options::default();
    let mut i = 1;
    let mut stop_options = false;

    while i < args.len() {
        let a = &args[i];
        if !stop_options && a.starts_with('-') && a.len() > 1 {
            match a.as_str() {
                "-e" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("'-e' needs argument".to_string());
                    }
                    opts.execute_strings.push(args[i].clone());
                }
                "-i" => opts.interactive = true,
                "-l" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("'-l' needs argument".to_string());
                    }
                    opts.require_modules.push(args[i].clone());
                }
                "-v" => opts.show_version = true,
                "-E" => opts.ignore_env = true,
                "-W" => opts.warnings_on = true,
                "--" => stop_options = true,
                _ => return Err(format!("unrecognized option '{}'", a)),
            }
        } else if !stop_options && a == "-" {
            opts.read_stdin = true;
            stop_options = true;
        } else {
            opts.script_file = Some(a.clone());
            i += 1;
            while i < args.len() {
                opts.script_args.push(args[i].clone());
                i += 1;
            }
            break;
        }
        i += 1;
    }
    Ok(opts)
}

/// Builds the `arg` global (spec.md §6): `arg[0]` the script name,
/// `arg[1..]` the script's own arguments, `arg[-1]` the interpreter path.
fn setup_arg_table(lua: &mut Lua, exe_path: &str, script_name: Option<&str>, args: &[String]) {
    let t = luars::stdlib::new_table();
    if let Some(name) = script_name {
        t.borrow_mut().set(Value::Int(0), Value::from_str(name)).unwrap();
    }
    t.borrow_mut().set(Value::Int(-1), Value::from_str(exe_path)).unwrap();
    for (i, a) in args.iter().enumerate() {
        t.borrow_mut().set(Value::Int(i as i64 + 1), Value::from_str(a)).unwrap();
    }
    lua.interp.globals.borrow_mut().set(Value::from_str("arg"), Value::Table(t)).unwrap();
}

fn report_error(err: &luars::LuaError) {
    let msg = err.display_message();
    match &err.traceback {
        Some(tb) => eprintln!("lua: {msg}\n{tb}"),
        None => eprintln!("lua: {msg}"),
    }
}

fn execute_string(lua: &mut Lua, code: &str, name: &str) -> Result<Vec<Value>, ()> {
    lua.run_and_finalize(code, name).map_err(|e| report_error(&e))
}

fn require_module(lua: &mut Lua, module: &str) -> Result<(), ()> {
    let code = format!("{} = require({:?})", module, module);
    execute_string(lua, &code, "=(command line)").map(|_| ())
}

fn execute_file(lua: &mut Lua, filename: &str) -> Result<(), ()> {
    let source = fs::read_to_string(filename).map_err(|e| eprintln!("lua: cannot open {filename}: {e}"))?;
    execute_string(lua, &source, filename).map(|_| ())
}

fn execute_stdin(lua: &mut Lua) -> Result<(), ()> {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source).map_err(|e| eprintln!("lua: cannot read stdin: {e}"))?;
    execute_string(lua, &source, "=stdin").map(|_| ())
}

fn run_repl(lua: &mut Lua) {
    println!("{}", VERSION);
    println!("{}", COPYRIGHT);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut incomplete = String::new();

    loop {
        print!("{}", if incomplete.is_empty() { "> " } else { ">> " });
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };

        if !incomplete.is_empty() {
            incomplete.push('\n');
        }
        incomplete.push_str(&line);

        // Like the standalone `lua.c` REPL: try the input as `return <expr>`
        // first so bare expressions print their value, falling back to it
        // as a statement chunk.
        let expr_code = format!("return {incomplete}");
        let chunk = luars::interp::parser::parse(expr_code.as_bytes(), "=stdin");
        let (code, is_expr) = match chunk {
            Ok(_) => (expr_code, true),
            Err(_) => (incomplete.clone(), false),
        };

        match luars::interp::parser::parse(code.as_bytes(), "=stdin") {
            Ok(chunk) => {
                match lua.interp.run_chunk(&chunk) {
                    Ok(results) => {
                        if is_expr {
                            if let Some(first) = results.into_iter().next() {
                                if let Ok(s) = lua.interp.tostring(&first) {
                                    println!("{}", s.as_lossy_str());
                                }
                            }
                        }
                        incomplete.clear();
                    }
                    Err(c) => {
                        report_error(&c.into_error());
                        incomplete.clear();
                    }
                }
            }
            Err(e) => {
                // Parse errors that look like "more input expected" keep
                // accumulating lines; anything else is reported immediately.
                if !is_expr && (e.contains("<eof>") || e.contains("unexpected end")) {
                    continue;
                }
                eprintln!("lua: {e}");
                incomplete.clear();
            }
        }
    }
}

/// Expands a `LUA_PATH`/`LUA_CPATH`-style value, replacing a literal `;;`
/// with `default` (matching the standalone interpreter's own convention).
fn resolve_env_path(env_value: &str, default: &str) -> String {
    match env_value.find(";;") {
        Some(pos) => {
            let (prefix, suffix) = (&env_value[..pos], &env_value[pos + 2..]);
            let mut out = String::new();
            if !prefix.is_empty() {
                out.push_str(prefix);
                out.push(';');
            }
            out.push_str(default);
            if !suffix.is_empty() {
                out.push(';');
                out.push_str(suffix);
            }
            out
        }
        None => env_value.to_string(),
    }
}

fn package_table(lua: &Lua) -> Option<luars::value::TableRef> {
    match lua.interp.globals.borrow().get(&Value::from_str("package")) {
        Value::Table(t) => Some(t),
        _ => None,
    }
}

fn set_package_field(lua: &Lua, field: &str, value: String) {
    if let Some(pkg) = package_table(lua) {
        pkg.borrow_mut().set(Value::from_str(field), Value::from_str(&value)).unwrap();
    }
}

fn main() {
    // The evaluator recurses once per nested Lua call; run on a thread with
    // a generous stack so deeply recursive scripts fail with a Lua-level
    // "stack overflow" (spec.md §4.6's call-stack cap) rather than a native
    // SIGSEGV.
    let handler = std::thread::Builder::new()
        .name("lua-main".into())
        .stack_size(16 * 1024 * 1024)
        .spawn(lua_main)
        .expect("failed to spawn lua-main thread");

    match handler.join() {
        Ok(code) => std::process::exit(code),
        Err(_) => {
            eprintln!("lua: internal error (interpreter thread panicked)");
            std::process::exit(1);
        }
    }
}

fn lua_main() -> i32 {
    let opts = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("lua: {e}");
            print_usage();
            return 1;
        }
    };

    if opts.show_version {
        print_version();
        if opts.execute_strings.is_empty() && opts.script_file.is_none() && !opts.read_stdin {
            return 0;
        }
    }

    let mut lua = Lua::new();

    // LUA_PATH/LUA_CPATH (spec.md §6), applied before -E would block them,
    // matching the reference interpreter's flag ordering.
    if !opts.ignore_env {
        if let Some(p) = env::var("LUA_PATH_5_4").ok().or_else(|| env::var("LUA_PATH").ok()) {
            set_package_field(&lua, "path", resolve_env_path(&p, "./?.lua;./?/init.lua"));
        }
        if let Some(p) = env::var("LUA_CPATH_5_4").ok().or_else(|| env::var("LUA_CPATH").ok()) {
            set_package_field(&lua, "cpath", resolve_env_path(&p, "./?.so;./?.dll;./?.dylib"));
        }
    }

    if !opts.ignore_env {
        if let Some(init) = env::var("LUA_INIT_5_4").ok().or_else(|| env::var("LUA_INIT").ok()) {
            let result = if let Some(filename) = init.strip_prefix('@') {
                execute_file(&mut lua, filename)
            } else {
                execute_string(&mut lua, &init, "=LUA_INIT").map(|_| ())
            };
            if result.is_err() {
                return 1;
            }
        }
    }

    if opts.warnings_on {
        let warn = lua.interp.globals.borrow().get(&Value::from_str("warn"));
        if let Value::Function(f) = warn {
            let _ = lua.interp.call_value(Value::Function(f), vec![Value::from_str("@on")], luars::interp::ast::Span::default());
        }
    }

    let exe_path = env::args().next().unwrap_or_else(|| "lua".to_string());
    setup_arg_table(&mut lua, &exe_path, opts.script_file.as_deref(), &opts.script_args);

    for module in &opts.require_modules {
        if require_module(&mut lua, module).is_err() {
            return 1;
        }
    }

    for code in &opts.execute_strings {
        if execute_string(&mut lua, code, "=(command line)").is_err() {
            return 1;
        }
    }

    if let Some(filename) = &opts.script_file {
        if let Some(parent) = std::path::Path::new(filename).parent() {
            let dir = parent.to_string_lossy();
            let dir = if dir.is_empty() { "." } else { &dir };
            if let Some(pkg) = package_table(&lua) {
                let current = match pkg.borrow().get(&Value::from_str("path")) {
                    Value::Str(s) => s.as_lossy_str().into_owned(),
                    _ => String::new(),
                };
                set_package_field(&lua, "path", format!("{dir}/?.lua;{dir}/?/init.lua;{current}"));
            }
        }
        if execute_file(&mut lua, filename).is_err() {
            return 1;
        }
    } else if opts.read_stdin && execute_stdin(&mut lua).is_err() {
        return 1;
    }

    if opts.interactive || (opts.execute_strings.is_empty() && opts.script_file.is_none() && !opts.read_stdin) {
        run_repl(&mut lua);
    }

    0
}
