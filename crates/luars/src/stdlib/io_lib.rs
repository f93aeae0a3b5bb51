//! The `io` library (spec.md §4.9), grounded on the teacher's
//! `stdlib/io/file.rs` + `stdlib/io/mod.rs` design: a `File` is a userdata
//! carrying a metatable whose `__index` exposes `:read/:write/:lines/
//! :seek/:flush/:close/:setvbuf`, plus `__gc`/`__close`/`__tostring`. The
//! default input/output handles (`io.input()`/`io.output()`) are stored as
//! hidden fields on the shared `io` table itself rather than as fields on
//! `Interpreter`, since that table (unlike an `Interpreter`, one of which
//! exists per coroutine thread — see `coroutine.rs`) is the one piece of
//! io state every coroutine actually shares.

use super::{arg, arg_err, check_str};
use crate::error::{Control, LuaResult};
use crate::interp::Interpreter;
use crate::value::{Function, TableRef, UserData, UserDataRef, Value};
use std::cell::RefCell;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

const DEFAULT_INPUT_KEY: &str = "\0default_input";
const DEFAULT_OUTPUT_KEY: &str = "\0default_output";

enum Handle {
    Stdin(BufReader<std::io::Stdin>),
    Stdout(std::io::Stdout),
    Stderr(std::io::Stderr),
    /// Not wrapped in a `BufReader`: `:seek` must be able to reposition the
    /// real file offset without a stale read-ahead buffer replaying bytes
    /// from before the seek, so file reads go through `Read` directly
    /// (`read_until`'s one-byte-at-a-time loop below costs nothing extra
    /// a real buffer wouldn't also pay for a freshly-seeked handle).
    File(std::fs::File),
    Closed,
}

struct LuaFile {
    handle: Handle,
}

impl LuaFile {
    fn read_bytes(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let read = match &mut self.handle {
            Handle::Stdin(r) => r.read(&mut buf)?,
            Handle::File(f) => f.read(&mut buf)?,
            Handle::Stdout(_) | Handle::Stderr(_) => 0,
            Handle::Closed => return Err(std::io::Error::other("attempt to use a closed file")),
        };
        buf.truncate(read);
        Ok(buf)
    }

    fn read_line(&mut self, keep_newline: bool) -> std::io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let n = match &mut self.handle {
            Handle::Stdin(r) => r.read_until(b'\n', &mut buf)?,
            Handle::File(f) => read_until_byte(f, b'\n', &mut buf)?,
            Handle::Stdout(_) | Handle::Stderr(_) => 0,
            Handle::Closed => return Err(std::io::Error::other("attempt to use a closed file")),
        };
        if n == 0 {
            return Ok(None);
        }
        if !keep_newline && buf.last() == Some(&b'\n') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    fn read_all(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        match &mut self.handle {
            Handle::Stdin(r) => {
                r.read_to_end(&mut buf)?;
            }
            Handle::File(f) => {
                f.read_to_end(&mut buf)?;
            }
            Handle::Stdout(_) | Handle::Stderr(_) => {}
            Handle::Closed => return Err(std::io::Error::other("attempt to use a closed file")),
        }
        Ok(buf)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match &mut self.handle {
            Handle::Stdout(w) => w.write_all(bytes),
            Handle::Stderr(w) => w.write_all(bytes),
            Handle::File(f) => f.write_all(bytes),
            Handle::Stdin(_) => Ok(()),
            Handle::Closed => Err(std::io::Error::other("attempt to use a closed file")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.handle {
            Handle::Stdout(w) => w.flush(),
            Handle::Stderr(w) => w.flush(),
            Handle::File(f) => f.flush(),
            Handle::Stdin(_) | Handle::Closed => Ok(()),
        }
    }

    fn seek(&mut self, whence: SeekFrom) -> std::io::Result<u64> {
        match &mut self.handle {
            Handle::File(f) => f.seek(whence),
            _ => Err(std::io::Error::other("cannot seek this handle")),
        }
    }

    fn close(&mut self) {
        self.handle = Handle::Closed;
    }

    fn is_closed(&self) -> bool {
        matches!(self.handle, Handle::Closed)
    }
}

pub fn install(interp: &mut Interpreter) -> TableRef {
    let t = super::new_lib(interp, "io");
    let file_mt = make_file_metatable();

    let stdin = new_file_value(&file_mt, Handle::Stdin(BufReader::new(std::io::stdin())));
    let stdout = new_file_value(&file_mt, Handle::Stdout(std::io::stdout()));
    let stderr = new_file_value(&file_mt, Handle::Stderr(std::io::stderr()));
    t.borrow_mut().set(Value::from_str("stdin"), stdin.clone()).unwrap();
    t.borrow_mut().set(Value::from_str("stdout"), stdout.clone()).unwrap();
    t.borrow_mut().set(Value::from_str("stderr"), stderr.clone()).unwrap();
    t.borrow_mut().set(Value::from_str(DEFAULT_INPUT_KEY), stdin).unwrap();
    t.borrow_mut().set(Value::from_str(DEFAULT_OUTPUT_KEY), stdout).unwrap();

    // file_mt is captured by each closure below so `io.open` can stamp it
    // onto newly created handles without re-deriving it from the `io`
    // table (matching the teacher's `create_file_metatable` being built
    // once at library-install time).
    let mt_for_open = file_mt.clone();
    super::register(&t, "open", move |_, a| io_open(&mt_for_open, a));
    let mt_for_tmp = file_mt.clone();
    super::register(&t, "tmpfile", move |_, _| io_tmpfile(&mt_for_tmp));
    super::register(&t, "close", io_close);
    super::register(&t, "flush", io_flush);
    super::register(&t, "write", io_write);
    super::register(&t, "read", io_read);
    let mt_for_lines = file_mt.clone();
    super::register(&t, "lines", move |i, a| io_lines(&mt_for_lines, i, a));
    super::register(&t, "input", io_input);
    super::register(&t, "output", io_output);
    super::register(&t, "type", io_type);
    super::register(&t, "popen", |_, _| Ok(vec![Value::Nil, Value::from_str("popen not supported")]));
    t
}

fn make_file_metatable() -> TableRef {
    let mt = super::new_table();
    let methods = super::new_table();
    super::register(&methods, "read", file_read);
    super::register(&methods, "write", file_write);
    super::register(&methods, "lines", |i, a| file_lines(i, a));
    super::register(&methods, "seek", file_seek);
    super::register(&methods, "flush", file_flush);
    super::register(&methods, "close", file_close);
    super::register(&methods, "setvbuf", |_, a| Ok(vec![arg(&a, 0)]));
    mt.borrow_mut().set(Value::from_str("__index"), Value::Table(methods)).unwrap();
    super::register(&mt, "__gc", file_close);
    super::register(&mt, "__close", |i, a| file_close(i, a).map(|_| Vec::new()));
    super::register(&mt, "__tostring", |_, a| match arg(&a, 0) {
        Value::UserData(u) => Ok(vec![Value::from_bytes(format!("file ({:p})", Rc::as_ptr(&u)).into_bytes())]),
        _ => Ok(vec![Value::from_str("file (closed)")]),
    });
    mt
}

/// Reads one byte at a time up to and including `delim` (or EOF),
/// matching `BufRead::read_until`'s contract without requiring a
/// `BufReader` wrapper — kept unbuffered so `:seek` repositions the real
/// file offset with no read-ahead bytes to discard.
fn read_until_byte(f: &mut std::fs::File, delim: u8, buf: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut byte = [0u8; 1];
    let mut n = 0;
    loop {
        match f.read(&mut byte)? {
            0 => break,
            _ => {
                n += 1;
                buf.push(byte[0]);
                if byte[0] == delim {
                    break;
                }
            }
        }
    }
    Ok(n)
}

fn new_file_value(mt: &TableRef, handle: Handle) -> Value {
    let ud: UserDataRef = Rc::new(RefCell::new(UserData {
        type_name: "FILE*",
        data: RefCell::new(Box::new(LuaFile { handle })),
        metatable: Some(mt.clone()),
    }));
    Value::UserData(ud)
}

fn as_file(v: &Value) -> LuaResult<UserDataRef> {
    match v {
        Value::UserData(u) if u.borrow().type_name == "FILE*" => Ok(u.clone()),
        other => Err(arg_err(0, "file", format!("FILE* expected, got {}", other.type_name()))),
    }
}

fn with_file<R>(v: &Value, f: impl FnOnce(&mut LuaFile) -> std::io::Result<R>) -> LuaResult<R> {
    let ud = as_file(v)?;
    let borrow = ud.borrow();
    let mut data = borrow.data.borrow_mut();
    let file = data.downcast_mut::<LuaFile>().expect("FILE* userdata always holds a LuaFile");
    f(file).map_err(|e| Control::err(e.to_string()))
}

fn io_open(file_mt: &TableRef, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let path = check_str(&args, 0, "open")?;
    let path = String::from_utf8_lossy(&path).into_owned();
    let mode = super::opt_str(&args, 1, "open", b"r")?;
    let mode = String::from_utf8_lossy(&mode).into_owned();
    let mut opts = std::fs::OpenOptions::new();
    match mode.trim_end_matches('b') {
        "r" => {
            opts.read(true);
        }
        "w" => {
            opts.write(true).create(true).truncate(true);
        }
        "a" => {
            opts.append(true).create(true);
        }
        "r+" => {
            opts.read(true).write(true);
        }
        "w+" => {
            opts.read(true).write(true).create(true).truncate(true);
        }
        "a+" => {
            opts.read(true).append(true).create(true);
        }
        other => return Err(arg_err(1, "open", format!("invalid mode '{other}'"))),
    }
    match opts.open(&path) {
        Ok(f) => Ok(vec![new_file_value(file_mt, Handle::File(f))]),
        Err(e) => Ok(vec![Value::Nil, Value::from_bytes(format!("{path}: {e}").into_bytes()), Value::Int(e.raw_os_error().unwrap_or(-1) as i64)]),
    }
}

fn io_tmpfile(file_mt: &TableRef) -> LuaResult<Vec<Value>> {
    let path = std::env::temp_dir().join(format!("lua_tmp_{}_{}", std::process::id(), crate::gc::live_table_count()));
    match std::fs::OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path) {
        Ok(f) => Ok(vec![new_file_value(file_mt, Handle::File(f))]),
        Err(e) => Ok(vec![Value::Nil, Value::from_bytes(e.to_string().into_bytes())]),
    }
}

fn default_input(interp: &mut Interpreter) -> Value {
    let io = interp.globals.borrow().get(&Value::from_str("io"));
    let Value::Table(io) = io else { return Value::Nil };
    let v = io.borrow().get(&Value::from_str(DEFAULT_INPUT_KEY));
    v
}

fn default_output(interp: &mut Interpreter) -> Value {
    let io = interp.globals.borrow().get(&Value::from_str("io"));
    let Value::Table(io) = io else { return Value::Nil };
    let v = io.borrow().get(&Value::from_str(DEFAULT_OUTPUT_KEY));
    v
}

fn io_input(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    swap_default(interp, DEFAULT_INPUT_KEY, args, "input")
}

fn io_output(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    swap_default(interp, DEFAULT_OUTPUT_KEY, args, "output")
}

fn swap_default(interp: &mut Interpreter, key: &str, args: Vec<Value>, fname: &str) -> LuaResult<Vec<Value>> {
    let Value::Table(io) = interp.globals.borrow().get(&Value::from_str("io")) else {
        return Err(Control::err("io table missing"));
    };
    match arg(&args, 0) {
        Value::Nil => Ok(vec![io.borrow().get(&Value::from_str(key))]),
        Value::Str(path) => {
            let mt = as_file(&io.borrow().get(&Value::from_str("stdin")))?.borrow().metatable.clone().unwrap();
            let mode = if key == DEFAULT_INPUT_KEY { "r" } else { "w" };
            let opened = io_open(&mt, vec![Value::Str(path), Value::from_str(mode)])?;
            let handle = opened.into_iter().next().unwrap_or(Value::Nil);
            if handle.is_nil() {
                return Err(Control::err(format!("cannot open file for '{fname}'")));
            }
            io.borrow_mut().set(Value::from_str(key), handle.clone()).map_err(Control::err)?;
            Ok(vec![handle])
        }
        v @ Value::UserData(_) => {
            io.borrow_mut().set(Value::from_str(key), v.clone()).map_err(Control::err)?;
            Ok(vec![v])
        }
        other => Err(arg_err(0, fname, format!("file expected, got {}", other.type_name()))),
    }
}

fn io_write(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let out = default_output(interp);
    file_write_with_self(&out, args)
}

fn io_read(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let input = default_input(interp);
    file_read_with_self(&input, args)
}

fn io_flush(interp: &mut Interpreter, _args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let out = default_output(interp);
    with_file(&out, |f| f.flush())?;
    Ok(Vec::new())
}

fn io_close(interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let target = if args.is_empty() { default_output(interp) } else { arg(&args, 0) };
    file_close(interp, vec![target])
}

fn io_type(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    match arg(&args, 0) {
        Value::UserData(u) if u.borrow().type_name == "FILE*" => {
            let closed = with_file(&Value::UserData(u.clone()), |f| Ok(f.is_closed()))?;
            Ok(vec![Value::from_str(if closed { "closed file" } else { "file" })])
        }
        _ => Ok(vec![Value::Nil]),
    }
}

fn io_lines(file_mt: &TableRef, interp: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if args.is_empty() {
        let input = default_input(interp);
        return file_lines(interp, vec![input]);
    }
    let opened = io_open(file_mt, args)?;
    match opened.into_iter().next() {
        Some(f @ Value::UserData(_)) => file_lines(interp, vec![f]),
        _ => Err(Control::err("cannot open file for 'lines'")),
    }
}

fn parse_read_fmt(v: &Value) -> String {
    match v {
        Value::Str(s) => {
            let s = s.as_lossy_str();
            s.trim_start_matches('*').to_string()
        }
        Value::Int(n) => n.to_string(),
        _ => "l".to_string(),
    }
}

fn file_read_with_self(this: &Value, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let formats: Vec<String> = if args.is_empty() { vec!["l".to_string()] } else { args.iter().map(parse_read_fmt).collect() };
    let mut out = Vec::with_capacity(formats.len());
    for fmt in formats {
        let value = if let Ok(n) = fmt.parse::<usize>() {
            let bytes = with_file(this, |f| f.read_bytes(n))?;
            if bytes.is_empty() && n > 0 {
                out.push(Value::Nil);
                break;
            }
            bytes
        } else {
            match fmt.as_str() {
                "l" => match with_file(this, |f| f.read_line(false))? {
                    Some(b) => b,
                    None => {
                        out.push(Value::Nil);
                        break;
                    }
                },
                "L" => match with_file(this, |f| f.read_line(true))? {
                    Some(b) => b,
                    None => {
                        out.push(Value::Nil);
                        break;
                    }
                },
                "a" => with_file(this, |f| f.read_all())?,
                "n" => {
                    let line = with_file(this, |f| f.read_line(false))?.unwrap_or_default();
                    let text = String::from_utf8_lossy(&line);
                    match crate::numeric::parse_number(text.trim()) {
                        Some(v) => {
                            out.push(v);
                            continue;
                        }
                        None => {
                            out.push(Value::Nil);
                            break;
                        }
                    }
                }
                other => return Err(Control::err(format!("invalid format '{other}'"))),
            }
        };
        out.push(Value::from_bytes(value));
    }
    if out.is_empty() {
        out.push(Value::Nil);
    }
    Ok(out)
}

fn file_write_with_self(this: &Value, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    for a in &args {
        let bytes = match a {
            Value::Str(s) => s.as_bytes().to_vec(),
            Value::Int(n) => n.to_string().into_bytes(),
            Value::Float(f) => crate::value::float_to_display(*f).into_bytes(),
            other => return Err(arg_err(0, "write", format!("string expected, got {}", other.type_name()))),
        };
        with_file(this, |f| f.write_bytes(&bytes))?;
    }
    Ok(vec![this.clone()])
}

fn file_read(_: &mut Interpreter, mut args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if args.is_empty() {
        return Err(arg_err(0, "read", "file expected"));
    }
    let this = args.remove(0);
    file_read_with_self(&this, args)
}

fn file_write(_: &mut Interpreter, mut args: Vec<Value>) -> LuaResult<Vec<Value>> {
    if args.is_empty() {
        return Err(arg_err(0, "write", "file expected"));
    }
    let this = args.remove(0);
    file_write_with_self(&this, args)
}

fn file_lines(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let this = arg(&args, 0);
    as_file(&this)?;
    let iter = move |_: &mut Interpreter, _: Vec<Value>| -> LuaResult<Vec<Value>> {
        match with_file(&this, |f| f.read_line(false))? {
            Some(line) => Ok(vec![Value::from_bytes(line)]),
            None => {
                with_file(&this, |f| {
                    f.close();
                    Ok(())
                })?;
                Ok(vec![Value::Nil])
            }
        }
    };
    Ok(vec![Value::Function(Function::host("lines_iterator", iter))])
}

fn file_seek(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let this = arg(&args, 0);
    let whence = super::opt_str(&args, 1, "seek", b"cur")?;
    let offset = super::opt_int(&args, 2, "seek", 0)?;
    let whence = match whence.as_slice() {
        b"set" => SeekFrom::Start(offset.max(0) as u64),
        b"end" => SeekFrom::End(offset),
        _ => SeekFrom::Current(offset),
    };
    let pos = with_file(&this, |f| f.seek(whence))?;
    Ok(vec![Value::Int(pos as i64)])
}

fn file_flush(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let this = arg(&args, 0);
    with_file(&this, |f| f.flush())?;
    Ok(vec![this])
}

fn file_close(_: &mut Interpreter, args: Vec<Value>) -> LuaResult<Vec<Value>> {
    let this = arg(&args, 0);
    if let Ok(ud) = as_file(&this) {
        let mut data = ud.borrow().data.borrow_mut();
        if let Some(f) = data.downcast_mut::<LuaFile>() {
            let _ = f.flush();
            f.close();
        }
    }
    Ok(vec![Value::Bool(true)])
}
