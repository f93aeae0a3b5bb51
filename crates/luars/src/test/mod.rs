//! Integration tests driving the interpreter through Lua source text,
//! grounded on the teacher's `src/test/` layout (`test_metamethods.rs`,
//! `test_coroutine.rs`, `test_control_flow.rs`, `test_utf8.rs`): one file
//! per feature area, each test constructing a fresh `Lua`, running a
//! snippet, and leaning on Lua's own `assert()` to state the expectation
//! rather than re-deriving it on the Rust side.

mod test_closures;
mod test_coroutine;
mod test_control_flow;
mod test_errors;
mod test_format;
mod test_metamethods;
mod test_pack;
mod test_pattern;
mod test_require;
mod test_stdlib;
mod test_strings;
mod test_tables;
mod test_utf8;
mod test_values;

use crate::Lua;

/// Runs `src` as a chunk named `test`, returning its `return` values or
/// the error message on failure — the common entry point every test file
/// here builds on.
pub fn run(src: &str) -> Result<Vec<crate::Value>, String> {
    let mut lua = Lua::new();
    lua.run_and_finalize(src, "test").map_err(|e| e.to_string())
}

/// Asserts `src` runs to completion without raising, printing the error
/// (if any) before panicking — mirrors the teacher's
/// `if let Err(e) = &result { eprintln!(...) }; assert!(result.is_ok())`
/// pattern used throughout `src/test/*.rs`.
#[track_caller]
pub fn assert_ok(src: &str) {
    if let Err(e) = run(src) {
        panic!("expected success, got error: {e}\nsource:\n{src}");
    }
}

/// Asserts `src` raises an error whose message contains `needle`.
#[track_caller]
pub fn assert_err_contains(src: &str, needle: &str) {
    match run(src) {
        Ok(_) => panic!("expected error containing {needle:?}, but script succeeded\nsource:\n{src}"),
        Err(e) => assert!(e.contains(needle), "error {e:?} did not contain {needle:?}"),
    }
}
