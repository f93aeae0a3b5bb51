//! Environment/closure model: upvalue capture, `_G`/`_ENV` wiring, and
//! sandboxed `_ENV` via `load` (spec.md §4.4).

use super::assert_ok;

#[test]
fn closures_capture_upvalues_by_reference() {
    assert_ok(
        r#"
        local function make_counter()
            local n = 0
            return function()
                n = n + 1
                return n
            end
        end
        local c1 = make_counter()
        local c2 = make_counter()
        assert(c1() == 1)
        assert(c1() == 2)
        assert(c2() == 1)
    "#,
    );
}

#[test]
fn distinct_closures_from_the_same_literal_are_distinct_values() {
    assert_ok(
        r#"
        local function make()
            return function() end
        end
        local a = make()
        local b = make()
        assert(a ~= b)
    "#,
    );
}

#[test]
fn globals_and_g_table_are_the_same_object() {
    assert_ok(
        r#"
        x = 10
        assert(_G.x == 10)
        _G.y = 20
        assert(y == 20)
        assert(_G._G == _G)
    "#,
    );
}

#[test]
fn load_with_custom_env_sandboxes_globals() {
    assert_ok(
        r#"
        local sandbox = {print = print}
        local f = load("return type(print)", "chunk", "t", sandbox)
        assert(f() == "function")
    "#,
    );
}

#[test]
fn load_returns_nil_and_message_on_parse_error() {
    assert_ok(
        r#"
        local f, err = load("this is not valid lua $$$")
        assert(f == nil)
        assert(type(err) == "string")
    "#,
    );
}

#[test]
fn nested_closures_share_the_same_outer_local() {
    assert_ok(
        r#"
        local n = 1
        local function inc() n = n + 1 end
        local function get() return n end
        inc()
        inc()
        assert(get() == 3)
    "#,
    );
}
