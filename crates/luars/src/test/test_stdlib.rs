//! Base library and `math`/`os` (spec.md §4.2, §4.3).

use super::assert_ok;

#[test]
fn type_reports_tag_names() {
    assert_ok(
        r#"
        assert(type(nil) == "nil")
        assert(type(true) == "boolean")
        assert(type(1) == "number")
        assert(type("s") == "string")
        assert(type({}) == "table")
        assert(type(print) == "function")
    "#,
    );
}

#[test]
fn tostring_and_tonumber_conversions() {
    assert_ok(
        r#"
        assert(tostring(10) == "10")
        assert(tostring(nil) == "nil")
        assert(tonumber("10") == 10)
        assert(tonumber("10", 16) == 16)
        assert(tonumber("not a number") == nil)
    "#,
    );
}

#[test]
fn select_returns_count_or_tail_arguments() {
    assert_ok(
        r#"
        assert(select("#", 1, 2, 3) == 3)
        local a, b = select(2, "x", "y", "z")
        assert(a == "y" and b == "z")
    "#,
    );
}

#[test]
fn pcall_catches_errors_and_returns_false_plus_message() {
    assert_ok(
        r#"
        local ok, err = pcall(function() error("boom") end)
        assert(ok == false)
        assert(string.find(err, "boom") ~= nil)
        local ok2, v = pcall(function() return 1, 2 end)
        assert(ok2 == true and v == 1)
    "#,
    );
}

#[test]
fn xpcall_runs_handler_on_error() {
    assert_ok(
        r#"
        local ok, handled = xpcall(function() error("x") end, function(e) return "handled: " .. e end)
        assert(ok == false)
        assert(string.find(handled, "handled:") ~= nil)
    "#,
    );
}

#[test]
fn assert_passes_through_values_or_raises() {
    assert_ok(
        r#"
        assert(assert(1, 2, 3) == 1)
        local ok, err = pcall(assert, false, "custom message")
        assert(ok == false and err == "custom message")
    "#,
    );
}

#[test]
fn pairs_visits_every_key_once() {
    assert_ok(
        r#"
        local t = {a = 1, b = 2, c = 3}
        local seen = {}
        local count = 0
        for k, v in pairs(t) do
            seen[k] = v
            count = count + 1
        end
        assert(count == 3)
        assert(seen.a == 1 and seen.b == 2 and seen.c == 3)
    "#,
    );
}

#[test]
fn rawequal_rawlen_and_rawget_bypass_metamethods() {
    assert_ok(
        r#"
        local t = setmetatable({1, 2, 3}, {__len = function() return 100 end, __index = function() return "meta" end})
        assert(#t == 100)
        assert(rawlen(t) == 3)
        assert(t.missing == "meta")
        assert(rawget(t, "missing") == nil)
    "#,
    );
}

#[test]
fn math_rounding_and_extrema() {
    assert_ok(
        r#"
        assert(math.floor(3.7) == 3)
        assert(math.ceil(3.2) == 4)
        assert(math.abs(-5) == 5)
        assert(math.max(1, 5, 3) == 5)
        assert(math.min(1, 5, 3) == 1)
        assert(math.type(1) == "integer")
        assert(math.type(1.0) == "float")
        assert(math.type("1") == nil)
    "#,
    );
}

#[test]
fn math_random_respects_declared_interval() {
    assert_ok(
        r#"
        for _ = 1, 20 do
            local n = math.random(1, 10)
            assert(n >= 1 and n <= 10)
        end
    "#,
    );
}

#[test]
fn os_time_and_difftime() {
    assert_ok(
        r#"
        local t1 = os.time()
        local t2 = os.time()
        assert(t2 - t1 == os.difftime(t2, t1))
    "#,
    );
}
