//! Metatable dispatch across arithmetic, comparison, call, tostring, and
//! concat metamethods (spec.md §4.1/§4.4 dispatch order).

use super::assert_ok;

#[test]
fn add_metamethod_dispatches_left_then_right() {
    assert_ok(
        r#"
        local mt = {__add = function(a, b)
            local av = type(a) == "table" and a.v or a
            local bv = type(b) == "table" and b.v or b
            return av + bv
        end}
        local a = setmetatable({v = 5}, mt)
        assert(a + 3 == 8)
        assert(3 + a == 8)
    "#,
    );
}

#[test]
fn eq_metamethod_only_for_same_metamethod_tables() {
    assert_ok(
        r#"
        local mt = {__eq = function(a, b) return a.v == b.v end}
        local a = setmetatable({v = 1}, mt)
        local b = setmetatable({v = 1}, mt)
        local c = setmetatable({v = 1}, {})
        assert(a == b)
        assert(a ~= c)
    "#,
    );
}

#[test]
fn lt_and_le_metamethods() {
    assert_ok(
        r#"
        local mt = {
            __lt = function(a, b) return a.v < b.v end,
            __le = function(a, b) return a.v <= b.v end,
        }
        local a = setmetatable({v = 1}, mt)
        local b = setmetatable({v = 2}, mt)
        assert(a < b)
        assert(a <= b)
        assert(not (b < a))
    "#,
    );
}

#[test]
fn call_metamethod_makes_table_callable() {
    assert_ok(
        r#"
        local callable = setmetatable({}, {__call = function(self, x) return x * 2 end})
        assert(callable(21) == 42)
    "#,
    );
}

#[test]
fn tostring_metamethod_used_by_tostring_and_print() {
    assert_ok(
        r#"
        local t = setmetatable({}, {__tostring = function() return "custom!" end})
        assert(tostring(t) == "custom!")
    "#,
    );
}

#[test]
fn concat_metamethod() {
    assert_ok(
        r#"
        local t = setmetatable({}, {__concat = function(a, b) return "joined" end})
        assert((t .. "x") == "joined")
        assert(("x" .. t) == "joined")
    "#,
    );
}

#[test]
fn arithmetic_without_metamethod_errors() {
    super::assert_err_contains("return {} + 1", "attempt to perform arithmetic");
}

#[test]
fn gc_metamethod_queues_finalizer_on_collection() {
    assert_ok(
        r#"
        local ran = false
        local function make()
            local t = {}
            setmetatable(t, {__gc = function() ran = true end})
            return t
        end
        do
            local t = make()
        end
        collectgarbage()
        assert(ran == true)
    "#,
    );
}
