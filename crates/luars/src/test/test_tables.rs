//! Table semantics: rawget/rawset, length/border, `next`/`pairs`/`ipairs`,
//! and the `table.*` library (spec.md §4.2, §8 scenarios 5 & 6).

use super::assert_ok;

#[test]
fn rawset_rawget_roundtrip() {
    assert_ok(
        r#"
        local t = {}
        rawset(t, "k", "v")
        assert(rawget(t, "k") == "v")
        rawset(t, "k", nil)
        assert(rawget(t, "k") == nil)
    "#,
    );
}

#[test]
fn sequence_length_is_a_border() {
    assert_ok(
        r#"
        local t = {1, 2, 3}
        assert(#t == 3)
        assert(t[#t] ~= nil)
        assert(t[#t + 1] == nil)
        local empty = {}
        assert(#empty == 0)
    "#,
    );
}

#[test]
fn index_metamethod_table_chain() {
    assert_ok(
        r#"
        local a = setmetatable({}, {__index = {x = 10}})
        assert(a.x == 10)
        assert(a.y == nil)
        assert(rawget(a, "x") == nil)
    "#,
    );
}

#[test]
fn index_metamethod_function() {
    assert_ok(
        r#"
        local log = {}
        local a = setmetatable({}, {__index = function(t, k) return "missing:" .. k end})
        assert(a.foo == "missing:foo")
    "#,
    );
}

#[test]
fn newindex_metamethod_function_and_table() {
    assert_ok(
        r#"
        local backing = {}
        local a = setmetatable({}, {__newindex = backing})
        a.x = 5
        assert(rawget(a, "x") == nil)
        assert(backing.x == 5)

        local calls = {}
        local b = setmetatable({}, {__newindex = function(t, k, v) calls[k] = v end})
        b.y = 7
        assert(calls.y == 7)
        assert(rawget(b, "y") == nil)
    "#,
    );
}

#[test]
fn len_metamethod_overrides_border() {
    assert_ok(
        r#"
        local t = setmetatable({1, 2, 3}, {__len = function() return 100 end})
        assert(#t == 100)
    "#,
    );
}

#[test]
fn next_and_pairs_visit_every_entry_once() {
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
fn ipairs_stops_at_first_nil() {
    assert_ok(
        r#"
        local t = {10, 20, 30}
        t[5] = 50
        local out = {}
        for i, v in ipairs(t) do
            out[i] = v
        end
        assert(#out == 3)
        assert(out[1] == 10 and out[3] == 30)
    "#,
    );
}

#[test]
fn pairs_consults_pairs_metamethod() {
    assert_ok(
        r#"
        local function custom_pairs(t)
            local i = 0
            local keys = {"only"}
            return function()
                i = i + 1
                if keys[i] then return keys[i], "value" end
            end
        end
        local t = setmetatable({}, {__pairs = custom_pairs})
        local out = {}
        for k, v in pairs(t) do
            out[k] = v
        end
        assert(out.only == "value")
    "#,
    );
}

#[test]
fn table_insert_remove_at_position() {
    assert_ok(
        r#"
        local t = {1, 2, 3}
        table.insert(t, 2, 99)
        assert(t[1] == 1 and t[2] == 99 and t[3] == 2 and t[4] == 3)
        local removed = table.remove(t, 2)
        assert(removed == 99)
        assert(t[1] == 1 and t[2] == 2 and t[3] == 3 and #t == 3)
    "#,
    );
}

#[test]
fn table_concat_sort_pack_unpack() {
    assert_ok(
        r#"
        assert(table.concat({1, 2, 3}, "-") == "1-2-3")

        local t = {5, 3, 1, 4, 2}
        table.sort(t)
        assert(table.concat(t, ",") == "1,2,3,4,5")

        table.sort(t, function(a, b) return a > b end)
        assert(table.concat(t, ",") == "5,4,3,2,1")

        local packed = table.pack(1, 2, 3)
        assert(packed.n == 3 and packed[1] == 1 and packed[3] == 3)

        local a, b, c = table.unpack({10, 20, 30})
        assert(a == 10 and b == 20 and c == 30)
    "#,
    );
}

#[test]
fn table_move_within_same_table() {
    assert_ok(
        r#"
        local t = {1, 2, 3, 4, 5}
        table.move(t, 1, 3, 3)
        assert(t[3] == 1 and t[4] == 2 and t[5] == 3)
    "#,
    );
}

#[test]
fn setmetatable_protected_by_metatable_field() {
    super::assert_err_contains(
        r#"
        local t = setmetatable({}, {__metatable = "protected"})
        setmetatable(t, {})
    "#,
        "protected",
    );
}

#[test]
fn getmetatable_returns_metatable_field_value_when_set() {
    assert_ok(
        r#"
        local t = setmetatable({}, {__metatable = "locked"})
        assert(getmetatable(t) == "locked")
    "#,
    );
}
