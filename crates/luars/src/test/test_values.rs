//! Value model, numeric tower, and equality/ordering rules (spec.md §3/§4.1,
//! §8 "Universal invariants" and scenario 1 "Integer boundary").

use super::assert_ok;

#[test]
fn integer_wraparound() {
    assert_ok(
        r#"
        assert(math.maxinteger + 1 == math.mininteger)
        assert(math.mininteger - 1 == math.maxinteger)
        assert(-math.mininteger == math.mininteger)
    "#,
    );
}

#[test]
fn mininteger_tostring() {
    assert_ok(r#"assert(tostring(math.mininteger) == "-9223372036854775808")"#);
}

#[test]
fn int_float_equality_and_ordering() {
    assert_ok(
        r#"
        assert(1 == 1.0)
        assert(1 < 1.5)
        assert(2.0 <= 2)
        assert(not (1 == 2))
    "#,
    );
}

#[test]
fn division_and_floor_division_result_kinds() {
    assert_ok(
        r#"
        assert(math.type(7 / 2) == "float")
        assert(math.type(7 // 2) == "integer")
        assert(7 // 2 == 3)
        assert(math.type(7.0 // 2) == "float")
        assert(2 ^ 2 == 4.0)
        assert(math.type(2 ^ 2) == "float")
    "#,
    );
}

#[test]
fn modulo_matches_floor_division_sign() {
    assert_ok(
        r#"
        assert(5 % 3 == 2)
        assert(-5 % 3 == 1)
        assert(5 % -3 == -1)
    "#,
    );
}

#[test]
fn division_by_zero_integer_errors() {
    super::assert_err_contains("return 1 // 0", "attempt to perform");
    super::assert_err_contains("return 1 % 0", "attempt to perform");
}

#[test]
fn float_division_by_zero_is_inf_or_nan() {
    assert_ok(
        r#"
        assert(1 / 0 == math.huge)
        assert(-1 / 0 == -math.huge)
        assert((0/0) ~= (0/0))
    "#,
    );
}

#[test]
fn nan_is_not_equal_to_itself_and_not_storable() {
    assert_ok(
        r#"
        local nan = 0/0
        assert(nan ~= nan)
        local ok = pcall(function()
            local t = {}
            t[nan] = 1
        end)
        assert(ok == false)
    "#,
    );
}

#[test]
fn nil_key_rejected() {
    assert_ok(
        r#"
        local ok = pcall(function()
            local t = {}
            t[nil] = 1
        end)
        assert(ok == false)
    "#,
    );
}

#[test]
fn tonumber_parses_decimal_hex_and_hexfloat() {
    assert_ok(
        r#"
        assert(tonumber("10") == 10)
        assert(tonumber("  10  ") == 10)
        assert(tonumber("0x1F") == 31)
        assert(tonumber("0x1.8p1") == 3.0)
        assert(tonumber("not a number") == nil)
    "#,
    );
}

#[test]
fn tointeger_only_succeeds_for_exact_integers() {
    assert_ok(
        r#"
        assert(math.tointeger(3.0) == 3)
        assert(math.tointeger(3.5) == nil)
        assert(math.tointeger(2^63) == nil)
    "#,
    );
}

#[test]
fn bitwise_requires_integer_representable_operands() {
    assert_ok(
        r#"
        assert(5 & 3 == 1)
        assert(5 | 2 == 7)
        assert(5 ~ 1 == 4)
        assert(~0 == -1)
        assert(1 << 4 == 16)
        assert(256 >> 4 == 16)
    "#,
    );
    super::assert_err_contains("return 1.5 & 1", "no integer representation");
}

#[test]
fn shifts_by_64_or_more_produce_zero() {
    assert_ok(
        r#"
        assert(1 << 64 == 0)
        assert(1 >> 64 == 0)
        assert(1 << 100 == 0)
    "#,
    );
}

#[test]
fn comparison_between_number_and_string_errors() {
    super::assert_err_contains(r#"return 1 < "2""#, "compare");
}

#[test]
fn truthiness_only_nil_and_false_are_falsy() {
    assert_ok(
        r#"
        assert(0 and true)
        assert("" and true)
        assert(not nil)
        assert(not false)
    "#,
    );
}

#[test]
fn type_name_reports_lua_type_tags() {
    assert_ok(
        r#"
        assert(type(nil) == "nil")
        assert(type(true) == "boolean")
        assert(type(1) == "number")
        assert(type("s") == "string")
        assert(type({}) == "table")
        assert(type(print) == "function")
        assert(type(coroutine.create(function() end)) == "thread")
    "#,
    );
}
