//! Error construction and propagation (spec.md §4.6).

use super::assert_ok;

#[test]
fn arithmetic_on_non_number_errors() {
    super::assert_err_contains("return {} + 1", "attempt to perform arithmetic on a table value");
}

#[test]
fn concatenation_of_non_string_errors() {
    super::assert_err_contains("return {} .. 'x'", "attempt to concatenate a table value");
}

#[test]
fn indexing_nil_errors() {
    super::assert_err_contains("local x; return x.y", "attempt to index a nil value");
}

#[test]
fn calling_non_function_errors() {
    super::assert_err_contains("local x = 5; x()", "attempt to call a number value");
}

#[test]
fn comparing_incompatible_types_errors() {
    super::assert_err_contains("return 1 < 'a'", "attempt to compare");
}

#[test]
fn length_of_number_errors() {
    super::assert_err_contains("return #5", "attempt to get length of a number value");
}

#[test]
fn division_and_modulo_by_zero_on_integers_error() {
    super::assert_err_contains("return 1 // 0", "'n//0'");
    super::assert_err_contains("return 1 % 0", "'n%0'");
}

#[test]
fn float_division_by_zero_yields_inf_not_an_error() {
    assert_ok(
        r#"
        assert(1 / 0 == math.huge)
        assert(-1 / 0 == -math.huge)
    "#,
    );
}

#[test]
fn error_with_table_value_preserves_the_value() {
    assert_ok(
        r#"
        local ok, err = pcall(function() error({code = 42}) end)
        assert(ok == false)
        assert(type(err) == "table")
        assert(err.code == 42)
    "#,
    );
}

#[test]
fn error_adds_position_info_by_default() {
    assert_ok(
        r#"
        local ok, err = pcall(function() error("plain") end)
        assert(ok == false)
        assert(type(err) == "string")
    "#,
    );
}

#[test]
fn error_level_zero_suppresses_position_info() {
    assert_ok(
        r#"
        local ok, err = pcall(function() error("exact", 0) end)
        assert(ok == false)
        assert(err == "exact")
    "#,
    );
}

#[test]
fn for_loop_with_zero_step_errors() {
    super::assert_err_contains("for i = 1, 10, 0 do end", "'for' step is zero");
}
