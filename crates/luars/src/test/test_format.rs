//! `string.format` (spec.md §4.3.2, §8 scenario 1).

use super::assert_ok;

#[test]
fn basic_integer_and_string_conversions() {
    assert_ok(
        r#"
        assert(string.format("%d", 42) == "42")
        assert(string.format("%5d", 42) == "   42")
        assert(string.format("%-5d|", 42) == "42   |")
        assert(string.format("%05d", 42) == "00042")
        assert(string.format("%s", "hi") == "hi")
        assert(string.format("%10s|", "hi") == "        hi|")
        assert(string.format("%.1s", "hi") == "h")
    "#,
    );
}

#[test]
fn signed_and_unsigned_negative_numbers() {
    assert_ok(
        r#"
        assert(string.format("%d", -42) == "-42")
        assert(string.format("%+d", 42) == "+42")
        assert(string.format("% d", 42) == " 42")
    "#,
    );
}

#[test]
fn hex_octal_and_char_conversions() {
    assert_ok(
        r#"
        assert(string.format("%x", 255) == "ff")
        assert(string.format("%X", 255) == "FF")
        assert(string.format("%#x", 255) == "0xff")
        assert(string.format("%o", 8) == "10")
        assert(string.format("%c", 65) == "A")
    "#,
    );
}

#[test]
fn float_conversions() {
    assert_ok(
        r#"
        assert(string.format("%.2f", 3.14159) == "3.14")
        assert(string.format("%.0f", 3.5) == "4")
        assert(string.format("%g", 100000) == "100000")
        assert(string.format("%g", 1000000) == "1e+06")
    "#,
    );
}

#[test]
fn percent_literal_and_multiple_args() {
    assert_ok(
        r#"
        assert(string.format("100%%") == "100%")
        assert(string.format("%s=%d", "x", 5) == "x=5")
    "#,
    );
}

#[test]
fn q_quotes_strings_so_they_round_trip() {
    assert_ok(
        r#"
        local q = string.format("%q", "he said \"hi\"\n")
        local f = load("return " .. q)
        assert(f() == "he said \"hi\"\n")
    "#,
    );
}

#[test]
fn q_renders_mininteger_as_hex_literal() {
    assert_ok(r#"assert(string.format("%q", math.mininteger) == "0x8000000000000000")"#);
}

#[test]
fn invalid_conversion_errors() {
    super::assert_err_contains(r#"string.format("%y", 1)"#, "invalid conversion");
}

#[test]
fn format_requires_correct_argument_types() {
    super::assert_err_contains(r#"string.format("%d", "abc")"#, "number expected");
}
