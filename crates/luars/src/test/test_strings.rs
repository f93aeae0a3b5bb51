//! `string` library: indexing, case, repetition (spec.md §4.3.1).

use super::assert_ok;

#[test]
fn sub_handles_positive_and_negative_indices() {
    assert_ok(
        r#"
        assert(string.sub("hello world", 1, 5) == "hello")
        assert(string.sub("hello world", -5) == "world")
        assert(string.sub("hello", 2) == "ello")
        assert(string.sub("hello", -100, 100) == "hello")
        assert(string.sub("hello", 3, 2) == "")
    "#,
    );
}

#[test]
fn case_conversion_and_reverse() {
    assert_ok(
        r#"
        assert(string.upper("abc") == "ABC")
        assert(string.lower("ABC") == "abc")
        assert(string.reverse("abc") == "cba")
    "#,
    );
}

#[test]
fn rep_with_separator() {
    assert_ok(
        r#"
        assert(string.rep("ab", 3) == "ababab")
        assert(string.rep("ab", 3, "-") == "ab-ab-ab")
        assert(string.rep("x", 0) == "")
    "#,
    );
}

#[test]
fn byte_and_char_roundtrip() {
    assert_ok(
        r#"
        assert(string.byte("A") == 65)
        assert(string.char(65, 66, 67) == "ABC")
        local a, b, c = string.byte("ABC", 1, 3)
        assert(a == 65 and b == 66 and c == 67)
    "#,
    );
}

#[test]
fn len_counts_bytes() {
    assert_ok(r#"assert(string.len("hello") == 5)"#);
}

#[test]
fn string_methods_via_colon_syntax() {
    assert_ok(
        r#"
        local s = "Hello"
        assert(s:upper() == "HELLO")
        assert(s:len() == 5)
        assert(("%d"):format(5) == "5")
    "#,
    );
}

#[test]
fn find_plain_text_disables_pattern_matching() {
    assert_ok(
        r#"
        local s, e = string.find("a.b.c", ".", 1, true)
        assert(s == 2 and e == 2)
    "#,
    );
}
