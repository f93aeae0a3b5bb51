//! Lua pattern matching (spec.md §4.3.1, §8 scenario 2).

use super::assert_ok;

#[test]
fn literal_and_class_atoms() {
    assert_ok(
        r#"
        assert(string.match("hello123", "%a+") == "hello")
        assert(string.match("hello123", "%d+") == "123")
        assert(string.match("  spaced  ", "%s+") == "  ")
    "#,
    );
}

#[test]
fn anchors_only_match_at_extremes() {
    assert_ok(
        r#"
        assert(string.match("hello", "^hel") == "hel")
        assert(string.match("hello", "llo$") == "llo")
        assert(string.match("hello", "^xyz") == nil)
    "#,
    );
}

#[test]
fn quantifiers_greedy_lazy_and_optional() {
    assert_ok(
        r#"
        assert(string.match("<a><b>", "<(.-)>") == "a")
        assert(string.match("<a><b>", "<(.*)>") == "a><b")
        assert(string.match("color", "colou?r") == "color")
        assert(string.match("colour", "colou?r") == "colour")
        assert(string.match("aaa", "a-") == "")
    "#,
    );
}

#[test]
fn character_sets_with_ranges_and_complement() {
    assert_ok(
        r#"
        assert(string.match("abc123", "[a-c]+") == "abc")
        assert(string.match("abc123", "[^a-c]+") == "123")
    "#,
    );
}

#[test]
fn set_with_literal_closing_bracket_as_first_member() {
    assert_ok(
        r#"
        assert(string.match("a]b", "[]ab]+") == "a]b")
        assert(string.match("x]y", "[^]ab]+") == "x")
    "#,
    );
}

#[test]
fn captures_and_find_positions() {
    assert_ok(
        r#"
        local s, e, a, b = string.find("abc123", "(%a+)(%d+)")
        assert(s == 1 and e == 6 and a == "abc" and b == "123")
    "#,
    );
}

#[test]
fn position_capture() {
    assert_ok(
        r#"
        local pos = string.match("hello", "l()")
        assert(pos == 3)
    "#,
    );
}

#[test]
fn balanced_match() {
    assert_ok(
        r#"
        assert(string.match("(hello (world))", "%b()") == "(hello (world))")
    "#,
    );
}

#[test]
fn frontier_pattern() {
    assert_ok(
        r#"
        local count = 0
        for w in string.gmatch("THE (quick) fox", "%f[%a]%u+%f[%A]") do
            count = count + 1
            assert(w == "THE")
        end
        assert(count == 1)
    "#,
    );
}

#[test]
fn backreference_in_pattern() {
    assert_ok(
        r#"
        assert(string.match("abcabc", "(abc)%1") == "abcabc")
        assert(string.match("abcxyz", "(abc)%1") == nil)
    "#,
    );
}

#[test]
fn gmatch_iterates_all_matches() {
    assert_ok(
        r#"
        local words = {}
        for w in string.gmatch("the quick brown fox", "%a+") do
            words[#words + 1] = w
        end
        assert(#words == 4)
        assert(words[1] == "the" and words[4] == "fox")
    "#,
    );
}

#[test]
fn gsub_with_string_replacement_and_backrefs() {
    assert_ok(
        r#"
        local s, n = string.gsub("hello world", "o", "0")
        assert(s == "hell0 w0rld" and n == 2)

        local s2 = string.gsub("hello world", "(%a+) (%a+)", "%2 %1")
        assert(s2 == "world hello")
    "#,
    );
}

#[test]
fn gsub_respects_replacement_count_limit() {
    assert_ok(
        r#"
        local s, n = string.gsub("aaaa", "a", "b", 2)
        assert(s == "bbaa" and n == 2)
    "#,
    );
}

#[test]
fn gsub_with_table_replacement() {
    assert_ok(
        r#"
        local map = {cat = "dog"}
        local s = string.gsub("cat", "%a+", map)
        assert(s == "dog")
    "#,
    );
}

#[test]
fn gsub_with_function_replacement_nil_keeps_original() {
    assert_ok(
        r#"
        local s = string.gsub("abc", "%a", function(c)
            if c == "b" then return nil end
            return c:upper()
        end)
        assert(s == "AbC")
    "#,
    );
}
