//! The `utf8` library (spec.md §5 supplemented surface).

use super::assert_ok;

#[test]
fn char_and_codepoint_roundtrip() {
    assert_ok(
        r#"
        local s = utf8.char(104, 233, 108, 108, 111)
        assert(utf8.codepoint(s, 1, #s) == 104)
        local cps = {utf8.codepoint(s, 1, #s)}
        assert(#cps == 5)
        assert(cps[2] == 233)
    "#,
    );
}

#[test]
fn len_counts_codepoints_not_bytes() {
    assert_ok(
        r#"
        local s = utf8.char(0x48, 0xE9, 0x6C)
        assert(#s == 4)
        assert(utf8.len(s) == 3)
    "#,
    );
}

#[test]
fn len_reports_invalid_position_on_bad_byte() {
    assert_ok(
        r#"
        local ok, pos = utf8.len("\xff\xff")
        assert(ok == nil)
        assert(pos == 1)
    "#,
    );
}

#[test]
fn codes_iterates_codepoints_with_byte_positions() {
    assert_ok(
        r#"
        local s = utf8.char(0x41, 0xE9)
        local positions = {}
        local codepoints = {}
        for p, c in utf8.codes(s) do
            positions[#positions + 1] = p
            codepoints[#codepoints + 1] = c
        end
        assert(#positions == 2)
        assert(positions[1] == 1)
        assert(codepoints[1] == 0x41)
        assert(codepoints[2] == 0xE9)
    "#,
    );
}

#[test]
fn offset_finds_character_boundaries() {
    assert_ok(
        r#"
        local s = utf8.char(0x41, 0xE9, 0x42)
        assert(utf8.offset(s, 1) == 1)
        assert(utf8.offset(s, 2) == 2)
        assert(utf8.offset(s, 3) == 4)
    "#,
    );
}

#[test]
fn char_rejects_out_of_range_codepoint() {
    super::assert_err_contains("utf8.char(0x110000)", "value out of range");
}
