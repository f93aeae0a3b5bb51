//! `string.pack`/`string.unpack`/`string.packsize` (spec.md §4.3.3,
//! §8 scenario 3).

use super::assert_ok;

#[test]
fn pack_big_endian_fixed_width_int() {
    assert_ok(
        r#"
        local s = string.pack(">I4", 0x01020304)
        assert(#s == 4)
        assert(string.byte(s, 1) == 0x01)
        assert(string.byte(s, 2) == 0x02)
        assert(string.byte(s, 3) == 0x03)
        assert(string.byte(s, 4) == 0x04)
    "#,
    );
}

#[test]
fn unpack_big_endian_fixed_width_int() {
    assert_ok(
        r#"
        local v, pos = string.unpack(">I4", "\x01\x02\x03\x04")
        assert(v == 16909060)
        assert(pos == 5)
    "#,
    );
}

#[test]
fn packsize_applies_alignment_padding() {
    assert_ok(r#"assert(string.packsize("!4 b i4") == 8)"#);
}

#[test]
fn pack_unpack_roundtrip_various_widths() {
    assert_ok(
        r#"
        local fmts = {"<i1", "<i2", "<i4", "<i8", "<I1", "<I2", "<I4", ">i4", ">I8"}
        for _, fmt in ipairs(fmts) do
            local packed = string.pack(fmt, 42)
            local v = string.unpack(fmt, packed)
            assert(v == 42, fmt)
        end
    "#,
    );
}

#[test]
fn pack_unpack_floats() {
    assert_ok(
        r#"
        local packed = string.pack("<d", 3.5)
        local v = string.unpack("<d", packed)
        assert(v == 3.5)
    "#,
    );
}

#[test]
fn pack_fixed_string_and_null_terminated() {
    assert_ok(
        r#"
        local packed = string.pack("c5", "hi")
        assert(#packed == 5)
        local s = string.unpack("c5", packed)
        assert(s == "hi\0\0\0")

        local zpacked = string.pack("z", "hello")
        local s2, pos = string.unpack("z", zpacked)
        assert(s2 == "hello")
        assert(pos == 7)
    "#,
    );
}

#[test]
fn packsize_rejects_variable_length_formats() {
    super::assert_err_contains(r#"return string.packsize("z")"#, "variable-length format");
    super::assert_err_contains(r#"return string.packsize("s4")"#, "variable-length format");
}

#[test]
fn pack_c_string_too_long_errors() {
    super::assert_err_contains(r#"return string.pack("c2", "too long")"#, "longer than given size");
}

#[test]
fn pack_integer_overflow_errors() {
    super::assert_err_contains(r#"return string.pack("<i1", 1000)"#, "does not fit");
}
