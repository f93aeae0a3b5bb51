//! Statement execution: numeric/generic `for`, `while`/`repeat`, `break`,
//! `goto`/labels, multiple assignment, and varargs (spec.md §6's AST
//! statement kinds, consumed by the evaluator in spec.md §4).

use super::assert_ok;

#[test]
fn numeric_for_counts_up_and_down() {
    assert_ok(
        r#"
        local sum = 0
        for i = 1, 5 do sum = sum + i end
        assert(sum == 15)

        local down = {}
        for i = 5, 1, -1 do down[#down + 1] = i end
        assert(down[1] == 5 and down[5] == 1)
    "#,
    );
}

#[test]
fn numeric_for_zero_step_errors() {
    super::assert_err_contains("for i = 1, 10, 0 do end", "step is zero");
}

#[test]
fn generic_for_with_ipairs_and_pairs() {
    assert_ok(
        r#"
        local t = {"a", "b", "c"}
        local out = ""
        for i, v in ipairs(t) do
            out = out .. i .. v
        end
        assert(out == "1a2b3c")
    "#,
    );
}

#[test]
fn while_and_repeat_loops() {
    assert_ok(
        r#"
        local i, sum = 0, 0
        while i < 5 do
            i = i + 1
            sum = sum + i
        end
        assert(sum == 15)

        local j = 0
        repeat
            j = j + 1
        until j >= 3
        assert(j == 3)
    "#,
    );
}

#[test]
fn break_exits_innermost_loop() {
    assert_ok(
        r#"
        local out = {}
        for i = 1, 10 do
            if i > 3 then break end
            out[#out + 1] = i
        end
        assert(#out == 3)
    "#,
    );
}

#[test]
fn goto_jumps_to_label_in_same_block() {
    assert_ok(
        r#"
        local i = 0
        ::top::
        i = i + 1
        if i < 3 then goto top end
        assert(i == 3)
    "#,
    );
}

#[test]
fn multiple_assignment_and_multiple_return() {
    assert_ok(
        r#"
        local function two() return 1, 2 end
        local a, b, c = two()
        assert(a == 1 and b == 2 and c == nil)

        local x, y = 10, 20
        x, y = y, x
        assert(x == 20 and y == 10)
    "#,
    );
}

#[test]
fn varargs_collect_and_forward() {
    assert_ok(
        r#"
        local function sum(...)
            local s = 0
            for _, v in ipairs({...}) do s = s + v end
            return s
        end
        assert(sum(1, 2, 3, 4) == 10)

        local function count(...)
            return select("#", ...)
        end
        assert(count(1, nil, 3) == 3)
    "#,
    );
}

#[test]
fn local_function_can_recurse() {
    assert_ok(
        r#"
        local function fact(n)
            if n <= 1 then return 1 end
            return n * fact(n - 1)
        end
        assert(fact(5) == 120)
    "#,
    );
}
