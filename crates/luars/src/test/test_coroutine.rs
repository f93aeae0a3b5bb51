//! Coroutines: status machine, yield/resume value passing, `wrap`,
//! `close`, and yieldability (spec.md §4.5, §8 scenario 4).

use super::assert_ok;

#[test]
fn create_and_resume_returns_function_result() {
    assert_ok(
        r#"
        local co = coroutine.create(function() return 42 end)
        assert(type(co) == "thread")
        local ok, value = coroutine.resume(co)
        assert(ok == true)
        assert(value == 42)
    "#,
    );
}

#[test]
fn producer_consumer_yield_sequence() {
    assert_ok(
        r#"
        local co = coroutine.create(function()
            coroutine.yield(1)
            coroutine.yield(2)
            return 3
        end)

        local ok1, v1 = coroutine.resume(co)
        assert(ok1 == true and v1 == 1)

        local ok2, v2 = coroutine.resume(co)
        assert(ok2 == true and v2 == 2)

        local ok3, v3 = coroutine.resume(co)
        assert(ok3 == true and v3 == 3)

        local ok4, err = coroutine.resume(co)
        assert(ok4 == false)
        assert(err == "cannot resume dead coroutine")
    "#,
    );
}

#[test]
fn resume_arguments_become_yield_return_values() {
    assert_ok(
        r#"
        local co = coroutine.create(function(a, b)
            local c = coroutine.yield(a + b)
            return c * 2
        end)
        local ok1, sum = coroutine.resume(co, 3, 4)
        assert(ok1 == true and sum == 7)
        local ok2, doubled = coroutine.resume(co, 10)
        assert(ok2 == true and doubled == 20)
    "#,
    );
}

#[test]
fn status_transitions() {
    assert_ok(
        r#"
        local co
        co = coroutine.create(function()
            assert(coroutine.status(co) == "running")
            coroutine.yield()
        end)
        assert(coroutine.status(co) == "suspended")
        coroutine.resume(co)
        assert(coroutine.status(co) == "suspended")
        coroutine.resume(co)
        assert(coroutine.status(co) == "dead")
    "#,
    );
}

#[test]
fn error_inside_coroutine_is_returned_not_raised() {
    assert_ok(
        r#"
        local co = coroutine.create(function() error("boom") end)
        local ok, err = coroutine.resume(co)
        assert(ok == false)
        assert(string.find(err, "boom") ~= nil)
        assert(coroutine.status(co) == "dead")
    "#,
    );
}

#[test]
fn wrap_reraises_errors() {
    super::assert_err_contains(
        r#"
        local f = coroutine.wrap(function() error("wrapped boom") end)
        f()
    "#,
        "wrapped boom",
    );
}

#[test]
fn yield_outside_coroutine_errors() {
    super::assert_err_contains("coroutine.yield()", "outside a coroutine");
}

#[test]
fn yield_inside_pcall_is_rejected() {
    assert_ok(
        r#"
        local co = coroutine.create(function()
            local ok, err = pcall(function() coroutine.yield() end)
            assert(ok == false)
            assert(string.find(err, "C%-call boundary") ~= nil)
        end)
        local ok = coroutine.resume(co)
        assert(ok == true)
    "#,
    );
}

#[test]
fn isyieldable_reflects_running_context() {
    assert_ok(
        r#"
        assert(coroutine.isyieldable() == false)
        local co = coroutine.create(function()
            assert(coroutine.isyieldable() == true)
        end)
        coroutine.resume(co)
    "#,
    );
}
