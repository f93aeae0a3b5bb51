//! `require`/`package.preload` module loading (spec.md §4.7, §8
//! scenario 5).

use super::assert_ok;

#[test]
fn require_runs_preload_loader_once_and_caches_result() {
    assert_ok(
        r#"
        local runs = 0
        package.preload["mymod"] = function(name)
            runs = runs + 1
            assert(name == "mymod")
            return {value = 99}
        end
        local m1 = require("mymod")
        local m2 = require("mymod")
        assert(m1 == m2)
        assert(m1.value == 99)
        assert(runs == 1)
    "#,
    );
}

#[test]
fn require_stores_true_when_loader_returns_nothing() {
    assert_ok(
        r#"
        package.preload["noop"] = function() end
        local m = require("noop")
        assert(m == true)
        assert(package.loaded["noop"] == true)
    "#,
    );
}

#[test]
fn require_of_unknown_module_errors() {
    super::assert_err_contains(r#"require("definitely_not_a_real_module")"#, "module 'definitely_not_a_real_module' not found");
}

#[test]
fn require_propagates_loader_errors_without_caching() {
    assert_ok(
        r#"
        local attempts = 0
        package.preload["bad"] = function()
            attempts = attempts + 1
            error("boom in loader")
        end
        local ok1, err1 = pcall(require, "bad")
        assert(ok1 == false)
        assert(string.find(err1, "boom in loader") ~= nil)
        assert(package.loaded["bad"] == nil)
    "#,
    );
}
