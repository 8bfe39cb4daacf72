//! Integration Test: Panic Prohibition
//!
//! **Policy**: Production code propagates errors. `unwrap()` and `expect()`
//! are reserved for tests.

use architectural_enforcement::scan;

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let violations = scan(|_, lines, pos| {
        let line = lines[pos].1;
        line.contains(".unwrap()") || line.contains(".expect(")
    });

    assert!(
        violations.is_empty(),
        "\nunwrap()/expect() found in production code:\n  {}\n",
        violations.join("\n  ")
    );
}
