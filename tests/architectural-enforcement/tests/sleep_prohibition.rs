//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT block a thread with sleep, and may
//! only await a timer while waiting out a reconnect backoff. Everything else
//! waits on I/O or channels.

use architectural_enforcement::scan;

/// Lines around a sleep that must mention the backoff for it to be allowed
const BACKOFF_CONTEXT: usize = 15;

#[test]
fn test_no_blocking_sleep_in_production_code() {
    let violations = scan(|_, lines, pos| lines[pos].1.contains("thread::sleep("));

    assert!(
        violations.is_empty(),
        "\nBlocking sleep found in production code:\n  {}\n",
        violations.join("\n  ")
    );
}

#[test]
fn test_async_sleep_only_for_backoff() {
    let violations = scan(|_, lines, pos| {
        let line = lines[pos].1;
        if !(line.contains("sleep(") || line.contains("sleep_until(")) {
            return false;
        }
        let start = pos.saturating_sub(BACKOFF_CONTEXT);
        let end = (pos + 5).min(lines.len());
        !lines[start..end]
            .iter()
            .any(|(_, l)| l.contains("backoff") || l.contains("next_delay"))
    });

    assert!(
        violations.is_empty(),
        "\nTimer waits outside reconnect backoff (wait on I/O instead):\n  {}\n",
        violations.join("\n  ")
    );
}
