//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep the chat crates honest:
//! - No blocking sleep in production code; async sleep only in backoff
//! - No `unwrap()`/`expect()` in production code
//!
//! These helpers locate the workspace sources and strip test modules so the
//! checks in `tests/` only look at code that ships.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees checked by the enforcement tests
pub const PRODUCTION_DIRS: &[&str] = &["chat/core/src", "chat/cli/src"];

/// Workspace root, derived from this crate's manifest location
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// All `.rs` files below `dir` (relative to the workspace root)
#[must_use]
pub fn rust_sources(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Lines of `content` that precede the first `#[cfg(test)]`, with numbers
///
/// Comment-only lines are skipped and trailing `//` comments removed.
#[must_use]
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
        .collect()
}

/// Scan every production file, reporting `path:line - text` for each line
/// that `violates` flags
#[must_use]
pub fn scan<F>(violates: F) -> Vec<String>
where
    F: Fn(&Path, &[(usize, &str)], usize) -> bool,
{
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        for path in rust_sources(dir) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let lines = production_lines(&content);
            for (pos, (number, line)) in lines.iter().enumerate() {
                if violates(&path, &lines, pos) {
                    violations.push(format!("{}:{} - {}", path.display(), number, line.trim()));
                }
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let src = "fn a() {}\n// note\nlet x = 1; // trailing\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(src);
        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "let x = 1; ")]);
    }

    #[test]
    fn test_workspace_sources_found() {
        assert!(!rust_sources("chat/core/src").is_empty());
    }
}
