//! Per-line cleanup of console captures

use regex::Regex;
use std::sync::LazyLock;

// ESC[K, ESC(B, BEL and CSI sequences
static ESCAPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B\[K|\x1B\(B|\x07|\x1B\[[\x30-\x3F]*[\x20-\x2F]*[\x40-\x7E]")
        .expect("escape pattern is valid")
});

/// Right-strip, drop escape sequences, then replay carriage returns and
/// backspaces for at most `limit` steps
pub fn cleanup_line(line: &str, limit: usize) -> String {
    let mut line = ESCAPES.replace_all(line.trim_end(), "").into_owned();

    for _ in 0..limit {
        let Some((i, c)) = line.char_indices().find(|(_, c)| *c == '\r' || *c == '\x08') else {
            break;
        };
        if c == '\r' {
            line = line[i + 1..].to_string();
        } else {
            let start = line[..i].char_indices().last().map(|(j, _)| j).unwrap_or(i);
            line.replace_range(start..i + 1, "");
        }
    }

    line
}
