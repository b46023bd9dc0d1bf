//! Multi-line aware prefix insertion
//!
//! Every line of a message gets the prefix, except a trailing empty segment
//! (so a message ending in `\n` does not produce a dangling prefix) and,
//! when asked, the first line (the stream is mid-line and the text continues
//! what is already there).

use std::ops::{BitOr, BitOrAssign};

/// Error code meaning "no code": never spliced into a prefix.
pub const NO_ERROR_CODE: i32 = 0;

/// How a prefix is inserted into a possibly multi-line string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertMode(u8);

impl InsertMode {
    /// No special handling: every line is prefixed.
    pub const NONE: InsertMode = InsertMode(0);
    /// Prefix every line regardless of history; clears every other bit.
    pub const ALWAYS: InsertMode = InsertMode(1);
    /// Let the stream's newline state decide whether line 0 is prefixed.
    pub const SMART: InsertMode = InsertMode(1 << 1);
    /// Insert spaces of the prefix's width instead of the prefix itself.
    pub const BLANK: InsertMode = InsertMode(1 << 2);
    /// Leave line 0 alone.
    pub const SKIP_FIRST_LINE: InsertMode = InsertMode(1 << 3);

    #[inline]
    pub fn contains(&self, other: InsertMode) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for InsertMode {
    type Output = InsertMode;

    fn bitor(self, rhs: InsertMode) -> InsertMode {
        InsertMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for InsertMode {
    fn bitor_assign(&mut self, rhs: InsertMode) {
        self.0 |= rhs.0;
    }
}

/// Splice `" #<code>:"` in front of the single colon of `prefix`.
///
/// Prefixes without exactly one colon, and codes that are not positive, are
/// returned unchanged: `"Error: "` with 42 becomes `"Error #42: "`.
pub fn splice_error_code(prefix: &str, error_code: i32) -> String {
    if error_code <= NO_ERROR_CODE {
        return prefix.to_string();
    }
    let mut parts = prefix.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(head), Some(tail), None) => format!("{} #{}:{}", head, error_code, tail),
        _ => prefix.to_string(),
    }
}

/// Insert `prefix` in front of each line of `s`.
///
/// Pure; an empty prefix returns `s` untouched.
pub fn insert_prefix(s: &str, prefix: &str, mode: InsertMode, error_code: i32) -> String {
    if prefix.is_empty() {
        return s.to_string();
    }
    let mode = if mode.contains(InsertMode::ALWAYS) {
        InsertMode::NONE
    } else {
        mode
    };

    let prefix = splice_error_code(prefix, error_code);
    let blank = " ".repeat(prefix.chars().count());
    let lead = if mode.contains(InsertMode::BLANK) {
        blank.as_str()
    } else {
        prefix.as_str()
    };

    let line_count = s.split('\n').count();
    let mut out = String::with_capacity(s.len() + line_count * lead.len());
    for (idx, line) in s.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let trailing_empty = idx == line_count - 1 && line.is_empty();
        let skipped_first = idx == 0 && mode.contains(InsertMode::SKIP_FIRST_LINE);
        if !trailing_empty && !skipped_first {
            out.push_str(lead);
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        assert_eq!(insert_prefix("hi", "Note: ", InsertMode::NONE, 0), "Note: hi");
    }

    #[test]
    fn test_trailing_newline_not_prefixed() {
        assert_eq!(
            insert_prefix("one\ntwo\n", "Note: ", InsertMode::NONE, 0),
            "Note: one\nNote: two\n"
        );
    }

    #[test]
    fn test_empty_prefix_is_noop() {
        assert_eq!(insert_prefix("a\nb", "", InsertMode::ALWAYS, 7), "a\nb");
    }

    #[test]
    fn test_skip_first_line() {
        assert_eq!(
            insert_prefix("tail\nnext\n", "Note: ", InsertMode::SKIP_FIRST_LINE, 0),
            "tail\nNote: next\n"
        );
    }

    #[test]
    fn test_always_clears_skip_and_blank() {
        let mode = InsertMode::ALWAYS | InsertMode::SKIP_FIRST_LINE | InsertMode::BLANK;
        assert_eq!(insert_prefix("a\nb", "X: ", mode, 0), "X: a\nX: b");
    }

    #[test]
    fn test_blank_insert() {
        assert_eq!(
            insert_prefix("a\nb\n", "Error: ", InsertMode::BLANK, 0),
            "       a\n       b\n"
        );
    }

    #[test]
    fn test_blank_with_skip_first() {
        assert_eq!(
            insert_prefix("a\nb", "Err: ", InsertMode::BLANK | InsertMode::SKIP_FIRST_LINE, 0),
            "a\n     b"
        );
    }

    #[test]
    fn test_error_code_splicing() {
        assert_eq!(splice_error_code("Error: ", 42), "Error #42: ");
        assert_eq!(splice_error_code("Error: ", NO_ERROR_CODE), "Error: ");
        assert_eq!(splice_error_code("a:b:c", 42), "a:b:c");
        assert_eq!(splice_error_code("Plain ", 42), "Plain ");
        assert_eq!(
            insert_prefix("disk full\n", "Error: ", InsertMode::NONE, 42),
            "Error #42: disk full\n"
        );
    }

    #[test]
    fn test_blank_width_tracks_spliced_prefix() {
        assert_eq!(
            insert_prefix("x", "Issue: ", InsertMode::BLANK, 7),
            " ".repeat("Issue #7: ".len()) + "x"
        );
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(insert_prefix("", "Note: ", InsertMode::NONE, 0), "");
        assert_eq!(insert_prefix("\n", "Note: ", InsertMode::NONE, 0), "Note: \n");
    }
}
