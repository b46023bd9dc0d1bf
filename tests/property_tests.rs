//! Property-based tests for rust_output_system using proptest

use proptest::prelude::*;
use rust_output_system::prelude::*;
use rust_output_system::insert_prefix;
use std::sync::Arc;

fn any_level() -> impl Strategy<Value = Level> {
    prop_oneof![
        Just(Level::Trace),
        Just(Level::Debug),
        Just(Level::Verbose),
        Just(Level::Info),
        Just(Level::Note),
        Just(Level::Issue),
        Just(Level::Error),
        Just(Level::Fatal),
        Just(Level::Discard),
    ]
}

fn any_target() -> impl Strategy<Value = Target> {
    prop_oneof![Just(Target::Screen), Just(Target::Logfile)]
}

fn any_mode() -> impl Strategy<Value = InsertMode> {
    prop_oneof![
        Just(InsertMode::NONE),
        Just(InsertMode::SMART),
        Just(InsertMode::ALWAYS),
        Just(InsertMode::BLANK),
        Just(InsertMode::SKIP_FIRST_LINE),
        Just(InsertMode::ALWAYS | InsertMode::SKIP_FIRST_LINE),
        Just(InsertMode::BLANK | InsertMode::SKIP_FIRST_LINE),
    ]
}

// ============================================================================
// Routing
// ============================================================================

proptest! {
    /// A target hears a level exactly when it is at or above the threshold
    /// and is not Discard
    #[test]
    fn test_should_emit_matches_threshold(
        level in any_level(),
        threshold in any_level(),
        target in any_target(),
    ) {
        let output = Output::new();
        output.set_threshold(threshold, Targets::from(target));
        let expected = !(level < threshold || level == Level::Discard);
        prop_assert_eq!(output.should_emit(level, target), expected);
    }

    /// Raw level numbers clamp into the valid range
    #[test]
    fn test_level_clamp(raw in any::<i32>()) {
        let level = Level::clamp(raw);
        if raw <= 0 {
            prop_assert_eq!(level, Level::Trace);
        } else if raw >= 8 {
            prop_assert_eq!(level, Level::Discard);
        } else {
            prop_assert_eq!(level as i32, raw);
        }
    }

    /// Level names parse back to the same level
    #[test]
    fn test_level_name_roundtrip(level in any_level()) {
        let parsed: Level = level.name().to_lowercase().parse().unwrap();
        prop_assert_eq!(parsed, level);
    }
}

// ============================================================================
// Prefix composition
// ============================================================================

proptest! {
    /// An empty prefix never changes the string
    #[test]
    fn test_empty_prefix_is_identity(s in ".*", mode in any_mode(), code in 0i32..100) {
        prop_assert_eq!(insert_prefix(&s, "", mode, code), s);
    }

    /// A single non-empty line gets exactly one prefix
    #[test]
    fn test_single_line_prefixed(s in "[^\n]+", prefix in "[a-zA-Z]{1,8}: ") {
        prop_assert_eq!(
            insert_prefix(&s, &prefix, InsertMode::SMART, NO_ERROR_CODE),
            format!("{}{}", prefix, s)
        );
    }

    /// Stripping the prefix from every line gives back the original and the
    /// trailing empty segment is never prefixed
    #[test]
    fn test_multiline_roundtrip(
        lines in prop::collection::vec("[^\n]*", 1..6),
        prefix in "[a-zA-Z]{1,8}: ",
    ) {
        let s = format!("{}\n", lines.join("\n"));
        let prefixed = insert_prefix(&s, &prefix, InsertMode::NONE, NO_ERROR_CODE);
        prop_assert!(prefixed.ends_with('\n'));
        let trailing_prefix = format!("\n{}", prefix);
        prop_assert!(!prefixed.ends_with(&trailing_prefix));

        let mut restored = String::new();
        for line in prefixed.split_terminator('\n') {
            prop_assert!(line.starts_with(prefix.as_str()));
            restored.push_str(&line[prefix.len()..]);
            restored.push('\n');
        }
        prop_assert_eq!(restored, s);
    }

    /// SkipFirstLine leaves line 0 alone unless AlwaysInsert overrides it
    #[test]
    fn test_skip_first_line(
        first in "[^\n]+",
        rest in "[^\n]+",
        blank in any::<bool>(),
    ) {
        let s = format!("{}\n{}", first, rest);
        let mut mode = InsertMode::SKIP_FIRST_LINE;
        if blank {
            mode |= InsertMode::BLANK;
        }
        let lead = if blank { "      " } else { "Note: " };
        prop_assert_eq!(
            insert_prefix(&s, "Note: ", mode, NO_ERROR_CODE),
            format!("{}\n{}{}", first, lead, rest)
        );

        let always = insert_prefix(&s, "Note: ", mode | InsertMode::ALWAYS, NO_ERROR_CODE);
        prop_assert_eq!(always, format!("Note: {}\nNote: {}", first, rest));
    }

    /// Positive codes are spliced before the colon, the sentinel is not
    #[test]
    fn test_error_code_splice(code in 1i32..100_000) {
        prop_assert_eq!(
            insert_prefix("x", "Error: ", InsertMode::NONE, code),
            format!("Error #{}: x", code)
        );
        prop_assert_eq!(
            insert_prefix("x", "Error: ", InsertMode::NONE, NO_ERROR_CODE),
            "Error: x"
        );
    }
}

// ============================================================================
// Newline continuation
// ============================================================================

proptest! {
    /// The continuation flag follows the last byte written, and the next
    /// emission skips its first-line prefix exactly when it was mid-line
    #[test]
    fn test_continuation_tracks_last_byte(first in "[a-z]{1,10}\n?", second in "[a-z]{1,10}") {
        let screen = Arc::new(MemorySink::new());
        let output = Output::builder()
            .sink(LevelSelector::All, screen.clone(), Targets::SCREEN)
            .no_exit()
            .build();

        output.note(first.clone()).unwrap();
        let ended = first.ends_with('\n');
        prop_assert_eq!(output.at_newline(Target::Screen), ended);

        screen.clear();
        output.note(second.clone()).unwrap();
        let expected = if ended {
            format!("Note: {}", second)
        } else {
            second.clone()
        };
        prop_assert_eq!(screen.contents(), expected);
    }
}

// ============================================================================
// Stack trace policy
// ============================================================================

proptest! {
    /// Logfile-only, non-zero-exit traces need a terminal non-zero exit
    #[test]
    fn test_non_zero_exit_policy(
        terminal in any::<bool>(),
        exit_code in -3i32..4,
        level in any_level(),
    ) {
        let config = StackTraceConfig::LOGFILE | StackTraceConfig::NON_ZERO_EXIT;
        prop_assert_eq!(
            config.wanted(terminal, exit_code, Target::Logfile, level),
            terminal && exit_code != 0
        );
        prop_assert!(!config.wanted(terminal, exit_code, Target::Screen, level));
    }

    /// All-issues traces depend on the level only
    #[test]
    fn test_all_issues_policy(terminal in any::<bool>(), level in any_level()) {
        let config = StackTraceConfig::BOTH | StackTraceConfig::ALL_ISSUES;
        prop_assert_eq!(
            config.wanted(terminal, 0, Target::Screen, level),
            level.is_issue_class()
        );
    }
}
