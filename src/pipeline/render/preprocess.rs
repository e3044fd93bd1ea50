//! Line-level Markdown fixes applied before parsing.
//!
//! Chat-model output is Markdown in spirit more than in letter. Two rules run
//! in order, each a pure `&str → String` pass:
//!
//! 1. Ordered-list markers are normalised to `1.` so a list that the model
//!    numbered from, say, 3 still parses as a list starting at 1. Restarts
//!    are handled later by the numbering pass.
//! 2. A table glued to the preceding paragraph gets a blank line in front of
//!    it, otherwise the parser reads the header row as paragraph text.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_ORDERED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)\d+\.(\s|$)").unwrap());

/// Apply both rules.
pub fn preprocess_markdown(input: &str) -> String {
    let s = normalise_ordered_markers(input);
    separate_tables(&s)
}

// ── Rule 1: Ordered markers ─────────────────────────────────────────────────

fn normalise_ordered_markers(input: &str) -> String {
    input
        .split('\n')
        .map(|line| RE_ORDERED_MARKER.replace(line, "${1}1.${2}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 2: Table spacing ───────────────────────────────────────────────────

/// A line with a `|` that follows a non-blank, non-table line gets a blank
/// line before it when the next line looks like a separator row.
fn separate_tables(input: &str) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    let mut result = Vec::with_capacity(lines.len() + 4);

    for (i, line) in lines.iter().enumerate() {
        if i > 0 && line.contains('|') {
            let prev = lines[i - 1].trim();
            let next_is_separator = lines.get(i + 1).is_some_and(|n| is_separator_chars(n));
            if !prev.is_empty() && !prev.starts_with('|') && next_is_separator {
                result.push("");
            }
        }
        result.push(line);
    }

    result.join("\n")
}

/// Only `|`, `-`, `:` and spaces. A blank line qualifies.
fn is_separator_chars(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_markers_become_one() {
        let input = "3. three\n  10. ten\n7.\nv1.2 is not a marker";
        assert_eq!(
            normalise_ordered_markers(input),
            "1. three\n  1. ten\n1.\nv1.2 is not a marker"
        );
    }

    #[test]
    fn test_decimal_number_is_not_a_marker() {
        assert_eq!(normalise_ordered_markers("3.14 is pi"), "3.14 is pi");
    }

    #[test]
    fn test_table_after_paragraph_gets_blank_line() {
        let input = "Results:\n| A | B |\n|---|---|\n| 1 | 2 |";
        assert_eq!(
            separate_tables(input),
            "Results:\n\n| A | B |\n|---|---|\n| 1 | 2 |"
        );
    }

    #[test]
    fn test_table_already_separated_unchanged() {
        let input = "Results:\n\n| A | B |\n|---|---|";
        assert_eq!(separate_tables(input), input);
    }

    #[test]
    fn test_pipe_in_prose_without_separator_unchanged() {
        let input = "Intro\nuse a | b for alternatives\nmore prose";
        assert_eq!(separate_tables(input), input);
    }

    #[test]
    fn test_table_rows_do_not_split_each_other() {
        let input = "| A | B |\n|---|---|\n| 1 | 2 |";
        assert_eq!(separate_tables(input), input);
    }

    #[test]
    fn test_full_pipeline() {
        let input = "Steps:\n5. first\n6. second\nTable:\nA | B\n--|--";
        assert_eq!(
            preprocess_markdown(input),
            "Steps:\n1. first\n1. second\nTable:\n\nA | B\n--|--"
        );
    }
}
