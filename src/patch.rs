//! Line patches: the wire format relayed between editor, hub and viewers.
//!
//! A patch is a `\n`-separated list of records. A record starting with `+`
//! appends its remainder (plus a newline) to the buffer; a record starting with
//! `-` removes the first textual occurrence of its remainder (plus a newline).
//! Every other record is skipped.
//!
//! Removal matches text, not positions. With duplicate lines the earliest copy
//! goes, and a needle may match the tail of a longer line (`-x` turns `ax\n`
//! into `a`). Editor integrations rely on this exact behaviour.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One parsed patch record, borrowing its operand from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp<'a> {
    /// `+line`: append `line\n`.
    Insert(&'a str),
    /// `-line`: remove the first `line\n`.
    Remove(&'a str),
    /// Empty record or unknown operator.
    Skip,
}

impl<'a> PatchOp<'a> {
    pub fn parse(record: &'a str) -> Self {
        if let Some(rest) = record.strip_prefix('+') {
            PatchOp::Insert(rest)
        } else if let Some(rest) = record.strip_prefix('-') {
            PatchOp::Remove(rest)
        } else {
            PatchOp::Skip
        }
    }
}

/// Iterate the records of a patch payload in order.
pub fn ops(patch: &str) -> impl Iterator<Item = PatchOp<'_>> {
    patch.split('\n').map(PatchOp::parse)
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Per-patch counters, logged by the handler and the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatchStats {
    pub inserted: usize,
    pub removed: usize,
    /// `-` records whose line was not in the buffer.
    pub missing: usize,
    pub skipped: usize,
}

impl PatchStats {
    /// Records that changed the buffer.
    pub fn applied(&self) -> usize {
        self.inserted + self.removed
    }
}

/// Apply `patch` to `buffer` in place.
///
/// Never fails: unknown records are skipped and removals of absent lines are
/// no-ops. Both are reflected in the returned stats.
pub fn apply(buffer: &mut String, patch: &str) -> PatchStats {
    let mut stats = PatchStats::default();
    for op in ops(patch) {
        match op {
            PatchOp::Insert(line) => {
                buffer.push_str(line);
                buffer.push('\n');
                stats.inserted += 1;
            }
            PatchOp::Remove(line) => {
                if remove_first(buffer, line) {
                    stats.removed += 1;
                } else {
                    stats.missing += 1;
                }
            }
            PatchOp::Skip => stats.skipped += 1,
        }
    }
    stats
}

/// Remove the first occurrence of `line\n` from `buffer`.
fn remove_first(buffer: &mut String, line: &str) -> bool {
    let mut needle = String::with_capacity(line.len() + 1);
    needle.push_str(line);
    needle.push('\n');
    match buffer.find(&needle) {
        Some(at) => {
            buffer.replace_range(at..at + needle.len(), "");
            true
        }
        None => false,
    }
}

/// Filler used to carry a trailing fragment through a snapshot.
const SENTINEL: char = '\u{1}';

/// Build a patch that recreates `text` exactly when applied to an empty buffer.
///
/// Whole lines become `+line` records. Only the tail can lack a `\n`; it is
/// sent as `+fragment<S>` then `-<S>`, where `<S>` is a run of [`SENTINEL`]
/// longer than any run in `text`, so `<S>\n` can only match at the tail.
pub fn snapshot(text: &str) -> String {
    let mut records: Vec<String> = Vec::new();
    for line in text.split_inclusive('\n') {
        match line.strip_suffix('\n') {
            Some(whole) => records.push(format!("+{whole}")),
            None => {
                let fill = sentinel_for(text);
                records.push(format!("+{line}{fill}"));
                records.push(format!("-{fill}"));
            }
        }
    }
    records.join("\n")
}

fn sentinel_for(text: &str) -> String {
    let longest = text
        .split(|c| c != SENTINEL)
        .map(str::len)
        .max()
        .unwrap_or(0);
    SENTINEL.to_string().repeat(longest + 1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn applied(start: &str, patch: &str) -> (String, PatchStats) {
        let mut buf = start.to_string();
        let stats = apply(&mut buf, patch);
        (buf, stats)
    }

    // -- PatchOp::parse ------------------------------------------------------

    #[rstest]
    #[case("+Hello", PatchOp::Insert("Hello"))]
    #[case("-Hello", PatchOp::Remove("Hello"))]
    #[case("+", PatchOp::Insert(""))]
    #[case("-", PatchOp::Remove(""))]
    #[case("++x", PatchOp::Insert("+x"))]
    #[case("-+x", PatchOp::Remove("+x"))]
    #[case("", PatchOp::Skip)]
    #[case(" +x", PatchOp::Skip)]
    #[case("*x", PatchOp::Skip)]
    #[case("@@ -1 +1 @@", PatchOp::Skip)]
    fn test_parse_record(#[case] record: &str, #[case] expected: PatchOp<'static>) {
        assert_eq!(PatchOp::parse(record), expected);
    }

    #[test]
    fn test_ops_preserves_order() {
        let parsed: Vec<_> = ops("+a\n-b\n?c").collect();
        assert_eq!(
            parsed,
            vec![PatchOp::Insert("a"), PatchOp::Remove("b"), PatchOp::Skip]
        );
    }

    #[test]
    fn test_ops_trailing_newline_yields_empty_record() {
        assert_eq!(ops("+a\n").count(), 2);
    }

    // -- apply ---------------------------------------------------------------

    #[test]
    fn test_insert_appends_line_with_newline() {
        let (buf, stats) = applied("", "+Hello");
        assert_eq!(buf, "Hello\n");
        assert_eq!(stats.inserted, 1);
    }

    #[test]
    fn test_sequential_scenario() {
        let mut buf = String::new();
        apply(&mut buf, "+Hello");
        assert_eq!(buf, "Hello\n");
        apply(&mut buf, "+World");
        assert_eq!(buf, "Hello\nWorld\n");
        apply(&mut buf, "-Hello");
        assert_eq!(buf, "World\n");
    }

    #[test]
    fn test_missing_removal_is_noop_alongside_insert() {
        let (buf, stats) = applied("X\n", "+A\n-B");
        assert_eq!(buf, "X\nA\n");
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.removed, 0);
    }

    #[test]
    fn test_remove_first_of_duplicates() {
        let (buf, _) = applied("a\nb\na\n", "-a");
        assert_eq!(buf, "b\na\n");
    }

    #[test]
    fn test_remove_matches_tail_of_longer_line() {
        let (buf, stats) = applied("ax\ny\n", "-x");
        assert_eq!(buf, "ay\n");
        assert_eq!(stats.removed, 1);
    }

    #[test]
    fn test_remove_empty_operand_removes_first_newline() {
        let (buf, _) = applied("a\n\nb\n", "-");
        assert_eq!(buf, "a\nb\n");
    }

    #[test]
    fn test_remove_requires_trailing_newline() {
        let (buf, stats) = applied("tail", "-tail");
        assert_eq!(buf, "tail");
        assert_eq!(stats.missing, 1);
    }

    #[test]
    fn test_insert_then_remove_in_one_patch_restores() {
        let (buf, _) = applied("keep\n", "+tmp\n-tmp");
        assert_eq!(buf, "keep\n");
    }

    #[test]
    fn test_unknown_records_skipped() {
        let (buf, stats) = applied("a\n", "\n#comment\n =x\n");
        assert_eq!(buf, "a\n");
        assert_eq!(stats.skipped, 4);
        assert_eq!(stats.applied(), 0);
    }

    #[test]
    fn test_empty_patch_counts_one_skipped_record() {
        let (buf, stats) = applied("a\n", "");
        assert_eq!(buf, "a\n");
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_carriage_return_is_part_of_the_line() {
        let (buf, _) = applied("", "+a\r");
        assert_eq!(buf, "a\r\n");
        let (after, stats) = applied(&buf, "-a");
        assert_eq!(after, "a\r\n");
        assert_eq!(stats.missing, 1);
    }

    #[test]
    fn test_multibyte_lines() {
        let (buf, _) = applied("", "+héllo\n+世界\n-héllo");
        assert_eq!(buf, "世界\n");
    }

    // -- snapshot ------------------------------------------------------------

    #[test]
    fn test_snapshot_empty_is_empty_patch() {
        assert_eq!(snapshot(""), "");
    }

    #[test]
    fn test_snapshot_rebuilds_buffer() {
        let text = "# Title\n\n- item\n+plus\n";
        let (buf, _) = applied("", &snapshot(text));
        assert_eq!(buf, text);
    }

    #[test]
    fn test_snapshot_rebuilds_trailing_fragment_exactly() {
        let (buf, _) = applied("", &snapshot("a\nb"));
        assert_eq!(buf, "a\nb");
    }

    #[test]
    fn test_snapshot_fragment_only_buffer() {
        let (buf, stats) = applied("", &snapshot("a"));
        assert_eq!(buf, "a");
        assert_eq!(stats.missing, 0);
    }

    #[test]
    fn test_snapshot_fragment_after_cross_line_removal() {
        let (text, _) = applied("", "+ax\n-x");
        assert_eq!(text, "a");
        let (mut replica, _) = applied("", &snapshot(&text));
        assert_eq!(replica, text);
        apply(&mut replica, "+b");
        assert_eq!(replica, "ab\n");
    }

    #[test]
    fn test_snapshot_sentinel_outgrows_existing_runs() {
        let text = "\u{1}\u{1}\n\u{1}x\u{1}";
        let (buf, _) = applied("", &snapshot(text));
        assert_eq!(buf, text);
    }

    #[test]
    fn test_sentinel_for_is_longer_than_any_run() {
        assert_eq!(sentinel_for("plain"), "\u{1}");
        assert_eq!(sentinel_for("a\u{1}\u{1}b\u{1}"), "\u{1}\u{1}\u{1}");
    }
}
