use memchr::memmem;
use tracing::debug;

use super::strip_patterns::{announced_length, StripPattern, STRIP_PATTERNS};

/// Removes every non-overlapping occurrence of `pattern`, scanning left to right.
/// Returns the new buffer and the number of occurrences removed.
pub fn strip_pattern(buf: &[u8], pattern: &[u8]) -> (Vec<u8>, usize) {
    if pattern.is_empty() {
        return (buf.to_vec(), 0);
    }

    let mut out = Vec::with_capacity(buf.len());
    let mut kept_from = 0;
    let mut removed = 0;

    // find_iter resumes after each match, which gives the greedy scan we need
    for idx in memmem::find_iter(buf, pattern) {
        out.extend_from_slice(&buf[kept_from..idx]);
        kept_from = idx + pattern.len();
        removed += 1;
    }
    out.extend_from_slice(&buf[kept_from..]);

    (out, removed)
}

/// Result of running the stripper for a number of passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub buffer: Vec<u8>,
    /// Occurrences removed in each pass, in pass order.
    pub removed_per_pass: Vec<usize>,
}

impl Stripped {
    pub fn total_removed(&self) -> usize {
        self.removed_per_pass.iter().sum()
    }
}

/// Strips an ordered pattern table from byte buffers.
#[derive(Debug, Clone, Copy)]
pub struct SequenceStripper<'a> {
    patterns: &'a [StripPattern],
}

impl Default for SequenceStripper<'static> {
    fn default() -> Self {
        Self::new(&STRIP_PATTERNS)
    }
}

impl<'a> SequenceStripper<'a> {
    pub fn new(patterns: &'a [StripPattern]) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &'a [StripPattern] {
        self.patterns
    }

    /// One full pass: every pattern in table order, each applied to the output
    /// of the previous one.
    pub fn pass(&self, buf: &[u8]) -> (Vec<u8>, usize) {
        let mut current = buf.to_vec();
        let mut removed = 0;
        for pattern in self.patterns {
            let (next, n) = strip_pattern(&current, pattern);
            if n > 0 {
                debug!(
                    target: "sequence_stripper",
                    chunk_len = announced_length(pattern),
                    occurrences = n,
                    "Stripped pattern"
                );
            }
            removed += n;
            current = next;
        }
        (current, removed)
    }

    /// Runs exactly `passes` full passes.
    pub fn strip(&self, buf: &[u8], passes: usize) -> Stripped {
        let mut buffer = buf.to_vec();
        let mut removed_per_pass = Vec::with_capacity(passes);
        for _ in 0..passes {
            let (next, removed) = self.pass(&buffer);
            removed_per_pass.push(removed);
            buffer = next;
        }
        Stripped {
            buffer,
            removed_per_pass,
        }
    }

    /// Repeats full passes until one removes nothing or `max_passes` is hit.
    /// The final, empty pass is included in `removed_per_pass` when reached.
    pub fn strip_until_stable(&self, buf: &[u8], max_passes: usize) -> (Stripped, bool) {
        let mut buffer = buf.to_vec();
        let mut removed_per_pass = Vec::new();
        let mut converged = false;
        while removed_per_pass.len() < max_passes {
            let (next, removed) = self.pass(&buffer);
            removed_per_pass.push(removed);
            buffer = next;
            if removed == 0 {
                converged = true;
                break;
            }
        }
        (
            Stripped {
                buffer,
                removed_per_pass,
            },
            converged,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: [u8; 4] = [4, 130, 1, 11];
    const SECOND_LAST: [u8; 4] = [4, 130, 3, 232];
    const LAST: [u8; 4] = [4, 130, 4, 0];

    #[test]
    fn removes_all_non_overlapping_occurrences() {
        let (out, n) = strip_pattern(b"abXYcdXYXYe", b"XY");
        assert_eq!(out, b"abcde");
        assert_eq!(n, 3);
    }

    #[test]
    fn scan_does_not_revisit_consumed_bytes() {
        // "aaaaa" holds four overlapping "aa" windows but only two disjoint ones
        let (out, n) = strip_pattern(b"aaaaa", b"aa");
        assert_eq!(out, b"a");
        assert_eq!(n, 2);
    }

    #[test]
    fn short_and_empty_inputs_pass_through() {
        assert_eq!(strip_pattern(b"", &LAST), (Vec::new(), 0));
        assert_eq!(strip_pattern(&[4, 130, 4], &LAST), (vec![4, 130, 4], 0));
        assert_eq!(strip_pattern(b"abc", b""), (b"abc".to_vec(), 0));
    }

    #[test]
    fn unknown_prefix_is_left_alone() {
        let input = [b'x', 4, 130, 4, 1, b'y'];
        let (out, removed) = SequenceStripper::default().pass(&input);
        assert_eq!(out, input);
        assert_eq!(removed, 0);
    }

    #[test]
    fn later_pattern_exposed_in_same_pass() {
        // removing FIRST exposes SECOND_LAST, which is scanned later in the same pass
        let mut input = vec![4, 130];
        input.extend_from_slice(&FIRST);
        input.extend_from_slice(&SECOND_LAST[2..]);
        let (out, removed) = SequenceStripper::default().pass(&input);
        assert!(out.is_empty());
        assert_eq!(removed, 2);
    }

    #[test]
    fn earlier_pattern_exposed_needs_second_pass() {
        // LAST splits FIRST; FIRST is only whole after LAST is gone
        let mut input = vec![b'<', 4, 130];
        input.extend_from_slice(&LAST);
        input.extend_from_slice(&[1, 11, b'>']);

        let stripper = SequenceStripper::default();
        let once = stripper.strip(&input, 1);
        let mut expected_once = vec![b'<'];
        expected_once.extend_from_slice(&FIRST);
        expected_once.push(b'>');
        assert_eq!(once.buffer, expected_once);

        let twice = stripper.strip(&input, 2);
        assert_eq!(twice.buffer, b"<>");
        assert_eq!(twice.removed_per_pass, vec![1, 1]);
        assert_eq!(twice.total_removed(), 2);
    }

    #[test]
    fn three_level_nesting_needs_third_pass() {
        // LAST splits SECOND_LAST, which splits FIRST
        let input = [4, 130, 4, 130, 4, 130, 4, 0, 3, 232, 1, 11];
        let stripper = SequenceStripper::default();

        let twice = stripper.strip(&input, 2);
        assert_eq!(twice.buffer, FIRST);

        let (stable, converged) = stripper.strip_until_stable(&input, 10);
        assert!(converged);
        assert!(stable.buffer.is_empty());
        assert_eq!(stable.removed_per_pass, vec![1, 1, 1, 0]);
    }

    #[test]
    fn stable_strip_respects_max_passes() {
        let input = [4, 130, 4, 130, 4, 130, 4, 0, 3, 232, 1, 11];
        let (partial, converged) = SequenceStripper::default().strip_until_stable(&input, 2);
        assert!(!converged);
        assert_eq!(partial.removed_per_pass.len(), 2);
        assert_eq!(partial.buffer, FIRST);
    }

    #[test]
    fn zero_passes_copies_input() {
        let input = [4, 130, 4, 0, 9];
        let stripped = SequenceStripper::default().strip(&input, 0);
        assert_eq!(stripped.buffer, input);
        assert!(stripped.removed_per_pass.is_empty());
    }

    #[test]
    fn custom_table() {
        let table = [[b'a', b'b', b'c', b'd']];
        let stripper = SequenceStripper::new(&table);
        let (out, removed) = stripper.pass(b"xabcdyabcd");
        assert_eq!(out, b"xy");
        assert_eq!(removed, 2);
        assert_eq!(stripper.patterns().len(), 1);
    }
}
