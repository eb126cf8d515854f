//! The unified find-interface over literal and regex matching.
//!
//! Patterns without metacharacters take the literal path: a straight SIMD
//! substring scan, or a fold-on-the-fly scan when case is ignored. Everything
//! else compiles to an NFA; when the pattern starts with at least two literal
//! bytes, that prefix gates the NFA behind a SIMD scan, so lines that cannot
//! match are rejected without ever touching the automaton.

use crate::errors::CompileError;
use crate::regex::{is_literal_pattern, Regex};
use crate::results::MatchSpan;
use crate::simd;

/// How a pattern gets matched.
#[derive(Debug, Clone)]
enum MatchStrategy {
    /// Plain substring; lowercased ahead of time when folding case.
    Literal(Vec<u8>),
    Regex(Regex),
}

/// A compiled search pattern with its matching options.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    strategy: MatchStrategy,
    ignore_case: bool,
    word_boundary: bool,
}

impl PatternMatcher {
    pub fn new(
        pattern: &[u8],
        ignore_case: bool,
        word_boundary: bool,
    ) -> Result<Self, CompileError> {
        let strategy = if is_literal_pattern(pattern) {
            let mut needle = pattern.to_vec();
            if ignore_case {
                needle.make_ascii_lowercase();
            }
            MatchStrategy::Literal(needle)
        } else {
            MatchStrategy::Regex(Regex::compile(pattern, ignore_case)?)
        };
        Ok(PatternMatcher {
            strategy,
            ignore_case,
            word_boundary,
        })
    }

    /// True when the pattern runs as a plain substring search.
    pub fn is_literal(&self) -> bool {
        matches!(self.strategy, MatchStrategy::Literal(_))
    }

    /// Returns the leftmost match in `haystack`, or `None`.
    pub fn find_first(&self, haystack: &[u8]) -> Option<MatchSpan> {
        match &self.strategy {
            MatchStrategy::Literal(needle) => self.find_literal(haystack, needle),
            MatchStrategy::Regex(program) => self.find_regex(haystack, program),
        }
    }

    fn find_literal(&self, haystack: &[u8], needle: &[u8]) -> Option<MatchSpan> {
        let mut from = 0;
        loop {
            let start = self.scan(haystack, needle, from)?;
            let m = MatchSpan::new(start, start + needle.len());
            if !self.word_boundary || is_word_bounded(haystack, &m) {
                return Some(m);
            }
            // Retry past the rejected candidate; the max() guarantees
            // progress even for zero-length needles.
            from = m.end.max(m.start + 1);
        }
    }

    fn find_regex(&self, haystack: &[u8], program: &Regex) -> Option<MatchSpan> {
        let prefix = program.literal_prefix();
        let mut p = 0;
        while p <= haystack.len() {
            if let Some(prefix) = prefix {
                // Every match starts with the prefix, so prefix positions
                // are the only candidate starts worth simulating.
                p = self.scan(haystack, prefix, p)?;
            }
            if !self.word_boundary || edge_ok(haystack, p) {
                let end = if self.word_boundary {
                    program.match_at_filtered(haystack, p, |e| edge_ok(haystack, e))
                } else {
                    program.match_at(haystack, p)
                };
                if let Some(end) = end {
                    return Some(MatchSpan::new(p, end));
                }
            }
            p += 1;
        }
        None
    }

    /// Substring scan from `from`, folding case when configured.
    fn scan(&self, haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
        if self.ignore_case {
            find_folded(haystack, needle, from)
        } else {
            simd::find_substring_from(haystack, needle, from)
        }
    }
}

/// Case-insensitive scan: `needle` is pre-lowercased, haystack bytes are
/// folded on the fly (ASCII only).
fn find_folded(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    let n = needle.len();
    if from + n > haystack.len() {
        return None;
    }
    (from..=haystack.len() - n).find(|&i| haystack[i..i + n].eq_ignore_ascii_case(needle))
}

/// A word byte is ASCII alphanumeric, `_`, or any byte >= 0x80. Treating all
/// non-ASCII bytes as word bytes keeps multi-byte ideographs intact; the
/// trade-off is that non-ASCII punctuation also counts as word material.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// True when the boundary between `haystack[pos - 1]` and `haystack[pos]`
/// separates word from non-word, or lies against either end of the haystack.
fn edge_ok(haystack: &[u8], pos: usize) -> bool {
    if pos == 0 || pos >= haystack.len() {
        return true;
    }
    is_word_byte(haystack[pos - 1]) != is_word_byte(haystack[pos])
}

fn is_word_bounded(haystack: &[u8], m: &MatchSpan) -> bool {
    edge_ok(haystack, m.start) && edge_ok(haystack, m.end)
}
