//! Recursive-descent pattern compiler.
//!
//! Grammar:
//!
//! ```text
//! expr   := term ( '|' term )*
//! term   := factor*                 (concatenation)
//! factor := atom ( '*' | '+' | '?' )?
//! atom   := '.' | '[' class ']' | '(' expr ')' | '^' | '$' | '\' ch | LITERAL
//! class  := '^'? ( ch | ch '-' ch )+
//! ```
//!
//! Each sub-expression compiles to a [`Fragment`] in the Thompson style: an
//! entry state plus a list of dangling successor slots. Concatenation patches
//! the left fragment's dangling slots to the right fragment's entry;
//! alternation and quantifiers introduce `Split` states.
//!
//! Two quirks of the pattern dialect are deliberate and load-bearing for
//! compatibility: `^` and `$` compile to plain epsilon states and therefore
//! do not anchor, and `\s` denotes a single space byte rather than a
//! whitespace class.

use super::nfa::{ClassSet, Fragment, OutSlot, State, Transition, MAX_STATES};
use crate::errors::CompileError;

/// Metacharacters that force a pattern onto the regex path.
pub const METACHARACTERS: &[u8] = b".*+?[](){}|^$\\";

pub(super) struct Parser<'p> {
    pattern: &'p [u8],
    pos: usize,
    ignore_case: bool,
    pub(super) states: Vec<State>,
}

impl<'p> Parser<'p> {
    pub(super) fn new(pattern: &'p [u8], ignore_case: bool) -> Self {
        Parser {
            pattern,
            pos: 0,
            ignore_case,
            states: Vec::new(),
        }
    }

    /// Compiles the whole pattern, returning the start state index and the
    /// index of the single `Match` state.
    pub(super) fn compile(mut self) -> Result<(Vec<State>, usize, usize), CompileError> {
        let frag = self.parse_expr()?;
        if self.pos < self.pattern.len() {
            // parse_expr only stops early on an unbalanced ')'.
            return Err(CompileError::UnmatchedParen);
        }
        let accept = self.push_state(Transition::Match)?;
        self.patch(&frag.outs, accept);
        Ok((self.states, frag.start, accept))
    }

    fn peek(&self) -> Option<u8> {
        self.pattern.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn push_state(&mut self, trans: Transition) -> Result<usize, CompileError> {
        if self.states.len() >= MAX_STATES {
            return Err(CompileError::TooManyStates { limit: MAX_STATES });
        }
        self.states.push(State::new(trans));
        Ok(self.states.len() - 1)
    }

    fn patch(&mut self, outs: &[(usize, OutSlot)], target: usize) {
        for &(state, slot) in outs {
            match slot {
                OutSlot::Primary => self.states[state].out = Some(target),
                OutSlot::Secondary => self.states[state].out2 = Some(target),
            }
        }
    }

    /// A `Split` with a single dangling successor; consumes no input.
    fn epsilon(&mut self) -> Result<Fragment, CompileError> {
        let s = self.push_state(Transition::Split)?;
        Ok(Fragment {
            start: s,
            outs: vec![(s, OutSlot::Primary)],
        })
    }

    fn consuming(&mut self, trans: Transition) -> Result<Fragment, CompileError> {
        let s = self.push_state(trans)?;
        Ok(Fragment {
            start: s,
            outs: vec![(s, OutSlot::Primary)],
        })
    }

    fn parse_expr(&mut self) -> Result<Fragment, CompileError> {
        let mut frag = self.parse_term()?;
        while self.peek() == Some(b'|') {
            self.pos += 1;
            let right = self.parse_term()?;
            let split = self.push_state(Transition::Split)?;
            self.states[split].out = Some(frag.start);
            self.states[split].out2 = Some(right.start);
            let mut outs = frag.outs;
            outs.extend(right.outs);
            frag = Fragment {
                start: split,
                outs,
            };
        }
        Ok(frag)
    }

    fn parse_term(&mut self) -> Result<Fragment, CompileError> {
        let mut frag: Option<Fragment> = None;
        while let Some(b) = self.peek() {
            if b == b'|' || b == b')' {
                break;
            }
            let factor = self.parse_factor()?;
            frag = Some(match frag {
                None => factor,
                Some(left) => {
                    self.patch(&left.outs, factor.start);
                    Fragment {
                        start: left.start,
                        outs: factor.outs,
                    }
                }
            });
        }
        match frag {
            Some(f) => Ok(f),
            // Empty term, e.g. "" or the right side of "a|".
            None => self.epsilon(),
        }
    }

    fn parse_factor(&mut self) -> Result<Fragment, CompileError> {
        let atom = self.parse_atom()?;
        match self.peek() {
            Some(b'*') => {
                self.pos += 1;
                let split = self.push_state(Transition::Split)?;
                self.states[split].out = Some(atom.start);
                self.patch(&atom.outs, split);
                Ok(Fragment {
                    start: split,
                    outs: vec![(split, OutSlot::Secondary)],
                })
            }
            Some(b'+') => {
                self.pos += 1;
                let split = self.push_state(Transition::Split)?;
                self.states[split].out = Some(atom.start);
                self.patch(&atom.outs, split);
                Ok(Fragment {
                    start: atom.start,
                    outs: vec![(split, OutSlot::Secondary)],
                })
            }
            Some(b'?') => {
                self.pos += 1;
                let split = self.push_state(Transition::Split)?;
                self.states[split].out = Some(atom.start);
                let mut outs = atom.outs;
                outs.push((split, OutSlot::Secondary));
                Ok(Fragment {
                    start: split,
                    outs,
                })
            }
            _ => Ok(atom),
        }
    }

    fn parse_atom(&mut self) -> Result<Fragment, CompileError> {
        let b = self.bump().ok_or(CompileError::UnexpectedEnd)?;
        match b {
            b'.' => self.consuming(Transition::Any),
            b'[' => self.parse_class(),
            b'(' => {
                let frag = self.parse_expr()?;
                if self.bump() != Some(b')') {
                    return Err(CompileError::UnmatchedParen);
                }
                Ok(frag)
            }
            // Anchors are accepted for compatibility but carry no anchoring
            // semantics; they compile to epsilon.
            b'^' | b'$' => self.epsilon(),
            b'\\' => {
                let escaped = self.bump().ok_or(CompileError::TrailingBackslash)?;
                let byte = self.fold(escape_byte(escaped));
                self.consuming(Transition::Byte(byte))
            }
            literal => {
                let byte = self.fold(literal);
                self.consuming(Transition::Byte(byte))
            }
        }
    }

    fn parse_class(&mut self) -> Result<Fragment, CompileError> {
        let negated = if self.peek() == Some(b'^') {
            self.pos += 1;
            true
        } else {
            false
        };
        let mut class = ClassSet::new(negated);
        loop {
            let b = self.bump().ok_or(CompileError::UnmatchedBracket)?;
            if b == b']' {
                break;
            }
            let lo = if b == b'\\' {
                escape_byte(self.bump().ok_or(CompileError::TrailingBackslash)?)
            } else {
                b
            };
            // A '-' with something other than ']' after it forms a range.
            if self.peek() == Some(b'-') && self.pattern.get(self.pos + 1) != Some(&b']') {
                self.pos += 1;
                let hb = self.bump().ok_or(CompileError::UnmatchedBracket)?;
                let hi = if hb == b'\\' {
                    escape_byte(self.bump().ok_or(CompileError::TrailingBackslash)?)
                } else {
                    hb
                };
                self.insert_class_range(&mut class, lo, hi);
            } else {
                self.insert_class_byte(&mut class, lo);
            }
        }
        self.consuming(Transition::Class(class))
    }

    fn insert_class_byte(&self, class: &mut ClassSet, byte: u8) {
        class.insert(byte);
        if self.ignore_case && byte.is_ascii_alphabetic() {
            class.insert(byte ^ 0x20);
        }
    }

    fn insert_class_range(&self, class: &mut ClassSet, lo: u8, hi: u8) {
        if lo > hi {
            return;
        }
        class.insert_range(lo, hi);
        if self.ignore_case {
            for b in lo..=hi {
                if b.is_ascii_alphabetic() {
                    class.insert(b ^ 0x20);
                }
            }
        }
    }

    fn fold(&self, byte: u8) -> u8 {
        if self.ignore_case {
            byte.to_ascii_lowercase()
        } else {
            byte
        }
    }
}

/// Maps the byte after a backslash to the byte it denotes. `\s` is a single
/// space; every unrecognized escape denotes the escaped byte itself.
fn escape_byte(b: u8) -> u8 {
    match b {
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b's' => b' ',
        other => other,
    }
}

/// Extracts the leading literal run of `pattern` for use as a scan
/// pre-filter. The run is only usable when every match is guaranteed to start
/// with it: a top-level alternation disqualifies the whole pattern, and a
/// `*` or `?` quantifier makes its atom optional, so the run stops short of
/// it. Runs shorter than two bytes are not worth a vector scan.
pub(super) fn literal_prefix(pattern: &[u8], ignore_case: bool) -> Option<Vec<u8>> {
    if has_top_level_alternation(pattern) {
        return None;
    }

    let mut prefix = Vec::new();
    let mut i = 0;
    while i < pattern.len() {
        let b = pattern[i];
        let (byte, next) = if b == b'\\' {
            match pattern.get(i + 1) {
                // Class-shorthand and control escapes end the run.
                Some(e) if b"dDwWsSbBnrt".contains(e) => break,
                Some(&e) => (e, i + 2),
                None => break,
            }
        } else if METACHARACTERS.contains(&b) {
            break;
        } else {
            (b, i + 1)
        };

        match pattern.get(next).copied() {
            // The byte is optional under '*' or '?'.
            Some(b'*') | Some(b'?') => break,
            // Under '+' the byte is mandatory but repeats, so nothing
            // past it is a fixed continuation.
            Some(b'+') => {
                prefix.push(byte);
                break;
            }
            _ => {
                prefix.push(byte);
                i = next;
            }
        }
    }

    if prefix.len() < 2 {
        return None;
    }
    if ignore_case {
        prefix.make_ascii_lowercase();
    }
    Some(prefix)
}

fn has_top_level_alternation(pattern: &[u8]) -> bool {
    let mut depth = 0usize;
    let mut in_class = false;
    let mut i = 0;
    while i < pattern.len() {
        match pattern[i] {
            b'\\' => i += 1,
            b'[' if !in_class => in_class = true,
            b']' if in_class => in_class = false,
            b'(' if !in_class => depth += 1,
            b')' if !in_class => depth = depth.saturating_sub(1),
            b'|' if !in_class && depth == 0 => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_plain_literals() {
        assert_eq!(literal_prefix(b"hello.*", false), Some(b"hello".to_vec()));
        assert_eq!(literal_prefix(b"hello", false), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_prefix_too_short() {
        assert_eq!(literal_prefix(b"h.*", false), None);
        assert_eq!(literal_prefix(b".*abc", false), None);
    }

    #[test]
    fn test_prefix_stops_before_optional_atom() {
        // In "ab*c" the 'b' may be absent, so only "a" is mandatory and no
        // usable prefix exists.
        assert_eq!(literal_prefix(b"ab*c", false), None);
        assert_eq!(literal_prefix(b"abc?d", false), Some(b"ab".to_vec()));
    }

    #[test]
    fn test_prefix_includes_plus_atom() {
        assert_eq!(literal_prefix(b"abc+d", false), Some(b"abc".to_vec()));
    }

    #[test]
    fn test_prefix_alternation() {
        assert_eq!(literal_prefix(b"ab|cd", false), None);
        assert_eq!(literal_prefix(b"abx.y|cd", false), None);
        // Alternation inside a group does not disqualify the run.
        assert_eq!(literal_prefix(b"ab(c|d)", false), Some(b"ab".to_vec()));
    }

    #[test]
    fn test_prefix_escapes() {
        assert_eq!(literal_prefix(b"\\.rs", false), Some(b".rs".to_vec()));
        assert_eq!(literal_prefix(b"a\\d+", false), None);
        assert_eq!(literal_prefix(b"ab\\", false), Some(b"ab".to_vec()));
    }

    #[test]
    fn test_prefix_case_folding() {
        assert_eq!(literal_prefix(b"Hello.*", true), Some(b"hello".to_vec()));
    }
}
