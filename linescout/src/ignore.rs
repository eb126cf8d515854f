//! Gitignore-style ignore matching.
//!
//! Every `.gitignore` file parses into an [`IgnoreFile`] whose patterns are
//! scoped to the directory the file was loaded from. The walker carries an
//! [`IgnoreMatcher`] — an ordered, parent-first chain of `Arc<IgnoreFile>` —
//! and extends it immutably as it descends, so worker threads share pattern
//! data without any locking. Matching replays every pattern in order and the
//! last matching pattern wins, which is what lets a later `!pattern` line
//! re-include a previously ignored path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One parsed ignore line.
#[derive(Debug, Clone)]
pub struct IgnorePattern {
    /// Pattern bytes with the leading `!`, leading `/`, and trailing `/`
    /// already stripped.
    pattern: Vec<u8>,
    /// A leading `!` re-includes instead of ignoring.
    negated: bool,
    /// A leading `/` anchors the pattern to the ignore file's directory.
    anchored: bool,
    /// A trailing `/` restricts the pattern to directories.
    dir_only: bool,
    /// An interior `/` switches matching from basename to full relative path.
    contains_slash: bool,
}

impl IgnorePattern {
    /// Parses one line. Returns `None` for blanks and `#` comments.
    fn parse(line: &[u8]) -> Option<Self> {
        let line = trim_ascii(line);
        if line.is_empty() || line[0] == b'#' {
            return None;
        }

        let (line, negated) = match line.strip_prefix(b"!") {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        let (line, anchored) = match line.strip_prefix(b"/") {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        let (line, dir_only) = match line.strip_suffix(b"/") {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        if line.is_empty() {
            return None;
        }

        Some(IgnorePattern {
            pattern: line.to_vec(),
            negated,
            anchored,
            dir_only,
            contains_slash: line.contains(&b'/'),
        })
    }

    /// Tests this pattern against a path already made relative to the
    /// ignore file's directory.
    fn matches_rel(&self, rel: &[u8], is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if self.anchored || self.contains_slash {
            glob_match(&self.pattern, rel)
        } else {
            let basename = match rel.iter().rposition(|&b| b == b'/') {
                Some(i) => &rel[i + 1..],
                None => rel,
            };
            glob_match(&self.pattern, basename)
        }
    }
}

/// All patterns from a single `.gitignore`, scoped to `root`.
#[derive(Debug)]
pub struct IgnoreFile {
    root: PathBuf,
    patterns: Vec<IgnorePattern>,
}

impl IgnoreFile {
    /// Parses ignore lines, tagging them with the directory they came from.
    /// Lines are trimmed of ASCII whitespace (including `\r`).
    pub fn parse(root: impl Into<PathBuf>, content: &[u8]) -> Self {
        let patterns = content
            .split(|&b| b == b'\n')
            .filter_map(IgnorePattern::parse)
            .collect();
        IgnoreFile {
            root: root.into(),
            patterns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Applies this file's patterns in order; `verdict` carries the running
    /// last-match-wins state.
    fn apply(&self, path: &Path, is_dir: bool, verdict: &mut bool) {
        let rel = if self.root.as_os_str().is_empty() {
            Some(path)
        } else {
            path.strip_prefix(&self.root).ok()
        };
        // Patterns never reach above their own root.
        let Some(rel) = rel else { return };
        let rel = rel.to_string_lossy();
        let rel = rel.as_bytes();

        for pattern in &self.patterns {
            if pattern.matches_rel(rel, is_dir) {
                *verdict = !pattern.negated;
            }
        }
    }
}

/// A parent-first chain of ignore files. Cloning is cheap; extending
/// produces a new chain and leaves the original untouched.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    files: Vec<Arc<IgnoreFile>>,
}

impl IgnoreMatcher {
    pub fn empty() -> Self {
        Default::default()
    }

    /// Returns a new chain with `file` appended after all current entries.
    pub fn extended(&self, file: IgnoreFile) -> Self {
        let mut files = self.files.clone();
        files.push(Arc::new(file));
        IgnoreMatcher { files }
    }

    /// True when the ordered pattern list ignores `path`. Later patterns
    /// override earlier ones, so negations can re-include.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let mut verdict = false;
        for file in &self.files {
            file.apply(path, is_dir, &mut verdict);
        }
        verdict
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Matches `text` against a gitignore glob.
///
/// `?` matches one non-`/` byte; `*` matches a run of non-`/` bytes; `**`
/// matches across `/`, with `**/` meaning zero or more whole segments;
/// `[...]` supports ranges and `!` negation; `\` escapes the next byte.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.first().copied() {
        None => text.is_empty(),
        Some(b'*') => {
            if pattern.get(1) == Some(&b'*') {
                let rest = &pattern[2..];
                if rest.first() == Some(&b'/') {
                    // "**/" spans zero or more whole segments.
                    let after = &rest[1..];
                    if glob_match(after, text) {
                        return true;
                    }
                    for i in 0..text.len() {
                        if text[i] == b'/' && glob_match(after, &text[i + 1..]) {
                            return true;
                        }
                    }
                    false
                } else {
                    // Bare "**" swallows anything, slashes included.
                    (0..=text.len()).any(|i| glob_match(rest, &text[i..]))
                }
            } else {
                let rest = &pattern[1..];
                let mut i = 0;
                loop {
                    if glob_match(rest, &text[i..]) {
                        return true;
                    }
                    if i >= text.len() || text[i] == b'/' {
                        return false;
                    }
                    i += 1;
                }
            }
        }
        Some(b'?') => {
            !text.is_empty() && text[0] != b'/' && glob_match(&pattern[1..], &text[1..])
        }
        Some(b'[') => match class_match(pattern, text.first().copied()) {
            Some(rest_at) => glob_match(&pattern[rest_at..], &text[1..]),
            None => false,
        },
        Some(b'\\') if pattern.len() >= 2 => {
            !text.is_empty() && text[0] == pattern[1] && glob_match(&pattern[2..], &text[1..])
        }
        Some(byte) => {
            !text.is_empty() && text[0] == byte && glob_match(&pattern[1..], &text[1..])
        }
    }
}

/// Matches `byte` against the class starting at `pattern[0] == b'['`.
/// Returns the pattern index just past the closing `]` on a hit.
fn class_match(pattern: &[u8], byte: Option<u8>) -> Option<usize> {
    let byte = byte?;
    if byte == b'/' {
        return None;
    }
    let negated = pattern.get(1) == Some(&b'!');
    let mut i = if negated { 2 } else { 1 };

    let close = (i..pattern.len()).find(|&j| pattern[j] == b']')?;

    let mut matched = false;
    while i < close {
        if i + 2 < close && pattern[i + 1] == b'-' {
            if byte >= pattern[i] && byte <= pattern[i + 2] {
                matched = true;
            }
            i += 3;
        } else {
            if byte == pattern[i] {
                matched = true;
            }
            i += 1;
        }
    }

    if matched != negated {
        Some(close + 1)
    } else {
        None
    }
}
