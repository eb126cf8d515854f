//! Entry filters applied by the walker before any gitignore consultation.

use std::path::Path;

use crate::ignore::glob_match;

/// Directories that are skipped unconditionally, before any pattern runs.
const ALWAYS_IGNORED_DIRS: &[&str] = &[".git", ".svn", ".hg"];

/// True for VCS bookkeeping directories that are never worth walking.
pub fn is_always_ignored(name: &str) -> bool {
    ALWAYS_IGNORED_DIRS.contains(&name)
}

/// True for dot-prefixed entries.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// The `-g GLOB` include/exclude filter set.
///
/// A leading `!` marks an exclude. Files must match at least one include (if
/// any includes exist) and no exclude. Globs containing a `/` are matched
/// against the whole path; bare globs match the basename.
#[derive(Debug, Default)]
pub struct GlobFilter {
    includes: Vec<Vec<u8>>,
    excludes: Vec<Vec<u8>>,
}

impl GlobFilter {
    pub fn new(globs: &[String]) -> Self {
        let mut filter = GlobFilter::default();
        for glob in globs {
            match glob.strip_prefix('!') {
                Some(rest) => filter.excludes.push(rest.as_bytes().to_vec()),
                None => filter.includes.push(glob.as_bytes().to_vec()),
            }
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Whether a file at `path` survives the filter.
    pub fn matches(&self, path: &Path) -> bool {
        let full = path.to_string_lossy();
        let full = full.as_bytes();
        let basename = match full.iter().rposition(|&b| b == b'/') {
            Some(i) => &full[i + 1..],
            None => full,
        };
        let target = |glob: &[u8]| {
            if glob.contains(&b'/') {
                full
            } else {
                basename
            }
        };

        if self.excludes.iter().any(|g| glob_match(g, target(g))) {
            return false;
        }
        self.includes.is_empty() || self.includes.iter().any(|g| glob_match(g, target(g)))
    }
}
