use std::io;

/// Errors produced while compiling a search pattern.
///
/// Pattern compilation happens exactly once, before any worker thread is
/// spawned; a compile error therefore aborts the whole run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("unexpected end of pattern")]
    UnexpectedEnd,
    #[error("unmatched parenthesis in pattern")]
    UnmatchedParen,
    #[error("unmatched bracket in pattern")]
    UnmatchedBracket,
    #[error("trailing backslash in pattern")]
    TrailingBackslash,
    #[error("pattern requires more than {limit} NFA states")]
    TooManyStates { limit: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("pattern error: {0}")]
    Pattern(#[from] CompileError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

impl SearchError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        SearchError::Config(msg.into())
    }
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;
