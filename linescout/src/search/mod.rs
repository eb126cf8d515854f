pub mod engine;
pub mod matcher;
pub mod processor;

pub use engine::search;
pub use matcher::PatternMatcher;
