// Parsers for the small text grammars the pipeline accepts

pub mod date_pattern;

// Public API re-exports
pub use date_pattern::{parse_date_pattern, tokenize, DateToken};
