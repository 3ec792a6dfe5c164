//! Integration tests for the tree store, edits, traversal and queries.

mod properties;
mod queries;
mod scenarios;
mod store;

use treekeep::{LanguageParser, SupportLang, SyntaxTree};

pub fn parse_python(source: &str) -> SyntaxTree {
    LanguageParser::new(SupportLang::Python)
        .unwrap()
        .parse_str(source)
        .unwrap()
}

pub fn python_parser() -> LanguageParser {
    LanguageParser::new(SupportLang::Python).unwrap()
}
