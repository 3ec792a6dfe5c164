//! Tree-sitter integration: grammars, parsing, trees and structural queries.
//!
//! Every language goes through the same path: the registry resolves a name
//! to a grammar, [`LanguageParser`] produces a [`SyntaxTree`], and
//! [`CompiledQuery`] runs declarative patterns against it.

pub mod errors;
pub mod language;
pub mod parser;
pub mod patterns;
pub mod query;
pub mod tree;
pub mod validator;

pub use errors::{QueryCompileError, ReparseError, TreeSitterError};
pub use language::{resolve, SupportLang};
pub use parser::{error_nodes, ErrorNode, LanguageParser, ParserBackend};
pub use patterns::{CompiledQuerySet, PatternError, PatternRegistry, PatternSpec};
pub use query::{
    compile_pattern, find_nodes_by_type, CompiledQuery, ExecutionStats, OptimizationSettings,
    PatternInfo, QueryMatch, QueryState,
};
pub use tree::SyntaxTree;
pub use validator::{validate_edit, validate_source, validate_syntax};
