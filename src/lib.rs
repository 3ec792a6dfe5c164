//! Treekeep: incremental tree-sitter AST management and structural queries.
//!
//! Parsed trees are cached per file id, edited through verified, replayable
//! [`EditOperation`]s, reparsed incrementally, and queried with compiled
//! declarative patterns.
//!
//! # Architecture
//!
//! - [`position`]: points, byte ranges and containment checks
//! - [`ts`]: grammars, parsing, [`SyntaxTree`], compiled queries and validation
//! - [`edit`]: edit construction, verification and reparse
//! - [`cache`]: the per-file [`TreeStore`] with backup and restore
//! - [`traversal`]: cursor-based walks and node lookups
//! - [`engine`]: [`AstEngine`], the facade tying the above together
//!
//! # Safety
//!
//! - Every edit re-verifies its expected text before it touches anything
//! - A failed update or restore leaves the cache exactly as it was
//! - Edited trees are untrusted until reparsed and are never cached or queried
//! - Queries are best-effort: bad input yields no matches and a log entry
//!
//! # Example
//!
//! ```no_run
//! use treekeep::{AstEngine, EngineLog, Position, SupportLang};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = AstEngine::new(EngineLog::current())?;
//! let _ = engine.open("hello.py", "def hello(): pass\n", SupportLang::Python)?;
//! engine.backup("hello.py");
//!
//! let updated = engine.edit("hello.py", "pass", "return True", Position::new(0, 13))?;
//! assert!(updated.is_some());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod edit;
pub mod engine;
pub mod log;
pub mod pool;
pub mod position;
pub mod traversal;
pub mod ts;

// Re-exports
pub use cache::{CacheOutcome, RejectReason, TreeStore};
pub use config::{load_from_path, load_from_str, load_or_default, ConfigError, EngineConfig};
pub use edit::{apply_edit, create_edit, reparse, EditError, EditOperation};
pub use engine::{AstEngine, EngineError};
pub use log::EngineLog;
pub use position::{ByteRange, Position, TextRange};
pub use ts::{
    compile_pattern, CompiledQuery, ExecutionStats, LanguageParser, OptimizationSettings,
    ParserBackend, PatternRegistry, QueryCompileError, QueryMatch, ReparseError, SupportLang,
    SyntaxTree, TreeSitterError,
};
