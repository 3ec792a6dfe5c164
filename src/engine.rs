//! Single-owner facade over the tree store and the pattern registry.
//!
//! One engine per worker thread. Parsers come from the thread-local pool, so
//! the engine itself holds no parser state.

use crate::cache::{CacheOutcome, TreeStore};
use crate::config::EngineConfig;
use crate::edit::{create_edit, EditError};
use crate::log::EngineLog;
use crate::pool::with_parser;
use crate::position::Position;
use crate::ts::errors::{QueryCompileError, TreeSitterError};
use crate::ts::language::SupportLang;
use crate::ts::parser::ParserBackend;
use crate::ts::patterns::{PatternError, PatternRegistry};
use crate::ts::query::{compile_pattern, CompiledQuery, OptimizationSettings, QueryMatch};
use crate::ts::tree::SyntaxTree;
use crate::ts::validator::validate_syntax;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    TreeSitter(#[from] TreeSitterError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Query(#[from] QueryCompileError),
}

#[derive(Debug)]
pub struct AstEngine {
    store: TreeStore,
    registry: PatternRegistry,
    defaults: OptimizationSettings,
    log: EngineLog,
}

impl AstEngine {
    /// Engine with every built-in language and pattern.
    pub fn new(log: EngineLog) -> Result<Self, EngineError> {
        Self::from_config(&EngineConfig::default(), log)
    }

    pub fn from_config(config: &EngineConfig, log: EngineLog) -> Result<Self, EngineError> {
        let defaults = config.query.to_settings();
        let registry = PatternRegistry::build(
            &config.resolved_languages(),
            &config.extra_patterns(),
            &defaults,
            log.clone(),
        )?;
        Ok(Self {
            store: TreeStore::new(log.clone()),
            registry,
            defaults,
            log,
        })
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TreeStore {
        &mut self.store
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PatternRegistry {
        &mut self.registry
    }

    pub fn defaults(&self) -> &OptimizationSettings {
        &self.defaults
    }

    pub fn log(&self) -> &EngineLog {
        &self.log
    }

    /// Parse `source` and cache the result under `file_id`.
    ///
    /// Trees with syntax errors are cached too; they are still queryable and
    /// [`AstEngine::validate`] reports their errors.
    pub fn open(
        &mut self,
        file_id: &str,
        source: &str,
        language: SupportLang,
    ) -> Result<CacheOutcome, EngineError> {
        let tree = with_parser(language, |parser| parser.parse(source.as_bytes(), None))?
            .ok_or(TreeSitterError::ParseFailed)?;
        Ok(self.store.cache_tree(file_id, tree, None))
    }

    pub fn tree(&self, file_id: &str) -> Option<&SyntaxTree> {
        self.store.get_cached_tree(file_id)
    }

    /// Compile an ad-hoc pattern with the engine's default settings.
    pub fn compile(
        &self,
        source: &str,
        language: SupportLang,
    ) -> Result<CompiledQuery, QueryCompileError> {
        let mut query = compile_pattern(source, language, self.log.clone())?;
        if self.defaults != OptimizationSettings::default() {
            query.configure(self.defaults.clone());
        }
        Ok(query)
    }

    /// Run a registered pattern against the cached tree for `file_id`.
    ///
    /// `None` when the file is not cached or the pattern is not registered
    /// for its language.
    pub fn find(&mut self, file_id: &str, pattern: &str) -> Option<Vec<QueryMatch<'_>>> {
        let tree = self.store.get_cached_tree(file_id)?;
        self.registry.find(tree, pattern)
    }

    /// Syntax diagnostics for the cached tree.
    pub fn validate(&self, file_id: &str) -> Option<(bool, Vec<String>)> {
        let tree = self.store.get_cached_tree(file_id)?;
        Some(validate_syntax(
            tree.root(),
            tree.source(),
            tree.language(),
            &self.log,
        ))
    }

    /// Replace `old_text` at `start` and reparse.
    ///
    /// Edit construction failures surface as errors. `Ok(None)` means the
    /// file is not cached or the edited source did not reparse cleanly; the
    /// cache is unchanged in both cases.
    pub fn edit(
        &mut self,
        file_id: &str,
        old_text: &str,
        new_text: &str,
        start: Position,
    ) -> Result<Option<SyntaxTree>, EngineError> {
        let Some(tree) = self.store.get_cached_tree(file_id) else {
            return Ok(None);
        };
        let edit = create_edit(tree, old_text, new_text, start)?;
        let language = tree.language();
        let store = &mut self.store;
        let updated = with_parser(language, |parser| {
            store.update_tree(file_id, std::slice::from_ref(&edit), parser)
        })?;
        Ok(updated)
    }

    pub fn backup(&mut self, file_id: &str) -> bool {
        self.store.backup_tree(file_id)
    }

    /// Restore from backup with a fresh parse.
    pub fn restore(&mut self, file_id: &str) -> bool {
        let Some(language) = self.store.get_cached_tree(file_id).map(SyntaxTree::language) else {
            return false;
        };
        let store = &mut self.store;
        match with_parser(language, |parser| store.restore_tree(file_id, parser)) {
            Ok(restored) => restored,
            Err(e) => {
                self.log
                    .scope(|| warn!(file_id, error = %e, "no parser available for restore"));
                false
            }
        }
    }
}
