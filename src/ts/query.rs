//! Compiled structural queries.
//!
//! A [`CompiledQuery`] is bound to one grammar and keeps its
//! [`OptimizationSettings`] across runs. Execution never fails: bad input
//! yields no matches and a log entry, and each run leaves [`ExecutionStats`]
//! behind for the caller to inspect.

use crate::log::EngineLog;
use crate::position::Position;
use crate::ts::errors::QueryCompileError;
use crate::ts::language::{closest_node_kind, grammar, language_name, SupportLang};
use crate::ts::tree::SyntaxTree;
use serde::Serialize;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tree_sitter::{
    Node, Query, QueryCursor, QueryCursorOptions, QueryCursorState, QueryErrorKind,
    StreamingIterator,
};

/// Execution knobs. Settings persist across executions until changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationSettings {
    /// Cap on in-progress matches and on matches returned.
    pub match_limit: Option<u32>,
    /// Deepest node at which a match may start, relative to the start node.
    pub max_start_depth: Option<u32>,
    /// Wall-clock budget, checked by the cursor while it scans and between
    /// matches. Past it, execution stops with the matches found so far.
    pub timeout: Option<Duration>,
    pub byte_range: Option<Range<usize>>,
    pub point_range: Option<Range<Position>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryState {
    Compiled,
    Configured,
    Executed,
}

/// What the last execution did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    pub pattern_count: usize,
    pub match_limit: Option<u32>,
    pub timeout: Option<Duration>,
    pub did_exceed_match_limit: bool,
    pub timed_out: bool,
    pub match_count: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternInfo {
    pub index: usize,
    /// Anchored to a single top-level node type.
    pub rooted: bool,
    pub non_local: bool,
    /// Where the pattern starts in the query source.
    pub start_byte: usize,
    pub disabled: bool,
}

/// One match: which sub-pattern fired and what each capture bound.
///
/// A capture can bind several nodes, e.g. a quantified `(identifier)* @arg`.
#[derive(Debug, Clone)]
pub struct QueryMatch<'tree> {
    pub pattern_index: usize,
    pub captures: HashMap<String, Vec<Node<'tree>>>,
}

impl<'tree> QueryMatch<'tree> {
    /// First node bound to `name`.
    pub fn capture(&self, name: &str) -> Option<Node<'tree>> {
        self.captures.get(name).and_then(|nodes| nodes.first().copied())
    }

    pub fn nodes(&self, name: &str) -> &[Node<'tree>] {
        self.captures.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

/// A pattern compiled against one grammar, with its settings and the stats of
/// its last run.
pub struct CompiledQuery {
    query: Query,
    source: String,
    language: SupportLang,
    capture_names: Vec<String>,
    settings: OptimizationSettings,
    disabled_patterns: BTreeSet<usize>,
    disabled_captures: BTreeSet<String>,
    state: QueryState,
    stats: ExecutionStats,
    log: EngineLog,
}

/// Compile `source` for `language`. Never partially compiles.
///
/// Unrooted sub-patterns compile but are logged, since matching them needs a
/// scan of every node.
pub fn compile_pattern(
    source: &str,
    language: SupportLang,
    log: EngineLog,
) -> Result<CompiledQuery, QueryCompileError> {
    let query = build_query(source, language)?;
    let capture_names = query.capture_names().iter().map(|s| s.to_string()).collect();

    log.scope(|| {
        for index in 0..query.pattern_count() {
            if !query.is_pattern_rooted(index) {
                warn!(
                    language = %language_name(language),
                    pattern = index,
                    start_byte = query.start_byte_for_pattern(index),
                    "pattern is not rooted; matching scans every node"
                );
            }
        }
    });

    Ok(CompiledQuery {
        stats: ExecutionStats {
            pattern_count: query.pattern_count(),
            ..ExecutionStats::default()
        },
        query,
        source: source.to_string(),
        language,
        capture_names,
        settings: OptimizationSettings::default(),
        disabled_patterns: BTreeSet::new(),
        disabled_captures: BTreeSet::new(),
        state: QueryState::Compiled,
        log,
    })
}

fn build_query(source: &str, language: SupportLang) -> Result<Query, QueryCompileError> {
    let ts_language = grammar(language);
    Query::new(&ts_language, source).map_err(|e| {
        let suggestion = match e.kind {
            QueryErrorKind::NodeType => closest_node_kind(&ts_language, &e.message),
            _ => None,
        };
        QueryCompileError {
            offset: e.offset,
            row: e.row,
            column: e.column,
            kind: format!("{:?}", e.kind),
            message: e.message,
            suggestion,
        }
    })
}

impl CompiledQuery {
    pub fn language(&self) -> SupportLang {
        self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn settings(&self) -> &OptimizationSettings {
        &self.settings
    }

    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    pub fn pattern_count(&self) -> usize {
        self.query.pattern_count()
    }

    /// Replace the execution settings.
    pub fn configure(&mut self, settings: OptimizationSettings) {
        self.settings = settings;
        self.state = QueryState::Configured;
    }

    /// Suppress sub-pattern `index` for all later executions.
    pub fn disable_pattern(&mut self, index: usize) -> bool {
        if index >= self.query.pattern_count() {
            return false;
        }
        if self.disabled_patterns.insert(index) {
            self.query.disable_pattern(index);
        }
        true
    }

    /// Drop capture `name` from all later matches.
    pub fn disable_capture(&mut self, name: &str) -> bool {
        if !self.capture_names.iter().any(|c| c == name) {
            return false;
        }
        if self.disabled_captures.insert(name.to_string()) {
            self.query.disable_capture(name);
        }
        true
    }

    /// Re-enable every disabled pattern and capture by recompiling the source.
    pub fn enable_all(&mut self) -> Result<(), QueryCompileError> {
        if self.disabled_patterns.is_empty() && self.disabled_captures.is_empty() {
            return Ok(());
        }
        self.query = build_query(&self.source, self.language)?;
        self.disabled_patterns.clear();
        self.disabled_captures.clear();
        Ok(())
    }

    pub fn get_query_stats(&self) -> &ExecutionStats {
        &self.stats
    }

    pub fn get_pattern_info(&self) -> Vec<PatternInfo> {
        (0..self.query.pattern_count())
            .map(|index| PatternInfo {
                index,
                rooted: self.query.is_pattern_rooted(index),
                non_local: self.query.is_pattern_non_local(index),
                start_byte: self.query.start_byte_for_pattern(index),
                disabled: self.disabled_patterns.contains(&index),
            })
            .collect()
    }

    /// Run against a whole tree.
    ///
    /// An untrusted tree or a tree of another language yields no matches and
    /// a log entry; queries never fail their caller.
    pub fn execute<'tree>(&mut self, tree: &'tree SyntaxTree) -> Vec<QueryMatch<'tree>> {
        if !tree.is_trusted() {
            self.log
                .scope(|| warn!("skipping query on a tree edited without reparse"));
            self.record_skipped();
            return Vec::new();
        }
        if tree.language() != self.language {
            self.log.scope(|| {
                warn!(
                    query = %language_name(self.language),
                    tree = %language_name(tree.language()),
                    "skipping query on a tree of another language"
                );
            });
            self.record_skipped();
            return Vec::new();
        }
        self.execute_node(tree.root(), tree.source())
    }

    /// Run against the subtree at `node`. `source` must be the text the
    /// node's tree was parsed from.
    pub fn execute_node<'tree>(
        &mut self,
        node: Node<'tree>,
        source: &[u8],
    ) -> Vec<QueryMatch<'tree>> {
        if node.end_byte() > source.len() {
            self.log.scope(|| {
                warn!(
                    node_end = node.end_byte(),
                    source_len = source.len(),
                    "skipping query: node extends past its source"
                );
            });
            self.record_skipped();
            return Vec::new();
        }

        let mut cursor = QueryCursor::new();
        if let Some(limit) = self.settings.match_limit {
            cursor.set_match_limit(limit);
        }
        cursor.set_max_start_depth(self.settings.max_start_depth);
        if let Some(range) = &self.settings.byte_range {
            cursor.set_byte_range(range.clone());
        }
        if let Some(range) = &self.settings.point_range {
            cursor.set_point_range(range.start.into()..range.end.into());
        }

        let hard_cap = self.settings.match_limit.map(|limit| limit as usize);
        let started = Instant::now();
        let deadline = self.settings.timeout.map(|budget| started + budget);
        let cancelled = Cell::new(false);
        let mut past_deadline = |_: &QueryCursorState| {
            let expired = deadline.is_some_and(|deadline| Instant::now() >= deadline);
            if expired {
                cancelled.set(true);
            }
            expired
        };
        let options = QueryCursorOptions::new().progress_callback(&mut past_deadline);

        let mut results = Vec::new();
        let mut capped = false;
        let mut timed_out = false;

        let mut matches = cursor.matches_with_options(&self.query, node, source, options);
        while let Some(m) = matches.next() {
            if hard_cap.is_some_and(|cap| results.len() >= cap) {
                capped = true;
                break;
            }
            let mut captures: HashMap<String, Vec<Node<'tree>>> = HashMap::new();
            for capture in m.captures {
                let name = &self.capture_names[capture.index as usize];
                captures.entry(name.clone()).or_default().push(capture.node);
            }
            results.push(QueryMatch {
                pattern_index: m.pattern_index,
                captures,
            });
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                timed_out = true;
                break;
            }
        }
        drop(matches);
        timed_out |= cancelled.get();

        self.stats = ExecutionStats {
            pattern_count: self.query.pattern_count(),
            match_limit: self.settings.match_limit,
            timeout: self.settings.timeout,
            did_exceed_match_limit: capped || cursor.did_exceed_match_limit(),
            timed_out,
            match_count: results.len(),
            elapsed: started.elapsed(),
        };
        self.state = QueryState::Executed;

        let stats = &self.stats;
        self.log.scope(|| {
            debug!(
                matches = stats.match_count,
                exceeded = stats.did_exceed_match_limit,
                timed_out = stats.timed_out,
                elapsed_us = stats.elapsed.as_micros() as u64,
                "executed query"
            );
            if stats.did_exceed_match_limit {
                warn!(limit = ?stats.match_limit, "query exceeded its match limit");
            }
            if stats.timed_out {
                warn!(timeout = ?stats.timeout, "query timed out; results are partial");
            }
        });
        results
    }

    fn record_skipped(&mut self) {
        self.stats = ExecutionStats {
            pattern_count: self.query.pattern_count(),
            match_limit: self.settings.match_limit,
            timeout: self.settings.timeout,
            ..ExecutionStats::default()
        };
        self.state = QueryState::Executed;
    }
}

impl std::fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("language", &self.language)
            .field("patterns", &self.query.pattern_count())
            .field("captures", &self.capture_names)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Every node of type `kind` in the tree, in document order.
pub fn find_nodes_by_type<'tree>(
    tree: &'tree SyntaxTree,
    kind: &str,
    log: EngineLog,
) -> Result<Vec<Node<'tree>>, QueryCompileError> {
    let mut query = compile_pattern(&format!("({kind}) @target"), tree.language(), log)?;
    Ok(query
        .execute(tree)
        .into_iter()
        .filter_map(|m| m.capture("target"))
        .collect())
}
