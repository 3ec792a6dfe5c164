//! Per-file tree cache with source backups.
//!
//! Each file id moves through `Uncached -> Cached -> Cached+BackedUp`.
//! Every write either lands completely or leaves the previous entry in
//! place; rejected writes are reported through [`CacheOutcome`] and the
//! injected log rather than silently dropped.

use crate::edit::{apply_edit, order_edits, reparse, replay_edits, EditOperation};
use crate::log::EngineLog;
use crate::ts::language::language_name;
use crate::ts::parser::ParserBackend;
use crate::ts::tree::SyntaxTree;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

/// Result of a cache write.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum CacheOutcome {
    Cached,
    Replaced,
    Rejected(RejectReason),
}

impl CacheOutcome {
    pub fn is_stored(&self) -> bool {
        !matches!(self, CacheOutcome::Rejected(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The tree was edited but never reparsed.
    Untrusted,
    /// The supplied source is shorter than the tree it claims to describe.
    SourceTooShort { tree_end: usize, source_len: usize },
}

struct CacheEntry {
    tree: SyntaxTree,
    fingerprint: u64,
}

struct BackupEntry {
    source: Arc<[u8]>,
    fingerprint: u64,
}

/// Owner of the cached tree and optional backup for each file id.
///
/// Not internally synchronized: one logical owner per file id.
pub struct TreeStore {
    entries: HashMap<String, CacheEntry>,
    backups: HashMap<String, BackupEntry>,
    log: EngineLog,
}

impl TreeStore {
    pub fn new(log: EngineLog) -> Self {
        Self {
            entries: HashMap::new(),
            backups: HashMap::new(),
            log,
        }
    }

    /// Insert or replace the entry for `file_id`.
    ///
    /// Without `source` the tree's own source buffer is kept. Untrusted trees
    /// are refused so an unreparsed edit can never reach the cache.
    pub fn cache_tree(
        &mut self,
        file_id: &str,
        tree: SyntaxTree,
        source: Option<&[u8]>,
    ) -> CacheOutcome {
        if !tree.is_trusted() {
            self.log.scope(|| {
                warn!(file_id, "refusing to cache a tree that was edited without reparse");
            });
            return CacheOutcome::Rejected(RejectReason::Untrusted);
        }

        let tree = match source {
            None => tree,
            Some(bytes) => {
                let tree_end = tree.root().end_byte();
                if bytes.len() < tree_end {
                    self.log.scope(|| {
                        warn!(
                            file_id,
                            tree_end,
                            source_len = bytes.len(),
                            "refusing to cache tree with truncated source"
                        );
                    });
                    return CacheOutcome::Rejected(RejectReason::SourceTooShort {
                        tree_end,
                        source_len: bytes.len(),
                    });
                }
                SyntaxTree::new(tree.inner().clone(), bytes.to_vec(), tree.language())
            }
        };

        let fingerprint = xxh3_64(tree.source());
        let language = language_name(tree.language());
        let previous = self
            .entries
            .insert(file_id.to_string(), CacheEntry { tree, fingerprint });

        self.log.scope(|| {
            debug!(file_id, language = %language, fingerprint, "cached tree");
        });
        match previous {
            Some(_) => CacheOutcome::Replaced,
            None => CacheOutcome::Cached,
        }
    }

    pub fn get_cached_tree(&self, file_id: &str) -> Option<&SyntaxTree> {
        self.entries.get(file_id).map(|entry| &entry.tree)
    }

    pub fn get_source_bytes(&self, file_id: &str) -> Option<&[u8]> {
        self.entries.get(file_id).map(|entry| entry.tree.source())
    }

    /// xxh3 fingerprint of the cached source.
    pub fn source_fingerprint(&self, file_id: &str) -> Option<u64> {
        self.entries.get(file_id).map(|entry| entry.fingerprint)
    }

    /// xxh3 fingerprint of the backed-up source.
    pub fn backup_fingerprint(&self, file_id: &str) -> Option<u64> {
        self.backups.get(file_id).map(|backup| backup.fingerprint)
    }

    pub fn has_backup(&self, file_id: &str) -> bool {
        self.backups.contains_key(file_id)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.entries.contains_key(file_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Snapshot the cached source bytes. Returns false when nothing is cached.
    pub fn backup_tree(&mut self, file_id: &str) -> bool {
        let Some(entry) = self.entries.get(file_id) else {
            self.log.scope(|| debug!(file_id, "nothing cached to back up"));
            return false;
        };

        let backup = BackupEntry {
            source: entry.tree.shared_source(),
            fingerprint: entry.fingerprint,
        };
        self.backups.insert(file_id.to_string(), backup);
        self.log.scope(|| debug!(file_id, "backed up source"));
        true
    }

    /// Replace the cached tree with a fresh parse of the backed-up source.
    ///
    /// Never reuses incremental state. On a missing backup, a failed parse,
    /// or a parse containing errors, nothing changes and false is returned.
    /// The same holds when the backend hands back a tree over bytes other
    /// than the backup's, checked against the fingerprint taken at backup.
    pub fn restore_tree(&mut self, file_id: &str, parser: &mut dyn ParserBackend) -> bool {
        let Some(backup) = self.backups.get(file_id) else {
            self.log.scope(|| warn!(file_id, "no backup to restore"));
            return false;
        };

        if let Some(entry) = self.entries.get(file_id) {
            if entry.tree.language() != parser.language() {
                self.log.scope(|| {
                    warn!(
                        file_id,
                        cached = %language_name(entry.tree.language()),
                        parser = %language_name(parser.language()),
                        "restore parser does not match cached language"
                    );
                });
                return false;
            }
        }

        parser.reset();
        let Some(tree) = parser.parse(&backup.source, None) else {
            self.log.scope(|| warn!(file_id, "restore parse produced no tree"));
            return false;
        };
        if tree.has_error() {
            self.log.scope(|| warn!(file_id, "restored source does not parse cleanly"));
            return false;
        }
        let fingerprint = xxh3_64(tree.source());
        if fingerprint != backup.fingerprint {
            self.log.scope(|| warn!(file_id, "restored source fingerprint differs from backup"));
            return false;
        }

        self.entries
            .insert(file_id.to_string(), CacheEntry { tree, fingerprint });
        self.backups.remove(file_id);
        self.log.scope(|| info!(file_id, "restored tree from backup"));
        true
    }

    /// Apply `edits`, reparse incrementally and replace the cached entry.
    ///
    /// Edits are applied in descending `start_byte` order. Returns `None` and
    /// leaves the cache untouched when nothing is cached, an edit no longer
    /// matches the source, edits overlap, or the new tree contains errors.
    pub fn update_tree(
        &mut self,
        file_id: &str,
        edits: &[EditOperation],
        parser: &mut dyn ParserBackend,
    ) -> Option<SyntaxTree> {
        let Some(entry) = self.entries.get(file_id) else {
            self.log.scope(|| debug!(file_id, "update requested for uncached file"));
            return None;
        };
        if entry.tree.language() != parser.language() {
            self.log.scope(|| warn!(file_id, "update parser does not match cached language"));
            return None;
        }

        let ordered = match order_edits(edits) {
            Ok(ordered) => ordered,
            Err(e) => {
                self.log.scope(|| warn!(file_id, error = %e, "rejected edit batch"));
                return None;
            }
        };

        let mut working = entry.tree.clone();
        for edit in &ordered {
            if let Err(e) = apply_edit(&mut working, edit) {
                self.log.scope(|| {
                    warn!(file_id, start_byte = edit.start_byte, error = %e, "edit does not match cached source");
                });
                return None;
            }
        }

        let updated = match replay_edits(entry.tree.source(), &ordered) {
            Ok(updated) => updated,
            Err(e) => {
                self.log.scope(|| warn!(file_id, error = %e, "edit replay failed"));
                return None;
            }
        };

        let reparsed = match reparse(&working, &updated, parser) {
            Ok(tree) => tree,
            Err(e) => {
                self.log.scope(|| warn!(file_id, error = %e, "reparse rejected"));
                return None;
            }
        };

        let changed = working.changed_ranges(&reparsed).len();
        let fingerprint = xxh3_64(reparsed.source());
        self.entries.insert(
            file_id.to_string(),
            CacheEntry {
                tree: reparsed.clone(),
                fingerprint,
            },
        );
        self.log.scope(|| {
            info!(file_id, edits = ordered.len(), changed_ranges = changed, "updated tree");
        });
        Some(reparsed)
    }

    /// Drop the entry and backup for `file_id`.
    pub fn evict(&mut self, file_id: &str) -> bool {
        self.backups.remove(file_id);
        self.entries.remove(file_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.backups.clear();
    }
}

impl std::fmt::Debug for TreeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeStore")
            .field("entries", &self.entries.len())
            .field("backups", &self.backups.len())
            .finish_non_exhaustive()
    }
}
