//! Language registry: grammar handles resolved by name.
//!
//! Grammars come from `ast-grep-language`'s bundled set. Resolution accepts
//! the same aliases `SupportLang` does (`python`/`py`, `rust`/`rs`, ...).

use crate::ts::errors::TreeSitterError;
pub use ast_grep_language::SupportLang;
use ast_grep_language::LanguageExt;
use std::str::FromStr;

/// Languages that ship built-in pattern tables.
pub const BUILTIN_LANGUAGES: &[SupportLang] = &[
    SupportLang::Python,
    SupportLang::Rust,
    SupportLang::JavaScript,
    SupportLang::TypeScript,
];

/// Resolve a language name to its grammar identifier.
pub fn resolve(name: &str) -> Result<SupportLang, TreeSitterError> {
    SupportLang::from_str(name.trim()).map_err(|_| TreeSitterError::UnknownLanguage {
        name: name.to_string(),
    })
}

/// Built-in language for a file extension, used by the CLI when no language
/// is given explicitly.
pub fn from_extension(ext: &str) -> Option<SupportLang> {
    match ext.to_lowercase().as_str() {
        "py" | "pyi" => Some(SupportLang::Python),
        "rs" => Some(SupportLang::Rust),
        "js" | "mjs" | "cjs" | "jsx" => Some(SupportLang::JavaScript),
        "ts" | "mts" | "cts" => Some(SupportLang::TypeScript),
        _ => None,
    }
}

/// File extensions [`from_extension`] maps to `lang`.
pub fn extensions(lang: SupportLang) -> &'static [&'static str] {
    match lang {
        SupportLang::Python => &["py", "pyi"],
        SupportLang::Rust => &["rs"],
        SupportLang::JavaScript => &["js", "mjs", "cjs", "jsx"],
        SupportLang::TypeScript => &["ts", "mts", "cts"],
        _ => &[],
    }
}

/// The tree-sitter grammar behind a language.
pub fn grammar(lang: SupportLang) -> tree_sitter::Language {
    lang.get_ts_language()
}

/// Canonical lower-case name, used as a stable key in configs and logs.
pub fn language_name(lang: SupportLang) -> String {
    format!("{lang:?}").to_lowercase()
}

/// Every named, visible node type the grammar defines.
pub fn named_node_kinds(language: &tree_sitter::Language) -> Vec<&'static str> {
    let mut kinds: Vec<&'static str> = (0..language.node_kind_count())
        .filter_map(|id| u16::try_from(id).ok())
        .filter(|id| language.node_kind_is_named(*id) && language.node_kind_is_visible(*id))
        .filter_map(|id| language.node_kind_for_id(id))
        .collect();
    kinds.sort_unstable();
    kinds.dedup();
    kinds
}

/// Closest named node type to `unknown`, for "did you mean" hints.
pub fn closest_node_kind(language: &tree_sitter::Language, unknown: &str) -> Option<String> {
    named_node_kinds(language)
        .into_iter()
        .map(|kind| (strsim::jaro_winkler(unknown, kind), kind))
        .filter(|(score, _)| *score >= 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, kind)| kind.to_string())
}
