//! Declarative pattern table and the per-language registry compiled from it.
//!
//! Built-in patterns are data, one row per (language, name). Config-supplied
//! patterns are merged over them by name before anything is compiled, so
//! there is a single code path for every language.

use crate::log::EngineLog;
use crate::ts::errors::QueryCompileError;
use crate::ts::language::{language_name, SupportLang, BUILTIN_LANGUAGES};
use crate::ts::query::{compile_pattern, CompiledQuery, OptimizationSettings, QueryMatch};
use crate::ts::tree::SyntaxTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// `(language, name, pattern source)`.
pub const BUILTIN_PATTERNS: &[(SupportLang, &str, &str)] = &[
    (
        SupportLang::Python,
        "function",
        "(function_definition name: (identifier) @name parameters: (parameters) @params body: (block) @body) @function",
    ),
    (
        SupportLang::Python,
        "class",
        "(class_definition name: (identifier) @name body: (block) @body) @class",
    ),
    (
        SupportLang::Python,
        "import",
        "(import_statement) @import\n(import_from_statement) @import",
    ),
    (
        SupportLang::Python,
        "call",
        "(call function: (_) @callee arguments: (argument_list) @args) @call",
    ),
    (
        SupportLang::Python,
        "assignment",
        "(assignment left: (_) @variable.name right: (_) @variable.value) @assignment",
    ),
    (
        SupportLang::Python,
        "decorator",
        "(decorated_definition (decorator) @decorator definition: (_) @definition)",
    ),
    (
        SupportLang::Python,
        "control_flow",
        "(if_statement) @control_flow\n(for_statement) @control_flow\n(while_statement) @control_flow\n(try_statement) @control_flow\n(with_statement) @control_flow",
    ),
    (
        SupportLang::Rust,
        "function",
        "(function_item name: (identifier) @name parameters: (parameters) @params body: (block) @body) @function",
    ),
    (
        SupportLang::Rust,
        "struct",
        "(struct_item name: (type_identifier) @name) @struct",
    ),
    (
        SupportLang::Rust,
        "enum",
        "(enum_item name: (type_identifier) @name) @enum",
    ),
    (SupportLang::Rust, "impl", "(impl_item type: (_) @type) @impl"),
    (
        SupportLang::Rust,
        "trait",
        "(trait_item name: (type_identifier) @name) @trait",
    ),
    (SupportLang::Rust, "use", "(use_declaration argument: (_) @path) @use"),
    (
        SupportLang::Rust,
        "call",
        "(call_expression function: (_) @callee arguments: (arguments) @args) @call",
    ),
    (
        SupportLang::Rust,
        "macro",
        "(macro_invocation macro: (_) @name) @macro",
    ),
    (
        SupportLang::JavaScript,
        "function",
        "(function_declaration name: (identifier) @name) @function\n(method_definition name: (_) @name) @function\n(arrow_function) @function\n(function_expression) @function",
    ),
    (
        SupportLang::JavaScript,
        "class",
        "(class_declaration name: (identifier) @name) @class",
    ),
    (
        SupportLang::JavaScript,
        "import",
        "(import_statement source: (string) @source) @import",
    ),
    (
        SupportLang::JavaScript,
        "call",
        "(call_expression function: (_) @callee arguments: (arguments) @args) @call",
    ),
    (
        SupportLang::JavaScript,
        "variable",
        "(variable_declarator name: (_) @variable.name value: (_) @variable.value) @variable",
    ),
    (
        SupportLang::TypeScript,
        "function",
        "(function_declaration name: (identifier) @name) @function\n(method_definition name: (_) @name) @function\n(arrow_function) @function",
    ),
    (
        SupportLang::TypeScript,
        "class",
        "(class_declaration name: (_) @name) @class",
    ),
    (
        SupportLang::TypeScript,
        "interface",
        "(interface_declaration name: (type_identifier) @name) @interface",
    ),
    (
        SupportLang::TypeScript,
        "type_alias",
        "(type_alias_declaration name: (type_identifier) @name) @type_alias",
    ),
    (
        SupportLang::TypeScript,
        "import",
        "(import_statement source: (string) @source) @import",
    ),
    (
        SupportLang::TypeScript,
        "call",
        "(call_expression function: (_) @callee arguments: (arguments) @args) @call",
    ),
];

/// A named pattern supplied at runtime, e.g. from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub language: String,
    pub name: String,
    pub source: String,
}

#[derive(Error, Debug)]
#[error("pattern `{name}` for {language}: {source}")]
pub struct PatternError {
    pub language: String,
    pub name: String,
    #[source]
    pub source: QueryCompileError,
}

/// Compiled patterns for one language, keyed by name.
#[derive(Debug)]
pub struct CompiledQuerySet {
    language: SupportLang,
    queries: BTreeMap<String, CompiledQuery>,
}

impl CompiledQuerySet {
    pub fn language(&self) -> SupportLang {
        self.language
    }

    pub fn get(&self, name: &str) -> Option<&CompiledQuery> {
        self.queries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CompiledQuery> {
        self.queries.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// `language -> CompiledQuerySet`, built once at startup.
#[derive(Debug)]
pub struct PatternRegistry {
    sets: HashMap<SupportLang, CompiledQuerySet>,
}

impl PatternRegistry {
    /// Every built-in pattern for every built-in language, default settings.
    pub fn builtin(log: EngineLog) -> Result<Self, PatternError> {
        Self::build(BUILTIN_LANGUAGES, &[], &OptimizationSettings::default(), log)
    }

    /// Compile built-ins for `languages`, with `extra` overriding same-named
    /// built-ins. Extra patterns for languages outside `languages` are added
    /// as well. Any compile failure aborts the whole build.
    pub fn build(
        languages: &[SupportLang],
        extra: &[(SupportLang, PatternSpec)],
        settings: &OptimizationSettings,
        log: EngineLog,
    ) -> Result<Self, PatternError> {
        let mut table: BTreeMap<(String, String), (SupportLang, String)> = BTreeMap::new();
        for (language, name, source) in BUILTIN_PATTERNS {
            if languages.contains(language) {
                table.insert(
                    (language_name(*language), name.to_string()),
                    (*language, source.to_string()),
                );
            }
        }
        for (language, spec) in extra {
            table.insert(
                (language_name(*language), spec.name.clone()),
                (*language, spec.source.clone()),
            );
        }

        let mut sets: HashMap<SupportLang, CompiledQuerySet> = HashMap::new();
        for ((language_key, name), (language, source)) in table {
            let mut query =
                compile_pattern(&source, language, log.clone()).map_err(|source| PatternError {
                    language: language_key.clone(),
                    name: name.clone(),
                    source,
                })?;
            if *settings != OptimizationSettings::default() {
                query.configure(settings.clone());
            }
            sets.entry(language)
                .or_insert_with(|| CompiledQuerySet {
                    language,
                    queries: BTreeMap::new(),
                })
                .queries
                .insert(name, query);
        }

        log.scope(|| {
            for set in sets.values() {
                debug!(
                    language = %language_name(set.language),
                    patterns = set.len(),
                    "compiled pattern set"
                );
            }
        });
        Ok(Self { sets })
    }

    pub fn languages(&self) -> Vec<SupportLang> {
        let mut languages: Vec<_> = self.sets.keys().copied().collect();
        languages.sort_by_key(|lang| language_name(*lang));
        languages
    }

    pub fn set(&self, language: SupportLang) -> Option<&CompiledQuerySet> {
        self.sets.get(&language)
    }

    pub fn get(&self, language: SupportLang, name: &str) -> Option<&CompiledQuery> {
        self.sets.get(&language)?.get(name)
    }

    pub fn get_mut(&mut self, language: SupportLang, name: &str) -> Option<&mut CompiledQuery> {
        self.sets.get_mut(&language)?.get_mut(name)
    }

    /// Run the named pattern for the tree's language. `None` when no such
    /// pattern is registered.
    pub fn find<'tree>(
        &mut self,
        tree: &'tree SyntaxTree,
        name: &str,
    ) -> Option<Vec<QueryMatch<'tree>>> {
        let query = self.get_mut(tree.language(), name)?;
        Some(query.execute(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::parser::LanguageParser;

    fn registry() -> PatternRegistry {
        PatternRegistry::builtin(EngineLog::silent()).unwrap()
    }

    #[test]
    fn every_builtin_pattern_compiles() {
        let registry = registry();
        assert_eq!(registry.languages().len(), BUILTIN_LANGUAGES.len());
        let total: usize = registry
            .languages()
            .into_iter()
            .filter_map(|lang| registry.set(lang))
            .map(CompiledQuerySet::len)
            .sum();
        assert_eq!(total, BUILTIN_PATTERNS.len());
    }

    #[test]
    fn python_functions_are_found() {
        let mut registry = registry();
        let tree = LanguageParser::new(SupportLang::Python)
            .unwrap()
            .parse_str("def a(x):\n    return x\n\nclass B:\n    def c(self):\n        pass\n")
            .unwrap();

        let matches = registry.find(&tree, "function").unwrap();
        let names: Vec<_> = matches
            .iter()
            .filter_map(|m| m.capture("name"))
            .map(|n| tree.text(n).into_owned())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(registry.find(&tree, "no_such_pattern").is_none());
    }

    #[test]
    fn rust_structs_are_found() {
        let mut registry = registry();
        let tree = LanguageParser::new(SupportLang::Rust)
            .unwrap()
            .parse_str("struct Foo { x: i32 }\nstruct Bar;\nenum Baz { A }\n")
            .unwrap();
        assert_eq!(registry.find(&tree, "struct").unwrap().len(), 2);
        assert_eq!(registry.find(&tree, "enum").unwrap().len(), 1);
    }

    #[test]
    fn extra_patterns_override_builtins() {
        let extra = vec![(
            SupportLang::Python,
            PatternSpec {
                language: "python".to_string(),
                name: "function".to_string(),
                source: "(function_definition) @function".to_string(),
            },
        )];
        let registry = PatternRegistry::build(
            &[SupportLang::Python],
            &extra,
            &OptimizationSettings::default(),
            EngineLog::silent(),
        )
        .unwrap();
        let query = registry.get(SupportLang::Python, "function").unwrap();
        assert_eq!(query.source(), "(function_definition) @function");
        assert!(registry.get(SupportLang::Rust, "function").is_none());
    }

    #[test]
    fn bad_extra_pattern_names_itself() {
        let extra = vec![(
            SupportLang::Python,
            PatternSpec {
                language: "python".to_string(),
                name: "broken".to_string(),
                source: "(not_a_node) @x".to_string(),
            },
        )];
        let err = PatternRegistry::build(
            &[SupportLang::Python],
            &extra,
            &OptimizationSettings::default(),
            EngineLog::silent(),
        )
        .unwrap_err();
        assert_eq!(err.name, "broken");
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn settings_apply_to_every_pattern() {
        let settings = OptimizationSettings {
            match_limit: Some(3),
            ..OptimizationSettings::default()
        };
        let registry =
            PatternRegistry::build(&[SupportLang::Rust], &[], &settings, EngineLog::silent())
                .unwrap();
        let query = registry.get(SupportLang::Rust, "function").unwrap();
        assert_eq!(query.settings().match_limit, Some(3));
    }
}
