use crate::log::EngineLog;
use crate::pool::with_parser;
use crate::traversal::{find_error_nodes, find_missing_nodes, get_valid_symbols_at_error};
use crate::ts::errors::TreeSitterError;
use crate::ts::language::{grammar, SupportLang};
use crate::ts::parser::{error_nodes, ErrorNode, ParserBackend};
use crate::ts::query::compile_pattern;
use tracing::warn;
use tree_sitter::Node;

const ERROR_PATTERN: &str = "(ERROR) @error";
const MAX_EXPECTED_SYMBOLS: usize = 8;

/// Check a subtree for error and missing nodes.
///
/// Returns `(true, [])` for a clean subtree, otherwise one message per
/// offending node with its 1-based line and byte column.
pub fn validate_syntax(
    node: Node<'_>,
    source: &[u8],
    language: SupportLang,
    log: &EngineLog,
) -> (bool, Vec<String>) {
    let ts_language = grammar(language);
    let error_hits = match compile_pattern(ERROR_PATTERN, language, log.clone()) {
        Ok(mut query) => query
            .execute_node(node, source)
            .into_iter()
            .filter_map(|m| m.capture("error"))
            .collect(),
        Err(e) => {
            log.scope(|| warn!(error = %e, "error pattern failed to compile; scanning instead"));
            find_error_nodes(node)
        }
    };

    let mut messages = Vec::new();
    for error in error_hits {
        let point = error.start_position();
        let mut message = format!(
            "Syntax error at line {}, column {}",
            point.row + 1,
            point.column
        );
        let expected = get_valid_symbols_at_error(error, &ts_language);
        if !expected.is_empty() {
            let shown: Vec<_> = expected.iter().take(MAX_EXPECTED_SYMBOLS).map(String::as_str).collect();
            message.push_str(&format!(" (expected one of: {})", shown.join(", ")));
        }
        messages.push(message);
    }

    for missing in find_missing_nodes(node) {
        let point = missing.start_position();
        messages.push(format!(
            "Missing {} at line {}, column {}",
            missing.kind(),
            point.row + 1,
            point.column
        ));
    }

    if messages.is_empty() && node.has_error() {
        messages.push("Tree contains syntax errors".to_string());
    }

    (messages.is_empty(), messages)
}

/// Parse `source` with the pooled parser and fail on any error node.
pub fn validate_source(source: &str, language: SupportLang) -> Result<(), TreeSitterError> {
    let errors = with_parser(language, |parser| {
        parser
            .parse(source.as_bytes(), None)
            .map(|tree| error_nodes(&tree))
    })?
    .ok_or(TreeSitterError::ParseFailed)?;

    match errors.len() {
        0 => Ok(()),
        1 => Err(TreeSitterError::SyntaxError {
            byte_start: errors[0].byte_start,
            byte_end: errors[0].byte_end,
        }),
        n => Err(TreeSitterError::MultipleSyntaxErrors { count: n }),
    }
}

/// Check that replacing `[byte_start, byte_end)` with `new_text` does not
/// introduce parse errors.
///
/// Errors already present in `source` are ignored; an error counts as new
/// when no original error spans the same bytes.
pub fn validate_edit(
    source: &str,
    byte_start: usize,
    byte_end: usize,
    new_text: &str,
    language: SupportLang,
) -> Result<(), TreeSitterError> {
    if byte_start > byte_end
        || byte_end > source.len()
        || !source.is_char_boundary(byte_start)
        || !source.is_char_boundary(byte_end)
    {
        return Err(TreeSitterError::InvalidRange {
            byte_start,
            byte_end,
            len: source.len(),
        });
    }

    let mut candidate = String::with_capacity(source.len() - (byte_end - byte_start) + new_text.len());
    candidate.push_str(&source[..byte_start]);
    candidate.push_str(new_text);
    candidate.push_str(&source[byte_end..]);

    let (original, updated) = with_parser(language, |parser| {
        let original = parser.parse(source.as_bytes(), None).map(|t| error_nodes(&t));
        parser.reset();
        let updated = parser.parse(candidate.as_bytes(), None).map(|t| error_nodes(&t));
        (original, updated)
    })?;
    let original = original.ok_or(TreeSitterError::ParseFailed)?;
    let updated = updated.ok_or(TreeSitterError::ParseFailed)?;

    let introduced = introduced_errors(&original, &updated);
    match introduced.len() {
        0 => Ok(()),
        1 => Err(TreeSitterError::SyntaxError {
            byte_start: introduced[0].byte_start,
            byte_end: introduced[0].byte_end,
        }),
        n => Err(TreeSitterError::MultipleSyntaxErrors { count: n }),
    }
}

fn introduced_errors<'a>(original: &[ErrorNode], updated: &'a [ErrorNode]) -> Vec<&'a ErrorNode> {
    updated
        .iter()
        .filter(|e| {
            !original
                .iter()
                .any(|o| o.byte_start == e.byte_start && o.byte_end == e.byte_end)
        })
        .collect()
}
