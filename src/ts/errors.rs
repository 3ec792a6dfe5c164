use crate::position::Position;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to set language {language} for parser")]
    LanguageSet { language: String },

    #[error("unknown language: {name}")]
    UnknownLanguage { name: String },

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("syntax error detected at byte {byte_start}..{byte_end}")]
    SyntaxError { byte_start: usize, byte_end: usize },

    #[error("multiple syntax errors detected: {count} ERROR nodes")]
    MultipleSyntaxErrors { count: usize },

    #[error("byte range {byte_start}..{byte_end} is invalid for a source of {len} bytes")]
    InvalidRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A structural pattern that failed to compile. Never partially compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid pattern at byte {offset} ({row}:{column}): {kind}{}", suggestion_suffix(.suggestion))]
pub struct QueryCompileError {
    /// Byte offset of the offending token in the pattern source.
    pub offset: usize,
    pub row: usize,
    pub column: usize,
    pub kind: String,
    pub message: String,
    /// Closest known node type when the failure is an unknown node type.
    pub suggestion: Option<String>,
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean `{s}`?)"),
        None => String::new(),
    }
}

/// Incremental reparse produced a tree that is not fit to cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReparseError {
    #[error("parser produced no tree")]
    ParseFailed,

    #[error("reparsed tree contains {kind} at {position} (byte {byte})")]
    Invalid {
        kind: String,
        position: Position,
        byte: usize,
    },
}
