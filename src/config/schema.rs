use crate::ts::language::{resolve, SupportLang, BUILTIN_LANGUAGES};
use crate::ts::patterns::PatternSpec;
use crate::ts::query::OptimizationSettings;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Languages to build pattern registries for. Empty means every
    /// built-in language.
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub query: QueryDefaults,
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
}

/// Default execution settings for every compiled pattern.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    pub match_limit: Option<u32>,
    pub max_start_depth: Option<u32>,
    pub timeout_ms: Option<u64>,
}

impl QueryDefaults {
    pub fn to_settings(&self) -> OptimizationSettings {
        OptimizationSettings {
            match_limit: self.match_limit,
            max_start_depth: self.max_start_depth,
            timeout: self.timeout_ms.map(Duration::from_millis),
            byte_range: None,
            point_range: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        for name in &self.languages {
            if resolve(name).is_err() {
                issues.push(ValidationIssue::UnknownLanguage {
                    pattern: None,
                    name: name.clone(),
                });
            }
        }

        if self.query.match_limit == Some(0) {
            issues.push(ValidationIssue::InvalidValue {
                field: "query.match_limit",
                message: "must be at least 1".to_string(),
            });
        }
        if self.query.timeout_ms == Some(0) {
            issues.push(ValidationIssue::InvalidValue {
                field: "query.timeout_ms",
                message: "must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for pattern in &self.patterns {
            let label = (!pattern.name.trim().is_empty()).then(|| pattern.name.clone());
            if label.is_none() {
                issues.push(ValidationIssue::MissingField {
                    pattern: None,
                    field: "name",
                });
            }
            if pattern.source.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    pattern: label.clone(),
                    field: "source",
                });
            }
            match resolve(&pattern.language) {
                Ok(language) => {
                    if !seen.insert((language, pattern.name.clone())) {
                        issues.push(ValidationIssue::DuplicatePattern {
                            language: pattern.language.clone(),
                            name: pattern.name.clone(),
                        });
                    }
                }
                Err(_) => issues.push(ValidationIssue::UnknownLanguage {
                    pattern: label,
                    name: pattern.language.clone(),
                }),
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Languages to build registries for, falling back to the built-in set.
    /// Names that do not resolve are skipped; [`EngineConfig::validate`]
    /// reports them.
    pub fn resolved_languages(&self) -> Vec<SupportLang> {
        if self.languages.is_empty() {
            return BUILTIN_LANGUAGES.to_vec();
        }
        let mut languages = Vec::new();
        for language in self.languages.iter().filter_map(|name| resolve(name).ok()) {
            if !languages.contains(&language) {
                languages.push(language);
            }
        }
        languages
    }

    /// Config patterns paired with their resolved language.
    pub fn extra_patterns(&self) -> Vec<(SupportLang, PatternSpec)> {
        self.patterns
            .iter()
            .filter_map(|spec| resolve(&spec.language).ok().map(|lang| (lang, spec.clone())))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    UnknownLanguage {
        pattern: Option<String>,
        name: String,
    },
    MissingField {
        pattern: Option<String>,
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
    DuplicatePattern {
        language: String,
        name: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::UnknownLanguage { pattern, name } => match pattern {
                Some(id) => write!(f, "pattern '{id}' uses unknown language '{name}'"),
                None => write!(f, "unknown language '{name}'"),
            },
            ValidationIssue::MissingField { pattern, field } => match pattern {
                Some(id) => write!(f, "pattern '{id}' missing required field '{field}'"),
                None => write!(f, "pattern missing required field '{field}'"),
            },
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "invalid value for '{field}': {message}")
            }
            ValidationIssue::DuplicatePattern { language, name } => {
                write!(f, "pattern '{name}' defined twice for {language}")
            }
        }
    }
}
