//! Query execution limits and the built-in pattern registry.

use super::parse_python;
use std::time::Duration;
use treekeep::ts::validate_syntax;
use treekeep::{
    compile_pattern, EngineLog, LanguageParser, OptimizationSettings, PatternRegistry, Position,
    SupportLang,
};

fn many_calls(count: usize) -> String {
    (0..count).map(|i| format!("print({i})\n")).collect()
}

#[test]
fn match_limit_is_enforced() {
    let tree = parse_python(&many_calls(50));
    let mut query =
        compile_pattern("(call) @call", SupportLang::Python, EngineLog::silent()).unwrap();
    assert_eq!(query.execute(&tree).len(), 50);
    assert!(!query.get_query_stats().did_exceed_match_limit);

    for k in [1u32, 7, 49] {
        query.configure(OptimizationSettings {
            match_limit: Some(k),
            ..OptimizationSettings::default()
        });
        let matches = query.execute(&tree);
        assert!(matches.len() <= k as usize);
        let stats = query.get_query_stats();
        assert!(stats.did_exceed_match_limit);
        assert_eq!(stats.match_limit, Some(k));
    }
}

#[test]
fn limit_above_match_count_is_not_exceeded() {
    let tree = parse_python(&many_calls(3));
    let mut query =
        compile_pattern("(call) @call", SupportLang::Python, EngineLog::silent()).unwrap();
    query.configure(OptimizationSettings {
        match_limit: Some(100),
        ..OptimizationSettings::default()
    });
    assert_eq!(query.execute(&tree).len(), 3);
    assert!(!query.get_query_stats().did_exceed_match_limit);
}

#[test]
fn generous_timeout_returns_everything() {
    let tree = parse_python(&many_calls(20));
    let mut query =
        compile_pattern("(call) @call", SupportLang::Python, EngineLog::silent()).unwrap();
    query.configure(OptimizationSettings {
        timeout: Some(Duration::from_secs(30)),
        ..OptimizationSettings::default()
    });
    assert_eq!(query.execute(&tree).len(), 20);
    let stats = query.get_query_stats();
    assert!(!stats.timed_out);
    assert_eq!(stats.timeout, Some(Duration::from_secs(30)));
}

#[test]
fn timeout_stops_a_scan_that_finds_nothing() {
    let source: String = (0..20_000).map(|i| format!("x{i} = {i}\n")).collect();
    let tree = parse_python(&source);
    let mut query = compile_pattern(
        "(class_definition) @class",
        SupportLang::Python,
        EngineLog::silent(),
    )
    .unwrap();
    assert!(query.execute(&tree).is_empty());
    assert!(!query.get_query_stats().timed_out);

    query.configure(OptimizationSettings {
        timeout: Some(Duration::from_nanos(1)),
        ..OptimizationSettings::default()
    });
    assert!(query.execute(&tree).is_empty());
    assert!(query.get_query_stats().timed_out);
}

#[test]
fn max_start_depth_limits_where_matches_begin() {
    let tree = parse_python("x = 1\ndef f():\n    y = 2\n");
    let mut query =
        compile_pattern("(assignment) @a", SupportLang::Python, EngineLog::silent()).unwrap();
    assert_eq!(query.execute(&tree).len(), 2);

    // module > expression_statement > assignment
    query.configure(OptimizationSettings {
        max_start_depth: Some(2),
        ..OptimizationSettings::default()
    });
    let matches = query.execute(&tree);
    assert_eq!(matches.len(), 1);
    assert_eq!(tree.text(matches[0].capture("a").unwrap()), "x = 1");
}

#[test]
fn point_range_and_node_scoped_execution() {
    let tree = parse_python("a = 1\ndef f():\n    b = 2\n    c = 3\n");
    let mut query =
        compile_pattern("(assignment) @a", SupportLang::Python, EngineLog::silent()).unwrap();

    let function = tree.root().named_child(1).unwrap();
    assert_eq!(function.kind(), "function_definition");
    assert_eq!(query.execute_node(function, tree.source()).len(), 2);

    query.configure(OptimizationSettings {
        point_range: Some(Position::new(3, 0)..Position::new(4, 0)),
        ..OptimizationSettings::default()
    });
    let matches = query.execute(&tree);
    assert_eq!(matches.len(), 1);
    assert_eq!(tree.text(matches[0].capture("a").unwrap()), "c = 3");
}

#[test]
fn registry_patterns_cover_each_language() {
    let mut registry = PatternRegistry::builtin(EngineLog::silent()).unwrap();

    let js = LanguageParser::new(SupportLang::JavaScript)
        .unwrap()
        .parse_str("import fs from 'fs';\nclass A { m() {} }\nconst f = () => 1;\nfunction g() {}\n")
        .unwrap();
    assert_eq!(registry.find(&js, "import").unwrap().len(), 1);
    assert_eq!(registry.find(&js, "class").unwrap().len(), 1);
    assert_eq!(registry.find(&js, "function").unwrap().len(), 3);

    let ts = LanguageParser::new(SupportLang::TypeScript)
        .unwrap()
        .parse_str("interface P { x: number }\ntype Q = P;\n")
        .unwrap();
    assert_eq!(registry.find(&ts, "interface").unwrap().len(), 1);
    assert_eq!(registry.find(&ts, "type_alias").unwrap().len(), 1);

    let rust = LanguageParser::new(SupportLang::Rust)
        .unwrap()
        .parse_str("use std::fmt;\nfn main() { println!(\"hi\"); helper(); }\nfn helper() {}\n")
        .unwrap();
    assert_eq!(registry.find(&rust, "use").unwrap().len(), 1);
    assert_eq!(registry.find(&rust, "function").unwrap().len(), 2);
    assert_eq!(registry.find(&rust, "macro").unwrap().len(), 1);
    assert_eq!(registry.find(&rust, "call").unwrap().len(), 1);
}

#[test]
fn validation_messages_name_position_and_expectations() {
    let tree = parse_python("def f():\n    return 1\n)\n");
    let (ok, messages) = validate_syntax(
        tree.root(),
        tree.source(),
        SupportLang::Python,
        &EngineLog::silent(),
    );
    assert!(!ok);
    assert!(messages
        .iter()
        .any(|m| m.contains("line 3") && m.contains("expected one of")));
}
