//! End-to-end scenarios over the public API.

use super::{parse_python, python_parser};
use treekeep::traversal::{find_common_ancestor, find_nodes_by_type, get_node_at_byte_range};
use treekeep::ts::error_nodes;
use treekeep::{
    apply_edit, compile_pattern, create_edit, reparse, CacheOutcome, EngineLog, Position,
    SupportLang, TreeStore,
};

#[test]
fn replace_function_body_and_reparse() {
    let mut parser = python_parser();
    let mut tree = parse_python("def hello(): pass");

    // Columns are byte columns; `pass` starts at byte 13.
    let edit = create_edit(&tree, "pass", "return True", Position::new(0, 13)).unwrap();
    let mut updated = tree.source().to_vec();
    edit.replay(&mut updated).unwrap();
    apply_edit(&mut tree, &edit).unwrap();

    let reparsed = reparse(&tree, &updated, &mut parser).unwrap();
    assert_eq!(reparsed.source(), b"def hello(): return True");
    assert!(error_nodes(&reparsed).is_empty());

    let node = get_node_at_byte_range(reparsed.root(), edit.start_byte, edit.new_end_byte).unwrap();
    assert_eq!(reparsed.text(node), "return True");
}

#[test]
fn failed_update_keeps_previous_tree() {
    let mut parser = python_parser();
    let mut store = TreeStore::new(EngineLog::silent());
    let t1 = parse_python("def f():\n    return 1\n");

    assert_eq!(store.cache_tree("a.py", t1.clone(), None), CacheOutcome::Cached);
    assert!(store.backup_tree("a.py"));

    let broken = create_edit(&t1, "return 1", "return 1 +", Position::new(1, 4)).unwrap();
    assert!(store.update_tree("a.py", &[broken], &mut parser).is_none());

    let cached = store.get_cached_tree("a.py").unwrap();
    assert!(cached.structurally_eq(&t1));
    assert_eq!(store.get_source_bytes("a.py"), Some(t1.source()));
}

#[test]
fn sibling_functions_share_the_module_as_ancestor() {
    let tree = parse_python("def f():\n    x = 1\n\ndef g():\n    y = 2\n");
    let identifiers = find_nodes_by_type(tree.root(), "identifier");
    let x = identifiers
        .iter()
        .copied()
        .find(|n| tree.text(*n) == "x")
        .unwrap();
    let y = identifiers
        .iter()
        .copied()
        .find(|n| tree.text(*n) == "y")
        .unwrap();

    let ancestor = find_common_ancestor(x, y).unwrap();
    assert_eq!(ancestor.id(), tree.root().id());
    assert_eq!(ancestor.kind(), "module");
}

#[test]
fn function_names_match_in_source_order() {
    let tree = parse_python("def f(): pass\ndef g(): pass");
    let mut query = compile_pattern(
        "(function_definition name: (identifier) @name)",
        SupportLang::Python,
        EngineLog::silent(),
    )
    .unwrap();

    let matches = query.execute(&tree);
    assert_eq!(matches.len(), 2);
    let names: Vec<_> = matches
        .iter()
        .map(|m| tree.text(m.capture("name").unwrap()).into_owned())
        .collect();
    assert_eq!(names, ["f", "g"]);
}

#[test]
fn multi_line_edit_updates_points() {
    let mut parser = python_parser();
    let mut store = TreeStore::new(EngineLog::silent());
    let tree = parse_python("def f():\n    pass\n");
    let edit = create_edit(
        &tree,
        "pass",
        "x = 1\n    return x",
        Position::new(1, 4),
    )
    .unwrap();
    assert_eq!(edit.new_end_point, Position::new(2, 12));
    let _ = store.cache_tree("f.py", tree, None);

    let updated = store.update_tree("f.py", &[edit], &mut parser).unwrap();
    assert_eq!(updated.source(), b"def f():\n    x = 1\n    return x\n");
    assert!(!updated.has_error());
}
