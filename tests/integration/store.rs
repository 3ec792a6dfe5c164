//! Tree store state transitions: cache, update, backup, restore.

use super::{parse_python, python_parser};
use treekeep::cache::RejectReason;
use treekeep::{
    create_edit, AstEngine, CacheOutcome, EngineLog, LanguageParser, Position, SupportLang,
    TreeStore,
};

#[test]
fn backup_update_restore_round_trip() {
    let mut parser = python_parser();
    let mut store = TreeStore::new(EngineLog::silent());
    let original = "def area(w, h):\n    return w * h\n\nprint(area(2, 3))\n";
    let tree = parse_python(original);
    let edits = vec![
        create_edit(&tree, "area", "surface", Position::new(0, 4)).unwrap(),
        create_edit(&tree, "area", "surface", Position::new(3, 6)).unwrap(),
        create_edit(&tree, "w * h", "h * w", Position::new(1, 11)).unwrap(),
    ];

    let _ = store.cache_tree("geo.py", tree, None);
    let before = store.source_fingerprint("geo.py");
    assert!(store.backup_tree("geo.py"));

    let updated = store.update_tree("geo.py", &edits, &mut parser).unwrap();
    assert_eq!(
        updated.source(),
        b"def surface(w, h):\n    return h * w\n\nprint(surface(2, 3))\n"
    );
    assert_ne!(store.source_fingerprint("geo.py"), before);

    assert!(store.restore_tree("geo.py", &mut parser));
    assert_eq!(store.get_source_bytes("geo.py"), Some(original.as_bytes()));
    assert_eq!(store.source_fingerprint("geo.py"), before);
}

#[test]
fn edits_are_order_independent() {
    let mut parser = python_parser();
    let tree = parse_python("a = 1\nb = 2\nc = 3\n");
    let forward = vec![
        create_edit(&tree, "1", "one", Position::new(0, 4)).unwrap(),
        create_edit(&tree, "2", "two", Position::new(1, 4)).unwrap(),
        create_edit(&tree, "3", "three", Position::new(2, 4)).unwrap(),
    ];
    let mut backward = forward.clone();
    backward.reverse();

    let mut first = TreeStore::new(EngineLog::silent());
    let _ = first.cache_tree("x.py", tree.clone(), None);
    let a = first.update_tree("x.py", &forward, &mut parser).unwrap();

    let mut second = TreeStore::new(EngineLog::silent());
    let _ = second.cache_tree("x.py", tree, None);
    let b = second.update_tree("x.py", &backward, &mut parser).unwrap();

    assert_eq!(a.source(), b"a = one\nb = two\nc = three\n");
    assert!(a.structurally_eq(&b));
}

#[test]
fn shared_start_edits_are_rejected_in_either_order() {
    let mut parser = python_parser();
    let tree = parse_python("x = 1\n");
    let insert = create_edit(&tree, "", "y", Position::new(0, 4)).unwrap();
    let replace = create_edit(&tree, "1", "2", Position::new(0, 4)).unwrap();

    for batch in [
        vec![insert.clone(), replace.clone()],
        vec![replace, insert],
    ] {
        let mut store = TreeStore::new(EngineLog::silent());
        let _ = store.cache_tree("x.py", tree.clone(), None);
        assert!(store.update_tree("x.py", &batch, &mut parser).is_none());
        assert_eq!(store.get_source_bytes("x.py"), Some(&b"x = 1\n"[..]));
    }
}

#[test]
fn overlapping_edits_are_rejected_whole() {
    let mut parser = python_parser();
    let mut store = TreeStore::new(EngineLog::silent());
    let tree = parse_python("total = 12345\n");
    let edits = vec![
        create_edit(&tree, "123", "9", Position::new(0, 8)).unwrap(),
        create_edit(&tree, "345", "9", Position::new(0, 10)).unwrap(),
    ];
    let _ = store.cache_tree("t.py", tree, None);

    assert!(store.update_tree("t.py", &edits, &mut parser).is_none());
    assert_eq!(store.get_source_bytes("t.py"), Some(&b"total = 12345\n"[..]));
}

#[test]
fn restore_refuses_unparseable_backup() {
    let mut parser = python_parser();
    let mut store = TreeStore::new(EngineLog::silent());
    let broken = parse_python("def f(:\n");
    let _ = store.cache_tree("b.py", broken, None);
    assert!(store.backup_tree("b.py"));

    let fixed = parse_python("def f():\n    pass\n");
    assert_eq!(store.cache_tree("b.py", fixed, None), CacheOutcome::Replaced);

    assert!(!store.restore_tree("b.py", &mut parser));
    assert_eq!(
        store.get_source_bytes("b.py"),
        Some(&b"def f():\n    pass\n"[..])
    );
    assert!(store.has_backup("b.py"));
}

#[test]
fn supplied_source_replaces_tree_source() {
    let mut store = TreeStore::new(EngineLog::silent());
    let tree = parse_python("x = 1\n");
    let outcome = store.cache_tree("s.py", tree, Some(b"x = 1\n# trailing\n"));
    assert_eq!(outcome, CacheOutcome::Cached);
    assert_eq!(
        store.get_source_bytes("s.py"),
        Some(&b"x = 1\n# trailing\n"[..])
    );

    let short = parse_python("value = 1\n");
    assert!(matches!(
        store.cache_tree("s.py", short, Some(b"v")),
        CacheOutcome::Rejected(RejectReason::SourceTooShort { .. })
    ));
}

#[test]
fn stores_are_keyed_per_file() {
    let mut rust = LanguageParser::new(SupportLang::Rust).unwrap();
    let mut store = TreeStore::new(EngineLog::silent());
    let _ = store.cache_tree("a.py", parse_python("x = 1\n"), None);
    let _ = store.cache_tree("b.rs", rust.parse_str("fn main() {}\n").unwrap(), None);

    let mut ids: Vec<_> = store.file_ids().collect();
    ids.sort_unstable();
    assert_eq!(ids, ["a.py", "b.rs"]);
    assert_eq!(
        store.get_cached_tree("b.rs").unwrap().language(),
        SupportLang::Rust
    );

    // A Python parser cannot update a Rust entry.
    let tree = store.get_cached_tree("b.rs").unwrap().clone();
    let edit = create_edit(&tree, "main", "start", Position::new(0, 3)).unwrap();
    let mut python = python_parser();
    assert!(store.update_tree("b.rs", &[edit.clone()], &mut python).is_none());
    assert!(store.update_tree("b.rs", &[edit], &mut rust).is_some());
}

#[test]
fn engine_round_trip_through_pooled_parsers() {
    let mut engine = AstEngine::new(EngineLog::silent()).unwrap();
    let _ = engine
        .open("app.ts", "const x: number = 1;\n", SupportLang::TypeScript)
        .unwrap();
    assert!(engine.backup("app.ts"));

    let updated = engine
        .edit("app.ts", "1", "2", Position::new(0, 18))
        .unwrap()
        .unwrap();
    assert_eq!(updated.source(), b"const x: number = 2;\n");

    assert!(engine.restore("app.ts"));
    assert_eq!(
        engine.store().get_source_bytes("app.ts"),
        Some(&b"const x: number = 1;\n"[..])
    );
}
