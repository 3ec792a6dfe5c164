//! Property tests over generated Python programs.

use super::{parse_python, python_parser};
use proptest::prelude::*;
use treekeep::traversal::{find_node_at_point, get_node_at_byte_range, leaves, walk_tree};
use treekeep::{create_edit, EngineLog, Position, TreeStore};

fn statement() -> impl Strategy<Value = String> {
    prop_oneof![
        ("[a-z]{1,6}", 0u32..1000).prop_map(|(name, value)| format!("{name}_v = {value}\n")),
        ("[a-z]{1,6}", "[a-z]{1,6}")
            .prop_map(|(f, arg)| format!("def {f}_fn({arg}_a):\n    return {arg}_a\n")),
        "[a-z]{1,6}".prop_map(|text| format!("# {text}\n")),
        ("[a-z]{1,6}", 0u32..50)
            .prop_map(|(name, n)| format!("for {name}_i in range({n}):\n    pass\n")),
        ("[a-z]{1,6}", "[a-z]{1,6}")
            .prop_map(|(a, b)| format!("{a}_x = [{b}_y, {b}_y + 1, \"{a}\"]\n")),
    ]
}

fn program() -> impl Strategy<Value = String> {
    prop::collection::vec(statement(), 1..12).prop_map(|statements| statements.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Leaf text plus the whitespace between leaves rebuilds the source.
    #[test]
    fn prop_leaves_rebuild_source(source in program()) {
        let tree = parse_python(&source);
        prop_assert!(!tree.has_error());

        let bytes = tree.source();
        let mut rebuilt = Vec::with_capacity(bytes.len());
        let mut offset = 0;
        for leaf in leaves(tree.root()) {
            let gap = &bytes[offset..leaf.start_byte()];
            prop_assert!(gap.iter().all(u8::is_ascii_whitespace));
            rebuilt.extend_from_slice(gap);
            rebuilt.extend_from_slice(&bytes[leaf.start_byte()..leaf.end_byte()]);
            offset = leaf.end_byte();
        }
        rebuilt.extend_from_slice(&bytes[offset..]);
        prop_assert_eq!(rebuilt, bytes.to_vec());
    }

    /// Looking up any node's start point lands inside that node.
    #[test]
    fn prop_point_lookup_stays_inside_node(source in program()) {
        let tree = parse_python(&source);
        for node in walk_tree(tree.root()) {
            if node.start_byte() == node.end_byte() {
                continue;
            }
            let found = find_node_at_point(tree.root(), node.start_position().into());
            prop_assert!(found.is_some());
            let found = found.unwrap();
            prop_assert!(found.start_byte() >= node.start_byte());
            prop_assert!(found.end_byte() <= node.end_byte());
        }
    }

    /// Caching and reading back gives a structurally equal tree.
    #[test]
    fn prop_cache_is_idempotent(source in program()) {
        let tree = parse_python(&source);
        let mut store = TreeStore::new(EngineLog::silent());
        let _ = store.cache_tree("p.py", tree.clone(), None);
        prop_assert!(store.get_cached_tree("p.py").unwrap().structurally_eq(&tree));
    }

    /// An edit replayed through the store puts `new_text` at its start byte.
    #[test]
    fn prop_edit_replay_places_new_text(
        values in prop::collection::vec(0u32..100_000, 1..10),
        pick in any::<prop::sample::Index>(),
        replacement in 0u32..100_000,
    ) {
        let source: String = values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("x{i} = {v}\n"))
            .collect();
        let row = pick.index(values.len());
        let column = format!("x{row} = ").len();
        let old_text = values[row].to_string();
        let new_text = replacement.to_string();

        let mut parser = python_parser();
        let mut store = TreeStore::new(EngineLog::silent());
        let tree = parse_python(&source);
        let edit = create_edit(&tree, &old_text, &new_text, Position::new(row, column)).unwrap();
        let _ = store.cache_tree("x.py", tree, None);

        let updated = store.update_tree("x.py", &[edit.clone()], &mut parser).unwrap();
        let node = get_node_at_byte_range(
            updated.root(),
            edit.start_byte,
            edit.start_byte + new_text.len(),
        )
        .unwrap();
        prop_assert_eq!(updated.text(node).into_owned(), new_text);
    }

    /// Restoring after any clean update brings back the original bytes.
    #[test]
    fn prop_backup_restore_round_trip(
        values in prop::collection::vec(0u32..1000, 1..8),
        replacement in 0u32..1000,
    ) {
        let source: String = values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("y{i} = {v}\n"))
            .collect();
        let mut parser = python_parser();
        let mut store = TreeStore::new(EngineLog::silent());
        let tree = parse_python(&source);
        let edits: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(row, v)| {
                let column = format!("y{row} = ").len();
                create_edit(&tree, &v.to_string(), &replacement.to_string(), Position::new(row, column))
                    .unwrap()
            })
            .collect();
        let _ = store.cache_tree("y.py", tree, None);
        prop_assert!(store.backup_tree("y.py"));

        prop_assert!(store.update_tree("y.py", &edits, &mut parser).is_some());
        prop_assert!(store.restore_tree("y.py", &mut parser));
        prop_assert_eq!(store.get_source_bytes("y.py").unwrap(), source.as_bytes());
    }
}
