use serde_json::json;

use crate::test_support::{leaf, node};
use crate::{IdAllocator, SnapshotInstance, SnapshotTree, TreeError, ROOT_ID};

#[test]
fn new_tree_only_has_root() {
    let tree = SnapshotTree::new();
    assert!(tree.is_empty());
    assert!(tree.contains(ROOT_ID));
    assert!(tree.root_children().is_empty());
    assert_eq!(tree.pre_order(), vec![ROOT_ID]);
}

#[test]
fn insert_before_positions_children() {
    let mut tree = SnapshotTree::new();
    node(&mut tree, ROOT_ID, 1, "T", vec![json!("a")]);
    node(&mut tree, ROOT_ID, 3, "T", vec![json!("c")]);
    tree.insert(SnapshotInstance::new(2, Some("T".into()), vec![json!("b")]).container())
        .unwrap();
    tree.insert_before(ROOT_ID, 2, Some(3)).unwrap();

    assert_eq!(tree.root_children(), &[1, 2, 3]);
    assert_eq!(tree.get(2).unwrap().parent(), Some(ROOT_ID));
}

#[test]
fn insert_moves_between_parents() {
    let mut tree = SnapshotTree::new();
    node(&mut tree, ROOT_ID, 1, "T", vec![json!("a")]);
    node(&mut tree, ROOT_ID, 2, "T", vec![json!("b")]);
    node(&mut tree, 1, 3, "T", vec![json!("c")]);

    tree.insert_before(2, 3, None).unwrap();

    assert!(tree.get(1).unwrap().children().is_empty());
    assert_eq!(tree.get(2).unwrap().children(), &[3]);
    assert_eq!(tree.get(3).unwrap().parent(), Some(2));
}

#[test]
fn insert_rejects_cycles_and_leaves() {
    let mut tree = SnapshotTree::new();
    node(&mut tree, ROOT_ID, 1, "T", vec![json!("a")]);
    node(&mut tree, 1, 2, "T", vec![json!("b")]);
    leaf(&mut tree, 2, 3, "Button", vec![json!("x")]);

    assert_eq!(
        tree.insert_before(2, 1, None),
        Err(TreeError::Cycle { parent: 2, child: 1 })
    );
    assert_eq!(tree.insert_before(3, 2, None), Err(TreeError::Leaf { id: 3 }));
    assert_eq!(tree.insert_before(1, ROOT_ID, None), Err(TreeError::RootTarget));
    assert_eq!(
        tree.insert_before(ROOT_ID, 2, Some(3)),
        Err(TreeError::NotAChild {
            parent: ROOT_ID,
            child: 3
        })
    );
}

#[test]
fn remove_destroys_subtree() {
    let mut tree = SnapshotTree::new();
    node(&mut tree, ROOT_ID, 1, "T", vec![json!("a")]);
    node(&mut tree, 1, 2, "T", vec![json!("b")]);
    node(&mut tree, 2, 3, "T", vec![json!("c")]);
    node(&mut tree, ROOT_ID, 4, "T", vec![json!("d")]);

    let removed = tree.remove(1).unwrap();

    assert_eq!(removed, vec![1, 2, 3]);
    assert_eq!(tree.root_children(), &[4]);
    assert!(!tree.contains(2));
    assert_eq!(tree.remove(ROOT_ID), Err(TreeError::RootTarget));
    assert_eq!(tree.remove(1), Err(TreeError::Missing { id: 1 }));
}

#[test]
fn set_children_detaches_dropped_children() {
    let mut tree = SnapshotTree::new();
    node(&mut tree, ROOT_ID, 1, "T", vec![json!("p")]);
    node(&mut tree, 1, 2, "T", vec![json!("a")]);
    node(&mut tree, 1, 3, "T", vec![json!("b")]);
    node(&mut tree, ROOT_ID, 4, "T", vec![json!("c")]);

    let detached = tree.set_children(1, vec![4, 3]).unwrap();

    assert_eq!(detached, vec![2]);
    assert_eq!(tree.get(1).unwrap().children(), &[4, 3]);
    assert_eq!(tree.root_children(), &[1]);
    assert_eq!(tree.get(2).unwrap().parent(), None);
    assert!(tree.contains(2));
    assert_eq!(
        tree.set_children(1, vec![3, 3]),
        Err(TreeError::DuplicateChild { parent: 1, child: 3 })
    );
}

#[test]
fn set_value_reports_change() {
    let mut tree = SnapshotTree::new();
    node(&mut tree, ROOT_ID, 1, "T", vec![json!("a")]);

    assert_eq!(tree.set_value(1, 0, json!("a")), Ok(false));
    assert_eq!(tree.set_value(1, 0, json!("b")), Ok(true));
    assert_eq!(
        tree.set_value(1, 2, json!("c")),
        Err(TreeError::IndexOutOfRange {
            id: 1,
            index: 2,
            len: 1
        })
    );
}

#[test]
fn observable_equality_ignores_extra_props() {
    let mut a = SnapshotTree::new();
    node(&mut a, ROOT_ID, 1, "T", vec![json!("a")]);
    let mut b = a.clone();
    b.set_extra_props(1, Some(json!({"item-key": "k"}))).unwrap();
    assert!(a.observably_eq(&b));

    b.set_value(1, 0, json!("z")).unwrap();
    assert!(!a.observably_eq(&b));
}

#[test]
fn id_allocator_is_monotonic() {
    let mut ids = IdAllocator::new();
    assert_eq!(ids.allocate(), 1);
    assert_eq!(ids.allocate(), 2);
    assert!(ids.issued(2));
    assert!(!ids.issued(3));
    ids.reserve_through(10);
    assert_eq!(ids.allocate(), 11);
    ids.reserve_through(4);
    assert_eq!(ids.peek(), 12);
}

#[test]
fn dump_lists_reachable_instances() {
    let mut tree = SnapshotTree::new();
    node(&mut tree, ROOT_ID, 1, "T", vec![json!("a")]);
    let dump = tree.dump();
    assert!(dump.contains("[1] T [\"a\"]"), "{dump}");
}
