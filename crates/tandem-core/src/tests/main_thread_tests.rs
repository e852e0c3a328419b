use serde_json::json;

use crate::element::PAGE_TAG;
use crate::test_support::{leaf, node, raw, templates};
use crate::{
    diff, ElementCall, ElementHandle, EventHandler, MainThreadTree, MalformedReason,
    MemoryElementApi, PatchBatch, PatchOp, RecordingSink, RuntimeError, SnapshotId, SnapshotTree,
    TreeError, ROOT_ID,
};

fn setup() -> (MainThreadTree, MemoryElementApi, RecordingSink) {
    let mut api = MemoryElementApi::new();
    let main = MainThreadTree::new(templates(), &mut api);
    (main, api, RecordingSink::new())
}

fn element(main: &MainThreadTree, id: SnapshotId, index: usize) -> ElementHandle {
    main.tree().get(id).expect("instance").elements()[index]
}

fn mount(
    main: &mut MainThreadTree,
    api: &mut MemoryElementApi,
    sink: &RecordingSink,
    next: &SnapshotTree,
) {
    let ops = diff(&SnapshotTree::new(), next).unwrap();
    main.apply_ops(api, &ops, sink).unwrap();
    api.take_calls();
}

#[test]
fn page_is_bound_to_root() {
    let (main, api, _) = setup();
    assert_eq!(api.tag(main.page()), Some(PAGE_TAG));
    assert_eq!(main.tree().get(ROOT_ID).unwrap().elements(), &[main.page()]);
}

#[test]
fn create_materialises_template_and_text() {
    let (mut main, mut api, sink) = setup();
    let ops = vec![
        PatchOp::Create {
            id: 1,
            ty: Some("T".into()),
            values: vec![json!("hello")],
        },
        PatchOp::InsertBefore {
            id: 1,
            parent: ROOT_ID,
            before: None,
        },
        PatchOp::Create {
            id: 2,
            ty: None,
            values: vec![json!("raw")],
        },
        PatchOp::InsertBefore {
            id: 2,
            parent: 1,
            before: None,
        },
    ];

    let report = main.apply_ops(&mut api, &ops, &sink).unwrap();

    assert_eq!(report.applied, 4);
    assert_eq!(report.skipped_effects, 0);
    assert!(sink.is_empty());

    let view = element(&main, 1, 0);
    let label = element(&main, 1, 1);
    let text = element(&main, 2, 0);
    assert_eq!(api.children(main.page()), &[view]);
    assert_eq!(api.tag(view), Some("view"));
    assert_eq!(api.attribute(label, "text"), Some(&json!("hello")));
    assert_eq!(api.tag(text), Some("raw-text"));
    assert_eq!(api.attribute(text, "text"), Some(&json!("raw")));
    assert_eq!(api.children(view), &[label, text]);
}

#[test]
fn unknown_opcode_rejects_the_batch_untouched() {
    let (mut main, mut api, sink) = setup();
    let mut next = SnapshotTree::new();
    node(&mut next, ROOT_ID, 1, "T", vec![json!("a")]);
    node(&mut next, 1, 2, "T", vec![json!("hello")]);
    mount(&mut main, &mut api, &sink, &next);
    let before = main.tree().clone();

    let result = main.apply_stream(&mut api, &[json!(9), json!(2)], &sink);

    assert_eq!(
        result,
        Err(RuntimeError::MalformedPatch {
            reason: MalformedReason::UnknownOpcode {
                offset: 0,
                opcode: json!(9)
            }
        })
    );
    assert_eq!(sink.len(), 1);
    assert!(sink.errors()[0].is_fatal());
    assert!(api.calls().is_empty());
    assert!(main.tree().observably_eq(&before));
}

#[test]
fn invalid_last_op_rejects_everything_before_it() {
    let (mut main, mut api, sink) = setup();
    let mut next = SnapshotTree::new();
    node(&mut next, ROOT_ID, 1, "T", vec![json!("a")]);
    mount(&mut main, &mut api, &sink, &next);

    let ops = vec![
        PatchOp::UpdateValue {
            id: 1,
            index: 0,
            value: json!("changed"),
        },
        PatchOp::Remove { id: 99 },
    ];
    let result = main.apply_ops(&mut api, &ops, &sink);

    assert_eq!(
        result,
        Err(RuntimeError::MalformedPatch {
            reason: MalformedReason::Structure {
                op: 1,
                error: TreeError::Missing { id: 99 }
            }
        })
    );
    assert!(api.calls().is_empty());
    assert_eq!(main.tree().get(1).unwrap().value(0), Some(&json!("a")));
}

#[test]
fn structural_violations_are_fatal() {
    let (mut main, mut api, sink) = setup();
    let mut next = SnapshotTree::new();
    node(&mut next, ROOT_ID, 1, "T", vec![json!("a")]);
    mount(&mut main, &mut api, &sink, &next);

    let duplicate = main.apply_ops(
        &mut api,
        &[PatchOp::Create {
            id: 1,
            ty: Some("T".into()),
            values: vec![json!("again")],
        }],
        &sink,
    );
    assert_eq!(
        duplicate,
        Err(RuntimeError::MalformedPatch {
            reason: MalformedReason::Structure {
                op: 0,
                error: TreeError::Duplicate { id: 1 }
            }
        })
    );

    let unknown = main.apply_ops(
        &mut api,
        &[PatchOp::Create {
            id: 5,
            ty: Some("Nope".into()),
            values: vec![],
        }],
        &sink,
    );
    assert!(matches!(
        unknown,
        Err(RuntimeError::MalformedPatch {
            reason: MalformedReason::UnknownTemplate { id: 5, .. }
        })
    ));

    let root = main.apply_ops(&mut api, &[PatchOp::Remove { id: ROOT_ID }], &sink);
    assert!(matches!(
        root,
        Err(RuntimeError::MalformedPatch {
            reason: MalformedReason::Structure {
                error: TreeError::RootTarget,
                ..
            }
        })
    ));

    assert_eq!(sink.len(), 3);
    assert!(api.calls().is_empty());
}

#[test]
fn reapplying_value_updates_is_a_no_op() {
    let (mut main, mut api, sink) = setup();
    let mut next = SnapshotTree::new();
    node(&mut next, ROOT_ID, 1, "T", vec![json!("a")]);
    mount(&mut main, &mut api, &sink, &next);

    let batch = [PatchOp::UpdateValue {
        id: 1,
        index: 0,
        value: json!("b"),
    }];
    main.apply_ops(&mut api, &batch, &sink).unwrap();
    assert_eq!(api.take_calls().len(), 1);

    let report = main.apply_ops(&mut api, &batch, &sink).unwrap();
    assert_eq!(report.applied, 1);
    assert!(api.calls().is_empty());
    assert_eq!(main.tree().get(1).unwrap().value(0), Some(&json!("b")));
}

#[test]
fn missing_template_element_skips_only_that_effect() {
    let (mut main, mut api, sink) = setup();
    let ops = vec![
        PatchOp::Create {
            id: 3,
            ty: Some("Broken".into()),
            values: vec![json!("a.png")],
        },
        PatchOp::InsertBefore {
            id: 3,
            parent: ROOT_ID,
            before: None,
        },
    ];

    let report = main.apply_ops(&mut api, &ops, &sink).unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped_effects, 1);
    assert_eq!(
        sink.errors(),
        vec![RuntimeError::UnknownElementIndex {
            id: 3,
            element: 5,
            materialized: 1
        }]
    );
    assert_eq!(api.children(main.page()), &[element(&main, 3, 0)]);
}

#[test]
fn malformed_background_handler_is_skipped() {
    let (mut main, mut api, sink) = setup();
    let ops = vec![
        PatchOp::Create {
            id: 4,
            ty: Some("Button".into()),
            values: vec![json!("primary"), json!(7), json!(null)],
        },
        PatchOp::InsertBefore {
            id: 4,
            parent: ROOT_ID,
            before: None,
        },
    ];

    let report = main.apply_ops(&mut api, &ops, &sink).unwrap();

    assert_eq!(report.skipped_effects, 1);
    let button = element(&main, 4, 0);
    assert_eq!(api.attribute(button, "class"), Some(&json!("primary")));
    assert_eq!(api.event(button, "bindEvent", "tap"), None);
    assert_eq!(main.tree().get(4).unwrap().values()[1], json!(7));
}

#[test]
fn main_thread_handler_must_be_a_worklet() {
    let (mut main, mut api, sink) = setup();
    let ops = vec![
        PatchOp::Create {
            id: 4,
            ty: Some("Button".into()),
            values: vec![json!("primary"), json!("sign-1"), json!(42)],
        },
        PatchOp::InsertBefore {
            id: 4,
            parent: ROOT_ID,
            before: None,
        },
    ];

    let report = main.apply_ops(&mut api, &ops, &sink).unwrap();

    assert_eq!(report.skipped_effects, 1);
    assert_eq!(
        sink.take(),
        vec![RuntimeError::InvalidWorkletValue {
            attribute: "main-thread:bindtap".into(),
            tag: "view".into()
        }]
    );
    let button = element(&main, 4, 0);
    assert_eq!(api.attribute(button, "class"), Some(&json!("primary")));
    assert_eq!(
        api.event(button, "bindEvent", "tap"),
        Some(&EventHandler::Background("sign-1".into()))
    );

    let worklet = json!({"_wkltId": "w1", "_c": {}});
    main.apply_ops(
        &mut api,
        &[PatchOp::UpdateValue {
            id: 4,
            index: 2,
            value: worklet.clone(),
        }],
        &sink,
    )
    .unwrap();
    assert!(sink.is_empty());
    assert_eq!(
        api.calls().last(),
        Some(&ElementCall::SetEvent {
            element: button,
            event_type: "bindEvent".into(),
            name: "tap".into(),
            handler: Some(EventHandler::Worklet(worklet)),
        })
    );
}

#[test]
fn remove_detaches_and_releases_the_subtree() {
    let (mut main, mut api, sink) = setup();
    let mut next = SnapshotTree::new();
    node(&mut next, ROOT_ID, 1, "T", vec![json!("a")]);
    raw(&mut next, 1, 2, "x");
    mount(&mut main, &mut api, &sink, &next);
    let view = element(&main, 1, 0);

    main.apply_ops(&mut api, &[PatchOp::Remove { id: 1 }], &sink)
        .unwrap();

    assert!(main.tree().is_empty());
    assert!(api.children(main.page()).is_empty());
    assert_eq!(api.len(), 1);
    assert_eq!(
        api.calls().first(),
        Some(&ElementCall::RemoveChild {
            parent: main.page(),
            child: view
        })
    );
    let released = api
        .calls()
        .iter()
        .filter(|call| matches!(call, ElementCall::Release { .. }))
        .count();
    assert_eq!(released, 3);
}

#[test]
fn update_children_reorders_native_children() {
    let (mut main, mut api, sink) = setup();
    let mut next = SnapshotTree::new();
    node(&mut next, ROOT_ID, 10, "T", vec![json!("list")]);
    for id in 1..=3 {
        raw(&mut next, 10, id, &id.to_string());
    }
    mount(&mut main, &mut api, &sink, &next);
    let view = element(&main, 10, 0);
    let label = element(&main, 10, 1);

    main.apply_ops(
        &mut api,
        &[PatchOp::UpdateChildren {
            id: 10,
            children: vec![3, 1],
        }],
        &sink,
    )
    .unwrap();

    assert_eq!(
        api.children(view),
        &[label, element(&main, 3, 0), element(&main, 1, 0)]
    );
    assert_eq!(main.tree().get(2).unwrap().parent(), None);
    assert!(api.parent(element(&main, 2, 0)).is_none());
}

#[test]
fn diff_then_apply_mirrors_the_background_tree() {
    let (mut main, mut api, sink) = setup();
    let mut first = SnapshotTree::new();
    node(&mut first, ROOT_ID, 1, "T", vec![json!("a")]);
    raw(&mut first, 1, 2, "x");
    leaf(&mut first, ROOT_ID, 3, "Button", vec![json!("c"), json!(null), json!(null)]);
    node(&mut first, ROOT_ID, 4, "T", vec![json!("d")]);

    let ops = diff(&SnapshotTree::new(), &first).unwrap();
    main.apply_batch(&mut api, &PatchBatch::new(1, &ops), &sink)
        .unwrap();
    assert!(main.tree().observably_eq(&first));

    let mut second = first.clone();
    second.set_value(2, 0, json!("y")).unwrap();
    second.insert_before(ROOT_ID, 4, Some(1)).unwrap();
    second.insert_before(4, 3, None).unwrap();
    second.remove(1).unwrap();

    let ops = diff(&first, &second).unwrap();
    main.apply_batch(&mut api, &PatchBatch::new(2, &ops), &sink)
        .unwrap();

    assert!(sink.is_empty());
    assert_eq!(main.revision(), Some(2));
    assert!(main.tree().observably_eq(&second));
    let view = element(&main, 4, 0);
    assert_eq!(api.children(main.page()), &[view]);
    assert_eq!(
        api.children(view),
        &[element(&main, 4, 1), element(&main, 3, 0)]
    );
}

#[test]
fn reset_releases_everything_but_the_page() {
    let (mut main, mut api, sink) = setup();
    let mut next = SnapshotTree::new();
    node(&mut next, ROOT_ID, 1, "T", vec![json!("a")]);
    raw(&mut next, 1, 2, "x");
    mount(&mut main, &mut api, &sink, &next);

    main.reset(&mut api);

    assert!(main.tree().is_empty());
    assert_eq!(main.revision(), None);
    assert_eq!(api.len(), 1);
    assert_eq!(api.tag(main.page()), Some(PAGE_TAG));
}
