use serde_json::json;

use crate::codec::decode;
use crate::test_support::node;
use crate::{PatchOp, RenderEvent, SessionError, SnapshotSession, SnapshotTree, ROOT_ID};

fn created(id: i64, ty: &str, value: &str) -> RenderEvent {
    RenderEvent::Created {
        id,
        ty: Some(ty.into()),
        values: vec![json!(value)],
        container: true,
        extra_props: None,
    }
}

#[test]
fn commit_advances_revision_and_skips_empty_diffs() {
    let mut session = SnapshotSession::new();
    let a = session.allocate_id();
    let b = session.allocate_id();
    session
        .handle_all([
            created(a, "T", "title"),
            created(b, "T", "hello"),
            RenderEvent::Updated {
                id: a,
                values: None,
                children: Some(vec![b]),
            },
            RenderEvent::Updated {
                id: ROOT_ID,
                values: None,
                children: Some(vec![a]),
            },
        ])
        .unwrap();

    let first = session.commit().unwrap().expect("first batch");
    assert_eq!(first.revision, 1);
    assert_eq!(decode(&first.ops).unwrap().len(), 4);

    assert_eq!(session.commit().unwrap(), None);
    assert_eq!(session.revision(), 1);

    session
        .handle(RenderEvent::Updated {
            id: b,
            values: Some(vec![json!("world")]),
            children: None,
        })
        .unwrap();
    let second = session.commit().unwrap().expect("second batch");
    assert_eq!(second.revision, 2);
    assert_eq!(
        decode(&second.ops).unwrap(),
        vec![PatchOp::UpdateValue {
            id: b,
            index: 0,
            value: json!("world")
        }]
    );
}

#[test]
fn ids_must_come_from_the_allocator_and_are_never_reused() {
    let mut session = SnapshotSession::new();
    assert_eq!(
        session.handle(created(7, "T", "x")),
        Err(SessionError::UnallocatedId { id: 7 })
    );

    let id = session.allocate_id();
    session.handle(created(id, "T", "x")).unwrap();
    session.handle(RenderEvent::Removed { id }).unwrap();
    assert_eq!(
        session.handle(created(id, "T", "y")),
        Err(SessionError::IdReused { id })
    );
}

#[test]
fn arity_change_is_rejected_and_the_session_keeps_committing() {
    let mut session = SnapshotSession::new();
    let a = session.allocate_id();
    session
        .handle_all([
            created(a, "T", "one"),
            RenderEvent::Updated {
                id: ROOT_ID,
                values: None,
                children: Some(vec![a]),
            },
        ])
        .unwrap();
    session.commit().unwrap().expect("first batch");

    assert_eq!(
        session.handle(RenderEvent::Updated {
            id: a,
            values: Some(vec![json!(1), json!(2)]),
            children: Some(vec![]),
        }),
        Err(SessionError::ArityChanged {
            id: a,
            previous: 1,
            next: 2
        })
    );
    assert_eq!(session.working().get(a).unwrap().values(), &[json!("one")]);
    assert_eq!(session.commit().unwrap(), None);

    session
        .handle(RenderEvent::Updated {
            id: a,
            values: Some(vec![json!("two")]),
            children: None,
        })
        .unwrap();
    let next = session.commit().unwrap().expect("second batch");
    assert_eq!(
        decode(&next.ops).unwrap(),
        vec![PatchOp::UpdateValue {
            id: a,
            index: 0,
            value: json!("two")
        }]
    );
}

#[test]
fn first_screen_adoption_only_ships_the_delta() {
    let mut first_screen = SnapshotTree::new();
    node(&mut first_screen, ROOT_ID, 1, "T", vec![json!("title")]);
    node(&mut first_screen, 1, 2, "T", vec![json!("hello")]);

    let mut session = SnapshotSession::new();
    session.adopt_first_screen(first_screen);
    assert_eq!(session.allocate_id(), 3);

    session
        .handle(RenderEvent::Updated {
            id: 2,
            values: Some(vec![json!("world")]),
            children: None,
        })
        .unwrap();
    let batch = session.commit().unwrap().expect("delta");
    assert_eq!(
        decode(&batch.ops).unwrap(),
        vec![PatchOp::UpdateValue {
            id: 2,
            index: 0,
            value: json!("world")
        }]
    );
}

#[test]
fn full_resend_rebuilds_from_empty() {
    let mut session = SnapshotSession::new();
    let id = session.allocate_id();
    session
        .handle_all([
            created(id, "T", "a"),
            RenderEvent::Updated {
                id: ROOT_ID,
                values: None,
                children: Some(vec![id]),
            },
        ])
        .unwrap();
    session.commit().unwrap();

    let resend = session.resend_full().unwrap();

    assert_eq!(resend.revision, 2);
    let ops = decode(&resend.ops).unwrap();
    assert!(matches!(ops[0], PatchOp::Create { id: first, .. } if first == id));
    assert_eq!(session.commit().unwrap(), None);
}

#[test]
fn render_events_round_trip_through_json() {
    let event = RenderEvent::Created {
        id: 4,
        ty: Some("Item".into()),
        values: vec![json!(1)],
        container: false,
        extra_props: Some(json!({"item-key": "a"})),
    };
    let text = serde_json::to_value(&event).unwrap();
    assert_eq!(text["kind"], json!("created"));
    assert_eq!(text["type"], json!("Item"));
    let back: RenderEvent = serde_json::from_value(text).unwrap();
    assert_eq!(back, event);
}
