use serde_json::json;

use crate::{
    decode_init_patch, encode_init_patch, HydrationPhase, WorkletConfig, WorkletError,
    WorkletRefDescriptor, WorkletRuntime,
};

#[test]
fn first_screen_refs_are_created_lazily_and_shared() {
    let mut runtime = WorkletRuntime::init(WorkletConfig::default());
    let descriptor = WorkletRefDescriptor::new(-1, json!("a"));

    let first = runtime.get_from_worklet_ref_map(&descriptor).unwrap();
    first.set_current(json!("b"));
    let second = runtime
        .get_from_worklet_ref_map(&WorkletRefDescriptor::new(-1, json!("ignored")))
        .unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(second.current(), json!("b"));
    assert!(second.was_written());
    assert_eq!(runtime.first_screen_len(), 1);
}

#[test]
fn background_refs_need_an_init_value() {
    let mut runtime = WorkletRuntime::init(WorkletConfig::default());
    let descriptor = WorkletRefDescriptor::new(4, json!(0));

    assert_eq!(
        runtime.get_from_worklet_ref_map(&descriptor).unwrap_err(),
        WorkletError::MissingRef { wvid: 4 }
    );

    runtime.update_worklet_ref_init_value_changes(&[(4, json!(10))]);
    let cell = runtime.get_from_worklet_ref_map(&descriptor).unwrap();
    assert_eq!(cell.current(), json!(10));
    assert!(!cell.was_written());
}

#[test]
fn init_values_never_overwrite_existing_refs() {
    let mut runtime = WorkletRuntime::init(WorkletConfig::default());
    assert_eq!(
        runtime.update_worklet_ref_init_value_changes(&[(1, json!("x")), (-2, json!("neg"))]),
        1
    );
    runtime.persistent(1).unwrap().set_current(json!("written"));

    assert_eq!(
        runtime.update_worklet_ref_init_value_changes(&[(1, json!("y")), (2, json!("z"))]),
        1
    );
    assert_eq!(runtime.persistent(1).unwrap().current(), json!("written"));
    assert_eq!(runtime.persistent_len(), 2);
}

#[test]
fn init_patch_wire_format() {
    let patch = json!([[1, "a"], [2, {"nested": [1, 2]}]]);
    let decoded = decode_init_patch(&patch).unwrap();
    assert_eq!(decoded, vec![(1, json!("a")), (2, json!({"nested": [1, 2]}))]);
    assert_eq!(encode_init_patch(&decoded), patch);

    for bad in [json!({}), json!([[1]]), json!([["1", 2]]), json!([3])] {
        assert!(matches!(
            decode_init_patch(&bad),
            Err(WorkletError::InvalidInitPatch { .. })
        ));
    }

    let mut runtime = WorkletRuntime::init(WorkletConfig::default());
    assert_eq!(runtime.apply_init_patch(&patch), Ok(2));
}

#[test]
fn clearing_requires_hydration_and_happens_once() {
    let mut runtime = WorkletRuntime::init(WorkletConfig::default());
    assert_eq!(
        runtime.clear_first_screen_worklet_ref_map(),
        Err(WorkletError::NotHydrated)
    );

    let ctx = json!({"_wkltId": "w", "_c": {}});
    runtime.hydrate_ctx(&ctx, &ctx).unwrap();
    assert_eq!(runtime.phase(), HydrationPhase::Hydrated);
    assert_eq!(runtime.clear_first_screen_worklet_ref_map(), Ok(()));
    assert_eq!(runtime.phase(), HydrationPhase::Cleared);
    assert_eq!(
        runtime.clear_first_screen_worklet_ref_map(),
        Err(WorkletError::AlreadyCleared)
    );
    assert_eq!(
        runtime.hydrate_ctx(&ctx, &ctx),
        Err(WorkletError::AlreadyCleared)
    );
}

#[test]
fn lookups_after_clear_get_fresh_unlinked_cells() {
    let mut runtime = WorkletRuntime::init(WorkletConfig::default());
    let descriptor = WorkletRefDescriptor::new(-1, json!("a"));
    let before = runtime.get_from_worklet_ref_map(&descriptor).unwrap();
    before.set_current(json!("b"));
    let ctx = json!({"_wkltId": "w"});
    runtime.hydrate_ctx(&ctx, &ctx).unwrap();
    runtime.clear_first_screen_worklet_ref_map().unwrap();

    let after = runtime.get_from_worklet_ref_map(&descriptor).unwrap();

    assert!(!after.ptr_eq(&before));
    assert_eq!(after.current(), json!("a"));
    assert!(after.ptr_eq(&runtime.get_from_worklet_ref_map(&descriptor).unwrap()));
}

#[test]
fn recovery_can_be_disabled() {
    let mut runtime = WorkletRuntime::init(WorkletConfig {
        recover_cleared_first_screen: false,
    });
    let ctx = json!({"_wkltId": "w"});
    runtime.hydrate_ctx(&ctx, &ctx).unwrap();
    runtime.clear_first_screen_worklet_ref_map().unwrap();

    assert_eq!(
        runtime
            .get_from_worklet_ref_map(&WorkletRefDescriptor::new(-3, json!(null)))
            .unwrap_err(),
        WorkletError::FirstScreenCleared { wvid: -3 }
    );
}

#[test]
fn descriptors_parse_from_closure_values() {
    assert_eq!(
        WorkletRefDescriptor::from_value(&json!({"_wvid": -2, "_initValue": [1]})),
        Some(WorkletRefDescriptor::new(-2, json!([1])))
    );
    assert_eq!(
        WorkletRefDescriptor::from_value(&json!({"_wvid": 3})),
        Some(WorkletRefDescriptor::new(3, json!(null)))
    );
    assert_eq!(WorkletRefDescriptor::from_value(&json!({"_wkltId": "w"})), None);

    let text = serde_json::to_value(WorkletRefDescriptor::new(5, json!("v"))).unwrap();
    assert_eq!(text, json!({"_wvid": 5, "_initValue": "v"}));
}

#[test]
fn teardown_leaves_held_cells_usable() {
    let mut runtime = WorkletRuntime::init(WorkletConfig::default());
    let cell = runtime
        .get_from_worklet_ref_map(&WorkletRefDescriptor::new(-1, json!(1)))
        .unwrap();
    runtime.teardown();
    cell.set_current(json!(2));
    assert_eq!(cell.current(), json!(2));
}
