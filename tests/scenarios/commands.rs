//! Commands, CUDs and synced events

use crate::common::*;

#[test]
fn test_place_order_gets_storage_ids() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();
    let mut gen = SequentialIdGenerator::new();
    add_product(&app, &mut gen, 1, 1, "Lamp");
    let lamp = FIRST_STORAGE_ID;

    let mut b = app
        .events()
        .new_raw_event_builder(event_params(q("Place"), 1, 2));
    let order = b.argument_object_builder();
    order.put_id(RecordId(1)).put("customer", "Ann");
    order
        .child("lines")
        .put_id(RecordId(2))
        .put("product", lamp)
        .put("qty", 3i32);
    let (raw, res) = b.build_raw_event();
    res.unwrap();

    let mut order_ids = SequentialIdGenerator::starting_at(RecordId(1 << 20)).unwrap();
    let ev = app.events().put_plog(raw, None, &mut order_ids).unwrap();

    let arg = ev.argument_object();
    assert_eq!(arg.id(), RecordId(1 << 20));
    let line = &arg.children()[0];
    assert_eq!(line.id(), RecordId((1 << 20) + 1));
    assert_eq!(line.parent(), arg.id());
    assert_eq!(line.container(), "lines");
    // storage IDs are kept as is
    assert_eq!(line.as_record_id("product"), lamp);
    assert_eq!(order_ids.peek(), RecordId((1 << 20) + 2));
}

#[test]
fn test_order_line_must_reference_product() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();

    let mut b = app
        .events()
        .new_raw_event_builder(event_params(q("Place"), 1, 1));
    let order = b.argument_object_builder();
    order.put_id(RecordId(1)).put("customer", "Ann");
    // refers to the order itself
    order
        .child("lines")
        .put_id(RecordId(2))
        .put("product", RecordId(1))
        .put("qty", 1i32);
    let (_, res) = b.build_raw_event();
    match res {
        Err(Error::Validation(errs)) => {
            assert!(errs.contains(ValidationCode::InvalidRefRecordId), "{:?}", errs)
        }
        other => panic!("validation error expected, got {:?}", other),
    }
}

#[test]
fn test_synced_event_keeps_device_ids() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();

    let mut b = app.events().sync_raw_event_builder(SyncRawEventParams {
        generic: event_params(QNAME_COMMAND_CUD, 2, 1),
        device_id: 9,
        synced_at: 1_700_000_100_000,
    });
    b.cud_builder()
        .create(q("Product"))
        .put_id(RecordId(1 << 30))
        .put("title", "Chair");
    let (raw, res) = b.build_raw_event();
    res.unwrap();
    let ev = app
        .events()
        .put_plog(raw, None, &mut SequentialIdGenerator::new())
        .unwrap();
    app.records().apply(&ev).unwrap();

    let mut got = None;
    app.events()
        .read_plog(&CancelToken::new(), 3, 1, ReadCount::Exactly(1), |_, ev| {
            got = Some(ev);
            Ok(())
        })
        .unwrap();
    let got = got.unwrap();
    assert!(got.synced());
    let sync = got.sync_info().unwrap();
    assert_eq!(sync.device_id, 9);
    assert_eq!(sync.synced_at, 1_700_000_100_000);

    let rec = app.records().get(2, RecordId(1 << 30)).unwrap();
    assert_eq!(rec.as_string("title"), Some("Chair"));
}

#[test]
fn test_profile_singleton_per_workspace() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();
    let profile_id = app.singleton_id(&q("Profile")).unwrap();

    for ws in [1, 2] {
        let mut b = app
            .events()
            .new_raw_event_builder(event_params(QNAME_COMMAND_CUD, ws, ws));
        b.cud_builder()
            .create(q("Profile"))
            .put_id(RecordId(5))
            .put("owner", format!("owner-{}", ws));
        let (raw, res) = b.build_raw_event();
        res.unwrap();
        let ev = app
            .events()
            .put_plog(raw, None, &mut SequentialIdGenerator::new())
            .unwrap();
        assert_eq!(ev.cuds().creates()[0].id(), profile_id);
        app.records().apply(&ev).unwrap();
    }

    for ws in [1, 2] {
        let p = app.records().get_singleton(ws, &q("Profile")).unwrap();
        assert_eq!(p.as_string("owner"), Some(format!("owner-{}", ws).as_str()));
    }
}

#[test]
fn test_deactivate_record() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();
    let mut gen = SequentialIdGenerator::new();
    add_product(&app, &mut gen, 1, 1, "Old");

    let stored = app.records().get(1, FIRST_STORAGE_ID).unwrap();
    let mut b = app
        .events()
        .new_raw_event_builder(event_params(QNAME_COMMAND_CUD, 1, 2));
    b.cud_builder().update(&stored).put_is_active(false);
    let (raw, res) = b.build_raw_event();
    res.unwrap();
    let ev = app.events().put_plog(raw, None, &mut gen).unwrap();
    app.records().apply(&ev).unwrap();

    let rec = app.records().get(1, FIRST_STORAGE_ID).unwrap();
    assert!(!rec.is_active());
    assert_eq!(rec.as_string("title"), Some("Old"));
}
