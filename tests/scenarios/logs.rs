//! Partition and workspace logs across shard boundaries

use std::sync::Arc;

use proptest::prelude::*;

use crate::common::*;

/// Stores a CUD event at `offset` of partition 3 and workspace log of `ws`.
fn put_at(app: &AppStructs, ws: WsId, offset: Offset) {
    let mut b = app
        .events()
        .new_raw_event_builder(event_params(QNAME_COMMAND_CUD, ws, offset));
    b.cud_builder()
        .create(q("Product"))
        .put_id(RecordId(1))
        .put("title", format!("p{}", offset));
    let (raw, res) = b.build_raw_event();
    res.unwrap();
    let ev = app
        .events()
        .put_plog(raw, None, &mut SequentialIdGenerator::new())
        .unwrap();
    app.events().put_wlog(&ev).unwrap();
}

fn uncached() -> Arc<AppStructs> {
    let config = config().with_params(StructsConfig {
        plog_cache_size: 0,
        ..StructsConfig::default()
    });
    provider_for(config, Arc::new(MemStorageProvider::new()))
        .get(&app_name())
        .unwrap()
}

#[test]
fn test_reader_crosses_shards() {
    let app = uncached();
    for offset in 4090..4100 {
        put_at(&app, 1, offset);
    }

    let offsets: Vec<Offset> = app
        .events()
        .plog_reader(CancelToken::new(), 3, 4090, ReadCount::ToEnd)
        .map(|r| r.unwrap().0)
        .collect();
    assert_eq!(offsets, (4090..4100).collect::<Vec<_>>());

    let offsets: Vec<Offset> = app
        .events()
        .wlog_reader(CancelToken::new(), 1, 4094, ReadCount::Exactly(3))
        .map(|r| r.unwrap().0)
        .collect();
    assert_eq!(offsets, vec![4094, 4095, 4096]);
}

#[test]
fn test_wlog_keeps_workspaces_apart() {
    let app = uncached();
    put_at(&app, 1, 1);
    put_at(&app, 2, 2);
    put_at(&app, 1, 3);

    let mut seen = Vec::new();
    app.events()
        .read_wlog(&CancelToken::new(), 1, 1, ReadCount::ToEnd, |ofs, ev| {
            assert_eq!(ev.workspace(), 1);
            seen.push(ofs);
            Ok(())
        })
        .unwrap();
    assert_eq!(seen, vec![1, 3]);
}

#[test]
fn test_cancelled_reader_yields_nothing() {
    let app = uncached();
    put_at(&app, 1, 1);
    let cancel = CancelToken::new();
    cancel.cancel();
    assert_eq!(
        app.events()
            .plog_reader(cancel, 3, 1, ReadCount::ToEnd)
            .count(),
        0
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_plog_reads_ascending(offsets in prop::collection::btree_set(1u64..4000, 1..20)) {
        let app = uncached();
        for &offset in &offsets {
            put_at(&app, 1, offset);
        }
        let first = *offsets.iter().next().unwrap();
        let last = *offsets.iter().last().unwrap();

        let mut seen = Vec::new();
        app.events()
            .read_plog(
                &CancelToken::new(),
                3,
                first,
                ReadCount::Exactly(last - first + 1),
                |ofs, _| {
                    seen.push(ofs);
                    Ok(())
                },
            )
            .unwrap();
        prop_assert_eq!(seen, offsets.into_iter().collect::<Vec<_>>());
    }
}
