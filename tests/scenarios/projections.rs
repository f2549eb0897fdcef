//! View records projected from stored events

use std::sync::Arc;

use crate::common::*;

const DAY_MILLIS: i64 = 86_400_000;

fn place_order(app: &AppStructs, offset: Offset, day: i64, lines: &[(RecordId, i32)]) -> Arc<Event> {
    let mut params = event_params(q("Place"), 1, offset);
    params.registered_at = day * DAY_MILLIS + 1;
    let mut b = app.events().new_raw_event_builder(params);
    let order = b.argument_object_builder();
    order.put_id(RecordId(1)).put("customer", "Ann");
    for (i, (product, qty)) in lines.iter().enumerate() {
        order
            .child("lines")
            .put_id(RecordId(2 + i as u64))
            .put("product", *product)
            .put("qty", *qty);
    }
    let (raw, res) = b.build_raw_event();
    res.unwrap();
    app.events()
        .put_plog(raw, None, &mut SequentialIdGenerator::starting_at(RecordId(1 << 20)).unwrap())
        .unwrap()
}

/// Adds ordered quantities of `ev` to the `SoldByDay` view.
fn project(app: &AppStructs, ev: &Event) -> Result<()> {
    let views = app.views();
    let day = (ev.registered_at() / DAY_MILLIS) as i32;
    let mut batch = Vec::new();
    for line in ev.argument_object().children() {
        let mut key = views.key_builder(&q("SoldByDay"));
        key.put("product", line.as_record_id("product")).put("day", day);
        let value = match views.get(ev.workspace(), &key)? {
            Some(existing) => {
                let sold = existing.as_int64("qty").unwrap_or(0);
                let mut b = views.update_value_builder(&existing);
                b.put("qty", sold + i64::from(line.as_int32("qty").unwrap_or(0)));
                b
            }
            None => {
                let mut b = views.value_builder(&q("SoldByDay"));
                b.put("qty", i64::from(line.as_int32("qty").unwrap_or(0)));
                b
            }
        };
        batch.push((key, value));
    }
    views.put_batch(ev.workspace(), &batch)
}

fn sold(app: &AppStructs, product: RecordId, from_day: Option<i32>) -> Vec<(i32, i64)> {
    let mut key = app.views().key_builder(&q("SoldByDay"));
    key.put("product", product);
    if let Some(day) = from_day {
        key.put("day", day);
    }
    let mut result = Vec::new();
    app.views()
        .read(&CancelToken::new(), 1, &key, |k, v| {
            result.push((k.as_int32("day").unwrap(), v.as_int64("qty").unwrap()));
            Ok(())
        })
        .unwrap();
    result
}

#[test]
fn test_orders_projected_by_day() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();
    let mut gen = SequentialIdGenerator::new();
    add_product(&app, &mut gen, 1, 1, "Lamp");
    add_product(&app, &mut gen, 1, 2, "Desk");
    let lamp = FIRST_STORAGE_ID;
    let desk = RecordId(FIRST_STORAGE_ID.as_u64() + 1);

    let orders = [
        place_order(&app, 3, 19_000, &[(lamp, 2), (desk, 1)]),
        place_order(&app, 4, 19_002, &[(lamp, 5)]),
        place_order(&app, 5, 19_000, &[(lamp, 1)]),
    ];
    for ev in &orders {
        project(&app, ev).unwrap();
    }

    assert_eq!(sold(&app, lamp, None), vec![(19_000, 3), (19_002, 5)]);
    assert_eq!(sold(&app, lamp, Some(19_002)), vec![(19_002, 5)]);
    assert_eq!(sold(&app, desk, None), vec![(19_000, 1)]);
    assert!(sold(&app, RecordId(FIRST_STORAGE_ID.as_u64() + 99), None).is_empty());
}

#[test]
fn test_projection_survives_restart() {
    let storage = Arc::new(MemStorageProvider::new());
    let lamp = FIRST_STORAGE_ID;
    {
        let provider = provider_for(config(), storage.clone());
        let app = provider.get(&app_name()).unwrap();
        add_product(&app, &mut SequentialIdGenerator::new(), 1, 1, "Lamp");
        project(&app, &place_order(&app, 2, 7, &[(lamp, 4)])).unwrap();
    }

    let provider = provider_for(config(), storage);
    let app = provider.get(&app_name()).unwrap();
    let mut key = app.views().key_builder(&q("SoldByDay"));
    key.put("product", lamp).put("day", 7);
    let value = app.views().get(1, &key).unwrap().unwrap();
    assert_eq!(value.as_int64("qty"), Some(4));
}

#[test]
fn test_view_key_must_be_complete() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();
    let mut key = app.views().key_builder(&q("SoldByDay"));
    key.put("day", 1);
    let err = app.views().get(1, &key).unwrap_err();
    assert_eq!(err.validation_codes(), vec![ValidationCode::EmptyData]);
}
