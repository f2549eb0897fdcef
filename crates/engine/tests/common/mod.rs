//! Shared fixture for engine integration tests

#![allow(dead_code)]

use std::sync::Arc;

use appstruct_core::{AppQName, AppStorage, Offset, QName, RecordId, WsId, QNAME_COMMAND_CUD};
use appstruct_engine::{
    AppConfig, AppConfigs, AppDef, AppDefBuilder, AppStructs, AppStructsProvider, CommandFunction,
    DataKind, Event, MemBucketsFactory, ObjectBuilder, RawEventParams, SequentialIdGenerator,
    SignedTokensFactory, StructsConfig, TypeDef, TypeKind,
};
use appstruct_storage::FixedStorageProvider;

pub fn q(entity: &str) -> QName {
    QName::new("test", entity)
}

pub fn app_name() -> AppQName {
    AppQName::new("test", "app")
}

pub fn app_def() -> AppDef {
    AppDefBuilder::new()
        .add(
            TypeDef::new(q("Doc"), TypeKind::CDoc)
                .field("name", DataKind::String, true)
                .container("lines", q("Line"), 0, 100),
        )
        .add(
            TypeDef::new(q("Line"), TypeKind::CRecord)
                .field("text", DataKind::String, false)
                .ref_field("doc", false, &[q("Doc")]),
        )
        .add(
            TypeDef::new(q("Settings"), TypeKind::CDoc)
                .field("theme", DataKind::String, false)
                .singleton(),
        )
        .add(
            TypeDef::new(q("Order"), TypeKind::ODoc)
                .field("number", DataKind::String, true)
                .container("items", q("Item"), 1, 10),
        )
        .add(
            TypeDef::new(q("Item"), TypeKind::ORecord)
                .field("qty", DataKind::Int32, true)
                .ref_field("product", false, &[q("Doc")]),
        )
        .add(
            TypeDef::new(q("Secret"), TypeKind::Object)
                .field("password", DataKind::String, true)
                .field("pin", DataKind::Bytes, false),
        )
        .add(TypeDef::new(q("Cmd"), TypeKind::Command))
        .build()
        .unwrap()
}

pub fn config(params: StructsConfig) -> AppConfig {
    let mut config = AppConfig::new(app_name(), 1, app_def()).with_params(params);
    config.add_resource(
        CommandFunction::new(q("Cmd"), |_| Ok(()))
            .with_params(q("Order"))
            .with_unlogged_params(q("Secret")),
    );
    config
}

pub fn provider_with(storage: Arc<dyn AppStorage>, params: StructsConfig) -> AppStructsProvider {
    let mut configs = AppConfigs::new();
    configs.add(config(params));
    AppStructsProvider::new(
        configs,
        Arc::new(FixedStorageProvider::new(storage)),
        Arc::new(MemBucketsFactory::new()),
        Arc::new(SignedTokensFactory::new("secret")),
    )
}

/// Prepares the test application over `storage`.
pub fn app_on(storage: Arc<dyn AppStorage>) -> Arc<AppStructs> {
    provider_with(storage, StructsConfig::default())
        .get(&app_name())
        .unwrap()
}

/// Same, without the PLog cache, so reads hit storage.
pub fn uncached_app_on(storage: Arc<dyn AppStorage>) -> Arc<AppStructs> {
    let params = StructsConfig {
        plog_cache_size: 0,
        ..StructsConfig::default()
    };
    provider_with(storage, params).get(&app_name()).unwrap()
}

pub fn params(name: QName, ws: WsId, offset: Offset) -> RawEventParams {
    RawEventParams {
        handling_partition: 1,
        plog_offset: offset,
        workspace: ws,
        wlog_offset: offset,
        qname: name,
        registered_at: 1_700_000_000_000,
        event_bytes: b"{\"request\":true}".to_vec(),
    }
}

pub fn cud_params(ws: WsId, offset: Offset) -> RawEventParams {
    params(QNAME_COMMAND_CUD, ws, offset)
}

/// Order 1 with items 2 and 3.
pub fn fill_order(b: &mut ObjectBuilder) {
    b.put_id(RecordId(1)).put("number", "A-1");
    b.child("items").put_id(RecordId(2)).put("qty", 1i32);
    b.child("items").put_id(RecordId(3)).put("qty", 2i32);
}

/// Builds, stores and applies a CUD event creating one Doc.
pub fn create_doc(
    app: &AppStructs,
    gen: &mut SequentialIdGenerator,
    ws: WsId,
    offset: Offset,
    name: &str,
) -> Arc<Event> {
    let mut b = app.events().new_raw_event_builder(cud_params(ws, offset));
    b.cud_builder()
        .create(q("Doc"))
        .put_id(RecordId(1))
        .put("name", name);
    let (raw, res) = b.build_raw_event();
    res.unwrap();
    let ev = app.events().put_plog(raw, None, gen).unwrap();
    app.records().apply(&ev).unwrap();
    ev
}
