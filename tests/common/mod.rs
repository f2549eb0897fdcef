//! Shared utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::sync::Arc;

pub use appstruct::*;

pub fn q(entity: &str) -> QName {
    QName::new("shop", entity)
}

pub fn app_name() -> AppQName {
    AppQName::new("acme", "shop")
}

/// Catalog application: products with verified supplier e-mail, a
/// singleton profile, orders placed by the `Place` command, a `Products`
/// query and a `SoldByDay` view of ordered quantities.
pub fn app_def() -> AppDef {
    AppDefBuilder::new()
        .add(
            TypeDef::new(q("Product"), TypeKind::CDoc)
                .field("title", DataKind::String, true)
                .field("price", DataKind::Int64, false)
                .verified_field("supplier", DataKind::String, false, &[VerificationKind::Email])
                .unique("title", &["title"]),
        )
        .add(
            TypeDef::new(q("Profile"), TypeKind::WDoc)
                .field("owner", DataKind::String, false)
                .singleton(),
        )
        .add(
            TypeDef::new(q("Order"), TypeKind::ODoc)
                .field("customer", DataKind::String, true)
                .container("lines", q("OrderLine"), 1, 50),
        )
        .add(
            TypeDef::new(q("OrderLine"), TypeKind::ORecord)
                .ref_field("product", true, &[q("Product")])
                .field("qty", DataKind::Int32, true),
        )
        .add(
            TypeDef::view(q("SoldByDay"))
                .partition_field("product", DataKind::RecordId)
                .clustering_field("day", DataKind::Int32)
                .field("qty", DataKind::Int64, true),
        )
        .add(TypeDef::new(q("Place"), TypeKind::Command))
        .add(TypeDef::new(q("Products"), TypeKind::Query))
        .build()
        .unwrap()
}

pub fn config() -> AppConfig {
    let mut config = AppConfig::new(app_name(), 7, app_def()).with_num_app_workspaces(10);
    config
        .add_resource(CommandFunction::new(q("Place"), |_| Ok(())).with_params(q("Order")))
        .add_resource(QueryFunction::new(q("Products"), |_, _| Ok(())).with_result(q("Product")));
    config
}

pub fn provider_for(config: AppConfig, storage: Arc<dyn AppStorageProvider>) -> AppStructsProvider {
    let mut configs = AppConfigs::new();
    configs.add(config);
    AppStructsProvider::new(
        configs,
        storage,
        Arc::new(MemBucketsFactory::new()),
        Arc::new(SignedTokensFactory::new("integration-secret")),
    )
}

pub fn provider() -> AppStructsProvider {
    provider_for(config(), Arc::new(MemStorageProvider::new()))
}

pub fn event_params(name: QName, ws: WsId, offset: Offset) -> RawEventParams {
    RawEventParams {
        handling_partition: 3,
        plog_offset: offset,
        workspace: ws,
        wlog_offset: offset,
        qname: name,
        registered_at: 1_700_000_000_000 + offset as i64,
        event_bytes: format!("{{\"offset\":{}}}", offset).into_bytes(),
    }
}

/// Stores a CUD event creating one product and applies it.
pub fn add_product(
    app: &AppStructs,
    gen: &mut SequentialIdGenerator,
    ws: WsId,
    offset: Offset,
    title: &str,
) -> Arc<Event> {
    let mut b = app
        .events()
        .new_raw_event_builder(event_params(QNAME_COMMAND_CUD, ws, offset));
    b.cud_builder()
        .create(q("Product"))
        .put_id(RecordId(1))
        .put("title", title)
        .put("price", 100i64);
    let (raw, res) = b.build_raw_event();
    res.unwrap();
    let ev = app.events().put_plog(raw, None, gen).unwrap();
    app.records().apply(&ev).unwrap();
    ev
}
