//! Shared application fixture for unit tests

use std::sync::Arc;
use std::time::Duration;

use appstruct_core::{AppQName, AppStorage, QName, RecordId};
use appstruct_storage::MemStorage;

use crate::app::{AppConfig, AppStructs};
use crate::appdef::{AppDef, AppDefBuilder, DataKind, TypeDef, TypeKind};
use crate::config::StructsConfig;
use crate::element::ObjectBuilder;
use crate::rates::MemBuckets;
use crate::resources::{CommandFunction, QueryFunction};
use crate::tokens::{AppTokens, SignedTokens};

pub(crate) fn q(entity: &str) -> QName {
    QName::new("test", entity)
}

pub(crate) fn app_name() -> AppQName {
    AppQName::new("test", "app")
}

/// CDoc with a required `name` and up to 100 `lines`
pub(crate) fn doc() -> QName {
    q("Doc")
}

/// CRecord with optional `text` and a `doc` reference
pub(crate) fn line() -> QName {
    q("Line")
}

/// Singleton CDoc
pub(crate) fn settings() -> QName {
    q("Settings")
}

/// ODoc with a required `number` and 1 to 10 `items`
pub(crate) fn order() -> QName {
    q("Order")
}

/// ORecord with a required `qty` and a `product` reference to a Doc
pub(crate) fn item() -> QName {
    q("Item")
}

/// Object with a required `password`
pub(crate) fn secret() -> QName {
    q("Secret")
}

/// Command taking an Order and an unlogged Secret
pub(crate) fn cmd() -> QName {
    q("Cmd")
}

pub(crate) fn query() -> QName {
    q("Query")
}

/// View keyed by `year`, then `month` and `city`; value `total` and a
/// `doc` reference
pub(crate) fn sales() -> QName {
    q("Sales")
}

/// View keyed by `product`, then `day`; value `qty`
pub(crate) fn stock() -> QName {
    q("Stock")
}

pub(crate) fn app_def() -> AppDef {
    AppDefBuilder::new()
        .add(
            TypeDef::new(doc(), TypeKind::CDoc)
                .field("name", DataKind::String, true)
                .container("lines", line(), 0, 100),
        )
        .add(
            TypeDef::new(line(), TypeKind::CRecord)
                .field("text", DataKind::String, false)
                .ref_field("doc", false, &[doc()]),
        )
        .add(
            TypeDef::new(settings(), TypeKind::CDoc)
                .field("theme", DataKind::String, false)
                .singleton(),
        )
        .add(
            TypeDef::new(order(), TypeKind::ODoc)
                .field("number", DataKind::String, true)
                .container("items", item(), 1, 10),
        )
        .add(
            TypeDef::new(item(), TypeKind::ORecord)
                .field("qty", DataKind::Int32, true)
                .ref_field("product", false, &[doc()]),
        )
        .add(TypeDef::new(secret(), TypeKind::Object).field("password", DataKind::String, true))
        .add(TypeDef::new(cmd(), TypeKind::Command))
        .add(TypeDef::new(query(), TypeKind::Query))
        .add(
            TypeDef::view(sales())
                .partition_field("year", DataKind::Int32)
                .clustering_field("month", DataKind::Int32)
                .clustering_field("city", DataKind::String)
                .field("total", DataKind::Float64, true)
                .ref_field("doc", false, &[doc()]),
        )
        .add(
            TypeDef::view(stock())
                .partition_field("product", DataKind::RecordId)
                .clustering_field("day", DataKind::Int64)
                .field("qty", DataKind::Int32, true),
        )
        .build()
        .expect("test application definition")
}

pub(crate) fn config() -> AppConfig {
    let mut config = AppConfig::new(app_name(), 1, app_def());
    config
        .add_resource(
            CommandFunction::new(cmd(), |_| Ok(()))
                .with_params(order())
                .with_unlogged_params(secret()),
        )
        .add_resource(QueryFunction::new(query(), |_, _| Ok(())).with_result(doc()));
    config
}

pub(crate) fn tokens() -> Arc<dyn AppTokens> {
    Arc::new(SignedTokens::new(app_name(), "secret", Duration::from_secs(600)))
}

pub(crate) fn app() -> AppStructs {
    app_on(Arc::new(MemStorage::new()))
}

pub(crate) fn app_on(storage: Arc<dyn AppStorage>) -> AppStructs {
    app_with(storage, StructsConfig::default())
}

pub(crate) fn app_with(storage: Arc<dyn AppStorage>, params: StructsConfig) -> AppStructs {
    AppStructs::prepare(
        Arc::new(config().with_params(params)),
        storage,
        Arc::new(MemBuckets::new()),
        tokens(),
    )
    .expect("test application prepares")
}

/// Order 1 numbered `A-1` with items 2 and 3.
pub(crate) fn fill_order(b: &mut ObjectBuilder) {
    b.put_id(RecordId(1)).put("number", "A-1");
    b.child("items").put_id(RecordId(2)).put("qty", 1i32);
    b.child("items").put_id(RecordId(3)).put("qty", 2i32);
}
