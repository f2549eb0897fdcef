//! Verified field values carried by signed tokens

use crate::common::*;

fn supplier_token(app: &AppStructs, field: &str, value: &str) -> String {
    app.app_tokens()
        .issue_verified_value(&VerifiedValuePayload::new(
            VerificationKind::Email,
            q("Product"),
            field,
            value,
        ))
        .unwrap()
}

fn create_product(app: &AppStructs, supplier: &str) -> RawEventBuilder {
    let mut b = app
        .events()
        .new_raw_event_builder(event_params(QNAME_COMMAND_CUD, 1, 1));
    b.cud_builder()
        .create(q("Product"))
        .put_id(RecordId(1))
        .put("title", "Desk")
        .put("supplier", supplier);
    b
}

fn expect_invalid_verified(res: Result<()>) {
    match res {
        Err(Error::Validation(errs)) => {
            assert!(errs.contains(ValidationCode::InvalidVerifiedValue), "{:?}", errs)
        }
        other => panic!("validation error expected, got {:?}", other),
    }
}

#[test]
fn test_token_stores_verified_value() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();
    let token = supplier_token(&app, "supplier", "s@acme.io");

    let b = create_product(&app, &token);
    let (raw, res) = b.build_raw_event();
    res.unwrap();
    let ev = app
        .events()
        .put_plog(raw, None, &mut SequentialIdGenerator::new())
        .unwrap();
    app.records().apply(&ev).unwrap();

    let rec = app.records().get(1, FIRST_STORAGE_ID).unwrap();
    assert_eq!(rec.as_string("supplier"), Some("s@acme.io"));
}

#[test]
fn test_plain_value_is_rejected() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();
    let b = create_product(&app, "s@acme.io");
    expect_invalid_verified(b.build_raw_event().1);
}

#[test]
fn test_token_for_other_field_is_rejected() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();
    let token = supplier_token(&app, "title", "s@acme.io");
    let b = create_product(&app, &token);
    expect_invalid_verified(b.build_raw_event().1);
}

#[test]
fn test_token_of_other_app_is_rejected() {
    let provider = provider();
    let app = provider.get(&app_name()).unwrap();
    let foreign = SignedTokens::new(
        AppQName::new("acme", "other"),
        "another-secret",
        std::time::Duration::from_secs(60),
    )
    .issue_verified_value(&VerifiedValuePayload::new(
        VerificationKind::Email,
        q("Product"),
        "supplier",
        "s@acme.io",
    ))
    .unwrap();
    let b = create_product(&app, &foreign);
    expect_invalid_verified(b.build_raw_event().1);
}
