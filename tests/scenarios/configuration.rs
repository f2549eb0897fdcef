//! Engine configuration files

use appstruct::config::CONFIG_FILE_NAME;
use tempfile::TempDir;

use crate::common::*;

#[test]
fn test_default_file_written_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    StructsConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(StructsConfig::from_file(&path).unwrap(), StructsConfig::default());

    // an existing file is left alone
    std::fs::write(&path, "plog_cache_size = 5\n").unwrap();
    StructsConfig::write_default_if_missing(&path).unwrap();
    let config = StructsConfig::from_file(&path).unwrap();
    assert_eq!(config.plog_cache_size, 5);
    assert_eq!(
        config.verified_token_ttl_secs,
        StructsConfig::default().verified_token_ttl_secs
    );
}

#[test]
fn test_written_config_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let config = StructsConfig {
        plog_cache_size: 0,
        verified_token_ttl_secs: 30,
    };
    config.write_to_file(&path).unwrap();
    assert_eq!(StructsConfig::from_file(&path).unwrap(), config);
}

#[test]
fn test_invalid_files_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    std::fs::write(&path, "plog_cache_size = \"many\"\n").unwrap();
    assert!(matches!(
        StructsConfig::from_file(&path),
        Err(Error::InvalidArgument(msg)) if msg.contains(CONFIG_FILE_NAME)
    ));

    std::fs::write(&path, "verified_token_ttl_secs = 0\n").unwrap();
    assert!(matches!(
        StructsConfig::from_file(&path),
        Err(Error::InvalidArgument(_))
    ));

    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        StructsConfig::from_file(&missing),
        Err(Error::Storage { .. })
    ));
}

#[test]
fn test_configured_app_uses_params() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "verified_token_ttl_secs = 1\n").unwrap();
    let params = StructsConfig::from_file(&path).unwrap();

    let provider = provider_for(
        config().with_params(params.clone()),
        std::sync::Arc::new(MemStorageProvider::new()),
    );
    let app = provider.get(&app_name()).unwrap();
    assert_eq!(app.num_app_workspaces(), 10);
    assert_eq!(app.cluster_app_id(), 7);

    let payload =
        VerifiedValuePayload::new(VerificationKind::Email, q("Product"), "supplier", "s@acme.io");
    let token = app.app_tokens().issue_verified_value(&payload).unwrap();
    assert_eq!(app.app_tokens().validate_verified_value(&token).unwrap(), payload);
}
