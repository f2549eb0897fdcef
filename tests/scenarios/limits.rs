//! Function rate limits

use std::sync::Arc;
use std::time::Duration;

use crate::common::*;

fn limited(kind: RateLimitKind, max_tokens: u64) -> Arc<AppStructs> {
    let mut config = config();
    config.add_rate_limit(
        q("Place"),
        kind,
        RateLimit {
            period: Duration::from_secs(3600),
            max_tokens,
        },
    );
    provider_for(config, Arc::new(MemStorageProvider::new()))
        .get(&app_name())
        .unwrap()
}

#[test]
fn test_workspace_limit() {
    let app = limited(RateLimitKind::ByWorkspace, 3);
    for _ in 0..3 {
        assert!(!app.is_function_rate_limits_exceeded(&q("Place"), 1));
    }
    assert!(app.is_function_rate_limits_exceeded(&q("Place"), 1));
    // other workspaces keep their own budget
    assert!(!app.is_function_rate_limits_exceeded(&q("Place"), 2));
}

#[test]
fn test_app_limit_is_shared() {
    let app = limited(RateLimitKind::ByApp, 2);
    assert!(!app.is_function_rate_limits_exceeded(&q("Place"), 1));
    assert!(!app.is_function_rate_limits_exceeded(&q("Place"), 2));
    assert!(app.is_function_rate_limits_exceeded(&q("Place"), 3));
}

#[test]
fn test_unlimited_functions() {
    let app = limited(RateLimitKind::ById, 1);
    for _ in 0..10 {
        // per-ID limits are not checked here
        assert!(!app.is_function_rate_limits_exceeded(&q("Place"), 1));
        assert!(!app.is_function_rate_limits_exceeded(&q("Products"), 1));
    }
}
