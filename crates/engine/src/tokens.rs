//! Verified value tokens
//!
//! A verified field accepts only a token attesting that its value was
//! confirmed out of band (e-mail, phone). This module holds the token
//! collaborator seam and a signing implementation:
//!
//! - Token = `base64url(payload json)` `.` `base64url(hmac-sha256(secret, payload json))`
//! - The payload carries the application name and an expiry timestamp

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use appstruct_core::{AppQName, Error, QName, Result, UnixMilli};

use crate::appdef::VerificationKind;

type HmacSha256 = Hmac<Sha256>;

/// What a verified value token attests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedValuePayload {
    /// How the value was verified
    pub verification_kind: VerificationKind,
    /// Type owning the field
    pub entity: QName,
    /// Field name
    pub field: String,
    /// Verified value
    pub value: serde_json::Value,
}

impl VerifiedValuePayload {
    /// Payload for the given field and value.
    pub fn new(
        verification_kind: VerificationKind,
        entity: QName,
        field: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            verification_kind,
            entity,
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Token collaborator
pub trait AppTokens: Send + Sync {
    /// Issues a token for the payload.
    fn issue_verified_value(&self, payload: &VerifiedValuePayload) -> Result<String>;

    /// Checks a token and returns the payload it attests.
    fn validate_verified_value(&self, token: &str) -> Result<VerifiedValuePayload>;
}

/// Creates token collaborators per application
pub trait AppTokensFactory: Send + Sync {
    /// Token collaborator of the application.
    fn app_tokens(&self, app: &AppQName, ttl: Duration) -> Arc<dyn AppTokens>;
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    app: String,
    expires_at: UnixMilli,
    #[serde(flatten)]
    payload: VerifiedValuePayload,
}

fn now_millis() -> UnixMilli {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as UnixMilli)
        .unwrap_or(0)
}

/// Tokens signed with HMAC-SHA256 over a shared secret
pub struct SignedTokens {
    app: AppQName,
    secret: Vec<u8>,
    ttl: Duration,
}

impl SignedTokens {
    /// Tokens of `app` signed with `secret`, valid for `ttl`.
    pub fn new(app: AppQName, secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            app,
            secret: secret.into(),
            ttl,
        }
    }

    fn mac(&self, body: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| Error::invalid_argument("can not initialize token signer"))?;
        mac.update(body);
        Ok(mac)
    }
}

impl AppTokens for SignedTokens {
    fn issue_verified_value(&self, payload: &VerifiedValuePayload) -> Result<String> {
        let envelope = Envelope {
            app: self.app.to_string(),
            expires_at: now_millis().saturating_add(self.ttl.as_millis() as UnixMilli),
            payload: payload.clone(),
        };
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| Error::invalid_argument(format!("can not encode token payload: {}", e)))?;
        let sig = self.mac(&body)?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&body),
            URL_SAFE_NO_PAD.encode(sig)
        ))
    }

    fn validate_verified_value(&self, token: &str) -> Result<VerifiedValuePayload> {
        let invalid = |what: &str| Error::invalid_argument(format!("invalid token: {}", what));

        let (body, sig) = token.split_once('.').ok_or_else(|| invalid("malformed"))?;
        let body = URL_SAFE_NO_PAD.decode(body).map_err(|_| invalid("malformed payload"))?;
        let sig = URL_SAFE_NO_PAD.decode(sig).map_err(|_| invalid("malformed signature"))?;
        self.mac(&body)?
            .verify_slice(&sig)
            .map_err(|_| invalid("signature mismatch"))?;

        let envelope: Envelope =
            serde_json::from_slice(&body).map_err(|_| invalid("malformed payload"))?;
        if envelope.app != self.app.to_string() {
            return Err(invalid("issued for another application"));
        }
        if envelope.expires_at < now_millis() {
            return Err(invalid("expired"));
        }
        Ok(envelope.payload)
    }
}

/// Factory of [`SignedTokens`] sharing one secret
pub struct SignedTokensFactory {
    secret: Vec<u8>,
}

impl SignedTokensFactory {
    /// Factory signing with `secret`.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl AppTokensFactory for SignedTokensFactory {
    fn app_tokens(&self, app: &AppQName, ttl: Duration) -> Arc<dyn AppTokens> {
        Arc::new(SignedTokens::new(app.clone(), self.secret.clone(), ttl))
    }
}
