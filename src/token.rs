//! Access token building, signing, and verification
//!
//! An [`AccessToken`] pairs API credentials with a [`GrantSet`] and signs the
//! flattened grants into a compact JWT (HMAC-SHA256). [`TokenVerifier`] is
//! the inverse: it checks the signature (and, by default, expiry) and rebuilds
//! the full token, grants included, from the claim payload.
//!
//! The JWT payload always carries `iss` (API key), `nbf`/`exp` (validity
//! window, Unix seconds) and optionally `sub` (participant identity); all
//! present grant fields sit alongside them, wire-cased and nil-pruned.

use crate::grants::{
    AgentGrant, GrantSet, InferenceGrant, ObservabilityGrant, SipGrant, VideoGrant,
};
use crate::room::RoomConfiguration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Default validity window when the builder sets no TTL: 6 hours.
pub const DEFAULT_TTL_SECS: u64 = 6 * 60 * 60;

/// Registered claims that belong to the JWT envelope, not the grant tree.
const RESERVED_CLAIMS: [&str; 6] = ["iss", "sub", "nbf", "exp", "iat", "jti"];

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing API key")]
    MissingApiKey,

    #[error("missing API secret")]
    MissingApiSecret,

    #[error("room configuration embeds signing credentials; call allow_sensitive_credentials(true) to sign anyway")]
    SensitiveCredentials,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token is expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("token verification failed: {0}")]
    Verification(String),
}

/// A signable (or parsed) access token: API credentials, grants, and an
/// optional TTL override.
///
/// All `with_*` methods are functional updates: they consume the token and
/// return a new one with a single field replaced. Nothing is validated until
/// [`AccessToken::to_jwt`].
#[derive(Clone)]
pub struct AccessToken {
    api_key: String,
    api_secret: Option<String>,
    grants: GrantSet,
    ttl_secs: Option<u64>,
    allow_sensitive_credentials: bool,
}

impl AccessToken {
    /// Create a token with empty grants and the default validity window.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Some(api_secret.into()),
            grants: GrantSet::default(),
            ttl_secs: None,
            allow_sensitive_credentials: false,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.grants.identity = Some(identity.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.grants.display_name = Some(name.into());
        self
    }

    pub fn with_participant_kind(mut self, kind: impl Into<String>) -> Self {
        self.grants.participant_kind = Some(kind.into());
        self
    }

    pub fn with_video_grants(mut self, video: VideoGrant) -> Self {
        self.grants.video = Some(video);
        self
    }

    pub fn with_sip_grants(mut self, sip: SipGrant) -> Self {
        self.grants.sip = Some(sip);
        self
    }

    pub fn with_agent_grants(mut self, agent: AgentGrant) -> Self {
        self.grants.agent = Some(agent);
        self
    }

    pub fn with_inference_grants(mut self, inference: InferenceGrant) -> Self {
        self.grants.inference = Some(inference);
        self
    }

    pub fn with_observability_grants(
        mut self,
        observability: ObservabilityGrant,
    ) -> Self {
        self.grants.observability = Some(observability);
        self
    }

    pub fn with_room_config(mut self, config: RoomConfiguration) -> Self {
        self.grants.room_config = Some(config);
        self
    }

    pub fn with_room_preset(mut self, preset: impl Into<String>) -> Self {
        self.grants.room_preset = Some(preset.into());
        self
    }

    pub fn with_integrity_hash(mut self, sha256: impl Into<String>) -> Self {
        self.grants.integrity_hash = Some(sha256.into());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.grants.metadata = Some(metadata.into());
        self
    }

    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.grants.attributes = Some(attributes);
        self
    }

    /// Override the validity window (seconds from signing time).
    pub fn with_ttl_secs(mut self, secs: u64) -> Self {
        self.ttl_secs = Some(secs);
        self
    }

    /// Permit signing a room configuration that embeds egress credentials.
    pub fn allow_sensitive_credentials(mut self, allow: bool) -> Self {
        self.allow_sensitive_credentials = allow;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn grants(&self) -> &GrantSet {
        &self.grants
    }

    pub fn identity(&self) -> Option<&str> {
        self.grants.identity.as_deref()
    }

    /// Validity window in seconds: the builder's override, or for a parsed
    /// token the window recovered from its claims.
    pub fn ttl_secs(&self) -> Option<u64> {
        self.ttl_secs
    }

    /// Sign into a compact JWT.
    ///
    /// Fails fast on an empty API key or secret. A room configuration that
    /// embeds egress credentials (see
    /// [`RoomConfiguration::embeds_credentials`]) is refused unless the
    /// builder opted in, since anyone holding the token can read its payload.
    pub fn to_jwt(&self) -> Result<String, TokenError> {
        if self.api_key.is_empty() {
            return Err(TokenError::MissingApiKey);
        }
        let secret = match self.api_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret,
            _ => return Err(TokenError::MissingApiSecret),
        };
        if let Some(config) = &self.grants.room_config {
            if !self.allow_sensitive_credentials && config.embeds_credentials() {
                return Err(TokenError::SensitiveCredentials);
            }
        }

        let now = unix_now();
        let ttl = self.ttl_secs.unwrap_or(DEFAULT_TTL_SECS);

        // Grant keys never collide with the registered claims; the grant
        // model has no iss/sub/nbf/exp fields and `identity` is excluded
        // from the flattened map.
        let mut claims = self.grants.to_claims();
        claims.insert("iss".to_string(), Value::from(self.api_key.clone()));
        if let Some(identity) = &self.grants.identity {
            claims.insert("sub".to_string(), Value::from(identity.clone()));
        }
        claims.insert("nbf".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now + ttl));

        let jwt = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))?;

        debug!(api_key = %self.api_key, ttl_secs = ttl, "signed access token");
        Ok(jwt)
    }

    /// Decode a token's claims without checking its signature.
    ///
    /// For inspection only: nothing about the result can be trusted, and the
    /// returned token carries no secret, so it cannot be re-signed as-is.
    pub fn parse_unverified(jwt: &str) -> Result<Self, TokenError> {
        let mut validation = signature_only_validation();
        validation.insecure_disable_signature_validation();
        let data = jsonwebtoken::decode::<Map<String, Value>>(
            jwt,
            &DecodingKey::from_secret(&[]),
            &validation,
        )
        .map_err(|e| TokenError::Verification(e.to_string()))?;

        warn!("decoded access token without signature verification");
        Ok(Self::from_claims(data.claims, None))
    }

    /// Rebuild a token from a decoded claim map. Shared by the verified and
    /// unverified parse paths; `api_secret` is filled in only when the
    /// caller's own secret verified the signature.
    fn from_claims(mut claims: Map<String, Value>, api_secret: Option<String>) -> Self {
        let api_key = claims
            .get("iss")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let identity = claims
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_string);

        let exp = claims.get("exp").and_then(Value::as_i64);
        let nbf = claims.get("nbf").and_then(Value::as_i64);
        let ttl_secs = match (exp, nbf) {
            // The window the issuer originally signed.
            (Some(exp), Some(nbf)) if nbf > 0 => Some(exp.saturating_sub(nbf).max(0) as u64),
            // No usable nbf: best-effort remaining lifetime.
            (Some(exp), _) => Some(exp.saturating_sub(unix_now() as i64).max(0) as u64),
            _ => None,
        };

        for key in RESERVED_CLAIMS {
            claims.remove(key);
        }
        let mut grants = GrantSet::hydrate(claims);
        grants.identity = identity;

        Self {
            api_key,
            api_secret,
            grants,
            ttl_secs,
            allow_sensitive_credentials: false,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("grants", &self.grants)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Verifies token signatures and rebuilds the token's grants.
#[derive(Clone)]
pub struct TokenVerifier {
    api_secret: String,
    verify_expiry: bool,
}

impl TokenVerifier {
    /// Verifier that checks the signature and rejects expired tokens.
    pub fn new(api_secret: impl Into<String>) -> Self {
        Self {
            api_secret: api_secret.into(),
            verify_expiry: true,
        }
    }

    /// Accept expired tokens (signature is still checked).
    pub fn without_expiry_check(mut self) -> Self {
        self.verify_expiry = false;
        self
    }

    /// Verify a compact JWT and rebuild the full token.
    ///
    /// The issuer is read from the token itself, not cross-checked; this
    /// entry point holds only a secret. Expiry is enforced here, not by the
    /// JWT library, so that [`TokenVerifier::without_expiry_check`] actually
    /// governs it.
    pub fn verify(&self, jwt: &str) -> Result<AccessToken, TokenError> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(
            jwt,
            &DecodingKey::from_secret(self.api_secret.as_bytes()),
            &signature_only_validation(),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Verification(e.to_string()),
        })?;

        if self.verify_expiry {
            if let Some(exp) = data.claims.get("exp").and_then(Value::as_i64) {
                if exp < unix_now() as i64 {
                    return Err(TokenError::Expired);
                }
            }
        }

        Ok(AccessToken::from_claims(
            data.claims,
            Some(self.api_secret.clone()),
        ))
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("api_secret", &"[REDACTED]")
            .field("verify_expiry", &self.verify_expiry)
            .finish()
    }
}

/// HS256 validation with every claim check disabled; expiry is this crate's
/// responsibility.
fn signature_only_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEST_KEY: &str = "test-api-key";
    const TEST_SECRET: &str = "test-api-secret-for-signing";

    #[test]
    fn test_missing_api_key() {
        let result = AccessToken::new("", TEST_SECRET).to_jwt();
        assert!(matches!(result, Err(TokenError::MissingApiKey)));
    }

    #[test]
    fn test_missing_api_secret() {
        let result = AccessToken::new(TEST_KEY, "").to_jwt();
        assert!(matches!(result, Err(TokenError::MissingApiSecret)));
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let jwt = AccessToken::new("k", "s")
            .with_identity("user123")
            .with_video_grants(VideoGrant {
                can_publish: Some(true),
                ..VideoGrant::joining("my-room")
            })
            .with_ttl_secs(3600)
            .to_jwt()
            .unwrap();

        let token = TokenVerifier::new("s").verify(&jwt).unwrap();
        assert_eq!(token.api_key(), "k");
        assert_eq!(token.identity(), Some("user123"));
        assert_eq!(token.ttl_secs(), Some(3600));

        let video = token.grants().video.as_ref().unwrap();
        assert_eq!(video.room.as_deref(), Some("my-room"));
        assert_eq!(video.room_join, Some(true));
        assert_eq!(video.can_publish, Some(true));
        assert_eq!(video.can_subscribe, None);
    }

    #[test]
    fn test_wrong_secret_fails() {
        let jwt = AccessToken::new(TEST_KEY, TEST_SECRET)
            .with_identity("user123")
            .to_jwt()
            .unwrap();

        let result = TokenVerifier::new("wrong-secret").verify(&jwt);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    /// Sign a raw claim map directly, bypassing the builder, to control the
    /// validity window precisely.
    fn sign_raw(claims: Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = unix_now();
        let jwt = sign_raw(json!({
            "iss": TEST_KEY,
            "sub": "user123",
            "nbf": now - 120,
            "exp": now - 60,
            "video": {"roomJoin": true}
        }));

        let result = TokenVerifier::new(TEST_SECRET).verify(&jwt);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_expired_token_accepted_without_expiry_check() {
        let now = unix_now();
        let jwt = sign_raw(json!({
            "iss": TEST_KEY,
            "sub": "user123",
            "nbf": now - 120,
            "exp": now - 60,
            "video": {"roomJoin": true}
        }));

        let token = TokenVerifier::new(TEST_SECRET)
            .without_expiry_check()
            .verify(&jwt)
            .unwrap();
        // Original signed window, recovered from exp - nbf.
        assert_eq!(token.ttl_secs(), Some(60));
        assert_eq!(token.identity(), Some("user123"));
    }

    #[test]
    fn test_ttl_falls_back_to_remaining_time_without_nbf() {
        let now = unix_now();
        let jwt = sign_raw(json!({
            "iss": TEST_KEY,
            "exp": now + 300
        }));

        let token = TokenVerifier::new(TEST_SECRET).verify(&jwt).unwrap();
        let ttl = token.ttl_secs().unwrap();
        assert!((298..=300).contains(&ttl), "ttl was {ttl}");
    }

    #[test]
    fn test_ttl_never_negative() {
        let now = unix_now();
        let jwt = sign_raw(json!({
            "iss": TEST_KEY,
            "exp": now - 60
        }));

        let token = TokenVerifier::new(TEST_SECRET)
            .without_expiry_check()
            .verify(&jwt)
            .unwrap();
        assert_eq!(token.ttl_secs(), Some(0));
    }

    #[test]
    fn test_ttl_absent_without_exp() {
        let jwt = sign_raw(json!({"iss": TEST_KEY, "sub": "user123"}));

        let token = TokenVerifier::new(TEST_SECRET).verify(&jwt).unwrap();
        assert_eq!(token.ttl_secs(), None);
    }

    #[test]
    fn test_parse_unverified_carries_no_secret() {
        let jwt = AccessToken::new(TEST_KEY, TEST_SECRET)
            .with_identity("user123")
            .with_video_grants(VideoGrant::joining("my-room"))
            .to_jwt()
            .unwrap();

        let token = AccessToken::parse_unverified(&jwt).unwrap();
        assert_eq!(token.identity(), Some("user123"));
        assert_eq!(
            token.grants().video.as_ref().and_then(|v| v.room.as_deref()),
            Some("my-room")
        );
        // No secret: the token cannot be re-signed as-is.
        assert!(matches!(token.to_jwt(), Err(TokenError::MissingApiSecret)));
    }

    #[test]
    fn test_unknown_claim_keys_are_dropped() {
        let now = unix_now();
        let jwt = sign_raw(json!({
            "iss": TEST_KEY,
            "sub": "user123",
            "nbf": now,
            "exp": now + 600,
            "futureFeature": true,
            "video": {"roomJoin": true, "room": "my-room"}
        }));

        let token = TokenVerifier::new(TEST_SECRET).verify(&jwt).unwrap();
        assert_eq!(token.identity(), Some("user123"));
        let video = token.grants().video.as_ref().unwrap();
        assert_eq!(video.room.as_deref(), Some("my-room"));
    }

    #[test]
    fn test_sensitive_room_config_refused() {
        use crate::room::{RoomCompositeEgressRequest, RoomEgress, WebhookConfig};

        let config = RoomConfiguration {
            egress: Some(RoomEgress {
                room: Some(RoomCompositeEgressRequest {
                    webhooks: Some(vec![WebhookConfig {
                        url: Some("https://example.com/hooks".to_string()),
                        signing_key: Some("whsec_abc123".to_string()),
                        ..WebhookConfig::default()
                    }]),
                    ..RoomCompositeEgressRequest::default()
                }),
                ..RoomEgress::default()
            }),
            ..RoomConfiguration::default()
        };

        let token = AccessToken::new(TEST_KEY, TEST_SECRET).with_room_config(config);
        assert!(matches!(
            token.clone().to_jwt(),
            Err(TokenError::SensitiveCredentials)
        ));
        assert!(token.allow_sensitive_credentials(true).to_jwt().is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let token = AccessToken::new(TEST_KEY, TEST_SECRET);
        let debug = format!("{token:?}");
        assert!(!debug.contains(TEST_SECRET));
        assert!(debug.contains("[REDACTED]"));
    }
}
