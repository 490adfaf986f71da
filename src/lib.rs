//! Roomkey - signed access tokens for real-time media rooms
//!
//! Builds and parses the JWTs (HMAC-SHA256) that authorize participants,
//! agents, and tooling against a real-time media platform. A token carries a
//! tree of permission grants - room access, SIP, agent dispatch, inference,
//! observability - plus an optional embedded room configuration with egress
//! targets and agent dispatch records.
//!
//! # Example
//!
//! ```
//! use roomkey::{AccessToken, TokenVerifier, VideoGrant};
//!
//! let jwt = AccessToken::new("api-key", "api-secret")
//!     .with_identity("user123")
//!     .with_video_grants(VideoGrant {
//!         can_publish: Some(true),
//!         ..VideoGrant::joining("my-room")
//!     })
//!     .with_ttl_secs(3600)
//!     .to_jwt()?;
//!
//! let token = TokenVerifier::new("api-secret").verify(&jwt)?;
//! assert_eq!(token.identity(), Some("user123"));
//! # Ok::<(), roomkey::TokenError>(())
//! ```

mod claims;
pub mod grants;
pub mod room;
pub mod token;

pub use grants::{
    AgentGrant, GrantSet, InferenceGrant, ObservabilityGrant, SipGrant, VideoGrant,
};
pub use room::{
    AutoParticipantEgress, AutoTrackEgress, EncodedFileOutput, FilterParams, ImageOutput,
    RoomAgentDispatch, RoomCompositeEgressRequest, RoomConfiguration, RoomEgress,
    SegmentedFileOutput, StreamOutput, WebhookConfig,
};
pub use token::{AccessToken, TokenError, TokenVerifier, DEFAULT_TTL_SECS};
