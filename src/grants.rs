//! Permission grants
//!
//! A [`GrantSet`] is the full tree of permissions carried by one token:
//! per-capability grant records (video rooms, SIP, agents, inference,
//! observability) plus participant identity fields and an optional embedded
//! room configuration. Every field is optional; a field that was never set
//! stays absent through flatten/hydrate round-trips.

use crate::claims::{field_case, lenient, prune_nulls, rename_keys, wire_case};
use crate::room::RoomConfiguration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// All grants carried by a single token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantSet {
    /// Participant identity. Travels in the registered `sub` claim, never in
    /// the flattened grant map.
    #[serde(default, deserialize_with = "lenient")]
    pub identity: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub participant_kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub video: Option<VideoGrant>,
    #[serde(default, deserialize_with = "lenient")]
    pub sip: Option<SipGrant>,
    #[serde(default, deserialize_with = "lenient")]
    pub agent: Option<AgentGrant>,
    #[serde(default, deserialize_with = "lenient")]
    pub inference: Option<InferenceGrant>,
    #[serde(default, deserialize_with = "lenient")]
    pub observability: Option<ObservabilityGrant>,
    #[serde(default, deserialize_with = "lenient")]
    pub room_config: Option<RoomConfiguration>,
    #[serde(default, deserialize_with = "lenient")]
    pub room_preset: Option<String>,
    /// SHA-256 of out-of-band content (e.g. participant metadata) that the
    /// server may verify against.
    #[serde(default, deserialize_with = "lenient")]
    pub integrity_hash: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub attributes: Option<HashMap<String, String>>,
}

impl GrantSet {
    /// Flatten into the wire-cased claim map that gets signed.
    ///
    /// Absent fields are pruned at every nesting depth, then every remaining
    /// key is renamed to its wire form (`room_join` -> `roomJoin`). The
    /// `identity` field is excluded; it is carried by the `sub` claim.
    pub fn to_claims(&self) -> Map<String, Value> {
        let tree = serde_json::to_value(self).expect("serialize grants");
        let wire = rename_keys(prune_nulls(tree), &wire_case);
        match wire {
            Value::Object(mut map) => {
                map.remove("identity");
                map
            }
            _ => Map::new(),
        }
    }

    /// Rebuild a typed grant tree from a wire-cased claim map.
    ///
    /// Keys are renamed back to field form, then every record is rebuilt
    /// recursively. Unknown keys are dropped, missing keys stay absent, and a
    /// malformed shape (e.g. a scalar where a record was expected) degrades
    /// to an absent field rather than an error: the payload originates from a
    /// less-trusted party until its signature has been checked.
    pub fn hydrate(claims: Map<String, Value>) -> Self {
        let tree = rename_keys(Value::Object(claims), &field_case);
        serde_json::from_value(tree).unwrap_or_default()
    }
}

/// Room-level permissions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoGrant {
    #[serde(default, deserialize_with = "lenient")]
    pub room_create: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub room_list: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub room_record: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub room_admin: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub room_join: Option<bool>,
    /// Room the participant may join; required by servers when `room_join`
    /// is granted.
    #[serde(default, deserialize_with = "lenient")]
    pub room: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub destination_room: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub can_publish: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub can_subscribe: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub can_publish_data: Option<bool>,
    /// Allowed publish sources (camera, microphone, screen_share, ...).
    /// Absent means all sources.
    #[serde(default, deserialize_with = "lenient")]
    pub can_publish_sources: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub can_update_own_metadata: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub ingress_admin: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub hidden: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub recorder: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub agent: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub can_subscribe_metrics: Option<bool>,
}

impl VideoGrant {
    /// Grant for a regular participant joining one room.
    pub fn joining(room: impl Into<String>) -> Self {
        Self {
            room_join: Some(true),
            room: Some(room.into()),
            ..Self::default()
        }
    }

    /// Unset booleans read as denied.
    pub fn can_join(&self) -> bool {
        self.room_join.unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.room_admin.unwrap_or(false)
    }
}

/// SIP permissions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SipGrant {
    #[serde(default, deserialize_with = "lenient")]
    pub admin: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub call: Option<bool>,
}

/// Agent-dispatch permissions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentGrant {
    #[serde(default, deserialize_with = "lenient")]
    pub admin: Option<bool>,
}

/// Inference permissions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceGrant {
    #[serde(default, deserialize_with = "lenient")]
    pub perform: Option<bool>,
}

/// Observability permissions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityGrant {
    #[serde(default, deserialize_with = "lenient")]
    pub write: Option<bool>,
}
