//! JSON bodies exchanged with clients and between nodes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::NodeError;
use crate::mutation::Mutation;
use crate::node::Role;

/// Body of `PUT /kv/{key}`. `value` must be present but may be JSON `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriteRequest {
    pub value: Value,
}

/// Body of `POST /replicate`, sent leader -> follower.
///
/// Every field is optional on the wire so that a malformed payload reaches
/// the follower apply path and is rejected there with a 400, rather than
/// being indistinguishable from unparseable JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReplicateRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub is_delete: bool,
}

// Distinguishes `"value": null` (a legitimate value) from a missing field.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl From<&Mutation> for ReplicateRequest {
    fn from(mutation: &Mutation) -> Self {
        Self {
            key: Some(mutation.key.clone()),
            value: mutation.value().cloned(),
            version: Some(mutation.version),
            is_delete: mutation.is_delete(),
        }
    }
}

impl TryFrom<ReplicateRequest> for Mutation {
    type Error = NodeError;

    fn try_from(request: ReplicateRequest) -> Result<Self, Self::Error> {
        let (Some(key), Some(version)) = (request.key, request.version) else {
            return Err(NodeError::InvalidRequest("missing key/version".to_string()));
        };
        if request.is_delete {
            return Ok(Mutation::delete(key, version));
        }
        match request.value {
            Some(value) => Ok(Mutation::put(key, value, version)),
            None => Err(NodeError::InvalidRequest("missing value".to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyResponse {
    pub key: String,
    pub value: Value,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriteResponse {
    pub status: String,
    pub key: String,
    pub value: Value,
    pub version: u64,
    pub acks: usize,
    pub required_quorum: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteResponse {
    pub status: String,
    pub key: String,
    pub version: u64,
    pub acks: usize,
    pub required_quorum: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuorumRequest {
    pub write_quorum: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuorumResponse {
    pub status: String,
    pub write_quorum: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub role: Role,
    pub keys: usize,
    pub write_quorum: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mutation::MutationOp;

    fn parse(body: Value) -> Result<Mutation, NodeError> {
        let request: ReplicateRequest = serde_json::from_value(body).expect("valid json shape");
        Mutation::try_from(request)
    }

    #[test]
    fn null_value_is_a_value() {
        let mutation = parse(json!({"key": "k", "value": null, "version": 2})).expect("valid");
        assert_eq!(mutation.op, MutationOp::Put(Value::Null));
    }

    #[test]
    fn missing_value_is_rejected_unless_deleting() {
        assert!(matches!(
            parse(json!({"key": "k", "version": 2})),
            Err(NodeError::InvalidRequest(_))
        ));
        let mutation = parse(json!({"key": "k", "version": 2, "is_delete": true})).expect("valid");
        assert_eq!(mutation, Mutation::delete("k", 2));
    }

    #[test]
    fn missing_key_or_version_is_rejected() {
        assert!(parse(json!({"value": 1, "version": 2})).is_err());
        assert!(parse(json!({"key": "k", "value": 1})).is_err());
        assert!(parse(json!({"key": null, "value": 1, "version": 2})).is_err());
    }

    #[test]
    fn leader_payload_matches_follower_expectations() {
        let delete = Mutation::delete("gone", 9);
        let wire = serde_json::to_value(ReplicateRequest::from(&delete)).expect("serialize");
        assert_eq!(
            wire,
            json!({"key": "gone", "value": null, "version": 9, "is_delete": true})
        );
        assert_eq!(parse(wire).expect("valid"), delete);
    }

    #[test]
    fn write_request_requires_value_field() {
        assert!(serde_json::from_value::<WriteRequest>(json!({})).is_err());
        let request: WriteRequest = serde_json::from_value(json!({"value": null})).expect("null ok");
        assert_eq!(request.value, Value::Null);
    }
}
