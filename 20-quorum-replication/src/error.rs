use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Failures a node reports back to its caller.
///
/// Transport failures towards individual followers are deliberately absent:
/// the dispatcher turns them into a missing ack, and only the aggregate
/// shows up here as [`NodeError::QuorumNotMet`].
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("{operation} allowed only on leader")]
    NotLeader { operation: &'static str },

    /// Replicated mutations only flow from the leader to its followers.
    #[error("{operation} accepted only on followers")]
    NotFollower { operation: &'static str },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("key not found: {key}")]
    NotFound { key: String },

    /// The mutation is committed on the leader at `version` but fewer than
    /// `required_quorum` followers acknowledged it.
    #[error("quorum not met for key {key} at version {version}: {acks}/{required_quorum} acks")]
    QuorumNotMet {
        key: String,
        version: u64,
        acks: usize,
        required_quorum: usize,
    },

    #[error("write quorum must be an integer >= 1, got {0}")]
    InvalidQuorum(i64),
}

impl NodeError {
    pub fn status(&self) -> StatusCode {
        match self {
            NodeError::NotLeader { .. } | NodeError::NotFollower { .. } => StatusCode::FORBIDDEN,
            NodeError::InvalidRequest(_) | NodeError::InvalidQuorum(_) => StatusCode::BAD_REQUEST,
            NodeError::NotFound { .. } => StatusCode::NOT_FOUND,
            NodeError::QuorumNotMet { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            NodeError::NotFound { .. } => json!({ "error": "key not found" }),
            NodeError::QuorumNotMet {
                key,
                version,
                acks,
                required_quorum,
            } => json!({
                "status": "failed",
                "reason": "not enough follower acknowledgements",
                "key": key,
                "version": version,
                "acks": acks,
                "required_quorum": required_quorum,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_failure_to_its_status() {
        let cases = [
            (NodeError::NotLeader { operation: "writes" }, StatusCode::FORBIDDEN),
            (
                NodeError::NotFollower {
                    operation: "replicated mutations",
                },
                StatusCode::FORBIDDEN,
            ),
            (NodeError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (NodeError::InvalidQuorum(0), StatusCode::BAD_REQUEST),
            (NodeError::NotFound { key: "k".into() }, StatusCode::NOT_FOUND),
            (
                NodeError::QuorumNotMet {
                    key: "k".into(),
                    version: 1,
                    acks: 0,
                    required_quorum: 1,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn role_violation_message_names_the_operation() {
        let err = NodeError::NotLeader { operation: "deletes" };
        assert_eq!(err.to_string(), "deletes allowed only on leader");
    }
}
