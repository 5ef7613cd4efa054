//! HTTP routes.
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /kv/{key}` | local read, any node |
//! | `PUT /kv/{key}` | leader write + replication |
//! | `DELETE /kv/{key}` | leader delete + replication |
//! | `POST /replicate` | follower apply (403 on the leader) |
//! | `PUT /config/write_quorum` | leader-only quorum change |
//! | `GET /health` | role, key count, quorum |

use std::any::Any;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::dispatcher::Replicator;
use crate::error::NodeError;
use crate::message::{
    DeleteResponse, HealthResponse, KeyResponse, QuorumRequest, QuorumResponse, ReplicateRequest,
    StatusResponse, WriteRequest, WriteResponse,
};
use crate::node::Node;

type SharedNode<R> = State<Arc<Node<R>>>;

/// Builds the router for `node`. At most `max_inflight_requests` requests
/// are processed at once; further requests wait for a free slot.
pub fn router<R: Replicator>(node: Arc<Node<R>>, max_inflight_requests: usize) -> Router {
    Router::new()
        .route(
            "/kv/:key",
            get(read_key::<R>).put(write_key::<R>).delete(delete_key::<R>),
        )
        .route("/replicate", post(replicate::<R>))
        .route("/config/write_quorum", put(set_write_quorum::<R>))
        .route("/health", get(health::<R>))
        .fallback(not_found)
        .with_state(node)
        .layer(GlobalConcurrencyLimitLayer::new(max_inflight_requests.max(1)))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

async fn read_key<R: Replicator>(
    State(node): SharedNode<R>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>, NodeError> {
    let record = node.read(&key)?;
    Ok(Json(KeyResponse {
        key,
        value: record.value,
        version: record.version,
    }))
}

async fn write_key<R: Replicator>(
    State(node): SharedNode<R>,
    Path(key): Path<String>,
    body: Result<Json<WriteRequest>, JsonRejection>,
) -> Result<Json<WriteResponse>, NodeError> {
    // Role before payload: a follower answers 403 whatever it was sent.
    node.require_leader("writes")?;
    let Json(request) = body.map_err(invalid_body)?;
    Ok(Json(node.write(&key, request.value).await?))
}

async fn delete_key<R: Replicator>(
    State(node): SharedNode<R>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, NodeError> {
    Ok(Json(node.delete(&key).await?))
}

async fn replicate<R: Replicator>(
    State(node): SharedNode<R>,
    body: Result<Json<ReplicateRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, NodeError> {
    node.require_follower("replicated mutations")?;
    let Json(request) = body.map_err(invalid_body)?;
    node.apply_replicated(request)?;
    Ok(Json(StatusResponse::ok()))
}

async fn set_write_quorum<R: Replicator>(
    State(node): SharedNode<R>,
    body: Result<Json<QuorumRequest>, JsonRejection>,
) -> Result<Json<QuorumResponse>, NodeError> {
    let Json(request) = body.map_err(invalid_body)?;
    let write_quorum = node
        .set_write_quorum(request.write_quorum)
        .map_err(|err| match err {
            // Quorum changes report a role violation as a bad request.
            err @ NodeError::NotLeader { .. } => NodeError::InvalidRequest(err.to_string()),
            other => other,
        })?;
    Ok(Json(QuorumResponse {
        status: "ok".to_string(),
        write_quorum,
    }))
}

async fn health<R: Replicator>(State(node): SharedNode<R>) -> Json<HealthResponse> {
    Json(node.health())
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

fn invalid_body(rejection: JsonRejection) -> NodeError {
    NodeError::InvalidRequest(format!("invalid json: {}", rejection.body_text()))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    };
    error!(%detail, "request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal server error" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panics_become_json_500s() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = handle_panic(Box::new(String::from("boom")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
