//! A single leader or follower node.
//!
//! The leader write path commits locally first and only then replicates:
//!
//! 1. reject the request if this node is not the leader or the payload is bad
//! 2. commit to the local store, allocating a version (never rolled back)
//! 3. fan the versioned mutation out through the [`QuorumCoordinator`]
//! 4. report success, or [`NodeError::QuorumNotMet`] with the ack count
//!
//! A write that misses quorum is therefore still visible on the leader.
//! Followers only merge what they are sent, via last-writer-wins.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cli::Config;
use crate::coordinator::{QuorumCoordinator, QuorumOutcome};
use crate::dispatcher::{HttpReplicator, Replicator};
use crate::error::NodeError;
use crate::message::{DeleteResponse, HealthResponse, ReplicateRequest, WriteResponse};
use crate::mutation::Mutation;
use crate::quorum::WriteQuorum;
use crate::store::{Record, VersionedStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    Follower,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => f.write_str("leader"),
            Role::Follower => f.write_str("follower"),
        }
    }
}

pub struct Node<R = HttpReplicator> {
    role: Role,
    store: VersionedStore,
    followers: Vec<String>,
    coordinator: QuorumCoordinator<R>,
}

impl Node<HttpReplicator> {
    /// Builds a node that replicates over HTTP as described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let mut followers = config.followers();
        if config.role == Role::Follower && !followers.is_empty() {
            warn!(?followers, "follower URLs are ignored on a follower node");
            followers.clear();
        }

        let replicator = HttpReplicator::new(config.replication_timeout(), config.latency())
            .context("failed to build replication client")?;
        let node = Node::new(
            config.role,
            followers,
            Arc::new(replicator),
            config.write_quorum,
            config.replication_concurrency,
        )?;
        Ok(node)
    }
}

impl<R: Replicator> Node<R> {
    pub fn new(
        role: Role,
        followers: Vec<String>,
        replicator: Arc<R>,
        write_quorum: usize,
        replication_concurrency: usize,
    ) -> Result<Self, NodeError> {
        let quorum = Arc::new(WriteQuorum::new(write_quorum)?);
        Ok(Self {
            role,
            store: VersionedStore::new(),
            followers,
            coordinator: QuorumCoordinator::new(replicator, quorum, replication_concurrency),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn followers(&self) -> &[String] {
        &self.followers
    }

    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    pub fn write_quorum(&self) -> usize {
        self.coordinator.write_quorum().get()
    }

    /// Local read; no replication involved, so a follower may lag.
    pub fn read(&self, key: &str) -> Result<Record, NodeError> {
        self.store.get(key).ok_or_else(|| NodeError::NotFound {
            key: key.to_string(),
        })
    }

    pub async fn write(&self, key: &str, value: Value) -> Result<WriteResponse, NodeError> {
        self.require_leader("writes")?;
        require_key(key)?;

        let version = self.store.assign_and_commit(key, value.clone());
        info!(key, version, "write committed locally, starting replication");

        let mutation = Mutation::put(key, value, version);
        let outcome = self.coordinator.replicate(&mutation, &self.followers).await;
        check_quorum(&mutation, outcome)?;

        Ok(WriteResponse {
            status: "ok".to_string(),
            value: mutation.value().cloned().unwrap_or(Value::Null),
            key: mutation.key,
            version,
            acks: outcome.acks,
            required_quorum: outcome.required_quorum,
        })
    }

    pub async fn delete(&self, key: &str) -> Result<DeleteResponse, NodeError> {
        self.require_leader("deletes")?;
        require_key(key)?;

        let version = self
            .store
            .delete_and_commit(key)
            .ok_or_else(|| NodeError::NotFound {
                key: key.to_string(),
            })?;
        info!(key, version, "delete committed locally, starting replication");

        let mutation = Mutation::delete(key, version);
        let outcome = self.coordinator.replicate(&mutation, &self.followers).await;
        check_quorum(&mutation, outcome)?;

        Ok(DeleteResponse {
            status: "ok".to_string(),
            key: mutation.key,
            version,
            acks: outcome.acks,
            required_quorum: outcome.required_quorum,
        })
    }

    /// Follower apply path. Accepts any well-formed mutation, whether or not
    /// it turns out to be stale; the return value says which, but callers on
    /// the wire only ever see "ok".
    pub fn apply_replicated(&self, request: ReplicateRequest) -> Result<bool, NodeError> {
        self.require_follower("replicated mutations")?;
        let mutation = Mutation::try_from(request)?;
        let applied = self.store.apply_if_newer(&mutation);
        if applied {
            debug!(
                key = %mutation.key,
                version = mutation.version,
                delete = mutation.is_delete(),
                "applied replicated mutation"
            );
        } else {
            debug!(
                key = %mutation.key,
                version = mutation.version,
                "ignored stale replicated mutation"
            );
        }
        Ok(applied)
    }

    /// Changes the quorum used by subsequent writes. Rounds already in
    /// flight keep the value they started with.
    pub fn set_write_quorum(&self, requested: i64) -> Result<usize, NodeError> {
        self.require_leader("quorum changes")?;
        let previous = self.coordinator.write_quorum().set(requested)?;
        let current = self.write_quorum();
        info!(previous, current, "write quorum updated");
        if current > self.followers.len() && !self.followers.is_empty() {
            warn!(
                current,
                followers = self.followers.len(),
                "write quorum exceeds follower count; writes will report failure"
            );
        }
        Ok(current)
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
            role: self.role,
            keys: self.store.len(),
            write_quorum: self.write_quorum(),
        }
    }

    pub fn require_leader(&self, operation: &'static str) -> Result<(), NodeError> {
        match self.role {
            Role::Leader => Ok(()),
            Role::Follower => Err(NodeError::NotLeader { operation }),
        }
    }

    pub fn require_follower(&self, operation: &'static str) -> Result<(), NodeError> {
        match self.role {
            Role::Follower => Ok(()),
            Role::Leader => Err(NodeError::NotFollower { operation }),
        }
    }
}

fn require_key(key: &str) -> Result<(), NodeError> {
    if key.is_empty() {
        return Err(NodeError::InvalidRequest("key must not be empty".to_string()));
    }
    Ok(())
}

fn check_quorum(mutation: &Mutation, outcome: QuorumOutcome) -> Result<(), NodeError> {
    if outcome.quorum_met {
        return Ok(());
    }
    Err(NodeError::QuorumNotMet {
        key: mutation.key.clone(),
        version: mutation.version,
        acks: outcome.acks,
        required_quorum: outcome.required_quorum,
    })
}
