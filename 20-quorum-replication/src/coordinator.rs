//! First-N-of-M fan-out of a mutation to the followers.
//!
//! A round contacts every follower concurrently, regardless of the quorum
//! size, and returns as soon as `write_quorum` of them have acknowledged.
//! Calls still in flight at that point keep running as detached tasks; they
//! may still land on their follower, but nobody waits for them.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::dispatcher::Replicator;
use crate::mutation::Mutation;
use crate::quorum::WriteQuorum;

/// Result of one replication round.
///
/// `acks` is a point-in-time count: followers whose calls were still
/// running when the round returned may acknowledge afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumOutcome {
    pub quorum_met: bool,
    pub acks: usize,
    pub required_quorum: usize,
}

pub struct QuorumCoordinator<R> {
    replicator: Arc<R>,
    quorum: Arc<WriteQuorum>,
    fanout: Arc<Semaphore>,
}

impl<R: Replicator> QuorumCoordinator<R> {
    /// `fanout_limit` caps how many replication calls run at once across all
    /// rounds; further calls wait for a slot.
    pub fn new(replicator: Arc<R>, quorum: Arc<WriteQuorum>, fanout_limit: usize) -> Self {
        Self {
            replicator,
            quorum,
            fanout: Arc::new(Semaphore::new(fanout_limit.max(1))),
        }
    }

    pub fn write_quorum(&self) -> &Arc<WriteQuorum> {
        &self.quorum
    }

    pub async fn replicate(&self, mutation: &Mutation, followers: &[String]) -> QuorumOutcome {
        // Read once; a concurrent change applies to the next round.
        let required_quorum = self.quorum.get();

        if followers.is_empty() {
            return QuorumOutcome {
                quorum_met: true,
                acks: 0,
                required_quorum,
            };
        }

        let mutation = Arc::new(mutation.clone());
        let mut pending: FuturesUnordered<_> = followers
            .iter()
            .map(|follower| self.spawn_attempt(follower.clone(), Arc::clone(&mutation)))
            .collect();

        let mut acks = 0;
        while let Some(joined) = pending.next().await {
            match joined {
                Ok(true) => acks += 1,
                Ok(false) => {}
                Err(err) => warn!(key = %mutation.key, error = %err, "replication task failed"),
            }

            if acks >= required_quorum {
                if !pending.is_empty() {
                    debug!(
                        key = %mutation.key,
                        version = mutation.version,
                        outstanding = pending.len(),
                        "quorum reached, leaving stragglers in background"
                    );
                }
                info!(
                    key = %mutation.key,
                    version = mutation.version,
                    acks,
                    required_quorum,
                    "quorum reached"
                );
                // Dropping the join handles detaches the remaining tasks.
                return QuorumOutcome {
                    quorum_met: true,
                    acks,
                    required_quorum,
                };
            }
        }

        warn!(
            key = %mutation.key,
            version = mutation.version,
            acks,
            required_quorum,
            followers = followers.len(),
            "quorum not reached"
        );
        QuorumOutcome {
            quorum_met: false,
            acks,
            required_quorum,
        }
    }

    fn spawn_attempt(
        &self,
        follower: String,
        mutation: Arc<Mutation>,
    ) -> tokio::task::JoinHandle<bool> {
        let replicator = Arc::clone(&self.replicator);
        let fanout = Arc::clone(&self.fanout);
        tokio::spawn(async move {
            let Ok(_permit) = fanout.acquire_owned().await else {
                return false;
            };
            replicator.replicate(&follower, &mutation).await
        })
    }
}
