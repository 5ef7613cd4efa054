//! Sending one mutation to one follower.
//!
//! [`Replicator`] is the seam between the quorum coordinator and the
//! network. [`HttpReplicator`] is the production implementation: it waits
//! out an optional injected delay, POSTs the mutation to the follower's
//! `/replicate` endpoint under a fixed timeout, and collapses every possible
//! failure into `false`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::message::ReplicateRequest;
use crate::mutation::Mutation;

/// Delivers a mutation to a follower and reports whether it acknowledged.
///
/// Implementations must not panic or return errors for transport problems;
/// an unreachable, failing, or slow follower is simply `false`.
pub trait Replicator: Send + Sync + 'static {
    fn replicate(&self, follower: &str, mutation: &Mutation) -> impl Future<Output = bool> + Send;
}

/// Random pause before each replication call, used to emulate network
/// jitter in experiments. The default injects nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyInjector {
    min: Duration,
    max: Duration,
}

impl LatencyInjector {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A uniform delay in `[min, max]`. Bounds are swapped if given in the
    /// wrong order.
    pub fn uniform(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.max.is_zero()
    }

    pub fn sample(&self) -> Duration {
        if self.min >= self.max {
            return self.max;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    pub async fn pause(&self) {
        if self.is_disabled() {
            return;
        }
        let delay = self.sample();
        tokio::time::sleep(delay).await;
    }
}

/// Replicates over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpReplicator {
    client: reqwest::Client,
    latency: LatencyInjector,
}

impl HttpReplicator {
    /// `timeout` bounds each call end to end (connect, send, response).
    pub fn new(timeout: Duration, latency: LatencyInjector) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, latency })
    }
}

impl Replicator for HttpReplicator {
    async fn replicate(&self, follower: &str, mutation: &Mutation) -> bool {
        self.latency.pause().await;

        let url = format!("{}/replicate", follower.trim_end_matches('/'));
        let result = self
            .client
            .post(&url)
            .json(&ReplicateRequest::from(mutation))
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!(
                    follower,
                    key = %mutation.key,
                    version = mutation.version,
                    "replication acknowledged"
                );
                true
            }
            Ok(response) => {
                warn!(
                    follower,
                    key = %mutation.key,
                    version = mutation.version,
                    status = %response.status(),
                    "replication rejected"
                );
                false
            }
            Err(err) => {
                warn!(
                    follower,
                    key = %mutation.key,
                    version = mutation.version,
                    error = %err,
                    timed_out = err.is_timeout(),
                    "replication failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::Router;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    /// A follower that answers every replication call with `status`.
    async fn follower_answering(status: StatusCode) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let app = Router::new().route("/replicate", post(move || async move { status }));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    #[test]
    fn disabled_injector_never_delays() {
        let latency = LatencyInjector::disabled();
        assert!(latency.is_disabled());
        assert_eq!(latency.sample(), Duration::ZERO);
    }

    #[test]
    fn samples_stay_within_bounds() {
        let latency = LatencyInjector::uniform(Duration::from_millis(5), Duration::from_millis(2));
        for _ in 0..200 {
            let delay = latency.sample();
            assert!(delay >= Duration::from_millis(2) && delay <= Duration::from_millis(5));
        }
    }

    #[test]
    fn fixed_delay_when_bounds_match() {
        let latency = LatencyInjector::uniform(Duration::from_millis(3), Duration::from_millis(3));
        assert_eq!(latency.sample(), Duration::from_millis(3));
    }

    #[tokio::test]
    async fn unreachable_follower_is_a_missing_ack() {
        // Grab a free port, then close it so the connection is refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let replicator =
            HttpReplicator::new(Duration::from_millis(500), LatencyInjector::disabled())
                .expect("client");
        let mutation = Mutation::put("foo", json!("bar"), 1);
        assert!(!replicator.replicate(&format!("http://{addr}"), &mutation).await);
    }

    #[tokio::test]
    async fn error_status_is_a_missing_ack() {
        let replicator =
            HttpReplicator::new(Duration::from_millis(500), LatencyInjector::disabled())
                .expect("client");
        let mutation = Mutation::put("foo", json!("bar"), 1);

        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::FORBIDDEN,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::ACCEPTED,
        ] {
            let follower = follower_answering(status).await;
            assert!(
                !replicator.replicate(&follower, &mutation).await,
                "{status} counted as an ack"
            );
        }

        let follower = follower_answering(StatusCode::OK).await;
        assert!(replicator.replicate(&follower, &mutation).await);
    }

    #[tokio::test]
    async fn silent_follower_times_out() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let holder = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        });

        let replicator =
            HttpReplicator::new(Duration::from_millis(200), LatencyInjector::disabled())
                .expect("client");
        let mutation = Mutation::delete("foo", 2);
        let started = std::time::Instant::now();
        assert!(!replicator.replicate(&format!("http://{addr}"), &mutation).await);
        assert!(started.elapsed() < Duration::from_secs(2));

        holder.abort();
    }
}
