use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{ensure, Result};
use clap::Parser;

use crate::dispatcher::LatencyInjector;
use crate::node::Role;

/// Largest replication delay that can be injected, in milliseconds.
pub const MAX_INJECTED_DELAY_MS: f64 = 60_000.0;

/// Process configuration. Every option can also be set through the
/// environment variable named next to it.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Run a leader or follower of the quorum-replicated key-value store"
)]
pub struct Config {
    /// Whether this node accepts writes (leader) or only replicated mutations (follower).
    #[arg(long, env = "ROLE", value_enum, ignore_case = true, default_value_t = Role::Follower)]
    pub role: Role,

    /// Address to bind the HTTP server to.
    #[arg(long, env = "LISTEN_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on. Use 0 for an ephemeral port.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Comma-separated follower base URLs, e.g. http://follower-1:8080 (leader only).
    #[arg(long = "follower", env = "FOLLOWER_URLS", value_delimiter = ',')]
    pub followers: Vec<String>,

    /// Follower acknowledgements required before a write is reported successful.
    #[arg(long, env = "WRITE_QUORUM", default_value_t = 1)]
    pub write_quorum: usize,

    /// Lower bound of the random delay injected before each replication call.
    #[arg(long, env = "MIN_DELAY_MS", default_value_t = 0.0)]
    pub min_delay_ms: f64,

    /// Upper bound of the injected delay, at most 60000; 0 disables injection.
    #[arg(long, env = "MAX_DELAY_MS", default_value_t = 0.0)]
    pub max_delay_ms: f64,

    /// Timeout for a single replication call.
    #[arg(long, env = "REPLICATION_TIMEOUT_MS", default_value_t = 2000)]
    pub replication_timeout_ms: u64,

    /// Replication calls allowed in flight at once across all writes.
    #[arg(long, env = "REPLICATION_CONCURRENCY", default_value_t = 32)]
    pub replication_concurrency: usize,

    /// Inbound requests handled at once; the rest wait for a slot.
    #[arg(long, env = "MAX_INFLIGHT_REQUESTS", default_value_t = 50)]
    pub max_inflight_requests: usize,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.write_quorum >= 1, "write quorum must be at least 1");
        ensure!(
            self.min_delay_ms.is_finite() && self.min_delay_ms >= 0.0,
            "min delay must be a non-negative number of milliseconds"
        );
        ensure!(
            self.max_delay_ms.is_finite() && self.max_delay_ms >= 0.0,
            "max delay must be a non-negative number of milliseconds"
        );
        ensure!(
            self.max_delay_ms <= MAX_INJECTED_DELAY_MS,
            "max delay ({}ms) exceeds the {}ms limit",
            self.max_delay_ms,
            MAX_INJECTED_DELAY_MS
        );
        ensure!(
            self.min_delay_ms <= self.max_delay_ms,
            "min delay ({}ms) exceeds max delay ({}ms)",
            self.min_delay_ms,
            self.max_delay_ms
        );
        ensure!(self.replication_timeout_ms > 0, "replication timeout must be positive");
        ensure!(
            self.replication_concurrency >= 1,
            "replication concurrency must be at least 1"
        );
        ensure!(
            self.max_inflight_requests >= 1,
            "max inflight requests must be at least 1"
        );
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Follower URLs with surrounding whitespace and blank entries removed.
    pub fn followers(&self) -> Vec<String> {
        self.followers
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn latency(&self) -> LatencyInjector {
        LatencyInjector::uniform(
            Duration::from_secs_f64(self.min_delay_ms / 1000.0),
            Duration::from_secs_f64(self.max_delay_ms / 1000.0),
        )
    }

    pub fn replication_timeout(&self) -> Duration {
        Duration::from_millis(self.replication_timeout_ms)
    }
}
