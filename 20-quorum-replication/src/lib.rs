//! Leader/follower key-value store with quorum-acknowledged replication.
//!
//! One node is the leader: it accepts writes and deletes, stamps each with a
//! version from a single global counter, commits it locally, and then fans it
//! out to every follower at once. The client gets its answer as soon as
//! `write_quorum` followers have acknowledged; slower followers keep
//! receiving the mutation in the background. Followers merge whatever
//! arrives by last-writer-wins on the version, so delivery order does not
//! matter and all nodes converge.
//!
//! This is eventual consistency, not linearizability: a write that misses
//! its quorum is reported as failed but stays committed on the leader, and
//! reads are served from whichever node receives them.
//!
//! # Modules
//!
//! - [`store`]: versioned map with the last-writer-wins merge
//! - [`version`]: global version allocator
//! - [`mutation`]: the versioned put/delete that gets replicated
//! - [`quorum`]: runtime-adjustable write quorum
//! - [`dispatcher`]: one mutation to one follower, over HTTP
//! - [`coordinator`]: first-N-of-M fan-out
//! - [`node`]: leader write/delete path and follower apply path
//! - [`error`]: failure taxonomy and its HTTP mapping
//! - [`message`]: JSON bodies
//! - [`api`], [`server`]: axum routes and the listener around them
//! - [`cli`]: process configuration

pub mod api;
pub mod cli;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod mutation;
pub mod node;
pub mod quorum;
pub mod server;
pub mod store;
pub mod version;
