//! vcluster-admin
//!
//! A client library for orchestrating administrative operations against an
//! MPP analytical database cluster over its NMA (node-management agent) and
//! HTTPS control-plane ports. It models each administrative verb — add a
//! node, start a subcluster, rotate TLS certs, replicate a database, and so
//! on — as an ordered [`engine::Plan`] of [`operation::Operation`] steps run
//! by an [`engine::Engine`] against a bounded worker pool.
//!
//! # Architecture
//!
//! - [`client`]: a thin per-host HTTP client ([`client::HostClient`]) that
//!   classifies every response into a closed [`client::HostOutcome`].
//! - [`dispatch`]: bounded-concurrency fan-out across hosts
//!   ([`dispatch::Dispatcher`]), with cooperative cancellation.
//! - [`model`]: the in-memory cluster snapshot ([`model::Vdb`]) and the
//!   single-writer [`model::ExecutionContext`] scratchpad shared across one
//!   plan's steps.
//! - [`operation`]: the `prepare`/`execute`/`finalize` lifecycle every verb
//!   step implements, plus initiator selection and quorum checks.
//! - [`engine`]: runs a [`engine::Plan`] under one TLS/auth configuration,
//!   short-circuiting on the first fatal error.
//! - [`ops`]: one module per public verb, each exposing a typed `Options`
//!   builder and a `run` entry point that assembles and runs a plan.
//! - [`error`]: the typed error taxonomy every layer maps into.
//! - [`config`]: engine-wide tunables (worker pool size, poll timeouts,
//!   threshold overrides), loadable from the environment.
//! - [`validate`]: shared option-validation helpers used by every `ops::*`
//!   module before it builds a plan.
//!
//! # Quick Start
//!
//! ```no_run
//! use vcluster_admin::client::HostClient;
//! use vcluster_admin::engine::{Engine, TlsConfig};
//! use vcluster_admin::ops::add_subcluster;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HostClient::builder().build()?;
//! let tls = TlsConfig::basic("dbadmin", "secret");
//! let engine = Engine::new(client, 64, tls);
//!
//! let options = add_subcluster::Options::builder()
//!     .db_name("analytics".to_string())
//!     .subcluster_name("sc1".to_string())
//!     .hosts(vec!["10.0.0.11".parse()?, "10.0.0.12".parse()?])
//!     .build();
//!
//! let outcome = add_subcluster::run(&engine, options).await?;
//! println!("added subcluster {}", outcome.subcluster_name);
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! [`config::EngineConfig::from_env`] reads:
//! - `VCLUSTER_SLOW_EVENT_THRESHOLD_MS`, `VCLUSTER_LOCK_ATTEMPT_THRESHOLD_MS`,
//!   `VCLUSTER_LOCK_RELEASE_THRESHOLD_MS`: millisecond overrides for the
//!   cluster-health cascade's filtering thresholds.
//! - `NODE_STATE_POLLING_TIMEOUT`: seconds to wait for a node to reach its
//!   target state before an operation fails with `PollDeadline`.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod operation;
pub mod ops;
pub mod validate;

#[cfg(feature = "test-support")]
pub mod testing;

pub use client::{AuthMode, HostClient, HostClientBuilder, HostOutcome, ServerVerify};
pub use config::EngineConfig;
pub use dispatch::{CancelToken, Dispatcher};
pub use engine::{Engine, EngineOutcome, Plan, TlsConfig};
pub use error::{HostError, OperationError, Result, VerbError, VerbResult};
pub use model::{ExecutionContext, Host, Node, NodeState, Vdb};
pub use operation::Operation;
