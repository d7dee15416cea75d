//! Testing utilities for vcluster-admin-driven applications.
//!
//! This module provides a testing harness for code that uses this crate's
//! [`crate::engine`]/[`crate::ops`] API:
//!
//! - **Mock cluster**: [`MockClusterServer`] stands one `wiremock` instance
//!   in per logical cluster host, reachable through [`crate::client::HostClient`]
//!   the same way a real NMA/HTTPS endpoint would be.
//! - **Fixtures**: builder-pattern helpers for the JSON shapes the cluster's
//!   endpoints return.
//! - **Response helpers**: convenience functions for common HTTP responses.
//!
//! # Feature Flag
//!
//! This module is only available when the `test-support` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! vcluster-admin = { version = "0.1", features = ["test-support"] }
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use vcluster_admin::testing::{MockClusterServer, fixtures};
//!
//! #[tokio::test]
//! async fn test_add_subcluster() {
//!     let server = MockClusterServer::start(2).await;
//!     for &host in server.hosts() {
//!         server.mock_health(host).await;
//!     }
//!     server.mock_detail_post(server.host(0), "/v1/subclusters", "Subcluster added").await;
//!
//!     let client = server.client();
//!     // build an Engine from `client` and drive ops::add_subcluster::run
//! }
//! ```

pub mod fixtures;
pub mod responses;
pub mod server;

pub use server::MockClusterServer;

pub use wiremock::{
    matchers::{body_json, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};
