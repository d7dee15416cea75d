//! Mock cluster server for testing vcluster-admin consumers.
//!
//! # Example
//!
//! ```ignore
//! use vcluster_admin::testing::MockClusterServer;
//!
//! #[tokio::test]
//! async fn test_my_app() {
//!     let mut server = MockClusterServer::start(3).await;
//!     let host = server.host(0);
//!     server.mock_health(host).await;
//!
//!     let client = server.client();
//!     // drive an ops::* verb against `client` and `server.hosts()`
//! }
//! ```

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{HostClient, HostClientBuilder};
use crate::model::Host;

const NMA_PORT: u16 = 5554;
const HTTPS_PORT: u16 = 8443;

/// One `wiremock` instance standing in for a single cluster host, reachable
/// at both its mock NMA and HTTPS "ports" via [`HostClient::route_override`].
pub struct MockClusterServer {
    hosts: Vec<Host>,
    servers: HashMap<Host, MockServer>,
}

impl MockClusterServer {
    /// Start `count` independent mock servers, one per logical cluster host,
    /// addressed as `127.0.0.<n+1>` for readability in test output.
    pub async fn start(count: u8) -> Self {
        let mut hosts = Vec::with_capacity(count as usize);
        let mut servers = HashMap::with_capacity(count as usize);
        for n in 0..count {
            let host = Host::from(IpAddr::V4(Ipv4Addr::new(127, 0, 0, n as u32 + 1)));
            servers.insert(host, MockServer::start().await);
            hosts.push(host);
        }
        Self { hosts, servers }
    }

    pub fn host(&self, index: usize) -> Host {
        self.hosts[index]
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    fn server(&self, host: Host) -> &MockServer {
        self.servers.get(&host).expect("unknown mock host")
    }

    /// Build a [`HostClient`] with every mock host's NMA/HTTPS traffic
    /// routed to its `wiremock` instance.
    pub fn client(&self) -> HostClient {
        let mut builder = HostClientBuilder::new().insecure(true);
        for &host in &self.hosts {
            let uri = self.server(host).uri();
            builder = builder.route_override(host, uri);
        }
        builder.build().expect("failed to build test client")
    }

    /// Mock a passing NMA health check (§4.4 "Health probe").
    pub async fn mock_health(&self, host: Host) {
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "health": "ok" })))
            .mount(self.server(host))
            .await;
    }

    /// Mock an unreachable NMA health check.
    pub async fn mock_health_unreachable(&self, host: Host) {
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(self.server(host))
            .await;
    }

    /// Mock GET `/v1/nodes` (up-host discovery, §4.4).
    pub async fn mock_nodes(&self, host: Host, node_list: Value) {
        Mock::given(method("GET"))
            .and(path("/v1/nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "node_list": node_list })))
            .mount(self.server(host))
            .await;
    }

    /// Mock a `{"detail": "..."}` success contract POST at `path_str`.
    pub async fn mock_detail_post(&self, host: Host, path_str: &str, detail: &str) {
        Mock::given(method("POST"))
            .and(path(path_str))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "detail": detail })))
            .mount(self.server(host))
            .await;
    }

    /// Mock any GET request matching `path_pattern` to return 500.
    pub async fn mock_server_error(&self, host: Host, path_pattern: &str, message: &str) {
        Mock::given(method("GET"))
            .and(path_regex(path_pattern))
            .respond_with(super::responses::server_error(message))
            .mount(self.server(host))
            .await;
    }

    /// Mount a custom mock on a specific host's server.
    pub async fn mount(&self, host: Host, mock: Mock) {
        mock.mount(self.server(host)).await;
    }

    /// Get a reference to a specific host's underlying `MockServer`.
    pub fn inner(&self, host: Host) -> &MockServer {
        self.server(host)
    }

    pub const fn nma_port() -> u16 {
        NMA_PORT
    }

    pub const fn https_port() -> u16 {
        HTTPS_PORT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AuthMode;

    #[tokio::test]
    async fn starts_one_server_per_host() {
        let server = MockClusterServer::start(3).await;
        assert_eq!(server.hosts().len(), 3);
    }

    #[tokio::test]
    async fn health_probe_roundtrip() {
        let server = MockClusterServer::start(1).await;
        let host = server.host(0);
        server.mock_health(host).await;

        let client = server.client();
        let auth = AuthMode::Basic {
            username: "dbadmin".into(),
            password: "secret".into(),
        };
        let outcome = client
            .get::<Value>(&host, MockClusterServer::nma_port(), "/v1/health", &auth)
            .await;
        assert!(matches!(outcome, crate::client::HostOutcome::Passing(_)));
    }
}
