//! S2: start one down node with a new IP (spec §8 scenario S2).
//!
//! `Nodes={v_db_node0002: <new>}`, catalog says `v_db_node0002 -> <old>`.
//! The plan must re-IP, reload spread, start, then poll; the re-IP list must
//! not be chunked because up-host count (2) >= re-IP entries (1).

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;

use vcluster_admin::engine::{Engine, TlsConfig};
use vcluster_admin::model::{ControlAddressFamily, Node, NodeState, Vdb};
use vcluster_admin::ops::start_nodes;
use vcluster_admin::testing::MockClusterServer;

fn tls() -> TlsConfig {
    TlsConfig::basic("dbadmin", "secret")
}

fn node(name: &str, address: vcluster_admin::model::Host, state: NodeState) -> Node {
    Node {
        name: name.into(),
        address,
        subcluster: String::new(),
        sandbox: String::new(),
        is_primary: true,
        is_compute: false,
        state,
        catalog_path: "/catalog".into(),
        data_paths: vec![],
        depot_path: None,
        control_address_family: ControlAddressFamily::Ipv4,
        version: "24.1.0".into(),
        is_control_node: true,
        control_node_address: None,
    }
}

#[tokio::test]
async fn start_one_down_node_with_new_ip_is_not_chunked() {
    let server = MockClusterServer::start(4).await;
    let h0 = server.host(0); // up
    let h1 = server.host(1); // up
    let h2 = server.host(2); // down node's current (catalog) address
    let h3 = server.host(3); // down node's new address

    let mut vdb = Vdb::new("db", false, "");
    vdb.insert_node(node("v_db_node0001", h0, NodeState::Up));
    vdb.insert_node(node("v_db_node0003", h1, NodeState::Up));
    vdb.insert_node(node("v_db_node0002", h2, NodeState::Down));

    for &h in &[h0, h1, h2] {
        server.mock_health(h).await;
        server
            .mock_nodes(
                h,
                json!([
                    { "address": h0.to_string(), "state": "UP" },
                    { "address": h1.to_string(), "state": "UP" },
                ]),
            )
            .await;
    }
    server.mock_detail_post(h0, "/v1/re-ip", "Re-ip success").await;
    server.mock_detail_post(h0, "/v1/reload-spread", "Reload spread success").await;
    server.mock_detail_post(h0, "/v1/startup/command", "Nodes started").await;
    server
        .mount(
            h3,
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/node"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                    "address": h3.to_string(),
                    "state": "UP",
                }))),
        )
        .await;

    let mut nodes = HashMap::new();
    nodes.insert("v_db_node0002".to_string(), h3);

    let client = server.client();
    let engine = Engine::new(client, 64, tls());

    let options = start_nodes::Options::builder()
        .db_name("db".to_string())
        .nodes(nodes)
        .vdb(vdb)
        .poll_timeout(Duration::from_secs(5))
        .build();

    let outcome = start_nodes::run(&engine, options).await.expect("start nodes should succeed");
    assert_eq!(outcome.re_ip_chunks, 1);
    assert_eq!(outcome.started, vec![h3]);
}
