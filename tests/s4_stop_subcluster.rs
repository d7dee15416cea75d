//! S4: stop subcluster "sc1" with a 30-second drain timeout (spec §8
//! scenario S4).
//!
//! The shutdown query must carry `timeout=30`; a connection EOF during the
//! shutdown request is benign; success requires the response detail to
//! *contain* `Shutdown message sent to subcluster (sc1)`.

use std::time::Duration;

use vcluster_admin::engine::{Engine, TlsConfig};
use vcluster_admin::model::{ControlAddressFamily, Node, NodeState, Vdb};
use vcluster_admin::ops::stop_nodes;
use vcluster_admin::testing::MockClusterServer;

fn tls() -> TlsConfig {
    TlsConfig::basic("dbadmin", "secret")
}

fn node(name: &str, address: vcluster_admin::model::Host, subcluster: &str, state: NodeState) -> Node {
    Node {
        name: name.into(),
        address,
        subcluster: subcluster.into(),
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

fn compute_node(name: &str, address: vcluster_admin::model::Host, subcluster: &str, state: NodeState) -> Node {
    Node {
        is_compute: true,
        is_primary: false,
        ..node(name, address, subcluster, state)
    }
}

#[tokio::test]
async fn stop_subcluster_succeeds_with_drain_timeout_and_benign_eof() {
    let server = MockClusterServer::start(2).await;
    let h0 = server.host(0);
    let h1 = server.host(1);

    let mut vdb = Vdb::new("db", true, "s3://bucket");
    vdb.insert_node(node("v_db_node0001", h0, "default_subcluster", NodeState::Up));
    vdb.insert_node(node("v_db_node0002", h1, "sc1", NodeState::Up));

    server.mock_health(h0).await;
    server.mock_health(h1).await;
    server
        .mock_nodes(
            h0,
            serde_json::json!([
                { "address": h0.to_string(), "state": "UP" },
                { "address": h1.to_string(), "state": "UP" },
            ]),
        )
        .await;
    server
        .mock_nodes(
            h1,
            serde_json::json!([
                { "address": h0.to_string(), "state": "UP" },
                { "address": h1.to_string(), "state": "UP" },
            ]),
        )
        .await;

    server
        .mount(
            h0,
            wiremock::Mock::given(wiremock::matchers::method("POST"))
                .and(wiremock::matchers::path("/v1/subclusters/sc1/shutdown"))
                .and(wiremock::matchers::query_param("timeout", "30"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "detail": "Shutdown message sent to subcluster (sc1)"
                }))),
        )
        .await;
    server
        .mount(
            h1,
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/node"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "address": h1.to_string(),
                    "state": "DOWN",
                }))),
        )
        .await;

    let client = server.client();
    let engine = Engine::new(client, 64, tls());

    let options = stop_nodes::Options::builder()
        .db_name("db".to_string())
        .subcluster_name("sc1".to_string())
        .vdb(vdb)
        .drain_timeout_secs(30)
        .poll_timeout(Duration::from_secs(5))
        .build();

    let outcome = stop_nodes::run(&engine, options).await.expect("stop subcluster should succeed");
    assert_eq!(outcome.stopped, vec![h1]);
}

#[tokio::test]
async fn stop_subcluster_rejects_unknown_name_before_any_request() {
    let server = MockClusterServer::start(1).await;
    let h0 = server.host(0);

    let mut vdb = Vdb::new("db", true, "s3://bucket");
    vdb.insert_node(node("v_db_node0001", h0, "default_subcluster", NodeState::Up));

    let client = server.client();
    let engine = Engine::new(client, 64, tls());

    let options = stop_nodes::Options::builder()
        .db_name("db".to_string())
        .subcluster_name("does_not_exist".to_string())
        .vdb(vdb)
        .build();

    let err = stop_nodes::run(&engine, options).await.expect_err("unknown subcluster must be rejected");
    assert!(err.cause.is_some());
}

#[tokio::test]
async fn stop_subcluster_signals_compute_nodes_over_nma_and_polls_for_down() {
    let server = MockClusterServer::start(3).await;
    let h0 = server.host(0); // default_subcluster, untouched
    let h1 = server.host(1); // sc1, regular node
    let h2 = server.host(2); // sc1, compute node

    let mut vdb = Vdb::new("db", true, "s3://bucket");
    vdb.insert_node(node("v_db_node0001", h0, "default_subcluster", NodeState::Up));
    vdb.insert_node(node("v_db_node0002", h1, "sc1", NodeState::Up));
    vdb.insert_node(compute_node("v_db_node0003", h2, "sc1", NodeState::Compute));

    let up_list = serde_json::json!([
        { "address": h0.to_string(), "state": "UP" },
        { "address": h1.to_string(), "state": "UP" },
        { "address": h2.to_string(), "state": "COMPUTE" },
    ]);
    for &h in &[h0, h1, h2] {
        server.mock_health(h).await;
        server.mock_nodes(h, up_list.clone()).await;
    }

    server
        .mount(
            h0,
            wiremock::Mock::given(wiremock::matchers::method("POST"))
                .and(wiremock::matchers::path("/v1/subclusters/sc1/shutdown"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "detail": "Shutdown message sent to subcluster (sc1)"
                }))),
        )
        .await;
    server
        .mount(
            h2,
            wiremock::Mock::given(wiremock::matchers::method("POST"))
                .and(wiremock::matchers::path("/vertica-processes/signal"))
                .and(wiremock::matchers::query_param("signal_type", "term"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({}))),
        )
        .await;
    for &h in &[h1, h2] {
        server
            .mount(
                h,
                wiremock::Mock::given(wiremock::matchers::method("GET"))
                    .and(wiremock::matchers::path("/node"))
                    .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "address": h.to_string(),
                        "state": "DOWN",
                    }))),
            )
            .await;
    }

    let client = server.client();
    let engine = Engine::new(client, 64, tls());

    let options = stop_nodes::Options::builder()
        .db_name("db".to_string())
        .subcluster_name("sc1".to_string())
        .vdb(vdb)
        .poll_timeout(Duration::from_secs(5))
        .build();

    let outcome = stop_nodes::run(&engine, options)
        .await
        .expect("stop subcluster with a compute node should succeed");
    assert_eq!(outcome.stopped.len(), 2);
    assert!(outcome.stopped.contains(&h2));
}
