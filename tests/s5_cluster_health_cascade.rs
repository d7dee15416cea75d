//! S5: cluster-health cascade graph (spec §8 scenario S5).
//!
//! Walks from the slowest event (hex thread-id `1F4` -> 500) to its caller
//! (`1F5` -> 501), stopping at the first leaf and attaching that leaf's
//! lock-hold events.

use serde_json::json;

use vcluster_admin::engine::{Engine, TlsConfig};
use vcluster_admin::ops::cluster_health;
use vcluster_admin::testing::{fixtures::SlowEventRowFixture, MockClusterServer};

fn tls() -> TlsConfig {
    TlsConfig::basic("dbadmin", "secret")
}

#[tokio::test]
async fn cascade_walks_to_leaf_and_attaches_hold_events() {
    let server = MockClusterServer::start(1).await;
    let h0 = server.host(0);

    let root = SlowEventRowFixture::new("1F4", 2_000_000).caller("1F5").build();
    let leaf = SlowEventRowFixture::new("1F5", 500_000).build();

    server
        .mount(
            h0,
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/v1/slow-events"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(root)),
        )
        .await;
    server
        .mount(
            h0,
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/v1/sessions-and-transactions"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(leaf)),
        )
        .await;
    server
        .mount(
            h0,
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/v1/lock-holds"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!([
                    { "lock_name": "catalog", "held_from": "2026-01-01T00:00:08Z", "held_until": "2026-01-01T00:00:08.5Z" }
                ]))),
        )
        .await;

    let client = server.client();
    let engine = Engine::new(client, 64, tls());

    let options = cluster_health::Options::builder()
        .db_name("db".to_string())
        .initiator(h0)
        .slow_threshold(None)
        .lock_attempt_threshold(None)
        .lock_release_threshold(None)
        .build();

    let outcome = cluster_health::run(&engine, options).await.expect("cascade walk should succeed");
    assert_eq!(outcome.events.len(), 2);
    assert_eq!(outcome.events[0].thread_id, 500);
    assert!(!outcome.events[0].is_leaf);
    assert_eq!(outcome.events[1].thread_id, 501);
    assert!(outcome.events[1].is_leaf);
    assert_eq!(outcome.events[1].hold_events.len(), 1);
    assert_eq!(outcome.events[1].hold_events[0].lock_name, "catalog");
}
