//! S6: rotate TLS certificates across two engine runs — one under the old
//! material to kick off rotation, one under the new material to poll for a
//! fresh digest (spec §8 scenario S6). The `Server` TLS config variant has
//! no listener restart to poll for and sleeps instead.

use serde_json::json;

use vcluster_admin::engine::TlsConfig;
use vcluster_admin::ops::rotate_tls_certs;
use vcluster_admin::ops::rotate_tls_certs::{Options, TlsConfigKind};
use vcluster_admin::testing::MockClusterServer;

#[tokio::test]
async fn https_rotation_polls_for_new_digest() {
    let server = MockClusterServer::start(1).await;
    let h0 = server.host(0);

    server
        .mount(
            h0,
            wiremock::Mock::given(wiremock::matchers::method("POST"))
                .and(wiremock::matchers::path("/v1/vertica/https/rotate-certs"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                    "detail": "Certificate rotation started"
                }))),
        )
        .await;
    server
        .mount(
            h0,
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/vertica/tls"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                    "digest": "sha256:abc123"
                }))),
        )
        .await;

    let client = server.client();

    let options = Options::builder()
        .db_name("db".to_string())
        .initiator(h0)
        .config_kind(TlsConfigKind::Https)
        .old_tls(TlsConfig::basic("dbadmin", "old-secret"))
        .new_tls(TlsConfig::basic("dbadmin", "new-secret"))
        .build();

    let outcome = rotate_tls_certs::run(client, options).await.expect("rotation should succeed");
    assert_eq!(outcome.digest.as_deref(), Some("sha256:abc123"));
}

#[tokio::test(start_paused = true)]
async fn server_tls_rotation_sleeps_instead_of_polling() {
    let server = MockClusterServer::start(1).await;
    let h0 = server.host(0);

    server
        .mount(
            h0,
            wiremock::Mock::given(wiremock::matchers::method("POST"))
                .and(wiremock::matchers::path("/v1/vertica/https/rotate-certs"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                    "detail": "Certificate rotation started"
                }))),
        )
        .await;

    let client = server.client();

    let options = Options::builder()
        .db_name("db".to_string())
        .initiator(h0)
        .config_kind(TlsConfigKind::Server)
        .old_tls(TlsConfig::basic("dbadmin", "old-secret"))
        .new_tls(TlsConfig::basic("dbadmin", "new-secret"))
        .build();

    let outcome = rotate_tls_certs::run(client, options).await.expect("server-config rotation should succeed");
    assert_eq!(outcome.digest, None);
}
