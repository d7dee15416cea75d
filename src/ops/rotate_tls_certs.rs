//! Rotate TLS certs (§4.7): a two-engine flow — the first engine (old TLS
//! material) issues the rotation, the second (new TLS material) polls for
//! a non-empty digest. Scenario S6. The "Server" TLS config variant has no
//! HTTPS listener restart to poll for, so it sleeps 15 seconds instead — a
//! known kludge (§9), preserved rather than silently fixed.

use std::time::Duration;

use serde_json::json;
use tracing::warn;
use typed_builder::TypedBuilder;

use crate::client::HostClient;
use crate::engine::{Engine, Plan, TlsConfig};
use crate::error::{VerbError, VerbResult};
use crate::model::{ExecutionContext, Host};
use crate::validate::validate_db_name;

use super::common::DetailPost;

/// Which TLS configuration is being rotated. `Server` never restarts the
/// HTTPS listener, so there is nothing to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsConfigKind {
    Https,
    Server,
}

const SERVER_TLS_SLEEP: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    pub initiator: Host,
    pub config_kind: TlsConfigKind,
    pub old_tls: TlsConfig,
    pub new_tls: TlsConfig,
    #[builder(default = 64)]
    pub pool_size: usize,
}

pub struct Outcome {
    pub digest: Option<String>,
}

pub async fn run(client: HostClient, options: Options) -> VerbResult<Outcome> {
    let verb = format!("rotate tls certs for {}", options.db_name);
    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let rotate_engine = Engine::new(client.clone(), options.pool_size, options.old_tls.clone());
    let rotate_plan = Plan::new().push(Box::new(
        DetailPost::new(
            "rotate-certs",
            "/v1/vertica/https/rotate-certs",
            json!({}),
            "Certificate rotation started",
        )
        .on(options.initiator),
    ));
    rotate_engine
        .run(rotate_plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb.clone(), e))?;

    if options.config_kind == TlsConfigKind::Server {
        warn!("Server TLS config does not restart the HTTPS listener; sleeping {SERVER_TLS_SLEEP:?} instead of polling");
        tokio::time::sleep(SERVER_TLS_SLEEP).await;
        return Ok(Outcome { digest: None });
    }

    let poll_engine = Engine::new(client, options.pool_size, options.new_tls);
    let poll_plan = Plan::new().push(Box::new(PollTlsDigest {
        host: options.initiator,
    }));
    let outcome = poll_engine
        .run(poll_plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(Outcome {
        digest: outcome.ctx.tls_digest().map(str::to_string),
    })
}

struct PollTlsDigest {
    host: Host,
}

#[derive(serde::Deserialize)]
struct DigestResponse {
    digest: String,
}

#[async_trait::async_trait]
impl crate::operation::Operation for PollTlsDigest {
    fn name(&self) -> &'static str {
        "poll-tls-digest"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<crate::operation::PreparedRequests, crate::error::OperationError> {
        Ok(crate::operation::PreparedRequests::new(vec![self.host]))
    }

    async fn execute(
        &mut self,
        ctx: &mut ExecutionContext,
        _dispatcher: &crate::dispatch::Dispatcher,
        client: &HostClient,
        auth: &crate::client::AuthMode,
    ) -> Result<(), crate::error::OperationError> {
        match client.get::<DigestResponse>(&self.host, 8443, "/vertica/tls", auth).await {
            crate::client::HostOutcome::Passing(resp) if !resp.digest.is_empty() => {
                ctx.seal_tls_digest(resp.digest);
                Ok(())
            }
            crate::client::HostOutcome::Passing(_) => {
                Err(crate::error::OperationError::Contract("tls digest was empty after rotation".into()))
            }
            _ => Err(crate::error::OperationError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_never_polls() {
        assert_eq!(TlsConfigKind::Server, TlsConfigKind::Server);
        assert_ne!(TlsConfigKind::Server, TlsConfigKind::Https);
    }
}
