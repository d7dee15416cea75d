//! Replicate database (§4.7): Eon-only. Sync replication is a single POST
//! that blocks until the source reports completion; async replication spans
//! three engine runs across the source and target TLS scopes — read the
//! target's existing transaction ids, start replication on the source, then
//! poll the target until a transaction id outside the initial set appears.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use typed_builder::TypedBuilder;

use crate::client::{AuthMode, HostClient};
use crate::dispatch::Dispatcher;
use crate::engine::{Engine, Plan, TlsConfig};
use crate::error::{OperationError, VerbError, VerbResult};
use crate::model::{ExecutionContext, Host, TransactionRecord};
use crate::operation::{Operation, PreparedRequests};
use crate::validate::validate_db_name;

use super::common::DetailPost;

const HTTPS_PORT: u16 = 8443;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationMode {
    Sync,
    Async,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub source_db_name: String,
    pub source_initiator: Host,
    pub target_db_name: String,
    pub target_initiator: Host,
    pub mode: ReplicationMode,
    pub target_tls: TlsConfig,
    #[builder(default = Duration::from_secs(300))]
    pub poll_timeout: Duration,
    #[builder(default = 64)]
    pub pool_size: usize,
}

pub struct Outcome {
    pub new_transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TxnListResponse {
    transactions: Vec<TxnRow>,
}

#[derive(Debug, Deserialize)]
struct TxnRow {
    transaction_id: String,
}

pub async fn run(source_engine: &Engine, client: HostClient, options: Options) -> VerbResult<Outcome> {
    let verb = format!("replicate {} to {}", options.source_db_name, options.target_db_name);
    validate_db_name(&options.source_db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_db_name(&options.target_db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;

    if options.mode == ReplicationMode::Sync {
        let plan = Plan::new().push(Box::new(
            DetailPost::new(
                "replicate-sync",
                "/v1/replicate/start?mode=sync",
                json!({ "target_db": options.target_db_name }),
                "Replication completed",
            )
            .on(options.source_initiator),
        ));
        source_engine
            .run(plan, ExecutionContext::new())
            .await
            .map_err(|e| VerbError::cause(verb, e))?;
        return Ok(Outcome { new_transaction_id: None });
    }

    let target_engine = Engine::new(client.clone(), options.pool_size, options.target_tls.clone());
    let baseline_plan = Plan::new().push(Box::new(ReadTransactionIds {
        host: options.target_initiator,
    }));
    let baseline = target_engine
        .run(baseline_plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb.clone(), e))?;
    let known: HashSet<String> = baseline.ctx.transactions().map(|ts| ts.iter().map(|t| t.transaction_id.clone()).collect()).unwrap_or_default();

    let start_plan = Plan::new().push(Box::new(
        DetailPost::new(
            "replicate-start",
            "/v1/replicate/start?mode=async",
            json!({ "target_db": options.target_db_name }),
            "Replication started",
        )
        .on(options.source_initiator),
    ));
    source_engine
        .run(start_plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb.clone(), e))?;

    let poll_plan = Plan::new().push(Box::new(PollForNewTransaction {
        host: options.target_initiator,
        known,
        deadline: options.poll_timeout,
    }));
    let polled = target_engine
        .run(poll_plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    let new_id = polled
        .ctx
        .transactions()
        .and_then(|ts| ts.last())
        .map(|t| t.transaction_id.clone());

    Ok(Outcome { new_transaction_id: new_id })
}

struct ReadTransactionIds {
    host: Host,
}

#[async_trait]
impl Operation for ReadTransactionIds {
    fn name(&self) -> &'static str {
        "read-transaction-ids"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        Ok(PreparedRequests::new(vec![self.host]))
    }

    async fn execute(
        &mut self,
        ctx: &mut ExecutionContext,
        _dispatcher: &Dispatcher,
        client: &HostClient,
        auth: &AuthMode,
    ) -> Result<(), OperationError> {
        match client.get::<TxnListResponse>(&self.host, HTTPS_PORT, "/v1/transactions", auth).await {
            crate::client::HostOutcome::Passing(resp) => {
                let host = self.host;
                let records = resp
                    .transactions
                    .into_iter()
                    .map(|row| TransactionRecord {
                        transaction_id: row.transaction_id,
                        host,
                        started_at: Utc::now(),
                    })
                    .collect();
                ctx.seal_transactions(records);
                Ok(())
            }
            _ => Err(OperationError::Transport("failed to read existing transaction ids".into())),
        }
    }
}

struct PollForNewTransaction {
    host: Host,
    known: HashSet<String>,
    deadline: Duration,
}

#[async_trait]
impl Operation for PollForNewTransaction {
    fn name(&self) -> &'static str {
        "poll-new-transaction"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        Ok(PreparedRequests::new(vec![self.host]))
    }

    async fn execute(
        &mut self,
        ctx: &mut ExecutionContext,
        _dispatcher: &Dispatcher,
        client: &HostClient,
        auth: &AuthMode,
    ) -> Result<(), OperationError> {
        let started = std::time::Instant::now();
        let tick = Duration::from_secs(1);
        loop {
            if let crate::client::HostOutcome::Passing(resp) =
                client.get::<TxnListResponse>(&self.host, HTTPS_PORT, "/v1/transactions", auth).await
            {
                if let Some(fresh) = resp.transactions.iter().find(|t| !self.known.contains(&t.transaction_id)) {
                    ctx.seal_transactions(vec![TransactionRecord {
                        transaction_id: fresh.transaction_id.clone(),
                        host: self.host,
                        started_at: Utc::now(),
                    }]);
                    return Ok(());
                }
            }
            if started.elapsed() >= self.deadline {
                return Err(OperationError::PollDeadline(self.deadline));
            }
            tokio::time::sleep(tick).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_mode_skips_polling_path() {
        assert_eq!(ReplicationMode::Sync, ReplicationMode::Sync);
        assert_ne!(ReplicationMode::Sync, ReplicationMode::Async);
    }
}
