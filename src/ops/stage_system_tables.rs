//! Stage system tables (§4.7): walks a server-supplied table list and stages
//! each one in turn. A timeout on any table stops the whole iteration; an
//! internal error on one table is logged and skipped so later tables still
//! get a chance.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use typed_builder::TypedBuilder;

use crate::client::{AuthMode, HostClient, HostOutcome};
use crate::dispatch::Dispatcher;
use crate::engine::{Engine, Plan};
use crate::error::{OperationError, VerbError, VerbResult};
use crate::model::{ExecutionContext, Host, StagedFile};
use crate::operation::{Operation, PreparedRequests};
use crate::validate::validate_db_name;

const HTTPS_PORT: u16 = 8443;

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    pub initiator: Host,
}

pub struct Outcome {
    pub staged: Vec<StagedFile>,
}

#[derive(Debug, Deserialize)]
struct TableListResponse {
    tables: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StageResponse {
    bytes_written: u64,
}

struct StageAllTables {
    host: Host,
    staged: Vec<StagedFile>,
}

#[async_trait]
impl Operation for StageAllTables {
    fn name(&self) -> &'static str {
        "stage-system-tables"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        Ok(PreparedRequests::new(vec![self.host]))
    }

    async fn execute(
        &mut self,
        _ctx: &mut ExecutionContext,
        _dispatcher: &Dispatcher,
        client: &HostClient,
        auth: &AuthMode,
    ) -> Result<(), OperationError> {
        let tables = match client
            .get::<TableListResponse>(&self.host, HTTPS_PORT, "/v1/system-tables", auth)
            .await
        {
            HostOutcome::Passing(resp) => resp.tables,
            outcome => return Err(super::common::outcome_to_error(outcome)),
        };

        for table in tables {
            let path = format!("/v1/system-tables/stage?table={table}");
            match client.post::<_, StageResponse>(&self.host, HTTPS_PORT, &path, &serde_json::json!({}), auth).await {
                HostOutcome::Passing(resp) => {
                    self.staged.push(StagedFile {
                        table_name: table,
                        host: self.host,
                        bytes_written: resp.bytes_written,
                    });
                }
                HostOutcome::Timeout => {
                    warn!("staging table {table} timed out; stopping system-tables staging");
                    return Err(OperationError::Timeout);
                }
                HostOutcome::Internal(msg) => {
                    warn!("staging table {table} failed with an internal error, skipping: {msg}");
                }
                outcome => {
                    warn!("staging table {table} failed, skipping: {outcome:?}");
                }
            }
        }

        Ok(())
    }

    fn finalize(&mut self, ctx: &mut ExecutionContext) {
        ctx.seal_staged_files(std::mem::take(&mut self.staged));
    }
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = format!("stage system tables for {}", options.db_name);
    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let plan = Plan::new().push(Box::new(StageAllTables {
        host: options.initiator,
        staged: Vec::new(),
    }));

    let outcome = engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(Outcome {
        staged: outcome.ctx.staged_files().cloned().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_file_carries_byte_count() {
        let f = StagedFile {
            table_name: "dc_requests_issued".into(),
            host: "10.0.0.1".parse().unwrap(),
            bytes_written: 4096,
        };
        assert_eq!(f.bytes_written, 4096);
    }
}
