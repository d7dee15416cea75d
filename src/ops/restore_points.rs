//! Restore points (§4.7): save a named, indexed restore point and list the
//! ones a database currently has.

use async_trait::async_trait;
use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::client::{AuthMode, HostClient};
use crate::dispatch::Dispatcher;
use crate::engine::{Engine, Plan};
use crate::error::{OperationError, VerbError, VerbResult};
use crate::model::{ExecutionContext, Host, RestorePoint};
use crate::operation::{Operation, PreparedRequests};
use crate::validate::{validate_db_name, validate_identifier};

use super::common::DetailPost;

const HTTPS_PORT: u16 = 8443;

#[derive(Debug, Clone, TypedBuilder)]
pub struct SaveOptions {
    pub db_name: String,
    pub archive: String,
    pub initiator: Host,
}

pub struct SaveOutcome {
    pub archive: String,
}

pub async fn save(engine: &Engine, options: SaveOptions) -> VerbResult<SaveOutcome> {
    let verb = format!("save restore point for {}", options.db_name);
    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_identifier("archive", &options.archive).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let plan = Plan::new().push(Box::new(
        DetailPost::new(
            "save-restore-point",
            "/v1/dbs/restore-points",
            serde_json::json!({ "archive": options.archive }),
            "Restore point saved",
        )
        .on(options.initiator),
    ));

    engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(SaveOutcome { archive: options.archive })
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShowOptions {
    pub db_name: String,
    pub initiator: Host,
    #[builder(default)]
    pub archive_filter: Option<String>,
}

pub struct ShowOutcome {
    pub restore_points: Vec<RestorePoint>,
}

#[derive(Debug, Deserialize)]
struct RestorePointRow {
    archive: String,
    index: u32,
    timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct RestorePointsResponse {
    restore_points: Vec<RestorePointRow>,
}

struct ListRestorePoints {
    host: Host,
    archive_filter: Option<String>,
}

#[async_trait]
impl Operation for ListRestorePoints {
    fn name(&self) -> &'static str {
        "list-restore-points"
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
        let path = match &self.archive_filter {
            Some(archive) => format!("/v1/dbs/restore-points?archive={archive}"),
            None => "/v1/dbs/restore-points".to_string(),
        };
        match client.get::<RestorePointsResponse>(&self.host, HTTPS_PORT, &path, auth).await {
            crate::client::HostOutcome::Passing(resp) => {
                let points = resp
                    .restore_points
                    .into_iter()
                    .map(|row| RestorePoint {
                        archive: row.archive,
                        index: row.index,
                        timestamp: row.timestamp,
                    })
                    .collect();
                ctx.seal_restore_points(points);
                Ok(())
            }
            outcome => Err(super::common::outcome_to_error(outcome)),
        }
    }
}

pub async fn show(engine: &Engine, options: ShowOptions) -> VerbResult<ShowOutcome> {
    let verb = format!("show restore points for {}", options.db_name);
    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let plan = Plan::new().push(Box::new(ListRestorePoints {
        host: options.initiator,
        archive_filter: options.archive_filter,
    }));

    let outcome = engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(ShowOutcome {
        restore_points: outcome.ctx.restore_points().cloned().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_options_requires_well_formed_archive() {
        assert!(validate_identifier("archive", "nightly_backup").is_ok());
        assert!(validate_identifier("archive", "").is_err());
    }
}
