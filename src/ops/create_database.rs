//! Create database (§1, §4.7): bootstrap a fresh cluster catalog.

use serde_json::json;
use typed_builder::TypedBuilder;

use crate::engine::{Engine, Plan};
use crate::error::{VerbError, VerbResult};
use crate::model::{ExecutionContext, Host};
use crate::validate::{validate_db_name, validate_hosts_non_empty};

use super::common::{DetailPost, HealthProbe};

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    pub hosts: Vec<Host>,
    #[builder(default)]
    pub eon: bool,
    #[builder(default)]
    pub communal_storage_location: String,
    #[builder(default = "/vertica".to_string())]
    pub catalog_prefix: String,
    #[builder(default = "/vertica".to_string())]
    pub data_prefix: String,
}

pub struct Outcome {
    pub db_name: String,
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = format!("create database {}", options.db_name);

    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_hosts_non_empty(&options.hosts).map_err(|e| VerbError::cause(verb.clone(), e))?;
    if options.eon && options.communal_storage_location.is_empty() {
        return Err(VerbError::cause(
            verb,
            crate::error::OperationError::Validation("Eon-mode database requires a communal storage location".into()),
        ));
    }

    let initiator = options.hosts[0];

    let plan = Plan::new().push(Box::new(HealthProbe::new(options.hosts.clone()))).push(Box::new(
        DetailPost::new(
            "bootstrap-database",
            "/v1/cluster",
            json!({
                "db_name": options.db_name,
                "hosts": options.hosts.iter().map(Host::to_string).collect::<Vec<_>>(),
                "eon_mode": options.eon,
                "communal_storage_location": options.communal_storage_location,
                "catalog_prefix": options.catalog_prefix,
                "data_prefix": options.data_prefix,
            }),
            "Database created",
        )
        .on(initiator),
    ));

    engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(Outcome { db_name: options.db_name })
}
