//! Remove subcluster (§4.7): Eon only, metadata change followed by a check.

use serde_json::json;
use typed_builder::TypedBuilder;

use crate::engine::{Engine, Plan};
use crate::error::{VerbError, VerbResult};
use crate::model::{ExecutionContext, Host};
use crate::validate::{validate_db_name, validate_eon_required, validate_hosts_non_empty, validate_identifier};

use super::common::{DetailPost, GetUpNodes, HealthProbe};

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    pub subcluster_name: String,
    pub hosts: Vec<Host>,
    #[builder(default = true)]
    pub eon: bool,
}

pub struct Outcome {
    pub subcluster_name: String,
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = format!("remove subcluster {}", options.subcluster_name);

    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_identifier("subcluster", &options.subcluster_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_eon_required(options.eon).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_hosts_non_empty(&options.hosts).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let plan = Plan::new()
        .push(Box::new(HealthProbe::new(options.hosts.clone())))
        .push(Box::new(GetUpNodes::new(options.hosts.clone())))
        .push(Box::new(
            DetailPost::new(
                "remove-subcluster",
                format!("/v1/subclusters/{}", options.subcluster_name),
                json!({}),
                "Subcluster removed",
            )
            .on_initiator(""),
        ));

    engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(Outcome {
        subcluster_name: options.subcluster_name,
    })
}
