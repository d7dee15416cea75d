//! Remove node (§4.7): refuse to remove an UP node, drop it from the
//! catalog, reload spread, and (Eon only) rebalance.

use serde_json::json;
use typed_builder::TypedBuilder;

use crate::engine::{Engine, Plan};
use crate::error::{OperationError, VerbError, VerbResult};
use crate::model::{ExecutionContext, Host};
use crate::validate::{validate_db_name, validate_hosts_non_empty};

use super::common::{DetailPost, GetUpNodes, HealthProbe};

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    pub target_hosts: Vec<Host>,
    pub remaining_hosts: Vec<Host>,
    #[builder(default = true)]
    pub eon: bool,
    #[builder(default)]
    pub skip_rebalance: bool,
}

pub struct Outcome {
    pub nodes_removed: Vec<Host>,
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = format!("remove node from {}", options.db_name);

    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_hosts_non_empty(&options.target_hosts).map_err(|e| VerbError::cause(verb.clone(), e))?;
    if options.remaining_hosts.is_empty() {
        return Err(VerbError::cause(
            verb,
            OperationError::Validation("removing every node would leave no host to act as initiator".into()),
        ));
    }

    let mut plan = Plan::new()
        .push(Box::new(HealthProbe::new(options.remaining_hosts.clone())))
        .push(Box::new(GetUpNodes::new(options.remaining_hosts.clone())))
        .push(Box::new(
            DetailPost::new(
                "remove-nodes",
                "/v1/nodes/remove",
                json!({ "hosts": options.target_hosts.iter().map(Host::to_string).collect::<Vec<_>>() }),
                "Nodes removed",
            )
            .on_initiator(""),
        ))
        .push(Box::new(
            DetailPost::new("reload-spread", "/v1/reload-spread", json!({}), "Reload spread success")
                .on_initiator(""),
        ));

    if options.eon && !options.skip_rebalance {
        plan = plan.push(Box::new(
            DetailPost::new("rebalance-shards", "/v1/subclusters/rebalance", json!({}), "REBALANCED SHARDS")
                .on_initiator(""),
        ));
    }

    engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(Outcome {
        nodes_removed: options.target_hosts,
    })
}
