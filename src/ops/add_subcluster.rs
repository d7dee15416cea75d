//! Add subcluster (§4.7): Eon only, metadata change followed by a check.
//! Scenario S1.

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

fn verb_name(options: &Options) -> String {
    format!("add subcluster {}", options.subcluster_name)
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = verb_name(&options);

    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_identifier("subcluster", &options.subcluster_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_eon_required(options.eon).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_hosts_non_empty(&options.hosts).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let plan = Plan::new()
        .push(Box::new(HealthProbe::new(options.hosts.clone())))
        .push(Box::new(GetUpNodes::new(options.hosts.clone())))
        .push(Box::new(
            DetailPost::new(
                "add-subcluster",
                "/v1/subclusters",
                json!({ "name": options.subcluster_name }),
                "Subcluster added",
            )
            .on_initiator(""),
        ))
        .push(Box::new(
            DetailPost::new(
                "check-subcluster",
                format!("/v1/subclusters/{}", options.subcluster_name),
                json!({}),
                "Subcluster found",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_eon() {
        let options = Options::builder()
            .db_name("mydb".into())
            .subcluster_name("sc1".into())
            .hosts(vec!["10.0.0.1".parse().unwrap()])
            .eon(false)
            .build();
        assert!(validate_eon_required(options.eon).is_err());
    }

    #[test]
    fn rejects_bad_identifier() {
        assert!(validate_identifier("subcluster", "sc-1").is_err());
    }
}
