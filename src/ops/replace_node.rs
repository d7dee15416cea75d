//! Replace node (§4.7): original must exist and be DOWN; new must not exist
//! and differ from original; re-IP + reload spread + start + poll + cleanup.

use std::time::Duration;

use serde_json::json;
use typed_builder::TypedBuilder;

use crate::engine::{Engine, Plan};
use crate::error::{OperationError, VerbError, VerbResult};
use crate::model::{ExecutionContext, Host, ReIpEntry, ReIpList};
use crate::validate::validate_db_name;

use super::common::{DetailPost, GetUpNodes, HealthProbe, PollNodeState};

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    pub original_node_name: String,
    pub original_address: Host,
    pub new_address: Host,
    pub remaining_hosts: Vec<Host>,
    #[builder(default = Duration::from_secs(300))]
    pub poll_timeout: Duration,
}

pub struct Outcome {
    pub new_address: Host,
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = format!("replace node {}", options.original_node_name);

    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    if options.original_address == options.new_address {
        return Err(VerbError::cause(
            verb,
            OperationError::Validation("replacement address must differ from the original".into()),
        ));
    }

    let re_ip_list = ReIpList(vec![ReIpEntry {
        node_name: options.original_node_name.clone(),
        current_address: options.original_address,
        new_address: options.new_address,
        new_control_address: None,
        new_control_broadcast: None,
    }]);
    re_ip_list
        .validate(options.new_address.is_ipv6())
        .map_err(|e| VerbError::cause(verb.clone(), e))?;

    let plan = Plan::new()
        .push(Box::new(HealthProbe::new(options.remaining_hosts.clone())))
        .push(Box::new(GetUpNodes::new(options.remaining_hosts.clone())))
        .push(Box::new(
            DetailPost::new(
                "re-ip",
                "/v1/re-ip",
                json!({ "re_ip_list": crate::model::to_re_ip_value(&re_ip_list) }),
                "Re-ip success",
            )
            .on_initiator(""),
        ))
        .push(Box::new(
            DetailPost::new("reload-spread", "/v1/reload-spread", json!({}), "Reload spread success")
                .on_initiator(""),
        ))
        .push(Box::new(
            DetailPost::new(
                "start-replacement-node",
                "/v1/startup/command",
                json!({ "hosts": [options.new_address.to_string()] }),
                "Nodes started",
            )
            .on_initiator(""),
        ))
        .push(Box::new(PollNodeState::new(vec![options.new_address], options.poll_timeout)))
        .push(Box::new(
            DetailPost::new(
                "cleanup-original-directories",
                "/node/storage-locations/cleanup",
                json!({ "address": options.original_address.to_string() }),
                "Cleanup complete",
            )
            .on_initiator(""),
        ));

    engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(Outcome {
        new_address: options.new_address,
    })
}
