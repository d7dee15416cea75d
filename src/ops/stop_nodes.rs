//! Stop nodes / stop subcluster (§4.7): refuses mixed-sandbox targets,
//! regular nodes via HTTPS shutdown, compute nodes via NMA signal, then
//! polls for DOWN. Scenario S4.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use typed_builder::TypedBuilder;

use crate::client::{AuthMode, HostClient};
use crate::dispatch::Dispatcher;
use crate::engine::{Engine, Plan};
use crate::error::{OperationError, VerbError, VerbResult};
use crate::model::{ExecutionContext, Host, Vdb};
use crate::operation::{Operation, PreparedRequests};
use crate::validate::validate_db_name;

use super::common::{outcome_to_error, DetailPost, GetUpNodes, HealthProbe, PollNodeState};

/// NMA port: compute nodes are signaled directly since they lack
/// distributed-call support (§4.7 "Stop nodes", §6).
const NMA_PORT: u16 = 5554;

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    pub subcluster_name: String,
    pub vdb: Vdb,
    #[builder(default = 0)]
    pub drain_timeout_secs: u64,
    #[builder(default = Duration::from_secs(300))]
    pub poll_timeout: Duration,
}

pub struct Outcome {
    pub stopped: Vec<Host>,
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = format!("stop subcluster {}", options.subcluster_name);

    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let targets: Vec<_> = options
        .vdb
        .nodes()
        .filter(|n| n.subcluster == options.subcluster_name)
        .collect();
    if targets.is_empty() {
        return Err(VerbError::cause(
            verb,
            OperationError::Validation(format!("no nodes found in subcluster '{}'", options.subcluster_name)),
        ));
    }

    let sandboxes: std::collections::HashSet<&str> = targets.iter().map(|n| n.sandbox.as_str()).collect();
    if sandboxes.len() > 1 {
        return Err(VerbError::cause(
            verb,
            OperationError::Validation("stop target spans more than one sandbox".into()),
        ));
    }

    let target_hosts: Vec<Host> = targets.iter().map(|n| n.address).collect();
    let candidate_hosts: Vec<Host> = options.vdb.hosts().copied().collect();

    // Compute nodes lack distributed-call support: the subcluster shutdown
    // endpoint only reaches regular (non-compute) nodes, so compute nodes
    // are stopped directly over NMA (§4.7 "Stop nodes", §6).
    let compute_targets: Vec<Host> = targets.iter().filter(|n| n.is_compute).map(|n| n.address).collect();

    let expected_detail = format!("Shutdown message sent to subcluster ({})", options.subcluster_name);

    let mut plan = Plan::new()
        .push(Box::new(HealthProbe::new(candidate_hosts.clone())))
        .push(Box::new(GetUpNodes::new(candidate_hosts.clone())))
        .push(Box::new(
            DetailPost::new(
                "stop-subcluster",
                format!(
                    "/v1/subclusters/{}/shutdown?timeout={}",
                    options.subcluster_name, options.drain_timeout_secs
                ),
                json!({}),
                expected_detail,
            )
            .detail_contains()
            .on_initiator("")
            .eof_benign(true),
        ));

    if !compute_targets.is_empty() {
        plan = plan.push(Box::new(SignalComputeNodes::new(compute_targets)));
    }

    plan = plan.push(Box::new(PollNodeState::until_down(target_hosts.clone(), options.poll_timeout)));

    engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(Outcome { stopped: target_hosts })
}

/// Stops a set of compute nodes directly over NMA's process-signal endpoint,
/// since compute nodes lack distributed-call support (§4.7 "Stop nodes",
/// §6 `POST /vertica-processes/signal`).
struct SignalComputeNodes {
    hosts: Vec<Host>,
}

impl SignalComputeNodes {
    fn new(hosts: Vec<Host>) -> Self {
        Self { hosts }
    }
}

#[async_trait]
impl Operation for SignalComputeNodes {
    fn name(&self) -> &'static str {
        "signal-compute-nodes"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        if self.hosts.is_empty() {
            return Ok(PreparedRequests::skip());
        }
        Ok(PreparedRequests::new(self.hosts.clone()))
    }

    async fn execute(
        &mut self,
        _ctx: &mut ExecutionContext,
        dispatcher: &Dispatcher,
        client: &HostClient,
        auth: &AuthMode,
    ) -> Result<(), OperationError> {
        let client = client.clone();
        let auth = auth.clone();
        let results = dispatcher
            .run(&self.hosts, move |host| {
                let client = client.clone();
                let auth = auth.clone();
                async move {
                    match client
                        .post::<_, Value>(&host, NMA_PORT, "/vertica-processes/signal?signal_type=term", &json!({}), &auth)
                        .await
                    {
                        crate::client::HostOutcome::Passing(_) => Ok(()),
                        outcome => Err(outcome_to_error(outcome)),
                    }
                }
            })
            .await;

        Dispatcher::join_errors(self.name(), results, true)
            .map(|_| ())
            .map_err(|e| e.hosts.first().map(|h| h.error.clone()).unwrap_or(OperationError::Unreachable(self.hosts.clone())))
    }

    fn eof_is_benign(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControlAddressFamily, Node, NodeState};

    fn node(name: &str, address: &str, subcluster: &str, is_compute: bool, state: NodeState) -> Node {
        Node {
            name: name.into(),
            address: address.parse().unwrap(),
            subcluster: subcluster.into(),
            sandbox: String::new(),
            is_primary: !is_compute,
            is_compute,
            state,
            catalog_path: "/catalog".into(),
            data_paths: vec![],
            depot_path: None,
            control_address_family: ControlAddressFamily::Ipv4,
            version: "24.1.0".into(),
            is_control_node: true,
            control_node_address: None,
        }
    }

    #[test]
    fn compute_targets_are_separated_from_regular_targets() {
        let mut vdb = Vdb::new("db", true, "s3://bucket");
        vdb.insert_node(node("v_db_node0001", "10.0.0.1", "sc1", false, NodeState::Up));
        vdb.insert_node(node("v_db_node0002", "10.0.0.2", "sc1", true, NodeState::Compute));

        let targets: Vec<_> = vdb.nodes().filter(|n| n.subcluster == "sc1").collect();
        let compute_targets: Vec<Host> = targets.iter().filter(|n| n.is_compute).map(|n| n.address).collect();
        let regular_targets: Vec<Host> = targets.iter().filter(|n| !n.is_compute).map(|n| n.address).collect();

        assert_eq!(compute_targets, vec!["10.0.0.2".parse().unwrap()]);
        assert_eq!(regular_targets, vec!["10.0.0.1".parse().unwrap()]);
    }

    #[test]
    fn no_compute_nodes_means_no_signal_step_needed() {
        let mut vdb = Vdb::new("db", true, "s3://bucket");
        vdb.insert_node(node("v_db_node0001", "10.0.0.1", "sc1", false, NodeState::Up));

        let targets: Vec<_> = vdb.nodes().filter(|n| n.subcluster == "sc1").collect();
        let compute_targets: Vec<Host> = targets.iter().filter(|n| n.is_compute).map(|n| n.address).collect();
        assert!(compute_targets.is_empty());
    }
}
