//! Add node (§4.7): trim stale catalog entries, adjust k-safety, create,
//! start, poll, and (Eon only) rebalance.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use typed_builder::TypedBuilder;

use crate::client::{AuthMode, HostClient};
use crate::dispatch::Dispatcher;
use crate::engine::{Engine, Plan};
use crate::error::{OperationError, VerbError, VerbResult};
use crate::model::{ExecutionContext, Host, NodeState, Vdb};
use crate::operation::{Operation, PreparedRequests};
use crate::validate::{validate_db_name, validate_hosts_non_empty};

use super::common::{DetailPost, GetUpNodes, HealthProbe, NodeInfoRead, PollNodeState};

/// k-safety below which the add-node plan must zero out design k-safety
/// before creating nodes (§4.7 "Add node").
const K_SAFETY_THRESHOLD: usize = 2;

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    pub new_hosts: Vec<Host>,
    pub existing_hosts: Vec<Host>,
    pub expected_node_names: Vec<String>,
    #[builder(default = true)]
    pub eon: bool,
    #[builder(default)]
    pub skip_rebalance: bool,
    #[builder(default = Duration::from_secs(300))]
    pub poll_timeout: Duration,
}

pub struct Outcome {
    pub nodes_added: Vec<Host>,
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = format!("add node to {}", options.db_name);

    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;
    validate_hosts_non_empty(&options.new_hosts).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let all_candidates: Vec<Host> = options
        .existing_hosts
        .iter()
        .chain(options.new_hosts.iter())
        .copied()
        .collect();

    let vdb = Arc::new(Mutex::new(Vdb::new(&options.db_name, options.eon, "")));

    let subscribing_hosts = options.existing_hosts.len();
    let zero_k_safety = subscribing_hosts < K_SAFETY_THRESHOLD;

    let mut plan = Plan::new()
        .push(Box::new(HealthProbe::new(all_candidates.clone())))
        .push(Box::new(GetUpNodes::new(options.existing_hosts.clone())))
        .push(Box::new(NodeInfoRead::new(options.existing_hosts.clone(), vdb.clone())))
        .push(Box::new(RefuseTrimOfLiveNodes {
            vdb: vdb.clone(),
            expected_node_names: options.expected_node_names.clone(),
        }))
        .push(Box::new(
            DetailPost::new(
                "trim-catalog-entries",
                "/v1/nodes/trim",
                json!({ "expected_node_names": options.expected_node_names }),
                "Catalog trimmed",
            )
            .on_initiator(""),
        ));

    if zero_k_safety {
        plan = plan.push(Box::new(
            DetailPost::new(
                "set-k-safety-zero",
                "/v1/cluster/k-safety",
                json!({ "k_safety": 0 }),
                "K-safety updated",
            )
            .on_initiator(""),
        ));
    }

    plan = plan
        .push(Box::new(
            DetailPost::new(
                "create-nodes",
                "/v1/nodes",
                json!({ "hosts": options.new_hosts.iter().map(Host::to_string).collect::<Vec<_>>() }),
                "Nodes created",
            )
            .on_initiator(""),
        ))
        .push(Box::new(
            DetailPost::new("reload-spread", "/v1/reload-spread", json!({}), "Reload spread success")
                .on_initiator(""),
        ))
        .push(Box::new(
            DetailPost::new(
                "start-new-nodes",
                "/v1/startup/command",
                json!({ "hosts": options.new_hosts.iter().map(Host::to_string).collect::<Vec<_>>() }),
                "Nodes started",
            )
            .on_initiator(""),
        ))
        .push(Box::new(PollNodeState::new(options.new_hosts.clone(), options.poll_timeout)));

    if options.eon && !options.skip_rebalance {
        plan = plan
            .push(Box::new(
                DetailPost::new("create-depot", "/v1/depot", json!({}), "Depot created").on_initiator(""),
            ))
            .push(Box::new(
                DetailPost::new("sync-catalog", "/v1/sync-catalog", json!({}), "Sync catalog success")
                    .on_initiator(""),
            ))
            .push(Box::new(
                DetailPost::new("rebalance-shards", "/v1/subclusters/rebalance", json!({}), "REBALANCED SHARDS")
                    .on_initiator(""),
            ));
    }

    engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(Outcome {
        nodes_added: options.new_hosts,
    })
}

/// No-I/O guard run between `NodeInfoRead` and the trim POST: refuses to
/// trim a catalog entry whose node is currently UP or COMPUTE (§4.7 "Add
/// node" — "refuses to trim UP or COMPUTE nodes").
struct RefuseTrimOfLiveNodes {
    vdb: Arc<Mutex<Vdb>>,
    expected_node_names: Vec<String>,
}

#[async_trait]
impl Operation for RefuseTrimOfLiveNodes {
    fn name(&self) -> &'static str {
        "refuse-trim-live-nodes"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        let vdb = self.vdb.lock().expect("vdb mutex poisoned");
        for name in &self.expected_node_names {
            if let Some(node) = vdb.nodes().find(|n| &n.name == name) {
                let live = node.is_compute || node.state == NodeState::Compute || node.state == NodeState::Up;
                if live {
                    return Err(OperationError::Validation(format!(
                        "refusing to trim catalog entry for node {name}: node is {:?}",
                        node.state
                    )));
                }
            }
        }
        Ok(PreparedRequests::skip())
    }

    async fn execute(
        &mut self,
        _ctx: &mut ExecutionContext,
        _dispatcher: &Dispatcher,
        _client: &HostClient,
        _auth: &AuthMode,
    ) -> Result<(), OperationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControlAddressFamily, Node};

    fn node(name: &str, address: &str, is_compute: bool, state: NodeState) -> Node {
        Node {
            name: name.into(),
            address: address.parse().unwrap(),
            subcluster: String::new(),
            sandbox: String::new(),
            is_primary: true,
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
    fn refuses_to_trim_an_up_node() {
        let mut vdb = Vdb::new("mydb", false, "");
        vdb.insert_node(node("v_db_node0001", "10.0.0.1", false, NodeState::Up));
        let mut guard = RefuseTrimOfLiveNodes {
            vdb: Arc::new(Mutex::new(vdb)),
            expected_node_names: vec!["v_db_node0001".to_string()],
        };
        let ctx = ExecutionContext::new();
        assert!(guard.prepare(&ctx).is_err());
    }

    #[test]
    fn refuses_to_trim_a_compute_node() {
        let mut vdb = Vdb::new("mydb", false, "");
        vdb.insert_node(node("v_db_node0002", "10.0.0.2", true, NodeState::Down));
        let mut guard = RefuseTrimOfLiveNodes {
            vdb: Arc::new(Mutex::new(vdb)),
            expected_node_names: vec!["v_db_node0002".to_string()],
        };
        let ctx = ExecutionContext::new();
        assert!(guard.prepare(&ctx).is_err());
    }

    #[test]
    fn allows_trimming_a_down_non_compute_node() {
        let mut vdb = Vdb::new("mydb", false, "");
        vdb.insert_node(node("v_db_node0003", "10.0.0.3", false, NodeState::Down));
        let mut guard = RefuseTrimOfLiveNodes {
            vdb: Arc::new(Mutex::new(vdb)),
            expected_node_names: vec!["v_db_node0003".to_string()],
        };
        let ctx = ExecutionContext::new();
        assert!(guard.prepare(&ctx).unwrap().skip_execute);
    }

    #[test]
    fn allows_trimming_a_name_absent_from_the_vdb() {
        let vdb = Vdb::new("mydb", false, "");
        let mut guard = RefuseTrimOfLiveNodes {
            vdb: Arc::new(Mutex::new(vdb)),
            expected_node_names: vec!["v_db_node9999".to_string()],
        };
        let ctx = ExecutionContext::new();
        assert!(guard.prepare(&ctx).unwrap().skip_execute);
    }
}
