//! Start nodes (§4.7): separates addresses into a re-IP list and a plain
//! start list, enforces single-sandbox scope, quorum, and control-node
//! ordering. Scenario S2.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use typed_builder::TypedBuilder;

use crate::engine::{Engine, Plan};
use crate::error::{OperationError, VerbError, VerbResult};
use crate::model::{ExecutionContext, Host, ReIpEntry, ReIpList, Vdb};
use crate::operation::check_quorum;
use crate::validate::validate_db_name;

use super::common::{DetailPost, GetUpNodes, HealthProbe, PollNodeState};

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    /// node name -> address to start it at. A mismatch against `vdb`'s
    /// current catalog address for that node becomes a re-IP entry.
    pub nodes: HashMap<String, Host>,
    pub vdb: Vdb,
    #[builder(default)]
    pub sandbox: String,
    #[builder(default)]
    pub allow_unbound: bool,
    #[builder(default = Duration::from_secs(300))]
    pub poll_timeout: Duration,
}

pub struct Outcome {
    pub started: Vec<Host>,
    pub re_ip_chunks: usize,
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = format!("start nodes in {}", options.db_name);

    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;

    // All nodes to start must belong to one sandbox (§4.7).
    for name in options.nodes.keys() {
        if let Some(node) = options.vdb.nodes().find(|n| &n.name == name) {
            if !node.is_in_sandbox(&options.sandbox) {
                return Err(VerbError::cause(
                    verb,
                    OperationError::Validation(format!("node {name} does not belong to sandbox '{}'", options.sandbox)),
                ));
            }
        } else if !options.allow_unbound {
            return Err(VerbError::cause(
                verb,
                OperationError::Validation(format!("node {name} is unbound; start requires explicit authorization")),
            ));
        }
    }

    let mut re_ip_entries = Vec::new();
    let mut plain_start = Vec::new();
    for (name, new_address) in &options.nodes {
        match options.vdb.nodes().find(|n| &n.name == name) {
            Some(node) if node.address != *new_address => {
                re_ip_entries.push(ReIpEntry {
                    node_name: name.clone(),
                    current_address: node.address,
                    new_address: *new_address,
                    new_control_address: None,
                    new_control_broadcast: None,
                });
            }
            _ => plain_start.push(*new_address),
        }
    }
    let re_ip_list = ReIpList(re_ip_entries);

    // Control-node ordering: a non-control node may only start if its
    // control node is already UP or is itself among the nodes being started.
    let starting: std::collections::HashSet<Host> = options.nodes.values().copied().collect();
    for node in options.vdb.nodes() {
        if !node.is_control_node && starting.contains(&node.address) {
            if let Some(control_addr) = node.control_node_address {
                let control_up = options
                    .vdb
                    .get(&control_addr)
                    .map(|c| c.state.is_up())
                    .unwrap_or(false);
                if !control_up && !starting.contains(&control_addr) {
                    return Err(VerbError::cause(
                        verb,
                        OperationError::Validation(format!(
                            "node {} cannot start before its control node {}",
                            node.name, control_addr
                        )),
                    ));
                }
            }
        }
    }

    // Quorum rule (§4.7, §5/§8 property 6): primary-UP-count-in-sandbox >
    // primary-nodes-to-re-IP. Re-IP of a secondary or compute node does not
    // consume quorum.
    let primary_re_ip_count = re_ip_list
        .0
        .iter()
        .filter(|entry| {
            options
                .vdb
                .nodes()
                .find(|n| n.name == entry.node_name)
                .map(|n| n.is_primary && !n.is_compute)
                .unwrap_or(false)
        })
        .count();
    check_quorum(&options.vdb, &options.sandbox, primary_re_ip_count).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let remaining_hosts: Vec<Host> = options.vdb.hosts().copied().collect();

    let mut plan = Plan::new()
        .push(Box::new(HealthProbe::new(remaining_hosts.clone())))
        .push(Box::new(GetUpNodes::new(remaining_hosts.clone())));

    let up_host_count = options.vdb.primary_up_count_in_scope(&options.sandbox).max(1);
    let chunks = if !re_ip_list.is_empty() {
        re_ip_list.chunks(up_host_count)
    } else {
        Vec::new()
    };

    for chunk in &chunks {
        let body = json!({ "re_ip_list": crate::model::to_re_ip_value(chunk) });
        plan = plan.push(Box::new(
            DetailPost::new("re-ip", "/v1/re-ip", body, "Re-ip success").on_initiator(options.sandbox.clone()),
        ));
    }

    if !chunks.is_empty() {
        plan = plan.push(Box::new(
            DetailPost::new("reload-spread", "/v1/reload-spread", json!({}), "Reload spread success")
                .on_initiator(options.sandbox.clone()),
        ));
    }

    let all_started: Vec<Host> = re_ip_list.0.iter().map(|e| e.new_address).chain(plain_start.iter().copied()).collect();

    plan = plan
        .push(Box::new(
            DetailPost::new(
                "start-nodes",
                "/v1/startup/command",
                json!({ "hosts": all_started.iter().map(Host::to_string).collect::<Vec<_>>() }),
                "Nodes started",
            )
            .on_initiator(options.sandbox.clone()),
        ))
        .push(Box::new(PollNodeState::new(all_started.clone(), options.poll_timeout)));

    let re_ip_chunks = chunks.len();

    engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    Ok(Outcome {
        started: all_started,
        re_ip_chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControlAddressFamily, Node, NodeState};

    fn node(name: &str, address: &str, state: NodeState) -> Node {
        Node {
            name: name.into(),
            address: address.parse().unwrap(),
            subcluster: String::new(),
            sandbox: String::new(),
            is_primary: true,
            is_compute: false,
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

    fn compute_node(name: &str, address: &str, state: NodeState) -> Node {
        Node {
            is_compute: true,
            is_primary: false,
            ..node(name, address, state)
        }
    }

    #[test]
    fn re_ip_not_chunked_when_up_hosts_cover_it() {
        let mut vdb = Vdb::new("db", false, "");
        vdb.insert_node(node("v_db_node0001", "10.0.0.11", NodeState::Up));
        vdb.insert_node(node("v_db_node0002", "10.0.0.12", NodeState::Down));

        let mut nodes = HashMap::new();
        nodes.insert("v_db_node0002".to_string(), "10.0.0.22".parse().unwrap());

        let re_ip_entries: Vec<_> = nodes
            .iter()
            .filter_map(|(name, addr)| {
                vdb.nodes().find(|n| &n.name == name).filter(|n| n.address != *addr).map(|n| ReIpEntry {
                    node_name: name.clone(),
                    current_address: n.address,
                    new_address: *addr,
                    new_control_address: None,
                    new_control_broadcast: None,
                })
            })
            .collect();
        let list = ReIpList(re_ip_entries);
        assert_eq!(list.len(), 1);
        assert_eq!(list.chunks(2).len(), 1);
    }

    #[test]
    fn re_ip_of_a_compute_node_does_not_consume_quorum() {
        let mut vdb = Vdb::new("db", false, "");
        vdb.insert_node(node("v_db_node0001", "10.0.0.11", NodeState::Up));
        vdb.insert_node(compute_node("v_db_node0002", "10.0.0.12", NodeState::Compute));

        let entry = ReIpEntry {
            node_name: "v_db_node0002".to_string(),
            current_address: "10.0.0.12".parse().unwrap(),
            new_address: "10.0.0.22".parse().unwrap(),
            new_control_address: None,
            new_control_broadcast: None,
        };
        let re_ip_list = ReIpList(vec![entry]);

        let primary_re_ip_count = re_ip_list
            .0
            .iter()
            .filter(|entry| {
                vdb.nodes()
                    .find(|n| n.name == entry.node_name)
                    .map(|n| n.is_primary && !n.is_compute)
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(primary_re_ip_count, 0);

        // A single primary-UP node in scope still satisfies quorum since no
        // primary node is being re-IP'd.
        assert!(check_quorum(&vdb, "", primary_re_ip_count).is_ok());
    }
}
