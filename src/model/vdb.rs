//! Cluster Snapshot (VDB): an in-memory snapshot of database topology built
//! from remote reads (§3, §4.6).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::host::Host;
use super::node::{Node, NodeState};

/// In-memory snapshot of database topology.
///
/// Invariants maintained by every mutating method:
/// - every entry in `hosts` has a unique host key (guaranteed by `HashMap`);
/// - if `eon` is true then `communal_storage_location` is non-empty;
/// - every node's `sandbox` is either empty or present in `all_sandboxes()`;
/// - `unbound_nodes` never appear in `hosts` (a node without a bound address
///   cannot be keyed by one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vdb {
    pub db_name: String,
    pub eon: bool,
    pub communal_storage_location: String,
    pub use_depot: bool,
    pub data_prefix: String,
    pub depot_prefix: String,
    pub catalog_prefix: String,
    pub shard_count: u32,
    pub ipv6: bool,
    hosts: HashMap<Host, Node>,
    unbound_nodes: Vec<Node>,
}

impl Vdb {
    pub fn new(db_name: impl Into<String>, eon: bool, communal_storage_location: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            eon,
            communal_storage_location: communal_storage_location.into(),
            use_depot: false,
            data_prefix: "/data".into(),
            depot_prefix: "/data".into(),
            catalog_prefix: "/data".into(),
            shard_count: 0,
            ipv6: false,
            hosts: HashMap::new(),
            unbound_nodes: Vec::new(),
        }
    }

    /// Insert a node at its bound address, or into the unbound list if its
    /// address is an unbound sentinel.
    pub fn insert_node(&mut self, node: Node) {
        if node.address.is_unbound() {
            self.unbound_nodes.push(node);
        } else {
            self.hosts.insert(node.address, node);
        }
    }

    pub fn remove_host(&mut self, host: &Host) -> Option<Node> {
        self.hosts.remove(host)
    }

    pub fn get(&self, host: &Host) -> Option<&Node> {
        self.hosts.get(host)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.keys()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.hosts.values()
    }

    pub fn unbound_nodes(&self) -> &[Node] {
        &self.unbound_nodes
    }

    pub fn node_count(&self) -> usize {
        self.hosts.len() + self.unbound_nodes.len()
    }

    /// `PrimaryUpNodes`: UP, primary, non-compute nodes, in natural host
    /// order (used for deterministic initiator selection).
    pub fn primary_up_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.hosts.values().filter(|n| n.counts_toward_quorum()).collect();
        nodes.sort_by_key(|n| n.address);
        nodes
    }

    /// `ComputeNodes`: ephemeral non-storage nodes.
    pub fn compute_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.hosts.values().filter(|n| n.is_compute).collect();
        nodes.sort_by_key(|n| n.address);
        nodes
    }

    /// `AllSandboxes`: distinct non-empty sandbox names across all nodes.
    pub fn all_sandboxes(&self) -> HashSet<String> {
        self.hosts
            .values()
            .chain(self.unbound_nodes.iter())
            .map(|n| n.sandbox.clone())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Restrict this snapshot to the main cluster (sandbox == ""), the way
    /// `setMainCluster` does in the source engine.
    ///
    /// Round-trips per §8 testable property 7: the result equals this VDB
    /// restricted to sandbox "" with `all_sandboxes()` equal to the
    /// original's distinct non-empty sandbox names.
    pub fn set_main_cluster(&self) -> Vdb {
        let mut out = self.clone();
        out.hosts.retain(|_, n| n.is_in_main_cluster());
        out.unbound_nodes.retain(|n| n.is_in_main_cluster());
        out
    }

    /// All nodes (bound and unbound) belonging to a given sandbox, or the
    /// main cluster when `sandbox` is empty.
    pub fn nodes_in_sandbox<'a>(&'a self, sandbox: &'a str) -> impl Iterator<Item = &'a Node> {
        self.hosts
            .values()
            .chain(self.unbound_nodes.iter())
            .filter(move |n| n.is_in_sandbox(sandbox))
    }

    /// Count of currently UP primary nodes in the given scope, used by the
    /// quorum check (§5, §8 property 6).
    pub fn primary_up_count_in_scope(&self, sandbox: &str) -> usize {
        self.nodes_in_sandbox(sandbox)
            .filter(|n| n.counts_toward_quorum())
            .count()
    }

    /// Whether every entry satisfies the VDB invariants (used by tests, not
    /// by production code paths which maintain them by construction).
    pub fn check_invariants(&self) -> bool {
        if self.eon && self.communal_storage_location.is_empty() {
            return false;
        }
        let sandboxes = self.all_sandboxes();
        let sandbox_ok = |n: &Node| n.sandbox.is_empty() || sandboxes.contains(&n.sandbox);
        if !self.hosts.values().all(sandbox_ok) {
            return false;
        }
        if !self.unbound_nodes.iter().all(sandbox_ok) {
            return false;
        }
        self.unbound_nodes.iter().all(|n| n.address.is_unbound())
            && self.hosts.iter().all(|(h, n)| *h == n.address && !h.is_unbound())
    }
}

/// Deterministic node-name synthesis: `v_<lower(db)>_node%04d` (§4.6, §8
/// testable property 9).
pub fn gen_node_name(db_name: &str, node_index: u32) -> String {
    format!("v_{}_node{:04}", db_name.to_lowercase(), node_index)
}

/// `<prefix>/<db>/<node>_data`
pub fn gen_data_path(prefix: &str, db_name: &str, node_name: &str) -> String {
    gen_path(prefix, db_name, node_name, "data")
}

/// `<prefix>/<db>/<node>_depot`
pub fn gen_depot_path(prefix: &str, db_name: &str, node_name: &str) -> String {
    gen_path(prefix, db_name, node_name, "depot")
}

/// `<prefix>/<db>/<node>_catalog`
pub fn gen_catalog_path(prefix: &str, db_name: &str, node_name: &str) -> String {
    gen_path(prefix, db_name, node_name, "catalog")
}

fn gen_path(prefix: &str, db_name: &str, node_name: &str, suffix: &str) -> String {
    format!(
        "{}/{}/{}_{}",
        prefix.trim_end_matches('/'),
        db_name,
        node_name,
        suffix
    )
}
