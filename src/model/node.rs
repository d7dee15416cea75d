//! Node: one logical database member (§3).

use serde::{Deserialize, Serialize};

use super::host::Host;

/// Node lifecycle state as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeState {
    Up,
    Down,
    Compute,
    Unknown,
}

impl NodeState {
    pub fn is_up(&self) -> bool {
        matches!(self, NodeState::Up | NodeState::Compute)
    }
}

/// Whether the control connection for a node routes over IPv4 or IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAddressFamily {
    Ipv4,
    Ipv6,
}

impl Default for ControlAddressFamily {
    fn default() -> Self {
        ControlAddressFamily::Ipv4
    }
}

/// One logical database member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Synthesized `v_<db>_node####` name.
    pub name: String,
    pub address: Host,
    /// Empty in enterprise (non-Eon) mode.
    pub subcluster: String,
    /// Empty string means "main cluster", i.e. not sandboxed.
    pub sandbox: String,
    pub is_primary: bool,
    pub is_compute: bool,
    pub state: NodeState,
    pub catalog_path: String,
    pub data_paths: Vec<String>,
    pub depot_path: Option<String>,
    pub control_address_family: ControlAddressFamily,
    pub version: String,
    pub is_control_node: bool,
    pub control_node_address: Option<Host>,
}

impl Node {
    /// Invariant (§3): a non-compute node is either primary or secondary,
    /// and a primary UP node counts toward quorum.
    pub fn counts_toward_quorum(&self) -> bool {
        !self.is_compute && self.is_primary && self.state.is_up()
    }

    pub fn is_in_main_cluster(&self) -> bool {
        self.sandbox.is_empty()
    }

    pub fn is_in_sandbox(&self, sandbox: &str) -> bool {
        if sandbox.is_empty() {
            self.is_in_main_cluster()
        } else {
            self.sandbox == sandbox
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(address: &str, is_primary: bool, is_compute: bool, state: NodeState) -> Node {
        Node {
            name: "v_db_node0001".into(),
            address: address.parse().unwrap(),
            subcluster: String::new(),
            sandbox: String::new(),
            is_primary,
            is_compute,
            state,
            catalog_path: "/catalog".into(),
            data_paths: vec!["/data".into()],
            depot_path: None,
            control_address_family: ControlAddressFamily::Ipv4,
            version: "24.1.0".into(),
            is_control_node: true,
            control_node_address: None,
        }
    }

    #[test]
    fn primary_up_node_counts_toward_quorum() {
        let n = node("10.0.0.1", true, false, NodeState::Up);
        assert!(n.counts_toward_quorum());
    }

    #[test]
    fn compute_node_never_counts_toward_quorum() {
        let n = node("10.0.0.1", true, true, NodeState::Up);
        assert!(!n.counts_toward_quorum());
    }

    #[test]
    fn down_node_does_not_count() {
        let n = node("10.0.0.1", true, false, NodeState::Down);
        assert!(!n.counts_toward_quorum());
    }
}
