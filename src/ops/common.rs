//! Shared concrete operations reused across plan builders (§4.4
//! "Representative operation families").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{AuthMode, HostClient};
use crate::dispatch::Dispatcher;
use crate::error::OperationError;
use crate::model::{ExecutionContext, Host, Node, NodeState, Vdb};
use crate::operation::{Operation, PreparedRequests};

const NMA_PORT: u16 = 5554;
const HTTPS_PORT: u16 = 8443;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[allow(dead_code)]
    health: String,
}

/// GET health on every candidate host; all must pass (§4.4 "Health probe").
pub struct HealthProbe {
    candidates: Vec<Host>,
    unreachable: Vec<Host>,
}

impl HealthProbe {
    pub fn new(candidates: Vec<Host>) -> Self {
        Self {
            candidates,
            unreachable: Vec::new(),
        }
    }

    pub fn unreachable(&self) -> &[Host] {
        &self.unreachable
    }
}

#[async_trait]
impl Operation for HealthProbe {
    fn name(&self) -> &'static str {
        "health-probe"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        if self.candidates.is_empty() {
            return Ok(PreparedRequests::skip());
        }
        Ok(PreparedRequests::new(self.candidates.clone()))
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
            .run(&self.candidates, move |host| {
                let client = client.clone();
                let auth = auth.clone();
                async move {
                    match client.get::<HealthResponse>(&host, NMA_PORT, "/v1/health", &auth).await {
                        crate::client::HostOutcome::Passing(_) => Ok(()),
                        outcome => Err(outcome_to_error(outcome)),
                    }
                }
            })
            .await;

        for (host, result) in &results {
            if result.is_err() {
                self.unreachable.push(*host);
            }
        }
        let joined = Dispatcher::join_errors("health probe", results, false);
        joined.map(|_| ()).map_err(|e| e.hosts.first().map(|h| h.error.clone()).unwrap_or(OperationError::Unreachable(self.unreachable.clone())))
    }
}

/// Seeds `ctx.up_hosts` from the first candidate to report at least one UP
/// node, ties broken by host order (§4.4 "Up-host discovery").
pub struct GetUpNodes {
    candidates: Vec<Host>,
}

#[derive(Debug, Deserialize)]
struct NodeStateRow {
    address: Host,
    state: NodeState,
    sandbox: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodesResponse {
    node_list: Vec<NodeStateRow>,
}

impl GetUpNodes {
    pub fn new(candidates: Vec<Host>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl Operation for GetUpNodes {
    fn name(&self) -> &'static str {
        "get-up-nodes"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        if self.candidates.is_empty() {
            return Err(OperationError::Validation("no candidate hosts to query for up nodes".into()));
        }
        Ok(PreparedRequests::new(self.candidates.clone()))
    }

    async fn execute(
        &mut self,
        ctx: &mut ExecutionContext,
        dispatcher: &Dispatcher,
        client: &HostClient,
        auth: &AuthMode,
    ) -> Result<(), OperationError> {
        let client = client.clone();
        let auth = auth.clone();
        let results = dispatcher
            .run(&self.candidates, move |host| {
                let client = client.clone();
                let auth = auth.clone();
                async move {
                    match client.get::<NodesResponse>(&host, HTTPS_PORT, "/v1/nodes", &auth).await {
                        crate::client::HostOutcome::Passing(v) => Ok(v),
                        outcome => Err(outcome_to_error(outcome)),
                    }
                }
            })
            .await;

        let mut ordered: Vec<_> = results.into_iter().collect();
        ordered.sort_by_key(|(h, _)| *h);

        for (_, result) in ordered {
            if let Ok(resp) = result {
                let up: Vec<_> = resp.node_list.iter().filter(|n| n.state.is_up()).collect();
                if !up.is_empty() {
                    let up_hosts: Vec<Host> = up.iter().map(|n| n.address).collect();
                    let mapping: HashMap<Host, String> = up
                        .iter()
                        .map(|n| (n.address, n.sandbox.clone().unwrap_or_default()))
                        .collect();
                    ctx.seal_up_hosts(up_hosts, mapping);
                    return Ok(());
                }
            }
        }
        Err(OperationError::Validation("no candidate host reported any up node".into()))
    }
}

/// One row of the `/v1/nodes` response (§4.6, §3 "Node").
#[derive(Debug, Deserialize)]
struct FullNodeRow {
    name: String,
    address: Host,
    #[serde(default)]
    subcluster_name: String,
    #[serde(default)]
    sandbox: String,
    #[serde(default = "default_true")]
    is_primary: bool,
    #[serde(default)]
    is_compute: bool,
    state: NodeState,
    #[serde(default)]
    catalog_path: String,
    #[serde(default)]
    data_path: Vec<String>,
    #[serde(default)]
    depot_path: Option<String>,
    #[serde(default)]
    control_address_family: crate::model::ControlAddressFamily,
    #[serde(default)]
    version: String,
    #[serde(default = "default_true")]
    is_control_node: bool,
    #[serde(default)]
    control_node_address: Option<Host>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct FullNodesResponse {
    node_list: Vec<FullNodeRow>,
}

impl From<FullNodeRow> for Node {
    fn from(row: FullNodeRow) -> Self {
        Node {
            name: row.name,
            address: row.address,
            subcluster: row.subcluster_name,
            sandbox: row.sandbox,
            is_primary: row.is_primary,
            is_compute: row.is_compute,
            state: row.state,
            catalog_path: row.catalog_path,
            data_paths: row.data_path,
            depot_path: row.depot_path,
            control_address_family: row.control_address_family,
            version: row.version,
            is_control_node: row.is_control_node,
            control_node_address: row.control_node_address,
        }
    }
}

/// GET `/v1/nodes` on every candidate host and populate a shared VDB from the
/// first to answer (§4.4 "Node-info read", §4.6 "VDB construction from a
/// 'cluster+nodes' fetch").
pub struct NodeInfoRead {
    candidates: Vec<Host>,
    vdb: Arc<Mutex<Vdb>>,
}

impl NodeInfoRead {
    pub fn new(candidates: Vec<Host>, vdb: Arc<Mutex<Vdb>>) -> Self {
        Self { candidates, vdb }
    }
}

#[async_trait]
impl Operation for NodeInfoRead {
    fn name(&self) -> &'static str {
        "node-info-read"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        Ok(PreparedRequests::new(self.candidates.clone()))
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
            .run(&self.candidates, move |host| {
                let client = client.clone();
                let auth = auth.clone();
                async move {
                    match client.get::<FullNodesResponse>(&host, HTTPS_PORT, "/v1/nodes", &auth).await {
                        crate::client::HostOutcome::Passing(v) => Ok(v),
                        outcome => Err(outcome_to_error(outcome)),
                    }
                }
            })
            .await;

        let mut ordered: Vec<_> = results.into_iter().collect();
        ordered.sort_by_key(|(h, _)| *h);

        for (_, result) in ordered {
            if let Ok(resp) = result {
                let mut vdb = self.vdb.lock().expect("vdb mutex poisoned");
                for row in resp.node_list {
                    vdb.insert_node(Node::from(row));
                }
                return Ok(());
            }
        }
        Err(OperationError::Validation("no candidate host answered node-info read".into()))
    }
}

/// Whether a `{"detail": "..."}` response must match `expected_detail`
/// exactly or merely contain it as a substring (§6, §8 scenario S4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMatch {
    Exact,
    Contains,
}

/// A single-host POST whose success contract is a `{"detail": "..."}`
/// literal (§6 "Success contract on selected endpoints").
pub struct DetailPost {
    label: &'static str,
    host: Option<Host>,
    sandbox: Option<String>,
    path: String,
    body: Value,
    expected_detail: String,
    detail_match: DetailMatch,
    eof_benign: bool,
}

#[derive(Debug, Deserialize, Serialize)]
struct DetailResponse {
    detail: String,
}

impl DetailPost {
    pub fn new(label: &'static str, path: impl Into<String>, body: Value, expected_detail: impl Into<String>) -> Self {
        Self {
            label,
            host: None,
            sandbox: None,
            path: path.into(),
            body,
            expected_detail: expected_detail.into(),
            detail_match: DetailMatch::Exact,
            eof_benign: false,
        }
    }

    /// Accept any response whose detail contains `expected_detail` as a
    /// substring, rather than requiring an exact match.
    pub fn detail_contains(mut self) -> Self {
        self.detail_match = DetailMatch::Contains;
        self
    }

    pub fn on(mut self, host: Host) -> Self {
        self.host = Some(host);
        self
    }

    /// Resolve the initiator from the context's up-host set at `prepare`
    /// time rather than a fixed host (§4.4 "Initiator selection").
    pub fn on_initiator(mut self, sandbox: impl Into<String>) -> Self {
        self.sandbox = Some(sandbox.into());
        self
    }

    pub fn eof_benign(mut self, benign: bool) -> Self {
        self.eof_benign = benign;
        self
    }
}

#[async_trait]
impl Operation for DetailPost {
    fn name(&self) -> &'static str {
        self.label
    }

    fn prepare(&mut self, ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        if self.host.is_none() {
            if let Some(sandbox) = &self.sandbox {
                self.host = Some(crate::operation::select_initiator_from_ctx(ctx, sandbox)?);
            }
        }
        let host = self
            .host
            .ok_or_else(|| OperationError::Validation(format!("{} has no initiator host", self.label)))?;
        Ok(PreparedRequests::new(vec![host]))
    }

    async fn execute(
        &mut self,
        _ctx: &mut ExecutionContext,
        dispatcher: &Dispatcher,
        client: &HostClient,
        auth: &AuthMode,
    ) -> Result<(), OperationError> {
        let host = self.host.unwrap();
        let path = self.path.clone();
        let body = self.body.clone();
        let expected = self.expected_detail.clone();
        let detail_match = self.detail_match;
        let client = client.clone();
        let auth = auth.clone();

        let results = dispatcher
            .run(&[host], move |host| {
                let client = client.clone();
                let auth = auth.clone();
                let path = path.clone();
                let body = body.clone();
                let expected = expected.clone();
                async move {
                    let matches = |detail: &str| match detail_match {
                        DetailMatch::Exact => detail == expected,
                        DetailMatch::Contains => detail.contains(&expected),
                    };
                    match client.post::<_, DetailResponse>(&host, HTTPS_PORT, &path, &body, &auth).await {
                        crate::client::HostOutcome::Passing(resp) if matches(&resp.detail) => Ok(()),
                        crate::client::HostOutcome::Passing(resp) => Err(OperationError::Contract(format!(
                            "expected detail '{expected}', got '{}'",
                            resp.detail
                        ))),
                        outcome => Err(outcome_to_error(outcome)),
                    }
                }
            })
            .await;

        let eof_benign = self.eof_benign;
        Dispatcher::join_errors(self.label, results, eof_benign)
            .map(|_| ())
            .map_err(|e| e.hosts.first().map(|h| h.error.clone()).unwrap_or(OperationError::Unreachable(vec![host])))
    }

    fn eof_is_benign(&self) -> bool {
        self.eof_benign
    }
}

/// Which state [`PollNodeState`] waits for every polled host to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollTarget {
    Up,
    Down,
}

/// Polls node state on a set of hosts until every one reports the target
/// state or the deadline elapses (§4.4 "Node start", "Stop nodes", §5
/// "Suspension points").
pub struct PollNodeState {
    hosts: Vec<Host>,
    deadline: Duration,
    tick: Duration,
    target: PollTarget,
}

impl PollNodeState {
    pub fn new(hosts: Vec<Host>, deadline: Duration) -> Self {
        Self {
            hosts,
            deadline,
            tick: Duration::from_secs(1),
            target: PollTarget::Up,
        }
    }

    /// Poll until every host reports `DOWN` (§4.7 "Stop nodes").
    pub fn until_down(hosts: Vec<Host>, deadline: Duration) -> Self {
        Self {
            hosts,
            deadline,
            tick: Duration::from_secs(1),
            target: PollTarget::Down,
        }
    }
}

#[async_trait]
impl Operation for PollNodeState {
    fn name(&self) -> &'static str {
        "poll-node-state"
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
        let start = Instant::now();
        let target = self.target;
        loop {
            let client = client.clone();
            let auth = auth.clone();
            let results = dispatcher
                .run(&self.hosts, move |host| {
                    let client = client.clone();
                    let auth = auth.clone();
                    async move {
                        match client.get::<NodeStateRow>(&host, HTTPS_PORT, "/node", &auth).await {
                            crate::client::HostOutcome::Passing(row) => Ok(match target {
                                PollTarget::Up => row.state.is_up(),
                                PollTarget::Down => row.state == NodeState::Down,
                            }),
                            outcome => Err(outcome_to_error(outcome)),
                        }
                    }
                })
                .await;

            if results.values().all(|r| matches!(r, Ok(true))) {
                return Ok(());
            }
            if start.elapsed() >= self.deadline {
                return Err(OperationError::PollDeadline(self.deadline));
            }
            tokio::time::sleep(self.tick).await;
        }
    }
}

pub(crate) fn outcome_to_error<T>(outcome: crate::client::HostOutcome<T>) -> OperationError {
    use crate::client::HostOutcome;
    match outcome {
        HostOutcome::Passing(_) => unreachable!("caller already matched Passing"),
        HostOutcome::Unauthorized => OperationError::Auth,
        HostOutcome::Internal(msg) => OperationError::ServerInternal(msg),
        HostOutcome::Timeout => OperationError::Timeout,
        HostOutcome::Eof => OperationError::EofOnShutdown,
        HostOutcome::Transport(msg) => OperationError::Transport(msg),
        HostOutcome::Other { status, body } => OperationError::Contract(format!("unexpected status {status}: {body}")),
    }
}

#[cfg(test)]
mod node_info_read_tests {
    use super::*;

    #[test]
    fn full_node_row_converts_into_node_and_populates_vdb() {
        let row: FullNodeRow = serde_json::from_value(serde_json::json!({
            "name": "v_db_node0001",
            "address": "10.0.0.11",
            "subcluster_name": "sc1",
            "sandbox": "",
            "is_primary": true,
            "is_compute": false,
            "state": "UP",
            "catalog_path": "/data/mydb/v_db_node0001_catalog",
            "data_path": ["/data/mydb/v_db_node0001_data"],
            "depot_path": null,
            "control_address_family": "ipv4",
            "version": "24.1.0",
            "is_control_node": true,
            "control_node_address": null
        }))
        .expect("row deserializes");

        let node: Node = row.into();
        let mut vdb = Vdb::new("mydb", false, "");
        vdb.insert_node(node);

        let inserted = vdb.get(&"10.0.0.11".parse().unwrap()).expect("node-info read must populate the VDB");
        assert_eq!(inserted.name, "v_db_node0001");
        assert_eq!(inserted.subcluster, "sc1");
        assert_eq!(inserted.catalog_path, "/data/mydb/v_db_node0001_catalog");
    }

    #[test]
    fn full_node_row_defaults_missing_fields() {
        let row: FullNodeRow = serde_json::from_value(serde_json::json!({
            "name": "v_db_node0002",
            "address": "10.0.0.12",
            "state": "DOWN"
        }))
        .expect("row deserializes with defaults");

        assert!(row.is_primary);
        assert!(!row.is_compute);
        assert!(row.is_control_node);
        assert_eq!(row.control_address_family, crate::model::ControlAddressFamily::Ipv4);
    }
}
