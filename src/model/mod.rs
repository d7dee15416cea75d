//! Cluster data model (§3): host identity, node/topology snapshot, re-IP
//! plans, and the per-run execution context.

mod context;
mod host;
mod node;
mod reip;
mod vdb;

pub use context::{
    DrainingStatus, ExecutionContext, HoldEvent, RestorePoint, SessionRecord, SlowEvent, StagedFile,
    TransactionRecord,
};
pub use host::Host;
pub use node::{ControlAddressFamily, Node, NodeState};
pub use reip::{parse_re_ip_json, to_re_ip_json, to_re_ip_value, ReIpEntry, ReIpList};
pub use vdb::{gen_catalog_path, gen_data_path, gen_depot_path, gen_node_name, Vdb};
