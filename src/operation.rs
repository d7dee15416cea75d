//! Operation (C4): the prepare/execute/finalize lifecycle shared by every
//! concrete remote interaction.

use async_trait::async_trait;

use crate::client::{AuthMode, HostClient};
use crate::dispatch::Dispatcher;
use crate::error::OperationError;
use crate::model::{ExecutionContext, Host, Vdb};

/// What an operation decided to do in `prepare`, before any I/O runs.
#[derive(Debug, Clone, Default)]
pub struct PreparedRequests {
    pub hosts: Vec<Host>,
    /// Set when `prepare` determined there is nothing to execute (e.g. no
    /// up host found for a best-effort step); `execute` becomes a no-op.
    pub skip_execute: bool,
}

impl PreparedRequests {
    pub fn new(hosts: Vec<Host>) -> Self {
        Self {
            hosts,
            skip_execute: false,
        }
    }

    pub fn skip() -> Self {
        Self {
            hosts: Vec::new(),
            skip_execute: true,
        }
    }
}

/// One step of a plan (§4.4). The variant set is closed: every concrete
/// operation under `ops/` implements this.
#[async_trait]
pub trait Operation: Send {
    /// Short, stable name used in tracing spans and plan introspection.
    fn name(&self) -> &'static str;

    /// Select hosts and build the per-host request shape; may fail before
    /// any I/O (validation, no-up-host, no-quorum).
    fn prepare(&mut self, ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError>;

    /// Dispatch the prepared requests and fold results into `ctx`.
    async fn execute(
        &mut self,
        ctx: &mut ExecutionContext,
        dispatcher: &Dispatcher,
        client: &HostClient,
        auth: &AuthMode,
    ) -> Result<(), OperationError>;

    /// Idempotent, I/O-free cleanup.
    fn finalize(&mut self, _ctx: &mut ExecutionContext) {}

    /// Whether a connection EOF during this operation's execution is the
    /// expected result of the peer shutting itself down (§4.4, §7).
    fn eof_is_benign(&self) -> bool {
        false
    }
}

/// Deterministic initiator selection: the first `PrimaryUpNodes` host (in
/// natural host order) belonging to `sandbox`, falling back to a secondary
/// UP host in the same sandbox. Fails with `no-up-host`-shaped validation
/// when neither exists (§4.4 "Initiator selection").
pub fn select_initiator(vdb: &Vdb, sandbox: &str) -> Result<Host, OperationError> {
    if let Some(primary) = vdb
        .primary_up_nodes()
        .into_iter()
        .find(|n| n.is_in_sandbox(sandbox))
    {
        return Ok(primary.address);
    }
    if let Some(secondary) = vdb
        .nodes_in_sandbox(sandbox)
        .find(|n| !n.is_compute && n.state.is_up())
    {
        return Ok(secondary.address);
    }
    Err(OperationError::Validation(format!(
        "no up host available to act as initiator in sandbox '{sandbox}'"
    )))
}

/// Initiator selection from the context's up-host set alone, for operations
/// run before a full VDB has been populated: first up host in natural host
/// order belonging to `sandbox` (§4.4 "Initiator selection").
pub fn select_initiator_from_ctx(ctx: &ExecutionContext, sandbox: &str) -> Result<Host, OperationError> {
    let mut candidates = ctx.up_hosts_in_sandbox(sandbox);
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| OperationError::Validation(format!("no up host available in sandbox '{sandbox}'")))
}

/// Quorum check (§5, §8 property 6): `primary-UP-count-in-scope > changed`.
pub fn check_quorum(vdb: &Vdb, sandbox: &str, primary_nodes_changed: usize) -> Result<(), OperationError> {
    let up_count = vdb.primary_up_count_in_scope(sandbox);
    if up_count > primary_nodes_changed {
        Ok(())
    } else {
        Err(OperationError::NoQuorum)
    }
}

/// Enforce that an engine restricted to `sandbox` only selects initiators
/// inside that sandbox (§4.5 "wrong-sandbox").
pub fn check_sandbox_scope(initiator_sandbox: &str, engine_sandbox: Option<&str>) -> Result<(), OperationError> {
    match engine_sandbox {
        Some(scope) if scope != initiator_sandbox => Err(OperationError::WrongSandbox),
        _ => Ok(()),
    }
}
