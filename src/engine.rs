//! Engine (C5): runs an ordered plan of operations under one TLS/auth
//! configuration, short-circuiting on the first fatal error.

use tracing::{debug, warn};

use crate::client::{AuthMode, HostClient, ServerVerify};
use crate::dispatch::Dispatcher;
use crate::error::OperationError;
use crate::model::ExecutionContext;
use crate::operation::Operation;

/// TLS/auth material fixed for one engine run (§4.1, §4.5).
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub auth: AuthMode,
    pub server_verify: ServerVerify,
}

impl TlsConfig {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth: AuthMode::Basic {
                username: username.into(),
                password: password.into(),
            },
            server_verify: ServerVerify::Strict,
        }
    }

    pub fn insecure(mut self) -> Self {
        self.server_verify = ServerVerify::Skip;
        self
    }
}

/// An ordered list of operations, assembled by a plan builder (C7) and run
/// unmodified by the engine.
pub struct Plan {
    steps: Vec<Box<dyn Operation>>,
}

impl Plan {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn push(mut self, step: Box<dyn Operation>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a completed engine run: the final context, for callers (plan
/// builders) that need to read back accumulators.
pub struct EngineOutcome {
    pub ctx: ExecutionContext,
}

/// Runs a [`Plan`] against a fixed worker pool and TLS configuration,
/// optionally restricted to a single sandbox (§4.5).
pub struct Engine {
    client: HostClient,
    dispatcher: Dispatcher,
    tls: TlsConfig,
    sandbox: Option<String>,
}

impl Engine {
    pub fn new(client: HostClient, pool_size: usize, tls: TlsConfig) -> Self {
        Self {
            client,
            dispatcher: Dispatcher::new(pool_size),
            tls,
            sandbox: None,
        }
    }

    /// Restrict this engine to a named sandbox: any operation whose
    /// initiator falls outside it fails with `wrong-sandbox`.
    pub fn for_sandbox(mut self, sandbox: impl Into<String>) -> Self {
        self.sandbox = Some(sandbox.into());
        self
    }

    pub fn sandbox(&self) -> Option<&str> {
        self.sandbox.as_deref()
    }

    pub fn client(&self) -> &HostClient {
        &self.client
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn auth(&self) -> &AuthMode {
        &self.tls.auth
    }

    /// Run every step of `plan` in order against a fresh context, returning
    /// the first fatal error (§4.5, §8 property 2).
    pub async fn run(&self, mut plan: Plan, mut ctx: ExecutionContext) -> Result<EngineOutcome, OperationError> {
        for step in plan.steps.iter_mut() {
            if self.dispatcher.cancel_token().is_cancelled() {
                return Err(OperationError::Cancelled);
            }

            debug!("running operation {}", step.name());
            let prepared = step.prepare(&ctx)?;
            if prepared.skip_execute {
                step.finalize(&mut ctx);
                continue;
            }

            match step.execute(&mut ctx, &self.dispatcher, &self.client, &self.tls.auth).await {
                Ok(()) => {
                    step.finalize(&mut ctx);
                }
                Err(OperationError::EofOnShutdown) if step.eof_is_benign() => {
                    step.finalize(&mut ctx);
                }
                Err(e) => {
                    warn!("operation {} failed: {e}", step.name());
                    return Err(e);
                }
            }
        }
        Ok(EngineOutcome { ctx })
    }
}
