//! Dispatcher (C2): bounded-concurrency per-host request fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::error::{HostError, OperationError};
use crate::model::Host;

/// Default worker pool size (§5).
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Per-host outcome of a single fanned-out call.
pub type PerHostResults<T> = HashMap<Host, Result<T, OperationError>>;

/// A cancellation signal shared by every in-flight and not-yet-started
/// per-host task. Built on `tokio::sync::watch<bool>` rather than
/// `tokio_util::sync::CancellationToken` so the engine's dependency stack
/// doesn't grow a crate neither the teacher nor the rest of the pack already
/// carries (§4.2).
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded worker pool fanning one request out across a set of hosts.
pub struct Dispatcher {
    pool_size: usize,
    cancel: CancelToken,
}

impl Dispatcher {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size: pool_size.max(1),
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run `f` once per host, bounded to `pool_size` concurrent tasks,
    /// joining results keyed by host. A host whose task observes
    /// cancellation before starting contributes `OperationError::Cancelled`.
    pub async fn run<T, F, Fut>(&self, hosts: &[Host], f: F) -> PerHostResults<T>
    where
        T: Send + 'static,
        F: Fn(Host) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let f = Arc::new(f);
        let mut set = JoinSet::new();

        for host in hosts {
            let host = *host;
            let semaphore = semaphore.clone();
            let f = f.clone();
            let cancel = self.cancel.clone();

            set.spawn(async move {
                if cancel.is_cancelled() {
                    return (host, Err(OperationError::Cancelled));
                }
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                if cancel.is_cancelled() {
                    return (host, Err(OperationError::Cancelled));
                }
                let result = f(host).await;
                (host, result)
            });
        }

        let mut results = PerHostResults::with_capacity(hosts.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((host, result)) => {
                    results.insert(host, result);
                }
                Err(join_err) => {
                    // A spawned task panicked; no host identity survives a JoinError,
                    // so this can only be logged, not attributed.
                    tracing::warn!("dispatcher task panicked: {join_err}");
                }
            }
        }
        results
    }

    /// Collapse per-host results into a joined [`crate::error::VerbError`],
    /// dropping `EofOnShutdown` entries when the caller has declared the
    /// request shutdown-triggering (benign EOF, §4.2, §7).
    pub fn join_errors<T>(verb: &str, results: PerHostResults<T>, eof_is_benign: bool) -> Result<Vec<(Host, T)>, crate::error::VerbError> {
        let mut oks = Vec::new();
        let mut errs = Vec::new();
        for (host, result) in results {
            match result {
                Ok(v) => oks.push((host, v)),
                Err(OperationError::EofOnShutdown) if eof_is_benign => {}
                Err(e) => errs.push(HostError::new(host, e)),
            }
        }
        if errs.is_empty() {
            Ok(oks)
        } else {
            Err(crate::error::VerbError::from_hosts(verb, errs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hosts(n: u8) -> Vec<Host> {
        (1..=n).map(|i| format!("10.0.0.{i}").parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn runs_one_task_per_host() {
        let dispatcher = Dispatcher::new(DEFAULT_POOL_SIZE);
        let hosts = hosts(3);
        let results = dispatcher.run(&hosts, |host| async move { Ok::<_, OperationError>(host.to_string()) }).await;
        assert_eq!(results.len(), 3);
        for host in &hosts {
            assert_eq!(results[host].as_ref().unwrap(), &host.to_string());
        }
    }

    #[tokio::test]
    async fn bounds_concurrency_to_pool_size() {
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(2);
        let hosts = hosts(6);

        let c1 = concurrent.clone();
        let c2 = max_seen.clone();
        dispatcher
            .run(&hosts, move |_host| {
                let concurrent = c1.clone();
                let max_seen = c2.clone();
                async move {
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, OperationError>(())
                }
            })
            .await;

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_unstarted_tasks() {
        let dispatcher = Dispatcher::new(1);
        let token = dispatcher.cancel_token();
        token.cancel();
        let hosts = hosts(2);
        let results = dispatcher.run(&hosts, |_host| async move { Ok::<_, OperationError>(()) }).await;
        assert!(results.values().all(|r| matches!(r, Err(OperationError::Cancelled))));
    }

    #[test]
    fn join_errors_drops_benign_eof() {
        let mut results = PerHostResults::new();
        let h1: Host = "10.0.0.1".parse().unwrap();
        let h2: Host = "10.0.0.2".parse().unwrap();
        results.insert(h1, Ok(()));
        results.insert(h2, Err(OperationError::EofOnShutdown));
        let joined = Dispatcher::join_errors("stop nodes", results, true);
        assert!(joined.is_ok());
        assert_eq!(joined.unwrap().len(), 1);
    }

    #[test]
    fn join_errors_surfaces_eof_when_not_benign() {
        let mut results = PerHostResults::new();
        let h1: Host = "10.0.0.1".parse().unwrap();
        results.insert(h1, Err(OperationError::EofOnShutdown));
        let joined = Dispatcher::join_errors("start nodes", results, false);
        assert!(joined.is_err());
    }
}
