//! Ambient configuration: thresholds read once per process, mirroring the
//! teacher's `EnterpriseClient::from_env` convention.

use std::time::Duration;

use typed_builder::TypedBuilder;

const ENV_SLOW_EVENT_THRESHOLD_MS: &str = "VCLUSTER_SLOW_EVENT_THRESHOLD_MS";
const ENV_LOCK_ATTEMPT_THRESHOLD_MS: &str = "VCLUSTER_LOCK_ATTEMPT_THRESHOLD_MS";
const ENV_LOCK_RELEASE_THRESHOLD_MS: &str = "VCLUSTER_LOCK_RELEASE_THRESHOLD_MS";
const ENV_NODE_STATE_POLLING_TIMEOUT: &str = "NODE_STATE_POLLING_TIMEOUT";

const DEFAULT_NODE_STATE_POLLING_TIMEOUT_SECS: u64 = 300;

/// Thresholds and pool sizing consumed by the engine and the cluster-health
/// verb (§6 "Environment").
#[derive(Debug, Clone, TypedBuilder)]
pub struct EngineConfig {
    #[builder(default = crate::dispatch::DEFAULT_POOL_SIZE)]
    pub worker_pool_size: usize,

    #[builder(default = Duration::from_secs(DEFAULT_NODE_STATE_POLLING_TIMEOUT_SECS))]
    pub node_state_polling_timeout: Duration,

    #[builder(default)]
    pub slow_event_threshold: Option<Duration>,

    #[builder(default)]
    pub lock_attempt_threshold: Option<Duration>,

    #[builder(default)]
    pub lock_release_threshold: Option<Duration>,
}

impl EngineConfig {
    /// Reads the three cluster-health thresholds and the node-state polling
    /// timeout from the environment, falling back to defaults when unset or
    /// unparseable (§6).
    pub fn from_env() -> Self {
        Self::builder()
            .node_state_polling_timeout(
                std::env::var(ENV_NODE_STATE_POLLING_TIMEOUT)
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(Duration::from_secs(DEFAULT_NODE_STATE_POLLING_TIMEOUT_SECS)),
            )
            .slow_event_threshold(read_ms_env(ENV_SLOW_EVENT_THRESHOLD_MS).map(Duration::from_millis))
            .lock_attempt_threshold(read_ms_env(ENV_LOCK_ATTEMPT_THRESHOLD_MS).map(Duration::from_millis))
            .lock_release_threshold(read_ms_env(ENV_LOCK_RELEASE_THRESHOLD_MS).map(Duration::from_millis))
            .build()
    }
}

fn read_ms_env(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::builder().build();
        assert_eq!(cfg.node_state_polling_timeout, Duration::from_secs(300));
        assert_eq!(cfg.worker_pool_size, crate::dispatch::DEFAULT_POOL_SIZE);
        assert!(cfg.slow_event_threshold.is_none());
    }
}
