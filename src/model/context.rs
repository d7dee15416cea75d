//! Execution Context (C3): the per-run scratchpad operations read and write
//! as a plan executes (§3, §4.3, §9).
//!
//! Each accumulator is single-writer: the operation that produces a value
//! seals it with `seal_*`, and every later operation only reads it. The
//! engine's strict operation ordering gives a happens-before relationship
//! between a seal and any later read, so no lock is required — attempting
//! to seal a field twice is a programmer error in a plan builder and is
//! caught by `seal_once` panicking rather than silently overwriting data a
//! later step may have already read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::host::Host;

/// One row of the cluster-health slow-event cascade (§4.4 family
/// "Cluster health / cascade graph").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowEvent {
    pub thread_id: u64,
    pub event_time: DateTime<Utc>,
    pub duration_us: u64,
    pub phases_duration_us: Vec<String>,
    pub caller_thread_id: Option<u64>,
    pub is_leaf: bool,
    pub hold_events: Vec<HoldEvent>,
}

/// A lock hold-event enriching a leaf of the slow-event cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldEvent {
    pub lock_name: String,
    pub held_from: Option<DateTime<Utc>>,
    pub held_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub host: Host,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub host: Host,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainingStatus {
    pub host: Host,
    pub draining: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestorePoint {
    pub archive: String,
    pub index: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedFile {
    pub table_name: String,
    pub host: Host,
    pub bytes_written: u64,
}

/// Cross-step scratchpad for one engine run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    up_hosts: Vec<Host>,
    up_hosts_to_sandbox: HashMap<Host, String>,
    hosts_with_latest_catalog: Vec<Host>,
    default_subcluster: String,

    slow_events: Option<Vec<SlowEvent>>,
    sessions: Option<Vec<SessionRecord>>,
    transactions: Option<Vec<TransactionRecord>>,
    draining_status: Option<Vec<DrainingStatus>>,
    restore_points: Option<Vec<RestorePoint>>,
    staged_files: Option<Vec<StagedFile>>,
    tls_digest: Option<String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_subcluster(mut self, name: impl Into<String>) -> Self {
        self.default_subcluster = name.into();
        self
    }

    pub fn default_subcluster(&self) -> &str {
        &self.default_subcluster
    }

    /// Seed up-host discovery results (§4.4 "Up-host discovery").
    pub fn seal_up_hosts(&mut self, up_hosts: Vec<Host>, up_hosts_to_sandbox: HashMap<Host, String>) {
        assert!(self.up_hosts.is_empty(), "up_hosts sealed twice in one plan");
        self.up_hosts = up_hosts;
        self.up_hosts_to_sandbox = up_hosts_to_sandbox;
    }

    pub fn up_hosts(&self) -> &[Host] {
        &self.up_hosts
    }

    pub fn up_hosts_in_sandbox(&self, sandbox: &str) -> Vec<Host> {
        self.up_hosts
            .iter()
            .filter(|h| self.up_hosts_to_sandbox.get(h).map(String::as_str).unwrap_or("") == sandbox)
            .copied()
            .collect()
    }

    pub fn seal_latest_catalog_hosts(&mut self, hosts: Vec<Host>) {
        assert!(
            self.hosts_with_latest_catalog.is_empty(),
            "latest-catalog hosts sealed twice in one plan"
        );
        self.hosts_with_latest_catalog = hosts;
    }

    pub fn hosts_with_latest_catalog(&self) -> &[Host] {
        &self.hosts_with_latest_catalog
    }
}

/// Generates a `seal_<field>`/`<field>` accessor pair for an
/// `Option<Vec<T>>` accumulator that must be written exactly once.
macro_rules! accumulator {
    ($seal:ident, $get:ident, $field:ident, $ty:ty) => {
        impl ExecutionContext {
            pub fn $seal(&mut self, value: $ty) {
                assert!(
                    self.$field.is_none(),
                    concat!(stringify!($field), " sealed twice in one plan")
                );
                self.$field = Some(value);
            }

            pub fn $get(&self) -> Option<&$ty> {
                self.$field.as_ref()
            }
        }
    };
}

accumulator!(seal_slow_events, slow_events, slow_events, Vec<SlowEvent>);
accumulator!(seal_sessions, sessions, sessions, Vec<SessionRecord>);
accumulator!(seal_transactions, transactions, transactions, Vec<TransactionRecord>);
accumulator!(seal_draining_status, draining_status, draining_status, Vec<DrainingStatus>);
accumulator!(seal_restore_points, restore_points, restore_points, Vec<RestorePoint>);
accumulator!(seal_staged_files, staged_files, staged_files, Vec<StagedFile>);

impl ExecutionContext {
    pub fn seal_tls_digest(&mut self, digest: String) {
        assert!(self.tls_digest.is_none(), "tls_digest sealed twice in one plan");
        self.tls_digest = Some(digest);
    }

    pub fn tls_digest(&self) -> Option<&str> {
        self.tls_digest.as_deref()
    }
}
