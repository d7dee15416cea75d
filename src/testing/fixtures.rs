//! Pre-built fixtures for testing vcluster-admin-driven applications.
//!
//! All fixtures use the builder pattern for customization.
//!
//! # Example
//!
//! ```
//! use vcluster_admin::testing::fixtures::{NodeRowFixture, RestorePointFixture};
//!
//! let row = NodeRowFixture::new("v_db_node0001", "10.0.0.11").build();
//! let point = RestorePointFixture::new("nightly", 1).build();
//! ```

use serde_json::{json, Value};

/// Builder for a `GetUpNodes`-shaped node row (`/v1/nodes`'s `node_list`
/// entries).
#[derive(Debug, Clone)]
pub struct NodeRowFixture {
    address: String,
    state: String,
    sandbox: Option<String>,
}

impl NodeRowFixture {
    pub fn new(_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            state: "UP".to_string(),
            sandbox: None,
        }
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn sandbox(mut self, sandbox: impl Into<String>) -> Self {
        self.sandbox = Some(sandbox.into());
        self
    }

    pub fn build(self) -> Value {
        let mut obj = json!({
            "address": self.address,
            "state": self.state,
        });
        if let Some(sandbox) = self.sandbox {
            obj["sandbox"] = json!(sandbox);
        }
        obj
    }
}

/// Builder for a restore-point fixture (§4.7 "restore points").
#[derive(Debug, Clone)]
pub struct RestorePointFixture {
    archive: String,
    index: u32,
    timestamp: String,
}

impl RestorePointFixture {
    pub fn new(archive: impl Into<String>, index: u32) -> Self {
        Self {
            archive: archive.into(),
            index,
            timestamp: "2026-01-15T02:00:00Z".to_string(),
        }
    }

    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn build(self) -> Value {
        json!({
            "archive": self.archive,
            "index": self.index,
            "timestamp": self.timestamp,
        })
    }
}

/// Builder for a slow-event cascade row (`/v1/slow-events`, §4.4).
#[derive(Debug, Clone)]
pub struct SlowEventRowFixture {
    thread_id_hex: String,
    duration_us: u64,
    caller_thread_id_hex: Option<String>,
}

impl SlowEventRowFixture {
    pub fn new(thread_id_hex: impl Into<String>, duration_us: u64) -> Self {
        Self {
            thread_id_hex: thread_id_hex.into(),
            duration_us,
            caller_thread_id_hex: None,
        }
    }

    pub fn caller(mut self, caller_thread_id_hex: impl Into<String>) -> Self {
        self.caller_thread_id_hex = Some(caller_thread_id_hex.into());
        self
    }

    pub fn build(self) -> Value {
        let mut obj = json!({
            "thread_id_hex": self.thread_id_hex,
            "event_time": "2026-01-15T02:00:00Z",
            "duration_us": self.duration_us,
            "phases_duration_us": [],
        });
        if let Some(caller) = self.caller_thread_id_hex {
            obj["caller_thread_id_hex"] = json!(caller);
        }
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_row_fixture_defaults_to_up() {
        let row = NodeRowFixture::new("v_db_node0001", "10.0.0.11").build();
        assert_eq!(row["address"], "10.0.0.11");
        assert_eq!(row["state"], "UP");
    }

    #[test]
    fn restore_point_fixture_carries_index() {
        let point = RestorePointFixture::new("nightly", 3).build();
        assert_eq!(point["archive"], "nightly");
        assert_eq!(point["index"], 3);
    }

    #[test]
    fn slow_event_fixture_can_be_a_leaf() {
        let row = SlowEventRowFixture::new("1F4", 5000).build();
        assert!(row.get("caller_thread_id_hex").is_none());
    }
}
