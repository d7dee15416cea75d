//! Cluster health / cascade graph (§4.4, §4.7): walks a tree of slow events
//! by repeatedly asking for the caller-thread of the current event and its
//! session/transaction records. Scenario S5.
//!
//! Cluster-health appears in two overlapping option shapes in the source
//! this spec was distilled from; this module keeps a single canonical
//! shape (`Options` below) per the open question in §9.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::client::{AuthMode, HostClient};
use crate::dispatch::Dispatcher;
use crate::engine::{Engine, Plan};
use crate::error::{OperationError, VerbError, VerbResult};
use crate::model::{ExecutionContext, Host, HoldEvent, SlowEvent};
use crate::operation::{Operation, PreparedRequests};
use crate::validate::validate_db_name;

/// Cascades stop once a level exceeds this depth (§4.4, §8 scenario S5).
const MAX_CASCADE_DEPTH: usize = 100;
const HTTPS_PORT: u16 = 8443;

#[derive(Debug, Clone, TypedBuilder)]
pub struct Options {
    pub db_name: String,
    pub initiator: Host,
    pub slow_threshold: Option<Duration>,
    pub lock_attempt_threshold: Option<Duration>,
    pub lock_release_threshold: Option<Duration>,
}

pub struct Outcome {
    pub events: Vec<SlowEvent>,
}

#[derive(Debug, Deserialize)]
struct SlowEventRow {
    thread_id_hex: String,
    event_time: DateTime<Utc>,
    duration_us: u64,
    phases_duration_us: Vec<String>,
    caller_thread_id_hex: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HoldEventRow {
    lock_name: String,
    held_from: Option<String>,
    held_until: Option<String>,
}

/// Parse a hex thread-id such as `"1F4"` into its decimal value (500).
fn thread_id_from_hex(hex: &str) -> Result<u64, OperationError> {
    u64::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|e| OperationError::Parse(format!("invalid thread-id hex '{hex}': {e}")))
}

/// `fillLockHoldInfo` swallows time-parse errors by returning an empty
/// timestamp rather than failing the whole cascade (§9 open question,
/// preserved deliberately rather than "fixed").
fn parse_hold_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.with_timezone(&Utc))
}

struct CascadeWalk {
    options: Options,
    events: Vec<SlowEvent>,
}

#[async_trait]
impl Operation for CascadeWalk {
    fn name(&self) -> &'static str {
        "cluster-health-cascade"
    }

    fn prepare(&mut self, _ctx: &ExecutionContext) -> Result<PreparedRequests, OperationError> {
        Ok(PreparedRequests::new(vec![self.options.initiator]))
    }

    async fn execute(
        &mut self,
        _ctx: &mut ExecutionContext,
        _dispatcher: &Dispatcher,
        client: &HostClient,
        auth: &AuthMode,
    ) -> Result<(), OperationError> {
        let host = self.options.initiator;

        let slowest = match client
            .get::<SlowEventRow>(&host, HTTPS_PORT, "/v1/slow-events?order=slowest", auth)
            .await
        {
            crate::client::HostOutcome::Passing(row) => row,
            _ => return Err(OperationError::Transport("failed to fetch slowest event".into())),
        };

        let mut current = slowest;
        let mut current_thread = thread_id_from_hex(&current.thread_id_hex)?;
        let mut depth = 0usize;

        loop {
            let is_leaf = match &current.caller_thread_id_hex {
                None => true,
                Some(hex) => {
                    let caller_thread = thread_id_from_hex(hex)?;
                    caller_thread == current_thread
                }
            };

            let mut hold_events = Vec::new();
            if is_leaf {
                let path = format!("/v1/lock-holds?thread_id={current_thread}");
                if let crate::client::HostOutcome::Passing(rows) =
                    client.get::<Vec<HoldEventRow>>(&host, HTTPS_PORT, &path, auth).await
                {
                    hold_events = rows
                        .into_iter()
                        .map(|r| HoldEvent {
                            lock_name: r.lock_name,
                            held_from: parse_hold_time(r.held_from.as_deref()),
                            held_until: parse_hold_time(r.held_until.as_deref()),
                        })
                        .collect();
                }
            }

            self.events.push(SlowEvent {
                thread_id: current_thread,
                event_time: current.event_time,
                duration_us: current.duration_us,
                phases_duration_us: current.phases_duration_us.clone(),
                caller_thread_id: current.caller_thread_id_hex.as_deref().map(thread_id_from_hex).transpose()?,
                is_leaf,
                hold_events,
            });

            if is_leaf {
                break;
            }
            depth += 1;
            if depth >= MAX_CASCADE_DEPTH {
                break;
            }

            let caller_hex = current.caller_thread_id_hex.clone().unwrap();
            let caller_thread = thread_id_from_hex(&caller_hex)?;
            let window_start = current.event_time - chrono::Duration::microseconds(current.duration_us as i64);
            let path = format!(
                "/v1/sessions-and-transactions?thread_id={caller_thread}&from={}&to={}",
                window_start.to_rfc3339(),
                current.event_time.to_rfc3339()
            );
            match client.get::<SlowEventRow>(&host, HTTPS_PORT, &path, auth).await {
                crate::client::HostOutcome::Passing(row) => {
                    current_thread = caller_thread;
                    current = row;
                }
                _ => break,
            }
        }

        Ok(())
    }

    fn finalize(&mut self, ctx: &mut ExecutionContext) {
        ctx.seal_slow_events(std::mem::take(&mut self.events));
    }
}

pub async fn run(engine: &Engine, options: Options) -> VerbResult<Outcome> {
    let verb = format!("inspect cluster health for {}", options.db_name);
    validate_db_name(&options.db_name).map_err(|e| VerbError::cause(verb.clone(), e))?;

    let walk = CascadeWalk {
        options: options.clone(),
        events: Vec::new(),
    };
    let plan = Plan::new().push(Box::new(walk));

    let outcome = engine
        .run(plan, ExecutionContext::new())
        .await
        .map_err(|e| VerbError::cause(verb, e))?;

    let events = outcome.ctx.slow_events().cloned().unwrap_or_default();
    Ok(Outcome { events })
}
