//! Re-IP map: an ordered, atomic rewrite of one or more node addresses in
//! the catalog (§3, §4.7).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::host::Host;
use crate::error::OperationError;

/// One entry of a re-IP plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReIpEntry {
    pub node_name: String,
    pub current_address: Host,
    pub new_address: Host,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_control_address: Option<Host>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_control_broadcast: Option<Host>,
}

/// The JSON wire shape consumed by `validate::parse_re_ip_json` (§4.8):
/// `[{from_address, to_address, to_control_address?, to_control_broadcast?}]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReIpJsonEntry {
    from_address: String,
    to_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_control_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_control_broadcast: Option<String>,
}

/// An ordered, validated re-IP plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReIpList(pub Vec<ReIpEntry>);

impl ReIpList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into chunks of at most `chunk_size` entries, preserving order,
    /// for serial re-IP when `upHosts < len(reIPList)` (§4.4, §8 property
    /// 4): `ceil(len / chunk_size)` chunks, each carrying at most
    /// `chunk_size` entries.
    pub fn chunks(&self, chunk_size: usize) -> Vec<ReIpList> {
        if chunk_size == 0 {
            return vec![self.clone()];
        }
        self.0
            .chunks(chunk_size)
            .map(|c| ReIpList(c.to_vec()))
            .collect()
    }

    /// Invariant: new addresses are unique, non-unbound, and match the
    /// cluster's IP family.
    pub fn validate(&self, ipv6: bool) -> Result<(), OperationError> {
        let mut seen = HashSet::new();
        for entry in &self.0 {
            if entry.new_address.is_unbound() {
                return Err(OperationError::Validation(format!(
                    "re-IP target for {} is an unbound address",
                    entry.node_name
                )));
            }
            if entry.new_address.is_ipv6() != ipv6 {
                return Err(OperationError::Validation(format!(
                    "re-IP target {} does not match the cluster's IP family",
                    entry.new_address
                )));
            }
            if !seen.insert(entry.new_address) {
                return Err(OperationError::Validation(format!(
                    "duplicate re-IP target address {}",
                    entry.new_address
                )));
            }
        }
        Ok(())
    }
}

/// Parse the JSON array shape documented in §4.8 into a [`ReIpList`].
pub fn parse_re_ip_json(raw: &str) -> Result<ReIpList, OperationError> {
    let entries: Vec<ReIpJsonEntry> =
        serde_json::from_str(raw).map_err(|e| OperationError::Validation(format!("invalid re-IP JSON: {e}")))?;

    let mut out = Vec::with_capacity(entries.len());
    for e in entries {
        let current_address: Host = e
            .from_address
            .parse()
            .map_err(|_| OperationError::Validation(format!("invalid from_address {}", e.from_address)))?;
        let new_address: Host = e
            .to_address
            .parse()
            .map_err(|_| OperationError::Validation(format!("invalid to_address {}", e.to_address)))?;
        let new_control_address = e
            .to_control_address
            .map(|a| a.parse())
            .transpose()
            .map_err(|_| OperationError::Validation("invalid to_control_address".into()))?;
        let new_control_broadcast = e
            .to_control_broadcast
            .map(|a| a.parse())
            .transpose()
            .map_err(|_| OperationError::Validation("invalid to_control_broadcast".into()))?;
        out.push(ReIpEntry {
            node_name: String::new(),
            current_address,
            new_address,
            new_control_address,
            new_control_broadcast,
        });
    }
    Ok(ReIpList(out))
}

/// Serialize a [`ReIpList`] to the wire JSON array shape (§4.8), as a
/// [`serde_json::Value`] ready to embed in a request body.
pub fn to_re_ip_value(list: &ReIpList) -> serde_json::Value {
    let entries: Vec<ReIpJsonEntry> = list
        .0
        .iter()
        .map(|e| ReIpJsonEntry {
            from_address: e.current_address.to_string(),
            to_address: e.new_address.to_string(),
            to_control_address: e.new_control_address.map(|a| a.to_string()),
            to_control_broadcast: e.new_control_broadcast.map(|a| a.to_string()),
        })
        .collect();
    serde_json::to_value(entries).expect("ReIpJsonEntry always serializes")
}

/// Serialize a [`ReIpList`] back to the wire JSON shape as a string, for
/// the round-trip property (§8 property 8).
pub fn to_re_ip_json(list: &ReIpList) -> Result<String, OperationError> {
    serde_json::to_string(&to_re_ip_value(list)).map_err(OperationError::from)
}
