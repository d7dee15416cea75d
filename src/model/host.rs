//! Host identity: a resolved IPv4/IPv6 literal, the canonical key used
//! throughout the cluster snapshot and per-host request/result maps.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A resolved host address. Hostnames are resolved to IPs before entering
/// the engine (resolution itself is out of scope, §1); everywhere past that
/// boundary a `Host` is the identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(IpAddr);

impl Host {
    pub fn new(addr: IpAddr) -> Self {
        Self(addr)
    }

    /// `0.0.0.0`: a node whose address has not yet been bound.
    pub fn unbound_v4() -> Self {
        Self(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
    }

    /// `::`: the IPv6 equivalent of [`Host::unbound_v4`].
    pub fn unbound_v6() -> Self {
        Self(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED))
    }

    /// Whether this host is an unbound sentinel ("node known, address not
    /// yet assigned") rather than a real, routable address.
    pub fn is_unbound(&self) -> bool {
        self.0.is_unspecified()
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self.0, IpAddr::V6(_))
    }

    pub fn addr(&self) -> IpAddr {
        self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Host {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Host(s.parse()?))
    }
}

impl From<IpAddr> for Host {
    fn from(addr: IpAddr) -> Self {
        Host(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_sentinels_are_unspecified() {
        assert!(Host::unbound_v4().is_unbound());
        assert!(Host::unbound_v6().is_unbound());
        assert!(!"10.0.0.1".parse::<Host>().unwrap().is_unbound());
    }

    #[test]
    fn ipv6_detection() {
        assert!(!"10.0.0.1".parse::<Host>().unwrap().is_ipv6());
        assert!("::1".parse::<Host>().unwrap().is_ipv6());
    }

    #[test]
    fn ordering_is_natural_ip_order() {
        let a: Host = "10.0.0.1".parse().unwrap();
        let b: Host = "10.0.0.2".parse().unwrap();
        assert!(a < b);
    }
}
