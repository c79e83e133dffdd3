//! Vendor-neutral router configuration.
//!
//! These types are what a configuration parser hands to netcheck. They are
//! plain data: serde-deserializable, read-only to the encoder.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::NetError;
use crate::protocol::Protocol;

/// An IPv4 address with a prefix length, e.g. `10.0.0.1/30`.
///
/// The host bits are kept, so an interface address and the subnet it lives
/// on are the same type. Use [`Prefix::network`] for the masked form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix {
    address: Ipv4Addr,
    length: u8,
}

impl Prefix {
    pub fn new(address: Ipv4Addr, length: u8) -> Result<Self, NetError> {
        if length > 32 {
            return Err(NetError::InvalidPrefix(format!("{address}/{length}")));
        }
        Ok(Self { address, length })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn mask(&self) -> u32 {
        match self.length {
            0 => 0,
            len => u32::MAX << (32 - u32::from(len)),
        }
    }

    /// The prefix with host bits cleared.
    pub fn network(&self) -> Prefix {
        Prefix {
            address: Ipv4Addr::from(u32::from(self.address) & self.mask()),
            length: self.length,
        }
    }

    /// Lowest address in the subnet, as an integer.
    pub fn first(&self) -> u32 {
        u32::from(self.address) & self.mask()
    }

    /// Highest address in the subnet, as an integer.
    pub fn last(&self) -> u32 {
        self.first() | !self.mask()
    }

    pub fn contains_addr(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.mask() == self.first()
    }

    /// True if every address of `other` is inside `self`.
    pub fn contains(&self, other: &Prefix) -> bool {
        other.length >= self.length && self.contains_addr(other.address)
    }

    pub fn same_subnet(&self, other: &Prefix) -> bool {
        self.network() == other.network()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.length)
    }
}

impl FromStr for Prefix {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetError::InvalidPrefix(s.to_string());
        let (addr, len) = s.split_once('/').ok_or_else(invalid)?;
        let address = addr.trim().parse::<Ipv4Addr>().map_err(|_| invalid())?;
        let length = len.trim().parse::<u8>().map_err(|_| invalid())?;
        Prefix::new(address, length)
    }
}

impl TryFrom<String> for Prefix {
    type Error = NetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Prefix> for String {
    fn from(value: Prefix) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Permit,
    Deny,
}

/// One line of a route filter (a prefix-list/route-map hybrid).
///
/// Without `ge`/`le` the line matches only routes of exactly the line's
/// prefix length, like a Cisco prefix-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFilterLine {
    pub action: FilterAction,
    pub prefix: Prefix,
    #[serde(default)]
    pub ge: Option<u8>,
    #[serde(default)]
    pub le: Option<u8>,
    #[serde(default)]
    pub set_local_pref: Option<u32>,
    /// Sets the multi-exit discriminator of a BGP route. The AS-path length
    /// is not filter-settable.
    #[serde(default)]
    pub set_metric: Option<u32>,
}

impl RouteFilterLine {
    /// Inclusive range of route prefix lengths this line matches.
    pub fn length_range(&self) -> (u8, u8) {
        let base = self.prefix.length();
        match (self.ge, self.le) {
            (None, None) => (base, base),
            (Some(ge), None) => (ge.max(base), 32),
            (None, Some(le)) => (base, le.min(32)),
            (Some(ge), Some(le)) => (ge.max(base), le.min(32)),
        }
    }
}

/// First-match route filter; a route matching no line is denied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFilter {
    #[serde(default)]
    pub lines: Vec<RouteFilterLine>,
}

/// One line of a packet filter. Absent match fields match everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketFilterLine {
    pub action: FilterAction,
    #[serde(default)]
    pub destination: Option<Prefix>,
    #[serde(default)]
    pub source: Option<Prefix>,
}

/// First-match packet filter; a packet matching no line is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketFilter {
    #[serde(default)]
    pub lines: Vec<PacketFilterLine>,
}

fn default_true() -> bool {
    true
}

fn default_ospf_cost() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    #[serde(default)]
    pub address: Option<Prefix>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub ospf: bool,
    #[serde(default = "default_ospf_cost")]
    pub ospf_cost: u32,
    /// Packet filter applied to traffic leaving through this interface.
    #[serde(default)]
    pub outbound_filter: Option<String>,
}

impl InterfaceConfig {
    pub fn new(address: Prefix) -> Self {
        Self {
            address: Some(address),
            active: true,
            ospf: false,
            ospf_cost: 1,
            outbound_filter: None,
        }
    }

    /// OSPF cost, never below 1.
    pub fn cost(&self) -> u32 {
        self.ospf_cost.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub prefix: Prefix,
    #[serde(default)]
    pub next_hop_interface: Option<String>,
    #[serde(default)]
    pub next_hop_ip: Option<Ipv4Addr>,
    #[serde(default)]
    pub admin_distance: Option<u32>,
}

impl StaticRoute {
    pub fn admin_distance(&self) -> u32 {
        self.admin_distance
            .unwrap_or_else(|| Protocol::Static.default_admin_distance())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfConfig {
    #[serde(default)]
    pub redistribute: Vec<Protocol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpNeighbor {
    pub peer_address: Ipv4Addr,
    pub remote_as: u32,
    #[serde(default)]
    pub import_filter: Option<String>,
    #[serde(default)]
    pub export_filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpConfig {
    pub local_as: u32,
    #[serde(default)]
    pub networks: Vec<Prefix>,
    #[serde(default)]
    pub neighbors: Vec<BgpNeighbor>,
    #[serde(default)]
    pub redistribute: Vec<Protocol>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub interfaces: IndexMap<String, InterfaceConfig>,
    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,
    #[serde(default)]
    pub ospf: Option<OspfConfig>,
    #[serde(default)]
    pub bgp: Option<BgpConfig>,
    #[serde(default)]
    pub route_filters: IndexMap<String, RouteFilter>,
    #[serde(default)]
    pub packet_filters: IndexMap<String, PacketFilter>,
}

impl RouterConfig {
    /// Protocols this router runs, in selection order. Connected is present
    /// whenever some active interface has an address.
    pub fn protocols(&self) -> Vec<Protocol> {
        let mut out = Vec::new();
        if self
            .interfaces
            .values()
            .any(|iface| iface.active && iface.address.is_some())
        {
            out.push(Protocol::Connected);
        }
        if !self.static_routes.is_empty() {
            out.push(Protocol::Static);
        }
        if self.ospf.is_some() {
            out.push(Protocol::Ospf);
        }
        if self.bgp.is_some() {
            out.push(Protocol::Bgp);
        }
        out
    }

    /// Protocols redistributed into `protocol`.
    pub fn redistributed_into(&self, protocol: Protocol) -> &[Protocol] {
        match protocol {
            Protocol::Ospf => self
                .ospf
                .as_ref()
                .map(|o| o.redistribute.as_slice())
                .unwrap_or(&[]),
            Protocol::Bgp => self
                .bgp
                .as_ref()
                .map(|b| b.redistribute.as_slice())
                .unwrap_or(&[]),
            Protocol::Connected | Protocol::Static => &[],
        }
    }

    pub fn route_filter(&self, name: &str) -> Option<&RouteFilter> {
        self.route_filters.get(name)
    }

    pub fn packet_filter(&self, name: &str) -> Option<&PacketFilter> {
        self.packet_filters.get(name)
    }
}

/// All router configurations of a network, keyed by router name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub routers: IndexMap<String, RouterConfig>,
}

impl NetworkConfig {
    pub fn from_json(source: &str) -> Result<Self, NetError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn router(&self, name: &str) -> Option<&RouterConfig> {
        self.routers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_parses_and_masks() {
        let p: Prefix = "10.1.2.3/24".parse().unwrap();
        assert_eq!(p.address(), Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(p.network().to_string(), "10.1.2.0/24");
        assert_eq!(p.first(), u32::from(Ipv4Addr::new(10, 1, 2, 0)));
        assert_eq!(p.last(), u32::from(Ipv4Addr::new(10, 1, 2, 255)));
    }

    #[test]
    fn zero_length_prefix_covers_everything() {
        let p: Prefix = "0.0.0.0/0".parse().unwrap();
        assert_eq!(p.first(), 0);
        assert_eq!(p.last(), u32::MAX);
        assert!(p.contains_addr(Ipv4Addr::new(203, 0, 113, 9)));
    }

    #[test]
    fn invalid_prefixes_are_rejected() {
        assert!("10.0.0.0".parse::<Prefix>().is_err());
        assert!("10.0.0.0/33".parse::<Prefix>().is_err());
        assert!("10.0.0/8".parse::<Prefix>().is_err());
    }

    #[test]
    fn containment_respects_length() {
        let wide: Prefix = "10.0.0.0/8".parse().unwrap();
        let narrow: Prefix = "10.4.0.0/16".parse().unwrap();
        assert!(wide.contains(&narrow));
        assert!(!narrow.contains(&wide));
    }

    #[test]
    fn route_filter_line_length_ranges() {
        let line = |ge, le| RouteFilterLine {
            action: FilterAction::Permit,
            prefix: "10.0.0.0/8".parse().unwrap(),
            ge,
            le,
            set_local_pref: None,
            set_metric: None,
        };
        assert_eq!(line(None, None).length_range(), (8, 8));
        assert_eq!(line(Some(16), None).length_range(), (16, 32));
        assert_eq!(line(None, Some(24)).length_range(), (8, 24));
        assert_eq!(line(Some(4), Some(40)).length_range(), (8, 32));
    }

    #[test]
    fn router_protocols_follow_configuration() {
        let json = r#"{
            "routers": {
                "r1": {
                    "interfaces": { "eth0": { "address": "10.0.0.1/30", "ospf": true } },
                    "static_routes": [
                        { "prefix": "192.168.0.0/24", "next_hop_interface": "eth0" }
                    ],
                    "ospf": { "redistribute": ["static"] }
                }
            }
        }"#;
        let net = NetworkConfig::from_json(json).unwrap();
        let r1 = net.router("r1").unwrap();
        assert_eq!(
            r1.protocols(),
            vec![Protocol::Connected, Protocol::Static, Protocol::Ospf]
        );
        assert_eq!(r1.redistributed_into(Protocol::Ospf), &[Protocol::Static]);
        assert_eq!(r1.static_routes[0].admin_distance(), 1);
        assert_eq!(r1.interfaces["eth0"].cost(), 1);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = NetworkConfig::from_json("{ \"routers\": 3 }").unwrap_err();
        assert!(matches!(err, NetError::Config(_)));
    }
}
