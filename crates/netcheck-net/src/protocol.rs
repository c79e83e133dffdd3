use std::fmt;

use serde::{Deserialize, Serialize};

/// Routing protocols a router can select routes from.
///
/// The set is closed. Encoders dispatch on it with exhaustive `match`es, so a
/// new variant is a compile error everywhere behavior must be defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Connected,
    Static,
    Ospf,
    Bgp,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [
        Protocol::Connected,
        Protocol::Static,
        Protocol::Ospf,
        Protocol::Bgp,
    ];

    pub fn default_admin_distance(self) -> u32 {
        match self {
            Protocol::Connected => 0,
            Protocol::Static => 1,
            Protocol::Ospf => 110,
            Protocol::Bgp => 20,
        }
    }

    /// Whether best-path selection for this protocol compares a metric.
    pub fn has_metric(self) -> bool {
        matches!(self, Protocol::Ospf | Protocol::Bgp)
    }

    /// Whether best-path selection for this protocol compares local preference.
    pub fn has_local_pref(self) -> bool {
        matches!(self, Protocol::Bgp)
    }

    /// Whether routes carry a filter-settable discriminator compared after the metric.
    pub fn has_med(self) -> bool {
        matches!(self, Protocol::Bgp)
    }

    pub fn name(self) -> &'static str {
        match self {
            Protocol::Connected => "connected",
            Protocol::Static => "static",
            Protocol::Ospf => "ospf",
            Protocol::Bgp => "bgp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which way a route moves across an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    Import,
    Export,
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EdgeDirection::Import => "in",
            EdgeDirection::Export => "out",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_admin_distances() {
        let ads: Vec<u32> = Protocol::ALL
            .iter()
            .map(|p| p.default_admin_distance())
            .collect();
        assert_eq!(ads, vec![0, 1, 110, 20]);
    }

    #[test]
    fn protocols_deserialize_lowercase() {
        let p: Vec<Protocol> = serde_json::from_str(r#"["ospf", "static"]"#).unwrap();
        assert_eq!(p, vec![Protocol::Ospf, Protocol::Static]);
        assert_eq!(Protocol::Bgp.to_string(), "bgp");
    }
}
