//! Logical edges and the symbolic route record each one carries.

use std::fmt;

use netcheck_net::{EdgeDirection, GraphEdge, Protocol};
use netcheck_smt::constraints::Constraints;
use netcheck_smt::sorts::SmtSort;
use netcheck_smt::terms::SmtTerm;

/// Local preference of a route no filter touched.
pub const DEFAULT_LOCAL_PREF: i64 = 100;

/// Optional attributes a bundle carries beyond prefix length and admin distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub local_pref: bool,
    pub metric: bool,
    pub med: bool,
}

impl Attributes {
    /// Everything; used for the overall best route of a router.
    pub const ALL: Attributes = Attributes {
        local_pref: true,
        metric: true,
        med: true,
    };

    pub fn for_protocol(protocol: Protocol) -> Self {
        Self {
            local_pref: protocol.has_local_pref(),
            metric: protocol.has_metric(),
            med: protocol.has_med(),
        }
    }
}

/// Symbolic route record: a `permitted` flag plus the attributes compared
/// during best-path selection.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeVars {
    name: String,
    pub permitted: SmtTerm,
    pub prefix_len: SmtTerm,
    pub admin_dist: SmtTerm,
    pub local_pref: Option<SmtTerm>,
    pub metric: Option<SmtTerm>,
    pub med: Option<SmtTerm>,
}

impl EdgeVars {
    /// Declare a fresh bundle named `name` with domain bounds on each attribute.
    pub fn declare(constraints: &mut Constraints, name: &str, attrs: Attributes) -> Self {
        let permitted = constraints.declare(format!("{name}_perm"), SmtSort::Bool);
        let prefix_len = constraints.declare(format!("{name}_len"), SmtSort::Int);
        let admin_dist = constraints.declare(format!("{name}_ad"), SmtSort::Int);
        constraints.assert(prefix_len.clone().within(0, 32));
        constraints.assert(admin_dist.clone().ge(SmtTerm::int(0)));
        let local_pref = attrs.local_pref.then(|| {
            let lp = constraints.declare(format!("{name}_lp"), SmtSort::Int);
            constraints.assert(lp.clone().ge(SmtTerm::int(0)));
            lp
        });
        let metric = attrs.metric.then(|| {
            let m = constraints.declare(format!("{name}_met"), SmtSort::Int);
            constraints.assert(m.clone().ge(SmtTerm::int(0)));
            m
        });
        let med = attrs.med.then(|| {
            let m = constraints.declare(format!("{name}_med"), SmtSort::Int);
            constraints.assert(m.clone().ge(SmtTerm::int(0)));
            m
        });
        Self {
            name: name.to_string(),
            permitted,
            prefix_len,
            admin_dist,
            local_pref,
            metric,
            med,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> Attributes {
        Attributes {
            local_pref: self.local_pref.is_some(),
            metric: self.metric.is_some(),
            med: self.med.is_some(),
        }
    }

    pub fn local_pref_or_default(&self) -> SmtTerm {
        self.local_pref
            .clone()
            .unwrap_or_else(|| SmtTerm::int(DEFAULT_LOCAL_PREF))
    }

    pub fn metric_or_zero(&self) -> SmtTerm {
        self.metric.clone().unwrap_or_else(|| SmtTerm::int(0))
    }

    pub fn med_or_zero(&self) -> SmtTerm {
        self.med.clone().unwrap_or_else(|| SmtTerm::int(0))
    }

    fn int_attributes(&self) -> Vec<&SmtTerm> {
        let mut out = vec![&self.prefix_len, &self.admin_dist];
        out.extend(self.local_pref.as_ref());
        out.extend(self.metric.as_ref());
        out.extend(self.med.as_ref());
        out
    }

    /// `¬permitted ⇒ every attribute is 0`.
    pub fn zeroed_unless_permitted(&self) -> SmtTerm {
        let zeros = self
            .int_attributes()
            .into_iter()
            .map(|t| t.clone().eq(SmtTerm::int(0)))
            .collect();
        self.permitted.clone().not().implies(SmtTerm::and(zeros))
    }

    /// Attributes agree, absent ones compared as their neutral value.
    pub fn same_attributes(&self, other: &EdgeVars) -> SmtTerm {
        SmtTerm::and(vec![
            self.prefix_len.clone().eq(other.prefix_len.clone()),
            self.admin_dist.clone().eq(other.admin_dist.clone()),
            self.local_pref_or_default().eq(other.local_pref_or_default()),
            self.metric_or_zero().eq(other.metric_or_zero()),
            self.med_or_zero().eq(other.med_or_zero()),
        ])
    }

    /// Same permitted flag and same attributes.
    pub fn identical(&self, other: &EdgeVars) -> SmtTerm {
        SmtTerm::and(vec![
            self.permitted.clone().eq(other.permitted.clone()),
            self.same_attributes(other),
        ])
    }

    /// Lexicographic preference: longer prefix, lower admin distance,
    /// higher local preference, lower metric, lower MED.
    pub fn at_least_as_good(&self, other: &EdgeVars) -> SmtTerm {
        let (meda, medb) = (self.med_or_zero(), other.med_or_zero());
        let ranked = [
            (self.metric_or_zero(), other.metric_or_zero(), false),
            (self.local_pref_or_default(), other.local_pref_or_default(), true),
            (self.admin_dist.clone(), other.admin_dist.clone(), false),
            (self.prefix_len.clone(), other.prefix_len.clone(), true),
        ];
        ranked
            .into_iter()
            .fold(meda.le(medb), |rest, (a, b, higher_wins)| {
                let strictly = if higher_wins {
                    a.clone().gt(b.clone())
                } else {
                    a.clone().lt(b.clone())
                };
                SmtTerm::or(vec![strictly, SmtTerm::and(vec![a.eq(b), rest])])
            })
    }
}

/// Flat lookup key for a logical edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalEdgeKey {
    pub router: String,
    pub protocol: Protocol,
    pub interface: String,
    pub direction: EdgeDirection,
}

impl LogicalEdgeKey {
    pub fn new(router: &str, protocol: Protocol, interface: &str, direction: EdgeDirection) -> Self {
        Self {
            router: router.to_string(),
            protocol,
            interface: interface.to_string(),
            direction,
        }
    }
}

impl fmt::Display for LogicalEdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.router, self.protocol, self.interface, self.direction
        )
    }
}

/// A topology edge seen by one protocol in one direction.
#[derive(Debug, Clone)]
pub struct LogicalEdge {
    pub edge: GraphEdge,
    pub protocol: Protocol,
    pub direction: EdgeDirection,
    pub vars: EdgeVars,
}

impl LogicalEdge {
    pub fn key(&self) -> LogicalEdgeKey {
        LogicalEdgeKey::new(
            self.edge.router(),
            self.protocol,
            self.edge.interface(),
            self.direction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_respects_protocol_attributes() {
        let mut c = Constraints::new();
        let ospf = EdgeVars::declare(&mut c, "r1_ospf_eth0_in", Attributes::for_protocol(Protocol::Ospf));
        assert!(ospf.metric.is_some());
        assert!(ospf.local_pref.is_none());
        assert_eq!(ospf.local_pref_or_default(), SmtTerm::int(DEFAULT_LOCAL_PREF));
        let conn = EdgeVars::declare(
            &mut c,
            "r1_connected_eth0_in",
            Attributes::for_protocol(Protocol::Connected),
        );
        assert_eq!(
            conn.attributes(),
            Attributes { local_pref: false, metric: false, med: false }
        );
        assert!(c.is_declared("r1_ospf_eth0_in_met"));
        assert!(!c.is_declared("r1_ospf_eth0_in_med"));
        assert!(!c.is_declared("r1_connected_eth0_in_met"));
        let bgp = EdgeVars::declare(&mut c, "r1_bgp_eth0_in", Attributes::for_protocol(Protocol::Bgp));
        assert!(bgp.med.is_some() && bgp.metric.is_some());
    }

    #[test]
    fn med_only_breaks_ties_after_the_metric() {
        let mut c = Constraints::new();
        let a = EdgeVars::declare(&mut c, "a", Attributes::for_protocol(Protocol::Bgp));
        let b = EdgeVars::declare(&mut c, "b", Attributes::for_protocol(Protocol::Bgp));
        let text = format!("{:?}", a.at_least_as_good(&b));
        let metric = text.find("a_met").unwrap();
        let med = text.find("a_med").unwrap();
        assert!(metric < med);
    }

    #[test]
    fn preference_between_metric_free_bundles_skips_neutral_attributes() {
        let mut c = Constraints::new();
        let a = EdgeVars::declare(&mut c, "a", Attributes::for_protocol(Protocol::Static));
        let b = EdgeVars::declare(&mut c, "b", Attributes::for_protocol(Protocol::Static));
        let text = format!("{:?}", a.at_least_as_good(&b));
        assert!(!text.contains("IntLit(100)"));
        assert!(a.same_attributes(&a).is_true());
    }

    #[test]
    fn keys_order_and_display() {
        let k = LogicalEdgeKey::new("r1", Protocol::Bgp, "eth0", EdgeDirection::Import);
        assert_eq!(k.to_string(), "r1_bgp_eth0_in");
        let later = LogicalEdgeKey::new("r1", Protocol::Bgp, "eth0", EdgeDirection::Export);
        assert!(k < later);
    }
}
