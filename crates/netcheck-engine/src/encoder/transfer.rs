//! Per-protocol transfer functions: how a route record is produced on each
//! import and export edge.

use netcheck_net::config::{FilterAction, Prefix, RouteFilter, StaticRoute};
use netcheck_net::graph::SessionKind;
use netcheck_net::{EdgeDirection, Protocol};
use netcheck_smt::terms::SmtTerm;
use tracing::warn;

use super::Encoder;
use crate::logical_edge::{EdgeVars, LogicalEdge, LogicalEdgeKey, DEFAULT_LOCAL_PREF};

/// Metric given to routes redistributed into OSPF.
const OSPF_REDISTRIBUTED_METRIC: i64 = 20;

/// A route record expressed as terms, before it is tied to a bundle.
#[derive(Debug, Clone)]
struct Candidate {
    permitted: SmtTerm,
    prefix_len: SmtTerm,
    admin_dist: SmtTerm,
    local_pref: SmtTerm,
    metric: SmtTerm,
    med: SmtTerm,
}

impl Candidate {
    fn none() -> Self {
        Self {
            permitted: SmtTerm::ff(),
            prefix_len: SmtTerm::int(0),
            admin_dist: SmtTerm::int(0),
            local_pref: SmtTerm::int(0),
            metric: SmtTerm::int(0),
            med: SmtTerm::int(0),
        }
    }

    fn from_vars(vars: &EdgeVars) -> Self {
        Self {
            permitted: vars.permitted.clone(),
            prefix_len: vars.prefix_len.clone(),
            admin_dist: vars.admin_dist.clone(),
            local_pref: vars.local_pref_or_default(),
            metric: vars.metric_or_zero(),
            med: vars.med_or_zero(),
        }
    }

    fn with_admin_dist(mut self, ad: u32) -> Self {
        self.admin_dist = SmtTerm::int(i64::from(ad));
        self
    }

    fn with_metric(mut self, metric: SmtTerm) -> Self {
        self.metric = metric;
        self
    }

    fn with_local_pref(mut self, local_pref: SmtTerm) -> Self {
        self.local_pref = local_pref;
        self
    }

    fn with_med(mut self, med: SmtTerm) -> Self {
        self.med = med;
        self
    }

    /// The first permitted candidate in `ordered`, or nothing.
    fn first_available(ordered: Vec<Candidate>) -> Candidate {
        ordered.into_iter().rev().fold(Candidate::none(), |rest, c| Candidate {
            permitted: SmtTerm::or(vec![c.permitted.clone(), rest.permitted]),
            prefix_len: SmtTerm::ite(c.permitted.clone(), c.prefix_len, rest.prefix_len),
            admin_dist: SmtTerm::ite(c.permitted.clone(), c.admin_dist, rest.admin_dist),
            local_pref: SmtTerm::ite(c.permitted.clone(), c.local_pref, rest.local_pref),
            metric: SmtTerm::ite(c.permitted.clone(), c.metric, rest.metric),
            med: SmtTerm::ite(c.permitted, c.med, rest.med),
        })
    }

    /// Constraints making `target` carry this record, zeroed when not permitted.
    fn assign(&self, target: &EdgeVars) -> Vec<SmtTerm> {
        let guarded = |value: &SmtTerm| SmtTerm::ite(self.permitted.clone(), value.clone(), SmtTerm::int(0));
        let mut out = vec![
            target.permitted.clone().eq(self.permitted.clone()),
            target.prefix_len.clone().eq(guarded(&self.prefix_len)),
            target.admin_dist.clone().eq(guarded(&self.admin_dist)),
        ];
        if let Some(lp) = &target.local_pref {
            out.push(lp.clone().eq(guarded(&self.local_pref)));
        }
        if let Some(metric) = &target.metric {
            out.push(metric.clone().eq(guarded(&self.metric)));
        }
        if let Some(med) = &target.med {
            out.push(med.clone().eq(guarded(&self.med)));
        }
        out
    }
}

/// How a named route filter resolves on a router.
enum FilterRef<'a> {
    PermitAll,
    DenyAll,
    Lines(&'a RouteFilter),
}

/// Result of running a route through a filter. Filters may rewrite local
/// preference and MED, never the AS-path length.
struct FilterOutcome {
    accept: SmtTerm,
    local_pref: SmtTerm,
    med: SmtTerm,
}

impl Encoder {
    pub(super) fn add_transfer_functions(&mut self) {
        let mut terms = Vec::new();
        for edge in self.logical_edges.values() {
            let candidate = self.transfer(edge);
            terms.extend(candidate.assign(&edge.vars));
        }
        for term in terms {
            self.constraints.assert(term);
        }
    }

    fn transfer(&self, le: &LogicalEdge) -> Candidate {
        match (le.protocol, le.direction) {
            (Protocol::Connected, EdgeDirection::Import) => self.connected_import(le),
            (Protocol::Static, EdgeDirection::Import) => self.static_import(le),
            (Protocol::Ospf, EdgeDirection::Import) => self.ospf_import(le),
            (Protocol::Ospf, EdgeDirection::Export) => self.ospf_export(le),
            (Protocol::Bgp, EdgeDirection::Import) => self.bgp_import(le),
            (Protocol::Bgp, EdgeDirection::Export) => self.bgp_export(le),
            (Protocol::Connected | Protocol::Static, EdgeDirection::Export) => Candidate::none(),
        }
    }

    fn connected_import(&self, le: &LogicalEdge) -> Candidate {
        let subnet = le.edge.prefix().network();
        Candidate {
            permitted: self.dst_in(&subnet),
            prefix_len: SmtTerm::int(i64::from(subnet.length())),
            admin_dist: SmtTerm::int(i64::from(Protocol::Connected.default_admin_distance())),
            local_pref: SmtTerm::int(DEFAULT_LOCAL_PREF),
            metric: SmtTerm::int(0),
            med: SmtTerm::int(0),
        }
    }

    /// The longest static route through this interface that covers the
    /// destination; lower admin distance breaks length ties.
    fn static_import(&self, le: &LogicalEdge) -> Candidate {
        let mut routes: Vec<&StaticRoute> = self
            .graph
            .static_routes(le.edge.router(), le.edge.interface())
            .iter()
            .collect();
        routes.sort_by_key(|r| (std::cmp::Reverse(r.prefix.length()), r.admin_distance()));
        let ordered = routes
            .into_iter()
            .map(|route| Candidate {
                permitted: self.dst_in(&route.prefix.network()),
                prefix_len: SmtTerm::int(i64::from(route.prefix.length())),
                admin_dist: SmtTerm::int(i64::from(route.admin_distance())),
                local_pref: SmtTerm::int(DEFAULT_LOCAL_PREF),
                metric: SmtTerm::int(0),
                med: SmtTerm::int(0),
            })
            .collect();
        Candidate::first_available(ordered)
    }

    /// Longest prefix in `networks` covering the destination.
    fn originated(&self, networks: Vec<Prefix>, admin_dist: u32) -> Candidate {
        let mut networks = networks;
        networks.sort_by_key(|p| std::cmp::Reverse(p.length()));
        let ordered = networks
            .iter()
            .map(|p| Candidate {
                permitted: self.dst_in(p),
                prefix_len: SmtTerm::int(i64::from(p.length())),
                admin_dist: SmtTerm::int(i64::from(admin_dist)),
                local_pref: SmtTerm::int(DEFAULT_LOCAL_PREF),
                metric: SmtTerm::int(0),
                med: SmtTerm::int(0),
            })
            .collect();
        Candidate::first_available(ordered)
    }

    /// The export bundle on the other side of `le`, if that side exports `protocol`.
    fn peer_export(&self, le: &LogicalEdge, protocol: Protocol) -> Option<&EdgeVars> {
        let peer = le.edge.peer()?;
        let key = LogicalEdgeKey::new(&peer.router, protocol, &peer.interface, EdgeDirection::Export);
        self.logical_edges.get(&key).map(|e| &e.vars)
    }

    fn ospf_import(&self, le: &LogicalEdge) -> Candidate {
        let Some(exported) = self.peer_export(le, Protocol::Ospf) else {
            return Candidate::none();
        };
        let cost = self
            .graph
            .interface_config(&le.edge)
            .map(|i| i.cost())
            .unwrap_or(1);
        let source = Candidate::from_vars(exported);
        let metric = source.metric.clone().add(SmtTerm::int(i64::from(cost)));
        source
            .with_admin_dist(Protocol::Ospf.default_admin_distance())
            .with_metric(metric)
    }

    /// Routes a router offers to protocol neighbors: its own networks, then
    /// its best route in `protocol`, then redistributed routes.
    fn export_sources(&self, router: &str, protocol: Protocol, redistributed_metric: i64) -> Candidate {
        let ad = protocol.default_admin_distance();
        let mut ordered = vec![self.originated(self.originated_networks(router, protocol), ad)];
        if let Some(best) = self.protocol_best(router, protocol) {
            ordered.push(Candidate::from_vars(best).with_admin_dist(ad));
        }
        if let Some(rc) = self.graph.config(router) {
            for &source in rc.redistributed_into(protocol) {
                if source == protocol {
                    continue;
                }
                if let Some(best) = self.protocol_best(router, source) {
                    ordered.push(
                        Candidate::from_vars(best)
                            .with_admin_dist(ad)
                            .with_local_pref(SmtTerm::int(DEFAULT_LOCAL_PREF))
                            .with_metric(SmtTerm::int(redistributed_metric))
                            .with_med(SmtTerm::int(0)),
                    );
                }
            }
        }
        Candidate::first_available(ordered)
    }

    fn ospf_export(&self, le: &LogicalEdge) -> Candidate {
        self.export_sources(le.edge.router(), Protocol::Ospf, OSPF_REDISTRIBUTED_METRIC)
    }

    fn bgp_import(&self, le: &LogicalEdge) -> Candidate {
        let Some(session) = self.graph.bgp_session(&le.edge) else {
            return Candidate::none();
        };
        let source = match session.kind {
            SessionKind::Internal => self.peer_export(le, Protocol::Bgp),
            SessionKind::Environment => self.environment_vars.get(&le.key()),
        };
        let Some(source) = source else {
            return Candidate::none();
        };
        let source = Candidate::from_vars(source);
        let filter = self.route_filter(le.edge.router(), session.neighbor.import_filter.as_deref());
        let outcome = self.apply_route_filter(
            &filter,
            &source.prefix_len,
            SmtTerm::int(DEFAULT_LOCAL_PREF),
            source.med.clone(),
        );
        Candidate {
            permitted: SmtTerm::and(vec![source.permitted, outcome.accept]),
            prefix_len: source.prefix_len,
            admin_dist: SmtTerm::int(i64::from(Protocol::Bgp.default_admin_distance())),
            local_pref: outcome.local_pref,
            metric: source.metric,
            med: outcome.med,
        }
    }

    /// The best offered route with its AS-path length grown by one, then
    /// run through the neighbor's export filter. The filter may rewrite MED
    /// but the grown length always reaches the peer.
    fn bgp_export(&self, le: &LogicalEdge) -> Candidate {
        let Some(session) = self.graph.bgp_session(&le.edge) else {
            return Candidate::none();
        };
        let offered = self.export_sources(le.edge.router(), Protocol::Bgp, 0);
        let metric = offered.metric.clone().add(SmtTerm::int(1));
        let filter = self.route_filter(le.edge.router(), session.neighbor.export_filter.as_deref());
        let outcome = self.apply_route_filter(
            &filter,
            &offered.prefix_len,
            SmtTerm::int(DEFAULT_LOCAL_PREF),
            offered.med.clone(),
        );
        Candidate {
            permitted: SmtTerm::and(vec![offered.permitted, outcome.accept]),
            prefix_len: offered.prefix_len,
            admin_dist: offered.admin_dist,
            local_pref: outcome.local_pref,
            metric,
            med: outcome.med,
        }
    }

    fn route_filter(&self, router: &str, name: Option<&str>) -> FilterRef<'_> {
        let Some(name) = name else {
            return FilterRef::PermitAll;
        };
        match self.graph.config(router).and_then(|rc| rc.route_filter(name)) {
            Some(filter) => FilterRef::Lines(filter),
            None => {
                warn!(router = %router, filter = %name, "undefined route filter denies every route");
                FilterRef::DenyAll
            }
        }
    }

    /// First-match evaluation of a route filter over the destination and the
    /// route's prefix length. A route matching no line is rejected.
    fn apply_route_filter(
        &self,
        filter: &FilterRef<'_>,
        prefix_len: &SmtTerm,
        local_pref: SmtTerm,
        med: SmtTerm,
    ) -> FilterOutcome {
        let lines = match filter {
            FilterRef::PermitAll => {
                return FilterOutcome {
                    accept: SmtTerm::tt(),
                    local_pref,
                    med,
                }
            }
            FilterRef::DenyAll => {
                return FilterOutcome {
                    accept: SmtTerm::ff(),
                    local_pref,
                    med,
                }
            }
            FilterRef::Lines(filter) => &filter.lines,
        };
        let initial = FilterOutcome {
            accept: SmtTerm::ff(),
            local_pref: local_pref.clone(),
            med: med.clone(),
        };
        lines.iter().rev().fold(initial, |rest, line| {
            let (lo, hi) = line.length_range();
            let matched = SmtTerm::and(vec![
                self.dst_in(&line.prefix.network()),
                prefix_len.clone().within(i64::from(lo), i64::from(hi)),
            ]);
            let set_lp = line
                .set_local_pref
                .map(|v| SmtTerm::int(i64::from(v)))
                .unwrap_or_else(|| local_pref.clone());
            let set_med = line
                .set_metric
                .map(|v| SmtTerm::int(i64::from(v)))
                .unwrap_or_else(|| med.clone());
            FilterOutcome {
                accept: SmtTerm::ite(
                    matched.clone(),
                    SmtTerm::bool(line.action == FilterAction::Permit),
                    rest.accept,
                ),
                local_pref: SmtTerm::ite(matched.clone(), set_lp, rest.local_pref),
                med: SmtTerm::ite(matched, set_med, rest.med),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use netcheck_net::{Graph, NetworkConfig};

    use super::*;
    use crate::encoder::{EncodingSession, SolverOptions};

    fn encoder(json: &str) -> Encoder {
        let net = NetworkConfig::from_json(json).unwrap();
        let mut session = EncodingSession::new(SolverOptions::default());
        Encoder::new(&mut session, Vec::new(), Arc::new(Graph::new(&net, None)))
    }

    #[test]
    fn first_available_prefers_earlier_candidates() {
        let a = Candidate {
            permitted: SmtTerm::var("a"),
            ..Candidate::none()
        };
        let b = Candidate {
            permitted: SmtTerm::tt(),
            prefix_len: SmtTerm::int(8),
            ..Candidate::none()
        };
        let combined = Candidate::first_available(vec![a, b]);
        assert!(combined.permitted.is_true());
        assert_eq!(
            combined.prefix_len,
            SmtTerm::ite(SmtTerm::var("a"), SmtTerm::int(0), SmtTerm::int(8))
        );
    }

    #[test]
    fn undefined_filter_denies_and_missing_filter_permits() {
        let enc = encoder(r#"{ "routers": { "r": { "interfaces": {} } } }"#);
        let len = SmtTerm::var("len");
        let deny = enc.route_filter("r", Some("nope"));
        assert!(enc
            .apply_route_filter(&deny, &len, SmtTerm::int(100), SmtTerm::int(0))
            .accept
            .is_false());
        let permit = enc.route_filter("r", None);
        assert!(enc
            .apply_route_filter(&permit, &len, SmtTerm::int(100), SmtTerm::int(0))
            .accept
            .is_true());
    }

    #[test]
    fn filter_without_lines_rejects_everything() {
        let enc = encoder(
            r#"{ "routers": { "r": { "interfaces": {}, "route_filters": { "empty": {} } } } }"#,
        );
        let filter = enc.route_filter("r", Some("empty"));
        let outcome = enc.apply_route_filter(&filter, &SmtTerm::var("len"), SmtTerm::int(100), SmtTerm::int(3));
        assert!(outcome.accept.is_false());
        assert_eq!(outcome.med, SmtTerm::int(3));
    }

    #[test]
    fn set_metric_rewrites_med_and_keeps_the_grown_path_length() {
        let mut enc = encoder(
            r#"{
                "routers": {
                    "r1": {
                        "interfaces": { "eth0": { "address": "10.0.0.1/30" } },
                        "route_filters": {
                            "zero": { "lines": [
                                { "action": "permit", "prefix": "0.0.0.0/0", "le": 32, "set_metric": 0 }
                            ] }
                        },
                        "bgp": { "local_as": 65001, "neighbors": [
                            { "peer_address": "10.0.0.2", "remote_as": 65002, "export_filter": "zero" }
                        ] }
                    },
                    "r2": {
                        "interfaces": { "eth0": { "address": "10.0.0.2/30" } },
                        "bgp": { "local_as": 65002, "neighbors": [
                            { "peer_address": "10.0.0.1", "remote_as": 65001 }
                        ] }
                    }
                }
            }"#,
        );
        enc.compute_encoding();
        let key = LogicalEdgeKey::new("r1", Protocol::Bgp, "eth0", EdgeDirection::Export);
        let le = enc.logical_edges.get(&key).unwrap();
        let exported = enc.transfer(le);
        let offered = enc.export_sources("r1", Protocol::Bgp, 0);
        assert_eq!(exported.metric, offered.metric.clone().add(SmtTerm::int(1)));
        assert_ne!(exported.med, offered.med);
    }
}
