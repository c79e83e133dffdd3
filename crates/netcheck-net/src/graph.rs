//! Physical topology derived from router configurations.
//!
//! A [`Graph`] is built once and never mutated; encoders share it behind an
//! `Arc`. Peers are inferred from addressing: two active interfaces on
//! different routers that are the only members of a subnet face each other.
//! Every other addressed interface is environment-facing.

use std::collections::HashMap;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{BgpNeighbor, InterfaceConfig, NetworkConfig, Prefix, RouterConfig, StaticRoute};

/// The far end of a topology edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeerRef {
    pub router: String,
    pub interface: String,
}

/// One addressed interface of one router, plus the interface facing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GraphEdge {
    router: String,
    interface: String,
    prefix: Prefix,
    peer: Option<PeerRef>,
}

impl GraphEdge {
    pub fn router(&self) -> &str {
        &self.router
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// The interface address with its subnet length.
    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    pub fn peer(&self) -> Option<&PeerRef> {
        self.peer.as_ref()
    }

    /// True when nothing inside the graph sits on the other side.
    pub fn is_environment(&self) -> bool {
        self.peer.is_none()
    }

    /// Stable key used for results and variable names: `router[interface]`.
    pub fn key(&self) -> String {
        format!("{}[{}]", self.router, self.interface)
    }
}

impl fmt::Display for GraphEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.peer {
            Some(peer) => write!(
                f,
                "{}[{}] -> {}[{}]",
                self.router, self.interface, peer.router, peer.interface
            ),
            None => write!(f, "{}[{}] -> environment", self.router, self.interface),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionKind {
    /// Both ends are routers in the graph and configure each other.
    Internal,
    /// The neighbor lies outside the graph; its advertisements are free.
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BgpSession {
    pub neighbor: BgpNeighbor,
    pub kind: SessionKind,
}

type EdgeId = (String, String);

fn edge_id(router: &str, interface: &str) -> EdgeId {
    (router.to_string(), interface.to_string())
}

#[derive(Debug, Clone)]
pub struct Graph {
    configurations: IndexMap<String, RouterConfig>,
    edges: IndexMap<String, Vec<GraphEdge>>,
    neighbors: IndexMap<String, IndexSet<String>>,
    static_routes: IndexMap<EdgeId, Vec<StaticRoute>>,
    bgp_sessions: IndexMap<EdgeId, BgpSession>,
    ospf_adjacencies: IndexSet<EdgeId>,
}

impl Graph {
    /// Build the topology of `config`, optionally restricted to `subset`.
    ///
    /// Peering is decided on the whole network first, so an interface whose
    /// peer is outside the subset keeps its edge but becomes
    /// environment-facing.
    pub fn new(config: &NetworkConfig, subset: Option<&IndexSet<String>>) -> Self {
        let configurations: IndexMap<String, RouterConfig> = config
            .routers
            .iter()
            .filter(|(name, _)| subset.map_or(true, |s| s.contains(name.as_str())))
            .map(|(name, rc)| (name.clone(), rc.clone()))
            .collect();

        let peers = infer_peers(config);

        let mut edges: IndexMap<String, Vec<GraphEdge>> = IndexMap::new();
        let mut neighbors: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for (router, rc) in &configurations {
            let mut router_edges = Vec::new();
            let mut router_neighbors = IndexSet::new();
            for (name, iface) in &rc.interfaces {
                let Some(prefix) = iface.address.filter(|_| iface.active) else {
                    continue;
                };
                let peer = peers
                    .get(&edge_id(router, name))
                    .filter(|p| configurations.contains_key(&p.router))
                    .cloned();
                if let Some(p) = &peer {
                    router_neighbors.insert(p.router.clone());
                }
                router_edges.push(GraphEdge {
                    router: router.clone(),
                    interface: name.clone(),
                    prefix,
                    peer,
                });
            }
            edges.insert(router.clone(), router_edges);
            neighbors.insert(router.clone(), router_neighbors);
        }

        let mut graph = Self {
            configurations,
            edges,
            neighbors,
            static_routes: IndexMap::new(),
            bgp_sessions: IndexMap::new(),
            ospf_adjacencies: IndexSet::new(),
        };
        graph.resolve_static_routes();
        graph.resolve_bgp_sessions();
        graph.resolve_ospf_adjacencies();
        debug!(
            routers = graph.configurations.len(),
            edges = graph.edges().count(),
            bgp_sessions = graph.bgp_sessions.len(),
            ospf_adjacencies = graph.ospf_adjacencies.len(),
            "built topology graph"
        );
        graph
    }

    fn resolve_static_routes(&mut self) {
        let mut resolved: IndexMap<EdgeId, Vec<StaticRoute>> = IndexMap::new();
        for (router, rc) in &self.configurations {
            let router_edges = self.edges_of(router);
            for route in &rc.static_routes {
                let target = match (&route.next_hop_interface, route.next_hop_ip) {
                    (Some(name), _) => router_edges.iter().find(|e| &e.interface == name),
                    (None, Some(ip)) => router_edges.iter().find(|e| e.prefix.contains_addr(ip)),
                    (None, None) => None,
                };
                match target {
                    Some(edge) => resolved
                        .entry(edge_id(router, &edge.interface))
                        .or_default()
                        .push(route.clone()),
                    None => warn!(
                        router = %router,
                        prefix = %route.prefix,
                        "skipping static route with unresolvable next hop"
                    ),
                }
            }
        }
        self.static_routes = resolved;
    }

    fn resolve_bgp_sessions(&mut self) {
        let mut sessions = IndexMap::new();
        for (router, rc) in &self.configurations {
            let Some(bgp) = &rc.bgp else { continue };
            let mut used = vec![false; bgp.neighbors.len()];
            for edge in self.edges_of(router) {
                let mut candidates = bgp.neighbors.iter().enumerate().filter(|(_, n)| {
                    edge.prefix.contains_addr(n.peer_address)
                        && n.peer_address != edge.prefix.address()
                });
                let Some((index, neighbor)) = candidates.next() else {
                    continue;
                };
                used[index] = true;
                if let Some((extra, _)) = candidates.next() {
                    used[extra] = true;
                    warn!(
                        router = %router,
                        interface = %edge.interface,
                        "several BGP neighbors on one interface; keeping the first"
                    );
                }
                let kind = match &edge.peer {
                    None => SessionKind::Environment,
                    Some(peer) => {
                        if !self.reciprocates(peer, neighbor, edge.prefix, bgp.local_as) {
                            warn!(
                                router = %router,
                                interface = %edge.interface,
                                peer = %peer.router,
                                "skipping BGP neighbor not reciprocated by its peer"
                            );
                            continue;
                        }
                        SessionKind::Internal
                    }
                };
                sessions.insert(
                    edge_id(router, &edge.interface),
                    BgpSession {
                        neighbor: neighbor.clone(),
                        kind,
                    },
                );
            }
            for (neighbor, _) in bgp.neighbors.iter().zip(&used).filter(|(_, u)| !**u) {
                warn!(
                    router = %router,
                    peer_address = %neighbor.peer_address,
                    "skipping BGP neighbor on no connected interface"
                );
            }
        }
        self.bgp_sessions = sessions;
    }

    /// The peer router runs BGP toward us with matching addresses and AS numbers.
    fn reciprocates(
        &self,
        peer: &PeerRef,
        neighbor: &BgpNeighbor,
        local: Prefix,
        local_as: u32,
    ) -> bool {
        let Some(peer_config) = self.configurations.get(&peer.router) else {
            return false;
        };
        let Some(peer_bgp) = &peer_config.bgp else {
            return false;
        };
        let peer_address = peer_config
            .interfaces
            .get(&peer.interface)
            .and_then(|i| i.address)
            .map(|p| p.address());
        peer_address == Some(neighbor.peer_address)
            && neighbor.remote_as == peer_bgp.local_as
            && peer_bgp
                .neighbors
                .iter()
                .any(|n| n.peer_address == local.address() && n.remote_as == local_as)
    }

    fn resolve_ospf_adjacencies(&mut self) {
        let mut adjacencies = IndexSet::new();
        for edge in self.edges() {
            let Some(peer) = &edge.peer else { continue };
            let runs_ospf = |router: &str, interface: &str| {
                self.configurations.get(router).is_some_and(|rc| {
                    rc.ospf.is_some() && rc.interfaces.get(interface).is_some_and(|i| i.ospf)
                })
            };
            if runs_ospf(&edge.router, &edge.interface) && runs_ospf(&peer.router, &peer.interface) {
                adjacencies.insert(edge_id(&edge.router, &edge.interface));
            }
        }
        self.ospf_adjacencies = adjacencies;
    }

    pub fn routers(&self) -> impl Iterator<Item = &str> + '_ {
        self.configurations.keys().map(String::as_str)
    }

    pub fn contains_router(&self, router: &str) -> bool {
        self.configurations.contains_key(router)
    }

    pub fn configurations(&self) -> &IndexMap<String, RouterConfig> {
        &self.configurations
    }

    pub fn config(&self, router: &str) -> Option<&RouterConfig> {
        self.configurations.get(router)
    }

    pub fn interface_config(&self, edge: &GraphEdge) -> Option<&InterfaceConfig> {
        self.config(&edge.router)?.interfaces.get(&edge.interface)
    }

    /// Every edge, grouped by router in configuration order.
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.edges.values().flatten()
    }

    pub fn edges_of(&self, router: &str) -> &[GraphEdge] {
        self.edges.get(router).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_edge(&self, router: &str, interface: &str) -> Option<&GraphEdge> {
        self.edges_of(router).iter().find(|e| e.interface == interface)
    }

    pub fn peer_edge(&self, edge: &GraphEdge) -> Option<&GraphEdge> {
        let peer = edge.peer.as_ref()?;
        self.find_edge(&peer.router, &peer.interface)
    }

    pub fn neighbors(&self, router: &str) -> Option<&IndexSet<String>> {
        self.neighbors.get(router)
    }

    pub fn has_environment_edge(&self, router: &str) -> bool {
        self.edges_of(router).iter().any(GraphEdge::is_environment)
    }

    /// Static routes whose next hop resolved to `interface`.
    pub fn static_routes(&self, router: &str, interface: &str) -> &[StaticRoute] {
        self.static_routes
            .get(&edge_id(router, interface))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_static_routes(&self, router: &str) -> bool {
        self.static_routes.keys().any(|(r, _)| r == router)
    }

    pub fn bgp_session(&self, edge: &GraphEdge) -> Option<&BgpSession> {
        self.bgp_sessions.get(&edge_id(&edge.router, &edge.interface))
    }

    pub fn ospf_adjacent(&self, edge: &GraphEdge) -> bool {
        self.ospf_adjacencies
            .contains(&edge_id(&edge.router, &edge.interface))
    }
}

fn infer_peers(config: &NetworkConfig) -> HashMap<EdgeId, PeerRef> {
    let mut by_subnet: IndexMap<Prefix, Vec<PeerRef>> = IndexMap::new();
    for (router, rc) in &config.routers {
        for (name, iface) in &rc.interfaces {
            if let Some(prefix) = iface.address.filter(|_| iface.active) {
                by_subnet.entry(prefix.network()).or_default().push(PeerRef {
                    router: router.clone(),
                    interface: name.clone(),
                });
            }
        }
    }
    let mut peers = HashMap::new();
    for members in by_subnet.values() {
        if let [a, b] = members.as_slice() {
            if a.router != b.router {
                peers.insert(edge_id(&a.router, &a.interface), b.clone());
                peers.insert(edge_id(&b.router, &b.interface), a.clone());
            }
        }
    }
    peers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;

    fn network(json: &str) -> NetworkConfig {
        NetworkConfig::from_json(json).unwrap()
    }

    fn chain() -> NetworkConfig {
        network(
            r#"{ "routers": {
                "a": { "interfaces": {
                    "to_b": { "address": "10.0.0.1/30" },
                    "ext":  { "address": "203.0.113.1/24" }
                } },
                "b": { "interfaces": {
                    "to_a": { "address": "10.0.0.2/30" },
                    "to_c": { "address": "10.0.1.1/30" }
                },
                "static_routes": [
                    { "prefix": "192.168.0.0/24", "next_hop_ip": "10.0.1.2" },
                    { "prefix": "192.168.1.0/24", "next_hop_ip": "172.16.0.1" }
                ] },
                "c": { "interfaces": {
                    "to_b": { "address": "10.0.1.2/30" },
                    "down": { "address": "10.9.9.1/30", "active": false }
                } }
            } }"#,
        )
    }

    #[test]
    fn peers_are_symmetric() {
        let g = Graph::new(&chain(), None);
        let ab = g.find_edge("a", "to_b").unwrap();
        let ba = g.peer_edge(ab).unwrap();
        assert_eq!(ba.router(), "b");
        assert_eq!(ba.interface(), "to_a");
        assert_eq!(g.peer_edge(ba).unwrap(), ab);
        assert!(g.find_edge("a", "ext").unwrap().is_environment());
        assert!(g.has_environment_edge("a"));
        assert!(!g.has_environment_edge("b"));
    }

    #[test]
    fn inactive_interfaces_have_no_edge() {
        let g = Graph::new(&chain(), None);
        assert!(g.find_edge("c", "down").is_none());
        assert_eq!(g.edges().count(), 5);
    }

    #[test]
    fn static_route_next_hop_resolves_to_interface() {
        let g = Graph::new(&chain(), None);
        let routes = g.static_routes("b", "to_c");
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].prefix.to_string(), "192.168.0.0/24");
        assert!(g.static_routes("b", "to_a").is_empty());
        assert!(g.has_static_routes("b"));
        assert!(!g.has_static_routes("a"));
    }

    #[test]
    fn subset_turns_outside_peers_into_environment() {
        let full = Graph::new(&chain(), None);
        let subset: IndexSet<String> = ["b".to_string()].into_iter().collect();
        let g = Graph::new(&chain(), Some(&subset));
        assert_eq!(g.routers().collect::<Vec<_>>(), vec!["b"]);
        for edge in g.edges_of("b") {
            assert!(edge.is_environment());
            let original = full.find_edge("b", edge.interface()).unwrap();
            assert_eq!(edge.prefix(), original.prefix());
        }
        assert_eq!(g.static_routes("b", "to_c"), full.static_routes("b", "to_c"));
        assert!(g.neighbors("b").unwrap().is_empty());
    }

    #[test]
    fn shared_segment_with_three_members_has_no_peers() {
        let g = Graph::new(
            &network(
                r#"{ "routers": {
                    "x": { "interfaces": { "lan": { "address": "10.1.0.1/24" } } },
                    "y": { "interfaces": { "lan": { "address": "10.1.0.2/24" } } },
                    "z": { "interfaces": { "lan": { "address": "10.1.0.3/24" } } }
                } }"#,
            ),
            None,
        );
        assert!(g.edges().all(GraphEdge::is_environment));
    }

    #[test]
    fn bgp_sessions_and_ospf_adjacencies() {
        let g = Graph::new(
            &network(
                r#"{ "routers": {
                    "r1": {
                        "interfaces": {
                            "p": { "address": "10.0.0.1/30", "ospf": true },
                            "up": { "address": "198.51.100.1/30" }
                        },
                        "ospf": {},
                        "bgp": { "local_as": 65001, "neighbors": [
                            { "peer_address": "10.0.0.2", "remote_as": 65002 },
                            { "peer_address": "198.51.100.2", "remote_as": 64999 },
                            { "peer_address": "172.31.0.1", "remote_as": 64998 }
                        ] }
                    },
                    "r2": {
                        "interfaces": { "p": { "address": "10.0.0.2/30", "ospf": true } },
                        "ospf": {},
                        "bgp": { "local_as": 65002, "neighbors": [
                            { "peer_address": "10.0.0.1", "remote_as": 65001 }
                        ] }
                    }
                } }"#,
            ),
            None,
        );
        let p = g.find_edge("r1", "p").unwrap();
        let up = g.find_edge("r1", "up").unwrap();
        assert_eq!(g.bgp_session(p).unwrap().kind, SessionKind::Internal);
        assert_eq!(g.bgp_session(up).unwrap().kind, SessionKind::Environment);
        assert!(g.ospf_adjacent(p));
        assert!(!g.ospf_adjacent(up));
        assert_eq!(
            g.bgp_session(g.peer_edge(p).unwrap()).unwrap().kind,
            SessionKind::Internal
        );
    }

    #[test]
    fn unreciprocated_bgp_neighbor_is_skipped() {
        let g = Graph::new(
            &network(
                r#"{ "routers": {
                    "r1": {
                        "interfaces": { "p": { "address": "10.0.0.1/30" } },
                        "bgp": { "local_as": 65001, "neighbors": [
                            { "peer_address": "10.0.0.2", "remote_as": 65002 }
                        ] }
                    },
                    "r2": { "interfaces": { "p": { "address": "10.0.0.2/30" } } }
                } }"#,
            ),
            None,
        );
        assert!(g.bgp_session(g.find_edge("r1", "p").unwrap()).is_none());
    }
}
