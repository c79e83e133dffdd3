//! Symbolic control-plane and data-plane encoding.
//!
//! An [`EncodingSession`] owns the symbolic packet and the solver choice. Each
//! [`Encoder`] compiles one router set into its own [`Constraints`]
//! accumulator; the session merges one or more of them and solves.

mod forwarding;
mod selection;
mod transfer;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use netcheck_net::config::Prefix;
use netcheck_net::graph::SessionKind;
use netcheck_net::{EdgeDirection, Graph, GraphEdge, Protocol};
use netcheck_smt::backends::cvc5_backend::Cvc5Solver;
use netcheck_smt::backends::z3_backend::Z3Solver;
use netcheck_smt::constraints::Constraints;
use netcheck_smt::solver::{SatResult, SmtSolver};
use netcheck_smt::sorts::SmtSort;
use netcheck_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::logical_edge::{Attributes, EdgeVars, LogicalEdge, LogicalEdgeKey};
use crate::result::VerificationResult;

pub const DST_IP: &str = "dst_ip";
pub const SRC_IP: &str = "src_ip";
const MAX_IP: i64 = u32::MAX as i64;

static NEXT_SESSION: AtomicUsize = AtomicUsize::new(0);

/// Which solver backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverChoice {
    #[default]
    Z3,
    Cvc5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub solver: SolverChoice,
    /// Per-check timeout; 0 means none.
    pub timeout_secs: u64,
}

/// Forwarding is read either from the control plane or the data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    Control,
    Data,
}

/// `(router, interface)`.
pub type ForwardingKey = (String, String);

/// Explicit solver-session handle.
///
/// Whoever creates the session owns it; encoders only carry its id. Solving
/// builds a fresh backend per call, so nothing asserted for one query is
/// visible to the next.
#[derive(Debug)]
pub struct EncodingSession {
    id: usize,
    options: SolverOptions,
    base: Constraints,
    dst_ip: SmtTerm,
    src_ip: SmtTerm,
    next_encoder: usize,
}

impl EncodingSession {
    pub fn new(options: SolverOptions) -> Self {
        let mut base = Constraints::new();
        let dst_ip = base.declare(DST_IP, SmtSort::Int);
        let src_ip = base.declare(SRC_IP, SmtSort::Int);
        base.assert(dst_ip.clone().within(0, MAX_IP));
        base.assert(src_ip.clone().within(0, MAX_IP));
        Self {
            id: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            options,
            base,
            dst_ip,
            src_ip,
            next_encoder: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn options(&self) -> SolverOptions {
        self.options
    }

    pub fn dst_ip(&self) -> &SmtTerm {
        &self.dst_ip
    }

    pub fn src_ip(&self) -> &SmtTerm {
        &self.src_ip
    }

    /// Packet declarations and their bounds.
    pub fn base_constraints(&self) -> &Constraints {
        &self.base
    }

    fn allocate_encoder(&mut self) -> usize {
        let id = self.next_encoder;
        self.next_encoder += 1;
        id
    }

    /// Solve the session base together with every listed encoder.
    pub fn verify_all(&self, encoders: &[&Encoder]) -> Result<VerificationResult, EngineError> {
        let mut all = self.base.clone();
        for encoder in encoders {
            encoder.check_session(self)?;
            if !encoder.computed {
                return Err(EngineError::NotComputed(encoder.id));
            }
            all.extend(&encoder.constraints);
        }
        debug!(
            session = self.id,
            encoders = encoders.len(),
            declarations = all.declarations().len(),
            assertions = all.assertions().len(),
            "solving"
        );
        match self.options.solver {
            SolverChoice::Z3 => solve(&mut Z3Solver::with_timeout_secs(self.options.timeout_secs), &all),
            SolverChoice::Cvc5 => {
                let mut solver =
                    Cvc5Solver::with_timeout_secs(self.options.timeout_secs).map_err(solver_error)?;
                solve(&mut solver, &all)
            }
        }
    }
}

fn solver_error(err: impl std::fmt::Display) -> EngineError {
    EngineError::Solver(err.to_string())
}

fn solve<S: SmtSolver>(solver: &mut S, constraints: &Constraints) -> Result<VerificationResult, EngineError> {
    constraints.replay(solver).map_err(solver_error)?;
    let vars: Vec<(&str, &SmtSort)> = constraints
        .declarations()
        .iter()
        .map(|(name, sort)| (name.as_str(), sort))
        .collect();
    let (result, model) = solver.check_sat_with_model(&vars).map_err(solver_error)?;
    match result {
        SatResult::Unsat => Ok(VerificationResult::verified()),
        SatResult::Sat => Ok(VerificationResult::violated(model.unwrap_or_default())),
        SatResult::Unknown(reason) => Err(EngineError::UnknownResult(reason)),
    }
}

/// Compiles one router set into constraints over the session's packet.
#[derive(Debug, Clone)]
pub struct Encoder {
    id: usize,
    session_id: usize,
    prefix: String,
    graph: Arc<Graph>,
    destinations: Vec<Prefix>,
    dst_ip: SmtTerm,
    src_ip: SmtTerm,
    constraints: Constraints,
    logical_edges: IndexMap<LogicalEdgeKey, LogicalEdge>,
    environment_vars: IndexMap<LogicalEdgeKey, EdgeVars>,
    protocol_best: IndexMap<(String, Protocol), EdgeVars>,
    best: IndexMap<String, EdgeVars>,
    control_forwarding: IndexMap<ForwardingKey, SmtTerm>,
    data_forwarding: IndexMap<ForwardingKey, SmtTerm>,
    computed: bool,
}

impl Encoder {
    /// A fresh encoder whose packets are destined to one of `destinations`;
    /// an empty list leaves the destination free.
    pub fn new(session: &mut EncodingSession, destinations: Vec<Prefix>, graph: Arc<Graph>) -> Self {
        let id = session.allocate_encoder();
        let mut encoder = Self {
            id,
            session_id: session.id,
            prefix: format!("e{id}_"),
            graph,
            destinations,
            dst_ip: session.dst_ip.clone(),
            src_ip: session.src_ip.clone(),
            constraints: Constraints::new(),
            logical_edges: IndexMap::new(),
            environment_vars: IndexMap::new(),
            protocol_best: IndexMap::new(),
            best: IndexMap::new(),
            control_forwarding: IndexMap::new(),
            data_forwarding: IndexMap::new(),
            computed: false,
        };
        if !encoder.destinations.is_empty() {
            let in_destinations = encoder.relevant_prefix(&encoder.destinations);
            encoder.constraints.assert(in_destinations);
        }
        encoder
    }

    /// A second encoder in `other`'s session for a different router set,
    /// sharing its packet and destinations.
    pub fn chained(
        session: &mut EncodingSession,
        other: &Encoder,
        graph: Arc<Graph>,
    ) -> Result<Self, EngineError> {
        other.check_session(session)?;
        Ok(Self::new(session, other.destinations.clone(), graph))
    }

    fn check_session(&self, session: &EncodingSession) -> Result<(), EngineError> {
        if self.session_id != session.id {
            return Err(EngineError::SessionMismatch {
                encoder: self.id,
                expected: self.session_id,
                found: session.id,
            });
        }
        Ok(())
    }

    /// Build the full encoding. Calling it again adds nothing.
    pub fn compute_encoding(&mut self) -> &Constraints {
        if !self.computed {
            self.add_logical_edges();
            self.add_best_variables();
            self.add_transfer_functions();
            self.add_best_path_constraints();
            self.add_forwarding();
            self.computed = true;
            debug!(
                encoder = self.id,
                routers = self.graph.configurations().len(),
                logical_edges = self.logical_edges.len(),
                declarations = self.constraints.declarations().len(),
                assertions = self.constraints.assertions().len(),
                "computed encoding"
            );
        }
        &self.constraints
    }

    pub fn verify(&self, session: &EncodingSession) -> Result<VerificationResult, EngineError> {
        session.verify_all(&[self])
    }

    fn add_logical_edges(&mut self) {
        let graph = Arc::clone(&self.graph);
        for router in graph.routers() {
            for protocol in self.protocols(router) {
                for edge in graph.edges_of(router) {
                    let directions: &[EdgeDirection] = match protocol {
                        Protocol::Connected => &[EdgeDirection::Import],
                        Protocol::Static if !graph.static_routes(router, edge.interface()).is_empty() => {
                            &[EdgeDirection::Import]
                        }
                        Protocol::Static => &[],
                        Protocol::Ospf if graph.ospf_adjacent(edge) => {
                            &[EdgeDirection::Import, EdgeDirection::Export]
                        }
                        Protocol::Ospf => &[],
                        Protocol::Bgp if graph.bgp_session(edge).is_some() => {
                            &[EdgeDirection::Import, EdgeDirection::Export]
                        }
                        Protocol::Bgp => &[],
                    };
                    for &direction in directions {
                        self.add_logical_edge(edge, protocol, direction);
                    }
                    let environment_session = graph
                        .bgp_session(edge)
                        .is_some_and(|s| s.kind == SessionKind::Environment);
                    if protocol == Protocol::Bgp && environment_session {
                        self.add_environment_vars(edge);
                    }
                }
            }
        }
    }

    fn add_environment_vars(&mut self, edge: &GraphEdge) {
        let key = LogicalEdgeKey::new(edge.router(), Protocol::Bgp, edge.interface(), EdgeDirection::Import);
        let name = self.name(&format!("{}_env_{}", edge.router(), edge.interface()));
        let vars = EdgeVars::declare(&mut self.constraints, &name, Attributes::for_protocol(Protocol::Bgp));
        self.constraints.assert(vars.zeroed_unless_permitted());
        self.environment_vars.insert(key, vars);
    }

    fn add_logical_edge(&mut self, edge: &GraphEdge, protocol: Protocol, direction: EdgeDirection) {
        let key = LogicalEdgeKey::new(edge.router(), protocol, edge.interface(), direction);
        let name = self.name(&key.to_string());
        let vars = EdgeVars::declare(&mut self.constraints, &name, Attributes::for_protocol(protocol));
        self.logical_edges.insert(
            key,
            LogicalEdge {
                edge: edge.clone(),
                protocol,
                direction,
                vars,
            },
        );
    }

    /// Prefix a variable name with this encoder's id.
    fn name(&self, base: &str) -> String {
        format!("{}{base}", self.prefix)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn session_id(&self) -> usize {
        self.session_id
    }

    pub fn is_computed(&self) -> bool {
        self.computed
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn destinations(&self) -> &[Prefix] {
        &self.destinations
    }

    pub fn dst_ip(&self) -> &SmtTerm {
        &self.dst_ip
    }

    pub fn src_ip(&self) -> &SmtTerm {
        &self.src_ip
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Declare an auxiliary variable in this encoder's namespace.
    pub fn declare(&mut self, base: &str, sort: SmtSort) -> SmtTerm {
        let name = self.name(base);
        self.constraints.declare(name, sort)
    }

    /// Add an assertion to this encoder's constraints.
    pub fn assert(&mut self, term: SmtTerm) {
        self.constraints.assert(term);
    }

    pub fn logical_edges(&self) -> &IndexMap<LogicalEdgeKey, LogicalEdge> {
        &self.logical_edges
    }

    pub fn logical_edge(&self, key: &LogicalEdgeKey) -> Option<&LogicalEdge> {
        self.logical_edges.get(key)
    }

    /// Free route records for BGP sessions whose neighbor is outside the graph.
    pub fn environment_vars(&self) -> &IndexMap<LogicalEdgeKey, EdgeVars> {
        &self.environment_vars
    }

    pub fn control_forwarding(&self) -> &IndexMap<ForwardingKey, SmtTerm> {
        &self.control_forwarding
    }

    pub fn data_forwarding(&self) -> &IndexMap<ForwardingKey, SmtTerm> {
        &self.data_forwarding
    }

    /// Forwarding variable of `router` out of `interface`, or `false` when
    /// the interface has no edge.
    pub fn forwarding(&self, plane: Plane, router: &str, interface: &str) -> SmtTerm {
        let table = match plane {
            Plane::Control => &self.control_forwarding,
            Plane::Data => &self.data_forwarding,
        };
        table
            .get(&(router.to_string(), interface.to_string()))
            .cloned()
            .unwrap_or_else(SmtTerm::ff)
    }

    /// Protocols `router` runs, in selection order.
    pub fn protocols(&self, router: &str) -> Vec<Protocol> {
        self.graph
            .config(router)
            .map(|rc| rc.protocols())
            .unwrap_or_default()
    }

    /// Prefixes `router` originates into `protocol` on its own.
    pub fn originated_networks(&self, router: &str, protocol: Protocol) -> Vec<Prefix> {
        let Some(rc) = self.graph.config(router) else {
            return Vec::new();
        };
        match protocol {
            Protocol::Connected => self
                .graph
                .edges_of(router)
                .iter()
                .map(|e| e.prefix().network())
                .collect(),
            Protocol::Static => self
                .graph
                .edges_of(router)
                .iter()
                .flat_map(|e| self.graph.static_routes(router, e.interface()))
                .map(|r| r.prefix.network())
                .collect(),
            Protocol::Ospf => rc
                .interfaces
                .values()
                .filter(|i| i.active && i.ospf)
                .filter_map(|i| i.address.map(|p| p.network()))
                .collect(),
            Protocol::Bgp => rc
                .bgp
                .as_ref()
                .map(|b| b.networks.iter().map(Prefix::network).collect())
                .unwrap_or_default(),
        }
    }

    /// `dst_ip` falls inside one of `prefixes`.
    pub fn relevant_prefix(&self, prefixes: &[Prefix]) -> SmtTerm {
        SmtTerm::or(prefixes.iter().map(|p| self.dst_in(p)).collect())
    }

    pub(crate) fn dst_in(&self, prefix: &Prefix) -> SmtTerm {
        SmtTerm::and(vec![
            self.dst_ip.clone().ge(SmtTerm::int(i64::from(prefix.first()))),
            self.dst_ip.clone().le(SmtTerm::int(i64::from(prefix.last()))),
        ])
    }

    /// Records agree on everything `protocol` compares.
    pub fn equal_records(protocol: Protocol, a: &EdgeVars, b: &EdgeVars) -> SmtTerm {
        let mut terms = vec![
            a.permitted.clone().eq(b.permitted.clone()),
            a.prefix_len.clone().eq(b.prefix_len.clone()),
            a.admin_dist.clone().eq(b.admin_dist.clone()),
        ];
        if protocol.has_local_pref() {
            terms.push(a.local_pref_or_default().eq(b.local_pref_or_default()));
        }
        if protocol.has_metric() {
            terms.push(a.metric_or_zero().eq(b.metric_or_zero()));
        }
        if protocol.has_med() {
            terms.push(a.med_or_zero().eq(b.med_or_zero()));
        }
        SmtTerm::and(terms)
    }

    /// Overall best route of `router`.
    pub fn best(&self, router: &str) -> Option<&EdgeVars> {
        self.best.get(router)
    }

    /// Best route of `router` within one protocol.
    pub fn protocol_best(&self, router: &str, protocol: Protocol) -> Option<&EdgeVars> {
        self.protocol_best.get(&(router.to_string(), protocol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcheck_net::NetworkConfig;

    fn two_routers() -> Arc<Graph> {
        let net = NetworkConfig::from_json(
            r#"{ "routers": {
                "a": { "interfaces": { "p": { "address": "10.0.0.1/30" } } },
                "b": { "interfaces": { "p": { "address": "10.0.0.2/30" } } }
            } }"#,
        )
        .unwrap();
        Arc::new(Graph::new(&net, None))
    }

    #[test]
    fn encoders_in_one_session_use_distinct_namespaces() {
        let mut session = EncodingSession::new(SolverOptions::default());
        let mut first = Encoder::new(&mut session, Vec::new(), two_routers());
        let mut second = Encoder::chained(&mut session, &first, two_routers()).unwrap();
        first.compute_encoding();
        second.compute_encoding();
        assert!(first.constraints().declarations().iter().all(|(n, _)| n.starts_with("e0_")));
        assert!(second.constraints().declarations().iter().all(|(n, _)| n.starts_with("e1_")));
        assert_eq!(
            first.constraints().declarations().len(),
            second.constraints().declarations().len()
        );
    }

    #[test]
    fn chaining_across_sessions_is_rejected() {
        let mut s1 = EncodingSession::new(SolverOptions::default());
        let mut s2 = EncodingSession::new(SolverOptions::default());
        let first = Encoder::new(&mut s1, Vec::new(), two_routers());
        let err = Encoder::chained(&mut s2, &first, two_routers()).unwrap_err();
        assert!(matches!(err, EngineError::SessionMismatch { .. }));
        assert!(matches!(
            first.verify(&s2),
            Err(EngineError::SessionMismatch { .. })
        ));
    }

    #[test]
    fn verify_requires_computed_encoding() {
        let mut session = EncodingSession::new(SolverOptions::default());
        let encoder = Encoder::new(&mut session, Vec::new(), two_routers());
        assert!(matches!(encoder.verify(&session), Err(EngineError::NotComputed(0))));
    }

    #[test]
    fn compute_encoding_is_idempotent() {
        let mut session = EncodingSession::new(SolverOptions::default());
        let mut encoder = Encoder::new(&mut session, vec!["10.0.0.0/30".parse().unwrap()], two_routers());
        let first = encoder.compute_encoding().assertions().len();
        let second = encoder.compute_encoding().assertions().len();
        assert_eq!(first, second);
        assert!(encoder.is_computed());
    }

    #[test]
    fn logical_edges_follow_configured_protocols() {
        let mut session = EncodingSession::new(SolverOptions::default());
        let mut encoder = Encoder::new(&mut session, Vec::new(), two_routers());
        encoder.compute_encoding();
        let keys: Vec<String> = encoder.logical_edges().keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["a_connected_p_in", "b_connected_p_in"]);
        assert!(encoder.environment_vars().is_empty());
        assert_eq!(encoder.control_forwarding().len(), 2);
        assert_eq!(encoder.forwarding(Plane::Data, "a", "missing"), SmtTerm::ff());
    }

    #[test]
    fn empty_destination_list_adds_no_constraint() {
        let mut session = EncodingSession::new(SolverOptions::default());
        let encoder = Encoder::new(&mut session, Vec::new(), two_routers());
        assert!(encoder.constraints().assertions().is_empty());
        assert!(encoder.relevant_prefix(&[]).is_false());
    }
}
