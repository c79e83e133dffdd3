//! Property drivers.
//!
//! Each driver selects its scope with the pattern selector, builds one
//! encoder per destination edge (or one for the whole network), asserts the
//! negation of the property, and records one result per key. A solver
//! failure is recorded against its key and the driver moves on.

mod black_hole;
mod load_balance;
mod local_consistency;
mod multipath;
mod path_length;
mod reachability;
mod routing_loop;

use std::sync::Arc;

use netcheck_net::{Graph, GraphEdge, NetworkConfig, Prefix};
use netcheck_smt::terms::SmtTerm;
use serde::Deserialize;
use tracing::{info, warn};

use crate::encoder::{Encoder, EncodingSession, Plane, SolverChoice, SolverOptions};
use crate::error::EngineError;
use crate::result::{Property, PropertyAnswer, QueryFailure, VerificationResult};

/// Result key for properties checked once over the whole network.
pub const NETWORK_KEY: &str = "network";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct CheckerOptions {
    pub solver: SolverChoice,
    /// Per-query timeout; 0 means none.
    pub timeout_secs: u64,
    /// Run per-edge queries on separate threads.
    pub parallel: bool,
}

impl CheckerOptions {
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            solver: self.solver,
            timeout_secs: self.timeout_secs,
        }
    }
}

pub struct PropertyChecker {
    config: NetworkConfig,
    graph: Arc<Graph>,
    options: CheckerOptions,
}

impl PropertyChecker {
    pub fn new(config: NetworkConfig, options: CheckerOptions) -> Self {
        let graph = Arc::new(Graph::new(&config, None));
        Self {
            config,
            graph,
            options,
        }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn options(&self) -> CheckerOptions {
        self.options
    }

    fn session(&self) -> EncodingSession {
        EncodingSession::new(self.options.solver_options())
    }

    /// A fresh session and a computed encoder over the whole graph, with
    /// packets destined to `destinations`.
    fn encoder(&self, destinations: Vec<Prefix>) -> (EncodingSession, Encoder) {
        let mut session = self.session();
        let mut encoder = Encoder::new(&mut session, destinations, Arc::clone(&self.graph));
        encoder.compute_encoding();
        (session, encoder)
    }

    /// Encoder for packets that leave through `edge`'s subnet.
    fn encoder_for_edge(&self, edge: &GraphEdge) -> (EncodingSession, Encoder) {
        self.encoder(vec![edge.prefix().network()])
    }

    fn record(
        answer: &mut PropertyAnswer,
        key: String,
        outcome: Result<VerificationResult, EngineError>,
    ) {
        match outcome {
            Ok(result) => {
                info!(property = %answer.property, key = %key, verified = result.verified, "query finished");
                answer.results.insert(key, result);
            }
            Err(err) => {
                warn!(property = %answer.property, key = %key, error = %err, "query failed");
                answer.failures.push(QueryFailure {
                    key,
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Run `query` once per edge, on scoped threads when enabled. Results keep
    /// the order of `edges`.
    fn run_per_edge<F>(&self, property: Property, edges: &[GraphEdge], query: F) -> PropertyAnswer
    where
        F: Fn(&GraphEdge) -> Result<VerificationResult, EngineError> + Sync,
    {
        info!(property = %property, edges = edges.len(), parallel = self.options.parallel, "checking");
        let outcomes: Vec<Result<VerificationResult, EngineError>> = if self.options.parallel {
            std::thread::scope(|scope| {
                let handles: Vec<_> = edges
                    .iter()
                    .map(|edge| {
                        let query = &query;
                        scope.spawn(move || query(edge))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|_| Err(EngineError::Solver("query thread panicked".into())))
                    })
                    .collect()
            })
        } else {
            edges.iter().map(&query).collect()
        };

        let mut answer = PropertyAnswer::new(property);
        for (edge, outcome) in edges.iter().zip(outcomes) {
            Self::record(&mut answer, edge.key(), outcome);
        }
        answer
    }
}

/// `df`/`cf` of the neighbors that forward into `router`.
fn forwarded_to(encoder: &Encoder, plane: Plane, router: &str) -> SmtTerm {
    let graph = encoder.graph();
    SmtTerm::or(
        graph
            .edges_of(router)
            .iter()
            .filter_map(|edge| edge.peer())
            .filter(|peer| graph.contains_router(&peer.router))
            .map(|peer| encoder.forwarding(plane, &peer.router, &peer.interface))
            .collect(),
    )
}
