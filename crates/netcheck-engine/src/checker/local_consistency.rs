use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexSet;
use netcheck_net::selector::match_nodes;
use netcheck_net::{EdgeDirection, Graph, NetError};
use netcheck_smt::terms::SmtTerm;
use tracing::{info, warn};

use super::PropertyChecker;
use crate::encoder::{Encoder, Plane};
use crate::error::EngineError;
use crate::logical_edge::LogicalEdgeKey;
use crate::result::{Mismatch, Property, PropertyAnswer, VerificationResult};

fn pair_key(left: &str, right: &str) -> String {
    format!("{left},{right}")
}

impl PropertyChecker {
    /// Every pair of routers matching `routers` forwards and exports
    /// identically when fed identical environment routes. Pairs whose
    /// interface names differ are reported as mismatches and skipped.
    pub fn check_local_consistency(&self, routers: &str) -> Result<PropertyAnswer, EngineError> {
        let routers: Vec<String> = match_nodes(self.graph(), routers)?.into_iter().collect();
        let mut answer = PropertyAnswer::new(Property::LocalConsistency);
        for (i, left) in routers.iter().enumerate() {
            for right in &routers[i + 1..] {
                let left_ifaces = self.interface_names(left);
                let right_ifaces = self.interface_names(right);
                if left_ifaces != right_ifaces {
                    let reason = format!(
                        "interfaces differ: {} only on {left}, {} only on {right}",
                        left_ifaces.difference(&right_ifaces).cloned().collect::<Vec<_>>().join(" "),
                        right_ifaces.difference(&left_ifaces).cloned().collect::<Vec<_>>().join(" "),
                    );
                    warn!(left = %left, right = %right, %reason, "skipping incomparable routers");
                    answer.mismatches.push(Mismatch {
                        left: left.clone(),
                        right: right.clone(),
                        reason,
                    });
                    continue;
                }
                Self::record(&mut answer, pair_key(left, right), self.compare_routers(left, right));
            }
        }
        info!(
            compared = answer.results.len(),
            mismatches = answer.mismatches.len(),
            "local consistency finished"
        );
        Ok(answer)
    }

    fn interface_names(&self, router: &str) -> BTreeSet<String> {
        self.graph()
            .edges_of(router)
            .iter()
            .map(|e| e.interface().to_string())
            .collect()
    }

    /// Encode `left` and `right` in isolation within one session, tie their
    /// environment inputs together, and ask whether any forwarding decision
    /// or exported route differs.
    pub fn compare_routers(&self, left: &str, right: &str) -> Result<VerificationResult, EngineError> {
        for router in [left, right] {
            if !self.graph().contains_router(router) {
                return Err(NetError::UnknownRouter(router.to_string()).into());
            }
        }
        let isolate = |router: &str| {
            let subset: IndexSet<String> = [router.to_string()].into_iter().collect();
            Arc::new(Graph::new(self.config(), Some(&subset)))
        };

        let mut session = self.session();
        let mut lhs = Encoder::new(&mut session, Vec::new(), isolate(left));
        let mut rhs = Encoder::chained(&mut session, &lhs, isolate(right))?;
        lhs.compute_encoding();
        rhs.compute_encoding();

        let counterpart = |key: &LogicalEdgeKey, router: &str| LogicalEdgeKey {
            router: router.to_string(),
            ..key.clone()
        };

        let mut same_inputs = Vec::new();
        for (key, vars) in lhs.environment_vars() {
            let other = counterpart(key, right);
            let Some(other_vars) = rhs.environment_vars().get(&other) else {
                return Err(EngineError::AsymmetricEnvironment {
                    left: key.to_string(),
                    right: other.to_string(),
                });
            };
            same_inputs.push(vars.identical(other_vars));
        }
        for key in rhs.environment_vars().keys() {
            let other = counterpart(key, left);
            if !lhs.environment_vars().contains_key(&other) {
                return Err(EngineError::AsymmetricEnvironment {
                    left: other.to_string(),
                    right: key.to_string(),
                });
            }
        }

        let mut differences = Vec::new();
        for edge in lhs.graph().edges_of(left) {
            let ours = lhs.forwarding(Plane::Data, left, edge.interface());
            let theirs = rhs.forwarding(Plane::Data, right, edge.interface());
            differences.push(ours.eq(theirs).not());
        }
        for (key, le) in lhs.logical_edges() {
            if key.direction != EdgeDirection::Export {
                continue;
            }
            match rhs.logical_edge(&counterpart(key, right)) {
                Some(other) => differences.push(
                    Encoder::equal_records(key.protocol, &le.vars, &other.vars).not(),
                ),
                None => differences.push(le.vars.permitted.clone()),
            }
        }
        for (key, le) in rhs.logical_edges() {
            if key.direction == EdgeDirection::Export
                && lhs.logical_edge(&counterpart(key, left)).is_none()
            {
                differences.push(le.vars.permitted.clone());
            }
        }

        for term in same_inputs {
            lhs.assert(term);
        }
        lhs.assert(SmtTerm::or(differences));
        session.verify_all(&[&lhs, &rhs])
    }
}
