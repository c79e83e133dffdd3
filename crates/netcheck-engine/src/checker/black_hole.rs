use netcheck_smt::terms::SmtTerm;

use super::{forwarded_to, PropertyChecker, NETWORK_KEY};
use crate::encoder::Plane;
use crate::error::EngineError;
use crate::result::{Property, PropertyAnswer};

impl PropertyChecker {
    /// A router with no environment edge receives traffic from a neighbor
    /// but forwards it nowhere.
    pub fn check_black_holes(&self) -> Result<PropertyAnswer, EngineError> {
        let (session, mut encoder) = self.encoder(Vec::new());
        let graph = self.graph();
        let mut violations = Vec::new();
        for router in graph.routers() {
            if graph.has_environment_edge(router) {
                continue;
            }
            let forwards_out = SmtTerm::or(
                graph
                    .edges_of(router)
                    .iter()
                    .map(|e| encoder.forwarding(Plane::Data, router, e.interface()))
                    .collect(),
            );
            violations.push(SmtTerm::and(vec![
                forwarded_to(&encoder, Plane::Data, router),
                forwards_out.not(),
            ]));
        }
        encoder.assert(SmtTerm::or(violations));

        let mut answer = PropertyAnswer::new(Property::BlackHole);
        Self::record(&mut answer, NETWORK_KEY.to_string(), encoder.verify(&session));
        Ok(answer)
    }
}
