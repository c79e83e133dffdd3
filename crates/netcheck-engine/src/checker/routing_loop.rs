use netcheck_smt::terms::SmtTerm;

use super::{PropertyChecker, NETWORK_KEY};
use crate::error::EngineError;
use crate::instrument::loops;
use crate::result::{Property, PropertyAnswer};

impl PropertyChecker {
    /// Forwarding from some statically routed router comes back to it.
    /// Dynamic protocols cannot loop in steady state, so only routers with
    /// static routes are instrumented.
    pub fn check_routing_loops(&self) -> Result<PropertyAnswer, EngineError> {
        let (session, mut encoder) = self.encoder(Vec::new());
        let graph = std::sync::Arc::clone(self.graph());
        let mut flags = Vec::new();
        for router in graph.routers().filter(|r| graph.has_static_routes(r)) {
            flags.push(loops(&mut encoder, router));
        }
        encoder.assert(SmtTerm::or(flags));

        let mut answer = PropertyAnswer::new(Property::RoutingLoop);
        Self::record(&mut answer, NETWORK_KEY.to_string(), encoder.verify(&session));
        Ok(answer)
    }
}
