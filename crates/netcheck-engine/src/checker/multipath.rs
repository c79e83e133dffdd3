use netcheck_net::selector::match_edges;
use netcheck_smt::terms::SmtTerm;

use super::{forwarded_to, PropertyChecker};
use crate::encoder::Plane;
use crate::error::EngineError;
use crate::result::{Property, PropertyAnswer};

impl PropertyChecker {
    /// A router that receives traffic never has an interface where the
    /// control plane forwards but the data plane drops.
    pub fn check_multipath_consistency(
        &self,
        dest_node: &str,
        dest_iface: &str,
    ) -> Result<PropertyAnswer, EngineError> {
        let edges = match_edges(self.graph(), dest_node, dest_iface)?;
        Ok(self.run_per_edge(Property::MultipathConsistency, &edges, |edge| {
            let (session, mut encoder) = self.encoder_for_edge(edge);
            let graph = self.graph();
            let mut violations = Vec::new();
            for router in graph.routers() {
                let diverges = SmtTerm::or(
                    graph
                        .edges_of(router)
                        .iter()
                        .map(|e| {
                            let cf = encoder.forwarding(Plane::Control, router, e.interface());
                            let df = encoder.forwarding(Plane::Data, router, e.interface());
                            SmtTerm::and(vec![cf, df.not()])
                        })
                        .collect(),
                );
                violations.push(SmtTerm::and(vec![
                    forwarded_to(&encoder, Plane::Control, router),
                    diverges,
                ]));
            }
            encoder.assert(SmtTerm::or(violations));
            encoder.verify(&session)
        }))
    }
}
