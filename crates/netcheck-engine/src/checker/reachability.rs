use netcheck_net::selector::{match_edges, match_nodes};
use netcheck_smt::terms::SmtTerm;

use super::PropertyChecker;
use crate::encoder::Plane;
use crate::error::EngineError;
use crate::instrument::reachability;
use crate::result::{Property, PropertyAnswer};

impl PropertyChecker {
    /// Every router matching `sources` delivers traffic for each matching
    /// destination edge's subnet out of that edge.
    pub fn check_reachability(
        &self,
        dest_node: &str,
        dest_iface: &str,
        sources: &str,
    ) -> Result<PropertyAnswer, EngineError> {
        let edges = match_edges(self.graph(), dest_node, dest_iface)?;
        let sources = match_nodes(self.graph(), sources)?;
        Ok(self.run_per_edge(Property::Reachability, &edges, |edge| {
            let (session, mut encoder) = self.encoder_for_edge(edge);
            let reach = reachability(&mut encoder, edge, Plane::Data);
            let unreachable = sources
                .iter()
                .filter_map(|s| reach.reach.get(s))
                .map(|r| r.clone().not())
                .collect();
            encoder.assert(SmtTerm::or(unreachable));
            encoder.verify(&session)
        }))
    }
}
