use netcheck_net::selector::{match_edges, match_nodes};
use netcheck_smt::terms::SmtTerm;

use super::PropertyChecker;
use crate::error::EngineError;
use crate::instrument::{all_equal, path_length};
use crate::result::{Property, PropertyAnswer};

impl PropertyChecker {
    /// No reachable source router is more than `bound` hops from the
    /// destination edge. Unreachable routers are not counted.
    pub fn check_bounded_length(
        &self,
        dest_node: &str,
        dest_iface: &str,
        sources: &str,
        bound: u32,
    ) -> Result<PropertyAnswer, EngineError> {
        let edges = match_edges(self.graph(), dest_node, dest_iface)?;
        let sources = match_nodes(self.graph(), sources)?;
        Ok(self.run_per_edge(Property::BoundedLength, &edges, |edge| {
            let (session, mut encoder) = self.encoder_for_edge(edge);
            let lengths = path_length(&mut encoder, edge);
            let too_long = sources
                .iter()
                .filter_map(|s| lengths.get(s))
                .map(|l| {
                    SmtTerm::and(vec![
                        l.reachable.clone(),
                        l.length.clone().gt(SmtTerm::int(i64::from(bound))),
                    ])
                })
                .collect();
            encoder.assert(SmtTerm::or(too_long));
            encoder.verify(&session)
        }))
    }

    /// All source routers are equally far from the destination edge, or all
    /// unreachable. Unreachable lengths are pinned to 0 and reachable ones are
    /// at least 1, so comparing lengths compares reachability too.
    pub fn check_equal_length(
        &self,
        dest_node: &str,
        dest_iface: &str,
        sources: &str,
    ) -> Result<PropertyAnswer, EngineError> {
        let edges = match_edges(self.graph(), dest_node, dest_iface)?;
        let sources = match_nodes(self.graph(), sources)?;
        Ok(self.run_per_edge(Property::EqualLength, &edges, |edge| {
            let (session, mut encoder) = self.encoder_for_edge(edge);
            let lengths = path_length(&mut encoder, edge);
            let terms: Vec<SmtTerm> = sources
                .iter()
                .filter_map(|s| lengths.get(s))
                .map(|l| l.length.clone())
                .collect();
            encoder.assert(all_equal(&terms).not());
            encoder.verify(&session)
        }))
    }
}
