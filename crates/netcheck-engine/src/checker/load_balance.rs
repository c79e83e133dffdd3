use netcheck_net::selector::{match_edges, match_nodes};
use netcheck_smt::terms::SmtTerm;

use super::PropertyChecker;
use crate::error::EngineError;
use crate::instrument::{load, Load};
use crate::result::{Property, PropertyAnswer};

impl PropertyChecker {
    /// Reachable routers in `peers` carry loads toward each destination edge
    /// that differ by at most `threshold`. Unreachable peers carry nothing
    /// and are left out of the comparison.
    pub fn check_load_balance(
        &self,
        dest_node: &str,
        dest_iface: &str,
        peers: &str,
        threshold: u32,
    ) -> Result<PropertyAnswer, EngineError> {
        let edges = match_edges(self.graph(), dest_node, dest_iface)?;
        let peers = match_nodes(self.graph(), peers)?;
        Ok(self.run_per_edge(Property::LoadBalance, &edges, |edge| {
            let (session, mut encoder) = self.encoder_for_edge(edge);
            let vars = load(&mut encoder, edge);
            let loads: Vec<&Load> = peers.iter().filter_map(|p| vars.routers.get(p)).collect();
            let t = SmtTerm::int(i64::from(threshold));
            let mut imbalances = Vec::new();
            for (i, a) in loads.iter().enumerate() {
                for b in &loads[i + 1..] {
                    imbalances.push(SmtTerm::and(vec![
                        a.reachable.clone(),
                        b.reachable.clone(),
                        SmtTerm::or(vec![
                            a.load.clone().sub(b.load.clone()).gt(t.clone()),
                            b.load.clone().sub(a.load.clone()).gt(t.clone()),
                        ]),
                    ]));
                }
            }
            encoder.assert(SmtTerm::or(imbalances));
            encoder.verify(&session)
        }))
    }
}
