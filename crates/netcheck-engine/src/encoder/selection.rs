//! Best-path selection within each protocol and across protocols.

use netcheck_net::{EdgeDirection, Protocol};
use netcheck_smt::terms::SmtTerm;

use super::Encoder;
use crate::logical_edge::{Attributes, EdgeVars};

/// `best` is the most preferred of the permitted `options`, or nothing when
/// none is permitted.
fn select_best(best: &EdgeVars, options: &[(SmtTerm, &EdgeVars)]) -> Vec<SmtTerm> {
    let mut out = vec![
        best.permitted
            .clone()
            .eq(SmtTerm::or(options.iter().map(|(p, _)| p.clone()).collect())),
        best.zeroed_unless_permitted(),
    ];
    for (permitted, option) in options {
        out.push(permitted.clone().implies(best.at_least_as_good(option)));
    }
    out.push(best.permitted.clone().implies(SmtTerm::or(
        options
            .iter()
            .map(|(p, option)| SmtTerm::and(vec![p.clone(), best.same_attributes(option)]))
            .collect(),
    )));
    out
}

impl Encoder {
    pub(super) fn add_best_variables(&mut self) {
        let routers: Vec<String> = self.graph.routers().map(str::to_string).collect();
        for router in routers {
            for protocol in self.protocols(&router) {
                let name = self.name(&format!("{router}_{protocol}_best"));
                let vars = EdgeVars::declare(
                    &mut self.constraints,
                    &name,
                    Attributes::for_protocol(protocol),
                );
                self.protocol_best.insert((router.clone(), protocol), vars);
            }
            let name = self.name(&format!("{router}_best"));
            let vars = EdgeVars::declare(&mut self.constraints, &name, Attributes::ALL);
            self.best.insert(router, vars);
        }
    }

    /// Import edges of `router` in `protocol`.
    pub(super) fn imports(&self, router: &str, protocol: Protocol) -> Vec<&EdgeVars> {
        self.logical_edges
            .values()
            .filter(|e| {
                e.edge.router() == router
                    && e.protocol == protocol
                    && e.direction == EdgeDirection::Import
            })
            .map(|e| &e.vars)
            .collect()
    }

    pub(super) fn add_best_path_constraints(&mut self) {
        let mut terms = Vec::new();
        for ((router, protocol), best) in &self.protocol_best {
            let options: Vec<(SmtTerm, &EdgeVars)> = self
                .imports(router, *protocol)
                .into_iter()
                .map(|v| (v.permitted.clone(), v))
                .collect();
            terms.extend(select_best(best, &options));
        }
        for (router, best) in &self.best {
            let options: Vec<(SmtTerm, &EdgeVars)> = self
                .protocol_best
                .iter()
                .filter(|((r, _), _)| r == router)
                .map(|(_, v)| (v.permitted.clone(), v))
                .collect();
            terms.extend(select_best(best, &options));
        }
        for term in terms {
            self.constraints.assert(term);
        }
    }
}
