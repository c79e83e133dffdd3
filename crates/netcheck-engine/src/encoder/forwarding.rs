//! Control-plane and data-plane forwarding decisions.

use netcheck_net::config::{FilterAction, PacketFilter};
use netcheck_net::{EdgeDirection, GraphEdge};
use netcheck_smt::sorts::SmtSort;
use netcheck_smt::terms::SmtTerm;
use tracing::warn;

use super::Encoder;
use crate::logical_edge::LogicalEdgeKey;

impl Encoder {
    pub(super) fn add_forwarding(&mut self) {
        let graph = std::sync::Arc::clone(&self.graph);
        for edge in graph.edges() {
            let router = edge.router();
            let chosen = self.control_choice(edge);
            let permits = self.outbound_permits(edge);

            let cf_name = self.name(&format!("{router}_cf_{}", edge.interface()));
            let cf = self.constraints.declare(cf_name, SmtSort::Bool);
            self.constraints.assert(cf.clone().eq(chosen));

            let df_name = self.name(&format!("{router}_df_{}", edge.interface()));
            let df = self.constraints.declare(df_name, SmtSort::Bool);
            self.constraints
                .assert(df.clone().eq(SmtTerm::and(vec![cf.clone(), permits])));

            let key = (router.to_string(), edge.interface().to_string());
            self.control_forwarding.insert(key.clone(), cf);
            self.data_forwarding.insert(key, df);
        }
    }

    /// Some protocol's route on `edge` is that protocol's best, and that
    /// protocol's best is the router's overall best.
    fn control_choice(&self, edge: &GraphEdge) -> SmtTerm {
        let router = edge.router();
        let Some(best) = self.best(router) else {
            return SmtTerm::ff();
        };
        let mut options = Vec::new();
        for protocol in self.protocols(router) {
            let key = LogicalEdgeKey::new(router, protocol, edge.interface(), EdgeDirection::Import);
            let (Some(import), Some(proto_best)) =
                (self.logical_edge(&key), self.protocol_best(router, protocol))
            else {
                continue;
            };
            options.push(SmtTerm::and(vec![
                import.vars.permitted.clone(),
                import.vars.same_attributes(proto_best),
                proto_best.permitted.clone(),
                proto_best.same_attributes(best),
            ]));
        }
        SmtTerm::or(options)
    }

    /// Whether the outbound packet filter of `edge` lets the packet through.
    fn outbound_permits(&self, edge: &GraphEdge) -> SmtTerm {
        let Some(name) = self
            .graph
            .interface_config(edge)
            .and_then(|i| i.outbound_filter.as_deref())
        else {
            return SmtTerm::tt();
        };
        match self
            .graph
            .config(edge.router())
            .and_then(|rc| rc.packet_filter(name))
        {
            Some(filter) => self.packet_filter_permits(filter),
            None => {
                warn!(
                    router = %edge.router(),
                    interface = %edge.interface(),
                    filter = %name,
                    "undefined packet filter permits every packet"
                );
                SmtTerm::tt()
            }
        }
    }

    /// First-match evaluation; a packet matching no line is dropped.
    pub(crate) fn packet_filter_permits(&self, filter: &PacketFilter) -> SmtTerm {
        filter.lines.iter().rev().fold(SmtTerm::ff(), |rest, line| {
            let mut conditions = Vec::new();
            if let Some(dst) = &line.destination {
                conditions.push(self.dst_in(&dst.network()));
            }
            if let Some(src) = &line.source {
                conditions.push(SmtTerm::and(vec![
                    self.src_ip.clone().ge(SmtTerm::int(i64::from(src.first()))),
                    self.src_ip.clone().le(SmtTerm::int(i64::from(src.last()))),
                ]));
            }
            SmtTerm::ite(
                SmtTerm::and(conditions),
                SmtTerm::bool(line.action == FilterAction::Permit),
                rest,
            )
        })
    }
}
