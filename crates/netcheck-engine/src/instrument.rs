//! Auxiliary variables that properties are stated over.
//!
//! Every instrument is exact: ranks (`dist`, `length`, loop ranks) decrease
//! along the witness path, so no flag can be justified by a cycle of
//! forwarding decisions that never reaches its base case.

use indexmap::IndexMap;
use netcheck_net::GraphEdge;
use netcheck_smt::sorts::SmtSort;
use netcheck_smt::terms::SmtTerm;

use crate::encoder::{Encoder, Plane};

/// One forwarding hop between two routers of the graph.
struct Link {
    from: String,
    to: String,
    forwards: SmtTerm,
    /// The destination lies on the link's own subnet.
    delivers: SmtTerm,
}

fn links(enc: &Encoder, plane: Plane) -> Vec<Link> {
    let graph = enc.graph();
    graph
        .edges()
        .filter_map(|edge| {
            let peer = edge.peer()?;
            graph.contains_router(&peer.router).then(|| Link {
                from: edge.router().to_string(),
                to: peer.router.clone(),
                forwards: enc.forwarding(plane, edge.router(), edge.interface()),
                delivers: enc.dst_in(&edge.prefix().network()),
            })
        })
        .collect()
}

fn plane_tag(plane: Plane) -> &'static str {
    match plane {
        Plane::Control => "cp",
        Plane::Data => "dp",
    }
}

/// `router` hands the packet straight out of the destination edge.
fn direct(enc: &Encoder, target: &GraphEdge, plane: Plane, router: &str) -> SmtTerm {
    if router == target.router() {
        enc.forwarding(plane, router, target.interface())
    } else {
        SmtTerm::ff()
    }
}

/// Per-router reachability of the destination edge.
#[derive(Debug, Clone)]
pub struct Reachability {
    pub reach: IndexMap<String, SmtTerm>,
    pub dist: IndexMap<String, SmtTerm>,
}

/// `reach[r]` holds iff some forwarding path from `r` leaves through `target`.
pub fn reachability(enc: &mut Encoder, target: &GraphEdge, plane: Plane) -> Reachability {
    let tag = format!("reach_{}_{}", plane_tag(plane), target.key());
    let routers: Vec<String> = enc.graph().routers().map(str::to_string).collect();
    let links = links(enc, plane);

    let mut reach = IndexMap::new();
    let mut dist = IndexMap::new();
    for router in &routers {
        reach.insert(router.clone(), enc.declare(&format!("{tag}_{router}"), SmtSort::Bool));
        dist.insert(router.clone(), enc.declare(&format!("{tag}_{router}_dist"), SmtSort::Int));
    }

    for router in &routers {
        let r = &reach[router];
        let d = &dist[router];
        let direct = direct(enc, target, plane, router);
        enc.assert(r.clone().implies(d.clone().ge(SmtTerm::int(1))));
        enc.assert(r.clone().not().implies(d.clone().eq(SmtTerm::int(0))));
        enc.assert(direct.clone().implies(r.clone()));

        let mut support = vec![SmtTerm::and(vec![direct, d.clone().eq(SmtTerm::int(1))])];
        for link in links.iter().filter(|l| &l.from == router) {
            let (rq, dq) = (&reach[&link.to], &dist[&link.to]);
            enc.assert(SmtTerm::and(vec![link.forwards.clone(), rq.clone()]).implies(r.clone()));
            support.push(SmtTerm::and(vec![
                link.forwards.clone(),
                rq.clone(),
                d.clone().eq(dq.clone().add(SmtTerm::int(1))),
            ]));
        }
        enc.assert(r.clone().implies(SmtTerm::or(support)));
    }

    Reachability { reach, dist }
}

/// Hop count to the destination edge, or unreachable.
///
/// Unreachable routers have `length = 0`; reachable ones have `length >= 1`,
/// so equal lengths imply equal reachability.
#[derive(Debug, Clone)]
pub struct PathLength {
    pub reachable: SmtTerm,
    pub length: SmtTerm,
}

/// Shortest control-plane path length from every router to `target`.
pub fn path_length(enc: &mut Encoder, target: &GraphEdge) -> IndexMap<String, PathLength> {
    path_length_in(enc, target, Plane::Control)
}

fn path_length_in(enc: &mut Encoder, target: &GraphEdge, plane: Plane) -> IndexMap<String, PathLength> {
    let reach = reachability(enc, target, plane);
    let tag = format!("len_{}_{}", plane_tag(plane), target.key());
    let links = links(enc, plane);

    let mut lengths = IndexMap::new();
    for router in reach.reach.keys() {
        lengths.insert(router.clone(), enc.declare(&format!("{tag}_{router}"), SmtSort::Int));
    }

    for (router, r) in &reach.reach {
        let len = &lengths[router];
        let direct = direct(enc, target, plane, router);
        enc.assert(r.clone().not().implies(len.clone().eq(SmtTerm::int(0))));
        enc.assert(r.clone().implies(len.clone().ge(SmtTerm::int(1))));
        enc.assert(direct.clone().implies(len.clone().eq(SmtTerm::int(1))));

        let mut support = vec![SmtTerm::and(vec![direct, len.clone().eq(SmtTerm::int(1))])];
        for link in links.iter().filter(|l| &l.from == router) {
            let (rq, lq) = (&reach.reach[&link.to], &lengths[&link.to]);
            let usable = SmtTerm::and(vec![link.forwards.clone(), rq.clone()]);
            let via = lq.clone().add(SmtTerm::int(1));
            enc.assert(usable.clone().implies(len.clone().le(via.clone())));
            support.push(SmtTerm::and(vec![usable, len.clone().eq(via)]));
        }
        enc.assert(r.clone().implies(SmtTerm::or(support)));
    }

    reach
        .reach
        .into_iter()
        .map(|(router, reachable)| {
            let length = lengths[&router].clone();
            (router, PathLength { reachable, length })
        })
        .collect()
}

/// Traffic volume on a router or edge; `load` is 0 unless `reachable`.
#[derive(Debug, Clone)]
pub struct Load {
    pub reachable: SmtTerm,
    pub load: SmtTerm,
}

#[derive(Debug, Clone)]
pub struct LoadVars {
    /// Load arriving at or originating in each router.
    pub routers: IndexMap<String, Load>,
    /// Load leaving through each edge, keyed by `router[interface]`.
    pub edges: IndexMap<String, Load>,
}

/// Every router that reaches `target` sends one unit toward it over the
/// data plane. Load only follows shortest paths and a router splits what
/// it carries as evenly as integers allow.
pub fn load(enc: &mut Encoder, target: &GraphEdge) -> LoadVars {
    let lengths = path_length_in(enc, target, Plane::Data);
    let tag = format!("load_{}", target.key());
    let graph = std::sync::Arc::clone(enc.graph());

    let mut edges: IndexMap<String, Load> = IndexMap::new();
    let mut incoming: IndexMap<String, Vec<SmtTerm>> = IndexMap::new();
    for edge in graph.edges() {
        let router = edge.router();
        let here = &lengths[router];
        let forwards = enc.forwarding(Plane::Data, router, edge.interface());
        let used = if edge == target {
            SmtTerm::and(vec![forwards, here.length.clone().eq(SmtTerm::int(1))])
        } else {
            match edge.peer().and_then(|p| lengths.get(&p.router)) {
                Some(there) => SmtTerm::and(vec![
                    forwards,
                    here.reachable.clone(),
                    there.reachable.clone(),
                    here.length.clone().eq(there.length.clone().add(SmtTerm::int(1))),
                ]),
                None => SmtTerm::ff(),
            }
        };
        let amount = enc.declare(&format!("{tag}_{}", edge.key()), SmtSort::Int);
        enc.assert(amount.clone().ge(SmtTerm::int(0)));
        enc.assert(used.clone().not().implies(amount.clone().eq(SmtTerm::int(0))));
        let feeds_peer = edge.peer().filter(|p| edge != target && lengths.contains_key(&p.router));
        if let Some(peer) = feeds_peer {
            incoming.entry(peer.router.clone()).or_default().push(amount.clone());
        }
        edges.insert(
            edge.key(),
            Load {
                reachable: used,
                load: amount,
            },
        );
    }

    let mut routers = IndexMap::new();
    for (router, len) in &lengths {
        let total = enc.declare(&format!("{tag}_{router}_total"), SmtSort::Int);
        let injected = SmtTerm::ite(len.reachable.clone(), SmtTerm::int(1), SmtTerm::int(0));
        let arriving = incoming
            .get(router)
            .into_iter()
            .flatten()
            .cloned()
            .fold(injected, SmtTerm::add);
        enc.assert(total.clone().eq(arriving));

        let outgoing: Vec<&Load> = graph
            .edges_of(router)
            .iter()
            .filter_map(|e| edges.get(&e.key()))
            .collect();
        let leaving = outgoing
            .iter()
            .map(|l| l.load.clone())
            .fold(SmtTerm::int(0), SmtTerm::add);
        enc.assert(len.reachable.clone().implies(total.clone().eq(leaving)));
        for (i, a) in outgoing.iter().enumerate() {
            for b in &outgoing[i + 1..] {
                let gap = SmtTerm::and(vec![
                    a.load.clone().sub(b.load.clone()).le(SmtTerm::int(1)),
                    b.load.clone().sub(a.load.clone()).le(SmtTerm::int(1)),
                ]);
                enc.assert(SmtTerm::and(vec![a.reachable.clone(), b.reachable.clone()]).implies(gap));
            }
        }
        routers.insert(
            router.clone(),
            Load {
                reachable: len.reachable.clone(),
                load: total,
            },
        );
    }

    LoadVars { routers, edges }
}

/// True iff data-plane forwarding starting at `router` comes back to it.
/// A packet sent onto the subnet it is addressed to is delivered there and
/// travels no further.
pub fn loops(enc: &mut Encoder, router: &str) -> SmtTerm {
    let tag = format!("loop_{router}");
    let routers: Vec<String> = enc.graph().routers().map(str::to_string).collect();
    let links: Vec<Link> = links(enc, Plane::Data)
        .into_iter()
        .map(|link| Link {
            forwards: SmtTerm::and(vec![link.forwards, link.delivers.clone().not()]),
            ..link
        })
        .collect();

    let mut on_path = IndexMap::new();
    let mut rank = IndexMap::new();
    for r in &routers {
        on_path.insert(r.clone(), enc.declare(&format!("{tag}_{r}"), SmtSort::Bool));
        rank.insert(r.clone(), enc.declare(&format!("{tag}_{r}_rank"), SmtSort::Int));
    }

    for link in &links {
        let step = if link.from == router {
            link.forwards.clone()
        } else {
            SmtTerm::and(vec![on_path[&link.from].clone(), link.forwards.clone()])
        };
        enc.assert(step.implies(on_path[&link.to].clone()));
    }

    for w in &routers {
        let (on, rk) = (&on_path[w], &rank[w]);
        enc.assert(on.clone().implies(rk.clone().ge(SmtTerm::int(1))));
        enc.assert(on.clone().not().implies(rk.clone().eq(SmtTerm::int(0))));
        let support = links
            .iter()
            .filter(|l| &l.to == w)
            .flat_map(|l| {
                let mut options = Vec::new();
                if l.from == router {
                    options.push(SmtTerm::and(vec![l.forwards.clone(), rk.clone().eq(SmtTerm::int(1))]));
                }
                options.push(SmtTerm::and(vec![
                    on_path[&l.from].clone(),
                    l.forwards.clone(),
                    rk.clone().eq(rank[&l.from].clone().add(SmtTerm::int(1))),
                ]));
                options
            })
            .collect();
        enc.assert(on.clone().implies(SmtTerm::or(support)));
    }

    on_path
        .get(router)
        .cloned()
        .unwrap_or_else(SmtTerm::ff)
}

/// Every term equals the first. Empty and singleton lists are trivially equal.
pub fn all_equal(terms: &[SmtTerm]) -> SmtTerm {
    match terms.split_first() {
        None => SmtTerm::tt(),
        Some((first, rest)) => SmtTerm::and(
            rest.iter()
                .map(|t| first.clone().eq(t.clone()))
                .collect(),
        ),
    }
}
