use std::net::Ipv4Addr;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use indexmap::IndexMap;
use netcheck_engine::{EncodingSession, Encoder, SolverOptions};
use netcheck_net::config::{BgpConfig, BgpNeighbor, InterfaceConfig, OspfConfig, RouterConfig};
use netcheck_net::{Graph, NetworkConfig, Prefix};

/// `n` routers in a line running OSPF on every link and BGP between
/// neighbors, with an environment session on the last router.
fn line(n: u8) -> NetworkConfig {
    let mut routers = IndexMap::new();
    for i in 0..n {
        let mut rc = RouterConfig {
            ospf: Some(OspfConfig::default()),
            ..RouterConfig::default()
        };
        let mut bgp = BgpConfig {
            local_as: 65000 + u32::from(i),
            ..BgpConfig::default()
        };
        if i > 0 {
            let mut left = InterfaceConfig::new(Prefix::new(Ipv4Addr::new(10, i - 1, 0, 2), 30).unwrap());
            left.ospf = true;
            rc.interfaces.insert("left".into(), left);
            bgp.neighbors.push(BgpNeighbor {
                peer_address: Ipv4Addr::new(10, i - 1, 0, 1),
                remote_as: 65000 + u32::from(i - 1),
                import_filter: None,
                export_filter: None,
            });
        }
        let right_addr = if i + 1 < n {
            Ipv4Addr::new(10, i, 0, 1)
        } else {
            Ipv4Addr::new(203, 0, 113, 1)
        };
        let mut right = InterfaceConfig::new(Prefix::new(right_addr, 30).unwrap());
        right.ospf = i + 1 < n;
        rc.interfaces.insert("right".into(), right);
        bgp.neighbors.push(BgpNeighbor {
            peer_address: if i + 1 < n {
                Ipv4Addr::new(10, i, 0, 2)
            } else {
                Ipv4Addr::new(203, 0, 113, 2)
            },
            remote_as: 65000 + u32::from(i) + 1,
            import_filter: None,
            export_filter: None,
        });
        rc.bgp = Some(bgp);
        routers.insert(format!("r{i}"), rc);
    }
    NetworkConfig { routers }
}

fn bench_compute_encoding_line_16(c: &mut Criterion) {
    let graph = Arc::new(Graph::new(&line(16), None));
    c.bench_function("compute_encoding_line_16", |b| {
        b.iter(|| {
            let mut session = EncodingSession::new(SolverOptions::default());
            let mut encoder = Encoder::new(&mut session, Vec::new(), Arc::clone(&graph));
            black_box(encoder.compute_encoding().assertions().len())
        })
    });
}

fn bench_build_graph_line_64(c: &mut Criterion) {
    let net = line(64);
    c.bench_function("build_graph_line_64", |b| {
        b.iter(|| Graph::new(black_box(&net), None))
    });
}

criterion_group!(benches, bench_compute_encoding_line_16, bench_build_graph_line_64);
criterion_main!(benches);
