//! Regex-based selection of routers and edges.
//!
//! Patterns must match the whole name: `r1` selects `r1` but not `r10`.

use indexmap::IndexSet;
use regex::Regex;

use crate::error::NetError;
use crate::graph::{Graph, GraphEdge};

/// Compile `pattern` anchored at both ends.
pub fn compile(pattern: &str) -> Result<Regex, NetError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| NetError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Router names in `graph` matching `pattern`, in graph order.
pub fn match_nodes(graph: &Graph, pattern: &str) -> Result<IndexSet<String>, NetError> {
    let re = compile(pattern)?;
    Ok(graph
        .routers()
        .filter(|name| re.is_match(name))
        .map(str::to_string)
        .collect())
}

/// Edges whose router matches `node_pattern` and whose interface matches
/// `iface_pattern`.
pub fn match_edges(
    graph: &Graph,
    node_pattern: &str,
    iface_pattern: &str,
) -> Result<Vec<GraphEdge>, NetError> {
    let node_re = compile(node_pattern)?;
    let iface_re = compile(iface_pattern)?;
    Ok(graph
        .edges()
        .filter(|e| node_re.is_match(e.router()) && iface_re.is_match(e.interface()))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;

    fn graph() -> Graph {
        let net = NetworkConfig::from_json(
            r#"{ "routers": {
                "r1":  { "interfaces": { "eth0": { "address": "10.0.0.1/30" }, "eth1": { "address": "10.1.0.1/24" } } },
                "r10": { "interfaces": { "eth0": { "address": "10.0.0.2/30" } } },
                "core": { "interfaces": { "lo": { "address": "10.255.0.1/32" } } }
            } }"#,
        )
        .unwrap();
        Graph::new(&net, None)
    }

    #[test]
    fn patterns_match_whole_names() {
        let g = graph();
        let nodes = match_nodes(&g, "r1").unwrap();
        assert_eq!(nodes.into_iter().collect::<Vec<_>>(), vec!["r1"]);
        let nodes = match_nodes(&g, "r.*").unwrap();
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn edges_filter_on_router_and_interface() {
        let g = graph();
        let edges = match_edges(&g, "r1.*", "eth0").unwrap();
        let keys: Vec<String> = edges.iter().map(GraphEdge::key).collect();
        assert_eq!(keys, vec!["r1[eth0]", "r10[eth0]"]);
    }

    #[test]
    fn empty_match_is_not_an_error() {
        let g = graph();
        assert!(match_nodes(&g, "edge.*").unwrap().is_empty());
        assert!(match_edges(&g, ".*", "ge-0/0/0").unwrap().is_empty());
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let g = graph();
        let err = match_nodes(&g, "r(").unwrap_err();
        assert!(matches!(err, NetError::InvalidPattern { ref pattern, .. } if pattern == "r("));
        assert!(match_edges(&g, ".*", "[").is_err());
    }
}
