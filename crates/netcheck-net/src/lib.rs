#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod graph;
pub mod protocol;
pub mod selector;

pub use config::{NetworkConfig, Prefix, RouterConfig};
pub use error::NetError;
pub use graph::{Graph, GraphEdge};
pub use protocol::{EdgeDirection, Protocol};
