//! Node and graph registries (§4.D): typed transforms and the routing
//! graphs that compose them, with the identity allocation, name
//! uniqueness, and cross-reference validation the rest of the core relies
//! on.

mod error;
mod graph;
mod ids;
mod node;

pub use error::GraphError;
pub use graph::{
    Graph, GraphBody, GraphKind, GraphManager, GraphMetadata, GraphOverrides, ENCODER_GRAPH_LIMIT,
};
pub use ids::{GraphId, NodeId, OpaqueBehavior, TypeMask};
pub use node::{Node, NodeManager, NodeOverrides};
