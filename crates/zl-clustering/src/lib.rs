//! The generic clustering graph (§4.F): a parameterized graph whose entire
//! routing behavior is driven by a `ClusteringConfig` CBOR blob carried as a
//! local parameter, grouping same-tagged input streams and handing each
//! group to a concat codec and a successor graph.

mod builder;
mod config;
mod error;
mod plan;

pub use builder::{
    ClusteringGraphBuilder, CONCAT_NUMERIC_NODE, CONCAT_SERIAL_NODE, CONCAT_STRING_NODE, CONCAT_STRUCT_NODE,
    FIELD_LZ_GRAPH, GENERIC_COMPRESSOR_GRAPH,
};
pub use config::{
    deserialize_cc, serialize_cc, validate_config, Cluster, ClusteringConfig, TypeSuccessor, CLUSTERING_CONFIG_PARAM_ID,
    CLUSTERING_CONFIG_SIZE_PARAM_ID, CLUSTERING_TAG_METADATA_ID,
};
pub use error::ClusteringError;
pub use plan::{plan_clusters, ClusterRoute, InputDescriptor, Routing};
