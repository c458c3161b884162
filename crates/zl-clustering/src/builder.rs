use std::sync::Arc;

use tracing::trace;
use zl_arena::{alloc_slice, Name};
use zl_compressor::Compressor;
use zl_graph::{GraphId, NodeId, TypeMask};
use zl_localparams::{BlobParam, IntParam};

use crate::config::{
    serialize_cc, validate_config, ClusteringConfig, CLUSTERING_CONFIG_PARAM_ID, CLUSTERING_CONFIG_SIZE_PARAM_ID,
};
use crate::error::ClusteringError;

/// Standard clustering-codec anchor names the embedding program must
/// pre-register before calling [`ClusteringGraphBuilder::with_concat_codecs`]
/// (mirrors the four nodes `ZL_Clustering_registerGraph` hands to its
/// custom-codec counterpart: `ZL_NODE_CONCAT_SERIAL/STRUCT/NUMERIC/STRING`).
pub const CONCAT_SERIAL_NODE: &str = "!zl.concat_serial";
pub const CONCAT_STRUCT_NODE: &str = "!zl.concat_struct";
pub const CONCAT_NUMERIC_NODE: &str = "!zl.concat_numeric";
pub const CONCAT_STRING_NODE: &str = "!zl.concat_string";

/// Fallback successor for a tag whose type has no `typeDefaults` entry
/// (§4.F step 5).
pub const GENERIC_COMPRESSOR_GRAPH: &str = "!zl.compress_generic";

/// Fixed destination for a concat codec's segment-size stream (§4.F step 7).
pub const FIELD_LZ_GRAPH: &str = "!zl.field_lz";

/// Payload carried by the registered graph's [`zl_graph::OpaqueBehavior`];
/// never read by this crate, only by whatever drives actual compression.
#[allow(dead_code)]
struct ClusteringBehavior {
    config: ClusteringConfig,
    clustering_codecs: Vec<NodeId>,
}

/// Registers the generic clustering graph (§4.F): a parameterized,
/// function-kind graph whose routing is entirely driven by a
/// [`ClusteringConfig`] carried as a local-param blob.
pub struct ClusteringGraphBuilder;

impl ClusteringGraphBuilder {
    /// Registers using the four standard concat codecs, looked up by their
    /// anchor names in `compressor`. Mirrors `ZL_Clustering_registerGraph`,
    /// which is a thin wrapper over the custom-codec entry point below.
    pub fn with_concat_codecs(
        compressor: &mut Compressor,
        name: Name<'static>,
        config: &ClusteringConfig,
        successors: &[GraphId],
    ) -> Result<GraphId, ClusteringError> {
        let codecs = [CONCAT_SERIAL_NODE, CONCAT_STRUCT_NODE, CONCAT_NUMERIC_NODE, CONCAT_STRING_NODE]
            .into_iter()
            .map(|anchor| {
                compressor
                    .nodes()
                    .get_by_name(anchor)
                    .map(|node| node.id)
                    .ok_or_else(|| ClusteringError::invalid_input(format!("standard clustering codec {anchor:?} is not registered")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_custom_codecs(compressor, name, config, successors, &codecs)
    }

    /// Registers using caller-supplied clustering codecs. Mirrors
    /// `ZL_Clustering_registerGraphWithCustomClusteringCodecs`: a valid
    /// codec takes exactly one variable input and emits an optional numeric
    /// size stream plus one output of the input's type.
    pub fn with_custom_codecs(
        compressor: &mut Compressor,
        name: Name<'static>,
        config: &ClusteringConfig,
        successors: &[GraphId],
        clustering_codecs: &[NodeId],
    ) -> Result<GraphId, ClusteringError> {
        validate_config(config, successors.len(), clustering_codecs.len())?;

        let arena = compressor.arena();
        let blob = serialize_cc(config);
        let blob_len = blob.len() as i64;
        let blob = alloc_slice(arena, &blob)?;
        let local_params = zl_localparams::build(
            arena,
            &[IntParam { id: CLUSTERING_CONFIG_SIZE_PARAM_ID, value: blob_len }],
            &[BlobParam { id: CLUSTERING_CONFIG_PARAM_ID, value: blob }],
            &[],
        )?;

        let behavior: zl_graph::OpaqueBehavior = Arc::new(ClusteringBehavior {
            config: config.clone(),
            clustering_codecs: clustering_codecs.to_vec(),
        });

        let gid = compressor.register_function_graph(
            name,
            &[TypeMask::ANY],
            successors,
            clustering_codecs,
            behavior,
            local_params,
        )?;
        trace!(graph = %gid, clusters = config.clusters.len(), type_defaults = config.type_defaults.len(), "registered clustering graph");
        Ok(gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cluster, TypeSuccessor};
    use zl_arena::Name;
    use zl_graph::TypeMask as Mask;
    use zl_localparams::LocalParams;
    use std::sync::Arc as StdArc;

    fn opaque() -> zl_graph::OpaqueBehavior {
        StdArc::new(())
    }

    fn register_leaf(compressor: &mut Compressor, anchor: &str) -> NodeId {
        let name = Name::standard(compressor.arena(), anchor).unwrap();
        compressor
            .nodes_mut()
            .register_custom(name, &[Mask::ANY], &[Mask::ANY], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap()
    }

    fn register_store_graph(compressor: &mut Compressor, anchor: &str, leaf: NodeId) -> GraphId {
        let name = Name::standard(compressor.arena(), anchor).unwrap();
        compressor
            .register_multi_input_graph(name, &[Mask::ANY], &[], &[leaf], LocalParams::EMPTY)
            .unwrap()
    }

    #[test]
    fn with_custom_codecs_validates_and_registers_a_function_graph() {
        let mut c = Compressor::new(1);
        let codec_node = register_leaf(&mut c, "!zl.my_codec");
        let leaf = register_leaf(&mut c, "!zl.leaf");
        let successor = register_store_graph(&mut c, "!zl.successor", leaf);

        let config = ClusteringConfig {
            clusters: vec![Cluster {
                type_successor: TypeSuccessor { type_: 1, elt_width: 4, successor_idx: 0, clustering_codec_idx: 0 },
                member_tags: vec![1],
            }],
            type_defaults: Vec::new(),
        };

        let name = Name::build(c.arena(), "cluster_graph", c.graphs().next_id().0).unwrap();
        let gid = ClusteringGraphBuilder::with_custom_codecs(&mut c, name, &config, &[successor], &[codec_node]).unwrap();
        let meta = c.graphs().metadata(gid).unwrap();
        assert_eq!(meta.kind, zl_graph::GraphKind::Function);
        assert_eq!(meta.custom_graphs, &[successor]);
        assert_eq!(meta.custom_nodes, &[codec_node]);
    }

    #[test]
    fn with_custom_codecs_rejects_an_out_of_range_successor_idx() {
        let mut c = Compressor::new(1);
        let codec_node = register_leaf(&mut c, "!zl.my_codec");
        let config = ClusteringConfig {
            clusters: Vec::new(),
            type_defaults: vec![TypeSuccessor { type_: 1, elt_width: 4, successor_idx: 4, clustering_codec_idx: 0 }],
        };
        let name = Name::build(c.arena(), "cluster_graph", c.graphs().next_id().0).unwrap();
        let err = ClusteringGraphBuilder::with_custom_codecs(&mut c, name, &config, &[], &[codec_node]).unwrap_err();
        assert!(matches!(err, ClusteringError::InvalidInput(_)));
    }

    #[test]
    fn with_concat_codecs_requires_the_standard_anchors_pre_registered() {
        let mut c = Compressor::new(1);
        let config = ClusteringConfig::default();
        let name = Name::build(c.arena(), "cluster_graph", c.graphs().next_id().0).unwrap();
        let err = ClusteringGraphBuilder::with_concat_codecs(&mut c, name, &config, &[]).unwrap_err();
        assert!(matches!(err, ClusteringError::InvalidInput(_)));
    }
}
