use std::collections::HashMap;

use tracing::trace;
use zl_graph::{GraphId, NodeId};

use crate::config::ClusteringConfig;
use crate::error::ClusteringError;

/// The clustering-relevant facts about one input stream: its tag (read from
/// int metadata key 0, §4.F step 8) and its elementary type/width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDescriptor {
    pub tag: i64,
    pub type_: i64,
    pub elt_width: i64,
}

impl InputDescriptor {
    /// Reads the clustering tag from an input's int metadata at key 0,
    /// failing with `node_invalid_input` when it's absent (§4.F step 8).
    pub fn from_metadata(metadata: Option<i64>, type_: i64, elt_width: i64) -> Result<Self, ClusteringError> {
        let tag = metadata
            .ok_or_else(|| ClusteringError::invalid_input("input is missing clustering-tag metadata at key 0"))?;
        Ok(InputDescriptor { tag, type_, elt_width })
    }
}

/// Where one cluster's member edges end up (§4.F steps 6-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// A single member routes directly to `successor`; no concat codec
    /// runs.
    Direct { successor: GraphId },
    /// More than one member: `codec` concatenates them. Its sizes stream,
    /// if it emits one, always goes to the fixed field-lz graph; its
    /// content stream goes to `successor`.
    Concat { codec: NodeId, successor: GraphId },
}

/// One populated cluster: its chosen successor and codec, and the indices
/// (into the `inputs` slice `plan_clusters` was called with) assigned to
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRoute {
    pub successor: GraphId,
    pub clustering_codec: NodeId,
    pub members: Vec<usize>,
}

impl ClusterRoute {
    pub fn routing(&self) -> Routing {
        if self.members.len() <= 1 {
            Routing::Direct { successor: self.successor }
        } else {
            Routing::Concat {
                codec: self.clustering_codec,
                successor: self.successor,
            }
        }
    }
}

type ClusterKey = (i64, i64, i64);
type TypeWidth = (i64, i64);

/// Runs the clustering algorithm (§4.F steps 2-7) over `inputs`, assuming
/// `config` has already passed [`crate::validate_config`]. `successors` and
/// `clustering_codecs` are indexed by the config's `successorIdx` /
/// `clusteringCodecIdx`; `generic_compressor` and `concat_codec_for_type`
/// are the fallback used for a tag that no cluster or type default names.
pub fn plan_clusters(
    config: &ClusteringConfig,
    inputs: &[InputDescriptor],
    successors: &[GraphId],
    clustering_codecs: &[NodeId],
    generic_compressor: GraphId,
    concat_codec_for_type: impl Fn(i64) -> Option<NodeId>,
) -> Result<Vec<ClusterRoute>, ClusteringError> {
    let lookup = |successor_idx: usize, codec_idx: usize| -> Result<(GraphId, NodeId), ClusteringError> {
        let successor = *successors
            .get(successor_idx)
            .ok_or_else(|| ClusteringError::invalid_input(format!("successorIdx {successor_idx} is out of range")))?;
        let codec = *clustering_codecs
            .get(codec_idx)
            .ok_or_else(|| ClusteringError::invalid_input(format!("clusteringCodecIdx {codec_idx} is out of range")))?;
        Ok((successor, codec))
    };

    let mut routes = Vec::with_capacity(config.clusters.len());
    let mut tag_to_cluster: HashMap<ClusterKey, usize> = HashMap::new();
    for (i, cluster) in config.clusters.iter().enumerate() {
        let ts = &cluster.type_successor;
        let (successor, clustering_codec) = lookup(ts.successor_idx, ts.clustering_codec_idx)?;
        for &tag in &cluster.member_tags {
            let key: ClusterKey = (tag, ts.type_, ts.elt_width);
            if tag_to_cluster.insert(key, i).is_some() {
                return Err(ClusteringError::invalid_input(format!(
                    "tag {tag} (type {}, eltWidth {}) is a member of more than one cluster",
                    ts.type_, ts.elt_width
                )));
            }
        }
        routes.push(ClusterRoute {
            successor,
            clustering_codec,
            members: Vec::new(),
        });
    }

    let mut type_defaults: HashMap<TypeWidth, usize> = HashMap::new();
    for (i, ts) in config.type_defaults.iter().enumerate() {
        if type_defaults.insert((ts.type_, ts.elt_width), i).is_some() {
            return Err(ClusteringError::invalid_input(format!(
                "typeDefaults has more than one entry for (type {}, eltWidth {})",
                ts.type_, ts.elt_width
            )));
        }
    }

    for (idx, input) in inputs.iter().enumerate() {
        let key: ClusterKey = (input.tag, input.type_, input.elt_width);
        let cluster_idx = match tag_to_cluster.get(&key) {
            Some(&i) => i,
            None => {
                let (successor, clustering_codec) = match type_defaults.get(&(input.type_, input.elt_width)) {
                    Some(&i) => {
                        let ts = &config.type_defaults[i];
                        lookup(ts.successor_idx, ts.clustering_codec_idx)?
                    }
                    None => {
                        let codec = concat_codec_for_type(input.type_).ok_or_else(|| {
                            ClusteringError::invalid_input(format!(
                                "no default concat codec registered for type {}",
                                input.type_
                            ))
                        })?;
                        (generic_compressor, codec)
                    }
                };
                let i = routes.len();
                routes.push(ClusterRoute {
                    successor,
                    clustering_codec,
                    members: Vec::new(),
                });
                tag_to_cluster.insert(key, i);
                trace!(tag = input.tag, type_ = input.type_, elt_width = input.elt_width, "created unconfigured cluster");
                i
            }
        };
        routes[cluster_idx].members.push(idx);
    }

    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cluster, TypeSuccessor};

    fn ts(successor_idx: usize, clustering_codec_idx: usize) -> TypeSuccessor {
        TypeSuccessor {
            type_: 1,
            elt_width: 4,
            successor_idx,
            clustering_codec_idx,
        }
    }

    #[test]
    fn clustering_by_tag_groups_repeats_and_routes_unmatched_to_its_own_cluster() {
        // Scenario D.
        let config = ClusteringConfig {
            clusters: vec![Cluster {
                type_successor: ts(0, 0),
                member_tags: vec![1],
            }],
            type_defaults: vec![ts(1, 0)],
        };
        let inputs = [
            InputDescriptor { tag: 1, type_: 1, elt_width: 4 },
            InputDescriptor { tag: 2, type_: 1, elt_width: 4 },
            InputDescriptor { tag: 1, type_: 1, elt_width: 4 },
        ];
        let successors = [GraphId(10), GraphId(11)];
        let codecs = [NodeId(20)];
        let routes = plan_clusters(&config, &inputs, &successors, &codecs, GraphId(99), |_| None).unwrap();

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].members, vec![0, 2]);
        assert_eq!(routes[0].successor, GraphId(10));
        assert_eq!(routes[0].routing(), Routing::Concat { codec: NodeId(20), successor: GraphId(10) });
        assert_eq!(routes[1].members, vec![1]);
        assert_eq!(routes[1].successor, GraphId(11));
        assert_eq!(routes[1].routing(), Routing::Direct { successor: GraphId(11) });
    }

    #[test]
    fn duplicate_member_tag_across_clusters_is_invalid_input() {
        let config = ClusteringConfig {
            clusters: vec![
                Cluster { type_successor: ts(0, 0), member_tags: vec![1] },
                Cluster { type_successor: ts(0, 0), member_tags: vec![1] },
            ],
            type_defaults: Vec::new(),
        };
        let err = plan_clusters(&config, &[], &[GraphId(0)], &[NodeId(0)], GraphId(1), |_| None).unwrap_err();
        assert!(matches!(err, ClusteringError::InvalidInput(_)));
    }

    #[test]
    fn unconfigured_tag_with_no_type_default_falls_back_to_generic_compressor() {
        let config = ClusteringConfig {
            clusters: Vec::new(),
            type_defaults: Vec::new(),
        };
        let inputs = [InputDescriptor { tag: 7, type_: 3, elt_width: 1 }];
        let routes = plan_clusters(&config, &inputs, &[], &[], GraphId(42), |t| {
            assert_eq!(t, 3);
            Some(NodeId(5))
        })
        .unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].successor, GraphId(42));
        assert_eq!(routes[0].clustering_codec, NodeId(5));
        assert_eq!(routes[0].routing(), Routing::Direct { successor: GraphId(42) });
    }

    #[test]
    fn repeated_unconfigured_tag_merges_into_one_cluster() {
        let config = ClusteringConfig {
            clusters: Vec::new(),
            type_defaults: Vec::new(),
        };
        let inputs = [
            InputDescriptor { tag: 7, type_: 3, elt_width: 1 },
            InputDescriptor { tag: 7, type_: 3, elt_width: 1 },
        ];
        let routes = plan_clusters(&config, &inputs, &[], &[], GraphId(42), |_| Some(NodeId(5))).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].members, vec![0, 1]);
    }

    #[test]
    fn missing_metadata_is_rejected_before_a_descriptor_is_built() {
        assert!(matches!(
            InputDescriptor::from_metadata(None, 1, 4),
            Err(ClusteringError::InvalidInput(_))
        ));
        assert_eq!(InputDescriptor::from_metadata(Some(9), 1, 4).unwrap(), InputDescriptor { tag: 9, type_: 1, elt_width: 4 });
    }
}
