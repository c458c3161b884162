use zl_a1c::{decode, encode, DecoderOptions, ArrayBuilder, Item, MapBuilder};

use crate::error::ClusteringError;

/// Metadata key under which every clustered input must carry its int tag
/// (§4.F step 8).
pub const CLUSTERING_TAG_METADATA_ID: i64 = 0;

/// Local-param id the serialized `ClusteringConfig` blob is stored under,
/// carried verbatim from the original header's `ZL_GENERIC_CLUSTERING_CONFIG_ID`.
pub const CLUSTERING_CONFIG_PARAM_ID: i64 = 315;

/// Companion int param recording the blob's length, carried from
/// `ZL_GENERIC_CLUSTERING_CONFIG_SIZE_ID`.
pub const CLUSTERING_CONFIG_SIZE_PARAM_ID: i64 = 316;

/// One `(type, eltWidth) -> (successor, codec)` routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSuccessor {
    pub type_: i64,
    pub elt_width: i64,
    pub successor_idx: usize,
    pub clustering_codec_idx: usize,
}

/// A configured group of stable tags, all routed the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub type_successor: TypeSuccessor,
    pub member_tags: Vec<i64>,
}

/// The full clustering configuration (§4.F): the fixed clusters plus the
/// fallback rules for tags no cluster names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusteringConfig {
    pub clusters: Vec<Cluster>,
    pub type_defaults: Vec<TypeSuccessor>,
}

fn encode_type_successor<'a>(arena: &'a bumpalo::Bump, ts: &TypeSuccessor) -> Result<Item<'a>, ClusteringError> {
    let mut m = MapBuilder::with_capacity(arena, 4);
    m.push_str("type", Item::Int(ts.type_), arena)?;
    m.push_str("eltWidth", Item::Int(ts.elt_width), arena)?;
    m.push_str("successorIdx", Item::Int(ts.successor_idx as i64), arena)?;
    m.push_str("clusteringCodecIdx", Item::Int(ts.clustering_codec_idx as i64), arena)?;
    Ok(Item::Map(m.finish()))
}

fn decode_type_successor(item: &Item) -> Result<TypeSuccessor, ClusteringError> {
    let get_int = |key: &str| {
        item.map_get(key)
            .and_then(Item::as_int)
            .ok_or_else(|| ClusteringError::malformed(format!("typeSuccessor is missing integer key {key:?}")))
    };
    Ok(TypeSuccessor {
        type_: get_int("type")?,
        elt_width: get_int("eltWidth")?,
        successor_idx: get_int("successorIdx")? as usize,
        clustering_codec_idx: get_int("clusteringCodecIdx")? as usize,
    })
}

/// Serializes a [`ClusteringConfig`] to its fixed-key-order CBOR form
/// (§4.F). Never fails: every field is a plain integer and capacities are
/// computed up front.
pub fn serialize_cc(config: &ClusteringConfig) -> Vec<u8> {
    let arena = bumpalo::Bump::new();
    let item = encode_config(&arena, config).expect("fixed-capacity builders sized from `config` cannot overrun");
    encode(&item)
}

fn encode_config<'a>(arena: &'a bumpalo::Bump, config: &ClusteringConfig) -> Result<Item<'a>, ClusteringError> {
    let mut clusters = ArrayBuilder::with_capacity(arena, config.clusters.len());
    for cluster in &config.clusters {
        let mut cm = MapBuilder::with_capacity(arena, 2);
        cm.push_str("typeSuccessor", encode_type_successor(arena, &cluster.type_successor)?, arena)?;
        let mut tags = ArrayBuilder::with_capacity(arena, cluster.member_tags.len());
        for &tag in &cluster.member_tags {
            tags.push(Item::Int(tag))?;
        }
        cm.push_str("memberTags", Item::Array(tags.finish()), arena)?;
        clusters.push(Item::Map(cm.finish()))?;
    }

    let mut type_defaults = ArrayBuilder::with_capacity(arena, config.type_defaults.len());
    for ts in &config.type_defaults {
        type_defaults.push(encode_type_successor(arena, ts)?)?;
    }

    let mut root = MapBuilder::with_capacity(arena, 2);
    root.push_str("clusters", Item::Array(clusters.finish()), arena)?;
    root.push_str("typeDefaults", Item::Array(type_defaults.finish()), arena)?;
    Ok(Item::Map(root.finish()))
}

/// Deserializes a [`ClusteringConfig`] previously produced by
/// [`serialize_cc`] (or an equivalent writer of the same schema).
pub fn deserialize_cc(bytes: &[u8]) -> Result<ClusteringConfig, ClusteringError> {
    let arena = bumpalo::Bump::new();
    let root = decode(bytes, &arena, DecoderOptions::default())?;

    let clusters_item = root
        .map_get("clusters")
        .and_then(Item::as_array)
        .ok_or_else(|| ClusteringError::malformed("root document is missing array \"clusters\""))?;
    let mut clusters = Vec::with_capacity(clusters_item.len());
    for item in clusters_item {
        let type_successor = item
            .map_get("typeSuccessor")
            .ok_or_else(|| ClusteringError::malformed("cluster is missing \"typeSuccessor\""))
            .and_then(decode_type_successor)?;
        let member_tags = item
            .map_get("memberTags")
            .and_then(Item::as_array)
            .ok_or_else(|| ClusteringError::malformed("cluster is missing array \"memberTags\""))?
            .iter()
            .map(|t| t.as_int().ok_or_else(|| ClusteringError::malformed("memberTags entry is not an integer")))
            .collect::<Result<Vec<_>, _>>()?;
        clusters.push(Cluster { type_successor, member_tags });
    }

    let type_defaults_item = root
        .map_get("typeDefaults")
        .and_then(Item::as_array)
        .ok_or_else(|| ClusteringError::malformed("root document is missing array \"typeDefaults\""))?;
    let type_defaults = type_defaults_item
        .iter()
        .map(decode_type_successor)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ClusteringConfig { clusters, type_defaults })
}

/// Registration-time validation (§4.F): every `clusteringCodecIdx` must fit
/// `[0, nb_clustering_codecs)`, every `successorIdx` in `[0, nb_successors)`,
/// across both `clusters` and `typeDefaults`.
pub fn validate_config(config: &ClusteringConfig, nb_successors: usize, nb_clustering_codecs: usize) -> Result<(), ClusteringError> {
    let check = |ts: &TypeSuccessor| -> Result<(), ClusteringError> {
        if ts.successor_idx >= nb_successors {
            return Err(ClusteringError::invalid_input(format!(
                "successorIdx {} is out of range (have {nb_successors} successors)",
                ts.successor_idx
            )));
        }
        if ts.clustering_codec_idx >= nb_clustering_codecs {
            return Err(ClusteringError::invalid_input(format!(
                "clusteringCodecIdx {} is out of range (have {nb_clustering_codecs} codecs)",
                ts.clustering_codec_idx
            )));
        }
        Ok(())
    };
    for cluster in &config.clusters {
        check(&cluster.type_successor)?;
    }
    for ts in &config.type_defaults {
        check(ts)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_of_an_empty_clusters_list_preserves_type_defaults() {
        // Scenario E.
        let cfg = ClusteringConfig {
            clusters: Vec::new(),
            type_defaults: vec![TypeSuccessor {
                type_: 0,
                elt_width: 1,
                successor_idx: 0,
                clustering_codec_idx: 0,
            }],
        };
        let bytes = serialize_cc(&cfg);
        let round_tripped = deserialize_cc(&bytes).unwrap();
        assert_eq!(round_tripped, cfg);
    }

    #[test]
    fn round_trip_preserves_clusters_and_member_tags() {
        let cfg = ClusteringConfig {
            clusters: vec![Cluster {
                type_successor: TypeSuccessor {
                    type_: 2,
                    elt_width: 4,
                    successor_idx: 0,
                    clustering_codec_idx: 0,
                },
                member_tags: vec![1, 3, 5],
            }],
            type_defaults: vec![TypeSuccessor {
                type_: 2,
                elt_width: 4,
                successor_idx: 1,
                clustering_codec_idx: 0,
            }],
        };
        let bytes = serialize_cc(&cfg);
        assert_eq!(deserialize_cc(&bytes).unwrap(), cfg);
    }

    #[test]
    fn deserialize_rejects_a_document_missing_the_clusters_key() {
        let arena = bumpalo::Bump::new();
        let mut root = MapBuilder::with_capacity(&arena, 1);
        root.push_str("typeDefaults", Item::Array(&[]), &arena).unwrap();
        let bytes = encode(&Item::Map(root.finish()));
        assert!(matches!(deserialize_cc(&bytes), Err(ClusteringError::Malformed(_))));
    }

    #[test]
    fn validate_config_rejects_out_of_range_successor_idx() {
        let cfg = ClusteringConfig {
            clusters: vec![Cluster {
                type_successor: TypeSuccessor {
                    type_: 0,
                    elt_width: 1,
                    successor_idx: 5,
                    clustering_codec_idx: 0,
                },
                member_tags: vec![1],
            }],
            type_defaults: Vec::new(),
        };
        assert!(matches!(validate_config(&cfg, 1, 1), Err(ClusteringError::InvalidInput(_))));
    }

    #[test]
    fn validate_config_rejects_out_of_range_codec_idx() {
        let cfg = ClusteringConfig {
            clusters: Vec::new(),
            type_defaults: vec![TypeSuccessor {
                type_: 0,
                elt_width: 1,
                successor_idx: 0,
                clustering_codec_idx: 9,
            }],
        };
        assert!(matches!(validate_config(&cfg, 1, 1), Err(ClusteringError::InvalidInput(_))));
    }
}
