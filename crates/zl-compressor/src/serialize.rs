use tracing::trace;
use zl_a1c::{encode, ArrayBuilder, Item, MapBuilder};
use zl_graph::{Graph, GraphBody, GraphKind, Node};
use zl_localparams::LocalParams;

use crate::canon::ParamDictionary;
use crate::compressor::Compressor;
use crate::error::CompressorError;

fn has_wire_params(params: &LocalParams<'_>) -> bool {
    !(params.ints().is_empty() && params.blobs().is_empty())
}

/// Runs the scan / canonicalize / assemble pipeline of §4.E and returns the
/// deterministic, shortest-form CBOR encoding of `compressor`. Any failure
/// (e.g. a non-serializable node or graph) is recorded into `compressor`'s
/// own error context before being returned (§6).
pub fn serialize(compressor: &mut Compressor) -> Result<Vec<u8>, CompressorError> {
    let root = assemble(&*compressor).map_err(|e| compressor.record_error(e))?;
    Ok(encode(&root))
}

/// Same assembly as [`serialize`], emitted as the ASCII-only debug JSON dump
/// instead of CBOR bytes (§4.E step 4: "Emit: either CBOR bytes ... or
/// JSON").
pub fn serialize_json(compressor: &mut Compressor) -> Result<String, CompressorError> {
    let root = assemble(&*compressor).map_err(|e| compressor.record_error(e))?;
    Ok(zl_a1c::to_json(&root))
}

fn assemble(compressor: &Compressor) -> Result<Item<'static>, CompressorError> {
    let bump = compressor.bump();

    // Step 1: scan every node and graph, determining serializability.
    let mut serializable_nodes: Vec<&Node<'static>> = Vec::new();
    for node in compressor.nodes().iter() {
        let serializable = match node.base {
            Some(base_id) => {
                let base = compressor
                    .nodes()
                    .get_by_id(base_id)
                    .expect("a node's recorded base is always registered");
                node.local_params.refs() == base.local_params.refs()
            }
            None => false,
        };
        if serializable {
            serializable_nodes.push(node);
        } else if !node.name.is_anchor() {
            return Err(zl_graph::GraphError::GraphNonSerializable(node.name.unique().to_string()).into());
        }
    }

    let mut serializable_graphs: Vec<&Graph<'static>> = Vec::new();
    for graph in compressor.graphs().iter() {
        match graph.kind() {
            GraphKind::Static => serializable_graphs.push(graph),
            GraphKind::Parameterized => {
                let GraphBody::Parameterized { base, .. } = &graph.body else {
                    unreachable!("kind() agrees with body variant");
                };
                let base_graph = compressor
                    .graphs()
                    .get_by_id(*base)
                    .expect("a parameterized graph's base is always registered");
                if graph.local_params.refs() != base_graph.local_params.refs() {
                    return Err(zl_graph::GraphError::GraphNonSerializable(graph.name.unique().to_string()).into());
                }
                serializable_graphs.push(graph);
            }
            _ => {}
        }
    }
    trace!(
        nodes = serializable_nodes.len(),
        graphs = serializable_graphs.len(),
        "scanned compressor for serialization"
    );

    // Step 2: canonicalize params, assigning each distinct set a name.
    let mut dict = ParamDictionary::new();
    for node in &serializable_nodes {
        if has_wire_params(&node.local_params) {
            dict.name_for(&node.local_params);
        }
    }
    for graph in &serializable_graphs {
        if has_wire_params(&graph.local_params) {
            dict.name_for(&graph.local_params);
        }
    }
    if has_wire_params(compressor.global_params()) {
        dict.name_for(compressor.global_params());
    }

    // Step 3: assemble the CBOR tree.
    let mut root = MapBuilder::with_capacity(bump, 6);
    root.push_str("version", Item::Int(compressor.version() as i64), bump)?;
    root.push_str("params", build_params_map(&dict, bump)?, bump)?;
    root.push_str("nodes", build_nodes_map(&serializable_nodes, compressor, &mut dict, bump)?, bump)?;
    root.push_str(
        "graphs",
        build_graphs_map(&serializable_graphs, compressor, &mut dict, bump)?,
        bump,
    )?;
    let start = match compressor.get_starting_graph_id().and_then(|id| compressor.graphs().get_by_id(id)) {
        Some(g) => Item::String(g.name.unique()),
        None => Item::Null,
    };
    root.push_str("start", start, bump)?;
    let global = if has_wire_params(compressor.global_params()) {
        Item::String(bump.alloc_str(&dict.name_for(compressor.global_params())))
    } else {
        Item::Null
    };
    root.push_str("global_params", global, bump)?;

    Ok(Item::Map(root.finish()))
}

fn build_params_map<'doc>(dict: &ParamDictionary<'_>, bump: &'doc bumpalo::Bump) -> Result<Item<'doc>, CompressorError> {
    let entries: Vec<_> = dict.entries().collect();
    let mut map = MapBuilder::with_capacity(bump, entries.len());
    for (name, ints, blobs) in entries {
        let mut ints_map = MapBuilder::with_capacity(bump, ints.len());
        for p in ints {
            ints_map.push(Item::Int(p.id), Item::Int(p.value))?;
        }
        let mut blobs_map = MapBuilder::with_capacity(bump, blobs.len());
        for p in blobs {
            blobs_map.push(Item::Int(p.id), Item::Bytes(p.value))?;
        }
        let mut entry = MapBuilder::with_capacity(bump, 2);
        entry.push_str("ints", Item::Map(ints_map.finish()), bump)?;
        entry.push_str("blobs", Item::Map(blobs_map.finish()), bump)?;
        map.push_str(name, Item::Map(entry.finish()), bump)?;
    }
    Ok(Item::Map(map.finish()))
}

fn build_nodes_map<'doc>(
    nodes: &[&Node<'static>],
    compressor: &Compressor,
    dict: &mut ParamDictionary,
    bump: &'doc bumpalo::Bump,
) -> Result<Item<'doc>, CompressorError> {
    let mut map = MapBuilder::with_capacity(bump, nodes.len());
    for node in nodes {
        let base = compressor
            .nodes()
            .get_by_id(node.base.expect("checked serializable"))
            .expect("base must be registered");
        let params = if has_wire_params(&node.local_params) {
            Item::String(bump.alloc_str(&dict.name_for(&node.local_params)))
        } else {
            Item::Null
        };
        let mut entry = MapBuilder::with_capacity(bump, 2);
        entry.push_str("base", Item::String(base.name.unique()), bump)?;
        entry.push_str("params", params, bump)?;
        map.push_str(node.name.unique(), Item::Map(entry.finish()), bump)?;
    }
    Ok(Item::Map(map.finish()))
}

fn build_graphs_map<'doc>(
    graphs: &[&Graph<'static>],
    compressor: &Compressor,
    dict: &mut ParamDictionary,
    bump: &'doc bumpalo::Bump,
) -> Result<Item<'doc>, CompressorError> {
    let mut map = MapBuilder::with_capacity(bump, graphs.len());
    for graph in graphs {
        let params = if has_wire_params(&graph.local_params) {
            Item::String(bump.alloc_str(&dict.name_for(&graph.local_params)))
        } else {
            Item::Null
        };

        let body = match &graph.body {
            GraphBody::Static { head_node, successors } => {
                let head = compressor.nodes().get_by_id(*head_node).expect("head node must be registered");
                let mut succ = ArrayBuilder::with_capacity(bump, successors.len());
                for s in successors.iter() {
                    let target = compressor.graphs().get_by_id(*s).expect("successor must be registered");
                    succ.push(Item::String(target.name.unique()))?;
                }
                let mut entry = MapBuilder::with_capacity(bump, 4);
                entry.push_str("type", Item::String("static"), bump)?;
                entry.push_str("node", Item::String(head.name.unique()), bump)?;
                entry.push_str("successors", Item::Array(succ.finish()), bump)?;
                entry.push_str("params", params, bump)?;
                Item::Map(entry.finish())
            }
            GraphBody::Parameterized {
                base,
                custom_graphs,
                custom_nodes,
            } => {
                let base_graph = compressor.graphs().get_by_id(*base).expect("base graph must be registered");
                let mut cg = ArrayBuilder::with_capacity(bump, custom_graphs.len());
                for g in custom_graphs.iter() {
                    let target = compressor.graphs().get_by_id(*g).expect("custom graph must be registered");
                    cg.push(Item::String(target.name.unique()))?;
                }
                let mut cn = ArrayBuilder::with_capacity(bump, custom_nodes.len());
                for n in custom_nodes.iter() {
                    let target = compressor.nodes().get_by_id(*n).expect("custom node must be registered");
                    cn.push(Item::String(target.name.unique()))?;
                }
                let mut entry = MapBuilder::with_capacity(bump, 5);
                entry.push_str("type", Item::String("parameterized"), bump)?;
                entry.push_str("base", Item::String(base_graph.name.unique()), bump)?;
                entry.push_str("graphs", Item::Array(cg.finish()), bump)?;
                entry.push_str("nodes", Item::Array(cn.finish()), bump)?;
                entry.push_str("params", params, bump)?;
                Item::Map(entry.finish())
            }
            _ => unreachable!("only static/parameterized graphs are ever scanned as serializable"),
        };
        map.push_str(graph.name.unique(), body, bump)?;
    }
    Ok(Item::Map(map.finish()))
}
