use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use tracing::trace;
use zl_a1c::{decode, DecoderOptions, Item};
use zl_arena::{alloc_slice, prefix_of_unique, Name};
use zl_graph::{GraphId, GraphOverrides, NodeId, NodeOverrides};
use zl_localparams::{resolve, BlobParam, IntParam, LocalParams};

use crate::compressor::Compressor;
use crate::error::{CompressorError, ErrorKind};

/// Governs whether [`deserialize`] rejects a document whose `"version"`
/// disagrees with the target compressor's (§9 "Open questions in the
/// source": the version check was restored as a *should*, not dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    #[default]
    Enforce,
    Ignore,
}

struct NodeEntry<'src> {
    name: &'src str,
    base: &'src str,
    params: Option<&'src Item<'src>>,
}

enum GraphEntry<'src> {
    Static {
        name: &'src str,
        node: &'src str,
        successors: Vec<&'src str>,
        params: Option<&'src Item<'src>>,
    },
    Parameterized {
        name: &'src str,
        base: &'src str,
        graphs: Vec<&'src str>,
        nodes: Vec<&'src str>,
        params: Option<&'src Item<'src>>,
    },
}

impl<'src> GraphEntry<'src> {
    fn name(&self) -> &'src str {
        match self {
            GraphEntry::Static { name, .. } => name,
            GraphEntry::Parameterized { name, .. } => name,
        }
    }
}

/// Names this document references but does not itself define, split by
/// component. An embedding program can pre-register these (as standard
/// nodes/graphs) before calling [`deserialize`] (§4.E: querying a
/// document's external dependencies without materializing it).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub nodes: Vec<String>,
    pub graphs: Vec<String>,
}

/// Scans `bytes` for every referenced node/graph name the document does
/// not itself define. Does not touch any [`Compressor`].
pub fn dependencies(bytes: &[u8]) -> Result<Dependencies, CompressorError> {
    let bump = bumpalo::Bump::new();
    let root = decode(bytes, &bump, DecoderOptions::default())?;

    let node_entries = match root.map_get("nodes") {
        Some(n) => parse_nodes(n)?,
        None => Vec::new(),
    };
    let graph_entries = match root.map_get("graphs") {
        Some(g) => parse_graphs(g)?,
        None => Vec::new(),
    };

    let own_nodes: HashSet<&str> = node_entries.iter().map(|e| e.name).collect();
    let own_graphs: HashSet<&str> = graph_entries.iter().map(GraphEntry::name).collect();

    let mut nodes = BTreeSet::new();
    let mut graphs = BTreeSet::new();

    for e in &node_entries {
        if !own_nodes.contains(e.base) {
            nodes.insert(e.base.to_string());
        }
    }
    for e in &graph_entries {
        match e {
            GraphEntry::Static { node, successors, .. } => {
                if !own_nodes.contains(node) {
                    nodes.insert((*node).to_string());
                }
                for s in successors {
                    if !own_graphs.contains(s) {
                        graphs.insert((*s).to_string());
                    }
                }
            }
            GraphEntry::Parameterized { base, graphs: cg, nodes: cn, .. } => {
                if !own_graphs.contains(base) {
                    graphs.insert((*base).to_string());
                }
                for g in cg {
                    if !own_graphs.contains(g) {
                        graphs.insert((*g).to_string());
                    }
                }
                for n in cn {
                    if !own_nodes.contains(n) {
                        nodes.insert((*n).to_string());
                    }
                }
            }
        }
    }
    if let Some(start) = root.map_get("start").and_then(Item::as_str) {
        if !own_graphs.contains(start) {
            graphs.insert(start.to_string());
        }
    }

    Ok(Dependencies {
        nodes: nodes.into_iter().collect(),
        graphs: graphs.into_iter().collect(),
    })
}

/// Decodes `bytes` as a §4.E document and registers every node and graph it
/// defines into `compressor`, depth-first so a component is only built
/// after everything it depends on (§9 "Coroutine control flow": an
/// explicit work stack instead of recursion). Any failure is recorded into
/// `compressor`'s own error context before being returned (§6), matching
/// [`crate::serialize::serialize`].
pub fn deserialize(compressor: &mut Compressor, bytes: &[u8], version_policy: VersionPolicy) -> Result<(), CompressorError> {
    deserialize_body(compressor, bytes, version_policy).map_err(|e| compressor.record_error(e))
}

fn deserialize_body(compressor: &mut Compressor, bytes: &[u8], version_policy: VersionPolicy) -> Result<(), CompressorError> {
    let bump = bumpalo::Bump::new();
    let root = decode(bytes, &bump, DecoderOptions::default())?;

    let version = root
        .map_get("version")
        .and_then(Item::as_int)
        .ok_or_else(|| CompressorError::corruption("root document is missing \"version\""))?;
    if version_policy == VersionPolicy::Enforce && version as u32 != compressor.version() {
        return Err(CompressorError::kind(
            ErrorKind::FormatVersionUnsupported,
            format!(
                "document version {version} does not match compressor version {}",
                compressor.version()
            ),
        ));
    }

    let params_dict = match root.map_get("params") {
        Some(p) => parse_params_dictionary(p, compressor)?,
        None => IndexMap::new(),
    };

    let node_entries = match root.map_get("nodes") {
        Some(n) => parse_nodes(n)?,
        None => Vec::new(),
    };
    let node_ids = materialize_nodes(compressor, &node_entries, &params_dict)?;
    trace!(count = node_ids.len(), "materialized nodes");

    let graph_entries = match root.map_get("graphs") {
        Some(g) => parse_graphs(g)?,
        None => Vec::new(),
    };
    let graph_ids = materialize_graphs(compressor, &graph_entries, &node_ids, &params_dict)?;
    trace!(count = graph_ids.len(), "materialized graphs");

    if let Some(global) = root.map_get("global_params") {
        if !matches!(global, Item::Null) {
            let resolved = resolve(compressor.arena(), Some(global), &params_dict, &LocalParams::EMPTY)?;
            compressor.set_global_params(resolved)?;
        }
    }

    if let Some(start_name) = root.map_get("start").and_then(Item::as_str) {
        let gid = graph_ids
            .get(start_name)
            .copied()
            .or_else(|| compressor.graphs().get_by_name(start_name).map(|g| g.id))
            .ok_or_else(|| CompressorError::corruption(format!("\"start\" graph {start_name:?} is not registered")))?;
        compressor.select_starting_graph_id(gid)?;
    }

    Ok(())
}

fn parse_params_dictionary<'src>(
    item: &Item<'src>,
    compressor: &Compressor,
) -> Result<IndexMap<String, LocalParams<'static>>, CompressorError> {
    let pairs = item
        .as_map()
        .ok_or_else(|| CompressorError::corruption("\"params\" must be a map"))?;
    let mut dict = IndexMap::new();
    for pair in pairs {
        let name = pair
            .key
            .as_str()
            .ok_or_else(|| CompressorError::corruption("param dictionary key must be a string"))?;
        let mut ints = Vec::new();
        if let Some(node) = pair.value.map_get("ints") {
            for p in node
                .as_map()
                .ok_or_else(|| CompressorError::corruption(format!("params {name:?}: \"ints\" must be a map")))?
            {
                let id = p
                    .key
                    .as_int()
                    .ok_or_else(|| CompressorError::corruption(format!("params {name:?}: malformed int key")))?;
                let value = p
                    .value
                    .as_int()
                    .ok_or_else(|| CompressorError::corruption(format!("params {name:?}: malformed int value")))?;
                ints.push(IntParam { id, value });
            }
        }
        let mut blobs = Vec::new();
        if let Some(node) = pair.value.map_get("blobs") {
            for p in node
                .as_map()
                .ok_or_else(|| CompressorError::corruption(format!("params {name:?}: \"blobs\" must be a map")))?
            {
                let id = p
                    .key
                    .as_int()
                    .ok_or_else(|| CompressorError::corruption(format!("params {name:?}: malformed blob key")))?;
                let value = p
                    .value
                    .as_bytes()
                    .ok_or_else(|| CompressorError::corruption(format!("params {name:?}: malformed blob value")))?;
                blobs.push(BlobParam { id, value });
            }
        }
        let built: LocalParams<'static> = zl_localparams::build(compressor.arena(), &ints, &blobs, &[])?;
        dict.insert(name.to_string(), built);
    }
    Ok(dict)
}

fn parse_nodes<'src>(item: &Item<'src>) -> Result<Vec<NodeEntry<'src>>, CompressorError> {
    let pairs = item
        .as_map()
        .ok_or_else(|| CompressorError::corruption("\"nodes\" must be a map"))?;
    let mut out = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let name = pair
            .key
            .as_str()
            .ok_or_else(|| CompressorError::corruption("node name must be a string"))?;
        let base = pair
            .value
            .map_get("base")
            .and_then(Item::as_str)
            .ok_or_else(|| CompressorError::corruption(format!("node {name:?} is missing \"base\"")))?;
        let params = pair.value.map_get("params");
        out.push(NodeEntry { name, base, params });
    }
    Ok(out)
}

fn parse_graphs<'src>(item: &Item<'src>) -> Result<Vec<GraphEntry<'src>>, CompressorError> {
    let pairs = item
        .as_map()
        .ok_or_else(|| CompressorError::corruption("\"graphs\" must be a map"))?;
    let mut out = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let name = pair
            .key
            .as_str()
            .ok_or_else(|| CompressorError::corruption("graph name must be a string"))?;
        let body = &pair.value;
        let kind = body
            .map_get("type")
            .and_then(Item::as_str)
            .ok_or_else(|| CompressorError::corruption(format!("graph {name:?} is missing \"type\"")))?;
        let params = body.map_get("params");
        match kind {
            "static" => {
                let node = body
                    .map_get("node")
                    .and_then(Item::as_str)
                    .ok_or_else(|| CompressorError::corruption(format!("graph {name:?} is missing \"node\"")))?;
                let successors = str_array(body, "successors", name)?;
                out.push(GraphEntry::Static { name, node, successors, params });
            }
            "parameterized" => {
                let base = body
                    .map_get("base")
                    .and_then(Item::as_str)
                    .ok_or_else(|| CompressorError::corruption(format!("graph {name:?} is missing \"base\"")))?;
                let graphs = str_array(body, "graphs", name)?;
                let nodes = str_array(body, "nodes", name)?;
                out.push(GraphEntry::Parameterized { name, base, graphs, nodes, params });
            }
            // Testable property 14: any other wire type (standard, selector,
            // multi_input, segmenter) is never a valid document body.
            other => {
                return Err(CompressorError::corruption(format!(
                    "graph {name:?} has non-serializable wire type {other:?}"
                )))
            }
        }
    }
    Ok(out)
}

fn str_array<'src>(body: &Item<'src>, key: &str, owner: &str) -> Result<Vec<&'src str>, CompressorError> {
    let Some(items) = body.map_get(key).and_then(Item::as_array) else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| CompressorError::corruption(format!("graph {owner:?}: {key:?} entry must be a string")))
        })
        .collect()
}

fn materialize_nodes<'src>(
    compressor: &mut Compressor,
    entries: &[NodeEntry<'src>],
    params_dict: &IndexMap<String, LocalParams<'static>>,
) -> Result<HashMap<&'src str, NodeId>, CompressorError> {
    let by_name: HashMap<&str, usize> = entries.iter().enumerate().map(|(i, e)| (e.name, i)).collect();
    let mut resolved: HashMap<&str, NodeId> = HashMap::new();
    let mut visits = vec![0u8; entries.len()];
    let mut stack: Vec<usize> = (0..entries.len()).rev().collect();

    while let Some(idx) = stack.pop() {
        let entry = &entries[idx];
        if resolved.contains_key(entry.name) {
            continue;
        }
        visits[idx] += 1;

        let base_id = compressor
            .nodes()
            .get_by_name(entry.base)
            .map(|n| n.id)
            .or_else(|| resolved.get(entry.base).copied());
        let base_id = match base_id {
            Some(id) => id,
            None => {
                let Some(&dep_idx) = by_name.get(entry.base) else {
                    return Err(CompressorError::corruption(format!(
                        "node {:?} references unknown base {:?}",
                        entry.name, entry.base
                    )));
                };
                if visits[idx] >= 2 {
                    return Err(CompressorError::corruption(format!(
                        "node {:?} could not be resolved (dependency cycle through {:?})",
                        entry.name, entry.base
                    )));
                }
                stack.push(idx);
                stack.push(dep_idx);
                continue;
            }
        };

        let base_params = {
            let base = compressor
                .nodes()
                .get_by_id(base_id)
                .expect("a resolved base id is always registered");
            base.local_params
        };
        let params = resolve(compressor.arena(), entry.params, params_dict, &base_params)?;
        let name = Name::build(compressor.arena(), prefix_of_unique(entry.name), compressor.nodes().next_id().0)?;
        let new_id = compressor.nodes_mut().parameterize(
            base_id,
            name,
            NodeOverrides {
                local_params: Some(params),
                custom_nodes: None,
            },
        )?;
        resolved.insert(entry.name, new_id);
    }

    Ok(resolved)
}

fn resolve_node_id(compressor: &Compressor, node_ids: &HashMap<&str, NodeId>, name: &str) -> Option<NodeId> {
    compressor
        .nodes()
        .get_by_name(name)
        .map(|n| n.id)
        .or_else(|| node_ids.get(name).copied())
}

fn resolve_graph_id(compressor: &Compressor, resolved: &HashMap<&str, GraphId>, name: &str) -> Option<GraphId> {
    compressor
        .graphs()
        .get_by_name(name)
        .map(|g| g.id)
        .or_else(|| resolved.get(name).copied())
}

enum DepsOutcome {
    Ready(Vec<GraphId>),
    Pending(usize),
}

fn try_resolve_graph_deps(
    compressor: &Compressor,
    resolved: &HashMap<&str, GraphId>,
    by_name: &HashMap<&str, usize>,
    names: &[&str],
) -> Result<DepsOutcome, CompressorError> {
    let mut ids = Vec::with_capacity(names.len());
    for &n in names {
        match resolve_graph_id(compressor, resolved, n) {
            Some(id) => ids.push(id),
            None => {
                return match by_name.get(n) {
                    Some(&idx) => Ok(DepsOutcome::Pending(idx)),
                    None => Err(CompressorError::corruption(format!("reference to unknown graph {n:?}"))),
                };
            }
        }
    }
    Ok(DepsOutcome::Ready(ids))
}

fn materialize_graphs<'src>(
    compressor: &mut Compressor,
    entries: &[GraphEntry<'src>],
    node_ids: &HashMap<&'src str, NodeId>,
    params_dict: &IndexMap<String, LocalParams<'static>>,
) -> Result<HashMap<&'src str, GraphId>, CompressorError> {
    let by_name: HashMap<&str, usize> = entries.iter().enumerate().map(|(i, e)| (e.name(), i)).collect();
    let mut resolved: HashMap<&str, GraphId> = HashMap::new();
    let mut visits = vec![0u8; entries.len()];
    let mut stack: Vec<usize> = (0..entries.len()).rev().collect();

    while let Some(idx) = stack.pop() {
        let name = entries[idx].name();
        if resolved.contains_key(name) {
            continue;
        }
        visits[idx] += 1;

        match &entries[idx] {
            GraphEntry::Static { node, successors, params, .. } => {
                let Some(head_id) = resolve_node_id(compressor, node_ids, node) else {
                    return Err(CompressorError::corruption(format!(
                        "graph {name:?} references unknown node {node:?}"
                    )));
                };
                match try_resolve_graph_deps(compressor, &resolved, &by_name, successors)? {
                    DepsOutcome::Pending(dep_idx) => {
                        if visits[idx] >= 2 {
                            return Err(CompressorError::corruption(format!(
                                "graph {name:?} could not be resolved (dependency cycle)"
                            )));
                        }
                        stack.push(idx);
                        stack.push(dep_idx);
                        continue;
                    }
                    DepsOutcome::Ready(successor_ids) => {
                        let head_params = {
                            let head = compressor
                                .nodes()
                                .get_by_id(head_id)
                                .expect("a resolved node id is always registered");
                            head.local_params
                        };
                        let resolved_params = resolve(compressor.arena(), *params, params_dict, &head_params)?;
                        let gname =
                            Name::build(compressor.arena(), prefix_of_unique(name), compressor.graphs().next_id().0)?;
                        let gid = compressor.register_static_graph(gname, head_id, &successor_ids, Some(resolved_params))?;
                        resolved.insert(name, gid);
                    }
                }
            }
            GraphEntry::Parameterized { base, graphs, nodes, params, .. } => {
                let base_deps = try_resolve_graph_deps(compressor, &resolved, &by_name, std::slice::from_ref(base))?;
                let base_id = match base_deps {
                    DepsOutcome::Pending(dep_idx) => {
                        if visits[idx] >= 2 {
                            return Err(CompressorError::corruption(format!(
                                "graph {name:?} could not be resolved (dependency cycle)"
                            )));
                        }
                        stack.push(idx);
                        stack.push(dep_idx);
                        continue;
                    }
                    DepsOutcome::Ready(ids) => ids[0],
                };

                let custom_graph_ids = match try_resolve_graph_deps(compressor, &resolved, &by_name, graphs)? {
                    DepsOutcome::Pending(dep_idx) => {
                        if visits[idx] >= 2 {
                            return Err(CompressorError::corruption(format!(
                                "graph {name:?} could not be resolved (dependency cycle)"
                            )));
                        }
                        stack.push(idx);
                        stack.push(dep_idx);
                        continue;
                    }
                    DepsOutcome::Ready(ids) => ids,
                };

                let mut custom_node_ids = Vec::with_capacity(nodes.len());
                for n in nodes {
                    let Some(id) = resolve_node_id(compressor, node_ids, n) else {
                        return Err(CompressorError::corruption(format!(
                            "graph {name:?} references unknown node {n:?}"
                        )));
                    };
                    custom_node_ids.push(id);
                }

                let base_params = {
                    let base_graph = compressor
                        .graphs()
                        .get_by_id(base_id)
                        .expect("a resolved base graph id is always registered");
                    base_graph.local_params
                };
                let resolved_params = resolve(compressor.arena(), *params, params_dict, &base_params)?;
                let gname = Name::build(compressor.arena(), prefix_of_unique(name), compressor.graphs().next_id().0)?;
                let custom_graph_ids = alloc_slice(compressor.arena(), &custom_graph_ids)?;
                let custom_node_ids = alloc_slice(compressor.arena(), &custom_node_ids)?;
                let overrides = GraphOverrides {
                    local_params: Some(resolved_params),
                    custom_graphs: Some(custom_graph_ids),
                    custom_nodes: Some(custom_node_ids),
                };
                let gid = compressor.register_parameterized_graph(gname, base_id, overrides)?;
                resolved.insert(name, gid);
            }
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::serialize;
    use std::sync::Arc;
    use zl_graph::TypeMask;

    fn opaque() -> zl_graph::OpaqueBehavior {
        Arc::new(())
    }

    /// Scenario A: a trivial static graph survives a serialize/deserialize
    /// round trip into a fresh compressor.
    #[test]
    fn trivial_static_graph_round_trips() {
        let mut src = Compressor::new(1);
        let arena = src.arena();

        let leaf_name = Name::build(arena, "!leaf", src.nodes().next_id().0).unwrap();
        let leaf = src
            .nodes_mut()
            .register_custom(leaf_name, &[TypeMask(1)], &[], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap();

        // `head` must itself have a base to be serializable under a
        // non-anchor name; parameterize it from an anchor library node.
        let head_base_name = Name::build(arena, "!head_base", src.nodes().next_id().0).unwrap();
        let head_base = src
            .nodes_mut()
            .register_custom(head_base_name, &[TypeMask(1)], &[TypeMask(1)], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap();
        let head_name = Name::build(arena, "head", src.nodes().next_id().0).unwrap();
        let head = src
            .nodes_mut()
            .parameterize(
                head_base,
                head_name,
                NodeOverrides {
                    local_params: None,
                    custom_nodes: None,
                },
            )
            .unwrap();

        let leaf_graph_name = Name::build(arena, "!leaf_graph", src.graphs().next_id().0).unwrap();
        let leaf_graph = src
            .register_multi_input_graph(leaf_graph_name, &[TypeMask(1)], &[], &[leaf], LocalParams::EMPTY)
            .unwrap();

        let g_name = Name::build(arena, "g", src.graphs().next_id().0).unwrap();
        let g = src.register_static_graph(g_name, head, &[leaf_graph], None).unwrap();
        src.select_starting_graph_id(g).unwrap();

        let bytes = serialize(&mut src).unwrap();

        let mut dst = Compressor::new(1);
        // The embedding program pre-registers the same library nodes and
        // graphs the document references by name only (anchors, and any
        // graph kind the wire format never carries, never round-trip their
        // own definition).
        let dst_arena = dst.arena();
        let dst_leaf_name = Name::build(dst_arena, "!leaf", dst.nodes().next_id().0).unwrap();
        let dst_leaf = dst
            .nodes_mut()
            .register_custom(dst_leaf_name, &[TypeMask(1)], &[], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap();
        let dst_head_base_name = Name::build(dst_arena, "!head_base", dst.nodes().next_id().0).unwrap();
        dst.nodes_mut()
            .register_custom(dst_head_base_name, &[TypeMask(1)], &[TypeMask(1)], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap();
        let dst_leaf_graph_name = Name::build(dst_arena, "!leaf_graph", dst.graphs().next_id().0).unwrap();
        dst.register_multi_input_graph(dst_leaf_graph_name, &[TypeMask(1)], &[], &[dst_leaf], LocalParams::EMPTY)
            .unwrap();

        deserialize(&mut dst, &bytes, VersionPolicy::Enforce).unwrap();

        assert!(dst.get_starting_graph_id().is_some());
        assert_eq!(dst.nodes().len(), 3);
        assert_eq!(dst.graphs().len(), 2);
    }

    /// Scenario C: a graph is declared before the successor it depends on;
    /// the explicit work stack must still resolve it.
    #[test]
    fn forward_references_resolve_regardless_of_declaration_order() {
        let mut src = Compressor::new(1);
        let arena = src.arena();
        let leaf_name = Name::build(arena, "!leaf", src.nodes().next_id().0).unwrap();
        let leaf = src
            .nodes_mut()
            .register_custom(leaf_name, &[TypeMask(1)], &[], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap();
        let head_base_name = Name::build(arena, "!head_base", src.nodes().next_id().0).unwrap();
        let head_base = src
            .nodes_mut()
            .register_custom(head_base_name, &[TypeMask(1)], &[TypeMask(1)], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap();
        let head_name = Name::build(arena, "head", src.nodes().next_id().0).unwrap();
        let head = src
            .nodes_mut()
            .parameterize(
                head_base,
                head_name,
                NodeOverrides {
                    local_params: None,
                    custom_nodes: None,
                },
            )
            .unwrap();
        let leaf_graph_name = Name::build(arena, "!leaf_graph", src.graphs().next_id().0).unwrap();
        let leaf_graph = src
            .register_multi_input_graph(leaf_graph_name, &[TypeMask(1)], &[], &[leaf], LocalParams::EMPTY)
            .unwrap();
        let g_name = Name::build(arena, "g", src.graphs().next_id().0).unwrap();
        src.register_static_graph(g_name, head, &[leaf_graph], None).unwrap();

        let bytes = serialize(&mut src).unwrap();

        let mut dst = Compressor::new(1);
        let dst_arena = dst.arena();
        let dst_leaf_name = Name::build(dst_arena, "!leaf", dst.nodes().next_id().0).unwrap();
        let dst_leaf = dst
            .nodes_mut()
            .register_custom(dst_leaf_name, &[TypeMask(1)], &[], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap();
        let dst_head_base_name = Name::build(dst_arena, "!head_base", dst.nodes().next_id().0).unwrap();
        dst.nodes_mut()
            .register_custom(dst_head_base_name, &[TypeMask(1)], &[TypeMask(1)], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap();
        let dst_leaf_graph_name = Name::build(dst_arena, "!leaf_graph", dst.graphs().next_id().0).unwrap();
        dst.register_multi_input_graph(dst_leaf_graph_name, &[TypeMask(1)], &[], &[dst_leaf], LocalParams::EMPTY)
            .unwrap();

        deserialize(&mut dst, &bytes, VersionPolicy::Enforce).unwrap();
        assert_eq!(dst.graphs().len(), 2);
    }

    /// Scenario F: a disallowed wire graph kind in the document is
    /// corruption, not silently skipped.
    #[test]
    fn disallowed_graph_kind_is_corruption() {
        let bump = bumpalo::Bump::new();
        let mut body = zl_a1c::MapBuilder::with_capacity(&bump, 1);
        body.push_str("type", Item::String("selector"), &bump).unwrap();
        let mut graphs = zl_a1c::MapBuilder::with_capacity(&bump, 1);
        graphs.push_str("g", Item::Map(body.finish()), &bump).unwrap();
        let mut root = zl_a1c::MapBuilder::with_capacity(&bump, 6);
        root.push_str("version", Item::Int(1), &bump).unwrap();
        root.push_str("params", Item::Map(&[]), &bump).unwrap();
        root.push_str("nodes", Item::Map(&[]), &bump).unwrap();
        root.push_str("graphs", Item::Map(graphs.finish()), &bump).unwrap();
        root.push_str("start", Item::Null, &bump).unwrap();
        root.push_str("global_params", Item::Null, &bump).unwrap();
        let bytes = zl_a1c::encode(&Item::Map(root.finish()));

        let mut dst = Compressor::new(1);
        assert!(matches!(
            deserialize(&mut dst, &bytes, VersionPolicy::Enforce),
            Err(CompressorError::Kind { kind: ErrorKind::Corruption, .. })
        ));
    }

    #[test]
    fn version_mismatch_is_rejected_under_enforce_policy() {
        let bump = bumpalo::Bump::new();
        let mut root = zl_a1c::MapBuilder::with_capacity(&bump, 6);
        root.push_str("version", Item::Int(99), &bump).unwrap();
        root.push_str("params", Item::Map(&[]), &bump).unwrap();
        root.push_str("nodes", Item::Map(&[]), &bump).unwrap();
        root.push_str("graphs", Item::Map(&[]), &bump).unwrap();
        root.push_str("start", Item::Null, &bump).unwrap();
        root.push_str("global_params", Item::Null, &bump).unwrap();
        let bytes = zl_a1c::encode(&Item::Map(root.finish()));

        let mut dst = Compressor::new(1);
        assert!(matches!(
            deserialize(&mut dst, &bytes, VersionPolicy::Enforce),
            Err(CompressorError::Kind { kind: ErrorKind::FormatVersionUnsupported, .. })
        ));
        // An explicit opt-out still accepts it.
        deserialize(&mut dst, &bytes, VersionPolicy::Ignore).unwrap();
    }

    #[test]
    fn dependencies_reports_names_not_defined_in_the_document() {
        let bump = bumpalo::Bump::new();
        let mut node_body = zl_a1c::MapBuilder::with_capacity(&bump, 2);
        node_body.push_str("base", Item::String("!zl.store"), &bump).unwrap();
        node_body.push_str("params", Item::Null, &bump).unwrap();
        let mut nodes = zl_a1c::MapBuilder::with_capacity(&bump, 1);
        nodes.push_str("n", Item::Map(node_body.finish()), &bump).unwrap();

        let mut root = zl_a1c::MapBuilder::with_capacity(&bump, 6);
        root.push_str("version", Item::Int(1), &bump).unwrap();
        root.push_str("params", Item::Map(&[]), &bump).unwrap();
        root.push_str("nodes", Item::Map(nodes.finish()), &bump).unwrap();
        root.push_str("graphs", Item::Map(&[]), &bump).unwrap();
        root.push_str("start", Item::Null, &bump).unwrap();
        root.push_str("global_params", Item::Null, &bump).unwrap();
        let bytes = zl_a1c::encode(&Item::Map(root.finish()));

        let deps = dependencies(&bytes).unwrap();
        assert_eq!(deps.nodes, vec!["!zl.store".to_string()]);
        assert!(deps.graphs.is_empty());
    }
}
