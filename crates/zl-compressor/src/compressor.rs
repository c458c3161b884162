use tracing::trace;
use zl_arena::{HeapArena, RawArena};
use zl_graph::{Graph, GraphId, GraphManager, Node, NodeManager};
use zl_localparams::{IntParam, LocalParams};

use crate::error::{CompressorError, ErrorContext, ErrorKind};

/// The single-writer state object of §5: owns the arena, the node and
/// graph registries, and the int-only global parameter set. A `Compressor`
/// is built up by registering nodes and graphs (directly against
/// [`Compressor::nodes_mut`] / [`Compressor::graphs_mut`], using
/// [`Compressor::arena`] to build their [`zl_arena::Name`]s), then either
/// serialized (`zl_compressor::serialize`) or populated by
/// `zl_compressor::deserialize`.
///
/// # Safety
/// `nodes`, `graphs`, and `global_params` all borrow from `arena`, which
/// this struct also owns; the borrow is carried as `'static` via a single
/// controlled transmute in [`Compressor::with_end_of_standard`]. Declaring
/// them before `arena` (Rust drops fields in declaration order) and
/// forbidding destructuring (the `Drop` impl below) keeps the arena alive
/// for as long as anything can reach into it: a self-referential owner
/// paired with its borrowed view, with the borrow checker's guarantees
/// restored by never letting the two halves separate.
pub struct Compressor {
    nodes: NodeManager<'static>,
    graphs: GraphManager<'static>,
    global_params: LocalParams<'static>,
    version: u32,
    errors: ErrorContext,
    arena_ref: &'static dyn RawArena,
    bump_ref: &'static bumpalo::Bump,
    arena: Box<HeapArena>,
}

impl Compressor {
    /// A compressor with no standard id range reserved: every node/graph id
    /// starts at 0. Use [`Compressor::with_end_of_standard`] when the
    /// embedding program pre-registers standard nodes/graphs below some id.
    pub fn new(version: u32) -> Self {
        Self::with_end_of_standard(version, 0, 0)
    }

    pub fn with_end_of_standard(version: u32, end_of_standard_nodes: u32, end_of_standard_graphs: u32) -> Self {
        let arena = Box::new(HeapArena::new());
        // Safety: `arena` is heap-boxed, so its address (and everything
        // allocated from it) is stable across moves of `Compressor` itself.
        // These two references are taken before `arena` is moved into the
        // struct below, and remain valid for as long as `arena` is (which
        // outlives `nodes`/`graphs`/`global_params` by field-drop order).
        let arena_ref: &'static dyn RawArena =
            unsafe { std::mem::transmute::<&dyn RawArena, &'static dyn RawArena>(arena.as_ref()) };
        let bump_ref: &'static bumpalo::Bump =
            unsafe { std::mem::transmute::<&bumpalo::Bump, &'static bumpalo::Bump>(arena.bump()) };

        Compressor {
            nodes: NodeManager::new(arena_ref, end_of_standard_nodes),
            graphs: GraphManager::new(arena_ref, end_of_standard_graphs),
            global_params: LocalParams::EMPTY,
            version,
            errors: ErrorContext::new(),
            arena_ref,
            bump_ref,
            arena,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn nodes(&self) -> &NodeManager<'static> {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodeManager<'static> {
        &mut self.nodes
    }

    pub fn graphs(&self) -> &GraphManager<'static> {
        &self.graphs
    }

    pub fn graphs_mut(&mut self) -> &mut GraphManager<'static> {
        &mut self.graphs
    }

    /// The backing arena, usable to build [`zl_arena::Name`]s and
    /// [`LocalParams`] that outlive this borrow of `self` (it is, in fact,
    /// `'static` relative to the compressor's own lifetime).
    pub fn arena(&self) -> &'static dyn RawArena {
        self.arena_ref
    }

    /// The same arena's underlying [`bumpalo::Bump`], for components (the
    /// CBOR item graph, node/graph child-ID arrays) that need typed bump
    /// allocation.
    pub fn bump(&self) -> &'static bumpalo::Bump {
        self.bump_ref
    }

    pub fn global_params(&self) -> &LocalParams<'static> {
        &self.global_params
    }

    pub fn get_error_context_string(&self) -> Option<&str> {
        self.errors.get_error_context_string()
    }

    pub(crate) fn record_error(&mut self, err: CompressorError) -> CompressorError {
        self.errors.push(err.to_string());
        err
    }

    /// §6: `get_starting_graph_id(compressor, &out) -> bool`.
    pub fn get_starting_graph_id(&self) -> Option<GraphId> {
        self.graphs.starting_graph_id()
    }

    /// §6: `select_starting_graph_id(compressor, id) -> Result`.
    pub fn select_starting_graph_id(&mut self, id: GraphId) -> Result<(), CompressorError> {
        self.graphs
            .select_starting_graph_id(id)
            .map_err(|e| self.record_error(e.into()))
    }

    /// §6: `for_each_node(compressor, cb, opaque)`; `cb` may abort
    /// iteration by returning an error.
    pub fn for_each_node<E>(&self, mut cb: impl FnMut(&Node<'static>) -> Result<(), E>) -> Result<(), E> {
        for node in self.nodes.iter() {
            cb(node)?;
        }
        Ok(())
    }

    /// §6: `for_each_graph(compressor, cb, opaque)`.
    pub fn for_each_graph<E>(&self, mut cb: impl FnMut(&Graph<'static>) -> Result<(), E>) -> Result<(), E> {
        for graph in self.graphs.iter() {
            cb(graph)?;
        }
        Ok(())
    }

    /// §6: `for_each_param(compressor, cb, opaque)`, one call per set
    /// global parameter. Global params are int-only (§4.E step 5).
    pub fn for_each_param<E>(&self, mut cb: impl FnMut(i64, i64) -> Result<(), E>) -> Result<(), E> {
        for p in self.global_params.ints() {
            cb(p.id, p.value)?;
        }
        Ok(())
    }

    /// §6: `set_parameter(compressor, key, value) -> Result`. Replaces (or
    /// inserts) the int-param entry for `key`; canonicalization on rebuild
    /// keeps later calls for the same key authoritative.
    pub fn set_parameter(&mut self, key: i64, value: i64) -> Result<(), CompressorError> {
        let mut ints: Vec<IntParam> = self.global_params.ints().to_vec();
        ints.push(IntParam { id: key, value });
        let blobs = self.global_params.blobs().to_vec();
        let params = zl_localparams::build(self.arena_ref, &ints, &blobs, &[]);
        match params {
            Ok(params) => {
                self.global_params = params;
                trace!(key, value, "set global parameter");
                Ok(())
            }
            Err(e) => Err(self.record_error(e.into())),
        }
    }

    /// Forwards to [`GraphManager::register_static_graph`], supplying this
    /// compressor's own node registry. A graph's validation needs to see
    /// both registries at once, which the two `_mut` accessors above can't
    /// give a caller outside this module (borrowing `nodes` and `graphs`
    /// independently requires splitting `self`'s fields directly).
    pub fn register_static_graph(
        &mut self,
        name: zl_arena::Name<'static>,
        head_node: zl_graph::NodeId,
        successors: &[GraphId],
        local_params: Option<LocalParams<'static>>,
    ) -> Result<GraphId, CompressorError> {
        self.graphs
            .register_static_graph(&self.nodes, name, head_node, successors, local_params)
            .map_err(|e| self.record_error(e.into()))
    }

    /// Forwards to [`GraphManager::register_multi_input_graph`]; see
    /// [`Compressor::register_static_graph`] for why this lives here.
    pub fn register_multi_input_graph(
        &mut self,
        name: zl_arena::Name<'static>,
        input_types: &[zl_graph::TypeMask],
        custom_graphs: &[GraphId],
        custom_nodes: &[zl_graph::NodeId],
        local_params: LocalParams<'static>,
    ) -> Result<GraphId, CompressorError> {
        self.graphs
            .register_multi_input_graph(&self.nodes, name, input_types, custom_graphs, custom_nodes, local_params)
            .map_err(|e| self.record_error(e.into()))
    }

    /// Forwards to [`GraphManager::register_parameterized_graph`]; see
    /// [`Compressor::register_static_graph`] for why this lives here.
    pub fn register_parameterized_graph(
        &mut self,
        name: zl_arena::Name<'static>,
        base_id: GraphId,
        overrides: zl_graph::GraphOverrides<'static>,
    ) -> Result<GraphId, CompressorError> {
        self.graphs
            .register_parameterized_graph(&self.nodes, name, base_id, overrides)
            .map_err(|e| self.record_error(e.into()))
    }

    /// Forwards to [`GraphManager::register_function_graph`]; see
    /// [`Compressor::register_static_graph`] for why this lives here.
    pub fn register_function_graph(
        &mut self,
        name: zl_arena::Name<'static>,
        input_types: &[zl_graph::TypeMask],
        custom_graphs: &[GraphId],
        custom_nodes: &[zl_graph::NodeId],
        behavior: zl_graph::OpaqueBehavior,
        local_params: LocalParams<'static>,
    ) -> Result<GraphId, CompressorError> {
        self.graphs
            .register_function_graph(&self.nodes, name, input_types, custom_graphs, custom_nodes, behavior, local_params)
            .map_err(|e| self.record_error(e.into()))
    }

    /// Applies a resolved global-params set during deserialization,
    /// rejecting anything but the int family (§4.E step 5: "reject
    /// non-empty copy or ref param families").
    pub(crate) fn set_global_params(&mut self, params: LocalParams<'static>) -> Result<(), CompressorError> {
        if !params.blobs().is_empty() || !params.refs().is_empty() {
            return Err(self.record_error(CompressorError::kind(
                ErrorKind::GraphParameterInvalid,
                "global parameters must be int-only",
            )));
        }
        self.global_params = params;
        Ok(())
    }
}

impl Drop for Compressor {
    // Blocks field-by-field destructuring, which could otherwise separate
    // `arena` from the `'static` references into it that outlive this call.
    fn drop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_compressor_has_no_registrations_or_starting_graph() {
        let c = Compressor::new(1);
        assert_eq!(c.version(), 1);
        assert!(c.nodes().is_empty());
        assert!(c.graphs().is_empty());
        assert_eq!(c.get_starting_graph_id(), None);
        assert_eq!(c.get_error_context_string(), None);
    }

    #[test]
    fn set_parameter_replaces_existing_key() {
        let mut c = Compressor::new(1);
        c.set_parameter(5, 1).unwrap();
        c.set_parameter(5, 2).unwrap();
        let mut seen = Vec::new();
        c.for_each_param::<std::convert::Infallible>(|k, v| {
            seen.push((k, v));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(5, 2)]);
    }

    #[test]
    fn select_starting_graph_id_records_error_context_on_failure() {
        let mut c = Compressor::new(1);
        assert!(c.select_starting_graph_id(GraphId(0)).is_err());
        assert!(c.get_error_context_string().unwrap().contains("not a registered graph"));
    }
}
