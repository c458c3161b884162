use indexmap::IndexMap;
use tracing::trace;
use zl_arena::{alloc_slice, Name, RawArena};
use zl_localparams::LocalParams;

use crate::error::GraphError;
use crate::ids::{GraphId, NodeId, OpaqueBehavior, TypeMask};
use crate::node::NodeManager;

/// Default cap on the number of graphs a single manager will register
/// (§8 boundary behavior 12, `temporaryLibraryLimitation`).
pub const ENCODER_GRAPH_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    Standard,
    Static,
    Selector,
    Function,
    MultiInput,
    Parameterized,
    Segmenter,
}

/// Per-kind graph data. §3: "Each graph records input-type masks,
/// custom-children, local params, and for `parameterized` graphs a
/// `baseGraph`" — the fields that vary by kind live here; the fields common
/// to every kind live on [`Graph`] itself.
#[derive(Clone)]
pub enum GraphBody<'a> {
    /// Pre-registered by the embedding program; never built by this crate.
    Standard,
    /// A fixed head node feeding a fixed list of successor graphs.
    Static {
        head_node: NodeId,
        successors: &'a [GraphId],
    },
    /// Chooses among `candidates` at runtime via the opaque `select`
    /// behavior.
    Selector {
        candidates: &'a [GraphId],
        select: OpaqueBehavior,
    },
    /// A generic dynamic-graph body with its own children.
    Function {
        custom_graphs: &'a [GraphId],
        custom_nodes: &'a [NodeId],
        behavior: OpaqueBehavior,
    },
    /// A generic typed-function graph: children only, no dynamic behavior
    /// of its own (the behavior lives in the nodes it composes).
    MultiInput {
        custom_graphs: &'a [GraphId],
        custom_nodes: &'a [NodeId],
    },
    /// Clone-with-overrides of `base`.
    Parameterized {
        base: GraphId,
        custom_graphs: &'a [GraphId],
        custom_nodes: &'a [NodeId],
    },
    /// Splits one input into independently routed ranges.
    Segmenter {
        custom_graphs: &'a [GraphId],
        behavior: OpaqueBehavior,
    },
}

impl<'a> GraphBody<'a> {
    pub fn kind(&self) -> GraphKind {
        match self {
            GraphBody::Standard => GraphKind::Standard,
            GraphBody::Static { .. } => GraphKind::Static,
            GraphBody::Selector { .. } => GraphKind::Selector,
            GraphBody::Function { .. } => GraphKind::Function,
            GraphBody::MultiInput { .. } => GraphKind::MultiInput,
            GraphBody::Parameterized { .. } => GraphKind::Parameterized,
            GraphBody::Segmenter { .. } => GraphKind::Segmenter,
        }
    }

    /// The generic child lists this body carries, for kinds that have them.
    /// Static's `successors` and Selector's `candidates` are reported as the
    /// "custom graphs" half so that [`GraphManager::parameterize`] has a
    /// uniform default to inherit from regardless of the base's kind.
    pub fn children(&self) -> (&'a [GraphId], &'a [NodeId]) {
        match self {
            GraphBody::Standard => (&[], &[]),
            GraphBody::Static { successors, .. } => (successors, &[]),
            GraphBody::Selector { candidates, .. } => (candidates, &[]),
            GraphBody::Function {
                custom_graphs,
                custom_nodes,
                ..
            } => (custom_graphs, custom_nodes),
            GraphBody::MultiInput {
                custom_graphs,
                custom_nodes,
            } => (custom_graphs, custom_nodes),
            GraphBody::Parameterized {
                custom_graphs,
                custom_nodes,
                ..
            } => (custom_graphs, custom_nodes),
            GraphBody::Segmenter { custom_graphs, .. } => (custom_graphs, &[]),
        }
    }
}

#[derive(Clone)]
pub struct Graph<'a> {
    pub id: GraphId,
    pub name: Name<'a>,
    pub input_types: &'a [TypeMask],
    pub local_params: LocalParams<'a>,
    pub body: GraphBody<'a>,
}

impl<'a> Graph<'a> {
    pub fn kind(&self) -> GraphKind {
        self.body.kind()
    }
}

/// A uniform read-only summary of a graph, independent of its kind (§4.D
/// "metadata accessor returning a uniform `GraphMetadata` record").
#[derive(Debug, Clone)]
pub struct GraphMetadata<'a> {
    pub id: GraphId,
    pub name: &'a str,
    pub kind: GraphKind,
    pub base: Option<GraphId>,
    pub input_types: &'a [TypeMask],
    pub custom_graphs: &'a [GraphId],
    pub custom_nodes: &'a [NodeId],
}

impl<'a> From<&Graph<'a>> for GraphMetadata<'a> {
    fn from(g: &Graph<'a>) -> Self {
        let (custom_graphs, custom_nodes) = g.body.children();
        let base = match &g.body {
            GraphBody::Parameterized { base, .. } => Some(*base),
            _ => None,
        };
        GraphMetadata {
            id: g.id,
            name: g.name.unique(),
            kind: g.kind(),
            base,
            input_types: g.input_types,
            custom_graphs,
            custom_nodes,
        }
    }
}

/// Overrides applied by [`GraphManager::register_parameterized_graph`] and
/// [`GraphManager::override_graph_params`]. `None` means "inherit from the
/// base".
#[derive(Default)]
pub struct GraphOverrides<'a> {
    pub local_params: Option<LocalParams<'a>>,
    pub custom_graphs: Option<&'a [GraphId]>,
    pub custom_nodes: Option<&'a [NodeId]>,
}

pub struct GraphManager<'a> {
    arena: &'a dyn RawArena,
    end_of_standard: u32,
    limit: usize,
    entries: Vec<Graph<'a>>,
    by_name: IndexMap<&'a str, GraphId>,
    starting: Option<GraphId>,
}

impl<'a> GraphManager<'a> {
    pub fn new(arena: &'a dyn RawArena, end_of_standard: u32) -> Self {
        Self::with_limit(arena, end_of_standard, ENCODER_GRAPH_LIMIT)
    }

    pub fn with_limit(arena: &'a dyn RawArena, end_of_standard: u32, limit: usize) -> Self {
        Self {
            arena,
            end_of_standard,
            limit,
            entries: Vec::new(),
            by_name: IndexMap::new(),
            starting: None,
        }
    }

    /// The id that the next `register_*` call will assign. Exposed so a
    /// caller that must pre-format a non-anchor [`Name`] before registering
    /// it (its `unique` encodes the owning id, invariant 4 of §8) can query
    /// it ahead of time.
    pub fn next_id(&self) -> GraphId {
        GraphId(self.end_of_standard + self.entries.len() as u32)
    }

    pub fn get_by_id(&self, id: GraphId) -> Option<&Graph<'a>> {
        let offset = id.0.checked_sub(self.end_of_standard)?;
        self.entries.get(offset as usize)
    }

    fn get_by_id_mut(&mut self, id: GraphId) -> Option<&mut Graph<'a>> {
        let offset = id.0.checked_sub(self.end_of_standard)?;
        self.entries.get_mut(offset as usize)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Graph<'a>> {
        let id = *self.by_name.get(name)?;
        self.get_by_id(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Graph<'a>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metadata(&self, id: GraphId) -> Option<GraphMetadata<'a>> {
        self.get_by_id(id).map(GraphMetadata::from)
    }

    pub fn starting_graph_id(&self) -> Option<GraphId> {
        self.starting
    }

    pub fn select_starting_graph_id(&mut self, id: GraphId) -> Result<(), GraphError> {
        if self.get_by_id(id).is_none() {
            return Err(GraphError::GraphInvalid(format!("{id} is not a registered graph")));
        }
        self.starting = Some(id);
        Ok(())
    }

    fn check_name_is_free(&self, name: &Name<'a>) -> Result<(), GraphError> {
        if self.by_name.contains_key(name.unique()) {
            return Err(GraphError::InvalidName(format!(
                "name {:?} is already registered",
                name.unique()
            )));
        }
        Ok(())
    }

    fn insert(&mut self, graph: Graph<'a>) -> Result<GraphId, GraphError> {
        if self.entries.len() >= self.limit {
            return Err(GraphError::TemporaryLibraryLimitation(format!(
                "graph registration cap ({}) reached",
                self.limit
            )));
        }
        self.by_name.insert(graph.name.unique(), graph.id);
        let id = graph.id;
        self.entries.push(graph);
        trace!(graph = %id, "registered graph");
        Ok(id)
    }

    /// `register_static_graph(head_node, successors, localParams?)` (§4.D):
    /// validates that `successors` has exactly one entry per singleton +
    /// variable output of `head_node`, and that each successor has exactly
    /// one input compatible with the output it consumes.
    pub fn register_static_graph(
        &mut self,
        nodes: &NodeManager<'a>,
        name: Name<'a>,
        head_node: NodeId,
        successors: &[GraphId],
        local_params: Option<LocalParams<'a>>,
    ) -> Result<GraphId, GraphError> {
        self.check_name_is_free(&name)?;
        let head = nodes
            .get_by_id(head_node)
            .ok_or_else(|| GraphError::NodeInvalidInput(format!("head node {head_node} is not registered")))?;

        if successors.len() != head.output_count() {
            return Err(GraphError::GraphInvalid(format!(
                "{head_node} has {} outputs but {} successors were given",
                head.output_count(),
                successors.len()
            )));
        }
        for (succ_id, out_mask) in successors.iter().zip(head.output_masks()) {
            let succ = self
                .get_by_id(*succ_id)
                .ok_or_else(|| GraphError::NodeInvalidInput(format!("successor {succ_id} is not registered")))?;
            if succ.input_types.len() != 1 {
                return Err(GraphError::NodeInvalidInput(format!(
                    "successor {succ_id} must take exactly one input"
                )));
            }
            if !succ.input_types[0].overlaps(out_mask) {
                return Err(GraphError::NodeInvalidInput(format!(
                    "successor {succ_id}'s input type is incompatible with {head_node}'s output"
                )));
            }
        }

        let id = self.next_id();
        let local_params = local_params.unwrap_or(head.local_params);
        let graph = Graph {
            id,
            name,
            input_types: head.input_types,
            local_params,
            body: GraphBody::Static {
                head_node,
                successors: alloc_slice(self.arena, successors)?,
            },
        };
        self.insert(graph)
    }

    /// `register_multi_input_graph(desc)` (§4.D): a generic typed function
    /// graph; validates every custom child id.
    pub fn register_multi_input_graph(
        &mut self,
        nodes: &NodeManager<'a>,
        name: Name<'a>,
        input_types: &[TypeMask],
        custom_graphs: &[GraphId],
        custom_nodes: &[NodeId],
        local_params: LocalParams<'a>,
    ) -> Result<GraphId, GraphError> {
        self.check_name_is_free(&name)?;
        self.check_children_registered(nodes, custom_graphs, custom_nodes)?;
        let id = self.next_id();
        let graph = Graph {
            id,
            name,
            input_types: alloc_slice(self.arena, input_types)?,
            local_params,
            body: GraphBody::MultiInput {
                custom_graphs: alloc_slice(self.arena, custom_graphs)?,
                custom_nodes: alloc_slice(self.arena, custom_nodes)?,
            },
        };
        self.insert(graph)
    }

    /// `register_function_graph(desc)` (§4.D): a dynamic-dispatch graph
    /// whose entire routing decision lives in the opaque `behavior`
    /// payload; same child-registration discipline as multi-input and
    /// segmenter graphs. Used by graphs (e.g. the generic clustering
    /// graph) whose successor set is fixed but whose routing logic is
    /// data-driven rather than a static edge list.
    pub fn register_function_graph(
        &mut self,
        nodes: &NodeManager<'a>,
        name: Name<'a>,
        input_types: &[TypeMask],
        custom_graphs: &[GraphId],
        custom_nodes: &[NodeId],
        behavior: OpaqueBehavior,
        local_params: LocalParams<'a>,
    ) -> Result<GraphId, GraphError> {
        self.check_name_is_free(&name)?;
        self.check_children_registered(nodes, custom_graphs, custom_nodes)?;
        let id = self.next_id();
        let graph = Graph {
            id,
            name,
            input_types: alloc_slice(self.arena, input_types)?,
            local_params,
            body: GraphBody::Function {
                custom_graphs: alloc_slice(self.arena, custom_graphs)?,
                custom_nodes: alloc_slice(self.arena, custom_nodes)?,
                behavior,
            },
        };
        self.insert(graph)
    }

    /// `register_typed_selector(selector_desc)` (§4.D): every candidate must
    /// take a single input compatible with `input_type`.
    pub fn register_typed_selector(
        &mut self,
        name: Name<'a>,
        input_type: TypeMask,
        candidates: &[GraphId],
        select: OpaqueBehavior,
        local_params: LocalParams<'a>,
    ) -> Result<GraphId, GraphError> {
        self.check_name_is_free(&name)?;
        for candidate in candidates {
            let target = self
                .get_by_id(*candidate)
                .ok_or_else(|| GraphError::NodeInvalidInput(format!("candidate {candidate} is not registered")))?;
            if target.input_types.len() != 1 {
                return Err(GraphError::NodeInvalidInput(format!(
                    "candidate {candidate} must take exactly one input"
                )));
            }
            if !target.input_types[0].overlaps(&input_type) {
                return Err(GraphError::NodeInvalidInput(format!(
                    "candidate {candidate}'s input type is incompatible with the selector's input"
                )));
            }
        }
        let id = self.next_id();
        let graph = Graph {
            id,
            name,
            input_types: alloc_slice(self.arena, &[input_type])?,
            local_params,
            body: GraphBody::Selector {
                candidates: alloc_slice(self.arena, candidates)?,
                select,
            },
        };
        self.insert(graph)
    }

    /// `register_segmenter(desc)` (§4.D): same discipline as multi-input,
    /// under the distinct `Segmenter` kind.
    pub fn register_segmenter(
        &mut self,
        nodes: &NodeManager<'a>,
        name: Name<'a>,
        input_type: TypeMask,
        custom_graphs: &[GraphId],
        behavior: OpaqueBehavior,
        local_params: LocalParams<'a>,
    ) -> Result<GraphId, GraphError> {
        self.check_name_is_free(&name)?;
        self.check_children_registered(nodes, custom_graphs, &[])?;
        let id = self.next_id();
        let graph = Graph {
            id,
            name,
            input_types: alloc_slice(self.arena, &[input_type])?,
            local_params,
            body: GraphBody::Segmenter {
                custom_graphs: alloc_slice(self.arena, custom_graphs)?,
                behavior,
            },
        };
        self.insert(graph)
    }

    /// `register_parameterized_graph(base, overrides)` (§4.D): clones
    /// `base`, applying non-`None` overrides for local params and custom
    /// children.
    pub fn register_parameterized_graph(
        &mut self,
        nodes: &NodeManager<'a>,
        name: Name<'a>,
        base_id: GraphId,
        overrides: GraphOverrides<'a>,
    ) -> Result<GraphId, GraphError> {
        self.check_name_is_free(&name)?;
        let base = self
            .get_by_id(base_id)
            .ok_or_else(|| GraphError::GraphInvalid(format!("base {base_id} is not registered")))?
            .clone();
        let (base_graphs, base_nodes) = base.body.children();
        let custom_graphs = overrides.custom_graphs.unwrap_or(base_graphs);
        let custom_nodes = overrides.custom_nodes.unwrap_or(base_nodes);
        self.check_children_registered(nodes, custom_graphs, custom_nodes)?;

        let id = self.next_id();
        let graph = Graph {
            id,
            name,
            input_types: base.input_types,
            local_params: overrides.local_params.unwrap_or(base.local_params),
            body: GraphBody::Parameterized {
                base: base_id,
                custom_graphs: alloc_slice(self.arena, custom_graphs)?,
                custom_nodes: alloc_slice(self.arena, custom_nodes)?,
            },
        };
        self.insert(graph)
    }

    /// In-place replacement of a parameterized graph's custom children and
    /// local params. Names cannot be replaced (§4.D).
    pub fn override_graph_params(&mut self, gid: GraphId, overrides: GraphOverrides<'a>) -> Result<(), GraphError> {
        let arena = self.arena;
        let graph = self
            .get_by_id_mut(gid)
            .ok_or_else(|| GraphError::GraphInvalid(format!("{gid} is not registered")))?;
        let GraphBody::Parameterized {
            base,
            custom_graphs,
            custom_nodes,
        } = &graph.body
        else {
            return Err(GraphError::ParameterInvalid(format!(
                "{gid} is not a parameterized graph"
            )));
        };
        let base = *base;
        let new_graphs = match overrides.custom_graphs {
            Some(g) => alloc_slice(arena, g)?,
            None => *custom_graphs,
        };
        let new_nodes = match overrides.custom_nodes {
            Some(n) => alloc_slice(arena, n)?,
            None => *custom_nodes,
        };
        graph.body = GraphBody::Parameterized {
            base,
            custom_graphs: new_graphs,
            custom_nodes: new_nodes,
        };
        if let Some(params) = overrides.local_params {
            graph.local_params = params;
        }
        Ok(())
    }

    fn check_children_registered(
        &self,
        nodes: &NodeManager<'a>,
        custom_graphs: &[GraphId],
        custom_nodes: &[NodeId],
    ) -> Result<(), GraphError> {
        for gid in custom_graphs {
            if self.get_by_id(*gid).is_none() {
                return Err(GraphError::NodeInvalidInput(format!("custom graph {gid} is not registered yet")));
            }
        }
        for nid in custom_nodes {
            if nodes.get_by_id(*nid).is_none() {
                return Err(GraphError::NodeInvalidInput(format!("custom node {nid} is not registered yet")));
            }
        }
        Ok(())
    }
}
