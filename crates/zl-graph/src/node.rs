use indexmap::IndexMap;
use tracing::trace;
use zl_arena::{alloc_slice, Name, RawArena, STANDARD_PREFIX};
use zl_localparams::LocalParams;

use crate::error::GraphError;
use crate::ids::{NodeId, OpaqueBehavior, TypeMask};

/// A typed transform: fixed input arity, fixed or variable output arity,
/// optional children of its own, and (for anything but a truly primitive
/// custom node) a `base` it was parameterized from.
#[derive(Clone)]
pub struct Node<'a> {
    pub id: NodeId,
    pub name: Name<'a>,
    pub input_types: &'a [TypeMask],
    pub singleton_outputs: &'a [TypeMask],
    pub variable_outputs: &'a [TypeMask],
    pub last_input_is_variable: bool,
    pub custom_nodes: &'a [NodeId],
    pub local_params: LocalParams<'a>,
    pub base: Option<NodeId>,
    pub registry_ptr: OpaqueBehavior,
}

impl<'a> Node<'a> {
    pub fn output_count(&self) -> usize {
        self.singleton_outputs.len() + self.variable_outputs.len()
    }

    pub fn output_masks(&self) -> impl Iterator<Item = &TypeMask> {
        self.singleton_outputs.iter().chain(self.variable_outputs.iter())
    }
}

/// Overrides applied by [`NodeManager::parameterize`]: `None` means "inherit
/// from the base node".
#[derive(Default)]
pub struct NodeOverrides<'a> {
    pub local_params: Option<LocalParams<'a>>,
    pub custom_nodes: Option<&'a [NodeId]>,
}

pub struct NodeManager<'a> {
    arena: &'a dyn RawArena,
    end_of_standard: u32,
    entries: Vec<Node<'a>>,
    by_name: IndexMap<&'a str, NodeId>,
}

impl<'a> NodeManager<'a> {
    pub fn new(arena: &'a dyn RawArena, end_of_standard: u32) -> Self {
        Self {
            arena,
            end_of_standard,
            entries: Vec::new(),
            by_name: IndexMap::new(),
        }
    }

    /// The id that the next `register_*`/`parameterize` call will assign.
    /// Exposed so a caller that must pre-format a non-anchor [`Name`] (whose
    /// `unique` encodes the owning id, per invariant 4 of §8) can do so
    /// before the registration call that will actually allocate it.
    pub fn next_id(&self) -> NodeId {
        NodeId(self.end_of_standard + self.entries.len() as u32)
    }

    pub fn get_by_id(&self, id: NodeId) -> Option<&Node<'a>> {
        let offset = id.0.checked_sub(self.end_of_standard)?;
        self.entries.get(offset as usize)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Node<'a>> {
        let id = *self.by_name.get(name)?;
        self.get_by_id(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node<'a>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
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

    fn insert(&mut self, node: Node<'a>) -> Result<NodeId, GraphError> {
        self.by_name.insert(node.name.unique(), node.id);
        let id = node.id;
        self.entries.push(node);
        trace!(node = %id, "registered node");
        Ok(id)
    }

    /// Registers a new custom node, validating that every child in
    /// `custom_nodes` is already registered (acyclic by construction).
    #[allow(clippy::too_many_arguments)]
    pub fn register_custom(
        &mut self,
        name: Name<'a>,
        input_types: &[TypeMask],
        singleton_outputs: &[TypeMask],
        variable_outputs: &[TypeMask],
        last_input_is_variable: bool,
        custom_nodes: &[NodeId],
        local_params: LocalParams<'a>,
        registry_ptr: OpaqueBehavior,
    ) -> Result<NodeId, GraphError> {
        self.check_name_is_free(&name)?;
        for child in custom_nodes {
            if self.get_by_id(*child).is_none() {
                return Err(GraphError::NodeInvalidInput(format!(
                    "custom child {child} is not registered yet"
                )));
            }
        }
        let id = self.next_id();
        let node = Node {
            id,
            name,
            input_types: alloc_slice(self.arena, input_types)?,
            singleton_outputs: alloc_slice(self.arena, singleton_outputs)?,
            variable_outputs: alloc_slice(self.arena, variable_outputs)?,
            last_input_is_variable,
            custom_nodes: alloc_slice(self.arena, custom_nodes)?,
            local_params,
            base: None,
            registry_ptr,
        };
        self.insert(node)
    }

    /// Registers a standard (library-provided) node. Restricted to a
    /// format-version window: `version_supported` decides whether
    /// `current_version` is allowed to register this particular standard
    /// name.
    pub fn register_standard(
        &mut self,
        name: Name<'a>,
        current_version: u32,
        version_supported: impl Fn(u32) -> bool,
        input_types: &[TypeMask],
        singleton_outputs: &[TypeMask],
        variable_outputs: &[TypeMask],
        registry_ptr: OpaqueBehavior,
    ) -> Result<NodeId, GraphError> {
        if name.prefix() != STANDARD_PREFIX {
            return Err(GraphError::InvalidName(format!(
                "standard node name must use the {STANDARD_PREFIX:?} prefix"
            )));
        }
        if !version_supported(current_version) {
            return Err(GraphError::TemporaryLibraryLimitation(format!(
                "standard node {:?} is not available at format version {current_version}",
                name.unique()
            )));
        }
        self.check_name_is_free(&name)?;
        let id = self.next_id();
        let node = Node {
            id,
            name,
            input_types: alloc_slice(self.arena, input_types)?,
            singleton_outputs: alloc_slice(self.arena, singleton_outputs)?,
            variable_outputs: alloc_slice(self.arena, variable_outputs)?,
            last_input_is_variable: false,
            custom_nodes: &[],
            local_params: LocalParams::EMPTY,
            base: None,
            registry_ptr,
        };
        self.insert(node)
    }

    /// Clones `base`, applying non-`None` overrides, and registers the
    /// clone under `name` with `base` recorded as its base node.
    pub fn parameterize(
        &mut self,
        base_id: NodeId,
        name: Name<'a>,
        overrides: NodeOverrides<'a>,
    ) -> Result<NodeId, GraphError> {
        let base = self
            .get_by_id(base_id)
            .ok_or_else(|| GraphError::NodeInvalidInput(format!("base {base_id} is not registered")))?
            .clone();
        self.check_name_is_free(&name)?;
        let custom_nodes = overrides.custom_nodes.unwrap_or(base.custom_nodes);
        for child in custom_nodes {
            if self.get_by_id(*child).is_none() {
                return Err(GraphError::NodeInvalidInput(format!(
                    "custom child {child} is not registered yet"
                )));
            }
        }
        let id = self.next_id();
        let node = Node {
            id,
            name,
            input_types: base.input_types,
            singleton_outputs: base.singleton_outputs,
            variable_outputs: base.variable_outputs,
            last_input_is_variable: base.last_input_is_variable,
            custom_nodes: alloc_slice(self.arena, custom_nodes)?,
            local_params: overrides.local_params.unwrap_or(base.local_params),
            base: Some(base_id),
            registry_ptr: base.registry_ptr,
        };
        self.insert(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use zl_arena::HeapArena;

    fn opaque() -> OpaqueBehavior {
        Arc::new(())
    }

    #[test]
    fn registers_and_looks_up_by_id_and_name() {
        let heap = HeapArena::new();
        let mut nodes = NodeManager::new(&heap, 0);
        let name = Name::build(&heap, "custom.node", 0).unwrap();
        let id = nodes
            .register_custom(
                name,
                &[TypeMask(1)],
                &[TypeMask(1)],
                &[],
                false,
                &[],
                LocalParams::EMPTY,
                opaque(),
            )
            .unwrap();
        assert_eq!(nodes.get_by_id(id).unwrap().id, id);
        assert_eq!(nodes.get_by_name(nodes.get_by_id(id).unwrap().name.unique()).unwrap().id, id);
    }

    #[test]
    fn duplicate_anchor_name_is_rejected() {
        let heap = HeapArena::new();
        let mut nodes = NodeManager::new(&heap, 0);
        let name = Name::standard(&heap, "!zl.dup").unwrap();
        nodes
            .register_custom(name, &[], &[], &[], false, &[], LocalParams::EMPTY, opaque())
            .unwrap();
        let name2 = Name::standard(&heap, "!zl.dup").unwrap();
        assert!(matches!(
            nodes.register_custom(name2, &[], &[], &[], false, &[], LocalParams::EMPTY, opaque()),
            Err(GraphError::InvalidName(_))
        ));
    }

    #[test]
    fn register_standard_requires_standard_prefix() {
        let heap = HeapArena::new();
        let mut nodes = NodeManager::new(&heap, 0);
        let name = Name::build(&heap, "not.standard", 0).unwrap();
        assert!(matches!(
            nodes.register_standard(name, 1, |_| true, &[], &[], &[], opaque()),
            Err(GraphError::InvalidName(_))
        ));
    }

    #[test]
    fn register_standard_respects_version_window() {
        let heap = HeapArena::new();
        let mut nodes = NodeManager::new(&heap, 0);
        let name = Name::standard(&heap, "!zl.versioned").unwrap();
        assert!(matches!(
            nodes.register_standard(name, 1, |v| v >= 2, &[], &[], &[], opaque()),
            Err(GraphError::TemporaryLibraryLimitation(_))
        ));
    }

    #[test]
    fn parameterize_inherits_unoverridden_fields() {
        let heap = HeapArena::new();
        let mut nodes = NodeManager::new(&heap, 0);
        let base_name = Name::build(&heap, "base", 0).unwrap();
        let base_id = nodes
            .register_custom(
                base_name,
                &[TypeMask(1)],
                &[TypeMask(1)],
                &[],
                false,
                &[],
                LocalParams::EMPTY,
                opaque(),
            )
            .unwrap();

        let clone_name = Name::build(&heap, "base", base_id.0 + 1).unwrap();
        let overrides = NodeOverrides {
            local_params: None,
            custom_nodes: None,
        };
        let clone_id = nodes.parameterize(base_id, clone_name, overrides).unwrap();
        let clone = nodes.get_by_id(clone_id).unwrap();
        assert_eq!(clone.base, Some(base_id));
        assert_eq!(clone.input_types, &[TypeMask(1)]);
    }
}
