//! Render graph ownership and traversal

use crate::backend::traits::{CommandRecorder, Device};
use crate::error::{GraphError, GraphResult};
use crate::render_graph::barrier;
use crate::render_graph::node::*;
use crate::render_graph::registry::{DependencyEdge, ResourceRegistry};
use crate::resources::BoundedVec;
use crate::scene::Camera;
use crate::GraphConfig;

struct NodeEntry {
    node: Box<dyn RenderNode>,
    children: BoundedVec<NodeId>,
    /// Records its own commands when set
    active: bool,
    /// Updates and records when set. Children are traversed either way.
    enabled: bool,
    initialized: bool,
    /// Generation of the last pass that visited this node
    visited: u64,
    level: u32,
}

/// Owner of the node tree, the resource registry and the device.
///
/// Traversals are post-order from the root. A node reachable through more
/// than one parent is processed once per pass: every pass bumps the graph
/// generation and a node is skipped when it already carries the current
/// generation.
pub struct RenderGraph<D: Device> {
    device: D,
    config: GraphConfig,
    registry: ResourceRegistry,
    nodes: Vec<NodeEntry>,
    root: Option<NodeId>,
    generation: u64,
}

impl<D: Device> RenderGraph<D> {
    /// Fails if graphics and compute use different queue families, since
    /// no queue ownership transfers are ever recorded.
    pub fn new(device: D, config: GraphConfig) -> GraphResult<Self> {
        let families = device.queue_family_indices();
        if !families.is_unified() {
            return Err(GraphError::QueueFamilyMismatch {
                graphics: families.graphics,
                compute: families.compute,
            });
        }

        Ok(Self {
            device,
            registry: ResourceRegistry::new(&config),
            config,
            nodes: Vec::new(),
            root: None,
            generation: 0,
        })
    }

    /// Add a node to the graph. The first node added becomes the root.
    pub fn add_node<N: RenderNode + 'static>(&mut self, node: N) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeEntry {
            node: Box::new(node),
            children: BoundedVec::new("child list", self.config.max_children),
            active: true,
            enabled: true,
            initialized: false,
            visited: 0,
            level: 0,
        });
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Attach `child` under `parent`. Children are traversed in the order
    /// they were added.
    ///
    /// Fails once `parent` is initialized: transitions are queued in init
    /// order, so a node joining later would drain the entries of readers
    /// that were initialized before it.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> GraphResult<()> {
        self.entry(child)?;
        let parent_entry = self.entry_mut(parent)?;
        if parent_entry.initialized {
            return Err(GraphError::AlreadyInitialized(parent));
        }
        parent_entry.children.push(child)?;
        let level = parent_entry.level + 1;
        self.entry_mut(child)?.level = level;
        Ok(())
    }

    /// Fails once the current root is initialized
    pub fn set_root(&mut self, root: NodeId) -> GraphResult<()> {
        self.entry(root)?;
        if let Some(current) = self.root.filter(|&r| self.is_initialized(r)) {
            return Err(GraphError::AlreadyInitialized(current));
        }
        self.root = Some(root);
        Ok(())
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_active(&mut self, id: NodeId, active: bool) -> GraphResult<()> {
        self.entry_mut(id)?.active = active;
        Ok(())
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> GraphResult<()> {
        self.entry_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Get a node as its concrete type
    pub fn node<T: 'static>(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id.index())?.node.as_any().downcast_ref::<T>()
    }

    pub fn node_mut<T: 'static>(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes
            .get_mut(id.index())?
            .node
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.index()).map(|e| e.node.name())
    }

    pub fn children(&self, id: NodeId) -> GraphResult<&[NodeId]> {
        Ok(&self.entry(id)?.children[..])
    }

    /// Depth below the root, as of the last `init`
    pub fn level(&self, id: NodeId) -> GraphResult<u32> {
        Ok(self.entry(id)?.level)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_initialized(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(|e| e.initialized)
    }

    pub fn dependees(&mut self, id: NodeId) -> &[DependencyEdge] {
        self.registry.get_dependees(id)
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Initialize every node reachable from the root, children first.
    /// Nodes that were already initialized are skipped, so calling this
    /// again is a no-op.
    pub fn init(&mut self) -> GraphResult<()> {
        let root = self.root.ok_or(GraphError::NoRoot)?;
        self.init_node(root, 0)
    }

    fn init_node(&mut self, id: NodeId, level: u32) -> GraphResult<()> {
        let entry = self.entry_mut(id)?;
        if entry.initialized {
            return Ok(());
        }
        entry.initialized = true;
        entry.level = level;
        let children = entry.children.to_vec();

        for child in children {
            self.init_node(child, level + 1)?;
        }

        let entry = self
            .nodes
            .get_mut(id.index())
            .ok_or(GraphError::UnknownNode(id))?;
        log::debug!(
            "{:indent$}{}: init",
            "",
            entry.node.name(),
            indent = level as usize * 2
        );

        let mut ctx = NodeContext {
            node: id,
            registry: &mut self.registry,
            device: &mut self.device,
            config: &self.config,
        };
        entry.node.init_node(&mut ctx)?;
        entry.node.create_gpu_resources(&mut ctx)
    }

    /// Prepare the transition queues for a new frame
    pub fn begin_frame(&mut self, slot: usize) -> GraphResult<()> {
        self.check_slot(slot)?;
        log::trace!("begin frame, slot {}", slot);
        self.registry.begin_frame();
        Ok(())
    }

    /// Refresh per-frame parameters of every enabled node
    pub fn update(&mut self, camera: &Camera, slot: usize) -> GraphResult<()> {
        self.check_slot(slot)?;
        let root = self.root.ok_or(GraphError::NoRoot)?;
        self.generation += 1;
        self.update_node(root, camera, slot)
    }

    fn update_node(&mut self, id: NodeId, camera: &Camera, slot: usize) -> GraphResult<()> {
        let generation = self.generation;
        let entry = self.entry_mut(id)?;
        if entry.visited == generation {
            return Ok(());
        }
        entry.visited = generation;
        let children = entry.children.to_vec();

        for child in children {
            self.update_node(child, camera, slot)?;
        }

        let entry = self
            .nodes
            .get_mut(id.index())
            .ok_or(GraphError::UnknownNode(id))?;
        if !entry.enabled {
            return Ok(());
        }
        let mut ctx = UpdateContext {
            node: id,
            camera,
            registry: &self.registry,
            slot,
        };
        entry.node.update_node(&mut ctx)
    }

    /// Record every reachable node into `slot`'s command buffer.
    ///
    /// Returns `Ok(false)` if any node skipped its own commands. Barriers
    /// are recorded for every node regardless, so tracked layouts stay
    /// consistent with what the GPU will see.
    pub fn record(&mut self, recorder: &mut dyn CommandRecorder, slot: usize) -> GraphResult<bool> {
        self.check_slot(slot)?;
        let root = self.root.ok_or(GraphError::NoRoot)?;
        self.generation += 1;
        self.record_node(root, recorder, slot)
    }

    fn record_node(
        &mut self,
        id: NodeId,
        recorder: &mut dyn CommandRecorder,
        slot: usize,
    ) -> GraphResult<bool> {
        let generation = self.generation;
        let entry = self.entry_mut(id)?;
        if entry.visited == generation {
            return Ok(true);
        }
        entry.visited = generation;
        let level = entry.level as usize;
        let children = entry.children.to_vec();

        let mut result = true;
        for child in children {
            let recorded = self.record_node(child, recorder, slot)?;
            result = result && recorded;
        }

        let entry = self
            .nodes
            .get(id.index())
            .ok_or(GraphError::UnknownNode(id))?;
        let nodes = &self.nodes;
        barrier::record_transitions(
            &mut self.registry,
            id,
            entry.node.name(),
            entry.node.consumer_stage(),
            |producer| {
                nodes
                    .get(producer.index())
                    .map(|e| e.node.producer_stage())
                    .ok_or(GraphError::UnknownNode(producer))
            },
            recorder,
            slot,
        )?;

        let entry = self
            .nodes
            .get_mut(id.index())
            .ok_or(GraphError::UnknownNode(id))?;
        if result && entry.active && entry.enabled {
            log::trace!("{:indent$}{}: record", "", entry.node.name(), indent = level * 2);
            let mut ctx = RecordContext {
                node: id,
                recorder,
                registry: &self.registry,
                slot,
            };
            result = entry.node.record_node_commands(&mut ctx)?;
        }

        Ok(result)
    }

    /// Return render targets of `slot` to their original layout once the
    /// frame's commands have been submitted
    pub fn end_frame(&mut self, slot: usize) -> GraphResult<()> {
        self.check_slot(slot)?;
        self.registry.reset_render_textures(slot)
    }

    /// Destroy every node, children before parents, then every resource
    pub fn destroy_all(&mut self) {
        self.generation += 1;
        if let Some(root) = self.root {
            self.destroy_node(root);
        }

        // Nodes that were never attached under the root
        let generation = self.generation;
        for entry in &mut self.nodes {
            if entry.visited != generation {
                entry.visited = generation;
                entry.node.destroy(&mut self.device);
            }
        }

        self.registry.destroy(&mut self.device);
    }

    fn destroy_node(&mut self, id: NodeId) {
        let generation = self.generation;
        let Some(entry) = self.nodes.get_mut(id.index()) else {
            return;
        };
        if entry.visited == generation {
            return;
        }
        entry.visited = generation;
        let children = entry.children.to_vec();

        for child in children {
            self.destroy_node(child);
        }

        if let Some(entry) = self.nodes.get_mut(id.index()) {
            log::debug!("{}: destroy", entry.node.name());
            entry.node.destroy(&mut self.device);
        }
    }

    fn check_slot(&self, slot: usize) -> GraphResult<()> {
        if slot >= self.config.frames_in_flight {
            return Err(GraphError::InvalidFrameSlot {
                slot,
                frames: self.config.frames_in_flight,
            });
        }
        Ok(())
    }

    fn entry(&self, id: NodeId) -> GraphResult<&NodeEntry> {
        self.nodes
            .get(id.index())
            .ok_or(GraphError::UnknownNode(id))
    }

    fn entry_mut(&mut self, id: NodeId) -> GraphResult<&mut NodeEntry> {
        self.nodes
            .get_mut(id.index())
            .ok_or(GraphError::UnknownNode(id))
    }
}
