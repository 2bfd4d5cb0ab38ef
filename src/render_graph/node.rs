//! Render node capability and the contexts nodes are driven through

use std::any::Any;
use std::path::Path;

use ash::vk;

use crate::backend::traits::{CommandRecorder, Device};
use crate::error::GraphResult;
use crate::render_graph::registry::{ResourceRegistry, TrackedKind};
use crate::resources::{
    ColorTarget, CubeTarget, DepthTarget, LoadedImage, ResourceSet, StorageVolume, UsageType,
};
use crate::scene::Camera;
use crate::GraphConfig;

/// Unique identifier for a node in a render graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Context handed to a node while the graph is built.
///
/// Resource requests made here are recorded against the node, so the
/// graph knows which barriers to emit before the node records.
pub struct NodeContext<'a> {
    pub(crate) node: NodeId,
    pub(crate) registry: &'a mut ResourceRegistry,
    pub(crate) device: &'a mut dyn Device,
    pub(crate) config: &'a GraphConfig,
}

impl<'a> NodeContext<'a> {
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn config(&self) -> &GraphConfig {
        self.config
    }

    pub fn device(&mut self) -> &mut dyn Device {
        &mut *self.device
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &*self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut *self.registry
    }

    /// Create-or-fetch with a custom constructor
    pub fn get_write<T, F>(
        &mut self,
        name: &str,
        usage: UsageType,
        factory: F,
    ) -> GraphResult<&mut ResourceSet<T>>
    where
        T: TrackedKind,
        F: FnMut() -> T,
    {
        self.registry
            .get_write(&mut *self.device, name, self.node, usage, factory)
    }

    pub fn get_read<T: TrackedKind>(
        &mut self,
        name: &str,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<T>> {
        self.registry.get_read(name, self.node, usage)
    }

    pub fn get_write_render_target(
        &mut self,
        name: &str,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<ColorTarget>> {
        self.registry
            .get_write_render_target(&mut *self.device, name, self.node, usage)
    }

    pub fn get_read_render_target(
        &mut self,
        name: &str,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<ColorTarget>> {
        self.registry.get_read_render_target(name, self.node, usage)
    }

    pub fn get_write_depth_target(
        &mut self,
        name: &str,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<DepthTarget>> {
        self.registry
            .get_write_depth_target(&mut *self.device, name, self.node, usage)
    }

    pub fn get_read_depth_target(
        &mut self,
        name: &str,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<DepthTarget>> {
        self.registry.get_read_depth_target(name, self.node, usage)
    }

    pub fn get_write_cube_target(
        &mut self,
        name: &str,
        usage: UsageType,
        size: u32,
    ) -> GraphResult<&mut ResourceSet<CubeTarget>> {
        self.registry
            .get_write_cube_target(&mut *self.device, name, self.node, usage, size)
    }

    pub fn get_read_cube_target(
        &mut self,
        name: &str,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<CubeTarget>> {
        self.registry.get_read_cube_target(name, self.node, usage)
    }

    pub fn get_write_storage_volume(
        &mut self,
        name: &str,
        extent: [u32; 3],
    ) -> GraphResult<&mut ResourceSet<StorageVolume>> {
        self.registry
            .get_write_storage_volume(&mut *self.device, name, self.node, extent)
    }

    pub fn get_read_storage_volume(
        &mut self,
        name: &str,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<StorageVolume>> {
        self.registry.get_read_storage_volume(name, self.node, usage)
    }

    pub fn get_loaded_image<P: AsRef<Path>>(
        &mut self,
        name: &str,
        path: P,
    ) -> GraphResult<&mut LoadedImage> {
        self.registry
            .get_loaded_image(&mut *self.device, name, self.node, path)
    }

    /// Register pixels decoded elsewhere under `name`
    pub fn insert_loaded_image(
        &mut self,
        name: &str,
        image: LoadedImage,
    ) -> GraphResult<&mut LoadedImage> {
        self.registry
            .insert_loaded_image(&mut *self.device, name, self.node, image)
    }

    pub fn get_read_loaded_image(
        &mut self,
        name: &str,
        usage: UsageType,
    ) -> GraphResult<&mut LoadedImage> {
        self.registry.get_read_loaded_image(name, self.node, usage)
    }
}

/// Context for per-frame parameter updates
pub struct UpdateContext<'a> {
    pub(crate) node: NodeId,
    pub(crate) camera: &'a Camera,
    pub(crate) registry: &'a ResourceRegistry,
    pub(crate) slot: usize,
}

impl<'a> UpdateContext<'a> {
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn camera(&self) -> &Camera {
        self.camera
    }

    pub fn registry(&self) -> &ResourceRegistry {
        self.registry
    }

    /// Frame slot being prepared
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Context for recording a node's own commands
pub struct RecordContext<'a> {
    pub(crate) node: NodeId,
    pub(crate) recorder: &'a mut dyn CommandRecorder,
    pub(crate) registry: &'a ResourceRegistry,
    pub(crate) slot: usize,
}

impl<'a> RecordContext<'a> {
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn recorder(&mut self) -> &mut dyn CommandRecorder {
        &mut *self.recorder
    }

    pub fn registry(&self) -> &ResourceRegistry {
        self.registry
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// A unit of render or compute work in the graph.
///
/// The graph owns nodes and drives them: `init_node` and
/// `create_gpu_resources` once, after all children are initialized;
/// `update_node` every frame; `record_node_commands` every frame after the
/// node's barriers were emitted.
pub trait RenderNode {
    /// Get the node name for debugging
    fn name(&self) -> &str;

    /// Declare resources through the context
    fn init_node(&mut self, ctx: &mut NodeContext) -> GraphResult<()>;

    /// Create pipelines and other GPU objects the node owns
    fn create_gpu_resources(&mut self, _ctx: &mut NodeContext) -> GraphResult<()> {
        Ok(())
    }

    /// Refresh per-frame shader parameters
    fn update_node(&mut self, _ctx: &mut UpdateContext) -> GraphResult<()> {
        Ok(())
    }

    /// Record draw or dispatch work. `Ok(false)` skips the node this
    /// frame without failing the traversal.
    fn record_node_commands(&mut self, ctx: &mut RecordContext) -> GraphResult<bool>;

    /// Stage in which this node writes its outputs
    fn producer_stage(&self) -> vk::PipelineStageFlags;

    /// Stage in which this node reads its inputs
    fn consumer_stage(&self) -> vk::PipelineStageFlags;

    fn destroy(&mut self, _device: &mut dyn Device) {}

    /// Allow downcasting
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
