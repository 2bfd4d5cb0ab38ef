//! Name-keyed registry of every image resource in the graph.
//!
//! The first node to write a name creates the resource and becomes its
//! producer. Every later access by name, read or write, records a
//! [`DependencyEdge`] on the accessing node. The barrier synthesizer walks
//! those edges when the node is recorded.

use std::collections::HashMap;
use std::path::Path;

use ash::vk;

use crate::backend::traits::Device;
use crate::error::{GraphError, GraphResult};
use crate::render_graph::barrier::LayoutTransition;
use crate::render_graph::node::NodeId;
use crate::resources::{
    BoundedVec, ColorTarget, CubeTarget, DepthTarget, GpuImage, ImageLayout, LoadedImage,
    ResourceKind, ResourceSet, StorageVolume, UsageType,
};
use crate::GraphConfig;

/// A resource a node depends on, with the layout it needs it in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub consumer: NodeId,
    pub resource: String,
    pub layout: ImageLayout,
    /// Node that created the resource
    pub producer: NodeId,
}

/// Every resource kind the registry can hold
#[derive(Debug)]
pub enum TrackedResource {
    ColorTargets(ResourceSet<ColorTarget>),
    DepthTargets(ResourceSet<DepthTarget>),
    CubeTargets(ResourceSet<CubeTarget>),
    StorageVolumes(ResourceSet<StorageVolume>),
    /// Host-written once, shared by every frame
    Loaded(LoadedImage),
}

impl TrackedResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::ColorTargets(_) => ResourceKind::ColorTarget,
            Self::DepthTargets(_) => ResourceKind::DepthTarget,
            Self::CubeTargets(_) => ResourceKind::CubeTarget,
            Self::StorageVolumes(_) => ResourceKind::StorageVolume,
            Self::Loaded(_) => ResourceKind::LoadedImage,
        }
    }

    pub fn usage_layout(&self, usage: UsageType) -> ImageLayout {
        let layout = match self {
            Self::ColorTargets(set) => set.usage_layout(usage),
            Self::DepthTargets(set) => set.usage_layout(usage),
            Self::CubeTargets(set) => set.usage_layout(usage),
            Self::StorageVolumes(set) => set.usage_layout(usage),
            Self::Loaded(image) => Some(image.usage_layout(usage)),
        };
        layout.unwrap_or_default()
    }

    pub fn pending_transitions(&self) -> usize {
        match self {
            Self::ColorTargets(set) => set.pending_transitions(),
            Self::DepthTargets(set) => set.pending_transitions(),
            Self::CubeTargets(set) => set.pending_transitions(),
            Self::StorageVolumes(set) => set.pending_transitions(),
            Self::Loaded(_) => 0,
        }
    }

    fn log_layout(&mut self, layout: ImageLayout) {
        match self {
            Self::ColorTargets(set) => set.log_layout(layout),
            Self::DepthTargets(set) => set.log_layout(layout),
            Self::CubeTargets(set) => set.log_layout(layout),
            Self::StorageVolumes(set) => set.log_layout(layout),
            // Loaded images are never transitioned
            Self::Loaded(_) => {}
        }
    }

    fn begin_frame(&mut self) {
        match self {
            Self::ColorTargets(set) => set.begin_frame(),
            Self::DepthTargets(set) => set.begin_frame(),
            Self::CubeTargets(set) => set.begin_frame(),
            Self::StorageVolumes(set) => set.begin_frame(),
            Self::Loaded(_) => {}
        }
    }

    /// Render targets only. Other kinds keep their layout across frames.
    fn reset_image_layout(&mut self, slot: usize) -> GraphResult<()> {
        match self {
            Self::ColorTargets(set) => set.reset_image_layout(slot),
            Self::DepthTargets(set) => set.reset_image_layout(slot),
            Self::CubeTargets(set) => set.reset_image_layout(slot),
            Self::StorageVolumes(_) | Self::Loaded(_) => Ok(()),
        }
    }

    fn peek(&self, slot: usize, edge_layout: ImageLayout) -> GraphResult<LayoutTransition> {
        match self {
            Self::ColorTargets(set) => peek_set(set, slot),
            Self::DepthTargets(set) => peek_set(set, slot),
            Self::CubeTargets(set) => peek_set(set, slot),
            Self::StorageVolumes(set) => peek_set(set, slot),
            Self::Loaded(image) => Ok(loaded_transition(image, edge_layout)),
        }
    }

    fn advance(&mut self, slot: usize, edge_layout: ImageLayout) -> GraphResult<LayoutTransition> {
        match self {
            Self::ColorTargets(set) => advance_set(set, slot),
            Self::DepthTargets(set) => advance_set(set, slot),
            Self::CubeTargets(set) => advance_set(set, slot),
            Self::StorageVolumes(set) => advance_set(set, slot),
            Self::Loaded(image) => Ok(loaded_transition(image, edge_layout)),
        }
    }

    fn destroy(&mut self, device: &mut dyn Device) {
        match self {
            Self::ColorTargets(set) => set.destroy(device),
            Self::DepthTargets(set) => set.destroy(device),
            Self::CubeTargets(set) => set.destroy(device),
            Self::StorageVolumes(set) => set.destroy(device),
            Self::Loaded(image) => image.destroy(device),
        }
    }
}

/// Pop the next target layout and move the slot's copy into it
// Loaded images are never transitioned, so every edge starts from the
// original layout
fn loaded_transition(image: &LoadedImage, target: ImageLayout) -> LayoutTransition {
    LayoutTransition {
        previous: image.original_layout(),
        target,
        image: image.handle().map(|h| h.image).unwrap_or_default(),
        aspect_mask: image.desc().aspect_mask(),
    }
}

fn peek_set<T: GpuImage>(set: &ResourceSet<T>, slot: usize) -> GraphResult<LayoutTransition> {
    let frames = set.len();
    let copy = set
        .get(slot)
        .ok_or(GraphError::InvalidFrameSlot { slot, frames })?;
    let target = set
        .current_transition()
        .ok_or_else(|| GraphError::TransitionQueueEmpty(set.name().to_string()))?;

    Ok(LayoutTransition {
        previous: copy.current_layout(),
        target,
        image: copy.handle().map(|h| h.image).unwrap_or_default(),
        aspect_mask: copy.desc().aspect_mask(),
    })
}

fn advance_set<T: GpuImage>(
    set: &mut ResourceSet<T>,
    slot: usize,
) -> GraphResult<LayoutTransition> {
    let frames = set.len();
    if slot >= frames {
        return Err(GraphError::InvalidFrameSlot { slot, frames });
    }
    let target = set.pop_transition()?;
    let copy = &mut set[slot];
    let previous = copy.current_layout();
    copy.set_current_layout(target);

    Ok(LayoutTransition {
        previous,
        target,
        image: copy.handle().map(|h| h.image).unwrap_or_default(),
        aspect_mask: copy.desc().aspect_mask(),
    })
}

/// Image kinds stored as multi-buffered sets
pub trait TrackedKind: GpuImage + Sized {
    fn wrap(set: ResourceSet<Self>) -> TrackedResource;
    fn as_set(resource: &TrackedResource) -> Option<&ResourceSet<Self>>;
    fn as_set_mut(resource: &mut TrackedResource) -> Option<&mut ResourceSet<Self>>;
}

impl TrackedKind for ColorTarget {
    fn wrap(set: ResourceSet<Self>) -> TrackedResource {
        TrackedResource::ColorTargets(set)
    }

    fn as_set(resource: &TrackedResource) -> Option<&ResourceSet<Self>> {
        match resource {
            TrackedResource::ColorTargets(set) => Some(set),
            _ => None,
        }
    }

    fn as_set_mut(resource: &mut TrackedResource) -> Option<&mut ResourceSet<Self>> {
        match resource {
            TrackedResource::ColorTargets(set) => Some(set),
            _ => None,
        }
    }
}

impl TrackedKind for DepthTarget {
    fn wrap(set: ResourceSet<Self>) -> TrackedResource {
        TrackedResource::DepthTargets(set)
    }

    fn as_set(resource: &TrackedResource) -> Option<&ResourceSet<Self>> {
        match resource {
            TrackedResource::DepthTargets(set) => Some(set),
            _ => None,
        }
    }

    fn as_set_mut(resource: &mut TrackedResource) -> Option<&mut ResourceSet<Self>> {
        match resource {
            TrackedResource::DepthTargets(set) => Some(set),
            _ => None,
        }
    }
}

impl TrackedKind for CubeTarget {
    fn wrap(set: ResourceSet<Self>) -> TrackedResource {
        TrackedResource::CubeTargets(set)
    }

    fn as_set(resource: &TrackedResource) -> Option<&ResourceSet<Self>> {
        match resource {
            TrackedResource::CubeTargets(set) => Some(set),
            _ => None,
        }
    }

    fn as_set_mut(resource: &mut TrackedResource) -> Option<&mut ResourceSet<Self>> {
        match resource {
            TrackedResource::CubeTargets(set) => Some(set),
            _ => None,
        }
    }
}

impl TrackedKind for StorageVolume {
    fn wrap(set: ResourceSet<Self>) -> TrackedResource {
        TrackedResource::StorageVolumes(set)
    }

    fn as_set(resource: &TrackedResource) -> Option<&ResourceSet<Self>> {
        match resource {
            TrackedResource::StorageVolumes(set) => Some(set),
            _ => None,
        }
    }

    fn as_set_mut(resource: &mut TrackedResource) -> Option<&mut ResourceSet<Self>> {
        match resource {
            TrackedResource::StorageVolumes(set) => Some(set),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct RegistryEntry {
    resource: TrackedResource,
    producer: NodeId,
    consumed: bool,
}

/// Central name to resource map
pub struct ResourceRegistry {
    entries: HashMap<String, RegistryEntry>,
    dependees: HashMap<NodeId, BoundedVec<DependencyEdge>>,
    frames_in_flight: usize,
    max_dependencies: usize,
    extent: vk::Extent2D,
    color_format: vk::Format,
    depth_format: vk::Format,
    volume_format: vk::Format,
}

impl ResourceRegistry {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            entries: HashMap::new(),
            dependees: HashMap::new(),
            frames_in_flight: config.frames_in_flight,
            max_dependencies: config.max_dependencies,
            extent: vk::Extent2D {
                width: config.width,
                height: config.height,
            },
            color_format: config.color_format,
            depth_format: config.depth_format,
            volume_format: config.volume_format,
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Create `name` on first use, otherwise record a dependency on it.
    ///
    /// `factory` builds one copy per frame in flight. Both the original and
    /// the current layout of a new resource come from `usage`.
    pub fn get_write<T, F>(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        node: NodeId,
        usage: UsageType,
        factory: F,
    ) -> GraphResult<&mut ResourceSet<T>>
    where
        T: TrackedKind,
        F: FnMut() -> T,
    {
        if self.record_access(name, node, usage, T::KIND, false)? {
            return self.set_mut(name);
        }

        let mut set = ResourceSet::from_fn(name, self.frames_in_flight, factory);
        let layout = set.usage_layout(usage).unwrap_or_default();
        set.set_layouts(layout);
        set.create(device)?;

        log::debug!(
            "registry: node {:?} created {} '{}' in {} ({} copies)",
            node,
            T::KIND,
            name,
            layout,
            set.len()
        );

        self.entries.insert(
            name.to_string(),
            RegistryEntry {
                resource: T::wrap(set),
                producer: node,
                consumed: false,
            },
        );
        self.set_mut(name)
    }

    /// Fetch an existing resource and record a dependency on it
    pub fn get_read<T: TrackedKind>(
        &mut self,
        name: &str,
        node: NodeId,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<T>> {
        if !self.record_access(name, node, usage, T::KIND, true)? {
            return Err(GraphError::ResourceNotFound(name.to_string()));
        }
        self.set_mut(name)
    }

    /// Side-effect free lookup, for use while updating or recording
    pub fn get_resource<T: TrackedKind>(&self, name: &str) -> GraphResult<&ResourceSet<T>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| GraphError::ResourceNotFound(name.to_string()))?;
        T::as_set(&entry.resource).ok_or_else(|| GraphError::KindMismatch {
            name: name.to_string(),
            expected: T::KIND,
            actual: entry.resource.kind(),
        })
    }

    fn set_mut<T: TrackedKind>(&mut self, name: &str) -> GraphResult<&mut ResourceSet<T>> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| GraphError::ResourceNotFound(name.to_string()))?;
        let actual = entry.resource.kind();
        T::as_set_mut(&mut entry.resource).ok_or_else(|| GraphError::KindMismatch {
            name: name.to_string(),
            expected: T::KIND,
            actual,
        })
    }

    /// Record an access to an existing resource. Returns `false` if `name`
    /// is unknown.
    fn record_access(
        &mut self,
        name: &str,
        node: NodeId,
        usage: UsageType,
        expected: ResourceKind,
        read: bool,
    ) -> GraphResult<bool> {
        let Some(entry) = self.entries.get_mut(name) else {
            return Ok(false);
        };

        let actual = entry.resource.kind();
        if actual != expected {
            return Err(GraphError::KindMismatch {
                name: name.to_string(),
                expected,
                actual,
            });
        }

        let layout = entry.resource.usage_layout(usage);
        if layout == ImageLayout::PreInitialized {
            entry.consumed = read;
            return Ok(true);
        }

        let max_dependencies = self.max_dependencies;
        self.dependees
            .entry(node)
            .or_insert_with(|| BoundedVec::new("dependency list", max_dependencies))
            .push(DependencyEdge {
                consumer: node,
                resource: name.to_string(),
                layout,
                producer: entry.producer,
            })?;
        entry.consumed = read;
        entry.resource.log_layout(layout);

        log::trace!(
            "registry: node {:?} depends on '{}' as {} (produced by {:?})",
            node,
            name,
            layout,
            entry.producer
        );
        Ok(true)
    }

    pub fn get_write_render_target(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        node: NodeId,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<ColorTarget>> {
        let (extent, format) = (self.extent, self.color_format);
        self.get_write(device, name, node, usage, || {
            ColorTarget::new(extent.width, extent.height, format)
        })
    }

    pub fn get_read_render_target(
        &mut self,
        name: &str,
        node: NodeId,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<ColorTarget>> {
        self.get_read(name, node, usage)
    }

    pub fn get_write_depth_target(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        node: NodeId,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<DepthTarget>> {
        let (extent, format) = (self.extent, self.depth_format);
        self.get_write(device, name, node, usage, || {
            DepthTarget::new(extent.width, extent.height, format)
        })
    }

    pub fn get_read_depth_target(
        &mut self,
        name: &str,
        node: NodeId,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<DepthTarget>> {
        self.get_read(name, node, usage)
    }

    pub fn get_write_cube_target(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        node: NodeId,
        usage: UsageType,
        size: u32,
    ) -> GraphResult<&mut ResourceSet<CubeTarget>> {
        let format = self.color_format;
        self.get_write(device, name, node, usage, || CubeTarget::new(size, format))
    }

    pub fn get_read_cube_target(
        &mut self,
        name: &str,
        node: NodeId,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<CubeTarget>> {
        self.get_read(name, node, usage)
    }

    /// Storage volumes are always written as storage images
    pub fn get_write_storage_volume(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        node: NodeId,
        extent: [u32; 3],
    ) -> GraphResult<&mut ResourceSet<StorageVolume>> {
        let format = self.volume_format;
        self.get_write(device, name, node, UsageType::StorageImage, || {
            StorageVolume::new(extent, format)
        })
    }

    pub fn get_read_storage_volume(
        &mut self,
        name: &str,
        node: NodeId,
        usage: UsageType,
    ) -> GraphResult<&mut ResourceSet<StorageVolume>> {
        self.get_read(name, node, usage)
    }

    /// Load `path` on first request. Later requests return the same image
    /// without recording a dependency.
    pub fn get_loaded_image<P: AsRef<Path>>(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        node: NodeId,
        path: P,
    ) -> GraphResult<&mut LoadedImage> {
        if !self.entries.contains_key(name) {
            let image = LoadedImage::from_file(path)?;
            return self.insert_loaded_image(device, name, node, image);
        }
        self.loaded_image_mut(name)
    }

    /// Register host pixels under `name`, or return the existing image
    pub fn insert_loaded_image(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        node: NodeId,
        mut image: LoadedImage,
    ) -> GraphResult<&mut LoadedImage> {
        if !self.entries.contains_key(name) {
            image.create(device)?;
            log::debug!("registry: node {:?} loaded image '{}'", node, name);
            self.entries.insert(
                name.to_string(),
                RegistryEntry {
                    resource: TrackedResource::Loaded(image),
                    producer: node,
                    consumed: false,
                },
            );
        }
        self.loaded_image_mut(name)
    }

    pub fn get_read_loaded_image(
        &mut self,
        name: &str,
        node: NodeId,
        usage: UsageType,
    ) -> GraphResult<&mut LoadedImage> {
        if !self.record_access(name, node, usage, ResourceKind::LoadedImage, true)? {
            return Err(GraphError::ResourceNotFound(name.to_string()));
        }
        self.loaded_image_mut(name)
    }

    pub fn loaded_image(&self, name: &str) -> GraphResult<&LoadedImage> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| GraphError::ResourceNotFound(name.to_string()))?;
        match &entry.resource {
            TrackedResource::Loaded(image) => Ok(image),
            other => Err(GraphError::KindMismatch {
                name: name.to_string(),
                expected: ResourceKind::LoadedImage,
                actual: other.kind(),
            }),
        }
    }

    fn loaded_image_mut(&mut self, name: &str) -> GraphResult<&mut LoadedImage> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| GraphError::ResourceNotFound(name.to_string()))?;
        match &mut entry.resource {
            TrackedResource::Loaded(image) => Ok(image),
            other => Err(GraphError::KindMismatch {
                name: name.to_string(),
                expected: ResourceKind::LoadedImage,
                actual: other.kind(),
            }),
        }
    }

    /// Dependency edges targeting `node`, in the order they were recorded
    pub fn get_dependees(&mut self, node: NodeId) -> &[DependencyEdge] {
        let max_dependencies = self.max_dependencies;
        &self
            .dependees
            .entry(node)
            .or_insert_with(|| BoundedVec::new("dependency list", max_dependencies))[..]
    }

    /// Resolve the layout change for `edge` in `slot` without touching the
    /// tracked state
    pub fn peek_transition(
        &self,
        edge: &DependencyEdge,
        slot: usize,
    ) -> GraphResult<LayoutTransition> {
        let entry = self
            .entries
            .get(&edge.resource)
            .ok_or_else(|| GraphError::ResourceNotFound(edge.resource.clone()))?;
        entry.resource.peek(slot, edge.layout)
    }

    /// Resolve the layout change for `edge` in `slot` and apply it to the
    /// tracked state
    pub fn advance_transition(
        &mut self,
        edge: &DependencyEdge,
        slot: usize,
    ) -> GraphResult<LayoutTransition> {
        let entry = self
            .entries
            .get_mut(&edge.resource)
            .ok_or_else(|| GraphError::ResourceNotFound(edge.resource.clone()))?;
        entry.resource.advance(slot, edge.layout)
    }

    /// Re-arm every transition queue from its access log
    pub fn begin_frame(&mut self) {
        for entry in self.entries.values_mut() {
            entry.resource.begin_frame();
        }
    }

    /// Return render targets of `slot` to their original layout.
    ///
    /// Render passes leave attachments in their original layout, so this is
    /// the layout the first consumer of the next frame transitions from.
    pub fn reset_render_textures(&mut self, slot: usize) -> GraphResult<()> {
        if slot >= self.frames_in_flight {
            return Err(GraphError::InvalidFrameSlot {
                slot,
                frames: self.frames_in_flight,
            });
        }
        for entry in self.entries.values_mut() {
            if entry.resource.kind().is_render_target() {
                entry.resource.reset_image_layout(slot)?;
            }
        }
        Ok(())
    }

    /// Release every resource once and forget all names and edges
    pub fn destroy(&mut self, device: &mut dyn Device) {
        for (name, mut entry) in self.entries.drain() {
            log::trace!("registry: destroying '{}'", name);
            entry.resource.destroy(device);
        }
        self.dependees.clear();
    }

    pub fn is_resource_created(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether the last access to `name` was a read
    pub fn is_consumed(&self, name: &str) -> Option<bool> {
        self.entries.get(name).map(|e| e.consumed)
    }

    pub fn producer_of(&self, name: &str) -> Option<NodeId> {
        self.entries.get(name).map(|e| e.producer)
    }

    pub fn resource_kind(&self, name: &str) -> Option<ResourceKind> {
        self.entries.get(name).map(|e| e.resource.kind())
    }

    pub fn pending_transitions(&self, name: &str) -> Option<usize> {
        self.entries.get(name).map(|e| e.resource.pending_transitions())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyDevice;

    fn registry() -> (ResourceRegistry, DummyDevice) {
        let config = GraphConfig::default().with_frames_in_flight(2);
        (ResourceRegistry::new(&config), DummyDevice::new())
    }

    #[test]
    fn test_write_creates_then_returns_same_resource() {
        let (mut registry, mut device) = registry();
        let a = NodeId(0);
        let b = NodeId(1);

        let first = registry
            .get_write_render_target(&mut device, "albedo", a, UsageType::ColorAttachment)
            .unwrap()[0]
            .handle()
            .copied();
        assert_eq!(device.live_images(), 2);

        let second = registry
            .get_write_render_target(&mut device, "albedo", b, UsageType::ColorAttachment)
            .unwrap()[0]
            .handle()
            .copied();
        assert_eq!(first, second);
        // No duplicate allocation
        assert_eq!(device.live_images(), 2);
        assert_eq!(registry.producer_of("albedo"), Some(a));
        assert_eq!(registry.get_dependees(b).len(), 1);
        assert!(registry.get_dependees(a).is_empty());
    }

    #[test]
    fn test_new_resource_starts_in_usage_layout() {
        let (mut registry, mut device) = registry();
        let set = registry
            .get_write_depth_target(&mut device, "depth", NodeId(0), UsageType::DepthAttachment)
            .unwrap();
        assert_eq!(set[1].original_layout(), ImageLayout::DepthStencilAttachment);
        assert_eq!(set[1].current_layout(), ImageLayout::DepthStencilAttachment);
        assert_eq!(set.pending_transitions(), 0);
    }

    #[test]
    fn test_read_records_edge_and_transition() {
        let (mut registry, mut device) = registry();
        registry
            .get_write_render_target(&mut device, "albedo", NodeId(0), UsageType::ColorAttachment)
            .unwrap();
        registry
            .get_read_render_target("albedo", NodeId(1), UsageType::CombinedImageSampler)
            .unwrap();

        assert_eq!(registry.is_consumed("albedo"), Some(true));
        assert_eq!(registry.pending_transitions("albedo"), Some(1));
        assert_eq!(
            registry.get_dependees(NodeId(1)),
            &[DependencyEdge {
                consumer: NodeId(1),
                resource: String::from("albedo"),
                layout: ImageLayout::ShaderReadOnly,
                producer: NodeId(0),
            }]
        );

        // A later write clears the consumed flag
        registry
            .get_write_render_target(&mut device, "albedo", NodeId(2), UsageType::ColorAttachment)
            .unwrap();
        assert_eq!(registry.is_consumed("albedo"), Some(false));
    }

    #[test]
    fn test_read_before_write_fails() {
        let (mut registry, _device) = registry();
        assert!(matches!(
            registry.get_read_render_target("missing", NodeId(0), UsageType::SampledImage),
            Err(GraphError::ResourceNotFound(name)) if name == "missing"
        ));
        assert!(!registry.is_resource_created("missing"));
    }

    #[test]
    fn test_kind_mismatch() {
        let (mut registry, mut device) = registry();
        registry
            .get_write_render_target(&mut device, "albedo", NodeId(0), UsageType::ColorAttachment)
            .unwrap();

        let err = registry
            .get_read_depth_target("albedo", NodeId(1), UsageType::SampledImage)
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::KindMismatch {
                expected: ResourceKind::DepthTarget,
                actual: ResourceKind::ColorTarget,
                ..
            }
        ));
        // The failed access left no edge behind
        assert!(registry.get_dependees(NodeId(1)).is_empty());
    }

    #[test]
    fn test_dependency_capacity() {
        let config = GraphConfig::default().with_max_dependencies(2);
        let mut registry = ResourceRegistry::new(&config);
        let mut device = DummyDevice::new();
        registry
            .get_write_render_target(&mut device, "albedo", NodeId(0), UsageType::ColorAttachment)
            .unwrap();

        let reader = NodeId(1);
        for _ in 0..2 {
            registry
                .get_read_render_target("albedo", reader, UsageType::SampledImage)
                .unwrap();
        }
        assert!(matches!(
            registry.get_read_render_target("albedo", reader, UsageType::SampledImage),
            Err(GraphError::CapacityExceeded { capacity: 2, .. })
        ));
        // The rejected access did not queue a transition
        assert_eq!(registry.pending_transitions("albedo"), Some(2));
    }

    #[test]
    fn test_loaded_image_never_transitions() {
        let (mut registry, mut device) = registry();
        let image = LoadedImage::from_rgba8("brick", 2, 2, vec![128; 16]);
        registry
            .insert_loaded_image(&mut device, "brick", NodeId(0), image)
            .unwrap();
        assert_eq!(device.uploads(), 1);

        registry
            .get_read_loaded_image("brick", NodeId(1), UsageType::CombinedImageSampler)
            .unwrap();
        let edge = registry.get_dependees(NodeId(1))[0].clone();
        let transition = registry.advance_transition(&edge, 0).unwrap();
        assert_eq!(transition.previous, ImageLayout::PreInitialized);
        assert_eq!(transition.target, ImageLayout::ShaderReadOnly);

        // Asking again returns the existing image without a dependency
        let again = LoadedImage::from_rgba8("brick", 2, 2, vec![0; 16]);
        registry
            .insert_loaded_image(&mut device, "brick", NodeId(2), again)
            .unwrap();
        assert!(registry.get_dependees(NodeId(2)).is_empty());
        assert_eq!(device.uploads(), 1);
    }

    #[test]
    fn test_storage_volume_resets_are_skipped() {
        let (mut registry, mut device) = registry();
        registry
            .get_write_storage_volume(&mut device, "density", NodeId(0), [4, 4, 4])
            .unwrap();
        registry
            .get_read_storage_volume("density", NodeId(1), UsageType::CombinedImageSampler)
            .unwrap();
        let edge = registry.get_dependees(NodeId(1))[0].clone();
        assert_eq!(edge.layout, ImageLayout::General);

        let transition = registry.advance_transition(&edge, 1).unwrap();
        assert_eq!(transition.previous, ImageLayout::General);
        registry.reset_render_textures(1).unwrap();
        assert_eq!(
            registry
                .get_resource::<StorageVolume>("density")
                .unwrap()[1]
                .current_layout(),
            ImageLayout::General
        );
    }

    #[test]
    fn test_destroy_releases_each_image_once() {
        let (mut registry, mut device) = registry();
        registry
            .get_write_render_target(&mut device, "albedo", NodeId(0), UsageType::ColorAttachment)
            .unwrap();
        for reader in 1..4 {
            registry
                .get_read_render_target("albedo", NodeId(reader), UsageType::SampledImage)
                .unwrap();
        }
        registry
            .get_write_depth_target(&mut device, "depth", NodeId(0), UsageType::DepthAttachment)
            .unwrap();
        assert_eq!(device.live_images(), 4);

        registry.destroy(&mut device);
        assert_eq!(device.live_images(), 0);
        assert_eq!(device.destroyed_images(), 4);
        assert!(registry.is_empty());

        registry.destroy(&mut device);
        assert_eq!(device.destroyed_images(), 4);
    }
}
