//! Barrier synthesis between producer and consumer nodes
//!
//! Before a node records its own commands, every dependency edge that names
//! the node as consumer becomes one image memory barrier. The barrier moves
//! the image from the layout the previous access left it in to the layout
//! this node's usage requires, and its scope covers only the producer
//! node's declared stage and this node's declared consumer stage.
//!
//! Edges are not batched: each one is emitted as its own
//! `vkCmdPipelineBarrier` call.

use ash::vk;

use crate::backend::traits::CommandRecorder;
use crate::error::{GraphError, GraphResult};
use crate::render_graph::node::NodeId;
use crate::render_graph::registry::{DependencyEdge, ResourceRegistry};
use crate::resources::ImageLayout;

/// Access mask for writes made in the producer's stage
pub fn src_access_mask(stage: vk::PipelineStageFlags) -> GraphResult<vk::AccessFlags> {
    let mut access = vk::AccessFlags::empty();
    if stage.contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT) {
        access |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if stage.contains(vk::PipelineStageFlags::COMPUTE_SHADER)
        || stage.contains(vk::PipelineStageFlags::FRAGMENT_SHADER)
    {
        access |= vk::AccessFlags::SHADER_WRITE;
    }
    if stage.intersects(
        vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
    ) {
        access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    if stage.contains(vk::PipelineStageFlags::TRANSFER) {
        access |= vk::AccessFlags::TRANSFER_WRITE;
    }

    if access.is_empty() {
        return Err(GraphError::UnrecognizedStage {
            stage,
            scope: "source",
        });
    }
    Ok(access)
}

/// Access mask for reads made in the consumer's stage
pub fn dst_access_mask(stage: vk::PipelineStageFlags) -> GraphResult<vk::AccessFlags> {
    let mut access = vk::AccessFlags::empty();
    if stage.intersects(
        vk::PipelineStageFlags::FRAGMENT_SHADER
            | vk::PipelineStageFlags::COMPUTE_SHADER
            | vk::PipelineStageFlags::VERTEX_SHADER,
    ) {
        access |= vk::AccessFlags::SHADER_READ;
    }
    if stage.contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT) {
        access |= vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if stage.intersects(
        vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
    ) {
        access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if stage.contains(vk::PipelineStageFlags::TRANSFER) {
        access |= vk::AccessFlags::TRANSFER_READ;
    }

    if access.is_empty() {
        return Err(GraphError::UnrecognizedStage {
            stage,
            scope: "destination",
        });
    }
    Ok(access)
}

/// Layout change resolved for one dependency edge in one frame slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutTransition {
    pub previous: ImageLayout,
    pub target: ImageLayout,
    pub image: vk::Image,
    pub aspect_mask: vk::ImageAspectFlags,
}

/// A single image memory barrier between two nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBarrier {
    pub resource: String,
    pub image: vk::Image,
    pub aspect_mask: vk::ImageAspectFlags,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

impl ImageBarrier {
    pub fn new(
        edge: &DependencyEdge,
        transition: &LayoutTransition,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
    ) -> GraphResult<Self> {
        Ok(Self {
            resource: edge.resource.clone(),
            image: transition.image,
            aspect_mask: transition.aspect_mask,
            old_layout: transition.previous,
            new_layout: transition.target,
            src_stage,
            dst_stage,
            src_access: src_access_mask(src_stage)?,
            dst_access: dst_access_mask(dst_stage)?,
        })
    }

    /// Vulkan barrier over every mip level and array layer.
    /// Queue ownership never changes.
    pub fn to_vk(&self) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .old_layout(self.old_layout.to_vk())
            .new_layout(self.new_layout.to_vk())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect_mask,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
    }
}

/// Emit the barriers `consumer` needs before recording its own commands.
///
/// Each edge drains one pending transition from its resource and updates
/// the tracked layout of the slot's copy, whether or not a barrier is
/// emitted. An edge whose barrier cannot be built leaves both untouched.
/// Returns the number of barriers emitted.
pub(crate) fn record_transitions<F>(
    registry: &mut ResourceRegistry,
    consumer: NodeId,
    consumer_name: &str,
    consumer_stage: vk::PipelineStageFlags,
    producer_stage: F,
    recorder: &mut dyn CommandRecorder,
    slot: usize,
) -> GraphResult<usize>
where
    F: Fn(NodeId) -> GraphResult<vk::PipelineStageFlags>,
{
    let edges = registry.get_dependees(consumer).to_vec();
    let mut emitted = 0;

    for edge in &edges {
        // Commit only once the barrier is recorded, so a failure leaves the
        // tracked layout and the queue untouched
        let transition = registry.peek_transition(edge, slot)?;

        if transition.previous == ImageLayout::PreInitialized {
            registry.advance_transition(edge, slot)?;
            log::trace!(
                "{}: '{}' is pre-initialized, no barrier",
                consumer_name,
                edge.resource
            );
            continue;
        }

        let barrier = ImageBarrier::new(
            edge,
            &transition,
            producer_stage(edge.producer)?,
            consumer_stage,
        )?;

        log::debug!(
            "{}: '{}' {} -> {} (slot {})",
            consumer_name,
            edge.resource,
            barrier.old_layout,
            barrier.new_layout,
            slot
        );

        recorder.pipeline_barrier(slot, &barrier)?;
        registry.advance_transition(edge, slot)?;
        emitted += 1;
    }

    Ok(emitted)
}
