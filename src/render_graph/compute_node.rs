//! Compute dispatch node

use std::any::Any;

use ash::vk;

use crate::error::GraphResult;
use crate::render_graph::node::{NodeContext, RecordContext, RenderNode};
use crate::resources::{ResourceKind, UsageType};

/// A resource a compute node samples or loads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeRead {
    pub name: String,
    pub kind: ResourceKind,
    pub usage: UsageType,
}

/// Dispatches a fixed number of work groups into storage volumes
#[derive(Debug, Clone)]
pub struct ComputeNode {
    name: String,
    groups: [u32; 3],
    writes: Vec<(String, [u32; 3])>,
    reads: Vec<ComputeRead>,
    pipeline: Option<vk::Pipeline>,
}

impl ComputeNode {
    pub fn new(name: &str, groups: [u32; 3]) -> Self {
        Self {
            name: name.to_string(),
            groups,
            writes: Vec::new(),
            reads: Vec::new(),
            pipeline: None,
        }
    }

    /// Write a storage volume, creating it if no earlier node did
    pub fn with_write(mut self, name: &str, extent: [u32; 3]) -> Self {
        self.writes.push((name.to_string(), extent));
        self
    }

    pub fn with_read(mut self, name: &str, kind: ResourceKind, usage: UsageType) -> Self {
        self.reads.push(ComputeRead {
            name: name.to_string(),
            kind,
            usage,
        });
        self
    }

    pub fn with_pipeline(mut self, pipeline: vk::Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn set_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.pipeline = Some(pipeline);
    }

    pub fn set_groups(&mut self, groups: [u32; 3]) {
        self.groups = groups;
    }

    pub fn groups(&self) -> [u32; 3] {
        self.groups
    }

    pub fn reads(&self) -> &[ComputeRead] {
        &self.reads
    }
}

impl RenderNode for ComputeNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn init_node(&mut self, ctx: &mut NodeContext) -> GraphResult<()> {
        for (name, extent) in &self.writes {
            ctx.get_write_storage_volume(name, *extent)?;
        }

        for read in &self.reads {
            match read.kind {
                ResourceKind::ColorTarget => {
                    ctx.get_read_render_target(&read.name, read.usage)?;
                }
                ResourceKind::DepthTarget => {
                    ctx.get_read_depth_target(&read.name, read.usage)?;
                }
                ResourceKind::CubeTarget => {
                    ctx.get_read_cube_target(&read.name, read.usage)?;
                }
                ResourceKind::StorageVolume => {
                    ctx.get_read_storage_volume(&read.name, read.usage)?;
                }
                ResourceKind::LoadedImage => {
                    ctx.get_read_loaded_image(&read.name, read.usage)?;
                }
            }
        }
        Ok(())
    }

    fn record_node_commands(&mut self, ctx: &mut RecordContext) -> GraphResult<bool> {
        let slot = ctx.slot();
        if let Some(pipeline) = self.pipeline {
            ctx.recorder().bind_compute_pipeline(slot, pipeline)?;
        }
        ctx.recorder().dispatch(slot, self.groups)?;
        Ok(true)
    }

    fn producer_stage(&self) -> vk::PipelineStageFlags {
        vk::PipelineStageFlags::COMPUTE_SHADER
    }

    fn consumer_stage(&self) -> vk::PipelineStageFlags {
        vk::PipelineStageFlags::COMPUTE_SHADER
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyCommandRecorder, DummyDevice, RecordedCommand};
    use crate::render_graph::graph::RenderGraph;
    use crate::resources::ImageLayout;
    use crate::GraphConfig;
    use ash::vk::Handle;

    #[test]
    fn test_dispatch_after_pipeline_bind() {
        let config = GraphConfig::default().with_frames_in_flight(1);
        let mut graph = RenderGraph::new(DummyDevice::new(), config).unwrap();
        let pipeline = vk::Pipeline::from_raw(42);
        graph.add_node(
            ComputeNode::new("density", [8, 8, 1])
                .with_write("volume", [16, 16, 16])
                .with_pipeline(pipeline),
        );
        graph.init().unwrap();

        let mut recorder = DummyCommandRecorder::new(1);
        graph.begin_frame(0).unwrap();
        assert!(graph.record(&mut recorder, 0).unwrap());
        assert_eq!(
            recorder.commands(0),
            &[
                RecordedCommand::BindComputePipeline(pipeline),
                RecordedCommand::Dispatch([8, 8, 1]),
            ]
        );
    }

    #[test]
    fn test_chained_volumes_stay_general() {
        let config = GraphConfig::default().with_frames_in_flight(1);
        let mut graph = RenderGraph::new(DummyDevice::new(), config).unwrap();
        let consumer = graph.add_node(ComputeNode::new("blur", [4, 4, 4]).with_read(
            "volume",
            ResourceKind::StorageVolume,
            UsageType::StorageImage,
        ));
        let producer =
            graph.add_node(ComputeNode::new("fill", [4, 4, 4]).with_write("volume", [8, 8, 8]));
        graph.add_child(consumer, producer).unwrap();
        graph.init().unwrap();

        let mut recorder = DummyCommandRecorder::new(1);
        graph.begin_frame(0).unwrap();
        graph.record(&mut recorder, 0).unwrap();

        let barriers = recorder.barriers(0);
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].old_layout, ImageLayout::General);
        assert_eq!(barriers[0].new_layout, ImageLayout::General);
        assert_eq!(barriers[0].src_access, vk::AccessFlags::SHADER_WRITE);
        assert_eq!(barriers[0].dst_access, vk::AccessFlags::SHADER_READ);

        // Producer dispatches, then the barrier, then the consumer
        assert!(matches!(recorder.commands(0)[0], RecordedCommand::Dispatch(_)));
        assert!(matches!(recorder.commands(0)[1], RecordedCommand::Barrier(_)));
    }
}
