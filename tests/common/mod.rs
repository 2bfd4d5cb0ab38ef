//! Common test utilities for render graph integration tests.
//!
//! Provides a configurable node that declares resources by name and logs
//! every call the graph makes on it, plus helpers to build graphs over the
//! dummy backend.

#![allow(dead_code)]

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;
use render_node_graph::backend::{DummyCommandRecorder, DummyDevice};
use render_node_graph::resources::{LoadedImage, ResourceKind, UsageType};
use render_node_graph::scene::CameraUniform;
use render_node_graph::{
    GraphConfig, GraphResult, NodeContext, RecordContext, RenderGraph, RenderNode, UpdateContext,
};

/// Install a logger once per test binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shared, ordered record of node callbacks such as `"record:gbuffer"`
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn push(&self, event: &str, node: &str) {
        self.0.borrow_mut().push(format!("{}:{}", event, node));
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Entries for one event kind, as node names
    pub fn of(&self, event: &str) -> Vec<String> {
        let prefix = format!("{}:", event);
        self.0
            .borrow()
            .iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug, Clone)]
enum Access {
    Write {
        name: String,
        kind: ResourceKind,
        usage: UsageType,
    },
    WriteVolume {
        name: String,
        extent: [u32; 3],
    },
    Read {
        name: String,
        kind: ResourceKind,
        usage: UsageType,
    },
    Load {
        name: String,
        width: u32,
        height: u32,
    },
}

/// A node that declares configurable accesses and logs its lifecycle
pub struct TestNode {
    name: String,
    accesses: Vec<Access>,
    producer_stage: vk::PipelineStageFlags,
    consumer_stage: vk::PipelineStageFlags,
    records: bool,
    log: CallLog,
    /// Camera block seen by the last update
    pub camera: Option<CameraUniform>,
}

impl TestNode {
    /// A raster pass: writes in color output, reads in the fragment shader
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            accesses: Vec::new(),
            producer_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            consumer_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            records: true,
            log: log.clone(),
            camera: None,
        }
    }

    pub fn with_stages(
        mut self,
        producer: vk::PipelineStageFlags,
        consumer: vk::PipelineStageFlags,
    ) -> Self {
        self.producer_stage = producer;
        self.consumer_stage = consumer;
        self
    }

    pub fn writes(mut self, name: &str, kind: ResourceKind, usage: UsageType) -> Self {
        self.accesses.push(Access::Write {
            name: name.to_string(),
            kind,
            usage,
        });
        self
    }

    pub fn writes_color(self, name: &str) -> Self {
        self.writes(name, ResourceKind::ColorTarget, UsageType::ColorAttachment)
    }

    pub fn writes_depth(self, name: &str) -> Self {
        self.writes(name, ResourceKind::DepthTarget, UsageType::DepthAttachment)
    }

    pub fn writes_volume(mut self, name: &str, extent: [u32; 3]) -> Self {
        self.accesses.push(Access::WriteVolume {
            name: name.to_string(),
            extent,
        });
        self
    }

    pub fn reads(mut self, name: &str, kind: ResourceKind, usage: UsageType) -> Self {
        self.accesses.push(Access::Read {
            name: name.to_string(),
            kind,
            usage,
        });
        self
    }

    pub fn samples_color(self, name: &str) -> Self {
        self.reads(name, ResourceKind::ColorTarget, UsageType::CombinedImageSampler)
    }

    /// Register a small solid image under `name`
    pub fn loads(mut self, name: &str, width: u32, height: u32) -> Self {
        self.accesses.push(Access::Load {
            name: name.to_string(),
            width,
            height,
        });
        self
    }

    /// Report that the node's own commands were not recorded
    pub fn skip_recording(mut self) -> Self {
        self.records = false;
        self
    }
}

impl RenderNode for TestNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn init_node(&mut self, ctx: &mut NodeContext) -> GraphResult<()> {
        self.log.push("init", &self.name);
        for access in &self.accesses {
            match access {
                Access::Write { name, kind, usage } => match kind {
                    ResourceKind::ColorTarget => {
                        ctx.get_write_render_target(name, *usage)?;
                    }
                    ResourceKind::DepthTarget => {
                        ctx.get_write_depth_target(name, *usage)?;
                    }
                    ResourceKind::CubeTarget => {
                        ctx.get_write_cube_target(name, *usage, 64)?;
                    }
                    ResourceKind::StorageVolume | ResourceKind::LoadedImage => {
                        unreachable!("use writes_volume or loads")
                    }
                },
                Access::WriteVolume { name, extent } => {
                    ctx.get_write_storage_volume(name, *extent)?;
                }
                Access::Read { name, kind, usage } => match kind {
                    ResourceKind::ColorTarget => {
                        ctx.get_read_render_target(name, *usage)?;
                    }
                    ResourceKind::DepthTarget => {
                        ctx.get_read_depth_target(name, *usage)?;
                    }
                    ResourceKind::CubeTarget => {
                        ctx.get_read_cube_target(name, *usage)?;
                    }
                    ResourceKind::StorageVolume => {
                        ctx.get_read_storage_volume(name, *usage)?;
                    }
                    ResourceKind::LoadedImage => {
                        ctx.get_read_loaded_image(name, *usage)?;
                    }
                },
                Access::Load {
                    name,
                    width,
                    height,
                } => {
                    let pixels = vec![255; (*width * *height * 4) as usize];
                    let image = LoadedImage::from_rgba8(name, *width, *height, pixels);
                    ctx.insert_loaded_image(name, image)?;
                }
            }
        }
        Ok(())
    }

    fn update_node(&mut self, ctx: &mut UpdateContext) -> GraphResult<()> {
        self.log.push("update", &self.name);
        self.camera = Some(ctx.camera().uniform());
        Ok(())
    }

    fn record_node_commands(&mut self, _ctx: &mut RecordContext) -> GraphResult<bool> {
        self.log.push("record", &self.name);
        Ok(self.records)
    }

    fn producer_stage(&self) -> vk::PipelineStageFlags {
        self.producer_stage
    }

    fn consumer_stage(&self) -> vk::PipelineStageFlags {
        self.consumer_stage
    }

    fn destroy(&mut self, _device: &mut dyn render_node_graph::backend::Device) {
        self.log.push("destroy", &self.name);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Graph over the dummy backend with `frames` frames in flight
pub fn dummy_graph(frames: usize) -> RenderGraph<DummyDevice> {
    init_logging();
    let config = GraphConfig::default()
        .with_frames_in_flight(frames)
        .with_extent(64, 64);
    match RenderGraph::new(DummyDevice::new(), config) {
        Ok(graph) => graph,
        Err(err) => panic!("dummy graph: {}", err),
    }
}

/// Run one full frame on `slot` and return the traversal result
pub fn run_frame(
    graph: &mut RenderGraph<DummyDevice>,
    recorder: &mut DummyCommandRecorder,
    slot: usize,
) -> GraphResult<bool> {
    let camera = render_node_graph::scene::Camera::default();
    graph.begin_frame(slot)?;
    graph.update(&camera, slot)?;
    let recorded = graph.record(recorder, slot)?;
    graph.end_frame(slot)?;
    Ok(recorded)
}
