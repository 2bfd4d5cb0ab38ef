//! Deferred shading graph on the dummy backend.
//!
//! Builds a small deferred renderer (depth prepass, gbuffer, a compute
//! fog volume, lighting and a present pass), runs it for a number of frames
//! and prints every barrier the graph synthesized.
//!
//! ```bash
//! cargo run --example gbuffer -- --frames 4 --frames-in-flight 2
//! RUST_LOG=trace cargo run --example gbuffer
//! ```

use std::any::Any;

use ash::vk;
use clap::Parser;

use render_node_graph::backend::{DummyCommandRecorder, DummyDevice, RecordedCommand};
use render_node_graph::resources::{
    AttachmentGroup, ClearValue, ColorTarget, DepthTarget, ResourceKind, UsageType,
};
use render_node_graph::scene::Camera;
use render_node_graph::{
    ComputeNode, GraphConfig, GraphResult, NodeContext, RecordContext, RenderGraph, RenderNode,
    UpdateContext,
};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(about = "Run a deferred render graph and print its barriers")]
struct Args {
    /// Number of frames to record
    #[arg(long, default_value_t = 3)]
    frames: usize,

    /// Frames the CPU records ahead of the GPU
    #[arg(long, default_value_t = 2)]
    frames_in_flight: usize,

    /// Render target width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Render target height
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Leave the fog volume out of the graph
    #[arg(long)]
    no_fog: bool,
}

/// Raster pass declaring its targets and inputs by name
struct RasterPass {
    name: &'static str,
    color: Vec<&'static str>,
    depth: Option<(&'static str, UsageType)>,
    inputs: Vec<(&'static str, ResourceKind)>,
    stages: (vk::PipelineStageFlags, vk::PipelineStageFlags),
    attachments: Option<AttachmentGroup>,
    /// Camera block staged for this frame's uniform buffer
    camera_block: Vec<u8>,
}

impl RasterPass {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            color: Vec::new(),
            depth: None,
            inputs: Vec::new(),
            stages: (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
            attachments: None,
            camera_block: Vec::new(),
        }
    }

    fn color(mut self, name: &'static str) -> Self {
        self.color.push(name);
        self
    }

    fn depth(mut self, name: &'static str, usage: UsageType) -> Self {
        self.depth = Some((name, usage));
        self
    }

    fn input(mut self, name: &'static str, kind: ResourceKind) -> Self {
        self.inputs.push((name, kind));
        self
    }

    fn stages(
        mut self,
        producer: vk::PipelineStageFlags,
        consumer: vk::PipelineStageFlags,
    ) -> Self {
        self.stages = (producer, consumer);
        self
    }
}

impl RenderNode for RasterPass {
    fn name(&self) -> &str {
        self.name
    }

    fn init_node(&mut self, ctx: &mut NodeContext) -> GraphResult<()> {
        let (width, height) = (ctx.config().width, ctx.config().height);
        let capacity = self.color.len() + usize::from(self.depth.is_some());
        let mut group = AttachmentGroup::new(capacity, width, height);

        for name in &self.color {
            let set = ctx.get_write_render_target(name, UsageType::ColorAttachment)?;
            group.add_attachment(&*set, ClearValue::Color([0.0, 0.0, 0.0, 1.0]), true, true)?;
        }
        if let Some((name, usage)) = self.depth {
            let set = ctx.get_write_depth_target(name, usage)?;
            let clear = usage == UsageType::DepthAttachment && self.color.is_empty();
            group.add_attachment(
                &*set,
                ClearValue::DepthStencil {
                    depth: 1.0,
                    stencil: 0,
                },
                clear,
                true,
            )?;
        }
        group.validate_full()?;
        self.attachments = Some(group);

        for (name, kind) in &self.inputs {
            match kind {
                ResourceKind::ColorTarget => {
                    ctx.get_read_render_target(name, UsageType::CombinedImageSampler)?;
                }
                ResourceKind::DepthTarget => {
                    ctx.get_read_depth_target(name, UsageType::CombinedImageSampler)?;
                }
                ResourceKind::StorageVolume => {
                    ctx.get_read_storage_volume(name, UsageType::CombinedImageSampler)?;
                }
                ResourceKind::CubeTarget => {
                    ctx.get_read_cube_target(name, UsageType::CombinedImageSampler)?;
                }
                ResourceKind::LoadedImage => {
                    ctx.get_read_loaded_image(name, UsageType::CombinedImageSampler)?;
                }
            }
        }
        Ok(())
    }

    fn update_node(&mut self, ctx: &mut UpdateContext) -> GraphResult<()> {
        let uniform = ctx.camera().uniform();
        self.camera_block.clear();
        self.camera_block.extend_from_slice(bytemuck::bytes_of(&uniform));
        Ok(())
    }

    fn record_node_commands(&mut self, ctx: &mut RecordContext) -> GraphResult<bool> {
        // No draw submission on the dummy backend
        let targets = self.attachments.as_ref().map_or(0, |g| g.len());
        log::info!(
            "{}: draw into {} attachment(s) with a {} byte camera block, slot {}",
            self.name,
            targets,
            self.camera_block.len(),
            ctx.slot()
        );
        Ok(true)
    }

    fn producer_stage(&self) -> vk::PipelineStageFlags {
        self.stages.0
    }

    fn consumer_stage(&self) -> vk::PipelineStageFlags {
        self.stages.1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn build(args: &Args) -> GraphResult<RenderGraph<DummyDevice>> {
    let config = GraphConfig::default()
        .with_frames_in_flight(args.frames_in_flight)
        .with_extent(args.width, args.height);
    let mut graph = RenderGraph::new(DummyDevice::new(), config)?;

    let present = graph.add_node(
        RasterPass::new("present")
            .color("swapchain")
            .input("hdr", ResourceKind::ColorTarget),
    );

    let mut lighting = RasterPass::new("lighting")
        .color("hdr")
        .input("gbuffer_albedo", ResourceKind::ColorTarget)
        .input("gbuffer_normal", ResourceKind::ColorTarget)
        .input("depth", ResourceKind::DepthTarget);
    if !args.no_fog {
        lighting = lighting.input("fog", ResourceKind::StorageVolume);
    }
    let lighting = graph.add_node(lighting);

    let gbuffer = graph.add_node(
        RasterPass::new("gbuffer")
            .color("gbuffer_albedo")
            .color("gbuffer_normal")
            .depth("depth", UsageType::DepthAttachment)
            .stages(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            ),
    );
    let prepass = graph.add_node(
        RasterPass::new("depth_prepass")
            .depth("depth", UsageType::DepthAttachment)
            .stages(
                vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            ),
    );

    graph.add_child(present, lighting)?;
    graph.add_child(lighting, gbuffer)?;
    graph.add_child(gbuffer, prepass)?;

    if !args.no_fog {
        let fog = graph
            .add_node(ComputeNode::new("fog", [20, 12, 8]).with_write("fog", [160, 90, 64]));
        graph.add_child(lighting, fog)?;
    }

    graph.init()?;
    Ok(graph)
}

fn run(args: &Args) -> GraphResult<()> {
    let mut graph = build(args)?;
    let mut recorder = DummyCommandRecorder::new(args.frames_in_flight);
    let mut camera = Camera::default();
    camera.set_viewport(args.width, args.height);

    for frame in 0..args.frames {
        let slot = frame % args.frames_in_flight;
        recorder.reset(slot);

        graph.begin_frame(slot)?;
        graph.update(&camera, slot)?;
        let recorded = graph.record(&mut recorder, slot)?;
        graph.end_frame(slot)?;

        println!("frame {} (slot {}), all nodes recorded: {}", frame, slot, recorded);
        for command in recorder.commands(slot) {
            match command {
                RecordedCommand::Barrier(b) => println!(
                    "  barrier {:<16} {} -> {}  [{:?} -> {:?}]",
                    b.resource, b.old_layout, b.new_layout, b.src_stage, b.dst_stage
                ),
                RecordedCommand::BindComputePipeline(p) => println!("  bind {:?}", p),
                RecordedCommand::Dispatch(groups) => println!("  dispatch {:?}", groups),
            }
        }
    }

    let registry = graph.registry();
    let albedo = registry.get_resource::<ColorTarget>("gbuffer_albedo")?;
    let depth = registry.get_resource::<DepthTarget>("depth")?;
    println!(
        "{} resources, {} albedo copies, {} depth copies",
        registry.len(),
        albedo.len(),
        depth.len()
    );

    graph.destroy_all();
    println!("live images after teardown: {}", graph.device().live_images());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if args.frames_in_flight == 0 {
        eprintln!("--frames-in-flight must be at least 1");
        std::process::exit(2);
    }

    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
