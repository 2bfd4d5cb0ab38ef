//! Render node graph - resource dependency tracking and barrier synthesis
//!
//! Render and compute nodes form a tree. While the graph is built, each node
//! asks the [`ResourceRegistry`] for the images it writes or reads by name.
//! The first writer creates the image; every later access records a
//! dependency edge and the image layout the access needs. At record time the
//! graph walks the tree children first and, before each node records its own
//! commands, emits one image memory barrier per dependency edge.
//!
//! # Features
//! - Multi-buffered resources, one copy per frame in flight
//! - Per-frame layout tracking with FIFO transition queues
//! - Producer/consumer stage scoped barriers
//! - Vulkan backend via ash and gpu-allocator, plus a recording dummy backend

pub mod backend;
pub mod error;
pub mod render_graph;
pub mod resources;
pub mod scene;

use ash::vk;

pub use error::{GraphError, GraphResult};
pub use render_graph::*;

/// Configuration for building a render graph
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Number of frames the CPU may record ahead of the GPU. Every tracked
    /// render target has one copy per frame.
    pub frames_in_flight: usize,
    /// Maximum dependency edges recorded per node
    pub max_dependencies: usize,
    /// Maximum children per node
    pub max_children: usize,
    /// Maximum attachments per attachment group
    pub max_attachments: usize,
    /// Render target width
    pub width: u32,
    /// Render target height
    pub height: u32,
    /// Format of color render targets
    pub color_format: vk::Format,
    /// Format of depth render targets
    pub depth_format: vk::Format,
    /// Format of storage volumes
    pub volume_format: vk::Format,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            max_dependencies: 10,
            max_children: 10,
            max_attachments: 8,
            width: 1280,
            height: 720,
            color_format: vk::Format::R8G8B8A8_UNORM,
            depth_format: vk::Format::D32_SFLOAT,
            volume_format: vk::Format::R16G16B16A16_SFLOAT,
        }
    }
}

impl GraphConfig {
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    pub fn with_max_dependencies(mut self, max: usize) -> Self {
        self.max_dependencies = max;
        self
    }

    pub fn with_max_children(mut self, max: usize) -> Self {
        self.max_children = max;
        self
    }

    pub fn with_max_attachments(mut self, max: usize) -> Self {
        self.max_attachments = max;
        self
    }

    pub fn with_extent(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_color_format(mut self, format: vk::Format) -> Self {
        self.color_format = format;
        self
    }

    pub fn with_depth_format(mut self, format: vk::Format) -> Self {
        self.depth_format = format;
        self
    }

    pub fn with_volume_format(mut self, format: vk::Format) -> Self {
        self.volume_format = format;
        self
    }
}
