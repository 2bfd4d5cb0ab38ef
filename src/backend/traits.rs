//! Core backend abstraction traits
//!
//! The render graph never talks to Vulkan directly. Image creation goes
//! through [`Device`], command emission through [`CommandRecorder`].

use crate::backend::types::*;
use crate::render_graph::barrier::ImageBarrier;
use ash::vk;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create image: {0}")]
    ImageCreationFailed(String),
    #[error("Failed to allocate memory: {0}")]
    AllocationFailed(String),
    #[error("Failed to upload image data: {0}")]
    UploadFailed(String),
    #[error("No command buffer for frame slot {0}")]
    MissingCommandBuffer(usize),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU image and its default view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    pub(crate) id: u64,
    pub image: vk::Image,
    pub view: vk::ImageView,
}

impl ImageHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Owner of GPU memory and queues
pub trait Device {
    fn queue_family_indices(&self) -> QueueFamilyIndices;

    /// Create an image with a default view over all of its layers
    fn create_image(&mut self, desc: &ImageDesc) -> BackendResult<ImageHandle>;

    /// Write tightly packed RGBA8 pixels into a host-visible image
    fn upload_image(
        &mut self,
        image: &ImageHandle,
        desc: &ImageDesc,
        pixels: &[u8],
    ) -> BackendResult<()>;

    fn destroy_image(&mut self, image: ImageHandle);
}

/// Per-frame command lists, indexed by frame slot
pub trait CommandRecorder {
    /// Emit a single image memory barrier
    fn pipeline_barrier(&mut self, slot: usize, barrier: &ImageBarrier) -> BackendResult<()>;

    fn bind_compute_pipeline(&mut self, slot: usize, pipeline: vk::Pipeline)
        -> BackendResult<()>;

    fn dispatch(&mut self, slot: usize, groups: [u32; 3]) -> BackendResult<()>;
}
