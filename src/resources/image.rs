//! Image resource kinds tracked by the registry

use std::fmt;
use std::path::Path;

use ash::vk;
use image::GenericImageView;

use crate::backend::traits::{Device, ImageHandle};
use crate::backend::types::{ImageDesc, ImageDimension};
use crate::error::GraphResult;
use crate::resources::layout::{ImageLayout, UsageType};

/// Closed set of resource kinds the registry knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ColorTarget,
    DepthTarget,
    CubeTarget,
    StorageVolume,
    LoadedImage,
}

impl ResourceKind {
    /// Kinds that render passes write as attachments. Their tracked layout
    /// is reset to the original layout at the end of every frame.
    pub fn is_render_target(self) -> bool {
        matches!(self, Self::ColorTarget | Self::DepthTarget | Self::CubeTarget)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ColorTarget => "color target",
            Self::DepthTarget => "depth target",
            Self::CubeTarget => "cube target",
            Self::StorageVolume => "storage volume",
            Self::LoadedImage => "loaded image",
        };
        f.write_str(name)
    }
}

/// GPU-side state common to every image kind
#[derive(Debug, Clone)]
pub struct ImageState {
    desc: ImageDesc,
    handle: Option<ImageHandle>,
    current_layout: ImageLayout,
    original_layout: ImageLayout,
}

impl ImageState {
    pub fn new(desc: ImageDesc, layout: ImageLayout) -> Self {
        Self {
            desc,
            handle: None,
            current_layout: layout,
            original_layout: layout,
        }
    }
}

/// Capability every tracked image kind provides to the graph.
///
/// Kinds only differ in how a usage maps to a layout; layout bookkeeping and
/// GPU lifetime are shared through [`ImageState`].
pub trait GpuImage {
    const KIND: ResourceKind;

    fn state(&self) -> &ImageState;
    fn state_mut(&mut self) -> &mut ImageState;

    /// Layout the image must be in for the given access
    fn usage_layout(&self, usage: UsageType) -> ImageLayout;

    fn desc(&self) -> &ImageDesc {
        &self.state().desc
    }

    fn handle(&self) -> Option<&ImageHandle> {
        self.state().handle.as_ref()
    }

    fn current_layout(&self) -> ImageLayout {
        self.state().current_layout
    }

    fn set_current_layout(&mut self, layout: ImageLayout) {
        self.state_mut().current_layout = layout;
    }

    fn original_layout(&self) -> ImageLayout {
        self.state().original_layout
    }

    fn set_original_layout(&mut self, layout: ImageLayout) {
        self.state_mut().original_layout = layout;
    }

    fn reset_layout(&mut self) {
        let state = self.state_mut();
        state.current_layout = state.original_layout;
    }

    fn is_created(&self) -> bool {
        self.state().handle.is_some()
    }

    /// Allocate the GPU image. Does nothing if it already exists.
    fn create(&mut self, device: &mut dyn Device) -> GraphResult<()> {
        if self.is_created() {
            return Ok(());
        }
        let handle = device.create_image(self.desc())?;
        self.state_mut().handle = Some(handle);
        Ok(())
    }

    fn destroy(&mut self, device: &mut dyn Device) {
        if let Some(handle) = self.state_mut().handle.take() {
            device.destroy_image(handle);
        }
    }
}

/// Layout mapping shared by color and cube targets
fn color_usage_layout(usage: UsageType) -> ImageLayout {
    match usage {
        UsageType::ColorAttachment => ImageLayout::ColorAttachment,
        UsageType::Sampler
        | UsageType::CombinedImageSampler
        | UsageType::SampledImage
        | UsageType::InputAttachment => ImageLayout::ShaderReadOnly,
        UsageType::TransferSrc => ImageLayout::TransferSrc,
        UsageType::TransferDst => ImageLayout::TransferDst,
        UsageType::Present => ImageLayout::PresentSrc,
        _ => ImageLayout::General,
    }
}

/// 2D color render target
#[derive(Debug, Clone)]
pub struct ColorTarget {
    state: ImageState,
}

impl ColorTarget {
    pub fn new(width: u32, height: u32, format: vk::Format) -> Self {
        let desc = ImageDesc {
            label: String::from("color target"),
            dimension: ImageDimension::D2,
            width,
            height,
            depth: 1,
            format,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::INPUT_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC,
            host_visible: false,
        };
        Self {
            state: ImageState::new(desc, ImageLayout::Undefined),
        }
    }
}

impl GpuImage for ColorTarget {
    const KIND: ResourceKind = ResourceKind::ColorTarget;

    fn state(&self) -> &ImageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ImageState {
        &mut self.state
    }

    fn usage_layout(&self, usage: UsageType) -> ImageLayout {
        color_usage_layout(usage)
    }
}

/// Depth (and optionally stencil) render target
#[derive(Debug, Clone)]
pub struct DepthTarget {
    state: ImageState,
}

impl DepthTarget {
    pub fn new(width: u32, height: u32, format: vk::Format) -> Self {
        let desc = ImageDesc {
            label: String::from("depth target"),
            dimension: ImageDimension::D2,
            width,
            height,
            depth: 1,
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::INPUT_ATTACHMENT,
            host_visible: false,
        };
        Self {
            state: ImageState::new(desc, ImageLayout::Undefined),
        }
    }
}

impl GpuImage for DepthTarget {
    const KIND: ResourceKind = ResourceKind::DepthTarget;

    fn state(&self) -> &ImageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ImageState {
        &mut self.state
    }

    fn usage_layout(&self, usage: UsageType) -> ImageLayout {
        match usage {
            UsageType::DepthAttachment => ImageLayout::DepthStencilAttachment,
            UsageType::Sampler
            | UsageType::CombinedImageSampler
            | UsageType::SampledImage
            | UsageType::InputAttachment => ImageLayout::DepthStencilReadOnly,
            UsageType::TransferSrc => ImageLayout::TransferSrc,
            UsageType::TransferDst => ImageLayout::TransferDst,
            _ => ImageLayout::General,
        }
    }
}

/// Six-face color target, rendered one face per attachment
#[derive(Debug, Clone)]
pub struct CubeTarget {
    state: ImageState,
}

impl CubeTarget {
    pub const FACES: u32 = 6;

    pub fn new(size: u32, format: vk::Format) -> Self {
        let desc = ImageDesc {
            label: String::from("cube target"),
            dimension: ImageDimension::Cube,
            width: size,
            height: size,
            depth: 1,
            format,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            host_visible: false,
        };
        Self {
            state: ImageState::new(desc, ImageLayout::Undefined),
        }
    }
}

impl GpuImage for CubeTarget {
    const KIND: ResourceKind = ResourceKind::CubeTarget;

    fn state(&self) -> &ImageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ImageState {
        &mut self.state
    }

    fn usage_layout(&self, usage: UsageType) -> ImageLayout {
        color_usage_layout(usage)
    }
}

/// 3D storage image written by compute work
#[derive(Debug, Clone)]
pub struct StorageVolume {
    state: ImageState,
}

impl StorageVolume {
    pub fn new(extent: [u32; 3], format: vk::Format) -> Self {
        let desc = ImageDesc {
            label: String::from("storage volume"),
            dimension: ImageDimension::D3,
            width: extent[0],
            height: extent[1],
            depth: extent[2],
            format,
            usage: vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            host_visible: false,
        };
        Self {
            state: ImageState::new(desc, ImageLayout::General),
        }
    }
}

impl GpuImage for StorageVolume {
    const KIND: ResourceKind = ResourceKind::StorageVolume;

    fn state(&self) -> &ImageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ImageState {
        &mut self.state
    }

    // Storage volumes are read and written in place
    fn usage_layout(&self, _usage: UsageType) -> ImageLayout {
        ImageLayout::General
    }
}

/// Image whose pixels come from disk, written by the host before first use
#[derive(Debug, Clone)]
pub struct LoadedImage {
    state: ImageState,
    pixels: Vec<u8>,
}

impl LoadedImage {
    /// Decode an image file into RGBA8 pixels
    pub fn from_file<P: AsRef<Path>>(path: P) -> GraphResult<Self> {
        let path = path.as_ref();
        let img = image::open(path)?;
        let (width, height) = img.dimensions();
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("loaded image");

        Ok(Self::from_rgba8(label, width, height, img.to_rgba8().into_raw()))
    }

    pub fn from_rgba8(label: &str, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let desc = ImageDesc {
            label: label.to_string(),
            dimension: ImageDimension::D2,
            width,
            height,
            depth: 1,
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::SAMPLED,
            host_visible: true,
        };
        Self {
            state: ImageState::new(desc, ImageLayout::PreInitialized),
            pixels,
        }
    }
}

impl GpuImage for LoadedImage {
    const KIND: ResourceKind = ResourceKind::LoadedImage;

    fn state(&self) -> &ImageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ImageState {
        &mut self.state
    }

    fn usage_layout(&self, usage: UsageType) -> ImageLayout {
        match usage {
            UsageType::TransferDst => ImageLayout::TransferDst,
            UsageType::TransferSrc => ImageLayout::TransferSrc,
            UsageType::StorageImage => ImageLayout::General,
            _ => ImageLayout::ShaderReadOnly,
        }
    }

    fn create(&mut self, device: &mut dyn Device) -> GraphResult<()> {
        if self.is_created() {
            return Ok(());
        }
        let handle = device.create_image(&self.state.desc)?;
        if let Err(err) = device.upload_image(&handle, &self.state.desc, &self.pixels) {
            device.destroy_image(handle);
            return Err(err.into());
        }
        self.state.handle = Some(handle);
        // The device owns the only copy from here on
        self.pixels = Vec::new();
        Ok(())
    }
}
