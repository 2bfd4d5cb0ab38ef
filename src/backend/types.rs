//! Common types shared between backends

use ash::vk;

/// Shape of a GPU image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageDimension {
    D2,
    D3,
    /// Six array layers viewed as a cube
    Cube,
}

/// Image descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDesc {
    pub label: String,
    pub dimension: ImageDimension,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    /// Linear, host-visible image whose pixels are written by the CPU.
    /// Such images start in `PREINITIALIZED` instead of `UNDEFINED`.
    pub host_visible: bool,
}

impl Default for ImageDesc {
    fn default() -> Self {
        Self {
            label: String::new(),
            dimension: ImageDimension::D2,
            width: 1,
            height: 1,
            depth: 1,
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::SAMPLED,
            host_visible: false,
        }
    }
}

impl ImageDesc {
    pub fn is_depth(&self) -> bool {
        !self.aspect_mask().contains(vk::ImageAspectFlags::COLOR)
    }

    /// Aspect flags covering every plane of the format
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        match self.format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }
            vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
            vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::COLOR,
        }
    }

    pub fn array_layers(&self) -> u32 {
        match self.dimension {
            ImageDimension::Cube => 6,
            _ => 1,
        }
    }

    pub fn image_type(&self) -> vk::ImageType {
        match self.dimension {
            ImageDimension::D3 => vk::ImageType::TYPE_3D,
            _ => vk::ImageType::TYPE_2D,
        }
    }

    pub fn view_type(&self) -> vk::ImageViewType {
        match self.dimension {
            ImageDimension::D2 => vk::ImageViewType::TYPE_2D,
            ImageDimension::D3 => vk::ImageViewType::TYPE_3D,
            ImageDimension::Cube => vk::ImageViewType::CUBE,
        }
    }

    pub fn extent(&self) -> vk::Extent3D {
        vk::Extent3D {
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }
}

/// Queue families used for graphics and compute submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub compute: u32,
}

impl QueueFamilyIndices {
    /// Graphics and compute on the same family
    pub fn unified(family: u32) -> Self {
        Self {
            graphics: family,
            compute: family,
        }
    }

    pub fn is_unified(&self) -> bool {
        self.graphics == self.compute
    }
}
