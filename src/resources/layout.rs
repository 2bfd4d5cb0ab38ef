//! Image layout states and access usages.
//!
//! A resource's layout is never chosen directly. Each access point names a
//! [`UsageType`], and the resource kind maps that usage to the
//! [`ImageLayout`] the image must be in when the access happens.

use std::fmt;

use ash::vk;

/// Vulkan image layout states tracked by the render graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Contents undefined. Any layout can be entered from here.
    #[default]
    Undefined,
    /// Written by the host before first use. Never transitioned by the graph.
    PreInitialized,
    /// Least optimal, but valid for every access (storage images).
    General,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    ColorAttachment,
    PresentSrc,
}

impl ImageLayout {
    /// Convert to Vulkan image layout.
    pub fn to_vk(self) -> vk::ImageLayout {
        match self {
            Self::Undefined => vk::ImageLayout::UNDEFINED,
            Self::PreInitialized => vk::ImageLayout::PREINITIALIZED,
            Self::General => vk::ImageLayout::GENERAL,
            Self::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            Self::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            Self::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            Self::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            Self::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            Self::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Self::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::PreInitialized => "PREINITIALIZED",
            Self::General => "GENERAL",
            Self::DepthStencilAttachment => "DEPTH_STENCIL_ATTACHMENT_OPTIMAL",
            Self::DepthStencilReadOnly => "DEPTH_STENCIL_READ_ONLY_OPTIMAL",
            Self::ShaderReadOnly => "SHADER_READ_ONLY_OPTIMAL",
            Self::TransferSrc => "TRANSFER_SRC_OPTIMAL",
            Self::TransferDst => "TRANSFER_DST_OPTIMAL",
            Self::ColorAttachment => "COLOR_ATTACHMENT_OPTIMAL",
            Self::PresentSrc => "PRESENT_SRC_KHR",
        }
    }
}

impl fmt::Display for ImageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a node accesses a resource.
///
/// The descriptor variants mirror `VkDescriptorType` one to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    InputAttachment,
    ColorAttachment,
    DepthAttachment,
    TransferSrc,
    TransferDst,
    Present,
}
