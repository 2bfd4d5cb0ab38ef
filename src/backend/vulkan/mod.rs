//! Vulkan backend implementation using ash
//!
//! The instance, device and queues are created by the application. This
//! backend only owns the images the render graph asks for and records
//! into command buffers the application begins and submits.

use std::collections::HashMap;

use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::barrier::ImageBarrier;

struct VkImage {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Allocation,
}

/// Image allocation on an externally created `ash::Device`
pub struct VulkanDevice {
    device: ash::Device,
    allocator: Option<Allocator>,
    families: QueueFamilyIndices,
    images: HashMap<u64, VkImage>,
    next_image_id: u64,
}

impl VulkanDevice {
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        families: QueueFamilyIndices,
    ) -> BackendResult<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            device,
            allocator: Some(allocator),
            families,
            images: HashMap::new(),
            next_image_id: 1,
        })
    }

    /// Get the Vulkan device
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    fn allocator(&mut self) -> BackendResult<&mut Allocator> {
        self.allocator
            .as_mut()
            .ok_or_else(|| BackendError::AllocationFailed("Allocator not available".into()))
    }

    fn create_view(&self, image: vk::Image, desc: &ImageDesc) -> BackendResult<vk::ImageView> {
        let view_info = vk::ImageViewCreateInfo {
            image,
            view_type: desc.view_type(),
            format: desc.format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: desc.aspect_mask(),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: desc.array_layers(),
            },
            ..Default::default()
        };

        unsafe {
            self.device
                .create_image_view(&view_info, None)
                .map_err(|e| BackendError::ImageCreationFailed(e.to_string()))
        }
    }

    /// Release one image. The view must not be in use by the GPU anymore.
    fn free(&mut self, vk_image: VkImage) {
        unsafe {
            self.device.destroy_image_view(vk_image.view, None);
            self.device.destroy_image(vk_image.image, None);
        }
        if let Some(allocator) = self.allocator.as_mut() {
            if let Err(err) = allocator.free(vk_image.allocation) {
                log::warn!("VulkanDevice: failed to free image memory: {}", err);
            }
        }
    }
}

impl Device for VulkanDevice {
    fn queue_family_indices(&self) -> QueueFamilyIndices {
        self.families
    }

    fn create_image(&mut self, desc: &ImageDesc) -> BackendResult<ImageHandle> {
        // Host written images are linear and keep their texels on the
        // transition out of PREINITIALIZED
        let (tiling, initial_layout, location) = if desc.host_visible {
            (
                vk::ImageTiling::LINEAR,
                vk::ImageLayout::PREINITIALIZED,
                MemoryLocation::CpuToGpu,
            )
        } else {
            (
                vk::ImageTiling::OPTIMAL,
                vk::ImageLayout::UNDEFINED,
                MemoryLocation::GpuOnly,
            )
        };

        let flags = match desc.dimension {
            ImageDimension::Cube => vk::ImageCreateFlags::CUBE_COMPATIBLE,
            _ => vk::ImageCreateFlags::empty(),
        };

        let image_info = vk::ImageCreateInfo {
            flags,
            image_type: desc.image_type(),
            extent: desc.extent(),
            mip_levels: 1,
            array_layers: desc.array_layers(),
            format: desc.format,
            tiling,
            initial_layout,
            usage: desc.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };

        let image = unsafe {
            self.device
                .create_image(&image_info, None)
                .map_err(|e| BackendError::ImageCreationFailed(e.to_string()))?
        };
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let allocation = self
            .allocator()
            .and_then(|allocator| {
                allocator
                    .allocate(&AllocationCreateDesc {
                        name: &desc.label,
                        requirements,
                        location,
                        linear: desc.host_visible,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| BackendError::AllocationFailed(e.to_string()))
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(err);
            }
        };

        let bound = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        };
        let view = bound
            .map_err(|e| BackendError::ImageCreationFailed(e.to_string()))
            .and_then(|_| self.create_view(image, desc));
        let view = match view {
            Ok(view) => view,
            Err(err) => {
                self.free(VkImage {
                    image,
                    view: vk::ImageView::null(),
                    allocation,
                });
                return Err(err);
            }
        };

        let id = self.next_image_id;
        self.next_image_id += 1;
        self.images.insert(
            id,
            VkImage {
                image,
                view,
                allocation,
            },
        );
        log::debug!(
            "VulkanDevice: created image '{}' ({}x{}x{}, {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.depth,
            desc.format
        );

        Ok(ImageHandle { id, image, view })
    }

    fn upload_image(
        &mut self,
        image: &ImageHandle,
        desc: &ImageDesc,
        pixels: &[u8],
    ) -> BackendResult<()> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::UploadFailed(format!(
                "'{}' has an empty extent",
                desc.label
            )));
        }
        let vk_image = self
            .images
            .get_mut(&image.id)
            .ok_or_else(|| BackendError::UploadFailed(format!("'{}' is not live", desc.label)))?;

        let subresource = vk::ImageSubresource {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            array_layer: 0,
        };
        let layout = unsafe {
            self.device
                .get_image_subresource_layout(vk_image.image, subresource)
        };

        let row_bytes = desc.width as usize * 4;
        if pixels.len() < row_bytes * desc.height as usize {
            return Err(BackendError::UploadFailed(format!(
                "'{}' needs {} bytes, got {}",
                desc.label,
                row_bytes * desc.height as usize,
                pixels.len()
            )));
        }

        let mapped = vk_image
            .allocation
            .mapped_slice_mut()
            .ok_or_else(|| BackendError::UploadFailed(format!("'{}' is not mapped", desc.label)))?;

        // Linear images may pad every row
        let offset = layout.offset as usize;
        let pitch = layout.row_pitch as usize;
        let rows = pixels
            .chunks_exact(row_bytes)
            .take(desc.height as usize)
            .enumerate();
        for (row, src) in rows {
            let start = offset + row * pitch;
            let dst = mapped.get_mut(start..start + row_bytes).ok_or_else(|| {
                BackendError::UploadFailed(format!("'{}' row {} out of range", desc.label, row))
            })?;
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        if let Some(vk_image) = self.images.remove(&image.id) {
            self.free(vk_image);
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
        }
        let images: Vec<VkImage> = self.images.drain().map(|(_, image)| image).collect();
        for image in images {
            self.free(image);
        }
        // Drop the allocator before the application destroys the device
        drop(self.allocator.take());
    }
}

/// One command buffer per frame slot, begun and submitted by the application
pub struct VulkanCommandRecorder {
    device: ash::Device,
    command_buffers: Vec<vk::CommandBuffer>,
}

impl VulkanCommandRecorder {
    pub fn new(device: ash::Device, command_buffers: Vec<vk::CommandBuffer>) -> Self {
        Self {
            device,
            command_buffers,
        }
    }

    pub fn command_buffer(&self, slot: usize) -> BackendResult<vk::CommandBuffer> {
        self.command_buffers
            .get(slot)
            .copied()
            .ok_or(BackendError::MissingCommandBuffer(slot))
    }
}

impl CommandRecorder for VulkanCommandRecorder {
    fn pipeline_barrier(&mut self, slot: usize, barrier: &ImageBarrier) -> BackendResult<()> {
        let cmd = self.command_buffer(slot)?;
        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                barrier.src_stage,
                barrier.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier.to_vk()],
            );
        }
        Ok(())
    }

    fn bind_compute_pipeline(
        &mut self,
        slot: usize,
        pipeline: vk::Pipeline,
    ) -> BackendResult<()> {
        let cmd = self.command_buffer(slot)?;
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, pipeline);
        }
        Ok(())
    }

    fn dispatch(&mut self, slot: usize, groups: [u32; 3]) -> BackendResult<()> {
        let cmd = self.command_buffer(slot)?;
        unsafe {
            self.device
                .cmd_dispatch(cmd, groups[0], groups[1], groups[2]);
        }
        Ok(())
    }
}
