//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It hands out fake
//! handles, keeps count of live images and records every command into a
//! per-slot list so traversals can be checked without GPU hardware.

use std::collections::HashMap;

use ash::vk;
use ash::vk::Handle;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::barrier::ImageBarrier;

/// Dummy device.
#[derive(Debug)]
pub struct DummyDevice {
    families: QueueFamilyIndices,
    next_id: u64,
    live: HashMap<u64, ImageDesc>,
    created: Vec<ImageDesc>,
    destroyed: usize,
    uploads: usize,
}

impl DummyDevice {
    /// Create a device with graphics and compute on family 0.
    pub fn new() -> Self {
        Self::with_queue_families(QueueFamilyIndices::unified(0))
    }

    pub fn with_queue_families(families: QueueFamilyIndices) -> Self {
        Self {
            families,
            next_id: 1,
            live: HashMap::new(),
            created: Vec::new(),
            destroyed: 0,
            uploads: 0,
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    /// Number of images created and not yet destroyed
    pub fn live_images(&self) -> usize {
        self.live.len()
    }

    pub fn destroyed_images(&self) -> usize {
        self.destroyed
    }

    /// Number of successful pixel uploads
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    /// Descriptors of every image ever created, in creation order
    pub fn created_images(&self) -> &[ImageDesc] {
        &self.created
    }

    pub fn is_live(&self, image: &ImageHandle) -> bool {
        self.live.contains_key(&image.id)
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for DummyDevice {
    fn queue_family_indices(&self) -> QueueFamilyIndices {
        self.families
    }

    fn create_image(&mut self, desc: &ImageDesc) -> BackendResult<ImageHandle> {
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 {
            return Err(BackendError::ImageCreationFailed(format!(
                "'{}' has a zero extent",
                desc.label
            )));
        }

        let id = self.next_id;
        self.next_id += 1;
        log::trace!(
            "DummyDevice: creating image '{}' ({}x{}x{}, {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.depth,
            desc.format
        );

        self.live.insert(id, desc.clone());
        self.created.push(desc.clone());
        Ok(ImageHandle {
            id,
            image: vk::Image::from_raw(id),
            view: vk::ImageView::from_raw(id),
        })
    }

    fn upload_image(
        &mut self,
        image: &ImageHandle,
        desc: &ImageDesc,
        pixels: &[u8],
    ) -> BackendResult<()> {
        if !self.live.contains_key(&image.id) {
            return Err(BackendError::UploadFailed(format!(
                "'{}' is not a live image",
                desc.label
            )));
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::UploadFailed(format!(
                "'{}' has an empty extent",
                desc.label
            )));
        }
        if !desc.host_visible {
            return Err(BackendError::UploadFailed(format!(
                "'{}' is not host visible",
                desc.label
            )));
        }
        let expected = desc.width as usize * desc.height as usize * 4;
        if pixels.len() != expected {
            return Err(BackendError::UploadFailed(format!(
                "'{}' expects {} bytes, got {}",
                desc.label,
                expected,
                pixels.len()
            )));
        }

        log::trace!("DummyDevice: uploading {} bytes to '{}'", pixels.len(), desc.label);
        self.uploads += 1;
        Ok(())
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        match self.live.remove(&image.id) {
            Some(desc) => {
                log::trace!("DummyDevice: destroying image '{}'", desc.label);
                self.destroyed += 1;
            }
            None => log::warn!("DummyDevice: image {} destroyed twice", image.id),
        }
    }
}

/// A command captured by [`DummyCommandRecorder`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    Barrier(ImageBarrier),
    BindComputePipeline(vk::Pipeline),
    Dispatch([u32; 3]),
}

/// Command recorder that stores commands instead of submitting them
#[derive(Debug)]
pub struct DummyCommandRecorder {
    slots: Vec<Vec<RecordedCommand>>,
}

impl DummyCommandRecorder {
    /// One command list per frame slot
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            slots: vec![Vec::new(); frames_in_flight],
        }
    }

    pub fn commands(&self, slot: usize) -> &[RecordedCommand] {
        self.slots.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    /// Barriers recorded into `slot`, in order
    pub fn barriers(&self, slot: usize) -> Vec<&ImageBarrier> {
        self.commands(slot)
            .iter()
            .filter_map(|command| match command {
                RecordedCommand::Barrier(barrier) => Some(barrier),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded into `slot`, like resetting its command buffer
    pub fn reset(&mut self, slot: usize) {
        if let Some(commands) = self.slots.get_mut(slot) {
            commands.clear();
        }
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(Vec::clear);
    }

    fn push(&mut self, slot: usize, command: RecordedCommand) -> BackendResult<()> {
        let commands = self
            .slots
            .get_mut(slot)
            .ok_or(BackendError::MissingCommandBuffer(slot))?;
        commands.push(command);
        Ok(())
    }
}

impl CommandRecorder for DummyCommandRecorder {
    fn pipeline_barrier(&mut self, slot: usize, barrier: &ImageBarrier) -> BackendResult<()> {
        self.push(slot, RecordedCommand::Barrier(barrier.clone()))
    }

    fn bind_compute_pipeline(
        &mut self,
        slot: usize,
        pipeline: vk::Pipeline,
    ) -> BackendResult<()> {
        self.push(slot, RecordedCommand::BindComputePipeline(pipeline))
    }

    fn dispatch(&mut self, slot: usize, groups: [u32; 3]) -> BackendResult<()> {
        log::trace!("DummyCommandRecorder: dispatch {:?} (slot {})", groups, slot);
        self.push(slot, RecordedCommand::Dispatch(groups))
    }
}
