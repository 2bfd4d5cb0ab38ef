//! Multi-buffered resources with per-frame layout transition queues

use std::collections::VecDeque;
use std::ops::{Index, IndexMut};

use crate::backend::traits::Device;
use crate::error::{GraphError, GraphResult};
use crate::resources::image::GpuImage;
use crate::resources::layout::{ImageLayout, UsageType};

/// One logical resource with a buffered copy per frame in flight.
///
/// Every access recorded against the set during graph build appends the
/// target layout to an access log. At the start of each frame the log is
/// copied into the pending queue, and each dependent node pops exactly one
/// entry when its barriers are recorded, so two readers of the same set in
/// one frame each see their own target layout in request order.
#[derive(Debug, Clone)]
pub struct ResourceSet<T> {
    name: String,
    copies: Vec<T>,
    access_log: Vec<ImageLayout>,
    pending: VecDeque<ImageLayout>,
}

impl<T: GpuImage> ResourceSet<T> {
    pub fn new(name: &str, copies: Vec<T>) -> Self {
        Self {
            name: name.to_string(),
            copies,
            access_log: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Build `frames` copies with `factory`
    pub fn from_fn(name: &str, frames: usize, factory: impl FnMut() -> T) -> Self {
        let copies = std::iter::repeat_with(factory).take(frames).collect();
        Self::new(name, copies)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.copies.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.copies.get_mut(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.copies.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.copies.iter_mut()
    }

    /// Layout the copies need for `usage`. All copies share one kind.
    pub fn usage_layout(&self, usage: UsageType) -> Option<ImageLayout> {
        self.copies.first().map(|copy| copy.usage_layout(usage))
    }

    /// Set both the original and current layout of every copy
    pub fn set_layouts(&mut self, layout: ImageLayout) {
        for copy in &mut self.copies {
            copy.set_original_layout(layout);
            copy.set_current_layout(layout);
        }
    }

    /// Queue the layout `usage` requires and remember it for later frames
    pub fn log_transition(&mut self, usage: UsageType) -> ImageLayout {
        let layout = self.usage_layout(usage).unwrap_or_default();
        self.log_layout(layout);
        layout
    }

    pub(crate) fn log_layout(&mut self, layout: ImageLayout) {
        self.access_log.push(layout);
        self.pending.push_back(layout);
    }

    /// Oldest pending target layout
    pub fn current_transition(&self) -> Option<ImageLayout> {
        self.pending.front().copied()
    }

    pub fn pop_transition(&mut self) -> GraphResult<ImageLayout> {
        self.pending
            .pop_front()
            .ok_or_else(|| GraphError::TransitionQueueEmpty(self.name.clone()))
    }

    pub fn pending_transitions(&self) -> usize {
        self.pending.len()
    }

    /// Re-arm the pending queue with every access recorded so far
    pub fn begin_frame(&mut self) {
        self.pending.clear();
        self.pending.extend(self.access_log.iter().copied());
    }

    /// Restore one copy's tracked layout to its original layout
    pub fn reset_image_layout(&mut self, slot: usize) -> GraphResult<()> {
        let frames = self.copies.len();
        let copy = self
            .copies
            .get_mut(slot)
            .ok_or(GraphError::InvalidFrameSlot { slot, frames })?;
        copy.reset_layout();
        Ok(())
    }

    pub fn create(&mut self, device: &mut dyn Device) -> GraphResult<()> {
        for copy in &mut self.copies {
            copy.create(device)?;
        }
        Ok(())
    }

    pub fn destroy(&mut self, device: &mut dyn Device) {
        for copy in &mut self.copies {
            copy.destroy(device);
        }
    }
}

impl<T> Index<usize> for ResourceSet<T> {
    type Output = T;

    fn index(&self, slot: usize) -> &T {
        &self.copies[slot]
    }
}

impl<T> IndexMut<usize> for ResourceSet<T> {
    fn index_mut(&mut self, slot: usize) -> &mut T {
        &mut self.copies[slot]
    }
}
