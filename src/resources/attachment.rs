//! Attachment groups describing the render targets of one render pass

use ash::vk;

use crate::error::{GraphError, GraphResult};
use crate::resources::bounded::BoundedVec;
use crate::resources::image::{CubeTarget, GpuImage, ResourceKind};
use crate::resources::resource_set::ResourceSet;

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    pub fn to_vk(self) -> vk::ClearValue {
        match self {
            ClearValue::Color(float32) => vk::ClearValue {
                color: vk::ClearColorValue { float32 },
            },
            ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
        }
    }
}

/// One attachment slot, referring to a registry resource by name
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Attachment name. Cube faces are named `{resource}_{face}`.
    pub name: String,
    pub resource: String,
    pub kind: ResourceKind,
    pub face: Option<u32>,
    pub clear_value: ClearValue,
    /// Clear on load
    pub clear: bool,
    /// Keep contents after the pass
    pub store: bool,
}

/// Fixed-size list of attachments for one render pass
#[derive(Debug, Clone)]
pub struct AttachmentGroup {
    attachments: BoundedVec<Attachment>,
    extent: vk::Extent2D,
}

impl AttachmentGroup {
    pub fn new(capacity: usize, width: u32, height: u32) -> Self {
        Self {
            attachments: BoundedVec::new("attachment group", capacity),
            extent: vk::Extent2D { width, height },
        }
    }

    /// Add every copy of `set` as one attachment slot.
    ///
    /// Cube targets take six slots, one per face.
    pub fn add_attachment<T: GpuImage>(
        &mut self,
        set: &ResourceSet<T>,
        clear_value: ClearValue,
        clear: bool,
        store: bool,
    ) -> GraphResult<()> {
        if T::KIND == ResourceKind::LoadedImage {
            return Err(GraphError::InvalidAttachment(set.name().to_string()));
        }

        if T::KIND == ResourceKind::CubeTarget {
            self.attachments
                .reserve_exact(CubeTarget::FACES as usize)?;
            for face in 0..CubeTarget::FACES {
                self.attachments.push(Attachment {
                    name: format!("{}_{}", set.name(), face),
                    resource: set.name().to_string(),
                    kind: T::KIND,
                    face: Some(face),
                    clear_value,
                    clear,
                    store,
                })?;
            }
        } else {
            self.attachments.push(Attachment {
                name: set.name().to_string(),
                resource: set.name().to_string(),
                kind: T::KIND,
                face: None,
                clear_value,
                clear,
                store,
            })?;
        }

        log::trace!(
            "attachment group: added '{}' ({} of {})",
            set.name(),
            self.attachments.len(),
            self.attachments.capacity()
        );
        Ok(())
    }

    pub fn attachment_id(&self, name: &str) -> GraphResult<usize> {
        self.attachments
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| GraphError::AttachmentNotFound(name.to_string()))
    }

    pub fn depth_index(&self) -> Option<usize> {
        self.attachments
            .iter()
            .position(|a| a.kind == ResourceKind::DepthTarget)
    }

    /// Every slot must be populated before the pass is built
    pub fn validate_full(&self) -> GraphResult<()> {
        if self.attachments.remaining() != 0 {
            return Err(GraphError::IncompleteAttachments {
                expected: self.attachments.capacity(),
                actual: self.attachments.len(),
            });
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Attachment> {
        self.attachments.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter()
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn clear_values(&self) -> Vec<vk::ClearValue> {
        self.attachments
            .iter()
            .map(|a| a.clear_value.to_vk())
            .collect()
    }

    pub fn should_clear(&self, index: usize) -> bool {
        self.attachments.get(index).is_some_and(|a| a.clear)
    }

    pub fn should_store(&self, index: usize) -> bool {
        self.attachments.get(index).is_some_and(|a| a.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::image::{ColorTarget, DepthTarget, LoadedImage};

    const BLACK: ClearValue = ClearValue::Color([0.0, 0.0, 0.0, 1.0]);

    fn color_set(name: &str) -> ResourceSet<ColorTarget> {
        ResourceSet::from_fn(name, 2, || {
            ColorTarget::new(8, 8, vk::Format::R8G8B8A8_UNORM)
        })
    }

    #[test]
    fn test_attachment_lookup() {
        let mut group = AttachmentGroup::new(3, 8, 8);
        group
            .add_attachment(&color_set("albedo"), BLACK, true, true)
            .unwrap();
        group
            .add_attachment(&color_set("normals"), BLACK, true, false)
            .unwrap();
        let depth = ResourceSet::from_fn("depth", 2, || {
            DepthTarget::new(8, 8, vk::Format::D32_SFLOAT)
        });
        group
            .add_attachment(
                &depth,
                ClearValue::DepthStencil {
                    depth: 1.0,
                    stencil: 0,
                },
                true,
                false,
            )
            .unwrap();

        assert_eq!(group.attachment_id("normals").unwrap(), 1);
        assert_eq!(group.depth_index(), Some(2));
        assert!(group.should_store(0));
        assert!(!group.should_store(1));
        assert_eq!(group.clear_values().len(), 3);
        group.validate_full().unwrap();

        assert!(matches!(
            group.attachment_id("albedo_typo"),
            Err(GraphError::AttachmentNotFound(_))
        ));
    }

    #[test]
    fn test_cube_adds_six_faces() {
        let mut group = AttachmentGroup::new(6, 16, 16);
        let cube = ResourceSet::from_fn("sky", 1, || {
            CubeTarget::new(16, vk::Format::R16G16B16A16_SFLOAT)
        });
        group.add_attachment(&cube, BLACK, true, true).unwrap();

        assert_eq!(group.len(), 6);
        assert_eq!(group.attachment_id("sky_0").unwrap(), 0);
        assert_eq!(group.attachment_id("sky_5").unwrap(), 5);
        assert_eq!(group.get(3).and_then(|a| a.face), Some(3));
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut group = AttachmentGroup::new(1, 8, 8);
        group
            .add_attachment(&color_set("a"), BLACK, true, true)
            .unwrap();
        assert!(matches!(
            group.add_attachment(&color_set("b"), BLACK, true, true),
            Err(GraphError::CapacityExceeded { capacity: 1, .. })
        ));

        // A cube never lands partially
        let mut group = AttachmentGroup::new(5, 8, 8);
        let cube = ResourceSet::from_fn("env", 1, || {
            CubeTarget::new(8, vk::Format::R8G8B8A8_UNORM)
        });
        assert!(group.add_attachment(&cube, BLACK, true, true).is_err());
        assert!(group.is_empty());
    }

    #[test]
    fn test_incomplete_and_invalid_attachments() {
        let mut group = AttachmentGroup::new(2, 8, 8);
        group
            .add_attachment(&color_set("a"), BLACK, true, true)
            .unwrap();
        assert!(matches!(
            group.validate_full(),
            Err(GraphError::IncompleteAttachments {
                expected: 2,
                actual: 1
            })
        ));

        let loaded = ResourceSet::from_fn("brick", 1, || {
            LoadedImage::from_rgba8("brick", 1, 1, vec![0; 4])
        });
        assert!(matches!(
            group.add_attachment(&loaded, BLACK, false, true),
            Err(GraphError::InvalidAttachment(name)) if name == "brick"
        ));
    }
}
