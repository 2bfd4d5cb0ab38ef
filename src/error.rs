//! Error types for graph construction and frame recording

use crate::backend::traits::BackendError;
use crate::render_graph::node::NodeId;
use crate::resources::ResourceKind;
use ash::vk;
use thiserror::Error;

/// Errors raised while building or recording a render graph.
///
/// Every variant except `ImageLoad` and `Backend` is a graph contract
/// violation: the graph description itself is malformed and retrying the
/// same call will fail again.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("resource '{0}' was requested for reading but no node has written it")]
    ResourceNotFound(String),
    #[error("resource '{name}' is a {actual}, it cannot be accessed as a {expected}")]
    KindMismatch {
        name: String,
        expected: ResourceKind,
        actual: ResourceKind,
    },
    #[error("{what} is full (capacity {capacity})")]
    CapacityExceeded { what: &'static str, capacity: usize },
    #[error("pipeline stage {stage:?} has no known {scope} access mask")]
    UnrecognizedStage {
        stage: vk::PipelineStageFlags,
        scope: &'static str,
    },
    #[error("resource '{0}' has no pending layout transition")]
    TransitionQueueEmpty(String),
    #[error(
        "graphics queue family {graphics} differs from compute queue family {compute}, \
         resources would need queue ownership transfers"
    )]
    QueueFamilyMismatch { graphics: u32, compute: u32 },
    #[error("frame slot {slot} is out of range ({frames} frames in flight)")]
    InvalidFrameSlot { slot: usize, frames: usize },
    #[error("node {0:?} does not exist in this graph")]
    UnknownNode(NodeId),
    #[error("the graph has no root node")]
    NoRoot,
    #[error("node {0:?} is already initialized, the tree below it is fixed")]
    AlreadyInitialized(NodeId),
    #[error("attachment '{0}' not found")]
    AttachmentNotFound(String),
    #[error("'{0}' cannot be used as an attachment, loaded images are pre-initialized")]
    InvalidAttachment(String),
    #[error("attachment group has {actual} of {expected} attachments")]
    IncompleteAttachments { expected: usize, actual: usize },
    #[error("failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type GraphResult<T> = Result<T, GraphError>;
