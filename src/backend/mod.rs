//! Backend abstraction layer
//!
//! Provides the device and command recorder traits the render graph drives,
//! a Vulkan implementation and a dummy implementation for tests.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod vulkan;

pub use dummy::{DummyCommandRecorder, DummyDevice, RecordedCommand};
pub use traits::*;
pub use types::*;
pub use vulkan::{VulkanCommandRecorder, VulkanDevice};
