//! Resource management
//!
//! Image kinds, their layout states, multi-buffered resource sets and
//! attachment groups.

mod attachment;
mod bounded;
mod image;
mod layout;
mod resource_set;

pub use attachment::*;
pub use bounded::*;
pub use image::*;
pub use layout::*;
pub use resource_set::*;
