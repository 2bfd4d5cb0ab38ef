//! Render Graph System
//!
//! A tree of render and compute nodes sharing named image resources. The
//! graph records which node produced each resource and which nodes consume
//! it, tracks every buffered copy's layout and emits the barriers between
//! producer and consumer before each node records.

pub mod barrier;
pub mod compute_node;
pub mod graph;
pub mod node;
pub mod registry;

pub use barrier::{ImageBarrier, LayoutTransition};
pub use compute_node::*;
pub use graph::*;
pub use node::*;
pub use registry::*;
