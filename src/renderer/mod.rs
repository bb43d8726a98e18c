//! WebGPU rendering module
//!
//! The scene is rebuilt as a flat triangle list every frame and drawn in a
//! single pass.

pub mod pipeline;
pub mod scene;
pub mod shapes;
pub mod vertex;

pub use pipeline::RenderState;
pub use scene::{Palette, build_scene};
pub use vertex::Vertex;
