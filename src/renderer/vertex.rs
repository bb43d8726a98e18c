//! Vertex types for 2D rendering

use bytemuck::{Pod, Zeroable};

/// Simple 2D vertex with position and color
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub const fn new(x: f32, y: f32, color: [f32; 4]) -> Self {
        Self {
            position: [x, y],
            color,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Colors for field elements
pub mod colors {
    pub const BACKGROUND: [f32; 4] = [0.05, 0.07, 0.12, 1.0];
    pub const PEG: [f32; 4] = [0.85, 0.88, 0.95, 1.0];
    pub const BALL: [f32; 4] = [1.0, 0.55, 0.2, 1.0];
    pub const WALL: [f32; 4] = [0.15, 0.18, 0.26, 1.0];
    /// Bucket at the table's smallest multiplier
    pub const BUCKET_COLD: [f32; 4] = [0.95, 0.8, 0.2, 1.0];
    /// Bucket at the table's largest multiplier
    pub const BUCKET_HOT: [f32; 4] = [0.9, 0.15, 0.25, 1.0];
    pub const HOVER: [f32; 4] = [1.0, 1.0, 1.0, 0.25];
    pub const FLASH: [f32; 4] = [1.0, 1.0, 1.0, 0.6];

    /// High contrast palette
    pub mod contrast {
        pub const BACKGROUND: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
        pub const PEG: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
        pub const BALL: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
        pub const WALL: [f32; 4] = [0.6, 0.6, 0.6, 1.0];
        pub const BUCKET_COLD: [f32; 4] = [0.0, 0.8, 1.0, 1.0];
        pub const BUCKET_HOT: [f32; 4] = [1.0, 0.0, 1.0, 1.0];
    }
}
