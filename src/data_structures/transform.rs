//! Entity transformation data for GPU rendering.
//!
//! Every scene entity carries a local [`Transform`]. World transforms are
//! composed on the CPU each frame as full matrices (`parent * local`) and
//! uploaded as a single-instance vertex buffer, see [`TransformRaw`].

use cgmath::{Matrix, Matrix3, Matrix4, One, Rotation3, SquareMatrix};

use crate::data_structures::model;

/// Position, rotation (as quaternion) and scale of an entity relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_position(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: cgmath::Vector3::new(x, y, z),
            ..Self::new()
        }
    }

    /// Rotates around the local Y axis, composing with the current rotation.
    pub fn rotate_y(&mut self, angle: impl Into<cgmath::Rad<f32>>) {
        self.rotation =
            self.rotation * cgmath::Quaternion::from_axis_angle(cgmath::Vector3::unit_y(), angle);
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> TransformRaw {
        TransformRaw::from(self.to_matrix())
    }
}

fn linear_part(world: &Matrix4<f32>) -> Matrix3<f32> {
    Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate())
}

/// Translation column of a world matrix.
pub fn world_position(world: &Matrix4<f32>) -> cgmath::Vector3<f32> {
    world.w.truncate()
}

/// Whether `world` flips handedness, which turns counter-clockwise faces clockwise on screen.
pub fn is_mirrored(world: &Matrix4<f32>) -> bool {
    linear_part(world).determinant() < 0.0
}

impl From<cgmath::Vector3<f32>> for Transform {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw transform is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

impl From<Matrix4<f32>> for TransformRaw {
    /// Normals use the inverse transpose so they stay perpendicular under non-uniform scale.
    fn from(world: Matrix4<f32>) -> Self {
        let linear = linear_part(&world);
        // degenerate (zero scale) nodes draw nothing visible anyway
        let normal = linear.invert().map(|m| m.transpose()).unwrap_or(linear);
        TransformRaw {
            model: world.into(),
            normal: normal.into(),
        }
    }
}

/**
 * Stride layout here: position + rotation + scale as 4x4 matrix (hence the four 4d vectors)
 * followed by the 3x3 normal matrix.
 */
impl model::Vertex for TransformRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<TransformRaw>() as wgpu::BufferAddress,
            // Step once per instance; every entity is drawn as a single instance
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // A mat4 takes up 4 vertex slots as it is technically 4 vec4s.
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}
