//! Geometry, materials and their GPU counterparts.
//!
//! Geometry is kept on the CPU ([`MeshData`], [`LineData`], [`Material`]) so the
//! scene graph can be built and inspected without a device. The renderer turns
//! each of them into a [`GpuMesh`] / [`GpuLine`] the first time it sees them.

use std::sync::Arc;

use cgmath::InnerSpace;
use wgpu::util::DeviceExt;

use crate::data_structures::texture::Texture;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Linear RGBA colour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const WHITE: Color = Color([1.0, 1.0, 1.0, 1.0]);

    /// Converts a `0xRRGGBB` sRGB value (CSS style) into linear space.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
        Color([channel(16), channel(8), channel(0), 1.0])
    }

    pub fn rgb(&self) -> [f32; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Surface appearance of a mesh or line.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub color: Color,
    /// Base colour texture, multiplied with `color`.
    pub texture: Option<Arc<image::RgbaImage>>,
    /// Unlit materials ignore the scene light.
    pub lit: bool,
    /// Drawn from both sides instead of culling back faces.
    pub double_sided: bool,
    /// Texture coordinate set `texture` is sampled with.
    pub uv_set: u32,
}

impl Material {
    /// Flat, unlit colour.
    pub fn basic(hex: u32) -> Self {
        Self {
            name: format!("basic #{hex:06x}"),
            color: Color::from_hex(hex),
            texture: None,
            lit: false,
            double_sided: false,
            uv_set: 0,
        }
    }

    /// Colour shaded by the scene light.
    pub fn standard(name: &str, color: Color, texture: Option<Arc<image::RgbaImage>>) -> Self {
        Self {
            name: name.to_string(),
            color,
            texture,
            lit: true,
            double_sided: false,
            uv_set: 0,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::standard("default", Color::WHITE, None)
    }
}

/// Indexed triangle list sharing one material.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl Primitive {
    /**
     * Replaces all normals by the area-weighted average of the adjacent face normals.
     * Used when an asset ships without a NORMAL attribute.
     */
    pub fn compute_normals(&mut self) {
        let mut normals = vec![cgmath::Vector3::new(0.0f32, 0.0, 0.0); self.vertices.len()];
        for c in self.indices.chunks_exact(3) {
            let (a, b, d) = (c[0] as usize, c[1] as usize, c[2] as usize);
            if a >= normals.len() || b >= normals.len() || d >= normals.len() {
                continue;
            }
            let p0: cgmath::Vector3<f32> = self.vertices[a].position.into();
            let p1: cgmath::Vector3<f32> = self.vertices[b].position.into();
            let p2: cgmath::Vector3<f32> = self.vertices[d].position.into();
            let face = (p1 - p0).cross(p2 - p0);
            normals[a] += face;
            normals[b] += face;
            normals[d] += face;
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            if normal.magnitude2() > 0.0 {
                vertex.normal = normal.normalize().into();
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshData {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

impl MeshData {
    /// Axis-aligned box centred on the origin, 24 vertices so every face has its own normal.
    pub fn cuboid(width: f32, height: f32, depth: f32, material: Material) -> Self {
        let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);
        // normal, then the four corners counter-clockwise seen from outside
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([1.0, 0.0, 0.0], [[x, -y, z], [x, -y, -z], [x, y, -z], [x, y, z]]),
            ([-1.0, 0.0, 0.0], [[-x, -y, -z], [-x, -y, z], [-x, y, z], [-x, y, -z]]),
            ([0.0, 1.0, 0.0], [[-x, y, z], [x, y, z], [x, y, -z], [-x, y, -z]]),
            ([0.0, -1.0, 0.0], [[-x, -y, -z], [x, -y, -z], [x, -y, z], [-x, -y, z]]),
            ([0.0, 0.0, 1.0], [[-x, -y, z], [x, -y, z], [x, y, z], [-x, y, z]]),
            ([0.0, 0.0, -1.0], [[x, -y, -z], [-x, -y, -z], [-x, y, -z], [x, y, -z]]),
        ];
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in faces {
            let base = vertices.len() as u32;
            for (position, tex_coords) in corners.into_iter().zip(uvs) {
                vertices.push(ModelVertex {
                    position,
                    tex_coords,
                    normal,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self {
            name: "box".to_string(),
            primitives: vec![Primitive {
                vertices,
                indices,
                material,
            }],
        }
    }
}

/// Connected polyline: segments between consecutive points, not closed implicitly.
#[derive(Clone, Debug)]
pub struct LineData {
    pub points: Vec<[f32; 3]>,
    pub material: Material,
}

impl LineData {
    pub fn from_points(points: Vec<[f32; 3]>, material: Material) -> Self {
        Self { points, material }
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }
}

/// Material parameters as stored in the uniform buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    color: [f32; 4],
    // x: 1.0 when lit, the rest is padding to keep 16 byte alignment
    params: [f32; 4],
}

impl From<&Material> for MaterialUniform {
    fn from(material: &Material) -> Self {
        Self {
            color: material.color.0,
            params: [if material.lit { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

pub struct GpuMaterial {
    #[allow(unused)]
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl GpuMaterial {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        material: &Material,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material Buffer", material.name)),
            contents: bytemuck::cast_slice(&[MaterialUniform::from(material)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let texture = match &material.texture {
            Some(img) => Texture::from_rgba(device, queue, img, Some(&material.name)),
            None => Texture::create_white(device, queue),
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
            label: Some(&material.name),
        });
        Self { buffer, bind_group }
    }
}

pub struct GpuPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material: GpuMaterial,
    pub double_sided: bool,
}

pub struct GpuMesh {
    pub primitives: Vec<GpuPrimitive>,
}

impl GpuMesh {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        mesh: &MeshData,
    ) -> Self {
        let primitives = mesh
            .primitives
            .iter()
            .filter(|primitive| !primitive.indices.is_empty())
            .map(|primitive| {
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
                    contents: bytemuck::cast_slice(&primitive.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{:?} Index Buffer", mesh.name)),
                    contents: bytemuck::cast_slice(&primitive.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                GpuPrimitive {
                    vertex_buffer,
                    index_buffer,
                    num_elements: primitive.indices.len() as u32,
                    material: GpuMaterial::new(device, queue, layout, &primitive.material),
                    double_sided: primitive.material.double_sided,
                }
            })
            .collect();
        Self { primitives }
    }
}

pub struct GpuLine {
    pub vertex_buffer: wgpu::Buffer,
    pub num_vertices: u32,
    pub material: GpuMaterial,
}

impl GpuLine {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        line: &LineData,
    ) -> Self {
        let vertices: Vec<ModelVertex> = line
            .points
            .iter()
            .map(|&position| ModelVertex {
                position,
                ..Default::default()
            })
            .collect();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Line Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            vertex_buffer,
            num_vertices: vertices.len() as u32,
            material: GpuMaterial::new(device, queue, layout, &line.material),
        }
    }
}

/// Draw helpers on a render pass; the matching pipeline must already be set.
pub trait DrawModel {
    fn draw_primitive(
        &mut self,
        primitive: &GpuPrimitive,
        transform: &wgpu::Buffer,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
    );

    fn draw_line(
        &mut self,
        line: &GpuLine,
        transform: &wgpu::Buffer,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
    );
}

impl DrawModel for wgpu::RenderPass<'_> {
    fn draw_primitive(
        &mut self,
        primitive: &GpuPrimitive,
        transform: &wgpu::Buffer,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
        self.set_vertex_buffer(1, transform.slice(..));
        self.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &primitive.material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, light_bind_group, &[]);
        self.draw_indexed(0..primitive.num_elements, 0, 0..1);
    }

    fn draw_line(
        &mut self,
        line: &GpuLine,
        transform: &wgpu::Buffer,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, line.vertex_buffer.slice(..));
        self.set_vertex_buffer(1, transform.slice(..));
        self.set_bind_group(0, &line.material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, light_bind_group, &[]);
        self.draw(0..line.num_vertices, 0..1);
    }
}
