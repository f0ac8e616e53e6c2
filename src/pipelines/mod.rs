//! Render pipelines.
//!
//! - `basic` builds the mesh (triangle list) and line (line strip) pipelines
//!   sharing `mesh.wgsl` and the material bind group layout
//! - `light` holds the directional light uniform and its bindings
//!
//! Meshes get one pipeline per [`Facing`]: culling is off for double-sided
//! materials and the front face flips for mirrored world transforms.

pub mod basic;
pub mod light;

/// How the triangles of one draw are culled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Facing {
    pub double_sided: bool,
    pub mirrored: bool,
}

impl Facing {
    pub const ALL: [Facing; 4] = [
        Facing::new(false, false),
        Facing::new(false, true),
        Facing::new(true, false),
        Facing::new(true, true),
    ];

    pub const fn new(double_sided: bool, mirrored: bool) -> Self {
        Self {
            double_sided,
            mirrored,
        }
    }

    fn index(self) -> usize {
        ((self.double_sided as usize) << 1) | self.mirrored as usize
    }

    pub fn cull_mode(self) -> Option<wgpu::Face> {
        if self.double_sided {
            None
        } else {
            Some(wgpu::Face::Back)
        }
    }

    pub fn front_face(self) -> wgpu::FrontFace {
        if self.mirrored {
            wgpu::FrontFace::Cw
        } else {
            wgpu::FrontFace::Ccw
        }
    }
}

/// All pipelines the renderer batches draws into.
#[derive(Debug)]
pub struct Pipelines {
    meshes: [wgpu::RenderPipeline; 4],
    pub line: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        material_layout: &wgpu::BindGroupLayout,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        light_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let layout = basic::mk_layout(
            device,
            material_layout,
            camera_bind_group_layout,
            light_bind_group_layout,
        );
        Self {
            meshes: Facing::ALL.map(|facing| basic::mk_mesh_pipeline(device, format, &layout, facing)),
            line: basic::mk_line_pipeline(device, format, &layout),
        }
    }

    pub fn mesh(&self, facing: Facing) -> &wgpu::RenderPipeline {
        &self.meshes[facing.index()]
    }
}
