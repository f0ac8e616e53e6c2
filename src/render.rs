//! Drawing the scene graph.
//!
//! The [`Renderer`] owns the device-side state that does not depend on a
//! surface: pipelines, camera and light uniforms, the depth buffer and a GPU
//! mirror of the scene graph. Because the graph only grows, the mirror is kept
//! in step by uploading the roots it has not seen yet on every frame.
//!
//! Each frame the visible entities are walked once and sorted into batches per
//! pipeline ([`Batches`]): meshes grouped by [`Facing`], then lines, then text.

use cgmath::{Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    camera::{Camera, CameraResources, Projection},
    data_structures::{
        model::{DrawModel, GpuLine, GpuMesh, GpuPrimitive},
        scene_graph::{Entity, Renderable, SceneGraph},
        texture::Texture,
        transform::{self, TransformRaw},
    },
    pipelines::{
        Facing, Pipelines, basic,
        light::{LightResources, LightUniform},
    },
    text::TextLabel,
};
#[cfg(feature = "ui")]
use crate::text;

enum GpuRenderable {
    Mesh(GpuMesh),
    Line(GpuLine),
    None,
}

/// GPU counterpart of an [`Entity`], same shape as the CPU tree.
struct GpuEntity {
    renderable: GpuRenderable,
    transform: wgpu::Buffer,
    children: Vec<GpuEntity>,
}

impl GpuEntity {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
        entity: &Entity,
    ) -> Self {
        let renderable = match &entity.renderable {
            Renderable::Mesh(mesh) => {
                GpuRenderable::Mesh(GpuMesh::new(device, queue, material_layout, mesh))
            }
            Renderable::Line(line) if line.points.len() > 1 => {
                GpuRenderable::Line(GpuLine::new(device, queue, material_layout, line))
            }
            _ => GpuRenderable::None,
        };
        let transform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Transform Buffer", entity.name)),
            contents: bytemuck::cast_slice(&[entity.transform.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let children = entity
            .children
            .iter()
            .map(|child| GpuEntity::new(device, queue, material_layout, child))
            .collect();
        Self {
            renderable,
            transform,
            children,
        }
    }
}

/// Draw calls of one frame, sorted by pipeline.
#[derive(Default)]
struct Batches<'a> {
    meshes: Vec<(Facing, &'a GpuPrimitive, &'a wgpu::Buffer)>,
    lines: Vec<(&'a GpuLine, &'a wgpu::Buffer)>,
    labels: Vec<(&'a TextLabel, cgmath::Vector3<f32>)>,
}

impl<'a> Batches<'a> {
    /// Writes the world transform of every visible node and files it into its batch.
    fn collect(
        &mut self,
        queue: &wgpu::Queue,
        entity: &'a Entity,
        gpu: &'a GpuEntity,
        parent: &Matrix4<f32>,
    ) {
        if !entity.visible {
            return;
        }
        let world = parent * entity.transform.to_matrix();
        match (&gpu.renderable, &entity.renderable) {
            (GpuRenderable::Mesh(mesh), _) => {
                Self::write_transform(queue, &gpu.transform, world);
                let mirrored = transform::is_mirrored(&world);
                for primitive in &mesh.primitives {
                    let facing = Facing::new(primitive.double_sided, mirrored);
                    self.meshes.push((facing, primitive, &gpu.transform));
                }
            }
            (GpuRenderable::Line(line), _) => {
                Self::write_transform(queue, &gpu.transform, world);
                self.lines.push((line, &gpu.transform));
            }
            (GpuRenderable::None, Renderable::Text(label)) => {
                self.labels.push((label, transform::world_position(&world)));
            }
            _ => (),
        }
        for (child, gpu_child) in entity.children.iter().zip(&gpu.children) {
            self.collect(queue, child, gpu_child, &world);
        }
    }

    fn write_transform(queue: &wgpu::Queue, buffer: &wgpu::Buffer, world: Matrix4<f32>) {
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[TransformRaw::from(world)]));
    }
}

pub struct Renderer {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub format: wgpu::TextureFormat,
    pub clear_color: wgpu::Color,
    size: (u32, u32),
    depth_texture: Texture,
    camera: CameraResources,
    light: LightResources,
    material_layout: wgpu::BindGroupLayout,
    pipelines: Pipelines,
    entities: Vec<GpuEntity>,
    #[cfg(feature = "ui")]
    text: text::TextOverlay,
}

impl Renderer {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        (width, height): (u32, u32),
        camera: &Camera,
        projection: &Projection,
    ) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let depth_texture = Texture::create_depth_texture(&device, [width, height], "depth_texture");
        let camera = CameraResources::new(&device, camera, projection);
        let light = LightResources::new(&device);
        let material_layout = basic::material_layout(&device);
        let pipelines = Pipelines::new(
            &device,
            format,
            &material_layout,
            &camera.bind_group_layout,
            &light.bind_group_layout,
        );
        #[cfg(feature = "ui")]
        let text = text::TextOverlay::new(&device, &queue, format);

        Self {
            device,
            queue,
            format,
            clear_color: wgpu::Color::BLACK,
            size: (width, height),
            depth_texture,
            camera,
            light,
            material_layout,
            pipelines,
            entities: Vec::new(),
            #[cfg(feature = "ui")]
            text,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
    }

    /// Uploads roots appended to `scene` since the last call.
    pub fn sync(&mut self, scene: &SceneGraph) {
        for entity in &scene.entities()[self.entities.len().min(scene.len())..] {
            log::debug!("uploading entity {:?}", entity.name);
            self.entities.push(GpuEntity::new(
                &self.device,
                &self.queue,
                &self.material_layout,
                entity,
            ));
        }
    }

    /// Draws the visible part of `scene` into `view`, which must match the renderer size and format.
    pub fn render_to(
        &mut self,
        view: &wgpu::TextureView,
        scene: &SceneGraph,
        camera: &Camera,
        projection: &Projection,
    ) {
        self.sync(scene);
        self.camera.write(&self.queue, camera, projection);
        let light = match scene.light() {
            Some((light, position)) => LightUniform::from_light(&light, position),
            None => LightUniform::dark(),
        };
        self.light.write(&self.queue, light);

        let mut batches = Batches::default();
        for (entity, gpu) in scene.entities().iter().zip(&self.entities) {
            batches.collect(&self.queue, entity, gpu, &Matrix4::identity());
        }
        batches.meshes.sort_by_key(|(facing, _, _)| *facing);

        #[cfg(feature = "ui")]
        let has_text = {
            let view_proj = projection.calc_matrix() * camera.calc_matrix();
            let (width, height) = self.size;
            let labels: Vec<_> = batches
                .labels
                .iter()
                .filter_map(|(label, position)| {
                    text::project_label(
                        *position,
                        label.font_size,
                        &view_proj,
                        projection.fovy(),
                        width,
                        height,
                    )
                    .map(|placement| (*label, placement))
                })
                .collect();
            match self
                .text
                .prepare(&self.device, &self.queue, &labels, width, height)
            {
                Ok(()) => !labels.is_empty(),
                Err(e) => {
                    log::warn!("failed to prepare text: {}", e);
                    false
                }
            }
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            let mut current = None;
            for (facing, primitive, transform) in batches.meshes {
                if current != Some(facing) {
                    render_pass.set_pipeline(self.pipelines.mesh(facing));
                    current = Some(facing);
                }
                render_pass.draw_primitive(
                    primitive,
                    transform,
                    &self.camera.bind_group,
                    &self.light.bind_group,
                );
            }

            render_pass.set_pipeline(&self.pipelines.line);
            for (line, transform) in batches.lines {
                render_pass.draw_line(
                    line,
                    transform,
                    &self.camera.bind_group,
                    &self.light.bind_group,
                );
            }

            #[cfg(feature = "ui")]
            if has_text {
                if let Err(e) = self.text.render(&mut render_pass) {
                    log::warn!("failed to render text: {}", e);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        #[cfg(feature = "ui")]
        self.text.trim();
    }
}
