#![allow(dead_code)]

use std::path::Path;

use cgmath::Point3;
use orbit_viewer::{
    camera::{Camera, Projection},
    data_structures::scene_graph::SceneGraph,
    flow::FrameTarget,
};

/// glTF primitive modes used by the fixtures.
pub const TRIANGLES: u32 = 4;
pub const LINES: u32 = 1;

/// Byte length of [`triangle_bin`] before padding.
const BIN_LEN: usize = 42;

/// Three positions followed by three u16 indices.
pub fn triangle_bin() -> Vec<u8> {
    let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let indices: [u16; 3] = [0, 1, 2];
    let mut bin = Vec::with_capacity(BIN_LEN);
    for position in positions {
        for c in position {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    for index in indices {
        bin.extend_from_slice(&index.to_le_bytes());
    }
    bin
}

/// One red triangle in a node translated by (0, 1, 0). No normals, so the loader computes them.
pub fn triangle_json(buffer_uri: Option<&str>, mode: u32) -> String {
    let uri = buffer_uri
        .map(|uri| format!(r#", "uri": "{}""#, uri))
        .unwrap_or_default();
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "name": "tri_scene", "nodes": [0] }}],
  "nodes": [{{ "name": "tri", "mesh": 0, "translation": [0.0, 1.0, 0.0] }}],
  "meshes": [{{
    "name": "tri_mesh",
    "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0, "mode": {mode} }}]
  }}],
  "materials": [{{ "name": "red", "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.0, 0.0, 1.0] }} }}],
  "buffers": [{{ "byteLength": {len}{uri} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
        mode = mode,
        len = BIN_LEN,
        uri = uri,
    )
}

/// The triangle packed as binary glTF with an embedded BIN chunk.
pub fn triangle_glb(mode: u32) -> Vec<u8> {
    let mut json = triangle_json(None, mode).into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = triangle_bin();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend(json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend(bin);
    glb
}

/// Writes `<dir>/<name>/scene.gltf` referencing `tri.bin` next to it. Returns the relative model path.
pub fn write_triangle_gltf(dir: &Path, name: &str) -> String {
    let model_dir = dir.join(name);
    std::fs::create_dir_all(&model_dir).unwrap();
    std::fs::write(model_dir.join("scene.gltf"), triangle_json(Some("tri.bin"), TRIANGLES)).unwrap();
    std::fs::write(model_dir.join("tri.bin"), triangle_bin()).unwrap();
    format!("{}/scene.gltf", name)
}

/// UVs of the textured fixture, set 0 and set 1.
pub const UV0: [[f32; 2]; 3] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
pub const UV1: [[f32; 2]; 3] = [[0.5, 0.5], [0.75, 0.5], [0.5, 0.75]];

/// A self-contained `.gltf`: base64 buffer and PNG image, a double-sided material
/// whose base colour texture reads UV set 1.
pub fn embedded_textured_gltf() -> String {
    use base64::Engine;

    let mut bin = Vec::new();
    for position in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        position.iter().for_each(|c| bin.extend_from_slice(&c.to_le_bytes()));
    }
    for uv in UV0.iter().chain(UV1.iter()) {
        uv.iter().for_each(|c| bin.extend_from_slice(&c.to_le_bytes()));
    }
    for index in [0u16, 1, 2] {
        bin.extend_from_slice(&index.to_le_bytes());
    }

    let mut png = std::io::Cursor::new(Vec::new());
    image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 255, 0, 255]))
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();

    let engine = base64::engine::general_purpose::STANDARD;
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scenes": [{{ "name": "leaf_scene", "nodes": [0] }}],
  "nodes": [{{ "name": "leaf", "mesh": 0 }}],
  "meshes": [{{
    "primitives": [{{
      "attributes": {{ "POSITION": 0, "TEXCOORD_0": 1, "TEXCOORD_1": 2 }},
      "indices": 3,
      "material": 0
    }}]
  }}],
  "materials": [{{
    "name": "leaf",
    "doubleSided": true,
    "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0, "texCoord": 1 }} }}
  }}],
  "textures": [{{ "source": 0 }}],
  "images": [{{ "uri": "data:image/png;base64,{png}" }}],
  "buffers": [{{ "byteLength": {len}, "uri": "data:application/octet-stream;base64,{bin}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 24, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 60, "byteLength": 24, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 84, "byteLength": 6, "target": 34963 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
        png = engine.encode(png.into_inner()),
        len = bin.len(),
        bin = engine.encode(&bin),
    )
}

/// Frame target that remembers the camera of every draw.
#[derive(Default)]
pub struct RecordingTarget {
    pub cameras: Vec<Point3<f32>>,
    pub fail_with: Option<String>,
}

impl FrameTarget for RecordingTarget {
    type Error = String;

    fn draw(
        &mut self,
        _scene: &SceneGraph,
        camera: &Camera,
        _projection: &Projection,
    ) -> Result<(), Self::Error> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        self.cameras.push(camera.position);
        Ok(())
    }
}

#[cfg(feature = "integration-tests")]
pub mod gpu {
    use std::time::Duration;

    use orbit_viewer::{
        camera::{Camera, Projection},
        context,
        data_structures::scene_graph::SceneGraph,
        render::Renderer,
    };

    pub const SIZE: u32 = 64;
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// A renderer without a window, or `None` on machines without any adapter.
    pub async fn headless_renderer(camera: &Camera, projection: &Projection) -> Option<Renderer> {
        let instance = context::instance();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;
        let (device, queue) = context::request_device(&adapter).await.ok()?;
        Some(Renderer::new(
            device,
            queue,
            FORMAT,
            (SIZE, SIZE),
            camera,
            projection,
        ))
    }

    /// Draws one frame off-screen and reads it back.
    pub async fn render_to_image(
        renderer: &mut Renderer,
        scene: &SceneGraph,
        camera: &Camera,
        projection: &Projection,
    ) -> image::RgbaImage {
        let u32_size = std::mem::size_of::<u32>() as u32;
        let extent = wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        };
        let texture = renderer.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        renderer.render_to(&view, scene, camera, projection);

        let output_buffer = renderer.device.create_buffer(&wgpu::BufferDescriptor {
            size: (u32_size * SIZE * SIZE) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: None,
            mapped_at_creation: false,
        });
        let mut encoder = renderer
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(u32_size * SIZE),
                    rows_per_image: Some(SIZE),
                },
            },
            extent,
        );
        renderer.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).unwrap();
        });
        renderer
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(3)),
            })
            .unwrap();
        rx.receive().await.unwrap().unwrap();
        let data = buffer_slice.get_mapped_range().to_vec();
        image::RgbaImage::from_raw(SIZE, SIZE, data).unwrap()
    }
}
