//! Camera-facing text labels.
//!
//! A [`TextLabel`] lives in the scene graph like any other entity. Each frame the
//! renderer projects the entity position into the viewport with
//! [`project_label`] and hands the visible labels to the [`TextOverlay`], which
//! draws them with glyphon at their projected depth, so nearer geometry hides them.

use cgmath::{Matrix4, Vector3, Vector4};

use crate::data_structures::model::Color;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Fixed text shown at an entity position. Sizes are in world units.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub font_size: f32,
    pub weight: FontWeight,
    pub color: Color,
    pub outline_color: Option<Color>,
}

impl TextLabel {
    pub fn new(text: &str, font_size: f32) -> Self {
        Self {
            text: text.to_string(),
            font_size,
            weight: FontWeight::Normal,
            color: Color::WHITE,
            outline_color: None,
        }
    }

    pub fn bold(mut self) -> Self {
        self.weight = FontWeight::Bold;
        self
    }

    pub fn with_color(mut self, hex: u32) -> Self {
        self.color = Color::from_hex(hex);
        self
    }

    pub fn with_outline(mut self, hex: u32) -> Self {
        self.outline_color = Some(Color::from_hex(hex));
        self
    }
}

/// Where a label lands on screen this frame: top-left anchor in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPlacement {
    pub x: f32,
    pub y: f32,
    pub pixel_size: f32,
    /// Normalized device depth of the anchor, `0.0` at the near plane.
    pub depth: f32,
}

/// Smallest size glyphs are rasterized at.
pub const MIN_PIXEL_SIZE: f32 = 1.0;

/// Outline thickness relative to the pixel size.
const OUTLINE_RATIO: f32 = 0.05;

/**
 * Projects a label anchored at `world` into a `width` x `height` viewport.
 *
 * `fovy` must be the vertical field of view `view_proj` was built with; it turns the
 * world-unit font size into pixels at the label's depth. Returns `None` for anything
 * at or behind the camera plane.
 */
pub fn project_label(
    world: Vector3<f32>,
    font_size: f32,
    view_proj: &Matrix4<f32>,
    fovy: cgmath::Rad<f32>,
    width: u32,
    height: u32,
) -> Option<ScreenPlacement> {
    let clip = view_proj * Vector4::new(world.x, world.y, world.z, 1.0);
    // clip.w is the distance along the view direction for perspective projections
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;
    let x = (ndc_x * 0.5 + 0.5) * width as f32;
    let y = (0.5 - ndc_y * 0.5) * height as f32;
    let world_per_pixel = 2.0 * clip.w * (fovy.0 / 2.0).tan() / height as f32;
    Some(ScreenPlacement {
        x,
        y,
        pixel_size: (font_size / world_per_pixel).max(MIN_PIXEL_SIZE),
        depth: (clip.z / clip.w).clamp(0.0, 1.0),
    })
}

/// Offsets at which the outline colour is drawn under the fill.
pub fn outline_offsets(pixel_size: f32) -> [(f32, f32); 8] {
    let o = (pixel_size * OUTLINE_RATIO).max(1.0);
    [
        (-o, -o),
        (0.0, -o),
        (o, -o),
        (-o, 0.0),
        (o, 0.0),
        (-o, o),
        (0.0, o),
        (o, o),
    ]
}

#[cfg(feature = "ui")]
pub use overlay::TextOverlay;

#[cfg(feature = "ui")]
mod overlay {
    use glyphon::{
        Attrs, Buffer, Cache, Family, FontSystem, Metrics, Resolution, Shaping, SwashCache,
        TextArea, TextAtlas, TextBounds, TextRenderer, Viewport, Weight,
    };

    use super::{FontWeight, ScreenPlacement, TextLabel, outline_offsets};
    use crate::data_structures::model::Color;

    pub struct TextOverlay {
        font_system: FontSystem,
        swash_cache: SwashCache,
        viewport: Viewport,
        atlas: TextAtlas,
        renderer: TextRenderer,
        buffers: Vec<Buffer>,
    }

    fn to_glyphon(color: Color) -> glyphon::Color {
        // glyphon expects sRGB bytes
        let channel = |c: f32| {
            let srgb = if c <= 0.0031308 {
                c * 12.92
            } else {
                1.055 * c.powf(1.0 / 2.4) - 0.055
            };
            (srgb.clamp(0.0, 1.0) * 255.0).round() as u8
        };
        glyphon::Color::rgba(
            channel(color.0[0]),
            channel(color.0[1]),
            channel(color.0[2]),
            (color.0[3].clamp(0.0, 1.0) * 255.0).round() as u8,
        )
    }

    impl TextOverlay {
        pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
            let font_system = FontSystem::new();
            let swash_cache = SwashCache::new();
            let cache = Cache::new(device);
            let viewport = Viewport::new(device, &cache);
            let mut atlas = TextAtlas::new(device, queue, &cache, format);
            let renderer = TextRenderer::new(
                &mut atlas,
                device,
                wgpu::MultisampleState::default(),
                Some(wgpu::DepthStencilState {
                    format: crate::data_structures::texture::Texture::DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
            );
            Self {
                font_system,
                swash_cache,
                viewport,
                atlas,
                renderer,
                buffers: Vec::new(),
            }
        }

        /// Shapes and uploads the labels for the next [`TextOverlay::render`].
        pub fn prepare(
            &mut self,
            device: &wgpu::Device,
            queue: &wgpu::Queue,
            labels: &[(&TextLabel, ScreenPlacement)],
            width: u32,
            height: u32,
        ) -> Result<(), glyphon::PrepareError> {
            self.viewport.update(queue, Resolution { width, height });

            while self.buffers.len() < labels.len() {
                self.buffers
                    .push(Buffer::new(&mut self.font_system, Metrics::new(16.0, 20.0)));
            }
            for (index, ((label, placement), buffer)) in
                labels.iter().zip(self.buffers.iter_mut()).enumerate()
            {
                let weight = match label.weight {
                    FontWeight::Normal => Weight::NORMAL,
                    FontWeight::Bold => Weight::BOLD,
                };
                let size = placement.pixel_size;
                buffer.set_metrics(&mut self.font_system, Metrics::new(size, size * 1.2));
                buffer.set_size(&mut self.font_system, None, None);
                buffer.set_text(
                    &mut self.font_system,
                    &label.text,
                    // metadata carries the label index for the depth lookup
                    &Attrs::new()
                        .family(Family::SansSerif)
                        .weight(weight)
                        .metadata(index),
                    Shaping::Advanced,
                    None,
                );
                buffer.shape_until_scroll(&mut self.font_system, false);
            }

            let bounds = TextBounds {
                left: 0,
                top: 0,
                right: width as i32,
                bottom: height as i32,
            };
            let mut areas = Vec::new();
            for ((label, placement), buffer) in labels.iter().zip(self.buffers.iter()) {
                if let Some(outline) = label.outline_color {
                    for (dx, dy) in outline_offsets(placement.pixel_size) {
                        areas.push(TextArea {
                            buffer,
                            left: placement.x + dx,
                            top: placement.y + dy,
                            scale: 1.0,
                            bounds,
                            default_color: to_glyphon(outline),
                            custom_glyphs: &[],
                        });
                    }
                }
                areas.push(TextArea {
                    buffer,
                    left: placement.x,
                    top: placement.y,
                    scale: 1.0,
                    bounds,
                    default_color: to_glyphon(label.color),
                    custom_glyphs: &[],
                });
            }

            self.renderer.prepare_with_depth(
                device,
                queue,
                &mut self.font_system,
                &mut self.atlas,
                &self.viewport,
                areas,
                &mut self.swash_cache,
                |index| labels.get(index).map_or(1.0, |(_, placement)| placement.depth),
            )
        }

        pub fn render(&self, pass: &mut wgpu::RenderPass) -> Result<(), glyphon::RenderError> {
            self.renderer.render(&self.atlas, &self.viewport, pass)
        }

        /// Drops glyphs no label used since the last call.
        pub fn trim(&mut self) {
            self.atlas.trim();
        }
    }
}
