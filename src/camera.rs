//! Camera, projection and orbit controls.
//!
//! The [`Camera`] is a position looking at a target. [`OrbitControls`] move it
//! on a sphere around that target, either from pointer input or through
//! continuous auto-rotation, and must be `update`d once per frame and after
//! any manual change to the camera.

use std::f32::consts::{PI, TAU};

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use instant::Duration;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const EPS: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn look_at<T: Into<Point3<f32>>>(&mut self, target: T) {
        self.target = target.into();
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU side of the camera: the uniform and its bindings.
#[derive(Debug)]
pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, camera: &Camera, projection: &Projection) -> Self {
        use wgpu::util::DeviceExt;

        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(camera, projection);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, camera: &Camera, projection: &Projection) {
        self.uniform.update_view_proj(camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

/// Orbit-style camera manipulation around a fixed target.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub auto_rotate: bool,
    /// Full turns per minute when `auto_rotate` is on (2.0 means 30 seconds per orbit).
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub enabled: bool,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
    viewport_height: f32,
}

impl OrbitControls {
    pub fn new<T: Into<Point3<f32>>>(target: T) -> Self {
        Self {
            target: target.into(),
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            enabled: true,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            dragging: false,
            last_cursor: None,
            viewport_height: 1.0,
        }
    }

    pub fn with_auto_rotate(mut self, speed: f32) -> Self {
        self.auto_rotate = true;
        self.auto_rotate_speed = speed;
        self
    }

    /// Used to convert pointer travel into angles.
    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Queue a rotation around the vertical axis through the target.
    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    /// Queue a change of the polar angle.
    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Queue a zoom; factors above one move the camera closer.
    pub fn dolly_in(&mut self, factor: f32) {
        if factor > 0.0 {
            self.scale /= factor;
        }
    }

    pub fn dolly_out(&mut self, factor: f32) {
        if factor > 0.0 {
            self.scale *= factor;
        }
    }

    fn auto_rotation_angle(&self, dt: Duration) -> f32 {
        TAU / 60.0 * self.auto_rotate_speed * dt.as_secs_f32()
    }

    /**
     * Applies the queued input and auto-rotation to `camera` and points it at the target.
     *
     * Returns `true` if the camera moved.
     */
    pub fn update(&mut self, camera: &mut Camera, dt: Duration) -> bool {
        let offset = camera.position - self.target;
        let radius = offset.magnitude();
        let (mut theta, mut phi) = if radius > EPS {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI / 2.0)
        };

        if self.auto_rotate && !self.dragging {
            self.rotate_left(self.auto_rotation_angle(dt));
        }

        theta += self.delta_theta;
        phi += self.delta_phi;
        phi = phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let sin_phi_radius = phi.sin() * radius;
        let new_offset = Vector3::new(
            sin_phi_radius * theta.sin(),
            phi.cos() * radius,
            sin_phi_radius * theta.cos(),
        );
        let old_position = camera.position;
        camera.position = self.target + new_offset;
        camera.look_at(self.target);

        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;

        (camera.position - old_position).magnitude2() > EPS
    }

    /// Feeds pointer input: left drag orbits, the wheel zooms.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        if !self.enabled {
            return false;
        }
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
                if !self.dragging {
                    self.last_cursor = None;
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = (position.x, position.y);
                if self.dragging {
                    if let Some((x, y)) = self.last_cursor {
                        let (dx, dy) = ((current.0 - x) as f32, (current.1 - y) as f32);
                        self.rotate_left(TAU * dx / self.viewport_height * self.rotate_speed);
                        self.rotate_up(TAU * dy / self.viewport_height * self.rotate_speed);
                    }
                }
                self.last_cursor = Some(current);
                self.dragging
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                let factor = 0.95f32.powf(self.zoom_speed);
                if scroll > 0.0 {
                    self.dolly_in(1.0 / factor);
                } else if scroll < 0.0 {
                    self.dolly_out(1.0 / factor);
                }
                scroll != 0.0
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_points_the_camera_at_the_target() {
        let mut camera = Camera::new((0.0, 5.0, 10.0), (0.0, 3.5, 1.0));
        let mut controls = OrbitControls::new((0.0, 0.0, 0.0));

        controls.update(&mut camera, Duration::ZERO);

        assert_eq!(camera.target, Point3::new(0.0, 0.0, 0.0));
        assert!((camera.position - Point3::new(0.0, 5.0, 10.0)).magnitude() < 1e-4);
    }

    #[test]
    fn auto_rotation_completes_an_orbit_in_sixty_seconds_over_speed() {
        let mut camera = Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0));
        let mut controls = OrbitControls::new((0.0, 0.0, 0.0)).with_auto_rotate(2.0);

        // a quarter of the 30 second orbit
        controls.update(&mut camera, Duration::from_millis(7_500));

        assert!((camera.position - Point3::new(-10.0, 0.0, 0.0)).magnitude() < 1e-3);
    }

    #[test]
    fn dolly_respects_distance_limits() {
        let mut camera = Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0));
        let mut controls = OrbitControls::new((0.0, 0.0, 0.0));
        controls.min_distance = 5.0;

        controls.dolly_in(100.0);
        controls.update(&mut camera, Duration::ZERO);

        assert!((camera.position.z - 5.0).abs() < 1e-4);
    }

    #[test]
    fn projection_tracks_viewport_aspect() {
        let mut projection = Projection::new(800, 600, cgmath::Deg(75.0), 1.0, 500.0);
        assert!((projection.aspect() - 800.0 / 600.0).abs() < f32::EPSILON);
        projection.resize(1920, 1080);
        assert!((projection.aspect() - 1920.0 / 1080.0).abs() < f32::EPSILON);
        projection.resize(0, 1080);
        assert!((projection.aspect() - 1920.0 / 1080.0).abs() < f32::EPSILON);
    }
}
