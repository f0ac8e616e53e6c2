use cgmath::{Point3, Rad, Vector3};

use crate::data_structures::scene_graph::Placement;

/// Everything the viewer needs to know at startup. The defaults reproduce the eco house demo.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    /// Directory (native) or path below the page origin (web) assets are resolved against.
    pub asset_root: String,
    pub model_path: String,
    pub model_placement: Placement,
    pub camera_position: Point3<f32>,
    pub orbit_target: Point3<f32>,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    /// `None` disables auto-rotation; 2.0 means one turn every 30 seconds.
    pub auto_rotate_speed: Option<f32>,
    pub canvas_id: String,
    pub container_id: String,
    pub clear_color: wgpu::Color,
    pub window_title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            #[cfg(target_arch = "wasm32")]
            asset_root: String::new(),
            #[cfg(not(target_arch = "wasm32"))]
            asset_root: "assets".to_string(),
            model_path: "eco_house_-_3_simple_props/scene.gltf".to_string(),
            model_placement: Placement {
                position: Vector3::new(0.0, 0.0, 0.0),
                rotation_y: Rad(5.0),
                scale: Vector3::new(1.0, 1.0, 1.0),
            },
            camera_position: Point3::new(0.0, 5.0, 10.0),
            orbit_target: Point3::new(0.0, 0.0, 0.0),
            fovy: cgmath::Deg(75.0).into(),
            znear: 1.0,
            zfar: 500.0,
            auto_rotate_speed: Some(2.0),
            canvas_id: "canvas".to_string(),
            container_id: "container".to_string(),
            clear_color: wgpu::Color::BLACK,
            window_title: "orbit-viewer".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn with_asset_root(mut self, root: impl Into<String>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_model(mut self, path: impl Into<String>, placement: Placement) -> Self {
        self.model_path = path.into();
        self.model_placement = placement;
        self
    }

    pub fn with_camera(mut self, position: impl Into<Point3<f32>>, target: impl Into<Point3<f32>>) -> Self {
        self.camera_position = position.into();
        self.orbit_target = target.into();
        self
    }

    pub fn with_projection(mut self, fovy: impl Into<Rad<f32>>, znear: f32, zfar: f32) -> Self {
        self.fovy = fovy.into();
        self.znear = znear;
        self.zfar = zfar;
        self
    }

    pub fn with_auto_rotate(mut self, speed: Option<f32>) -> Self {
        self.auto_rotate_speed = speed;
        self
    }

    pub fn with_clear_color(mut self, color: wgpu::Color) -> Self {
        self.clear_color = color;
        self
    }
}
