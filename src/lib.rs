//! orbit-viewer
//!
//! A small 3D model viewer for native windows and the browser. It shows a
//! glTF model together with a few primitives and a text label, lit by a
//! directional light, while an orbit camera slowly circles the scene.
//!
//! High-level modules
//! - `camera`: camera, projection, uniforms and orbit controls
//! - `compat`: one-time graphics capability check gating the render loop
//! - `config`: startup configuration with the demo defaults
//! - `context`: window surface and GPU device setup
//! - `data_structures`: scene graph, transforms, geometry and textures
//! - `flow`: render loop driver and the winit application lifecycle
//! - `pipelines`: mesh and line pipelines plus light uniforms
//! - `render`: GPU mirror of the scene graph and per-pipeline batching
//! - `resources`: asynchronous glTF loading
//! - `setup`: the initial scene content
//! - `text`: projected text labels
//!

pub mod camera;
pub mod compat;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod setup;
pub mod text;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

// Re-exports commonly used types for convenience in downstream code.
pub use config::ViewerConfig;
pub use flow::{StopHandle, run, run_with_stop};
pub use winit::event::WindowEvent;

/// Browser entry point, called by the generated JS glue once the module is loaded.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    run(ViewerConfig::default()).map_err(|e| JsValue::from_str(&e.to_string()))
}
