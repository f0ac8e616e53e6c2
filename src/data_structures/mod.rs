//! Engine data structures: geometry, textures, transforms and the scene graph.
//!
//! - `model` contains CPU geometry and materials and their GPU counterparts
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `transform` holds per-entity position, rotation and scale
//! - `scene_graph` is the append-only entity list the render loop draws

pub mod model;
pub mod scene_graph;
pub mod texture;
pub mod transform;
