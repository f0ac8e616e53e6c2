//! Initial scene content of the viewer.

use crate::data_structures::{
    model::{LineData, Material, MeshData},
    scene_graph::{DirectionalLight, Entity, Renderable, SceneGraph},
    transform::Transform,
};
use crate::text::TextLabel;

pub const CUBE: &str = "cube";
pub const LINE: &str = "line";
pub const LIGHT: &str = "light";
pub const LABEL: &str = "label";

/**
 * Builds the static part of the scene in insertion order: a hidden cube, a hidden
 * triangle outline, a directional light and the model label. The model itself is
 * appended once its load settles.
 */
pub fn build_scene() -> SceneGraph {
    let mut scene = SceneGraph::new();

    let mut cube = Entity::new(
        CUBE,
        Renderable::Mesh(MeshData::cuboid(2.0, 2.0, 2.0, Material::basic(0x87ceeb))),
    );
    cube.visible = false;
    scene.add(cube);

    let points = vec![
        [-10.0, 0.0, 0.0],
        [0.0, 10.0, 0.0],
        [10.0, 0.0, 0.0],
        [-10.0, 0.0, 0.0],
    ];
    let mut line = Entity::new(
        LINE,
        Renderable::Line(LineData::from_points(points, Material::basic(0x7f00ff))),
    );
    line.visible = false;
    scene.add(line);

    scene.add(
        Entity::new(LIGHT, Renderable::Light(DirectionalLight::new(0xffffff, 1.0)))
            .with_transform(Transform::from_position(5.0, 5.0, 5.0)),
    );

    let label = TextLabel::new("eco_house_model", 0.2)
        .bold()
        .with_color(0x004d25)
        .with_outline(0x9966ff);
    scene.add(
        Entity::new(LABEL, Renderable::Text(label))
            .with_transform(Transform::from_position(0.0, 4.0, 3.0)),
    );

    scene
}
