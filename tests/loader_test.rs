use cgmath::{Rad, Vector3};
use futures::StreamExt;
use orbit_viewer::{
    data_structures::{
        model::Color,
        scene_graph::{LoadOutcome, Placement, Renderable},
    },
    resources::{AssetSource, LoadError, load_model_gltf},
    setup,
};

mod common;
use common::test_utils::{
    LINES, TRIANGLES, UV1, embedded_textured_gltf, triangle_glb, write_triangle_gltf,
};

fn placement() -> Placement {
    Placement {
        position: Vector3::new(0.0, 0.0, 0.0),
        rotation_y: Rad(5.0),
        scale: Vector3::new(1.0, 1.0, 1.0),
    }
}

#[tokio::test]
async fn should_load_binary_gltf() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tri.glb"), triangle_glb(TRIANGLES)).unwrap();
    let source = AssetSource::new(dir.path().to_string_lossy());

    let model = load_model_gltf(&source, "tri.glb", None).await.unwrap();

    assert_eq!(model.root.name, "tri_scene");
    assert_eq!(model.root.children.len(), 1);
    let node = &model.root.children[0];
    assert_eq!(node.name, "tri");
    assert_eq!(node.transform.position, Vector3::new(0.0, 1.0, 0.0));
    let mesh = match &node.renderable {
        Renderable::Mesh(mesh) => mesh,
        other => panic!("expected a mesh, got {:?}", other),
    };
    assert_eq!(mesh.name, "tri_mesh");
    let primitive = &mesh.primitives[0];
    assert_eq!(primitive.indices, vec![0, 1, 2]);
    assert_eq!(primitive.vertices[1].position, [1.0, 0.0, 0.0]);
    // no NORMAL attribute in the file
    assert!(primitive.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
    assert_eq!(primitive.material.name, "red");
    assert_eq!(primitive.material.color, Color([1.0, 0.0, 0.0, 1.0]));
    assert!(primitive.material.lit);
    assert!(!primitive.material.double_sided);
}

#[tokio::test]
async fn should_load_self_contained_gltf_with_data_uris() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("embedded.gltf"), embedded_textured_gltf()).unwrap();
    let source = AssetSource::new(dir.path().to_string_lossy());

    let model = load_model_gltf(&source, "embedded.gltf", None).await.unwrap();

    // no default scene, the first one is used
    assert_eq!(model.root.name, "leaf_scene");
    let mesh = match &model.root.children[0].renderable {
        Renderable::Mesh(mesh) => mesh,
        other => panic!("expected a mesh, got {:?}", other),
    };
    let primitive = &mesh.primitives[0];
    assert_eq!(primitive.indices, vec![0, 1, 2]);
    assert!(primitive.material.double_sided);
    let texture = primitive.material.texture.as_ref().expect("embedded texture");
    assert_eq!(*texture.get_pixel(0, 0), image::Rgba([0, 255, 0, 255]));
}

#[tokio::test]
async fn should_sample_texture_with_its_uv_set() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("embedded.gltf"), embedded_textured_gltf()).unwrap();
    let source = AssetSource::new(dir.path().to_string_lossy());

    let model = load_model_gltf(&source, "embedded.gltf", None).await.unwrap();

    let Renderable::Mesh(mesh) = &model.root.children[0].renderable else {
        panic!("expected a mesh");
    };
    let primitive = &mesh.primitives[0];
    assert_eq!(primitive.material.uv_set, 1);
    let uvs: Vec<_> = primitive.vertices.iter().map(|v| v.tex_coords).collect();
    assert_eq!(uvs, UV1.to_vec());
}

#[tokio::test]
async fn should_resolve_external_buffers_next_to_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_triangle_gltf(dir.path(), "eco_house");
    let source = AssetSource::new(dir.path().to_string_lossy());

    let model = load_model_gltf(&source, &path, None).await.unwrap();

    assert_eq!(model.root.subtree_len(), 2);
}

#[tokio::test]
async fn should_attach_loaded_model_with_placement() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_triangle_gltf(dir.path(), "eco_house");
    let source = AssetSource::new(dir.path().to_string_lossy());
    let mut scene = setup::build_scene();
    let before = scene.len();

    let result = load_model_gltf(&source, &path, None).await;
    let outcome = scene.attach_loaded(result, &placement());

    let id = match outcome {
        LoadOutcome::Attached(id) => id,
        LoadOutcome::Failed(e) => panic!("load failed: {}", e),
    };
    assert_eq!(scene.len(), before + 1);
    assert_eq!(id.index(), before);
    let root = scene.get(id).unwrap();
    assert_eq!(root.transform, placement().to_transform());
    assert!(root.visible);
}

#[tokio::test]
async fn should_leave_scene_untouched_when_file_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let source = AssetSource::new(dir.path().to_string_lossy());
    let mut scene = setup::build_scene();
    let before = scene.len();

    let result = load_model_gltf(&source, "eco_house_-_3_simple_props/scene.gltf", None).await;
    assert!(matches!(result, Err(LoadError::NotFound(_))));

    let outcome = scene.attach_loaded(result, &placement());
    assert!(matches!(outcome, LoadOutcome::Failed(_)));
    assert_eq!(scene.len(), before);
}

#[tokio::test]
async fn should_fail_when_external_buffer_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_triangle_gltf(dir.path(), "broken");
    std::fs::remove_file(dir.path().join("broken").join("tri.bin")).unwrap();
    let source = AssetSource::new(dir.path().to_string_lossy());

    let result = load_model_gltf(&source, &path, None).await;

    assert!(matches!(result, Err(LoadError::NotFound(_))));
}

#[tokio::test]
async fn should_report_garbage_as_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("scene.gltf"), b"this is not json").unwrap();
    let source = AssetSource::new(dir.path().to_string_lossy());

    let result = load_model_gltf(&source, "scene.gltf", None).await;

    assert!(matches!(result, Err(LoadError::Parse(_))));
}

#[tokio::test]
async fn should_reject_files_without_scene() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("empty.gltf"),
        r#"{ "asset": { "version": "2.0" } }"#,
    )
    .unwrap();
    let source = AssetSource::new(dir.path().to_string_lossy());

    let result = load_model_gltf(&source, "empty.gltf", None).await;

    assert!(matches!(result, Err(LoadError::EmptyScene(_))));
}

#[tokio::test]
async fn should_skip_non_triangle_primitives() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lines.glb"), triangle_glb(LINES)).unwrap();
    let source = AssetSource::new(dir.path().to_string_lossy());

    let model = load_model_gltf(&source, "lines.glb", None).await.unwrap();

    match &model.root.children[0].renderable {
        Renderable::Mesh(mesh) => assert!(mesh.primitives.is_empty()),
        other => panic!("expected a mesh, got {:?}", other),
    }
}

#[tokio::test]
async fn should_report_monotonic_progress_ending_at_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_triangle_gltf(dir.path(), "eco_house");
    let source = AssetSource::new(dir.path().to_string_lossy());
    let (tx, rx) = futures::channel::mpsc::unbounded();

    load_model_gltf(&source, &path, Some(tx)).await.unwrap();
    let progress: Vec<f32> = rx.collect().await;

    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
    assert_eq!(progress.last(), Some(&1.0));
}
