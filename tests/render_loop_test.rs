use std::{cell::Cell, time::Duration};

use approx::assert_relative_eq;
use cgmath::{InnerSpace, Point3};
use orbit_viewer::{
    ViewerConfig,
    compat::{self, Capability},
    data_structures::scene_graph::SceneGraph,
    flow::{FrameStatus, RenderLoop, StopHandle},
    setup,
};

mod common;
use common::test_utils::RecordingTarget;

fn driver(config: &ViewerConfig) -> RenderLoop {
    RenderLoop::new(config, (800, 600), StopHandle::new())
}

#[test]
fn should_update_controls_before_drawing() {
    let config = ViewerConfig::default();
    let mut driver = driver(&config);
    let scene = setup::build_scene();
    let mut target = RecordingTarget::default();

    for _ in 0..3 {
        let status = driver
            .tick(Duration::from_millis(100), &scene, &mut target)
            .unwrap();
        assert_eq!(status, FrameStatus::Drawn);
        // the draw saw the camera of this frame, not the previous one
        assert_eq!(target.cameras.last(), Some(&driver.camera.position));
    }
    assert_eq!(target.cameras.len(), 3);
    assert_eq!(driver.frames(), 3);
    assert_ne!(target.cameras[0], config.camera_position);
    assert_ne!(target.cameras[0], target.cameras[1]);
}

#[test]
fn should_orbit_a_quarter_turn_in_seven_and_a_half_seconds() {
    let config = ViewerConfig::default();
    let mut driver = driver(&config);
    let mut target = RecordingTarget::default();

    driver
        .tick(Duration::from_secs_f32(7.5), &SceneGraph::new(), &mut target)
        .unwrap();

    let position = target.cameras[0];
    assert_relative_eq!(position.x, -10.0, epsilon = 1e-3);
    assert_relative_eq!(position.y, 5.0, epsilon = 1e-3);
    assert_relative_eq!(position.z, 0.0, epsilon = 1e-3);
}

#[test]
fn should_keep_distance_to_target_while_auto_rotating() {
    let config = ViewerConfig::default();
    let mut driver = driver(&config);
    let scene = SceneGraph::new();
    let mut target = RecordingTarget::default();
    let distance = (config.camera_position - config.orbit_target).magnitude();

    for _ in 0..600 {
        driver
            .tick(Duration::from_millis(16), &scene, &mut target)
            .unwrap();
    }

    for position in target.cameras {
        assert_relative_eq!(
            (position - config.orbit_target).magnitude(),
            distance,
            epsilon = 1e-3
        );
    }
}

#[test]
fn should_stay_put_without_auto_rotation() {
    let config = ViewerConfig::default().with_auto_rotate(None);
    let mut driver = driver(&config);
    let mut target = RecordingTarget::default();

    driver
        .tick(Duration::from_secs(5), &SceneGraph::new(), &mut target)
        .unwrap();

    let position = target.cameras[0];
    assert_relative_eq!(position.x, 0.0, epsilon = 1e-4);
    assert_relative_eq!(position.y, 5.0, epsilon = 1e-4);
    assert_relative_eq!(position.z, 10.0, epsilon = 1e-4);
}

#[test]
fn should_not_draw_after_stop() {
    let stop = StopHandle::new();
    let mut driver = RenderLoop::new(&ViewerConfig::default(), (800, 600), stop.clone());
    let scene = SceneGraph::new();
    let mut target = RecordingTarget::default();

    driver
        .tick(Duration::from_millis(16), &scene, &mut target)
        .unwrap();
    stop.stop();
    let camera_before = driver.camera.position;
    let status = driver
        .tick(Duration::from_millis(16), &scene, &mut target)
        .unwrap();

    assert_eq!(status, FrameStatus::Stopped);
    assert_eq!(target.cameras.len(), 1);
    assert_eq!(driver.frames(), 1);
    assert_eq!(driver.camera.position, camera_before);
    assert!(driver.stop_handle().is_stopped());
}

#[test]
fn should_propagate_draw_errors() {
    let mut driver = driver(&ViewerConfig::default());
    let mut target = RecordingTarget {
        fail_with: Some("surface lost".to_string()),
        ..Default::default()
    };

    let result = driver.tick(Duration::from_millis(16), &SceneGraph::new(), &mut target);

    assert_eq!(result, Err("surface lost".to_string()));
    assert_eq!(driver.frames(), 0);
}

#[test]
fn should_never_start_loop_when_unsupported() {
    let starts = Cell::new(0);
    let reports = Cell::new(0);

    let started = compat::gate(
        Capability::unsupported(),
        || starts.set(starts.get() + 1),
        |message| {
            assert_eq!(message, compat::UNSUPPORTED_MESSAGE);
            reports.set(reports.get() + 1);
        },
    );

    assert!(started.is_none());
    assert_eq!(starts.get(), 0);
    assert_eq!(reports.get(), 1);
}

#[test]
fn should_start_loop_exactly_once_when_supported() {
    let starts = Cell::new(0);
    let reports = Cell::new(0);

    let started = compat::gate(
        compat::probe(),
        || {
            starts.set(starts.get() + 1);
            driver(&ViewerConfig::default())
        },
        |_| reports.set(reports.get() + 1),
    );

    assert!(started.is_some());
    assert_eq!(starts.get(), 1);
    assert_eq!(reports.get(), 0);
}

#[test]
fn should_point_camera_at_orbit_target() {
    let config = ViewerConfig::default().with_camera((0.0, 3.0, 4.0), (1.0, 0.0, 0.0));
    let mut driver = driver(&config);
    let mut target = RecordingTarget::default();

    driver
        .tick(Duration::from_millis(16), &SceneGraph::new(), &mut target)
        .unwrap();

    assert_eq!(driver.camera.target, Point3::new(1.0, 0.0, 0.0));
}
