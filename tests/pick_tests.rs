//! Picking Tests
//!
//! Tests for:
//! - Hit: pick over a named leaf returns its name and a world position
//!   inside the leaf's bounding box
//! - Miss: pick over empty space returns None
//! - The picking flag gates participation

mod common;

use common::{RecordingBackend, cube_json, rig_json};
use serde_json::json;
use strata::{FrameRenderer, PickOptions, Scene};

const VIEWPORT: (u32, u32) = (64, 64);

fn named_cube_scene() -> Scene {
    let desc = rig_json(vec![json!({
        "type": "name", "name": "object_0_0_0",
        "nodes": [cube_json(1.0)],
    })]);
    Scene::from_description(&desc).unwrap()
}

#[test]
fn pick_over_geometry_returns_object_name() {
    let mut scene = named_cube_scene();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    let hit = renderer
        .pick(
            &mut scene,
            &mut backend,
            32,
            32,
            VIEWPORT,
            PickOptions::default(),
        )
        .unwrap();

    let hit = hit.expect("center of the viewport covers the cube");
    assert_eq!(hit.object_name, "object_0_0_0");
    assert_eq!(hit.canvas_pos, glam::Vec2::new(32.0, 32.0));
    assert_eq!(hit.world_pos, None, "no ray pick requested");
}

#[test]
fn ray_pick_returns_world_position_inside_bounds() {
    let mut scene = named_cube_scene();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    let hit = renderer
        .pick(
            &mut scene,
            &mut backend,
            32,
            32,
            VIEWPORT,
            PickOptions { ray_pick: true },
        )
        .unwrap()
        .expect("center of the viewport covers the cube");

    assert_eq!(hit.object_name, "object_0_0_0");
    let pos = hit.world_pos.expect("ray crosses the cube");
    let eps = 1e-3;
    assert!(pos.x.abs() <= 1.0 + eps && pos.y.abs() <= 1.0 + eps && pos.z.abs() <= 1.0 + eps);
    // The camera looks down -Z from +10, so the hit is the front face.
    assert!((pos.z - 1.0).abs() < 1e-2, "expected front face, got {pos}");
}

#[test]
fn pick_over_empty_space_returns_none() {
    let mut scene = named_cube_scene();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    let hit = renderer
        .pick(
            &mut scene,
            &mut backend,
            1,
            1,
            VIEWPORT,
            PickOptions { ray_pick: true },
        )
        .unwrap();
    assert!(hit.is_none());
}

#[test]
fn unpickable_subtrees_are_invisible_to_picking() {
    let desc = rig_json(vec![json!({
        "type": "flags", "flags": { "picking": false },
        "nodes": [{
            "type": "name", "name": "untouchable",
            "nodes": [cube_json(1.0)],
        }],
    })]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    let hit = renderer
        .pick(
            &mut scene,
            &mut backend,
            32,
            32,
            VIEWPORT,
            PickOptions::default(),
        )
        .unwrap();
    assert!(hit.is_none());
}

#[test]
fn nearer_geometry_wins_the_pick() {
    // Two cubes on the view axis; the near one (z = 3) occludes the far.
    let desc = rig_json(vec![
        json!({ "type": "name", "name": "far", "nodes": [
            { "type": "translate", "z": -3.0, "nodes": [cube_json(1.0)] },
        ]}),
        json!({ "type": "name", "name": "near", "nodes": [
            { "type": "translate", "z": 3.0, "nodes": [cube_json(1.0)] },
        ]}),
    ]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    let hit = renderer
        .pick(
            &mut scene,
            &mut backend,
            32,
            32,
            VIEWPORT,
            PickOptions::default(),
        )
        .unwrap()
        .expect("both cubes cover the center");
    assert_eq!(hit.object_name, "near");
}
