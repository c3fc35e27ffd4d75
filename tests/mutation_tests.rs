//! Mutation API Tests
//!
//! Tests for:
//! - set/get round trips per category
//! - inc_* deltas
//! - mutate_by_id addressing
//! - Morph factor interpolation through the central mutate entry point

use glam::Vec3;
use serde_json::json;
use strata::{ParamValue, RenderFlags, Scene};

#[test]
fn eye_round_trips_and_increments() {
    let desc = json!({
        "type": "lookAt", "id": "view",
        "eye": { "x": 0.0, "y": 0.0, "z": 10.0 },
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let view = scene.find_node("view").unwrap();

    let eye = Vec3::new(1.0, 2.0, 3.0);
    assert!(scene.set_eye(view, eye));
    assert_eq!(scene.get_eye(view), Some(eye));

    assert!(scene.inc_eye(view, Vec3::new(0.5, 0.0, -1.0)));
    assert_eq!(scene.get_eye(view), Some(Vec3::new(1.5, 2.0, 2.0)));

    // Setting the same value again is not a change.
    assert!(!scene.set_eye(view, Vec3::new(1.5, 2.0, 2.0)));
}

#[test]
fn look_and_up_round_trip() {
    let desc = json!({ "type": "lookAt", "id": "view" });
    let mut scene = Scene::from_description(&desc).unwrap();
    let view = scene.find_node("view").unwrap();

    scene.set_look(view, Vec3::new(0.0, 1.0, 0.0));
    scene.set_up(view, Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(scene.get_look(view), Some(Vec3::new(0.0, 1.0, 0.0)));
    assert_eq!(scene.get_up(view), Some(Vec3::new(0.0, 0.0, 1.0)));
}

#[test]
fn rotation_angle_round_trips_and_increments() {
    let desc = json!({ "type": "rotate", "id": "spin", "angle": 10.0, "y": 1.0 });
    let mut scene = Scene::from_description(&desc).unwrap();
    let spin = scene.find_node("spin").unwrap();

    assert_eq!(scene.get_angle(spin), Some(10.0));
    scene.set_angle(spin, 45.0);
    assert_eq!(scene.get_angle(spin), Some(45.0));
    scene.inc_angle(spin, 15.0);
    assert_eq!(scene.get_angle(spin), Some(60.0));
}

#[test]
fn material_color_and_alpha_round_trip() {
    let desc = json!({ "type": "material", "id": "mat" });
    let mut scene = Scene::from_description(&desc).unwrap();
    let mat = scene.find_node("mat").unwrap();

    scene.set_base_color(mat, Vec3::new(0.1, 0.2, 0.3));
    assert_eq!(scene.get_base_color(mat), Some(Vec3::new(0.1, 0.2, 0.3)));

    scene.set_alpha(mat, 0.25);
    assert_eq!(scene.get_alpha(mat), Some(0.25));

    // Alpha clamps rather than escaping 0..1.
    scene.set_alpha(mat, 7.0);
    assert_eq!(scene.get_alpha(mat), Some(1.0));
}

#[test]
fn layer_priority_round_trips() {
    let desc = json!({ "type": "layer", "id": "l", "priority": 3 });
    let mut scene = Scene::from_description(&desc).unwrap();
    let l = scene.find_node("l").unwrap();

    assert_eq!(scene.get_layer_priority(l), Some(3));
    scene.set_layer_priority(l, -7);
    assert_eq!(scene.get_layer_priority(l), Some(-7));
}

#[test]
fn flags_toggle_through_set_and_clear() {
    let desc = json!({ "type": "flags", "id": "f", "flags": { "transparent": true } });
    let mut scene = Scene::from_description(&desc).unwrap();
    let f = scene.find_node("f").unwrap();

    let flags = scene.get_flags(f).unwrap();
    assert!(flags.contains(RenderFlags::TRANSPARENT));
    assert!(flags.contains(RenderFlags::ENABLED));

    scene.set_flags(f, RenderFlags::empty(), RenderFlags::ENABLED);
    assert!(!scene.get_flags(f).unwrap().contains(RenderFlags::ENABLED));
}

#[test]
fn light_color_round_trips() {
    let desc = json!({
        "type": "lights", "id": "lights",
        "lights": [
            { "mode": "dir", "dir": { "x": 0.0, "y": -1.0, "z": 0.0 },
              "color": { "r": 1.0, "g": 1.0, "b": 1.0 } },
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let lights = scene.find_node("lights").unwrap();

    scene.set_light_color(lights, 0, Vec3::new(1.0, 0.5, 0.0));
    assert_eq!(
        scene.get_light_color(lights, 0),
        Some(Vec3::new(1.0, 0.5, 0.0))
    );
}

#[test]
fn shader_params_set_and_get() {
    let desc = json!({
        "type": "shaderParams", "id": "params",
        "params": { "uScale": 1.0 },
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let params = scene.find_node("params").unwrap();

    assert_eq!(
        scene.get_shader_param(params, "uScale"),
        Some(ParamValue::Float(1.0))
    );
    scene.set_shader_param(params, "uScale", ParamValue::Float(2.5));
    assert_eq!(
        scene.get_shader_param(params, "uScale"),
        Some(ParamValue::Float(2.5))
    );
}

#[test]
fn morph_factor_interpolates_target_positions() {
    let desc = json!({
        "type": "morphGeometry", "id": "morph", "factor": 0.0,
        "targets": [
            { "positions": [0.0, 0.0, 0.0,  1.0, 0.0, 0.0,  0.0, 1.0, 0.0],
              "indices": [0, 1, 2] },
            { "positions": [0.0, 0.0, 2.0,  1.0, 0.0, 2.0,  0.0, 1.0, 2.0],
              "indices": [0, 1, 2] },
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let morph = scene.find_node("morph").unwrap();

    scene.set_morph_factor(morph, 0.5);
    assert_eq!(scene.get_morph_factor(morph), Some(0.5));

    let core = scene.get_node(morph).unwrap().core().unwrap();
    let geometry = scene.registry().get(core).unwrap().as_geometry().unwrap();
    let z = geometry.data.as_ref().unwrap().positions[2];
    assert!((z - 1.0).abs() < 1e-6, "positions lerped halfway, got {z}");
}

#[test]
fn mutate_by_id_addresses_nodes_by_declared_id() {
    let desc = json!({ "type": "material", "id": "named" });
    let mut scene = Scene::from_description(&desc).unwrap();

    assert!(scene.mutate_by_id(
        "named",
        strata::CorePatch::Material(strata::core::MaterialPatch {
            emit: Some(0.5),
            ..Default::default()
        }),
    ));
    assert!(!scene.mutate_by_id("missing", strata::CorePatch::Material(Default::default())));
}
