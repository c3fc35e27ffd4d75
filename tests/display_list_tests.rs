//! Display List & Sort Order Tests
//!
//! Tests for:
//! - Explicit layer priorities dominating declaration order
//! - Declaration order as the stable tie-break
//! - Grouping by program identity within a layer
//! - Stage (pass) grouping as the outermost sort key

mod common;

use common::{RecordingBackend, cube_json, rig_json};
use serde_json::json;
use strata::chunk::ChunkCategory;
use strata::{FrameOutcome, FrameRenderer, Scene};

fn draw_xs(backend: &RecordingBackend) -> Vec<f32> {
    backend.draws.iter().map(|d| d.world.w_axis.x).collect()
}

/// Three nested-looking cubes with explicit layer priorities draw
/// inner-before-default-before-outer regardless of declaration order.
#[test]
fn layer_priorities_control_draw_order() {
    // Declared outer (1) first, inner (-1) last; x marks each cube.
    let desc = rig_json(vec![
        json!({ "type": "layer", "priority": 1, "nodes": [
            { "type": "translate", "x": 1.0, "nodes": [cube_json(1.0)] },
        ]}),
        json!({ "type": "layer", "priority": 0, "nodes": [
            { "type": "translate", "x": 2.0, "nodes": [cube_json(1.0)] },
        ]}),
        json!({ "type": "layer", "priority": -1, "nodes": [
            { "type": "translate", "x": 3.0, "nodes": [cube_json(1.0)] },
        ]}),
    ]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    let outcome = renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Complete);
    assert_eq!(draw_xs(&backend), vec![3.0, 2.0, 1.0]);
}

#[test]
fn equal_keys_draw_in_declaration_order() {
    let desc = rig_json(vec![json!({
        "type": "material",
        "nodes": [
            { "type": "translate", "x": 1.0, "nodes": [cube_json(1.0)] },
            { "type": "translate", "x": 2.0, "nodes": [cube_json(1.0)] },
            { "type": "translate", "x": 3.0, "nodes": [cube_json(1.0)] },
        ],
    })]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(draw_xs(&backend), vec![1.0, 2.0, 3.0]);

    // Re-sorting an unchanged list is byte-identical.
    backend.reset_counters();
    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(draw_xs(&backend), vec![1.0, 2.0, 3.0]);
}

const VS: &str = "@vertex fn vs_main() {}";
const FS: &str = "@fragment fn fs_main() {}";

#[test]
fn interleaved_programs_group_to_minimize_switches() {
    let shader = |core_id: &str, x: f32| {
        json!({
            "type": "shader", "coreId": core_id,
            "name": core_id, "vertex": VS, "fragment": FS,
            "nodes": [{ "type": "translate", "x": x, "nodes": [cube_json(1.0)] }],
        })
    };
    // Declared A, B, A, B; the sorter must regroup to A, A, B, B.
    let desc = rig_json(vec![
        shader("prog-a", 1.0),
        shader("prog-b", 2.0),
        shader("prog-a", 3.0),
        shader("prog-b", 4.0),
    ]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();

    assert_eq!(backend.draws.len(), 4);
    // One program switch per group, not per draw.
    assert_eq!(backend.applies(ChunkCategory::Program), 2);

    let xs = draw_xs(&backend);
    let pos = |x: f32| xs.iter().position(|&v| (v - x).abs() < 1e-6).unwrap();
    // Same-program draws are adjacent and keep declaration order.
    assert_eq!(pos(1.0) + 1, pos(3.0));
    assert_eq!(pos(2.0) + 1, pos(4.0));
}

#[test]
fn stages_group_before_layers() {
    let desc = rig_json(vec![
        json!({ "type": "stage", "index": 1, "nodes": [
            { "type": "layer", "priority": -5, "nodes": [
                { "type": "translate", "x": 1.0, "nodes": [cube_json(1.0)] },
            ]},
        ]}),
        json!({ "type": "translate", "x": 2.0, "nodes": [cube_json(1.0)] }),
    ]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();

    // The stage-0 cube draws first despite the stage-1 cube's lower layer
    // priority; the stage boundary opens a second pass target.
    assert_eq!(draw_xs(&backend), vec![2.0, 1.0]);
    assert_eq!(backend.passes.len(), 2);
}

#[test]
fn disabled_layer_drops_its_subtree_from_the_frame() {
    let desc = rig_json(vec![
        json!({ "type": "layer", "priority": 0, "enabled": false, "id": "gate", "nodes": [
            { "type": "translate", "x": 1.0, "nodes": [cube_json(1.0)] },
        ]}),
        json!({ "type": "translate", "x": 2.0, "nodes": [cube_json(1.0)] }),
    ]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(draw_xs(&backend), vec![2.0]);

    // Re-enabling brings it back on the next frame.
    let gate = scene.find_node("gate").unwrap();
    scene.mutate(
        gate,
        strata::CorePatch::Layer(strata::core::LayerPatch {
            enabled: Some(true),
            ..Default::default()
        }),
    );
    backend.reset_counters();
    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(draw_xs(&backend), vec![1.0, 2.0]);
}
