//! Frame Renderer Tests
//!
//! Tests for:
//! - State-change elimination between consecutive draws
//! - Stereo: two passes with isolated per-pass view overrides
//! - Frame abort on GPU errors without state mutation
//! - Pending/failed resource loads: absent subtrees, re-arm on arrival
//! - Exactly-once GPU release of orphaned core resources
//! - Default-program fallback on shader compile failure

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{RecordingBackend, cube_json, rig_json};
use glam::Vec3;
use serde_json::json;
use strata::assets::{LoadSink, Loader};
use strata::chunk::ChunkCategory;
use strata::{FrameOutcome, FrameRenderer, GeometryData, Scene, SceneEvent};

fn triangle_data() -> GeometryData {
    GeometryData {
        positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        normals: Vec::new(),
        uvs: Vec::new(),
        indices: vec![0, 1, 2],
    }
}

// ============================================================================
// State-change elimination
// ============================================================================

#[test]
fn shared_state_chunks_apply_once_per_run() {
    let desc = rig_json(vec![json!({
        "type": "material",
        "nodes": [cube_json(1.0), cube_json(0.5)],
    })]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();

    assert_eq!(backend.draws.len(), 2);
    // Both leaves share every non-geometry core, so each category's chunk
    // is applied for the first draw and elided for the second.
    assert_eq!(backend.applies(ChunkCategory::Material), 1);
    assert_eq!(backend.applies(ChunkCategory::View), 1);
    assert_eq!(backend.applies(ChunkCategory::Camera), 1);
    assert_eq!(backend.applies(ChunkCategory::Lights), 1);

    let stats = renderer.last_stats();
    assert_eq!(stats.draws, 2);
    assert!(stats.chunks_elided > 0);
}

#[test]
fn distinct_materials_each_apply() {
    let desc = rig_json(vec![
        json!({ "type": "material", "baseColor": { "r": 1.0, "g": 0.0, "b": 0.0 },
                "nodes": [cube_json(1.0)] }),
        json!({ "type": "material", "baseColor": { "r": 0.0, "g": 1.0, "b": 0.0 },
                "nodes": [cube_json(1.0)] }),
    ]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(backend.applies(ChunkCategory::Material), 2);
}

// ============================================================================
// Stereo / multi-pass
// ============================================================================

#[test]
fn stereo_runs_two_isolated_passes() {
    let desc = rig_json(vec![cube_json(1.0)]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();
    renderer.set_num_passes(2);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_cb = Rc::clone(&seen);
    let mut callback = move |pass: u32, ctx: &mut strata::PassContext| {
        seen_cb.borrow_mut().push(pass);
        let offset = if pass == 0 { -0.03 } else { 0.03 };
        ctx.set_view(Vec3::new(offset, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
    };

    renderer
        .render_frame(&mut scene, &mut backend, Some(&mut callback))
        .unwrap();

    // Exactly two callback invocations, pass 0 then pass 1.
    assert_eq!(*seen.borrow(), vec![0, 1]);
    assert_eq!(backend.draws.len(), 2);
    assert_eq!(backend.view_matrices_applied.len(), 2);
    assert_ne!(
        backend.view_matrices_applied[0],
        backend.view_matrices_applied[1],
        "each pass sees its own view"
    );

    // Overrides never leak into the scene's view core.
    let view = scene.find_node("rig-look").unwrap();
    assert_eq!(scene.get_eye(view), Some(Vec3::new(0.0, 0.0, 10.0)));
}

// ============================================================================
// GPU errors
// ============================================================================

#[test]
fn gpu_failure_aborts_frame_without_mutating_state() {
    let desc = rig_json(vec![cube_json(1.0)]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    let (_sub, events) = scene.subscribe_events();

    backend.fail_draws = true;
    let outcome = renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Aborted);
    assert_eq!(scene.display().len(), 1, "display list untouched");
    assert!(
        events
            .try_iter()
            .any(|e| matches!(e, SceneEvent::FrameAborted { .. }))
    );

    // A retry after the fault clears renders normally.
    backend.fail_draws = false;
    backend.reset_counters();
    let outcome = renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Complete);
    assert_eq!(backend.draws.len(), 1);
}

// ============================================================================
// Asynchronous resource loading
// ============================================================================

/// Holds sinks so the test decides when (and how) each load completes.
#[derive(Default)]
struct HoldLoader {
    sinks: Rc<RefCell<Vec<LoadSink>>>,
}

impl Loader for HoldLoader {
    fn load_geometry(&mut self, _stream_id: &str, sink: LoadSink) {
        self.sinks.borrow_mut().push(sink);
    }
    fn load_morph_geometry(&mut self, _stream_id: &str, sink: LoadSink) {
        self.sinks.borrow_mut().push(sink);
    }
    fn load_image(&mut self, _uri: &str, sink: LoadSink) {
        self.sinks.borrow_mut().push(sink);
    }
}

#[test]
fn pending_geometry_is_skipped_then_appears_on_arrival() {
    let desc = rig_json(vec![json!({ "type": "geometry", "stream": "tri-stream" })]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let sinks = Rc::new(RefCell::new(Vec::new()));
    scene.set_loader(Box::new(HoldLoader {
        sinks: Rc::clone(&sinks),
    }));

    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();
    let (_sub, events) = scene.subscribe_events();

    // Still loading: subtree silently absent, frame completes.
    let outcome = renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Complete);
    assert_eq!(backend.draws.len(), 0);

    // The data arrives; the next frame recompiles and draws it.
    let sink = sinks.borrow_mut().pop().unwrap();
    sink.loaded_geometry(triangle_data());

    backend.reset_counters();
    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(backend.draws.len(), 1);

    let events: Vec<_> = events.try_iter().collect();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SceneEvent::ResourceLoaded { .. }))
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SceneEvent::RecompileScheduled))
    );
}

#[test]
fn failed_load_leaves_subtree_absent_without_error() {
    let desc = rig_json(vec![
        json!({ "type": "geometry", "stream": "broken-stream" }),
        cube_json(1.0),
    ]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let sinks = Rc::new(RefCell::new(Vec::new()));
    scene.set_loader(Box::new(HoldLoader {
        sinks: Rc::clone(&sinks),
    }));

    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();
    let (_sub, events) = scene.subscribe_events();

    let sink = sinks.borrow_mut().pop().unwrap();
    sink.error("404 not found");

    // The per-frame call must not throw; the healthy sibling still draws.
    let outcome = renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Complete);
    assert_eq!(backend.draws.len(), 1);
    assert!(
        events
            .try_iter()
            .any(|e| matches!(e, SceneEvent::ResourceFailed { .. }))
    );
}

#[test]
fn canceled_load_completions_are_dropped() {
    let desc = rig_json(vec![
        json!({ "type": "node", "id": "doomed", "nodes": [
            { "type": "geometry", "stream": "late-stream" },
        ]}),
    ]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let sinks = Rc::new(RefCell::new(Vec::new()));
    scene.set_loader(Box::new(HoldLoader {
        sinks: Rc::clone(&sinks),
    }));

    let doomed = scene.find_node("doomed").unwrap();
    scene.remove_node(doomed);

    // The core is gone; the completion must check its token and bail.
    let sink = sinks.borrow_mut().pop().unwrap();
    sink.loaded_geometry(triangle_data());

    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();
    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(backend.draws.len(), 0);
}

// ============================================================================
// GPU resource lifecycle
// ============================================================================

#[test]
fn orphaned_core_releases_gpu_resources_exactly_once() {
    let desc = rig_json(vec![
        json!({ "type": "node", "id": "holder-1", "nodes": [
            { "type": "geometry", "coreId": "shared-geo",
              "positions": [0.0, 0.0, 0.0,  1.0, 0.0, 0.0,  0.0, 1.0, 0.0],
              "indices": [0, 1, 2] },
        ]}),
        json!({ "type": "node", "id": "holder-2", "nodes": [
            { "type": "geometry", "coreId": "shared-geo" },
        ]}),
    ]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(backend.draws.len(), 2);
    assert_eq!(backend.geometries.len(), 1, "shared core uploads once");

    // Destroying one co-referencing node must not release the core.
    let holder_1 = scene.find_node("holder-1").unwrap();
    scene.remove_node(holder_1);
    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert!(backend.destroyed_geometries.is_empty());

    // Destroying the last referent releases the buffers, once.
    let holder_2 = scene.find_node("holder-2").unwrap();
    scene.remove_node(holder_2);
    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(backend.destroyed_geometries.len(), 1);

    renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(backend.destroyed_geometries.len(), 1, "release is one-shot");
}

// ============================================================================
// Program fallback
// ============================================================================

#[test]
fn failed_program_compile_falls_back_to_default_path() {
    let desc = rig_json(vec![json!({
        "type": "shader", "name": "broken",
        "vertex": "#fail", "fragment": "...",
        "nodes": [cube_json(1.0)],
    })]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let mut backend = RecordingBackend::new();
    let mut renderer = FrameRenderer::new();

    let outcome = renderer
        .render_frame(&mut scene, &mut backend, None)
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Complete);
    assert_eq!(backend.draws.len(), 1);
    assert_eq!(backend.draws[0].program, 0, "default program path");
}
