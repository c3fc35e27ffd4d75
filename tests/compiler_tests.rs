//! Compiler Tests
//!
//! Tests for:
//! - Render-object synthesis per geometry leaf
//! - Idempotent recompiles: identical order and chunk identities
//! - Dirty-subtree scoping: clean siblings are not revisited
//! - Instance/symbol expansion, cycle detection, missing targets
//! - Fail-fast configuration errors with description paths

mod common;

use common::{cube_json, rig_json};
use glam::Vec3;
use serde_json::json;
use strata::chunk::{self, ChunkId};
use strata::errors::StrataError;
use strata::{Scene, compile};

fn chunk_ids(scene: &Scene, id: strata::ObjectId) -> Vec<ChunkId> {
    let obj = scene.display().get(id).unwrap();
    chunk::RENDER_CHUNK_ORDER
        .iter()
        .map(|&category| chunk::chunk_id_for(scene.registry(), obj, category))
        .collect()
}

// ============================================================================
// Basic compilation
// ============================================================================

#[test]
fn one_render_object_per_geometry_leaf() {
    let desc = rig_json(vec![json!({
        "type": "material",
        "nodes": [cube_json(1.0), cube_json(0.5), cube_json(0.25)],
    })]);
    let mut scene = Scene::from_description(&desc).unwrap();
    let stats = compile(&mut scene).unwrap();
    assert_eq!(stats.objects, 3);
    assert_eq!(scene.display().len(), 3);
}

#[test]
fn leaf_captures_nearest_ancestor_state() {
    let desc = rig_json(vec![json!({
        "type": "material",
        "id": "outer",
        "baseColor": { "r": 1.0, "g": 0.0, "b": 0.0 },
        "nodes": [{
            "type": "material",
            "id": "inner",
            "baseColor": { "r": 0.0, "g": 0.0, "b": 1.0 },
            "nodes": [cube_json(1.0)],
        }],
    })]);
    let mut scene = Scene::from_description(&desc).unwrap();
    compile(&mut scene).unwrap();

    let inner = scene.find_node("inner").unwrap();
    let inner_core = scene.get_node(inner).unwrap().core().unwrap();
    let obj = scene.display().iter().next().unwrap();
    assert_eq!(obj.state.material, inner_core);
}

#[test]
fn recompiling_an_unchanged_graph_is_identical_and_free() {
    let desc = rig_json(vec![json!({
        "type": "material",
        "nodes": [cube_json(1.0), cube_json(0.5)],
    })]);
    let mut scene = Scene::from_description(&desc).unwrap();
    compile(&mut scene).unwrap();

    let order_first = scene.sorted_object_ids();
    let ids_first: Vec<_> = order_first.iter().map(|&o| chunk_ids(&scene, o)).collect();

    let stats = compile(&mut scene).unwrap();
    assert_eq!(stats.visited, 0, "clean graph must not be re-walked");

    let order_second = scene.sorted_object_ids();
    let ids_second: Vec<_> = order_second.iter().map(|&o| chunk_ids(&scene, o)).collect();

    assert_eq!(order_first, order_second);
    assert_eq!(ids_first, ids_second, "no spurious chunk identities");
}

#[test]
fn leaf_mutation_does_not_recompile_clean_siblings() {
    let desc = json!({
        "type": "node",
        "nodes": [
            { "type": "material", "id": "hot", "nodes": [cube_json(1.0)] },
            { "type": "material", "id": "cold", "nodes": [cube_json(1.0)] },
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    compile(&mut scene).unwrap();

    let hot = scene.find_node("hot").unwrap();
    scene.set_base_color(hot, Vec3::new(0.5, 0.5, 0.0));

    let stats = compile(&mut scene).unwrap();
    // Root + hot + its leaf; the cold subtree is skipped at its root.
    assert_eq!(stats.visited, 3);
    assert_eq!(stats.skipped, 1);
}

#[test]
fn ancestor_mutation_invalidates_whole_subtree() {
    let desc = json!({
        "type": "translate", "id": "mover", "x": 0.0,
        "nodes": [
            { "type": "material", "nodes": [cube_json(1.0)] },
            { "type": "material", "nodes": [cube_json(1.0)] },
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    compile(&mut scene).unwrap();

    let mover = scene.find_node("mover").unwrap();
    scene.set_translation(mover, Vec3::new(2.0, 0.0, 0.0));

    let stats = compile(&mut scene).unwrap();
    // Every descendant re-captures: mover + 2 materials + 2 leaves.
    assert_eq!(stats.visited, 5);
    assert_eq!(stats.skipped, 0);

    for obj in scene.display().iter() {
        assert!((obj.state.world.w_axis.x - 2.0).abs() < 1e-6);
    }
}

// ============================================================================
// Instances & symbols
// ============================================================================

#[test]
fn instances_expand_symbol_subtrees_at_each_site() {
    let desc = json!({
        "type": "node",
        "nodes": [
            { "type": "library", "nodes": [
                { "type": "material", "id": "proto", "nodes": [cube_json(1.0)] },
            ]},
            { "type": "translate", "x": -2.0, "nodes": [
                { "type": "instance", "id": "i1", "target": "proto" },
            ]},
            { "type": "translate", "x": 2.0, "nodes": [
                { "type": "instance", "id": "i2", "target": "proto" },
            ]},
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    compile(&mut scene).unwrap();
    assert_eq!(scene.display().len(), 2, "one object per instance site");

    let mut xs: Vec<f32> = scene
        .display()
        .iter()
        .map(|o| o.state.world.w_axis.x)
        .collect();
    xs.sort_by(f32::total_cmp);
    assert_eq!(xs, vec![-2.0, 2.0]);
}

#[test]
fn removing_an_instance_sweeps_its_objects() {
    let desc = json!({
        "type": "node",
        "nodes": [
            { "type": "library", "nodes": [
                { "type": "material", "id": "sym", "nodes": [cube_json(1.0)] },
            ]},
            { "type": "instance", "id": "i1", "target": "sym" },
            { "type": "instance", "id": "i2", "target": "sym" },
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    compile(&mut scene).unwrap();
    assert_eq!(scene.display().len(), 2);

    let i1 = scene.find_node("i1").unwrap();
    scene.remove_node(i1);
    compile(&mut scene).unwrap();
    assert_eq!(scene.display().len(), 1);
}

#[test]
fn cyclic_instances_are_rejected() {
    let desc = json!({
        "type": "node",
        "nodes": [
            { "type": "node", "id": "a", "nodes": [
                { "type": "instance", "target": "b" },
            ]},
            { "type": "node", "id": "b", "nodes": [
                { "type": "instance", "target": "a" },
            ]},
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let err = compile(&mut scene).unwrap_err();
    assert!(matches!(err, StrataError::CyclicInstance { .. }));
}

#[test]
fn missing_instance_target_renders_nothing() {
    let desc = json!({
        "type": "node",
        "nodes": [{ "type": "instance", "target": "ghost" }],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    compile(&mut scene).unwrap();
    assert_eq!(scene.display().len(), 0);
}

#[test]
fn must_exist_promotes_missing_target_to_fatal() {
    let desc = json!({
        "type": "node",
        "nodes": [{ "type": "instance", "target": "ghost", "mustExist": true }],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let err = compile(&mut scene).unwrap_err();
    assert!(matches!(err, StrataError::SymbolNotFound { symbol } if symbol == "ghost"));
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn unknown_node_type_fails_with_path() {
    let desc = json!({
        "type": "node",
        "nodes": [{ "type": "wibble" }],
    });
    let err = Scene::from_description(&desc).unwrap_err();
    match err {
        StrataError::UnknownNodeType { type_name, path } => {
            assert_eq!(type_name, "wibble");
            assert_eq!(path, "root.nodes[0]");
        }
        other => panic!("expected UnknownNodeType, got {other:?}"),
    }
}

#[test]
fn missing_required_param_fails_with_node_type() {
    let desc = json!({ "type": "shader", "fragment": "..." });
    let err = Scene::from_description(&desc).unwrap_err();
    assert!(matches!(
        err,
        StrataError::MissingParam { node_type: "shader", param: "vertex", .. }
    ));
}

#[test]
fn failed_subtree_leaves_earlier_siblings_valid() {
    let mut scene = Scene::new();
    scene
        .add_description(None, &rig_json(vec![cube_json(1.0)]))
        .unwrap();
    let err = scene.add_description(None, &json!({ "type": "nonsense" }));
    assert!(err.is_err());

    compile(&mut scene).unwrap();
    assert_eq!(scene.display().len(), 1, "earlier sibling still compiles");
}
