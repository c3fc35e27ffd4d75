//! Core Registry & Shared-Core Tests
//!
//! Tests for:
//! - Shared-core invariant: a mutation through one node is observable
//!   through every node declaring the same coreId
//! - Private cores stay independent
//! - Reference counting across node removal
//! - Build failures register nothing

use glam::Vec3;
use serde_json::json;
use strata::errors::StrataError;
use strata::{CoreCategory, Scene};

// ============================================================================
// Shared cores
// ============================================================================

#[test]
fn shared_core_mutation_is_observable_through_every_node() {
    let desc = json!({
        "type": "node",
        "nodes": [
            { "type": "material", "id": "m1", "coreId": "shared-mat",
              "baseColor": { "r": 1.0, "g": 0.0, "b": 0.0 } },
            { "type": "material", "id": "m2", "coreId": "shared-mat" },
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let m1 = scene.find_node("m1").unwrap();
    let m2 = scene.find_node("m2").unwrap();

    // Both see the first declaration's state.
    assert_eq!(scene.get_base_color(m2), Some(Vec3::new(1.0, 0.0, 0.0)));

    // A set through one is a get through the other.
    assert!(scene.set_base_color(m1, Vec3::new(0.0, 1.0, 0.0)));
    assert_eq!(scene.get_base_color(m2), Some(Vec3::new(0.0, 1.0, 0.0)));
}

#[test]
fn private_cores_are_independent() {
    let desc = json!({
        "type": "node",
        "nodes": [
            { "type": "material", "id": "a", "baseColor": { "r": 1.0, "g": 1.0, "b": 1.0 } },
            { "type": "material", "id": "b", "baseColor": { "r": 1.0, "g": 1.0, "b": 1.0 } },
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let a = scene.find_node("a").unwrap();
    let b = scene.find_node("b").unwrap();

    scene.set_base_color(a, Vec3::new(0.2, 0.3, 0.4));
    assert_eq!(scene.get_base_color(b), Some(Vec3::new(1.0, 1.0, 1.0)));
}

// ============================================================================
// Reference counting
// ============================================================================

#[test]
fn shared_core_survives_until_last_referent_removed() {
    let desc = json!({
        "type": "node",
        "nodes": [
            { "type": "material", "id": "m1", "coreId": "rc-mat" },
            { "type": "material", "id": "m2", "coreId": "rc-mat" },
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let m1 = scene.find_node("m1").unwrap();
    let m2 = scene.find_node("m2").unwrap();
    let core = scene.get_node(m1).unwrap().core().unwrap();
    assert_eq!(core, scene.get_node(m2).unwrap().core().unwrap());
    assert_eq!(scene.registry().refcount(core), 2);

    scene.remove_node(m1);
    assert_eq!(scene.registry().refcount(core), 1);
    assert!(scene.registry().contains(core));

    scene.remove_node(m2);
    assert!(!scene.registry().contains(core));
}

#[test]
fn removing_a_subtree_releases_descendant_cores() {
    let desc = json!({
        "type": "node",
        "id": "root",
        "nodes": [
            { "type": "material", "id": "mat", "nodes": [
                { "type": "translate", "id": "t", "x": 1.0 },
            ]},
        ],
    });
    let mut scene = Scene::from_description(&desc).unwrap();
    let mat = scene.find_node("mat").unwrap();
    let mat_core = scene.get_node(mat).unwrap().core().unwrap();
    let t_core = {
        let t = scene.find_node("t").unwrap();
        scene.get_node(t).unwrap().core().unwrap()
    };

    scene.remove_node(mat);
    assert!(!scene.registry().contains(mat_core));
    assert!(!scene.registry().contains(t_core));
    assert!(scene.find_node("t").is_none());
}

// ============================================================================
// Build failures
// ============================================================================

#[test]
fn invalid_geometry_fails_as_resource_build_error() {
    let desc = json!({
        "type": "geometry",
        "positions": [0.0, 0.0, 0.0,  1.0, 0.0, 0.0,  0.0, 1.0, 0.0],
        "indices": [0, 1, 9],
    });
    let err = Scene::from_description(&desc).unwrap_err();
    match err {
        StrataError::ResourceBuild { category, .. } => {
            assert_eq!(category, CoreCategory::Geometry);
        }
        other => panic!("expected ResourceBuild, got {other:?}"),
    }
}

#[test]
fn failed_build_leaves_no_core_behind() {
    let bad = json!({
        "type": "geometry",
        "coreId": "never-registered",
        "positions": [0.0, 0.0, 0.0],
        "indices": [5],
    });
    let mut scene = Scene::new();
    assert!(scene.add_description(None, &bad).is_err());

    // The same coreId is buildable afterwards: nothing partial stuck.
    let good = json!({
        "type": "geometry",
        "coreId": "never-registered",
        "positions": [0.0, 0.0, 0.0,  1.0, 0.0, 0.0,  0.0, 1.0, 0.0],
        "indices": [0, 1, 2],
    });
    assert!(scene.add_description(None, &good).is_ok());
}

#[test]
fn duplicate_node_id_is_rejected() {
    let desc = json!({
        "type": "node",
        "nodes": [
            { "type": "material", "id": "dup" },
            { "type": "material", "id": "dup" },
        ],
    });
    let err = Scene::from_description(&desc).unwrap_err();
    assert!(matches!(err, StrataError::DuplicateNodeId(name) if name == "dup"));
}
