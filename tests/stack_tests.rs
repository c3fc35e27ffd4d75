//! Traversal Stack Tests
//!
//! Tests for:
//! - Default-core fallback when a stack is empty
//! - LIFO push/pop and the top_changed signal
//! - Balance accounting across a simulated traversal

use strata::compile::TraversalStacks;
use strata::core::{CoreCategory, CorePayload, CoreRegistry, MaterialCore};

fn material_core(registry: &mut CoreRegistry) -> strata::CoreKey {
    registry
        .acquire(CoreCategory::Material, None, || {
            Ok(CorePayload::Material(MaterialCore::default()))
        })
        .unwrap()
}

#[test]
fn empty_stack_tops_out_at_default_core() {
    let registry = CoreRegistry::new();
    let stacks = TraversalStacks::new(&registry);
    assert_eq!(
        stacks.top(CoreCategory::Material),
        registry.default_core(CoreCategory::Material)
    );
    assert_eq!(stacks.depth(CoreCategory::Material), 0);
}

#[test]
fn push_pop_restores_default() {
    let mut registry = CoreRegistry::new();
    let core = material_core(&mut registry);
    let mut stacks = TraversalStacks::new(&registry);

    stacks.push(CoreCategory::Material, core);
    assert_eq!(stacks.top(CoreCategory::Material), core);
    stacks.pop(CoreCategory::Material);
    assert_eq!(
        stacks.top(CoreCategory::Material),
        registry.default_core(CoreCategory::Material)
    );
}

#[test]
fn top_changed_signal_fires_only_on_actual_change() {
    let mut registry = CoreRegistry::new();
    let a = material_core(&mut registry);
    let b = material_core(&mut registry);
    let mut stacks = TraversalStacks::new(&registry);

    // Default -> a is a change.
    assert!(stacks.push(CoreCategory::Material, a));
    // a -> a is not.
    assert!(!stacks.push(CoreCategory::Material, a));
    // a -> b is.
    assert!(stacks.push(CoreCategory::Material, b));

    stacks.pop(CoreCategory::Material);
    stacks.pop(CoreCategory::Material);
    stacks.pop(CoreCategory::Material);
    assert_eq!(stacks.total_depth(), 0);
}

#[test]
fn categories_are_independent() {
    let mut registry = CoreRegistry::new();
    let mat = material_core(&mut registry);
    let mut stacks = TraversalStacks::new(&registry);

    stacks.push(CoreCategory::Material, mat);
    assert_eq!(stacks.depth(CoreCategory::Material), 1);
    assert_eq!(stacks.depth(CoreCategory::Layer), 0);
    assert_eq!(
        stacks.top(CoreCategory::Layer),
        registry.default_core(CoreCategory::Layer)
    );
    stacks.pop(CoreCategory::Material);
}

#[test]
fn nested_pushes_unwind_in_order() {
    let mut registry = CoreRegistry::new();
    let outer = material_core(&mut registry);
    let inner = material_core(&mut registry);
    let mut stacks = TraversalStacks::new(&registry);

    stacks.push(CoreCategory::Material, outer);
    stacks.push(CoreCategory::Material, inner);
    assert_eq!(stacks.top(CoreCategory::Material), inner);
    stacks.pop(CoreCategory::Material);
    assert_eq!(stacks.top(CoreCategory::Material), outer);
    stacks.pop(CoreCategory::Material);
    assert_eq!(stacks.total_depth(), 0);
    stacks.assert_balanced(); // no-op on a balanced stack set
}
