//! Scene compiler.
//!
//! Depth-first walk of the node graph with shared-core resolution. On node
//! entry the node's core is pushed onto its category stack; at a geometry
//! leaf the current stack tops are captured into a render object; on exit
//! the stack is popped. A subtree is re-visited only when it is dirty or
//! an ancestor's pushed state changed since the last compile (the
//! conservative rule: any ancestor-category change invalidates the whole
//! descendant subtree, since descendants inherit by position).
//!
//! Instance nodes re-enter compilation at the node their `target` id
//! resolves to; a visiting set rejects cycles. Cores whose backing
//! resource is still loading (or failed) make their subtree absent from
//! the display list without erroring; the load channel re-arms a
//! recompile when the resource shows up.

use glam::Mat4;
use rustc_hash::FxHashSet;
use slotmap::Key;

use crate::compile::stacks::TraversalStacks;
use crate::core::{CoreCategory, CoreKey, CoreRegistry, RenderFlags};
use crate::display::{ObjectId, RenderObject, ResolvedState};
use crate::errors::{Result, StrataError};
use crate::scene::{NodeIndex, NodeKind, Scene};
use crate::utils::{Symbol, interner};

#[derive(Debug, Default, Clone, Copy)]
pub struct CompileStats {
    /// Nodes entered this compile.
    pub visited: usize,
    /// Subtrees skipped as clean.
    pub skipped: usize,
    /// Stack pushes that changed a category's top.
    pub transitions: usize,
    /// Load completions applied before the walk.
    pub completions: usize,
    /// Live render objects after the compile.
    pub objects: usize,
}

struct CompileCx {
    stacks: TraversalStacks,
    /// (world matrix, nearest transform node, its world revision).
    world_stack: Vec<(Mat4, Option<NodeIndex>, u64)>,
    name_stack: Vec<Symbol>,
    /// Instance targets currently being expanded; cycle detector.
    visiting: FxHashSet<NodeIndex>,
    /// Full-sweep mode after structural instance removal.
    sweep: bool,
    touched: FxHashSet<ObjectId>,
    stats: CompileStats,
}

/// Compiles the scene, re-resolving dirty paths into the display list.
///
/// Configuration errors (cyclic instances, strict missing symbols)
/// propagate to the caller; the offending subtree is abandoned but
/// sibling subtrees compiled earlier remain valid.
pub fn compile(scene: &mut Scene) -> Result<CompileStats> {
    let completions = scene.drain_load_completions();
    let sweep = std::mem::take(&mut scene.needs_sweep);

    let mut cx = CompileCx {
        stacks: TraversalStacks::new(&scene.registry),
        world_stack: vec![(Mat4::IDENTITY, None, 0)],
        name_stack: Vec::new(),
        visiting: FxHashSet::default(),
        sweep,
        touched: FxHashSet::default(),
        stats: CompileStats {
            completions,
            ..Default::default()
        },
    };

    let roots = scene.root_nodes.clone();
    let mut walk = || -> Result<()> {
        for root in roots {
            visit(scene, &mut cx, root, 0, sweep)?;
        }
        Ok(())
    };
    let result = walk();

    // Balanced stack invariant: every push was popped, even on the error
    // unwind path.
    cx.stacks.assert_balanced();
    debug_assert_eq!(cx.world_stack.len(), 1, "world stack imbalance");
    result?;

    if sweep {
        let touched = cx.touched;
        let stale: Vec<ObjectId> = scene
            .display
            .iter()
            .map(|o| o.id)
            .filter(|id| !touched.contains(id))
            .collect();
        for id in stale {
            scene.display.remove(id);
        }
    }

    cx.stats.objects = scene.display.len();
    log::debug!(
        "compile: {} visited, {} skipped, {} objects",
        cx.stats.visited,
        cx.stats.skipped,
        cx.stats.objects
    );
    Ok(cx.stats)
}

fn visit(
    scene: &mut Scene,
    cx: &mut CompileCx,
    idx: NodeIndex,
    site: u64,
    inherited_changed: bool,
) -> Result<()> {
    let Some(node) = scene.nodes.get(idx) else {
        return Ok(());
    };
    let kind = node.kind.clone();

    // Library contents compile only through instances.
    if matches!(kind, NodeKind::Library) {
        if let Some(n) = scene.nodes.get_mut(idx) {
            n.dirty = false;
            n.subtree_dirty = false;
        }
        return Ok(());
    }

    if !(inherited_changed || node.dirty || node.subtree_dirty) {
        cx.stats.skipped += 1;
        return Ok(());
    }
    cx.stats.visited += 1;

    let core = node.core;
    let category = kind.category();

    // A pending or failed non-geometry core gates its whole subtree.
    // Geometry gates only its own leaf object, further down.
    if let Some(c) = core
        && category != Some(CoreCategory::Geometry)
        && scene.registry.is_unavailable(c)
    {
        remove_subtree_objects(scene, idx);
        clear_subtree_flags(scene, idx);
        return Ok(());
    }

    let mut changed = inherited_changed;
    if let Some(c) = core
        && scene.registry.is_dirty(c)
    {
        changed = true;
        scene.registry.clear_dirty(c);
    }

    // --- enter ---
    let mut pushed_category = None;
    let mut pushed_world = false;
    let mut pushed_name = false;

    if let NodeKind::Name { name } = &kind {
        cx.name_stack.push(*name);
        pushed_name = true;
    }

    if let (Some(cat), Some(c)) = (category, core) {
        if cat == CoreCategory::Transform {
            let local = scene
                .registry
                .get(c)
                .and_then(|p| p.as_transform())
                .map_or(Mat4::IDENTITY, |t| t.matrix);
            let &(parent_world, _, _) = cx.world_stack.last().expect("world stack base");
            let world = parent_world * local;
            if let Some(n) = scene.nodes.get_mut(idx) {
                if n.world != world {
                    n.world = world;
                    n.world_rev = n.world_rev.wrapping_add(1);
                    changed = true;
                }
                cx.world_stack.push((world, Some(idx), n.world_rev));
                pushed_world = true;
            }
        }
        if cat.is_stacked() {
            if cx.stacks.push(cat, c) {
                cx.stats.transitions += 1;
            }
            pushed_category = Some(cat);
        }
    }

    // --- geometry leaf: sync its render object ---
    if kind.is_geometry()
        && let Some(c) = core
    {
        let object_id = ObjectId { leaf: idx, site };
        if scene.registry.is_unavailable(c) {
            scene.display.remove(object_id);
        } else {
            upsert_object(scene, cx, object_id, c);
        }
    }

    // --- children, in declaration order ---
    let result = match kind {
        NodeKind::Instance { target, must_exist } => {
            expand_instance(scene, cx, idx, site, target, must_exist)
        }
        _ => {
            let children = scene
                .nodes
                .get(idx)
                .map(|n| n.children.clone())
                .unwrap_or_default();
            let mut r = Ok(());
            for child in children {
                r = visit(scene, cx, child, site, changed);
                if r.is_err() {
                    break;
                }
            }
            r
        }
    };

    // --- exit: pop everything pushed, also on the error path ---
    if let Some(cat) = pushed_category {
        cx.stacks.pop(cat);
    }
    if pushed_world {
        cx.world_stack.pop();
    }
    if pushed_name {
        cx.name_stack.pop();
    }

    // Flags drop only after a clean subtree compile, so an aborted
    // subtree is revisited next time.
    if result.is_ok()
        && let Some(n) = scene.nodes.get_mut(idx)
    {
        n.dirty = false;
        n.subtree_dirty = false;
    }
    result
}

fn expand_instance(
    scene: &mut Scene,
    cx: &mut CompileCx,
    instance_idx: NodeIndex,
    site: u64,
    target: Symbol,
    must_exist: bool,
) -> Result<()> {
    let Some(target_idx) = scene.names.get(&target).copied() else {
        if must_exist {
            return Err(StrataError::SymbolNotFound {
                symbol: interner::resolve(target).to_owned(),
            });
        }
        log::warn!(
            "instance target \"{}\" not found; subtree absent",
            interner::resolve(target)
        );
        return Ok(());
    };

    if !cx.visiting.insert(target_idx) {
        return Err(StrataError::CyclicInstance {
            symbol: interner::resolve(target).to_owned(),
        });
    }

    // Distinct identity per expansion path, so the same leaf reached
    // through different instances yields different render objects.
    let new_site = site.rotate_left(17) ^ instance_idx.to_bits() ^ 0x9E37_79B9_7F4A_7C15;

    // Instances always force a full visit of the target: two sites of one
    // symbol cannot share dirty-flag bookkeeping.
    let result = if matches!(
        scene.nodes.get(target_idx).map(|n| &n.kind),
        Some(NodeKind::Library)
    ) {
        let children = scene
            .nodes
            .get(target_idx)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        let mut r = Ok(());
        for child in children {
            r = visit(scene, cx, child, new_site, true);
            if r.is_err() {
                break;
            }
        }
        r
    } else {
        visit(scene, cx, target_idx, new_site, true)
    };

    cx.visiting.remove(&target_idx);
    result
}

fn upsert_object(scene: &mut Scene, cx: &mut CompileCx, id: ObjectId, geometry: CoreKey) {
    let registry = &scene.registry;
    let stacks = &cx.stacks;
    let &(world, world_source, world_rev) = cx.world_stack.last().expect("world stack base");

    let layer_key = stacks.top(CoreCategory::Layer);
    let (layer, layer_enabled) = registry
        .get(layer_key)
        .and_then(|p| p.as_layer())
        .map_or((0, true), |l| (l.priority, l.enabled));

    let flags_key = stacks.top(CoreCategory::Flags);
    let mut flags = registry
        .get(flags_key)
        .and_then(|p| p.as_flags())
        .map_or_else(RenderFlags::default, |f| f.flags);
    if !layer_enabled {
        flags.remove(RenderFlags::ENABLED);
    }

    let stage_key = stacks.top(CoreCategory::Stage);
    let pass = registry
        .get(stage_key)
        .and_then(|p| p.as_stage())
        .map_or(0, |s| s.index);

    let program_key = stacks.top(CoreCategory::Program);
    let texture_key = stacks.top(CoreCategory::Texture);

    let state = ResolvedState {
        view: stacks.top(CoreCategory::View),
        camera: stacks.top(CoreCategory::Camera),
        material: stacks.top(CoreCategory::Material),
        lights: stacks.top(CoreCategory::Lights),
        texture: texture_key,
        program: program_key,
        shader_params: stacks.top(CoreCategory::ShaderParams),
        flags: flags_key,
        clip: stacks.top(CoreCategory::Clip),
        layer: layer_key,
        stage: stage_key,
        geometry,
        world,
        world_source,
        world_rev,
    };

    let name = cx
        .name_stack
        .last()
        .copied()
        .or_else(|| scene.nodes.get(id.leaf).and_then(|n| n.name));

    let object = RenderObject {
        id,
        seq: 0, // assigned by the display list on first insert
        name,
        pass,
        layer,
        program_sort: sort_identity(registry, program_key, CoreCategory::Program),
        texture_sort: sort_identity(registry, texture_key, CoreCategory::Texture),
        flags,
        state,
    };
    scene.display.upsert(object);
    if cx.sweep {
        cx.touched.insert(id);
    }
}

/// Compact grouping identity for the sort key; the default core maps to 0
/// so untextured/unshadered objects group together.
fn sort_identity(registry: &CoreRegistry, key: CoreKey, category: CoreCategory) -> u32 {
    if key == registry.default_core(category) {
        0
    } else {
        (key.data().as_ffi() & 0xFFFF_FFFF) as u32
    }
}

/// Drops display entries for every geometry leaf in a subtree that went
/// pending or failed.
fn remove_subtree_objects(scene: &mut Scene, root: NodeIndex) {
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        let Some(node) = scene.nodes.get(idx) else {
            continue;
        };
        let is_leaf = node.kind.is_geometry();
        stack.extend(node.children.iter().copied());
        if is_leaf {
            scene.display.remove_leaf(idx);
        }
    }
}

/// Lowers dirty bits across a skipped subtree so it does not force a
/// revisit every frame; the load-completion path re-raises them.
fn clear_subtree_flags(scene: &mut Scene, root: NodeIndex) {
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        let Some(node) = scene.nodes.get_mut(idx) else {
            continue;
        };
        node.dirty = false;
        node.subtree_dirty = false;
        stack.extend(node.children.iter().copied());
    }
}
