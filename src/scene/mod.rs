//! Scene graph.
//!
//! A [`Scene`] owns everything with scene lifetime: the node arena, the
//! core registry, the display list, the load-completion channel and the
//! event channel. There is no process-global state; two scenes are fully
//! independent.
//!
//! Nodes are created from a declarative description ([`desc`]) or removed
//! through [`Scene::remove_node`]; state changes go through the central
//! [`Scene::mutate`] entry point (with typed convenience wrappers in
//! [`mutate`]), which is the only place dirty-marking happens.

pub mod desc;
pub mod mutate;
pub mod node;

pub use node::{Node, NodeKind};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thunderdome::Arena;

use crate::assets::{LoadComplete, LoadOutcome, LoadSink, Loader};
use crate::core::{CoreKey, CorePatch, CoreRegistry};
use crate::display::DisplayList;
use crate::errors::Result;
use crate::utils::events::{EventChannel, Subscription};
use crate::utils::{Symbol, interner};

/// Index of a node in its scene's arena.
pub type NodeIndex = thunderdome::Index;

/// State-change notifications observable from outside the per-frame flow.
#[derive(Debug, Clone)]
pub enum SceneEvent {
    /// A pending resource arrived; a recompile of its subtree is armed.
    ResourceLoaded { core: CoreKey },
    /// A resource load failed or was aborted; its subtree stays absent.
    ResourceFailed { core: CoreKey, reason: String },
    /// One or more load completions were applied; the next compile will
    /// re-resolve the affected subtrees.
    RecompileScheduled,
    /// A frame was aborted by a GPU error; engine state is unchanged.
    FrameAborted { reason: String },
}

/// What a queued load request is asking for.
#[derive(Debug, Clone)]
pub(crate) enum LoadRequest {
    Geometry { core: CoreKey, stream_id: Symbol },
    MorphGeometry { core: CoreKey, stream_id: Symbol },
    Image { core: CoreKey, layer: usize, uri: Symbol },
}

pub struct Scene {
    pub(crate) nodes: Arena<Node>,
    pub(crate) root_nodes: Vec<NodeIndex>,
    pub(crate) registry: CoreRegistry,
    pub(crate) display: DisplayList,

    /// Declared node ids, scene-unique.
    pub(crate) names: FxHashMap<Symbol, NodeIndex>,
    /// Which nodes reference each core; the fan-out set for dirty-marking.
    pub(crate) core_users: FxHashMap<CoreKey, SmallVec<[NodeIndex; 2]>>,

    events: EventChannel<SceneEvent>,
    load_tx: flume::Sender<LoadComplete>,
    load_rx: flume::Receiver<LoadComplete>,
    loader: Option<Box<dyn Loader>>,
    /// Requests made before a loader was injected.
    queued_loads: Vec<LoadRequest>,
    /// Raised when structure changed in a way the dirty walk cannot see
    /// (an instance node was removed); the next compile sweeps stale
    /// objects.
    pub(crate) needs_sweep: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        let (load_tx, load_rx) = flume::unbounded();
        Self {
            nodes: Arena::new(),
            root_nodes: Vec::new(),
            registry: CoreRegistry::new(),
            display: DisplayList::new(),
            names: FxHashMap::default(),
            core_users: FxHashMap::default(),
            events: EventChannel::new(),
            load_tx,
            load_rx,
            loader: None,
            queued_loads: Vec::new(),
            needs_sweep: false,
        }
    }

    /// Builds a scene from a declarative description.
    pub fn from_description(description: &serde_json::Value) -> Result<Self> {
        let mut scene = Self::new();
        scene.add_description(None, description)?;
        Ok(scene)
    }

    /// Builds a scene from JSON text.
    pub fn from_description_str(description: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(description)?;
        Self::from_description(&value)
    }

    /// Adds a described subtree under `parent` (or at the root).
    ///
    /// Fails fast on configuration errors; on failure the subtree built so
    /// far is removed again, earlier siblings stay valid.
    pub fn add_description(
        &mut self,
        parent: Option<NodeIndex>,
        description: &serde_json::Value,
    ) -> Result<NodeIndex> {
        desc::build_node(self, parent, description, "root")
    }

    /// Injects the loader service, flushing any queued requests.
    pub fn set_loader(&mut self, loader: Box<dyn Loader>) {
        self.loader = Some(loader);
        let queued = std::mem::take(&mut self.queued_loads);
        for request in queued {
            self.dispatch_load(request);
        }
    }

    /// Subscribes to scene events. Dropping the token unsubscribes.
    #[must_use]
    pub fn subscribe_events(&self) -> (Subscription<SceneEvent>, flume::Receiver<SceneEvent>) {
        self.events.subscribe()
    }

    pub(crate) fn publish_event(&self, event: &SceneEvent) {
        self.events.publish(event);
    }

    // ========================================================================
    // Node access
    // ========================================================================

    /// Looks up a node by its declared id.
    #[must_use]
    pub fn find_node(&self, id: &str) -> Option<NodeIndex> {
        let sym = interner::get(id)?;
        self.names.get(&sym).copied()
    }

    #[must_use]
    pub fn get_node(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx)
    }

    #[must_use]
    pub fn root_nodes(&self) -> &[NodeIndex] {
        &self.root_nodes
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn registry(&self) -> &CoreRegistry {
        &self.registry
    }

    #[must_use]
    pub fn display(&self) -> &DisplayList {
        &self.display
    }

    /// The display list's current sorted order. Mostly a diagnostics and
    /// test hook; the frame renderer reads the same order internally.
    pub fn sorted_object_ids(&mut self) -> Vec<crate::display::ObjectId> {
        self.display.sorted().to_vec()
    }

    // ========================================================================
    // Graph mutation
    // ========================================================================

    /// Inserts a constructed node, wiring hierarchy, name table and core
    /// back-references. Used by the description builder.
    pub(crate) fn insert_node(
        &mut self,
        node: Node,
        parent: Option<NodeIndex>,
    ) -> Result<NodeIndex> {
        if let Some(name) = node.name
            && self.names.contains_key(&name)
        {
            return Err(crate::errors::StrataError::DuplicateNodeId(
                interner::resolve(name).to_owned(),
            ));
        }
        let name = node.name;
        let core = node.core;
        let idx = self.nodes.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(p) = self.nodes.get_mut(parent_idx) {
                p.children.push(idx);
            } else {
                log::error!("parent node not found during insert");
                self.root_nodes.push(idx);
            }
            if let Some(n) = self.nodes.get_mut(idx) {
                n.parent = Some(parent_idx);
            }
        } else {
            self.root_nodes.push(idx);
        }

        if let Some(name) = name {
            self.names.insert(name, idx);
        }
        if let Some(core) = core {
            self.core_users.entry(core).or_default().push(idx);
        }
        self.mark_dirty(idx);
        Ok(idx)
    }

    /// Destroys a node and its whole subtree.
    ///
    /// Each destroyed node releases its core reference; a core shared with
    /// surviving nodes lives on, an orphaned core queues its GPU handles
    /// for release exactly once.
    pub fn remove_node(&mut self, idx: NodeIndex) {
        let Some(node) = self.nodes.get(idx) else {
            return;
        };
        let children = node.children.clone();
        for child in children {
            self.remove_node(child);
        }

        let parent_opt = self.nodes.get(idx).and_then(|n| n.parent);
        if let Some(parent_idx) = parent_opt {
            if let Some(parent) = self.nodes.get_mut(parent_idx)
                && let Some(pos) = parent.children.iter().position(|&x| x == idx)
            {
                parent.children.remove(pos);
            }
            self.mark_dirty(parent_idx);
        } else if let Some(pos) = self.root_nodes.iter().position(|&x| x == idx) {
            self.root_nodes.remove(pos);
        }

        let Some(node) = self.nodes.remove(idx) else {
            return;
        };
        if let Some(name) = node.name {
            self.names.remove(&name);
        }
        if node.kind.is_geometry() {
            self.display.remove_leaf(idx);
        }
        if matches!(node.kind, NodeKind::Instance { .. }) {
            // Objects expanded through this instance live under leaves
            // elsewhere in the graph; only a sweep can find them.
            self.needs_sweep = true;
        }
        if let Some(core) = node.core {
            if let Some(users) = self.core_users.get_mut(&core) {
                users.retain(|&u| u != idx);
                if users.is_empty() {
                    self.core_users.remove(&core);
                }
            }
            self.registry.release(core);
        }
    }

    // ========================================================================
    // State mutation
    // ========================================================================

    /// The single mutation entry point.
    ///
    /// Applies `patch` to `node`'s core. When the core actually changed,
    /// every node referencing it (not just `node`) is dirtied, so the next
    /// compile re-resolves all affected subtrees. Safe to call at any
    /// point between frames.
    pub fn mutate(&mut self, node: NodeIndex, patch: CorePatch) -> bool {
        let Some(core) = self.nodes.get(node).and_then(|n| n.core) else {
            log::warn!("mutate on node without a core");
            return false;
        };
        let changed = self.registry.apply_patch(core, &patch);
        if changed {
            self.dirty_core_users(core);
        }
        changed
    }

    /// [`Scene::mutate`] addressed by declared node id.
    pub fn mutate_by_id(&mut self, id: &str, patch: CorePatch) -> bool {
        match self.find_node(id) {
            Some(idx) => self.mutate(idx, patch),
            None => {
                log::warn!("mutate_by_id: no node with id \"{id}\"");
                false
            }
        }
    }

    /// Marks every node referencing `core` dirty.
    pub(crate) fn dirty_core_users(&mut self, core: CoreKey) {
        if let Some(users) = self.core_users.get(&core) {
            let users: SmallVec<[NodeIndex; 2]> = users.clone();
            for user in users {
                self.mark_dirty(user);
            }
        }
    }

    /// Raises the node's dirty bit and the `subtree_dirty` bit on every
    /// ancestor, so the compiler can find its way down. The ancestor walk
    /// stops early at the first already-marked ancestor (its own ancestors
    /// are marked by invariant).
    pub(crate) fn mark_dirty(&mut self, idx: NodeIndex) {
        let Some(node) = self.nodes.get_mut(idx) else {
            return;
        };
        node.dirty = true;
        let mut cur = node.parent;
        while let Some(p) = cur {
            let Some(pn) = self.nodes.get_mut(p) else {
                break;
            };
            if pn.subtree_dirty {
                break;
            }
            pn.subtree_dirty = true;
            cur = pn.parent;
        }
    }

    // ========================================================================
    // Resource loading
    // ========================================================================

    /// Requests an asynchronous load for a pending core. Dispatched right
    /// away when a loader is present, queued otherwise.
    pub(crate) fn request_load(&mut self, request: LoadRequest) {
        if self.loader.is_some() {
            self.dispatch_load(request);
        } else {
            self.queued_loads.push(request);
        }
    }

    fn dispatch_load(&mut self, request: LoadRequest) {
        let Some(loader) = self.loader.as_mut() else {
            self.queued_loads.push(request);
            return;
        };
        match request {
            LoadRequest::Geometry { core, stream_id } => {
                let wanted = self.registry.arm_pending(core);
                let sink = LoadSink::new(core, 0, self.load_tx.clone(), wanted);
                loader.load_geometry(interner::resolve(stream_id), sink);
            }
            LoadRequest::MorphGeometry { core, stream_id } => {
                let wanted = self.registry.arm_pending(core);
                let sink = LoadSink::new(core, 0, self.load_tx.clone(), wanted);
                loader.load_morph_geometry(interner::resolve(stream_id), sink);
            }
            LoadRequest::Image { core, layer, uri } => {
                let wanted = self.registry.arm_pending(core);
                let sink = LoadSink::new(core, layer, self.load_tx.clone(), wanted);
                loader.load_image(interner::resolve(uri), sink);
            }
        }
    }

    /// Applies every load completion that arrived since the last call.
    ///
    /// Called by the compiler before traversal; a filled core is marked
    /// dirty so its subtree re-enters the display list this compile.
    /// Returns how many completions were applied.
    pub(crate) fn drain_load_completions(&mut self) -> usize {
        let completions: Vec<LoadComplete> = self.load_rx.try_iter().collect();
        let count = completions.len();
        for completion in completions {
            let core = completion.core;
            if !self.registry.contains(core) {
                continue; // destroyed while in flight
            }
            match completion.outcome {
                LoadOutcome::Geometry(data) => {
                    self.registry.complete_geometry_load(core, data);
                    self.publish_event(&SceneEvent::ResourceLoaded { core });
                }
                LoadOutcome::MorphTargets(targets) => {
                    self.registry.complete_morph_load(core, targets);
                    self.publish_event(&SceneEvent::ResourceLoaded { core });
                }
                LoadOutcome::Image(image) => {
                    self.registry
                        .complete_image_load(core, completion.layer, image);
                    self.publish_event(&SceneEvent::ResourceLoaded { core });
                }
                LoadOutcome::Error(reason) => {
                    self.registry.mark_failed(core);
                    self.publish_event(&SceneEvent::ResourceFailed {
                        core,
                        reason: reason.clone(),
                    });
                    log::warn!("resource load failed for core {core:?}: {reason}");
                }
                LoadOutcome::Aborted => {
                    self.registry.mark_failed(core);
                    self.publish_event(&SceneEvent::ResourceFailed {
                        core,
                        reason: "aborted".to_owned(),
                    });
                }
            }
            self.dirty_core_users(core);
        }
        if count > 0 {
            self.publish_event(&SceneEvent::RecompileScheduled);
        }
        count
    }
}
