//! State Core Registry
//!
//! Interns immutable-once-built state cores by `(category, coreId)` and
//! reference-counts them across every node that declares the same
//! `coreId`. Nodes without a `coreId` get a private, unshared slot.
//!
//! The registry is also the single mutation entry point: every setter on
//! `Scene` lowers to [`CoreRegistry::apply_patch`], which bumps the core's
//! revision and raises its dirty bit. Chunk caches key off revisions, so
//! centralizing the bump here is what makes "no spurious state-change
//! chunks" checkable.
//!
//! GPU-side handles owned by a destroyed core are queued as
//! [`GpuRelease`] entries and drained by the frame renderer, so a handle
//! is released exactly once even when several nodes shared the core.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::core::{
    CATEGORY_COUNT, CoreCategory, CoreKey, CorePatch, CorePayload, GeometryData, ImageData,
};
use crate::errors::{Result, StrataError};
use crate::render::backend::{GeometryBuffersId, ProgramId, StageId, TextureId};
use crate::utils::{Symbol, interner};

/// A GPU resource whose owning core reached refcount zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuRelease {
    Program(ProgramId),
    Geometry(GeometryBuffersId),
    Texture(TextureId),
    Stage(StageId),
}

pub(crate) struct CoreSlot {
    pub payload: CorePayload,
    pub refcount: u32,
    /// Bumped on every observable mutation; chunk identity keys off this.
    pub revision: u64,
    /// Raised by mutation and load completion, lowered after recompile.
    pub dirty: bool,
    /// Backing resource not yet available; subtree skipped while set.
    pub pending: bool,
    /// Backing resource failed to load; subtree absent until reconfigured.
    pub failed: bool,
    pub shared_id: Option<Symbol>,
    /// Cancellation token for an in-flight load. Cleared to `false` when
    /// the core is destroyed so stale completions are dropped.
    pub wanted: Option<Arc<AtomicBool>>,
}

pub struct CoreRegistry {
    slots: SlotMap<CoreKey, CoreSlot>,
    shared: FxHashMap<(CoreCategory, Symbol), CoreKey>,
    defaults: [CoreKey; CATEGORY_COUNT],
    releases: Vec<GpuRelease>,
}

impl Default for CoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut slots: SlotMap<CoreKey, CoreSlot> = SlotMap::with_key();
        let mut defaults = [CoreKey::default(); CATEGORY_COUNT];
        for category in CoreCategory::ALL {
            let payload = default_payload(category);
            defaults[category.index()] = slots.insert(CoreSlot {
                payload,
                refcount: 1, // owned by the registry itself
                revision: 0,
                dirty: false,
                pending: false,
                failed: false,
                shared_id: None,
                wanted: None,
            });
        }
        Self {
            slots,
            shared: FxHashMap::default(),
            defaults,
            releases: Vec::new(),
        }
    }

    /// The default core that sits beneath `category`'s stack.
    #[inline]
    #[must_use]
    pub fn default_core(&self, category: CoreCategory) -> CoreKey {
        self.defaults[category.index()]
    }

    #[inline]
    #[must_use]
    pub fn is_default(&self, key: CoreKey) -> bool {
        self.defaults.contains(&key)
    }

    // ========================================================================
    // Acquire / Release
    // ========================================================================

    /// Whether a shared core is already registered for `(category, id)`.
    #[must_use]
    pub fn has_shared(&self, category: CoreCategory, id: Symbol) -> bool {
        self.shared.contains_key(&(category, id))
    }

    /// Returns the existing core for `(category, core_id)` with its
    /// refcount bumped, or builds and registers a new one.
    ///
    /// A builder failure returns [`StrataError::ResourceBuild`] and
    /// registers nothing.
    pub fn acquire(
        &mut self,
        category: CoreCategory,
        core_id: Option<Symbol>,
        builder: impl FnOnce() -> std::result::Result<CorePayload, String>,
    ) -> Result<CoreKey> {
        if let Some(id) = core_id
            && let Some(&existing) = self.shared.get(&(category, id))
        {
            self.slots[existing].refcount += 1;
            return Ok(existing);
        }

        let payload = builder().map_err(|reason| StrataError::ResourceBuild {
            category,
            core_id: core_id.map_or_else(|| "(private)".to_owned(), |s| {
                interner::resolve(s).to_owned()
            }),
            reason,
        })?;
        debug_assert_eq!(payload.category(), category);

        let pending = initial_pending(&payload);
        let key = self.slots.insert(CoreSlot {
            payload,
            refcount: 1,
            revision: 0,
            dirty: false,
            pending,
            failed: false,
            shared_id: core_id,
            wanted: None,
        });
        if let Some(id) = core_id {
            self.shared.insert((category, id), key);
        }
        Ok(key)
    }

    /// Drops one reference. At zero the core is destroyed and its GPU
    /// handles are queued for release.
    pub fn release(&mut self, key: CoreKey) {
        if self.is_default(key) {
            return;
        }
        let Some(slot) = self.slots.get_mut(key) else {
            log::error!("release of dead core {key:?}");
            return;
        };
        slot.refcount -= 1;
        if slot.refcount > 0 {
            return;
        }

        let slot = self.slots.remove(key).expect("slot checked above");
        if let Some(wanted) = &slot.wanted {
            wanted.store(false, Ordering::Relaxed);
        }
        if let Some(id) = slot.shared_id {
            self.shared.remove(&(slot.payload.category(), id));
        }
        collect_releases(&slot.payload, &mut self.releases);
    }

    /// GPU handles orphaned since the last drain. The frame renderer hands
    /// these to the backend once per frame.
    pub fn drain_releases(&mut self) -> Vec<GpuRelease> {
        std::mem::take(&mut self.releases)
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn get(&self, key: CoreKey) -> Option<&CorePayload> {
        self.slots.get(key).map(|s| &s.payload)
    }

    /// Mutable payload access for resource preparation (buffer upload,
    /// program compile). Does not bump the revision; observable state
    /// changes must go through [`CoreRegistry::apply_patch`].
    #[inline]
    pub(crate) fn payload_mut(&mut self, key: CoreKey) -> Option<&mut CorePayload> {
        self.slots.get_mut(key).map(|s| &mut s.payload)
    }

    /// Revision bump without a patch, for resource preparation that
    /// changes what a chunk would contain (a compiled program handle, an
    /// uploaded texture id).
    pub(crate) fn bump_revision(&mut self, key: CoreKey) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.revision = slot.revision.wrapping_add(1);
        }
    }

    #[inline]
    #[must_use]
    pub fn revision(&self, key: CoreKey) -> u64 {
        self.slots.get(key).map_or(0, |s| s.revision)
    }

    #[inline]
    #[must_use]
    pub fn refcount(&self, key: CoreKey) -> u32 {
        self.slots.get(key).map_or(0, |s| s.refcount)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: CoreKey) -> bool {
        self.slots.contains_key(key)
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self, key: CoreKey) -> bool {
        self.slots.get(key).is_some_and(|s| s.dirty)
    }

    pub(crate) fn clear_dirty(&mut self, key: CoreKey) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.dirty = false;
        }
    }

    /// True while the core's backing resource is loading, or after its
    /// load failed. Either way the subtree does not render.
    #[inline]
    #[must_use]
    pub fn is_unavailable(&self, key: CoreKey) -> bool {
        self.slots.get(key).is_some_and(|s| s.pending || s.failed)
    }

    #[inline]
    #[must_use]
    pub fn is_failed(&self, key: CoreKey) -> bool {
        self.slots.get(key).is_some_and(|s| s.failed)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// The single mutation entry point. Applies `patch`, and when the
    /// payload actually changed bumps the revision and raises the dirty
    /// bit. Returns whether anything changed.
    pub fn apply_patch(&mut self, key: CoreKey, patch: &CorePatch) -> bool {
        let Some(slot) = self.slots.get_mut(key) else {
            log::error!("patch against dead core {key:?}");
            return false;
        };
        let changed = match (&mut slot.payload, patch) {
            (CorePayload::Transform(c), CorePatch::Transform(p)) => c.apply(p),
            (CorePayload::View(c), CorePatch::View(p)) => c.apply(p),
            (CorePayload::Camera(c), CorePatch::Camera(p)) => c.apply(p),
            (CorePayload::Material(c), CorePatch::Material(p)) => c.apply(p),
            (CorePayload::Lights(c), CorePatch::Lights(p)) => c.apply(p),
            (CorePayload::Texture(c), CorePatch::Texture(p)) => {
                let old: Vec<Option<TextureId>> =
                    c.layers.iter().map(|l| l.texture_id).collect();
                let changed = c.apply(p);
                if changed {
                    for (layer, old_id) in c.layers.iter().zip(old) {
                        if layer.texture_id.is_none()
                            && let Some(id) = old_id
                        {
                            self.releases.push(GpuRelease::Texture(id));
                        }
                    }
                }
                changed
            }
            (CorePayload::Program(c), CorePatch::Program(p)) => {
                let old = c.handle;
                let changed = c.apply(p);
                if changed
                    && c.handle.is_none()
                    && let Some(id) = old
                {
                    self.releases.push(GpuRelease::Program(id));
                }
                changed
            }
            (CorePayload::ShaderParams(c), CorePatch::ShaderParams(p)) => c.apply(p),
            (CorePayload::Flags(c), CorePatch::Flags(p)) => c.apply(p),
            (CorePayload::Layer(c), CorePatch::Layer(p)) => c.apply(p),
            (CorePayload::Clip(c), CorePatch::Clip(p)) => c.apply(p),
            (CorePayload::Stage(c), CorePatch::Stage(p)) => c.apply(p),
            (CorePayload::Geometry(c), CorePatch::Geometry(p)) => {
                let old = c.buffers;
                let changed = c.apply(p);
                if changed
                    && c.buffers.is_none()
                    && let Some(old) = old
                {
                    self.releases.push(GpuRelease::Geometry(old.id));
                }
                changed
            }
            (payload, patch) => {
                log::error!(
                    "{} patch against {} core",
                    patch.category(),
                    payload.category()
                );
                false
            }
        };
        if changed {
            slot.revision = slot.revision.wrapping_add(1);
            slot.dirty = true;
        }
        changed
    }

    // ========================================================================
    // Pending resource lifecycle
    // ========================================================================

    /// Arms a pending load on `key` and returns its "still wanted" token.
    pub(crate) fn arm_pending(&mut self, key: CoreKey) -> Arc<AtomicBool> {
        let token = Arc::new(AtomicBool::new(true));
        if let Some(slot) = self.slots.get_mut(key) {
            slot.pending = true;
            slot.wanted = Some(Arc::clone(&token));
        }
        token
    }

    /// Fills a pending geometry core with loaded data.
    pub(crate) fn complete_geometry_load(&mut self, key: CoreKey, data: GeometryData) {
        let Some(slot) = self.slots.get_mut(key) else {
            return;
        };
        let CorePayload::Geometry(core) = &mut slot.payload else {
            log::error!("geometry load completion against {} core", slot.payload.category());
            return;
        };
        let stale = core.buffers;
        match core.complete_load(data) {
            Ok(()) => {
                if let Some(stale) = stale {
                    self.releases.push(GpuRelease::Geometry(stale.id));
                }
                slot.pending = false;
                slot.failed = false;
                slot.wanted = None;
                slot.revision = slot.revision.wrapping_add(1);
                slot.dirty = true;
            }
            Err(reason) => {
                log::warn!("loaded geometry rejected: {reason}");
                self.mark_failed(key);
            }
        }
    }

    /// Fills a pending morph-geometry core with its loaded targets.
    pub(crate) fn complete_morph_load(&mut self, key: CoreKey, targets: Vec<GeometryData>) {
        let Some(slot) = self.slots.get_mut(key) else {
            return;
        };
        let CorePayload::Geometry(core) = &mut slot.payload else {
            log::error!("morph load completion against {} core", slot.payload.category());
            return;
        };
        let stale = core.buffers;
        match core.complete_morph_load(targets) {
            Ok(()) => {
                if let Some(stale) = stale {
                    self.releases.push(GpuRelease::Geometry(stale.id));
                }
                slot.pending = false;
                slot.failed = false;
                slot.wanted = None;
                slot.revision = slot.revision.wrapping_add(1);
                slot.dirty = true;
            }
            Err(reason) => {
                log::warn!("loaded morph targets rejected: {reason}");
                self.mark_failed(key);
            }
        }
    }

    /// Fills one layer of a pending texture core with a loaded image.
    pub(crate) fn complete_image_load(&mut self, key: CoreKey, layer: usize, image: ImageData) {
        let Some(slot) = self.slots.get_mut(key) else {
            return;
        };
        let CorePayload::Texture(core) = &mut slot.payload else {
            log::error!("image load completion against {} core", slot.payload.category());
            return;
        };
        let Some(l) = core.layers.get_mut(layer) else {
            log::error!("image load completion for out-of-range layer {layer}");
            return;
        };
        if let Some(stale) = l.texture_id {
            self.releases.push(GpuRelease::Texture(stale));
        }
        l.image = Some(image.pad_to_pot());
        l.texture_id = None;
        if core.all_loaded() {
            slot.pending = false;
            slot.failed = false;
            slot.wanted = None;
        }
        slot.revision = slot.revision.wrapping_add(1);
        slot.dirty = true;
    }

    /// Marks a core's backing resource as failed. The subtree stays absent
    /// until the core is reconfigured or destroyed.
    pub(crate) fn mark_failed(&mut self, key: CoreKey) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.pending = false;
            slot.failed = true;
            slot.wanted = None;
            slot.revision = slot.revision.wrapping_add(1);
            slot.dirty = true;
        }
    }

    /// Marks a program core as failed-to-compile. Draws fall back to the
    /// default program path instead of aborting.
    pub(crate) fn mark_program_failed(&mut self, key: CoreKey) {
        if let Some(slot) = self.slots.get_mut(key)
            && let CorePayload::Program(core) = &mut slot.payload
        {
            core.failed = true;
        }
    }
}

fn default_payload(category: CoreCategory) -> CorePayload {
    match category {
        CoreCategory::Transform => CorePayload::Transform(Default::default()),
        CoreCategory::View => CorePayload::View(Default::default()),
        CoreCategory::Camera => CorePayload::Camera(Default::default()),
        CoreCategory::Material => CorePayload::Material(Default::default()),
        CoreCategory::Lights => CorePayload::Lights(Default::default()),
        CoreCategory::Texture => CorePayload::Texture(Default::default()),
        CoreCategory::Program => CorePayload::Program(Default::default()),
        CoreCategory::ShaderParams => CorePayload::ShaderParams(Default::default()),
        CoreCategory::Flags => CorePayload::Flags(Default::default()),
        CoreCategory::Layer => CorePayload::Layer(Default::default()),
        CoreCategory::Clip => CorePayload::Clip(Default::default()),
        CoreCategory::Stage => CorePayload::Stage(Default::default()),
        // Never drawn; a leaf always carries its own geometry core.
        CoreCategory::Geometry => CorePayload::Geometry(
            crate::core::GeometryCore::stream(interner::intern("(default)"), Default::default()),
        ),
    }
}

fn initial_pending(payload: &CorePayload) -> bool {
    match payload {
        CorePayload::Geometry(core) => core.data.is_none(),
        CorePayload::Texture(core) => !core.all_loaded(),
        _ => false,
    }
}

fn collect_releases(payload: &CorePayload, out: &mut Vec<GpuRelease>) {
    match payload {
        CorePayload::Program(core) => {
            if let Some(handle) = core.handle {
                out.push(GpuRelease::Program(handle));
            }
        }
        CorePayload::Geometry(core) => {
            if let Some(buffers) = core.buffers {
                out.push(GpuRelease::Geometry(buffers.id));
            }
        }
        CorePayload::Texture(core) => {
            for layer in &core.layers {
                if let Some(id) = layer.texture_id {
                    out.push(GpuRelease::Texture(id));
                }
            }
        }
        CorePayload::Stage(core) => {
            if let Some(handle) = core.handle {
                out.push(GpuRelease::Stage(handle));
            }
        }
        _ => {}
    }
}
