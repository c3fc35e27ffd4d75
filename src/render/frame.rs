//! Frame renderer / multi-pass driver.
//!
//! Per frame: compile the scene, prepare GPU resources for every live
//! render object, then for each configured pass walk the sorted display
//! list, diff-and-applying chunks through [`TrackedState`] and issuing one
//! draw per object. Stage boundaries inside the sorted order open and
//! close backend pass targets.
//!
//! Stereo and similar effects configure more than one pass; the per-pass
//! callback may override view/projection for its pass only, without
//! touching scene state, so passes cannot leak into each other.
//!
//! A backend failure mid-frame aborts the frame: the display list and the
//! core registry are left exactly as they were, so a later retry (e.g.
//! after context restoration) recompiles cleanly.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashSet;

use crate::chunk::{self, Chunk, ChunkCache, ChunkCategory, ChunkId, ChunkSource, RENDER_CHUNK_ORDER};
use crate::compile;
use crate::core::{CoreKey, CorePayload, GeometryBuffers, GpuRelease, StageTarget};
use crate::display::ObjectId;
use crate::errors::{Result, StrataError};
use crate::render::backend::{PassTarget, RenderBackend};
use crate::render::tracked::TrackedState;
use crate::scene::{Scene, SceneEvent};

/// Terminal state of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// All passes executed and presented.
    Complete,
    /// A GPU error aborted the frame; engine state is unchanged.
    Aborted,
}

/// Counters for the last completed frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub passes: u32,
    pub draws: usize,
    pub chunks_applied: usize,
    pub chunks_elided: usize,
    pub objects: usize,
}

/// Pass-local view/projection overrides handed to the per-pass callback.
///
/// Overrides apply to the pass being opened and evaporate afterwards;
/// they never write through to the scene's view or camera cores.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassContext {
    pub(crate) view: Option<(Mat4, Vec3)>,
    pub(crate) projection: Option<Mat4>,
}

impl PassContext {
    /// Overrides the viewing transform for this pass.
    pub fn set_view(&mut self, eye: Vec3, look: Vec3, up: Vec3) {
        self.view = Some((Mat4::look_at_rh(eye, look, up), eye));
    }

    /// Overrides the viewing transform with an explicit matrix.
    pub fn set_view_matrix(&mut self, matrix: Mat4, eye: Vec3) {
        self.view = Some((matrix, eye));
    }

    /// Overrides the projection for this pass.
    pub fn set_projection(&mut self, matrix: Mat4) {
        self.projection = Some(matrix);
    }
}

pub struct FrameRenderer {
    pub(crate) chunks: ChunkCache,
    pub(crate) tracked: TrackedState,
    num_passes: u32,
    clear_color: [f32; 4],
    frame_index: u64,
    /// Identity source for pass-override chunks; never collides with a
    /// core- or node-derived chunk id.
    override_nonce: u64,
    last_stats: FrameStats,
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: ChunkCache::new(),
            tracked: TrackedState::new(),
            num_passes: 1,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            frame_index: 0,
            override_nonce: 0,
            last_stats: FrameStats::default(),
        }
    }

    /// Number of frame passes; stereo configures 2. Clamped to at least 1.
    pub fn set_num_passes(&mut self, n: u32) {
        self.num_passes = n.max(1);
    }

    #[must_use]
    pub fn num_passes(&self) -> u32 {
        self.num_passes
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    #[must_use]
    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Renders one frame.
    ///
    /// Configuration errors from compilation (unknown symbols in strict
    /// mode, instance cycles) propagate as `Err`. GPU errors abort the
    /// frame, publish [`SceneEvent::FrameAborted`], and return
    /// [`FrameOutcome::Aborted`] with engine state untouched.
    pub fn render_frame(
        &mut self,
        scene: &mut Scene,
        backend: &mut dyn RenderBackend,
        mut pass_callback: Option<&mut dyn FnMut(u32, &mut PassContext)>,
    ) -> Result<FrameOutcome> {
        compile::compile(scene)?;

        match self.execute(scene, backend, pass_callback.as_deref_mut()) {
            Ok(()) => Ok(FrameOutcome::Complete),
            Err(e) => {
                log::error!("frame aborted: {e}");
                scene.publish_event(&SceneEvent::FrameAborted {
                    reason: e.to_string(),
                });
                Ok(FrameOutcome::Aborted)
            }
        }
    }

    fn execute(
        &mut self,
        scene: &mut Scene,
        backend: &mut dyn RenderBackend,
        mut pass_callback: Option<&mut dyn FnMut(u32, &mut PassContext)>,
    ) -> Result<()> {
        prepare_resources(scene, backend)?;
        release_orphans(scene, backend);

        self.frame_index += 1;
        if self.frame_index.is_multiple_of(64) {
            self.chunks.prune(&scene.registry);
        }

        self.tracked.reset_counters();
        let mut draws = 0usize;
        let order: Vec<ObjectId> = scene.display.sorted().to_vec();

        for pass in 0..self.num_passes {
            let mut pass_ctx = PassContext::default();
            if let Some(cb) = pass_callback.as_mut() {
                cb(pass, &mut pass_ctx);
            }

            let mut current_stage: Option<u32> = None;
            let mut in_pass = false;

            for id in &order {
                let Some(obj) = scene.display.get(*id) else {
                    continue;
                };
                if !obj.enabled() {
                    continue;
                }

                if current_stage != Some(obj.pass) {
                    if in_pass {
                        backend.end_pass()?;
                    }
                    let target = stage_target(scene, obj.state.stage)?;
                    backend.begin_pass(target, Some(self.clear_color))?;
                    self.tracked.reset();
                    in_pass = true;
                    current_stage = Some(obj.pass);
                    self.apply_pass_overrides(backend, &pass_ctx)?;
                }

                for category in RENDER_CHUNK_ORDER {
                    // Pass overrides stand in for every object's view or
                    // camera chunk for the whole pass.
                    if pass_ctx.view.is_some() && category == ChunkCategory::View {
                        continue;
                    }
                    if pass_ctx.projection.is_some() && category == ChunkCategory::Camera {
                        continue;
                    }
                    let cid = chunk::chunk_id_for(&scene.registry, obj, category);
                    let built = self
                        .chunks
                        .get_or_build(cid, || chunk::build_chunk(&scene.registry, obj, category));
                    self.tracked.apply(backend, cid, &built)?;
                }

                if let Some(buffers) = geometry_buffers(scene, obj.state.geometry) {
                    backend.draw(buffers.id)?;
                    draws += 1;
                }
            }

            if in_pass {
                backend.end_pass()?;
            }
        }

        self.last_stats = FrameStats {
            passes: self.num_passes,
            draws,
            chunks_applied: self.tracked.applied(),
            chunks_elided: self.tracked.elided(),
            objects: order.len(),
        };
        Ok(())
    }

    fn apply_pass_overrides(
        &mut self,
        backend: &mut dyn RenderBackend,
        pass_ctx: &PassContext,
    ) -> Result<()> {
        if let Some((matrix, eye)) = pass_ctx.view {
            self.override_nonce += 1;
            let id = ChunkId {
                source: ChunkSource::World(None),
                revision: u64::MAX - self.override_nonce,
            };
            self.tracked
                .apply(backend, id, &Chunk::View { matrix, eye })?;
        }
        if let Some(matrix) = pass_ctx.projection {
            self.override_nonce += 1;
            let id = ChunkId {
                source: ChunkSource::World(None),
                revision: u64::MAX - self.override_nonce,
            };
            self.tracked.apply(backend, id, &Chunk::Camera { matrix })?;
        }
        Ok(())
    }
}

/// Resolves an object's stage core to a backend pass target.
fn stage_target(scene: &Scene, stage: CoreKey) -> Result<PassTarget> {
    let Some(core) = scene.registry.get(stage).and_then(|p| p.as_stage()) else {
        return Ok(PassTarget::Screen);
    };
    match core.target {
        StageTarget::Screen => Ok(PassTarget::Screen),
        StageTarget::Offscreen { .. } => core
            .handle
            .map(PassTarget::Offscreen)
            .ok_or_else(|| StrataError::Gpu("offscreen stage target was not prepared".into())),
    }
}

fn geometry_buffers(scene: &Scene, geometry: CoreKey) -> Option<GeometryBuffers> {
    scene
        .registry
        .get(geometry)
        .and_then(|p| p.as_geometry())
        .and_then(|g| g.buffers)
}

/// Hands orphaned GPU handles to the backend, exactly once each.
fn release_orphans(scene: &mut Scene, backend: &mut dyn RenderBackend) {
    for release in scene.registry.drain_releases() {
        match release {
            GpuRelease::Program(id) => backend.destroy_program(id),
            GpuRelease::Geometry(id) => backend.destroy_geometry(id),
            GpuRelease::Texture(id) => backend.destroy_texture(id),
            GpuRelease::Stage(id) => backend.destroy_stage(id),
        }
    }
}

/// Ensures every core referenced by a live render object has its backend
/// resources: compiled program, uploaded buffers and textures, allocated
/// stage targets.
///
/// Program compile failures fall back to the default program path (the
/// core is marked failed and its chunk selects program 0); upload
/// failures are device-level and abort the frame.
pub(crate) fn prepare_resources(scene: &mut Scene, backend: &mut dyn RenderBackend) -> Result<()> {
    let mut geometries = FxHashSet::default();
    let mut programs = FxHashSet::default();
    let mut textures = FxHashSet::default();
    let mut stages = FxHashSet::default();
    for obj in scene.display.iter() {
        geometries.insert(obj.state.geometry);
        programs.insert(obj.state.program);
        textures.insert(obj.state.texture);
        stages.insert(obj.state.stage);
    }

    for key in programs {
        let mut bump = false;
        if let Some(CorePayload::Program(core)) = scene.registry.payload_mut(key)
            && core.handle.is_none()
            && !core.failed
            && let Some(artifact) = core.artifact.clone()
        {
            match backend.create_program(&artifact) {
                Ok(handle) => {
                    core.handle = Some(handle);
                }
                Err(e) => {
                    log::warn!(
                        "program \"{}\" failed to compile ({e}); using default program path",
                        artifact.name
                    );
                    core.failed = true;
                }
            }
            bump = true;
        }
        if bump {
            scene.registry.bump_revision(key);
        }
    }

    for key in geometries {
        let mut upload: Option<(crate::core::GeometryData, crate::core::Primitive, f32)> = None;
        if let Some(CorePayload::Geometry(core)) = scene.registry.payload_mut(key)
            && core.buffers.is_none()
            && let Some(data) = &core.data
        {
            let factor = core.morph.as_ref().map_or(0.0, |m| m.factor);
            upload = Some((data.clone(), core.primitive, factor));
        }
        if let Some((data, primitive, factor)) = upload {
            let id = backend.upload_geometry(&data, primitive)?;
            if let Some(CorePayload::Geometry(core)) = scene.registry.payload_mut(key) {
                core.buffers = Some(GeometryBuffers {
                    id,
                    index_count: data.indices.len() as u32,
                });
                if let Some(morph) = &mut core.morph {
                    morph.uploaded_factor = Some(factor);
                }
            }
        }
    }

    for key in textures {
        let mut uploads: Vec<(usize, crate::core::ImageData)> = Vec::new();
        if let Some(CorePayload::Texture(core)) = scene.registry.payload_mut(key) {
            for (i, layer) in core.layers.iter().enumerate() {
                if layer.texture_id.is_none()
                    && let Some(image) = &layer.image
                {
                    uploads.push((i, image.clone()));
                }
            }
        }
        if uploads.is_empty() {
            continue;
        }
        for (i, image) in uploads {
            let id = backend.upload_texture(&image)?;
            if let Some(CorePayload::Texture(core)) = scene.registry.payload_mut(key)
                && let Some(layer) = core.layers.get_mut(i)
            {
                layer.texture_id = Some(id);
            }
        }
        scene.registry.bump_revision(key);
    }

    for key in stages {
        let mut create: Option<(u32, u32)> = None;
        if let Some(CorePayload::Stage(core)) = scene.registry.payload_mut(key)
            && core.handle.is_none()
            && let StageTarget::Offscreen { width, height } = core.target
        {
            create = Some((width, height));
        }
        if let Some((width, height)) = create {
            let id = backend.create_stage(width, height)?;
            if let Some(CorePayload::Stage(core)) = scene.registry.payload_mut(key) {
                core.handle = Some(id);
            }
        }
    }

    Ok(())
}
