//! State-change chunks.
//!
//! A chunk is the state-transition unit derived from one core for one
//! category. Chunks are cached by `(source, revision)` so two render
//! objects sharing a core share one chunk instance, and an unchanged graph
//! recompiles to the exact same chunk identities. The frame renderer
//! applies a chunk only when its [`ChunkId`] differs from the previous
//! draw's chunk of the same category; identical ids are a guaranteed
//! no-op.

use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thunderdome::Index as NodeIndex;

use crate::core::{
    ApplyTarget, BlendMode, ClipPlane, CoreKey, CoreRegistry, LightSource, ParamValue, RenderFlags,
};
use crate::display::{RenderObject, ResolvedState};
use crate::render::backend::{ProgramId, TextureId};
use crate::utils::Symbol;

/// Chunk categories, in application order within a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkCategory {
    Program,
    Params,
    View,
    Camera,
    Clip,
    Flags,
    Lights,
    Material,
    Texture,
    Transform,
    PickColor,
}

/// Application order for the regular render path. `PickColor` replaces
/// `Params`/`Lights`/`Material`/`Texture` in picking sub-mode.
pub const RENDER_CHUNK_ORDER: [ChunkCategory; 10] = [
    ChunkCategory::Program,
    ChunkCategory::Params,
    ChunkCategory::View,
    ChunkCategory::Camera,
    ChunkCategory::Clip,
    ChunkCategory::Flags,
    ChunkCategory::Lights,
    ChunkCategory::Material,
    ChunkCategory::Texture,
    ChunkCategory::Transform,
];

pub const CHUNK_CATEGORY_COUNT: usize = 11;

impl ChunkCategory {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            ChunkCategory::Program => 0,
            ChunkCategory::Params => 1,
            ChunkCategory::View => 2,
            ChunkCategory::Camera => 3,
            ChunkCategory::Clip => 4,
            ChunkCategory::Flags => 5,
            ChunkCategory::Lights => 6,
            ChunkCategory::Material => 7,
            ChunkCategory::Texture => 8,
            ChunkCategory::Transform => 9,
            ChunkCategory::PickColor => 10,
        }
    }
}

/// One texture layer as the backend sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureChunkLayer {
    pub texture: TextureId,
    pub apply_to: ApplyTarget,
    pub blend_mode: BlendMode,
    pub blend_factor: f32,
}

/// A serializable state transition, ready for [`RenderBackend::apply`].
///
/// [`RenderBackend::apply`]: crate::render::backend::RenderBackend::apply
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Program {
        program: ProgramId,
    },
    Params {
        values: SmallVec<[(Symbol, ParamValue); 4]>,
    },
    View {
        matrix: Mat4,
        eye: Vec3,
    },
    Camera {
        matrix: Mat4,
    },
    Clip {
        planes: SmallVec<[ClipPlane; 4]>,
    },
    Flags {
        flags: RenderFlags,
    },
    Lights {
        sources: SmallVec<[LightSource; 4]>,
    },
    Material {
        base_color: Vec3,
        specular_color: Vec3,
        specular: f32,
        shine: f32,
        emit: f32,
        alpha: f32,
    },
    Texture {
        layers: SmallVec<[TextureChunkLayer; 4]>,
    },
    Transform {
        world: Mat4,
        normal: Mat3,
    },
    /// Picking sub-mode replacement: the object id encoded as a color.
    PickColor {
        rgba: [f32; 4],
    },
}

impl Chunk {
    #[must_use]
    pub fn category(&self) -> ChunkCategory {
        match self {
            Chunk::Program { .. } => ChunkCategory::Program,
            Chunk::Params { .. } => ChunkCategory::Params,
            Chunk::View { .. } => ChunkCategory::View,
            Chunk::Camera { .. } => ChunkCategory::Camera,
            Chunk::Clip { .. } => ChunkCategory::Clip,
            Chunk::Flags { .. } => ChunkCategory::Flags,
            Chunk::Lights { .. } => ChunkCategory::Lights,
            Chunk::Material { .. } => ChunkCategory::Material,
            Chunk::Texture { .. } => ChunkCategory::Texture,
            Chunk::Transform { .. } => ChunkCategory::Transform,
            Chunk::PickColor { .. } => ChunkCategory::PickColor,
        }
    }
}

/// What a chunk was derived from.
///
/// Most chunks come from a core. Transform chunks come from the nearest
/// transform *node* instead: a shared transform core can sit at several
/// graph positions with different composed worlds, so the node is the
/// correct sharing unit there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkSource {
    Core(CoreKey),
    World(Option<NodeIndex>),
}

/// Chunk identity: source plus revision. Equal ids mean "applying this
/// chunk after that one is a no-op".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId {
    pub source: ChunkSource,
    pub revision: u64,
}

/// Cache of built chunks keyed by identity.
#[derive(Default)]
pub struct ChunkCache {
    map: FxHashMap<ChunkId, Arc<Chunk>>,
}

impl ChunkCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached chunk for `id`, building it on first sight.
    pub fn get_or_build(
        &mut self,
        id: ChunkId,
        build: impl FnOnce() -> Chunk,
    ) -> Arc<Chunk> {
        Arc::clone(self.map.entry(id).or_insert_with(|| Arc::new(build())))
    }

    /// Drops entries whose source revision has moved on.
    ///
    /// World-sourced entries are dropped wholesale; they are cheap to
    /// rebuild and their revisions live on nodes the registry cannot see,
    /// so holding them here would accumulate one entry per transform
    /// mutation forever.
    pub fn prune(&mut self, registry: &CoreRegistry) {
        self.map.retain(|id, _| match id.source {
            ChunkSource::Core(key) => registry.revision(key) == id.revision,
            ChunkSource::World(_) => false,
        });
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ============================================================================
// Chunk factory
// ============================================================================

/// Identity of the chunk `object` needs for `category`.
#[must_use]
pub fn chunk_id_for(
    registry: &CoreRegistry,
    object: &RenderObject,
    category: ChunkCategory,
) -> ChunkId {
    let state = &object.state;
    match category {
        ChunkCategory::Transform => ChunkId {
            source: ChunkSource::World(state.world_source),
            revision: state.world_rev,
        },
        _ => {
            let key = core_for(state, category);
            ChunkId {
                source: ChunkSource::Core(key),
                revision: registry.revision(key),
            }
        }
    }
}

/// Builds the chunk `object` needs for `category` from its resolved cores.
#[must_use]
pub fn build_chunk(
    registry: &CoreRegistry,
    object: &RenderObject,
    category: ChunkCategory,
) -> Chunk {
    let state = &object.state;
    match category {
        ChunkCategory::Program => {
            let program = registry
                .get(state.program)
                .and_then(|p| p.as_program())
                .and_then(|p| if p.failed { None } else { p.handle })
                .unwrap_or(0); // default program path
            Chunk::Program { program }
        }
        ChunkCategory::Params => {
            let values = registry
                .get(state.shader_params)
                .and_then(|p| p.as_shader_params())
                .map(|p| p.values.iter().copied().collect())
                .unwrap_or_default();
            Chunk::Params { values }
        }
        ChunkCategory::View => {
            let view = registry
                .get(state.view)
                .and_then(|p| p.as_view())
                .expect("view core");
            Chunk::View {
                matrix: view.matrix,
                eye: view.eye,
            }
        }
        ChunkCategory::Camera => {
            let camera = registry
                .get(state.camera)
                .and_then(|p| p.as_camera())
                .expect("camera core");
            Chunk::Camera {
                matrix: camera.matrix,
            }
        }
        ChunkCategory::Clip => {
            let planes = registry
                .get(state.clip)
                .and_then(|p| p.as_clip())
                .map(|c| c.planes.clone())
                .unwrap_or_default();
            Chunk::Clip { planes }
        }
        ChunkCategory::Flags => Chunk::Flags {
            flags: object.flags,
        },
        ChunkCategory::Lights => {
            let sources = registry
                .get(state.lights)
                .and_then(|p| p.as_lights())
                .map(|l| l.sources.clone())
                .unwrap_or_default();
            Chunk::Lights { sources }
        }
        ChunkCategory::Material => {
            let m = registry
                .get(state.material)
                .and_then(|p| p.as_material())
                .copied()
                .unwrap_or_default();
            Chunk::Material {
                base_color: m.base_color,
                specular_color: m.specular_color,
                specular: m.specular,
                shine: m.shine,
                emit: m.emit,
                alpha: m.alpha,
            }
        }
        ChunkCategory::Texture => {
            let layers = registry
                .get(state.texture)
                .and_then(|p| p.as_texture())
                .map(|t| {
                    t.layers
                        .iter()
                        .filter_map(|l| {
                            l.texture_id.map(|texture| TextureChunkLayer {
                                texture,
                                apply_to: l.apply_to,
                                blend_mode: l.blend_mode,
                                blend_factor: l.blend_factor,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Chunk::Texture { layers }
        }
        ChunkCategory::Transform => Chunk::Transform {
            world: state.world,
            normal: crate::core::transform::normal_from(&state.world),
        },
        ChunkCategory::PickColor => Chunk::PickColor {
            rgba: encode_pick_color(object.seq),
        },
    }
}

fn core_for(state: &ResolvedState, category: ChunkCategory) -> CoreKey {
    match category {
        ChunkCategory::Program => state.program,
        ChunkCategory::Params => state.shader_params,
        ChunkCategory::View => state.view,
        ChunkCategory::Camera => state.camera,
        ChunkCategory::Clip => state.clip,
        ChunkCategory::Flags => state.flags,
        ChunkCategory::Lights => state.lights,
        ChunkCategory::Material => state.material,
        ChunkCategory::Texture => state.texture,
        ChunkCategory::Transform | ChunkCategory::PickColor => {
            unreachable!("not core-sourced")
        }
    }
}

// ============================================================================
// Pick color encoding
// ============================================================================

/// Encodes a render-object sequence as a 24-bit color. Zero is reserved
/// for "nothing here", so ids are offset by one.
#[must_use]
pub fn encode_pick_color(seq: u32) -> [f32; 4] {
    let id = seq + 1;
    [
        (id & 0xFF) as f32 / 255.0,
        ((id >> 8) & 0xFF) as f32 / 255.0,
        ((id >> 16) & 0xFF) as f32 / 255.0,
        1.0,
    ]
}

/// Decodes a read-back RGBA8 pixel to a render-object sequence.
#[must_use]
pub fn decode_pick_color(rgba: [u8; 4]) -> Option<u32> {
    let id = u32::from(rgba[0]) | (u32::from(rgba[1]) << 8) | (u32::from(rgba[2]) << 16);
    id.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_color_round_trip() {
        for seq in [0u32, 1, 255, 256, 65_535, 1_000_000] {
            let c = encode_pick_color(seq);
            let bytes = [
                (c[0] * 255.0).round() as u8,
                (c[1] * 255.0).round() as u8,
                (c[2] * 255.0).round() as u8,
                255,
            ];
            assert_eq!(decode_pick_color(bytes), Some(seq));
        }
    }

    #[test]
    fn background_decodes_to_none() {
        assert_eq!(decode_pick_color([0, 0, 0, 0]), None);
    }
}
