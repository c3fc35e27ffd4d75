//! Render objects.
//!
//! One render object exists per geometry leaf reached by compilation. It
//! references (never copies) the core that was on top of each category
//! stack when the leaf was visited; those references go stale exactly when
//! an ancestor core changes without a recompile, which is why ancestor
//! mutation dirties whole subtrees.

use glam::Mat4;
use thunderdome::Index as NodeIndex;

use crate::core::{CoreKey, RenderFlags};
use crate::utils::Symbol;

/// Stable identity of a render object.
///
/// The same leaf can be reached through several instance sites, so the
/// leaf index alone is not unique; `site` folds the chain of instance
/// nodes that led here (0 for a directly-reached leaf).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub leaf: NodeIndex,
    pub site: u64,
}

impl ObjectId {
    #[must_use]
    pub fn direct(leaf: NodeIndex) -> Self {
        Self { leaf, site: 0 }
    }

    /// Extends an instance chain with one more instance node.
    #[must_use]
    pub fn via(leaf: NodeIndex, site: u64) -> Self {
        Self { leaf, site }
    }
}

/// The top-of-stack core for every category, captured at compile time.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedState {
    pub view: CoreKey,
    pub camera: CoreKey,
    pub material: CoreKey,
    pub lights: CoreKey,
    pub texture: CoreKey,
    pub program: CoreKey,
    pub shader_params: CoreKey,
    pub flags: CoreKey,
    pub clip: CoreKey,
    pub layer: CoreKey,
    pub stage: CoreKey,
    pub geometry: CoreKey,
    /// Composed world matrix at the leaf.
    pub world: Mat4,
    /// Nearest ancestor transform node, the world chunk's cache source.
    pub world_source: Option<NodeIndex>,
    /// Revision of the composed world, bumped when composition changes.
    pub world_rev: u64,
}

#[derive(Debug, Clone)]
pub struct RenderObject {
    pub id: ObjectId,
    /// Insertion sequence; the deterministic tie-break of the sort.
    pub seq: u32,
    /// Pick name from the nearest ancestor name node, if any.
    pub name: Option<Symbol>,
    /// Snapshots of sort-relevant and filter-relevant state. Kept on the
    /// object (not read through the cores at draw time) so sorting cannot
    /// observe half-mutated state; mutation recompiles and re-snapshots.
    pub pass: u32,
    pub layer: i32,
    pub program_sort: u32,
    pub texture_sort: u32,
    pub flags: RenderFlags,
    pub state: ResolvedState,
}

impl RenderObject {
    /// The fields whose change forces a display-list re-sort.
    #[inline]
    #[must_use]
    pub fn sort_fields(&self) -> (u32, i32, u32, u32) {
        (self.pass, self.layer, self.program_sort, self.texture_sort)
    }

    #[inline]
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.flags.contains(RenderFlags::ENABLED)
    }

    #[inline]
    #[must_use]
    pub fn pickable(&self) -> bool {
        self.flags.contains(RenderFlags::PICKABLE) && self.enabled()
    }
}
