//! Stage (render-target) cores.
//!
//! A stage groups its subtree's draws into a separate pass slot, optionally
//! aimed at an offscreen framebuffer. Stage order is the outermost key of
//! the display-list sort.

use crate::render::backend::StageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageTarget {
    /// The frame's main target.
    #[default]
    Screen,
    /// A backend-allocated offscreen color+depth target.
    Offscreen { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StageCore {
    /// Pass slot; lower stages execute first within a frame pass.
    pub index: u32,
    pub target: StageTarget,
    /// Backend handle for an offscreen target, allocated on first use.
    pub handle: Option<StageId>,
}

impl StageCore {
    #[must_use]
    pub fn new(index: u32, target: StageTarget) -> Self {
        Self {
            index,
            target,
            handle: None,
        }
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &StagePatch) -> bool {
        let mut changed = false;
        if let Some(index) = patch.index {
            changed |= self.index != index;
            self.index = index;
        }
        if let Some(target) = patch.target {
            if self.target != target {
                self.target = target;
                self.handle = None; // stale target, reallocate
                changed = true;
            }
        }
        changed
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StagePatch {
    pub index: Option<u32>,
    pub target: Option<StageTarget>,
}
