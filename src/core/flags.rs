//! Render-mode flag cores.

use bitflags::bitflags;

bitflags! {
    /// Per-subtree render modes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RenderFlags: u32 {
        /// Subtree renders at all.
        const ENABLED      = 1 << 0;
        /// Subtree participates in picking.
        const PICKABLE     = 1 << 1;
        /// Alpha blending enabled. Does not reorder draws by itself;
        /// authors assign layer priorities for blending order.
        const TRANSPARENT  = 1 << 2;
        /// Back faces are drawn (culling off).
        const BACKFACES    = 1 << 3;
        /// Front faces wind clockwise.
        const FRONTFACE_CW = 1 << 4;
        /// Depth test enabled.
        const DEPTH_TEST   = 1 << 5;
        /// Depth writes enabled.
        const DEPTH_WRITE  = 1 << 6;
    }
}

impl Default for RenderFlags {
    fn default() -> Self {
        RenderFlags::ENABLED
            | RenderFlags::PICKABLE
            | RenderFlags::BACKFACES
            | RenderFlags::DEPTH_TEST
            | RenderFlags::DEPTH_WRITE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagsCore {
    pub flags: RenderFlags,
}

impl FlagsCore {
    #[must_use]
    pub fn new(flags: RenderFlags) -> Self {
        Self { flags }
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &FlagsPatch) -> bool {
        let next = (self.flags | patch.set) & !patch.clear;
        if next == self.flags {
            return false;
        }
        self.flags = next;
        true
    }
}

/// Flags to raise and lower. `clear` wins on overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagsPatch {
    pub set: RenderFlags,
    pub clear: RenderFlags,
}
