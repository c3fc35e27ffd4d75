//! Layer (draw-priority) cores.

/// Explicit draw-order control independent of graph position.
///
/// Lower priorities draw first. This is the author's tool for correct
/// blending of nested transparent geometry; the engine never reorders
/// transparent objects automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerCore {
    pub priority: i32,
    pub enabled: bool,
}

impl Default for LayerCore {
    fn default() -> Self {
        Self {
            priority: 0,
            enabled: true,
        }
    }
}

impl LayerCore {
    #[must_use]
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            enabled: true,
        }
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &LayerPatch) -> bool {
        let before = *self;
        if let Some(p) = patch.priority {
            self.priority = p;
        }
        if let Some(e) = patch.enabled {
            self.enabled = e;
        }
        *self != before
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LayerPatch {
    pub priority: Option<i32>,
    pub enabled: Option<bool>,
}
