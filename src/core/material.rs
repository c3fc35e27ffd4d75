//! Material cores.

use glam::Vec3;

/// Surface color parameters for the fixed material model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialCore {
    pub base_color: Vec3,
    pub specular_color: Vec3,
    /// Specular reflection amount, 0..1.
    pub specular: f32,
    /// Specular exponent.
    pub shine: f32,
    /// Self-illumination amount, 0..1.
    pub emit: f32,
    /// Opacity, 0..1. Blending itself is controlled by the `transparent`
    /// render flag; alpha alone does not reorder draws.
    pub alpha: f32,
}

impl Default for MaterialCore {
    fn default() -> Self {
        Self {
            base_color: Vec3::splat(1.0),
            specular_color: Vec3::splat(1.0),
            specular: 1.0,
            shine: 70.0,
            emit: 0.0,
            alpha: 1.0,
        }
    }
}

impl MaterialCore {
    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &MaterialPatch) -> bool {
        let before = *self;
        if let Some(c) = patch.base_color {
            self.base_color = c;
        }
        if let Some(c) = patch.specular_color {
            self.specular_color = c;
        }
        if let Some(s) = patch.specular {
            self.specular = s;
        }
        if let Some(s) = patch.shine {
            self.shine = s;
        }
        if let Some(e) = patch.emit {
            self.emit = e;
        }
        if let Some(a) = patch.alpha {
            self.alpha = a.clamp(0.0, 1.0);
        }
        *self != before
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialPatch {
    pub base_color: Option<Vec3>,
    pub specular_color: Option<Vec3>,
    pub specular: Option<f32>,
    pub shine: Option<f32>,
    pub emit: Option<f32>,
    pub alpha: Option<f32>,
}
