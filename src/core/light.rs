//! Light cores.
//!
//! A lights core holds the complete set of light sources active for its
//! subtree. Nesting replaces rather than accumulates: the nearest ancestor
//! lights core wins, per the uniform top-of-stack rule.

use glam::Vec3;
use smallvec::SmallVec;

/// Positional form of one light source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Direction the light travels, in world space.
    Directional(Vec3),
    Point {
        pos: Vec3,
        constant_attenuation: f32,
        linear_attenuation: f32,
        quadratic_attenuation: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    pub kind: LightKind,
    pub color: Vec3,
    pub diffuse: bool,
    pub specular: bool,
}

impl Default for LightSource {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional(Vec3::new(0.0, 0.0, -1.0)),
            color: Vec3::splat(1.0),
            diffuse: true,
            specular: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LightsCore {
    pub sources: SmallVec<[LightSource; 4]>,
}

impl LightsCore {
    #[must_use]
    pub fn new(sources: impl IntoIterator<Item = LightSource>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
        }
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &LightsPatch) -> bool {
        match patch {
            LightsPatch::ReplaceAll(sources) => {
                if self.sources.as_slice() == sources.as_slice() {
                    return false;
                }
                self.sources = SmallVec::from_slice(sources);
                true
            }
            LightsPatch::SetColor { index, color } => {
                let Some(source) = self.sources.get_mut(*index) else {
                    log::error!("light index {index} out of range");
                    return false;
                };
                if source.color == *color {
                    return false;
                }
                source.color = *color;
                true
            }
            LightsPatch::SetKind { index, kind } => {
                let Some(source) = self.sources.get_mut(*index) else {
                    log::error!("light index {index} out of range");
                    return false;
                };
                if source.kind == *kind {
                    return false;
                }
                source.kind = *kind;
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum LightsPatch {
    ReplaceAll(Vec<LightSource>),
    SetColor { index: usize, color: Vec3 },
    SetKind { index: usize, kind: LightKind },
}
