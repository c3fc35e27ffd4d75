//! LookAt (viewing transform) cores.

use glam::{Mat4, Vec3};

/// Eye/look/up viewing state with its baked view matrix.
#[derive(Debug, Clone)]
pub struct ViewCore {
    pub eye: Vec3,
    pub look: Vec3,
    pub up: Vec3,
    /// Baked right-handed view matrix.
    pub matrix: Mat4,
}

impl ViewCore {
    #[must_use]
    pub fn new(eye: Vec3, look: Vec3, up: Vec3) -> Self {
        Self {
            eye,
            look,
            up,
            matrix: bake(eye, look, up),
        }
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &ViewPatch) -> bool {
        let (eye, look, up) = (self.eye, self.look, self.up);

        if let Some(e) = patch.eye {
            self.eye = e;
        }
        if let Some(d) = patch.inc_eye {
            self.eye += d;
        }
        if let Some(l) = patch.look {
            self.look = l;
        }
        if let Some(d) = patch.inc_look {
            self.look += d;
        }
        if let Some(u) = patch.up {
            self.up = u;
        }

        let changed = self.eye != eye || self.look != look || self.up != up;
        if changed {
            self.matrix = bake(self.eye, self.look, self.up);
        }
        changed
    }
}

impl Default for ViewCore {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y)
    }
}

/// Patch for view cores. `inc_*` deltas are applied after absolute sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewPatch {
    pub eye: Option<Vec3>,
    pub inc_eye: Option<Vec3>,
    pub look: Option<Vec3>,
    pub inc_look: Option<Vec3>,
    pub up: Option<Vec3>,
}

fn bake(eye: Vec3, look: Vec3, up: Vec3) -> Mat4 {
    // Degenerate eye==look or parallel up: fall back to identity rather
    // than producing NaNs in every descendant draw.
    let forward = look - eye;
    if forward.length_squared() < 1e-12 || forward.cross(up).length_squared() < 1e-12 {
        log::warn!("degenerate lookAt (eye {eye:?}, look {look:?}, up {up:?})");
        return Mat4::IDENTITY;
    }
    Mat4::look_at_rh(eye, look, up)
}
