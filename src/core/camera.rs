//! Camera (projection) cores.

use glam::Mat4;

/// Projection declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Optics {
    Perspective {
        fovy_deg: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Ortho {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
    Frustum {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Optics {
    fn default() -> Self {
        Optics::Perspective {
            fovy_deg: 45.0,
            aspect: 1.0,
            near: 0.1,
            far: 5000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraCore {
    pub optics: Optics,
    /// Baked projection matrix.
    pub matrix: Mat4,
}

impl CameraCore {
    #[must_use]
    pub fn new(optics: Optics) -> Self {
        Self {
            optics,
            matrix: bake(optics),
        }
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &CameraPatch) -> bool {
        if patch.optics == self.optics {
            return false;
        }
        self.optics = patch.optics;
        self.matrix = bake(self.optics);
        true
    }
}

impl Default for CameraCore {
    fn default() -> Self {
        Self::new(Optics::default())
    }
}

/// Patch for camera cores. Optics are small enough to replace wholesale.
#[derive(Debug, Clone, Copy)]
pub struct CameraPatch {
    pub optics: Optics,
}

fn bake(optics: Optics) -> Mat4 {
    match optics {
        Optics::Perspective {
            fovy_deg,
            aspect,
            near,
            far,
        } => Mat4::perspective_rh(fovy_deg.to_radians(), aspect.max(1e-6), near, far),
        Optics::Ortho {
            left,
            right,
            bottom,
            top,
            near,
            far,
        } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        Optics::Frustum {
            left,
            right,
            bottom,
            top,
            near,
            far,
        } => perspective_off_center(left, right, bottom, top, near, far),
    }
}

/// Off-center perspective frustum, right-handed with 0..1 depth to match
/// the glam `perspective_rh`/`orthographic_rh` convention used everywhere
/// else.
fn perspective_off_center(l: f32, r: f32, b: f32, t: f32, n: f32, f: f32) -> Mat4 {
    let x = (2.0 * n) / (r - l);
    let y = (2.0 * n) / (t - b);
    let a = (r + l) / (r - l);
    let bb = (t + b) / (t - b);
    let c = f / (n - f);
    let d = (n * f) / (n - f);
    Mat4::from_cols_array(&[
        x, 0.0, 0.0, 0.0, //
        0.0, y, 0.0, 0.0, //
        a, bb, c, -1.0, //
        0.0, 0.0, d, 0.0,
    ])
}
