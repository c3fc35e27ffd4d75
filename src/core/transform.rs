//! Transform cores.
//!
//! Each modelling-transform node (translate, rotate, scale, matrix) carries
//! one of these. The core stores the local matrix together with its
//! inverse-transpose; world composition happens positionally during
//! traversal, since a shared core can sit at several graph locations with
//! different ancestors.

use glam::{Mat3, Mat4, Vec3};

/// The declared form of a transform.
///
/// Kept alongside the baked matrix so property setters (`set_angle`,
/// `inc_x`, ...) can re-derive the matrix from the declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformKind {
    Translate(Vec3),
    /// Axis (not required to be normalized in the declaration) and angle
    /// in degrees.
    Rotate {
        axis: Vec3,
        angle_deg: f32,
    },
    Scale(Vec3),
    /// An explicit 4x4 local matrix.
    Matrix(Mat4),
}

#[derive(Debug, Clone)]
pub struct TransformCore {
    pub kind: TransformKind,
    /// Baked local matrix.
    pub matrix: Mat4,
    /// Inverse-transpose of the upper 3x3, for normal transformation.
    pub normal_matrix: Mat3,
}

impl TransformCore {
    #[must_use]
    pub fn new(kind: TransformKind) -> Self {
        let matrix = bake(kind);
        Self {
            kind,
            normal_matrix: normal_from(&matrix),
            matrix,
        }
    }

    #[must_use]
    pub fn translate(v: Vec3) -> Self {
        Self::new(TransformKind::Translate(v))
    }

    #[must_use]
    pub fn rotate(axis: Vec3, angle_deg: f32) -> Self {
        Self::new(TransformKind::Rotate { axis, angle_deg })
    }

    #[must_use]
    pub fn scale(v: Vec3) -> Self {
        Self::new(TransformKind::Scale(v))
    }

    #[must_use]
    pub fn matrix(m: Mat4) -> Self {
        Self::new(TransformKind::Matrix(m))
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &TransformPatch) -> bool {
        let mut kind = self.kind;
        match (&mut kind, patch) {
            (TransformKind::Translate(v), TransformPatch::SetTranslation(t)) => *v = *t,
            (TransformKind::Translate(v), TransformPatch::IncTranslation(d)) => *v += *d,
            (TransformKind::Rotate { angle_deg, .. }, TransformPatch::SetAngle(a)) => {
                *angle_deg = *a;
            }
            (TransformKind::Rotate { angle_deg, .. }, TransformPatch::IncAngle(d)) => {
                *angle_deg += *d;
            }
            (TransformKind::Rotate { axis, .. }, TransformPatch::SetAxis(a)) => *axis = *a,
            (TransformKind::Scale(v), TransformPatch::SetScale(s)) => *v = *s,
            (TransformKind::Matrix(m), TransformPatch::SetMatrix(n)) => *m = *n,
            _ => {
                log::error!(
                    "transform patch {patch:?} does not apply to {:?}",
                    self.kind
                );
                return false;
            }
        }
        if kind == self.kind {
            return false;
        }
        self.kind = kind;
        self.matrix = bake(kind);
        self.normal_matrix = normal_from(&self.matrix);
        true
    }
}

impl Default for TransformCore {
    /// The default transform core is the identity; it sits beneath the
    /// transform stack.
    fn default() -> Self {
        Self::matrix(Mat4::IDENTITY)
    }
}

/// Patch for transform cores. Variants must match the declared
/// [`TransformKind`]; a mismatched patch is rejected with an error log.
#[derive(Debug, Clone, Copy)]
pub enum TransformPatch {
    SetTranslation(Vec3),
    IncTranslation(Vec3),
    SetAngle(f32),
    IncAngle(f32),
    SetAxis(Vec3),
    SetScale(Vec3),
    SetMatrix(Mat4),
}

fn bake(kind: TransformKind) -> Mat4 {
    match kind {
        TransformKind::Translate(v) => Mat4::from_translation(v),
        TransformKind::Rotate { axis, angle_deg } => {
            let len_sq = axis.length_squared();
            if len_sq < 1e-12 {
                Mat4::IDENTITY
            } else {
                Mat4::from_axis_angle(axis / len_sq.sqrt(), angle_deg.to_radians())
            }
        }
        TransformKind::Scale(v) => Mat4::from_scale(v),
        TransformKind::Matrix(m) => m,
    }
}

/// Inverse-transpose of the upper 3x3. Falls back to the plain upper 3x3
/// when the matrix is singular (degenerate scale).
pub(crate) fn normal_from(matrix: &Mat4) -> Mat3 {
    let m3 = Mat3::from_mat4(*matrix);
    if m3.determinant().abs() < 1e-12 {
        m3
    } else {
        m3.inverse().transpose()
    }
}
