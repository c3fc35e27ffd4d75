//! Clip-plane cores.

use glam::Vec3;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipMode {
    /// Keep fragments on the normal side of the plane.
    #[default]
    Inside,
    /// Keep fragments on the far side.
    Outside,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub mode: ClipMode,
}

#[derive(Debug, Clone, Default)]
pub struct ClipCore {
    pub planes: SmallVec<[ClipPlane; 4]>,
}

impl ClipCore {
    #[must_use]
    pub fn new(planes: impl IntoIterator<Item = ClipPlane>) -> Self {
        Self {
            planes: planes.into_iter().collect(),
        }
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &ClipPatch) -> bool {
        match patch {
            ClipPatch::ReplaceAll(planes) => {
                if self.planes.as_slice() == planes.as_slice() {
                    return false;
                }
                self.planes = SmallVec::from_slice(planes);
                true
            }
            ClipPatch::SetMode { index, mode } => {
                let Some(plane) = self.planes.get_mut(*index) else {
                    log::error!("clip plane index {index} out of range");
                    return false;
                };
                if plane.mode == *mode {
                    return false;
                }
                plane.mode = *mode;
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClipPatch {
    ReplaceAll(Vec<ClipPlane>),
    SetMode { index: usize, mode: ClipMode },
}
