//! Frame rendering.
//!
//! The frame renderer walks the sorted display list once per configured
//! pass, diff-and-applying state chunks against the previous draw through
//! a tracked-state filter, and issues one draw per render object. Picking
//! re-enters the same machinery with id-as-color chunks and an offscreen
//! target.

pub mod backend;
pub mod frame;
pub mod pick;
pub mod tracked;
pub mod wgpu_backend;

pub use backend::{GeometryBuffersId, PassTarget, ProgramId, RenderBackend, StageId, TextureId};
pub use frame::{FrameOutcome, FrameRenderer, FrameStats, PassContext};
pub use pick::{PickOptions, PickResult};
pub use tracked::TrackedState;
pub use wgpu_backend::WgpuBackend;
