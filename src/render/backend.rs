//! GPU backend abstraction.
//!
//! The engine is GPU-API-agnostic; everything it needs from a graphics
//! layer fits in [`RenderBackend`]: compile opaque program artifacts,
//! upload buffers and textures, open/close pass targets, apply state
//! chunks, issue indexed draws, and read pixels back for picking.
//!
//! [`crate::render::wgpu_backend::WgpuBackend`] is the production
//! implementation; tests drive the engine through a recording fake.

use crate::chunk::Chunk;
use crate::core::{GeometryData, ImageData, Primitive, ProgramArtifact};
use crate::errors::Result;

/// Backend handle for a compiled program. `0` is always the backend's
/// built-in default program.
pub type ProgramId = u32;

/// Backend handle for an uploaded vertex/index buffer set.
pub type GeometryBuffersId = u32;

/// Backend handle for an uploaded texture.
pub type TextureId = u32;

/// Backend handle for an offscreen stage target.
pub type StageId = u32;

/// Where a pass draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    /// The frame's main target.
    Screen,
    /// An offscreen stage target created with
    /// [`RenderBackend::create_stage`].
    Offscreen(StageId),
    /// The picking buffer; draws carry object-id colors and the result is
    /// read back rather than presented.
    Pick { width: u32, height: u32 },
}

/// Narrow interface to the GPU layer.
///
/// Upload calls receive tightly-packed data; power-of-two texture padding
/// has already happened on the engine side. Every method that touches the
/// device may fail; a failure mid-frame aborts that frame without mutating
/// engine state.
pub trait RenderBackend {
    /// Capability query, e.g. for anisotropic filtering.
    fn supports_extension(&self, _name: &str) -> bool {
        false
    }

    // ========================================================================
    // Resource lifecycle
    // ========================================================================

    /// Compiles an opaque program artifact. Compilation or link failure is
    /// an `Err`; the caller falls back to the default program path.
    fn create_program(&mut self, artifact: &ProgramArtifact) -> Result<ProgramId>;
    fn destroy_program(&mut self, id: ProgramId);

    fn upload_geometry(&mut self, data: &GeometryData, primitive: Primitive)
    -> Result<GeometryBuffersId>;
    fn destroy_geometry(&mut self, id: GeometryBuffersId);

    fn upload_texture(&mut self, image: &ImageData) -> Result<TextureId>;
    fn destroy_texture(&mut self, id: TextureId);

    fn create_stage(&mut self, width: u32, height: u32) -> Result<StageId>;
    fn destroy_stage(&mut self, id: StageId);

    // ========================================================================
    // Frame execution
    // ========================================================================

    fn begin_pass(&mut self, target: PassTarget, clear_color: Option<[f32; 4]>) -> Result<()>;

    /// Applies one state chunk. Called only when the chunk differs by
    /// identity from the previous draw's chunk of the same category; the
    /// backend never needs its own redundancy filter on top.
    fn apply(&mut self, chunk: &Chunk) -> Result<()>;

    /// Draws the geometry under the currently-applied state.
    fn draw(&mut self, geometry: GeometryBuffersId) -> Result<()>;

    fn end_pass(&mut self) -> Result<()>;

    /// Reads back an RGBA8 region of the last finished pick pass.
    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>>;
}
