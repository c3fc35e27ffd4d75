//! State Cores
//!
//! A Core is the shared, reference-counted, immutable-per-revision payload
//! of state for one node category. Nodes declaring the same `coreId`
//! reference a single Core; mutating it through [`registry::CoreRegistry`]
//! bumps its revision and marks every referencing node dirty.
//!
//! Each category's payload lives in its own submodule. The closed
//! [`CorePayload`] sum type replaces dynamic node-type dispatch, so an
//! unhandled category is a compile error rather than a runtime surprise.

pub mod camera;
pub mod clip;
pub mod flags;
pub mod geometry;
pub mod layer;
pub mod light;
pub mod material;
pub mod program;
pub mod registry;
pub mod stage;
pub mod texture;
pub mod transform;
pub mod view;

pub use camera::{CameraCore, CameraPatch, Optics};
pub use clip::{ClipCore, ClipMode, ClipPatch, ClipPlane};
pub use flags::{FlagsCore, FlagsPatch, RenderFlags};
pub use geometry::{
    BoundingBox, GeometryBuffers, GeometryCore, GeometryData, GeometryPatch, GeometrySource,
    MorphState, Primitive,
};
pub use layer::{LayerCore, LayerPatch};
pub use light::{LightKind, LightSource, LightsCore, LightsPatch};
pub use material::{MaterialCore, MaterialPatch};
pub use program::{
    ParamValue, ProgramArtifact, ProgramCore, ProgramPatch, ShaderParamsCore, ShaderParamsPatch,
};
pub use registry::{CoreRegistry, GpuRelease};
pub use stage::{StageCore, StagePatch, StageTarget};
pub use texture::{ApplyTarget, BlendMode, ImageData, TextureCore, TextureLayer, TexturePatch};
pub use transform::{TransformCore, TransformKind, TransformPatch};
pub use view::{ViewCore, ViewPatch};

slotmap::new_key_type! {
    /// Handle to a Core slot in a scene's [`CoreRegistry`].
    pub struct CoreKey;
}

/// The fixed set of state categories.
///
/// One traversal stack exists per stacked category; `Geometry` is carried
/// only by leaves and is never stacked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoreCategory {
    Transform,
    View,
    Camera,
    Material,
    Lights,
    Texture,
    Program,
    ShaderParams,
    Flags,
    Layer,
    Clip,
    Stage,
    Geometry,
}

/// Number of categories, including the unstacked `Geometry`.
pub const CATEGORY_COUNT: usize = 13;

/// Number of stacked categories (everything except `Geometry`).
pub const STACKED_CATEGORY_COUNT: usize = 12;

impl CoreCategory {
    /// Every category, in stack-slot order.
    pub const ALL: [CoreCategory; CATEGORY_COUNT] = [
        CoreCategory::Transform,
        CoreCategory::View,
        CoreCategory::Camera,
        CoreCategory::Material,
        CoreCategory::Lights,
        CoreCategory::Texture,
        CoreCategory::Program,
        CoreCategory::ShaderParams,
        CoreCategory::Flags,
        CoreCategory::Layer,
        CoreCategory::Clip,
        CoreCategory::Stage,
        CoreCategory::Geometry,
    ];

    /// Stack slot index. `Geometry` has one too (for registry bookkeeping)
    /// but no stack is allocated for it.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            CoreCategory::Transform => 0,
            CoreCategory::View => 1,
            CoreCategory::Camera => 2,
            CoreCategory::Material => 3,
            CoreCategory::Lights => 4,
            CoreCategory::Texture => 5,
            CoreCategory::Program => 6,
            CoreCategory::ShaderParams => 7,
            CoreCategory::Flags => 8,
            CoreCategory::Layer => 9,
            CoreCategory::Clip => 10,
            CoreCategory::Stage => 11,
            CoreCategory::Geometry => 12,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            CoreCategory::Transform => "transform",
            CoreCategory::View => "view",
            CoreCategory::Camera => "camera",
            CoreCategory::Material => "material",
            CoreCategory::Lights => "lights",
            CoreCategory::Texture => "texture",
            CoreCategory::Program => "program",
            CoreCategory::ShaderParams => "shaderParams",
            CoreCategory::Flags => "flags",
            CoreCategory::Layer => "layer",
            CoreCategory::Clip => "clip",
            CoreCategory::Stage => "stage",
            CoreCategory::Geometry => "geometry",
        }
    }

    /// True for categories that participate in the traversal stacks.
    #[inline]
    #[must_use]
    pub fn is_stacked(self) -> bool {
        !matches!(self, CoreCategory::Geometry)
    }
}

impl std::fmt::Display for CoreCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Closed sum over every category's payload.
#[derive(Debug, Clone)]
pub enum CorePayload {
    Transform(TransformCore),
    View(ViewCore),
    Camera(CameraCore),
    Material(MaterialCore),
    Lights(LightsCore),
    Texture(TextureCore),
    Program(ProgramCore),
    ShaderParams(ShaderParamsCore),
    Flags(FlagsCore),
    Layer(LayerCore),
    Clip(ClipCore),
    Stage(StageCore),
    Geometry(GeometryCore),
}

impl CorePayload {
    #[must_use]
    pub fn category(&self) -> CoreCategory {
        match self {
            CorePayload::Transform(_) => CoreCategory::Transform,
            CorePayload::View(_) => CoreCategory::View,
            CorePayload::Camera(_) => CoreCategory::Camera,
            CorePayload::Material(_) => CoreCategory::Material,
            CorePayload::Lights(_) => CoreCategory::Lights,
            CorePayload::Texture(_) => CoreCategory::Texture,
            CorePayload::Program(_) => CoreCategory::Program,
            CorePayload::ShaderParams(_) => CoreCategory::ShaderParams,
            CorePayload::Flags(_) => CoreCategory::Flags,
            CorePayload::Layer(_) => CoreCategory::Layer,
            CorePayload::Clip(_) => CoreCategory::Clip,
            CorePayload::Stage(_) => CoreCategory::Stage,
            CorePayload::Geometry(_) => CoreCategory::Geometry,
        }
    }

    // Typed accessors for the hot paths. Returning Option keeps category
    // mix-ups loud at the call site instead of panicking here.

    #[must_use]
    pub fn as_transform(&self) -> Option<&TransformCore> {
        match self {
            CorePayload::Transform(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_view(&self) -> Option<&ViewCore> {
        match self {
            CorePayload::View(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_camera(&self) -> Option<&CameraCore> {
        match self {
            CorePayload::Camera(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_material(&self) -> Option<&MaterialCore> {
        match self {
            CorePayload::Material(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_lights(&self) -> Option<&LightsCore> {
        match self {
            CorePayload::Lights(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_texture(&self) -> Option<&TextureCore> {
        match self {
            CorePayload::Texture(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_program(&self) -> Option<&ProgramCore> {
        match self {
            CorePayload::Program(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_shader_params(&self) -> Option<&ShaderParamsCore> {
        match self {
            CorePayload::ShaderParams(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_flags(&self) -> Option<&FlagsCore> {
        match self {
            CorePayload::Flags(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_layer(&self) -> Option<&LayerCore> {
        match self {
            CorePayload::Layer(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_clip(&self) -> Option<&ClipCore> {
        match self {
            CorePayload::Clip(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_stage(&self) -> Option<&StageCore> {
        match self {
            CorePayload::Stage(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_geometry(&self) -> Option<&GeometryCore> {
        match self {
            CorePayload::Geometry(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_geometry_mut(&mut self) -> Option<&mut GeometryCore> {
        match self {
            CorePayload::Geometry(c) => Some(c),
            _ => None,
        }
    }
}

/// Typed patch for the single mutation entry point.
///
/// Every `set_*`/`inc_*` wrapper on `Scene` lowers to one of these;
/// dirty-marking and cache invalidation happen centrally in
/// [`registry::CoreRegistry::apply_patch`] and `Scene::mutate`.
#[derive(Debug, Clone)]
pub enum CorePatch {
    Transform(TransformPatch),
    View(ViewPatch),
    Camera(CameraPatch),
    Material(MaterialPatch),
    Lights(LightsPatch),
    Texture(TexturePatch),
    Program(ProgramPatch),
    ShaderParams(ShaderParamsPatch),
    Flags(FlagsPatch),
    Layer(LayerPatch),
    Clip(ClipPatch),
    Stage(StagePatch),
    Geometry(GeometryPatch),
}

impl CorePatch {
    #[must_use]
    pub fn category(&self) -> CoreCategory {
        match self {
            CorePatch::Transform(_) => CoreCategory::Transform,
            CorePatch::View(_) => CoreCategory::View,
            CorePatch::Camera(_) => CoreCategory::Camera,
            CorePatch::Material(_) => CoreCategory::Material,
            CorePatch::Lights(_) => CoreCategory::Lights,
            CorePatch::Texture(_) => CoreCategory::Texture,
            CorePatch::Program(_) => CoreCategory::Program,
            CorePatch::ShaderParams(_) => CoreCategory::ShaderParams,
            CorePatch::Flags(_) => CoreCategory::Flags,
            CorePatch::Layer(_) => CoreCategory::Layer,
            CorePatch::Clip(_) => CoreCategory::Clip,
            CorePatch::Stage(_) => CoreCategory::Stage,
            CorePatch::Geometry(_) => CoreCategory::Geometry,
        }
    }
}
