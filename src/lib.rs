#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod assets;
pub mod chunk;
pub mod compile;
pub mod core;
pub mod display;
pub mod errors;
pub mod render;
pub mod scene;
pub mod utils;

pub use assets::{AssetSource, LoadSink, Loader};
pub use chunk::{Chunk, ChunkCategory, ChunkId};
pub use compile::{CompileStats, compile};
pub use self::core::{
    CoreCategory, CoreKey, CorePatch, CoreRegistry, GeometryData, ImageData, Optics, ParamValue,
    RenderFlags,
};
pub use display::{DisplayList, ObjectId, RenderObject};
pub use errors::{Result, StrataError};
pub use render::{
    FrameOutcome, FrameRenderer, FrameStats, PassContext, PassTarget, PickOptions, PickResult,
    RenderBackend, WgpuBackend,
};
pub use scene::{Node, NodeIndex, NodeKind, Scene, SceneEvent};
pub use utils::interner;
