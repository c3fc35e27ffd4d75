//! Shader program and shader-parameter cores.
//!
//! Program sources are opaque artifacts; the engine never inspects them,
//! it only hands them to the backend for compilation and keys sorting and
//! state elimination off the resulting handle. A failed compile falls back
//! to the backend's default program path rather than killing the frame.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::render::backend::ProgramId;
use crate::utils::Symbol;

/// Opaque shader source pair, as authored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramArtifact {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProgramCore {
    /// `None` selects the backend's built-in default program.
    pub artifact: Option<ProgramArtifact>,
    /// Backend handle, present once compiled.
    pub handle: Option<ProgramId>,
    /// Set when compilation failed; the default program is used instead.
    pub failed: bool,
}

impl ProgramCore {
    #[must_use]
    pub fn new(artifact: ProgramArtifact) -> Self {
        Self {
            artifact: Some(artifact),
            handle: None,
            failed: false,
        }
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &ProgramPatch) -> bool {
        match patch {
            ProgramPatch::SetArtifact(artifact) => {
                if self.artifact.as_ref() == Some(artifact) {
                    return false;
                }
                self.artifact = Some(artifact.clone());
                self.handle = None;
                self.failed = false;
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProgramPatch {
    SetArtifact(ProgramArtifact),
}

/// A uniform value settable through shaderParams nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

/// Parameter overrides layered onto the nearest ancestor program.
///
/// Values are kept sorted by symbol so two cores with the same bindings
/// compare equal regardless of declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderParamsCore {
    pub values: Vec<(Symbol, ParamValue)>,
}

impl ShaderParamsCore {
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = (Symbol, ParamValue)>) -> Self {
        let mut values: Vec<_> = values.into_iter().collect();
        values.sort_by_key(|(sym, _)| *sym);
        Self { values }
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &ShaderParamsPatch) -> bool {
        match patch {
            ShaderParamsPatch::Set { name, value } => {
                match self.values.binary_search_by_key(name, |(sym, _)| *sym) {
                    Ok(i) => {
                        if self.values[i].1 == *value {
                            return false;
                        }
                        self.values[i].1 = *value;
                    }
                    Err(i) => self.values.insert(i, (*name, *value)),
                }
                true
            }
            ShaderParamsPatch::ReplaceAll(values) => {
                let next = ShaderParamsCore::new(values.iter().copied());
                if next == *self {
                    return false;
                }
                *self = next;
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum ShaderParamsPatch {
    Set { name: Symbol, value: ParamValue },
    ReplaceAll(Vec<(Symbol, ParamValue)>),
}
