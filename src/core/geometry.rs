//! Geometry cores.
//!
//! A geometry core owns the CPU-side vertex/index arrays and, once the
//! backend has seen them, the uploaded buffer handles. Stream-sourced
//! geometry stays pending until the loader service delivers its data.
//!
//! Morph geometry keeps a list of targets plus an interpolation factor;
//! the interpolated arrays are produced CPU-side and re-uploaded when the
//! factor moves, so the backend only ever sees plain vertex data.

use glam::{Mat4, Vec3};

use crate::render::backend::GeometryBuffersId;
use crate::utils::Symbol;

/// Draw primitive for a geometry core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Primitive {
    #[default]
    Triangles,
    Lines,
    Points,
}

/// Where the vertex data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometrySource {
    /// Arrays supplied inline in the scene description.
    Inline,
    /// Loaded through the loader service by stream id.
    Stream(Symbol),
}

/// Flat vertex/index arrays, the loader-service data shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryData {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
}

impl GeometryData {
    /// Number of vertices implied by the position array.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Structural validation. Returns a human-readable reason on failure;
    /// used by the registry so a bad build never registers a partial core.
    pub fn validate(&self) -> Result<(), String> {
        if self.positions.is_empty() {
            return Err("empty position array".into());
        }
        if self.positions.len() % 3 != 0 {
            return Err(format!(
                "position array length {} is not a multiple of 3",
                self.positions.len()
            ));
        }
        let vertex_count = self.vertex_count();
        if !self.normals.is_empty() && self.normals.len() != vertex_count * 3 {
            return Err(format!(
                "normal array length {} does not match {vertex_count} vertices",
                self.normals.len()
            ));
        }
        if !self.uvs.is_empty() && self.uvs.len() != vertex_count * 2 {
            return Err(format!(
                "uv array length {} does not match {vertex_count} vertices",
                self.uvs.len()
            ));
        }
        if self.indices.is_empty() {
            return Err("empty index array".into());
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(format!(
                "index {bad} out of range for {vertex_count} vertices"
            ));
        }
        Ok(())
    }

    /// Linear interpolation of positions (and normals, when both targets
    /// carry them) toward `other` by `t`.
    #[must_use]
    pub fn lerp_toward(&self, other: &GeometryData, t: f32) -> GeometryData {
        let t = t.clamp(0.0, 1.0);
        let lerp_arr = |a: &[f32], b: &[f32]| -> Vec<f32> {
            if a.len() == b.len() {
                a.iter().zip(b).map(|(x, y)| x + (y - x) * t).collect()
            } else {
                a.to_vec()
            }
        };
        GeometryData {
            positions: lerp_arr(&self.positions, &other.positions),
            normals: lerp_arr(&self.normals, &other.normals),
            uvs: self.uvs.clone(),
            indices: self.indices.clone(),
        }
    }
}

/// Axis-aligned bounding box in the space of its source positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[must_use]
    pub fn from_positions(positions: &[f32]) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for chunk in positions.chunks_exact(3) {
            let p = Vec3::new(chunk[0], chunk[1], chunk[2]);
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// World-space box of this box under `matrix` (corners transformed).
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> BoundingBox {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            let p = matrix.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        BoundingBox { min, max }
    }
}

/// Morph target list plus interpolation factor.
#[derive(Debug, Clone)]
pub struct MorphState {
    pub targets: Vec<GeometryData>,
    /// 0 selects the first target, `targets.len() - 1` the last; fractional
    /// values interpolate between adjacent targets.
    pub factor: f32,
    /// Factor value the current GPU buffers were built from.
    pub uploaded_factor: Option<f32>,
}

/// Uploaded backend handles for one geometry core.
#[derive(Debug, Clone, Copy)]
pub struct GeometryBuffers {
    pub id: GeometryBuffersId,
    pub index_count: u32,
}

#[derive(Debug, Clone)]
pub struct GeometryCore {
    pub source: GeometrySource,
    pub primitive: Primitive,
    pub data: Option<GeometryData>,
    pub morph: Option<MorphState>,
    pub buffers: Option<GeometryBuffers>,
    pub bounding_box: Option<BoundingBox>,
}

impl GeometryCore {
    /// Inline geometry. Fails (with a reason for `ResourceBuild`) when the
    /// arrays are structurally invalid.
    pub fn inline(data: GeometryData, primitive: Primitive) -> Result<Self, String> {
        data.validate()?;
        let bounding_box = Some(BoundingBox::from_positions(&data.positions));
        Ok(Self {
            source: GeometrySource::Inline,
            primitive,
            data: Some(data),
            morph: None,
            buffers: None,
            bounding_box,
        })
    }

    /// Stream geometry; pending until the loader delivers data.
    #[must_use]
    pub fn stream(stream_id: Symbol, primitive: Primitive) -> Self {
        Self {
            source: GeometrySource::Stream(stream_id),
            primitive,
            data: None,
            morph: None,
            buffers: None,
            bounding_box: None,
        }
    }

    /// Stream morph geometry; targets arrive through the loader, the
    /// declared factor is kept so it applies once they do.
    #[must_use]
    pub fn morph_stream(stream_id: Symbol, factor: f32) -> Self {
        Self {
            source: GeometrySource::Stream(stream_id),
            primitive: Primitive::Triangles,
            data: None,
            morph: Some(MorphState {
                targets: Vec::new(),
                factor,
                uploaded_factor: None,
            }),
            buffers: None,
            bounding_box: None,
        }
    }

    /// Fills morph targets on load completion.
    pub(crate) fn complete_morph_load(
        &mut self,
        targets: Vec<GeometryData>,
    ) -> Result<(), String> {
        if targets.is_empty() {
            return Err("morph stream delivered no targets".into());
        }
        for target in &targets {
            target.validate()?;
        }
        let factor = self.morph.as_ref().map_or(0.0, |m| m.factor);
        self.morph = Some(MorphState {
            targets,
            factor,
            uploaded_factor: None,
        });
        self.refresh_morph();
        Ok(())
    }

    /// Morph geometry over inline targets.
    pub fn morph(targets: Vec<GeometryData>, factor: f32) -> Result<Self, String> {
        if targets.is_empty() {
            return Err("morph geometry requires at least one target".into());
        }
        for target in &targets {
            target.validate()?;
        }
        let mut core = Self {
            source: GeometrySource::Inline,
            primitive: Primitive::Triangles,
            data: None,
            morph: Some(MorphState {
                targets,
                factor,
                uploaded_factor: None,
            }),
            buffers: None,
            bounding_box: None,
        };
        core.refresh_morph();
        Ok(core)
    }

    /// Recomputes `data` from the morph targets at the current factor.
    pub(crate) fn refresh_morph(&mut self) {
        let Some(morph) = &self.morph else { return };
        if morph.targets.is_empty() {
            return; // stream morph, targets not delivered yet
        }
        let last = morph.targets.len() - 1;
        let f = morph.factor.clamp(0.0, last as f32);
        let lo = f.floor() as usize;
        let hi = (lo + 1).min(last);
        let data = morph.targets[lo].lerp_toward(&morph.targets[hi], f - lo as f32);
        self.bounding_box = Some(BoundingBox::from_positions(&data.positions));
        self.data = Some(data);
        self.buffers = None; // stale, re-upload
    }

    /// Fills stream data on load completion.
    pub(crate) fn complete_load(&mut self, data: GeometryData) -> Result<(), String> {
        data.validate()?;
        self.bounding_box = Some(BoundingBox::from_positions(&data.positions));
        self.data = Some(data);
        self.buffers = None;
        Ok(())
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &GeometryPatch) -> bool {
        match patch {
            GeometryPatch::SetMorphFactor(factor) => {
                let Some(morph) = &mut self.morph else {
                    log::error!("setMorphFactor on non-morph geometry");
                    return false;
                };
                if (morph.factor - factor).abs() < f32::EPSILON {
                    return false;
                }
                morph.factor = *factor;
                self.refresh_morph();
                true
            }
            GeometryPatch::ReplaceData(data) => {
                if let Err(reason) = data.validate() {
                    log::error!("rejected geometry replacement: {reason}");
                    return false;
                }
                self.bounding_box = Some(BoundingBox::from_positions(&data.positions));
                self.data = Some(data.clone());
                self.buffers = None;
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum GeometryPatch {
    SetMorphFactor(f32),
    ReplaceData(GeometryData),
}
