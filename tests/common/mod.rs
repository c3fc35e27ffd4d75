//! Shared test support.
//!
//! [`RecordingBackend`] implements the backend trait without a GPU: it
//! records every pass, chunk application and draw so tests can assert on
//! state-change elimination and draw order, and it emulates the pick
//! buffer by rasterizing uploaded triangles CPU-side so the full pick
//! path (id-as-color, readback, decode) runs for real.

// Each test binary uses a different slice of this module.
#![allow(dead_code)]

use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3};
use strata::chunk::{Chunk, ChunkCategory};
use strata::core::{GeometryData, ImageData, Primitive, ProgramArtifact};
use strata::errors::{Result, StrataError};
use strata::render::{
    GeometryBuffersId, PassTarget, ProgramId, RenderBackend, StageId, TextureId,
};

#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub geometry: GeometryBuffersId,
    pub program: ProgramId,
    pub world: Mat4,
    pub texture: Option<TextureId>,
    pub pass_index: usize,
}

#[derive(Clone)]
struct DrawState {
    view: Mat4,
    proj: Mat4,
    world: Mat4,
    program: ProgramId,
    texture: Option<TextureId>,
    pick_color: [f32; 4],
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
            program: 0,
            texture: None,
            pick_color: [0.0; 4],
        }
    }
}

struct PickBuffer {
    width: u32,
    height: u32,
    /// Pixel -> (depth, rgba). Nearest depth wins.
    pixels: HashMap<(u32, u32), (f32, [u8; 4])>,
}

#[derive(Default)]
pub struct RecordingBackend {
    pub geometries: HashMap<GeometryBuffersId, (GeometryData, Primitive)>,
    pub programs: HashMap<ProgramId, String>,
    pub textures: HashMap<TextureId, ImageData>,
    pub stages: HashMap<StageId, (u32, u32)>,
    next_geometry: GeometryBuffersId,
    next_program: ProgramId,
    next_texture: TextureId,
    next_stage: StageId,

    pub passes: Vec<PassTarget>,
    pub draws: Vec<DrawRecord>,
    pub apply_counts: HashMap<ChunkCategory, usize>,
    pub view_matrices_applied: Vec<Mat4>,
    pub destroyed_geometries: Vec<GeometryBuffersId>,
    pub destroyed_textures: Vec<TextureId>,
    pub destroyed_programs: Vec<ProgramId>,

    /// Fault injection for abort-path tests.
    pub fail_draws: bool,
    pub fail_begin_pass: bool,

    state: DrawState,
    in_pick_pass: bool,
    pick: Option<PickBuffer>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_counters(&mut self) {
        self.passes.clear();
        self.draws.clear();
        self.apply_counts.clear();
        self.view_matrices_applied.clear();
    }

    pub fn applies(&self, category: ChunkCategory) -> usize {
        self.apply_counts.get(&category).copied().unwrap_or(0)
    }

    /// Rasterizes the current geometry into the pick buffer.
    fn rasterize_pick(&mut self, geometry: GeometryBuffersId) {
        let Some((data, primitive)) = self.geometries.get(&geometry) else {
            return;
        };
        if *primitive != Primitive::Triangles {
            return;
        }
        let Some(pick) = &mut self.pick else { return };
        let (width, height) = (pick.width, pick.height);

        let mvp = self.state.proj * self.state.view * self.state.world;
        let color = [
            (self.state.pick_color[0] * 255.0).round() as u8,
            (self.state.pick_color[1] * 255.0).round() as u8,
            (self.state.pick_color[2] * 255.0).round() as u8,
            (self.state.pick_color[3] * 255.0).round() as u8,
        ];

        let project = |i: u32| -> Option<Vec3> {
            let base = i as usize * 3;
            let p = Vec3::new(
                data.positions[base],
                data.positions[base + 1],
                data.positions[base + 2],
            );
            let clip = mvp * p.extend(1.0);
            if clip.w <= 1e-6 {
                return None;
            }
            Some(clip.truncate() / clip.w)
        };
        let to_screen = move |ndc: Vec3| -> Vec2 {
            Vec2::new(
                (ndc.x * 0.5 + 0.5) * width as f32,
                (0.5 - ndc.y * 0.5) * height as f32,
            )
        };
        let edge = |a: Vec2, b: Vec2, c: Vec2| -> f32 {
            (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
        };

        for tri in data.indices.chunks_exact(3) {
            let (Some(na), Some(nb), Some(nc)) = (project(tri[0]), project(tri[1]), project(tri[2]))
            else {
                continue;
            };
            let (a, b, c) = (to_screen(na), to_screen(nb), to_screen(nc));
            let area = edge(a, b, c);
            if area.abs() < 1e-6 {
                continue;
            }

            let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as u32;
            let max_x = (a.x.max(b.x).max(c.x).ceil() as u32).min(width.saturating_sub(1));
            let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as u32;
            let max_y = (a.y.max(b.y).max(c.y).ceil() as u32).min(height.saturating_sub(1));

            for py in min_y..=max_y {
                for px in min_x..=max_x {
                    let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                    let l0 = edge(b, c, p) / area;
                    let l1 = edge(c, a, p) / area;
                    let l2 = edge(a, b, p) / area;
                    if l0 < 0.0 || l1 < 0.0 || l2 < 0.0 {
                        continue;
                    }
                    let depth = l0 * na.z + l1 * nb.z + l2 * nc.z;
                    if !(0.0..=1.0).contains(&depth) {
                        continue;
                    }
                    let entry = pick.pixels.entry((px, py)).or_insert((f32::INFINITY, color));
                    if depth < entry.0 {
                        *entry = (depth, color);
                    }
                }
            }
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn create_program(&mut self, artifact: &ProgramArtifact) -> Result<ProgramId> {
        if artifact.vertex.contains("#fail") {
            return Err(StrataError::Gpu(format!(
                "program \"{}\" refused by test backend",
                artifact.name
            )));
        }
        self.next_program += 1;
        self.programs
            .insert(self.next_program, artifact.name.clone());
        Ok(self.next_program)
    }

    fn destroy_program(&mut self, id: ProgramId) {
        self.programs.remove(&id);
        self.destroyed_programs.push(id);
    }

    fn upload_geometry(
        &mut self,
        data: &GeometryData,
        primitive: Primitive,
    ) -> Result<GeometryBuffersId> {
        self.next_geometry += 1;
        self.geometries
            .insert(self.next_geometry, (data.clone(), primitive));
        Ok(self.next_geometry)
    }

    fn destroy_geometry(&mut self, id: GeometryBuffersId) {
        self.geometries.remove(&id);
        self.destroyed_geometries.push(id);
    }

    fn upload_texture(&mut self, image: &ImageData) -> Result<TextureId> {
        self.next_texture += 1;
        self.textures.insert(self.next_texture, image.clone());
        Ok(self.next_texture)
    }

    fn destroy_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
        self.destroyed_textures.push(id);
    }

    fn create_stage(&mut self, width: u32, height: u32) -> Result<StageId> {
        self.next_stage += 1;
        self.stages.insert(self.next_stage, (width, height));
        Ok(self.next_stage)
    }

    fn destroy_stage(&mut self, id: StageId) {
        self.stages.remove(&id);
    }

    fn begin_pass(&mut self, target: PassTarget, _clear_color: Option<[f32; 4]>) -> Result<()> {
        if self.fail_begin_pass {
            return Err(StrataError::Gpu("begin_pass fault injected".into()));
        }
        self.in_pick_pass = matches!(target, PassTarget::Pick { .. });
        if let PassTarget::Pick { width, height } = target {
            self.pick = Some(PickBuffer {
                width,
                height,
                pixels: HashMap::new(),
            });
        }
        self.passes.push(target);
        self.state = DrawState::default();
        Ok(())
    }

    fn apply(&mut self, chunk: &Chunk) -> Result<()> {
        *self.apply_counts.entry(chunk.category()).or_insert(0) += 1;
        match chunk {
            Chunk::Program { program } => self.state.program = *program,
            Chunk::View { matrix, .. } => {
                self.state.view = *matrix;
                self.view_matrices_applied.push(*matrix);
            }
            Chunk::Camera { matrix } => self.state.proj = *matrix,
            Chunk::Transform { world, .. } => self.state.world = *world,
            Chunk::Texture { layers } => {
                self.state.texture = layers.first().map(|l| l.texture);
            }
            Chunk::PickColor { rgba } => self.state.pick_color = *rgba,
            _ => {}
        }
        Ok(())
    }

    fn draw(&mut self, geometry: GeometryBuffersId) -> Result<()> {
        if self.fail_draws {
            return Err(StrataError::Gpu("draw fault injected".into()));
        }
        if self.in_pick_pass {
            self.rasterize_pick(geometry);
        }
        self.draws.push(DrawRecord {
            geometry,
            program: self.state.program,
            world: self.state.world,
            texture: self.state.texture,
            pass_index: self.passes.len().saturating_sub(1),
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        self.in_pick_pass = false;
        Ok(())
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        let Some(pick) = &self.pick else {
            return Err(StrataError::Gpu("read_pixels before any pick pass".into()));
        };
        let mut out = Vec::with_capacity((width * height * 4) as usize);
        for py in y..y + height {
            for px in x..x + width {
                let rgba = pick
                    .pixels
                    .get(&(px, py))
                    .map_or([0, 0, 0, 0], |(_, c)| *c);
                out.extend_from_slice(&rgba);
            }
        }
        Ok(out)
    }
}

// ============================================================================
// Scene description helpers
// ============================================================================

/// A unit-ish cube centered at the origin, 8 vertices / 12 triangles.
pub fn cube_json(half_extent: f32) -> serde_json::Value {
    let s = half_extent;
    serde_json::json!({
        "type": "geometry",
        "positions": [
            -s, -s,  s,   s, -s,  s,   s,  s,  s,  -s,  s,  s,
            -s, -s, -s,   s, -s, -s,   s,  s, -s,  -s,  s, -s,
        ],
        "indices": [
            0, 1, 2,  0, 2, 3,
            1, 5, 6,  1, 6, 2,
            5, 4, 7,  5, 7, 6,
            4, 0, 3,  4, 3, 7,
            3, 2, 6,  3, 6, 7,
            4, 5, 1,  4, 1, 0,
        ],
    })
}

/// Wraps children in the usual lookAt + camera rig (eye on +Z).
pub fn rig_json(children: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "type": "lookAt",
        "id": "rig-look",
        "eye": { "x": 0.0, "y": 0.0, "z": 10.0 },
        "look": { "x": 0.0, "y": 0.0, "z": 0.0 },
        "up": { "x": 0.0, "y": 1.0, "z": 0.0 },
        "nodes": [{
            "type": "camera",
            "id": "rig-camera",
            "optics": { "type": "perspective", "fovy": 45.0, "aspect": 1.0, "near": 0.1, "far": 100.0 },
            "nodes": children,
        }],
    })
}
