//! Picking sub-mode.
//!
//! Same traversal and sort as a regular frame, but every object draws
//! with a minimal id-as-color chunk into an offscreen buffer. The pixel
//! under the cursor decodes back to a render object. With `ray_pick`, the
//! cursor is unprojected through the object's view/projection cores and
//! intersected with its triangles for a world-space hit position.

use glam::{Mat4, Vec2, Vec3};

use crate::chunk::{self, Chunk, ChunkCategory, decode_pick_color};
use crate::compile;
use crate::core::Primitive;
use crate::display::RenderObject;
use crate::errors::Result;
use crate::render::backend::{PassTarget, RenderBackend};
use crate::render::frame::{FrameRenderer, prepare_resources};
use crate::scene::Scene;
use crate::utils::interner;

#[derive(Debug, Clone, Copy, Default)]
pub struct PickOptions {
    /// Also compute the world-space position of the picked triangle.
    pub ray_pick: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickResult {
    /// Name from the nearest ancestor name node (or the leaf's own id).
    pub object_name: String,
    /// The queried canvas position.
    pub canvas_pos: Vec2,
    /// World-space hit position, when `ray_pick` was requested and the
    /// ray actually crosses the picked geometry.
    pub world_pos: Option<Vec3>,
}

/// Categories applied per object in the pick pass; everything else is
/// replaced by the id color.
const PICK_CHUNK_ORDER: [ChunkCategory; 4] = [
    ChunkCategory::View,
    ChunkCategory::Camera,
    ChunkCategory::Flags,
    ChunkCategory::Transform,
];

impl FrameRenderer {
    /// Synchronous single-frame pick at canvas position `(x, y)`.
    ///
    /// Returns `None` over empty space. Configuration errors from
    /// compilation and GPU failures propagate as `Err`.
    pub fn pick(
        &mut self,
        scene: &mut Scene,
        backend: &mut dyn RenderBackend,
        x: u32,
        y: u32,
        viewport: (u32, u32),
        options: PickOptions,
    ) -> Result<Option<PickResult>> {
        compile::compile(scene)?;
        prepare_resources(scene, backend)?;

        let (width, height) = viewport;
        let order = scene.display.sorted().to_vec();

        backend.begin_pass(PassTarget::Pick { width, height }, Some([0.0; 4]))?;
        self.tracked.reset();

        for id in &order {
            let Some(obj) = scene.display.get(*id) else {
                continue;
            };
            if !obj.pickable() {
                continue;
            }
            for category in PICK_CHUNK_ORDER {
                let cid = chunk::chunk_id_for(&scene.registry, obj, category);
                let built = self
                    .chunks
                    .get_or_build(cid, || chunk::build_chunk(&scene.registry, obj, category));
                self.tracked.apply(backend, cid, &built)?;
            }
            // Identity is per object; no point caching or diffing it.
            backend.apply(&Chunk::PickColor {
                rgba: chunk::encode_pick_color(obj.seq),
            })?;

            let buffers = scene
                .registry
                .get(obj.state.geometry)
                .and_then(|p| p.as_geometry())
                .and_then(|g| g.buffers);
            if let Some(buffers) = buffers {
                backend.draw(buffers.id)?;
            }
        }
        backend.end_pass()?;

        let pixels = backend.read_pixels(x, y, 1, 1)?;
        if pixels.len() < 4 {
            return Ok(None);
        }
        let Some(seq) = decode_pick_color([pixels[0], pixels[1], pixels[2], pixels[3]]) else {
            return Ok(None);
        };
        let Some(obj) = scene.display.iter().find(|o| o.seq == seq) else {
            log::warn!("pick decoded stale object sequence {seq}");
            return Ok(None);
        };

        let object_name = obj
            .name
            .map(|n| interner::resolve(n).to_owned())
            .unwrap_or_default();
        let world_pos = if options.ray_pick {
            ray_hit(scene, obj, x, y, viewport)
        } else {
            None
        };

        Ok(Some(PickResult {
            object_name,
            canvas_pos: Vec2::new(x as f32, y as f32),
            world_pos,
        }))
    }
}

/// Casts the cursor ray against the picked object's triangles in world
/// space; returns the nearest hit.
fn ray_hit(
    scene: &Scene,
    obj: &RenderObject,
    x: u32,
    y: u32,
    viewport: (u32, u32),
) -> Option<Vec3> {
    let registry = &scene.registry;
    let view = registry.get(obj.state.view)?.as_view()?.matrix;
    let proj = registry.get(obj.state.camera)?.as_camera()?.matrix;
    let geometry = registry.get(obj.state.geometry)?.as_geometry()?;
    let data = geometry.data.as_ref()?;
    if geometry.primitive != Primitive::Triangles {
        return None;
    }

    let (origin, dir) = cursor_ray(view, proj, x, y, viewport)?;

    let world = obj.state.world;
    let vertex = |i: u32| -> Option<Vec3> {
        let base = i as usize * 3;
        let p = Vec3::new(
            *data.positions.get(base)?,
            *data.positions.get(base + 1)?,
            *data.positions.get(base + 2)?,
        );
        Some(world.transform_point3(p))
    };

    let mut nearest: Option<f32> = None;
    for tri in data.indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2])) else {
            continue;
        };
        if let Some(t) = ray_triangle(origin, dir, a, b, c)
            && nearest.is_none_or(|n| t < n)
        {
            nearest = Some(t);
        }
    }
    nearest.map(|t| origin + dir * t)
}

/// Unprojects a canvas position into a world-space ray through the near
/// and far planes (0..1 depth convention).
fn cursor_ray(
    view: Mat4,
    proj: Mat4,
    x: u32,
    y: u32,
    viewport: (u32, u32),
) -> Option<(Vec3, Vec3)> {
    let (width, height) = viewport;
    if width == 0 || height == 0 {
        return None;
    }
    let ndc_x = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
    let ndc_y = 1.0 - (y as f32 + 0.5) / height as f32 * 2.0;

    let inv = (proj * view).inverse();
    let near = inv.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
    let far = inv.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
    let dir = far - near;
    if dir.length_squared() < 1e-12 {
        return None;
    }
    Some((near, dir.normalize()))
}

/// Möller–Trumbore ray/triangle intersection; returns the ray parameter.
fn ray_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let ab = b - a;
    let ac = c - a;
    let pvec = dir.cross(ac);
    let det = ab.dot(pvec);
    if det.abs() < EPSILON {
        return None; // parallel to the triangle plane
    }
    let inv_det = 1.0 / det;

    let tvec = origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(ab);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = ac.dot(qvec) * inv_det;
    (t >= 0.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_facing_triangle() {
        let t = ray_triangle(
            Vec3::new(0.25, 0.25, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
        );
        assert!(t.is_some());
        assert!((t.unwrap() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn ray_misses_outside_triangle() {
        let t = ray_triangle(
            Vec3::new(2.0, 2.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
        );
        assert!(t.is_none());
    }

    #[test]
    fn behind_origin_does_not_hit() {
        let t = ray_triangle(
            Vec3::new(0.25, 0.25, -1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
        );
        assert!(t.is_none());
    }
}
