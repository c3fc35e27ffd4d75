//! Typed mutation and query wrappers.
//!
//! Every setter lowers to [`Scene::mutate`] with a typed patch, so
//! dirty-marking and cache invalidation stay centralized. Getters read the
//! node's core directly; because cores are shared by reference, a value
//! set through one node is observable through every node declaring the
//! same `coreId`.

use glam::Vec3;

use crate::core::{
    CameraPatch, CorePatch, CorePayload, FlagsPatch, GeometryPatch, LayerPatch, LightsPatch,
    MaterialPatch, Optics, ParamValue, RenderFlags, ShaderParamsPatch, TexturePatch,
    TransformKind, TransformPatch, ViewPatch,
};
use crate::scene::{NodeIndex, Scene};
use crate::utils::interner;

impl Scene {
    fn core_payload(&self, node: NodeIndex) -> Option<&CorePayload> {
        let core = self.nodes.get(node)?.core?;
        self.registry.get(core)
    }

    // ========================================================================
    // LookAt
    // ========================================================================

    pub fn set_eye(&mut self, node: NodeIndex, eye: Vec3) -> bool {
        self.mutate(
            node,
            CorePatch::View(ViewPatch {
                eye: Some(eye),
                ..Default::default()
            }),
        )
    }

    pub fn inc_eye(&mut self, node: NodeIndex, delta: Vec3) -> bool {
        self.mutate(
            node,
            CorePatch::View(ViewPatch {
                inc_eye: Some(delta),
                ..Default::default()
            }),
        )
    }

    #[must_use]
    pub fn get_eye(&self, node: NodeIndex) -> Option<Vec3> {
        self.core_payload(node)?.as_view().map(|v| v.eye)
    }

    pub fn set_look(&mut self, node: NodeIndex, look: Vec3) -> bool {
        self.mutate(
            node,
            CorePatch::View(ViewPatch {
                look: Some(look),
                ..Default::default()
            }),
        )
    }

    #[must_use]
    pub fn get_look(&self, node: NodeIndex) -> Option<Vec3> {
        self.core_payload(node)?.as_view().map(|v| v.look)
    }

    pub fn set_up(&mut self, node: NodeIndex, up: Vec3) -> bool {
        self.mutate(
            node,
            CorePatch::View(ViewPatch {
                up: Some(up),
                ..Default::default()
            }),
        )
    }

    #[must_use]
    pub fn get_up(&self, node: NodeIndex) -> Option<Vec3> {
        self.core_payload(node)?.as_view().map(|v| v.up)
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    pub fn set_angle(&mut self, node: NodeIndex, angle_deg: f32) -> bool {
        self.mutate(node, CorePatch::Transform(TransformPatch::SetAngle(angle_deg)))
    }

    pub fn inc_angle(&mut self, node: NodeIndex, delta_deg: f32) -> bool {
        self.mutate(node, CorePatch::Transform(TransformPatch::IncAngle(delta_deg)))
    }

    #[must_use]
    pub fn get_angle(&self, node: NodeIndex) -> Option<f32> {
        match self.core_payload(node)?.as_transform()?.kind {
            TransformKind::Rotate { angle_deg, .. } => Some(angle_deg),
            _ => None,
        }
    }

    pub fn set_translation(&mut self, node: NodeIndex, v: Vec3) -> bool {
        self.mutate(node, CorePatch::Transform(TransformPatch::SetTranslation(v)))
    }

    pub fn inc_translation(&mut self, node: NodeIndex, delta: Vec3) -> bool {
        self.mutate(node, CorePatch::Transform(TransformPatch::IncTranslation(delta)))
    }

    #[must_use]
    pub fn get_translation(&self, node: NodeIndex) -> Option<Vec3> {
        match self.core_payload(node)?.as_transform()?.kind {
            TransformKind::Translate(v) => Some(v),
            _ => None,
        }
    }

    pub fn set_scale(&mut self, node: NodeIndex, v: Vec3) -> bool {
        self.mutate(node, CorePatch::Transform(TransformPatch::SetScale(v)))
    }

    // ========================================================================
    // Camera
    // ========================================================================

    pub fn set_optics(&mut self, node: NodeIndex, optics: Optics) -> bool {
        self.mutate(node, CorePatch::Camera(CameraPatch { optics }))
    }

    #[must_use]
    pub fn get_optics(&self, node: NodeIndex) -> Option<Optics> {
        self.core_payload(node)?.as_camera().map(|c| c.optics)
    }

    // ========================================================================
    // Material
    // ========================================================================

    pub fn set_base_color(&mut self, node: NodeIndex, color: Vec3) -> bool {
        self.mutate(
            node,
            CorePatch::Material(MaterialPatch {
                base_color: Some(color),
                ..Default::default()
            }),
        )
    }

    #[must_use]
    pub fn get_base_color(&self, node: NodeIndex) -> Option<Vec3> {
        self.core_payload(node)?.as_material().map(|m| m.base_color)
    }

    pub fn set_alpha(&mut self, node: NodeIndex, alpha: f32) -> bool {
        self.mutate(
            node,
            CorePatch::Material(MaterialPatch {
                alpha: Some(alpha),
                ..Default::default()
            }),
        )
    }

    #[must_use]
    pub fn get_alpha(&self, node: NodeIndex) -> Option<f32> {
        self.core_payload(node)?.as_material().map(|m| m.alpha)
    }

    // ========================================================================
    // Lights
    // ========================================================================

    pub fn set_light_color(&mut self, node: NodeIndex, index: usize, color: Vec3) -> bool {
        self.mutate(node, CorePatch::Lights(LightsPatch::SetColor { index, color }))
    }

    #[must_use]
    pub fn get_light_color(&self, node: NodeIndex, index: usize) -> Option<Vec3> {
        self.core_payload(node)?
            .as_lights()?
            .sources
            .get(index)
            .map(|s| s.color)
    }

    // ========================================================================
    // Layer / Flags
    // ========================================================================

    pub fn set_layer_priority(&mut self, node: NodeIndex, priority: i32) -> bool {
        self.mutate(
            node,
            CorePatch::Layer(LayerPatch {
                priority: Some(priority),
                ..Default::default()
            }),
        )
    }

    #[must_use]
    pub fn get_layer_priority(&self, node: NodeIndex) -> Option<i32> {
        self.core_payload(node)?.as_layer().map(|l| l.priority)
    }

    pub fn set_flags(&mut self, node: NodeIndex, set: RenderFlags, clear: RenderFlags) -> bool {
        self.mutate(node, CorePatch::Flags(FlagsPatch { set, clear }))
    }

    #[must_use]
    pub fn get_flags(&self, node: NodeIndex) -> Option<RenderFlags> {
        self.core_payload(node)?.as_flags().map(|f| f.flags)
    }

    // ========================================================================
    // Texture / Geometry / Shader params
    // ========================================================================

    pub fn set_blend_factor(&mut self, node: NodeIndex, layer: usize, factor: f32) -> bool {
        self.mutate(node, CorePatch::Texture(TexturePatch::SetBlendFactor { layer, factor }))
    }

    pub fn set_morph_factor(&mut self, node: NodeIndex, factor: f32) -> bool {
        self.mutate(node, CorePatch::Geometry(GeometryPatch::SetMorphFactor(factor)))
    }

    #[must_use]
    pub fn get_morph_factor(&self, node: NodeIndex) -> Option<f32> {
        self.core_payload(node)?
            .as_geometry()?
            .morph
            .as_ref()
            .map(|m| m.factor)
    }

    pub fn set_shader_param(&mut self, node: NodeIndex, name: &str, value: ParamValue) -> bool {
        self.mutate(
            node,
            CorePatch::ShaderParams(ShaderParamsPatch::Set {
                name: interner::intern(name),
                value,
            }),
        )
    }

    #[must_use]
    pub fn get_shader_param(&self, node: NodeIndex, name: &str) -> Option<ParamValue> {
        let sym = interner::get(name)?;
        self.core_payload(node)?
            .as_shader_params()?
            .values
            .iter()
            .find(|(s, _)| *s == sym)
            .map(|(_, v)| *v)
    }
}
