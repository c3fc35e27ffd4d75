//! Declarative scene description.
//!
//! Scenes are described as nested `{ "type": ..., params..., "nodes": [...] }`
//! records. The builder walks the JSON tree depth-first, creating one node
//! per record and acquiring its core through the registry (shared when a
//! `coreId` is declared). Configuration errors fail fast with the path of
//! the offending record; a failed subtree is removed again so earlier
//! siblings stay valid.

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde_json::Value;

use crate::core::{
    ApplyTarget, BlendMode, CameraCore, ClipCore, ClipMode, ClipPlane, CorePayload, FlagsCore,
    GeometryCore, GeometryData, LayerCore, LightKind, LightSource, LightsCore, MaterialCore,
    Optics, ParamValue, Primitive, ProgramArtifact, ProgramCore, RenderFlags, ShaderParamsCore,
    StageCore, StageTarget, TextureCore, TextureLayer, TransformCore,
};
use crate::errors::{Result, StrataError};
use crate::scene::{LoadRequest, Node, NodeIndex, NodeKind, Scene};
use crate::utils::{Symbol, interner};

/// Builds one described node (and its subtree) under `parent`.
pub(crate) fn build_node(
    scene: &mut Scene,
    parent: Option<NodeIndex>,
    value: &Value,
    path: &str,
) -> Result<NodeIndex> {
    let Some(obj) = value.as_object() else {
        return Err(StrataError::BadParam {
            node_type: "node",
            path: path.to_owned(),
            detail: "node description must be a JSON object".to_owned(),
        });
    };

    let type_name = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(StrataError::MissingParam {
            node_type: "node",
            param: "type",
            path: path.to_owned(),
        })?;

    let id: Option<Symbol> = obj.get("id").and_then(Value::as_str).map(interner::intern);
    let core_id: Option<Symbol> = obj
        .get("coreId")
        .and_then(Value::as_str)
        .map(interner::intern);

    // A node sharing an already-registered coreId references that core and
    // may omit the state parameters entirely; its own params are ignored.
    let shared_existing = core_id.zip(category_of(type_name)).filter(|(id, category)| {
        scene.registry.has_shared(*category, *id)
    });

    let (kind, core) = if let Some((id, category)) = shared_existing {
        let kind = state_kind(type_name).expect("categorized types have a state kind");
        let core = scene
            .registry
            .acquire(category, Some(id), || Err("unreachable: core exists".into()))?;
        (kind, Some(core))
    } else {
        let (kind, payload_builder) = parse_kind(type_name, value, path)?;
        let core = match kind.category() {
            Some(category) => {
                let builder = payload_builder.expect("state kinds carry a payload builder");
                Some(scene.registry.acquire(category, core_id, builder)?)
            }
            None => None,
        };
        (kind, core)
    };

    let mut node = Node::new(kind);
    node.name = id;
    node.core = core;
    let idx = scene.insert_node(node, parent).inspect_err(|_| {
        // The core was acquired but the node never existed; drop the ref.
        if let Some(core) = core {
            scene.registry.release(core);
        }
    })?;

    // Stream-sourced state starts pending; hand the requests to the
    // loader service.
    if let Some(core) = core {
        for request in load_requests(scene, core, value) {
            scene.request_load(request);
        }
    }

    // Children, in declaration order. Order is semantically meaningful:
    // it is the sort tie-break and the left-to-right inheritance order.
    if let Some(children) = obj.get("nodes") {
        let Some(children) = children.as_array() else {
            scene.remove_node(idx);
            return Err(StrataError::BadParam {
                node_type: "node",
                path: path.to_owned(),
                detail: "\"nodes\" must be an array".to_owned(),
            });
        };
        if matches!(scene.get_node(idx).map(Node::kind), Some(NodeKind::Instance { .. })) {
            if !children.is_empty() {
                log::warn!("instance node at {path} declares children; ignored");
            }
        } else {
            for (i, child) in children.iter().enumerate() {
                let child_path = format!("{path}.nodes[{i}]");
                if let Err(e) = build_node(scene, Some(idx), child, &child_path) {
                    scene.remove_node(idx);
                    return Err(e);
                }
            }
        }
    }

    Ok(idx)
}

type PayloadBuilder = Box<dyn FnOnce() -> std::result::Result<CorePayload, String>>;

/// State category implied by a `type` string, if any. Used for the
/// shared-coreId fast path before any parameter parsing happens.
fn category_of(type_name: &str) -> Option<crate::core::CoreCategory> {
    state_kind(type_name).and_then(|kind| kind.category())
}

/// Node kind for state-bearing `type` strings, parameter-free.
fn state_kind(type_name: &str) -> Option<NodeKind> {
    match type_name {
        "translate" | "rotate" | "scale" | "matrix" => Some(NodeKind::Transform),
        "lookAt" => Some(NodeKind::LookAt),
        "camera" => Some(NodeKind::Camera),
        "material" => Some(NodeKind::Material),
        "light" | "lights" => Some(NodeKind::Lights),
        "texture" => Some(NodeKind::Texture),
        "shader" => Some(NodeKind::Shader),
        "shaderParams" => Some(NodeKind::ShaderParams),
        "flags" => Some(NodeKind::Flags),
        "layer" => Some(NodeKind::Layer),
        "clip" => Some(NodeKind::Clip),
        "stage" => Some(NodeKind::Stage),
        "geometry" => Some(NodeKind::Geometry),
        "morphGeometry" => Some(NodeKind::MorphGeometry),
        _ => None,
    }
}

/// Maps a `type` string to a node kind plus (for state kinds) a payload
/// builder. Unknown types fail fast here.
fn parse_kind(
    type_name: &str,
    value: &Value,
    path: &str,
) -> Result<(NodeKind, Option<PayloadBuilder>)> {
    let built: (NodeKind, Option<PayloadBuilder>) = match type_name {
        "node" => (NodeKind::Branch, None),
        "library" => (NodeKind::Library, None),

        "translate" => {
            let v = vec3_fields(value, ("x", "y", "z"), Vec3::ZERO);
            (
                NodeKind::Transform,
                Some(Box::new(move || {
                    Ok(CorePayload::Transform(TransformCore::translate(v)))
                })),
            )
        }
        "rotate" => {
            let angle = f32_field(value, "angle", 0.0);
            let axis = vec3_fields(value, ("x", "y", "z"), Vec3::ZERO);
            (
                NodeKind::Transform,
                Some(Box::new(move || {
                    Ok(CorePayload::Transform(TransformCore::rotate(axis, angle)))
                })),
            )
        }
        "scale" => {
            let v = vec3_fields(value, ("x", "y", "z"), Vec3::ONE);
            (
                NodeKind::Transform,
                Some(Box::new(move || {
                    Ok(CorePayload::Transform(TransformCore::scale(v)))
                })),
            )
        }
        "matrix" => {
            let elements = f32_array(value, "elements").ok_or(StrataError::MissingParam {
                node_type: "matrix",
                param: "elements",
                path: path.to_owned(),
            })?;
            if elements.len() != 16 {
                return Err(StrataError::BadParam {
                    node_type: "matrix",
                    path: path.to_owned(),
                    detail: format!("\"elements\" has {} entries, expected 16", elements.len()),
                });
            }
            let mut m = [0.0f32; 16];
            m.copy_from_slice(&elements);
            (
                NodeKind::Transform,
                Some(Box::new(move || {
                    Ok(CorePayload::Transform(TransformCore::matrix(
                        Mat4::from_cols_array(&m),
                    )))
                })),
            )
        }

        "lookAt" => {
            let eye = vec3_obj(value, "eye", Vec3::new(0.0, 0.0, 10.0));
            let look = vec3_obj(value, "look", Vec3::ZERO);
            let up = vec3_obj(value, "up", Vec3::Y);
            (
                NodeKind::LookAt,
                Some(Box::new(move || {
                    Ok(CorePayload::View(crate::core::ViewCore::new(eye, look, up)))
                })),
            )
        }
        "camera" => {
            let optics = parse_optics(value.get("optics"), path)?;
            (
                NodeKind::Camera,
                Some(Box::new(move || {
                    Ok(CorePayload::Camera(CameraCore::new(optics)))
                })),
            )
        }

        "material" => {
            let mut m = MaterialCore::default();
            m.base_color = color3(value, "baseColor", m.base_color);
            m.specular_color = color3(value, "specularColor", m.specular_color);
            m.specular = f32_field(value, "specular", m.specular);
            m.shine = f32_field(value, "shine", m.shine);
            m.emit = f32_field(value, "emit", m.emit);
            m.alpha = f32_field(value, "alpha", m.alpha);
            (
                NodeKind::Material,
                Some(Box::new(move || Ok(CorePayload::Material(m)))),
            )
        }

        "light" => {
            let source = parse_light(value, path)?;
            (
                NodeKind::Lights,
                Some(Box::new(move || {
                    Ok(CorePayload::Lights(LightsCore::new([source])))
                })),
            )
        }
        "lights" => {
            let mut sources = Vec::new();
            if let Some(arr) = value.get("lights").and_then(Value::as_array) {
                for (i, entry) in arr.iter().enumerate() {
                    sources.push(parse_light(entry, &format!("{path}.lights[{i}]"))?);
                }
            }
            (
                NodeKind::Lights,
                Some(Box::new(move || {
                    Ok(CorePayload::Lights(LightsCore::new(sources)))
                })),
            )
        }

        "texture" => {
            let layers_val =
                value
                    .get("layers")
                    .and_then(Value::as_array)
                    .ok_or(StrataError::MissingParam {
                        node_type: "texture",
                        param: "layers",
                        path: path.to_owned(),
                    })?;
            let mut layers = Vec::new();
            for (i, entry) in layers_val.iter().enumerate() {
                layers.push(parse_texture_layer(entry, &format!("{path}.layers[{i}]"))?);
            }
            (
                NodeKind::Texture,
                Some(Box::new(move || {
                    Ok(CorePayload::Texture(TextureCore::new(layers)))
                })),
            )
        }

        "shader" => {
            let vertex = str_field(value, "vertex").ok_or(StrataError::MissingParam {
                node_type: "shader",
                param: "vertex",
                path: path.to_owned(),
            })?;
            let fragment = str_field(value, "fragment").ok_or(StrataError::MissingParam {
                node_type: "shader",
                param: "fragment",
                path: path.to_owned(),
            })?;
            let name = str_field(value, "name").unwrap_or_else(|| "(anonymous)".to_owned());
            (
                NodeKind::Shader,
                Some(Box::new(move || {
                    Ok(CorePayload::Program(ProgramCore::new(ProgramArtifact {
                        name,
                        vertex,
                        fragment,
                    })))
                })),
            )
        }
        "shaderParams" => {
            let params = parse_shader_params(value.get("params"), path)?;
            (
                NodeKind::ShaderParams,
                Some(Box::new(move || {
                    Ok(CorePayload::ShaderParams(ShaderParamsCore::new(params)))
                })),
            )
        }

        "flags" => {
            let flags = parse_flags(value.get("flags"));
            (
                NodeKind::Flags,
                Some(Box::new(move || {
                    Ok(CorePayload::Flags(FlagsCore::new(flags)))
                })),
            )
        }
        "layer" => {
            let priority = i32_field(value, "priority", 0);
            let enabled = bool_field(value, "enabled", true);
            (
                NodeKind::Layer,
                Some(Box::new(move || {
                    Ok(CorePayload::Layer(LayerCore { priority, enabled }))
                })),
            )
        }
        "clip" => {
            let planes = parse_clip_planes(value, path)?;
            (
                NodeKind::Clip,
                Some(Box::new(move || {
                    Ok(CorePayload::Clip(ClipCore::new(planes)))
                })),
            )
        }
        "stage" => {
            let index = i32_field(value, "index", 0).max(0) as u32;
            let target = match value.get("target") {
                Some(t) => StageTarget::Offscreen {
                    width: i32_field(t, "width", 512).max(1) as u32,
                    height: i32_field(t, "height", 512).max(1) as u32,
                },
                None => StageTarget::Screen,
            };
            (
                NodeKind::Stage,
                Some(Box::new(move || {
                    Ok(CorePayload::Stage(StageCore::new(index, target)))
                })),
            )
        }

        "geometry" => {
            if let Some(stream) = str_field(value, "stream") {
                let stream_id = interner::intern(&stream);
                let primitive = parse_primitive(value, path)?;
                (
                    NodeKind::Geometry,
                    Some(Box::new(move || {
                        Ok(CorePayload::Geometry(GeometryCore::stream(
                            stream_id, primitive,
                        )))
                    })),
                )
            } else {
                let data = parse_geometry_data(value, path)?;
                let primitive = parse_primitive(value, path)?;
                (
                    NodeKind::Geometry,
                    Some(Box::new(move || {
                        GeometryCore::inline(data, primitive).map(CorePayload::Geometry)
                    })),
                )
            }
        }
        "morphGeometry" => {
            let factor = f32_field(value, "factor", 0.0);
            if let Some(stream) = str_field(value, "stream") {
                let stream_id = interner::intern(&stream);
                (
                    NodeKind::MorphGeometry,
                    Some(Box::new(move || {
                        Ok(CorePayload::Geometry(GeometryCore::morph_stream(
                            stream_id, factor,
                        )))
                    })),
                )
            } else {
                let targets_val = value.get("targets").and_then(Value::as_array).ok_or(
                    StrataError::MissingParam {
                        node_type: "morphGeometry",
                        param: "targets",
                        path: path.to_owned(),
                    },
                )?;
                let mut targets = Vec::new();
                for (i, entry) in targets_val.iter().enumerate() {
                    targets.push(parse_geometry_data(
                        entry,
                        &format!("{path}.targets[{i}]"),
                    )?);
                }
                (
                    NodeKind::MorphGeometry,
                    Some(Box::new(move || {
                        GeometryCore::morph(targets, factor).map(CorePayload::Geometry)
                    })),
                )
            }
        }

        "name" => {
            let name = str_field(value, "name").ok_or(StrataError::MissingParam {
                node_type: "name",
                param: "name",
                path: path.to_owned(),
            })?;
            (
                NodeKind::Name {
                    name: interner::intern(&name),
                },
                None,
            )
        }
        "instance" => {
            let target = str_field(value, "target").ok_or(StrataError::MissingParam {
                node_type: "instance",
                param: "target",
                path: path.to_owned(),
            })?;
            (
                NodeKind::Instance {
                    target: interner::intern(&target),
                    must_exist: bool_field(value, "mustExist", false),
                },
                None,
            )
        }

        other => {
            return Err(StrataError::UnknownNodeType {
                type_name: other.to_owned(),
                path: path.to_owned(),
            });
        }
    };
    Ok(built)
}

/// Load requests implied by a freshly-built node's description.
fn load_requests(scene: &Scene, core: crate::core::CoreKey, value: &Value) -> Vec<LoadRequest> {
    let mut requests = Vec::new();
    match scene.registry.get(core) {
        Some(CorePayload::Geometry(g)) => {
            if let crate::core::GeometrySource::Stream(stream_id) = g.source
                && g.data.is_none()
            {
                if g.morph.is_some() {
                    requests.push(LoadRequest::MorphGeometry { core, stream_id });
                } else {
                    requests.push(LoadRequest::Geometry { core, stream_id });
                }
            }
        }
        Some(CorePayload::Texture(t)) => {
            for (layer, l) in t.layers.iter().enumerate() {
                if l.image.is_none() {
                    requests.push(LoadRequest::Image {
                        core,
                        layer,
                        uri: l.uri,
                    });
                }
            }
        }
        _ => {}
    }
    // A shared core that finished loading earlier produces no requests;
    // `value` only matters for diagnostics here.
    let _ = value;
    requests
}

// ============================================================================
// Param parsing helpers
// ============================================================================

fn f32_field(value: &Value, key: &str, default: f32) -> f32 {
    value
        .get(key)
        .and_then(Value::as_f64)
        .map_or(default, |v| v as f32)
}

fn i32_field(value: &Value, key: &str, default: i32) -> i32 {
    value
        .get(key)
        .and_then(Value::as_i64)
        .map_or(default, |v| v as i32)
}

fn bool_field(value: &Value, key: &str, default: bool) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Three sibling scalar fields, e.g. `x`/`y`/`z` on transform nodes.
fn vec3_fields(value: &Value, keys: (&str, &str, &str), default: Vec3) -> Vec3 {
    Vec3::new(
        f32_field(value, keys.0, default.x),
        f32_field(value, keys.1, default.y),
        f32_field(value, keys.2, default.z),
    )
}

/// A nested `{x, y, z}` object field.
fn vec3_obj(value: &Value, key: &str, default: Vec3) -> Vec3 {
    value
        .get(key)
        .map_or(default, |v| vec3_fields(v, ("x", "y", "z"), default))
}

/// A nested `{r, g, b}` color field.
fn color3(value: &Value, key: &str, default: Vec3) -> Vec3 {
    value
        .get(key)
        .map_or(default, |v| vec3_fields(v, ("r", "g", "b"), default))
}

fn f32_array(value: &Value, key: &str) -> Option<Vec<f32>> {
    let arr = value.get(key)?.as_array()?;
    Some(arr.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
}

fn u32_array(value: &Value, key: &str) -> Option<Vec<u32>> {
    let arr = value.get(key)?.as_array()?;
    Some(arr.iter().filter_map(Value::as_u64).map(|v| v as u32).collect())
}

fn parse_optics(optics: Option<&Value>, path: &str) -> Result<Optics> {
    let Some(optics) = optics else {
        return Ok(Optics::default());
    };
    let kind = optics.get("type").and_then(Value::as_str).unwrap_or("perspective");
    match kind {
        "perspective" => Ok(Optics::Perspective {
            fovy_deg: f32_field(optics, "fovy", 45.0),
            aspect: f32_field(optics, "aspect", 1.0),
            near: f32_field(optics, "near", 0.1),
            far: f32_field(optics, "far", 5000.0),
        }),
        "ortho" => Ok(Optics::Ortho {
            left: f32_field(optics, "left", -1.0),
            right: f32_field(optics, "right", 1.0),
            bottom: f32_field(optics, "bottom", -1.0),
            top: f32_field(optics, "top", 1.0),
            near: f32_field(optics, "near", 0.1),
            far: f32_field(optics, "far", 5000.0),
        }),
        "frustum" => Ok(Optics::Frustum {
            left: f32_field(optics, "left", -1.0),
            right: f32_field(optics, "right", 1.0),
            bottom: f32_field(optics, "bottom", -1.0),
            top: f32_field(optics, "top", 1.0),
            near: f32_field(optics, "near", 0.1),
            far: f32_field(optics, "far", 5000.0),
        }),
        other => Err(StrataError::BadParam {
            node_type: "camera",
            path: path.to_owned(),
            detail: format!("unknown optics type \"{other}\""),
        }),
    }
}

fn parse_light(value: &Value, path: &str) -> Result<LightSource> {
    let mode = value.get("mode").and_then(Value::as_str).unwrap_or("dir");
    let color = color3(value, "color", Vec3::splat(1.0));
    let kind = match mode {
        "dir" => LightKind::Directional(vec3_obj(value, "dir", Vec3::new(0.0, 0.0, -1.0))),
        "point" => LightKind::Point {
            pos: vec3_obj(value, "pos", Vec3::ZERO),
            constant_attenuation: f32_field(value, "constantAttenuation", 1.0),
            linear_attenuation: f32_field(value, "linearAttenuation", 0.0),
            quadratic_attenuation: f32_field(value, "quadraticAttenuation", 0.0),
        },
        other => {
            return Err(StrataError::BadParam {
                node_type: "light",
                path: path.to_owned(),
                detail: format!("unknown light mode \"{other}\""),
            });
        }
    };
    Ok(LightSource {
        kind,
        color,
        diffuse: bool_field(value, "diffuse", true),
        specular: bool_field(value, "specular", true),
    })
}

fn parse_texture_layer(value: &Value, path: &str) -> Result<TextureLayer> {
    let uri = str_field(value, "uri").ok_or(StrataError::MissingParam {
        node_type: "texture",
        param: "uri",
        path: path.to_owned(),
    })?;
    let apply_to = match value.get("applyTo").and_then(Value::as_str).unwrap_or("baseColor") {
        "baseColor" => ApplyTarget::BaseColor,
        "specular" => ApplyTarget::Specular,
        "normals" => ApplyTarget::Normals,
        "emit" => ApplyTarget::Emit,
        "alpha" => ApplyTarget::Alpha,
        other => {
            return Err(StrataError::BadParam {
                node_type: "texture",
                path: path.to_owned(),
                detail: format!("unknown applyTo target \"{other}\""),
            });
        }
    };
    let blend_mode = match value.get("blendMode").and_then(Value::as_str).unwrap_or("multiply") {
        "multiply" => BlendMode::Multiply,
        "add" => BlendMode::Add,
        other => {
            return Err(StrataError::BadParam {
                node_type: "texture",
                path: path.to_owned(),
                detail: format!("unknown blendMode \"{other}\""),
            });
        }
    };
    let mut layer = TextureLayer::from_uri(interner::intern(&uri));
    layer.apply_to = apply_to;
    layer.blend_mode = blend_mode;
    layer.blend_factor = f32_field(value, "blendFactor", 1.0);
    Ok(layer)
}

fn parse_shader_params(params: Option<&Value>, path: &str) -> Result<Vec<(Symbol, ParamValue)>> {
    let Some(params) = params.and_then(Value::as_object) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(params.len());
    for (name, v) in params {
        let value = parse_param_value(v).ok_or_else(|| StrataError::BadParam {
            node_type: "shaderParams",
            path: path.to_owned(),
            detail: format!(
                "param \"{name}\" must be a number or an array of 2, 3, 4 or 16 numbers"
            ),
        })?;
        out.push((interner::intern(name), value));
    }
    Ok(out)
}

fn parse_param_value(value: &Value) -> Option<ParamValue> {
    if let Some(n) = value.as_f64() {
        return Some(ParamValue::Float(n as f32));
    }
    let arr = value.as_array()?;
    let nums: Vec<f32> = arr.iter().filter_map(Value::as_f64).map(|v| v as f32).collect();
    if nums.len() != arr.len() {
        return None;
    }
    match nums.len() {
        2 => Some(ParamValue::Vec2(Vec2::new(nums[0], nums[1]))),
        3 => Some(ParamValue::Vec3(Vec3::new(nums[0], nums[1], nums[2]))),
        4 => Some(ParamValue::Vec4(Vec4::new(nums[0], nums[1], nums[2], nums[3]))),
        16 => {
            let mut m = [0.0f32; 16];
            m.copy_from_slice(&nums);
            Some(ParamValue::Mat4(Mat4::from_cols_array(&m)))
        }
        _ => None,
    }
}

fn parse_flags(flags: Option<&Value>) -> RenderFlags {
    let mut out = RenderFlags::default();
    let Some(flags) = flags else { return out };
    let mut toggle = |key: &str, flag: RenderFlags| {
        if let Some(b) = flags.get(key).and_then(Value::as_bool) {
            out.set(flag, b);
        }
    };
    toggle("enabled", RenderFlags::ENABLED);
    toggle("picking", RenderFlags::PICKABLE);
    toggle("transparent", RenderFlags::TRANSPARENT);
    toggle("backfaces", RenderFlags::BACKFACES);
    toggle("depthTest", RenderFlags::DEPTH_TEST);
    toggle("depthWrite", RenderFlags::DEPTH_WRITE);
    if let Some(ff) = flags.get("frontface").and_then(Value::as_str) {
        out.set(RenderFlags::FRONTFACE_CW, ff == "cw");
    }
    out
}

fn parse_clip_planes(value: &Value, path: &str) -> Result<Vec<ClipPlane>> {
    let parse_one = |v: &Value, p: &str| -> Result<ClipPlane> {
        let mode = match v.get("mode").and_then(Value::as_str).unwrap_or("inside") {
            "inside" => ClipMode::Inside,
            "outside" => ClipMode::Outside,
            "disabled" => ClipMode::Disabled,
            other => {
                return Err(StrataError::BadParam {
                    node_type: "clip",
                    path: p.to_owned(),
                    detail: format!("unknown clip mode \"{other}\""),
                });
            }
        };
        Ok(ClipPlane {
            normal: vec3_fields(v, ("x", "y", "z"), Vec3::Z),
            dist: f32_field(v, "dist", 0.0),
            mode,
        })
    };
    if let Some(arr) = value.get("planes").and_then(Value::as_array) {
        let mut planes = Vec::with_capacity(arr.len());
        for (i, entry) in arr.iter().enumerate() {
            planes.push(parse_one(entry, &format!("{path}.planes[{i}]"))?);
        }
        Ok(planes)
    } else {
        Ok(vec![parse_one(value, path)?])
    }
}

fn parse_primitive(value: &Value, path: &str) -> Result<Primitive> {
    match value.get("primitive").and_then(Value::as_str).unwrap_or("triangles") {
        "triangles" => Ok(Primitive::Triangles),
        "lines" => Ok(Primitive::Lines),
        "points" => Ok(Primitive::Points),
        other => Err(StrataError::BadParam {
            node_type: "geometry",
            path: path.to_owned(),
            detail: format!("unknown primitive \"{other}\""),
        }),
    }
}

fn parse_geometry_data(value: &Value, path: &str) -> Result<GeometryData> {
    let positions = f32_array(value, "positions").ok_or(StrataError::MissingParam {
        node_type: "geometry",
        param: "positions",
        path: path.to_owned(),
    })?;
    let indices = u32_array(value, "indices").ok_or(StrataError::MissingParam {
        node_type: "geometry",
        param: "indices",
        path: path.to_owned(),
    })?;
    Ok(GeometryData {
        positions,
        normals: f32_array(value, "normals").unwrap_or_default(),
        uvs: f32_array(value, "uv").unwrap_or_default(),
        indices,
    })
}
