//! wgpu backend.
//!
//! Maps the chunk stream onto wgpu: applied chunks accumulate into a draw
//! state; `draw` resolves that state into a cached render pipeline
//! (keyed by program + render-mode flags), writes one dynamic-offset
//! uniform slice, and records the indexed draw. Programs are compiled
//! from the opaque WGSL artifacts carried by shader cores; program id 0
//! is a built-in default used when a subtree declares no shader or its
//! shader failed to compile.
//!
//! The backend is headless: it renders into its own color/depth targets
//! (plus offscreen stage and pick targets) and exposes `read_pixels` for
//! the pick path. Window/surface plumbing is the embedder's concern.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;

use crate::chunk::Chunk;
use crate::core::{GeometryData, ImageData, Primitive, ProgramArtifact, RenderFlags};
use crate::errors::{Result, StrataError};
use crate::render::backend::{
    GeometryBuffersId, PassTarget, ProgramId, RenderBackend, StageId, TextureId,
};

const MAX_LIGHTS: usize = 4;
const MAX_CLIP: usize = 4;
/// Dynamic-offset stride; 256-aligned and comfortably above the uniform
/// struct size.
const UNIFORM_STRIDE: u64 = 1024;
const INITIAL_UNIFORM_CAPACITY: u64 = UNIFORM_STRIDE * 256;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const DEFAULT_PROGRAM_WGSL: &str = r"
struct DrawUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    world: mat4x4<f32>,
    normal_mat: mat4x4<f32>,
    eye: vec4<f32>,
    base_color: vec4<f32>,
    specular_color: vec4<f32>,
    material_params: vec4<f32>,
    pick_color: vec4<f32>,
    light_vectors: array<vec4<f32>, 4>,
    light_colors: array<vec4<f32>, 4>,
    clip_planes: array<vec4<f32>, 4>,
    counts: vec4<u32>,
};

@group(0) @binding(0) var<uniform> u: DrawUniforms;
@group(0) @binding(1) var base_texture: texture_2d<f32>;
@group(0) @binding(2) var base_sampler: sampler;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(
    @location(0) pos: vec3<f32>,
    @location(1) nrm: vec3<f32>,
    @location(2) uv: vec2<f32>,
) -> VsOut {
    var out: VsOut;
    let wp = u.world * vec4<f32>(pos, 1.0);
    out.world_pos = wp.xyz;
    out.normal = (u.normal_mat * vec4<f32>(nrm, 0.0)).xyz;
    out.uv = uv;
    out.clip = u.proj * u.view * wp;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let texel = textureSample(base_texture, base_sampler, in.uv);

    // Pick sub-mode: flat object-id color.
    if (u.counts.z == 1u) {
        return u.pick_color;
    }

    for (var i = 0u; i < u.counts.y; i = i + 1u) {
        let p = u.clip_planes[i];
        if (dot(in.world_pos, p.xyz) - p.w < 0.0) {
            discard;
        }
    }

    var albedo = u.base_color.rgb;
    if (u.counts.w == 1u) {
        albedo = mix(albedo, albedo * texel.rgb, u.material_params.w);
    }

    let n = normalize(in.normal);
    let v = normalize(u.eye.xyz - in.world_pos);
    var color = albedo * u.material_params.y;

    for (var i = 0u; i < u.counts.x; i = i + 1u) {
        let lv = u.light_vectors[i];
        var l: vec3<f32>;
        if (lv.w > 0.5) {
            l = normalize(lv.xyz - in.world_pos);
        } else {
            l = normalize(-lv.xyz);
        }
        let ndl = max(dot(n, l), 0.0);
        color = color + albedo * u.light_colors[i].rgb * ndl;
        let h = normalize(l + v);
        let spec = pow(max(dot(n, h), 0.0), max(u.material_params.x, 1.0)) * u.specular_color.w;
        color = color + u.specular_color.rgb * u.light_colors[i].rgb * spec;
    }

    return vec4<f32>(color, u.material_params.z);
}
";

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DrawUniforms {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    world: [[f32; 4]; 4],
    normal_mat: [[f32; 4]; 4],
    eye: [f32; 4],
    base_color: [f32; 4],
    /// rgb + specular amount.
    specular_color: [f32; 4],
    /// shine, emit, alpha, first-layer blend factor.
    material_params: [f32; 4],
    pick_color: [f32; 4],
    /// xyz = direction-or-position, w = 1 for point lights.
    light_vectors: [[f32; 4]; MAX_LIGHTS],
    light_colors: [[f32; 4]; MAX_LIGHTS],
    /// xyz = normal, w = dist.
    clip_planes: [[f32; 4]; MAX_CLIP],
    /// num_lights, num_clip, pick_mode, has_texture.
    counts: [u32; 4],
}

/// Accumulated chunk state between draws.
#[derive(Clone)]
struct DrawState {
    program: ProgramId,
    view: Mat4,
    eye: Vec3,
    proj: Mat4,
    world: Mat4,
    normal: Mat4,
    base_color: [f32; 4],
    specular_color: [f32; 4],
    shine: f32,
    emit: f32,
    alpha: f32,
    lights: Vec<([f32; 4], [f32; 4])>,
    clip: Vec<[f32; 4]>,
    flags: RenderFlags,
    texture: Option<(TextureId, f32)>,
    pick_color: [f32; 4],
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            program: 0,
            view: Mat4::IDENTITY,
            eye: Vec3::ZERO,
            proj: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
            normal: Mat4::IDENTITY,
            base_color: [1.0; 4],
            specular_color: [1.0; 4],
            shine: 70.0,
            emit: 0.0,
            alpha: 1.0,
            lights: Vec::new(),
            clip: Vec::new(),
            flags: RenderFlags::default(),
            texture: None,
            pick_color: [0.0; 4],
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    topology: wgpu::PrimitiveTopology,
    blend: bool,
    depth_test: bool,
    depth_write: bool,
    cull_back: bool,
    front_cw: bool,
}

struct GeometryEntry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    topology: wgpu::PrimitiveTopology,
}

struct ProgramEntry {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
}

struct TargetEntry {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    features: wgpu::Features,

    screen: TargetEntry,
    pick: Option<TargetEntry>,

    geometries: FxHashMap<GeometryBuffersId, GeometryEntry>,
    programs: FxHashMap<ProgramId, ProgramEntry>,
    textures: FxHashMap<TextureId, wgpu::TextureView>,
    stages: FxHashMap<StageId, TargetEntry>,
    next_geometry_id: GeometryBuffersId,
    next_program_id: ProgramId,
    next_texture_id: TextureId,
    next_stage_id: StageId,

    sampler: wgpu::Sampler,
    dummy_texture: wgpu::TextureView,

    uniform_buffer: wgpu::Buffer,
    uniform_capacity: u64,
    uniform_cursor: u64,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    bind_groups: FxHashMap<Option<TextureId>, wgpu::BindGroup>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,

    encoder: Option<wgpu::CommandEncoder>,
    pass: Option<wgpu::RenderPass<'static>>,
    pass_is_pick: bool,
    state: DrawState,
}

impl WgpuBackend {
    /// Creates a backend over an existing device/queue pair.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let features = device.features();
        let screen = create_target(&device, width.max(1), height.max(1), false, "MainTarget");

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("StrataSampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            ..Default::default()
        });
        let dummy_texture = create_texture_rgba8(
            &device,
            &queue,
            1,
            1,
            &[255, 255, 255, 255],
            "DummyWhite",
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DrawUniforms"),
            size: INITIAL_UNIFORM_CAPACITY,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("StrataBindGroupLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<DrawUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("StrataPipelineLayout"),
            bind_group_layouts: &[Some(&bind_group_layout)],
            immediate_size: 0,
        });

        let default_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("DefaultProgram"),
            source: wgpu::ShaderSource::Wgsl(DEFAULT_PROGRAM_WGSL.into()),
        });
        let mut programs = FxHashMap::default();
        programs.insert(
            0,
            ProgramEntry {
                vertex: default_module.clone(),
                fragment: default_module,
            },
        );

        Self {
            device,
            queue,
            features,
            screen,
            pick: None,
            geometries: FxHashMap::default(),
            programs,
            textures: FxHashMap::default(),
            stages: FxHashMap::default(),
            next_geometry_id: 1,
            next_program_id: 1,
            next_texture_id: 1,
            next_stage_id: 1,
            sampler,
            dummy_texture,
            uniform_buffer,
            uniform_capacity: INITIAL_UNIFORM_CAPACITY,
            uniform_cursor: 0,
            bind_group_layout,
            pipeline_layout,
            bind_groups: FxHashMap::default(),
            pipelines: FxHashMap::default(),
            encoder: None,
            pass: None,
            pass_is_pick: false,
            state: DrawState::default(),
        }
    }

    /// Creates a backend with its own headless device.
    pub fn headless(width: u32, height: u32) -> Result<Self> {
        pollster::block_on(async {
            let instance = wgpu::Instance::default();
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| StrataError::Gpu(e.to_string()))?;
            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    ..Default::default()
                })
                .await
                .map_err(|e| StrataError::Gpu(e.to_string()))?;
            Ok(Self::new(device, queue, width, height))
        })
    }

    /// The main color target, for embedders that present or copy it out.
    #[must_use]
    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.screen.color
    }

    fn ensure_uniform_capacity(&mut self, needed: u64) {
        if needed <= self.uniform_capacity {
            return;
        }
        let new_capacity = self.uniform_capacity.max(UNIFORM_STRIDE) * 2;
        let new_capacity = new_capacity.max(needed);
        log::info!(
            "uniform buffer grown {} -> {new_capacity}; bind groups invalidated",
            self.uniform_capacity
        );
        self.uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DrawUniforms"),
            size: new_capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.uniform_capacity = new_capacity;
        // Recorded draws keep the old buffer alive; only future binds see
        // the new one.
        self.bind_groups.clear();
    }

    fn bind_group_for(&mut self, texture: Option<TextureId>) -> wgpu::BindGroup {
        if let Some(bg) = self.bind_groups.get(&texture) {
            return bg.clone();
        }
        let view = texture
            .and_then(|id| self.textures.get(&id))
            .unwrap_or(&self.dummy_texture);
        let bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("StrataBindGroup"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.uniform_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.bind_groups.insert(texture, bg.clone());
        bg
    }

    fn pipeline_for(&mut self, key: PipelineKey) -> wgpu::RenderPipeline {
        if let Some(p) = self.pipelines.get(&key) {
            return p.clone();
        }
        let program = self.programs.get(&key.program).unwrap_or_else(|| {
            log::warn!("pipeline requested for dead program {}; using default", key.program);
            &self.programs[&0]
        });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: 32,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 0,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 12,
                    shader_location: 1,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 24,
                    shader_location: 2,
                },
            ],
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("StrataPipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some("vs_main"),
                    buffers: &[vertex_layout],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: if key.blend {
                            Some(wgpu::BlendState::ALPHA_BLENDING)
                        } else {
                            None
                        },
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: key.topology,
                    front_face: if key.front_cw {
                        wgpu::FrontFace::Cw
                    } else {
                        wgpu::FrontFace::Ccw
                    },
                    cull_mode: if key.cull_back {
                        Some(wgpu::Face::Back)
                    } else {
                        None
                    },
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: key.depth_write,
                    depth_compare: if key.depth_test {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
        self.pipelines.insert(key, pipeline.clone());
        pipeline
    }

    fn current_uniforms(&self) -> DrawUniforms {
        let s = &self.state;
        let mut u = DrawUniforms {
            view: s.view.to_cols_array_2d(),
            proj: s.proj.to_cols_array_2d(),
            world: s.world.to_cols_array_2d(),
            normal_mat: s.normal.to_cols_array_2d(),
            eye: [s.eye.x, s.eye.y, s.eye.z, 1.0],
            base_color: s.base_color,
            specular_color: s.specular_color,
            material_params: [
                s.shine,
                s.emit,
                s.alpha,
                s.texture.map_or(0.0, |(_, f)| f),
            ],
            pick_color: s.pick_color,
            light_vectors: [[0.0; 4]; MAX_LIGHTS],
            light_colors: [[0.0; 4]; MAX_LIGHTS],
            clip_planes: [[0.0; 4]; MAX_CLIP],
            counts: [
                s.lights.len().min(MAX_LIGHTS) as u32,
                s.clip.len().min(MAX_CLIP) as u32,
                u32::from(self.pass_is_pick),
                u32::from(s.texture.is_some()),
            ],
        };
        for (i, (vector, color)) in s.lights.iter().take(MAX_LIGHTS).enumerate() {
            u.light_vectors[i] = *vector;
            u.light_colors[i] = *color;
        }
        for (i, plane) in s.clip.iter().take(MAX_CLIP).enumerate() {
            u.clip_planes[i] = *plane;
        }
        u
    }
}

impl RenderBackend for WgpuBackend {
    fn supports_extension(&self, name: &str) -> bool {
        match name {
            "texture-compression-bc" => self
                .features
                .contains(wgpu::Features::TEXTURE_COMPRESSION_BC),
            "float32-filterable" => self.features.contains(wgpu::Features::FLOAT32_FILTERABLE),
            "timestamp-query" => self.features.contains(wgpu::Features::TIMESTAMP_QUERY),
            _ => false,
        }
    }

    fn create_program(&mut self, artifact: &ProgramArtifact) -> Result<ProgramId> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}:vertex", artifact.name)),
                source: wgpu::ShaderSource::Wgsl(artifact.vertex.as_str().into()),
            });
        let fragment = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}:fragment", artifact.name)),
                source: wgpu::ShaderSource::Wgsl(artifact.fragment.as_str().into()),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(StrataError::Gpu(format!(
                "program \"{}\" failed to compile: {error}",
                artifact.name
            )));
        }

        let id = self.next_program_id;
        self.next_program_id += 1;
        self.programs.insert(id, ProgramEntry { vertex, fragment });
        Ok(id)
    }

    fn destroy_program(&mut self, id: ProgramId) {
        if id == 0 {
            return; // the default program is backend-owned
        }
        self.programs.remove(&id);
        self.pipelines.retain(|key, _| key.program != id);
    }

    fn upload_geometry(
        &mut self,
        data: &GeometryData,
        primitive: Primitive,
    ) -> Result<GeometryBuffersId> {
        let vertex_count = data.vertex_count();
        let mut interleaved: Vec<f32> = Vec::with_capacity(vertex_count * 8);
        for i in 0..vertex_count {
            interleaved.extend_from_slice(&data.positions[i * 3..i * 3 + 3]);
            if data.normals.len() >= (i + 1) * 3 {
                interleaved.extend_from_slice(&data.normals[i * 3..i * 3 + 3]);
            } else {
                interleaved.extend_from_slice(&[0.0, 0.0, 1.0]);
            }
            if data.uvs.len() >= (i + 1) * 2 {
                interleaved.extend_from_slice(&data.uvs[i * 2..i * 2 + 2]);
            } else {
                interleaved.extend_from_slice(&[0.0, 0.0]);
            }
        }

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("StrataVertexBuffer"),
                contents: bytemuck::cast_slice(&interleaved),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("StrataIndexBuffer"),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let id = self.next_geometry_id;
        self.next_geometry_id += 1;
        self.geometries.insert(
            id,
            GeometryEntry {
                vertex_buffer,
                index_buffer,
                index_count: data.indices.len() as u32,
                topology: match primitive {
                    Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
                    Primitive::Lines => wgpu::PrimitiveTopology::LineList,
                    Primitive::Points => wgpu::PrimitiveTopology::PointList,
                },
            },
        );
        Ok(id)
    }

    fn destroy_geometry(&mut self, id: GeometryBuffersId) {
        self.geometries.remove(&id);
    }

    fn upload_texture(&mut self, image: &ImageData) -> Result<TextureId> {
        if image.rgba8.len() != (image.width * image.height * 4) as usize {
            return Err(StrataError::Gpu(format!(
                "texture data length {} does not match {}x{}",
                image.rgba8.len(),
                image.width,
                image.height
            )));
        }
        let view = create_texture_rgba8(
            &self.device,
            &self.queue,
            image.width,
            image.height,
            &image.rgba8,
            "StrataTexture",
        );
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, view);
        Ok(id)
    }

    fn destroy_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
        self.bind_groups.remove(&Some(id));
    }

    fn create_stage(&mut self, width: u32, height: u32) -> Result<StageId> {
        let target = create_target(&self.device, width.max(1), height.max(1), false, "StageTarget");
        let id = self.next_stage_id;
        self.next_stage_id += 1;
        self.stages.insert(id, target);
        Ok(id)
    }

    fn destroy_stage(&mut self, id: StageId) {
        self.stages.remove(&id);
    }

    fn begin_pass(&mut self, target: PassTarget, clear_color: Option<[f32; 4]>) -> Result<()> {
        if self.pass.is_some() {
            return Err(StrataError::Gpu("begin_pass while a pass is open".into()));
        }

        self.pass_is_pick = matches!(target, PassTarget::Pick { .. });
        let (color_view, depth_view) = match target {
            PassTarget::Screen => (&self.screen.color_view, &self.screen.depth_view),
            PassTarget::Offscreen(id) => {
                let stage = self
                    .stages
                    .get(&id)
                    .ok_or_else(|| StrataError::Gpu(format!("unknown stage target {id}")))?;
                (&stage.color_view, &stage.depth_view)
            }
            PassTarget::Pick { width, height } => {
                let recreate = self
                    .pick
                    .as_ref()
                    .is_none_or(|t| t.width != width || t.height != height);
                if recreate {
                    self.pick = Some(create_target(
                        &self.device,
                        width.max(1),
                        height.max(1),
                        true,
                        "PickTarget",
                    ));
                }
                let pick = self.pick.as_ref().expect("pick target just ensured");
                (&pick.color_view, &pick.depth_view)
            }
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("StrataPassEncoder"),
            });

        let load = match clear_color {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: f64::from(r),
                g: f64::from(g),
                b: f64::from(b),
                a: f64::from(a),
            }),
            None => wgpu::LoadOp::Load,
        };

        let pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("StrataPass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();

        self.encoder = Some(encoder);
        self.pass = Some(pass);
        self.uniform_cursor = 0;
        self.state = DrawState::default();
        Ok(())
    }

    fn apply(&mut self, chunk: &Chunk) -> Result<()> {
        match chunk {
            Chunk::Program { program } => self.state.program = *program,
            // Custom uniform plumbing belongs to the program itself; the
            // fixed uniform block carries no named params.
            Chunk::Params { .. } => {}
            Chunk::View { matrix, eye } => {
                self.state.view = *matrix;
                self.state.eye = *eye;
            }
            Chunk::Camera { matrix } => self.state.proj = *matrix,
            Chunk::Clip { planes } => {
                self.state.clip = planes
                    .iter()
                    .filter(|p| p.mode != crate::core::ClipMode::Disabled)
                    .map(|p| {
                        let sign = if p.mode == crate::core::ClipMode::Outside {
                            -1.0
                        } else {
                            1.0
                        };
                        [
                            p.normal.x * sign,
                            p.normal.y * sign,
                            p.normal.z * sign,
                            p.dist * sign,
                        ]
                    })
                    .collect();
            }
            Chunk::Flags { flags } => self.state.flags = *flags,
            Chunk::Lights { sources } => {
                self.state.lights = sources
                    .iter()
                    .map(|s| {
                        let vector = match s.kind {
                            crate::core::LightKind::Directional(dir) => [dir.x, dir.y, dir.z, 0.0],
                            crate::core::LightKind::Point { pos, .. } => [pos.x, pos.y, pos.z, 1.0],
                        };
                        let color = if s.diffuse || s.specular {
                            [s.color.x, s.color.y, s.color.z, 1.0]
                        } else {
                            [0.0, 0.0, 0.0, 1.0]
                        };
                        (vector, color)
                    })
                    .collect();
            }
            Chunk::Material {
                base_color,
                specular_color,
                specular,
                shine,
                emit,
                alpha,
            } => {
                self.state.base_color = [base_color.x, base_color.y, base_color.z, *alpha];
                self.state.specular_color =
                    [specular_color.x, specular_color.y, specular_color.z, *specular];
                self.state.shine = *shine;
                self.state.emit = *emit;
                self.state.alpha = *alpha;
            }
            Chunk::Texture { layers } => {
                // The fixed pipeline binds the first layer; further layers
                // are the domain of custom programs.
                self.state.texture = layers.first().map(|l| (l.texture, l.blend_factor));
            }
            Chunk::Transform { world, normal } => {
                self.state.world = *world;
                self.state.normal = Mat4::from_mat3(*normal);
            }
            Chunk::PickColor { rgba } => self.state.pick_color = *rgba,
        }
        Ok(())
    }

    fn draw(&mut self, geometry: GeometryBuffersId) -> Result<()> {
        if self.pass.is_none() {
            return Err(StrataError::Gpu("draw outside a pass".into()));
        }
        let Some(topology) = self.geometries.get(&geometry).map(|g| g.topology) else {
            return Err(StrataError::Gpu(format!("unknown geometry {geometry}")));
        };

        let offset = self.uniform_cursor;
        self.ensure_uniform_capacity(offset + UNIFORM_STRIDE);
        let uniforms = self.current_uniforms();
        self.queue
            .write_buffer(&self.uniform_buffer, offset, bytemuck::bytes_of(&uniforms));
        self.uniform_cursor += UNIFORM_STRIDE;

        let key = PipelineKey {
            program: if self.pass_is_pick { 0 } else { self.state.program },
            topology,
            blend: !self.pass_is_pick && self.state.flags.contains(RenderFlags::TRANSPARENT),
            depth_test: self.state.flags.contains(RenderFlags::DEPTH_TEST),
            depth_write: self.state.flags.contains(RenderFlags::DEPTH_WRITE),
            cull_back: !self.state.flags.contains(RenderFlags::BACKFACES),
            front_cw: self.state.flags.contains(RenderFlags::FRONTFACE_CW),
        };
        let pipeline = self.pipeline_for(key);
        let texture = if self.pass_is_pick {
            None
        } else {
            self.state.texture.map(|(id, _)| id)
        };
        let bind_group = self.bind_group_for(texture);

        let entry = self
            .geometries
            .get(&geometry)
            .expect("geometry checked above");
        let pass = self.pass.as_mut().expect("pass checked above");
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[offset as u32]);
        pass.set_vertex_buffer(0, entry.vertex_buffer.slice(..));
        pass.set_index_buffer(entry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..entry.index_count, 0, 0..1);
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        if self.pass.take().is_none() {
            return Err(StrataError::Gpu("end_pass without an open pass".into()));
        }
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| StrataError::Gpu("pass had no encoder".into()))?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        let Some(pick) = &self.pick else {
            return Err(StrataError::Gpu("read_pixels before any pick pass".into()));
        };
        if x + width > pick.width || y + height > pick.height {
            return Err(StrataError::Gpu("read_pixels region out of bounds".into()));
        }

        let bytes_per_row = (width * 4).div_ceil(256) * 256;
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("PickReadback"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("PickReadbackEncoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &pick.color,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait);
        rx.recv()
            .map_err(|_| StrataError::Gpu("readback mapping never completed".into()))?
            .map_err(|e| StrataError::Gpu(format!("readback mapping failed: {e:?}")))?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            pixels.extend_from_slice(&mapped[start..start + (width * 4) as usize]);
        }
        drop(mapped);
        readback.unmap();
        Ok(pixels)
    }
}

fn create_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    readback: bool,
    label: &str,
) -> TargetEntry {
    let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    if readback {
        usage |= wgpu::TextureUsages::COPY_SRC;
    }
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage,
        view_formats: &[],
    });
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("StrataDepth"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    TargetEntry {
        color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
        depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
        color,
        width,
        height,
    }
}

fn create_texture_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    rgba8: &[u8],
    label: &str,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba8,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
