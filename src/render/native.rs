use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use log::{debug, error, warn};
use wgpu::util::DeviceExt;
use winit::window::{Window, WindowId};

use super::{
    BufferHandle, GpuBackend, MeshHandle, RenderTargetDesc, RenderTargetHandle, TextureHandle,
};
use crate::assets::ImageData;
use crate::error::{RenderError, Result};
use crate::frame::{DrawCmd, Frame, Pass, PassState, Program, Target, TextureSource};
use crate::mesh::{MeshData, FLOATS_PER_VERTEX};
use crate::shaders::ShaderSet;
use crate::uniforms::DrawFlags;

/// Color format of offscreen targets; sampled by later passes.
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

/// GPU backend driving wgpu against a window surface.
pub struct WgpuBackend {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    layouts: Layouts,
    sampler: wgpu::Sampler,
    white: GpuTexture,
    modules: HashMap<Program, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    next_id: u32,
    buffers: HashMap<u32, wgpu::Buffer>,
    textures: HashMap<u32, GpuTexture>,
    meshes: HashMap<u32, MeshBuffers>,
    targets: HashMap<u32, OffscreenTarget>,
}

impl WgpuBackend {
    /// Initializes the device and surface for the provided window.
    ///
    /// Programs still have to be loaded with [`GpuBackend::load_programs`].
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("planet-gl-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create GPU device")?;
        device.on_uncaptured_error(Arc::new(|err: wgpu::Error| {
            error!("uncaptured GPU error: {err}");
        }));

        let surface_caps = surface.get_capabilities(&adapter);
        // Colors are written unconverted, so prefer a linear surface.
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, "surface", config.width, config.height);
        let layouts = Layouts::new(&device);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });
        let white = GpuTexture::upload(
            &device,
            &queue,
            "white",
            &ImageData::from_rgba(image::RgbaImage::from_pixel(1, 1, image::Rgba([255; 4]))),
        );

        debug!(
            "surface configured: {}x{} {:?}",
            config.width, config.height, config.format
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            layouts,
            sampler,
            white,
            modules: HashMap::new(),
            pipelines: HashMap::new(),
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            meshes: HashMap::new(),
            targets: HashMap::new(),
        })
    }

    /// Returns the identifier of the window owned by the backend.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn compile(&self, program: Program, source: &str) -> Result<wgpu::ShaderModule> {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.name()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|message| message.message_type == wgpu::CompilationMessageType::Error)
            .map(|message| message.message.clone())
            .collect();
        if errors.is_empty() {
            Ok(module)
        } else {
            Err(RenderError::Shader {
                program: program.name().to_string(),
                message: errors.join("; "),
            })
        }
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let module = self.modules.get(&key.program).ok_or_else(|| RenderError::Shader {
            program: key.program.name().to_string(),
            message: "program was never loaded".to_string(),
        })?;
        let pipeline = create_pipeline(&self.device, &self.layouts, module, key);
        debug!("built {} pipeline for {:?}", key.program.name(), key.format);
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn color_format(&self, target: Target) -> wgpu::TextureFormat {
        match target {
            Target::Surface => self.config.format,
            Target::Offscreen(_) => OFFSCREEN_FORMAT,
        }
    }

    fn has_depth(&self, target: Target) -> bool {
        match target {
            Target::Surface => true,
            Target::Offscreen(handle) => self
                .targets
                .get(&handle.0)
                .is_some_and(|target| target.depth.is_some()),
        }
    }

    fn pipeline_key(&self, pass: &Pass) -> PipelineKey {
        PipelineKey {
            program: pass.program,
            format: self.color_format(pass.target),
            state: pass.state,
            depth: self.has_depth(pass.target),
        }
    }

    fn source_view(&self, source: TextureSource) -> Result<&wgpu::TextureView> {
        match source {
            TextureSource::Texture(handle) => self.textures.get(&handle.0).map(|t| &t.view),
            TextureSource::RenderTarget(handle) => {
                self.targets.get(&handle.0).map(|t| &t.color.view)
            }
        }
        .ok_or_else(|| RenderError::InvalidFrame(format!("released image {source:?}")))
    }

    fn buffer(&self, handle: Option<BufferHandle>, what: &str) -> Result<&wgpu::Buffer> {
        handle
            .and_then(|handle| self.buffers.get(&handle.0))
            .ok_or_else(|| RenderError::InvalidFrame(format!("a missing {what} buffer")))
    }

    /// Bind groups and flag buffers for one pass, created before recording.
    fn prepare_pass(&self, pass: &Pass) -> Result<PreparedPass> {
        if let Target::Offscreen(target) = pass.target {
            if pass.samples(target) {
                return Err(RenderError::InvalidFrame(format!(
                    "its own target in pass {}",
                    pass.label
                )));
            }
        }

        let globals = match pass.program {
            Program::Lit => self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("lit-globals"),
                layout: &self.layouts.lit_globals,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.buffer(pass.bindings.camera, "camera")?.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.buffer(pass.bindings.lights, "light")?.as_entire_binding(),
                    },
                ],
            }),
            Program::PostProcess => {
                let source = pass.bindings.source.ok_or_else(|| {
                    RenderError::InvalidFrame(format!("no source image in pass {}", pass.label))
                })?;
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("postprocess-globals"),
                    layout: &self.layouts.postprocess,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: self
                                .buffer(pass.bindings.post, "post-process")?
                                .as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(self.source_view(source)?),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                })
            }
            Program::Screen => {
                let source = pass.bindings.source.ok_or_else(|| {
                    RenderError::InvalidFrame(format!("no source image in pass {}", pass.label))
                })?;
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("screen-globals"),
                    layout: &self.layouts.screen,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(self.source_view(source)?),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                })
            }
        };

        let mut draws = Vec::with_capacity(pass.draws.len());
        for draw in &pass.draws {
            match *draw {
                DrawCmd::Object {
                    mesh,
                    index_count,
                    object_buffer,
                    texture,
                    has_texture,
                    ignore_light,
                } => {
                    if !self.meshes.contains_key(&mesh.0) {
                        return Err(RenderError::InvalidFrame(format!("released mesh {}", mesh.0)));
                    }
                    let flags = self
                        .device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("draw-flags"),
                            contents: bytemuck::bytes_of(&DrawFlags::new(has_texture, ignore_light)),
                            usage: wgpu::BufferUsages::UNIFORM,
                        });
                    let view = match texture {
                        Some(source) => self.source_view(source)?,
                        None => &self.white.view,
                    };
                    let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("object-bind-group"),
                        layout: &self.layouts.lit_object,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: self.buffer(Some(object_buffer), "object")?.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: flags.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: wgpu::BindingResource::TextureView(view),
                            },
                            wgpu::BindGroupEntry {
                                binding: 3,
                                resource: wgpu::BindingResource::Sampler(&self.sampler),
                            },
                        ],
                    });
                    draws.push(PreparedDraw::Object {
                        mesh,
                        index_count,
                        bind_group,
                    });
                }
                DrawCmd::Fullscreen { vertex_count } => {
                    draws.push(PreparedDraw::Fullscreen { vertex_count });
                }
            }
        }

        Ok(PreparedPass {
            key: self.pipeline_key(pass),
            globals,
            draws,
        })
    }

    fn record_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &Pass,
        prepared: &PreparedPass,
        surface_view: Option<&wgpu::TextureView>,
    ) -> Result<()> {
        let (color_view, depth_view) = match pass.target {
            Target::Surface => (
                surface_view.ok_or_else(|| RenderError::Surface("no surface texture".into()))?,
                Some(&self.depth.view),
            ),
            Target::Offscreen(handle) => {
                let target = self.targets.get(&handle.0).ok_or_else(|| {
                    RenderError::InvalidFrame(format!("released target {}", handle.0))
                })?;
                (&target.color.view, target.depth.as_ref().map(|depth| &depth.view))
            }
        };
        let pipeline = self.pipelines.get(&prepared.key).ok_or_else(|| RenderError::Shader {
            program: pass.program.name().to_string(),
            message: "pipeline missing".to_string(),
        })?;

        let [r, g, b, a] = pass.clear;
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &prepared.globals, &[]);
        for draw in &prepared.draws {
            match draw {
                PreparedDraw::Object {
                    mesh,
                    index_count,
                    bind_group,
                } => {
                    let Some(buffers) = self.meshes.get(&mesh.0) else {
                        continue;
                    };
                    if *index_count == 0 {
                        continue;
                    }
                    render_pass.set_bind_group(1, bind_group, &[]);
                    render_pass.set_vertex_buffer(0, buffers.vertex.slice(..));
                    render_pass.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..*index_count, 0, 0..1);
                }
                PreparedDraw::Fullscreen { vertex_count } => {
                    render_pass.draw(0..*vertex_count, 0..1);
                }
            }
        }
        Ok(())
    }
}

impl GpuBackend for WgpuBackend {
    fn create_uniform_buffer(&mut self, label: &str, contents: &[u8]) -> BufferHandle {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let id = self.allocate();
        self.buffers.insert(id, buffer);
        BufferHandle(id)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, contents: &[u8]) {
        match self.buffers.get(&buffer.0) {
            Some(gpu_buffer) => self.queue.write_buffer(gpu_buffer, 0, contents),
            None => warn!("write to released buffer {}", buffer.0),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(gpu_buffer) = self.buffers.remove(&buffer.0) {
            gpu_buffer.destroy();
        }
    }

    fn create_texture(&mut self, label: &str, image: &ImageData) -> TextureHandle {
        let texture = GpuTexture::upload(&self.device, &self.queue, label, image);
        let id = self.allocate();
        self.textures.insert(id, texture);
        TextureHandle(id)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(gpu_texture) = self.textures.remove(&texture.0) {
            gpu_texture.texture.destroy();
        }
    }

    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> MeshHandle {
        let buffers = MeshBuffers::from_mesh(&self.device, mesh, label);
        let id = self.allocate();
        self.meshes.insert(id, buffers);
        MeshHandle(id)
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        if let Some(buffers) = self.meshes.remove(&mesh.0) {
            buffers.vertex.destroy();
            buffers.index.destroy();
        }
    }

    fn create_render_target(
        &mut self,
        label: &str,
        desc: &RenderTargetDesc,
    ) -> Result<RenderTargetHandle> {
        desc.validate(label)?;
        let limit = self.device.limits().max_texture_dimension_2d;
        if desc.width > limit || desc.height > limit {
            return Err(RenderError::FramebufferIncomplete {
                label: label.to_string(),
                width: desc.width,
                height: desc.height,
                reason: format!("device limit is {limit}"),
            });
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = desc
            .with_depth
            .then(|| DepthBuffer::create(&self.device, label, desc.width, desc.height));

        let id = self.allocate();
        self.targets.insert(
            id,
            OffscreenTarget {
                color: GpuTexture { texture, view },
                depth,
            },
        );
        Ok(RenderTargetHandle(id))
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        if let Some(offscreen) = self.targets.remove(&target.0) {
            offscreen.color.texture.destroy();
            if let Some(depth) = offscreen.depth {
                depth.texture.destroy();
            }
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, "surface", width, height);
    }

    fn load_programs(&mut self, shaders: &ShaderSet) -> Result<()> {
        shaders.validate()?;
        let mut modules = HashMap::new();
        for program in Program::ALL {
            modules.insert(program, self.compile(program, shaders.source(program))?);
        }
        // Replace only once every program compiled.
        self.modules = modules;
        self.pipelines.clear();
        Ok(())
    }

    fn submit(&mut self, frame: &Frame) -> Result<()> {
        for pass in &frame.passes {
            let key = self.pipeline_key(pass);
            self.ensure_pipeline(key)?;
        }
        let prepared = frame
            .passes
            .iter()
            .map(|pass| self.prepare_pass(pass))
            .collect::<Result<Vec<_>>>()?;

        let output = if frame.passes.iter().any(|pass| pass.target == Target::Surface) {
            match self.surface.get_current_texture() {
                Ok(output) => Some(output),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    self.surface.configure(&self.device, &self.config);
                    return Ok(());
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    warn!("surface timeout, skipping frame");
                    return Ok(());
                }
                Err(err) => return Err(RenderError::Surface(err.to_string())),
            }
        } else {
            None
        };
        let surface_view = output
            .as_ref()
            .map(|output| output.texture.create_view(&wgpu::TextureViewDescriptor::default()));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        for (pass, prepared) in frame.passes.iter().zip(&prepared) {
            self.record_pass(&mut encoder, pass, prepared, surface_view.as_ref())?;
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(output) = output {
            output.present();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: Program,
    format: wgpu::TextureFormat,
    state: PassState,
    depth: bool,
}

struct PreparedPass {
    key: PipelineKey,
    globals: wgpu::BindGroup,
    draws: Vec<PreparedDraw>,
}

enum PreparedDraw {
    Object {
        mesh: MeshHandle,
        index_count: u32,
        bind_group: wgpu::BindGroup,
    },
    Fullscreen {
        vertex_count: u32,
    },
}

struct Layouts {
    lit_globals: wgpu::BindGroupLayout,
    lit_object: wgpu::BindGroupLayout,
    postprocess: wgpu::BindGroupLayout,
    screen: wgpu::BindGroupLayout,
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let lit_globals = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lit-globals-layout"),
            entries: &[uniform_entry(0), uniform_entry(1)],
        });
        let lit_object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lit-object-layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                texture_entry(2),
                sampler_entry(3),
            ],
        });
        let postprocess = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("postprocess-layout"),
            entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
        });
        let screen = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("screen-layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        Self {
            lit_globals,
            lit_object,
            postprocess,
            screen,
        }
    }

    fn for_program(&self, program: Program) -> Vec<&wgpu::BindGroupLayout> {
        match program {
            Program::Lit => vec![&self.lit_globals, &self.lit_object],
            Program::PostProcess => vec![&self.postprocess],
            Program::Screen => vec![&self.screen],
        }
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layouts: &Layouts,
    module: &wgpu::ShaderModule,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let bind_group_layouts = layouts.for_program(key.program);
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(key.program.name()),
        bind_group_layouts: &bind_group_layouts,
        immediate_size: 0,
    });

    let vertex_layout = [wgpu::VertexBufferLayout {
        array_stride: (FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }];
    let buffers: &[wgpu::VertexBufferLayout] = match key.program {
        Program::Lit => &vertex_layout,
        Program::PostProcess | Program::Screen => &[],
    };

    let depth_stencil = key.depth.then(|| wgpu::DepthStencilState {
        format: DepthBuffer::FORMAT,
        depth_write_enabled: key.state.depth_test,
        depth_compare: if key.state.depth_test {
            wgpu::CompareFunction::Less
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: Default::default(),
        bias: Default::default(),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(key.program.name()),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers,
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.state.cull_back.then_some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        },
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend: key.state.alpha_blend.then_some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview_mask: None,
        cache: None,
    })
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuTexture {
    /// Uploads every level of the mip chain.
    fn upload(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, image: &ImageData) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: image.width().max(1),
                height: image.height().max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: image.mip_level_count().max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (level, mip) in image.levels.iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &mip.pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * mip.width),
                    rows_per_image: Some(mip.height),
                },
                wgpu::Extent3d {
                    width: mip.width,
                    height: mip.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

struct OffscreenTarget {
    color: GpuTexture,
    depth: Option<DepthBuffer>,
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertex, index }
    }
}

struct DepthBuffer {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{label}-depth")),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}
