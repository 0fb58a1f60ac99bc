//! wgpu implementation of [`GraphicsContext`].
//!
//! Commands issued during a frame are recorded and flushed into one render
//! pass by [`present`](GraphicsContext::present). Render pipelines are built
//! lazily per program for each blend/depth combination they are drawn with.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::{
    BlendFactor, BlendFunc, BufferId, BufferKind, Capability, DrawCall, DrawUniforms, GraphicsContext,
    ProgramDesc, ProgramId, Vertex, VertexLayout,
};
use crate::error::GpuError;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const UNIFORM_SIZE: u64 = std::mem::size_of::<DrawUniforms>() as u64;
const INITIAL_UNIFORM_SLOTS: u64 = 16;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4];

struct GpuBuffer {
    buffer: wgpu::Buffer,
    size: u64,
}

struct GpuProgram {
    label: String,
    module: wgpu::ShaderModule,
    layout: VertexLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    blend: Option<BlendFunc>,
    depth_test: bool,
}

#[derive(Debug, Clone, Copy)]
struct FrameState {
    clear: Option<[f32; 4]>,
    viewport: Option<(i32, i32, u32, u32)>,
    depth_test: bool,
    blend: bool,
    blend_func: BlendFunc,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            clear: None,
            viewport: None,
            depth_test: false,
            blend: false,
            blend_func: BlendFunc::default(),
        }
    }
}

impl FrameState {
    fn pipeline_key(&self) -> PipelineKey {
        PipelineKey {
            blend: self.blend.then_some(self.blend_func),
            depth_test: self.depth_test,
        }
    }
}

struct PendingDraw {
    call: DrawCall,
    key: PipelineKey,
    viewport: Option<(i32, i32, u32, u32)>,
}

/// Graphics context backed by a wgpu device and surface.
pub struct WgpuContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_stride: u64,
    uniform_slots: u64,
    depth_texture: wgpu::TextureView,
    buffers: HashMap<BufferId, GpuBuffer>,
    programs: HashMap<ProgramId, GpuProgram>,
    next_id: u32,
    state: FrameState,
    draws: Vec<PendingDraw>,
    lost: bool,
}

impl WgpuContext {
    /// Create a context rendering into `target`, initially `width` × `height`.
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(target)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Shimmer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::NoAdapter)?;

        // The page shows through wherever no particle was drawn.
        let alpha_mode = if surface_caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = create_depth_texture(&device, &config);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(UNIFORM_SIZE),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let uniform_stride = UNIFORM_SIZE.div_ceil(alignment) * alignment;
        let (uniform_buffer, uniform_bind_group) =
            create_uniform_storage(&device, &uniform_layout, uniform_stride, INITIAL_UNIFORM_SLOTS);

        log::info!(
            "wgpu context ready: {:?} backend, {}x{} {:?}",
            adapter.get_info().backend,
            config.width,
            config.height,
            config.format
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline_layout,
            uniform_layout,
            uniform_buffer,
            uniform_bind_group,
            uniform_stride,
            uniform_slots: INITIAL_UNIFORM_SLOTS,
            depth_texture,
            buffers: HashMap::new(),
            programs: HashMap::new(),
            next_id: 1,
            state: FrameState::default(),
            draws: Vec::new(),
            lost: false,
        })
    }

    /// Current surface size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn resize(&mut self, width: u32, height: u32) {
        let max = self.device.limits().max_texture_dimension_2d;
        let width = width.clamp(1, max);
        let height = height.clamp(1, max);
        if width == self.config.width && height == self.config.height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = create_depth_texture(&self.device, &self.config);
        log::debug!("surface resized to {}x{}", width, height);
    }

    fn ensure_uniform_slots(&mut self, slots: u64) {
        if slots <= self.uniform_slots {
            return;
        }
        let capacity = slots.next_power_of_two();
        let (buffer, bind_group) =
            create_uniform_storage(&self.device, &self.uniform_layout, self.uniform_stride, capacity);
        self.uniform_buffer.destroy();
        self.uniform_buffer = buffer;
        self.uniform_bind_group = bind_group;
        self.uniform_slots = capacity;
    }

    fn ensure_pipelines(&mut self) -> Result<(), GpuError> {
        for draw in &self.draws {
            let program = self
                .programs
                .get_mut(&draw.call.program)
                .ok_or(GpuError::UnknownProgram(draw.call.program))?;
            if program.pipelines.contains_key(&draw.key) {
                continue;
            }
            let pipeline = create_pipeline(
                &self.device,
                &self.pipeline_layout,
                self.config.format,
                program,
                draw.key,
            );
            program.pipelines.insert(draw.key, pipeline);
        }
        Ok(())
    }

    fn buffer(&self, id: BufferId) -> Result<&wgpu::Buffer, GpuError> {
        self.buffers
            .get(&id)
            .map(|b| &b.buffer)
            .ok_or(GpuError::UnknownBuffer(id))
    }

    fn flush(&mut self) -> Result<(), GpuError> {
        let clear = self.state.clear.take();
        let result = self.encode_frame(clear);
        self.draws.clear();
        result
    }

    fn encode_frame(&mut self, clear: Option<[f32; 4]>) -> Result<(), GpuError> {
        self.ensure_pipelines()?;
        self.ensure_uniform_slots(self.draws.len() as u64);

        if !self.draws.is_empty() {
            let stride = self.uniform_stride as usize;
            let mut uniform_data = vec![0u8; self.draws.len() * stride];
            for (slot, draw) in self.draws.iter().enumerate() {
                let start = slot * stride;
                uniform_data[start..start + UNIFORM_SIZE as usize]
                    .copy_from_slice(bytemuck::bytes_of(&draw.call.uniforms));
            }
            self.queue.write_buffer(&self.uniform_buffer, 0, &uniform_data);
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.surface.configure(&self.device, &self.config);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let load = match clear {
                Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                }),
                None => wgpu::LoadOp::Load,
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Particle Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (slot, draw) in self.draws.iter().enumerate() {
                let call = &draw.call;
                let program = self
                    .programs
                    .get(&call.program)
                    .ok_or(GpuError::UnknownProgram(call.program))?;
                let pipeline = program
                    .pipelines
                    .get(&draw.key)
                    .ok_or(GpuError::UnknownProgram(call.program))?;

                if let Some((x, y, w, h)) = draw.viewport {
                    let x = x.max(0) as u32;
                    let y = y.max(0) as u32;
                    if x < self.config.width && y < self.config.height {
                        let w = w.min(self.config.width - x).max(1);
                        let h = h.min(self.config.height - y).max(1);
                        render_pass.set_viewport(x as f32, y as f32, w as f32, h as f32, 0.0, 1.0);
                    }
                }

                render_pass.set_pipeline(pipeline);
                let offset = (slot as u64 * self.uniform_stride) as u32;
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
                render_pass.set_vertex_buffer(0, self.buffer(call.mesh.vertices)?.slice(..));
                if let Some(instances) = call.instances {
                    render_pass.set_vertex_buffer(1, self.buffer(instances)?.slice(..));
                }
                render_pass.set_index_buffer(
                    self.buffer(call.mesh.indices)?.slice(..),
                    wgpu::IndexFormat::Uint16,
                );
                render_pass.draw_indexed(0..call.mesh.index_count, 0, 0..call.instance_count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

impl GraphicsContext for WgpuContext {
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        if self.lost {
            return;
        }
        // Resizing the viewport to the full surface is how the host resizes
        // the drawing buffer.
        if x == 0 && y == 0 {
            self.resize(width, height);
        }
        self.state.viewport = Some((x, y, width, height));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.state.clear = Some(color);
    }

    fn enable(&mut self, capability: Capability) {
        match capability {
            Capability::DepthTest => self.state.depth_test = true,
            Capability::Blend => self.state.blend = true,
        }
    }

    fn disable(&mut self, capability: Capability) {
        match capability {
            Capability::DepthTest => self.state.depth_test = false,
            Capability::Blend => self.state.blend = false,
        }
    }

    fn blend_func_separate(&mut self, func: BlendFunc) {
        self.state.blend_func = func;
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId, GpuError> {
        if self.lost {
            return Err(GpuError::ContextLost);
        }
        let (label, usage) = match kind {
            BufferKind::Vertex => ("Mesh Vertex Buffer", wgpu::BufferUsages::VERTEX),
            BufferKind::Index => ("Mesh Index Buffer", wgpu::BufferUsages::INDEX),
            BufferKind::Instance => ("Instance Buffer", wgpu::BufferUsages::VERTEX),
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: data,
                usage: usage | wgpu::BufferUsages::COPY_DST,
            });
        let id = BufferId(self.next_id());
        self.buffers.insert(
            id,
            GpuBuffer {
                size: data.len() as u64,
                buffer,
            },
        );
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        if self.lost {
            return Err(GpuError::ContextLost);
        }
        let target = self.buffers.get(&buffer).ok_or(GpuError::UnknownBuffer(buffer))?;
        if offset + data.len() as u64 > target.size {
            return Err(GpuError::BufferOverflow {
                buffer,
                offset,
                len: data.len(),
                size: target.size,
            });
        }
        self.queue.write_buffer(&target.buffer, offset, data);
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(b) = self.buffers.remove(&buffer) {
            b.buffer.destroy();
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, GpuError> {
        if self.lost {
            return Err(GpuError::ContextLost);
        }
        let module = compile_shader(&self.device, desc)?;

        let id = ProgramId(self.next_id());
        self.programs.insert(
            id,
            GpuProgram {
                label: desc.label.to_string(),
                module,
                layout: desc.layout,
                pipelines: HashMap::new(),
            },
        );
        log::debug!("compiled program `{}` as {:?}", desc.label, id);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(p) = self.programs.remove(&program) {
            log::debug!("deleted program `{}`", p.label);
        }
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), GpuError> {
        if self.lost {
            return Err(GpuError::ContextLost);
        }
        if !self.programs.contains_key(&call.program) {
            return Err(GpuError::UnknownProgram(call.program));
        }
        self.buffer(call.mesh.vertices)?;
        self.buffer(call.mesh.indices)?;
        if let Some(instances) = call.instances {
            self.buffer(instances)?;
        }

        self.draws.push(PendingDraw {
            call: *call,
            key: self.state.pipeline_key(),
            viewport: self.state.viewport,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), GpuError> {
        if self.lost {
            return Err(GpuError::ContextLost);
        }
        self.flush()
    }

    fn lose_context(&mut self) -> bool {
        if self.lost {
            return true;
        }
        self.draws.clear();
        for (_, b) in self.buffers.drain() {
            b.buffer.destroy();
        }
        self.programs.clear();
        self.uniform_buffer.destroy();
        self.device.destroy();
        self.lost = true;
        log::info!("wgpu context released");
        true
    }
}

/// Compile WGSL, surfacing validation errors instead of the default panic.
#[cfg(not(target_arch = "wasm32"))]
fn compile_shader(device: &wgpu::Device, desc: &ProgramDesc<'_>) -> Result<wgpu::ShaderModule, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.label),
        source: wgpu::ShaderSource::Wgsl(desc.source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(GpuError::ShaderCompilation {
            label: desc.label.to_string(),
            message: err.to_string(),
        }),
        None => Ok(module),
    }
}

// Error scopes resolve asynchronously in the browser; blocking on them would
// stall the page, so validation errors go to the device's error handler.
#[cfg(target_arch = "wasm32")]
fn compile_shader(device: &wgpu::Device, desc: &ProgramDesc<'_>) -> Result<wgpu::ShaderModule, GpuError> {
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.label),
        source: wgpu::ShaderSource::Wgsl(desc.source.into()),
    }))
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

fn blend_state(func: BlendFunc) -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: blend_factor(func.src_rgb),
            dst_factor: blend_factor(func.dst_rgb),
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: blend_factor(func.src_alpha),
            dst_factor: blend_factor(func.dst_alpha),
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    program: &GpuProgram,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let mesh_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &MESH_ATTRIBUTES,
    };
    let instance_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[[f32; 4]; 4]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES,
    };
    let buffers = match program.layout {
        VertexLayout::Instanced => vec![mesh_layout, instance_layout],
        VertexLayout::PerObject => vec![mesh_layout],
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&program.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: Some("vs_main"),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: key.blend.map(blend_state),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_test,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_uniform_storage(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    slots: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniform Buffer"),
        size: stride * slots,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Draw Uniform Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(UNIFORM_SIZE),
            }),
        }],
    });

    (buffer, bind_group)
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
