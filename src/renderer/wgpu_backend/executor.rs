//! wgpu Pass Executor
//!
//! Replays command lists into a `wgpu::CommandEncoder`:
//!
//! - `Clear` → render pass with `LoadOp::Clear`
//! - `Blit` → fullscreen point-sampled copy (`blit.wgsl`)
//! - `Copy` → `copy_texture_to_texture`
//! - `Draw` → the host's SSRT program, pass selected by index
//!
//! # SSRT program bind groups
//!
//! | Group | Binding | Resource |
//! |-------|---------|----------|
//! | 0 | 0 | `SsrtUniforms` |
//! | 0 | 1 | pass index (`u32`, dynamic offset) |
//! | 0 | 2 | nearest sampler (non-filtering) |
//! | 1 | 0 | G-buffer depth (`texture_depth_2d`) |
//! | 1 | 1–2 | G-buffer normal, albedo |
//! | 1 | 3–13 | camera color, lightmask, bent normal, GI occlusion, ambient, previous color, previous depth, filter 1, filter 2, current depth, current normal |
//! | 1 | 14 | fallback cubemap (`texture_cube<f32>`) |
//!
//! All color inputs are bound as non-filterable float. An input that is
//! also a target of the same draw, or that the frame does not use, is
//! replaced by a 1×1 placeholder.

use std::num::NonZeroU64;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::device::WgpuDevice;
use crate::errors::{Result, SsrtError};
use crate::renderer::device::TextureHandle;
use crate::renderer::graph::{PassExecutor, ResolvedTargets, SsrtPass, TextureTarget, TransientSlot};
use crate::renderer::resources::PersistentTarget;
use crate::renderer::uniforms::{FrameParams, SsrtUniforms};

/// Stride between pass index slots (the minimum uniform offset alignment).
const PASS_INDEX_STRIDE: u64 = 256;

/// Number of 2D inputs bound from the target set (bindings 3–13).
const TARGET_INPUTS: usize = 11;

type PipelineKey = (SsrtPass, SmallVec<[wgpu::TextureFormat; 2]>);

/// Host-owned views for the current frame.
pub struct HostFrame<'a> {
    /// Primary output texture.
    pub camera: &'a wgpu::Texture,
    pub camera_view: &'a wgpu::TextureView,
    /// `Depth32Float` G-buffer depth.
    pub gbuffer_depth: &'a wgpu::TextureView,
    pub gbuffer_normal: &'a wgpu::TextureView,
    pub gbuffer_albedo: &'a wgpu::TextureView,
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType, dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: dimension,
            multisampled: false,
        },
        count: None,
    }
}

const UNFILTERED: wgpu::TextureSampleType = wgpu::TextureSampleType::Float { filterable: false };

fn placeholder(device: &wgpu::Device, label: &str, format: wgpu::TextureFormat, layers: u32, dimension: wgpu::TextureViewDimension) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: layers,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(dimension),
        ..Default::default()
    })
}

/// Layouts, pipelines and buffers shared across frames.
pub struct WgpuPassCache {
    textures_layout: wgpu::BindGroupLayout,
    blit_layout: wgpu::BindGroupLayout,
    ssrt_pipeline_layout: wgpu::PipelineLayout,
    blit_pipeline_layout: wgpu::PipelineLayout,
    blit_module: wgpu::ShaderModule,

    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    blit_pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,

    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,

    placeholder_2d: wgpu::TextureView,
    placeholder_cube: wgpu::TextureView,
}

impl WgpuPassCache {
    #[must_use]
    pub fn new(gpu: &WgpuDevice) -> Self {
        let device = &gpu.device;

        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSRT Params Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<SsrtUniforms>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(16),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let mut texture_entries = vec![
            texture_entry(0, wgpu::TextureSampleType::Depth, wgpu::TextureViewDimension::D2),
            texture_entry(1, UNFILTERED, wgpu::TextureViewDimension::D2),
            texture_entry(2, UNFILTERED, wgpu::TextureViewDimension::D2),
        ];
        for i in 0..TARGET_INPUTS as u32 {
            texture_entries.push(texture_entry(3 + i, UNFILTERED, wgpu::TextureViewDimension::D2));
        }
        texture_entries.push(texture_entry(
            3 + TARGET_INPUTS as u32,
            UNFILTERED,
            wgpu::TextureViewDimension::Cube,
        ));

        let textures_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSRT Textures Layout"),
            entries: &texture_entries,
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSRT Blit Layout"),
            entries: &[
                texture_entry(0, UNFILTERED, wgpu::TextureViewDimension::D2),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let ssrt_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SSRT Pipeline Layout"),
            bind_group_layouts: &[Some(&params_layout), Some(&textures_layout)],
            immediate_size: 0,
        });
        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SSRT Blit Pipeline Layout"),
            bind_group_layouts: &[Some(&blit_layout)],
            immediate_size: 0,
        });

        let blit_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SSRT Blit"),
            source: wgpu::ShaderSource::Wgsl(include_str!("blit.wgsl").into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("SSRT Nearest Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSRT Uniforms"),
            size: std::mem::size_of::<SsrtUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // One 16-byte slot per pass, written once.
        let pass_index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSRT Pass Indices"),
            size: PASS_INDEX_STRIDE * SsrtPass::COUNT as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        for pass in SsrtPass::ALL {
            let slot: [u32; 4] = [pass.index(), 0, 0, 0];
            gpu.queue.write_buffer(
                &pass_index_buffer,
                u64::from(pass.index()) * PASS_INDEX_STRIDE,
                bytemuck::cast_slice(&slot),
            );
        }

        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSRT Params BindGroup"),
            layout: &params_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &pass_index_buffer,
                        offset: 0,
                        size: NonZeroU64::new(16),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        Self {
            placeholder_2d: placeholder(
                device,
                "SSRT Placeholder",
                wgpu::TextureFormat::Rgba16Float,
                1,
                wgpu::TextureViewDimension::D2,
            ),
            placeholder_cube: placeholder(
                device,
                "SSRT Placeholder Cube",
                wgpu::TextureFormat::Rgba8Unorm,
                6,
                wgpu::TextureViewDimension::Cube,
            ),
            textures_layout,
            blit_layout,
            ssrt_pipeline_layout,
            blit_pipeline_layout,
            blit_module,
            pipelines: FxHashMap::default(),
            blit_pipelines: FxHashMap::default(),
            sampler,
            uniform_buffer,
            params_bind_group,
        }
    }

    /// Number of compiled SSRT pipelines.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn fullscreen_pipeline(
        device: &wgpu::Device,
        label: &str,
        layout: &wgpu::PipelineLayout,
        module: &wgpu::ShaderModule,
        formats: &[wgpu::TextureFormat],
    ) -> wgpu::RenderPipeline {
        let targets: SmallVec<[Option<wgpu::ColorTargetState>; 2]> = formats
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    fn ssrt_pipeline(
        &mut self,
        device: &wgpu::Device,
        program: &wgpu::ShaderModule,
        pass: SsrtPass,
        formats: SmallVec<[wgpu::TextureFormat; 2]>,
    ) -> wgpu::RenderPipeline {
        let layout = &self.ssrt_pipeline_layout;
        self.pipelines
            .entry((pass, formats))
            .or_insert_with_key(|(pass, formats)| {
                log::debug!("Compiling SSRT pipeline for pass {} {:?}", pass.name(), formats);
                Self::fullscreen_pipeline(
                    device,
                    &format!("SSRT Pipeline {}", pass.name()),
                    layout,
                    program,
                    formats,
                )
            })
            .clone()
    }

    fn blit_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        let layout = &self.blit_pipeline_layout;
        let module = &self.blit_module;
        self.blit_pipelines
            .entry(format)
            .or_insert_with(|| Self::fullscreen_pipeline(device, "SSRT Blit Pipeline", layout, module, &[format]))
            .clone()
    }
}

/// [`PassExecutor`] recording into a wgpu command encoder.
pub struct WgpuExecutor<'a> {
    gpu: &'a WgpuDevice,
    cache: &'a mut WgpuPassCache,
    encoder: &'a mut wgpu::CommandEncoder,
    host: HostFrame<'a>,
    uniforms_uploaded: bool,
}

impl<'a> WgpuExecutor<'a> {
    #[must_use]
    pub fn new(
        gpu: &'a WgpuDevice,
        cache: &'a mut WgpuPassCache,
        encoder: &'a mut wgpu::CommandEncoder,
        host: HostFrame<'a>,
    ) -> Self {
        Self {
            gpu,
            cache,
            encoder,
            host,
            uniforms_uploaded: false,
        }
    }

    fn unresolved(handle: TextureHandle) -> SsrtError {
        SsrtError::UnresolvedTarget(format!("{handle:?}"))
    }

    fn view(&self, target: TextureTarget) -> Result<&'a wgpu::TextureView> {
        match target {
            TextureTarget::Camera => Ok(self.host.camera_view),
            TextureTarget::Texture(handle) => self.gpu.view(handle).ok_or_else(|| Self::unresolved(handle)),
        }
    }

    fn texture(&self, target: TextureTarget) -> Result<&'a wgpu::Texture> {
        match target {
            TextureTarget::Camera => Ok(self.host.camera),
            TextureTarget::Texture(handle) => self.gpu.texture(handle).ok_or_else(|| Self::unresolved(handle)),
        }
    }

    fn format(&self, target: TextureTarget) -> Result<wgpu::TextureFormat> {
        Ok(self.texture(target)?.format())
    }

    fn attachment(view: &wgpu::TextureView, load: wgpu::LoadOp<wgpu::Color>) -> Option<wgpu::RenderPassColorAttachment<'_>> {
        Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })
    }
}

/// View bound for an input role; placeholder if unused or being written.
fn input_view<'v>(
    gpu: &'v WgpuDevice,
    placeholder: &'v wgpu::TextureView,
    handle: Option<TextureHandle>,
    targets: &[TextureTarget],
) -> &'v wgpu::TextureView {
    handle
        .filter(|h| !targets.contains(&TextureTarget::Texture(*h)))
        .and_then(|h| gpu.view(h))
        .unwrap_or(placeholder)
}

impl PassExecutor for WgpuExecutor<'_> {
    fn clear(&mut self, target: TextureTarget) -> Result<()> {
        let view = self.view(target)?;
        let _pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("SSRT Clear"),
            color_attachments: &[Self::attachment(view, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT))],
            ..Default::default()
        });
        Ok(())
    }

    fn blit(&mut self, source: TextureTarget, destination: TextureTarget) -> Result<()> {
        let source_view = self.view(source)?;
        let destination_view = self.view(destination)?;
        let format = self.format(destination)?;

        let pipeline = self.cache.blit_pipeline(&self.gpu.device, format);
        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSRT Blit BindGroup"),
            layout: &self.cache.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.cache.sampler),
                },
            ],
        });

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("SSRT Blit"),
            color_attachments: &[Self::attachment(destination_view, wgpu::LoadOp::Load)],
            ..Default::default()
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn copy(&mut self, source: TextureTarget, destination: TextureTarget) -> Result<()> {
        let source = self.texture(source)?;
        let destination = self.texture(destination)?;
        self.encoder.copy_texture_to_texture(
            source.as_image_copy(),
            destination.as_image_copy(),
            wgpu::Extent3d {
                width: source.width(),
                height: source.height(),
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn draw(
        &mut self,
        pass: SsrtPass,
        targets: &[TextureTarget],
        params: &FrameParams,
        inputs: &ResolvedTargets,
    ) -> Result<()> {
        let gpu = self.gpu;
        let program = gpu.program().ok_or(SsrtError::MissingProgram)?;

        if !self.uniforms_uploaded {
            gpu.queue
                .write_buffer(&self.cache.uniform_buffer, 0, bytemuck::bytes_of(&params.uniforms));
            self.uniforms_uploaded = true;
        }

        let mut formats = SmallVec::new();
        let mut views: SmallVec<[&wgpu::TextureView; 2]> = SmallVec::new();
        for target in targets {
            formats.push(self.format(*target)?);
            views.push(self.view(*target)?);
        }
        let pipeline = self.cache.ssrt_pipeline(&gpu.device, program, pass, formats);

        let set = inputs.persistent();
        let handles: [Option<TextureHandle>; TARGET_INPUTS] = [
            inputs.transient(TransientSlot::CameraColor),
            inputs.transient(TransientSlot::Lightmask),
            Some(set.get(PersistentTarget::BentNormal)),
            Some(set.get(PersistentTarget::GiOcclusion)),
            Some(set.get(PersistentTarget::Ambient)),
            Some(set.get(PersistentTarget::PreviousColor)),
            Some(set.get(PersistentTarget::PreviousDepth)),
            inputs.transient(TransientSlot::Filter1),
            inputs.transient(TransientSlot::Filter2),
            inputs.transient(TransientSlot::CurrentDepth),
            inputs.transient(TransientSlot::CurrentNormal),
        ];
        let fallback = params
            .bindings
            .fallback_cubemap
            .and_then(|h| gpu.view(h))
            .unwrap_or(&self.cache.placeholder_cube);

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(self.host.gbuffer_depth),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(self.host.gbuffer_normal),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(self.host.gbuffer_albedo),
            },
        ];
        for (i, handle) in handles.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 3 + i as u32,
                resource: wgpu::BindingResource::TextureView(input_view(
                    gpu,
                    &self.cache.placeholder_2d,
                    *handle,
                    targets,
                )),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: 3 + TARGET_INPUTS as u32,
            resource: wgpu::BindingResource::TextureView(fallback),
        });

        let textures_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSRT Textures BindGroup"),
            layout: &self.cache.textures_layout,
            entries: &entries,
        });

        let attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment<'_>>; 2]> = views
            .iter()
            .map(|view| Self::attachment(view, wgpu::LoadOp::Load))
            .collect();

        let offset = (u64::from(pass.index()) * PASS_INDEX_STRIDE) as u32;

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.name()),
            color_attachments: &attachments,
            ..Default::default()
        });
        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &self.cache.params_bind_group, &[offset]);
        render_pass.set_bind_group(1, &textures_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }
}
