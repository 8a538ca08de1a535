//! wgpu Render Device
//!
//! Owns the GPU textures behind [`TextureHandle`]s and the shared SSRT
//! shader module. Every target is single-sample, single-mip and usable as
//! render attachment, sampled input and copy source/destination.

use std::borrow::Cow;

use slotmap::SlotMap;

use crate::errors::{Result, SsrtError};
use crate::renderer::device::{RenderDevice, TextureDesc, TextureHandle, TextureKind};
use crate::renderer::environment::CubeFace;

pub(crate) struct GpuTexture {
    pub(crate) texture: wgpu::Texture,
    /// Default view: `D2` for 2D targets, `Cube` for cube targets.
    pub(crate) view: wgpu::TextureView,
    pub(crate) desc: TextureDesc,
    /// Host-owned textures are unregistered, not destroyed, on release.
    imported: bool,
}

/// [`RenderDevice`] backed by a `wgpu::Device`.
pub struct WgpuDevice {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) textures: SlotMap<TextureHandle, GpuTexture>,
    program: Option<wgpu::ShaderModule>,
}

const TARGET_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

impl WgpuDevice {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            textures: SlotMap::with_key(),
            program: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Installs the shared SSRT program compiled from WGSL source.
    ///
    /// The module must export `vs_main` and `fs_main` and follow the bind
    /// group layout documented in [`super::executor`].
    pub fn load_program(&mut self, wgsl_source: &str) {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SSRT Program"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(wgsl_source.to_owned())),
        });
        self.program = Some(module);
    }

    /// Installs an already created program, or removes it.
    pub fn set_program(&mut self, module: Option<wgpu::ShaderModule>) {
        self.program = module;
    }

    #[inline]
    pub(crate) fn program(&self) -> Option<&wgpu::ShaderModule> {
        self.program.as_ref()
    }

    /// Registers a host-owned texture (e.g. a static irradiance cubemap).
    ///
    /// Releasing the returned handle only unregisters it.
    pub fn import_texture(&mut self, texture: wgpu::Texture, desc: TextureDesc) -> TextureHandle {
        let view = create_default_view(&texture, desc.kind);
        self.textures.insert(GpuTexture {
            texture,
            view,
            desc,
            imported: true,
        })
    }

    #[must_use]
    pub fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(handle).map(|t| &t.texture)
    }

    #[must_use]
    pub fn view(&self, handle: TextureHandle) -> Option<&wgpu::TextureView> {
        self.textures.get(handle).map(|t| &t.view)
    }

    /// A 2D view of one cube face, for rendering a fallback capture.
    #[must_use]
    pub fn cube_face_view(&self, handle: TextureHandle, face: CubeFace) -> Option<wgpu::TextureView> {
        let gpu = self.textures.get(handle)?;
        if gpu.desc.kind != TextureKind::Cube {
            return None;
        }
        Some(gpu.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("SSRT Cubemap Face"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: face.layer(),
            array_layer_count: Some(1),
            ..Default::default()
        }))
    }

    /// Number of registered textures.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.textures.len()
    }
}

fn create_default_view(texture: &wgpu::Texture, kind: TextureKind) -> wgpu::TextureView {
    let dimension = match kind {
        TextureKind::D2 => wgpu::TextureViewDimension::D2,
        TextureKind::Cube => wgpu::TextureViewDimension::Cube,
    };
    texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(dimension),
        ..Default::default()
    })
}

impl RenderDevice for WgpuDevice {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(SsrtError::TextureAllocation {
                label: desc.label,
                width: desc.width,
                height: desc.height,
                reason: format!("size outside 1..={max}"),
            });
        }

        let layers = match desc.kind {
            TextureKind::D2 => 1,
            TextureKind::Cube => 6,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: TARGET_USAGE,
            view_formats: &[],
        });
        let view = create_default_view(&texture, desc.kind);

        log::trace!("SSRT: created '{}' {}x{} {:?}", desc.label, desc.width, desc.height, desc.format);

        Ok(self.textures.insert(GpuTexture {
            texture,
            view,
            desc: desc.clone(),
            imported: false,
        }))
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        if let Some(gpu) = self.textures.remove(handle)
            && !gpu.imported
        {
            gpu.texture.destroy();
        }
    }

    fn has_program(&self) -> bool {
        self.program.is_some()
    }
}
