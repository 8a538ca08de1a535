//! GPU Allocation Seam
//!
//! [`RenderDevice`] is the only way the effect creates or destroys GPU
//! memory. Everything above this trait (resource manager, transient pool,
//! fallback sampler) deals in opaque [`TextureHandle`]s.
//!
//! Two implementations ship with the crate:
//!
//! - [`WgpuDevice`](crate::renderer::wgpu_backend::WgpuDevice): real GPU textures
//! - [`HeadlessDevice`](crate::renderer::headless::HeadlessDevice): in-memory bookkeeping

use glam::UVec2;

use crate::errors::Result;

slotmap::new_key_type! {
    /// Opaque handle to a texture owned by a [`RenderDevice`].
    pub struct TextureHandle;
}

/// High-dynamic-range color (`DefaultHDR`).
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Half-precision float color, used for bent normals and extracted normals.
pub const HALF_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Single-channel float, used for depth copies.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
/// 8-bit color, used for the LDR lightmask and the dynamic cubemap.
pub const LDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Color format of the ambient target for the given HDR mode.
#[inline]
#[must_use]
pub const fn color_format(hdr: bool) -> wgpu::TextureFormat {
    if hdr { HDR_FORMAT } else { LDR_FORMAT }
}

/// Texture shape.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TextureKind {
    /// Single 2D layer.
    D2,
    /// Six square layers viewed as a cube.
    Cube,
}

/// Descriptor for a render target.
///
/// All targets are point-filtered, single-sample and have no mip chain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub kind: TextureKind,
}

impl TextureDesc {
    /// A 2D render target.
    #[must_use]
    pub const fn new_2d(label: &'static str, size: UVec2, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            width: size.x,
            height: size.y,
            format,
            kind: TextureKind::D2,
        }
    }

    /// A cube render target with square faces of `face_size` pixels.
    #[must_use]
    pub const fn cube(label: &'static str, face_size: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            width: face_size,
            height: face_size,
            format,
            kind: TextureKind::Cube,
        }
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

/// Creates and destroys render targets.
///
/// Implementations must treat `release_texture` on an unknown or already
/// released handle as a no-op.
pub trait RenderDevice {
    /// Allocates a render target.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle>;

    /// Releases a render target.
    fn release_texture(&mut self, handle: TextureHandle);

    /// Whether the shared SSRT shading program is loaded.
    fn has_program(&self) -> bool;
}
