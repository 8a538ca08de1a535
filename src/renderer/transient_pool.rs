//! Transient Texture Pool
//!
//! Provides a pool for short-lived, per-frame render targets (camera color
//! snapshot, lightmask, filter buffers, upsample guides). The pipeline
//! requests them while a frame is recorded; at the start of the next frame
//! all allocations are returned to the free pool for reuse.
//!
//! # Design
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              TransientTexturePool                    │
//! │                                                     │
//! │  active: [PooledTexture]  ←── indexed by Id         │
//! │  free:   HashMap<Key, Vec<PooledTexture>>           │
//! │                                                     │
//! │  allocate() → Id    (recording, &mut self)          │
//! │  handle(Id)         (replay, &self)                 │
//! │  reset()            (frame boundary, &mut self)     │
//! │  trim()             (after reset, &mut self)        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Persistent targets never enter this pool, so a transient allocation can
//! never alias temporal history.

use rustc_hash::FxHashMap;

use crate::errors::Result;
use crate::renderer::device::{RenderDevice, TextureDesc, TextureHandle, TextureKind};

// ─── Public Types ─────────────────────────────────────────────────────────────

/// Handle to a transient texture allocated from the pool.
///
/// Valid only for the current frame. After [`TransientTexturePool::reset`]
/// is called, outstanding IDs become invalid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TransientTextureId(u32);

// ─── Internal Types ───────────────────────────────────────────────────────────

/// Recycling key; the label does not take part in matching.
#[derive(Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    kind: TextureKind,
}

impl PoolKey {
    fn from_desc(desc: &TextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            kind: desc.kind,
        }
    }
}

struct PooledTexture {
    handle: TextureHandle,
    key: PoolKey,
    /// Frames spent in the free pool without being reused.
    idle_frames: u32,
}

// ─── Pool Implementation ──────────────────────────────────────────────────────

/// Pool of transient per-frame render targets.
#[derive(Default)]
pub struct TransientTexturePool {
    /// Textures allocated this frame.
    active: Vec<PooledTexture>,
    /// Free textures available for reuse, grouped by pool key.
    free: FxHashMap<PoolKey, Vec<PooledTexture>>,
}

impl TransientTexturePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a transient texture matching `desc`.
    ///
    /// A compatible free texture is reused when available; otherwise a new
    /// one is created through `device`.
    pub fn allocate(
        &mut self,
        device: &mut dyn RenderDevice,
        desc: &TextureDesc,
    ) -> Result<TransientTextureId> {
        let key = PoolKey::from_desc(desc);

        let pooled = match self.free.get_mut(&key).and_then(Vec::pop) {
            Some(mut t) => {
                t.idle_frames = 0;
                t
            }
            None => PooledTexture {
                handle: device.create_texture(desc)?,
                key,
                idle_frames: 0,
            },
        };

        let id = TransientTextureId(self.active.len() as u32);
        self.active.push(pooled);
        Ok(id)
    }

    /// Device handle behind a transient ID.
    #[must_use]
    #[inline]
    pub fn handle(&self, id: TransientTextureId) -> Option<TextureHandle> {
        self.active.get(id.0 as usize).map(|t| t.handle)
    }

    /// Returns all active textures to the free pool.
    ///
    /// After this call, all previously returned IDs become invalid.
    pub fn reset(&mut self) {
        for t in self.active.drain(..) {
            self.free.entry(t.key.clone()).or_default().push(t);
        }
    }

    /// Releases free textures idle for more than `max_idle_frames` frames.
    ///
    /// Call once per frame after [`reset`](Self::reset); textures left over
    /// from an old resolution age out instead of being held forever.
    pub fn trim(&mut self, device: &mut dyn RenderDevice, max_idle_frames: u32) {
        for bucket in self.free.values_mut() {
            for t in bucket.iter_mut() {
                t.idle_frames += 1;
            }
            bucket.retain(|t| {
                let keep = t.idle_frames <= max_idle_frames;
                if !keep {
                    device.release_texture(t.handle);
                }
                keep
            });
        }
        self.free.retain(|_, bucket| !bucket.is_empty());
    }

    /// Releases every texture, active or free.
    pub fn release_all(&mut self, device: &mut dyn RenderDevice) {
        for t in self.active.drain(..) {
            device.release_texture(t.handle);
        }
        for (_, bucket) in self.free.drain() {
            for t in bucket {
                device.release_texture(t.handle);
            }
        }
    }

    /// Number of textures allocated this frame.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Total number of textures managed by the pool (active and free).
    #[must_use]
    pub fn total_texture_count(&self) -> usize {
        self.active.len() + self.free.values().map(Vec::len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;
    use crate::renderer::device::{DEPTH_FORMAT, HDR_FORMAT};
    use crate::renderer::headless::HeadlessDevice;

    fn hdr(label: &'static str, w: u32, h: u32) -> TextureDesc {
        TextureDesc::new_2d(label, UVec2::new(w, h), HDR_FORMAT)
    }

    #[test]
    fn test_same_frame_allocations_are_distinct() {
        let mut device = HeadlessDevice::new();
        let mut pool = TransientTexturePool::new();

        let a = pool.allocate(&mut device, &hdr("A", 64, 64)).unwrap();
        let b = pool.allocate(&mut device, &hdr("B", 64, 64)).unwrap();

        assert_ne!(pool.handle(a), pool.handle(b));
        assert_eq!(device.live_count(), 2);
    }

    #[test]
    fn test_reset_recycles_by_shape_not_label() {
        let mut device = HeadlessDevice::new();
        let mut pool = TransientTexturePool::new();

        let a = pool.allocate(&mut device, &hdr("Filter 1", 64, 64)).unwrap();
        let first = pool.handle(a);
        pool.reset();

        let b = pool.allocate(&mut device, &hdr("Camera Color", 64, 64)).unwrap();
        assert_eq!(pool.handle(b), first);
        assert_eq!(device.total_created(), 1);

        let c = pool
            .allocate(&mut device, &TextureDesc::new_2d("Depth", UVec2::new(64, 64), DEPTH_FORMAT))
            .unwrap();
        assert_ne!(pool.handle(c), first);
        assert_eq!(device.total_created(), 2);
    }

    #[test]
    fn test_trim_releases_stale_sizes() {
        let mut device = HeadlessDevice::new();
        let mut pool = TransientTexturePool::new();

        pool.allocate(&mut device, &hdr("Old", 1920, 1080)).unwrap();
        pool.reset();

        for _ in 0..3 {
            pool.allocate(&mut device, &hdr("New", 1280, 720)).unwrap();
            pool.reset();
            pool.trim(&mut device, 2);
        }

        assert_eq!(pool.total_texture_count(), 1);
        assert_eq!(device.live_count(), 1);
    }

    #[test]
    fn test_handles_invalid_after_reset() {
        let mut device = HeadlessDevice::new();
        let mut pool = TransientTexturePool::new();
        let id = pool.allocate(&mut device, &hdr("A", 8, 8)).unwrap();
        pool.reset();
        assert_eq!(pool.handle(id), None);
    }

    #[test]
    fn test_release_all_frees_everything() {
        let mut device = HeadlessDevice::new();
        let mut pool = TransientTexturePool::new();
        pool.allocate(&mut device, &hdr("A", 8, 8)).unwrap();
        pool.reset();
        pool.allocate(&mut device, &hdr("B", 16, 16)).unwrap();

        pool.release_all(&mut device);
        assert_eq!(pool.total_texture_count(), 0);
        assert_eq!(device.live_count(), 0);
    }
}
