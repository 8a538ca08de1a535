//! Headless Backend
//!
//! In-memory implementations of [`RenderDevice`] and [`PassExecutor`]. They
//! allocate no GPU memory; they keep the bookkeeping a real backend would
//! have (live handles, descriptors, what each target currently holds), so
//! the full pipeline can be dry-run and inspected without a GPU.
//!
//! [`RecordingExecutor`] tracks a *content version* per target: every draw
//! and clear writes a fresh version, blits and copies propagate the source
//! version. Comparing versions shows which pass produced the data a target
//! holds at any point of the frame.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::errors::{Result, SsrtError};
use crate::renderer::device::{RenderDevice, TextureDesc, TextureHandle};
use crate::renderer::graph::{PassExecutor, ResolvedTargets, SsrtPass, TextureTarget};
use crate::renderer::uniforms::{FrameParams, SsrtUniforms};

/// Largest texture edge accepted by [`HeadlessDevice`] by default.
pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

// ─── Device ───────────────────────────────────────────────────────────────────

/// Bookkeeping-only render device.
#[derive(Debug)]
pub struct HeadlessDevice {
    textures: SlotMap<TextureHandle, TextureDesc>,
    total_created: usize,
    total_released: usize,
    program_loaded: bool,
    max_dimension: u32,
    /// Allocations left before failures are injected.
    remaining_before_failure: Option<usize>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            textures: SlotMap::with_key(),
            total_created: 0,
            total_released: 0,
            program_loaded: true,
            max_dimension: DEFAULT_MAX_DIMENSION,
            remaining_before_failure: None,
        }
    }

    /// A device on which the SSRT program failed to load.
    #[must_use]
    pub fn without_program() -> Self {
        Self {
            program_loaded: false,
            ..Self::new()
        }
    }

    pub fn set_program_loaded(&mut self, loaded: bool) {
        self.program_loaded = loaded;
    }

    pub fn set_max_dimension(&mut self, max_dimension: u32) {
        self.max_dimension = max_dimension;
    }

    /// Makes every allocation after the next `count` fail.
    pub fn fail_allocations_after(&mut self, count: usize) {
        self.remaining_before_failure = Some(count);
    }

    /// Stops failure injection.
    pub fn stop_failing(&mut self) {
        self.remaining_before_failure = None;
    }

    /// Number of textures currently alive.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of successful allocations since creation.
    #[must_use]
    pub fn total_created(&self) -> usize {
        self.total_created
    }

    #[must_use]
    pub fn total_released(&self) -> usize {
        self.total_released
    }

    /// Descriptor of a live texture.
    #[must_use]
    pub fn desc(&self, handle: TextureHandle) -> Option<&TextureDesc> {
        self.textures.get(handle)
    }

    #[must_use]
    pub fn is_live(&self, handle: TextureHandle) -> bool {
        self.textures.contains_key(handle)
    }

    /// Live textures with the given label.
    pub fn live_with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = (TextureHandle, &'a TextureDesc)> + 'a {
        self.textures.iter().filter(move |(_, d)| d.label == label)
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle> {
        let fail = |reason: &str| SsrtError::TextureAllocation {
            label: desc.label,
            width: desc.width,
            height: desc.height,
            reason: reason.to_string(),
        };

        if desc.width == 0 || desc.height == 0 {
            return Err(fail("zero-sized texture"));
        }
        if desc.width > self.max_dimension || desc.height > self.max_dimension {
            return Err(fail("exceeds maximum texture dimension"));
        }
        if let Some(remaining) = self.remaining_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(fail("out of memory (injected)"));
            }
            *remaining -= 1;
        }

        self.total_created += 1;
        Ok(self.textures.insert(desc.clone()))
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(handle).is_some() {
            self.total_released += 1;
        }
    }

    fn has_program(&self) -> bool {
        self.program_loaded
    }
}

// ─── Executor ─────────────────────────────────────────────────────────────────

/// One replayed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOp {
    Clear {
        target: TextureTarget,
    },
    Blit {
        source: TextureTarget,
        destination: TextureTarget,
    },
    Copy {
        source: TextureTarget,
        destination: TextureTarget,
    },
    Draw {
        pass: SsrtPass,
        targets: Vec<TextureTarget>,
        uniforms: SsrtUniforms,
        /// Content version written into every target.
        version: u64,
    },
}

/// Records replayed operations and tracks target contents.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub ops: Vec<RecordedOp>,
    contents: FxHashMap<TextureTarget, u64>,
    next_version: u64,
}

impl RecordingExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets recorded operations but keeps target contents, like a real
    /// device across frames.
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Draw passes in replay order.
    pub fn passes(&self) -> impl Iterator<Item = SsrtPass> + '_ {
        self.ops.iter().filter_map(|op| match op {
            RecordedOp::Draw { pass, .. } => Some(*pass),
            _ => None,
        })
    }

    #[must_use]
    pub fn count_pass(&self, pass: SsrtPass) -> usize {
        self.passes().filter(|p| *p == pass).count()
    }

    /// Content version currently held by `target`.
    #[must_use]
    pub fn content(&self, target: TextureTarget) -> Option<u64> {
        self.contents.get(&target).copied()
    }

    /// Version written by the last invocation of `pass`.
    #[must_use]
    pub fn version_of(&self, pass: SsrtPass) -> Option<u64> {
        self.ops.iter().rev().find_map(|op| match op {
            RecordedOp::Draw { pass: p, version, .. } if *p == pass => Some(*version),
            _ => None,
        })
    }

    /// Uniforms seen by the last draw.
    #[must_use]
    pub fn last_uniforms(&self) -> Option<&SsrtUniforms> {
        self.ops.iter().rev().find_map(|op| match op {
            RecordedOp::Draw { uniforms, .. } => Some(uniforms),
            _ => None,
        })
    }

    fn fresh_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn propagate(&mut self, source: TextureTarget, destination: TextureTarget) {
        match self.contents.get(&source).copied() {
            Some(version) => {
                self.contents.insert(destination, version);
            }
            None => {
                self.contents.remove(&destination);
            }
        }
    }
}

impl PassExecutor for RecordingExecutor {
    fn clear(&mut self, target: TextureTarget) -> Result<()> {
        let version = self.fresh_version();
        self.contents.insert(target, version);
        self.ops.push(RecordedOp::Clear { target });
        Ok(())
    }

    fn blit(&mut self, source: TextureTarget, destination: TextureTarget) -> Result<()> {
        self.propagate(source, destination);
        self.ops.push(RecordedOp::Blit {
            source,
            destination,
        });
        Ok(())
    }

    fn copy(&mut self, source: TextureTarget, destination: TextureTarget) -> Result<()> {
        self.propagate(source, destination);
        self.ops.push(RecordedOp::Copy {
            source,
            destination,
        });
        Ok(())
    }

    fn draw(
        &mut self,
        pass: SsrtPass,
        targets: &[TextureTarget],
        params: &FrameParams,
        _inputs: &ResolvedTargets,
    ) -> Result<()> {
        let version = self.fresh_version();
        for target in targets {
            self.contents.insert(*target, version);
        }
        self.ops.push(RecordedOp::Draw {
            pass,
            targets: targets.to_vec(),
            uniforms: params.uniforms,
            version,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;
    use crate::renderer::device::HDR_FORMAT;

    #[test]
    fn test_rejects_degenerate_sizes() {
        let mut device = HeadlessDevice::new();
        let zero = TextureDesc::new_2d("Zero", UVec2::new(0, 4), HDR_FORMAT);
        assert!(device.create_texture(&zero).is_err());

        device.set_max_dimension(1024);
        let big = TextureDesc::new_2d("Big", UVec2::new(2048, 4), HDR_FORMAT);
        assert!(device.create_texture(&big).is_err());
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn test_failure_injection() {
        let mut device = HeadlessDevice::new();
        let desc = TextureDesc::new_2d("T", UVec2::new(4, 4), HDR_FORMAT);
        device.fail_allocations_after(1);
        assert!(device.create_texture(&desc).is_ok());
        assert!(device.create_texture(&desc).is_err());
        device.stop_failing();
        assert!(device.create_texture(&desc).is_ok());
        assert_eq!(device.live_count(), 2);
    }

    #[test]
    fn test_double_release_is_noop() {
        let mut device = HeadlessDevice::new();
        let h = device
            .create_texture(&TextureDesc::new_2d("T", UVec2::new(4, 4), HDR_FORMAT))
            .unwrap();
        device.release_texture(h);
        device.release_texture(h);
        assert_eq!(device.total_released(), 1);
    }

    #[test]
    fn test_blit_propagates_content() {
        let mut exec = RecordingExecutor::new();
        exec.clear(TextureTarget::Camera).unwrap();
        let camera = exec.content(TextureTarget::Camera);

        let mut device = HeadlessDevice::new();
        let h = device
            .create_texture(&TextureDesc::new_2d("T", UVec2::new(4, 4), HDR_FORMAT))
            .unwrap();
        exec.blit(TextureTarget::Camera, TextureTarget::Texture(h)).unwrap();
        assert_eq!(exec.content(TextureTarget::Texture(h)), camera);
    }
}
