//! Persistent Render Target Management
//!
//! [`ResourceManager`] owns every render target that outlives a single
//! frame's command recording:
//!
//! | Target | Tier | Format |
//! |--------|------|--------|
//! | `BentNormal` | downscaled | RGBA16F |
//! | `GiOcclusion` | downscaled | HDR |
//! | `Ambient` | full | HDR color, 8-bit in LDR mode |
//! | `PreviousColor` | full | HDR |
//! | `PreviousDepth` | full | R32F |
//!
//! The set is reallocated as a group whenever the output resolution, the
//! downscale tier or the HDR mode changes. Old handles are released before
//! new ones are created, and a failed reallocation leaves no partial set
//! behind: the manager is either fully allocated or empty.

use glam::UVec2;
use log::{debug, warn};

use crate::errors::Result;
use crate::renderer::device::{
    DEPTH_FORMAT, HALF_FORMAT, HDR_FORMAT, RenderDevice, TextureDesc, TextureHandle, color_format,
};
use crate::settings::ResolutionDownscale;

/// Role of a persistent render target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PersistentTarget {
    /// Bent normal + occlusion from the ray march.
    BentNormal,
    /// GI color + occlusion from the ray march.
    GiOcclusion,
    /// Ambient lighting captured before the lighting pass.
    Ambient,
    /// Temporally filtered result of the previous frame.
    PreviousColor,
    /// Depth of the previous frame.
    PreviousDepth,
}

impl PersistentTarget {
    pub const ALL: [Self; 5] = [
        Self::BentNormal,
        Self::GiOcclusion,
        Self::Ambient,
        Self::PreviousColor,
        Self::PreviousDepth,
    ];

    #[inline]
    const fn slot(self) -> usize {
        self as usize
    }

    /// Debug label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BentNormal => "SSRT Bent Normal",
            Self::GiOcclusion => "SSRT GI Occlusion",
            Self::Ambient => "SSRT Ambient",
            Self::PreviousColor => "SSRT Previous Color",
            Self::PreviousDepth => "SSRT Previous Depth",
        }
    }

    /// Returns `true` for targets carrying data across frames.
    #[must_use]
    pub const fn is_history(self) -> bool {
        matches!(self, Self::PreviousColor | Self::PreviousDepth)
    }

    /// Returns `true` for targets allocated at the downscaled tier.
    #[must_use]
    pub const fn is_downscaled(self) -> bool {
        matches!(self, Self::BentNormal | Self::GiOcclusion)
    }

    fn desc(self, key: &AllocationKey) -> TextureDesc {
        let size = if self.is_downscaled() {
            key.downscaled_size()
        } else {
            key.resolution
        };
        let format = match self {
            Self::BentNormal => HALF_FORMAT,
            // Boosted GI and its temporal accumulation exceed [0, 1].
            Self::GiOcclusion | Self::PreviousColor => HDR_FORMAT,
            Self::Ambient => color_format(key.hdr),
            Self::PreviousDepth => DEPTH_FORMAT,
        };
        TextureDesc::new_2d(self.label(), size, format)
    }
}

/// The inputs that determine the shape of the target set.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct AllocationKey {
    resolution: UVec2,
    downscale: ResolutionDownscale,
    hdr: bool,
}

impl AllocationKey {
    fn downscaled_size(&self) -> UVec2 {
        self.downscale.apply(self.resolution)
    }
}

/// A complete, consistently sized set of persistent targets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResourceSet {
    handles: [TextureHandle; 5],
    full_size: UVec2,
    downscaled_size: UVec2,
}

impl ResourceSet {
    /// Handle of the target playing `role`.
    #[inline]
    #[must_use]
    pub fn get(&self, role: PersistentTarget) -> TextureHandle {
        self.handles[role.slot()]
    }

    /// Full output resolution.
    #[inline]
    #[must_use]
    pub fn full_size(&self) -> UVec2 {
        self.full_size
    }

    /// Resolution of the downscaled tier.
    #[inline]
    #[must_use]
    pub fn downscaled_size(&self) -> UVec2 {
        self.downscaled_size
    }

    /// Iterates over `(role, handle)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PersistentTarget, TextureHandle)> + '_ {
        PersistentTarget::ALL.into_iter().map(|role| (role, self.get(role)))
    }
}

/// Outcome of [`ResourceManager::reconcile`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Reconciled {
    pub set: ResourceSet,
    /// `true` when this call (re)allocated the set.
    pub reallocated: bool,
}

/// Owner of the persistent render target set.
#[derive(Debug, Default)]
pub struct ResourceManager {
    current: Option<(AllocationKey, ResourceSet)>,
    /// Number of completed (re)allocations.
    generation: u64,
}

impl ResourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures the target set matches the requested shape.
    ///
    /// Reallocates iff no set exists yet, or the resolution, downscale tier
    /// or HDR mode differs from the previously allocated set.
    pub fn reconcile(
        &mut self,
        device: &mut dyn RenderDevice,
        resolution: UVec2,
        downscale: ResolutionDownscale,
        hdr: bool,
    ) -> Result<Reconciled> {
        let key = AllocationKey {
            resolution,
            downscale,
            hdr,
        };

        if let Some((current_key, set)) = &self.current
            && *current_key == key
        {
            return Ok(Reconciled {
                set: *set,
                reallocated: false,
            });
        }

        self.release_all(device);

        let mut handles = Vec::with_capacity(PersistentTarget::ALL.len());
        for role in PersistentTarget::ALL {
            match device.create_texture(&role.desc(&key)) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!("SSRT: allocation of '{}' failed, releasing partial set", role.label());
                    for handle in handles {
                        device.release_texture(handle);
                    }
                    return Err(err);
                }
            }
        }

        let set = ResourceSet {
            handles: [handles[0], handles[1], handles[2], handles[3], handles[4]],
            full_size: resolution,
            downscaled_size: key.downscaled_size(),
        };
        self.current = Some((key, set));
        self.generation += 1;

        debug!(
            "SSRT: allocated target set #{} at {}x{} (downscaled {}x{}, hdr: {})",
            self.generation,
            resolution.x,
            resolution.y,
            set.downscaled_size.x,
            set.downscaled_size.y,
            hdr
        );

        Ok(Reconciled {
            set,
            reallocated: true,
        })
    }

    /// The current target set, if allocated.
    #[inline]
    #[must_use]
    pub fn resources(&self) -> Option<&ResourceSet> {
        self.current.as_ref().map(|(_, set)| set)
    }

    /// Number of targets currently held.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        if self.current.is_some() {
            PersistentTarget::ALL.len()
        } else {
            0
        }
    }

    /// Number of completed allocations since creation.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Releases every held target. A no-op when nothing is allocated.
    pub fn release_all(&mut self, device: &mut dyn RenderDevice) {
        if let Some((_, set)) = self.current.take() {
            for (_, handle) in set.iter() {
                device.release_texture(handle);
            }
            debug!("SSRT: released persistent target set");
        }
    }
}
