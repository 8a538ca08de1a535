//! Pipeline Builder
//!
//! `PipelineBuilder` turns the frame's settings snapshot into the three
//! command lists the effect attaches to the host. The lists are rebuilt
//! every frame from settings alone, and they are the single source of truth
//! for what executes.
//!
//! # Main list
//!
//! ```text
//! Camera ─blit─► CameraColor ─GetLightmask─► Lightmask
//!                                               │
//!                            Ssrt ◄─────────────┘
//!                              │ (BentNormal, GiOcclusion)
//!        ┌─────────────────────┴─────────────────────┐
//!   factor > 1: GetDepth, GetNormal, Upsample    factor = 1: blit
//!        └─────────────────────┬─────────────────────┘
//!                           Filter1
//!             reuse > 1: SampleReuse ─► Filter2 ─copy─► Filter1
//!        temporal: TemporalReproj ─► Filter2 ─► PreviousColor/Depth
//!        otherwise: Filter1 ─blit─► Filter2
//!                           Filter2 ─Debug*─► Camera
//! ```
//!
//! The branches depend on settings only. The single exception is the first
//! temporal frame after history was invalidated, which passes the filtered
//! result through instead of blending it with an empty history.

use std::fmt;

use glam::UVec2;
use log::trace;

use super::command::{Command, CommandList, Target, TransientSlot};
use super::pass::SsrtPass;
use super::stage::InjectionPoint;
use crate::renderer::device::{DEPTH_FORMAT, HALF_FORMAT, HDR_FORMAT, LDR_FORMAT, TextureDesc};
use crate::renderer::resources::PersistentTarget;
use crate::settings::{ResolutionDownscale, SsrtSettings};

/// Non-fatal configuration problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigWarning {
    /// An odd pixel dimension combined with downscaling produces artifacts.
    OddResolution {
        resolution: UVec2,
        downscale: ResolutionDownscale,
    },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OddResolution {
                resolution,
                downscale,
            } => write!(
                f,
                "uneven camera resolution ({}, {}) with downscale {:?} may cause artifacts; use a fixed even resolution",
                resolution.x, resolution.y, downscale
            ),
        }
    }
}

/// Checks the resolution/downscale combination for known artifact sources.
#[must_use]
pub fn odd_resolution_warning(resolution: UVec2, downscale: ResolutionDownscale) -> Option<ConfigWarning> {
    let odd = resolution.x % 2 == 1 || resolution.y % 2 == 1;
    (odd && downscale.is_downscaled()).then_some(ConfigWarning::OddResolution {
        resolution,
        downscale,
    })
}

/// The three command lists of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGraph {
    pub clear: CommandList,
    pub store_ambient: CommandList,
    pub main: CommandList,
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self {
            clear: CommandList::new(InjectionPoint::BeforeGBuffer),
            store_ambient: CommandList::new(InjectionPoint::BeforeLighting),
            main: CommandList::new(InjectionPoint::BeforeImageEffectsOpaque),
        }
    }
}

impl FrameGraph {
    /// The list attached at `point`.
    #[must_use]
    pub fn list(&self, point: InjectionPoint) -> &CommandList {
        match point {
            InjectionPoint::BeforeGBuffer => &self.clear,
            InjectionPoint::BeforeLighting => &self.store_ambient,
            InjectionPoint::BeforeImageEffectsOpaque => &self.main,
        }
    }

    pub fn lists(&self) -> impl Iterator<Item = &CommandList> {
        [&self.clear, &self.store_ambient, &self.main].into_iter()
    }

    fn clear(&mut self) {
        self.clear.clear();
        self.store_ambient.clear();
        self.main.clear();
    }
}

/// Builds the per-frame command lists, reusing their storage across frames.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    graph: FrameGraph,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The lists produced by the last [`build`](Self::build).
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &FrameGraph {
        &self.graph
    }

    /// Assembles the frame's command lists.
    ///
    /// `settings` must already be clamped. `history_valid` tells whether
    /// the previous-frame targets hold usable data.
    pub fn build(
        &mut self,
        settings: &SsrtSettings,
        resolution: UVec2,
        history_valid: bool,
    ) -> &FrameGraph {
        self.graph.clear();

        Self::build_clear(&mut self.graph.clear);
        Self::build_store_ambient(&mut self.graph.store_ambient);
        Self::build_main(&mut self.graph.main, settings, resolution, history_valid);

        trace!(
            "SSRT: built main list with {} commands ({} transients)",
            self.graph.main.len(),
            self.graph.main.transients.len()
        );

        &self.graph
    }

    /// Pre-clear: stop the previous composite from feeding back.
    fn build_clear(list: &mut CommandList) {
        list.push(Command::Clear {
            target: Target::Camera,
        });
    }

    /// Ambient isolation: keep the pre-lighting content, then leave only
    /// direct lighting in the primary target.
    fn build_store_ambient(list: &mut CommandList) {
        list.push(Command::Blit {
            source: Target::Camera,
            destination: Target::Persistent(PersistentTarget::Ambient),
        });
        list.push(Command::Clear {
            target: Target::Camera,
        });
    }

    fn build_main(
        list: &mut CommandList,
        settings: &SsrtSettings,
        resolution: UVec2,
        history_valid: bool,
    ) {
        let downscale = settings.resolution_downscale;

        // Direct-light capture
        list.declare(
            TransientSlot::CameraColor,
            TextureDesc::new_2d(TransientSlot::CameraColor.label(), resolution, HDR_FORMAT),
        );
        list.push(Command::Blit {
            source: Target::Camera,
            destination: Target::Transient(TransientSlot::CameraColor),
        });

        // Lightmask synthesis
        let lightmask_format = if settings.light_buffer_hdr { HDR_FORMAT } else { LDR_FORMAT };
        list.declare(
            TransientSlot::Lightmask,
            TextureDesc::new_2d(
                TransientSlot::Lightmask.label(),
                settings.light_buffer_resolution.apply(resolution),
                lightmask_format,
            ),
        );
        list.push(Command::draw(SsrtPass::GetLightmask, Target::Transient(TransientSlot::Lightmask)));

        // Ray march
        list.push(Command::Draw {
            pass: SsrtPass::Ssrt,
            targets: smallvec::smallvec![
                Target::Persistent(PersistentTarget::BentNormal),
                Target::Persistent(PersistentTarget::GiOcclusion),
            ],
        });

        let filter1 = Target::Transient(TransientSlot::Filter1);
        let filter2 = Target::Transient(TransientSlot::Filter2);
        for slot in [TransientSlot::Filter1, TransientSlot::Filter2] {
            list.declare(slot, TextureDesc::new_2d(slot.label(), resolution, HDR_FORMAT));
        }

        // Resolution recovery
        if downscale.is_downscaled() {
            let guide_size = downscale.apply(resolution);
            list.declare(
                TransientSlot::CurrentDepth,
                TextureDesc::new_2d(TransientSlot::CurrentDepth.label(), guide_size, DEPTH_FORMAT),
            );
            list.declare(
                TransientSlot::CurrentNormal,
                TextureDesc::new_2d(TransientSlot::CurrentNormal.label(), guide_size, HALF_FORMAT),
            );
            list.push(Command::draw(SsrtPass::GetDepth, Target::Transient(TransientSlot::CurrentDepth)));
            list.push(Command::draw(SsrtPass::GetNormal, Target::Transient(TransientSlot::CurrentNormal)));
            list.push(Command::draw(SsrtPass::Upsample, filter1));
        } else {
            list.push(Command::Blit {
                source: Target::Persistent(PersistentTarget::GiOcclusion),
                destination: filter1,
            });
        }

        // Spatial reuse
        if settings.spatial_reuse_enabled() {
            list.push(Command::draw(SsrtPass::SampleReuse, filter2));
            list.push(Command::Copy {
                source: filter2,
                destination: filter1,
            });
        }

        // Temporal accumulation
        if settings.temporal_enabled {
            if history_valid {
                list.push(Command::draw(SsrtPass::TemporalReproj, filter2));
            } else {
                list.push(Command::Blit {
                    source: filter1,
                    destination: filter2,
                });
            }
            list.push(Command::Blit {
                source: filter2,
                destination: Target::Persistent(PersistentTarget::PreviousColor),
            });
            list.push(Command::draw(
                SsrtPass::GetDepth,
                Target::Persistent(PersistentTarget::PreviousDepth),
            ));
        } else {
            list.push(Command::Blit {
                source: filter1,
                destination: filter2,
            });
        }

        // Composite
        list.push(Command::draw(settings.debug_mode.pass(), Target::Camera));
    }
}
